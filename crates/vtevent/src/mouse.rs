//! Mouse report parsing.
//!
//! Three encodings are recognized, distinguished by their prefix:
//! X10 (`ESC [ M cb cx cy`), SGR 1006 (`ESC [ < b ; x ; y M|m`) and
//! URXVT 1015 (`ESC [ b ; x ; y M`). All three go through one button
//! decoder applied to the raw encoded value.

use smallvec::SmallVec;

use crate::event::{Event, Key, Mod};

/// Longest decimal parameter accepted in a mouse report.
const MAX_PARAM_DIGITS: usize = 8;

pub(crate) enum MouseParse {
    /// A complete mouse event consuming `n` bytes.
    Event { event: Event, n: usize },
    /// A malformed report; skip the `n` bytes consumed up to the
    /// failure.
    Skip { n: usize },
    /// The buffer may still grow into a mouse report.
    Partial,
    /// Not a mouse report.
    NoMatch,
}

/// Try to parse a mouse report off the front of `buf`. The caller has
/// already established that `buf` starts with ESC.
pub(crate) fn extract_mouse(buf: &[u8]) -> MouseParse {
    if let Some(rest) = buf.strip_prefix(b"\x1b[M") {
        // X10: three raw bytes follow.
        if rest.len() < 3 {
            return MouseParse::Partial;
        }
        let (key, mods) = decode_button(u32::from(rest[0]));
        return MouseParse::Event {
            event: Event::Mouse {
                mods,
                key,
                x: i32::from(rest[1]) - 1,
                y: i32::from(rest[2]) - 1,
            },
            n: 6,
        };
    }

    if buf.starts_with(b"\x1b[<") {
        return match parse_params(buf, 3, b"Mm") {
            Params::Done {
                params,
                final_byte,
                n,
            } => {
                if params.len() != 3 {
                    return MouseParse::Skip { n };
                }
                #[allow(clippy::cast_sign_loss)]
                let (mut key, mods) = decode_button(params[0] as u32);
                // SGR reports release with a lowercase final byte.
                if final_byte == b'm' {
                    key = Key::MOUSE_RELEASE;
                }
                MouseParse::Event {
                    event: Event::Mouse {
                        mods,
                        key,
                        x: params[1] - 1,
                        y: params[2] - 1,
                    },
                    n,
                }
            }
            Params::Partial => MouseParse::Partial,
            Params::Bad { n } => MouseParse::Skip { n },
        };
    }

    if buf.len() >= 3 && buf.starts_with(b"\x1b[") && buf[2].is_ascii_digit() {
        // URXVT: plain decimal parameters terminated by `M`.
        return match parse_params(buf, 2, b"M") {
            Params::Done {
                params,
                final_byte: _,
                n,
            } => {
                if params.len() != 3 {
                    return MouseParse::Skip { n };
                }
                #[allow(clippy::cast_sign_loss)]
                let (key, mods) = decode_button(params[0] as u32);
                MouseParse::Event {
                    event: Event::Mouse {
                        mods,
                        key,
                        x: params[1] - 1,
                        y: params[2] - 1,
                    },
                    n,
                }
            }
            Params::Partial => MouseParse::Partial,
            Params::Bad { n } => MouseParse::Skip { n },
        };
    }

    // A prefix of one of the introducers may still complete.
    if b"\x1b[M".starts_with(buf) || b"\x1b[<".starts_with(buf) {
        return MouseParse::Partial;
    }
    MouseParse::NoMatch
}

/// Shared button decoder: button from the low two bits (3 = release),
/// wheel direction over buttons 0/1 when bit 6 is set, motion flag from
/// bit 5.
fn decode_button(b: u32) -> (Key, Mod) {
    let key = match b & 3 {
        0 => {
            if b & 64 != 0 {
                Key::MOUSE_WHEEL_UP
            } else {
                Key::MOUSE_LEFT
            }
        }
        1 => {
            if b & 64 != 0 {
                Key::MOUSE_WHEEL_DOWN
            } else {
                Key::MOUSE_MIDDLE
            }
        }
        2 => Key::MOUSE_RIGHT,
        _ => Key::MOUSE_RELEASE,
    };
    let mods = if b & 32 != 0 {
        Mod::MOTION
    } else {
        Mod::empty()
    };
    (key, mods)
}

enum Params {
    Done {
        params: SmallVec<[i32; 4]>,
        final_byte: u8,
        n: usize,
    },
    Partial,
    Bad {
        n: usize,
    },
}

/// Collect `;`-separated decimal parameters starting at `start`, up to
/// one of the `finals` bytes.
fn parse_params(buf: &[u8], start: usize, finals: &[u8]) -> Params {
    let mut params = SmallVec::new();
    let mut i = start;
    let mut num_start = i;
    loop {
        let Some(&b) = buf.get(i) else {
            return Params::Partial;
        };
        if b.is_ascii_digit() {
            if i - num_start >= MAX_PARAM_DIGITS {
                return Params::Bad { n: i + 1 };
            }
            i += 1;
            continue;
        }
        if num_start == i {
            // Empty parameter.
            return Params::Bad { n: i + 1 };
        }
        let Ok(value) = atoi_simd::parse::<i32>(&buf[num_start..i]) else {
            return Params::Bad { n: i + 1 };
        };
        params.push(value);
        if b == b';' {
            i += 1;
            num_start = i;
            continue;
        }
        if finals.contains(&b) {
            return Params::Done {
                params,
                final_byte: b,
                n: i + 1,
            };
        }
        return Params::Bad { n: i + 1 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(buf: &[u8]) -> (Event, usize) {
        match extract_mouse(buf) {
            MouseParse::Event { event, n } => (event, n),
            _ => panic!("expected a mouse event from {buf:?}"),
        }
    }

    #[test]
    fn x10_release() {
        let (ev, n) = event(b"\x1b[MC\x95(");
        assert_eq!(n, 6);
        assert_eq!(
            ev,
            Event::Mouse {
                mods: Mod::empty(),
                key: Key::MOUSE_RELEASE,
                x: 148,
                y: 39,
            }
        );
    }

    #[test]
    fn x10_left_press() {
        let (ev, n) = event(b"\x1b[M\x00!!");
        assert_eq!(n, 6);
        assert_eq!(
            ev,
            Event::Mouse {
                mods: Mod::empty(),
                key: Key::MOUSE_LEFT,
                x: 32,
                y: 32,
            }
        );
    }

    #[test]
    fn sgr_motion_release() {
        let (ev, n) = event(b"\x1b[<35;110;11M");
        assert_eq!(n, 13);
        assert_eq!(
            ev,
            Event::Mouse {
                mods: Mod::MOTION,
                key: Key::MOUSE_RELEASE,
                x: 109,
                y: 10,
            }
        );
    }

    #[test]
    fn sgr_lowercase_final_is_release() {
        let (ev, _) = event(b"\x1b[<0;5;6m");
        assert_eq!(
            ev,
            Event::Mouse {
                mods: Mod::empty(),
                key: Key::MOUSE_RELEASE,
                x: 4,
                y: 5,
            }
        );
    }

    #[test]
    fn urxvt_wheel_down() {
        let (ev, n) = event(b"\x1b[97;14;10M");
        assert_eq!(n, 11);
        assert_eq!(
            ev,
            Event::Mouse {
                mods: Mod::MOTION,
                key: Key::MOUSE_WHEEL_DOWN,
                x: 13,
                y: 9,
            }
        );
    }

    #[test]
    fn short_buffers_are_partial() {
        assert!(matches!(extract_mouse(b"\x1b"), MouseParse::Partial));
        assert!(matches!(extract_mouse(b"\x1b["), MouseParse::Partial));
        assert!(matches!(extract_mouse(b"\x1b[M"), MouseParse::Partial));
        assert!(matches!(extract_mouse(b"\x1b[MC\x95"), MouseParse::Partial));
        assert!(matches!(extract_mouse(b"\x1b[<35;1"), MouseParse::Partial));
        assert!(matches!(extract_mouse(b"\x1b[97;14;10"), MouseParse::Partial));
    }

    #[test]
    fn malformed_reports_skip_consumed_bytes() {
        // Empty parameter.
        assert!(matches!(
            extract_mouse(b"\x1b[<;110;11M"),
            MouseParse::Skip { n: 4 }
        ));
        // Wrong parameter count.
        assert!(matches!(
            extract_mouse(b"\x1b[<35;110M"),
            MouseParse::Skip { n: 10 }
        ));
        // Unexpected terminator.
        assert!(matches!(
            extract_mouse(b"\x1b[<35;110;11Z"),
            MouseParse::Skip { n: 13 }
        ));
    }

    #[test]
    fn non_mouse_csi_does_not_match() {
        assert!(matches!(extract_mouse(b"\x1b[A"), MouseParse::NoMatch));
        assert!(matches!(extract_mouse(b"\x1bOD"), MouseParse::NoMatch));
    }
}
