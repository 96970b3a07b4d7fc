//! The input extractor.
//!
//! A pure function over a byte buffer: given the pending input bytes,
//! the terminal's key-sequence table and the input mode, it pulls one
//! event off the front and reports how many bytes it consumed. Ambiguity
//! around a lone ESC is surfaced as [`Extracted::EscWait`] so the driver
//! can arm a deadline instead of guessing.

use crate::event::{Event, InputMode, Key, Mod};
use crate::mouse::{self, MouseParse};
use crate::utf8::{self, Utf8};

/// Result of one extraction attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Extracted {
    /// A complete event; `n` bytes were consumed.
    Event { event: Event, n: usize },
    /// No event. `n == 0` means the buffer holds an incomplete sequence
    /// and more bytes are needed; `n > 0` means the first `n` bytes are
    /// undecodable and should be skipped.
    None { n: usize },
    /// A lone ESC (or an unfinished escape sequence) that may still be
    /// completed by bytes in flight. Only reported when the caller
    /// allows waiting.
    EscWait,
}

/// Extract one event from the front of `buf`.
///
/// `keys` is the terminal's key-sequence table, indexed per
/// [`Key::from_table_index`]. `mode` selects lone-ESC handling and
/// whether mouse reports are decoded. With `allow_esc_wait`, an
/// ambiguous ESC yields [`Extracted::EscWait`] instead of being forced
/// to a decision.
#[must_use]
pub fn extract_event(
    buf: &[u8],
    keys: &[String],
    mode: InputMode,
    allow_esc_wait: bool,
) -> Extracted {
    let Some(&first) = buf.first() else {
        return Extracted::None { n: 0 };
    };

    if first == 0x1b {
        return extract_escape(buf, keys, mode, allow_esc_wait);
    }

    if first <= 0x20 || first == 0x7f {
        // The ASCII control region, space and DEL map straight onto key
        // codes.
        return Extracted::Event {
            event: Event::key(Key(u16::from(first))),
            n: 1,
        };
    }

    match utf8::decode(buf) {
        Utf8::Scalar(ch, n) => Extracted::Event {
            event: Event::ch(ch),
            n,
        },
        Utf8::Incomplete => Extracted::None { n: 0 },
        Utf8::Invalid => Extracted::None { n: 1 },
    }
}

fn extract_escape(
    buf: &[u8],
    keys: &[String],
    mode: InputMode,
    allow_esc_wait: bool,
) -> Extracted {
    // Longest match against the terminal's key sequences.
    let mut best: Option<(usize, usize)> = None;
    let mut partial = false;
    for (i, seq) in keys.iter().enumerate() {
        let seq = seq.as_bytes();
        if seq.is_empty() {
            continue;
        }
        if buf.len() >= seq.len() && buf[..seq.len()] == *seq {
            if best.is_none_or(|(len, _)| seq.len() > len) {
                best = Some((seq.len(), i));
            }
        } else if seq.len() > buf.len() && seq.starts_with(buf) {
            partial = true;
        }
    }
    if let Some((n, i)) = best {
        return Extracted::Event {
            event: Event::key(Key::from_table_index(i)),
            n,
        };
    }

    if mode.contains(InputMode::MOUSE) {
        match mouse::extract_mouse(buf) {
            MouseParse::Event { event, n } => return Extracted::Event { event, n },
            MouseParse::Skip { n } => return Extracted::None { n },
            MouseParse::Partial => partial = true,
            MouseParse::NoMatch => {}
        }
    }

    if partial && allow_esc_wait {
        return Extracted::EscWait;
    }

    if mode.contains(InputMode::ESC) {
        return Extracted::Event {
            event: Event::key(Key::ESC),
            n: 1,
        };
    }

    // ALT mode: drop the ESC, extract whatever follows and mark it.
    match extract_event(&buf[1..], keys, mode, allow_esc_wait) {
        Extracted::Event { mut event, n } => {
            match &mut event {
                Event::Key { mods, .. } | Event::Mouse { mods, .. } => *mods |= Mod::ALT,
                _ => {}
            }
            Extracted::Event { event, n: n + 1 }
        }
        // A lone ESC in ALT mode waits for its companion byte.
        Extracted::None { n: 0 } => Extracted::None { n: 0 },
        Extracted::None { n } => Extracted::None { n: n + 1 },
        Extracted::EscWait => Extracted::EscWait,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// The xterm key table, ordered per [`Key::from_table_index`].
    fn xterm_keys() -> Vec<String> {
        [
            "\x1bOP", "\x1bOQ", "\x1bOR", "\x1bOS", "\x1b[15~", "\x1b[17~", "\x1b[18~",
            "\x1b[19~", "\x1b[20~", "\x1b[21~", "\x1b[23~", "\x1b[24~", "\x1b[2~", "\x1b[3~",
            "\x1bOH", "\x1bOF", "\x1b[5~", "\x1b[6~", "\x1bOA", "\x1bOB", "\x1bOD", "\x1bOC",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    const ESC_MOUSE: InputMode = InputMode::ESC.union(InputMode::MOUSE);

    fn extract(buf: &[u8], mode: InputMode) -> Extracted {
        extract_event(buf, &xterm_keys(), mode, false)
    }

    #[test]
    fn empty_buffer_waits() {
        assert_eq!(extract(b"", InputMode::ESC), Extracted::None { n: 0 });
    }

    #[test]
    fn arrow_left() {
        assert_eq!(
            extract(b"\x1bOD", InputMode::ESC),
            Extracted::Event {
                event: Event::key(Key::ARROW_LEFT),
                n: 3,
            }
        );
    }

    #[test]
    fn longest_key_match_wins() {
        // A table where one sequence is a prefix of another.
        let keys = vec!["\x1bO".to_owned(), "\x1bOD".to_owned()];
        assert_eq!(
            extract_event(b"\x1bOD", &keys, InputMode::ESC, false),
            Extracted::Event {
                event: Event::key(Key::from_table_index(1)),
                n: 3,
            }
        );
    }

    #[test]
    fn control_bytes_are_key_codes() {
        assert_eq!(
            extract(b"\x09", InputMode::ESC),
            Extracted::Event {
                event: Event::key(Key::TAB),
                n: 1,
            }
        );
        assert_eq!(
            extract(b"\x7f", InputMode::ESC),
            Extracted::Event {
                event: Event::key(Key::BACKSPACE2),
                n: 1,
            }
        );
        assert_eq!(
            extract(b" ", InputMode::ESC),
            Extracted::Event {
                event: Event::key(Key::SPACE),
                n: 1,
            }
        );
    }

    #[test]
    fn plain_text_characters() {
        assert_eq!(
            extract(b"ab", InputMode::ESC),
            Extracted::Event {
                event: Event::ch('a'),
                n: 1,
            }
        );
        assert_eq!(
            extract("あ".as_bytes(), InputMode::ESC),
            Extracted::Event {
                event: Event::ch('あ'),
                n: 3,
            }
        );
    }

    #[test]
    fn incomplete_utf8_waits() {
        let bytes = "🦀".as_bytes();
        assert_eq!(extract(&bytes[..2], InputMode::ESC), Extracted::None { n: 0 });
    }

    #[test]
    fn invalid_utf8_is_skipped() {
        assert_eq!(extract(&[0x80, b'a'], InputMode::ESC), Extracted::None { n: 1 });
    }

    #[test]
    fn lone_esc_in_esc_mode() {
        assert_eq!(
            extract(b"\x1b", InputMode::ESC),
            Extracted::Event {
                event: Event::key(Key::ESC),
                n: 1,
            }
        );
    }

    #[test]
    fn lone_esc_waits_when_allowed() {
        assert_eq!(
            extract_event(b"\x1b", &xterm_keys(), InputMode::ESC, true),
            Extracted::EscWait
        );
        // Forced to a decision it becomes the ESC key.
        assert_eq!(
            extract_event(b"\x1b", &xterm_keys(), InputMode::ESC, false),
            Extracted::Event {
                event: Event::key(Key::ESC),
                n: 1,
            }
        );
    }

    #[test]
    fn lone_esc_in_alt_mode_waits_for_companion() {
        assert_eq!(extract(b"\x1b", InputMode::ALT), Extracted::None { n: 0 });
        assert_eq!(
            extract(b"\x1ba", InputMode::ALT),
            Extracted::Event {
                event: Event::Key {
                    mods: Mod::ALT,
                    key: Key(0),
                    ch: 'a',
                },
                n: 2,
            }
        );
    }

    #[test]
    fn alt_mode_still_matches_keys_first() {
        assert_eq!(
            extract(b"\x1bOD", InputMode::ALT),
            Extracted::Event {
                event: Event::key(Key::ARROW_LEFT),
                n: 3,
            }
        );
    }

    #[test]
    fn x10_mouse() {
        assert_eq!(
            extract(b"\x1b[MC\x95(", ESC_MOUSE),
            Extracted::Event {
                event: Event::Mouse {
                    mods: Mod::empty(),
                    key: Key::MOUSE_RELEASE,
                    x: 148,
                    y: 39,
                },
                n: 6,
            }
        );
    }

    #[test]
    fn sgr_mouse() {
        assert_eq!(
            extract(b"\x1b[<35;110;11M", ESC_MOUSE),
            Extracted::Event {
                event: Event::Mouse {
                    mods: Mod::MOTION,
                    key: Key::MOUSE_RELEASE,
                    x: 109,
                    y: 10,
                },
                n: 13,
            }
        );
    }

    #[test]
    fn urxvt_mouse() {
        assert_eq!(
            extract(b"\x1b[97;14;10M", ESC_MOUSE),
            Extracted::Event {
                event: Event::Mouse {
                    mods: Mod::MOTION,
                    key: Key::MOUSE_WHEEL_DOWN,
                    x: 13,
                    y: 9,
                },
                n: 11,
            }
        );
    }

    #[test]
    fn malformed_mouse_reports_skip_bytes() {
        assert_eq!(
            extract(b"\x1b[<;1;2M", ESC_MOUSE),
            Extracted::None { n: 4 }
        );
    }

    #[test]
    fn mouse_reports_ignored_without_mouse_mode() {
        // Without MOUSE the introducer decays to ESC + text.
        assert_eq!(
            extract(b"\x1b[<35;110;11M", InputMode::ESC),
            Extracted::Event {
                event: Event::key(Key::ESC),
                n: 1,
            }
        );
    }

    #[test]
    fn byte_accounting_drains_the_buffer() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"hi");
        buf.extend_from_slice(b"\x1bOD");
        buf.extend_from_slice(b"\x1b[<0;5;6M");
        buf.extend_from_slice(&[0xff]); // undecodable
        buf.extend_from_slice("あ".as_bytes());
        buf.extend_from_slice(b"\x1b[<35;1"); // pending suffix

        let keys = xterm_keys();
        let mut consumed = 0;
        let mut events = Vec::new();
        loop {
            match extract_event(&buf[consumed..], &keys, ESC_MOUSE, true) {
                Extracted::Event { event, n } => {
                    assert!(n > 0);
                    events.push(event);
                    consumed += n;
                }
                Extracted::None { n: 0 } | Extracted::EscWait => break,
                Extracted::None { n } => consumed += n,
            }
        }
        assert_eq!(consumed, buf.len() - b"\x1b[<35;1".len());
        assert_eq!(events.len(), 5);
    }
}
