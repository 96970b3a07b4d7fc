//! The capability table resolved for a terminal.

use strum::EnumCount;

/// Function capabilities the output driver needs.
///
/// The discriminant doubles as the index into [`TermCaps::funcs`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumCount)]
#[repr(usize)]
pub enum Cap {
    EnterCa,
    ExitCa,
    ShowCursor,
    HideCursor,
    ClearScreen,
    Sgr0,
    Underline,
    Bold,
    Hidden,
    Blink,
    Dim,
    Cursive,
    Reverse,
    EnterKeypad,
    ExitKeypad,
    EnterMouse,
    ExitMouse,
}

/// Number of key sequences carried per terminal: F1-F12, Insert, Delete,
/// Home, End, PgUp, PgDn and the four arrows. `keys[i]` is the sequence
/// for key code `0xFFFF - i`.
pub const KEY_COUNT: usize = 22;

/// Mouse reporting is not in terminfo; every terminal gets the DECSET
/// block (normal + button-motion tracking, URXVT and SGR extended
/// coordinates) and its reverse.
const ENTER_MOUSE: &str = "\x1b[?1000h\x1b[?1002h\x1b[?1015h\x1b[?1006h";
const EXIT_MOUSE: &str = "\x1b[?1006l\x1b[?1015l\x1b[?1002l\x1b[?1000l";

/// The control strings resolved for one terminal, either from a compiled
/// terminfo database or from the built-in table.
///
/// Absent capabilities are empty strings; emitting one is a no-op.
#[derive(Clone, Debug)]
pub struct TermCaps {
    name: String,
    funcs: [String; Cap::COUNT],
    keys: [String; KEY_COUNT],
}

impl TermCaps {
    pub(crate) fn new(
        name: String,
        mut funcs: [String; Cap::COUNT],
        keys: [String; KEY_COUNT],
    ) -> TermCaps {
        funcs[Cap::EnterMouse as usize] = ENTER_MOUSE.to_owned();
        funcs[Cap::ExitMouse as usize] = EXIT_MOUSE.to_owned();
        TermCaps { name, funcs, keys }
    }

    /// The `TERM` name this table was resolved for.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The control string for `cap`; empty when the terminal lacks it.
    #[must_use]
    pub fn func(&self, cap: Cap) -> &str {
        &self.funcs[cap as usize]
    }

    /// The key escape sequences, indexed per [`KEY_COUNT`].
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_block_is_always_present() {
        let caps = TermCaps::new(
            "test".to_owned(),
            std::array::from_fn(|_| String::new()),
            std::array::from_fn(|_| String::new()),
        );
        assert!(caps.func(Cap::EnterMouse).contains("?1006h"));
        assert!(caps.func(Cap::ExitMouse).contains("?1000l"));
    }
}
