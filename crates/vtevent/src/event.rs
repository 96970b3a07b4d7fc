//! Terminal events, key codes and mode flags.

use bitflags::bitflags;

/// A key code.
///
/// The ASCII control region doubles as the Ctrl-letter aliases,
/// printable specials sit at their ASCII values, and special keys grow
/// downward from `0xFFFF`. Application-defined codes must stay below
/// [`Key::MIN`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(pub u16);

impl Key {
    pub const CTRL_TILDE: Key = Key(0x00);
    pub const CTRL_2: Key = Key(0x00);
    pub const CTRL_A: Key = Key(0x01);
    pub const CTRL_B: Key = Key(0x02);
    pub const CTRL_C: Key = Key(0x03);
    pub const CTRL_D: Key = Key(0x04);
    pub const CTRL_E: Key = Key(0x05);
    pub const CTRL_F: Key = Key(0x06);
    pub const CTRL_G: Key = Key(0x07);
    pub const BACKSPACE: Key = Key(0x08);
    pub const CTRL_H: Key = Key(0x08);
    pub const TAB: Key = Key(0x09);
    pub const CTRL_I: Key = Key(0x09);
    pub const CTRL_J: Key = Key(0x0a);
    pub const CTRL_K: Key = Key(0x0b);
    pub const CTRL_L: Key = Key(0x0c);
    pub const ENTER: Key = Key(0x0d);
    pub const CTRL_M: Key = Key(0x0d);
    pub const CTRL_N: Key = Key(0x0e);
    pub const CTRL_O: Key = Key(0x0f);
    pub const CTRL_P: Key = Key(0x10);
    pub const CTRL_Q: Key = Key(0x11);
    pub const CTRL_R: Key = Key(0x12);
    pub const CTRL_S: Key = Key(0x13);
    pub const CTRL_T: Key = Key(0x14);
    pub const CTRL_U: Key = Key(0x15);
    pub const CTRL_V: Key = Key(0x16);
    pub const CTRL_W: Key = Key(0x17);
    pub const CTRL_X: Key = Key(0x18);
    pub const CTRL_Y: Key = Key(0x19);
    pub const CTRL_Z: Key = Key(0x1a);
    pub const ESC: Key = Key(0x1b);
    pub const CTRL_LSQ_BRACKET: Key = Key(0x1b);
    pub const CTRL_3: Key = Key(0x1b);
    pub const CTRL_4: Key = Key(0x1c);
    pub const CTRL_BACKSLASH: Key = Key(0x1c);
    pub const CTRL_5: Key = Key(0x1d);
    pub const CTRL_RSQ_BRACKET: Key = Key(0x1d);
    pub const CTRL_6: Key = Key(0x1e);
    pub const CTRL_7: Key = Key(0x1f);
    pub const CTRL_SLASH: Key = Key(0x1f);
    pub const CTRL_UNDERSCORE: Key = Key(0x1f);
    pub const SPACE: Key = Key(0x20);
    pub const BACKSPACE2: Key = Key(0x7f);
    pub const CTRL_8: Key = Key(0x7f);

    pub const F1: Key = Key(0xffff);
    pub const F2: Key = Key(0xffff - 1);
    pub const F3: Key = Key(0xffff - 2);
    pub const F4: Key = Key(0xffff - 3);
    pub const F5: Key = Key(0xffff - 4);
    pub const F6: Key = Key(0xffff - 5);
    pub const F7: Key = Key(0xffff - 6);
    pub const F8: Key = Key(0xffff - 7);
    pub const F9: Key = Key(0xffff - 8);
    pub const F10: Key = Key(0xffff - 9);
    pub const F11: Key = Key(0xffff - 10);
    pub const F12: Key = Key(0xffff - 11);
    pub const INSERT: Key = Key(0xffff - 12);
    pub const DELETE: Key = Key(0xffff - 13);
    pub const HOME: Key = Key(0xffff - 14);
    pub const END: Key = Key(0xffff - 15);
    pub const PGUP: Key = Key(0xffff - 16);
    pub const PGDN: Key = Key(0xffff - 17);
    pub const ARROW_UP: Key = Key(0xffff - 18);
    pub const ARROW_DOWN: Key = Key(0xffff - 19);
    pub const ARROW_LEFT: Key = Key(0xffff - 20);
    pub const ARROW_RIGHT: Key = Key(0xffff - 21);

    /// Lowest reserved code; everything from here up belongs to the
    /// library.
    pub const MIN: Key = Key(0xffff - 22);

    pub const MOUSE_LEFT: Key = Key(0xffff - 23);
    pub const MOUSE_MIDDLE: Key = Key(0xffff - 24);
    pub const MOUSE_RIGHT: Key = Key(0xffff - 25);
    pub const MOUSE_RELEASE: Key = Key(0xffff - 26);
    pub const MOUSE_WHEEL_UP: Key = Key(0xffff - 27);
    pub const MOUSE_WHEEL_DOWN: Key = Key(0xffff - 28);

    /// The key at index `i` of a terminal's key-sequence table.
    #[must_use]
    pub fn from_table_index(i: usize) -> Key {
        debug_assert!(i < 22);
        Key(0xffff - u16::try_from(i).unwrap_or(0))
    }
}

bitflags! {
    /// Modifier flags attached to key and mouse events.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Mod: u8 {
        const ALT = 0x01;
        const CTRL = 0x02;
        const SHIFT = 0x04;
        const MOTION = 0x08;
    }
}

bitflags! {
    /// Input parsing mode.
    ///
    /// At least one of `ESC` and `ALT` is always in effect; `ESC` is the
    /// default and wins when both would be absent.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct InputMode: u8 {
        /// A lone ESC byte is reported as the ESC key.
        const ESC = 0x01;
        /// A lone ESC byte marks the following key with [`Mod::ALT`].
        const ALT = 0x02;
        /// Decode mouse reports.
        const MOUSE = 0x04;
    }
}

impl InputMode {
    /// Interrogation value: keep (and report) the mode currently in
    /// effect.
    pub const CURRENT: InputMode = InputMode::empty();

    /// Apply the ESC/ALT defaulting rule: ESC when neither is set, ESC
    /// alone when both are.
    #[must_use]
    pub fn normalize(self) -> InputMode {
        if !self.intersects(InputMode::ESC | InputMode::ALT) {
            self | InputMode::ESC
        } else if self.contains(InputMode::ESC | InputMode::ALT) {
            self & !InputMode::ALT
        } else {
            self
        }
    }
}

/// An input event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A key press. Special keys carry a [`Key`] code and a NUL `ch`;
    /// plain text carries the character and `Key(0)`.
    Key { mods: Mod, key: Key, ch: char },
    /// The terminal window changed size.
    Resize { width: i32, height: i32 },
    /// A mouse press, release, wheel turn or movement. `key` is one of
    /// the `MOUSE_*` pseudo-keys; coordinates are zero-based cells.
    Mouse { mods: Mod, key: Key, x: i32, y: i32 },
    /// An `interrupt` call unblocked the poll.
    Interrupt,
    /// `n` raw bytes were delivered into the caller's buffer.
    Raw { n: usize },
    /// `n` undecodable bytes were skipped.
    None { n: usize },
}

impl Event {
    /// A key event for a bare key code.
    #[must_use]
    pub const fn key(key: Key) -> Event {
        Event::Key {
            mods: Mod::empty(),
            key,
            ch: '\0',
        }
    }

    /// A key event for a decoded character.
    #[must_use]
    pub const fn ch(ch: char) -> Event {
        Event::Key {
            mods: Mod::empty(),
            key: Key(0),
            ch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_table_index_maps_into_the_high_block() {
        assert_eq!(Key::from_table_index(0), Key::F1);
        assert_eq!(Key::from_table_index(11), Key::F12);
        assert_eq!(Key::from_table_index(20), Key::ARROW_LEFT);
        assert_eq!(Key::from_table_index(21), Key::ARROW_RIGHT);
    }

    #[test]
    fn mouse_keys_sit_below_key_min() {
        assert!(Key::MOUSE_LEFT < Key::MIN);
        assert!(Key::MOUSE_WHEEL_DOWN < Key::MOUSE_WHEEL_UP);
    }

    #[test]
    fn input_mode_normalization() {
        assert_eq!(InputMode::MOUSE.normalize(), InputMode::ESC | InputMode::MOUSE);
        assert_eq!(InputMode::ALT.normalize(), InputMode::ALT);
        assert_eq!(
            (InputMode::ESC | InputMode::ALT).normalize(),
            InputMode::ESC
        );
        assert_eq!(InputMode::empty().normalize(), InputMode::ESC);
    }
}
