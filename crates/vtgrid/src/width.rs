//! Display-column width of characters.

use unicode_width::UnicodeWidthChar;

/// The number of terminal columns `ch` occupies.
///
/// Returns `0` for NUL, `-1` for other control characters, and the
/// Unicode column width otherwise (`2` for wide East-Asian characters).
#[must_use]
pub fn wcwidth(ch: char) -> i32 {
    if ch == '\0' {
        return 0;
    }
    if ch.is_control() {
        return -1;
    }
    match UnicodeWidthChar::width(ch) {
        #[allow(clippy::cast_possible_wrap)]
        Some(w) => w as i32,
        None => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_single_width() {
        assert_eq!(wcwidth('a'), 1);
        assert_eq!(wcwidth(' '), 1);
        assert_eq!(wcwidth('@'), 1);
    }

    #[test]
    fn cjk_is_double_width() {
        assert_eq!(wcwidth('\u{3042}'), 2);
        assert_eq!(wcwidth('\u{ff28}'), 2);
    }

    #[test]
    fn supplementary_symbol_is_single_width() {
        // Non-East-Asian supplementary plane codepoint.
        assert_eq!(wcwidth('\u{1f702}'), 1);
    }

    #[test]
    fn controls() {
        assert_eq!(wcwidth('\0'), 0);
        assert_eq!(wcwidth('\u{1}'), -1);
        assert_eq!(wcwidth('\u{1f}'), -1);
        assert_eq!(wcwidth('\u{7f}'), -1);
    }
}
