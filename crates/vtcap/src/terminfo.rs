//! Compiled terminfo database loader.
//!
//! Resolves `TERM` against the usual database locations and pulls the
//! handful of string capabilities the engine needs out of the compiled
//! entry. Anything unreadable or malformed falls back to the built-in
//! table.

use std::env;
use std::fs;
use std::path::PathBuf;

use strum::EnumCount;
use tracing::debug;

use crate::builtin;
use crate::capability::{Cap, KEY_COUNT, TermCaps};

/// Terminfo resolution failure.
#[derive(Debug, thiserror::Error)]
pub enum CapError {
    #[error("TERM environment variable is not set")]
    NoTerm,
    #[error("unsupported terminal: {0}")]
    UnsupportedTerm(String),
}

/// Legacy compiled format: 16-bit numbers section.
const MAGIC_LEGACY: u16 = 0o432;
/// Extended compiled format: 32-bit numbers section.
const MAGIC_EXTENDED: u16 = 0o1036;

/// ncurses `term.h` string-capability indices, one per [`Cap`] in
/// declaration order. The mouse pair is hard-coded and never read, so it
/// has no entry here.
const FUNC_INDICES: [usize; Cap::COUNT - 2] = [
    28,  // enter_ca_mode
    40,  // exit_ca_mode
    16,  // cursor_normal
    13,  // cursor_invisible
    5,   // clear_screen
    39,  // exit_attribute_mode
    36,  // enter_underline_mode
    27,  // enter_bold_mode
    32,  // enter_secure_mode
    26,  // enter_blink_mode
    30,  // enter_dim_mode
    311, // enter_italics_mode
    34,  // enter_reverse_mode
    89,  // keypad_xmit
    88,  // keypad_local
];

/// ncurses `term.h` indices for the key block, ordered per
/// [`KEY_COUNT`]: F1-F12, Insert, Delete, Home, End, PgUp, PgDn, Up,
/// Down, Left, Right.
const KEY_INDICES: [usize; KEY_COUNT] = [
    66, 68, 69, 70, 71, 72, 73, 74, 75, 67, 216, 217, 77, 59, 76, 164, 82, 81, 87, 61, 79, 83,
];

/// Resolve the capability table for the terminal named by `TERM`.
///
/// Tries the compiled database first and falls back to the built-in
/// table.
///
/// # Errors
///
/// [`CapError::NoTerm`] when `TERM` is unset or empty,
/// [`CapError::UnsupportedTerm`] when neither the database nor the
/// built-in table has an entry.
pub fn load() -> Result<TermCaps, CapError> {
    let term = env::var("TERM")
        .ok()
        .filter(|t| !t.is_empty())
        .ok_or(CapError::NoTerm)?;
    for path in candidate_paths(&term) {
        let Ok(data) = fs::read(&path) else {
            continue;
        };
        if let Some(caps) = parse(&data, &term) {
            debug!(term = %term, path = %path.display(), "loaded compiled terminfo");
            return Ok(caps);
        }
        debug!(path = %path.display(), "malformed terminfo entry, skipping");
    }
    load_builtin(&term)
}

/// Resolve `term` against the built-in table only.
///
/// # Errors
///
/// [`CapError::UnsupportedTerm`] when the table has no matching entry.
pub fn load_builtin(term: &str) -> Result<TermCaps, CapError> {
    match builtin::lookup(term) {
        Some(caps) => {
            debug!(term, entry = caps.name(), "using built-in capability table");
            Ok(caps)
        }
        None => Err(CapError::UnsupportedTerm(term.to_owned())),
    }
}

/// Database files to try, in resolution order: `$TERMINFO`,
/// `$HOME/.terminfo`, each entry of `$TERMINFO_DIRS` (an empty entry
/// standing for the system default), `/lib/terminfo`,
/// `/usr/share/terminfo`. Each prefix is probed with the one-character
/// subdirectory layout and the hex layout used on macOS.
fn candidate_paths(term: &str) -> Vec<PathBuf> {
    let mut prefixes = Vec::new();
    if let Ok(dir) = env::var("TERMINFO") {
        prefixes.push(PathBuf::from(dir));
    }
    if let Ok(home) = env::var("HOME") {
        prefixes.push(PathBuf::from(home).join(".terminfo"));
    }
    if let Ok(dirs) = env::var("TERMINFO_DIRS") {
        for dir in dirs.split(':') {
            if dir.is_empty() {
                prefixes.push(PathBuf::from("/usr/share/terminfo"));
            } else {
                prefixes.push(PathBuf::from(dir));
            }
        }
    }
    prefixes.push(PathBuf::from("/lib/terminfo"));
    prefixes.push(PathBuf::from("/usr/share/terminfo"));

    let first = term.chars().next().unwrap_or('x');
    let mut paths = Vec::with_capacity(prefixes.len() * 2);
    for prefix in prefixes {
        paths.push(prefix.join(first.to_string()).join(term));
        paths.push(prefix.join(format!("{:02x}", first as u32)).join(term));
    }
    paths
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Parse a compiled terminfo entry.
///
/// Header: six little-endian 16-bit words `(magic, names_len, bools_len,
/// nums_count, strings_count, table_len)`; a pad byte realigns the
/// numbers section when `names_len + bools_len` is odd; numbers are two
/// bytes in the legacy format and four in the extended one; the strings
/// section is a table of 16-bit offsets into the trailing NUL-terminated
/// string table, with `0xFFFF` marking an absent capability.
fn parse(data: &[u8], term: &str) -> Option<TermCaps> {
    let magic = read_u16(data, 0)?;
    let number_size = match magic {
        MAGIC_LEGACY => 2,
        MAGIC_EXTENDED => 4,
        _ => return None,
    };
    let names_len = read_u16(data, 2)? as usize;
    let bools_len = read_u16(data, 4)? as usize;
    let nums_count = read_u16(data, 6)? as usize;
    let strings_count = read_u16(data, 8)? as usize;
    let table_len = read_u16(data, 10)? as usize;

    let mut offsets_at = 12 + names_len + bools_len;
    if (names_len + bools_len) % 2 != 0 {
        offsets_at += 1;
    }
    offsets_at += nums_count * number_size;
    let table_at = offsets_at + strings_count * 2;
    if table_at + table_len > data.len() {
        return None;
    }
    let table = &data[table_at..table_at + table_len];

    let fetch = |index: usize| -> String {
        if index >= strings_count {
            return String::new();
        }
        let Some(pos) = read_u16(data, offsets_at + index * 2) else {
            return String::new();
        };
        // 0xFFFF (and 0xFFFE, used for cancelled capabilities) mark
        // absence.
        if pos >= 0xFFFE {
            return String::new();
        }
        let start = pos as usize;
        if start >= table.len() {
            return String::new();
        }
        let rest = &table[start..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        String::from_utf8_lossy(&rest[..end]).into_owned()
    };

    let mut funcs: [String; Cap::COUNT] = std::array::from_fn(|_| String::new());
    for (slot, &index) in FUNC_INDICES.iter().enumerate() {
        funcs[slot] = fetch(index);
    }
    let keys: [String; KEY_COUNT] = std::array::from_fn(|i| fetch(KEY_INDICES[i]));

    Some(TermCaps::new(term.to_owned(), funcs, keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Assemble a minimal compiled entry holding the given
    /// `(term.h index, value)` string capabilities.
    fn compile(magic: u16, strings: &[(usize, &str)]) -> Vec<u8> {
        let names = b"test|synthetic entry";
        let strings_count = strings.iter().map(|&(i, _)| i + 1).max().unwrap_or(0);

        let mut table = Vec::new();
        let mut offsets = vec![0xFFFFu16; strings_count];
        for &(index, value) in strings {
            offsets[index] = u16::try_from(table.len()).unwrap();
            table.extend_from_slice(value.as_bytes());
            table.push(0);
        }

        let mut out = Vec::new();
        for word in [
            magic,
            u16::try_from(names.len()).unwrap(),
            0, // booleans
            0, // numbers
            u16::try_from(strings_count).unwrap(),
            u16::try_from(table.len()).unwrap(),
        ] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.extend_from_slice(names);
        if names.len() % 2 != 0 {
            out.push(0);
        }
        for off in offsets {
            out.extend_from_slice(&off.to_le_bytes());
        }
        out.extend_from_slice(&table);
        out
    }

    #[test]
    fn parses_legacy_entry() {
        let data = compile(
            MAGIC_LEGACY,
            &[
                (5, "\x1b[H\x1b[2J"),
                (28, "\x1b[?1049h"),
                (79, "\x1bOD"),
            ],
        );
        let caps = parse(&data, "test").unwrap();
        assert_eq!(caps.func(Cap::ClearScreen), "\x1b[H\x1b[2J");
        assert_eq!(caps.func(Cap::EnterCa), "\x1b[?1049h");
        // Index 20 of the key block is ArrowLeft (key code 0xFFFF - 20).
        assert_eq!(caps.keys()[20], "\x1bOD");
        // Unlisted capabilities come out empty.
        assert_eq!(caps.func(Cap::Cursive), "");
    }

    #[test]
    fn parses_extended_magic() {
        let data = compile(MAGIC_EXTENDED, &[(13, "\x1b[?25l")]);
        let caps = parse(&data, "test").unwrap();
        assert_eq!(caps.func(Cap::HideCursor), "\x1b[?25l");
    }

    #[test]
    fn rejects_bad_magic() {
        let data = compile(0x1234, &[(5, "x")]);
        assert!(parse(&data, "test").is_none());
    }

    #[test]
    fn rejects_truncated_entry() {
        let mut data = compile(MAGIC_LEGACY, &[(5, "\x1b[H\x1b[2J")]);
        data.truncate(data.len() - 4);
        assert!(parse(&data, "test").is_none());
    }

    #[test]
    fn mouse_block_is_hard_coded() {
        let data = compile(MAGIC_LEGACY, &[(5, "x")]);
        let caps = parse(&data, "test").unwrap();
        assert!(caps.func(Cap::EnterMouse).contains("?1000h"));
    }
}
