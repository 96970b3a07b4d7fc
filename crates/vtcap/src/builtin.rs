//! Built-in capability tables for common terminals.
//!
//! Used when no compiled terminfo entry can be found. Entries are keyed
//! by `TERM`: an exact name match first, then a substring match so that
//! e.g. `screen-256color` resolves to the `screen` entry.

use crate::capability::{KEY_COUNT, TermCaps};

/// Function strings in [`Cap`](crate::Cap) declaration order, without
/// the hard-coded mouse pair.
const FUNC_COUNT: usize = 15;

struct Builtin {
    name: &'static str,
    keys: [&'static str; KEY_COUNT],
    funcs: [&'static str; FUNC_COUNT],
}

static ETERM: Builtin = Builtin {
    name: "Eterm",
    keys: [
        "\x1b[11~", "\x1b[12~", "\x1b[13~", "\x1b[14~", "\x1b[15~", "\x1b[17~", "\x1b[18~",
        "\x1b[19~", "\x1b[20~", "\x1b[21~", "\x1b[23~", "\x1b[24~", "\x1b[2~", "\x1b[3~",
        "\x1b[7~", "\x1b[8~", "\x1b[5~", "\x1b[6~", "\x1b[A", "\x1b[B", "\x1b[D", "\x1b[C",
    ],
    funcs: [
        "\x1b7\x1b[?47h",
        "\x1b[2J\x1b[?47l\x1b8",
        "\x1b[?25h",
        "\x1b[?25l",
        "\x1b[H\x1b[2J",
        "\x1b[m\x0f",
        "\x1b[4m",
        "\x1b[1m",
        "",
        "\x1b[5m",
        "",
        "",
        "\x1b[7m",
        "",
        "",
    ],
};

static SCREEN: Builtin = Builtin {
    name: "screen",
    keys: [
        "\x1bOP", "\x1bOQ", "\x1bOR", "\x1bOS", "\x1b[15~", "\x1b[17~", "\x1b[18~", "\x1b[19~",
        "\x1b[20~", "\x1b[21~", "\x1b[23~", "\x1b[24~", "\x1b[2~", "\x1b[3~", "\x1b[1~",
        "\x1b[4~", "\x1b[5~", "\x1b[6~", "\x1bOA", "\x1bOB", "\x1bOD", "\x1bOC",
    ],
    funcs: [
        "\x1b[?1049h",
        "\x1b[?1049l",
        "\x1b[34h\x1b[?25h",
        "\x1b[?25l",
        "\x1b[H\x1b[J",
        "\x1b[m\x0f",
        "\x1b[4m",
        "\x1b[1m",
        "",
        "\x1b[5m",
        "",
        "",
        "\x1b[7m",
        "\x1b[?1h\x1b=",
        "\x1b[?1l\x1b>",
    ],
};

static XTERM: Builtin = Builtin {
    name: "xterm",
    keys: [
        "\x1bOP", "\x1bOQ", "\x1bOR", "\x1bOS", "\x1b[15~", "\x1b[17~", "\x1b[18~", "\x1b[19~",
        "\x1b[20~", "\x1b[21~", "\x1b[23~", "\x1b[24~", "\x1b[2~", "\x1b[3~", "\x1bOH", "\x1bOF",
        "\x1b[5~", "\x1b[6~", "\x1bOA", "\x1bOB", "\x1bOD", "\x1bOC",
    ],
    funcs: [
        "\x1b[?1049h",
        "\x1b[?1049l",
        "\x1b[?12l\x1b[?25h",
        "\x1b[?25l",
        "\x1b[H\x1b[2J",
        "\x1b(B\x1b[m",
        "\x1b[4m",
        "\x1b[1m",
        "\x1b[8m",
        "\x1b[5m",
        "\x1b[2m",
        "\x1b[3m",
        "\x1b[7m",
        "\x1b[?1h\x1b=",
        "\x1b[?1l\x1b>",
    ],
};

static RXVT_UNICODE: Builtin = Builtin {
    name: "rxvt-unicode",
    keys: [
        "\x1b[11~", "\x1b[12~", "\x1b[13~", "\x1b[14~", "\x1b[15~", "\x1b[17~", "\x1b[18~",
        "\x1b[19~", "\x1b[20~", "\x1b[21~", "\x1b[23~", "\x1b[24~", "\x1b[2~", "\x1b[3~",
        "\x1b[7~", "\x1b[8~", "\x1b[5~", "\x1b[6~", "\x1b[A", "\x1b[B", "\x1b[D", "\x1b[C",
    ],
    funcs: [
        "\x1b[?1049h",
        "\x1b[r\x1b[?1049l",
        "\x1b[?25h",
        "\x1b[?25l",
        "\x1b[H\x1b[2J",
        "\x1b[m\x1b(B",
        "\x1b[4m",
        "\x1b[1m",
        "",
        "\x1b[5m",
        "",
        "",
        "\x1b[7m",
        "\x1b=",
        "\x1b>",
    ],
};

static RXVT_256COLOR: Builtin = Builtin {
    name: "rxvt-256color",
    keys: [
        "\x1b[11~", "\x1b[12~", "\x1b[13~", "\x1b[14~", "\x1b[15~", "\x1b[17~", "\x1b[18~",
        "\x1b[19~", "\x1b[20~", "\x1b[21~", "\x1b[23~", "\x1b[24~", "\x1b[2~", "\x1b[3~",
        "\x1b[7~", "\x1b[8~", "\x1b[5~", "\x1b[6~", "\x1b[A", "\x1b[B", "\x1b[D", "\x1b[C",
    ],
    funcs: [
        "\x1b7\x1b[?47h",
        "\x1b[2J\x1b[?47l\x1b8",
        "\x1b[?25h",
        "\x1b[?25l",
        "\x1b[H\x1b[2J",
        "\x1b[m\x0f",
        "\x1b[4m",
        "\x1b[1m",
        "",
        "\x1b[5m",
        "",
        "",
        "\x1b[7m",
        "\x1b=",
        "\x1b>",
    ],
};

static LINUX: Builtin = Builtin {
    name: "linux",
    keys: [
        "\x1b[[A", "\x1b[[B", "\x1b[[C", "\x1b[[D", "\x1b[[E", "\x1b[17~", "\x1b[18~",
        "\x1b[19~", "\x1b[20~", "\x1b[21~", "\x1b[23~", "\x1b[24~", "\x1b[2~", "\x1b[3~",
        "\x1b[1~", "\x1b[4~", "\x1b[5~", "\x1b[6~", "\x1b[A", "\x1b[B", "\x1b[D", "\x1b[C",
    ],
    funcs: [
        "",
        "",
        "\x1b[?25h\x1b[?0c",
        "\x1b[?25l\x1b[?1c",
        "\x1b[H\x1b[J",
        "\x1b[0;10m",
        "\x1b[4m",
        "\x1b[1m",
        "",
        "\x1b[5m",
        "",
        "",
        "\x1b[7m",
        "",
        "",
    ],
};

static TERMS: [&Builtin; 6] = [&ETERM, &SCREEN, &XTERM, &RXVT_UNICODE, &RXVT_256COLOR, &LINUX];

/// Substring aliases tried after exact names, most specific first.
/// `cygwin` and `st` behave like xterm.
static COMPAT: [(&str, &Builtin); 8] = [
    ("Eterm", &ETERM),
    ("screen", &SCREEN),
    ("xterm", &XTERM),
    ("rxvt-256color", &RXVT_256COLOR),
    ("rxvt", &RXVT_UNICODE),
    ("linux", &LINUX),
    ("cygwin", &XTERM),
    ("st", &XTERM),
];

pub(crate) fn lookup(term: &str) -> Option<TermCaps> {
    let entry = TERMS
        .iter()
        .copied()
        .find(|b| b.name == term)
        .or_else(|| {
            COMPAT
                .iter()
                .find(|(alias, _)| term.contains(alias))
                .map(|&(_, b)| b)
        })?;
    Some(TermCaps::new(
        entry.name.to_owned(),
        std::array::from_fn(|i| entry.funcs.get(i).copied().unwrap_or("").to_owned()),
        std::array::from_fn(|i| entry.keys[i].to_owned()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Cap;
    use pretty_assertions::assert_eq;

    #[test]
    fn exact_match() {
        let caps = lookup("linux").unwrap();
        assert_eq!(caps.name(), "linux");
        assert_eq!(caps.func(Cap::Sgr0), "\x1b[0;10m");
    }

    #[test]
    fn substring_match() {
        assert_eq!(lookup("screen-256color").unwrap().name(), "screen");
        assert_eq!(lookup("xterm-256color").unwrap().name(), "xterm");
        assert_eq!(lookup("rxvt-256color").unwrap().name(), "rxvt-256color");
    }

    #[test]
    fn xterm_aliases() {
        assert_eq!(lookup("cygwin").unwrap().name(), "xterm");
        assert_eq!(lookup("st-256color").unwrap().name(), "xterm");
    }

    #[test]
    fn unknown_terminal() {
        assert!(lookup("vt52").is_none());
    }

    #[test]
    fn arrow_left_is_ss3_on_xterm() {
        let caps = lookup("xterm").unwrap();
        assert_eq!(caps.keys()[20], "\x1bOD");
    }
}
