//! Incremental UTF-8 scalar decoding for the extractor.

pub(crate) enum Utf8 {
    /// A complete scalar of the given encoded length.
    Scalar(char, usize),
    /// A valid prefix of a longer sequence; wait for more bytes.
    Incomplete,
    /// Not valid UTF-8 at this position.
    Invalid,
}

/// Decode one UTF-8 scalar from the front of `buf`.
pub(crate) fn decode(buf: &[u8]) -> Utf8 {
    let b0 = buf[0];
    if b0 < 0x80 {
        return Utf8::Scalar(b0 as char, 1);
    }
    let len = if b0 & 0xE0 == 0xC0 {
        2
    } else if b0 & 0xF0 == 0xE0 {
        3
    } else if b0 & 0xF8 == 0xF0 {
        4
    } else {
        // Continuation byte or invalid start byte.
        return Utf8::Invalid;
    };
    if buf.len() < len {
        if buf[1..].iter().all(|b| b & 0xC0 == 0x80) {
            return Utf8::Incomplete;
        }
        return Utf8::Invalid;
    }
    match std::str::from_utf8(&buf[..len]) {
        Ok(s) => match s.chars().next() {
            Some(ch) => Utf8::Scalar(ch, len),
            None => Utf8::Invalid,
        },
        // Overlong encodings, surrogates and the like.
        Err(_) => Utf8::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii() {
        assert!(matches!(decode(b"a"), Utf8::Scalar('a', 1)));
    }

    #[test]
    fn multi_byte() {
        assert!(matches!(decode("é".as_bytes()), Utf8::Scalar('é', 2)));
        assert!(matches!(decode("あ".as_bytes()), Utf8::Scalar('あ', 3)));
        assert!(matches!(decode("🦀x".as_bytes()), Utf8::Scalar('🦀', 4)));
    }

    #[test]
    fn incomplete_prefix() {
        let bytes = "🦀".as_bytes();
        assert!(matches!(decode(&bytes[..1]), Utf8::Incomplete));
        assert!(matches!(decode(&bytes[..3]), Utf8::Incomplete));
    }

    #[test]
    fn invalid_bytes() {
        assert!(matches!(decode(&[0x80]), Utf8::Invalid));
        assert!(matches!(decode(&[0xC3, 0x28]), Utf8::Invalid));
        // Overlong encoding of '/'.
        assert!(matches!(decode(&[0xC0, 0xAF]), Utf8::Invalid));
    }
}
