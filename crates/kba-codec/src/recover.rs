//! Byte recovery for marshalled feed strings.
//!
//! The feed boundary hands each record over as a string holding one code
//! point per original byte (U+0000..=U+00FF), except that an intermediate
//! layer rewrites most bytes in 0x80..=0x9F to their Windows-1252 code
//! points (0x85 -> U+2026 and so on). Field offsets are byte offsets into the
//! original Shift_JIS record, so that rewrite has to be undone before any
//! slicing happens.

use encoding_rs::SHIFT_JIS;

/// Windows-1252 code points for bytes 0x80..=0x9F.
///
/// 0x81, 0x8D, 0x8F, 0x90 and 0x9D have no substitute and pass through as
/// U+0081 etc.
const CP1252_HIGH: [(char, u8); 27] = [
    ('\u{20AC}', 0x80),
    ('\u{201A}', 0x82),
    ('\u{0192}', 0x83),
    ('\u{201E}', 0x84),
    ('\u{2026}', 0x85),
    ('\u{2020}', 0x86),
    ('\u{2021}', 0x87),
    ('\u{02C6}', 0x88),
    ('\u{2030}', 0x89),
    ('\u{0160}', 0x8A),
    ('\u{2039}', 0x8B),
    ('\u{0152}', 0x8C),
    ('\u{017D}', 0x8E),
    ('\u{2018}', 0x91),
    ('\u{2019}', 0x92),
    ('\u{201C}', 0x93),
    ('\u{201D}', 0x94),
    ('\u{2022}', 0x95),
    ('\u{2013}', 0x96),
    ('\u{2014}', 0x97),
    ('\u{02DC}', 0x98),
    ('\u{2122}', 0x99),
    ('\u{0161}', 0x9A),
    ('\u{203A}', 0x9B),
    ('\u{0153}', 0x9C),
    ('\u{017E}', 0x9E),
    ('\u{0178}', 0x9F),
];

/// Stand-in byte for U+FFFD. A digit keeps numeric fields parseable.
const REPLACEMENT_BYTE: u8 = b'0';
/// Last-resort marker for code points with no byte form at all.
const UNMAPPABLE_BYTE: u8 = b'?';

fn substituted_byte(c: char) -> Option<u8> {
    CP1252_HIGH.iter().find(|(cp, _)| *cp == c).map(|(_, b)| *b)
}

fn substitute_for(b: u8) -> Option<char> {
    CP1252_HIGH.iter().find(|(_, byte)| *byte == b).map(|(cp, _)| *cp)
}

fn latin1_byte(c: char) -> Option<u8> {
    u8::try_from(u32::from(c)).ok()
}

/// Reconstruct the original Shift_JIS bytes of a marshalled record string.
///
/// Stages:
/// 1. every code point <= 0xFF: one byte per code point
/// 2. the string carries real text (a code point above 0xFF that is not a
///    Windows-1252 substitute): encode it as Shift_JIS when that is lossless
/// 3. per code point: direct byte, reversed substitute, U+FFFD -> `0`,
///    Shift_JIS bytes, or `?`
pub fn recover_bytes(s: &str) -> Vec<u8> {
    if let Some(bytes) = s.chars().map(latin1_byte).collect::<Option<Vec<u8>>>() {
        return bytes;
    }

    let carries_text = s
        .chars()
        .any(|c| latin1_byte(c).is_none() && substituted_byte(c).is_none());
    if carries_text {
        let (encoded, _, had_errors) = SHIFT_JIS.encode(s);
        if !had_errors {
            return encoded.into_owned();
        }
    }

    let mut out = Vec::with_capacity(s.len());
    let mut buf = [0u8; 4];
    for c in s.chars() {
        if let Some(b) = latin1_byte(c) {
            out.push(b);
        } else if let Some(b) = substituted_byte(c) {
            out.push(b);
        } else if c == char::REPLACEMENT_CHARACTER {
            out.push(REPLACEMENT_BYTE);
        } else {
            let (encoded, _, had_errors) = SHIFT_JIS.encode(c.encode_utf8(&mut buf));
            if had_errors {
                out.push(UNMAPPABLE_BYTE);
            } else {
                out.extend_from_slice(&encoded);
            }
        }
    }
    out
}

/// Produce the string the feed boundary would hand over for `bytes`.
///
/// Inverse of [`recover_bytes`]; used by the directory replay client and by
/// tests that simulate the marshalling layer.
pub fn marshal(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| substitute_for(b).unwrap_or(char::from(b)))
        .collect()
}

/// Decode a Shift_JIS byte slice, replacing malformed sequences with U+FFFD.
pub fn decode_sjis_lossy(bytes: &[u8]) -> String {
    let (text, _, _) = SHIFT_JIS.decode(bytes);
    text.into_owned()
}

/// Encode text as Shift_JIS, replacing unmappable characters with `?`.
pub fn encode_sjis(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    let mut buf = [0u8; 4];
    for c in text.chars() {
        let (encoded, _, had_errors) = SHIFT_JIS.encode(c.encode_utf8(&mut buf));
        if had_errors {
            out.push(UNMAPPABLE_BYTE);
        } else {
            out.extend_from_slice(&encoded);
        }
    }
    out
}
