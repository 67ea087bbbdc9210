//! Text normalization applied to extracted page text before chunking.
//!
//! PDF extraction can produce text that later fails to encode: lone UTF-16
//! surrogates, invalid byte sequences, and stray control characters. A Rust
//! `&str` cannot hold surrogate code points, so they surface either as
//! U+FFFD after lossy decoding or as raw UTF-16 units. The helpers here handle
//! each entry point and all of them are total and idempotent.

/// Strip characters that are unsafe to encode or embed.
///
/// Removes U+FFFD (left behind by lossy decoding of surrogates and invalid
/// sequences) and control characters other than `\t`, `\n` and `\r`.
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(|c| is_kept(*c)).collect()
}

/// Decode raw bytes and normalize the result.
pub fn normalize_bytes(raw: &[u8]) -> String {
    normalize(&String::from_utf8_lossy(raw))
}

/// Decode UTF-16 units, dropping unpaired surrogates, and normalize the result.
pub fn normalize_utf16(units: &[u16]) -> String {
    char::decode_utf16(units.iter().copied())
        .filter_map(|r| r.ok())
        .filter(|c| is_kept(*c))
        .collect()
}

fn is_kept(c: char) -> bool {
    match c {
        char::REPLACEMENT_CHARACTER => false,
        '\t' | '\n' | '\r' => true,
        c => !c.is_control(),
    }
}
