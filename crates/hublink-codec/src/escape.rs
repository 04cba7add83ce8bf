//! Escaping and splitting rules for the wire's two framing levels.
//!
//! Command lines are `|`-delimited; compound value payloads are
//! `#`-delimited. Both levels escape their delimiter with a backslash, so
//! splitting must skip delimiters preceded by one. The replacement order
//! inside [`escape_field`]/[`unescape_field`] is part of the wire contract:
//! backslashes first on encode, last on decode.

/// Escape a field value for embedding in a `|`-delimited line.
///
/// Replaces `\` with `\\`, CRLF with the literal two-character `\r\n`,
/// then `|` with `\|`.
#[must_use]
pub fn escape_field(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace("\r\n", "\\r\\n")
        .replace('|', "\\|")
}

/// Exact inverse of [`escape_field`].
#[must_use]
pub fn unescape_field(s: &str) -> String {
    s.replace("\\|", "|")
        .replace("\\r\\n", "\r\n")
        .replace("\\\\", "\\")
}

/// Escape `#` so an element can be embedded in a compound payload.
#[must_use]
pub fn escape_hashes(s: &str) -> String {
    s.replace('#', "\\#")
}

/// Split on every occurrence of `delim` that is not preceded by a backslash.
///
/// `delim` must be an ASCII delimiter (`b'|'` or `b'#'` on this wire).
#[must_use]
pub fn split_unescaped(input: &str, delim: u8) -> Vec<&str> {
    debug_assert!(delim.is_ascii());

    let bytes = input.as_bytes();
    let mut fields = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == delim && (i == 0 || bytes[i - 1] != b'\\') {
            fields.push(&input[start..i]);
            start = i + 1;
        }
    }
    fields.push(&input[start..]);
    fields
}

/// Split a compound payload on unescaped `#` and un-escape `\#` in every field.
#[must_use]
pub fn split_hash_list(payload: &str) -> Vec<String> {
    split_unescaped(payload, b'#')
        .into_iter()
        .map(|field| field.replace("\\#", "#"))
        .collect()
}
