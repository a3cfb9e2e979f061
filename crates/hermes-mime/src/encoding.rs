//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header encoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length for Base64 and Quoted-Printable bodies.
const MAX_LINE_LENGTH: usize = 76;

/// Largest UTF-8 chunk per RFC 2047 encoded word (keeps each word under 75 chars).
const ENCODED_WORD_CHUNK: usize = 45;

/// Encodes data as Base64 on a single line.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped at 76 characters with CRLF line breaks.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);
    for (index, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if index > 0 {
            out.push_str("\r\n");
        }
        // Base64 output is ASCII, so every chunk is valid UTF-8.
        out.push_str(&String::from_utf8_lossy(chunk));
    }
    out
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks (`\n` or `\r\n`) are kept as hard CRLF breaks. Trailing
/// whitespace on a line is escaped, and long lines get soft breaks.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + text.len() / 8);

    for (line_index, line) in text.split('\n').enumerate() {
        if line_index > 0 {
            result.push_str("\r\n");
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        let bytes = line.as_bytes();
        let mut line_length = 0;

        for (i, &byte) in bytes.iter().enumerate() {
            let is_last = i + 1 == bytes.len();
            let literal = match byte {
                b'!'..=b'<' | b'>'..=b'~' => true,
                b' ' | b'\t' => !is_last,
                _ => false,
            };
            let width = if literal { 1 } else { 3 };

            // Leave room for the trailing '=' of a soft break.
            if line_length + width > MAX_LINE_LENGTH - 1 {
                result.push_str("=\r\n");
                line_length = 0;
            }

            if literal {
                result.push(byte as char);
            } else {
                let _ = write!(result, "={byte:02X}");
            }
            line_length += width;
        }
    }

    result
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error for invalid escape sequences or non-UTF-8 output.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        match bytes.get(i + 1..i + 3) {
            Some(b"\r\n") => i += 3,
            Some([b'\n', _]) => i += 2,
            Some(hex) => {
                let hex = std::str::from_utf8(hex)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
                let byte = u8::from_str_radix(hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex {hex:?}: {e}")))?;
                result.push(byte);
                i += 3;
            }
            None if bytes.get(i + 1) == Some(&b'\n') => i += 2,
            None => {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        }
    }

    String::from_utf8(result).map_err(Into::into)
}

/// Returns true if a header value must be RFC 2047 encoded.
#[must_use]
pub fn needs_encoding(text: &str) -> bool {
    text.contains("=?") || text.chars().any(|c| !c.is_ascii() || (c.is_ascii_control() && c != '\t'))
}

/// Encodes a header value as RFC 2047 `B` encoded words when needed.
///
/// Plain ASCII is returned unchanged. Otherwise the UTF-8 text is split on
/// character boundaries into space-separated `=?utf-8?B?...?=` words.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if !needs_encoding(text) {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk_start = 0;
    let mut chunk_end = 0;
    for (index, ch) in text.char_indices() {
        let next = index + ch.len_utf8();
        if next - chunk_start > ENCODED_WORD_CHUNK {
            words.push(&text[chunk_start..chunk_end]);
            chunk_start = chunk_end;
        }
        chunk_end = next;
    }
    words.push(&text[chunk_start..chunk_end]);

    words
        .iter()
        .map(|word| format!("=?utf-8?B?{}?=", encode_base64(word.as_bytes())))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decodes a header value that may contain RFC 2047 encoded words.
///
/// Whitespace between adjacent encoded words is dropped, as RFC 2047
/// requires.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    if !text.contains("=?") {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut previous_encoded = false;

    for (index, word) in text.split_whitespace().enumerate() {
        let decoded = decode_encoded_word(word)?;
        let is_encoded = decoded.is_some();
        if index > 0 && !(previous_encoded && is_encoded) {
            out.push(' ');
        }
        match decoded {
            Some(text) => out.push_str(&text),
            None => out.push_str(word),
        }
        previous_encoded = is_encoded;
    }

    Ok(out)
}

/// Decodes a single `=?charset?enc?text?=` word, or returns `None` if the
/// input is not an encoded word.
fn decode_encoded_word(word: &str) -> Result<Option<String>> {
    let Some(inner) = word.strip_prefix("=?").and_then(|w| w.strip_suffix("?=")) else {
        return Ok(None);
    };

    let parts: Vec<&str> = inner.splitn(3, '?').collect();
    let [_charset, encoding, encoded_text] = parts.as_slice() else {
        return Err(Error::InvalidEncoding(format!(
            "Invalid RFC 2047 word: {word}"
        )));
    };

    match encoding.to_ascii_uppercase().as_str() {
        "B" => {
            let decoded = decode_base64(encoded_text)?;
            Ok(Some(String::from_utf8(decoded)?))
        }
        "Q" => decode_quoted_printable(&encoded_text.replace('_', " ")).map(Some),
        other => Err(Error::InvalidEncoding(format!(
            "Unknown encoding: {other}"
        ))),
    }
}
