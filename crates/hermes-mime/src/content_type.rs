//! MIME content type handling.

use crate::error::{Error, Result};
use std::fmt;

/// Characters that may not appear in an RFC 2045 token.
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

/// Returns true if `s` is a non-empty RFC 2045 token.
pub(crate) fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_graphic() && !TSPECIALS.as_bytes().contains(&b))
}

/// MIME content type with parameters.
///
/// Parameters keep their insertion order so rendered headers are stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    parameters: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a new content type without parameters.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: Vec::new(),
        }
    }

    /// Creates a `text/plain; charset=utf-8` content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "utf-8")
    }

    /// Creates a `text/html; charset=utf-8` content type.
    #[must_use]
    pub fn text_html() -> Self {
        Self::new("text", "html").with_parameter("charset", "utf-8")
    }

    /// Creates a multipart/mixed content type with boundary.
    #[must_use]
    pub fn multipart_mixed(boundary: impl Into<String>) -> Self {
        Self::new("multipart", "mixed").with_parameter("boundary", boundary)
    }

    /// Sets a parameter, replacing an existing one with the same name.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into().to_ascii_lowercase();
        let value = value.into();
        match self.parameters.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.parameters.push((key, value)),
        }
        self
    }

    /// Returns a parameter value by (case-insensitive) name.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns all parameters in order.
    #[must_use]
    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// Returns `type/subtype` without parameters.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("text")
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="quoted value"`.
    /// Type, subtype and parameter names must be RFC 2045 tokens; values
    /// are tokens or quoted strings. Empty segments (`text/plain;`) are
    /// tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContentType`] if the string is malformed.
    pub fn parse(s: &str) -> Result<Self> {
        let segments = split_parameters(s)?;
        let mut segments = segments.into_iter();

        let type_str = segments.next().unwrap_or_default();
        let (main_type, sub_type) = type_str
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("missing subtype in {s:?}")))?;
        let (main_type, sub_type) = (main_type.trim(), sub_type.trim());

        if !is_token(main_type) || !is_token(sub_type) {
            return Err(Error::InvalidContentType(format!(
                "invalid type/subtype in {s:?}"
            )));
        }

        let mut content_type = Self::new(
            main_type.to_ascii_lowercase(),
            sub_type.to_ascii_lowercase(),
        );

        for segment in segments {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let (key, value) = segment.split_once('=').ok_or_else(|| {
                Error::InvalidContentType(format!("parameter without value: {segment:?}"))
            })?;
            let key = key.trim();
            if !is_token(key) {
                return Err(Error::InvalidContentType(format!(
                    "invalid parameter name: {key:?}"
                )));
            }

            let value = parse_parameter_value(value.trim())?;
            content_type = content_type.with_parameter(key, value);
        }

        Ok(content_type)
    }
}

/// Splits on `;` outside of quoted strings.
fn split_parameters(s: &str) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                current.push(ch);
                in_quotes = !in_quotes;
            }
            ';' if !in_quotes => segments.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }

    if in_quotes {
        return Err(Error::InvalidContentType(format!(
            "unterminated quoted string in {s:?}"
        )));
    }
    segments.push(current);
    Ok(segments)
}

/// Parses a token or quoted-string parameter value.
fn parse_parameter_value(raw: &str) -> Result<String> {
    if let Some(inner) = raw.strip_prefix('"') {
        let inner = inner.strip_suffix('"').ok_or_else(|| {
            Error::InvalidContentType(format!("unterminated quoted value: {raw:?}"))
        })?;
        let mut value = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                if let Some(next) = chars.next() {
                    value.push(next);
                }
            } else {
                value.push(ch);
            }
        }
        return Ok(value);
    }

    if is_token(raw) {
        Ok(raw.to_string())
    } else {
        Err(Error::InvalidContentType(format!(
            "invalid parameter value: {raw:?}"
        )))
    }
}

/// Formats `; key=value`, quoting the value when it is not a token.
pub(crate) fn format_parameter(key: &str, value: &str) -> String {
    if is_token(value) {
        format!("; {key}={value}")
    } else {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("; {key}=\"{escaped}\"")
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        for (key, value) in &self.parameters {
            f.write_str(&format_parameter(key, value))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parameter_quotes_only_non_tokens() {
        assert_eq!(format_parameter("filename", "report.csv"), "; filename=report.csv");
        assert_eq!(
            format_parameter("filename", "my \"q\\4\".pdf"),
            "; filename=\"my \\\"q\\\\4\\\".pdf\""
        );
    }

    #[test]
    fn test_text_plain_renders_exactly() {
        assert_eq!(ContentType::text_plain().to_string(), "text/plain; charset=utf-8");
        assert_eq!(ContentType::text_html().to_string(), "text/html; charset=utf-8");
    }

    #[test]
    fn test_multipart_mixed() {
        let ct = ContentType::multipart_mixed("boundary123");
        assert_eq!(ct.mime_type(), "multipart/mixed");
        assert_eq!(ct.boundary(), Some("boundary123"));
        assert!(ct.is_multipart());
        assert!(!ct.is_text());
    }

    #[test]
    fn test_parse_with_parameters() {
        let ct = ContentType::parse("Text/Plain; Charset=utf-8; format=flowed").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.charset(), Some("utf-8"));
        assert_eq!(ct.parameter("FORMAT"), Some("flowed"));
    }

    #[test]
    fn test_parse_quoted_value_with_semicolon() {
        let ct = ContentType::parse("application/pdf; name=\"q3; final.pdf\"").unwrap();
        assert_eq!(ct.parameter("name"), Some("q3; final.pdf"));
    }

    #[test]
    fn test_parse_trailing_semicolon() {
        let ct = ContentType::parse("image/png;").unwrap();
        assert_eq!(ct.mime_type(), "image/png");
        assert!(ct.parameters().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "application",
            "/pdf",
            "image/",
            "image/png; name",
            "image png/x",
            "text/plain; charset=\"utf-8",
            "text/plain; =utf-8",
            "text/plain; charset=a b",
        ] {
            assert!(ContentType::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_with_parameter_replaces() {
        let ct = ContentType::new("text", "plain")
            .with_parameter("charset", "iso-8859-1")
            .with_parameter("Charset", "utf-8");
        assert_eq!(ct.parameters().len(), 1);
        assert_eq!(ct.charset(), Some("utf-8"));
    }

    #[test]
    fn test_display_quotes_non_tokens() {
        let ct = ContentType::new("application", "pdf").with_parameter("name", "my \"q3\".pdf");
        assert_eq!(
            ct.to_string(),
            "application/pdf; name=\"my \\\"q3\\\".pdf\""
        );
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let ct = ContentType::parse("application/octet-stream; name=\"a b.bin\"").unwrap();
        assert_eq!(ContentType::parse(&ct.to_string()).unwrap(), ct);
    }
}
