//! MIME header handling.

use crate::error::{Error, Result};
use std::fmt;

/// Preferred maximum length of a rendered header line (RFC 5322 §2.1.1).
const FOLD_WIDTH: usize = 78;

/// Ordered collection of email headers.
///
/// Names keep the case they were added with; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value, keeping existing values.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Sets a header value, replacing any existing values.
    ///
    /// The header keeps the position of its first occurrence.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(index) => {
                self.entries[index] = (name.clone(), value);
                let mut seen = 0usize;
                self.entries.retain(|(n, _)| {
                    if n.eq_ignore_ascii_case(&name) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets all values for a header, in insertion order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Returns the number of header lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over all headers in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Writes the headers as CRLF-terminated, folded lines, skipping any
    /// header whose name is in `ignore` (case-insensitive).
    pub fn write_to(&self, out: &mut String, ignore: &[&str]) {
        for (name, value) in &self.entries {
            if ignore.iter().any(|i| i.eq_ignore_ascii_case(name)) {
                continue;
            }
            out.push_str(&fold(name, value));
            out.push_str("\r\n");
        }
    }

    /// Parses a header block.
    ///
    /// Parsing stops at the first empty line. Continuation lines (leading
    /// space or tab) are unfolded into the previous header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] for a line that is neither a
    /// continuation nor `Name: value`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                match headers.entries.last_mut() {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(line.trim());
                    }
                    None => {
                        return Err(Error::InvalidHeader(format!(
                            "continuation without header: {line:?}"
                        )));
                    }
                }
                continue;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::InvalidHeader(line.to_string()))?;
            headers.add(name.trim(), value.trim());
        }

        Ok(headers)
    }
}

/// Folds `Name: value` at whitespace so lines stay within [`FOLD_WIDTH`]
/// where possible. Words longer than the width are left intact.
fn fold(name: &str, value: &str) -> String {
    let mut out = String::with_capacity(name.len() + value.len() + 8);
    out.push_str(name);
    out.push(':');
    let mut line_len = out.len();

    for (index, word) in value.split(' ').enumerate() {
        let needed = word.len() + 1;
        if index > 0 && line_len + needed > FOLD_WIDTH {
            out.push_str("\r\n");
            line_len = 0;
        }
        out.push(' ');
        out.push_str(word);
        line_len += needed;
    }

    out
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out, &[]);
        f.write_str(&out)
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
    fn test_headers_add_get_case_insensitive() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert!(headers.contains("CONTENT-TYPE"));
    }

    #[test]
    fn test_headers_set_replaces_in_place() {
        let mut headers = Headers::new();
        headers.add("From", "a@example.com");
        headers.add("To", "alice@example.com");
        headers.add("Subject", "Hi");
        headers.add("to", "bob@example.com");

        headers.set("To", "charlie@example.com");
        let names: Vec<_> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["From", "To", "Subject"]);
        assert_eq!(headers.get_all("to"), vec!["charlie@example.com"]);
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        headers.remove("subject");
        assert!(headers.is_empty());
    }

    #[test]
    fn test_write_to_skips_ignored() {
        let mut headers = Headers::new();
        headers.add("To", "a@example.com");
        headers.add("Bcc", "hidden@example.com");
        let mut out = String::new();
        headers.write_to(&mut out, &["bcc"]);
        assert_eq!(out, "To: a@example.com\r\n");
    }

    #[test]
    fn test_long_header_is_folded() {
        let mut headers = Headers::new();
        let list = (0..10)
            .map(|i| format!("recipient{i}@example.com"))
            .collect::<Vec<_>>()
            .join(", ");
        headers.add("To", list.clone());
        let rendered = headers.to_string();

        for line in rendered.split("\r\n").filter(|l| !l.is_empty()) {
            assert!(line.len() <= FOLD_WIDTH, "line too long: {line:?}");
        }
        let reparsed = Headers::parse(&rendered).unwrap();
        assert_eq!(reparsed.get("To"), Some(list.as_str()));
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "body: not a header\r\n"
        );

        let headers = Headers::parse(text).unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(headers.get("Content-Type"), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_headers_parse_rejects_garbage() {
        assert!(Headers::parse("no colon here\r\n").is_err());
        assert!(Headers::parse(" leading continuation\r\n").is_err());
    }
}
