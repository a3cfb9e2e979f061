//! String-keyed client configuration.
//!
//! A [`ConfigMap`] is consumed once by [`MessageClient::initialize`](crate::MessageClient::initialize).
//! It can be built from key/value pairs, from `.properties` text or from a
//! JSON object of strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Ordered mapping of configuration keys to values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigMap(BTreeMap<String, String>);

impl ConfigMap {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, returning the builder.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts an entry, returning the previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Returns the value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses `.properties` text.
    ///
    /// Each logical line is `key=value`, `key: value` or `key value`. Lines
    /// starting with `#` or `!` are comments, blank lines are skipped and a
    /// trailing backslash continues the line. Later keys override earlier
    /// ones. Parsing never fails; a line with no separator maps its key to
    /// an empty value.
    #[must_use]
    pub fn from_properties(text: &str) -> Self {
        let mut config = Self::new();
        let mut pending = String::new();

        for raw in text.lines() {
            let line = if pending.is_empty() {
                raw.trim()
            } else {
                raw.trim_start()
            };

            if pending.is_empty() && (line.is_empty() || line.starts_with(['#', '!'])) {
                continue;
            }

            if let Some(head) = continued(line) {
                pending.push_str(head);
                continue;
            }

            pending.push_str(line);
            let (key, value) = split_entry(&pending);
            if !key.is_empty() {
                config.insert(key, value);
            }
            pending.clear();
        }

        if !pending.is_empty() {
            let (key, value) = split_entry(&pending);
            if !key.is_empty() {
                config.insert(key, value);
            }
        }

        config
    }

    /// Parses a JSON object whose values are all strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not such an object.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl<K, V> FromIterator<(K, V)> for ConfigMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a ConfigMap {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Returns the line without its continuation backslash, if it has one.
///
/// An even run of trailing backslashes is escaped text, not a continuation.
fn continued(line: &str) -> Option<&str> {
    let trailing = line.bytes().rev().take_while(|&b| b == b'\\').count();
    (trailing % 2 == 1).then(|| &line[..line.len() - 1])
}

fn split_entry(line: &str) -> (&str, &str) {
    let Some(at) = line.find(|c: char| c == '=' || c == ':' || c.is_whitespace()) else {
        return (line, "");
    };

    let key = &line[..at];
    let mut rest = line[at..].trim_start();
    if line[at..].starts_with(char::is_whitespace) || rest.starts_with(['=', ':']) {
        rest = rest.strip_prefix(['=', ':']).unwrap_or(rest);
    }
    (key, rest.trim())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn from_pairs() {
        let config: ConfigMap = [("mail.smtp.host", "relay.test"), ("mail.extra.secret", "s")]
            .into_iter()
            .collect();
        assert_eq!(config.len(), 2);
        assert_eq!(config.get("mail.smtp.host"), Some("relay.test"));
        assert_eq!(config.get("missing"), None);
    }

    #[test]
    fn builder_overrides() {
        let config = ConfigMap::new().with("a", "1").with("a", "2");
        assert_eq!(config.get("a"), Some("2"));
        assert!(!config.is_empty());
    }

    #[test]
    fn properties_separators_and_comments() {
        let text = "\
# comment
! also a comment

mail.smtp.host = relay.example.com
mail.smtp.port:587
mail.smtp.auth true
mail.extra.displayname=Ops Team
mail.smtp.localhost
";
        let config = ConfigMap::from_properties(text);
        assert_eq!(config.get("mail.smtp.host"), Some("relay.example.com"));
        assert_eq!(config.get("mail.smtp.port"), Some("587"));
        assert_eq!(config.get("mail.smtp.auth"), Some("true"));
        assert_eq!(config.get("mail.extra.displayname"), Some("Ops Team"));
        assert_eq!(config.get("mail.smtp.localhost"), Some(""));
        assert_eq!(config.len(), 5);
    }

    #[test]
    fn properties_whitespace_then_separator() {
        let config = ConfigMap::from_properties("key   =  value\nother : x=y");
        assert_eq!(config.get("key"), Some("value"));
        assert_eq!(config.get("other"), Some("x=y"));
    }

    #[test]
    fn properties_line_continuation() {
        let config = ConfigMap::from_properties("list = a,\\\n    b,\\\n    c\nnext=1");
        assert_eq!(config.get("list"), Some("a,b,c"));
        assert_eq!(config.get("next"), Some("1"));
    }

    #[test]
    fn properties_even_backslashes_do_not_continue() {
        let config = ConfigMap::from_properties("path=C:\\\\\nnext=1");
        assert_eq!(config.get("path"), Some("C:\\\\"));
        assert_eq!(config.get("next"), Some("1"));
    }

    #[test]
    fn json_object() {
        let config =
            ConfigMap::from_json(r#"{"mail.smtp.host": "relay.test", "mail.smtp.port": "2525"}"#)
                .unwrap();
        assert_eq!(config.get("mail.smtp.port"), Some("2525"));
        assert!(ConfigMap::from_json(r#"{"mail.smtp.port": 2525}"#).is_err());
        assert!(ConfigMap::from_json("[]").is_err());
    }

    proptest! {
        #[test]
        fn properties_round_trip(
            entries in proptest::collection::btree_map("[a-z][a-z0-9.]{0,20}", "[A-Za-z0-9@.,_-]{0,30}", 0..10)
        ) {
            let text: String = entries
                .iter()
                .map(|(k, v)| format!("{k}={v}\n"))
                .collect();
            let config = ConfigMap::from_properties(&text);
            let expected: ConfigMap = entries.into_iter().collect();
            prop_assert_eq!(config, expected);
        }
    }
}
