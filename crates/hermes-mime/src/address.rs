//! RFC 5322 mailboxes and address lists.

use crate::encoding::{decode_rfc2047, encode_rfc2047, needs_encoding};
use crate::error::{Error, Result};
use std::fmt;

/// Characters that force a display name to be quoted.
const NAME_SPECIALS: &str = "()<>[]:;@\\,.\"";

/// A mailbox: optional display name plus an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox {
    /// Display name (decoded, unquoted).
    pub name: Option<String>,
    /// Address in `local@domain` form.
    pub address: String,
}

impl Mailbox {
    /// Creates a mailbox with just an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        validate_address(&address)?;
        Ok(Self {
            name: None,
            address,
        })
    }

    /// Creates a mailbox with a display name and address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        let mut mailbox = Self::new(address)?;
        mailbox.name = Some(name.into());
        Ok(mailbox)
    }

    /// Parses a single mailbox: `addr`, `<addr>`, `Name <addr>` or
    /// `"Quoted Name" <addr>`. Encoded-word names are decoded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the input is malformed.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidAddress("empty mailbox".into()));
        }

        let Some(open) = find_unquoted(input, '<') else {
            return Self::new(input);
        };

        let rest = &input[open + 1..];
        let address = rest
            .strip_suffix('>')
            .ok_or_else(|| Error::InvalidAddress(format!("unterminated angle address: {input}")))?
            .trim();
        if address.contains(['<', '>']) {
            return Err(Error::InvalidAddress(format!("nested angle brackets: {input}")));
        }

        let name = parse_display_name(input[..open].trim())?;
        let mut mailbox = Self::new(address)?;
        mailbox.name = name;
        Ok(mailbox)
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) if needs_encoding(name) => {
                write!(f, "{} <{}>", encode_rfc2047(name), self.address)
            }
            Some(name) if name.contains(|c: char| NAME_SPECIALS.contains(c)) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{escaped}\" <{}>", self.address)
            }
            Some(name) if !name.is_empty() => write!(f, "{name} <{}>", self.address),
            _ => f.write_str(&self.address),
        }
    }
}

/// Parses a comma-separated address list.
///
/// Commas inside quoted names or angle brackets do not split entries;
/// empty entries are skipped, so an empty or blank input yields an empty
/// list. Any malformed entry fails the whole list.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] if any entry is malformed.
pub fn parse_address_list(input: &str) -> Result<Vec<Mailbox>> {
    split_list(input)?
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(Mailbox::parse)
        .collect()
}

/// Splits on commas that are outside quoted strings and angle brackets.
fn split_list(input: &str) -> Result<Vec<&str>> {
    let mut entries = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut in_angle = false;

    for (index, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => {
                if in_angle {
                    return Err(Error::InvalidAddress(format!("nested '<' in {input:?}")));
                }
                in_angle = true;
            }
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                entries.push(&input[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }

    if in_quotes {
        return Err(Error::InvalidAddress(format!("unterminated quote in {input:?}")));
    }
    if in_angle {
        return Err(Error::InvalidAddress(format!("unterminated '<' in {input:?}")));
    }
    entries.push(&input[start..]);
    Ok(entries)
}

fn find_unquoted(input: &str, target: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (index, ch) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' && in_quotes {
            escaped = true;
        } else if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == target && !in_quotes {
            return Some(index);
        }
    }
    None
}

fn parse_display_name(raw: &str) -> Result<Option<String>> {
    if raw.is_empty() {
        return Ok(None);
    }

    let name = if let Some(inner) = raw.strip_prefix('"') {
        let inner = inner
            .strip_suffix('"')
            .ok_or_else(|| Error::InvalidAddress(format!("unterminated quoted name: {raw}")))?;
        let mut name = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                if let Some(next) = chars.next() {
                    name.push(next);
                }
            } else {
                name.push(ch);
            }
        }
        name
    } else {
        if raw.contains('"') {
            return Err(Error::InvalidAddress(format!("stray quote in name: {raw}")));
        }
        decode_rfc2047(raw).unwrap_or_else(|_| raw.to_string())
    };

    Ok(Some(name))
}

/// Basic `local@domain` validation.
fn validate_address(address: &str) -> Result<()> {
    if address.is_empty() {
        return Err(Error::InvalidAddress("Address cannot be empty".into()));
    }

    if address
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || "<>()[],;:\\\"".contains(c))
    {
        return Err(Error::InvalidAddress(format!(
            "Address contains illegal characters: {address}"
        )));
    }

    let Some((local, domain)) = address.split_once('@') else {
        return Err(Error::InvalidAddress(format!("Address must contain @: {address}")));
    };

    if local.is_empty() || domain.is_empty() {
        return Err(Error::InvalidAddress(
            "Local and domain parts cannot be empty".into(),
        ));
    }

    if domain.contains('@') {
        return Err(Error::InvalidAddress(format!(
            "Address must have exactly one @: {address}"
        )));
    }

    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(Error::InvalidAddress(format!("Invalid domain: {domain}")));
    }

    Ok(())
}
