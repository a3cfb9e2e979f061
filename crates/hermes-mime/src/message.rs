//! MIME message structure and rendering.

use crate::content_type::{ContentType, format_parameter};
use crate::encoding::{encode_base64_lines, encode_quoted_printable, encode_rfc2047, needs_encoding};
use crate::error::Result;
use crate::header::Headers;
use std::fmt;

/// Longest line RFC 5322 allows before a 7bit body must be re-encoded.
const MAX_SEVEN_BIT_LINE: usize = 998;

/// Transfer encoding types used for generated bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII, sent as is with CRLF line endings.
    SevenBit,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Base64 encoding.
    Base64,
}

impl TransferEncoding {
    /// Picks the encoding for a text body: `7bit` for short-lined ASCII,
    /// otherwise `quoted-printable`.
    #[must_use]
    pub fn for_text(text: &str) -> Self {
        let seven_bit = text.is_ascii()
            && !text.contains('\0')
            && text
                .split('\n')
                .all(|line| line.len() <= MAX_SEVEN_BIT_LINE && !line.trim_end_matches('\r').contains('\r'));
        if seven_bit {
            Self::SevenBit
        } else {
            Self::QuotedPrintable
        }
    }

    /// Encodes raw content for transfer.
    #[must_use]
    pub fn encode(self, data: &[u8]) -> String {
        match self {
            Self::SevenBit => String::from_utf8_lossy(data)
                .split('\n')
                .map(|line| line.strip_suffix('\r').unwrap_or(line))
                .collect::<Vec<_>>()
                .join("\r\n"),
            Self::QuotedPrintable => encode_quoted_printable(&String::from_utf8_lossy(data)),
            Self::Base64 => encode_base64_lines(data),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Base64 => write!(f, "base64"),
        }
    }
}

/// One body part of a multipart message.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    data: Vec<u8>,
    filename: Option<String>,
    encoding: TransferEncoding,
}

impl Part {
    /// Creates an inline text part.
    #[must_use]
    pub fn text(text: &str, content_type: &ContentType) -> Self {
        let encoding = TransferEncoding::for_text(text);
        let mut headers = Headers::new();
        headers.set("Content-Type", content_type.to_string());
        headers.set("Content-Transfer-Encoding", encoding.to_string());
        Self {
            headers,
            data: text.as_bytes().to_vec(),
            filename: None,
            encoding,
        }
    }

    /// Creates a base64 attachment part carrying `filename` in both the
    /// `name` content-type parameter and the `Content-Disposition`.
    #[must_use]
    pub fn attachment(filename: &str, content_type: ContentType, data: Vec<u8>) -> Self {
        let wire_name = if needs_encoding(filename) {
            encode_rfc2047(filename)
        } else {
            filename.to_string()
        };

        let content_type = content_type.with_parameter("name", wire_name.clone());
        let disposition = format!("attachment{}", format_parameter("filename", &wire_name));

        let mut headers = Headers::new();
        headers.set("Content-Type", content_type.to_string());
        headers.set("Content-Disposition", disposition);
        headers.set("Content-Transfer-Encoding", TransferEncoding::Base64.to_string());

        Self {
            headers,
            data,
            filename: Some(filename.to_string()),
            encoding: TransferEncoding::Base64,
        }
    }

    /// Parses the part's `Content-Type` header (defaults to text/plain).
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Returns the attachment filename, if this is an attachment part.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Returns the raw (unencoded) content.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the transfer encoding used on the wire.
    #[must_use]
    pub const fn transfer_encoding(&self) -> TransferEncoding {
        self.encoding
    }

    fn write_to(&self, out: &mut String) {
        self.headers.write_to(out, &[]);
        out.push_str("\r\n");
        out.push_str(&self.encoding.encode(&self.data));
    }
}

/// A `multipart/mixed` container with ordered parts.
#[derive(Debug, Clone)]
pub struct Multipart {
    content_type: ContentType,
    parts: Vec<Part>,
}

impl Multipart {
    /// Creates an empty `multipart/mixed` container with a random boundary.
    #[must_use]
    pub fn mixed() -> Self {
        let boundary = format!(
            "----=_Part_{:016x}{:016x}",
            rand::random::<u64>(),
            rand::random::<u64>()
        );
        Self::with_boundary(boundary)
    }

    /// Creates an empty `multipart/mixed` container with a fixed boundary.
    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::multipart_mixed(boundary),
            parts: Vec::new(),
        }
    }

    /// Appends a part.
    pub fn add_part(&mut self, part: Part) {
        self.parts.push(part);
    }

    /// Returns the parts in order.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Returns the number of parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns true if the container has no parts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns the container's content type.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Returns the boundary delimiter.
    #[must_use]
    pub fn boundary(&self) -> &str {
        self.content_type.boundary().unwrap_or_default()
    }

    fn write_to(&self, out: &mut String) {
        let boundary = self.boundary();
        for part in &self.parts {
            out.push_str("--");
            out.push_str(boundary);
            out.push_str("\r\n");
            part.write_to(out);
            out.push_str("\r\n");
        }
        out.push_str("--");
        out.push_str(boundary);
        out.push_str("--\r\n");
    }
}

/// Message body.
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// No content set.
    #[default]
    Empty,
    /// Single-part text body.
    Text {
        /// Body text.
        text: String,
        /// Transfer encoding.
        encoding: TransferEncoding,
    },
    /// Multipart body.
    Multipart(Multipart),
}

impl Body {
    /// Returns the multipart container, if any.
    #[must_use]
    pub const fn as_multipart(&self) -> Option<&Multipart> {
        match self {
            Self::Multipart(multipart) => Some(multipart),
            _ => None,
        }
    }

    /// Returns the single-part text, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// An outbound MIME message.
#[derive(Debug, Clone, Default)]
pub struct Message {
    /// Top-level headers.
    pub headers: Headers,
    body: Body,
}

impl Message {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a single-part text body and its `Content-Type`.
    pub fn set_text(&mut self, text: impl Into<String>, content_type: &ContentType) {
        let text = text.into();
        let encoding = TransferEncoding::for_text(&text);
        self.headers.set("Content-Type", content_type.to_string());
        self.headers
            .set("Content-Transfer-Encoding", encoding.to_string());
        self.body = Body::Text { text, encoding };
    }

    /// Sets a multipart body and its `Content-Type`.
    pub fn set_multipart(&mut self, multipart: Multipart) {
        self.headers
            .set("Content-Type", multipart.content_type().to_string());
        self.headers.remove("Content-Transfer-Encoding");
        self.body = Body::Multipart(multipart);
    }

    /// Returns the body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Parses the top-level `Content-Type` header (defaults to text/plain).
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Adds `MIME-Version`, `Date` and `Message-ID` when missing.
    ///
    /// `domain` is used as the right-hand side of the generated Message-ID.
    pub fn stamp(&mut self, domain: &str) {
        if !self.headers.contains("MIME-Version") {
            self.headers.add("MIME-Version", "1.0");
        }
        if !self.headers.contains("Date") {
            self.headers
                .add("Date", chrono::Local::now().to_rfc2822());
        }
        if !self.headers.contains("Message-ID") {
            let id = format!(
                "<{:016x}.{}@{domain}>",
                rand::random::<u64>(),
                chrono::Utc::now().timestamp_millis()
            );
            self.headers.add("Message-ID", id);
        }
    }

    /// Renders the full message.
    #[must_use]
    pub fn render(&self) -> String {
        self.render_without(&[])
    }

    /// Renders the message, omitting the named headers (e.g. `Bcc`).
    #[must_use]
    pub fn render_without(&self, ignore: &[&str]) -> String {
        let mut out = String::new();
        self.headers.write_to(&mut out, ignore);
        out.push_str("\r\n");
        match &self.body {
            Body::Empty => {}
            Body::Text { text, encoding } => out.push_str(&encoding.encode(text.as_bytes())),
            Body::Multipart(multipart) => multipart.write_to(&mut out),
        }
        out
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
    use crate::encoding::{decode_base64, decode_quoted_printable};

    #[test]
    fn test_transfer_encoding_for_text() {
        assert_eq!(TransferEncoding::for_text("plain ascii\nlines"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::for_text("héllo"), TransferEncoding::QuotedPrintable);
        assert_eq!(
            TransferEncoding::for_text(&"x".repeat(1200)),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::for_text("bare\rcr"), TransferEncoding::QuotedPrintable);
    }

    #[test]
    fn test_single_part_render() {
        let mut message = Message::new();
        message.headers.set("Subject", "Hi");
        message.set_text("line one\nline two", &ContentType::text_plain());

        let rendered = message.render();
        assert_eq!(
            rendered,
            concat!(
                "Subject: Hi\r\n",
                "Content-Type: text/plain; charset=utf-8\r\n",
                "Content-Transfer-Encoding: 7bit\r\n",
                "\r\n",
                "line one\r\nline two"
            )
        );
        assert_eq!(message.body().as_text(), Some("line one\nline two"));
        assert!(message.body().as_multipart().is_none());
    }

    #[test]
    fn test_non_ascii_body_is_quoted_printable() {
        let mut message = Message::new();
        message.set_text("<p>héllo</p>", &ContentType::text_html());
        let rendered = message.render();
        assert!(rendered.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        let body = rendered.split("\r\n\r\n").nth(1).unwrap();
        assert_eq!(decode_quoted_printable(body).unwrap(), "<p>héllo</p>");
    }

    #[test]
    fn test_attachment_part_headers() {
        let part = Part::attachment(
            "report q3.pdf",
            ContentType::parse("application/pdf").unwrap(),
            vec![0, 1, 2, 255],
        );
        assert_eq!(
            part.headers.get("Content-Type"),
            Some("application/pdf; name=\"report q3.pdf\"")
        );
        assert_eq!(
            part.headers.get("Content-Disposition"),
            Some("attachment; filename=\"report q3.pdf\"")
        );
        assert_eq!(part.filename(), Some("report q3.pdf"));
        assert_eq!(part.data(), &[0, 1, 2, 255]);
        assert_eq!(part.transfer_encoding(), TransferEncoding::Base64);
        assert_eq!(part.content_type().unwrap().mime_type(), "application/pdf");
    }

    #[test]
    fn test_non_ascii_filename_is_encoded() {
        let part = Part::attachment("résumé.txt", ContentType::new("text", "plain"), b"x".to_vec());
        let disposition = part.headers.get("Content-Disposition").unwrap();
        assert!(disposition.contains("=?utf-8?B?"));
        assert_eq!(part.filename(), Some("résumé.txt"));
    }

    #[test]
    fn test_multipart_render_order_and_boundaries() {
        let mut mixed = Multipart::with_boundary("XYZ");
        mixed.add_part(Part::text("body", &ContentType::text_plain()));
        mixed.add_part(Part::attachment(
            "a.bin",
            ContentType::new("application", "octet-stream"),
            b"first".to_vec(),
        ));
        mixed.add_part(Part::attachment(
            "b.bin",
            ContentType::new("application", "octet-stream"),
            b"second".to_vec(),
        ));

        let mut message = Message::new();
        message.set_multipart(mixed);
        assert_eq!(
            message.headers.get("Content-Type"),
            Some("multipart/mixed; boundary=XYZ")
        );

        let rendered = message.render();
        assert!(rendered.ends_with("--XYZ--\r\n"));

        let sections: Vec<&str> = rendered.split("--XYZ").collect();
        // headers, 3 parts, closing "--\r\n"
        assert_eq!(sections.len(), 5);
        assert!(sections[1].contains("text/plain; charset=utf-8"));
        assert!(sections[2].contains("filename=a.bin"));
        assert!(sections[3].contains("filename=b.bin"));

        let payload = sections[3].split("\r\n\r\n").nth(1).unwrap();
        assert_eq!(decode_base64(payload).unwrap(), b"second");
    }

    #[test]
    fn test_random_boundaries_differ() {
        assert_ne!(Multipart::mixed().boundary(), Multipart::mixed().boundary());
    }

    #[test]
    fn test_render_without_bcc() {
        let mut message = Message::new();
        message.headers.add("To", "a@x.com");
        message.headers.add("Bcc", "secret@x.com");
        message.set_text("hi", &ContentType::text_plain());

        assert!(message.render().contains("Bcc: secret@x.com"));
        assert!(!message.render_without(&["Bcc"]).contains("secret@x.com"));
    }

    #[test]
    fn test_stamp_adds_missing_headers_once() {
        let mut message = Message::new();
        message.headers.set("Date", "Mon, 1 Jan 2024 00:00:00 +0000");
        message.stamp("relay.example.com");
        message.stamp("relay.example.com");

        assert_eq!(message.headers.get_all("MIME-Version"), vec!["1.0"]);
        assert_eq!(
            message.headers.get("Date"),
            Some("Mon, 1 Jan 2024 00:00:00 +0000")
        );
        let id = message.headers.get("Message-ID").unwrap();
        assert!(id.starts_with('<') && id.ends_with("@relay.example.com>"));
    }
}
