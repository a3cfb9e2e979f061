//! Message entities handed to a [`MessageClient`](crate::MessageClient).

/// An email to send.
///
/// Recipient fields hold comma-separated address lists exactly as the
/// caller supplied them; they are parsed at send time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailMessage {
    /// Sender override; the session default is used when `None`.
    pub from: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Whether `body` is HTML rather than plain text.
    pub html: bool,
    /// To recipients.
    pub to: Option<String>,
    /// CC recipients.
    pub cc: Option<String>,
    /// BCC recipients, delivered to but never shown in the headers.
    pub bcc: Option<String>,
    /// Attachments, in the order they appear in the message.
    pub attachments: Vec<ByteArrayAttachment>,
}

impl EmailMessage {
    /// Creates a plain-text message with no recipients.
    #[must_use]
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Overrides the session's default sender.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets the To list.
    #[must_use]
    pub fn to(mut self, recipients: impl Into<String>) -> Self {
        self.to = Some(recipients.into());
        self
    }

    /// Sets the CC list.
    #[must_use]
    pub fn cc(mut self, recipients: impl Into<String>) -> Self {
        self.cc = Some(recipients.into());
        self
    }

    /// Sets the BCC list.
    #[must_use]
    pub fn bcc(mut self, recipients: impl Into<String>) -> Self {
        self.bcc = Some(recipients.into());
        self
    }

    /// Marks the body as HTML.
    #[must_use]
    pub fn html(mut self, html: bool) -> Self {
        self.html = html;
        self
    }

    /// Appends an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: ByteArrayAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Returns the body's MIME type.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        if self.html { "text/html" } else { "text/plain" }
    }
}

/// A binary attachment held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteArrayAttachment {
    /// File name shown to the recipient.
    pub filename: String,
    /// Declared MIME type, e.g. `application/pdf`. Checked when the
    /// message is composed.
    pub content_type: String,
    /// Raw payload.
    pub data: Vec<u8>,
}

impl ByteArrayAttachment {
    /// Creates an attachment.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// Result of a send.
///
/// Carries no information: it is returned unchanged whether the message
/// was delivered or any step failed. Failures are only visible in the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageResult;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let msg = EmailMessage::new("Hello", "<p>Hi</p>")
            .from("me@x.test")
            .to("a@x.test, b@x.test")
            .cc("c@x.test")
            .bcc("d@x.test")
            .html(true)
            .attach(ByteArrayAttachment::new("a.txt", "text/plain", b"abc".to_vec()));

        assert_eq!(msg.from.as_deref(), Some("me@x.test"));
        assert_eq!(msg.to.as_deref(), Some("a@x.test, b@x.test"));
        assert_eq!(msg.cc.as_deref(), Some("c@x.test"));
        assert_eq!(msg.bcc.as_deref(), Some("d@x.test"));
        assert_eq!(msg.mime_type(), "text/html");
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(msg.attachments[0].data, b"abc");
    }

    #[test]
    fn defaults() {
        let msg = EmailMessage::new("s", "b");
        assert_eq!(msg.from, None);
        assert_eq!(msg.to, None);
        assert!(!msg.html);
        assert_eq!(msg.mime_type(), "text/plain");
        assert!(msg.attachments.is_empty());
    }
}
