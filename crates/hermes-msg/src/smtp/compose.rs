//! Turning an [`EmailMessage`] into a MIME message plus SMTP envelope.
//!
//! Every step is isolated: a failing step records a [`Failure`] and leaves
//! its effect out of the message, and composition carries on with the next
//! step.

use hermes_mime::encoding::encode_rfc2047;
use hermes_mime::{ContentType, Mailbox, Message, Multipart, Part, parse_address_list};

use super::failure::{Failure, Stage};
use crate::error::{Error, Result};
use crate::message::{ByteArrayAttachment, EmailMessage};
use crate::session::SmtpSession;

/// Headers that address recipients but are never transmitted.
const HIDDEN_HEADERS: &[&str] = &["Bcc"];

/// SMTP envelope: who the relay is told the message is from and to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// `MAIL FROM` address.
    pub sender: Option<String>,
    /// `RCPT TO` addresses: To, then Cc, then Bcc.
    pub recipients: Vec<String>,
}

/// A composed message, ready to transmit.
#[derive(Debug, Clone)]
pub struct Composition {
    /// The MIME message, Bcc header included.
    pub message: Message,
    /// Envelope addresses.
    pub envelope: Envelope,
    /// Failures caught while composing.
    pub failures: Vec<Failure>,
}

impl Composition {
    /// Renders the wire payload, with the Bcc header stripped.
    #[must_use]
    pub fn payload(&self) -> String {
        self.message.render_without(HIDDEN_HEADERS)
    }
}

/// Composes `email` for delivery through `session`.
#[must_use]
pub fn compose(session: &SmtpSession, email: &EmailMessage) -> Composition {
    let mut message = Message::new();
    let mut failures = Vec::new();

    // From
    let from = match sender_mailbox(session, email) {
        Ok(mailbox) => {
            message.headers.set("From", mailbox.to_string());
            Some(mailbox.address)
        }
        Err(e) => {
            failures.push(Failure::new(Stage::AddFrom, e));
            None
        }
    };

    // Subject
    message.headers.set("Subject", encode_rfc2047(&email.subject));

    // Body
    let body_type = if email.html {
        ContentType::text_html()
    } else {
        ContentType::text_plain()
    };
    if email.attachments.is_empty() {
        message.set_text(email.body.as_str(), &body_type);
    } else {
        let mut multipart = Multipart::mixed();
        multipart.add_part(Part::text(&email.body, &body_type));
        for attachment in &email.attachments {
            match attachment_part(attachment) {
                Ok(part) => multipart.add_part(part),
                Err(e) => failures.push(Failure::new(
                    Stage::ParseAttachment,
                    format!("{}: {e}", attachment.filename),
                )),
            }
        }
        message.set_multipart(multipart);
    }

    // Recipients
    let mut recipients = Vec::new();
    for (list, header, stage) in [
        (&email.to, "To", Stage::AddTo),
        (&email.cc, "Cc", Stage::AddCc),
        (&email.bcc, "Bcc", Stage::AddBcc),
    ] {
        let Some(list) = list else { continue };
        match parse_address_list(list) {
            Ok(mailboxes) if mailboxes.is_empty() => {}
            Ok(mailboxes) => {
                let rendered: Vec<String> = mailboxes.iter().map(ToString::to_string).collect();
                message.headers.add(header, rendered.join(", "));
                recipients.extend(mailboxes.into_iter().map(|mailbox| mailbox.address));
            }
            Err(e) => failures.push(Failure::new(stage, e)),
        }
    }

    let sender = session
        .params()
        .envelope_from()
        .map(str::to_string)
        .or(from);

    let domain = sender
        .as_deref()
        .and_then(|address| address.rsplit_once('@'))
        .map_or_else(|| session.params().local_host(), |(_, domain)| domain);
    message.stamp(domain);

    Composition {
        message,
        envelope: Envelope { sender, recipients },
        failures,
    }
}

/// From mailbox: the message override or the session default, named with
/// the configured display name or else the address itself.
fn sender_mailbox(session: &SmtpSession, email: &EmailMessage) -> Result<Mailbox> {
    let address = email
        .from
        .as_deref()
        .or_else(|| session.default_from())
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .ok_or(Error::NoSender)?;
    let name = session.display_name().unwrap_or(address);
    Ok(Mailbox::with_name(name, address)?)
}

fn attachment_part(attachment: &ByteArrayAttachment) -> Result<Part> {
    let content_type = ContentType::parse(&attachment.content_type)?;
    Ok(Part::attachment(
        &attachment.filename,
        content_type,
        attachment.data.clone(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::config::ConfigMap;
    use crate::session::initialize;
    use hermes_mime::Body;

    fn session(pairs: &[(&str, &str)]) -> SmtpSession {
        initialize(&pairs.iter().copied().collect::<ConfigMap>())
    }

    fn default_session() -> SmtpSession {
        session(&[("mail.smtp.user", "sender@example.com")])
    }

    fn attachment(name: &str, content_type: &str, data: &[u8]) -> ByteArrayAttachment {
        ByteArrayAttachment::new(name, content_type, data.to_vec())
    }

    #[test]
    fn single_part_content_types() {
        let plain = compose(&default_session(), &EmailMessage::new("s", "hello"));
        assert_eq!(
            plain.message.headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(plain.message.body().as_text(), Some("hello"));

        let html = compose(
            &default_session(),
            &EmailMessage::new("s", "<b>hi</b>").html(true),
        );
        assert_eq!(
            html.message.headers.get("Content-Type"),
            Some("text/html; charset=utf-8")
        );
        assert!(html.payload().contains("\r\n\r\n<b>hi</b>"));
    }

    #[test]
    fn attachments_make_n_plus_one_parts_in_order() {
        let email = EmailMessage::new("report", "see attached")
            .attach(attachment("a.pdf", "application/pdf", &[0, 1, 2, 255]))
            .attach(attachment("b.png", "image/png", b"\x89PNG"))
            .attach(attachment("c.txt", "text/plain", b"plain text"));
        let composition = compose(&default_session(), &email);
        assert!(composition.failures.is_empty());

        let multipart = composition.message.body().as_multipart().unwrap();
        assert_eq!(multipart.len(), 4);
        assert_eq!(
            composition.message.content_type().unwrap().mime_type(),
            "multipart/mixed"
        );

        let body = &multipart.parts()[0];
        assert_eq!(body.content_type().unwrap().mime_type(), "text/plain");
        assert_eq!(body.data(), b"see attached");
        assert_eq!(body.filename(), None);

        let expected = [
            ("a.pdf", "application/pdf", &[0u8, 1, 2, 255][..]),
            ("b.png", "image/png", &b"\x89PNG"[..]),
            ("c.txt", "text/plain", &b"plain text"[..]),
        ];
        for (part, (name, mime, data)) in multipart.parts()[1..].iter().zip(expected) {
            assert_eq!(part.filename(), Some(name));
            let content_type = part.content_type().unwrap();
            assert_eq!(content_type.mime_type(), mime);
            assert_eq!(content_type.parameter("name"), Some(name));
            assert_eq!(part.data(), data);
        }
    }

    #[test]
    fn html_body_part_in_multipart() {
        let email = EmailMessage::new("s", "<p>x</p>")
            .html(true)
            .attach(attachment("a.bin", "application/octet-stream", b"x"));
        let composition = compose(&default_session(), &email);
        let multipart = composition.message.body().as_multipart().unwrap();
        assert_eq!(
            multipart.parts()[0].headers.get("Content-Type"),
            Some("text/html; charset=utf-8")
        );
    }

    #[test]
    fn invalid_attachment_is_skipped() {
        let email = EmailMessage::new("s", "body")
            .attach(attachment("0.txt", "text/plain", b"0"))
            .attach(attachment("1.txt", "text/plain", b"1"))
            .attach(attachment("2.txt", "not a content type", b"2"))
            .attach(attachment("3.txt", "text/plain", b"3"))
            .attach(attachment("4.txt", "text/plain", b"4"));
        let composition = compose(&default_session(), &email);

        let multipart = composition.message.body().as_multipart().unwrap();
        let names: Vec<_> = multipart.parts().iter().map(|p| p.filename()).collect();
        assert_eq!(
            names,
            vec![None, Some("0.txt"), Some("1.txt"), Some("3.txt"), Some("4.txt")]
        );

        assert_eq!(composition.failures.len(), 1);
        assert_eq!(composition.failures[0].stage, Stage::ParseAttachment);
        assert!(composition.failures[0].detail.starts_with("2.txt: "));
    }

    #[test]
    fn to_list_only() {
        let composition = compose(
            &default_session(),
            &EmailMessage::new("s", "b").to("a@x.com,b@x.com"),
        );
        let headers = &composition.message.headers;
        assert_eq!(headers.get_all("To"), vec!["a@x.com, b@x.com"]);
        assert!(headers.get_all("Cc").is_empty());
        assert!(headers.get_all("Bcc").is_empty());
        assert_eq!(composition.envelope.recipients, vec!["a@x.com", "b@x.com"]);
        assert!(composition.failures.is_empty());
    }

    #[test]
    fn named_and_quoted_recipients() {
        let composition = compose(
            &default_session(),
            &EmailMessage::new("s", "b").cc(r#""Doe, Jane" <jane@x.com>, Bob <bob@x.com>, "#),
        );
        assert_eq!(
            composition.message.headers.get("Cc"),
            Some(r#""Doe, Jane" <jane@x.com>, Bob <bob@x.com>"#)
        );
        assert_eq!(composition.envelope.recipients, vec!["jane@x.com", "bob@x.com"]);
    }

    #[test]
    fn bad_recipient_list_drops_only_its_category() {
        let composition = compose(
            &default_session(),
            &EmailMessage::new("s", "b")
                .to("a@x.com")
                .cc("broken <no-at-sign>")
                .bcc("hidden@x.com"),
        );
        assert_eq!(composition.failures.len(), 1);
        assert_eq!(composition.failures[0].stage, Stage::AddCc);
        assert_eq!(composition.message.headers.get("To"), Some("a@x.com"));
        assert_eq!(composition.message.headers.get("Cc"), None);
        assert_eq!(
            composition.envelope.recipients,
            vec!["a@x.com", "hidden@x.com"]
        );
    }

    #[test]
    fn bcc_is_enveloped_but_not_transmitted() {
        let composition = compose(
            &default_session(),
            &EmailMessage::new("s", "b").to("a@x.com").bcc("secret@x.com"),
        );
        assert_eq!(composition.message.headers.get("Bcc"), Some("secret@x.com"));
        let payload = composition.payload();
        assert!(!payload.contains("Bcc:"));
        assert!(!payload.contains("secret@x.com"));
        assert_eq!(composition.envelope.recipients, vec!["a@x.com", "secret@x.com"]);
    }

    #[test]
    fn from_override_beats_session_default() {
        let session = session(&[
            ("mail.smtp.user", "default@example.com"),
            ("mail.extra.displayname", "Ops Team"),
        ]);
        let composition = compose(
            &session,
            &EmailMessage::new("s", "b").from("override@example.com"),
        );
        assert_eq!(
            composition.message.headers.get("From"),
            Some("Ops Team <override@example.com>")
        );
        assert_eq!(
            composition.envelope.sender.as_deref(),
            Some("override@example.com")
        );
    }

    #[test]
    fn display_name_falls_back_to_address() {
        let composition = compose(&default_session(), &EmailMessage::new("s", "b"));
        assert_eq!(
            composition.message.headers.get("From"),
            Some("\"sender@example.com\" <sender@example.com>")
        );
    }

    #[test]
    fn missing_sender_is_recorded_and_composition_continues() {
        let composition = compose(
            &session(&[]),
            &EmailMessage::new("s", "b").to("a@x.com"),
        );
        assert_eq!(composition.failures.len(), 1);
        assert_eq!(composition.failures[0].stage, Stage::AddFrom);
        assert_eq!(composition.message.headers.get("From"), None);
        assert_eq!(composition.message.headers.get("To"), Some("a@x.com"));
        assert_eq!(composition.envelope.sender, None);
    }

    #[test]
    fn invalid_from_is_recorded() {
        let composition = compose(
            &default_session(),
            &EmailMessage::new("s", "b").from("not-an-address"),
        );
        assert_eq!(composition.failures[0].stage, Stage::AddFrom);
        assert_eq!(composition.message.headers.get("From"), None);
    }

    #[test]
    fn envelope_sender_parameter_wins() {
        let session = session(&[
            ("mail.smtp.user", "user@example.com"),
            ("mail.smtp.from", "bounces@example.com"),
        ]);
        let composition = compose(&session, &EmailMessage::new("s", "b").from("me@example.com"));
        assert_eq!(
            composition.envelope.sender.as_deref(),
            Some("bounces@example.com")
        );
        assert!(
            composition
                .message
                .headers
                .get("From")
                .unwrap()
                .ends_with("<me@example.com>")
        );
    }

    #[test]
    fn subject_passes_through_or_is_encoded() {
        let ascii = compose(&default_session(), &EmailMessage::new("Re: [ops] <42>", "b"));
        assert_eq!(ascii.message.headers.get("Subject"), Some("Re: [ops] <42>"));

        let unicode = compose(&default_session(), &EmailMessage::new("Grüße", "b"));
        assert_eq!(
            unicode.message.headers.get("Subject"),
            Some("=?utf-8?B?R3LDvMOfZQ==?=")
        );
    }

    #[test]
    fn rendered_headers_are_stamped() {
        let composition = compose(&default_session(), &EmailMessage::new("s", "b"));
        let headers = &composition.message.headers;
        assert_eq!(headers.get("MIME-Version"), Some("1.0"));
        assert!(headers.contains("Date"));
        assert!(headers.get("Message-ID").unwrap().ends_with("@example.com>"));
    }

    #[test]
    fn empty_body_is_still_single_part() {
        let composition = compose(&default_session(), &EmailMessage::new("s", ""));
        assert!(matches!(composition.message.body(), Body::Text { .. }));
    }
}
