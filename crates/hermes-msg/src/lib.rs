//! # hermes-msg
//!
//! Pluggable outbound message clients. A [`MessageClient`] is initialized
//! once from a string-keyed [`ConfigMap`] into an immutable session, then
//! makes one best-effort delivery attempt per [`send`](MessageClient::send).
//!
//! [`SmtpEmailClient`] is the SMTP variant: it renders an [`EmailMessage`]
//! (plain or HTML body, To/Cc/Bcc lists, binary attachments) as a MIME
//! message and submits it to the configured relay.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hermes_msg::{ByteArrayAttachment, ConfigMap, EmailMessage, MessageClient, SmtpEmailClient};
//!
//! let config = ConfigMap::new()
//!     .with("mail.smtp.host", "smtp.example.com")
//!     .with("mail.smtp.port", "587")
//!     .with("mail.smtp.starttls.enable", "true")
//!     .with("mail.smtp.auth", "true")
//!     .with("mail.smtp.user", "reports@example.com")
//!     .with("mail.extra.secret", "app-password")
//!     .with("mail.extra.displayname", "Nightly Reports");
//!
//! let client = SmtpEmailClient;
//! let session = client.initialize(&config);
//!
//! let message = EmailMessage::new("Nightly report", "See attached.")
//!     .to("ops@example.com, lead@example.com")
//!     .attach(ByteArrayAttachment::new("report.csv", "text/csv", b"a,b\n1,2\n".to_vec()));
//!
//! // Failures are logged, never returned.
//! client.send(&session, &message);
//! ```
//!
//! ## Failure handling
//!
//! Each send step is isolated. A bad attachment, an unparsable recipient
//! list or a relay error is logged through `tracing` with its step tag
//! (see [`smtp::Stage`]) and the rest of the send carries on. The returned
//! [`MessageResult`] is the same on every path; use [`smtp::attempt`] to
//! get the failures back.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
mod client;
pub mod config;
mod error;
mod message;
pub mod session;
pub mod smtp;

pub use auth::{Authenticator, Credentials, StaticAuthenticator};
pub use client::MessageClient;
pub use config::ConfigMap;
pub use error::{Error, Result};
pub use message::{ByteArrayAttachment, EmailMessage, MessageResult};
pub use session::{SmtpSession, TransportParams};
pub use smtp::SmtpEmailClient;
