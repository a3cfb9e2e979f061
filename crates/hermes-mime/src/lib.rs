//! # hermes-mime
//!
//! MIME message generation for outbound email.
//!
//! ## Features
//!
//! - **Content types**: strict RFC 2045 parsing with ordered parameters
//! - **Headers**: insertion-ordered, case-insensitive, folded on output
//! - **Addresses**: RFC 5322 mailboxes and comma-separated address lists
//! - **Encoding**: Base64, Quoted-Printable, RFC 2047 encoded words
//! - **Bodies**: single-part text or `multipart/mixed` with binary parts
//!
//! ## Quick Start
//!
//! ```ignore
//! use hermes_mime::{ContentType, Mailbox, Message, Multipart, Part};
//!
//! let mut message = Message::new();
//! message.headers.set("From", Mailbox::with_name("Ops", "ops@example.com")?.to_string());
//! message.headers.set("Subject", "Nightly report");
//!
//! let mut mixed = Multipart::mixed();
//! mixed.add_part(Part::text("See attached.", &ContentType::text_plain()));
//! mixed.add_part(Part::attachment(
//!     "report.csv",
//!     ContentType::parse("text/csv")?,
//!     b"a,b\n1,2\n".to_vec(),
//! ));
//! message.set_multipart(mixed);
//!
//! let wire = message.render();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use address::{Mailbox, parse_address_list};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Body, Message, Multipart, Part, TransferEncoding};
