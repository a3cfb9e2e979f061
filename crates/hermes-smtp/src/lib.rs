//! # hermes-smtp
//!
//! An async SMTP submission client implementing the parts of RFC 5321 an
//! outbound relay conversation needs.
//!
//! ## Features
//!
//! - **Type-state connection management**: Compile-time enforcement of valid
//!   SMTP state transitions
//! - **Protocol support**: EHLO (with HELO fallback), MAIL FROM, RCPT TO, DATA, AUTH, STARTTLS
//! - **TLS support**: Both implicit TLS (port 465) and STARTTLS
//! - **Authentication**: PLAIN and LOGIN
//! - **Deadlines**: Per-connection connect, read and write timeouts
//!
//! ## Quick Start
//!
//! ```ignore
//! use hermes_smtp::{Address, Client, Timeouts};
//! use hermes_smtp::connection::connect;
//!
//! #[tokio::main]
//! async fn main() -> hermes_smtp::Result<()> {
//!     let stream = connect("smtp.example.com", 587, Timeouts::default()).await?;
//!     let client = Client::from_stream(stream).await?;
//!
//!     let client = client.ehlo("client.example.com").await?;
//!     let client = client.starttls("smtp.example.com").await?;
//!     let client = client.authenticate("user@example.com", "password").await?;
//!
//!     let from = Address::new("sender@example.com")?;
//!     let to = Address::new("recipient@example.com")?;
//!
//!     let client = client.mail_from(from).await?;
//!     let client = client.rcpt_to(to).await?;
//!     let client = client.data().await?;
//!
//!     let message = b"Subject: Test\r\n\r\nHello, World!\r\n";
//!     let client = client.send_message(message).await?;
//!
//!     client.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── authenticate() ───→ Authenticated
//! └──────────────┘                               │
//!        │                                       │
//!        └─── mail_from() ───→ MailTransaction ←─┘
//!                                   │
//!                      rcpt_to() ───→ RecipientAdded ─── data() ───→ Data
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, ServerInfo,
    SmtpConnection, SmtpStream, Timeouts,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
