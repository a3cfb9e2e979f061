//! Error types for message composition and delivery.

use thiserror::Error;

/// Errors raised while composing or transmitting a message.
///
/// None of these reach callers of [`MessageClient::send`](crate::MessageClient::send);
/// they are turned into [`Failure`](crate::smtp::Failure) records and logged.
#[derive(Debug, Error)]
pub enum Error {
    /// MIME construction failed (bad address, content type, ...).
    #[error("MIME error: {0}")]
    Mime(#[from] hermes_mime::Error),

    /// SMTP conversation failed.
    #[error("SMTP error: {0}")]
    Smtp(#[from] hermes_smtp::Error),

    /// I/O error, e.g. while building the delivery runtime.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Neither the message nor the session names a sender.
    #[error("No sender address: the message has no from override and no default is configured")]
    NoSender,

    /// No To, Cc or Bcc recipient survived parsing.
    #[error("No recipients specified")]
    NoRecipients,

    /// The helper thread driving delivery panicked.
    #[error("Delivery thread panicked")]
    DeliveryThread,

    /// Authentication is enabled but the authenticator has no username or secret.
    #[error("Authentication enabled but credentials are incomplete")]
    MissingCredentials,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
