//! Errors raised while building or reading back MIME content.

use std::string::FromUtf8Error;

/// Result alias used throughout `hermes-mime`.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a header, address, content type or body could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header name or value that cannot be written to the wire.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Unparseable `type/subtype` or parameter list.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Mailbox or address list that does not parse.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed quoted-printable or encoded-word input.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Bad base64 payload.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Decoded bytes were not UTF-8.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),
}
