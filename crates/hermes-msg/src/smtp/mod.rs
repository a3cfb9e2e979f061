//! SMTP email client.
//!
//! [`send`] is a single linear best-effort pass: compose the message, hand
//! it to the relay, log whatever failed. Failures never reach the caller.

mod compose;
mod failure;
mod transport;

pub use compose::{Composition, Envelope, compose};
pub use failure::{Failure, Stage};
pub use transport::{deliver, transmit};

use crate::client::MessageClient;
use crate::config::ConfigMap;
use crate::message::{EmailMessage, MessageResult};
use crate::session::{SmtpSession, initialize};

/// The SMTP variant of [`MessageClient`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpEmailClient;

impl MessageClient for SmtpEmailClient {
    type Session = SmtpSession;
    type Message = EmailMessage;

    fn initialize(&self, config: &ConfigMap) -> SmtpSession {
        initialize(config)
    }

    fn send(&self, session: &SmtpSession, message: &EmailMessage) -> MessageResult {
        send(session, message)
    }
}

/// Sends one message and logs every failure.
///
/// Returns the same [`MessageResult`] whatever happened; see [`attempt`]
/// for the failures themselves.
pub fn send(session: &SmtpSession, message: &EmailMessage) -> MessageResult {
    attempt(session, message);
    MessageResult::default()
}

/// Sends one message, logs every failure and returns them.
///
/// An empty list means the relay accepted the message and no composition
/// step failed.
pub fn attempt(session: &SmtpSession, message: &EmailMessage) -> Vec<Failure> {
    let mut composition = compose(session, message);
    for failure in &composition.failures {
        failure.log();
    }

    if let Err(e) = transmit(session, &composition) {
        let failure = Failure::new(Stage::Transport, e);
        failure.log();
        composition.failures.push(failure);
    }

    composition.failures
}
