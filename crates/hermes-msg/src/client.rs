//! The pluggable message client abstraction.

use crate::config::ConfigMap;
use crate::message::MessageResult;

/// A transport that can deliver messages of one kind.
///
/// Each transport is initialized once from configuration into an immutable
/// session, which is then passed by reference to every send.
pub trait MessageClient {
    /// Reusable per-client state produced by [`initialize`](Self::initialize).
    type Session;
    /// The message type this transport delivers.
    type Message;

    /// Builds a session from configuration. Never fails and never touches
    /// the network.
    fn initialize(&self, config: &ConfigMap) -> Self::Session;

    /// Makes one best-effort delivery attempt, blocking the caller.
    fn send(&self, session: &Self::Session, message: &Self::Message) -> MessageResult;
}
