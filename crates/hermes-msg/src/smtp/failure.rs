//! Step failure records.

use std::fmt;

/// The send step a failure came from. Renders as the log tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Resolving or setting the From header.
    AddFrom,
    /// Building one attachment part.
    ParseAttachment,
    /// Parsing the To list.
    AddTo,
    /// Parsing the Cc list.
    AddCc,
    /// Parsing the Bcc list.
    AddBcc,
    /// Connecting to the relay and transmitting.
    Transport,
}

impl Stage {
    /// Returns the log tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::AddFrom => "[SEND][ADD_FROM]",
            Self::ParseAttachment => "[PARSE][ATTACHMENT]",
            Self::AddTo => "[SEND][ADD_TO]",
            Self::AddCc => "[SEND][ADD_CC]",
            Self::AddBcc => "[SEND][ADD_BCC]",
            Self::Transport => "[SEND][TRANSPORT]",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A caught step failure: which step, and what went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Step that failed.
    pub stage: Stage,
    /// Underlying error text.
    pub detail: String,
}

impl Failure {
    /// Records a failure for `stage`.
    #[must_use]
    pub fn new(stage: Stage, detail: impl fmt::Display) -> Self {
        Self {
            stage,
            detail: detail.to_string(),
        }
    }

    /// Emits the record to the log.
    pub fn log(&self) {
        tracing::error!(tag = %self.stage, error = %self.detail, "Message step failed");
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.stage, self.detail)
    }
}
