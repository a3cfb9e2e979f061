//! Credential supply for relay authentication.

use std::fmt;

/// Username/secret pair handed to the relay during AUTH.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Authentication username (`mail.smtp.user`).
    pub username: Option<String>,
    /// Authentication secret (`mail.extra.secret`).
    pub password: Option<String>,
}

impl Credentials {
    /// Creates a credential pair.
    #[must_use]
    pub const fn new(username: Option<String>, password: Option<String>) -> Self {
        Self { username, password }
    }

    /// Returns both halves when present.
    #[must_use]
    pub fn pair(&self) -> Option<(&str, &str)> {
        Some((self.username.as_deref()?, self.password.as_deref()?))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Supplies credentials when the transport negotiates authentication.
pub trait Authenticator: fmt::Debug + Send + Sync {
    /// Returns the credentials to present to the relay.
    fn credentials(&self) -> Credentials;
}

/// Authenticator that always returns the pair captured at initialization.
#[derive(Debug, Clone)]
pub struct StaticAuthenticator {
    credentials: Credentials,
}

impl StaticAuthenticator {
    /// Captures a username/secret pair.
    #[must_use]
    pub const fn new(username: Option<String>, password: Option<String>) -> Self {
        Self {
            credentials: Credentials::new(username, password),
        }
    }
}

impl Authenticator for StaticAuthenticator {
    fn credentials(&self) -> Credentials {
        self.credentials.clone()
    }
}
