//! SMTP session initialization.
//!
//! [`initialize`] partitions a [`ConfigMap`]: keys in the `mail.smtp`
//! namespace are forwarded verbatim as [`TransportParams`], the rest are
//! consumed for the local sender fields. Nothing here touches the network
//! and nothing here fails; missing or malformed values fall back to
//! defaults.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use hermes_smtp::Timeouts;
use tracing::debug;

use crate::auth::{Authenticator, StaticAuthenticator};
use crate::config::ConfigMap;

/// Prefix of the keys forwarded to the transport.
pub const TRANSPORT_PREFIX: &str = "mail.smtp";
/// Authentication username.
pub const USER_KEY: &str = "mail.smtp.user";
/// Authentication secret.
pub const SECRET_KEY: &str = "mail.extra.secret";
/// Default sender override; also the SMTP envelope sender.
pub const FROM_KEY: &str = "mail.smtp.from";
/// Human-readable sender name.
pub const DISPLAY_NAME_KEY: &str = "mail.extra.displayname";
/// `"true"` enables the authenticator.
pub const AUTH_KEY: &str = "mail.smtp.auth";

const HOST_KEY: &str = "mail.smtp.host";
const PORT_KEY: &str = "mail.smtp.port";
const SSL_KEY: &str = "mail.smtp.ssl.enable";
const STARTTLS_KEY: &str = "mail.smtp.starttls.enable";
const STARTTLS_REQUIRED_KEY: &str = "mail.smtp.starttls.required";
const CONNECT_TIMEOUT_KEY: &str = "mail.smtp.connectiontimeout";
const READ_TIMEOUT_KEY: &str = "mail.smtp.timeout";
const WRITE_TIMEOUT_KEY: &str = "mail.smtp.writetimeout";
const LOCALHOST_KEY: &str = "mail.smtp.localhost";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 25;
const DEFAULT_SSL_PORT: u16 = 465;

/// Transport parameters: the `mail.smtp*` subset of the configuration.
///
/// Accessors never fail; unset or unparsable values yield the default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportParams(BTreeMap<String, String>);

impl TransportParams {
    /// Collects the entries of `config` under the transport namespace.
    #[must_use]
    pub fn from_config(config: &ConfigMap) -> Self {
        Self(
            config
                .iter()
                .filter(|(key, _)| key.starts_with(TRANSPORT_PREFIX))
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        )
    }

    /// Returns the raw value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates over the forwarded entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of forwarded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing was forwarded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Relay host.
    #[must_use]
    pub fn host(&self) -> &str {
        self.get(HOST_KEY)
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .unwrap_or(DEFAULT_HOST)
    }

    /// Relay port: 465 with implicit TLS, 25 otherwise, unless configured.
    #[must_use]
    pub fn port(&self) -> u16 {
        let default = if self.ssl_enabled() {
            DEFAULT_SSL_PORT
        } else {
            DEFAULT_PORT
        };
        self.parsed(PORT_KEY).unwrap_or(default)
    }

    /// Whether the authenticator is enabled.
    #[must_use]
    pub fn auth_enabled(&self) -> bool {
        self.flag(AUTH_KEY)
    }

    /// Whether the connection uses TLS from the start.
    #[must_use]
    pub fn ssl_enabled(&self) -> bool {
        self.flag(SSL_KEY)
    }

    /// Whether to upgrade with STARTTLS when the relay offers it.
    #[must_use]
    pub fn starttls_enabled(&self) -> bool {
        self.flag(STARTTLS_KEY)
    }

    /// Whether a plain connection without STARTTLS must be refused.
    #[must_use]
    pub fn starttls_required(&self) -> bool {
        self.flag(STARTTLS_REQUIRED_KEY)
    }

    /// Socket deadlines; zero or unset means no limit.
    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: self.millis(CONNECT_TIMEOUT_KEY),
            read: self.millis(READ_TIMEOUT_KEY),
            write: self.millis(WRITE_TIMEOUT_KEY),
        }
    }

    /// Name announced in EHLO.
    #[must_use]
    pub fn local_host(&self) -> &str {
        self.get(LOCALHOST_KEY)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_HOST)
    }

    /// Explicit SMTP envelope sender.
    #[must_use]
    pub fn envelope_from(&self) -> Option<&str> {
        self.get(FROM_KEY)
            .map(str::trim)
            .filter(|from| !from.is_empty())
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        let value = raw.trim().parse().ok();
        if value.is_none() {
            debug!(key, value = raw, "Ignoring unparsable transport parameter");
        }
        value
    }

    fn millis(&self, key: &str) -> Option<Duration> {
        self.parsed::<u64>(key)
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }
}

/// An initialized SMTP session.
///
/// Immutable once built and cheap to clone; share it across threads and
/// reuse it for any number of sends. Every send opens its own connection.
#[derive(Debug, Clone, Default)]
pub struct SmtpSession {
    params: TransportParams,
    authenticator: Option<Arc<dyn Authenticator>>,
    default_from: Option<String>,
    display_name: Option<String>,
}

impl SmtpSession {
    /// Returns the forwarded transport parameters.
    #[must_use]
    pub const fn params(&self) -> &TransportParams {
        &self.params
    }

    /// Returns the authenticator, present only when `mail.smtp.auth` is `"true"`.
    #[must_use]
    pub fn authenticator(&self) -> Option<&dyn Authenticator> {
        self.authenticator.as_deref()
    }

    /// Sender address used when a message has no from override.
    #[must_use]
    pub fn default_from(&self) -> Option<&str> {
        self.default_from.as_deref()
    }

    /// Human-readable sender name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

/// Builds a session from configuration.
///
/// The default sender is `mail.smtp.from`, falling back to
/// `mail.smtp.user`. An authenticator is attached only when the forwarded
/// `mail.smtp.auth` flag is `"true"`.
#[must_use]
pub fn initialize(config: &ConfigMap) -> SmtpSession {
    let username = config.get(USER_KEY).map(str::to_string);
    let password = config.get(SECRET_KEY).map(str::to_string);
    let default_from = config
        .get(FROM_KEY)
        .map(str::to_string)
        .or_else(|| username.clone());
    let display_name = config.get(DISPLAY_NAME_KEY).map(str::to_string);

    let params = TransportParams::from_config(config);
    let authenticator = params.auth_enabled().then(|| {
        Arc::new(StaticAuthenticator::new(username, password)) as Arc<dyn Authenticator>
    });

    debug!(
        host = params.host(),
        port = params.port(),
        auth = authenticator.is_some(),
        forwarded = params.len(),
        "Initialized SMTP session"
    );

    SmtpSession {
        params,
        authenticator,
        default_from,
        display_name,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> ConfigMap {
        pairs.iter().copied().collect()
    }

    #[test]
    fn no_authenticator_unless_flag_is_true() {
        for flag in [None, Some("false"), Some("yes"), Some("1"), Some("")] {
            let mut cfg = config(&[(USER_KEY, "user"), (SECRET_KEY, "secret")]);
            if let Some(flag) = flag {
                cfg.insert(AUTH_KEY, flag);
            }
            assert!(initialize(&cfg).authenticator().is_none(), "flag {flag:?}");
        }
    }

    #[test]
    fn authenticator_returns_configured_pair() {
        let session = initialize(&config(&[
            (AUTH_KEY, "true"),
            (USER_KEY, "user"),
            (SECRET_KEY, "secret"),
        ]));
        let creds = session.authenticator().unwrap().credentials();
        assert_eq!(creds.pair(), Some(("user", "secret")));
    }

    #[test]
    fn auth_flag_must_be_exactly_lowercase_true() {
        for flag in ["TRUE", " true ", "True", "yes", "1"] {
            let session = initialize(&config(&[
                (AUTH_KEY, flag),
                (USER_KEY, "user"),
                (SECRET_KEY, "secret"),
            ]));
            assert!(session.authenticator().is_none(), "flag {flag:?}");
            assert!(!session.params().auth_enabled(), "flag {flag:?}");
        }
    }

    #[test]
    fn auth_flag_without_credentials_still_attaches_authenticator() {
        let session = initialize(&config(&[(AUTH_KEY, "true")]));
        let creds = session.authenticator().unwrap().credentials();
        assert_eq!(creds.username, None);
        assert_eq!(creds.password, None);
    }

    #[test]
    fn only_namespace_keys_are_forwarded() {
        let session = initialize(&config(&[
            ("mail.smtp.host", "relay.test"),
            (USER_KEY, "user"),
            (SECRET_KEY, "secret"),
            (DISPLAY_NAME_KEY, "Ops"),
            ("mail.imap.host", "imap.test"),
            ("unrelated", "x"),
        ]));
        let keys: Vec<&str> = session.params().iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["mail.smtp.host", USER_KEY]);
        assert_eq!(session.params().get(SECRET_KEY), None);
        assert_eq!(session.display_name(), Some("Ops"));
    }

    #[test]
    fn default_from_falls_back_to_user() {
        let session = initialize(&config(&[(USER_KEY, "user@x.test")]));
        assert_eq!(session.default_from(), Some("user@x.test"));

        let session = initialize(&config(&[(USER_KEY, "user@x.test"), (FROM_KEY, "noreply@x.test")]));
        assert_eq!(session.default_from(), Some("noreply@x.test"));

        let session = initialize(&ConfigMap::new());
        assert_eq!(session.default_from(), None);
        assert_eq!(session.display_name(), None);
    }

    #[test]
    fn transport_defaults() {
        let params = initialize(&ConfigMap::new()).params().clone();
        assert!(params.is_empty());
        assert_eq!(params.host(), "localhost");
        assert_eq!(params.port(), 25);
        assert_eq!(params.local_host(), "localhost");
        assert!(!params.ssl_enabled());
        assert!(!params.starttls_enabled());
        assert!(!params.starttls_required());
        assert_eq!(params.timeouts(), Timeouts::default());
        assert_eq!(params.envelope_from(), None);
    }

    #[test]
    fn transport_values() {
        let params = TransportParams::from_config(&config(&[
            ("mail.smtp.host", "relay.test"),
            ("mail.smtp.port", "2525"),
            ("mail.smtp.starttls.enable", "true"),
            ("mail.smtp.starttls.required", "true"),
            ("mail.smtp.connectiontimeout", "1500"),
            ("mail.smtp.timeout", "0"),
            ("mail.smtp.writetimeout", "soon"),
            ("mail.smtp.localhost", "client.test"),
            (FROM_KEY, "bounce@x.test"),
        ]));
        assert_eq!(params.host(), "relay.test");
        assert_eq!(params.port(), 2525);
        assert!(params.starttls_enabled());
        assert!(params.starttls_required());
        let timeouts = params.timeouts();
        assert_eq!(timeouts.connect, Some(Duration::from_millis(1500)));
        assert_eq!(timeouts.read, None);
        assert_eq!(timeouts.write, None);
        assert_eq!(params.local_host(), "client.test");
        assert_eq!(params.envelope_from(), Some("bounce@x.test"));
    }

    #[test]
    fn ssl_changes_default_port() {
        let params = TransportParams::from_config(&config(&[("mail.smtp.ssl.enable", "true")]));
        assert_eq!(params.port(), 465);

        let params = TransportParams::from_config(&config(&[
            ("mail.smtp.ssl.enable", "true"),
            ("mail.smtp.port", "not-a-port"),
        ]));
        assert_eq!(params.port(), 465);
    }

    #[test]
    fn session_is_shareable() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<SmtpSession>();
    }
}
