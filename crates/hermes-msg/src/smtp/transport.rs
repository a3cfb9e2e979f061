//! One connect-send-disconnect pass against the relay.

use hermes_smtp::connection::{connect, connect_tls};
use hermes_smtp::{Address, Client, Connected, SmtpConnection};
use tracing::{debug, info, warn};

use super::compose::{Composition, Envelope};
use crate::error::{Error, Result};
use crate::session::{SmtpSession, TransportParams};

/// Delivers a composed message, blocking until the relay has answered.
///
/// Drives the async client on a current-thread runtime built for this call.
/// When the caller is already inside a tokio runtime, that runtime lives on
/// a scoped helper thread instead, since tokio refuses to nest `block_on`.
///
/// # Errors
///
/// Returns an error if the envelope is incomplete or any part of the SMTP
/// conversation fails.
pub fn transmit(session: &SmtpSession, composition: &Composition) -> Result<()> {
    let payload = composition.payload();
    let run = || -> Result<()> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(deliver(session, &composition.envelope, payload.as_bytes()))
    };

    if tokio::runtime::Handle::try_current().is_err() {
        return run();
    }

    debug!("Inside a tokio runtime; delivering on a helper thread");
    std::thread::scope(|scope| {
        scope
            .spawn(run)
            .join()
            .unwrap_or(Err(Error::DeliveryThread))
    })
}

/// Runs the SMTP conversation for one message.
///
/// # Errors
///
/// Returns an error if the envelope is incomplete or any part of the SMTP
/// conversation fails.
pub async fn deliver(session: &SmtpSession, envelope: &Envelope, payload: &[u8]) -> Result<()> {
    let sender = Address::new(envelope.sender.as_deref().ok_or(Error::NoSender)?)?;
    let mut recipients = envelope
        .recipients
        .iter()
        .map(|recipient| Address::new(recipient.as_str()))
        .collect::<hermes_smtp::Result<Vec<_>>>()?
        .into_iter();
    let first = recipients.next().ok_or(Error::NoRecipients)?;

    let params = session.params();
    let client = open(params).await?;

    let client = match (session.authenticator(), client.server_info().auth_mechanisms()) {
        (Some(authenticator), mechanisms) if !mechanisms.is_empty() => {
            let credentials = authenticator.credentials();
            let (username, password) = credentials.pair().ok_or(Error::MissingCredentials)?;
            client
                .authenticate(username, password)
                .await?
                .mail_from(sender)
                .await?
        }
        (Some(_), _) => {
            debug!("Relay advertises no AUTH, sending unauthenticated");
            client.mail_from(sender).await?
        }
        (None, _) => client.mail_from(sender).await?,
    };

    let mut client = client.rcpt_to(first).await?;
    for recipient in recipients {
        client = client.rcpt_to(recipient).await?;
    }

    let client = client.data().await?.send_message(payload).await?;
    info!(
        host = params.host(),
        recipients = envelope.recipients.len(),
        "Message accepted by relay"
    );

    if let Err(e) = client.quit().await {
        warn!(?e, "QUIT failed after delivery");
    }
    Ok(())
}

/// Connects, greets and applies the configured TLS policy.
async fn open(params: &TransportParams) -> Result<Client<Connected>> {
    let host = params.host();
    let port = params.port();
    let timeouts = params.timeouts();

    let stream = if params.ssl_enabled() {
        connect_tls(host, port, timeouts).await?
    } else {
        connect(host, port, timeouts).await?
    };

    let client = Client::from_stream(stream)
        .await?
        .ehlo(params.local_host())
        .await?;

    if client.is_tls() {
        return Ok(client);
    }

    let wants_tls = params.starttls_enabled() || params.starttls_required();
    if wants_tls && client.server_info().supports_starttls() {
        debug!(host, "Upgrading connection with STARTTLS");
        Ok(client.starttls(host).await?)
    } else if params.starttls_required() {
        Err(hermes_smtp::Error::NotSupported("STARTTLS".into()).into())
    } else {
        Ok(client)
    }
}
