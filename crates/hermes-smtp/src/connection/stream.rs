//! Low-level SMTP stream handling.

use super::Timeouts;
use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

#[derive(Debug)]
enum Transport {
    Tcp(BufReader<TcpStream>),
    Tls(Box<BufReader<tokio_rustls::client::TlsStream<TcpStream>>>),
}

/// SMTP stream (TCP or TLS) carrying its read and write deadlines.
#[derive(Debug)]
pub struct SmtpStream {
    transport: Transport,
    timeouts: Timeouts,
}

impl SmtpStream {
    /// Reads one reply line from the stream, without its line ending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] at end of stream, [`Error::Timeout`]
    /// when the read deadline passes, or the underlying I/O error.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = match &mut self.transport {
            Transport::Tcp(reader) => {
                bounded(self.timeouts.read, "read", reader.read_line(&mut line)).await?
            }
            Transport::Tls(reader) => {
                bounded(self.timeouts.read, "read", reader.read_line(&mut line)).await?
            }
        };
        if read == 0 {
            return Err(Error::ConnectionClosed);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or the write deadline passes.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let limit = self.timeouts.write;
        match &mut self.transport {
            Transport::Tcp(reader) => {
                let inner = reader.get_mut();
                bounded(limit, "write", async {
                    inner.write_all(data).await?;
                    inner.flush().await
                })
                .await
            }
            Transport::Tls(reader) => {
                let inner = reader.get_mut();
                bounded(limit, "write", async {
                    inner.write_all(data).await?;
                    inner.flush().await
                })
                .await
            }
        }
    }

    /// Returns true once the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self.transport, Transport::Tls(_))
    }

    /// Upgrades a TCP stream to TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already encrypted or the TLS
    /// handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        let tcp_stream = match self.transport {
            Transport::Tcp(reader) => reader.into_inner(),
            Transport::Tls(_) => return Err(Error::Protocol("Already using TLS".into())),
        };

        let tls = handshake(hostname, tcp_stream, self.timeouts.connect).await?;
        Ok(Self {
            transport: tls,
            timeouts: self.timeouts,
        })
    }
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails or the connect deadline passes.
pub async fn connect(hostname: &str, port: u16, timeouts: Timeouts) -> Result<SmtpStream> {
    let stream = open(hostname, port, timeouts.connect).await?;
    tracing::debug!(hostname, port, "Connected to SMTP relay");
    Ok(SmtpStream {
        transport: Transport::Tcp(BufReader::new(stream)),
        timeouts,
    })
}

/// Connects to an SMTP server over TLS (implicit TLS, usually port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(hostname: &str, port: u16, timeouts: Timeouts) -> Result<SmtpStream> {
    let stream = open(hostname, port, timeouts.connect).await?;
    let transport = handshake(hostname, stream, timeouts.connect).await?;
    tracing::debug!(hostname, port, "Connected to SMTP relay over TLS");
    Ok(SmtpStream {
        transport,
        timeouts,
    })
}

async fn open(hostname: &str, port: u16, limit: Option<Duration>) -> Result<TcpStream> {
    bounded(limit, "connect", TcpStream::connect((hostname, port))).await
}

async fn handshake(
    hostname: &str,
    stream: TcpStream,
    limit: Option<Duration>,
) -> Result<Transport> {
    let connector = create_tls_connector();
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))?;

    let tls_stream = bounded(limit, "TLS handshake", connector.connect(server_name, stream)).await?;
    Ok(Transport::Tls(Box::new(BufReader::new(tls_stream))))
}

/// Runs an I/O future under an optional deadline.
async fn bounded<T>(
    limit: Option<Duration>,
    what: &'static str,
    fut: impl Future<Output = io::Result<T>>,
) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::Timeout(what))?
            .map_err(Error::from),
        None => fut.await.map_err(Error::from),
    }
}

/// Creates a TLS connector with the webpki root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
