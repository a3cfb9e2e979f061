//! Sends one message using settings from a `.properties` file.
//!
//! ```text
//! RUST_LOG=hermes_msg=debug cargo run -p hermes-msg --example send_smtp -- smtp.properties to@example.com [attachment]
//! ```

use std::path::Path;

use hermes_msg::{ByteArrayAttachment, ConfigMap, EmailMessage, MessageClient, SmtpEmailClient};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hermes_msg=info,hermes_smtp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(config_path), Some(to)) = (args.next(), args.next()) else {
        error!("usage: send_smtp <config.properties> <recipient> [attachment]");
        return;
    };

    let config = match std::fs::read_to_string(&config_path) {
        Ok(text) => ConfigMap::from_properties(&text),
        Err(e) => {
            error!(?e, path = %config_path, "Failed to read configuration");
            return;
        }
    };

    let mut message = EmailMessage::new("hermes test message", "Sent by the send_smtp example.")
        .to(to);

    if let Some(path) = args.next() {
        match std::fs::read(&path) {
            Ok(data) => {
                let filename = Path::new(&path)
                    .file_name()
                    .map_or_else(|| path.clone(), |name| name.to_string_lossy().into_owned());
                message = message.attach(ByteArrayAttachment::new(
                    filename,
                    "application/octet-stream",
                    data,
                ));
            }
            Err(e) => error!(?e, %path, "Failed to read attachment"),
        }
    }

    let client = SmtpEmailClient;
    let session = client.initialize(&config);
    client.send(&session, &message);
    info!("Send attempted; failures, if any, are logged above");
}
