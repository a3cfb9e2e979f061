//! End-to-end tests for the SMTP email client.
//!
//! A scripted relay runs on a loopback listener in a background thread and
//! records the conversation, so the tests can check what actually went over
//! the wire.

#![allow(clippy::unwrap_used)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use hermes_msg::smtp::{Stage, attempt};
use hermes_msg::{
    ByteArrayAttachment, ConfigMap, EmailMessage, MessageClient, MessageResult, SmtpEmailClient,
};

/// What the relay saw.
#[derive(Debug, Default)]
struct Transcript {
    commands: Vec<String>,
    data: String,
}

impl Transcript {
    fn starting_with(&self, prefix: &str) -> Vec<&str> {
        self.commands
            .iter()
            .filter(|c| c.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }
}

/// Starts a relay that advertises `ehlo_reply` and accepts everything else.
fn relay(ehlo_reply: &'static str) -> (u16, JoinHandle<Transcript>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        serve(stream, ehlo_reply)
    });

    (port, handle)
}

fn serve(stream: TcpStream, ehlo_reply: &str) -> Transcript {
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    let mut transcript = Transcript::default();

    writer.write_all(b"220 relay.test ESMTP\r\n").unwrap();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap() == 0 {
            break;
        }
        let line = line.trim_end().to_string();
        let verb = line
            .split([' ', ':'])
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        transcript.commands.push(line);

        let reply = match verb.as_str() {
            "EHLO" => ehlo_reply,
            "AUTH" => "235 2.7.0 Authentication successful\r\n",
            "DATA" => {
                writer.write_all(b"354 Go ahead\r\n").unwrap();
                loop {
                    let mut data_line = String::new();
                    reader.read_line(&mut data_line).unwrap();
                    if data_line == ".\r\n" {
                        break;
                    }
                    transcript.data.push_str(&data_line);
                }
                "250 2.0.0 Queued\r\n"
            }
            "QUIT" => {
                writer.write_all(b"221 Bye\r\n").unwrap();
                break;
            }
            _ => "250 OK\r\n",
        };
        writer.write_all(reply.as_bytes()).unwrap();
    }
    transcript
}

fn config(port: u16) -> ConfigMap {
    ConfigMap::new()
        .with("mail.smtp.host", "127.0.0.1")
        .with("mail.smtp.port", port.to_string())
        .with("mail.smtp.user", "sender@example.com")
        .with("mail.smtp.localhost", "client.test")
        .with("mail.smtp.timeout", "5000")
}

#[test]
fn delivers_multipart_message_with_authentication() {
    let (port, relay) = relay("250-relay.test\r\n250-AUTH LOGIN PLAIN\r\n250 8BITMIME\r\n");
    let config = config(port)
        .with("mail.smtp.auth", "true")
        .with("mail.extra.secret", "secret")
        .with("mail.extra.displayname", "Reports");

    let client = SmtpEmailClient;
    let session = client.initialize(&config);
    let message = EmailMessage::new("Monthly report", "Numbers attached.")
        .to("a@x.com,b@x.com")
        .cc("Carol <c@x.com>")
        .bcc("audit@x.com")
        .attach(ByteArrayAttachment::new("report.csv", "text/csv", b"a,b\n1,2\n".to_vec()));

    assert_eq!(client.send(&session, &message), MessageResult::default());

    let transcript = relay.join().unwrap();
    assert_eq!(transcript.commands[0], "EHLO client.test");
    assert!(transcript.commands[1].starts_with("AUTH PLAIN "));
    assert_eq!(
        transcript.starting_with("MAIL"),
        vec!["MAIL FROM:<sender@example.com>"]
    );
    assert_eq!(
        transcript.starting_with("RCPT"),
        vec![
            "RCPT TO:<a@x.com>",
            "RCPT TO:<b@x.com>",
            "RCPT TO:<c@x.com>",
            "RCPT TO:<audit@x.com>",
        ]
    );

    let data = &transcript.data;
    assert!(data.contains("From: Reports <sender@example.com>\r\n"));
    assert!(data.contains("To: a@x.com, b@x.com\r\n"));
    assert!(data.contains("Cc: Carol <c@x.com>\r\n"));
    assert!(data.contains("Subject: Monthly report\r\n"));
    assert!(data.contains("MIME-Version: 1.0\r\n"));
    assert!(data.contains("Content-Type: multipart/mixed;"));
    assert!(data.contains("filename=report.csv"));
    assert!(data.contains("YSxiCjEsMgo="));
    assert!(!data.contains("Bcc"));
    assert!(!data.contains("audit@x.com"));
}

#[test]
fn sends_single_part_message_without_authentication() {
    let (port, relay) = relay("250 relay.test\r\n");
    let session = SmtpEmailClient.initialize(&config(port));
    let message = EmailMessage::new("Hi", "<p>Hello</p>")
        .html(true)
        .to("a@x.com");

    let failures = attempt(&session, &message);
    assert!(failures.is_empty(), "{failures:?}");

    let transcript = relay.join().unwrap();
    assert!(transcript.starting_with("AUTH").is_empty());
    assert!(transcript.data.contains("Content-Type: text/html; charset=utf-8\r\n"));
    assert!(transcript.data.contains("\r\n\r\n<p>Hello</p>\r\n"));
    assert_eq!(transcript.commands.last().map(String::as_str), Some("QUIT"));
}

#[test]
fn skips_authentication_when_relay_offers_none() {
    let (port, relay) = relay("250 relay.test\r\n");
    let config = config(port)
        .with("mail.smtp.auth", "true")
        .with("mail.extra.secret", "secret");
    let session = SmtpEmailClient.initialize(&config);

    let failures = attempt(&session, &EmailMessage::new("s", "b").to("a@x.com"));
    assert!(failures.is_empty(), "{failures:?}");
    assert!(relay.join().unwrap().starting_with("AUTH").is_empty());
}

#[test]
fn envelope_sender_parameter_is_used_for_mail_from() {
    let (port, relay) = relay("250 relay.test\r\n");
    let config = config(port).with("mail.smtp.from", "bounces@example.com");
    let session = SmtpEmailClient.initialize(&config);

    let message = EmailMessage::new("s", "b")
        .from("me@example.com")
        .to("a@x.com");
    assert!(attempt(&session, &message).is_empty());

    let transcript = relay.join().unwrap();
    assert_eq!(
        transcript.starting_with("MAIL"),
        vec!["MAIL FROM:<bounces@example.com>"]
    );
    assert!(transcript.data.contains("<me@example.com>\r\n"));
}

#[test]
fn bad_recipient_category_does_not_block_delivery() {
    let (port, relay) = relay("250 relay.test\r\n");
    let session = SmtpEmailClient.initialize(&config(port));
    let message = EmailMessage::new("s", "b")
        .to("a@x.com")
        .cc("<<broken")
        .bcc("hidden@x.com");

    let failures = attempt(&session, &message);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].stage, Stage::AddCc);

    let transcript = relay.join().unwrap();
    assert_eq!(
        transcript.starting_with("RCPT"),
        vec!["RCPT TO:<a@x.com>", "RCPT TO:<hidden@x.com>"]
    );
}

#[test]
fn missing_recipients_fail_before_connecting() {
    let session = SmtpEmailClient.initialize(&config(1));
    let failures = attempt(&session, &EmailMessage::new("s", "b"));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].stage, Stage::Transport);
    assert!(failures[0].detail.contains("No recipients"));
}

#[test]
fn unreachable_relay_returns_default_result() {
    // Port 1 on loopback has nothing listening.
    let config = config(1).with("mail.smtp.connectiontimeout", "2000");
    let client = SmtpEmailClient;
    let session = client.initialize(&config);
    let message = EmailMessage::new("s", "b").to("a@x.com");

    assert_eq!(client.send(&session, &message), MessageResult::default());

    let failures = attempt(&session, &message);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].stage, Stage::Transport);
}

#[test]
fn session_is_reusable_across_sends() {
    let client = SmtpEmailClient;
    for subject in ["first", "second"] {
        let (port, relay) = relay("250 relay.test\r\n");
        let session = client.initialize(&config(port));
        let message = EmailMessage::new(subject, "b").to("a@x.com");
        assert!(attempt(&session, &message).is_empty());
        assert!(
            relay
                .join()
                .unwrap()
                .data
                .contains(&format!("Subject: {subject}\r\n"))
        );
    }

    let (port, relay) = relay("250 relay.test\r\n");
    let session = client.initialize(&config(port));
    let shared = session.clone();
    let worker = thread::spawn(move || attempt(&shared, &EmailMessage::new("t", "b").to("a@x.com")));
    assert!(worker.join().unwrap().is_empty());
    relay.join().unwrap();
}

#[tokio::test]
async fn send_from_inside_a_runtime_blocks_and_delivers() {
    let (port, relay) = relay("250 relay.test\r\n");
    let client = SmtpEmailClient;
    let session = client.initialize(&config(port));
    let message = EmailMessage::new("From async", "b").to("a@x.com");

    assert_eq!(client.send(&session, &message), MessageResult::default());

    let transcript = relay.join().unwrap();
    assert_eq!(transcript.starting_with("RCPT"), vec!["RCPT TO:<a@x.com>"]);
    assert!(transcript.data.contains("Subject: From async\r\n"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_send_inside_multi_thread_runtime_returns_default_result() {
    let config = config(1).with("mail.smtp.connectiontimeout", "2000");
    let session = SmtpEmailClient.initialize(&config);
    let message = EmailMessage::new("s", "b").to("a@x.com");

    assert_eq!(SmtpEmailClient.send(&session, &message), MessageResult::default());

    let failures = attempt(&session, &message);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].stage, Stage::Transport);
}
