//! Plain-TCP SMTP delivery.
//!
//! A deliberately small client: EHLO, optional AUTH PLAIN, one MAIL/RCPT/DATA
//! exchange per delivery, QUIT. No TLS and no pipelining.

use async_trait::async_trait;
use base64::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use super::{DeliveryError, Mailer};

/// SMTP relay configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Credentials for AUTH PLAIN; authentication is skipped when either is
    /// absent.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Envelope sender and `From` header.
    pub from: String,
}

/// [`Mailer`] implementation speaking SMTP to a configured relay.
///
/// Opens a fresh connection per delivery; the worker pool delivers
/// sequentially per worker, so there is no connection reuse to be had.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    cfg: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(cfg: SmtpConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, to: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let stream = TcpStream::connect((self.cfg.host.as_str(), self.cfg.port)).await?;
        let (read, write) = stream.into_split();
        let mut session = Session {
            lines: BufReader::new(read).lines(),
            write,
        };

        session.expect(220).await?;
        session.command("EHLO mailspool", 250).await?;

        if let (Some(user), Some(pass)) = (&self.cfg.username, &self.cfg.password) {
            let token = BASE64_STANDARD.encode(format!("\0{user}\0{pass}"));
            session.command(&format!("AUTH PLAIN {token}"), 235).await?;
        }

        session
            .command(&format!("MAIL FROM:<{}>", self.cfg.from), 250)
            .await?;
        session.command(&format!("RCPT TO:<{to}>"), 250).await?;
        session.command("DATA", 354).await?;

        let message = format_message(&self.cfg.from, to, subject, body);
        session.write.write_all(message.as_bytes()).await?;
        session.write.write_all(b"\r\n.\r\n").await?;
        session.expect(250).await?;

        // Best effort; the message is already accepted.
        let _ = session.command("QUIT", 221).await;

        debug!(to, "smtp delivery accepted");
        Ok(())
    }
}

struct Session {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl Session {
    async fn command(&mut self, line: &str, expect: u16) -> Result<(), DeliveryError> {
        self.write.write_all(line.as_bytes()).await?;
        self.write.write_all(b"\r\n").await?;
        self.expect(expect).await
    }

    /// Read one (possibly multi-line) reply and require the given code.
    async fn expect(&mut self, expected: u16) -> Result<(), DeliveryError> {
        let mut text = String::new();
        loop {
            let line = self
                .lines
                .next_line()
                .await?
                .ok_or_else(|| DeliveryError::Rejected("connection closed".to_string()))?;

            let (code, more, rest) = parse_reply_line(&line)?;
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(rest);

            if more {
                continue;
            }
            if code != expected {
                return Err(DeliveryError::Rejected(format!("{code} {text}")));
            }
            return Ok(());
        }
    }
}

/// Split an SMTP reply line into (code, continuation?, text).
fn parse_reply_line(line: &str) -> Result<(u16, bool, &str), DeliveryError> {
    if line.len() < 3 {
        return Err(DeliveryError::Rejected(format!("malformed reply: {line:?}")));
    }
    let code: u16 = line[..3]
        .parse()
        .map_err(|_| DeliveryError::Rejected(format!("malformed reply: {line:?}")))?;
    let more = line.as_bytes().get(3) == Some(&b'-');
    let rest = line.get(4..).unwrap_or("").trim_end();
    Ok((code, more, rest))
}

/// Render headers plus a dot-stuffed body, CRLF line endings throughout.
fn format_message(from: &str, to: &str, subject: &str, body: &str) -> String {
    let mut msg = String::with_capacity(body.len() + 256);
    msg.push_str(&format!("From: {from}\r\n"));
    msg.push_str(&format!("To: {to}\r\n"));
    msg.push_str(&format!("Subject: {subject}\r\n"));
    msg.push_str("MIME-Version: 1.0\r\n");
    msg.push_str("Content-Type: text/plain; charset=UTF-8\r\n");
    msg.push_str("\r\n");

    for (i, line) in body.replace("\r\n", "\n").split('\n').enumerate() {
        if i > 0 {
            msg.push_str("\r\n");
        }
        if line.starts_with('.') {
            msg.push('.');
        }
        msg.push_str(line);
    }
    msg
}
