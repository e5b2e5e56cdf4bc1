//! Passport tracking over an email round-trip.
//!
//! The consulate's tracking address is an auto-responder: mail it a passport
//! number and it replies with the current passport status. The protocol here
//! is single-shot — send, wait a fixed settle delay, then fetch the newest
//! inbox message and read its first inline text part. There is no reply
//! polling and no sender/subject verification; if the reply is late, the
//! fetch reads whatever is newest and the next sweep gets another chance.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use crate::core::config::{MailAccount, MailConfig};
use crate::core::errors::CheckError;
use crate::core::types::{Application, StatusSnapshot};

/// How long the auto-responder usually takes. Deliberately not configurable;
/// shortening it just makes the fetch read a stale message.
const SETTLE_DELAY: Duration = Duration::from_secs(25);

const IMAP_PORT: u16 = 993;

/// Anything that can produce a passport status snapshot for an application.
#[async_trait]
pub trait PassportProbe: Send + Sync {
    async fn track(&self, app: &Application) -> Result<StatusSnapshot, CheckError>;
}

/// The real probe: SMTP out, settle, IMAP back. The account resolves per
/// attempt so a missing credential fails the attempt, not the process.
pub struct EmailTrackingClient {
    config: MailConfig,
}

impl EmailTrackingClient {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    async fn send_request(
        &self,
        account: &MailAccount,
        passport_number: &str,
    ) -> Result<(), CheckError> {
        let message = Message::builder()
            .from(
                account
                    .account
                    .parse()
                    .map_err(|e| CheckError::Config(format!("mail account address: {}", e)))?,
            )
            .to(account
                .tracking_address
                .parse()
                .map_err(|e| CheckError::Config(format!("tracking address: {}", e)))?)
            .subject(passport_number)
            .header(ContentType::TEXT_HTML)
            .body(passport_number.to_string())
            .map_err(|e| CheckError::Transport(format!("compose tracking mail: {}", e)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&account.smtp_host)
            .map_err(|e| CheckError::Transport(format!("smtp relay {}: {}", account.smtp_host, e)))?
            .credentials(Credentials::new(
                account.account.clone(),
                account.password.clone(),
            ))
            .build();

        transport
            .send(message)
            .await
            .map_err(|e| CheckError::Transport(format!("smtp send: {}", e)))?;
        Ok(())
    }

    /// Fetch the message with the highest sequence number and return its raw
    /// RFC 822 bytes. Login, select, and fetch failures are all hard failures
    /// for this attempt.
    async fn fetch_latest_raw(&self, account: &MailAccount) -> Result<Vec<u8>, CheckError> {
        let host = account.imap_host.as_str();
        let tcp = tokio::net::TcpStream::connect((host, IMAP_PORT))
            .await
            .map_err(|e| CheckError::Transport(format!("imap connect {}: {}", host, e)))?;
        let tls_stream = async_native_tls::TlsConnector::new()
            .connect(host, tcp)
            .await
            .map_err(|e| CheckError::Transport(format!("imap tls {}: {}", host, e)))?;

        let client = async_imap::Client::new(tls_stream);
        let mut session = client
            .login(&account.account, &account.password)
            .await
            .map_err(|(e, _)| CheckError::Transport(format!("imap login: {}", e)))?;

        let result = async {
            let mailbox = session
                .select("INBOX")
                .await
                .map_err(|e| CheckError::Transport(format!("imap select INBOX: {}", e)))?;
            if mailbox.exists == 0 {
                return Err(CheckError::Transport("inbox is empty".into()));
            }

            // Highest sequence number == most recent; the auto-responder is
            // assumed to be the latest correspondent.
            let fetches: Vec<_> = session
                .fetch(mailbox.exists.to_string(), "RFC822")
                .await
                .map_err(|e| CheckError::Transport(format!("imap fetch: {}", e)))?
                .try_collect()
                .await
                .map_err(|e| CheckError::Transport(format!("imap fetch stream: {}", e)))?;

            fetches
                .into_iter()
                .next()
                .and_then(|f| f.body().map(|b| b.to_vec()))
                .ok_or_else(|| CheckError::Transport("fetched message has no body".into()))
        }
        .await;

        session.logout().await.ok();
        result
    }
}

/// Extract the first inline (non-attachment) text part of a raw message.
/// Pulled out of the client so the parsing contract is testable without a
/// mail server.
pub fn extract_inline_body(raw: &[u8]) -> Result<String, CheckError> {
    let parsed = mail_parser::MessageParser::default()
        .parse(raw)
        .ok_or_else(|| CheckError::Transport("unparsable reply message".into()))?;
    parsed
        .body_text(0)
        .map(|body| body.trim().to_string())
        .filter(|body| !body.is_empty())
        .ok_or_else(|| CheckError::Transport("reply has no inline text part".into()))
}

#[async_trait]
impl PassportProbe for EmailTrackingClient {
    async fn track(&self, app: &Application) -> Result<StatusSnapshot, CheckError> {
        info!(
            "tracking passport status: application_id={} passport_number={}",
            app.application_id, app.passport_number
        );

        let account = self.config.resolve_account()?;

        // The auto-responder sometimes answers a previous sweep's request, so
        // a failed send still leaves a fetch worth attempting.
        if let Err(e) = self.send_request(&account, &app.passport_number).await {
            warn!("tracking request send failed: {}", e);
        }

        tokio::time::sleep(SETTLE_DELAY).await;

        let raw = self.fetch_latest_raw(&account).await?;
        let body = extract_inline_body(&raw)?;

        Ok(StatusSnapshot {
            status: body,
            ..Default::default()
        })
    }
}
