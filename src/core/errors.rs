//! Error taxonomy for the polling pipeline.
//!
//! Every failure a sweep can hit falls into one of these buckets. The sweep
//! boundary logs them all; only the on-demand HTTP check path surfaces them to
//! a caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckError {
    /// A form field never became interactable, the page never settled, or the
    /// per-attempt deadline expired. Not retried within the sweep; the next
    /// scheduled sweep tries again.
    #[error("transient scrape failure: {0}")]
    Transient(String),

    /// The CAPTCHA solver exhausted its attempt budget or returned garbage.
    #[error("captcha solve failed: {0}")]
    Captcha(String),

    /// A stored registry record could not be decoded. The sweep skips the
    /// record and continues.
    #[error("malformed registry record {key}: {reason}")]
    Data { key: String, reason: String },

    /// Webhook POST, SMTP send, or IMAP fetch failed at the transport level,
    /// or the webhook answered with a non-success status.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A required credential or endpoint is missing from the environment.
    /// Aborts the current attempt only, never the process.
    #[error("missing configuration: {0}")]
    Config(String),
}

impl CheckError {
    /// Short tag used in log lines and sweep summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckError::Transient(_) => "transient",
            CheckError::Captcha(_) => "captcha",
            CheckError::Data { .. } => "data",
            CheckError::Transport(_) => "transport",
            CheckError::Config(_) => "config",
        }
    }
}

impl From<reqwest::Error> for CheckError {
    fn from(e: reqwest::Error) -> Self {
        CheckError::Transport(e.to_string())
    }
}
