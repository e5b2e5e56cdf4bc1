//! File-based config loader (`visa-sentinel.json`) with env-var fallback.
//!
//! Every field is optional in the file; `resolve_*` accessors apply the
//! precedence JSON field → env var → default. Credentials have no default:
//! resolving them can fail, and that failure aborts only the attempt that
//! needed them.

use std::path::Path;

use crate::core::errors::CheckError;

/// CAPTCHA solver sub-config (mirrors the `captcha` key in visa-sentinel.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct CaptchaConfig {
    /// Solver endpoint. Defaults to the hosted OCR upload URL.
    pub endpoint: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub soft_id: Option<String>,
    /// Numeric code-type the solver should assume for the challenge image.
    pub code_type: Option<String>,
    /// Minimum answer length hint.
    pub min_len: Option<String>,
}

/// Resolved, ready-to-send solver credentials.
#[derive(Clone, Debug)]
pub struct CaptchaCredentials {
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub soft_id: String,
    pub code_type: String,
    pub min_len: String,
}

impl CaptchaConfig {
    pub fn resolve_endpoint(&self) -> String {
        self.field_or_env(&self.endpoint, "CJY_ENDPOINT")
            .unwrap_or_else(|| "http://upload.chaojiying.net/Upload/Processing.php".to_string())
    }

    /// Full credential set. Username and password are required; the rest have
    /// service-side defaults.
    pub fn resolve_credentials(&self) -> Result<CaptchaCredentials, CheckError> {
        let username = self
            .field_or_env(&self.username, "CJY_USERNAME")
            .ok_or_else(|| CheckError::Config("captcha username (CJY_USERNAME)".into()))?;
        let password = self
            .field_or_env(&self.password, "CJY_PASSWORD")
            .ok_or_else(|| CheckError::Config("captcha password (CJY_PASSWORD)".into()))?;
        Ok(CaptchaCredentials {
            endpoint: self.resolve_endpoint(),
            username,
            password,
            soft_id: self
                .field_or_env(&self.soft_id, "CJY_SOFT_ID")
                .unwrap_or_default(),
            code_type: self
                .field_or_env(&self.code_type, "CJY_CODE_TYPE")
                .unwrap_or_else(|| "1902".to_string()),
            min_len: self
                .field_or_env(&self.min_len, "CJY_MIN_LEN")
                .unwrap_or_else(|| "4".to_string()),
        })
    }

    fn field_or_env(&self, field: &Option<String>, env: &str) -> Option<String> {
        if let Some(v) = field {
            if !v.trim().is_empty() {
                return Some(v.clone());
            }
        }
        std::env::var(env).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Mail account sub-config for the passport-tracking round-trip.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub imap_host: Option<String>,
    /// Account used for both the outbound request and the inbound fetch.
    pub account: Option<String>,
    pub password: Option<String>,
    /// Fixed auto-reply correspondent.
    pub tracking_address: Option<String>,
}

/// Resolved mail account.
#[derive(Clone, Debug)]
pub struct MailAccount {
    pub smtp_host: String,
    pub imap_host: String,
    pub account: String,
    pub password: String,
    pub tracking_address: String,
}

impl MailConfig {
    pub fn resolve_account(&self) -> Result<MailAccount, CheckError> {
        let account = self
            .field_or_env(&self.account, "MAIL_ACCOUNT")
            .ok_or_else(|| CheckError::Config("mail account (MAIL_ACCOUNT)".into()))?;
        let password = self
            .field_or_env(&self.password, "MAIL_PASSWORD")
            .ok_or_else(|| CheckError::Config("mail password (MAIL_PASSWORD)".into()))?;
        Ok(MailAccount {
            smtp_host: self
                .field_or_env(&self.smtp_host, "MAIL_SMTP_HOST")
                .unwrap_or_else(|| "smtp.163.com".to_string()),
            imap_host: self
                .field_or_env(&self.imap_host, "MAIL_IMAP_HOST")
                .unwrap_or_else(|| "imap.163.com".to_string()),
            account,
            password,
            tracking_address: self
                .field_or_env(&self.tracking_address, "MAIL_TRACKING_ADDRESS")
                .unwrap_or_else(|| "passportstatus@ustraveldocs.com".to_string()),
        })
    }

    fn field_or_env(&self, field: &Option<String>, env: &str) -> Option<String> {
        if let Some(v) = field {
            if !v.trim().is_empty() {
                return Some(v.clone());
            }
        }
        std::env::var(env).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Top-level config loaded from `visa-sentinel.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct SentinelConfig {
    #[serde(default)]
    pub captcha: CaptchaConfig,
    #[serde(default)]
    pub mail: MailConfig,
    pub status_page_url: Option<String>,
    pub webhook_url: Option<String>,
    pub redis_url: Option<String>,
    pub sweep_interval_secs: Option<u64>,
    /// Hard deadline for one scrape or mail-track attempt.
    pub attempt_timeout_secs: Option<u64>,
    pub listen_addr: Option<String>,
}

impl SentinelConfig {
    pub fn resolve_status_page_url(&self) -> String {
        self.string_or_env(&self.status_page_url, "STATUS_PAGE_URL")
            .unwrap_or_else(|| "https://ceac.state.gov/CEACStatTracker/Status.aspx".to_string())
    }

    pub fn resolve_webhook_url(&self) -> Result<String, CheckError> {
        self.string_or_env(&self.webhook_url, "NOTIFY_WEBHOOK_URL")
            .ok_or_else(|| CheckError::Config("notification webhook (NOTIFY_WEBHOOK_URL)".into()))
    }

    pub fn resolve_redis_url(&self) -> String {
        self.string_or_env(&self.redis_url, "REDIS_URL")
            .unwrap_or_else(|| "redis://127.0.0.1:6379/".to_string())
    }

    /// Sweep tick interval. Default: 60 s.
    pub fn resolve_sweep_interval_secs(&self) -> u64 {
        if let Some(n) = self.sweep_interval_secs {
            return n;
        }
        std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60)
    }

    /// Per-attempt deadline. Default: 120 s — generous enough for the settle
    /// delay on the mail path plus the fetch.
    pub fn resolve_attempt_timeout_secs(&self) -> u64 {
        if let Some(n) = self.attempt_timeout_secs {
            return n;
        }
        std::env::var("ATTEMPT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120)
    }

    pub fn resolve_listen_addr(&self) -> String {
        self.string_or_env(&self.listen_addr, "LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:9010".to_string())
    }

    fn string_or_env(&self, field: &Option<String>, env: &str) -> Option<String> {
        if let Some(v) = field {
            if !v.trim().is_empty() {
                return Some(v.clone());
            }
        }
        std::env::var(env).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Load `visa-sentinel.json` from the working directory, falling back to an
/// all-defaults config (env vars still apply) when the file is absent or
/// malformed. A malformed file is logged, never fatal.
pub fn load_config() -> SentinelConfig {
    load_config_from(Path::new("visa-sentinel.json"))
}

pub fn load_config_from(path: &Path) -> SentinelConfig {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<SentinelConfig>(&raw) {
            Ok(cfg) => {
                tracing::info!("loaded config from {}", path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!("config file {} unreadable ({}); using defaults", path.display(), e);
                SentinelConfig::default()
            }
        },
        Err(_) => SentinelConfig::default(),
    }
}
