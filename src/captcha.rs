//! External CAPTCHA solving.
//!
//! One form-encoded POST per attempt — every attempt is billed by the
//! service, so the budget is small and fixed: 3 attempts, 2 s apart, first
//! well-formed answer wins.

use std::time::Duration;

use base64::Engine;
use tracing::warn;

use crate::core::config::CaptchaCredentials;
use crate::core::errors::CheckError;
use crate::core::types::CaptchaSolution;

const MAX_ATTEMPTS: usize = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Client for the OCR upload endpoint.
pub struct CaptchaSolver {
    http: reqwest::Client,
    credentials: CaptchaCredentials,
}

impl CaptchaSolver {
    pub fn new(http: reqwest::Client, credentials: CaptchaCredentials) -> Self {
        Self { http, credentials }
    }

    /// Solve one challenge image. Returns the recognized text.
    ///
    /// An HTTP failure or an undecodable/empty answer both count as attempt
    /// failures; exhausting the budget surfaces `CheckError::Captcha`.
    pub async fn solve(&self, image: &[u8]) -> Result<String, CheckError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let mut last_error = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            match self.solve_once(&encoded).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!("captcha solve attempt {}/{} failed: {}", attempt, MAX_ATTEMPTS, e);
                    last_error = e;
                }
            }
        }
        Err(CheckError::Captcha(format!(
            "{} attempts exhausted, last error: {}",
            MAX_ATTEMPTS, last_error
        )))
    }

    async fn solve_once(&self, encoded_image: &str) -> Result<String, String> {
        let form = [
            ("user", self.credentials.username.as_str()),
            ("pass", self.credentials.password.as_str()),
            ("softid", self.credentials.soft_id.as_str()),
            ("codetype", self.credentials.code_type.as_str()),
            ("len_min", self.credentials.min_len.as_str()),
            ("file_base64", encoded_image),
        ];

        let response = self
            .http
            .post(&self.credentials.endpoint)
            .header(
                reqwest::header::USER_AGENT,
                "Mozilla/4.0 (compatible; MSIE 8.0; Windows NT 5.1; Trident/4.0)",
            )
            .form(&form)
            .send()
            .await
            .map_err(|e| format!("request error: {}", e))?;

        let solution: CaptchaSolution = response
            .json()
            .await
            .map_err(|e| format!("undecodable response: {}", e))?;

        if solution.err_no != 0 {
            return Err(format!(
                "service error {}: {}",
                solution.err_no, solution.err_str
            ));
        }
        if solution.pic_str.trim().is_empty() {
            return Err("empty answer text".to_string());
        }
        Ok(solution.pic_str)
    }
}
