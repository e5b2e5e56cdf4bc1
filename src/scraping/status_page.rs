//! Form automation against the CEAC status page.
//!
//! The flow is a fixed sequence: navigate → select visa type → select
//! location → fill case number → fill passport number → fill surname prefix →
//! screenshot the CAPTCHA → solve → fill answer → submit → extract the three
//! result fields. Selectors are pinned to the page as deployed; if the page
//! changes, extraction fails (and the scrape errors) rather than adapting.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::Page;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::captcha::CaptchaSolver;
use crate::core::config::CaptchaConfig;
use crate::core::errors::CheckError;
use crate::core::types::{Application, StatusSnapshot};
use crate::scraping::browser::{wait_for_element, BrowserSession};

// Form-field and result selectors, as served by the page today.
const VISA_APP_TYPE: &str = "#Visa_Application_Type";
const LOCATION_DROPDOWN: &str = "#Location_Dropdown";
const CASE_NUMBER_INPUT: &str = "#Visa_Case_Number";
const PASSPORT_NUMBER_INPUT: &str = "#Passport_Number";
const SURNAME_INPUT: &str = "#Surname";
const CAPTCHA_INPUT: &str = "#Captcha";
const CAPTCHA_IMAGE: &str =
    "#c_status_ctl00_contentplaceholder1_defaultcaptcha_CaptchaImage";
const SUBMIT_BUTTON: &str = "#ctl00_ContentPlaceHolder1_imgFolder";
const STATUS_TEXT: &str =
    "#ctl00_ContentPlaceHolder1_ucApplicationStatusView_pTranslation";
const SUBMIT_DATE: &str = "#ctl00_ContentPlaceHolder1_ucApplicationStatusView_lblSubmitDate";
const STATUS_DATE: &str = "#ctl00_ContentPlaceHolder1_ucApplicationStatusView_lblStatusDate";

/// Render a value as a JS string literal for splicing into injected scripts.
/// JSON string encoding is a subset of JS, so quotes, backslashes, and
/// control characters all arrive inert.
fn js_string_literal(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| String::from("\"\""))
}

/// Bounded wait for a form field to become interactable.
const FIELD_WAIT: Duration = Duration::from_secs(15);
/// The post-submit render includes a server round trip; give it longer.
const RESULT_WAIT: Duration = Duration::from_secs(30);

/// Anything that can produce a visa status snapshot for an application.
/// The sweep and the on-demand API consume this; tests substitute it.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn scrape(&self, app: &Application) -> Result<StatusSnapshot, CheckError>;
}

/// The real probe: one fresh headless browser per attempt, torn down on every
/// exit path. CAPTCHA bytes stay in memory so concurrently in-flight attempts
/// can never corrupt each other's challenge image.
pub struct StatusPageDriver {
    url: String,
    captcha: CaptchaConfig,
    http: reqwest::Client,
    /// Dump each CAPTCHA to a per-attempt unique temp file for offline
    /// inspection. Off unless `CAPTCHA_DEBUG_DUMP` is set.
    debug_dump: bool,
}

impl StatusPageDriver {
    pub fn new(url: String, captcha: CaptchaConfig, http: reqwest::Client) -> Self {
        Self {
            url,
            captcha,
            http,
            debug_dump: std::env::var("CAPTCHA_DEBUG_DUMP").is_ok(),
        }
    }

    async fn scrape_inner(
        &self,
        page: &Page,
        app: &Application,
    ) -> Result<StatusSnapshot, CheckError> {
        // Dropdowns are plain <select> elements; set their value through the
        // DOM and fire the change event the page's own handlers listen for.
        self.select_value(page, VISA_APP_TYPE, "NIV").await?;
        self.select_value(page, LOCATION_DROPDOWN, &app.location).await?;

        self.type_into(page, CASE_NUMBER_INPUT, &app.application_id).await?;
        self.type_into(page, PASSPORT_NUMBER_INPUT, &app.passport_number).await?;
        self.type_into(page, SURNAME_INPUT, &app.surname_prefix).await?;

        let captcha = wait_for_element(page, CAPTCHA_IMAGE, FIELD_WAIT)
            .await
            .map_err(|e| CheckError::Transient(e.to_string()))?;
        let image = captcha
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| CheckError::Transient(format!("captcha screenshot: {}", e)))?;

        if self.debug_dump {
            let path = std::env::temp_dir().join(format!("captcha-{}.png", Uuid::new_v4()));
            if let Err(e) = tokio::fs::write(&path, &image).await {
                warn!("captcha debug dump to {} failed: {}", path.display(), e);
            } else {
                debug!("captcha image dumped to {}", path.display());
            }
        }

        // Credentials resolve per attempt: a missing solver credential fails
        // this attempt without taking the process down.
        let solver = CaptchaSolver::new(self.http.clone(), self.captcha.resolve_credentials()?);
        let answer = solver.solve(&image).await?;
        debug!("captcha solved ({} chars)", answer.len());

        self.type_into(page, CAPTCHA_INPUT, &answer).await?;

        let submit = wait_for_element(page, SUBMIT_BUTTON, FIELD_WAIT)
            .await
            .map_err(|e| CheckError::Transient(e.to_string()))?;
        submit
            .click()
            .await
            .map_err(|e| CheckError::Transient(format!("submit click: {}", e)))?;

        // All three result fields must be present; a partial result means the
        // page rejected the query (bad CAPTCHA, unknown case) and is useless.
        let status = self.extract_text(page, STATUS_TEXT, RESULT_WAIT).await?;
        let created = self.extract_text(page, SUBMIT_DATE, FIELD_WAIT).await?;
        let last_updated = self.extract_text(page, STATUS_DATE, FIELD_WAIT).await?;

        Ok(StatusSnapshot {
            status,
            status_content: String::new(),
            created,
            last_updated,
            code: 0,
        })
    }

    async fn select_value(
        &self,
        page: &Page,
        selector: &str,
        value: &str,
    ) -> Result<(), CheckError> {
        wait_for_element(page, selector, FIELD_WAIT)
            .await
            .map_err(|e| CheckError::Transient(e.to_string()))?;
        page.evaluate(format!(
            "(() => {{ const el = document.querySelector('{sel}'); el.value = {val}; \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); }})()",
            sel = selector,
            val = js_string_literal(value),
        ))
        .await
        .map_err(|e| CheckError::Transient(format!("set {}: {}", selector, e)))?;
        Ok(())
    }

    async fn type_into(&self, page: &Page, selector: &str, text: &str) -> Result<(), CheckError> {
        let el = wait_for_element(page, selector, FIELD_WAIT)
            .await
            .map_err(|e| CheckError::Transient(e.to_string()))?;
        el.click()
            .await
            .map_err(|e| CheckError::Transient(format!("focus {}: {}", selector, e)))?;
        el.type_str(text)
            .await
            .map_err(|e| CheckError::Transient(format!("type into {}: {}", selector, e)))?;
        Ok(())
    }

    async fn extract_text(
        &self,
        page: &Page,
        selector: &str,
        timeout: Duration,
    ) -> Result<String, CheckError> {
        let el = wait_for_element(page, selector, timeout)
            .await
            .map_err(|e| CheckError::Transient(e.to_string()))?;
        el.inner_text()
            .await
            .map_err(|e| CheckError::Transient(format!("read {}: {}", selector, e)))?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CheckError::Transient(format!("result field {} is empty", selector)))
    }
}

#[async_trait]
impl StatusProbe for StatusPageDriver {
    async fn scrape(&self, app: &Application) -> Result<StatusSnapshot, CheckError> {
        info!(
            "scraping visa status: location={} application_id={} surname_prefix={}",
            app.location, app.application_id, app.surname_prefix
        );

        let session = BrowserSession::launch()
            .await
            .map_err(|e| CheckError::Transient(e.to_string()))?;

        let result = async {
            let page = session
                .browser
                .new_page(self.url.as_str())
                .await
                .map_err(|e| CheckError::Transient(format!("navigate: {}", e)))?;
            self.scrape_inner(&page, app).await
        }
        .await;

        // Teardown happens before the result propagates, on every path.
        session.close().await;

        match &result {
            Ok(snapshot) => info!(
                "scrape complete: application_id={} status={:?}",
                app.application_id, snapshot.status
            ),
            Err(e) => warn!("scrape failed: application_id={} {}", app.application_id, e),
        }
        result
    }
}
