//! Wire types shared across the scrape pipeline, the mail round-trip, the
//! tracker, and the notification sink.
//!
//! Field names on the serde side are pinned to the formats the external
//! collaborators already speak: the registry stores `Application` as JSON under
//! `application:status:<id>`, and the webhook consumes `NotificationPayload`
//! with camelCase keys. Do not rename fields without migrating both.

use serde::{Deserialize, Serialize};

/// One registered visa application. Immutable input to every poll attempt.
///
/// `application_id` (the CEAC case number) is the sole identity key across the
/// registry, the change tracker, and outgoing notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Consular post code, e.g. `BEJ`.
    pub location: String,
    pub application_id: String,
    pub passport_number: String,
    /// First five letters of the applicant's surname, as the status form wants it.
    #[serde(rename = "first_5_letters_of_surname")]
    pub surname_prefix: String,
}

/// Status fields obtained from a single poll attempt (page scrape or mailbox
/// fetch). Compared by full structural equality against the previous snapshot
/// for the same application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Short status label, e.g. `Issued`.
    #[serde(default)]
    pub status: String,
    /// Longer detail text. The page scrape leaves this empty; the mail path
    /// fills it from the reply body.
    #[serde(default)]
    pub status_content: String,
    /// Submission date as printed by the page (`02-Jan-2006` style).
    #[serde(default)]
    pub created: String,
    /// Status date as printed by the page.
    #[serde(default)]
    pub last_updated: String,
    /// Result code attached at the API boundary (200 on success).
    #[serde(default)]
    pub code: u16,
}

/// Payload POSTed to the notification webhook. Key names are the webhook's
/// contract, not ours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub sys: String,
    #[serde(rename = "consDist")]
    pub cons_dist: String,
    #[serde(rename = "monCountry")]
    pub mon_country: String,
    #[serde(rename = "apptTime")]
    pub appt_time: String,
    pub status: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub remark: String,
}

/// Solved-CAPTCHA response from the OCR service. `err_no == 0` means the
/// solve succeeded and `pic_str` holds the text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptchaSolution {
    #[serde(default)]
    pub err_no: i64,
    #[serde(default)]
    pub err_str: String,
    #[serde(default)]
    pub pic_id: String,
    #[serde(default)]
    pub pic_str: String,
}
