//! Remark text for outgoing notifications.
//!
//! The webhook consumer renders `remark` verbatim to end users, so the wording
//! and the Chinese date style are part of the contract.

use chrono::{Datelike, NaiveDate};

use crate::core::types::{Application, NotificationPayload, StatusSnapshot};

/// Marker string the webhook consumer groups these notifications under.
pub const CHANNEL_TAG: &str = "美签预约状态查询";

/// Re-render a `02-Jan-2006`-style page date as `2006年1月2日`. Falls back to
/// the raw string when the page prints something unexpected.
fn humanize_page_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw.trim(), "%d-%b-%Y") {
        Ok(d) => format!("{}年{}月{}日", d.year(), d.month(), d.day()),
        Err(_) => raw.trim().to_string(),
    }
}

/// Remark for a visa-status change detected by the page scrape.
pub fn format_visa_status(snapshot: &StatusSnapshot, app: &Application) -> String {
    format!(
        "\n\n\n签证状态：{}\n创建日期：{}\n最后更新：{}\n详细信息：{}\n预约号：{}\n护照号：{}\n\n\n",
        snapshot.status,
        humanize_page_date(&snapshot.created),
        humanize_page_date(&snapshot.last_updated),
        snapshot.status_content,
        app.application_id,
        app.passport_number,
    )
}

/// Remark for a passport-status report from the mail round-trip.
pub fn format_passport_status(content: &str, passport_number: &str) -> String {
    format!(
        "\n\n\n当前您的护照状态是：{}\n护照号：{}\n\n\n",
        content, passport_number
    )
}

/// Payload for the change-gated visa-status notification.
pub fn visa_status_payload(app: &Application, snapshot: &StatusSnapshot) -> NotificationPayload {
    NotificationPayload {
        sys: app.location.clone(),
        cons_dist: CHANNEL_TAG.to_string(),
        mon_country: CHANNEL_TAG.to_string(),
        appt_time: snapshot.last_updated.clone(),
        status: "2".to_string(),
        user_name: app.application_id.clone(),
        remark: format_visa_status(snapshot, app),
    }
}

/// Payload for the per-sweep passport-tracking notification.
pub fn passport_status_payload(app: &Application, snapshot: &StatusSnapshot) -> NotificationPayload {
    NotificationPayload {
        sys: app.location.clone(),
        cons_dist: CHANNEL_TAG.to_string(),
        mon_country: CHANNEL_TAG.to_string(),
        appt_time: "美签护照状态查询".to_string(),
        status: "2".to_string(),
        user_name: app.application_id.clone(),
        remark: format_passport_status(&snapshot.status, &app.passport_number),
    }
}
