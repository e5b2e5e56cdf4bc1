//! Shared handles constructed once at startup and passed everywhere —
//! no globals, no ambient store clients.

use std::sync::Arc;

use crate::core::config::SentinelConfig;
use crate::mail::PassportProbe;
use crate::notify::NotificationSink;
use crate::registry::ApplicationRegistry;
use crate::scraping::StatusProbe;

#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub registry: Arc<dyn ApplicationRegistry>,
    pub status_probe: Arc<dyn StatusProbe>,
    pub passport_probe: Arc<dyn PassportProbe>,
    pub sink: Arc<dyn NotificationSink>,
    pub config: Arc<SentinelConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
