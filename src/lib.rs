pub mod api;
pub mod captcha;
pub mod core;
pub mod mail;
pub mod notify;
pub mod registry;
pub mod scheduler;
pub mod scraping;
pub mod tracker;

// --- Primary core exports ---
pub use crate::core::errors::CheckError;
pub use crate::core::types::{Application, NotificationPayload, StatusSnapshot};
pub use crate::core::AppState;

pub use captcha::CaptchaSolver;
pub use mail::{EmailTrackingClient, PassportProbe};
pub use notify::{NotificationDispatcher, NotificationSink};
pub use registry::{ApplicationRegistry, MemoryRegistry, RedisRegistry};
pub use scheduler::Sweeper;
pub use scraping::{StatusPageDriver, StatusProbe};
pub use tracker::ChangeTracker;
