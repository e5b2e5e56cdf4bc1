pub mod browser;
pub mod status_page;

pub use status_page::{StatusPageDriver, StatusProbe};
