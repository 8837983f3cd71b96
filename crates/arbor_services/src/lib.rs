//! Arbor Services Layer
//!
//! Host-side plumbing around the core: settings files today.

pub mod settings;

pub use settings::{LoggingSettings, Settings, SettingsError};
