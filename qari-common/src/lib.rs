//! # Qari Common Library
//!
//! Shared code for the Qari recitation analysis services including:
//! - Common error types
//! - Event types (AnalysisEvent enum) and the broadcast EventBus
//! - Configuration loading (TOML file + environment overrides)

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
