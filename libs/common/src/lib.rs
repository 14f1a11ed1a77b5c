//! Common utilities for Glyph
//!
//! Provides shared configuration and telemetry bootstrap.

pub mod config;
pub mod telemetry;

pub use config::{AiProviderKind, ConfigError, EngineConfig, MockProviderMode};
pub use telemetry::init_tracing;
