//! Application configuration, loaded from environment variables (layered
//! over an optional `.env` file) rather than hardcoded.
//!
//! Uses the `config` crate's layered `Environment` source so defaults and
//! overrides compose instead of every field needing its own `unwrap_or`
//! fallback.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Which `AiProvider` the engine constructs at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiProviderKind {
    Mock,
    /// Not implemented yet; reserved for a future HTTP-backed adapter.
    Live,
}

/// Deterministic failure mode for `MockAiProvider`, only consulted when
/// `ai_provider_kind = mock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockProviderMode {
    Success,
    SchemaViolation,
    Timeout,
    TransientError,
}

/// Everything the engine needs to stand up its storage and AI provider.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub database_url: String,
    #[serde(default = "default_provider_kind")]
    pub ai_provider_kind: AiProviderKind,
    #[serde(default = "default_mock_mode")]
    pub mock_provider_mode: MockProviderMode,
    #[serde(default)]
    pub mock_provider_seed: u64,
}

const fn default_provider_kind() -> AiProviderKind {
    AiProviderKind::Mock
}

const fn default_mock_mode() -> MockProviderMode {
    MockProviderMode::Success
}

impl EngineConfig {
    /// Load `.env` if present, then layer `DATABASE_URL`,
    /// `AI_PROVIDER_KIND`, `MOCK_PROVIDER_MODE`, and `MOCK_PROVIDER_SEED`
    /// environment variables over the defaults above.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if `database_url` is unset or any value
    /// fails to parse into its target type.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .set_default("ai_provider_kind", "mock")?
            .set_default("mock_provider_mode", "success")?
            .set_default("mock_provider_seed", 0)?
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds config the same way `load` does, but from explicit overrides
    /// instead of process environment variables, so tests stay isolated
    /// from each other and never need `unsafe` env mutation (forbidden
    /// workspace-wide).
    fn build(overrides: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("ai_provider_kind", "mock")?
            .set_default("mock_provider_mode", "success")?
            .set_default("mock_provider_seed", 0)?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        Ok(builder.build()?.try_deserialize()?)
    }

    #[test]
    fn missing_database_url_is_a_config_error() {
        assert!(build(&[]).is_err());
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = build(&[("database_url", "postgres://localhost/test")]).unwrap();
        assert_eq!(config.ai_provider_kind, AiProviderKind::Mock);
        assert_eq!(config.mock_provider_mode, MockProviderMode::Success);
        assert_eq!(config.mock_provider_seed, 0);
    }

    #[test]
    fn override_selects_live_provider() {
        let config = build(&[
            ("database_url", "postgres://localhost/test"),
            ("ai_provider_kind", "live"),
        ])
        .unwrap();
        assert_eq!(config.ai_provider_kind, AiProviderKind::Live);
    }
}
