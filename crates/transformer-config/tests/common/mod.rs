// crates/transformer-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for transformer-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use transformer_config::ConfigError;
use transformer_config::TransformerConfig;

/// Minimal model section accepted by validation.
pub const MINIMAL_MODEL: &str = "[model]\nnum_layers = 8\nhidden_size = 512\nnum_attention_heads = 8\n";

/// Parses a TOML string into an unvalidated `TransformerConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<TransformerConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all serde defaults applied and nothing resolved.
pub fn minimal_config() -> Result<TransformerConfig, toml::de::Error> {
    config_from_toml(MINIMAL_MODEL)
}

/// Parses and validates the minimal model followed by extra TOML tables.
pub fn validated_with(extra: &str) -> Result<TransformerConfig, ConfigError> {
    TransformerConfig::from_toml_str(&format!("{MINIMAL_MODEL}{extra}"))
}

/// Assert that a validation result is an error containing a specific substring.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error '{message}' did not contain '{needle}'"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
