// crates/transformer-config/src/lib.rs
// ============================================================================
// Module: Transformer Config Library
// Description: Canonical transformer config model, validation, and artifacts.
// Purpose: Single source of truth for transformer.toml semantics.
// Dependencies: rand, rand_distr, serde, serde_json, thiserror, toml, tracing
// ============================================================================

//! ## Overview
//! `transformer-config` defines the configuration record shared by every
//! layer of a Megatron-style transformer: architecture dimensions, the
//! tensor/pipeline/expert parallel layout, mixed precision, and weight
//! initialization. Loading resolves every omitted default and validates the
//! record fail-closed, so downstream code only ever sees a consistent config.
//! The crate also provides deterministic generators for the config schema,
//! an example file, and the reference docs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod activation;
pub mod config;
pub mod docs;
pub mod examples;
pub mod init;
pub mod presets;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use activation::Activation;
pub use config::*;
pub use docs::DOCS_PATH;
pub use docs::DocsError;
pub use docs::config_docs_markdown;
pub use docs::verify_config_docs;
pub use docs::write_config_docs;
pub use examples::config_toml_example;
pub use init::InitError;
pub use init::InitMethod;
pub use schema::config_schema;
