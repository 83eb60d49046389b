// crates/transformer-config/tests/proptest_divisibility.rs
// ============================================================================
// Module: Divisibility Property-Based Tests
// Description: Property tests for head, group, and layer divisibility rules.
// Purpose: Check validation agrees with the arithmetic it enforces.
// ============================================================================

//! Property-based tests for parallel divisibility invariants.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use transformer_config::TransformerConfig;

fn config_toml(heads: u32, groups: u32, tp: u32, kv_channels: u64) -> String {
    format!(
        "[model]\nnum_layers = 4\nhidden_size = {hidden}\nnum_attention_heads = {heads}\n\
         num_query_groups = {groups}\n\n[parallel]\ntensor_model_parallel_size = {tp}\n",
        hidden = u64::from(heads) * kv_channels,
    )
}

proptest! {
    #[test]
    fn tensor_parallel_layout_accepted_iff_evenly_divisible(
        heads in 1_u32 .. 64,
        groups in 1_u32 .. 64,
        tp in 1_u32 .. 16,
        kv_channels in 1_u64 .. 256,
    ) {
        let expected = heads % tp == 0 && groups % tp == 0 && heads % groups == 0;
        let result = TransformerConfig::from_toml_str(&config_toml(heads, groups, tp, kv_channels));
        prop_assert_eq!(result.is_ok(), expected);
    }

    #[test]
    fn resolved_sizes_are_consistent(
        heads in 1_u32 .. 64,
        kv_channels in 1_u64 .. 256,
    ) {
        let config = TransformerConfig::from_toml_str(&config_toml(heads, heads, 1, kv_channels))
            .unwrap();
        prop_assert_eq!(config.kv_channels(), kv_channels);
        prop_assert_eq!(config.ffn_hidden_size(), 4 * u64::from(heads) * kv_channels);
        prop_assert_eq!(config.query_projection_size(), config.model.hidden_size);
    }

    #[test]
    fn full_recompute_layers_bounded_by_stage_size(
        stages in 1_u32 .. 8,
        layers_per_stage in 1_u32 .. 8,
        recompute_layers in 0_u32 .. 16,
    ) {
        let num_layers = stages * layers_per_stage;
        let toml = format!(
            "[model]\nnum_layers = {num_layers}\nhidden_size = 64\nnum_attention_heads = 4\n\n\
             [parallel]\npipeline_model_parallel_size = {stages}\npipeline_dtype = \"bf16\"\n\n\
             [recompute]\ngranularity = \"full\"\nmethod = \"uniform\"\n\
             num_layers = {recompute_layers}\n"
        );
        let expected = recompute_layers >= 1 && recompute_layers <= layers_per_stage;
        prop_assert_eq!(TransformerConfig::from_toml_str(&toml).is_ok(), expected);
    }
}
