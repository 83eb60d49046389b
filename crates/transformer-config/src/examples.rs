// crates/transformer-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for transformer configuration: a sparse
//! mixture-of-experts model sharded across tensor, pipeline, and expert
//! parallel ranks. The output is deterministic and validates cleanly.

/// Returns a canonical example `transformer.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[model]
num_layers = 32
hidden_size = 4096
num_attention_heads = 32
num_query_groups = 8
ffn_hidden_size = 14336
hidden_dropout = 0.0
attention_dropout = 0.0
add_bias_linear = false
gated_linear_unit = true
activation_func = "silu"
normalization = "RMSNorm"
# window_size = [4096, 0]

[parallel]
tensor_model_parallel_size = 2
pipeline_model_parallel_size = 4
virtual_pipeline_model_parallel_size = 2
sequence_parallel = true
expert_model_parallel_size = 4
pipeline_dtype = "bf16"

[precision]
bf16 = true
params_dtype = "bf16"

[init]
init_method_std = 0.02
# output_layer_init_method = { kind = "scaled_normal", std = 0.02, num_layers = 32 }

[fusion]
bias_activation_fusion = true
masked_softmax_fusion = true
bias_dropout_fusion = true
apply_rope_fusion = true

[recompute]
granularity = "full"
method = "uniform"
num_layers = 1

[moe]
num_experts = 8
router_load_balancing_type = "aux_loss"
router_topk = 2
grouped_gemm = true
aux_loss_coeff = 0.01
"#,
    )
}
