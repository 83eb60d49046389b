// crates/transformer-config/src/presets.rs
// ============================================================================
// Module: Config Presets
// Description: Ready-made, validated model configurations.
// Purpose: Provide reference layouts for tests, tooling, and new runs.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! Presets are built in code and validated before they are returned, so a
//! preset is always a resolved configuration.

use crate::activation::Activation;
use crate::config::ConfigError;
use crate::config::Dtype;
use crate::config::Fp8Config;
use crate::config::FusionConfig;
use crate::config::InitConfig;
use crate::config::ModelConfig;
use crate::config::MoeConfig;
use crate::config::Normalization;
use crate::config::OffloadConfig;
use crate::config::ParallelConfig;
use crate::config::PrecisionConfig;
use crate::config::RecomputeConfig;
use crate::config::TransformerConfig;
use crate::config::default_add_bias_linear;
use crate::config::default_attention_dropout;
use crate::config::default_clone_scatter_output_in_embedding;
use crate::config::default_hidden_dropout;
use crate::config::default_layernorm_epsilon;

/// Returns a two-layer dense model for unit tests and smoke runs.
///
/// # Errors
///
/// Returns [`ConfigError`] if the preset fails validation.
pub fn tiny() -> Result<TransformerConfig, ConfigError> {
    let mut model = base_model(2, 64, 4);
    model.hidden_dropout = 0.0;
    model.attention_dropout = 0.0;
    finish(TransformerConfig {
        model,
        parallel: ParallelConfig::default(),
        precision: PrecisionConfig::default(),
        init: InitConfig::default(),
        fusion: FusionConfig::default(),
        recompute: RecomputeConfig::default(),
        fp8: Fp8Config::default(),
        moe: MoeConfig::default(),
        offload: OffloadConfig::default(),
    })
}

/// Returns the Mixtral 8x7B sparse mixture-of-experts layout.
///
/// 32 layers, 32 heads sharing 8 key/value groups, `SwiGLU` experts with
/// top-2 routing, RMS normalization, no linear biases, bf16 training.
///
/// # Errors
///
/// Returns [`ConfigError`] if the preset fails validation.
pub fn mixtral_8x7b() -> Result<TransformerConfig, ConfigError> {
    let mut model = base_model(32, 4096, 32);
    model.num_query_groups = Some(8);
    model.ffn_hidden_size = Some(14_336);
    model.hidden_dropout = 0.0;
    model.attention_dropout = 0.0;
    model.add_bias_linear = false;
    model.gated_linear_unit = true;
    model.activation_func = Activation::Silu;
    model.normalization = Normalization::RmsNorm;
    finish(TransformerConfig {
        model,
        parallel: ParallelConfig::default(),
        precision: PrecisionConfig {
            bf16: true,
            params_dtype: Dtype::Bf16,
            ..PrecisionConfig::default()
        },
        init: InitConfig::default(),
        fusion: FusionConfig::default(),
        recompute: RecomputeConfig::default(),
        fp8: Fp8Config::default(),
        moe: MoeConfig {
            num_experts: Some(8),
            router_topk: 2,
            aux_loss_coeff: 0.02,
            ..MoeConfig::default()
        },
        offload: OffloadConfig::default(),
    })
}

/// Builds a dense architecture with default layer options.
fn base_model(num_layers: u32, hidden_size: u64, num_attention_heads: u32) -> ModelConfig {
    ModelConfig {
        num_layers,
        hidden_size,
        num_attention_heads,
        num_query_groups: None,
        ffn_hidden_size: None,
        kv_channels: None,
        hidden_dropout: default_hidden_dropout(),
        attention_dropout: default_attention_dropout(),
        apply_residual_connection_post_layernorm: false,
        layernorm_epsilon: default_layernorm_epsilon(),
        layernorm_zero_centered_gamma: false,
        add_bias_linear: default_add_bias_linear(),
        gated_linear_unit: false,
        activation_func: Activation::Gelu,
        normalization: Normalization::LayerNorm,
        window_size: None,
        clone_scatter_output_in_embedding: default_clone_scatter_output_in_embedding(),
    }
}

/// Validates a preset before handing it out.
fn finish(mut config: TransformerConfig) -> Result<TransformerConfig, ConfigError> {
    config.validate()?;
    Ok(config)
}
