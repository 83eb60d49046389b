// crates/transformer-config/src/schema.rs
// ============================================================================
// Module: Config Schemas
// Description: JSON schema builders for transformer.toml.
// Purpose: Provide a canonical validation schema for config artifacts.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! This module defines the JSON Schema for transformer configuration. It
//! mirrors the serde model (defaults are taken from the same functions) and
//! covers single-field constraints; cross-field invariants are enforced only
//! by [`crate::TransformerConfig::validate`].

use serde_json::Value;
use serde_json::json;

use crate::config::MIN_WINDOW_EXTENT;
use crate::config::default_add_bias_linear;
use crate::config::default_attention_dropout;
use crate::config::default_attention_softmax_in_fp32;
use crate::config::default_clone_scatter_output_in_embedding;
use crate::config::default_fp8_amax_history_len;
use crate::config::default_fp8_interval;
use crate::config::default_fp8_wgrad;
use crate::config::default_hidden_dropout;
use crate::config::default_init_method_std;
use crate::config::default_layernorm_epsilon;
use crate::config::default_moe_router_topk;
use crate::config::default_offload_activations;
use crate::config::default_offload_weights;
use crate::config::default_parallel_size;

/// Returns the JSON schema for `transformer.toml`.
#[must_use]
pub fn config_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "transformer-config://schemas/config.schema.json",
        "title": "Transformer Configuration",
        "description": "Architecture, parallelism, and precision settings for one training run.",
        "type": "object",
        "properties": {
            "model": model_config_schema(),
            "parallel": parallel_config_schema(),
            "precision": precision_config_schema(),
            "init": init_config_schema(),
            "fusion": fusion_config_schema(),
            "recompute": recompute_config_schema(),
            "fp8": fp8_config_schema(),
            "moe": moe_config_schema(),
            "offload": offload_config_schema()
        },
        "required": ["model"],
        "additionalProperties": false
    })
}

// ============================================================================
// SECTION: Model Architecture
// ============================================================================

/// Schema for the `[model]` section.
fn model_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "num_layers": schema_for_positive_integer("Number of transformer layers."),
            "hidden_size": schema_for_positive_integer("Transformer hidden size."),
            "num_attention_heads": schema_for_positive_integer(
                "Attention heads; must divide evenly across tensor-parallel ranks."
            ),
            "num_query_groups": nullable(schema_for_positive_integer(
                "Query groups for grouped-query attention (defaults to num_attention_heads)."
            )),
            "ffn_hidden_size": nullable(schema_for_positive_integer(
                "Feed-forward hidden size (defaults to 4 * hidden_size)."
            )),
            "kv_channels": nullable(schema_for_positive_integer(
                "Per-head projection width (defaults to hidden_size / num_attention_heads)."
            )),
            "hidden_dropout": schema_for_probability(
                "Dropout probability for the hidden state.",
                default_hidden_dropout()
            ),
            "attention_dropout": schema_for_probability(
                "Post-attention dropout probability.",
                default_attention_dropout()
            ),
            "apply_residual_connection_post_layernorm": schema_for_bool(
                "Take the residual after layernorm (original BERT ordering).",
                false
            ),
            "layernorm_epsilon": {
                "type": "number",
                "exclusiveMinimum": 0,
                "default": default_layernorm_epsilon(),
                "description": "Layer norm epsilon."
            },
            "layernorm_zero_centered_gamma": schema_for_bool(
                "Center layer norm gamma around zero.",
                false
            ),
            "add_bias_linear": schema_for_bool(
                "Include bias terms in all linear layers.",
                default_add_bias_linear()
            ),
            "gated_linear_unit": schema_for_bool(
                "Use a gated linear unit for the first MLP projection.",
                false
            ),
            "activation_func": {
                "type": "string",
                "enum": ["gelu", "silu", "relu", "quick_gelu"],
                "default": "gelu",
                "description": "MLP non-linearity."
            },
            "normalization": {
                "type": "string",
                "enum": ["LayerNorm", "RMSNorm"],
                "default": "LayerNorm",
                "description": "Normalization layer kind."
            },
            "window_size": nullable(json!({
                "type": "array",
                "items": { "type": "integer", "minimum": MIN_WINDOW_EXTENT },
                "minItems": 2,
                "maxItems": 2,
                "description": "Sliding attention window [left, right]; -1 is unbounded."
            })),
            "clone_scatter_output_in_embedding": schema_for_bool(
                "Clone the scattered embedding output so its input can be freed early.",
                default_clone_scatter_output_in_embedding()
            )
        },
        "required": ["num_layers", "hidden_size", "num_attention_heads"],
        "additionalProperties": false
    })
}

// ============================================================================
// SECTION: Parallelism and Precision
// ============================================================================

/// Schema for the `[parallel]` section.
fn parallel_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "tensor_model_parallel_size": schema_for_parallel_degree("Tensor-parallel degree."),
            "pipeline_model_parallel_size": schema_for_parallel_degree(
                "Pipeline-parallel degree; > 1 requires pipeline_dtype."
            ),
            "virtual_pipeline_model_parallel_size": nullable(schema_for_positive_integer(
                "Interleaved pipeline stages per rank; must divide num_layers when recomputing."
            )),
            "sequence_parallel": schema_for_bool(
                "Shard activations along the sequence dimension (requires tensor parallelism).",
                false
            ),
            "expert_model_parallel_size": schema_for_parallel_degree(
                "Expert-parallel degree; > 1 requires moe.num_experts."
            ),
            "pipeline_dtype": nullable(schema_for_dtype("Dtype communicated between pipeline stages."))
        },
        "additionalProperties": false
    })
}

/// Schema for the `[precision]` section.
fn precision_config_schema() -> Value {
    let mut params_dtype = schema_for_dtype("Dtype of model parameters.");
    params_dtype["default"] = json!("fp32");
    json!({
        "type": "object",
        "properties": {
            "fp16": schema_for_bool("Train with fp16 mixed precision (exclusive with bf16).", false),
            "bf16": schema_for_bool("Train with bf16 mixed precision (exclusive with fp16).", false),
            "params_dtype": params_dtype,
            "autocast_dtype": nullable(schema_for_dtype(
                "Dtype inside autocast regions (defaults to params_dtype)."
            )),
            "fp32_residual_connection": schema_for_bool("Keep residual connections in fp32.", false),
            "apply_query_key_layer_scaling": schema_for_bool(
                "Scale Q * K^T by 1 / layer number; forces attention_softmax_in_fp32.",
                false
            ),
            "attention_softmax_in_fp32": schema_for_bool(
                "Run attention masking and softmax in fp32.",
                default_attention_softmax_in_fp32()
            )
        },
        "additionalProperties": false
    })
}

// ============================================================================
// SECTION: Initialization and Fusion
// ============================================================================

/// Schema for the `[init]` section.
fn init_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "init_method_std": {
                "type": "number",
                "exclusiveMinimum": 0,
                "default": default_init_method_std(),
                "description": "Standard deviation of the default normal initializers."
            },
            "init_method": nullable(init_method_schema(
                "Initializer for most weights (defaults to normal(init_method_std))."
            )),
            "output_layer_init_method": nullable(init_method_schema(
                "Initializer for output projections (defaults to scaled_normal(init_method_std, \
                 num_layers))."
            ))
        },
        "additionalProperties": false
    })
}

/// Schema for an initializer table.
fn init_method_schema(description: &str) -> Value {
    json!({
        "description": description,
        "oneOf": [
            {
                "type": "object",
                "properties": {
                    "kind": { "const": "normal" },
                    "std": { "type": "number", "exclusiveMinimum": 0 }
                },
                "required": ["kind", "std"],
                "additionalProperties": false
            },
            {
                "type": "object",
                "properties": {
                    "kind": { "const": "scaled_normal" },
                    "std": { "type": "number", "exclusiveMinimum": 0 },
                    "num_layers": { "type": "integer", "minimum": 1 }
                },
                "required": ["kind", "std", "num_layers"],
                "additionalProperties": false
            }
        ]
    })
}

/// Schema for the `[fusion]` section.
fn fusion_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "bias_activation_fusion": schema_for_bool(
                "Fuse MLP bias add with the activation (gelu or silu only; gelu needs bias).",
                false
            ),
            "masked_softmax_fusion": schema_for_bool("Use the fused masked softmax kernel.", false),
            "persist_layer_norm": schema_for_bool(
                "Use the persistent fused layer norm kernel.",
                false
            ),
            "bias_dropout_fusion": schema_for_bool(
                "Fuse bias add, dropout, and residual add.",
                false
            ),
            "apply_rope_fusion": schema_for_bool(
                "Use the fused rotary position embedding kernel.",
                false
            )
        },
        "additionalProperties": false
    })
}

// ============================================================================
// SECTION: Recompute, FP8, MoE, Offload
// ============================================================================

/// Schema for the `[recompute]` section.
fn recompute_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "granularity": nullable(json!({
                "type": "string",
                "enum": ["full", "selective"],
                "description": "Recompute granularity; unset disables recomputation."
            })),
            "method": nullable(json!({
                "type": "string",
                "enum": ["uniform", "block"],
                "description": "Layer distribution for full recomputation."
            })),
            "num_layers": nullable(schema_for_positive_integer(
                "Layers per recompute unit (uniform) or per stage (block); full only."
            )),
            "distribute_saved_activations": schema_for_bool(
                "Distribute recomputed activations across the model-parallel group.",
                false
            )
        },
        "additionalProperties": false
    })
}

/// Schema for the `[fp8]` section.
fn fp8_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "format": nullable(json!({
                "type": "string",
                "enum": ["e4m3", "hybrid"],
                "description": "FP8 recipe; unset disables FP8."
            })),
            "margin": {
                "type": "integer",
                "default": 0,
                "description": "Margin for the scaling factor computation."
            },
            "interval": {
                "type": "integer",
                "minimum": 1,
                "default": default_fp8_interval(),
                "description": "Steps between scaling factor recomputations."
            },
            "amax_history_len": {
                "type": "integer",
                "minimum": 1,
                "default": default_fp8_amax_history_len(),
                "description": "Length of the amax history window."
            },
            "amax_compute_algo": {
                "type": "string",
                "enum": ["max", "most_recent"],
                "default": "most_recent",
                "description": "How amax is chosen from the history window."
            },
            "wgrad": schema_for_bool(
                "Compute weight gradients in FP8.",
                default_fp8_wgrad()
            )
        },
        "additionalProperties": false
    })
}

/// Schema for the `[moe]` section.
fn moe_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "num_experts": nullable(schema_for_positive_integer(
                "Number of experts; unset keeps a dense MLP."
            )),
            "router_load_balancing_type": {
                "type": "string",
                "enum": ["aux_loss", "sinkhorn", "none"],
                "default": "aux_loss",
                "description": "Router load-balancing strategy."
            },
            "router_topk": {
                "type": "integer",
                "minimum": 1,
                "default": default_moe_router_topk(),
                "description": "Experts each token is routed to (at most num_experts)."
            },
            "grouped_gemm": schema_for_bool(
                "Batch local expert GEMMs into one grouped kernel launch.",
                false
            ),
            "aux_loss_coeff": schema_for_coefficient("Auxiliary load-balancing loss scale.", Some(0.0)),
            "z_loss_coeff": nullable(schema_for_coefficient("Router z-loss scale.", None)),
            "input_jitter_eps": nullable(schema_for_coefficient("Router input jitter epsilon.", None)),
            "token_dropping": schema_for_bool(
                "Drop and pad tokens to a fixed expert capacity (not supported).",
                false
            )
        },
        "additionalProperties": false
    })
}

/// Schema for the `[offload]` section.
fn offload_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "cpu_offloading": schema_for_bool(
                "Offload layer state to host memory (no pipeline parallelism or recompute).",
                false
            ),
            "num_layers": {
                "type": "integer",
                "minimum": 0,
                "default": 0,
                "description": "Layers to offload; must be less than model.num_layers."
            },
            "activations": schema_for_bool("Offload activations.", default_offload_activations()),
            "weights": schema_for_bool("Offload weights.", default_offload_weights())
        },
        "additionalProperties": false
    })
}

// ============================================================================
// SECTION: Schema Helpers
// ============================================================================

/// Wraps a schema so `null` is also accepted.
fn nullable(schema: Value) -> Value {
    json!({
        "oneOf": [
            { "type": "null" },
            schema
        ],
        "default": null
    })
}

/// Schema for a strictly positive integer.
fn schema_for_positive_integer(description: &str) -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "description": description
    })
}

/// Schema for a parallel degree.
fn schema_for_parallel_degree(description: &str) -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "default": default_parallel_size(),
        "description": description
    })
}

/// Schema for a probability in `[0, 1)`.
fn schema_for_probability(description: &str, default: f64) -> Value {
    json!({
        "type": "number",
        "minimum": 0,
        "exclusiveMaximum": 1,
        "default": default,
        "description": description
    })
}

/// Schema for a non-negative coefficient.
fn schema_for_coefficient(description: &str, default: Option<f64>) -> Value {
    let mut schema = json!({
        "type": "number",
        "minimum": 0,
        "description": description
    });
    if let Some(default) = default {
        schema["default"] = json!(default);
    }
    schema
}

/// Schema for a boolean with a default.
fn schema_for_bool(description: &str, default: bool) -> Value {
    json!({
        "type": "boolean",
        "default": default,
        "description": description
    })
}

/// Schema for a dtype name.
fn schema_for_dtype(description: &str) -> Value {
    json!({
        "type": "string",
        "enum": ["fp32", "fp16", "bf16"],
        "description": description
    })
}
