//! Config defaults and resolution tests for transformer-config.
// crates/transformer-config/tests/config_defaults.rs
// =============================================================================
// Module: Config Defaults and Resolution Tests
// Description: Validate default values and derived-size resolution.
// Purpose: Ensure a minimal config validates and resolves every omitted value.
// =============================================================================

use transformer_config::Activation;
use transformer_config::Dtype;
use transformer_config::InitMethod;
use transformer_config::Normalization;
use transformer_config::TransformerConfig;

mod common;

type TestResult = Result<(), String>;

#[test]
fn minimal_config_validates() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn missing_model_section_is_a_parse_error() -> TestResult {
    common::assert_invalid(TransformerConfig::from_toml_str(""), "config parse error")
}

#[test]
fn unknown_fields_are_rejected() -> TestResult {
    common::assert_invalid(common::validated_with("[parallel]\ntensor_parallel = 2\n"), "unknown field")
}

#[test]
fn initializer_tables_reject_unknown_keys() -> TestResult {
    common::assert_invalid(
        common::validated_with(
            "[init]\ninit_method = { kind = \"normal\", std = 0.01, num_layers = 3 }\n",
        ),
        "unknown field",
    )
}

#[test]
fn section_defaults_match_documented_values() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    if config.parallel.tensor_model_parallel_size != 1
        || config.parallel.pipeline_model_parallel_size != 1
        || config.parallel.expert_model_parallel_size != 1
    {
        return Err("parallel degrees should default to 1".to_string());
    }
    if config.precision.fp16 || config.precision.bf16 {
        return Err("reduced precision should default to off".to_string());
    }
    if config.precision.params_dtype != Dtype::Fp32 || !config.precision.attention_softmax_in_fp32 {
        return Err("precision defaults should be fp32 params with fp32 softmax".to_string());
    }
    if (config.model.hidden_dropout - 0.1).abs() > f64::EPSILON
        || (config.model.attention_dropout - 0.1).abs() > f64::EPSILON
    {
        return Err("dropouts should default to 0.1".to_string());
    }
    if (config.model.layernorm_epsilon - 1e-5).abs() > f64::EPSILON {
        return Err("layernorm_epsilon should default to 1e-5".to_string());
    }
    if !config.model.add_bias_linear || config.model.gated_linear_unit {
        return Err("linear layers should default to biased and ungated".to_string());
    }
    if config.model.activation_func != Activation::Gelu
        || config.model.normalization != Normalization::LayerNorm
    {
        return Err("activation and normalization should default to gelu and LayerNorm".to_string());
    }
    if (config.init.init_method_std - 0.02).abs() > f64::EPSILON {
        return Err("init_method_std should default to 0.02".to_string());
    }
    if config.moe.router_topk != 2 || config.is_moe() {
        return Err("moe should be off with router_topk 2".to_string());
    }
    if config.fp8_enabled() || config.fp8.interval != 1 || config.fp8.amax_history_len != 1 {
        return Err("fp8 should be off with unit interval and history".to_string());
    }
    Ok(())
}

#[test]
fn derived_sizes_resolve_from_hidden_size_and_heads() -> TestResult {
    let config = common::validated_with("").map_err(|err| err.to_string())?;
    if config.model.ffn_hidden_size != Some(2048) {
        return Err(format!("ffn_hidden_size resolved to {:?}", config.model.ffn_hidden_size));
    }
    if config.model.kv_channels != Some(64) {
        return Err(format!("kv_channels resolved to {:?}", config.model.kv_channels));
    }
    if config.model.num_query_groups != Some(8) {
        return Err(format!("num_query_groups resolved to {:?}", config.model.num_query_groups));
    }
    if config.precision.autocast_dtype != Some(Dtype::Fp32) {
        return Err("autocast_dtype should resolve to params_dtype".to_string());
    }
    Ok(())
}

#[test]
fn explicit_sizes_are_not_overwritten() -> TestResult {
    let config = TransformerConfig::from_toml_str(
        "[model]\nnum_layers = 4\nhidden_size = 512\nnum_attention_heads = 8\n\
         ffn_hidden_size = 1376\nkv_channels = 128\nnum_query_groups = 2\n",
    )
    .map_err(|err| err.to_string())?;
    if config.ffn_hidden_size() != 1376 || config.kv_channels() != 128 {
        return Err("explicit sizes must be preserved".to_string());
    }
    if config.query_projection_size() != 1024 || config.kv_projection_size() != 256 {
        return Err("projection sizes must use explicit kv_channels".to_string());
    }
    Ok(())
}

#[test]
fn default_initializers_resolve_from_std_and_depth() -> TestResult {
    let config = common::validated_with("[init]\ninit_method_std = 0.01\n")
        .map_err(|err| err.to_string())?;
    if config.init.init_method != Some(InitMethod::normal(0.01)) {
        return Err("init_method should resolve to normal(init_method_std)".to_string());
    }
    if config.init.output_layer_init_method != Some(InitMethod::scaled_normal(0.01, 8)) {
        return Err("output_layer_init_method should resolve to scaled_normal".to_string());
    }
    if (config.output_layer_init_method().effective_std() - 0.0025).abs() > 1e-12 {
        return Err("scaled std should be std / sqrt(2 * num_layers)".to_string());
    }
    Ok(())
}

#[test]
fn explicit_initializers_are_kept() -> TestResult {
    let config = common::validated_with(
        "[init]\ninit_method = { kind = \"normal\", std = 0.05 }\n\
         output_layer_init_method = { kind = \"normal\", std = 0.001 }\n",
    )
    .map_err(|err| err.to_string())?;
    if config.init_method() != InitMethod::normal(0.05) {
        return Err("explicit init_method should be kept".to_string());
    }
    if config.output_layer_init_method() != InitMethod::normal(0.001) {
        return Err("explicit output_layer_init_method should be kept".to_string());
    }
    Ok(())
}

#[test]
fn query_key_layer_scaling_forces_fp32_softmax() -> TestResult {
    let config = common::validated_with(
        "[precision]\napply_query_key_layer_scaling = true\nattention_softmax_in_fp32 = false\n",
    )
    .map_err(|err| err.to_string())?;
    if !config.precision.attention_softmax_in_fp32 {
        return Err("query/key layer scaling must force fp32 softmax".to_string());
    }
    Ok(())
}

#[test]
fn validation_is_idempotent() -> TestResult {
    let mut config = common::validated_with("[precision]\nbf16 = true\n").map_err(|err| err.to_string())?;
    let first = config.clone();
    config.validate().map_err(|err| err.to_string())?;
    if config != first {
        return Err("re-validating must not change a resolved config".to_string());
    }
    Ok(())
}

#[test]
fn resolved_config_round_trips_through_toml() -> TestResult {
    let config = common::validated_with("[precision]\nbf16 = true\n").map_err(|err| err.to_string())?;
    let rendered = toml::to_string(&config).map_err(|err| err.to_string())?;
    let reparsed = TransformerConfig::from_toml_str(&rendered).map_err(|err| err.to_string())?;
    if reparsed != config {
        return Err("resolved config should reparse to itself".to_string());
    }
    Ok(())
}

#[test]
fn invalid_enum_strings_fail_to_parse() -> TestResult {
    common::assert_invalid(
        common::validated_with("[recompute]\ngranularity = \"partial\"\n"),
        "config parse error",
    )?;
    common::assert_invalid(
        TransformerConfig::from_toml_str(
            "[model]\nnum_layers = 2\nhidden_size = 64\nnum_attention_heads = 4\n\
             activation_func = \"tanh\"\n",
        ),
        "config parse error",
    )
}
