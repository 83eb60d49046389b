//! Activation recompute validation tests for transformer-config.
// crates/transformer-config/tests/recompute_validation.rs
// =============================================================================
// Module: Recompute Validation Tests
// Description: Validate full and selective recompute settings.
// Purpose: Ensure recompute granularity, method, and layer counts agree.
// =============================================================================

use transformer_config::RecomputeGranularity;
use transformer_config::RecomputeMethod;

mod common;

type TestResult = Result<(), String>;

#[test]
fn full_recompute_requires_method() -> TestResult {
    common::assert_invalid(
        common::validated_with("[recompute]\ngranularity = \"full\"\nnum_layers = 1\n"),
        "recompute.granularity=full requires recompute.method (block or uniform)",
    )
}

#[test]
fn full_recompute_requires_num_layers() -> TestResult {
    common::assert_invalid(
        common::validated_with("[recompute]\ngranularity = \"full\"\nmethod = \"uniform\"\n"),
        "recompute.granularity=full requires recompute.num_layers between 1 and the layers per \
         pipeline rank (8)",
    )
}

#[test]
fn full_recompute_num_layers_bounded_by_pipeline_stage() -> TestResult {
    common::assert_invalid(
        common::validated_with(
            "[parallel]\npipeline_model_parallel_size = 2\npipeline_dtype = \"fp16\"\n\n\
             [recompute]\ngranularity = \"full\"\nmethod = \"block\"\nnum_layers = 5\n",
        ),
        "layers per pipeline rank (4)",
    )
}

#[test]
fn full_recompute_with_method_and_layers_validates() -> TestResult {
    let config = common::validated_with(
        "[recompute]\ngranularity = \"full\"\nmethod = \"block\"\nnum_layers = 8\n",
    )
    .map_err(|err| err.to_string())?;
    if config.recompute.granularity != Some(RecomputeGranularity::Full)
        || config.recompute.method != Some(RecomputeMethod::Block)
    {
        return Err("recompute settings should be kept".to_string());
    }
    Ok(())
}

#[test]
fn selective_recompute_rejects_num_layers() -> TestResult {
    common::assert_invalid(
        common::validated_with("[recompute]\ngranularity = \"selective\"\nnum_layers = 2\n"),
        "recompute.num_layers must be unset when recompute.granularity=selective",
    )
}

#[test]
fn selective_recompute_validates_without_layers() -> TestResult {
    common::validated_with("[recompute]\ngranularity = \"selective\"\n")
        .map(|_| ())
        .map_err(|err| err.to_string())
}

#[test]
fn distributed_saved_activations_conflict_with_sequence_parallel() -> TestResult {
    common::assert_invalid(
        common::validated_with(
            "[parallel]\ntensor_model_parallel_size = 2\nsequence_parallel = true\n\n\
             [recompute]\ngranularity = \"selective\"\ndistribute_saved_activations = true\n",
        ),
        "recompute.distribute_saved_activations must be false when parallel.sequence_parallel \
         is enabled",
    )
}

#[test]
fn recompute_requires_layers_divisible_by_virtual_stages() -> TestResult {
    common::assert_invalid(
        common::validated_with(
            "[parallel]\nvirtual_pipeline_model_parallel_size = 3\n\n\
             [recompute]\ngranularity = \"selective\"\n",
        ),
        "model.num_layers (8) must be divisible by parallel.virtual_pipeline_model_parallel_size \
         (3)",
    )
}

#[test]
fn virtual_stages_are_unchecked_without_recompute() -> TestResult {
    common::validated_with("[parallel]\nvirtual_pipeline_model_parallel_size = 3\n")
        .map(|_| ())
        .map_err(|err| err.to_string())
}

#[test]
fn method_without_granularity_is_ignored() -> TestResult {
    common::validated_with("[recompute]\nmethod = \"uniform\"\nnum_layers = 99\n")
        .map(|_| ())
        .map_err(|err| err.to_string())
}
