//! Parallel layout validation tests for transformer-config.
// crates/transformer-config/tests/parallel_validation.rs
// =============================================================================
// Module: Parallel Layout Validation Tests
// Description: Validate tensor, pipeline, sequence, and expert parallel rules.
// Purpose: Ensure heads and groups shard evenly and parallel modes are consistent.
// =============================================================================

use transformer_config::Dtype;

mod common;

type TestResult = Result<(), String>;

// ============================================================================
// SECTION: Parallel Degrees
// ============================================================================

#[test]
fn zero_tensor_parallel_size_is_rejected() -> TestResult {
    common::assert_invalid(
        common::validated_with("[parallel]\ntensor_model_parallel_size = 0\n"),
        "parallel.tensor_model_parallel_size must be at least 1",
    )
}

#[test]
fn zero_virtual_pipeline_size_is_rejected() -> TestResult {
    common::assert_invalid(
        common::validated_with("[parallel]\nvirtual_pipeline_model_parallel_size = 0\n"),
        "parallel.virtual_pipeline_model_parallel_size must be at least 1",
    )
}

#[test]
fn heads_must_divide_across_tensor_parallel_ranks() -> TestResult {
    common::assert_invalid(
        common::validated_with("[parallel]\ntensor_model_parallel_size = 3\n"),
        "model.num_attention_heads (8) must be a multiple of parallel.tensor_model_parallel_size \
         (3)",
    )
}

#[test]
fn query_groups_must_divide_across_tensor_parallel_ranks() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.model.num_query_groups = Some(2);
    config.parallel.tensor_model_parallel_size = 4;
    common::assert_invalid(
        config.validate(),
        "model.num_query_groups (2) must be a multiple of parallel.tensor_model_parallel_size (4)",
    )
}

#[test]
fn tensor_parallel_layout_that_divides_evenly_validates() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.model.num_query_groups = Some(4);
    config.parallel.tensor_model_parallel_size = 4;
    config.validate().map_err(|err| err.to_string())
}

// ============================================================================
// SECTION: Sequence and Pipeline Parallelism
// ============================================================================

#[test]
fn sequence_parallel_requires_tensor_parallelism() -> TestResult {
    common::assert_invalid(
        common::validated_with("[parallel]\nsequence_parallel = true\n"),
        "parallel.sequence_parallel requires parallel.tensor_model_parallel_size > 1",
    )
}

#[test]
fn sequence_parallel_with_tensor_parallelism_validates() -> TestResult {
    common::validated_with("[parallel]\ntensor_model_parallel_size = 2\nsequence_parallel = true\n")
        .map(|_| ())
        .map_err(|err| err.to_string())
}

#[test]
fn pipeline_parallel_requires_pipeline_dtype() -> TestResult {
    common::assert_invalid(
        common::validated_with("[parallel]\npipeline_model_parallel_size = 2\n"),
        "parallel.pipeline_dtype must be set when parallel.pipeline_model_parallel_size > 1",
    )
}

#[test]
fn pipeline_parallel_with_dtype_validates() -> TestResult {
    let config = common::validated_with(
        "[parallel]\npipeline_model_parallel_size = 4\npipeline_dtype = \"bf16\"\n",
    )
    .map_err(|err| err.to_string())?;
    if config.parallel.pipeline_dtype != Some(Dtype::Bf16) {
        return Err("pipeline_dtype should be kept".to_string());
    }
    if config.num_layers_per_pipeline_rank() != 2 {
        return Err("8 layers over 4 stages should give 2 layers per rank".to_string());
    }
    Ok(())
}

// ============================================================================
// SECTION: Expert Parallelism
// ============================================================================

#[test]
fn expert_parallel_requires_experts() -> TestResult {
    common::assert_invalid(
        common::validated_with("[parallel]\nexpert_model_parallel_size = 2\n"),
        "moe.num_experts must be set to use parallel.expert_model_parallel_size > 1",
    )
}

#[test]
fn experts_must_divide_across_expert_parallel_ranks() -> TestResult {
    common::assert_invalid(
        common::validated_with("[parallel]\nexpert_model_parallel_size = 4\n\n[moe]\nnum_experts = 6\n"),
        "moe.num_experts (6) must be a multiple of parallel.expert_model_parallel_size (4)",
    )
}

#[test]
fn expert_parallel_layout_reports_local_experts() -> TestResult {
    let config = common::validated_with(
        "[parallel]\nexpert_model_parallel_size = 4\n\n[moe]\nnum_experts = 16\n",
    )
    .map_err(|err| err.to_string())?;
    if config.num_local_experts() != Some(4) {
        return Err(format!("expected 4 local experts, got {:?}", config.num_local_experts()));
    }
    Ok(())
}
