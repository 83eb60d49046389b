// crates/transformer-config/src/docs.rs
// ============================================================================
// Module: Config Docs Generator
// Description: Markdown generator for transformer.toml documentation.
// Purpose: Keep config docs in sync with schema and validation.
// Dependencies: serde_json, std, thiserror
// ============================================================================

//! ## Overview
//! Generates `Docs/configuration/transformer.toml.md` from the canonical
//! configuration schema. Every schema property must be listed in exactly one
//! section table, so adding a field without documenting it fails generation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::fs;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::schema::config_schema;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default output path for generated configuration docs.
pub const DOCS_PATH: &str = "Docs/configuration/transformer.toml.md";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when generating or verifying config docs.
#[derive(Debug, Error)]
pub enum DocsError {
    /// IO failure while writing docs.
    #[error("docs io error: {0}")]
    Io(String),
    /// Schema traversal or rendering error.
    #[error("docs schema error: {0}")]
    Schema(String),
    /// Generated docs do not match the committed file.
    #[error("docs drift: {0}")]
    Drift(String),
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Generates the configuration markdown documentation.
///
/// # Errors
///
/// Returns [`DocsError`] when schema traversal fails.
pub fn config_docs_markdown() -> Result<String, DocsError> {
    let schema = config_schema();
    let mut out = String::new();

    out.push_str("<!--\n");
    out.push_str("Docs/configuration/transformer.toml.md\n");
    out.push_str("============================================================================\n");
    out.push_str("Document: Transformer Configuration\n");
    out.push_str("Description: Reference for transformer.toml configuration fields.\n");
    out.push_str("Purpose: Document architecture, parallelism, and precision settings.\n");
    out.push_str("Generated: This file is auto-generated; do not edit manually.\n");
    out.push_str("============================================================================\n");
    out.push_str("-->\n\n");

    out.push_str("# transformer.toml Configuration\n\n");
    out.push_str("## Overview\n\n");
    out.push_str("`transformer.toml` describes one training run: model dimensions, the\n");
    out.push_str("tensor/pipeline/expert parallel layout, mixed precision, and weight\n");
    out.push_str("initialization. Omitted values are resolved to the defaults below and the\n");
    out.push_str("whole file is validated before use; the first inconsistency is reported\n");
    out.push_str("with the offending field path.\n\n");

    out.push_str("## Top-Level Sections\n\n");

    for section in build_sections() {
        out.push_str("### ");
        out.push_str(section.heading);
        out.push_str("\n\n");
        if !section.description.is_empty() {
            out.push_str(section.description);
            out.push_str("\n\n");
        }
        let table = render_table(&schema, &section).map_err(DocsError::Schema)?;
        out.push_str(&table);
        if let Some(extra) = section.extra {
            out.push('\n');
            out.push_str(extra);
            out.push('\n');
        }
        out.push('\n');
    }

    out.push_str("## Cross-Field Rules\n\n");
    for rule in CROSS_FIELD_RULES {
        out.push_str("- ");
        out.push_str(rule);
        out.push('\n');
    }

    Ok(out)
}

/// Writes the generated docs to the standard location.
///
/// # Errors
///
/// Returns [`DocsError`] when file output fails.
pub fn write_config_docs(path: Option<&Path>) -> Result<(), DocsError> {
    let path = path.unwrap_or_else(|| Path::new(DOCS_PATH));
    let content = config_docs_markdown()?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| DocsError::Io(err.to_string()))?;
    }
    fs::write(path, content.as_bytes()).map_err(|err| DocsError::Io(err.to_string()))
}

/// Verifies the on-disk docs match the generated output.
///
/// # Errors
///
/// Returns [`DocsError`] when the docs drift.
pub fn verify_config_docs(path: Option<&Path>) -> Result<(), DocsError> {
    let path = path.unwrap_or_else(|| Path::new(DOCS_PATH));
    let content = config_docs_markdown()?;
    let existing = fs::read_to_string(path).map_err(|err| DocsError::Io(err.to_string()))?;
    if existing != content {
        return Err(DocsError::Drift(format!("docs mismatch: {}", path.display())));
    }
    Ok(())
}

// ============================================================================
// SECTION: Section Specs
// ============================================================================

/// Specification for one rendered documentation section.
#[derive(Clone)]
struct SectionSpec {
    /// Section heading, including TOML table name.
    heading: &'static str,
    /// Section description displayed beneath the heading.
    description: &'static str,
    /// Schema traversal path used to resolve the section.
    path: &'static [SchemaPath],
    /// Ordered field list rendered in the docs table.
    fields: &'static [&'static str],
    /// Whether to include a "Required" column.
    include_required: bool,
    /// Default values that override schema defaults for docs.
    default_overrides: &'static [FieldOverride],
    /// Optional additional text appended after the table.
    extra: Option<&'static str>,
}

/// Overrides for schema defaults shown in docs tables.
#[derive(Clone, Copy)]
struct FieldOverride {
    /// Field name to override.
    field: &'static str,
    /// Replacement default value string.
    default_value: &'static str,
}

/// Path segment for resolving nested schema properties.
#[derive(Clone, Copy)]
enum SchemaPath {
    /// Descend into an object property.
    Property(&'static str),
}

/// Validation rules spanning more than one field.
const CROSS_FIELD_RULES: &[&str] = &[
    "`precision.fp16` and `precision.bf16` are mutually exclusive.",
    "`model.num_attention_heads` and `model.num_query_groups` must be multiples of \
     `parallel.tensor_model_parallel_size`; heads must be a multiple of query groups.",
    "`parallel.sequence_parallel` requires `parallel.tensor_model_parallel_size > 1`.",
    "`parallel.pipeline_model_parallel_size > 1` requires `parallel.pipeline_dtype`.",
    "`parallel.expert_model_parallel_size > 1` requires `moe.num_experts`, which must be a \
     multiple of the expert-parallel degree.",
    "`recompute.granularity = \"full\"` requires `recompute.method` and `recompute.num_layers` \
     between 1 and the layers per pipeline rank; `selective` requires `recompute.num_layers` \
     unset.",
    "`recompute.distribute_saved_activations` cannot combine with `parallel.sequence_parallel`.",
    "With recompute enabled, `model.num_layers` must be divisible by \
     `parallel.virtual_pipeline_model_parallel_size`.",
    "`offload.num_layers` must be less than `model.num_layers`; `offload.cpu_offloading` \
     cannot combine with pipeline parallelism or recompute.",
    "`fusion.bias_activation_fusion` requires `gelu` or `silu`; with `gelu` it also requires \
     `model.add_bias_linear`.",
];

// ============================================================================
// SECTION: Section Registry
// ============================================================================

/// Builds the ordered list of configuration sections to render.
#[allow(
    clippy::too_many_lines,
    reason = "Keeping the full section list inline makes the config table spec auditable."
)]
fn build_sections() -> Vec<SectionSpec> {
    vec![
        SectionSpec {
            heading: "[model]",
            description: "Architecture dimensions and per-layer options. Required.",
            path: &[SchemaPath::Property("model")],
            fields: &[
                "num_layers",
                "hidden_size",
                "num_attention_heads",
                "num_query_groups",
                "ffn_hidden_size",
                "kv_channels",
                "hidden_dropout",
                "attention_dropout",
                "apply_residual_connection_post_layernorm",
                "layernorm_epsilon",
                "layernorm_zero_centered_gamma",
                "add_bias_linear",
                "gated_linear_unit",
                "activation_func",
                "normalization",
                "window_size",
                "clone_scatter_output_in_embedding",
            ],
            include_required: true,
            default_overrides: &[
                FieldOverride { field: "num_query_groups", default_value: "num_attention_heads" },
                FieldOverride { field: "ffn_hidden_size", default_value: "4 * hidden_size" },
                FieldOverride {
                    field: "kv_channels",
                    default_value: "hidden_size / num_attention_heads",
                },
            ],
            extra: Some(
                "Grouped-query attention example:\n\n```toml\n[model]\nnum_layers = 32\nhidden_size = 4096\nnum_attention_heads = 32\nnum_query_groups = 8\n```",
            ),
        },
        SectionSpec {
            heading: "[parallel]",
            description: "Tensor, pipeline, and expert model-parallel layout.",
            path: &[SchemaPath::Property("parallel")],
            fields: &[
                "tensor_model_parallel_size",
                "pipeline_model_parallel_size",
                "virtual_pipeline_model_parallel_size",
                "sequence_parallel",
                "expert_model_parallel_size",
                "pipeline_dtype",
            ],
            include_required: false,
            default_overrides: &[],
            extra: None,
        },
        SectionSpec {
            heading: "[precision]",
            description: "Mixed-precision flags and dtypes.",
            path: &[SchemaPath::Property("precision")],
            fields: &[
                "fp16",
                "bf16",
                "params_dtype",
                "autocast_dtype",
                "fp32_residual_connection",
                "apply_query_key_layer_scaling",
                "attention_softmax_in_fp32",
            ],
            include_required: false,
            default_overrides: &[FieldOverride {
                field: "autocast_dtype",
                default_value: "params_dtype",
            }],
            extra: None,
        },
        SectionSpec {
            heading: "[init]",
            description: "Weight initializers. Biases are always initialized to zero.",
            path: &[SchemaPath::Property("init")],
            fields: &["init_method_std", "init_method", "output_layer_init_method"],
            include_required: false,
            default_overrides: &[
                FieldOverride {
                    field: "init_method",
                    default_value: "{ kind = \"normal\", std = init_method_std }",
                },
                FieldOverride {
                    field: "output_layer_init_method",
                    default_value: "{ kind = \"scaled_normal\", std = init_method_std, \
                                    num_layers = model.num_layers }",
                },
            ],
            extra: Some(
                "`scaled_normal` samples from N(0, std / sqrt(2 * num_layers)).\n\n```toml\n[init]\ninit_method = { kind = \"normal\", std = 0.01 }\noutput_layer_init_method = { kind = \"scaled_normal\", std = 0.01, num_layers = 24 }\n```",
            ),
        },
        SectionSpec {
            heading: "[fusion]",
            description: "Fused kernel toggles.",
            path: &[SchemaPath::Property("fusion")],
            fields: &[
                "bias_activation_fusion",
                "masked_softmax_fusion",
                "persist_layer_norm",
                "bias_dropout_fusion",
                "apply_rope_fusion",
            ],
            include_required: false,
            default_overrides: &[],
            extra: None,
        },
        SectionSpec {
            heading: "[recompute]",
            description: "Activation recomputation (checkpointing).",
            path: &[SchemaPath::Property("recompute")],
            fields: &["granularity", "method", "num_layers", "distribute_saved_activations"],
            include_required: false,
            default_overrides: &[],
            extra: Some(
                "Full recompute example:\n\n```toml\n[recompute]\ngranularity = \"full\"\nmethod = \"block\"\nnum_layers = 4\n```",
            ),
        },
        SectionSpec {
            heading: "[fp8]",
            description: "FP8 training recipe. Leaving `format` unset disables FP8.",
            path: &[SchemaPath::Property("fp8")],
            fields: &[
                "format",
                "margin",
                "interval",
                "amax_history_len",
                "amax_compute_algo",
                "wgrad",
            ],
            include_required: false,
            default_overrides: &[],
            extra: None,
        },
        SectionSpec {
            heading: "[moe]",
            description: "Mixture-of-experts routing. Leaving `num_experts` unset keeps a dense \
                          MLP.",
            path: &[SchemaPath::Property("moe")],
            fields: &[
                "num_experts",
                "router_load_balancing_type",
                "router_topk",
                "grouped_gemm",
                "aux_loss_coeff",
                "z_loss_coeff",
                "input_jitter_eps",
                "token_dropping",
            ],
            include_required: false,
            default_overrides: &[],
            extra: Some("`token_dropping = true` is accepted with a warning and has no effect."),
        },
        SectionSpec {
            heading: "[offload]",
            description: "CPU offloading of layer state.",
            path: &[SchemaPath::Property("offload")],
            fields: &["cpu_offloading", "num_layers", "activations", "weights"],
            include_required: false,
            default_overrides: &[],
            extra: None,
        },
    ]
}

// ============================================================================
// SECTION: Rendering Helpers
// ============================================================================

/// Renders the markdown table for a configuration section.
fn render_table(schema: &Value, section: &SectionSpec) -> Result<String, String> {
    let section_schema = schema_at(schema, section.path)?;
    let props = section_schema
        .get("properties")
        .and_then(|value| value.as_object())
        .ok_or_else(|| "schema properties missing".to_string())?;

    let mut seen = BTreeSet::new();
    for field in section.fields {
        if !props.contains_key(*field) {
            return Err(format!("missing field in schema: {field}"));
        }
        seen.insert(*field);
    }
    for key in props.keys() {
        if !seen.contains(key.as_str()) {
            return Err(format!("field not documented: {key}"));
        }
    }

    let required = section_schema
        .get("required")
        .and_then(|value| value.as_array())
        .map(|arr| arr.iter().filter_map(|val| val.as_str()).collect::<Vec<&str>>())
        .unwrap_or_default();

    let overrides = overrides_map(section.default_overrides);

    let mut table = String::new();
    if section.include_required {
        table.push_str("| Field | Type | Required | Default | Notes |\n");
        table.push_str("| --- | --- | --- | --- | --- |\n");
    } else {
        table.push_str("| Field | Type | Default | Notes |\n");
        table.push_str("| --- | --- | --- | --- |\n");
    }

    for field in section.fields {
        let raw_schema =
            props.get(*field).ok_or_else(|| format!("missing field schema: {field}"))?;
        let prop_schema = unwrap_nullable(raw_schema);
        let field_type = format_schema_type(prop_schema);
        let default_value = overrides
            .get(*field)
            .map(|value| (*value).to_string())
            .or_else(|| raw_schema.get("default").map(format_default_value))
            .or_else(|| prop_schema.get("default").map(format_default_value))
            .unwrap_or_else(|| "n/a".to_string());
        let default_value = escape_table_cell(&default_value);
        let notes = raw_schema
            .get("description")
            .and_then(|value| value.as_str())
            .or_else(|| prop_schema.get("description").and_then(|value| value.as_str()))
            .unwrap_or("");

        if section.include_required {
            let required_value = if required.contains(field) { "yes" } else { "no" };
            let _ = writeln!(
                &mut table,
                "| `{field}` | {field_type} | {required_value} | {default_value} | {notes} |"
            );
        } else {
            let _ =
                writeln!(&mut table, "| `{field}` | {field_type} | {default_value} | {notes} |");
        }
    }

    Ok(table)
}

/// Builds a lookup table for default overrides.
fn overrides_map(overrides: &[FieldOverride]) -> BTreeMap<&str, &str> {
    let mut map = BTreeMap::new();
    for override_entry in overrides {
        map.insert(override_entry.field, override_entry.default_value);
    }
    map
}

/// Resolves a schema node by walking a path of properties.
fn schema_at<'a>(schema: &'a Value, path: &[SchemaPath]) -> Result<&'a Value, String> {
    let mut current = schema;
    for segment in path {
        current = match segment {
            SchemaPath::Property(name) => {
                let props = current
                    .get("properties")
                    .and_then(|value| value.as_object())
                    .ok_or_else(|| format!("properties missing while seeking {name}"))?;
                let prop = props.get(*name).ok_or_else(|| format!("property not found: {name}"))?;
                unwrap_nullable(prop)
            }
        };
    }
    Ok(current)
}

/// Returns the non-null branch of a nullable `oneOf` schema.
fn unwrap_nullable(schema: &Value) -> &Value {
    if let Some(one_of) = schema.get("oneOf").and_then(|val| val.as_array())
        && one_of.len() == 2
        && one_of.iter().any(|item| item.get("type").and_then(|val| val.as_str()) == Some("null"))
        && let Some(other) =
            one_of.iter().find(|item| item.get("type").and_then(|val| val.as_str()) != Some("null"))
    {
        return other;
    }
    schema
}

/// Formats a schema type for markdown tables.
fn format_schema_type(schema: &Value) -> String {
    let raw = format_schema_type_raw(schema);
    escape_table_cell(&raw)
}

/// Formats a schema type without markdown escaping.
fn format_schema_type_raw(schema: &Value) -> String {
    if let Some(one_of) = schema.get("oneOf").and_then(|val| val.as_array()) {
        let kinds = one_of
            .iter()
            .filter_map(|item| item.pointer("/properties/kind/const").and_then(|val| val.as_str()))
            .map(|kind| format!("{{ kind = \"{kind}\" }}"))
            .collect::<Vec<String>>();
        if !kinds.is_empty() {
            return kinds.join(" | ");
        }
    }
    if let Some(enum_vals) = schema.get("enum").and_then(|val| val.as_array()) {
        let items = enum_vals.iter().map(format_enum_value).collect::<Vec<String>>();
        return items.join(" | ");
    }
    if let Some(type_str) = schema.get("type").and_then(|val| val.as_str()) {
        return match type_str {
            "boolean" => "bool".to_string(),
            "object" => "table".to_string(),
            "array" => format_array_type(schema),
            _ => type_str.to_string(),
        };
    }
    "unknown".to_string()
}

/// Formats a fixed-length array type such as `[integer; 2]`.
fn format_array_type(schema: &Value) -> String {
    let item_type = schema
        .get("items")
        .map_or_else(|| "unknown".to_string(), format_schema_type_raw);
    match schema.get("minItems").and_then(Value::as_u64) {
        Some(len) if schema.get("maxItems").and_then(Value::as_u64) == Some(len) => {
            format!("[{item_type}; {len}]")
        }
        _ => format!("[{item_type}]"),
    }
}

/// Escapes pipe characters for markdown table cells.
fn escape_table_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

/// Formats enum values as TOML-compatible strings.
fn format_enum_value(value: &Value) -> String {
    value.as_str().map_or_else(|| value.to_string(), |text| format!("\"{text}\""))
}

/// Formats schema defaults for display in docs.
fn format_default_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(val) => val.to_string(),
        Value::Number(val) => val.to_string(),
        Value::String(val) => format!("\"{val}\""),
        Value::Array(arr) => {
            let items = arr.iter().map(format_enum_value).collect::<Vec<String>>();
            format!("[{}]", items.join(", "))
        }
        Value::Object(_) => "{...}".to_string(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use serde_json::json;

    use super::*;

    #[test]
    fn unwrap_nullable_returns_inner_schema() {
        let schema = json!({ "oneOf": [{ "type": "null" }, { "type": "integer" }] });
        assert_eq!(unwrap_nullable(&schema), &json!({ "type": "integer" }));
    }

    #[test]
    fn unwrap_nullable_keeps_tagged_unions() {
        let schema = json!({ "oneOf": [{ "type": "object" }, { "type": "object" }] });
        assert_eq!(unwrap_nullable(&schema), &schema);
    }

    #[test]
    fn fixed_length_arrays_render_with_length() {
        let schema = json!({
            "type": "array",
            "items": { "type": "integer" },
            "minItems": 2,
            "maxItems": 2
        });
        assert_eq!(format_schema_type_raw(&schema), "[integer; 2]");
    }

    #[test]
    fn tagged_unions_render_their_kinds() {
        let schema = json!({
            "oneOf": [
                { "properties": { "kind": { "const": "normal" } } },
                { "properties": { "kind": { "const": "scaled_normal" } } }
            ]
        });
        assert_eq!(
            format_schema_type_raw(&schema),
            "{ kind = \"normal\" } | { kind = \"scaled_normal\" }"
        );
    }

    #[test]
    fn render_table_rejects_undocumented_fields() {
        let schema = json!({
            "properties": {
                "demo": {
                    "type": "object",
                    "properties": { "a": { "type": "boolean" }, "b": { "type": "boolean" } }
                }
            }
        });
        let section = SectionSpec {
            heading: "[demo]",
            description: "",
            path: &[SchemaPath::Property("demo")],
            fields: &["a"],
            include_required: false,
            default_overrides: &[],
            extra: None,
        };
        let err = render_table(&schema, &section).unwrap_err();
        assert!(err.contains("field not documented: b"));
    }
}
