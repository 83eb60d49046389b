// crates/transformer-config/src/config.rs
// ============================================================================
// Module: Transformer Configuration
// Description: Configuration loading, defaulting, and validation for training runs.
// Purpose: Reject self-contradictory parallelism and precision settings up front.
// Dependencies: serde, thiserror, toml, tracing
// ============================================================================

//! ## Overview
//! A [`TransformerConfig`] is loaded from a TOML file (or string), has its
//! omitted values resolved, and is validated once before any model is built.
//! Validation fails closed: the first contradiction found is returned as a
//! [`ConfigError`] naming the offending field path.
//!
//! ## Invariants
//! - `precision.fp16` and `precision.bf16` are mutually exclusive.
//! - Attention heads and query groups divide evenly across tensor-parallel ranks.
//! - Recompute settings are internally consistent for the chosen granularity.
//! - CPU offloading never combines with pipeline parallelism or recompute.
//! - Bias/activation fusion only pairs with activations that have fused kernels.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::activation::Activation;
use crate::init::InitMethod;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "transformer.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "TRANSFORMER_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Multiplier applied to `hidden_size` when `ffn_hidden_size` is omitted.
pub(crate) const FFN_HIDDEN_MULTIPLIER: u64 = 4;
/// Smallest accepted sliding-window extent (`-1` means unbounded).
pub(crate) const MIN_WINDOW_EXTENT: i64 = -1;
/// Default dropout probability for hidden states and attention.
pub(crate) const DEFAULT_DROPOUT: f64 = 0.1;
/// Default layer norm epsilon.
pub(crate) const DEFAULT_LAYERNORM_EPSILON: f64 = 1e-5;
/// Default standard deviation for weight initialization.
pub(crate) const DEFAULT_INIT_METHOD_STD: f64 = 0.02;
/// Default number of experts each token is routed to.
pub(crate) const DEFAULT_MOE_ROUTER_TOPK: u32 = 2;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Transformer model configuration for one training run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransformerConfig {
    /// Model architecture dimensions and layer options.
    pub model: ModelConfig,
    /// Tensor, pipeline, and expert parallel layout.
    #[serde(default)]
    pub parallel: ParallelConfig,
    /// Mixed-precision settings.
    #[serde(default)]
    pub precision: PrecisionConfig,
    /// Weight initialization settings.
    #[serde(default)]
    pub init: InitConfig,
    /// Kernel fusion toggles.
    #[serde(default)]
    pub fusion: FusionConfig,
    /// Activation recomputation (checkpointing) settings.
    #[serde(default)]
    pub recompute: RecomputeConfig,
    /// FP8 training settings.
    #[serde(default)]
    pub fp8: Fp8Config,
    /// Mixture-of-experts settings.
    #[serde(default)]
    pub moe: MoeConfig,
    /// CPU offloading settings.
    #[serde(default)]
    pub offload: OffloadConfig,
}

impl TransformerConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config = Self::from_toml_str(content)?;
        info!(path = %resolved.display(), "loaded transformer config");
        Ok(config)
    }

    /// Parses a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves omitted values and validates the configuration for internal consistency.
    ///
    /// Validation is idempotent; resolved values are written back so a
    /// validated config serializes with every default made explicit.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.parallel.validate()?;
        self.precision.validate()?;
        self.model.validate(&self.parallel)?;
        self.init.validate()?;
        self.fp8.validate()?;
        self.moe.validate(&self.parallel)?;
        self.offload.validate(self.model.num_layers, &self.parallel, &self.recompute)?;
        self.recompute.validate(self.model.num_layers, &self.parallel)?;
        self.fusion.validate(&self.model)?;
        self.init.resolve(self.model.num_layers);
        debug!(
            num_layers = self.model.num_layers,
            hidden_size = self.model.hidden_size,
            ffn_hidden_size = self.ffn_hidden_size(),
            kv_channels = self.kv_channels(),
            num_query_groups = self.num_query_groups(),
            "resolved transformer config"
        );
        Ok(())
    }

    /// Returns the feed-forward hidden size (`4 * hidden_size` unless set).
    #[must_use]
    pub fn ffn_hidden_size(&self) -> u64 {
        self.model
            .ffn_hidden_size
            .unwrap_or_else(|| self.model.hidden_size.saturating_mul(FFN_HIDDEN_MULTIPLIER))
    }

    /// Returns the per-head projection width (`hidden_size / num_attention_heads` unless set).
    #[must_use]
    pub fn kv_channels(&self) -> u64 {
        self.model.kv_channels.unwrap_or_else(|| {
            self.model.hidden_size.checked_div(u64::from(self.model.num_attention_heads)).unwrap_or(0)
        })
    }

    /// Returns the number of query groups (one per head unless set).
    #[must_use]
    pub fn num_query_groups(&self) -> u32 {
        self.model.num_query_groups.unwrap_or(self.model.num_attention_heads)
    }

    /// Returns the initializer used for most weights.
    #[must_use]
    pub fn init_method(&self) -> InitMethod {
        self.init.init_method.unwrap_or_else(|| InitMethod::normal(self.init.init_method_std))
    }

    /// Returns the initializer used for attention and MLP output projections.
    #[must_use]
    pub fn output_layer_init_method(&self) -> InitMethod {
        self.init.output_layer_init_method.unwrap_or_else(|| {
            InitMethod::scaled_normal(self.init.init_method_std, self.model.num_layers)
        })
    }

    /// Returns the number of transformer layers owned by each pipeline stage.
    #[must_use]
    pub fn num_layers_per_pipeline_rank(&self) -> u32 {
        self.model.num_layers.checked_div(self.parallel.pipeline_model_parallel_size).unwrap_or(0)
    }

    /// Returns the number of experts hosted per expert-parallel rank, if MoE is enabled.
    #[must_use]
    pub fn num_local_experts(&self) -> Option<u32> {
        self.moe.num_experts.map(|experts| {
            experts.checked_div(self.parallel.expert_model_parallel_size).unwrap_or(0)
        })
    }

    /// Returns the total query projection width across all heads.
    #[must_use]
    pub fn query_projection_size(&self) -> u64 {
        self.kv_channels().saturating_mul(u64::from(self.model.num_attention_heads))
    }

    /// Returns the total key/value projection width across all query groups.
    #[must_use]
    pub fn kv_projection_size(&self) -> u64 {
        self.kv_channels().saturating_mul(u64::from(self.num_query_groups()))
    }

    /// Returns true when the MLP is replaced by a mixture-of-experts layer.
    #[must_use]
    pub const fn is_moe(&self) -> bool {
        self.moe.num_experts.is_some()
    }

    /// Returns true when FP8 training is enabled.
    #[must_use]
    pub const fn fp8_enabled(&self) -> bool {
        self.fp8.format.is_some()
    }

    /// Returns the reduced-precision dtype used for compute.
    #[must_use]
    pub const fn compute_dtype(&self) -> Dtype {
        self.precision.compute_dtype()
    }

    /// Returns the dtype used inside autocast regions.
    #[must_use]
    pub fn autocast_dtype(&self) -> Dtype {
        self.precision.autocast_dtype.unwrap_or(self.precision.params_dtype)
    }
}

/// Model architecture configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Number of transformer layers in a transformer block.
    pub num_layers: u32,
    /// Transformer hidden size.
    pub hidden_size: u64,
    /// Number of attention heads.
    pub num_attention_heads: u32,
    /// Number of query groups for grouped-query attention (defaults to one per head).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_query_groups: Option<u32>,
    /// Feed-forward hidden size (defaults to `4 * hidden_size`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffn_hidden_size: Option<u64>,
    /// Per-head projection width (defaults to `hidden_size / num_attention_heads`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kv_channels: Option<u64>,
    /// Dropout probability for the transformer hidden state.
    #[serde(default = "default_hidden_dropout")]
    pub hidden_dropout: f64,
    /// Post-attention dropout probability.
    #[serde(default = "default_attention_dropout")]
    pub attention_dropout: f64,
    /// Use the original BERT residual ordering (residual taken after layernorm).
    #[serde(default)]
    pub apply_residual_connection_post_layernorm: bool,
    /// Layer norm epsilon.
    #[serde(default = "default_layernorm_epsilon")]
    pub layernorm_epsilon: f64,
    /// Center layer norm gamma around zero.
    #[serde(default)]
    pub layernorm_zero_centered_gamma: bool,
    /// Include bias terms in all linear layers.
    #[serde(default = "default_add_bias_linear")]
    pub add_bias_linear: bool,
    /// Use a gated linear unit for the first MLP projection.
    #[serde(default)]
    pub gated_linear_unit: bool,
    /// Non-linearity used in the MLP.
    #[serde(default)]
    pub activation_func: Activation,
    /// Normalization layer kind.
    #[serde(default)]
    pub normalization: Normalization,
    /// Sliding attention window; absent means full attention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<WindowSize>,
    /// Clone the scattered embedding output so its input can be freed early.
    #[serde(default = "default_clone_scatter_output_in_embedding")]
    pub clone_scatter_output_in_embedding: bool,
}

impl ModelConfig {
    /// Validates architecture dimensions and resolves derived sizes.
    fn validate(&mut self, parallel: &ParallelConfig) -> Result<(), ConfigError> {
        if self.num_layers == 0 {
            return Err(ConfigError::Invalid(
                "model.num_layers must be greater than zero".to_string(),
            ));
        }
        if self.hidden_size == 0 {
            return Err(ConfigError::Invalid(
                "model.hidden_size must be greater than zero".to_string(),
            ));
        }
        if self.num_attention_heads == 0 {
            return Err(ConfigError::Invalid(
                "model.num_attention_heads must be greater than zero".to_string(),
            ));
        }
        validate_probability("model.hidden_dropout", self.hidden_dropout)?;
        validate_probability("model.attention_dropout", self.attention_dropout)?;
        if !(self.layernorm_epsilon.is_finite() && self.layernorm_epsilon > 0.0) {
            return Err(ConfigError::Invalid(
                "model.layernorm_epsilon must be a positive finite number".to_string(),
            ));
        }
        if let Some(window) = self.window_size {
            window.validate()?;
        }

        let tp = parallel.tensor_model_parallel_size;
        if self.num_attention_heads % tp != 0 {
            return Err(ConfigError::Invalid(format!(
                "model.num_attention_heads ({}) must be a multiple of \
                 parallel.tensor_model_parallel_size ({tp})",
                self.num_attention_heads
            )));
        }

        match self.ffn_hidden_size {
            Some(0) => {
                return Err(ConfigError::Invalid(
                    "model.ffn_hidden_size must be greater than zero".to_string(),
                ));
            }
            Some(_) => {}
            None => {
                let resolved = self.hidden_size.checked_mul(FFN_HIDDEN_MULTIPLIER).ok_or_else(|| {
                    ConfigError::Invalid(
                        "model.ffn_hidden_size overflows when derived from model.hidden_size"
                            .to_string(),
                    )
                })?;
                debug!(ffn_hidden_size = resolved, "defaulted model.ffn_hidden_size");
                self.ffn_hidden_size = Some(resolved);
            }
        }

        match self.kv_channels {
            Some(0) => {
                return Err(ConfigError::Invalid(
                    "model.kv_channels must be greater than zero".to_string(),
                ));
            }
            Some(_) => {}
            None => {
                let resolved = self.hidden_size / u64::from(self.num_attention_heads);
                if resolved == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "model.kv_channels resolves to zero; model.hidden_size ({}) must be at \
                         least model.num_attention_heads ({})",
                        self.hidden_size, self.num_attention_heads
                    )));
                }
                debug!(kv_channels = resolved, "defaulted model.kv_channels");
                self.kv_channels = Some(resolved);
            }
        }

        let groups = match self.num_query_groups {
            Some(0) => {
                return Err(ConfigError::Invalid(
                    "model.num_query_groups must be greater than zero".to_string(),
                ));
            }
            Some(groups) => groups,
            None => {
                self.num_query_groups = Some(self.num_attention_heads);
                self.num_attention_heads
            }
        };
        if groups % tp != 0 {
            return Err(ConfigError::Invalid(format!(
                "model.num_query_groups ({groups}) must be a multiple of \
                 parallel.tensor_model_parallel_size ({tp})"
            )));
        }
        if self.num_attention_heads % groups != 0 {
            return Err(ConfigError::Invalid(format!(
                "model.num_attention_heads ({}) must be a multiple of model.num_query_groups \
                 ({groups})",
                self.num_attention_heads
            )));
        }
        Ok(())
    }
}

/// Sliding attention window as `(left, right)` extents; `-1` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct WindowSize(pub i64, pub i64);

impl WindowSize {
    /// Number of past tokens visible to each query, or `-1` for unbounded.
    #[must_use]
    pub const fn left(self) -> i64 {
        self.0
    }

    /// Number of future tokens visible to each query, or `-1` for unbounded.
    #[must_use]
    pub const fn right(self) -> i64 {
        self.1
    }

    /// Returns true when neither side of the window is bounded.
    #[must_use]
    pub const fn is_unbounded(self) -> bool {
        self.0 == MIN_WINDOW_EXTENT && self.1 == MIN_WINDOW_EXTENT
    }

    /// Validates that both extents are `-1` or non-negative.
    fn validate(self) -> Result<(), ConfigError> {
        if self.0 < MIN_WINDOW_EXTENT || self.1 < MIN_WINDOW_EXTENT {
            return Err(ConfigError::Invalid(format!(
                "model.window_size extents must be -1 or non-negative (got [{}, {}])",
                self.0, self.1
            )));
        }
        Ok(())
    }
}

/// Normalization layer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum Normalization {
    /// Standard layer normalization.
    #[default]
    LayerNorm,
    /// Root-mean-square normalization.
    #[serde(rename = "RMSNorm")]
    RmsNorm,
}

impl Normalization {
    /// Returns the canonical config spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LayerNorm => "LayerNorm",
            Self::RmsNorm => "RMSNorm",
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model-parallel layout across devices.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParallelConfig {
    /// Tensor-parallel degree.
    #[serde(default = "default_parallel_size")]
    pub tensor_model_parallel_size: u32,
    /// Pipeline-parallel degree.
    #[serde(default = "default_parallel_size")]
    pub pipeline_model_parallel_size: u32,
    /// Interleaved (virtual) pipeline stages per pipeline rank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_pipeline_model_parallel_size: Option<u32>,
    /// Shard layer norm and dropout activations along the sequence dimension.
    #[serde(default)]
    pub sequence_parallel: bool,
    /// Expert-parallel degree.
    #[serde(default = "default_parallel_size")]
    pub expert_model_parallel_size: u32,
    /// Dtype communicated between pipeline stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_dtype: Option<Dtype>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            tensor_model_parallel_size: default_parallel_size(),
            pipeline_model_parallel_size: default_parallel_size(),
            virtual_pipeline_model_parallel_size: None,
            sequence_parallel: false,
            expert_model_parallel_size: default_parallel_size(),
            pipeline_dtype: None,
        }
    }
}

impl ParallelConfig {
    /// Validates parallel degrees and their direct requirements.
    fn validate(&self) -> Result<(), ConfigError> {
        let degrees = [
            ("parallel.tensor_model_parallel_size", self.tensor_model_parallel_size),
            ("parallel.pipeline_model_parallel_size", self.pipeline_model_parallel_size),
            ("parallel.expert_model_parallel_size", self.expert_model_parallel_size),
        ];
        for (field, value) in degrees {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{field} must be at least 1")));
            }
        }
        if self.virtual_pipeline_model_parallel_size == Some(0) {
            return Err(ConfigError::Invalid(
                "parallel.virtual_pipeline_model_parallel_size must be at least 1".to_string(),
            ));
        }
        if self.sequence_parallel && self.tensor_model_parallel_size <= 1 {
            return Err(ConfigError::Invalid(
                "parallel.sequence_parallel requires parallel.tensor_model_parallel_size > 1"
                    .to_string(),
            ));
        }
        if self.pipeline_model_parallel_size > 1 && self.pipeline_dtype.is_none() {
            return Err(ConfigError::Invalid(
                "parallel.pipeline_dtype must be set when parallel.pipeline_model_parallel_size > 1"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Numeric storage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dtype {
    /// IEEE single precision.
    #[default]
    Fp32,
    /// IEEE half precision.
    Fp16,
    /// Brain floating point.
    Bf16,
}

impl Dtype {
    /// Returns the canonical config spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fp32 => "fp32",
            Self::Fp16 => "fp16",
            Self::Bf16 => "bf16",
        }
    }

    /// Returns the storage size of one element in bytes.
    #[must_use]
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::Fp32 => 4,
            Self::Fp16 | Self::Bf16 => 2,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mixed-precision configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrecisionConfig {
    /// Train with fp16 mixed precision.
    #[serde(default)]
    pub fp16: bool,
    /// Train with bf16 mixed precision.
    #[serde(default)]
    pub bf16: bool,
    /// Dtype of model parameters.
    #[serde(default)]
    pub params_dtype: Dtype,
    /// Dtype used inside autocast regions (defaults to `params_dtype`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autocast_dtype: Option<Dtype>,
    /// Keep residual connections in fp32.
    #[serde(default)]
    pub fp32_residual_connection: bool,
    /// Scale `Q * K^T` by `1 / layer_number`.
    #[serde(default)]
    pub apply_query_key_layer_scaling: bool,
    /// Run attention masking and softmax in fp32.
    #[serde(default = "default_attention_softmax_in_fp32")]
    pub attention_softmax_in_fp32: bool,
}

impl Default for PrecisionConfig {
    fn default() -> Self {
        Self {
            fp16: false,
            bf16: false,
            params_dtype: Dtype::Fp32,
            autocast_dtype: None,
            fp32_residual_connection: false,
            apply_query_key_layer_scaling: false,
            attention_softmax_in_fp32: default_attention_softmax_in_fp32(),
        }
    }
}

impl PrecisionConfig {
    /// Returns the reduced-precision dtype selected by the precision flags.
    #[must_use]
    pub const fn compute_dtype(&self) -> Dtype {
        if self.fp16 {
            Dtype::Fp16
        } else if self.bf16 {
            Dtype::Bf16
        } else {
            Dtype::Fp32
        }
    }

    /// Validates precision flags and resolves dependent defaults.
    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.fp16 && self.bf16 {
            return Err(ConfigError::Invalid(
                "only one of precision.fp16 and precision.bf16 may be true".to_string(),
            ));
        }
        if self.autocast_dtype.is_none() {
            self.autocast_dtype = Some(self.params_dtype);
        }
        if self.apply_query_key_layer_scaling && !self.attention_softmax_in_fp32 {
            debug!("precision.apply_query_key_layer_scaling forces attention_softmax_in_fp32");
            self.attention_softmax_in_fp32 = true;
        }
        Ok(())
    }
}

/// Weight initialization configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InitConfig {
    /// Standard deviation of the default zero-mean normal initializers.
    #[serde(default = "default_init_method_std")]
    pub init_method_std: f64,
    /// Initializer for most weights (defaults to `normal(init_method_std)`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_method: Option<InitMethod>,
    /// Initializer for output projections (defaults to `scaled_normal(init_method_std, num_layers)`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_layer_init_method: Option<InitMethod>,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            init_method_std: default_init_method_std(),
            init_method: None,
            output_layer_init_method: None,
        }
    }
}

impl InitConfig {
    /// Validates the initializer settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.init_method_std.is_finite() && self.init_method_std > 0.0) {
            return Err(ConfigError::Invalid(
                "init.init_method_std must be a positive finite number".to_string(),
            ));
        }
        if let Some(method) = &self.init_method {
            method.validate("init.init_method")?;
        }
        if let Some(method) = &self.output_layer_init_method {
            method.validate("init.output_layer_init_method")?;
        }
        Ok(())
    }

    /// Fills in default initializers.
    fn resolve(&mut self, num_layers: u32) {
        if self.init_method.is_none() {
            self.init_method = Some(InitMethod::normal(self.init_method_std));
        }
        if self.output_layer_init_method.is_none() {
            self.output_layer_init_method =
                Some(InitMethod::scaled_normal(self.init_method_std, num_layers));
        }
    }
}

/// Kernel fusion toggles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FusionConfig {
    /// Fuse the MLP bias add with the activation.
    #[serde(default)]
    pub bias_activation_fusion: bool,
    /// Use the fused masked softmax kernel.
    #[serde(default)]
    pub masked_softmax_fusion: bool,
    /// Use the persistent fused layer norm kernel.
    #[serde(default)]
    pub persist_layer_norm: bool,
    /// Fuse bias add, dropout, and residual add.
    #[serde(default)]
    pub bias_dropout_fusion: bool,
    /// Use the fused rotary position embedding kernel.
    #[serde(default)]
    pub apply_rope_fusion: bool,
}

impl FusionConfig {
    /// Validates fusion toggles against the MLP activation and bias settings.
    fn validate(&self, model: &ModelConfig) -> Result<(), ConfigError> {
        if !self.bias_activation_fusion {
            return Ok(());
        }
        let activation = model.activation_func;
        if !activation.supports_bias_fusion() {
            return Err(ConfigError::Invalid(format!(
                "fusion.bias_activation_fusion requires model.activation_func to be gelu or silu \
                 (got {activation})"
            )));
        }
        if activation == Activation::Gelu && !model.add_bias_linear {
            return Err(ConfigError::Invalid(
                "fusion.bias_activation_fusion with model.activation_func=gelu requires \
                 model.add_bias_linear=true"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Activation recomputation granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecomputeGranularity {
    /// Checkpoint entire transformer layers.
    Full,
    /// Checkpoint only the memory-heavy core attention.
    Selective,
}

impl RecomputeGranularity {
    /// Returns the canonical config spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Selective => "selective",
        }
    }
}

impl fmt::Display for RecomputeGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How full-layer recomputation is distributed over layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecomputeMethod {
    /// Split the block into equal chunks and checkpoint each chunk input.
    Uniform,
    /// Checkpoint only the first `num_layers` layers of each pipeline stage.
    Block,
}

/// Activation recomputation configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecomputeConfig {
    /// Recompute granularity; absent disables recomputation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<RecomputeGranularity>,
    /// Layer distribution method for full recomputation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<RecomputeMethod>,
    /// Layers per recompute unit (uniform) or recomputed layers per stage (block).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_layers: Option<u32>,
    /// Distribute recomputed activations across the model-parallel group.
    #[serde(default)]
    pub distribute_saved_activations: bool,
}

impl RecomputeConfig {
    /// Validates recompute settings against the layer count and parallel layout.
    fn validate(&self, num_layers: u32, parallel: &ParallelConfig) -> Result<(), ConfigError> {
        let Some(granularity) = self.granularity else {
            return Ok(());
        };
        match granularity {
            RecomputeGranularity::Full => {
                if self.method.is_none() {
                    return Err(ConfigError::Invalid(
                        "recompute.granularity=full requires recompute.method (block or uniform)"
                            .to_string(),
                    ));
                }
                let per_rank = num_layers / parallel.pipeline_model_parallel_size;
                match self.num_layers {
                    Some(layers) if layers >= 1 && layers <= per_rank => {}
                    _ => {
                        return Err(ConfigError::Invalid(format!(
                            "recompute.granularity=full requires recompute.num_layers between 1 \
                             and the layers per pipeline rank ({per_rank})"
                        )));
                    }
                }
            }
            RecomputeGranularity::Selective => {
                if self.num_layers.is_some() {
                    return Err(ConfigError::Invalid(
                        "recompute.num_layers must be unset when recompute.granularity=selective"
                            .to_string(),
                    ));
                }
            }
        }
        if self.distribute_saved_activations && parallel.sequence_parallel {
            return Err(ConfigError::Invalid(
                "recompute.distribute_saved_activations must be false when \
                 parallel.sequence_parallel is enabled"
                    .to_string(),
            ));
        }
        if let Some(virtual_stages) = parallel.virtual_pipeline_model_parallel_size
            && num_layers % virtual_stages != 0
        {
            return Err(ConfigError::Invalid(format!(
                "model.num_layers ({num_layers}) must be divisible by \
                 parallel.virtual_pipeline_model_parallel_size ({virtual_stages})"
            )));
        }
        Ok(())
    }
}

/// FP8 tensor format recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fp8Format {
    /// E4M3 for every FP8 tensor.
    E4m3,
    /// E4M3 for activations and weights, E5M2 for output gradients.
    Hybrid,
}

/// Algorithm choosing the `amax` value for FP8 scaling factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmaxComputeAlgo {
    /// Largest `amax` in the history window.
    Max,
    /// Most recently observed `amax`.
    #[default]
    MostRecent,
}

/// FP8 training configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Fp8Config {
    /// FP8 recipe; absent disables FP8.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Fp8Format>,
    /// Margin for the scaling factor computation.
    #[serde(default)]
    pub margin: i32,
    /// Steps between scaling factor recomputations.
    #[serde(default = "default_fp8_interval")]
    pub interval: u32,
    /// Length of the `amax` history window.
    #[serde(default = "default_fp8_amax_history_len")]
    pub amax_history_len: u32,
    /// Algorithm choosing `amax` from the history window.
    #[serde(default)]
    pub amax_compute_algo: AmaxComputeAlgo,
    /// Compute weight gradients in FP8 (false keeps them in higher precision).
    #[serde(default = "default_fp8_wgrad")]
    pub wgrad: bool,
}

impl Default for Fp8Config {
    fn default() -> Self {
        Self {
            format: None,
            margin: 0,
            interval: default_fp8_interval(),
            amax_history_len: default_fp8_amax_history_len(),
            amax_compute_algo: AmaxComputeAlgo::MostRecent,
            wgrad: default_fp8_wgrad(),
        }
    }
}

impl Fp8Config {
    /// Validates FP8 scaling parameters.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::Invalid("fp8.interval must be at least 1".to_string()));
        }
        if self.amax_history_len == 0 {
            return Err(ConfigError::Invalid(
                "fp8.amax_history_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Router load-balancing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingType {
    /// GShard / Switch Transformer auxiliary loss.
    #[default]
    AuxLoss,
    /// S-BASE Sinkhorn balancing.
    Sinkhorn,
    /// No load balancing.
    None,
}

/// Mixture-of-experts configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MoeConfig {
    /// Number of experts; absent keeps a dense MLP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_experts: Option<u32>,
    /// Router load-balancing strategy.
    #[serde(default)]
    pub router_load_balancing_type: LoadBalancingType,
    /// Number of experts each token is routed to.
    #[serde(default = "default_moe_router_topk")]
    pub router_topk: u32,
    /// Batch local expert GEMMs into one grouped kernel launch.
    #[serde(default)]
    pub grouped_gemm: bool,
    /// Scaling coefficient for the auxiliary load-balancing loss.
    #[serde(default)]
    pub aux_loss_coeff: f64,
    /// Scaling coefficient for the router z-loss.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_loss_coeff: Option<f64>,
    /// Jitter epsilon applied to router inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_jitter_eps: Option<f64>,
    /// Drop and pad tokens to a fixed expert capacity.
    #[serde(default)]
    pub token_dropping: bool,
}

impl Default for MoeConfig {
    fn default() -> Self {
        Self {
            num_experts: None,
            router_load_balancing_type: LoadBalancingType::AuxLoss,
            router_topk: default_moe_router_topk(),
            grouped_gemm: false,
            aux_loss_coeff: 0.0,
            z_loss_coeff: None,
            input_jitter_eps: None,
            token_dropping: false,
        }
    }
}

impl MoeConfig {
    /// Validates expert counts, routing, and loss coefficients.
    fn validate(&self, parallel: &ParallelConfig) -> Result<(), ConfigError> {
        let expert_parallel = parallel.expert_model_parallel_size;
        match self.num_experts {
            None if expert_parallel > 1 => {
                return Err(ConfigError::Invalid(
                    "moe.num_experts must be set to use parallel.expert_model_parallel_size > 1"
                        .to_string(),
                ));
            }
            None => {}
            Some(0) => {
                return Err(ConfigError::Invalid(
                    "moe.num_experts must be greater than zero".to_string(),
                ));
            }
            Some(experts) => {
                if experts % expert_parallel != 0 {
                    return Err(ConfigError::Invalid(format!(
                        "moe.num_experts ({experts}) must be a multiple of \
                         parallel.expert_model_parallel_size ({expert_parallel})"
                    )));
                }
                if self.router_topk == 0 || self.router_topk > experts {
                    return Err(ConfigError::Invalid(format!(
                        "moe.router_topk must be between 1 and moe.num_experts ({experts})"
                    )));
                }
            }
        }
        validate_non_negative("moe.aux_loss_coeff", self.aux_loss_coeff)?;
        if let Some(coeff) = self.z_loss_coeff {
            validate_non_negative("moe.z_loss_coeff", coeff)?;
        }
        if let Some(eps) = self.input_jitter_eps {
            validate_non_negative("moe.input_jitter_eps", eps)?;
        }
        if self.token_dropping {
            warn!("moe.token_dropping is not supported; tokens are routed without capacity limits");
        }
        Ok(())
    }
}

/// CPU offloading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OffloadConfig {
    /// Offload layer state to host memory.
    #[serde(default)]
    pub cpu_offloading: bool,
    /// Number of layers to offload.
    #[serde(default)]
    pub num_layers: u32,
    /// Offload activations.
    #[serde(default = "default_offload_activations")]
    pub activations: bool,
    /// Offload weights.
    #[serde(default = "default_offload_weights")]
    pub weights: bool,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            cpu_offloading: false,
            num_layers: 0,
            activations: default_offload_activations(),
            weights: default_offload_weights(),
        }
    }
}

impl OffloadConfig {
    /// Validates offloading against the layer count, pipeline layout, and recompute.
    fn validate(
        &self,
        num_layers: u32,
        parallel: &ParallelConfig,
        recompute: &RecomputeConfig,
    ) -> Result<(), ConfigError> {
        if self.num_layers >= num_layers {
            return Err(ConfigError::Invalid(format!(
                "offload.num_layers ({}) must be less than model.num_layers ({num_layers})",
                self.num_layers
            )));
        }
        if self.cpu_offloading && parallel.pipeline_model_parallel_size > 1 {
            return Err(ConfigError::Invalid(
                "offload.cpu_offloading is not supported with \
                 parallel.pipeline_model_parallel_size > 1"
                    .to_string(),
            ));
        }
        if let (true, Some(granularity)) = (self.cpu_offloading, recompute.granularity) {
            return Err(ConfigError::Invalid(format!(
                "offload.cpu_offloading does not work when recompute.granularity is set \
                 (got {granularity})"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a probability in `[0, 1)`.
fn validate_probability(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..1.0).contains(&value) {
        return Err(ConfigError::Invalid(format!("{field} must be in [0, 1) (got {value})")));
    }
    Ok(())
}

/// Validates a finite, non-negative coefficient.
fn validate_non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(ConfigError::Invalid(format!(
            "{field} must be a non-negative finite number (got {value})"
        )));
    }
    Ok(())
}

/// Default hidden-state dropout probability.
pub(crate) const fn default_hidden_dropout() -> f64 {
    DEFAULT_DROPOUT
}

/// Default attention dropout probability.
pub(crate) const fn default_attention_dropout() -> f64 {
    DEFAULT_DROPOUT
}

/// Default layer norm epsilon.
pub(crate) const fn default_layernorm_epsilon() -> f64 {
    DEFAULT_LAYERNORM_EPSILON
}

/// Linear layers carry bias terms by default.
pub(crate) const fn default_add_bias_linear() -> bool {
    true
}

/// Embedding scatter outputs are cloned by default.
pub(crate) const fn default_clone_scatter_output_in_embedding() -> bool {
    true
}

/// Default degree for every parallel dimension.
pub(crate) const fn default_parallel_size() -> u32 {
    1
}

/// Attention softmax runs in fp32 by default.
pub(crate) const fn default_attention_softmax_in_fp32() -> bool {
    true
}

/// Default initializer standard deviation.
pub(crate) const fn default_init_method_std() -> f64 {
    DEFAULT_INIT_METHOD_STD
}

/// Default FP8 scaling factor recompute interval.
pub(crate) const fn default_fp8_interval() -> u32 {
    1
}

/// Default FP8 `amax` history length.
pub(crate) const fn default_fp8_amax_history_len() -> u32 {
    1
}

/// FP8 weight gradients are enabled by default.
pub(crate) const fn default_fp8_wgrad() -> bool {
    true
}

/// Default router top-k.
pub(crate) const fn default_moe_router_topk() -> u32 {
    DEFAULT_MOE_ROUTER_TOPK
}

/// Activations are offloaded by default when offloading is enabled.
pub(crate) const fn default_offload_activations() -> bool {
    true
}

/// Weights are offloaded by default when offloading is enabled.
pub(crate) const fn default_offload_weights() -> bool {
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================
