// crates/transformer-config/src/init.rs
// ============================================================================
// Module: Weight Initializers
// Description: Zero-mean normal initializers for transformer weights.
// Purpose: Describe and apply the configured weight initialization methods.
// Dependencies: rand, rand_distr, serde, thiserror
// ============================================================================

//! ## Overview
//! An [`InitMethod`] is the config-level description of a weight
//! initializer. Output projections default to a normal distribution whose
//! standard deviation is scaled by `1 / sqrt(2 * num_layers)` so residual
//! contributions stay bounded as depth grows. Biases are always zero and are
//! not described here.

use rand::Rng;
use rand_distr::Distribution;
use rand_distr::Normal;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// Zero-mean normal weight initializer.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum InitMethod {
    /// Normal distribution with the given standard deviation.
    Normal {
        /// Standard deviation.
        std: f64,
    },
    /// Normal distribution with `std / sqrt(2 * num_layers)`.
    ScaledNormal {
        /// Unscaled standard deviation.
        std: f64,
        /// Number of transformer layers used for scaling.
        num_layers: u32,
    },
}

impl InitMethod {
    /// Creates a plain normal initializer.
    #[must_use]
    pub const fn normal(std: f64) -> Self {
        Self::Normal {
            std,
        }
    }

    /// Creates a depth-scaled normal initializer.
    #[must_use]
    pub const fn scaled_normal(std: f64, num_layers: u32) -> Self {
        Self::ScaledNormal {
            std,
            num_layers,
        }
    }

    /// Returns the standard deviation actually sampled from.
    #[must_use]
    pub fn effective_std(&self) -> f64 {
        match *self {
            Self::Normal {
                std,
            } => std,
            Self::ScaledNormal {
                std,
                num_layers,
            } => std / (2.0 * f64::from(num_layers)).sqrt(),
        }
    }

    /// Fills `weights` with samples from the initializer's distribution.
    ///
    /// # Errors
    ///
    /// Returns [`InitError`] when the distribution parameters are invalid.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Weights are stored as f32; sampling happens in f64 for accuracy."
    )]
    pub fn initialize<R: Rng + ?Sized>(
        &self,
        weights: &mut [f32],
        rng: &mut R,
    ) -> Result<(), InitError> {
        let std = self.effective_std();
        if !(std.is_finite() && std > 0.0) {
            return Err(InitError::InvalidStd(std));
        }
        let normal =
            Normal::new(0.0_f64, std).map_err(|err| InitError::Distribution(err.to_string()))?;
        for weight in weights.iter_mut() {
            *weight = normal.sample(rng) as f32;
        }
        Ok(())
    }

    /// Validates the initializer parameters for the config field `field`.
    pub(crate) fn validate(&self, field: &str) -> Result<(), ConfigError> {
        let std = match *self {
            Self::Normal {
                std,
            } => std,
            Self::ScaledNormal {
                std,
                num_layers,
            } => {
                if num_layers == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "{field}.num_layers must be greater than zero"
                    )));
                }
                std
            }
        };
        if !(std.is_finite() && std > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "{field}.std must be a positive finite number"
            )));
        }
        Ok(())
    }
}

/// Errors raised while applying an initializer.
#[derive(Debug, Error)]
pub enum InitError {
    /// The effective standard deviation is not a positive finite number.
    #[error("init std must be a positive finite number (got {0})")]
    InvalidStd(f64),
    /// The sampling distribution rejected its parameters.
    #[error("init distribution error: {0}")]
    Distribution(String),
}
