// crates/transformer-config/src/activation.rs
// ============================================================================
// Module: MLP Activations
// Description: Activation functions selectable for the transformer MLP.
// Purpose: Give the configured non-linearity a concrete, evaluable form.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`Activation`] names the MLP non-linearity and evaluates it element-wise.
//! Only `gelu` and `silu` have fused bias kernels.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// `sqrt(2 / pi)`, used by the tanh approximation of GELU.
const SQRT_2_OVER_PI: f32 = 0.797_884_6;
/// Cubic coefficient of the tanh approximation of GELU.
const GELU_CUBIC_COEFF: f32 = 0.044_715;
/// Sigmoid sharpness used by quick GELU.
const QUICK_GELU_ALPHA: f32 = 1.702;

/// MLP activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Gaussian error linear unit (tanh approximation).
    #[default]
    Gelu,
    /// Sigmoid linear unit; with a gated linear unit this is `SwiGLU`.
    Silu,
    /// Rectified linear unit.
    Relu,
    /// Sigmoid approximation of GELU, `x * sigmoid(1.702 * x)`.
    QuickGelu,
}

impl Activation {
    /// Returns the canonical config spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gelu => "gelu",
            Self::Silu => "silu",
            Self::Relu => "relu",
            Self::QuickGelu => "quick_gelu",
        }
    }

    /// Returns true when a fused bias + activation kernel exists.
    #[must_use]
    pub const fn supports_bias_fusion(self) -> bool {
        matches!(self, Self::Gelu | Self::Silu)
    }

    /// Evaluates the activation at `x`.
    #[must_use]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Self::Gelu => {
                let inner = SQRT_2_OVER_PI * GELU_CUBIC_COEFF.mul_add(x * x * x, x);
                0.5 * x * (1.0 + inner.tanh())
            }
            Self::Silu => x * sigmoid(x),
            Self::Relu => x.max(0.0),
            Self::QuickGelu => x * sigmoid(QUICK_GELU_ALPHA * x),
        }
    }

    /// Applies the activation to every element in place.
    pub fn apply_slice(self, values: &mut [f32]) {
        for value in values.iter_mut() {
            *value = self.apply(*value);
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logistic sigmoid.
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1e-4;

    #[test]
    fn activations_vanish_at_zero() {
        for activation in
            [Activation::Gelu, Activation::Silu, Activation::Relu, Activation::QuickGelu]
        {
            assert!(activation.apply(0.0).abs() < TOLERANCE, "{activation} at zero");
        }
    }

    #[test]
    fn gelu_matches_reference_values() {
        assert!((Activation::Gelu.apply(1.0) - 0.841_192).abs() < TOLERANCE);
        assert!((Activation::Gelu.apply(-1.0) + 0.158_808).abs() < TOLERANCE);
    }

    #[test]
    fn silu_matches_reference_value() {
        assert!((Activation::Silu.apply(1.0) - 0.731_059).abs() < TOLERANCE);
    }

    #[test]
    fn relu_clamps_negative_inputs() {
        assert!(Activation::Relu.apply(-3.0).abs() < f32::EPSILON);
        assert!((Activation::Relu.apply(2.5) - 2.5).abs() < f32::EPSILON);
    }

    #[test]
    fn apply_slice_updates_every_element() {
        let mut values = [-1.0, 0.0, 2.0];
        Activation::Relu.apply_slice(&mut values);
        assert_eq!(values, [0.0, 0.0, 2.0]);
    }

    #[test]
    fn only_gelu_and_silu_support_bias_fusion() {
        assert!(Activation::Gelu.supports_bias_fusion());
        assert!(Activation::Silu.supports_bias_fusion());
        assert!(!Activation::Relu.supports_bias_fusion());
        assert!(!Activation::QuickGelu.supports_bias_fusion());
    }
}
