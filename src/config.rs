//! Codec configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_K_COMBINATIONS, ROWGROUP_VECTOR_SAMPLES, SAMPLES_PER_VECTOR};
use crate::error::AlpError;
use crate::float::AlpFloat;

/// Rule deciding whether a scaled value reproduces its original.
///
/// Values that fail the rule are stored as exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExceptionPolicy {
    /// Decoded bits must equal the original bits.
    #[default]
    BitExact,
    /// Decoded value may differ from the original by at most `max_abs_error`.
    ///
    /// Decompression is then lossy for non-exception values.
    Tolerance {
        /// Largest accepted absolute difference.
        max_abs_error: f64,
    },
    /// Decoded value may differ from the original by at most
    /// `max_rel_error * |original|`.
    ///
    /// Zero only reproduces zero, so small values keep their precision.
    Relative {
        /// Largest accepted difference as a fraction of the original magnitude.
        max_rel_error: f64,
    },
}

impl ExceptionPolicy {
    /// Whether `decoded` is an acceptable reconstruction of `original`.
    #[inline]
    pub fn accepts<T: AlpFloat>(&self, original: T, decoded: T) -> bool {
        match *self {
            ExceptionPolicy::BitExact => original.to_raw() == decoded.to_raw(),
            ExceptionPolicy::Tolerance { max_abs_error } => {
                original.to_raw() == decoded.to_raw()
                    || (original.to_f64() - decoded.to_f64()).abs() <= max_abs_error
            }
            ExceptionPolicy::Relative { max_rel_error } => {
                let original_f64 = original.to_f64();
                original.to_raw() == decoded.to_raw()
                    || (original_f64 - decoded.to_f64()).abs() <= max_rel_error * original_f64.abs()
            }
        }
    }
}

/// Settings for sampling, scheme selection and segment compression.
///
/// # Example
/// ```
/// use alp_rs::{AlpConfig, ExceptionPolicy};
///
/// let config = AlpConfig::default()
///     .with_max_exception_ratio(0.25)
///     .with_parallel(false);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.exception_policy, ExceptionPolicy::BitExact);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlpConfig {
    /// How exceptions are detected.
    pub exception_policy: ExceptionPolicy,
    /// Largest fraction of sampled values that may be exceptions for ALP to be kept.
    pub max_exception_ratio: f64,
    /// Number of best combinations kept for per-vector refinement.
    pub max_combinations: usize,
    /// Upper bound on the number of values sampled from one segment.
    pub max_sample_values: usize,
    /// Whether the real-double fallback may be selected.
    pub enable_extended: bool,
    /// Whether each vector may pick its own combination among the kept ones.
    pub per_vector_refinement: bool,
    /// Whether segments are compressed with one task per vector.
    pub parallel: bool,
}

impl Default for AlpConfig {
    fn default() -> Self {
        AlpConfig {
            exception_policy: ExceptionPolicy::BitExact,
            max_exception_ratio: 0.5,
            max_combinations: MAX_K_COMBINATIONS,
            max_sample_values: 64 * ROWGROUP_VECTOR_SAMPLES * SAMPLES_PER_VECTOR,
            enable_extended: true,
            per_vector_refinement: true,
            parallel: true,
        }
    }
}

impl AlpConfig {
    /// Set the exception policy.
    pub fn with_exception_policy(mut self, policy: ExceptionPolicy) -> Self {
        self.exception_policy = policy;
        self
    }

    /// Set the largest accepted exception ratio.
    pub fn with_max_exception_ratio(mut self, ratio: f64) -> Self {
        self.max_exception_ratio = ratio;
        self
    }

    /// Set the number of kept combinations.
    pub fn with_max_combinations(mut self, k: usize) -> Self {
        self.max_combinations = k;
        self
    }

    /// Set the sample cap.
    pub fn with_max_sample_values(mut self, n: usize) -> Self {
        self.max_sample_values = n;
        self
    }

    /// Enable or disable the real-double fallback.
    pub fn with_extended(mut self, enabled: bool) -> Self {
        self.enable_extended = enabled;
        self
    }

    /// Enable or disable per-vector refinement.
    pub fn with_per_vector_refinement(mut self, enabled: bool) -> Self {
        self.per_vector_refinement = enabled;
        self
    }

    /// Enable or disable parallel segment compression.
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Check that all values are usable.
    pub fn validate(&self) -> Result<(), AlpError> {
        if !(0.0..=1.0).contains(&self.max_exception_ratio) {
            return Err(AlpError::InvalidConfig(format!(
                "max_exception_ratio {} must be within [0, 1]",
                self.max_exception_ratio
            )));
        }
        if self.max_combinations == 0 {
            return Err(AlpError::InvalidConfig(
                "max_combinations must be at least 1".into(),
            ));
        }
        if self.max_sample_values < SAMPLES_PER_VECTOR {
            return Err(AlpError::InvalidConfig(format!(
                "max_sample_values must be at least {}",
                SAMPLES_PER_VECTOR
            )));
        }
        match self.exception_policy {
            ExceptionPolicy::BitExact => {}
            ExceptionPolicy::Tolerance { max_abs_error: bound }
            | ExceptionPolicy::Relative { max_rel_error: bound } => {
                if !bound.is_finite() || bound < 0.0 {
                    return Err(AlpError::InvalidConfig(format!(
                        "error bound {} must be finite and non-negative",
                        bound
                    )));
                }
            }
        }
        Ok(())
    }
}
