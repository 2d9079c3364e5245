//! # alp-rs
//!
//! A Rust implementation of ALP: Adaptive Lossless floating-Point compression.
//!
//! Based on the SIGMOD 2024 paper: ["ALP: Adaptive Lossless floating-Point
//! Compression"](https://dl.acm.org/doi/10.1145/3626717).
//!
//! ## Overview
//!
//! Most floating-point columns hold values that were decimals before they
//! became doubles: prices, sensor readings, percentages. ALP turns them back
//! into small integers and bit-packs those:
//!
//! 1. **Sampling**: once per column segment, a bounded sample picks the
//!    (exponent, factor) pair that minimizes the estimated compressed size
//! 2. **Scaling**: every vector of 1024 values is encoded as
//!    `round(v * 10^e * 10^-f)`; values that do not decode back bit-exactly
//!    are kept aside as exceptions
//! 3. **Frame of reference**: the integers are stored relative to their
//!    minimum, each in the fewest bits that fit the vector's range
//!
//! Columns that do not scale to integers fall back to a real-double scheme
//! that dictionary-codes the high bits of each value. Columns that no scheme
//! can shrink are reported as [`Scheme::Invalid`] so the caller can store
//! them uncompressed.
//!
//! ## Quick Start
//!
//! ```rust
//! use alp_rs::{AlpConfig, Scheme, Segment};
//!
//! let values: Vec<f64> = (0..5000).map(|i| (i % 7) as f64 * 0.5 + 0.5).collect();
//!
//! // Sample the column and choose a scheme
//! let segment = Segment::<f64>::new(AlpConfig::default())
//!     .unwrap()
//!     .analyze(&values, 0, values.len())
//!     .unwrap();
//! assert_eq!(segment.state().scheme(), Scheme::Alp);
//!
//! // Compress every vector, then get the exact values back
//! let compressed = segment.compress(&values).unwrap();
//! assert_eq!(compressed.decompress().unwrap(), values);
//!
//! // Aggregates over the compressed segment
//! assert_eq!(compressed.max_value(), Some(3.5));
//! assert!(compressed.compression_ratio() < 0.2);
//! ```
//!
//! ## Working on Single Vectors
//!
//! The [`encoder`] and [`ffor`] modules expose the per-vector steps on
//! caller-owned buffers, and [`pipeline`] exposes them as owned values whose
//! types only allow the steps in order.
//!
//! ## Scheme Codes
//!
//! | Scheme | Code |
//! |--------|------|
//! | ALP | 1 |
//! | ALPExtended | 2 |
//! | Invalid | 99 |
//! | anything else | -1 |

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bitpack;
mod config;
pub mod constants;
pub mod encoder;
mod error;
pub mod ffor;
mod float;
pub mod pipeline;
pub mod rd;
mod sampler;
mod state;

pub use config::{AlpConfig, ExceptionPolicy};
pub use constants::VECTOR_SIZE;
pub use error::AlpError;
pub use ffor::ForDescriptor;
pub use float::AlpFloat;
pub use pipeline::{CompressedSegment, PackedVector, Segment};
pub use sampler::analyze;
pub use state::{Combination, CompressionState, RdParameters, Scheme};

/// Convenience type alias for Results with AlpError.
pub type Result<T> = std::result::Result<T, AlpError>;
