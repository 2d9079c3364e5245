//! Error types for ALP sampling, encoding and bit-packing operations.
//!
//! A segment that cannot be compressed is not an error: the sampler reports it
//! through [`Scheme::Invalid`](crate::Scheme::Invalid). The variants below are
//! contract violations by the caller or corrupted packed input.

use thiserror::Error;

/// Errors that can occur during ALP operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlpError {
    /// The input data is empty.
    #[error("input data is empty")]
    EmptyInput,

    /// An encode or decode call was made with a state that cannot encode.
    #[error("scheme {0} cannot encode or decode vectors")]
    InvalidScheme(&'static str),

    /// A packed vector was decoded with a state of a different scheme.
    #[error("vector was encoded with {vector} but the state uses {state}")]
    SchemeMismatch {
        /// The scheme the vector was encoded with.
        vector: &'static str,
        /// The scheme of the state passed in.
        state: &'static str,
    },

    /// A per-vector buffer does not have the expected length.
    #[error("buffer `{name}` has length {actual}, expected {expected}")]
    BufferSize {
        /// Name of the offending buffer.
        name: &'static str,
        /// The required length.
        expected: usize,
        /// The length that was passed in.
        actual: usize,
    },

    /// The requested column range lies outside the column.
    #[error("range {offset}..{offset}+{count} is out of bounds for column of length {len}")]
    OutOfBounds {
        /// Start of the requested range.
        offset: usize,
        /// Number of requested values.
        count: usize,
        /// Length of the column.
        len: usize,
    },

    /// The encoded data is corrupted or invalid.
    #[error("invalid encoded data: {0}")]
    InvalidData(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Buffer overflow during bit packing operations.
    #[error("buffer overflow: attempted to read {attempted} bits, only {available} available")]
    BufferOverflow {
        /// The number of bits that were attempted to be read.
        attempted: usize,
        /// The number of bits available in the buffer.
        available: usize,
    },

    /// The bit width exceeds the maximum supported.
    #[error("bit width {width} exceeds maximum of {max}")]
    BitWidthExceeded {
        /// The requested bit width.
        width: usize,
        /// The largest width allowed in this context.
        max: usize,
    },
}
