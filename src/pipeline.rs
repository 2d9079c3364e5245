//! Vector and segment pipelines.
//!
//! Each processing step is a distinct type, so steps cannot be skipped or
//! reordered:
//!
//! ```text
//! compress:   &[T] -> Encoded -> ForAnalyzed -> PackedVector
//! decompress: PackedVector -> Unpacked -> Decoded -> Vec<T>
//! segment:    Segment<Unanalyzed> -> Segment<Analyzed> -> Segment<Done>
//! ```
//!
//! [`Segment`] ties the steps together for whole columns: it pads the final
//! partial vector, runs vectors in parallel with rayon and keeps the
//! metadata needed for aggregate queries.

use std::marker::PhantomData;
use std::mem::size_of;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::AlpConfig;
use crate::constants::VECTOR_SIZE;
use crate::encoder::{self, check_len, Exceptions};
use crate::error::AlpError;
use crate::ffor::{self, ForDescriptor};
use crate::float::AlpFloat;
use crate::rd;
use crate::sampler;
use crate::state::{Combination, CompressionState, RdParameters, Scheme};

/// Left-part exceptions of a real-double vector, in matching order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RdExceptions {
    /// Raw left parts missing from the dictionary.
    pub left_parts: Vec<u16>,
    /// Positions within the vector, strictly increasing.
    pub positions: Vec<u16>,
}

impl RdExceptions {
    /// Number of exceptions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether there are no exceptions.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum EncodedBody<T: AlpFloat> {
    Alp {
        combination: Combination,
        integers: Vec<T::Int>,
        exceptions: Exceptions<T>,
    },
    Extended {
        left: Vec<u16>,
        right: Vec<u64>,
        exceptions: RdExceptions,
    },
}

/// One encoded vector, not yet frame-of-reference analyzed.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded<T: AlpFloat> {
    body: EncodedBody<T>,
}

impl<T: AlpFloat> Encoded<T> {
    /// Scheme the vector was encoded with.
    pub fn scheme(&self) -> Scheme {
        match self.body {
            EncodedBody::Alp { .. } => Scheme::Alp,
            EncodedBody::Extended { .. } => Scheme::AlpExtended,
        }
    }

    /// Number of exceptions.
    pub fn exception_count(&self) -> usize {
        match &self.body {
            EncodedBody::Alp { exceptions, .. } => exceptions.len(),
            EncodedBody::Extended { exceptions, .. } => exceptions.len(),
        }
    }

    /// Combination used for this vector, for ALP vectors.
    pub fn combination(&self) -> Option<Combination> {
        match self.body {
            EncodedBody::Alp { combination, .. } => Some(combination),
            EncodedBody::Extended { .. } => None,
        }
    }

    /// Scaled integers with exception slots filled, for ALP vectors.
    pub fn integers(&self) -> Option<&[T::Int]> {
        match &self.body {
            EncodedBody::Alp { integers, .. } => Some(integers),
            EncodedBody::Extended { .. } => None,
        }
    }

    /// Exceptions of an ALP vector.
    pub fn exceptions(&self) -> Option<&Exceptions<T>> {
        match &self.body {
            EncodedBody::Alp { exceptions, .. } => Some(exceptions),
            EncodedBody::Extended { .. } => None,
        }
    }

    /// Compute the frame of reference of every integer stream.
    pub fn analyze_for_packing(self) -> ForAnalyzed<T> {
        let body = match self.body {
            EncodedBody::Alp {
                combination,
                integers,
                exceptions,
            } => ForAnalyzedBody::Alp {
                frame: ffor::analyze_for_packing(&integers),
                combination,
                integers,
                exceptions,
            },
            EncodedBody::Extended {
                left,
                right,
                exceptions,
            } => ForAnalyzedBody::Extended {
                left_frame: ffor::analyze_for_packing(&left),
                right_frame: ffor::analyze_for_packing(&right),
                left,
                right,
                exceptions,
            },
        };
        ForAnalyzed { body }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ForAnalyzedBody<T: AlpFloat> {
    Alp {
        combination: Combination,
        frame: ForDescriptor<T::Int>,
        integers: Vec<T::Int>,
        exceptions: Exceptions<T>,
    },
    Extended {
        left_frame: ForDescriptor<u16>,
        right_frame: ForDescriptor<u64>,
        left: Vec<u16>,
        right: Vec<u64>,
        exceptions: RdExceptions,
    },
}

/// An encoded vector with its frame-of-reference descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct ForAnalyzed<T: AlpFloat> {
    body: ForAnalyzedBody<T>,
}

impl<T: AlpFloat> ForAnalyzed<T> {
    /// Descriptor of the scaled integers, for ALP vectors.
    pub fn descriptor(&self) -> Option<&ForDescriptor<T::Int>> {
        match &self.body {
            ForAnalyzedBody::Alp { frame, .. } => Some(frame),
            ForAnalyzedBody::Extended { .. } => None,
        }
    }

    /// Total bits spent per value across all packed streams.
    pub fn bit_width(&self) -> u8 {
        match &self.body {
            ForAnalyzedBody::Alp { frame, .. } => frame.bit_width,
            ForAnalyzedBody::Extended {
                left_frame,
                right_frame,
                ..
            } => left_frame.bit_width + right_frame.bit_width,
        }
    }

    /// Bit-pack the integer streams.
    pub fn pack(self) -> Result<PackedVector<T>, AlpError> {
        match self.body {
            ForAnalyzedBody::Alp {
                combination,
                frame,
                integers,
                exceptions,
            } => Ok(PackedVector::Alp {
                packed: ffor::pack(&integers, &frame)?,
                combination,
                frame,
                exceptions,
            }),
            ForAnalyzedBody::Extended {
                left_frame,
                right_frame,
                left,
                right,
                exceptions,
            } => Ok(PackedVector::AlpExtended {
                left_packed: ffor::pack(&left, &left_frame)?,
                right_packed: ffor::pack(&right, &right_frame)?,
                left_frame,
                right_frame,
                exceptions,
            }),
        }
    }
}

/// A fully compressed vector of [`VECTOR_SIZE`] values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "", tag = "scheme", rename_all = "snake_case")]
pub enum PackedVector<T: AlpFloat> {
    /// Decimal-scaled integers.
    Alp {
        /// Combination the integers were scaled with.
        combination: Combination,
        /// Frame of reference of the integers.
        frame: ForDescriptor<T::Int>,
        /// Bit-packed integers.
        packed: Vec<u8>,
        /// Values restored after decoding.
        exceptions: Exceptions<T>,
    },
    /// Real-double split into dictionary indices and right parts.
    AlpExtended {
        /// Frame of reference of the dictionary indices.
        left_frame: ForDescriptor<u16>,
        /// Bit-packed dictionary indices.
        left_packed: Vec<u8>,
        /// Frame of reference of the right parts.
        right_frame: ForDescriptor<u64>,
        /// Bit-packed right parts.
        right_packed: Vec<u8>,
        /// Left parts restored after decoding.
        exceptions: RdExceptions,
    },
}

impl<T: AlpFloat> PackedVector<T> {
    /// Scheme the vector was encoded with.
    pub fn scheme(&self) -> Scheme {
        match self {
            PackedVector::Alp { .. } => Scheme::Alp,
            PackedVector::AlpExtended { .. } => Scheme::AlpExtended,
        }
    }

    /// Number of exceptions.
    pub fn exception_count(&self) -> usize {
        match self {
            PackedVector::Alp { exceptions, .. } => exceptions.len(),
            PackedVector::AlpExtended { exceptions, .. } => exceptions.len(),
        }
    }

    /// Total bits spent per value across all packed streams.
    pub fn bit_width(&self) -> u8 {
        match self {
            PackedVector::Alp { frame, .. } => frame.bit_width,
            PackedVector::AlpExtended {
                left_frame,
                right_frame,
                ..
            } => left_frame.bit_width + right_frame.bit_width,
        }
    }

    /// Bytes needed to store the vector: packed streams, frame headers and exceptions.
    pub fn size_bytes(&self) -> usize {
        // Exception count.
        let header = size_of::<u16>();
        match self {
            PackedVector::Alp {
                packed, exceptions, ..
            } => {
                // exponent, factor, bit width, base
                header
                    + 3
                    + size_of::<T::Int>()
                    + packed.len()
                    + exceptions.len() * (size_of::<T>() + size_of::<u16>())
            }
            PackedVector::AlpExtended {
                left_packed,
                right_packed,
                exceptions,
                ..
            } => {
                header
                    + 2
                    + size_of::<u16>()
                    + size_of::<u64>()
                    + left_packed.len()
                    + right_packed.len()
                    + exceptions.len() * 2 * size_of::<u16>()
            }
        }
    }

    fn check_state(&self, state: &CompressionState<T>) -> Result<(), AlpError> {
        state.ensure_encodable()?;
        if self.scheme() != state.scheme() {
            return Err(AlpError::SchemeMismatch {
                vector: self.scheme().name(),
                state: state.scheme().name(),
            });
        }
        Ok(())
    }

    /// Decode the single value at `index` without unpacking the whole vector.
    pub fn get(&self, index: usize, state: &CompressionState<T>) -> Result<T, AlpError> {
        self.check_state(state)?;
        if index >= VECTOR_SIZE {
            return Err(AlpError::OutOfBounds {
                offset: index,
                count: 1,
                len: VECTOR_SIZE,
            });
        }
        let position = index as u16;
        let missing = || AlpError::InvalidData(format!("no exception recorded at {}", index));

        match self {
            PackedVector::Alp {
                combination,
                frame,
                packed,
                exceptions,
            } => {
                if let Ok(i) = exceptions.positions.binary_search(&position) {
                    return exceptions.values.get(i).copied().ok_or_else(missing);
                }
                let combination = combination.validate::<T>()?;
                let int = ffor::unpack_at(packed, frame, index)?;
                encoder::decode_value(int, combination).ok_or_else(|| {
                    AlpError::InvalidData(format!("combination {:?} not decodable", combination))
                })
            }
            PackedVector::AlpExtended {
                left_frame,
                left_packed,
                right_frame,
                right_packed,
                exceptions,
            } => {
                let parameters = rd_parameters(state)?;
                let left = match exceptions.positions.binary_search(&position) {
                    Ok(i) => *exceptions.left_parts.get(i).ok_or_else(missing)?,
                    Err(_) => {
                        let slot = ffor::unpack_at(left_packed, left_frame, index)?;
                        *parameters.dictionary.get(slot as usize).ok_or_else(|| {
                            AlpError::InvalidData(format!("dictionary index {} out of range", slot))
                        })?
                    }
                };
                let right = ffor::unpack_at(right_packed, right_frame, index)?;
                Ok(T::from_raw(
                    ((left as u64) << parameters.right_bit_width) | right,
                ))
            }
        }
    }

    /// Unpack the integer streams.
    pub fn unpack(&self) -> Result<Unpacked<'_, T>, AlpError> {
        let body = match self {
            PackedVector::Alp {
                combination,
                frame,
                packed,
                ..
            } => {
                let mut integers: Vec<T::Int> = vec![Default::default(); VECTOR_SIZE];
                ffor::unpack(packed, frame, &mut integers)?;
                UnpackedBody::Alp {
                    combination: *combination,
                    integers,
                }
            }
            PackedVector::AlpExtended {
                left_frame,
                left_packed,
                right_frame,
                right_packed,
                ..
            } => {
                let mut left = vec![0u16; VECTOR_SIZE];
                let mut right = vec![0u64; VECTOR_SIZE];
                ffor::unpack(left_packed, left_frame, &mut left)?;
                ffor::unpack(right_packed, right_frame, &mut right)?;
                UnpackedBody::Extended { left, right }
            }
        };
        Ok(Unpacked { source: self, body })
    }
}

#[derive(Debug)]
enum UnpackedBody<T: AlpFloat> {
    Alp {
        combination: Combination,
        integers: Vec<T::Int>,
    },
    Extended {
        left: Vec<u16>,
        right: Vec<u64>,
    },
}

/// Unpacked integer streams of one vector.
#[derive(Debug)]
pub struct Unpacked<'a, T: AlpFloat> {
    source: &'a PackedVector<T>,
    body: UnpackedBody<T>,
}

impl<'a, T: AlpFloat> Unpacked<'a, T> {
    /// Decode the integers back to floats with the segment state.
    ///
    /// Exception slots are not restored yet.
    pub fn decode(self, state: &'a CompressionState<T>) -> Result<Decoded<'a, T>, AlpError> {
        self.source.check_state(state)?;

        let mut values = vec![T::default(); VECTOR_SIZE];
        let rd = match self.body {
            UnpackedBody::Alp {
                combination,
                integers,
            } => {
                encoder::decode(&integers, combination, &mut values)?;
                None
            }
            UnpackedBody::Extended { left, right } => {
                let parameters = rd_parameters(state)?;
                rd::decode(&left, &right, parameters, &mut values)?;
                Some(parameters)
            }
        };

        Ok(Decoded {
            source: self.source,
            rd,
            values,
        })
    }
}

/// A decoded vector whose exceptions are not restored yet.
#[derive(Debug)]
pub struct Decoded<'a, T: AlpFloat> {
    source: &'a PackedVector<T>,
    rd: Option<&'a RdParameters>,
    values: Vec<T>,
}

impl<T: AlpFloat> Decoded<'_, T> {
    /// Restore the exceptions and return the vector's values.
    pub fn patch(mut self) -> Result<Vec<T>, AlpError> {
        match self.source {
            PackedVector::Alp { exceptions, .. } => encoder::patch(
                &mut self.values,
                &exceptions.values,
                &exceptions.positions,
                exceptions.len(),
            )?,
            PackedVector::AlpExtended { exceptions, .. } => {
                let parameters = self.rd.ok_or_else(|| {
                    AlpError::InvalidData("real-double vector decoded without parameters".into())
                })?;
                rd::patch(
                    &mut self.values,
                    parameters,
                    &exceptions.left_parts,
                    &exceptions.positions,
                    exceptions.len(),
                )?
            }
        }
        Ok(self.values)
    }
}

fn rd_parameters<T: AlpFloat>(state: &CompressionState<T>) -> Result<&RdParameters, AlpError> {
    let parameters = state
        .rd_parameters()
        .ok_or_else(|| AlpError::InvalidData("state has no real-double parameters".into()))?;
    parameters.validate::<T>()?;
    Ok(parameters)
}

/// Encode one vector of exactly [`VECTOR_SIZE`] values with the segment state.
///
/// With per-vector refinement enabled, ALP vectors pick their own combination
/// among the state's candidates.
pub fn encode_vector<T: AlpFloat>(
    input: &[T],
    state: &CompressionState<T>,
    config: &AlpConfig,
) -> Result<Encoded<T>, AlpError> {
    state.ensure_encodable()?;
    check_len("input", input.len())?;

    let body = if state.scheme() == Scheme::AlpExtended {
        let parameters = rd_parameters(state)?;
        let mut left = vec![0u16; VECTOR_SIZE];
        let mut right = vec![0u64; VECTOR_SIZE];
        let mut left_parts = vec![0u16; VECTOR_SIZE];
        let mut positions = vec![0u16; VECTOR_SIZE];
        let count = rd::encode(
            input,
            parameters,
            &mut left,
            &mut right,
            &mut left_parts,
            &mut positions,
        )?;
        left_parts.truncate(count);
        positions.truncate(count);
        EncodedBody::Extended {
            left,
            right,
            exceptions: RdExceptions {
                left_parts,
                positions,
            },
        }
    } else {
        let combination = if config.per_vector_refinement {
            encoder::choose_combination(input, state, &config.exception_policy)?
        } else {
            state.combination()
        };
        let mut integers: Vec<T::Int> = vec![Default::default(); VECTOR_SIZE];
        let mut values = vec![T::default(); VECTOR_SIZE];
        let mut positions = vec![0u16; VECTOR_SIZE];
        let count = encoder::encode(
            input,
            combination,
            &config.exception_policy,
            &mut integers,
            &mut values,
            &mut positions,
        )?;
        values.truncate(count);
        positions.truncate(count);
        EncodedBody::Alp {
            combination,
            integers,
            exceptions: Exceptions { values, positions },
        }
    };

    Ok(Encoded { body })
}

/// Unpack, decode and patch one vector.
pub fn decode_vector<T: AlpFloat>(
    packed: &PackedVector<T>,
    state: &CompressionState<T>,
) -> Result<Vec<T>, AlpError> {
    packed.unpack()?.decode(state)?.patch()
}

/// Stage of a segment that has not been analyzed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unanalyzed;

/// Stage of a segment with a compression state.
#[derive(Debug)]
pub struct Analyzed<T: AlpFloat> {
    state: CompressionState<T>,
    vectors: AtomicUsize,
    values: AtomicUsize,
    exceptions: AtomicUsize,
}

/// Stage of a segment whose vectors are all processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Done {
    /// Vectors encoded.
    pub vectors: usize,
    /// Input values encoded, padding excluded.
    pub values: usize,
    /// Exceptions recorded.
    pub exceptions: usize,
}

/// A column segment moving through analysis and compression.
///
/// # Example
/// ```
/// use alp_rs::{AlpConfig, Segment};
///
/// let values: Vec<f64> = (0..3000).map(|i| (i % 7) as f64 * 0.5 + 0.5).collect();
///
/// let segment = Segment::<f64>::new(AlpConfig::default())
///     .unwrap()
///     .analyze(&values, 0, values.len())
///     .unwrap();
/// let compressed = segment.compress(&values).unwrap();
/// assert_eq!(segment.decompress(&compressed).unwrap(), values);
///
/// let done = segment.finish();
/// assert_eq!(done.summary().values, 3000);
/// ```
#[derive(Debug)]
pub struct Segment<T: AlpFloat, S = Unanalyzed> {
    config: AlpConfig,
    stage: S,
    _marker: PhantomData<T>,
}

impl<T: AlpFloat> Segment<T, Unanalyzed> {
    /// Create a segment, validating `config`.
    pub fn new(config: AlpConfig) -> Result<Self, AlpError> {
        config.validate()?;
        Ok(Segment {
            config,
            stage: Unanalyzed,
            _marker: PhantomData,
        })
    }

    /// Sample `column[offset..offset + tuple_count]` and choose the scheme.
    pub fn analyze(
        self,
        column: &[T],
        offset: usize,
        tuple_count: usize,
    ) -> Result<Segment<T, Analyzed<T>>, AlpError> {
        let state = sampler::analyze(column, offset, tuple_count, &self.config)?;
        Ok(self.with_state(state))
    }

    /// Skip sampling and use a known state, for example one read back from storage.
    pub fn with_state(self, state: CompressionState<T>) -> Segment<T, Analyzed<T>> {
        Segment {
            config: self.config,
            stage: Analyzed {
                state,
                vectors: AtomicUsize::new(0),
                values: AtomicUsize::new(0),
                exceptions: AtomicUsize::new(0),
            },
            _marker: PhantomData,
        }
    }
}

impl<T: AlpFloat> Segment<T, Analyzed<T>> {
    /// The segment's compression state.
    pub fn state(&self) -> &CompressionState<T> {
        &self.stage.state
    }

    /// The segment's configuration.
    pub fn config(&self) -> &AlpConfig {
        &self.config
    }

    /// Encode one full vector.
    pub fn encode(&self, vector: &[T]) -> Result<Encoded<T>, AlpError> {
        self.encode_counted(vector, vector.len())
    }

    /// Encode, analyze and pack one full vector.
    pub fn compress_vector(&self, vector: &[T]) -> Result<PackedVector<T>, AlpError> {
        self.compress_counted(vector, vector.len())
    }

    fn encode_counted(&self, vector: &[T], real_len: usize) -> Result<Encoded<T>, AlpError> {
        let encoded = encode_vector(vector, &self.stage.state, &self.config)?;
        self.stage.vectors.fetch_add(1, Ordering::Relaxed);
        self.stage.values.fetch_add(real_len, Ordering::Relaxed);
        self.stage
            .exceptions
            .fetch_add(encoded.exception_count(), Ordering::Relaxed);
        Ok(encoded)
    }

    fn compress_counted(&self, vector: &[T], real_len: usize) -> Result<PackedVector<T>, AlpError> {
        let analyzed = self.encode_counted(vector, real_len)?.analyze_for_packing();
        let packed = analyzed.pack()?;
        trace!(
            scheme = %packed.scheme(),
            bit_width = packed.bit_width(),
            exceptions = packed.exception_count(),
            "vector packed"
        );
        Ok(packed)
    }

    /// Compress any number of values.
    ///
    /// The final partial vector is padded by repeating its last value; the
    /// padding is dropped again on decompression.
    pub fn compress(&self, values: &[T]) -> Result<CompressedSegment<T>, AlpError> {
        if values.is_empty() {
            return Err(AlpError::EmptyInput);
        }
        self.stage.state.ensure_encodable()?;

        let compress_chunk = |chunk: &[T]| -> Result<PackedVector<T>, AlpError> {
            if chunk.len() == VECTOR_SIZE {
                return self.compress_counted(chunk, VECTOR_SIZE);
            }
            let last = chunk.last().copied().unwrap_or_default();
            let mut padded = Vec::with_capacity(VECTOR_SIZE);
            padded.extend_from_slice(chunk);
            padded.resize(VECTOR_SIZE, last);
            self.compress_counted(&padded, chunk.len())
        };

        let vectors = if self.config.parallel {
            values
                .par_chunks(VECTOR_SIZE)
                .map(compress_chunk)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            values
                .chunks(VECTOR_SIZE)
                .map(compress_chunk)
                .collect::<Result<Vec<_>, _>>()?
        };

        let (min_value, max_value) = min_max(values);
        let segment = CompressedSegment {
            state: self.stage.state.clone(),
            exception_count: vectors.iter().map(PackedVector::exception_count).sum(),
            value_count: values.len(),
            vectors,
            min_value,
            max_value,
        };

        debug!(
            scheme = %segment.state.scheme(),
            values = segment.value_count,
            vectors = segment.vectors.len(),
            exceptions = segment.exception_count,
            bytes = segment.compressed_size_bytes(),
            "segment compressed"
        );

        Ok(segment)
    }

    /// Decompress a segment with this segment's state.
    pub fn decompress(&self, compressed: &CompressedSegment<T>) -> Result<Vec<T>, AlpError> {
        decompress_vectors(
            &compressed.vectors,
            &self.stage.state,
            compressed.value_count,
            self.config.parallel,
        )
    }

    /// Close the segment and keep its counters.
    pub fn finish(self) -> Segment<T, Done> {
        let done = Done {
            vectors: self.stage.vectors.into_inner(),
            values: self.stage.values.into_inner(),
            exceptions: self.stage.exceptions.into_inner(),
        };
        debug!(
            vectors = done.vectors,
            values = done.values,
            exceptions = done.exceptions,
            "segment finished"
        );
        Segment {
            config: self.config,
            stage: done,
            _marker: PhantomData,
        }
    }
}

impl<T: AlpFloat> Segment<T, Done> {
    /// Counters collected while the segment was open.
    pub fn summary(&self) -> Done {
        self.stage
    }
}

fn decompress_vectors<T: AlpFloat>(
    vectors: &[PackedVector<T>],
    state: &CompressionState<T>,
    value_count: usize,
    parallel: bool,
) -> Result<Vec<T>, AlpError> {
    if vectors.len() * VECTOR_SIZE < value_count {
        return Err(AlpError::InvalidData(format!(
            "{} vectors cannot hold {} values",
            vectors.len(),
            value_count
        )));
    }

    let decoded = if parallel {
        vectors
            .par_iter()
            .map(|packed| decode_vector(packed, state))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        vectors
            .iter()
            .map(|packed| decode_vector(packed, state))
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut values: Vec<T> = decoded.into_iter().flatten().collect();
    values.truncate(value_count);
    Ok(values)
}

/// Smallest and largest non-NaN values.
fn min_max<T: AlpFloat>(values: &[T]) -> (Option<T>, Option<T>) {
    values
        .iter()
        .copied()
        .filter(|v| !v.to_f64().is_nan())
        .fold((None, None), |(lo, hi), v| {
            let lo = match lo {
                Some(lo) if lo <= v => lo,
                _ => v,
            };
            let hi = match hi {
                Some(hi) if hi >= v => hi,
                _ => v,
            };
            (Some(lo), Some(hi))
        })
}

/// A compressed column segment with its state and value metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct CompressedSegment<T: AlpFloat> {
    state: CompressionState<T>,
    vectors: Vec<PackedVector<T>>,
    value_count: usize,
    exception_count: usize,
    min_value: Option<T>,
    max_value: Option<T>,
}

impl<T: AlpFloat> CompressedSegment<T> {
    /// State the vectors were encoded with.
    pub fn state(&self) -> &CompressionState<T> {
        &self.state
    }

    /// Compressed vectors, the last one possibly padded.
    pub fn vectors(&self) -> &[PackedVector<T>] {
        &self.vectors
    }

    /// Number of original values.
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Total exceptions over all vectors.
    pub fn exception_count(&self) -> usize {
        self.exception_count
    }

    /// Smallest non-NaN value, if any.
    pub fn min_value(&self) -> Option<T> {
        self.min_value
    }

    /// Largest non-NaN value, if any.
    pub fn max_value(&self) -> Option<T> {
        self.max_value
    }

    /// Bytes needed to store all vectors.
    pub fn compressed_size_bytes(&self) -> usize {
        self.vectors.iter().map(PackedVector::size_bytes).sum()
    }

    /// Compressed size divided by uncompressed size.
    pub fn compression_ratio(&self) -> f64 {
        let original = self.value_count * size_of::<T>();
        if original == 0 {
            return 0.0;
        }
        self.compressed_size_bytes() as f64 / original as f64
    }

    /// Sum of all values, accumulated as `f64`.
    pub fn sum(&self) -> Result<f64, AlpError> {
        Ok(self.decompress()?.iter().map(|v| v.to_f64()).sum())
    }

    /// Decompress every value, one task per vector.
    pub fn decompress(&self) -> Result<Vec<T>, AlpError> {
        decompress_vectors(&self.vectors, &self.state, self.value_count, true)
    }

    /// Decode the value at `index` without decompressing the segment.
    pub fn get(&self, index: usize) -> Result<T, AlpError> {
        if index >= self.value_count {
            return Err(AlpError::OutOfBounds {
                offset: index,
                count: 1,
                len: self.value_count,
            });
        }
        let packed = self.vectors.get(index / VECTOR_SIZE).ok_or_else(|| {
            AlpError::InvalidData(format!("no vector holds value {}", index))
        })?;
        packed.get(index % VECTOR_SIZE, &self.state)
    }

    /// Decompress the vector at `index`, without padding.
    pub fn decompress_vector(&self, index: usize) -> Result<Vec<T>, AlpError> {
        let packed = self.vectors.get(index).ok_or(AlpError::OutOfBounds {
            offset: index,
            count: 1,
            len: self.vectors.len(),
        })?;
        let mut values = decode_vector(packed, &self.state)?;
        values.truncate(self.value_count.saturating_sub(index * VECTOR_SIZE));
        Ok(values)
    }
}
