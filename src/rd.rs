//! Real-double fallback used by [`Scheme::AlpExtended`](crate::Scheme::AlpExtended).
//!
//! Values that do not scale to integers (full-precision measurements, random
//! doubles) still tend to share their high bits: sign, exponent and the top of
//! the mantissa. Each value's raw bits are cut into a left part, replaced by an
//! index into a small dictionary of the most frequent left parts, and a right
//! part stored verbatim. Left parts missing from the dictionary are exceptions.

use std::collections::HashMap;

use crate::constants::{CUTTING_LIMIT, MAX_RD_DICTIONARY_SIZE, RD_EXCEPTION_BITS};
use crate::encoder::check_len;
use crate::error::AlpError;
use crate::float::AlpFloat;
use crate::state::RdParameters;

/// Outcome of the dictionary search over a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct RdEstimate {
    /// Chosen cut and dictionary.
    pub parameters: RdParameters,
    /// Estimated bits per value including exceptions.
    pub bits_per_value: f64,
}

/// Search the cut point and dictionary that minimize the estimated size of `sample`.
///
/// Returns `None` for an empty sample.
pub fn find_parameters<T: AlpFloat>(sample: &[T]) -> Option<RdEstimate> {
    if sample.is_empty() {
        return None;
    }

    let raw: Vec<u64> = sample.iter().map(|v| v.to_raw()).collect();
    let mut best: Option<RdEstimate> = None;

    for left_bit_width in 1..=CUTTING_LIMIT.min(T::BITS - 1) {
        let right_bit_width = T::BITS - left_bit_width;

        let mut counts: HashMap<u16, usize> = HashMap::new();
        for &bits in &raw {
            *counts.entry((bits >> right_bit_width) as u16).or_default() += 1;
        }

        let mut by_frequency: Vec<(u16, usize)> = counts.into_iter().collect();
        by_frequency.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        by_frequency.truncate(MAX_RD_DICTIONARY_SIZE);

        let covered: usize = by_frequency.iter().map(|&(_, n)| n).sum();
        let parameters = RdParameters {
            right_bit_width,
            dictionary: by_frequency.into_iter().map(|(left, _)| left).collect(),
        };

        let exceptions = raw.len() - covered;
        let bits_per_value = right_bit_width as f64
            + parameters.dictionary_bit_width() as f64
            + (exceptions * RD_EXCEPTION_BITS) as f64 / raw.len() as f64;

        if best
            .as_ref()
            .map_or(true, |b| bits_per_value < b.bits_per_value)
        {
            best = Some(RdEstimate {
                parameters,
                bits_per_value,
            });
        }
    }

    best
}

/// Split one vector into dictionary indices and right parts, writing in place.
///
/// Returns the number of exceptions. Exceptions keep their raw left part in
/// `exception_values` and get dictionary index 0.
pub fn encode<T: AlpFloat>(
    input: &[T],
    parameters: &RdParameters,
    left_indices: &mut [u16],
    right_parts: &mut [u64],
    exception_values: &mut [u16],
    exception_positions: &mut [u16],
) -> Result<usize, AlpError> {
    check_len("input", input.len())?;
    check_len("left_indices", left_indices.len())?;
    check_len("right_parts", right_parts.len())?;
    check_len("exceptions", exception_values.len())?;
    check_len("exception_positions", exception_positions.len())?;
    parameters.validate::<T>()?;

    let right_bit_width = parameters.right_bit_width;
    let right_mask = (1u64 << right_bit_width) - 1;
    let mut count = 0usize;

    for (i, &v) in input.iter().enumerate() {
        let bits = v.to_raw();
        let left = (bits >> right_bit_width) as u16;
        right_parts[i] = bits & right_mask;

        match parameters.lookup(left) {
            Some(index) => left_indices[i] = index,
            None => {
                left_indices[i] = 0;
                exception_values[count] = left;
                exception_positions[count] = i as u16;
                count += 1;
            }
        }
    }

    Ok(count)
}

/// Rebuild values from dictionary indices and right parts.
///
/// Exception positions hold the first dictionary entry afterwards; run
/// [`patch`] next.
pub fn decode<T: AlpFloat>(
    left_indices: &[u16],
    right_parts: &[u64],
    parameters: &RdParameters,
    out: &mut [T],
) -> Result<(), AlpError> {
    check_len("left_indices", left_indices.len())?;
    check_len("right_parts", right_parts.len())?;
    check_len("output", out.len())?;
    parameters.validate::<T>()?;

    let right_bit_width = parameters.right_bit_width;
    for ((slot, &index), &right) in out.iter_mut().zip(left_indices).zip(right_parts) {
        let left = *parameters.dictionary.get(index as usize).ok_or_else(|| {
            AlpError::InvalidData(format!("dictionary index {} out of range", index))
        })?;
        *slot = T::from_raw(((left as u64) << right_bit_width) | right);
    }
    Ok(())
}

/// Restore the left part of every exception.
pub fn patch<T: AlpFloat>(
    out: &mut [T],
    parameters: &RdParameters,
    exception_values: &[u16],
    exception_positions: &[u16],
    count: usize,
) -> Result<(), AlpError> {
    if count > exception_values.len() || count > exception_positions.len() {
        return Err(AlpError::InvalidData(format!(
            "exception count {} exceeds buffers of {} values and {} positions",
            count,
            exception_values.len(),
            exception_positions.len()
        )));
    }
    parameters.validate::<T>()?;

    let right_bit_width = parameters.right_bit_width;
    let right_mask = (1u64 << right_bit_width) - 1;
    for (&left, &pos) in exception_values[..count]
        .iter()
        .zip(&exception_positions[..count])
    {
        let slot = out.get_mut(pos as usize).ok_or_else(|| {
            AlpError::InvalidData(format!("exception position {} out of range", pos))
        })?;
        let right = slot.to_raw() & right_mask;
        *slot = T::from_raw(((left as u64) << right_bit_width) | right);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::VECTOR_SIZE;

    /// Deterministic pseudo-random doubles in [lo, hi).
    fn lcg_values(seed: u64, n: usize, lo: f64, hi: f64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                lo + (state >> 11) as f64 / (1u64 << 53) as f64 * (hi - lo)
            })
            .collect()
    }

    #[test]
    fn test_find_parameters_empty() {
        assert!(find_parameters::<f64>(&[]).is_none());
    }

    #[test]
    fn test_find_parameters_shared_high_bits() {
        let sample = lcg_values(7, 256, 100.0, 101.0);
        let estimate = find_parameters(&sample).unwrap();
        // All values share sign, exponent and the top mantissa bits.
        assert!(estimate.parameters.dictionary.len() <= MAX_RD_DICTIONARY_SIZE);
        assert!(estimate.bits_per_value < 64.0);
        assert!(estimate.parameters.right_bit_width >= 48);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let input = lcg_values(42, VECTOR_SIZE, -5000.0, 5000.0);
        let estimate = find_parameters(&input).unwrap();
        let params = estimate.parameters;

        let mut left = vec![0u16; VECTOR_SIZE];
        let mut right = vec![0u64; VECTOR_SIZE];
        let mut exc = vec![0u16; VECTOR_SIZE];
        let mut pos = vec![0u16; VECTOR_SIZE];
        let count = encode(&input, &params, &mut left, &mut right, &mut exc, &mut pos).unwrap();

        let mut out = vec![0.0f64; VECTOR_SIZE];
        decode(&left, &right, &params, &mut out).unwrap();
        patch(&mut out, &params, &exc, &pos, count).unwrap();

        for (a, b) in out.iter().zip(&input) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_exceptions_for_unknown_left_parts() {
        let params = RdParameters {
            right_bit_width: 20,
            dictionary: vec![(1.0f32.to_bits() >> 20) as u16],
        };
        let mut input = vec![1.0f32; VECTOR_SIZE];
        input[10] = -3.5;
        input[900] = 1.0e-20;

        let mut left = vec![0u16; VECTOR_SIZE];
        let mut right = vec![0u64; VECTOR_SIZE];
        let mut exc = vec![0u16; VECTOR_SIZE];
        let mut pos = vec![0u16; VECTOR_SIZE];
        let count = encode(&input, &params, &mut left, &mut right, &mut exc, &mut pos).unwrap();
        assert_eq!(count, 2);
        assert_eq!(&pos[..2], &[10, 900]);
        assert_eq!(exc[0], ((-3.5f32).to_bits() >> 20) as u16);

        let mut out = vec![0.0f32; VECTOR_SIZE];
        decode(&left, &right, &params, &mut out).unwrap();
        patch(&mut out, &params, &exc, &pos, count).unwrap();
        assert_eq!(out[10], -3.5);
        assert_eq!(out[900], 1.0e-20);
    }

    #[test]
    fn test_invalid_parameters() {
        let params = RdParameters {
            right_bit_width: 8,
            dictionary: vec![0],
        };
        let input = vec![0.0f32; VECTOR_SIZE];
        let mut left = vec![0u16; VECTOR_SIZE];
        let mut right = vec![0u64; VECTOR_SIZE];
        let mut exc = vec![0u16; VECTOR_SIZE];
        let mut pos = vec![0u16; VECTOR_SIZE];
        let result = encode(&input, &params, &mut left, &mut right, &mut exc, &mut pos);
        assert!(matches!(result, Err(AlpError::InvalidData(_))));
    }

    #[test]
    fn test_patch_rejects_overwide_cut() {
        let params = RdParameters {
            right_bit_width: 64,
            dictionary: vec![0],
        };
        let mut out = vec![0.0f64; VECTOR_SIZE];
        let result = patch(&mut out, &params, &[1], &[0], 1);
        assert!(matches!(result, Err(AlpError::InvalidData(_))));
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn test_decode_rejects_bad_index() {
        let params = RdParameters {
            right_bit_width: 52,
            dictionary: vec![0x3FF],
        };
        let mut left = vec![0u16; VECTOR_SIZE];
        left[3] = 4;
        let right = vec![0u64; VECTOR_SIZE];
        let mut out = vec![0.0f64; VECTOR_SIZE];
        assert!(decode(&left, &right, &params, &mut out).is_err());
    }
}
