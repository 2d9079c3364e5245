//! Decimal scaling encoder, decoder and exception patcher.
//!
//! A value `v` is encoded as `round(v * 10^e * 10^-f)` and decoded as
//! `int * 10^f * 10^-e`. Values that do not survive the round trip under the
//! configured [`ExceptionPolicy`] are exceptions: their original value and
//! position are kept aside and their integer slot is filled with the first
//! well-encoded integer of the vector so the slot does not widen the
//! frame of reference.
//!
//! The functions here work on caller-owned buffers of exactly
//! [`VECTOR_SIZE`] elements.

use crate::config::ExceptionPolicy;
use crate::constants::{
    EXCEPTION_POSITION_BITS, SAMPLES_PER_VECTOR, SAMPLING_EARLY_EXIT_THRESHOLD, VECTOR_SIZE,
};
use crate::error::AlpError;
use crate::ffor::{bit_width_of, PackedInt};
use crate::float::AlpFloat;
use crate::state::{Combination, CompressionState};

/// Exception values and positions of one vector, in matching order.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(bound = "")]
pub struct Exceptions<T: AlpFloat> {
    /// Original values.
    pub values: Vec<T>,
    /// Positions within the vector, strictly increasing.
    pub positions: Vec<u16>,
}

impl<T: AlpFloat> Exceptions<T> {
    /// Number of exceptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether there are no exceptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Scale a single value.
///
/// `None` when the value cannot be represented as an integer or the
/// combination falls outside the power tables of `T`.
#[inline]
pub fn encode_value<T: AlpFloat>(value: T, combination: Combination) -> Option<T::Int> {
    let exponent = *T::F10.get(combination.exponent as usize)?;
    let factor = *T::IF10.get(combination.factor as usize)?;
    (value * exponent * factor).round_to_int()
}

/// Unscale a single integer; `None` for a combination outside the tables.
#[inline]
pub fn decode_value<T: AlpFloat>(value: T::Int, combination: Combination) -> Option<T> {
    let factor = *T::F10.get(combination.factor as usize)?;
    let exponent = *T::IF10.get(combination.exponent as usize)?;
    Some(T::from_int(value) * factor * exponent)
}

pub(crate) fn check_len(name: &'static str, actual: usize) -> Result<(), AlpError> {
    if actual != VECTOR_SIZE {
        return Err(AlpError::BufferSize {
            name,
            expected: VECTOR_SIZE,
            actual,
        });
    }
    Ok(())
}

/// Encode one vector into `integers`, writing exceptions in place.
///
/// Returns the number of exceptions; only the first `count` entries of the
/// exception buffers are meaningful.
///
/// # Example
/// ```
/// use alp_rs::{encoder, Combination, ExceptionPolicy, VECTOR_SIZE};
///
/// let mut input = vec![0.5f64; VECTOR_SIZE];
/// input[7] = std::f64::consts::PI;
///
/// let mut integers = vec![0i64; VECTOR_SIZE];
/// let mut exc_values = vec![0.0f64; VECTOR_SIZE];
/// let mut exc_positions = vec![0u16; VECTOR_SIZE];
/// let count = encoder::encode(
///     &input,
///     Combination { exponent: 1, factor: 0 },
///     &ExceptionPolicy::BitExact,
///     &mut integers,
///     &mut exc_values,
///     &mut exc_positions,
/// )
/// .unwrap();
///
/// assert_eq!(count, 1);
/// assert_eq!(exc_positions[0], 7);
/// assert_eq!(integers[7], 5);
/// ```
pub fn encode<T: AlpFloat>(
    input: &[T],
    combination: Combination,
    policy: &ExceptionPolicy,
    integers: &mut [T::Int],
    exception_values: &mut [T],
    exception_positions: &mut [u16],
) -> Result<usize, AlpError> {
    check_len("input", input.len())?;
    check_len("encoded_integers", integers.len())?;
    check_len("exceptions", exception_values.len())?;
    check_len("exception_positions", exception_positions.len())?;
    let combination = combination.validate::<T>()?;

    for (slot, &v) in integers.iter_mut().zip(input) {
        *slot = encode_value(v, combination).unwrap_or_default();
    }

    // The position is always written; the count only advances on a mismatch.
    let mut count = 0usize;
    for (i, (&int, &v)) in integers.iter().zip(input).enumerate() {
        exception_positions[count] = i as u16;
        let decoded = decode_value::<T>(int, combination);
        count += !decoded.is_some_and(|d| policy.accepts(v, d)) as usize;
    }

    if count == 0 {
        return Ok(0);
    }

    for (value, &pos) in exception_values
        .iter_mut()
        .zip(&exception_positions[..count])
    {
        *value = input[pos as usize];
    }

    let fill = first_encoded(&exception_positions[..count], VECTOR_SIZE)
        .map(|i| integers[i])
        .unwrap_or_default();
    for &pos in &exception_positions[..count] {
        integers[pos as usize] = fill;
    }

    Ok(count)
}

/// Index of the first position not listed in the sorted `positions`.
fn first_encoded(positions: &[u16], len: usize) -> Option<usize> {
    let i = positions
        .iter()
        .enumerate()
        .find(|&(i, &pos)| pos as usize != i)
        .map(|(i, _)| i)
        .unwrap_or(positions.len());
    (i < len).then_some(i)
}

/// Decode one vector of integers with `combination`.
///
/// Exception positions hold the fill value afterwards; run [`patch`] next.
pub fn decode<T: AlpFloat>(
    integers: &[T::Int],
    combination: Combination,
    out: &mut [T],
) -> Result<(), AlpError> {
    check_len("encoded_integers", integers.len())?;
    check_len("output", out.len())?;
    let combination = combination.validate::<T>()?;

    let factor = T::F10[combination.factor as usize];
    let exponent = T::IF10[combination.exponent as usize];
    for (slot, &int) in out.iter_mut().zip(integers) {
        *slot = T::from_int(int) * factor * exponent;
    }
    Ok(())
}

/// Overwrite `out[pos]` with the recorded original value for every exception.
pub fn patch<T: AlpFloat>(
    out: &mut [T],
    exception_values: &[T],
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

    for (&value, &pos) in exception_values[..count]
        .iter()
        .zip(&exception_positions[..count])
    {
        let slot = out.get_mut(pos as usize).ok_or_else(|| {
            AlpError::InvalidData(format!("exception position {} out of range", pos))
        })?;
        *slot = value;
    }
    Ok(())
}

/// Estimated cost of encoding some values with one combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SizeEstimate {
    pub bits: u64,
    pub exceptions: usize,
}

/// Estimate the packed size of `values` under `combination`.
///
/// Packed integers cost the FOR bit width of the non-exception values each;
/// an exception costs its full value plus a position.
pub(crate) fn estimate_size<T: AlpFloat>(
    values: &[T],
    combination: Combination,
    policy: &ExceptionPolicy,
) -> SizeEstimate {
    let mut exceptions = 0usize;
    let mut range: Option<(T::Int, T::Int)> = None;

    for &v in values {
        match encode_value(v, combination) {
            Some(int)
                if decode_value::<T>(int, combination).is_some_and(|d| policy.accepts(v, d)) =>
            {
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(int), hi.max(int)),
                    None => (int, int),
                });
            }
            _ => exceptions += 1,
        }
    }

    let bit_width = range.map_or(0, |(lo, hi)| bit_width_of(hi.delta_from(lo))) as u64;
    let exception_bits = (T::BITS as usize + EXCEPTION_POSITION_BITS) as u64;

    SizeEstimate {
        bits: values.len() as u64 * bit_width + exceptions as u64 * exception_bits,
        exceptions,
    }
}

/// Pick the combination for one vector among the state's candidates.
///
/// Scores an evenly spaced sample of the vector against the candidates in
/// order and stops after a run of candidates that do not improve. Fails when
/// the state holds a combination outside the tables of `T`.
pub fn choose_combination<T: AlpFloat>(
    input: &[T],
    state: &CompressionState<T>,
    policy: &ExceptionPolicy,
) -> Result<Combination, AlpError> {
    let fallback = state.combination().validate::<T>()?;
    let candidates = state.candidates();
    for candidate in candidates {
        candidate.validate::<T>()?;
    }
    if candidates.len() <= 1 || input.is_empty() {
        return Ok(fallback);
    }

    let step = (input.len() / SAMPLES_PER_VECTOR).max(1);
    let sample: Vec<T> = input.iter().step_by(step).copied().collect();

    let mut best = candidates[0];
    let mut best_bits = estimate_size(&sample, best, policy).bits;
    let mut worse_in_a_row = 0usize;

    for &candidate in &candidates[1..] {
        let bits = estimate_size(&sample, candidate, policy).bits;
        if bits < best_bits {
            best = candidate;
            best_bits = bits;
            worse_in_a_row = 0;
        } else {
            worse_in_a_row += 1;
            if worse_in_a_row >= SAMPLING_EARLY_EXIT_THRESHOLD {
                break;
            }
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn buffers<T: AlpFloat>() -> (Vec<T::Int>, Vec<T>, Vec<u16>) {
        (
            vec![T::Int::default(); VECTOR_SIZE],
            vec![T::default(); VECTOR_SIZE],
            vec![0u16; VECTOR_SIZE],
        )
    }

    #[test]
    fn test_encode_decode_value() {
        let c = Combination { exponent: 2, factor: 0 };
        assert_eq!(encode_value(12.34f64, c), Some(1234));
        assert_eq!(decode_value::<f64>(1234, c), Some(12.34));

        let c = Combination { exponent: 1, factor: 0 };
        assert_eq!(encode_value(1.5f32, c), Some(15));
        assert_eq!(decode_value::<f32>(15, c), Some(1.5));
    }

    #[test]
    fn test_combination_outside_tables() {
        let c = Combination { exponent: 11, factor: 0 };
        assert_eq!(encode_value(1.5f32, c), None);
        assert_eq!(decode_value::<f32>(15, c), None);
        // Valid for f64, whose tables go up to 10^18.
        assert_eq!(encode_value(1.5f64, c), Some(150_000_000_000));

        let c = Combination { exponent: 40, factor: 0 };
        assert_eq!(encode_value(1.5f64, c), None);
        let mut out = vec![0.0f64; VECTOR_SIZE];
        assert!(decode(&vec![0i64; VECTOR_SIZE], c, &mut out).is_err());
    }

    #[test]
    fn test_encode_without_exceptions() {
        let input: Vec<f64> = (0..VECTOR_SIZE).map(|i| i as f64 / 2.0).collect();
        let c = Combination { exponent: 1, factor: 0 };
        let (mut ints, mut exc, mut pos) = buffers::<f64>();

        let count = encode(&input, c, &ExceptionPolicy::BitExact, &mut ints, &mut exc, &mut pos)
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(ints[1], 5);
        assert_eq!(ints[1023], 5115);

        let mut out = vec![0.0f64; VECTOR_SIZE];
        decode(&ints, c, &mut out).unwrap();
        for (a, b) in out.iter().zip(&input) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_special_values_become_exceptions() {
        let mut input = vec![2.25f32; VECTOR_SIZE];
        input[0] = f32::NAN;
        input[1] = f32::INFINITY;
        input[2] = -0.0;
        input[3] = 3.0e12;
        let c = Combination { exponent: 2, factor: 0 };
        let (mut ints, mut exc, mut pos) = buffers::<f32>();

        let count = encode(&input, c, &ExceptionPolicy::BitExact, &mut ints, &mut exc, &mut pos)
            .unwrap();
        assert_eq!(count, 4);
        assert_eq!(&pos[..4], &[0, 1, 2, 3]);
        // Exceptions take the first well-encoded integer.
        assert!(ints[..4].iter().all(|&i| i == 225));

        let mut out = vec![0.0f32; VECTOR_SIZE];
        decode(&ints, c, &mut out).unwrap();
        patch(&mut out, &exc, &pos, count).unwrap();
        for (a, b) in out.iter().zip(&input) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_all_exceptions_fill_with_zero() {
        let input: Vec<f64> = (0..VECTOR_SIZE).map(|i| (i as f64 + 0.5).sqrt()).collect();
        let c = Combination { exponent: 0, factor: 0 };
        let (mut ints, mut exc, mut pos) = buffers::<f64>();

        let count = encode(&input, c, &ExceptionPolicy::BitExact, &mut ints, &mut exc, &mut pos)
            .unwrap();
        assert_eq!(count, VECTOR_SIZE);
        assert!(ints.iter().all(|&i| i == 0));
    }

    #[test]
    fn test_wrong_buffer_size() {
        let input = vec![1.0f32; 10];
        let (mut ints, mut exc, mut pos) = buffers::<f32>();
        let result = encode(
            &input,
            Combination::default(),
            &ExceptionPolicy::BitExact,
            &mut ints,
            &mut exc,
            &mut pos,
        );
        assert_eq!(
            result,
            Err(AlpError::BufferSize {
                name: "input",
                expected: VECTOR_SIZE,
                actual: 10
            })
        );
    }

    #[test]
    fn test_invalid_combination_rejected() {
        let input = vec![1.0f32; VECTOR_SIZE];
        let (mut ints, mut exc, mut pos) = buffers::<f32>();
        let result = encode(
            &input,
            Combination { exponent: 3, factor: 4 },
            &ExceptionPolicy::BitExact,
            &mut ints,
            &mut exc,
            &mut pos,
        );
        assert!(matches!(result, Err(AlpError::InvalidData(_))));
    }

    #[test]
    fn test_tolerance_policy_reduces_exceptions() {
        let input: Vec<f64> = (0..VECTOR_SIZE).map(|i| i as f64 * 0.0101).collect();
        let c = Combination { exponent: 2, factor: 0 };
        let (mut ints, mut exc, mut pos) = buffers::<f64>();

        let strict = encode(&input, c, &ExceptionPolicy::BitExact, &mut ints, &mut exc, &mut pos)
            .unwrap();
        let loose = encode(
            &input,
            c,
            &ExceptionPolicy::Tolerance { max_abs_error: 0.01 },
            &mut ints,
            &mut exc,
            &mut pos,
        )
        .unwrap();
        assert!(strict > 0);
        assert_eq!(loose, 0);
    }

    #[test]
    fn test_patch_rejects_bad_positions() {
        let mut out = vec![0.0f32; 4];
        assert!(patch(&mut out, &[1.0], &[9], 1).is_err());
        assert!(patch(&mut out, &[1.0], &[0], 2).is_err());
        patch(&mut out, &[1.0, 2.0], &[3, 1], 2).unwrap();
        assert_eq!(out, vec![0.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_estimate_size() {
        let values = [1.5f64, 2.5, 3.5, std::f64::consts::E];
        let c = Combination { exponent: 1, factor: 0 };
        let est = estimate_size(&values, c, &ExceptionPolicy::BitExact);
        assert_eq!(est.exceptions, 1);
        // 15..=35 spans 20 -> 5 bits for four values, one exception of 64 + 16 bits.
        assert_eq!(est.bits, 4 * 5 + 80);
    }

    #[test]
    fn test_choose_combination_prefers_cheaper_candidate() {
        let mut state = CompressionState::<f64>::with_combination(Combination {
            exponent: 0,
            factor: 0,
        });
        state.candidates = vec![
            Combination { exponent: 0, factor: 0 },
            Combination { exponent: 2, factor: 0 },
        ];
        let input: Vec<f64> = (0..VECTOR_SIZE).map(|i| i as f64 / 100.0).collect();
        let chosen = choose_combination(&input, &state, &ExceptionPolicy::BitExact).unwrap();
        assert_eq!(chosen, Combination { exponent: 2, factor: 0 });
    }

    #[test]
    fn test_choose_combination_rejects_bad_candidate() {
        let mut state = CompressionState::<f32>::with_combination(Combination {
            exponent: 1,
            factor: 0,
        });
        state.candidates = vec![
            Combination { exponent: 1, factor: 0 },
            Combination { exponent: 11, factor: 0 },
        ];
        let input = vec![1.5f32; VECTOR_SIZE];
        assert!(matches!(
            choose_combination(&input, &state, &ExceptionPolicy::BitExact),
            Err(AlpError::InvalidData(_))
        ));
    }
}
