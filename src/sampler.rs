//! Segment sampling and scheme selection.
//!
//! A bounded sample is drawn from the segment: a few evenly spaced vectors per
//! row group and a few evenly spaced values per sampled vector. Every
//! (exponent, factor) combination is scored on that sample, and the cheapest
//! one becomes the segment's combination. When decimal scaling leaves too many
//! exceptions the real-double fallback is considered, and when nothing beats
//! storing the raw values the segment is marked [`Scheme::Invalid`].

use std::cmp::Ordering;
use std::marker::PhantomData;

use tracing::{debug, warn};

use crate::config::AlpConfig;
use crate::constants::{ROWGROUP_SIZE, ROWGROUP_VECTOR_SAMPLES, SAMPLES_PER_VECTOR, VECTOR_SIZE};
use crate::encoder::estimate_size;
use crate::error::AlpError;
use crate::float::AlpFloat;
use crate::rd;
use crate::state::{Combination, CompressionState, Scheme};

/// Score of one combination over the whole sample.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    combination: Combination,
    bits: u64,
    exceptions: usize,
}

impl Ranked {
    /// Smaller size first, then smaller exponent, then smaller factor.
    fn order(&self, other: &Self) -> Ordering {
        self.bits
            .cmp(&other.bits)
            .then(self.combination.exponent.cmp(&other.combination.exponent))
            .then(self.combination.factor.cmp(&other.combination.factor))
    }
}

/// Draw sample groups from `values`, one group per sampled vector.
///
/// At most `max_sample_values` values are taken in total; row groups are
/// skipped evenly when the column is too long to sample all of them.
fn sample_groups<T: Copy>(values: &[T], max_sample_values: usize) -> Vec<Vec<T>> {
    let rowgroups = values.len().div_ceil(ROWGROUP_SIZE);
    let max_groups = (max_sample_values / SAMPLES_PER_VECTOR).max(1);
    let rowgroup_jump = (rowgroups * ROWGROUP_VECTOR_SAMPLES).div_ceil(max_groups).max(1);

    let mut budget = max_sample_values;
    let mut groups = Vec::new();

    for rowgroup in values.chunks(ROWGROUP_SIZE).step_by(rowgroup_jump) {
        let vectors = rowgroup.len().div_ceil(VECTOR_SIZE);
        let vector_jump = (vectors / ROWGROUP_VECTOR_SAMPLES).max(1);

        for vector in rowgroup
            .chunks(VECTOR_SIZE)
            .step_by(vector_jump)
            .take(ROWGROUP_VECTOR_SAMPLES)
        {
            if budget == 0 {
                return groups;
            }
            let step = (vector.len() / SAMPLES_PER_VECTOR).max(1);
            let group: Vec<T> = vector
                .iter()
                .step_by(step)
                .take(SAMPLES_PER_VECTOR.min(budget))
                .copied()
                .collect();
            budget -= group.len();
            groups.push(group);
        }
    }

    groups
}

/// Analyze `tuple_count` values of `column` starting at `offset`.
///
/// The returned state is immutable and shared by every vector of the segment.
/// A segment that should be stored uncompressed is reported through
/// [`Scheme::Invalid`], not through an error; errors are reserved for an
/// out-of-bounds range or an invalid configuration.
///
/// # Example
/// ```
/// use alp_rs::{analyze, AlpConfig, Scheme};
///
/// let column: Vec<f64> = (0..4096).map(|i| (i * 7 % 1000) as f64 / 100.0).collect();
/// let state = analyze(&column, 0, column.len(), &AlpConfig::default()).unwrap();
///
/// assert_eq!(state.scheme(), Scheme::Alp);
/// assert_eq!(state.scheme_code(), 1);
/// assert!(state.factor_index() <= state.exponent_index());
/// ```
pub fn analyze<T: AlpFloat>(
    column: &[T],
    offset: usize,
    tuple_count: usize,
    config: &AlpConfig,
) -> Result<CompressionState<T>, AlpError> {
    config.validate()?;

    let end = offset
        .checked_add(tuple_count)
        .filter(|&end| end <= column.len())
        .ok_or(AlpError::OutOfBounds {
            offset,
            count: tuple_count,
            len: column.len(),
        })?;

    let groups = sample_groups(&column[offset..end], config.max_sample_values);
    let sampled_value_count: usize = groups.iter().map(Vec::len).sum();

    if sampled_value_count == 0 {
        warn!(offset, tuple_count, "empty segment, no scheme selected");
        return Ok(CompressionState {
            scheme: Scheme::Invalid,
            ..Default::default()
        });
    }

    let policy = &config.exception_policy;
    let mut ranked: Vec<Ranked> = Combination::all::<T>()
        .map(|combination| {
            groups.iter().fold(
                Ranked {
                    combination,
                    bits: 0,
                    exceptions: 0,
                },
                |mut acc, group| {
                    let estimate = estimate_size(group, combination, policy);
                    acc.bits += estimate.bits;
                    acc.exceptions += estimate.exceptions;
                    acc
                },
            )
        })
        .collect();
    ranked.sort_by(Ranked::order);

    let best = ranked[0];
    let candidates: Vec<Combination> = ranked
        .iter()
        .take(config.max_combinations)
        .map(|r| r.combination)
        .collect();

    let alp_bits_per_value = best.bits as f64 / sampled_value_count as f64;
    let exception_ratio = best.exceptions as f64 / sampled_value_count as f64;
    let raw_bits = T::BITS as f64;

    let extended = if config.enable_extended {
        rd::find_parameters(&groups.concat())
    } else {
        None
    };

    let alp_acceptable = exception_ratio <= config.max_exception_ratio
        && alp_bits_per_value < raw_bits
        && extended
            .as_ref()
            .map_or(true, |rd| alp_bits_per_value <= rd.bits_per_value);

    let mut state = CompressionState {
        scheme: Scheme::Alp,
        combination: best.combination,
        candidates,
        rd: None,
        sampled_value_count,
        estimated_bits_per_value: alp_bits_per_value,
        _marker: PhantomData,
    };

    if !alp_acceptable {
        match extended {
            Some(rd) if rd.bits_per_value < raw_bits => {
                state.scheme = Scheme::AlpExtended;
                state.estimated_bits_per_value = rd.bits_per_value;
                state.rd = Some(rd.parameters);
            }
            _ => {
                warn!(
                    sampled_value_count,
                    exception_ratio, "no scheme beats uncompressed storage"
                );
                state.scheme = Scheme::Invalid;
                state.estimated_bits_per_value = raw_bits;
            }
        }
    }

    debug!(
        scheme = %state.scheme,
        exponent = state.combination.exponent,
        factor = state.combination.factor,
        sampled_value_count,
        exception_ratio,
        bits_per_value = state.estimated_bits_per_value,
        "segment analyzed"
    );

    Ok(state)
}
