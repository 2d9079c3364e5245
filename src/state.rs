//! Per-segment compression state produced by the sampler.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::constants::{CUTTING_LIMIT, MAX_RD_DICTIONARY_SIZE};
use crate::error::AlpError;
use crate::float::AlpFloat;

/// Scheme code reported for [`Scheme::Alp`].
pub const SCHEME_CODE_ALP: i32 = 1;
/// Scheme code reported for [`Scheme::AlpExtended`].
pub const SCHEME_CODE_ALP_EXTENDED: i32 = 2;
/// Scheme code reported for [`Scheme::Invalid`].
pub const SCHEME_CODE_INVALID: i32 = 99;
/// Scheme code reported for anything else.
pub const SCHEME_CODE_UNRECOGNIZED: i32 = -1;

/// Encoding scheme chosen for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scheme {
    /// The segment has not been analyzed.
    #[default]
    Uninitialized,
    /// Decimal scaling to integers.
    Alp,
    /// Real-double fallback: dictionary-coded high bits plus packed low bits.
    AlpExtended,
    /// No scheme beats uncompressed storage.
    Invalid,
}

impl Scheme {
    /// Numeric code used at the storage engine boundary.
    pub fn code(self) -> i32 {
        match self {
            Scheme::Alp => SCHEME_CODE_ALP,
            Scheme::AlpExtended => SCHEME_CODE_ALP_EXTENDED,
            Scheme::Invalid => SCHEME_CODE_INVALID,
            Scheme::Uninitialized => SCHEME_CODE_UNRECOGNIZED,
        }
    }

    /// Parse a boundary code; unknown codes give `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            SCHEME_CODE_ALP => Some(Scheme::Alp),
            SCHEME_CODE_ALP_EXTENDED => Some(Scheme::AlpExtended),
            SCHEME_CODE_INVALID => Some(Scheme::Invalid),
            _ => None,
        }
    }

    /// Whether vectors can be encoded with this scheme.
    pub fn can_encode(self) -> bool {
        matches!(self, Scheme::Alp | Scheme::AlpExtended)
    }

    /// Short name used in errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            Scheme::Uninitialized => "uninitialized",
            Scheme::Alp => "alp",
            Scheme::AlpExtended => "alp_extended",
            Scheme::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An (exponent, factor) pair indexing the powers-of-ten tables.
///
/// Encoding computes `round(v * 10^exponent * 10^-factor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Combination {
    /// Index into the exponent table.
    pub exponent: u8,
    /// Index into the factor table, never larger than `exponent`.
    pub factor: u8,
}

impl Combination {
    /// Create a combination, checking it against the tables of `T`.
    pub fn new<T: AlpFloat>(exponent: u8, factor: u8) -> Result<Self, AlpError> {
        if exponent > T::MAX_EXPONENT || factor > exponent {
            return Err(AlpError::InvalidData(format!(
                "combination (e={}, f={}) outside 0 <= f <= e <= {}",
                exponent,
                factor,
                T::MAX_EXPONENT
            )));
        }
        Ok(Combination { exponent, factor })
    }

    /// Check an existing combination against the tables of `T`.
    pub fn validate<T: AlpFloat>(self) -> Result<Self, AlpError> {
        Combination::new::<T>(self.exponent, self.factor)
    }

    /// Every valid combination for `T`, ordered by exponent then factor.
    pub fn all<T: AlpFloat>() -> impl Iterator<Item = Combination> {
        (0..=T::MAX_EXPONENT)
            .flat_map(|exponent| (0..=exponent).map(move |factor| Combination { exponent, factor }))
    }
}

/// Parameters of the real-double fallback.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RdParameters {
    /// Number of low bits stored verbatim.
    pub right_bit_width: u8,
    /// Most frequent high-bit patterns, indexed by the packed left part.
    pub dictionary: Vec<u16>,
}

impl RdParameters {
    /// Bits needed to index the dictionary.
    pub fn dictionary_bit_width(&self) -> u8 {
        match self.dictionary.len() {
            0 | 1 => 0,
            n => crate::ffor::bit_width_of((n - 1) as u64),
        }
    }

    /// Check the cut point and dictionary size against `T`.
    pub fn validate<T: AlpFloat>(&self) -> Result<(), AlpError> {
        let right = self.right_bit_width;
        if right == 0 || right >= T::BITS || T::BITS - right > CUTTING_LIMIT {
            return Err(AlpError::InvalidData(format!(
                "right bit width {} invalid for {}-bit values",
                right,
                T::BITS
            )));
        }
        if self.dictionary.is_empty() || self.dictionary.len() > MAX_RD_DICTIONARY_SIZE {
            return Err(AlpError::InvalidData(format!(
                "dictionary of {} entries, expected 1..={}",
                self.dictionary.len(),
                MAX_RD_DICTIONARY_SIZE
            )));
        }
        Ok(())
    }

    /// Dictionary slot of `left`, if present.
    #[inline]
    pub fn lookup(&self, left: u16) -> Option<u16> {
        self.dictionary
            .iter()
            .position(|&d| d == left)
            .map(|i| i as u16)
    }
}

/// Read-only result of analyzing one column segment.
///
/// A state is produced by [`analyze`](crate::analyze) and never modified
/// afterwards; all vectors of the segment share it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct CompressionState<T: AlpFloat> {
    pub(crate) scheme: Scheme,
    pub(crate) combination: Combination,
    pub(crate) candidates: Vec<Combination>,
    pub(crate) rd: Option<RdParameters>,
    pub(crate) sampled_value_count: usize,
    pub(crate) estimated_bits_per_value: f64,
    #[serde(skip)]
    pub(crate) _marker: PhantomData<T>,
}

impl<T: AlpFloat> Default for CompressionState<T> {
    fn default() -> Self {
        CompressionState {
            scheme: Scheme::Uninitialized,
            combination: Combination::default(),
            candidates: Vec::new(),
            rd: None,
            sampled_value_count: 0,
            estimated_bits_per_value: T::BITS as f64,
            _marker: PhantomData,
        }
    }
}

impl<T: AlpFloat> CompressionState<T> {
    /// A state for plain ALP with a fixed combination.
    ///
    /// Useful when the combination is already known, for example when it was
    /// persisted next to the data.
    pub fn with_combination(combination: Combination) -> Self {
        CompressionState {
            scheme: Scheme::Alp,
            combination,
            candidates: vec![combination],
            ..Default::default()
        }
    }

    /// The chosen scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Numeric scheme code: 1 = ALP, 2 = ALPExtended, 99 = Invalid, -1 otherwise.
    pub fn scheme_code(&self) -> i32 {
        self.scheme.code()
    }

    /// Factor index of the best combination.
    pub fn factor_index(&self) -> u8 {
        self.combination.factor
    }

    /// Exponent index of the best combination.
    pub fn exponent_index(&self) -> u8 {
        self.combination.exponent
    }

    /// Best combination found by the sampler.
    pub fn combination(&self) -> Combination {
        self.combination
    }

    /// Combinations kept for per-vector refinement, best first.
    pub fn candidates(&self) -> &[Combination] {
        &self.candidates
    }

    /// Real-double parameters, present for [`Scheme::AlpExtended`].
    pub fn rd_parameters(&self) -> Option<&RdParameters> {
        self.rd.as_ref()
    }

    /// Number of values the sampler inspected.
    pub fn sampled_value_count(&self) -> usize {
        self.sampled_value_count
    }

    /// Estimated compressed bits per value for the chosen scheme.
    pub fn estimated_bits_per_value(&self) -> f64 {
        self.estimated_bits_per_value
    }

    /// Fail unless vectors can be encoded with this state.
    ///
    /// States read back from storage are checked here too: every combination
    /// must index the power tables of `T` and real-double parameters must fit
    /// its width.
    pub fn ensure_encodable(&self) -> Result<(), AlpError> {
        if !self.scheme.can_encode() {
            return Err(AlpError::InvalidScheme(self.scheme.name()));
        }
        self.combination.validate::<T>()?;
        for candidate in &self.candidates {
            candidate.validate::<T>()?;
        }
        if self.scheme == Scheme::AlpExtended {
            self.rd
                .as_ref()
                .ok_or_else(|| AlpError::InvalidData("state has no real-double parameters".into()))?
                .validate::<T>()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_codes() {
        assert_eq!(Scheme::Alp.code(), 1);
        assert_eq!(Scheme::AlpExtended.code(), 2);
        assert_eq!(Scheme::Invalid.code(), 99);
        assert_eq!(Scheme::Uninitialized.code(), -1);

        assert_eq!(Scheme::from_code(1), Some(Scheme::Alp));
        assert_eq!(Scheme::from_code(2), Some(Scheme::AlpExtended));
        assert_eq!(Scheme::from_code(99), Some(Scheme::Invalid));
        assert_eq!(Scheme::from_code(-1), None);
        assert_eq!(Scheme::from_code(7), None);
    }

    #[test]
    fn test_combination_bounds() {
        assert!(Combination::new::<f32>(10, 10).is_ok());
        assert!(Combination::new::<f32>(11, 0).is_err());
        assert!(Combination::new::<f64>(18, 3).is_ok());
        assert!(Combination::new::<f64>(2, 3).is_err());
    }

    #[test]
    fn test_all_combinations() {
        // (n + 1)(n + 2) / 2 pairs with 0 <= f <= e <= n
        assert_eq!(Combination::all::<f32>().count(), 66);
        assert_eq!(Combination::all::<f64>().count(), 190);
        let first: Vec<_> = Combination::all::<f32>().take(3).collect();
        assert_eq!(
            first,
            vec![
                Combination { exponent: 0, factor: 0 },
                Combination { exponent: 1, factor: 0 },
                Combination { exponent: 1, factor: 1 },
            ]
        );
    }

    #[test]
    fn test_default_state_cannot_encode() {
        let state = CompressionState::<f32>::default();
        assert_eq!(state.scheme(), Scheme::Uninitialized);
        assert_eq!(state.scheme_code(), -1);
        assert_eq!(
            state.ensure_encodable(),
            Err(AlpError::InvalidScheme("uninitialized"))
        );
    }

    #[test]
    fn test_with_combination_accessors() {
        let state = CompressionState::<f64>::with_combination(Combination {
            exponent: 3,
            factor: 1,
        });
        assert_eq!(state.scheme_code(), 1);
        assert_eq!(state.exponent_index(), 3);
        assert_eq!(state.factor_index(), 1);
        assert_eq!(state.sampled_value_count(), 0);
        assert!(state.ensure_encodable().is_ok());
    }

    #[test]
    fn test_deserialized_state_with_bad_candidate_rejected() {
        let state: CompressionState<f64> = serde_json::from_str(
            r#"{
                "scheme": "Alp",
                "combination": {"exponent": 1, "factor": 0},
                "candidates": [{"exponent": 1, "factor": 0}, {"exponent": 40, "factor": 0}],
                "rd": null,
                "sampled_value_count": 32,
                "estimated_bits_per_value": 3.0
            }"#,
        )
        .unwrap();
        assert!(matches!(
            state.ensure_encodable(),
            Err(AlpError::InvalidData(_))
        ));
    }

    #[test]
    fn test_extended_state_checks_parameters() {
        let mut state = CompressionState::<f32> {
            scheme: Scheme::AlpExtended,
            rd: Some(RdParameters {
                right_bit_width: 64,
                dictionary: vec![0],
            }),
            ..Default::default()
        };
        assert!(state.ensure_encodable().is_err());

        state.rd = None;
        assert!(state.ensure_encodable().is_err());

        state.rd = Some(RdParameters {
            right_bit_width: 20,
            dictionary: vec![0x3F8],
        });
        assert!(state.ensure_encodable().is_ok());
    }

    #[test]
    fn test_rd_parameters_validate() {
        let ok = RdParameters {
            right_bit_width: 52,
            dictionary: vec![0x3FF],
        };
        assert!(ok.validate::<f64>().is_ok());
        // 64 - 52 = 12 left bits is fine for f64, but 52 >= 32 for f32.
        assert!(ok.validate::<f32>().is_err());
        assert!(RdParameters {
            right_bit_width: 52,
            dictionary: vec![],
        }
        .validate::<f64>()
        .is_err());
    }

    #[test]
    fn test_rd_dictionary_lookup() {
        let rd = RdParameters {
            right_bit_width: 48,
            dictionary: vec![0x3FF0, 0x4000, 0x4008],
        };
        assert_eq!(rd.dictionary_bit_width(), 2);
        assert_eq!(rd.lookup(0x4000), Some(1));
        assert_eq!(rd.lookup(0x1234), None);
    }
}
