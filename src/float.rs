//! Floating-point types supported by the codec.
//!
//! [`AlpFloat`] ties each float type to the signed integer its scaled values
//! are stored in and to the static powers-of-ten tables the (exponent, factor)
//! indices point into.

use std::fmt::Debug;
use std::ops::Mul;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ffor::PackedInt;

mod private {
    pub trait Sealed {}

    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// A float type that can be compressed with ALP.
///
/// This trait is sealed; it is implemented for `f32` and `f64`.
pub trait AlpFloat:
    Copy
    + Debug
    + Default
    + PartialEq
    + PartialOrd
    + Mul<Output = Self>
    + Send
    + Sync
    + Serialize
    + DeserializeOwned
    + private::Sealed
    + 'static
{
    /// Signed integer the scaled values are encoded into.
    type Int: PackedInt + Serialize + DeserializeOwned;

    /// Width of the float in bits.
    const BITS: u8;

    /// Largest exponent index (and table index) that can be used.
    const MAX_EXPONENT: u8;

    /// Powers of ten, `F10[i] = 10^i`.
    const F10: &'static [Self];

    /// Inverse powers of ten, `IF10[i] = 10^-i`.
    const IF10: &'static [Self];

    /// Round to the nearest integer (ties to even), or `None` when the value
    /// is not finite or does not fit the integer type.
    fn round_to_int(self) -> Option<Self::Int>;

    /// Convert an encoded integer back to a float.
    fn from_int(value: Self::Int) -> Self;

    /// Raw IEEE 754 bits, zero-extended to 64 bits.
    fn to_raw(self) -> u64;

    /// Build a float from raw IEEE 754 bits held in the low bits of `bits`.
    fn from_raw(bits: u64) -> Self;

    /// Widen to `f64`.
    fn to_f64(self) -> f64;
}

impl AlpFloat for f32 {
    type Int = i32;

    const BITS: u8 = 32;
    const MAX_EXPONENT: u8 = 10;

    const F10: &'static [f32] = &[
        1.0,
        10.0,
        100.0,
        1000.0,
        10000.0,
        100000.0,
        1000000.0,
        10000000.0,
        100000000.0,
        1000000000.0,
        10000000000.0,
    ];

    const IF10: &'static [f32] = &[
        1.0,
        0.1,
        0.01,
        0.001,
        0.0001,
        0.00001,
        0.000001,
        0.0000001,
        0.00000001,
        0.000000001,
        0.0000000001,
    ];

    #[inline]
    fn round_to_int(self) -> Option<i32> {
        // Largest f32 strictly below 2^31.
        const LIMIT: f32 = 2147483520.0;
        if !self.is_finite() || self.abs() > LIMIT {
            return None;
        }
        Some(self.round_ties_even() as i32)
    }

    #[inline]
    fn from_int(value: i32) -> f32 {
        value as f32
    }

    #[inline]
    fn to_raw(self) -> u64 {
        self.to_bits() as u64
    }

    #[inline]
    fn from_raw(bits: u64) -> f32 {
        f32::from_bits(bits as u32)
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl AlpFloat for f64 {
    type Int = i64;

    const BITS: u8 = 64;
    const MAX_EXPONENT: u8 = 18;

    const F10: &'static [f64] = &[
        1.0,
        10.0,
        100.0,
        1000.0,
        10000.0,
        100000.0,
        1000000.0,
        10000000.0,
        100000000.0,
        1000000000.0,
        10000000000.0,
        100000000000.0,
        1000000000000.0,
        10000000000000.0,
        100000000000000.0,
        1000000000000000.0,
        10000000000000000.0,
        100000000000000000.0,
        1000000000000000000.0,
    ];

    const IF10: &'static [f64] = &[
        1.0,
        0.1,
        0.01,
        0.001,
        0.0001,
        0.00001,
        0.000001,
        0.0000001,
        0.00000001,
        0.000000001,
        0.0000000001,
        0.00000000001,
        0.000000000001,
        0.0000000000001,
        0.00000000000001,
        0.000000000000001,
        0.0000000000000001,
        0.00000000000000001,
        0.000000000000000001,
    ];

    #[inline]
    fn round_to_int(self) -> Option<i64> {
        // Largest f64 strictly below 2^63.
        const LIMIT: f64 = 9223372036854774784.0;
        if !self.is_finite() || self.abs() > LIMIT {
            return None;
        }
        Some(self.round_ties_even() as i64)
    }

    #[inline]
    fn from_int(value: i64) -> f64 {
        value as f64
    }

    #[inline]
    fn to_raw(self) -> u64 {
        self.to_bits()
    }

    #[inline]
    fn from_raw(bits: u64) -> f64 {
        f64::from_bits(bits)
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_cover_max_exponent() {
        assert_eq!(f32::F10.len(), f32::MAX_EXPONENT as usize + 1);
        assert_eq!(f32::IF10.len(), f32::MAX_EXPONENT as usize + 1);
        assert_eq!(f64::F10.len(), f64::MAX_EXPONENT as usize + 1);
        assert_eq!(f64::IF10.len(), f64::MAX_EXPONENT as usize + 1);
    }

    #[test]
    fn test_round_to_int_ties_to_even() {
        assert_eq!(2.5f64.round_to_int(), Some(2));
        assert_eq!(3.5f64.round_to_int(), Some(4));
        assert_eq!((-2.5f32).round_to_int(), Some(-2));
    }

    #[test]
    fn test_round_to_int_rejects_unrepresentable() {
        assert_eq!(f32::NAN.round_to_int(), None);
        assert_eq!(f32::INFINITY.round_to_int(), None);
        assert_eq!(4.0e9f32.round_to_int(), None);
        assert_eq!(f64::NEG_INFINITY.round_to_int(), None);
        assert_eq!(1.0e19f64.round_to_int(), None);
    }

    #[test]
    fn test_raw_bits_roundtrip() {
        let v = -123.456f32;
        assert_eq!(f32::from_raw(v.to_raw()).to_bits(), v.to_bits());
        let d = 98765.4321f64;
        assert_eq!(f64::from_raw(d.to_raw()).to_bits(), d.to_bits());
    }
}
