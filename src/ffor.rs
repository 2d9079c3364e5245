//! Frame-of-reference analysis and fused FOR bit-packing (FFOR / UNFFOR).
//!
//! Every integer of a vector is stored as `value - base` in `bit_width` bits,
//! concatenated without padding between values.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::bitpack::BitPack;
use crate::error::AlpError;

/// An integer type that can be frame-of-reference packed.
pub trait PackedInt: Copy + Ord + Default + Debug + Send + Sync + 'static {
    /// Width of the type in bits.
    const BITS: u8;

    /// `self - base` reinterpreted as an unsigned value of the same width.
    fn delta_from(self, base: Self) -> u64;

    /// Inverse of [`delta_from`](PackedInt::delta_from).
    fn add_delta(base: Self, delta: u64) -> Self;
}

macro_rules! impl_packed_int {
    ($($t:ty => $u:ty),* $(,)?) => {
        $(
            impl PackedInt for $t {
                const BITS: u8 = <$t>::BITS as u8;

                #[inline]
                fn delta_from(self, base: Self) -> u64 {
                    self.wrapping_sub(base) as $u as u64
                }

                #[inline]
                fn add_delta(base: Self, delta: u64) -> Self {
                    base.wrapping_add(delta as $u as $t)
                }
            }
        )*
    };
}

impl_packed_int!(
    i32 => u32,
    i64 => u64,
    u16 => u16,
    u32 => u32,
    u64 => u64,
);

/// Frame-of-reference descriptor of one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForDescriptor<I> {
    /// Reference value subtracted from every integer.
    pub base: I,
    /// Bits used for each packed value.
    pub bit_width: u8,
}

impl<I: PackedInt> ForDescriptor<I> {
    /// Number of bytes `count` values occupy once packed.
    #[inline]
    pub fn packed_len(&self, count: usize) -> usize {
        (count * self.bit_width as usize).div_ceil(8)
    }
}

/// Number of bits needed to store `delta` as an unsigned value.
#[inline]
pub fn bit_width_of(delta: u64) -> u8 {
    (u64::BITS - delta.leading_zeros()) as u8
}

/// Compute the minimal base and bit width for `values`.
///
/// The base is the minimum value; an empty or constant input needs zero bits.
pub fn analyze_for_packing<I: PackedInt>(values: &[I]) -> ForDescriptor<I> {
    let Some(&first) = values.first() else {
        return ForDescriptor {
            base: I::default(),
            bit_width: 0,
        };
    };

    let (min, max) = values.iter().fold((first, first), |(min, max), &v| {
        (min.min(v), max.max(v))
    });

    ForDescriptor {
        base: min,
        bit_width: bit_width_of(max.delta_from(min)),
    }
}

/// Pack `values` relative to `descriptor.base` using `descriptor.bit_width` bits each.
///
/// Values outside the descriptor's range keep only their low bits; use the
/// descriptor returned by [`analyze_for_packing`] for a lossless result.
pub fn pack<I: PackedInt>(values: &[I], descriptor: &ForDescriptor<I>) -> Result<Vec<u8>, AlpError> {
    let bits = descriptor.bit_width as usize;
    if bits > I::BITS as usize {
        return Err(AlpError::BitWidthExceeded {
            width: bits,
            max: I::BITS as usize,
        });
    }
    if bits == 0 {
        return Ok(Vec::new());
    }

    let mut bitpack = BitPack::<Vec<u8>>::with_capacity(descriptor.packed_len(values.len()));
    for &v in values {
        bitpack.write(v.delta_from(descriptor.base), bits)?;
    }
    Ok(bitpack.into_vec())
}

/// Unpack `out.len()` values from `bytes`, adding `descriptor.base` back.
pub fn unpack<I: PackedInt>(
    bytes: &[u8],
    descriptor: &ForDescriptor<I>,
    out: &mut [I],
) -> Result<(), AlpError> {
    let bits = descriptor.bit_width as usize;
    if bits > I::BITS as usize {
        return Err(AlpError::BitWidthExceeded {
            width: bits,
            max: I::BITS as usize,
        });
    }
    if bits == 0 {
        out.fill(descriptor.base);
        return Ok(());
    }

    let mut bitpack = BitPack::<&[u8]>::new(bytes);
    for slot in out.iter_mut() {
        *slot = I::add_delta(descriptor.base, bitpack.read(bits)?);
    }
    Ok(())
}

/// Unpack the single value at `index` without touching the values before it.
pub fn unpack_at<I: PackedInt>(
    bytes: &[u8],
    descriptor: &ForDescriptor<I>,
    index: usize,
) -> Result<I, AlpError> {
    let bits = descriptor.bit_width as usize;
    if bits > I::BITS as usize {
        return Err(AlpError::BitWidthExceeded {
            width: bits,
            max: I::BITS as usize,
        });
    }
    if bits == 0 {
        return Ok(descriptor.base);
    }

    let mut bitpack = BitPack::<&[u8]>::new(bytes);
    bitpack.skip(index * bits)?;
    Ok(I::add_delta(descriptor.base, bitpack.read(bits)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_constant_vector() {
        let values = vec![42i32; 1024];
        let desc = analyze_for_packing(&values);
        assert_eq!(desc, ForDescriptor { base: 42, bit_width: 0 });
        assert!(pack(&values, &desc).unwrap().is_empty());

        let mut out = vec![0i32; 1024];
        unpack(&[], &desc, &mut out).unwrap();
        assert!(out.iter().all(|&v| v == 42));
    }

    #[test]
    fn test_analyze_empty() {
        let desc = analyze_for_packing::<i64>(&[]);
        assert_eq!(desc, ForDescriptor { base: 0, bit_width: 0 });
    }

    #[test]
    fn test_analyze_range() {
        let desc = analyze_for_packing(&[-3i32, 4, 0, 12]);
        assert_eq!(desc.base, -3);
        // 12 - (-3) = 15 fits in 4 bits
        assert_eq!(desc.bit_width, 4);

        let desc = analyze_for_packing(&[-3i32, 13]);
        assert_eq!(desc.bit_width, 5);
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let values: Vec<i32> = (0..1024).map(|i| (i * 37 % 501) - 250).collect();
        let desc = analyze_for_packing(&values);
        let packed = pack(&values, &desc).unwrap();
        assert_eq!(packed.len(), desc.packed_len(values.len()));

        let mut out = vec![0i32; values.len()];
        unpack(&packed, &desc, &mut out).unwrap();
        assert_eq!(out, values);
    }

    #[test]
    fn test_unpack_at() {
        let values: Vec<i64> = (0..100).map(|i| i * i - 2000).collect();
        let desc = analyze_for_packing(&values);
        let packed = pack(&values, &desc).unwrap();
        assert_eq!(unpack_at(&packed, &desc, 0).unwrap(), -2000);
        assert_eq!(unpack_at(&packed, &desc, 57).unwrap(), 57 * 57 - 2000);
        assert_eq!(unpack_at(&packed, &desc, 99).unwrap(), 99 * 99 - 2000);
        assert!(unpack_at(&packed, &desc, 100).is_err());

        let constant = ForDescriptor { base: 7i64, bit_width: 0 };
        assert_eq!(unpack_at(&[], &constant, 500).unwrap(), 7);
    }

    #[test]
    fn test_full_range_i32() {
        let values = [i32::MIN, i32::MAX, 0, -1];
        let desc = analyze_for_packing(&values);
        assert_eq!(desc.bit_width, 32);

        let packed = pack(&values, &desc).unwrap();
        let mut out = [0i32; 4];
        unpack(&packed, &desc, &mut out).unwrap();
        assert_eq!(out, values);
    }

    #[test]
    fn test_full_range_i64() {
        let values = [i64::MIN, i64::MAX, 17, -17];
        let desc = analyze_for_packing(&values);
        assert_eq!(desc.bit_width, 64);

        let packed = pack(&values, &desc).unwrap();
        let mut out = [0i64; 4];
        unpack(&packed, &desc, &mut out).unwrap();
        assert_eq!(out, values);
    }

    #[test]
    fn test_final_byte_zero_padded() {
        let values = [1u16, 1, 1];
        let desc = ForDescriptor { base: 0, bit_width: 3 };
        let packed = pack(&values, &desc).unwrap();
        // 9 bits: 001 001 001 -> 0b01001001, 0b00000000
        assert_eq!(packed, vec![0b0100_1001, 0b0000_0000]);
    }

    #[test]
    fn test_bit_width_too_large() {
        let desc = ForDescriptor { base: 0i32, bit_width: 33 };
        assert!(matches!(
            pack(&[1i32], &desc),
            Err(AlpError::BitWidthExceeded { width: 33, max: 32 })
        ));
    }

    #[test]
    fn test_unpack_truncated() {
        let values = [5u32; 16];
        let desc = ForDescriptor { base: 0, bit_width: 7 };
        let packed = pack(&values, &desc).unwrap();
        let mut out = [0u32; 16];
        let result = unpack(&packed[..packed.len() - 2], &desc, &mut out);
        assert!(matches!(result, Err(AlpError::BufferOverflow { .. })));
    }
}
