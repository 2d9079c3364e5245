//! LSB-first bit stream over a byte buffer.
//!
//! `BitPack<&[u8]>` reads fixed-width fields, `BitPack<Vec<u8>>` appends them.
//! Fields are laid out back to back starting at bit 0 of byte 0; the unused
//! high bits of the last byte are zero.

use crate::error::AlpError;

/// Widest field that can be read or written at once.
pub const MAX_BITS: usize = 64;

const BYTE_BITS: usize = 8;

#[inline]
fn low_mask(bits: usize) -> u64 {
    if bits >= MAX_BITS {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn check_width(bits: usize) -> Result<(), AlpError> {
    if bits > MAX_BITS {
        return Err(AlpError::BitWidthExceeded {
            width: bits,
            max: MAX_BITS,
        });
    }
    Ok(())
}

/// A bit stream positioned at an absolute bit offset of its buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitPack<B> {
    buff: B,
    position: usize,
}

impl<B> BitPack<B> {
    /// Start a stream at bit 0 of `buff`.
    #[inline]
    pub fn new(buff: B) -> Self {
        BitPack { buff, position: 0 }
    }
}

impl BitPack<&[u8]> {
    fn remaining(&self) -> usize {
        (self.buff.len() * BYTE_BITS).saturating_sub(self.position)
    }

    fn ensure_remaining(&self, bits: usize) -> Result<(), AlpError> {
        let available = self.remaining();
        if available < bits {
            return Err(AlpError::BufferOverflow {
                attempted: bits,
                available,
            });
        }
        Ok(())
    }

    /// Read the next `bits`-wide field (at most 64 bits).
    pub fn read(&mut self, bits: usize) -> Result<u64, AlpError> {
        check_width(bits)?;
        self.ensure_remaining(bits)?;

        let mut value = 0u64;
        let mut filled = 0usize;
        while filled < bits {
            let byte = self.buff[self.position / BYTE_BITS] as u64;
            let offset = self.position % BYTE_BITS;
            let take = (bits - filled).min(BYTE_BITS - offset);

            value |= ((byte >> offset) & low_mask(take)) << filled;
            filled += take;
            self.position += take;
        }
        Ok(value)
    }

    /// Move past `bits` bits without reading them.
    #[inline]
    pub fn skip(&mut self, bits: usize) -> Result<(), AlpError> {
        self.ensure_remaining(bits)?;
        self.position += bits;
        Ok(())
    }
}

impl BitPack<Vec<u8>> {
    /// Start an empty stream with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Vec::with_capacity(capacity))
    }

    /// Append the low `bits` bits of `value` (at most 64 bits).
    pub fn write(&mut self, value: u64, bits: usize) -> Result<(), AlpError> {
        check_width(bits)?;

        let end = (self.position + bits).div_ceil(BYTE_BITS);
        if end > self.buff.len() {
            self.buff.resize(end, 0);
        }

        let mut rest = value & low_mask(bits);
        let mut written = 0usize;
        while written < bits {
            let offset = self.position % BYTE_BITS;
            let take = (bits - written).min(BYTE_BITS - offset);

            self.buff[self.position / BYTE_BITS] |= ((rest & low_mask(take)) as u8) << offset;
            rest >>= take;
            written += take;
            self.position += take;
        }
        Ok(())
    }

    /// Finish the stream and return its bytes.
    #[inline]
    pub fn into_vec(self) -> Vec<u8> {
        self.buff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_roundtrip() {
        let mut writer = BitPack::<Vec<u8>>::with_capacity(8);
        writer.write(10, 4).unwrap();
        writer.write(1021, 10).unwrap();
        writer.write(3, 2).unwrap();

        let bytes = writer.into_vec();
        let mut reader = BitPack::<&[u8]>::new(&bytes);
        assert_eq!(reader.read(4).unwrap(), 10);
        assert_eq!(reader.read(10).unwrap(), 1021);
        assert_eq!(reader.read(2).unwrap(), 3);
    }

    #[test]
    fn test_single_bits() {
        let mut writer = BitPack::<Vec<u8>>::with_capacity(1);
        for bit in [1, 0, 0, 1] {
            writer.write(bit, 1).unwrap();
        }
        let bytes = writer.into_vec();
        assert_eq!(bytes, vec![0b1001]);

        let mut reader = BitPack::<&[u8]>::new(&bytes);
        let bits: Vec<u64> = (0..4).map(|_| reader.read(1).unwrap()).collect();
        assert_eq!(bits, vec![1, 0, 0, 1]);
    }

    #[test]
    fn test_full_width_values() {
        let mut writer = BitPack::<Vec<u8>>::with_capacity(0);
        writer.write(5, 3).unwrap();
        writer.write(u64::MAX, 64).unwrap();
        writer.write(0xDEAD_BEEF_CAFE_F00D, 64).unwrap();
        let bytes = writer.into_vec();
        assert_eq!(bytes.len(), 17);

        let mut reader = BitPack::<&[u8]>::new(&bytes);
        assert_eq!(reader.read(3).unwrap(), 5);
        assert_eq!(reader.read(64).unwrap(), u64::MAX);
        assert_eq!(reader.read(64).unwrap(), 0xDEAD_BEEF_CAFE_F00D);
    }

    #[test]
    fn test_write_masks_high_bits() {
        let mut writer = BitPack::<Vec<u8>>::with_capacity(1);
        writer.write(0xFF, 4).unwrap();
        writer.write(0, 4).unwrap();
        assert_eq!(writer.into_vec(), vec![0x0F]);
    }

    #[test]
    fn test_read_past_end() {
        let data = [0xAAu8];
        let mut reader = BitPack::<&[u8]>::new(&data);
        reader.skip(6).unwrap();
        assert_eq!(
            reader.read(3),
            Err(AlpError::BufferOverflow {
                attempted: 3,
                available: 2
            })
        );
        assert!(reader.skip(3).is_err());
        assert_eq!(reader.read(2).unwrap(), 0b10);
    }

    #[test]
    fn test_bit_width_exceeded() {
        let mut writer = BitPack::<Vec<u8>>::with_capacity(8);
        assert!(matches!(
            writer.write(0, 65),
            Err(AlpError::BitWidthExceeded { width: 65, .. })
        ));
    }
}
