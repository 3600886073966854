use crate::buf::{NetBuf, PartialRead, PartialWrite};
use crate::error::{BufError, Result};

/// A fieldless enum that can be bit-packed by ordinal.
///
/// ```
/// use ctxnet_buf::NetEnum;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum Channel { Red, Green, Blue }
///
/// impl NetEnum for Channel {
///     const VARIANTS: u32 = 3;
///
///     fn ordinal(&self) -> u32 {
///         *self as u32
///     }
///
///     fn from_ordinal(ordinal: u32) -> Option<Self> {
///         [Self::Red, Self::Green, Self::Blue].get(ordinal as usize).copied()
///     }
/// }
/// ```
pub trait NetEnum: Sized {
    /// Number of variants.
    const VARIANTS: u32;

    /// Index of this variant in `0..VARIANTS`.
    fn ordinal(&self) -> u32;

    /// Variant at `ordinal`, if any.
    fn from_ordinal(ordinal: u32) -> Option<Self>;
}

/// Bits needed to store any ordinal below `variants`: `ceil(log2(variants))`.
pub fn bits_for_variants(variants: u32) -> u32 {
    if variants <= 1 {
        0
    } else {
        u32::BITS - (variants - 1).leading_zeros()
    }
}

fn mask(length: u32) -> u32 {
    if length >= 32 {
        u32::MAX
    } else {
        (1 << length) - 1
    }
}

fn check_length(length: u32) -> Result<()> {
    if (1..=32).contains(&length) {
        Ok(())
    } else {
        Err(BufError::InvalidBitLength(length))
    }
}

impl NetBuf {
    /// Open the current partial write byte, appending a fresh zero byte if
    /// none is open.
    fn write_slot(&mut self) -> PartialWrite {
        match self.write_bits {
            Some(slot) => slot,
            None => {
                let slot = PartialWrite {
                    index: self.data.len(),
                    offset: 0,
                    cache: 0,
                };
                self.data.extend_from_slice(&[0]);
                slot
            }
        }
    }

    fn read_slot(&mut self) -> Result<PartialRead> {
        match self.read_bits {
            Some(slot) => Ok(slot),
            None => {
                let cache = self.take_raw(1)?[0];
                Ok(PartialRead { offset: 0, cache })
            }
        }
    }

    /// Write the low `length` bits of `value`, most significant first,
    /// packing into the open partial byte before starting new ones.
    ///
    /// In passthrough mode the value is written as `ceil(length / 8)`
    /// big-endian whole bytes.
    pub fn write_fixed_bits(&mut self, value: u32, length: u32) -> Result<()> {
        check_length(length)?;
        if self.config.passthrough {
            let bytes = value.to_be_bytes();
            let width = length.div_ceil(8) as usize;
            self.write_bytes(&bytes[4 - width..]);
            return Ok(());
        }

        let mut remaining = length;
        while remaining > 0 {
            let mut slot = self.write_slot();
            let take = (8 - slot.offset).min(remaining);
            let bits = ((value >> (remaining - take)) & mask(take)) as u8;
            slot.cache |= bits << slot.offset;
            slot.offset += take;
            self.data[slot.index] = slot.cache;
            self.write_bits = (slot.offset < 8).then_some(slot);
            remaining -= take;
        }
        Ok(())
    }

    /// Read `length` bits written by [`NetBuf::write_fixed_bits`].
    pub fn read_fixed_bits(&mut self, length: u32) -> Result<u32> {
        check_length(length)?;
        if self.config.passthrough {
            let width = length.div_ceil(8) as usize;
            let raw = self.take(width)?;
            let value = raw.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
            return Ok(value & mask(length));
        }

        let mut value = 0u32;
        let mut remaining = length;
        while remaining > 0 {
            let mut slot = self.read_slot()?;
            let take = (8 - slot.offset).min(remaining);
            let bits = (slot.cache >> slot.offset) as u32 & mask(take);
            value = (value << take) | bits;
            slot.offset += take;
            self.read_bits = (slot.offset < 8).then_some(slot);
            remaining -= take;
        }
        Ok(value)
    }

    /// Write a single flag. Up to eight consecutive flags share one byte.
    pub fn write_boolean(&mut self, flag: bool) {
        if self.config.passthrough {
            self.write_u8(flag as u8);
            return;
        }
        let mut slot = self.write_slot();
        slot.cache |= (flag as u8) << slot.offset;
        slot.offset += 1;
        self.data[slot.index] = slot.cache;
        self.write_bits = (slot.offset < 8).then_some(slot);
    }

    pub fn read_boolean(&mut self) -> Result<bool> {
        if self.config.passthrough {
            return Ok(self.read_u8()? != 0);
        }
        let mut slot = self.read_slot()?;
        let flag = (slot.cache >> slot.offset) & 1 == 1;
        slot.offset += 1;
        self.read_bits = (slot.offset < 8).then_some(slot);
        Ok(flag)
    }

    /// Write an enum ordinal in `ceil(log2(E::VARIANTS))` bits.
    ///
    /// Single-variant enums cost nothing. Passthrough mode writes the
    /// ordinal as a var-uint instead.
    pub fn write_enum<E: NetEnum>(&mut self, value: &E) -> Result<()> {
        if E::VARIANTS == 0 {
            return Err(BufError::EmptyEnum {
                type_name: std::any::type_name::<E>(),
            });
        }
        if self.config.passthrough {
            self.write_var_u32(value.ordinal());
            return Ok(());
        }
        match bits_for_variants(E::VARIANTS) {
            0 => Ok(()),
            bits => self.write_fixed_bits(value.ordinal(), bits),
        }
    }

    pub fn read_enum<E: NetEnum>(&mut self) -> Result<E> {
        let type_name = std::any::type_name::<E>();
        if E::VARIANTS == 0 {
            return Err(BufError::EmptyEnum { type_name });
        }
        let ordinal = if self.config.passthrough {
            self.read_var_u32()?
        } else {
            match bits_for_variants(E::VARIANTS) {
                0 => 0,
                bits => self.read_fixed_bits(bits)?,
            }
        };
        E::from_ordinal(ordinal).ok_or(BufError::InvalidOrdinal {
            type_name,
            ordinal,
            variants: E::VARIANTS,
        })
    }

    /// Write a presence flag followed, when present, by the value.
    pub fn write_optional<T>(
        &mut self,
        value: Option<&T>,
        writer: impl FnOnce(&mut NetBuf, &T) -> Result<()>,
    ) -> Result<()> {
        self.write_boolean(value.is_some());
        match value {
            Some(value) => writer(self, value),
            None => Ok(()),
        }
    }

    pub fn read_optional<T>(
        &mut self,
        reader: impl FnOnce(&mut NetBuf) -> Result<T>,
    ) -> Result<Option<T>> {
        if self.read_boolean()? {
            reader(self).map(Some)
        } else {
            Ok(None)
        }
    }
}
