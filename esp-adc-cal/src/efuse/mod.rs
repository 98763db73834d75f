//! # Reading of eFuses
//!
//! ## Overview
//!
//! Factory ADC calibration data is burned into eFuse blocks as small packed
//! bit fields, some of them straddling a 32-bit word boundary and most of
//! them signed. This module provides:
//!
//!   * [`EfuseBlock`] / [`EfuseField`] descriptors,
//!   * the [`EfuseStore`] word-read primitive,
//!   * the [`Efuse`] reader, which assembles fields of up to 64 bits from an
//!     absolute bit offset within a block,
//!   * [`decode_signed`] for the sign-magnitude and two's complement encodings.
//!
//! Two stores are provided: [`EfuseImage`], an in-memory copy of all blocks
//! (dumps, tests), and [`MappedEfuse`], which reads the memory-mapped eFuse
//! controller registers on target.
//!
//! The calibration field layout of each chip lives in its own submodule.
//!
//! ## Example
//!
//! ```rust
//! use esp_adc_cal::efuse::{esp32, Efuse, EfuseImage, Encoding};
//!
//! let mut image = EfuseImage::new();
//! image.write_field(esp32::ADC_VREF, 0b10011);
//!
//! let efuse = Efuse::new(image);
//! assert_eq!(efuse.read_signed(esp32::ADC_VREF, Encoding::SignMagnitude), -3);
//! ```

use core::ptr::NonNull;

pub mod esp32;
pub mod esp32c3;
pub mod esp32s2;
pub mod esp32s3;

/// Number of eFuse blocks modelled by the stores.
pub const BLOCK_COUNT: usize = 11;

/// Number of 32-bit words in one eFuse block.
pub const BLOCK_WORDS: usize = 8;

/// An eFuse block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::FromRepr, strum::EnumIter)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum EfuseBlock {
    Block0,
    Block1,
    Block2,
    Block3,
    Block4,
    Block5,
    Block6,
    Block7,
    Block8,
    Block9,
    Block10,
}

impl EfuseBlock {
    /// Position of the block in the store.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// The bit field for getting access to efuse data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EfuseField {
    /// The block
    pub(crate) block: EfuseBlock,
    /// Starting bit in the efuse block
    pub(crate) bit_start: u32,
    /// Number of bits
    pub(crate) bit_count: u32,
}

impl EfuseField {
    /// Describe `bit_count` bits starting at absolute bit `bit_start` of `block`.
    pub const fn new(block: EfuseBlock, bit_start: u32, bit_count: u32) -> Self {
        Self {
            block,
            bit_start,
            bit_count,
        }
    }

    /// The block holding the field.
    pub const fn block(&self) -> EfuseBlock {
        self.block
    }

    /// Absolute bit offset of the field within its block.
    pub const fn bit_start(&self) -> u32 {
        self.bit_start
    }

    /// Width of the field in bits.
    pub const fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// Mask covering every bit of the field, the most significant one being
    /// the sign bit for signed fields.
    pub const fn mask(&self) -> u32 {
        if self.bit_count >= 32 {
            u32::MAX
        } else {
            (1 << self.bit_count) - 1
        }
    }
}

/// Word-level read access to eFuse blocks.
///
/// Reads of words outside a block, or of blocks a chip does not have, return
/// zero (an unburned word).
pub trait EfuseStore {
    /// Read 32-bit word `word` of `block`.
    fn read_word(&self, block: EfuseBlock, word: usize) -> u32;
}

impl<T: EfuseStore + ?Sized> EfuseStore for &T {
    fn read_word(&self, block: EfuseBlock, word: usize) -> u32 {
        (**self).read_word(block, word)
    }
}

/// How a signed calibration value is packed into its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Encoding {
    /// The most significant bit is the sign, the rest is the magnitude.
    SignMagnitude,
    /// Two's complement over the width of the field.
    TwosComplement,
}

/// Decode a signed value from `bits`.
///
/// `mask` covers the whole field; its most significant bit is the sign bit.
/// Every input decodes to some value, so there is no error path. In two's
/// complement the most negative value of the field decodes to zero, as the
/// factory tooling does.
pub fn decode_signed(bits: u32, mask: u32, encoding: Encoding) -> i32 {
    let magnitude_mask = mask >> 1;
    let sign_bit = mask & !magnitude_mask;

    if bits & sign_bit == 0 {
        return (bits & magnitude_mask) as i32;
    }

    let magnitude = match encoding {
        Encoding::TwosComplement => (!bits).wrapping_add(1) & magnitude_mask,
        Encoding::SignMagnitude => bits & magnitude_mask,
    };

    -(magnitude as i32)
}

/// Encode `value` for a field covered by `mask`, the inverse of
/// [`decode_signed`] for values that fit.
pub fn encode_signed(value: i32, mask: u32, encoding: Encoding) -> u32 {
    let magnitude_mask = mask >> 1;
    let sign_bit = mask & !magnitude_mask;

    if value >= 0 {
        return value as u32 & magnitude_mask;
    }

    match encoding {
        Encoding::TwosComplement => (value as u32) & mask,
        Encoding::SignMagnitude => sign_bit | (value.unsigned_abs() & magnitude_mask),
    }
}

/// Reader assembling eFuse fields from an [`EfuseStore`].
#[derive(Debug, Clone)]
pub struct Efuse<S> {
    store: S,
}

impl<S: EfuseStore> Efuse<S> {
    /// Wrap a store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give back the wrapped store.
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Read `bit_count` bits (at most 64) starting at absolute bit offset
    /// `bit_start` of `block`.
    ///
    /// Fields may span up to three consecutive words; the words are
    /// concatenated little-endian before shifting and masking.
    pub fn read_bits(&self, block: EfuseBlock, bit_start: u32, bit_count: u32) -> u64 {
        let bit_count = bit_count.min(64);
        if bit_count == 0 {
            return 0;
        }

        let first_word = (bit_start / 32) as usize;
        let last_word = ((bit_start + bit_count - 1) / 32) as usize;

        let mut raw = 0u128;
        for (i, word) in (first_word..=last_word).enumerate() {
            raw |= (self.store.read_word(block, word) as u128) << (32 * i);
        }

        let value = (raw >> (bit_start % 32)) & ((1u128 << bit_count) - 1);
        value as u64
    }

    /// Read a field of up to 32 bits.
    pub fn read_field(&self, field: EfuseField) -> u32 {
        debug_assert!(field.bit_count <= 32);
        self.read_bits(field.block, field.bit_start, field.bit_count) as u32
    }

    /// Read a single bit field.
    pub fn read_bit(&self, field: EfuseField) -> bool {
        debug_assert_eq!(field.bit_count, 1);
        self.read_field(field) != 0
    }

    /// Read a field and decode it as a signed value.
    pub fn read_signed(&self, field: EfuseField, encoding: Encoding) -> i32 {
        decode_signed(self.read_field(field), field.mask(), encoding)
    }
}

/// An in-memory copy of every eFuse block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EfuseImage {
    words: [[u32; BLOCK_WORDS]; BLOCK_COUNT],
}

impl EfuseImage {
    /// An image with every bit unburned.
    pub const fn new() -> Self {
        Self {
            words: [[0; BLOCK_WORDS]; BLOCK_COUNT],
        }
    }

    /// Replace the contents of `block`.
    pub fn set_block(&mut self, block: EfuseBlock, words: [u32; BLOCK_WORDS]) {
        self.words[block.index()] = words;
    }

    /// Replace a single word. Words outside the block are ignored.
    pub fn set_word(&mut self, block: EfuseBlock, word: usize, value: u32) {
        if let Some(slot) = self.words[block.index()].get_mut(word) {
            *slot = value;
        }
    }

    /// Overwrite `field` with the low bits of `value`.
    pub fn write_field(&mut self, field: EfuseField, value: u64) {
        let block = &mut self.words[field.block.index()];
        for i in 0..field.bit_count.min(64) {
            let bit = field.bit_start + i;
            let Some(word) = block.get_mut((bit / 32) as usize) else {
                break;
            };
            let mask = 1u32 << (bit % 32);
            if value >> i & 1 != 0 {
                *word |= mask;
            } else {
                *word &= !mask;
            }
        }
    }

    /// Overwrite `field` with the encoding of `value`.
    pub fn write_signed(&mut self, field: EfuseField, value: i32, encoding: Encoding) {
        self.write_field(field, encode_signed(value, field.mask(), encoding) as u64);
    }
}

impl EfuseStore for EfuseImage {
    fn read_word(&self, block: EfuseBlock, word: usize) -> u32 {
        self.words[block.index()].get(word).copied().unwrap_or(0)
    }
}

/// eFuse blocks read in place from the eFuse controller's read registers.
#[derive(Debug)]
pub struct MappedEfuse {
    bases: [Option<NonNull<u32>>; BLOCK_COUNT],
}

impl MappedEfuse {
    /// Read blocks from the given base addresses, indexed by
    /// [`EfuseBlock::index`]. Blocks without a base read as zero.
    ///
    /// # Safety
    ///
    /// Every `Some` base must point to [`BLOCK_WORDS`] aligned, readable
    /// words that remain valid for the lifetime of the returned value.
    pub const unsafe fn new(bases: [Option<NonNull<u32>>; BLOCK_COUNT]) -> Self {
        Self { bases }
    }
}

impl EfuseStore for MappedEfuse {
    fn read_word(&self, block: EfuseBlock, word: usize) -> u32 {
        if word >= BLOCK_WORDS {
            return 0;
        }
        match self.bases[block.index()] {
            // SAFETY: the constructor's contract covers `BLOCK_WORDS` words
            // from each base.
            Some(base) => unsafe { base.as_ptr().add(word).read_volatile() },
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_positive_ignores_bits_above_mask() {
        assert_eq!(decode_signed(0b0010_0101, 0x7F, Encoding::TwosComplement), 0x25);
        assert_eq!(decode_signed(0xFFFF_FF0D, 0x0F, Encoding::SignMagnitude), -5);
        assert_eq!(decode_signed(0x0000_0105, 0x0F, Encoding::SignMagnitude), 5);
    }

    #[test]
    fn decode_sign_magnitude() {
        // 5 bit Vref field, 0b10011 is -3
        assert_eq!(decode_signed(0b10011, 0x1F, Encoding::SignMagnitude), -3);
        assert_eq!(decode_signed(0b00011, 0x1F, Encoding::SignMagnitude), 3);
        // negative zero
        assert_eq!(decode_signed(0b10000, 0x1F, Encoding::SignMagnitude), 0);
    }

    #[test]
    fn decode_twos_complement() {
        assert_eq!(decode_signed(0x7F, 0x7F, Encoding::TwosComplement), -1);
        assert_eq!(decode_signed(0x41, 0x7F, Encoding::TwosComplement), -63);
        assert_eq!(decode_signed(0x1FF, 0x1FF, Encoding::TwosComplement), -1);
        assert_eq!(decode_signed(0x100, 0x1FF, Encoding::TwosComplement), 0);
    }

    #[test]
    fn encode_matches_decode() {
        for (value, mask, encoding) in [
            (-63, 0x7F, Encoding::TwosComplement),
            (-1, 0x1FF, Encoding::TwosComplement),
            (-15, 0x1F, Encoding::SignMagnitude),
            (200, 0x3FF, Encoding::SignMagnitude),
        ] {
            let bits = encode_signed(value, mask, encoding);
            assert_eq!(bits & !mask, 0);
            assert_eq!(decode_signed(bits, mask, encoding), value);
        }
    }

    #[test]
    fn read_within_one_word() {
        let mut image = EfuseImage::new();
        image.set_word(EfuseBlock::Block3, 3, 0xDEAD_BEEF);
        let efuse = Efuse::new(image);

        assert_eq!(efuse.read_bits(EfuseBlock::Block3, 96, 32), 0xDEAD_BEEF);
        assert_eq!(efuse.read_bits(EfuseBlock::Block3, 96, 7), 0xEF & 0x7F);
        assert_eq!(efuse.read_bits(EfuseBlock::Block3, 103, 9), (0xDEAD_BEEF >> 7) & 0x1FF);
        assert_eq!(efuse.read_bits(EfuseBlock::Block2, 96, 32), 0);
    }

    #[test]
    fn read_straddling_word_boundary() {
        let mut image = EfuseImage::new();
        image.set_word(EfuseBlock::Block2, 5, 0xF000_0000);
        image.set_word(EfuseBlock::Block2, 6, 0x0000_0003);
        let efuse = Efuse::new(image);

        // bits 188..198 take 4 bits from word 5 and 6 from word 6
        assert_eq!(efuse.read_bits(EfuseBlock::Block2, 188, 10), 0b11_1111);
        assert_eq!(efuse.read_bits(EfuseBlock::Block2, 190, 4), 0b1111);
        assert_eq!(efuse.read_bits(EfuseBlock::Block2, 192, 2), 0b11);
    }

    #[test]
    fn read_64_bits_across_three_words() {
        let mut image = EfuseImage::new();
        image.set_block(
            EfuseBlock::Block1,
            [0x8000_0000, 0xFFFF_FFFF, 0x7FFF_FFFF, 0, 0, 0, 0, 0],
        );
        let efuse = Efuse::new(image);

        assert_eq!(efuse.read_bits(EfuseBlock::Block1, 31, 64), u64::MAX);
        assert_eq!(efuse.read_bits(EfuseBlock::Block1, 31, 0), 0);
    }

    #[test]
    fn read_past_end_of_block_is_unburned() {
        let mut image = EfuseImage::new();
        image.set_word(EfuseBlock::Block0, 7, u32::MAX);
        let efuse = Efuse::new(image);

        assert_eq!(efuse.read_bits(EfuseBlock::Block0, 252, 8), 0xF);
    }

    #[test]
    fn write_field_round_trips_through_reader() {
        let field = EfuseField::new(EfuseBlock::Block2, 188, 10);
        let mut image = EfuseImage::new();
        image.set_word(EfuseBlock::Block2, 5, u32::MAX);
        image.write_field(field, 0x2A5);

        assert_eq!(image.read_word(EfuseBlock::Block2, 5), 0x5FFF_FFFF);
        assert_eq!(Efuse::new(&image).read_field(field), 0x2A5);
    }

    #[test]
    fn mapped_store_reads_through_pointer() {
        static BLOCK0: [u32; BLOCK_WORDS] = [0, 0, 0, 0x4000, 0x1300, 0, 0, 0];

        let mut bases = [None; BLOCK_COUNT];
        bases[EfuseBlock::Block0.index()] = Some(NonNull::from(&BLOCK0).cast::<u32>());
        let efuse = Efuse::new(unsafe { MappedEfuse::new(bases) });

        assert!(efuse.read_bit(esp32::BLK3_PART_RESERVE));
        assert_eq!(efuse.read_field(esp32::ADC_VREF), 0x13);
        assert_eq!(efuse.read_field(esp32::ADC1_TP_LOW), 0);
        assert_eq!(efuse.store().read_word(EfuseBlock::Block0, 8), 0);
    }
}
