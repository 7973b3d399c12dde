//! Value witness tables.
//!
//! Every type metadata record is preceded by a pointer to its value witness table, which holds
//! the type's layout: size, stride, alignment and a handful of layout flags. The function slots
//! at the start of the table are skipped; this crate never calls into a type's witnesses.

use bitflags::bitflags;

use crate::{file::ImageView, Result};

/// Number of function slots preceding the layout fields
pub const VALUE_WITNESS_FUNCTION_SLOTS: usize = 8;

const ALIGNMENT_MASK: u32 = 0xFF;

bitflags! {
    /// Layout flags of a value witness table.
    ///
    /// The low byte holds the alignment mask and is retained as unnamed bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ValueWitnessFlags: u32 {
        /// Copying requires running witnesses
        const IS_NON_POD = 0x0001_0000;
        /// Values do not fit an inline existential buffer
        const IS_NON_INLINE = 0x0002_0000;
        /// The type has spare bits usable by enclosing enums
        const HAS_SPARE_BITS = 0x0008_0000;
        /// Values cannot be moved with a plain memory copy
        const IS_NON_BITWISE_TAKABLE = 0x0010_0000;
        /// The table carries the extra enum witnesses
        const HAS_ENUM_WITNESSES = 0x0020_0000;
    }
}

/// Layout information read from a value witness table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueWitnessTable {
    /// Image offset of the table
    pub offset: usize,
    /// Size of a value in bytes
    pub size: u64,
    /// Distance between consecutive array elements
    pub stride: u64,
    /// Layout flags
    pub flags: ValueWitnessFlags,
    /// Number of extra inhabitants
    pub extra_inhabitants: u32,
}

impl ValueWitnessTable {
    /// Read the table at `offset`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the table does not fit in the image.
    pub fn read(view: ImageView<'_>, offset: usize) -> Result<Self> {
        let width = view.pointer_width();
        let mut parser = view.parser_at(offset)?;
        parser.advance_by(VALUE_WITNESS_FUNCTION_SLOTS * view.word_size())?;

        Ok(ValueWitnessTable {
            offset,
            size: parser.read_word(width)?,
            stride: parser.read_word(width)?,
            flags: ValueWitnessFlags::from_bits_retain(parser.read_le::<u32>()?),
            extra_inhabitants: parser.read_le::<u32>()?,
        })
    }

    /// Alignment in bytes
    #[must_use]
    pub fn alignment(&self) -> u64 {
        u64::from(self.flags.bits() & ALIGNMENT_MASK) + 1
    }

    /// `true` when values can be copied bit for bit
    #[must_use]
    pub fn is_pod(&self) -> bool {
        !self.flags.contains(ValueWitnessFlags::IS_NON_POD)
    }

    /// `true` when values fit an inline buffer
    #[must_use]
    pub fn is_inline(&self) -> bool {
        !self.flags.contains(ValueWitnessFlags::IS_NON_INLINE)
    }

    /// `true` when values can be moved with a plain memory copy
    #[must_use]
    pub fn is_bitwise_takable(&self) -> bool {
        !self.flags.contains(ValueWitnessFlags::IS_NON_BITWISE_TAKABLE)
    }

    /// Compose the raw flags word for a given alignment
    #[must_use]
    pub fn flags_for_alignment(alignment: u64, flags: ValueWitnessFlags) -> u32 {
        let mask = alignment.saturating_sub(1).min(u64::from(ALIGNMENT_MASK)) as u32;
        flags.bits() | mask
    }
}
