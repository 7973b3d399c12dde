//! Little-endian, bounds-checked primitive reads and writes over byte buffers.
//!
//! Every multi-byte value in a metadata image is stored little-endian. This module provides
//! the [`crate::file::io::RecordIO`] trait for the fixed-size integer types the layout uses,
//! plus the offset-tracking helpers the [`crate::file::parser::Parser`] and the
//! [`crate::metadata::builder::ImageBuilder`] are built on.
//!
//! # Key Components
//!
//! - [`crate::file::io::RecordIO`] - Conversion between integers and their byte arrays
//! - [`crate::file::io::read_le_at`] - Read with auto-advance
//! - [`crate::file::io::read_word_at`] - Read a pointer-sized word of a configured width
//! - [`crate::file::io::write_le_at`] / [`crate::file::io::write_word_at`] - The writing side
//!
//! # Examples
//!
//! ```rust,ignore
//! use metascope::file::io::read_le_at;
//!
//! let data = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00];
//! let mut offset = 0;
//!
//! let first: u16 = read_le_at(&data, &mut offset)?;  // offset: 0 -> 2
//! let second: u16 = read_le_at(&data, &mut offset)?; // offset: 2 -> 4
//! let third: u32 = read_le_at(&data, &mut offset)?;  // offset: 4 -> 8
//!
//! assert_eq!((first, second, third), (1, 2, 3));
//! # Ok::<(), metascope::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All functions return [`crate::Error::OutOfBounds`] if the buffer is too short to complete
//! the operation.

use crate::{file::config::PointerWidth, Result};

/// Trait for fixed-size integers that can be read from and written to metadata images.
///
/// Each implementation names the byte array of its size in `Bytes`; the conversions are the
/// standard library's little-endian ones.
pub trait RecordIO: Sized + Copy {
    /// Byte array type holding one encoded value.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode `Self` from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Encode `Self` as little-endian bytes
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_record_io {
    ($($ty:ty),*) => {
        $(
            impl RecordIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_record_io!(u8, u16, u32, u64, i8, i16, i32, i64);

/// Read a `T` at `offset` and advance `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would exceed the buffer.
pub fn read_le_at<T: RecordIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };

    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;
    Ok(T::from_le_bytes(read))
}

/// Read a pointer-sized word of the given width at `offset` and advance past it.
///
/// Words are widened to `u64` regardless of the configured width.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would exceed the buffer.
pub fn read_word_at(data: &[u8], offset: &mut usize, width: PointerWidth) -> Result<u64> {
    match width {
        PointerWidth::Four => read_le_at::<u32>(data, offset).map(u64::from),
        PointerWidth::Eight => read_le_at::<u64>(data, offset),
    }
}

/// Write `value` at `offset` and advance `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the write would exceed the buffer.
pub fn write_le_at<T: RecordIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_le_bytes();
    let bytes = bytes.as_ref();

    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(out_of_bounds_error!());
    };

    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}

/// Write a pointer-sized word of the given width at `offset` and advance past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the write would exceed the buffer, or
/// [`crate::Error::Malformed`] if `value` does not fit a four byte word.
pub fn write_word_at(
    data: &mut [u8],
    offset: &mut usize,
    value: u64,
    width: PointerWidth,
) -> Result<()> {
    match width {
        PointerWidth::Four => {
            let narrow = u32::try_from(value)
                .map_err(|_| malformed_error!("Word value {:#x} exceeds 32 bits", value))?;
            write_le_at(data, offset, narrow)
        }
        PointerWidth::Eight => write_le_at(data, offset, value),
    }
}
