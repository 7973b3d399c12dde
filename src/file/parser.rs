//! Cursor-based reader over metadata image bytes.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a bounds-checked cursor used by
//! every record reader in the crate. Nothing outside this module does address arithmetic on
//! raw image bytes: records are decoded by positioning a parser and reading typed values,
//! relative pointers and C strings from it.
//!
//! # Key Components
//!
//! ## Navigation Methods
//! - [`crate::file::parser::Parser::seek`] - Move to specific position
//! - [`crate::file::parser::Parser::advance_by`] - Move forward by specified bytes
//! - [`crate::file::parser::Parser::pos`] - Get current position
//!
//! ## Data Access Methods
//! - [`crate::file::parser::Parser::read_le`] - Read primitive types (little-endian)
//! - [`crate::file::parser::Parser::read_word`] - Read a pointer-sized word
//! - [`crate::file::parser::Parser::read_relative`] - Read a self-relative 32-bit pointer
//! - [`crate::file::parser::Parser::read_string_utf8`] - Read a NUL-terminated UTF-8 string
//!
//! # Usage Examples
//!
//! ```rust
//! use metascope::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
//! let mut parser = Parser::new(&data);
//!
//! let first = parser.read_le::<u32>()?;
//! assert_eq!(first, 0x04030201);
//!
//! parser.seek(6)?;
//! let last_bytes = parser.read_le::<u16>()?;
//! assert_eq!(last_bytes, 0x0807);
//! # Ok::<(), metascope::Error>(())
//! ```

use std::str;

use crate::{
    file::{
        config::PointerWidth,
        io::{read_le_at, read_word_at, RecordIO},
    },
    Result,
};

/// A bounds-checked cursor over a byte slice.
///
/// `Parser` keeps a position within the data and advances it as values are read. Reads that
/// would run past the end fail with [`crate::Error::OutOfBounds`] and leave the position
/// untouched.
///
/// # Examples
///
/// ```rust
/// use metascope::Parser;
///
/// // A relative pointer at offset 0 pointing 4 bytes ahead, followed by "hi\0"
/// let data = [0x04, 0x00, 0x00, 0x00, b'h', b'i', 0x00];
/// let mut parser = Parser::new(&data);
///
/// let target = parser.read_relative()?.unwrap();
/// assert_eq!(target, 4);
///
/// parser.seek(target)?;
/// assert_eq!(parser.read_string_utf8()?, "hi");
/// # Ok::<(), metascope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Create a parser positioned at `pos`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is beyond the data length.
    pub fn at(data: &'a [u8], pos: usize) -> Result<Self> {
        let mut parser = Parser::new(data);
        parser.seek(pos)?;
        Ok(parser)
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Move the current position to the specified index.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(out_of_bounds_error!()),
        }
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: RecordIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a pointer-sized word and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_word(&mut self, width: PointerWidth) -> Result<u64> {
        read_word_at(self.data, &mut self.position, width)
    }

    /// Read a pointer-sized word holding an image offset; `0` decodes to `None`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length, or
    /// [`crate::Error::Malformed`] if the offset cannot be addressed on this host.
    pub fn read_pointer(&mut self, width: PointerWidth) -> Result<Option<usize>> {
        let value = self.read_word(width)?;
        if value == 0 {
            return Ok(None);
        }

        usize::try_from(value)
            .map(Some)
            .map_err(|_| malformed_error!("Pointer {:#x} is not addressable", value))
    }

    /// Read a self-relative 32-bit pointer and advance the position.
    ///
    /// The stored value is a signed displacement from the position the value itself was read
    /// from. A displacement of `0` is the null pointer and decodes to `None`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length, or
    /// [`crate::Error::Malformed`] if the target would lie before the start of the data.
    pub fn read_relative(&mut self) -> Result<Option<usize>> {
        let origin = self.position;
        let displacement = self.read_le::<i32>()?;
        if displacement == 0 {
            return Ok(None);
        }

        match origin.checked_add_signed(displacement as isize) {
            Some(target) => Ok(Some(target)),
            None => Err(malformed_error!(
                "Relative pointer at {} points before the image start ({})",
                origin,
                displacement
            )),
        }
    }

    /// Read a NUL-terminated UTF-8 string and advance past the terminator.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if no terminator is found, or
    /// [`crate::Error::Malformed`] if the bytes are not valid UTF-8.
    pub fn read_string_utf8(&mut self) -> Result<&'a str> {
        let start = self.position;
        let remaining = self.data.get(start..).unwrap_or_default();
        let Some(len) = remaining.iter().position(|byte| *byte == 0) else {
            return Err(out_of_bounds_error!());
        };

        match str::from_utf8(&remaining[..len]) {
            Ok(string) => {
                self.position = start + len + 1;
                Ok(string)
            }
            Err(_) => Err(malformed_error!("Invalid UTF-8 string at offset - {}", start)),
        }
    }
}
