//! Metadata image abstraction and byte-level access.
//!
//! Type metadata, context descriptors, field descriptors and the strings they reference all
//! live in one contiguous *image*. This module owns that image and hands out cheap, copyable
//! [`crate::file::ImageView`]s that every record reader borrows from.
//!
//! # Architecture
//!
//! - **Backend system** - Pluggable data sources (memory-mapped files, memory buffers)
//! - **Image** - Owns a backend plus the [`crate::file::config::LayoutConfig`] it was emitted with
//! - **ImageView** - A borrowed `(bytes, layout)` pair with typed accessors; `Copy`, `Send`, `Sync`
//! - **Parser** - The bounds-checked cursor all record decoding goes through
//!
//! # Key Components
//!
//! ## Core Types
//! - [`crate::file::Image`] - Owned metadata image
//! - [`crate::file::ImageView`] - Borrowed view over an image
//! - [`crate::file::Backend`] - Trait for different data sources
//!
//! ## Parsing Infrastructure
//! - [`crate::file::parser::Parser`] - Cursor used to decode records
//! - [`crate::file::io`] - Little-endian primitive reads and writes
//! - [`crate::file::config`] - Pointer width configuration
//!
//! # Examples
//!
//! ```rust,no_run
//! use metascope::{Image, LayoutConfig};
//! use std::path::Path;
//!
//! let image = Image::from_file(Path::new("metadata.img"), LayoutConfig::lp64())?;
//! let metadata = image.metadata(0x40)?;
//! println!("kind: {}", metadata.kind());
//! # Ok::<(), metascope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! Backends are `Send + Sync` and images are never mutated after loading, so an [`Image`] can
//! be shared across threads and enumerated concurrently.

pub mod config;
pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::{fmt, fs, path::Path};

use crate::{
    file::{
        config::{LayoutConfig, PointerWidth},
        io::{read_le_at, RecordIO},
        parser::Parser,
    },
    metadata::{descriptor::TypeContextDescriptor, view::TypeMetadata},
    Error, Result,
};
use memory::Memory;
use physical::Physical;

/// Backend trait for image data sources.
///
/// A backend only has to expose its bytes; slicing and length are derived from them.
/// All implementations must be thread-safe.
pub trait Backend: Send + Sync {
    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let data = self.data();
        offset
            .checked_add(len)
            .and_then(|end| data.get(offset..end))
            .ok_or_else(|| out_of_bounds_error!())
    }

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize {
        self.data().len()
    }
}

/// An owned metadata image.
///
/// # Examples
///
/// ```rust
/// use metascope::{metadata::builder::ImageBuilder, Image, LayoutConfig};
///
/// let mut builder = ImageBuilder::new(LayoutConfig::lp64());
/// let int32 = builder.value_type("Int32", 4, 4)?;
///
/// let image = Image::from_mem(builder.finish(), LayoutConfig::lp64())?;
/// let metadata = image.metadata(int32.metadata)?;
/// assert_eq!(metadata.size()?, 4);
/// # Ok::<(), metascope::Error>(())
/// ```
pub struct Image {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
    /// How words are laid out inside the image.
    config: LayoutConfig,
}

impl Image {
    /// Loads an image from the given path, memory-mapping it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or mapped, or if it is empty.
    pub fn from_file(path: &Path, config: LayoutConfig) -> Result<Image> {
        if fs::metadata(path)?.len() == 0 {
            return Err(Error::Empty);
        }

        let input = Physical::new(path)?;
        Self::load(input, config)
    }

    /// Loads an image from a memory buffer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Empty`] if the buffer is empty.
    pub fn from_mem(data: Vec<u8>, config: LayoutConfig) -> Result<Image> {
        Self::load(Memory::new(data), config)
    }

    fn load<T: Backend + 'static>(input: T, config: LayoutConfig) -> Result<Image> {
        if input.len() == 0 {
            return Err(Error::Empty);
        }

        log::debug!(
            "loaded metadata image: {} bytes, {} words",
            input.len(),
            config.pointer_width
        );

        Ok(Image {
            data: Box::new(input),
            config,
        })
    }

    /// Borrow the image as a view for record decoding.
    #[must_use]
    pub fn view(&self) -> ImageView<'_> {
        ImageView::new(self.data.data(), self.config)
    }

    /// Returns the layout configuration of the image.
    #[must_use]
    pub fn config(&self) -> LayoutConfig {
        self.config
    }

    /// Returns the total size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the image contains no bytes. Loaded images never are.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Returns the raw image bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns a bounds-checked slice of the image.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }

    /// Open the type metadata record at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if no metadata record fits at `offset`.
    pub fn metadata(&self, offset: usize) -> Result<TypeMetadata<'_>> {
        self.view().metadata(offset)
    }

    /// Open the type context descriptor at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor header cannot be read.
    pub fn descriptor(&self, offset: usize) -> Result<TypeContextDescriptor<'_>> {
        self.view().descriptor(offset)
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("len", &self.data.len())
            .field("config", &self.config)
            .finish()
    }
}

/// A borrowed view over image bytes together with their layout.
///
/// Views are what every record type holds on to. They are `Copy`, so records stay plain
/// values that can be passed around and compared without lifetimes getting in the way.
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    data: &'a [u8],
    config: LayoutConfig,
}

impl<'a> ImageView<'a> {
    /// Wrap raw bytes laid out according to `config`.
    #[must_use]
    pub fn new(data: &'a [u8], config: LayoutConfig) -> Self {
        ImageView { data, config }
    }

    /// Returns the raw bytes of the view.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the layout configuration.
    #[must_use]
    pub fn config(&self) -> LayoutConfig {
        self.config
    }

    /// Returns the configured pointer width.
    #[must_use]
    pub fn pointer_width(&self) -> PointerWidth {
        self.config.pointer_width
    }

    /// Size in bytes of one pointer-sized word.
    #[must_use]
    pub fn word_size(&self) -> usize {
        self.config.word_size()
    }

    /// Create a parser positioned at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `offset` lies outside the image.
    pub fn parser_at(&self, offset: usize) -> Result<Parser<'a>> {
        Parser::at(self.data, offset)
    }

    /// Read a fixed-size little-endian value at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the value does not fit in the image.
    pub fn read<T: RecordIO>(&self, offset: usize) -> Result<T> {
        let mut position = offset;
        read_le_at::<T>(self.data, &mut position)
    }

    /// Read a pointer-sized word at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the word does not fit in the image.
    pub fn read_word(&self, offset: usize) -> Result<u64> {
        self.parser_at(offset)?.read_word(self.pointer_width())
    }

    /// Read an absolute pointer at `offset`; null decodes to `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the word does not fit in the image.
    pub fn read_pointer(&self, offset: usize) -> Result<Option<usize>> {
        self.parser_at(offset)?.read_pointer(self.pointer_width())
    }

    /// Follow the self-relative pointer stored at `offset`; null decodes to `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pointer does not fit in the image or points before its start.
    pub fn read_relative(&self, offset: usize) -> Result<Option<usize>> {
        self.parser_at(offset)?.read_relative()
    }

    /// Read the NUL-terminated UTF-8 string at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is unterminated or not valid UTF-8.
    pub fn c_str(&self, offset: usize) -> Result<&'a str> {
        self.parser_at(offset)?.read_string_utf8()
    }

    /// Open the type metadata record at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if no metadata record fits at `offset`.
    pub fn metadata(&self, offset: usize) -> Result<TypeMetadata<'a>> {
        TypeMetadata::new(*self, offset)
    }

    /// Open the type context descriptor at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor header cannot be read.
    pub fn descriptor(&self, offset: usize) -> Result<TypeContextDescriptor<'a>> {
        TypeContextDescriptor::new(*self, offset)
    }

    /// Returns `true` if both views borrow the same bytes.
    #[must_use]
    pub fn same_image(&self, other: &ImageView<'_>) -> bool {
        std::ptr::eq(self.data.as_ptr(), other.data.as_ptr()) && self.data.len() == other.data.len()
    }
}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageView")
            .field("len", &self.data.len())
            .field("pointer_width", &self.config.pointer_width)
            .finish()
    }
}
