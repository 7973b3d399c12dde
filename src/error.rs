use thiserror::Error;

use crate::metadata::kind::MetadataKind;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Field enumeration itself reports its outcome as a boolean (see
/// [`crate::enumerate_fields`]); these errors describe what went wrong underneath it, while
/// loading an image or decoding a record that does not follow the expected layout.
///
/// # Error Categories
///
/// ## Image Parsing Errors
/// - [`Error::Malformed`] - A record does not follow the metadata layout
/// - [`Error::OutOfBounds`] - Attempted to read beyond the image boundaries
/// - [`Error::NotSupported`] - The requested view does not exist for this metadata
/// - [`Error::KindMismatch`] - A typed view was requested for metadata of another kind
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::Error`] - Anything else, carrying a message
///
/// # Examples
///
/// ```rust,no_run
/// use metascope::{Error, Image, LayoutConfig};
/// use std::path::Path;
///
/// match Image::from_file(Path::new("metadata.img"), LayoutConfig::host()) {
///     Ok(image) => println!("Loaded {} bytes of metadata", image.len()),
///     Err(Error::Empty) => eprintln!("The image is empty"),
///     Err(Error::FileError(io_err)) => eprintln!("I/O error: {}", io_err),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The image is damaged and a record could not be decoded.
    ///
    /// Metadata is expected to come from a toolchain, so this signals a broken contract
    /// rather than a recoverable condition. The error includes the source location where
    /// the malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading the image.
    ///
    /// Every cursor operation validates data availability first, so a truncated record
    /// ends up here instead of reading foreign memory.
    #[error("Out of Bound read would have occurred - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The requested operation is not available for this metadata.
    #[error("This operation is not supported for the given metadata")]
    NotSupported,

    /// A typed view was requested for metadata of a different kind.
    #[error("Expected {expected} metadata, found {found}")]
    KindMismatch {
        /// The kind the caller asked for
        expected: MetadataKind,
        /// The kind stored in the metadata record
        found: MetadataKind,
    },

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while opening or mapping an image file.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
