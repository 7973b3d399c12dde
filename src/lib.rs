// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # metascope
//!
//! Runtime type introspection over binary type metadata.
//!
//! A compiled program carries, for every type it defines, a *metadata record*: a kind word,
//! a pointer to a value witness table describing size and alignment, and for nominal types a
//! pointer to a *context descriptor* naming the type and its stored fields. `metascope` reads
//! those records out of a byte image and answers the question debuggers, serializers and
//! reflection APIs ask most often: which fields does this struct have, where do they live and
//! what are their types?
//!
//! ## Features
//!
//! - **Zero-copy reading** - Every record is decoded lazily from a borrowed image
//! - **Configurable layout** - 4 and 8 byte pointer widths, independent of the host
//! - **Pluggable resolution** - Demangling and generic substitution are injected through
//!   [`GenericContextResolver`]
//! - **Thread safe** - Images are immutable; enumeration keeps no shared state
//!
//! ## Quick Start
//!
//! ```rust
//! use metascope::metadata::builder::{ImageBuilder, StructBuilder};
//! use metascope::prelude::*;
//!
//! struct Unresolved;
//!
//! impl GenericContextResolver for Unresolved {
//!     fn resolve_type<'a>(
//!         &self,
//!         _reference: &EncodedTypeReference<'a>,
//!         _context: &TypeContextDescriptor<'a>,
//!         _generic_arguments: &GenericArguments<'a>,
//!     ) -> Option<TypeMetadata<'a>> {
//!         None
//!     }
//! }
//!
//! let mut builder = ImageBuilder::new(LayoutConfig::lp64());
//! let point = StructBuilder::new("Point")
//!     .field("x", "Sd", 0)
//!     .field("y", "Sd", 8)
//!     .layout(16, 8)
//!     .build(&mut builder, &[])?;
//! let image = Image::from_mem(builder.finish(), LayoutConfig::lp64())?;
//!
//! let mut names = Vec::new();
//! let complete = enumerate_fields(&image.metadata(point.metadata)?, false, &Unresolved, |field| {
//!     names.push(field.name);
//!     true
//! });
//! assert!(complete);
//! assert_eq!(names, ["x", "y"]);
//! # Ok::<(), metascope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - The image, its backends and the bounds-checked [`Parser`]
//! - [`metadata`] - Readers for metadata records, descriptors and field records
//! - [`resolver`] - The injected type resolution service
//! - [`enumerate`] - Field enumeration
//! - [`info`] - Aggregate [`info::TypeInfo`] for structs, enums, tuples and classes
//! - [`utils`] - Locks for callers that serialize access to a resolver
//! - [`prelude`] - Convenient re-exports
//!
//! ## Error Handling
//!
//! Readers return [`Result<T, Error>`](Result). [`enumerate_fields`] keeps the boolean
//! contract of the runtime entry point and folds errors into `false`;
//! [`try_enumerate_fields`] surfaces them:
//!
//! ```rust,no_run
//! use metascope::{Error, Image, LayoutConfig};
//!
//! let image = Image::from_file("metadata.img".as_ref(), LayoutConfig::host())?;
//! match image.metadata(0x40) {
//!     Ok(metadata) => println!("kind: {}", metadata.kind()),
//!     Err(Error::OutOfBounds { .. }) => println!("offset outside the image"),
//!     Err(Error::Malformed { message, .. }) => println!("malformed: {}", message),
//!     Err(e) => println!("error: {}", e),
//! }
//! # Ok::<(), metascope::Error>(())
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use metascope::prelude::*;
///
/// let image = Image::from_file("metadata.img".as_ref(), LayoutConfig::lp64())?;
/// let metadata = image.metadata(0x40)?;
/// println!("{}", metadata.kind());
/// # Ok::<(), metascope::Error>(())
/// ```
pub mod prelude;

/// Image ownership, backends and byte-level decoding
pub mod file;

/// Readers for metadata records, context descriptors, field descriptors and type references
pub mod metadata;

/// The injected service that turns encoded type references into metadata
pub mod resolver;

/// Enumeration of a struct's stored fields
pub mod enumerate;

/// Everything known about one type, gathered in a single value
pub mod info;

/// Locks and identifiers shared across threads
pub mod utils;

/// `metascope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `metascope` Error type
///
/// # Examples
///
/// ```rust
/// use metascope::{Error, Image, LayoutConfig};
///
/// let image = Image::from_mem(vec![0u8; 8], LayoutConfig::lp64())?;
/// assert!(matches!(image.metadata(64), Err(Error::OutOfBounds { .. })));
/// # Ok::<(), metascope::Error>(())
/// ```
pub use error::Error;

/// The image all metadata is read from, and its borrowed view
pub use file::{Backend, Image, ImageView};

/// Pointer width configuration of an image
pub use file::config::{LayoutConfig, PointerWidth};

/// Bounds-checked cursor over image bytes
pub use file::parser::Parser;

/// Metadata records and their kinds
pub use metadata::{
    kind::MetadataKind,
    view::{MetadataLayout, TypeMetadata},
};

/// Type reference resolution
pub use resolver::{GenericContextResolver, TypeReferenceResolver};

/// Field enumeration
pub use enumerate::{enumerate_fields, try_enumerate_fields, FieldEnumerator, FieldInfo};

/// Aggregate type information
pub use info::{type_info, PropertyInfo, TypeInfo};
