//! Readers for runtime type metadata.
//!
//! Every record in an image is decoded lazily through a borrowed [`crate::file::ImageView`].
//! Readers are `Copy` handles; only the collecting helpers such as
//! [`tuple::TupleMetadata::elements`] allocate.
//!
//! # Key Components
//!
//! - [`kind`] - The metadata kind discriminator and its flag bits
//! - [`view`] - [`view::TypeMetadata`] and its per-kind layouts, generic argument vectors and
//!   field offset tables
//! - [`descriptor`] - Nominal type context descriptors
//! - [`fields`] - Field descriptors and their records
//! - [`typeref`] - Encoded type references with embedded symbolic references
//! - [`valuewitness`] - Size, stride and alignment of a type
//! - [`tuple`] and [`enumcases`] - Structural tuples and enum cases
//! - [`class`] - Class metadata, superclass chains and class field offsets
//! - [`labels`] - Space-terminated label lists
//! - [`builder`] - Emits well-formed images, mostly used by tests and benchmarks
//!
//! # Examples
//!
//! ```rust
//! use metascope::metadata::builder::{ImageBuilder, StructBuilder};
//! use metascope::metadata::view::MetadataLayout;
//! use metascope::{Image, LayoutConfig};
//!
//! let mut builder = ImageBuilder::new(LayoutConfig::wasm32());
//! let point = StructBuilder::new("Point")
//!     .field("x", "Si", 0)
//!     .field("y", "Si", 8)
//!     .layout(16, 8)
//!     .build(&mut builder, &[])?;
//! let image = Image::from_mem(builder.finish(), LayoutConfig::wasm32())?;
//!
//! let MetadataLayout::Struct(layout) = image.metadata(point.metadata)?.layout() else {
//!     unreachable!();
//! };
//! assert_eq!(layout.descriptor()?.name()?, "Point");
//! assert_eq!(layout.field_offsets()?.iter().collect::<Result<Vec<_>, _>>()?, [0, 8]);
//! # Ok::<(), metascope::Error>(())
//! ```

pub mod builder;
pub mod class;
pub mod descriptor;
pub mod enumcases;
pub mod fields;
pub mod kind;
pub mod labels;
pub mod tuple;
pub mod typeref;
pub mod valuewitness;
pub mod view;
