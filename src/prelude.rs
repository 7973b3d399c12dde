//! # metascope Prelude
//!
//! The types and traits needed to load an image, inspect metadata and enumerate fields.
//! Import it with `use metascope::prelude::*;`.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all metascope operations
pub use crate::Error;

/// The result type used throughout metascope
pub use crate::Result;

// ================================================================================================
// Images
// ================================================================================================

/// Owned images and their borrowed views
pub use crate::file::{Image, ImageView};

/// Pointer width configuration
pub use crate::file::config::{LayoutConfig, PointerWidth};

/// Low-level parsing
pub use crate::file::parser::Parser;

// ================================================================================================
// Metadata Records
// ================================================================================================

/// Metadata records and their per-kind layouts
pub use crate::metadata::view::{
    FieldOffsets, GenericArguments, MetadataLayout, StructMetadata, TypeMetadata,
};

/// Metadata kind discriminator
pub use crate::metadata::kind::MetadataKind;

/// Context descriptors
pub use crate::metadata::descriptor::{
    ContextDescriptorFlags, ContextDescriptorKind, TypeContextDescriptor,
};

/// Field descriptors and records
pub use crate::metadata::fields::{FieldDescriptor, FieldDescriptorKind, FieldRecord};

/// Encoded type references
pub use crate::metadata::typeref::{EncodedTypeReference, TypeReferenceComponent};

/// Value witness tables
pub use crate::metadata::valuewitness::ValueWitnessTable;

/// Structural tuples, enum cases and classes
pub use crate::metadata::{
    class::ClassMetadata,
    enumcases::{EnumCase, EnumMetadata},
    tuple::{TupleElement, TupleMetadata},
};

// ================================================================================================
// Resolution and Enumeration
// ================================================================================================

/// Type reference resolution
pub use crate::resolver::{GenericContextResolver, TypeReferenceResolver};

/// Field enumeration
pub use crate::enumerate::{enumerate_fields, try_enumerate_fields, FieldEnumerator, FieldInfo};

/// Aggregate type information
pub use crate::info::{type_info, PropertyInfo, TypeInfo};
