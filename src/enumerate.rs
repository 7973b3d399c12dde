//! Field enumeration.
//!
//! [`enumerate_fields`] walks the stored fields of a struct given only its metadata: it pairs
//! each record of the struct's field descriptor with the matching entry of the metadata's field
//! offset table, resolves the record's type reference against the struct's generic context and
//! hands the result to a caller-supplied visitor.
//!
//! The visitor is a closure returning `true` to continue and `false` to stop. Whatever state
//! the caller needs (an accumulator, a comparison target) is captured by the closure.
//!
//! # Outcome
//!
//! `enumerate_fields` returns `true` only if every field was visited. It returns `false` when
//! the visitor stopped early, when the metadata is not a struct, and when the metadata turns
//! out to be malformed. Callers that need to tell these apart use [`try_enumerate_fields`] or
//! [`FieldEnumerator::fields`].
//!
//! # Examples
//!
//! ```rust
//! use metascope::metadata::builder::{ImageBuilder, StructBuilder};
//! use metascope::prelude::*;
//!
//! struct Int32Only(usize);
//!
//! impl GenericContextResolver for Int32Only {
//!     fn resolve_type<'a>(
//!         &self,
//!         reference: &EncodedTypeReference<'a>,
//!         _context: &TypeContextDescriptor<'a>,
//!         _generic_arguments: &GenericArguments<'a>,
//!     ) -> Option<TypeMetadata<'a>> {
//!         match reference.bytes() {
//!             b"s5Int32V" => reference.view().metadata(self.0).ok(),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let mut builder = ImageBuilder::new(LayoutConfig::lp64());
//! let int32 = builder.value_type("Int32", 4, 4)?;
//! let point = StructBuilder::new("Point")
//!     .field("x", "s5Int32V", 0)
//!     .field("y", "s5Int32V", 4)
//!     .layout(8, 4)
//!     .build(&mut builder, &[])?;
//! let image = Image::from_mem(builder.finish(), LayoutConfig::lp64())?;
//!
//! let mut visited = Vec::new();
//! let complete = enumerate_fields(
//!     &image.metadata(point.metadata)?,
//!     false,
//!     &Int32Only(int32.metadata),
//!     |field| {
//!         visited.push((field.name, field.offset));
//!         true
//!     },
//! );
//!
//! assert!(complete);
//! assert_eq!(visited, [("x", 0), ("y", 4)]);
//! # Ok::<(), metascope::Error>(())
//! ```

use crate::{
    metadata::view::{MetadataLayout, StructMetadata, TypeMetadata},
    resolver::{GenericContextResolver, TypeReferenceResolver},
    Result,
};

/// A stored field as handed to the visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo<'a> {
    /// Declared name
    pub name: &'a str,
    /// Byte offset within the struct
    pub offset: usize,
    /// Resolved field type; `None` when the reference could not be resolved
    pub ty: Option<TypeMetadata<'a>>,
    /// Whether the field was declared mutable
    pub is_var: bool,
}

/// Enumerates the fields of struct metadata through an injected resolver
///
/// # Examples
///
/// ```rust,ignore
/// let enumerator = FieldEnumerator::new(&resolver);
/// if let Some(fields) = enumerator.fields(&metadata)? {
///     for field in fields {
///         println!("{} @ {}", field.name, field.offset);
///     }
/// }
/// ```
#[derive(Debug)]
pub struct FieldEnumerator<'r, R: ?Sized> {
    resolver: TypeReferenceResolver<'r, R>,
    allow_resilient_superclasses: bool,
}

impl<'r, R> FieldEnumerator<'r, R>
where
    R: GenericContextResolver + ?Sized,
{
    /// Create an enumerator resolving field types through `resolver`
    #[must_use]
    pub fn new(resolver: &'r R) -> Self {
        FieldEnumerator {
            resolver: TypeReferenceResolver::new(resolver),
            allow_resilient_superclasses: false,
        }
    }

    /// Accept classes whose superclass layout is resilient.
    ///
    /// Only structs are enumerated at present, so the setting is carried but has no effect.
    #[must_use]
    pub fn allow_resilient_superclasses(mut self, allow: bool) -> Self {
        self.allow_resilient_superclasses = allow;
        self
    }

    /// Visit every field of `metadata`, folding malformed metadata into `false`
    pub fn enumerate<'a, F>(&self, metadata: &TypeMetadata<'a>, visitor: F) -> bool
    where
        F: FnMut(FieldInfo<'a>) -> bool,
    {
        match self.try_enumerate(metadata, visitor) {
            Ok(complete) => complete,
            Err(error) => {
                log::warn!(
                    "malformed metadata at {} while enumerating fields: {}",
                    metadata.offset(),
                    error
                );
                false
            }
        }
    }

    /// Visit every field of `metadata`.
    ///
    /// Returns `Ok(true)` if all fields were visited and `Ok(false)` if the visitor stopped or
    /// the metadata kind is not supported.
    ///
    /// # Errors
    /// Returns an error if the struct's descriptor, field records or offsets are malformed.
    pub fn try_enumerate<'a, F>(&self, metadata: &TypeMetadata<'a>, mut visitor: F) -> Result<bool>
    where
        F: FnMut(FieldInfo<'a>) -> bool,
    {
        match metadata.layout() {
            MetadataLayout::Struct(layout) => self.walk_struct(metadata, &layout, &mut visitor),
            MetadataLayout::Class(_) => {
                log::debug!(
                    "class metadata at {} is not enumerated (resilient superclasses allowed: {})",
                    metadata.offset(),
                    self.allow_resilient_superclasses
                );
                Ok(false)
            }
            MetadataLayout::Enum(_)
            | MetadataLayout::Optional(_)
            | MetadataLayout::Tuple(_)
            | MetadataLayout::Other(_) => {
                log::debug!(
                    "{} metadata at {} has no enumerable fields",
                    metadata.kind(),
                    metadata.offset()
                );
                Ok(false)
            }
        }
    }

    /// Collect every field of `metadata`; `None` if the kind is not supported
    ///
    /// # Errors
    /// Returns an error if the metadata is malformed.
    pub fn fields<'a>(&self, metadata: &TypeMetadata<'a>) -> Result<Option<Vec<FieldInfo<'a>>>> {
        let mut fields = Vec::new();
        let complete = self.try_enumerate(metadata, |field| {
            fields.push(field);
            true
        })?;

        Ok(complete.then_some(fields))
    }

    fn walk_struct<'a, F>(
        &self,
        metadata: &TypeMetadata<'a>,
        layout: &StructMetadata<'a>,
        visitor: &mut F,
    ) -> Result<bool>
    where
        F: FnMut(FieldInfo<'a>) -> bool,
    {
        let descriptor = layout.descriptor()?;
        let offsets = layout.field_offsets()?;
        let Some(fields) = descriptor.field_descriptor()? else {
            return Ok(true);
        };

        if fields.num_fields() as usize != offsets.len() {
            return Err(malformed_error!(
                "{} declares {} field records but {} field offsets",
                descriptor.name()?,
                fields.num_fields(),
                offsets.len()
            ));
        }

        for (index, record) in fields.records().enumerate() {
            let record = record?;
            let name = record.name()?;
            let offset = offsets.get(index)? as usize;
            let ty = match record.type_reference()? {
                Some(reference) => self.resolver.resolve(&reference, metadata)?,
                None => None,
            };

            log::trace!("field {} `{}` at offset {} -> {:?}", index, name, offset, ty);
            let field = FieldInfo {
                name,
                offset,
                ty,
                is_var: record.is_var(),
            };
            if !visitor(field) {
                log::debug!("field enumeration stopped by visitor at field {}", index);
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Visit the stored fields of `metadata` in declaration order.
///
/// Returns `true` if every field was visited, `false` if `visitor` returned `false`, the
/// metadata is not a struct, or the metadata is malformed (logged at warn level).
/// `allow_resilient_superclasses` only concerns class metadata, which is not enumerated.
pub fn enumerate_fields<'a, R, F>(
    metadata: &TypeMetadata<'a>,
    allow_resilient_superclasses: bool,
    resolver: &R,
    visitor: F,
) -> bool
where
    R: GenericContextResolver + ?Sized,
    F: FnMut(FieldInfo<'a>) -> bool,
{
    FieldEnumerator::new(resolver)
        .allow_resilient_superclasses(allow_resilient_superclasses)
        .enumerate(metadata, visitor)
}

/// Like [`enumerate_fields`], but reports malformed metadata as an error
///
/// # Errors
/// Returns an error if the struct's descriptor, field records or offsets are malformed.
pub fn try_enumerate_fields<'a, R, F>(
    metadata: &TypeMetadata<'a>,
    allow_resilient_superclasses: bool,
    resolver: &R,
    visitor: F,
) -> Result<bool>
where
    R: GenericContextResolver + ?Sized,
    F: FnMut(FieldInfo<'a>) -> bool,
{
    FieldEnumerator::new(resolver)
        .allow_resilient_superclasses(allow_resilient_superclasses)
        .try_enumerate(metadata, visitor)
}
