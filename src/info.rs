//! Aggregate type information.
//!
//! [`type_info`] collects what the individual readers know about one type into a single owned
//! [`TypeInfo`]: layout from the value witness table, the declared name, stored properties,
//! generic arguments and, depending on the kind, enum cases or the class inheritance chain.
//! It is the one-call counterpart to walking [`crate::metadata::view::MetadataLayout`] by hand.
//!
//! Properties are gathered per kind:
//!
//! | Kind | Properties |
//! |------|------------|
//! | struct | stored fields, as [`crate::enumerate_fields`] visits them |
//! | class | the class's own stored fields, then those of each native ancestor |
//! | tuple | one per element, named by its label |
//! | enum, optional | none; payloads are described by [`TypeInfo::cases`] |
//!
//! Other kinds have no aggregate and yield `None`.
//!
//! # Examples
//!
//! ```rust
//! use metascope::info::type_info;
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
//!     .var_field("y", "Sd", 8)
//!     .layout(16, 8)
//!     .build(&mut builder, &[])?;
//! let image = Image::from_mem(builder.finish(), LayoutConfig::lp64())?;
//!
//! let info = type_info(&image.metadata(point.metadata)?, &Unresolved)?.unwrap();
//! assert_eq!(info.name, Some("Point"));
//! assert_eq!(info.size, 16);
//! assert_eq!(info.property("y").map(|p| p.offset), Some(8));
//! assert!(info.property("z").is_none());
//! # Ok::<(), metascope::Error>(())
//! ```

use crate::{
    enumerate::FieldEnumerator,
    metadata::{
        class::ClassMetadata,
        enumcases::{EnumCase, EnumMetadata},
        kind::MetadataKind,
        tuple::TupleMetadata,
        view::{MetadataLayout, TypeMetadata},
    },
    resolver::{GenericContextResolver, TypeReferenceResolver},
    Error, Result,
};

/// A stored property and the type that declares it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyInfo<'a> {
    /// Declared name; tuple elements without a label have an empty name
    pub name: &'a str,
    /// Resolved type; `None` when the reference could not be resolved
    pub ty: Option<TypeMetadata<'a>>,
    /// Whether the property was declared mutable; tuple elements always are
    pub is_var: bool,
    /// Byte offset within the owner
    pub offset: usize,
    /// The type that declares the property
    pub owner: TypeMetadata<'a>,
}

/// Everything known about one type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo<'a> {
    /// The metadata the information was read from
    pub metadata: TypeMetadata<'a>,
    /// Kind of the type
    pub kind: MetadataKind,
    /// Declared name of nominal types and classes; `None` for structural types
    pub name: Option<&'a str>,
    /// Size in bytes
    pub size: u64,
    /// Alignment in bytes
    pub alignment: u64,
    /// Stride in bytes
    pub stride: u64,
    /// Stored properties in declaration order
    pub properties: Vec<PropertyInfo<'a>>,
    /// Native ancestors of a class, nearest first
    pub inheritance: Vec<TypeMetadata<'a>>,
    /// Generic arguments of the instantiation
    pub generic_arguments: Vec<TypeMetadata<'a>>,
    /// Enum cases in declaration order
    pub cases: Vec<EnumCase<'a>>,
    /// Total number of enum cases
    pub num_enum_cases: u32,
    /// Number of enum cases carrying a payload
    pub num_payload_enum_cases: u32,
}

impl<'a> TypeInfo<'a> {
    fn new(metadata: &TypeMetadata<'a>) -> Result<Self> {
        let witnesses = metadata.value_witnesses()?;
        Ok(TypeInfo {
            metadata: *metadata,
            kind: metadata.kind(),
            name: None,
            size: witnesses.size,
            alignment: witnesses.alignment(),
            stride: witnesses.stride,
            properties: Vec::new(),
            inheritance: Vec::new(),
            generic_arguments: Vec::new(),
            cases: Vec::new(),
            num_enum_cases: 0,
            num_payload_enum_cases: 0,
        })
    }

    /// The direct superclass of a class
    #[must_use]
    pub fn superclass(&self) -> Option<TypeMetadata<'a>> {
        self.inheritance.first().copied()
    }

    /// The first property named `name`
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyInfo<'a>> {
        self.properties.iter().find(|property| property.name == name)
    }
}

/// Gather everything known about `metadata`, resolving type references through `resolver`.
///
/// Returns `Ok(None)` for kinds without an aggregate, such as functions and metatypes.
///
/// # Errors
/// Returns an error if a record the aggregate needs is malformed.
pub fn type_info<'a, R>(metadata: &TypeMetadata<'a>, resolver: &R) -> Result<Option<TypeInfo<'a>>>
where
    R: GenericContextResolver + ?Sized,
{
    let info = match metadata.layout() {
        MetadataLayout::Struct(layout) => {
            let mut info = TypeInfo::new(metadata)?;
            info.name = Some(layout.descriptor()?.name()?);
            info.generic_arguments = layout.generic_arguments()?.iter().collect::<Result<_>>()?;
            info.properties = struct_properties(metadata, resolver)?;
            info
        }
        MetadataLayout::Enum(layout) | MetadataLayout::Optional(layout) => {
            enum_info(metadata, &layout, resolver)?
        }
        MetadataLayout::Tuple(layout) => tuple_info(metadata, &layout)?,
        MetadataLayout::Class(layout) => class_info(&layout, resolver)?,
        MetadataLayout::Other(kind) => {
            log::debug!("{} metadata at {} has no type info", kind, metadata.offset());
            return Ok(None);
        }
    };

    Ok(Some(info))
}

fn struct_properties<'a, R>(
    metadata: &TypeMetadata<'a>,
    resolver: &R,
) -> Result<Vec<PropertyInfo<'a>>>
where
    R: GenericContextResolver + ?Sized,
{
    let Some(fields) = FieldEnumerator::new(resolver).fields(metadata)? else {
        return Ok(Vec::new());
    };

    Ok(fields
        .into_iter()
        .map(|field| PropertyInfo {
            name: field.name,
            ty: field.ty,
            is_var: field.is_var,
            offset: field.offset,
            owner: *metadata,
        })
        .collect())
}

fn enum_info<'a, R>(
    metadata: &TypeMetadata<'a>,
    layout: &EnumMetadata<'a>,
    resolver: &R,
) -> Result<TypeInfo<'a>>
where
    R: GenericContextResolver + ?Sized,
{
    let mut info = TypeInfo::new(metadata)?;
    info.name = Some(layout.descriptor()?.name()?);
    info.generic_arguments = metadata.generic_arguments()?.iter().collect::<Result<_>>()?;
    info.cases = layout.cases(resolver)?;
    info.num_enum_cases = layout.case_count()?;
    info.num_payload_enum_cases = layout.payload_case_count()?;
    Ok(info)
}

fn tuple_info<'a>(metadata: &TypeMetadata<'a>, layout: &TupleMetadata<'a>) -> Result<TypeInfo<'a>> {
    let mut info = TypeInfo::new(metadata)?;
    info.properties = layout
        .elements()?
        .into_iter()
        .map(|element| -> Result<PropertyInfo<'a>> {
            let offset = usize::try_from(element.offset).map_err(|_| {
                malformed_error!("Tuple element offset {} is not addressable", element.offset)
            })?;
            Ok(PropertyInfo {
                name: element.label,
                ty: Some(element.ty),
                is_var: true,
                offset,
                owner: *metadata,
            })
        })
        .collect::<Result<_>>()?;
    Ok(info)
}

fn class_info<'a, R>(layout: &ClassMetadata<'a>, resolver: &R) -> Result<TypeInfo<'a>>
where
    R: GenericContextResolver + ?Sized,
{
    let metadata = layout.metadata();
    let mut info = TypeInfo::new(&metadata)?;
    info.name = Some(layout.descriptor()?.name()?);
    info.properties = class_properties(layout, resolver)?;

    if !layout.has_resilient_superclass()? {
        info.generic_arguments = layout.generic_arguments()?.iter().collect::<Result<_>>()?;
    }

    for ancestor in layout.superclasses()? {
        info.inheritance.push(ancestor.metadata());
        info.properties.extend(class_properties(&ancestor, resolver)?);
    }

    Ok(info)
}

/// The stored properties a class declares itself
fn class_properties<'a, R>(
    layout: &ClassMetadata<'a>,
    resolver: &R,
) -> Result<Vec<PropertyInfo<'a>>>
where
    R: GenericContextResolver + ?Sized,
{
    let metadata = layout.metadata();
    let offsets = match layout.field_offsets() {
        Ok(offsets) => offsets,
        Err(Error::NotSupported) => {
            log::debug!(
                "class metadata at {} has a resilient superclass, skipping its properties",
                metadata.offset()
            );
            return Ok(Vec::new());
        }
        Err(error) => return Err(error),
    };

    let descriptor = layout.descriptor()?;
    let Some(fields) = descriptor.field_descriptor()? else {
        return Ok(Vec::new());
    };
    if fields.num_fields() as usize != offsets.len() {
        return Err(malformed_error!(
            "{} declares {} field records but {} field offsets",
            descriptor.name()?,
            fields.num_fields(),
            offsets.len()
        ));
    }

    let resolver = TypeReferenceResolver::new(resolver);
    let mut properties = Vec::with_capacity(offsets.len());
    for (record, offset) in fields.records().zip(offsets) {
        let record = record?;
        let ty = match record.type_reference()? {
            Some(reference) => resolver.resolve(&reference, &metadata)?,
            None => None,
        };
        properties.push(PropertyInfo {
            name: record.name()?,
            ty,
            is_var: record.is_var(),
            offset: usize::try_from(offset).map_err(|_| {
                malformed_error!("Class field offset {} is not addressable", offset)
            })?,
            owner: metadata,
        });
    }

    Ok(properties)
}
