//! Resolution of encoded type references.
//!
//! Turning a field's encoded type reference into type metadata requires demangling and,
//! for generic owners, substituting the owner's generic arguments. That work belongs to the
//! runtime that emitted the image and is injected through the [`GenericContextResolver`]
//! trait. [`TypeReferenceResolver`] is the thin, stateless adapter the enumerator uses: it
//! collects the owner's context descriptor and generic arguments and forwards them together
//! with the reference.
//!
//! # Examples
//!
//! ```rust
//! use metascope::prelude::*;
//!
//! /// Resolves every reference to one fixed type.
//! struct Always(usize);
//!
//! impl GenericContextResolver for Always {
//!     fn resolve_type<'a>(
//!         &self,
//!         reference: &EncodedTypeReference<'a>,
//!         _context: &TypeContextDescriptor<'a>,
//!         _generic_arguments: &GenericArguments<'a>,
//!     ) -> Option<TypeMetadata<'a>> {
//!         reference.view().metadata(self.0).ok()
//!     }
//! }
//! ```

use crate::{
    metadata::{
        descriptor::TypeContextDescriptor,
        typeref::EncodedTypeReference,
        view::{GenericArguments, TypeMetadata},
    },
    Error, Result,
};

/// The external service that maps an encoded type reference to type metadata.
///
/// Implementations receive the reference, the context descriptor of the type that declared it
/// and that type's generic arguments, so generic parameter references can be substituted.
/// Returning `None` means the reference cannot be resolved; the enumerator passes that through
/// as a field without a type.
///
/// Implementations that are shared between threads must be `Sync` themselves; the enumerator
/// adds no synchronization of its own.
pub trait GenericContextResolver {
    /// Resolve `reference` in the generic context of its owner
    fn resolve_type<'a>(
        &self,
        reference: &EncodedTypeReference<'a>,
        context: &TypeContextDescriptor<'a>,
        generic_arguments: &GenericArguments<'a>,
    ) -> Option<TypeMetadata<'a>>;
}

/// Stateless adapter resolving field type references against their owning metadata
#[derive(Debug)]
pub struct TypeReferenceResolver<'r, R: ?Sized> {
    service: &'r R,
}

impl<R: ?Sized> Clone for TypeReferenceResolver<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: ?Sized> Copy for TypeReferenceResolver<'_, R> {}

impl<'r, R> TypeReferenceResolver<'r, R>
where
    R: GenericContextResolver + ?Sized,
{
    /// Wrap a resolution service
    #[must_use]
    pub fn new(service: &'r R) -> Self {
        TypeReferenceResolver { service }
    }

    /// The wrapped service
    #[must_use]
    pub fn service(&self) -> &'r R {
        self.service
    }

    /// Resolve `reference`, which must have been read from `owner`'s field descriptor.
    ///
    /// Returns `Ok(None)` when the service cannot resolve the reference.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if `owner` is not a nominal type, and
    /// [`crate::Error::Malformed`] if the reference and the owner live in different images or
    /// the owner's descriptor cannot be read.
    pub fn resolve<'a>(
        &self,
        reference: &EncodedTypeReference<'a>,
        owner: &TypeMetadata<'a>,
    ) -> Result<Option<TypeMetadata<'a>>> {
        if !reference.view().same_image(&owner.view()) {
            return Err(malformed_error!(
                "Type reference at {} does not belong to the image of metadata at {}",
                reference.offset(),
                owner.offset()
            ));
        }

        let Some((context, generic_arguments)) = owner.resolution_context()? else {
            return Err(Error::NotSupported);
        };

        let resolved = self
            .service
            .resolve_type(reference, &context, &generic_arguments);
        log::trace!(
            "resolved {:?} in {} -> {:?}",
            reference,
            context.name().unwrap_or("<unnamed>"),
            resolved
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        file::config::LayoutConfig,
        metadata::builder::{ImageBuilder, MangledPart, StructBuilder},
        test::NameResolver,
        Image,
    };

    #[test]
    fn forwards_generic_context() {
        let config = LayoutConfig::lp64();
        let mut builder = ImageBuilder::new(config);
        let int32 = builder.value_type("Int32", 4, 4).unwrap();
        let boolean = builder.value_type("Bool", 1, 1).unwrap();
        let pair = StructBuilder::new("Pair")
            .generic_parameters(2)
            .field("first", "x", 0)
            .field("second", "q_", 4)
            .layout(5, 4)
            .build(&mut builder, &[int32.metadata, boolean.metadata])
            .unwrap();
        let image = Image::from_mem(builder.finish(), config).unwrap();

        let owner = image.metadata(pair.metadata).unwrap();
        let fields = owner
            .as_struct()
            .unwrap()
            .descriptor()
            .unwrap()
            .field_descriptor()
            .unwrap()
            .unwrap();
        let references: Vec<_> = fields
            .records()
            .map(|record| record.unwrap().type_reference().unwrap().unwrap())
            .collect();

        let service = NameResolver::new();
        let resolver = TypeReferenceResolver::new(&service);
        let first = resolver.resolve(&references[0], &owner).unwrap().unwrap();
        let second = resolver.resolve(&references[1], &owner).unwrap().unwrap();
        assert_eq!(first.offset(), int32.metadata);
        assert_eq!(second.offset(), boolean.metadata);
    }

    #[test]
    fn unresolvable_is_none() {
        let config = LayoutConfig::lp64();
        let mut builder = ImageBuilder::new(config);
        let reference = builder.mangled_name(&[MangledPart::Text("7Unknown")]).unwrap();
        let point = StructBuilder::new("Point")
            .layout(0, 1)
            .build(&mut builder, &[])
            .unwrap();
        let image = Image::from_mem(builder.finish(), config).unwrap();

        let owner = image.metadata(point.metadata).unwrap();
        let reference = EncodedTypeReference::new(image.view(), reference).unwrap();
        let service = NameResolver::new();
        let resolver = TypeReferenceResolver::new(&service);
        assert_eq!(resolver.resolve(&reference, &owner).unwrap(), None);
    }

    #[test]
    fn foreign_image_is_rejected() {
        let config = LayoutConfig::lp64();
        let build = || {
            let mut builder = ImageBuilder::new(config);
            let reference = builder.mangled_name(&[MangledPart::Text("Si")]).unwrap();
            let point = StructBuilder::new("Point")
                .layout(0, 1)
                .build(&mut builder, &[])
                .unwrap();
            (
                Image::from_mem(builder.finish(), config).unwrap(),
                reference,
                point.metadata,
            )
        };
        let (first, reference, _) = build();
        let (second, _, point) = build();

        let reference = EncodedTypeReference::new(first.view(), reference).unwrap();
        let owner = second.metadata(point).unwrap();
        let service = NameResolver::new();
        let resolver = TypeReferenceResolver::new(&service);
        assert!(matches!(
            resolver.resolve(&reference, &owner),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn structural_owner_is_not_supported() {
        let config = LayoutConfig::lp64();
        let mut builder = ImageBuilder::new(config);
        let reference = builder.mangled_name(&[MangledPart::Text("Si")]).unwrap();
        let function = builder
            .bare_metadata(crate::MetadataKind::Function, 8, 8)
            .unwrap();
        let image = Image::from_mem(builder.finish(), config).unwrap();

        let owner = image.metadata(function).unwrap();
        let reference = EncodedTypeReference::new(image.view(), reference).unwrap();
        let service = NameResolver::new();
        assert!(matches!(
            TypeReferenceResolver::new(&service).resolve(&reference, &owner),
            Err(Error::NotSupported)
        ));
    }
}
