//! Enum and optional metadata.
//!
//! Enums reuse the field descriptor machinery: each case is a field record whose type
//! reference names the payload type, or is null for cases without a payload. Payload cases
//! come first in the descriptor, followed by the empty cases.

use crate::{
    metadata::{descriptor::TypeContextDescriptor, view::TypeMetadata},
    resolver::{GenericContextResolver, TypeReferenceResolver},
    Result,
};

/// One declared case of an enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumCase<'a> {
    /// The case name
    pub name: &'a str,
    /// The resolved payload type; `None` for empty cases or unresolvable payloads
    pub payload: Option<TypeMetadata<'a>>,
    /// Whether the payload is stored out of line
    pub indirect: bool,
}

/// Enum or optional metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumMetadata<'a> {
    metadata: TypeMetadata<'a>,
}

impl<'a> EnumMetadata<'a> {
    pub(crate) fn new(metadata: TypeMetadata<'a>) -> Self {
        EnumMetadata { metadata }
    }

    /// The underlying record
    #[must_use]
    pub fn metadata(&self) -> TypeMetadata<'a> {
        self.metadata
    }

    /// The enum's context descriptor
    ///
    /// # Errors
    /// Returns an error if the descriptor is missing or unreadable.
    pub fn descriptor(&self) -> Result<TypeContextDescriptor<'a>> {
        match self.metadata.nominal_descriptor()? {
            Some(descriptor) => Ok(descriptor),
            None => Err(malformed_error!(
                "Enum metadata at {} has no descriptor",
                self.metadata.offset()
            )),
        }
    }

    /// Number of cases carrying a payload
    ///
    /// # Errors
    /// Returns an error if the descriptor cannot be read.
    pub fn payload_case_count(&self) -> Result<u32> {
        self.descriptor()?.num_payload_cases()
    }

    /// Number of cases without a payload
    ///
    /// # Errors
    /// Returns an error if the descriptor cannot be read.
    pub fn empty_case_count(&self) -> Result<u32> {
        self.descriptor()?.num_empty_cases()
    }

    /// Total number of cases
    ///
    /// # Errors
    /// Returns an error if the descriptor cannot be read, or [`crate::Error::Malformed`] if the
    /// two counts do not sum to a `u32`.
    pub fn case_count(&self) -> Result<u32> {
        let descriptor = self.descriptor()?;
        let payload = descriptor.num_payload_cases()?;
        let empty = descriptor.num_empty_cases()?;
        payload.checked_add(empty).ok_or_else(|| {
            malformed_error!(
                "Enum descriptor at {} declares {} payload and {} empty cases",
                descriptor.offset(),
                payload,
                empty
            )
        })
    }

    /// All cases in declaration order, payload types resolved through `resolver`
    ///
    /// # Errors
    /// Returns an error if the descriptor or a case record is malformed.
    pub fn cases<R>(&self, resolver: &R) -> Result<Vec<EnumCase<'a>>>
    where
        R: GenericContextResolver + ?Sized,
    {
        let descriptor = self.descriptor()?;
        let Some(fields) = descriptor.field_descriptor()? else {
            return Ok(Vec::new());
        };

        let resolver = TypeReferenceResolver::new(resolver);
        let mut cases = Vec::new();
        for record in fields.records() {
            let record = record?;
            let payload = match record.type_reference()? {
                Some(reference) => resolver.resolve(&reference, &self.metadata)?,
                None => None,
            };

            cases.push(EnumCase {
                name: record.name()?,
                payload,
                indirect: record.is_indirect_case(),
            });
        }

        Ok(cases)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        file::config::LayoutConfig,
        metadata::{
            builder::{EnumBuilder, ImageBuilder},
            descriptor::{DESCRIPTOR_KIND_WORD_0, DESCRIPTOR_KIND_WORD_1},
            kind::MetadataKind,
            view::MetadataLayout,
        },
        test::NameResolver,
        Error, Image,
    };

    #[test]
    fn cases() {
        let config = LayoutConfig::lp64();
        let mut builder = ImageBuilder::new(config);
        let double = builder.value_type("Double", 8, 8).unwrap();
        let shape = EnumBuilder::new("Shape")
            .payload_case("circle", "Sd")
            .indirect_case("group", "Sd")
            .empty_case("none")
            .layout(9, 8)
            .build(&mut builder, &[])
            .unwrap();
        let image = Image::from_mem(builder.finish(), config).unwrap();

        let resolver = NameResolver::new().with_type("Sd", double.metadata);
        let metadata = image.metadata(shape.metadata).unwrap();
        let MetadataLayout::Enum(layout) = metadata.layout() else {
            panic!("expected enum layout");
        };

        assert_eq!(layout.metadata(), metadata);
        assert_eq!(layout.payload_case_count().unwrap(), 2);
        assert_eq!(layout.empty_case_count().unwrap(), 1);
        assert_eq!(layout.case_count().unwrap(), 3);

        let cases = layout.cases(&resolver).unwrap();
        let names: Vec<_> = cases.iter().map(|case| case.name).collect();
        assert_eq!(names, ["circle", "group", "none"]);
        assert_eq!(cases[0].payload.unwrap().offset(), double.metadata);
        assert!(!cases[0].indirect);
        assert!(cases[1].indirect);
        assert!(cases[2].payload.is_none());
    }

    #[test]
    fn optional() {
        let config = LayoutConfig::wasm32();
        let mut builder = ImageBuilder::new(config);
        let int32 = builder.value_type("Int32", 4, 4).unwrap();
        let optional = EnumBuilder::new("Optional")
            .kind(MetadataKind::Optional)
            .generic_parameters(1)
            .payload_case("some", "x")
            .empty_case("none")
            .layout(5, 4)
            .build(&mut builder, &[int32.metadata])
            .unwrap();
        let image = Image::from_mem(builder.finish(), config).unwrap();

        let resolver = NameResolver::new();
        let MetadataLayout::Optional(layout) = image.metadata(optional.metadata).unwrap().layout()
        else {
            panic!("expected optional layout");
        };

        let cases = layout.cases(&resolver).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].payload.unwrap().offset(), int32.metadata);
        assert_eq!(cases[1].name, "none");
        assert!(cases[1].payload.is_none());
    }

    #[test]
    fn corrupt_case_counts() {
        let config = LayoutConfig::lp64();
        let mut builder = ImageBuilder::new(config);
        let double = builder.value_type("Double", 8, 8).unwrap();
        let shape = EnumBuilder::new("Shape")
            .payload_case("circle", "Sd")
            .empty_case("none")
            .layout(9, 8)
            .build(&mut builder, &[])
            .unwrap();

        let mut data = builder.finish();
        let payload = shape.descriptor + DESCRIPTOR_KIND_WORD_0;
        data[payload..payload + 3].fill(0xFF);
        let empty = shape.descriptor + DESCRIPTOR_KIND_WORD_1;
        data[empty..empty + 4].fill(0xFF);
        let image = Image::from_mem(data, config).unwrap();

        let MetadataLayout::Enum(layout) = image.metadata(shape.metadata).unwrap().layout() else {
            panic!("expected enum layout");
        };
        assert_eq!(layout.payload_case_count().unwrap(), 0x00FF_FFFF);
        assert_eq!(layout.empty_case_count().unwrap(), u32::MAX);
        assert!(matches!(layout.case_count(), Err(Error::Malformed { .. })));

        let resolver = NameResolver::new().with_type("Sd", double.metadata);
        let cases = layout.cases(&resolver).unwrap();
        assert_eq!(cases.len(), 2);
    }
}
