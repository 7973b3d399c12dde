//! Type metadata records.
//!
//! [`TypeMetadata`] is the opaque handle the rest of the crate passes around: an image offset
//! whose first word is a [`MetadataKind`]. [`TypeMetadata::layout`] turns the kind into a closed
//! [`MetadataLayout`] so callers dispatch with an exhaustive `match` and only reach
//! kind-specific data through the matching arm.
//!
//! # Layout
//!
//! `W` is the image's pointer width and `M` the metadata offset.
//!
//! | Offset | Content |
//! |--------|---------|
//! | `M - W` | pointer to the [`ValueWitnessTable`] |
//! | `M` | kind |
//! | `M + W` | nominal kinds: pointer to the [`TypeContextDescriptor`] |
//! | `M + 2W` | nominal kinds: generic argument pointers |
//! | `M + k·W` | structs: `u32` field offsets, `k` from the descriptor |
//!
//! Classes continue differently after the kind word, see [`crate::metadata::class`].

use std::fmt;

use crate::{
    file::ImageView,
    metadata::{
        class::ClassMetadata,
        descriptor::{ContextDescriptorKind, TypeContextDescriptor},
        enumcases::EnumMetadata,
        kind::MetadataKind,
        tuple::TupleMetadata,
        valuewitness::ValueWitnessTable,
    },
    Error, Result,
};

/// Word index of the descriptor pointer in nominal metadata
pub const METADATA_DESCRIPTOR_WORD: usize = 1;
/// Word index of the first generic argument in nominal metadata
pub const METADATA_GENERIC_ARGUMENTS_WORD: usize = 2;

/// A type metadata record inside an image
#[derive(Clone, Copy)]
pub struct TypeMetadata<'a> {
    view: ImageView<'a>,
    offset: usize,
    raw_kind: u64,
}

impl<'a> TypeMetadata<'a> {
    /// Open the metadata record at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the kind word does not fit in the image.
    pub fn new(view: ImageView<'a>, offset: usize) -> Result<Self> {
        let raw_kind = view.read_word(offset)?;
        Ok(TypeMetadata {
            view,
            offset,
            raw_kind,
        })
    }

    /// Image offset of the record
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The image the record lives in
    #[must_use]
    pub fn view(&self) -> ImageView<'a> {
        self.view
    }

    /// The undecoded kind word
    #[must_use]
    pub fn raw_kind(&self) -> u64 {
        self.raw_kind
    }

    /// The kind of the record
    #[must_use]
    pub fn kind(&self) -> MetadataKind {
        MetadataKind::from_raw(self.raw_kind)
    }

    /// The kind-specific view of the record
    #[must_use]
    pub fn layout(&self) -> MetadataLayout<'a> {
        match self.kind() {
            MetadataKind::Struct => MetadataLayout::Struct(StructMetadata { metadata: *self }),
            MetadataKind::Enum => MetadataLayout::Enum(EnumMetadata::new(*self)),
            MetadataKind::Optional => MetadataLayout::Optional(EnumMetadata::new(*self)),
            MetadataKind::Tuple => MetadataLayout::Tuple(TupleMetadata::new(*self)),
            MetadataKind::Class => MetadataLayout::Class(ClassMetadata::new(*self)),
            other => MetadataLayout::Other(other),
        }
    }

    /// The struct view of the record.
    ///
    /// # Errors
    /// Returns [`crate::Error::KindMismatch`] if the record is not a struct.
    pub fn as_struct(&self) -> Result<StructMetadata<'a>> {
        match self.layout() {
            MetadataLayout::Struct(metadata) => Ok(metadata),
            _ => Err(Error::KindMismatch {
                expected: MetadataKind::Struct,
                found: self.kind(),
            }),
        }
    }

    /// The value witness table preceding the record
    ///
    /// # Errors
    /// Returns an error if the table pointer is missing or the table cannot be read.
    pub fn value_witnesses(&self) -> Result<ValueWitnessTable> {
        let Some(slot) = self.offset.checked_sub(self.view.word_size()) else {
            return Err(out_of_bounds_error!());
        };

        match self.view.read_pointer(slot)? {
            Some(table) => ValueWitnessTable::read(self.view, table),
            None => Err(malformed_error!(
                "Metadata at {} has no value witness table",
                self.offset
            )),
        }
    }

    /// Size of a value of this type in bytes
    ///
    /// # Errors
    /// Returns an error if the value witness table cannot be read.
    pub fn size(&self) -> Result<u64> {
        Ok(self.value_witnesses()?.size)
    }

    /// Stride of this type in bytes
    ///
    /// # Errors
    /// Returns an error if the value witness table cannot be read.
    pub fn stride(&self) -> Result<u64> {
        Ok(self.value_witnesses()?.stride)
    }

    /// Alignment of this type in bytes
    ///
    /// # Errors
    /// Returns an error if the value witness table cannot be read.
    pub fn alignment(&self) -> Result<u64> {
        Ok(self.value_witnesses()?.alignment())
    }

    /// The context descriptor of a nominal type, `None` for structural kinds
    ///
    /// # Errors
    /// Returns an error if a nominal record has no readable descriptor.
    pub fn nominal_descriptor(&self) -> Result<Option<TypeContextDescriptor<'a>>> {
        if !self.kind().is_nominal() {
            return Ok(None);
        }

        let slot = self.word(METADATA_DESCRIPTOR_WORD)?;
        match self.view.read_pointer(slot)? {
            Some(descriptor) => self.view.descriptor(descriptor).map(Some),
            None => Err(malformed_error!(
                "Metadata at {} has no context descriptor",
                self.offset
            )),
        }
    }

    /// The generic arguments of a nominal type; empty for non-generic and structural types
    ///
    /// # Errors
    /// Returns an error if the descriptor cannot be read.
    pub fn generic_arguments(&self) -> Result<GenericArguments<'a>> {
        let count = match self.nominal_descriptor()? {
            Some(descriptor) => descriptor.generic_parameter_count()?,
            None => 0,
        };

        Ok(GenericArguments {
            view: self.view,
            offset: self.word(METADATA_GENERIC_ARGUMENTS_WORD)?,
            len: count,
        })
    }

    /// The descriptor and generic arguments that field type references of this record are
    /// resolved in; `None` for structural kinds
    pub(crate) fn resolution_context(
        &self,
    ) -> Result<Option<(TypeContextDescriptor<'a>, GenericArguments<'a>)>> {
        if let MetadataLayout::Class(class) = self.layout() {
            return Ok(Some((class.descriptor()?, class.generic_arguments()?)));
        }

        match self.nominal_descriptor()? {
            Some(descriptor) => Ok(Some((descriptor, self.generic_arguments()?))),
            None => Ok(None),
        }
    }

    /// The `index`th pointer-sized word of the record
    pub(crate) fn word(&self, index: usize) -> Result<usize> {
        slot(self.offset, index, self.view.word_size())
    }
}

impl PartialEq for TypeMetadata<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.view.same_image(&other.view)
    }
}

impl Eq for TypeMetadata<'_> {}

impl fmt::Debug for TypeMetadata<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("offset", &self.offset)
            .field("kind", &self.kind())
            .finish()
    }
}

/// Kind-specific views of a [`TypeMetadata`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataLayout<'a> {
    /// A struct; the only layout with a field offset table
    Struct(StructMetadata<'a>),
    /// An enum
    Enum(EnumMetadata<'a>),
    /// An optional, laid out like an enum
    Optional(EnumMetadata<'a>),
    /// A tuple
    Tuple(TupleMetadata<'a>),
    /// A class
    Class(ClassMetadata<'a>),
    /// Any other kind
    Other(MetadataKind),
}

/// Struct metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructMetadata<'a> {
    metadata: TypeMetadata<'a>,
}

impl<'a> StructMetadata<'a> {
    /// The underlying record
    #[must_use]
    pub fn metadata(&self) -> TypeMetadata<'a> {
        self.metadata
    }

    /// The struct's context descriptor
    ///
    /// # Errors
    /// Returns an error if the descriptor is missing or is not a struct descriptor.
    pub fn descriptor(&self) -> Result<TypeContextDescriptor<'a>> {
        let Some(descriptor) = self.metadata.nominal_descriptor()? else {
            return Err(malformed_error!(
                "Struct metadata at {} has no descriptor",
                self.metadata.offset
            ));
        };

        if descriptor.kind() != ContextDescriptorKind::Struct {
            return Err(malformed_error!(
                "Struct metadata at {} points at a {} descriptor",
                self.metadata.offset,
                descriptor.kind()
            ));
        }
        Ok(descriptor)
    }

    /// The generic arguments this instantiation was created with
    ///
    /// # Errors
    /// Returns an error if the descriptor cannot be read.
    pub fn generic_arguments(&self) -> Result<GenericArguments<'a>> {
        self.metadata.generic_arguments()
    }

    /// The field offset table, one entry per stored field
    ///
    /// # Errors
    /// Returns an error if the descriptor cannot be read.
    pub fn field_offsets(&self) -> Result<FieldOffsets<'a>> {
        let descriptor = self.descriptor()?;
        let vector = descriptor.field_offset_vector_offset()? as usize;

        Ok(FieldOffsets {
            view: self.metadata.view,
            offset: self.metadata.word(vector)?,
            len: descriptor.num_fields()? as usize,
        })
    }
}

/// The generic argument list of an instantiated nominal type
#[derive(Debug, Clone, Copy)]
pub struct GenericArguments<'a> {
    view: ImageView<'a>,
    offset: usize,
    len: usize,
}

impl<'a> GenericArguments<'a> {
    pub(crate) fn new(view: ImageView<'a>, offset: usize, len: usize) -> Self {
        GenericArguments { view, offset, len }
    }

    /// Image offset of the first argument
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of arguments
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for non-generic types
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The argument at `index`; `None` if `index` is out of range
    ///
    /// # Errors
    /// Returns an error if the argument pointer is null or unreadable.
    pub fn get(&self, index: usize) -> Result<Option<TypeMetadata<'a>>> {
        if index >= self.len {
            return Ok(None);
        }

        let slot = slot(self.offset, index, self.view.word_size())?;
        match self.view.read_pointer(slot)? {
            Some(argument) => self.view.metadata(argument).map(Some),
            None => Err(malformed_error!("Generic argument {} is null", index)),
        }
    }

    /// Iterate the arguments in declaration order
    pub fn iter(&self) -> impl Iterator<Item = Result<TypeMetadata<'a>>> + '_ {
        (0..self.len).filter_map(move |index| self.get(index).transpose())
    }
}

/// The field offset table of struct metadata
#[derive(Debug, Clone, Copy)]
pub struct FieldOffsets<'a> {
    view: ImageView<'a>,
    offset: usize,
    len: usize,
}

impl<'a> FieldOffsets<'a> {
    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for structs without stored fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte offset of field `index`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `index` is past the table or the entry lies
    /// outside the image.
    pub fn get(&self, index: usize) -> Result<u32> {
        if index >= self.len {
            return Err(out_of_bounds_error!());
        }
        self.view.read::<u32>(slot(self.offset, index, 4)?)
    }

    /// Iterate the offsets in field order
    pub fn iter(&self) -> impl Iterator<Item = Result<u32>> + '_ {
        (0..self.len).map(move |index| self.get(index))
    }
}

fn slot(base: usize, index: usize, size: usize) -> Result<usize> {
    index
        .checked_mul(size)
        .and_then(|relative| base.checked_add(relative))
        .ok_or_else(|| out_of_bounds_error!())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        file::config::LayoutConfig,
        metadata::builder::{ImageBuilder, StructBuilder},
        Image,
    };

    fn point_image(config: LayoutConfig) -> (Image, usize) {
        let mut builder = ImageBuilder::new(config);
        builder.value_type("Int32", 4, 4).unwrap();
        let point = StructBuilder::new("Point")
            .field("x", "s5Int32V", 0)
            .field("y", "s5Int32V", 4)
            .layout(8, 4)
            .build(&mut builder, &[])
            .unwrap();
        (Image::from_mem(builder.finish(), config).unwrap(), point.metadata)
    }

    #[test]
    fn struct_layout() {
        for config in [LayoutConfig::lp64(), LayoutConfig::wasm32()] {
            let (image, point) = point_image(config);
            let metadata = image.metadata(point).unwrap();
            assert_eq!(metadata.kind(), MetadataKind::Struct);
            assert_eq!(metadata.size().unwrap(), 8);
            assert_eq!(metadata.stride().unwrap(), 8);
            assert_eq!(metadata.alignment().unwrap(), 4);

            let MetadataLayout::Struct(layout) = metadata.layout() else {
                panic!("expected struct layout");
            };
            assert_eq!(layout.metadata(), metadata);
            assert_eq!(layout.descriptor().unwrap().name().unwrap(), "Point");
            assert!(layout.generic_arguments().unwrap().is_empty());

            let offsets = layout.field_offsets().unwrap();
            assert_eq!(offsets.len(), 2);
            let offsets: Vec<u32> = offsets.iter().map(|o| o.unwrap()).collect();
            assert_eq!(offsets, [0, 4]);
            assert!(layout.field_offsets().unwrap().get(2).is_err());
        }
    }

    #[test]
    fn generic_arguments() {
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

        let metadata = image.metadata(pair.metadata).unwrap();
        let layout = metadata.as_struct().unwrap();
        let arguments = layout.generic_arguments().unwrap();
        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments.get(0).unwrap().unwrap().offset(), int32.metadata);
        assert_eq!(arguments.get(1).unwrap().unwrap().size().unwrap(), 1);
        assert!(arguments.get(2).unwrap().is_none());
        assert_eq!(arguments.iter().count(), 2);

        let offsets: Vec<u32> = layout
            .field_offsets()
            .unwrap()
            .iter()
            .map(|o| o.unwrap())
            .collect();
        assert_eq!(offsets, [0, 4]);
    }

    #[test]
    fn non_struct_kinds() {
        let config = LayoutConfig::lp64();
        let mut builder = ImageBuilder::new(config);
        let function = builder.bare_metadata(MetadataKind::Function, 8, 8).unwrap();
        let class = builder.bare_metadata(MetadataKind::Class, 8, 8).unwrap();
        let image = Image::from_mem(builder.finish(), config).unwrap();

        let function = image.metadata(function).unwrap();
        assert_eq!(function.layout(), MetadataLayout::Other(MetadataKind::Function));
        assert!(function.nominal_descriptor().unwrap().is_none());
        assert!(function.generic_arguments().unwrap().is_empty());
        assert!(matches!(
            function.as_struct(),
            Err(Error::KindMismatch {
                expected: MetadataKind::Struct,
                found: MetadataKind::Function
            })
        ));

        let class = image.metadata(class).unwrap();
        let MetadataLayout::Class(layout) = class.layout() else {
            panic!("expected class layout");
        };
        assert_eq!(layout.metadata(), class);
        assert!(class.nominal_descriptor().unwrap().is_none());
    }

    #[test]
    fn missing_witness_table() {
        let data = vec![0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let image = Image::from_mem(data, LayoutConfig::lp64()).unwrap();
        let metadata = image.metadata(0).unwrap();
        assert_eq!(metadata.kind(), MetadataKind::Struct);
        assert!(matches!(metadata.size(), Err(Error::OutOfBounds { .. })));
    }
}
