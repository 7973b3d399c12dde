//! Builders for well-formed metadata images.
//!
//! Real images are emitted by a compiler toolchain. For tests, benchmarks and documentation
//! this module writes the same layout from Rust: [`ImageBuilder`] appends records to a growing
//! buffer and returns their offsets, and the fluent [`StructBuilder`], [`EnumBuilder`],
//! [`ClassBuilder`] and [`TupleBuilder`] assemble complete types on top of it.
//!
//! The builder is append-only. Relative pointers may point backwards, so every record is
//! written after the records it refers to.
//!
//! # Examples
//!
//! ```rust
//! use metascope::metadata::builder::{ImageBuilder, StructBuilder};
//! use metascope::{Image, LayoutConfig, MetadataKind};
//!
//! let mut builder = ImageBuilder::new(LayoutConfig::wasm32());
//! let point = StructBuilder::new("Point")
//!     .field("x", "s5Int32V", 0)
//!     .field("y", "s5Int32V", 4)
//!     .layout(8, 4)
//!     .build(&mut builder, &[])?;
//!
//! let image = builder.build_image()?;
//! let metadata = image.metadata(point.metadata)?;
//! assert_eq!(metadata.kind(), MetadataKind::Struct);
//! assert_eq!(metadata.size()?, 8);
//! # Ok::<(), metascope::Error>(())
//! ```

use crate::{
    file::{
        config::LayoutConfig,
        io::{write_le_at, write_word_at, RecordIO},
        Image,
    },
    metadata::{
        class::{class_members_word, CLASS_IS_NATIVE_MASK},
        descriptor::{ContextDescriptorFlags, ContextDescriptorKind},
        fields::{FieldDescriptorKind, FieldRecordFlags, FIELD_RECORD_SIZE},
        kind::MetadataKind,
        valuewitness::{ValueWitnessFlags, ValueWitnessTable, VALUE_WITNESS_FUNCTION_SLOTS},
        view::METADATA_GENERIC_ARGUMENTS_WORD,
    },
    Error, Result,
};

/// One piece of an encoded type reference to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MangledPart<'s> {
    /// Literal mangling text
    Text(&'s str),
    /// A relative reference to a context descriptor
    DirectContext(usize),
    /// A relative reference to a pointer-sized slot holding a context descriptor pointer
    IndirectContext(usize),
}

/// Offsets of a type written by one of the fluent builders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltType {
    /// The context descriptor
    pub descriptor: usize,
    /// The instantiated type metadata
    pub metadata: usize,
}

/// A field record to emit
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec<'s> {
    /// Declared name
    pub name: &'s str,
    /// Offset of the encoded type reference, `None` for payload-less enum cases
    pub type_reference: Option<usize>,
    /// Record flags
    pub flags: FieldRecordFlags,
}

/// A struct or enum context descriptor to emit
#[derive(Debug, Clone, Copy)]
pub struct DescriptorSpec<'s> {
    /// Struct or enum
    pub kind: ContextDescriptorKind,
    /// Declared type name
    pub name: &'s str,
    /// Offset of the field descriptor, if the type declares fields
    pub fields: Option<usize>,
    /// Struct: field count; enum: payload case count
    pub kind_word_0: u32,
    /// Struct: field offset vector offset in words; enum: empty case count
    pub kind_word_1: u32,
    /// Number of generic parameters, `0` for non-generic types
    pub generic_parameters: u16,
}

/// Append-only writer for metadata images
#[derive(Debug)]
pub struct ImageBuilder {
    data: Vec<u8>,
    config: LayoutConfig,
}

impl ImageBuilder {
    /// Start an image for the given layout.
    ///
    /// The image begins with one zero word so that no record ever sits at offset `0`, which
    /// pointers use as null.
    #[must_use]
    pub fn new(config: LayoutConfig) -> Self {
        ImageBuilder {
            data: vec![0; config.word_size()],
            config,
        }
    }

    /// The layout being written
    #[must_use]
    pub fn config(&self) -> LayoutConfig {
        self.config
    }

    /// Current size of the image, which is also the offset of the next record
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing has been written yet. Never the case after [`Self::new`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Pad with zeros to a multiple of `alignment`
    pub fn align(&mut self, alignment: usize) {
        let padding = (alignment - self.data.len() % alignment) % alignment;
        self.data.resize(self.data.len() + padding, 0);
    }

    /// Append a little-endian value
    ///
    /// # Errors
    /// Never fails in practice; the buffer is grown before writing.
    pub fn write<T: RecordIO>(&mut self, value: T) -> Result<usize> {
        let mut offset = self.data.len();
        let start = offset;
        self.data.resize(offset + std::mem::size_of::<T>(), 0);
        write_le_at(&mut self.data, &mut offset, value)?;
        Ok(start)
    }

    /// Append a pointer-sized word
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `value` does not fit a 32-bit word.
    pub fn write_word(&mut self, value: u64) -> Result<usize> {
        let mut offset = self.data.len();
        let start = offset;
        self.data.resize(offset + self.config.word_size(), 0);
        if let Err(error) = write_word_at(&mut self.data, &mut offset, value, self.config.pointer_width)
        {
            self.data.truncate(start);
            return Err(error);
        }
        Ok(start)
    }

    /// Append an absolute pointer; `None` writes null
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the offset does not fit the word size.
    pub fn write_pointer(&mut self, target: Option<usize>) -> Result<usize> {
        self.write_word(target.map_or(0, |target| target as u64))
    }

    /// Append a relative pointer to `target`; `None` writes null
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the displacement does not fit 32 bits.
    pub fn write_relative(&mut self, target: Option<usize>) -> Result<usize> {
        let origin = self.data.len();
        let displacement = match target {
            Some(target) => {
                let delta = target as i64 - origin as i64;
                i32::try_from(delta).map_err(|_| {
                    malformed_error!("Relative pointer from {} to {} overflows", origin, target)
                })?
            }
            None => 0,
        };
        self.write(displacement)
    }

    /// Append a NUL-terminated string
    pub fn string(&mut self, value: &str) -> usize {
        let offset = self.data.len();
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        offset
    }

    /// Append an encoded type reference built from `parts`
    ///
    /// # Errors
    /// Returns an error if a symbolic reference cannot be encoded.
    pub fn mangled_name(&mut self, parts: &[MangledPart<'_>]) -> Result<usize> {
        let offset = self.data.len();
        for part in parts {
            match *part {
                MangledPart::Text(text) => self.data.extend_from_slice(text.as_bytes()),
                MangledPart::DirectContext(descriptor) => {
                    self.data.push(0x01);
                    self.write_relative(Some(descriptor))?;
                }
                MangledPart::IndirectContext(slot) => {
                    self.data.push(0x02);
                    self.write_relative(Some(slot))?;
                }
            }
        }
        self.data.push(0);
        Ok(offset)
    }

    /// Append a value witness table
    ///
    /// # Errors
    /// Returns an error if `size` or `stride` do not fit the word size.
    pub fn value_witness_table(
        &mut self,
        size: u64,
        stride: u64,
        alignment: u64,
        flags: ValueWitnessFlags,
    ) -> Result<usize> {
        self.align(self.config.word_size());
        let offset = self.data.len();
        for _ in 0..VALUE_WITNESS_FUNCTION_SLOTS {
            self.write_word(0)?;
        }
        self.write_word(size)?;
        self.write_word(stride)?;
        self.write(ValueWitnessTable::flags_for_alignment(alignment, flags))?;
        self.write(0u32)?;
        Ok(offset)
    }

    /// Append a field descriptor with the given records
    ///
    /// # Errors
    /// Returns an error if a relative pointer cannot be encoded.
    pub fn field_descriptor(
        &mut self,
        kind: FieldDescriptorKind,
        fields: &[FieldSpec<'_>],
    ) -> Result<usize> {
        let names: Vec<usize> = fields.iter().map(|field| self.string(field.name)).collect();
        let count = u32::try_from(fields.len())
            .map_err(|_| malformed_error!("Too many fields: {}", fields.len()))?;

        self.align(4);
        let offset = self.data.len();
        self.write_relative(None)?;
        self.write_relative(None)?;
        self.write(kind.to_raw())?;
        self.write(FIELD_RECORD_SIZE as u16)?;
        self.write(count)?;

        for (field, name) in fields.iter().zip(names) {
            self.write(field.flags.bits())?;
            self.write_relative(field.type_reference)?;
            self.write_relative(Some(name))?;
        }
        Ok(offset)
    }

    /// Append a struct or enum context descriptor
    ///
    /// # Errors
    /// Returns an error if a relative pointer cannot be encoded.
    pub fn type_descriptor(&mut self, spec: &DescriptorSpec<'_>) -> Result<usize> {
        let Some(kind) = spec.kind.to_raw() else {
            return Err(Error::NotSupported);
        };
        let name = self.string(spec.name);

        let mut flags = ContextDescriptorFlags::from_bits_retain(u32::from(kind))
            | ContextDescriptorFlags::UNIQUE;
        if spec.generic_parameters > 0 {
            flags |= ContextDescriptorFlags::GENERIC;
        }

        self.align(4);
        let offset = self.data.len();
        self.write(flags.bits())?;
        self.write_relative(None)?;
        self.write_relative(Some(name))?;
        self.write_relative(None)?;
        self.write_relative(spec.fields)?;
        self.write(spec.kind_word_0)?;
        self.write(spec.kind_word_1)?;
        self.generic_header(spec.generic_parameters)?;
        Ok(offset)
    }

    /// Append a generic context header for `params` key parameters; nothing when `0`
    ///
    /// # Errors
    /// Never fails in practice; the buffer is grown before writing.
    pub fn generic_header(&mut self, params: u16) -> Result<()> {
        if params == 0 {
            return Ok(());
        }

        self.write_relative(None)?;
        self.write_relative(None)?;
        self.write(params)?;
        self.write(0u16)?;
        self.write(params)?;
        self.write(0u16)?;
        Ok(())
    }

    /// Append a metadata record: value witness pointer, kind word, then `words`.
    ///
    /// Returns the offset of the kind word, which is the metadata's address.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for [`MetadataKind::Unknown`], or an error if a
    /// word does not fit the word size.
    pub fn metadata(
        &mut self,
        kind: MetadataKind,
        value_witnesses: usize,
        words: &[u64],
    ) -> Result<usize> {
        let Some(raw) = kind.to_raw() else {
            return Err(Error::NotSupported);
        };

        self.align(self.config.word_size());
        self.write_pointer(Some(value_witnesses))?;
        let offset = self.write_word(raw)?;
        for word in words {
            self.write_word(*word)?;
        }
        Ok(offset)
    }

    /// Append nominal metadata for `descriptor` with its generic arguments and, for structs,
    /// the field offset table.
    ///
    /// # Errors
    /// Returns an error if a word does not fit the word size.
    pub fn nominal_metadata(
        &mut self,
        kind: MetadataKind,
        value_witnesses: usize,
        descriptor: usize,
        generic_arguments: &[usize],
        field_offsets: &[u32],
    ) -> Result<usize> {
        let mut words = Vec::with_capacity(1 + generic_arguments.len());
        words.push(descriptor as u64);
        words.extend(generic_arguments.iter().map(|argument| *argument as u64));

        let offset = self.metadata(kind, value_witnesses, &words)?;
        for field_offset in field_offsets {
            self.write(*field_offset)?;
        }
        self.align(self.config.word_size());
        Ok(offset)
    }

    /// Append metadata of any kind without kind-specific data
    ///
    /// # Errors
    /// Returns an error for [`MetadataKind::Unknown`].
    pub fn bare_metadata(&mut self, kind: MetadataKind, size: u64, alignment: u64) -> Result<usize> {
        let value_witnesses =
            self.value_witness_table(size, size, alignment, ValueWitnessFlags::empty())?;
        self.metadata(kind, value_witnesses, &[0])
    }

    /// Append a non-generic struct without fields, the shape of a builtin value type
    ///
    /// # Errors
    /// Returns an error if a record cannot be encoded.
    pub fn value_type(&mut self, name: &str, size: u64, alignment: u64) -> Result<BuiltType> {
        StructBuilder::new(name).layout(size, alignment).build(self, &[])
    }

    /// The finished image bytes
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.data
    }

    /// The finished image, loaded with the builder's layout
    ///
    /// # Errors
    /// Returns an error if the image cannot be loaded.
    pub fn build_image(self) -> Result<Image> {
        let config = self.config;
        Image::from_mem(self.finish(), config)
    }
}

fn stride(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment).max(1) * alignment
}

#[derive(Clone, Copy)]
enum FieldType<'s> {
    Mangled(&'s str),
    Reference(usize),
}

#[derive(Clone, Copy)]
struct FieldEntry<'s> {
    name: &'s str,
    ty: Option<FieldType<'s>>,
    offset: u32,
    flags: FieldRecordFlags,
}

fn write_fields(
    builder: &mut ImageBuilder,
    kind: FieldDescriptorKind,
    entries: &[FieldEntry<'_>],
) -> Result<Option<usize>> {
    if entries.is_empty() {
        return Ok(None);
    }

    let mut specs = Vec::with_capacity(entries.len());
    for entry in entries {
        let type_reference = match entry.ty {
            Some(FieldType::Mangled(mangled)) => {
                Some(builder.mangled_name(&[MangledPart::Text(mangled)])?)
            }
            Some(FieldType::Reference(reference)) => Some(reference),
            None => None,
        };
        specs.push(FieldSpec {
            name: entry.name,
            type_reference,
            flags: entry.flags,
        });
    }
    builder.field_descriptor(kind, &specs).map(Some)
}

/// Fluent builder for struct descriptors and metadata
pub struct StructBuilder<'s> {
    name: &'s str,
    fields: Vec<FieldEntry<'s>>,
    generic_parameters: u16,
    size: u64,
    alignment: u64,
}

impl<'s> StructBuilder<'s> {
    /// Start a struct named `name`
    #[must_use]
    pub fn new(name: &'s str) -> Self {
        StructBuilder {
            name,
            fields: Vec::new(),
            generic_parameters: 0,
            size: 0,
            alignment: 1,
        }
    }

    /// Add an immutable field whose type is the mangled name `mangled`
    #[must_use]
    pub fn field(mut self, name: &'s str, mangled: &'s str, offset: u32) -> Self {
        self.fields.push(FieldEntry {
            name,
            ty: Some(FieldType::Mangled(mangled)),
            offset,
            flags: FieldRecordFlags::empty(),
        });
        self
    }

    /// Add a mutable field whose type is the mangled name `mangled`
    #[must_use]
    pub fn var_field(mut self, name: &'s str, mangled: &'s str, offset: u32) -> Self {
        self.fields.push(FieldEntry {
            name,
            ty: Some(FieldType::Mangled(mangled)),
            offset,
            flags: FieldRecordFlags::VAR,
        });
        self
    }

    /// Add a field whose type reference was already written at `reference`
    #[must_use]
    pub fn field_reference(mut self, name: &'s str, reference: usize, offset: u32) -> Self {
        self.fields.push(FieldEntry {
            name,
            ty: Some(FieldType::Reference(reference)),
            offset,
            flags: FieldRecordFlags::empty(),
        });
        self
    }

    /// Declare `count` generic parameters
    #[must_use]
    pub fn generic_parameters(mut self, count: u16) -> Self {
        self.generic_parameters = count;
        self
    }

    /// Size and alignment of the struct
    #[must_use]
    pub fn layout(mut self, size: u64, alignment: u64) -> Self {
        self.size = size;
        self.alignment = alignment;
        self
    }

    fn write_descriptor(&self, builder: &mut ImageBuilder) -> Result<usize> {
        let fields = write_fields(builder, FieldDescriptorKind::Struct, &self.fields)?;
        let count = u32::try_from(self.fields.len())
            .map_err(|_| malformed_error!("Too many fields: {}", self.fields.len()))?;

        builder.type_descriptor(&DescriptorSpec {
            kind: ContextDescriptorKind::Struct,
            name: self.name,
            fields,
            kind_word_0: count,
            kind_word_1: METADATA_GENERIC_ARGUMENTS_WORD as u32 + u32::from(self.generic_parameters),
            generic_parameters: self.generic_parameters,
        })
    }

    /// Write only the context descriptor
    ///
    /// # Errors
    /// Returns an error if a record cannot be encoded.
    pub fn build_descriptor(self, builder: &mut ImageBuilder) -> Result<usize> {
        self.write_descriptor(builder)
    }

    /// Write the descriptor and one instantiation with `generic_arguments`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the number of arguments does not match the
    /// declared generic parameters, or an error if a record cannot be encoded.
    pub fn build(self, builder: &mut ImageBuilder, generic_arguments: &[usize]) -> Result<BuiltType> {
        if generic_arguments.len() != usize::from(self.generic_parameters) {
            return Err(malformed_error!(
                "{} expects {} generic arguments, got {}",
                self.name,
                self.generic_parameters,
                generic_arguments.len()
            ));
        }

        let descriptor = self.write_descriptor(builder)?;
        let value_witnesses = builder.value_witness_table(
            self.size,
            stride(self.size, self.alignment),
            self.alignment,
            ValueWitnessFlags::empty(),
        )?;
        let offsets: Vec<u32> = self.fields.iter().map(|field| field.offset).collect();
        let metadata = builder.nominal_metadata(
            MetadataKind::Struct,
            value_witnesses,
            descriptor,
            generic_arguments,
            &offsets,
        )?;

        Ok(BuiltType {
            descriptor,
            metadata,
        })
    }
}

/// Fluent builder for enum and optional descriptors and metadata
pub struct EnumBuilder<'s> {
    name: &'s str,
    kind: MetadataKind,
    payload_cases: Vec<FieldEntry<'s>>,
    empty_cases: Vec<&'s str>,
    generic_parameters: u16,
    size: u64,
    alignment: u64,
}

impl<'s> EnumBuilder<'s> {
    /// Start an enum named `name`
    #[must_use]
    pub fn new(name: &'s str) -> Self {
        EnumBuilder {
            name,
            kind: MetadataKind::Enum,
            payload_cases: Vec::new(),
            empty_cases: Vec::new(),
            generic_parameters: 0,
            size: 0,
            alignment: 1,
        }
    }

    /// Metadata kind of the instantiation, [`MetadataKind::Enum`] or
    /// [`MetadataKind::Optional`]
    #[must_use]
    pub fn kind(mut self, kind: MetadataKind) -> Self {
        self.kind = kind;
        self
    }

    /// Add a case carrying a payload of type `mangled`
    #[must_use]
    pub fn payload_case(mut self, name: &'s str, mangled: &'s str) -> Self {
        self.payload_cases.push(FieldEntry {
            name,
            ty: Some(FieldType::Mangled(mangled)),
            offset: 0,
            flags: FieldRecordFlags::empty(),
        });
        self
    }

    /// Add an indirect case carrying a payload of type `mangled`
    #[must_use]
    pub fn indirect_case(mut self, name: &'s str, mangled: &'s str) -> Self {
        self.payload_cases.push(FieldEntry {
            name,
            ty: Some(FieldType::Mangled(mangled)),
            offset: 0,
            flags: FieldRecordFlags::INDIRECT_CASE,
        });
        self
    }

    /// Add a case without payload
    #[must_use]
    pub fn empty_case(mut self, name: &'s str) -> Self {
        self.empty_cases.push(name);
        self
    }

    /// Declare `count` generic parameters
    #[must_use]
    pub fn generic_parameters(mut self, count: u16) -> Self {
        self.generic_parameters = count;
        self
    }

    /// Size and alignment of the enum
    #[must_use]
    pub fn layout(mut self, size: u64, alignment: u64) -> Self {
        self.size = size;
        self.alignment = alignment;
        self
    }

    fn write_descriptor(&self, builder: &mut ImageBuilder) -> Result<usize> {
        let payload_count = self.payload_cases.len();
        let empty_count = self.empty_cases.len();
        let kind = if payload_count > 1 {
            FieldDescriptorKind::MultiPayloadEnum
        } else {
            FieldDescriptorKind::Enum
        };

        let entries: Vec<FieldEntry<'s>> = self
            .payload_cases
            .iter()
            .copied()
            .chain(self.empty_cases.iter().map(|&name| FieldEntry {
                name,
                ty: None,
                offset: 0,
                flags: FieldRecordFlags::empty(),
            }))
            .collect();
        let fields = write_fields(builder, kind, &entries)?;

        builder.type_descriptor(&DescriptorSpec {
            kind: ContextDescriptorKind::Enum,
            name: self.name,
            fields,
            kind_word_0: u32::try_from(payload_count)
                .map_err(|_| malformed_error!("Too many payload cases: {}", payload_count))?,
            kind_word_1: u32::try_from(empty_count)
                .map_err(|_| malformed_error!("Too many empty cases: {}", empty_count))?,
            generic_parameters: self.generic_parameters,
        })
    }

    /// Write only the context descriptor
    ///
    /// # Errors
    /// Returns an error if a record cannot be encoded.
    pub fn build_descriptor(self, builder: &mut ImageBuilder) -> Result<usize> {
        self.write_descriptor(builder)
    }

    /// Write the descriptor and one instantiation with `generic_arguments`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the number of arguments does not match the
    /// declared generic parameters, or an error if a record cannot be encoded.
    pub fn build(self, builder: &mut ImageBuilder, generic_arguments: &[usize]) -> Result<BuiltType> {
        if generic_arguments.len() != usize::from(self.generic_parameters) {
            return Err(malformed_error!(
                "{} expects {} generic arguments, got {}",
                self.name,
                self.generic_parameters,
                generic_arguments.len()
            ));
        }

        let descriptor = self.write_descriptor(builder)?;
        let value_witnesses = builder.value_witness_table(
            self.size,
            stride(self.size, self.alignment),
            self.alignment,
            ValueWitnessFlags::HAS_ENUM_WITNESSES,
        )?;
        let metadata = builder.nominal_metadata(
            self.kind,
            value_witnesses,
            descriptor,
            generic_arguments,
            &[],
        )?;

        Ok(BuiltType {
            descriptor,
            metadata,
        })
    }
}

/// Fluent builder for tuple metadata
pub struct TupleBuilder<'s> {
    elements: Vec<(Option<&'s str>, usize, u64)>,
    size: u64,
    alignment: u64,
}

impl<'s> TupleBuilder<'s> {
    /// Start an empty tuple
    #[must_use]
    pub fn new() -> Self {
        TupleBuilder {
            elements: Vec::new(),
            size: 0,
            alignment: 1,
        }
    }

    /// Add an element of type `metadata` at byte `offset`
    #[must_use]
    pub fn element(mut self, label: Option<&'s str>, metadata: usize, offset: u64) -> Self {
        self.elements.push((label, metadata, offset));
        self
    }

    /// Size and alignment of the tuple
    #[must_use]
    pub fn layout(mut self, size: u64, alignment: u64) -> Self {
        self.size = size;
        self.alignment = alignment;
        self
    }

    /// Write the tuple metadata and return its offset
    ///
    /// # Errors
    /// Returns an error if a record cannot be encoded.
    pub fn build(self, builder: &mut ImageBuilder) -> Result<usize> {
        let labels = if self.elements.iter().any(|(label, _, _)| label.is_some()) {
            let mut packed = String::new();
            for (label, _, _) in &self.elements {
                packed.push_str(label.unwrap_or_default());
                packed.push(' ');
            }
            Some(builder.string(&packed))
        } else {
            None
        };

        let value_witnesses = builder.value_witness_table(
            self.size,
            stride(self.size, self.alignment),
            self.alignment,
            ValueWitnessFlags::empty(),
        )?;

        let mut words = Vec::with_capacity(2 + self.elements.len() * 2);
        words.push(self.elements.len() as u64);
        words.push(labels.map_or(0, |labels| labels as u64));
        for (_, metadata, offset) in &self.elements {
            words.push(*metadata as u64);
            words.push(*offset);
        }
        builder.metadata(MetadataKind::Tuple, value_witnesses, &words)
    }
}

impl Default for TupleBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent builder for class descriptors and metadata
pub struct ClassBuilder<'s> {
    name: &'s str,
    superclass: Option<(&'s str, usize)>,
    fields: Vec<FieldEntry<'s>>,
    generic_parameters: u16,
    resilient_superclass: bool,
    native: bool,
    instance_size: u32,
    instance_alignment: u16,
}

impl<'s> ClassBuilder<'s> {
    /// Start a native root class named `name`
    #[must_use]
    pub fn new(name: &'s str) -> Self {
        ClassBuilder {
            name,
            superclass: None,
            fields: Vec::new(),
            generic_parameters: 0,
            resilient_superclass: false,
            native: true,
            instance_size: 0,
            instance_alignment: 1,
        }
    }

    /// Inherit from the class mangled as `mangled` whose metadata is at `metadata`
    #[must_use]
    pub fn superclass(mut self, mangled: &'s str, metadata: usize) -> Self {
        self.superclass = Some((mangled, metadata));
        self
    }

    /// Add an immutable stored property whose type is the mangled name `mangled`
    #[must_use]
    pub fn field(mut self, name: &'s str, mangled: &'s str, offset: u32) -> Self {
        self.fields.push(FieldEntry {
            name,
            ty: Some(FieldType::Mangled(mangled)),
            offset,
            flags: FieldRecordFlags::empty(),
        });
        self
    }

    /// Add a mutable stored property whose type is the mangled name `mangled`
    #[must_use]
    pub fn var_field(mut self, name: &'s str, mangled: &'s str, offset: u32) -> Self {
        self.fields.push(FieldEntry {
            name,
            ty: Some(FieldType::Mangled(mangled)),
            offset,
            flags: FieldRecordFlags::VAR,
        });
        self
    }

    /// Declare `count` generic parameters
    #[must_use]
    pub fn generic_parameters(mut self, count: u16) -> Self {
        self.generic_parameters = count;
        self
    }

    /// Flag the superclass layout as resilient
    #[must_use]
    pub fn resilient_superclass(mut self) -> Self {
        self.resilient_superclass = true;
        self
    }

    /// Clear the native bit, as for classes of a foreign object model
    #[must_use]
    pub fn foreign(mut self) -> Self {
        self.native = false;
        self
    }

    /// Size and alignment of instances
    #[must_use]
    pub fn instance_layout(mut self, size: u32, alignment: u16) -> Self {
        self.instance_size = size;
        self.instance_alignment = alignment;
        self
    }

    fn write_descriptor(&self, builder: &mut ImageBuilder) -> Result<usize> {
        let Some(kind) = ContextDescriptorKind::Class.to_raw() else {
            return Err(Error::NotSupported);
        };
        let fields = write_fields(builder, FieldDescriptorKind::Class, &self.fields)?;
        let superclass = match self.superclass {
            Some((mangled, _)) => Some(builder.mangled_name(&[MangledPart::Text(mangled)])?),
            None => None,
        };
        let name = builder.string(self.name);

        let count = u32::try_from(self.fields.len())
            .map_err(|_| malformed_error!("Too many fields: {}", self.fields.len()))?;
        let generic = u32::from(self.generic_parameters);
        let members = class_members_word(builder.config().word_size()) as u32;

        let mut flags = ContextDescriptorFlags::from_bits_retain(u32::from(kind))
            | ContextDescriptorFlags::UNIQUE;
        if generic > 0 {
            flags |= ContextDescriptorFlags::GENERIC;
        }
        if self.resilient_superclass {
            flags |= ContextDescriptorFlags::HAS_RESILIENT_SUPERCLASS;
        }

        builder.align(4);
        let offset = builder.len();
        builder.write(flags.bits())?;
        builder.write_relative(None)?;
        builder.write_relative(Some(name))?;
        builder.write_relative(None)?;
        builder.write_relative(fields)?;
        builder.write_relative(superclass)?;
        // Only the value witness pointer sits below the address point.
        builder.write(1u32)?;
        builder.write(members + generic + count)?;
        builder.write(generic + count)?;
        builder.write(count)?;
        builder.write(members + generic)?;
        builder.generic_header(self.generic_parameters)?;
        Ok(offset)
    }

    /// Write only the context descriptor
    ///
    /// # Errors
    /// Returns an error if a record cannot be encoded.
    pub fn build_descriptor(self, builder: &mut ImageBuilder) -> Result<usize> {
        self.write_descriptor(builder)
    }

    /// Write the descriptor and one instantiation with `generic_arguments`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the number of arguments does not match the
    /// declared generic parameters, or an error if a record cannot be encoded.
    pub fn build(self, builder: &mut ImageBuilder, generic_arguments: &[usize]) -> Result<BuiltType> {
        if generic_arguments.len() != usize::from(self.generic_parameters) {
            return Err(malformed_error!(
                "{} expects {} generic arguments, got {}",
                self.name,
                self.generic_parameters,
                generic_arguments.len()
            ));
        }

        let descriptor = self.write_descriptor(builder)?;
        let word = builder.config().word_size() as u64;
        let value_witnesses =
            builder.value_witness_table(word, word, word, ValueWitnessFlags::empty())?;

        let superclass = self.superclass.map_or(0, |(_, metadata)| metadata as u64);
        let rodata = if self.native { CLASS_IS_NATIVE_MASK } else { 0 };
        let metadata = builder.metadata(
            MetadataKind::Class,
            value_witnesses,
            &[superclass, 0, 0, rodata],
        )?;

        builder.write(0u32)?;
        builder.write(0u32)?;
        builder.write(self.instance_size)?;
        builder.write(self.instance_alignment.saturating_sub(1))?;
        builder.write(0u16)?;
        builder.write(0u32)?;
        builder.write(0u32)?;
        builder.write_pointer(Some(descriptor))?;
        builder.write_pointer(None)?;
        for argument in generic_arguments {
            builder.write_pointer(Some(*argument))?;
        }
        for field in &self.fields {
            builder.write_word(u64::from(field.offset))?;
        }

        Ok(BuiltType {
            descriptor,
            metadata,
        })
    }
}
