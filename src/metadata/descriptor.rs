//! Type context descriptors.
//!
//! A context descriptor is the static, compiler-emitted description of a declared type. It is
//! shared by every instantiation of a generic type; the per-instantiation data (generic
//! arguments, field offsets) lives in the type metadata record that points at it.
//!
//! # Layout
//!
//! | Offset | Size | Content |
//! |--------|------|---------|
//! | 0  | 4 | flags |
//! | 4  | 4 | relative pointer to the parent context |
//! | 8  | 4 | relative pointer to the type name |
//! | 12 | 4 | relative pointer to the access function |
//! | 16 | 4 | relative pointer to the field descriptor |
//! | 20 | 4 | struct: field count / enum: payload cases and payload size offset |
//! | 24 | 4 | struct: field offset vector offset in words / enum: empty case count |
//! | 28 | 16 | generic types only: [`GenericContextHeader`] |
//!
//! Class descriptors share the first five fields and continue differently:
//!
//! | Offset | Size | Content |
//! |--------|------|---------|
//! | 20 | 4 | relative pointer to the superclass type name |
//! | 24 | 4 | negative metadata size in words, or resilient bounds |
//! | 28 | 4 | positive metadata size in words |
//! | 32 | 4 | number of immediate members |
//! | 36 | 4 | field count |
//! | 40 | 4 | field offset vector offset in words |
//! | 44 | 16 | generic classes only: [`GenericContextHeader`] |

use std::fmt;

use bitflags::bitflags;
use strum::{Display, EnumIter};

use crate::{
    file::ImageView,
    metadata::fields::FieldDescriptor,
    Result,
};

/// Offset of the flags word
pub const DESCRIPTOR_FLAGS: usize = 0;
/// Offset of the relative pointer to the parent context
pub const DESCRIPTOR_PARENT: usize = 4;
/// Offset of the relative pointer to the type name
pub const DESCRIPTOR_NAME: usize = 8;
/// Offset of the relative pointer to the metadata access function
pub const DESCRIPTOR_ACCESS_FUNCTION: usize = 12;
/// Offset of the relative pointer to the field descriptor
pub const DESCRIPTOR_FIELDS: usize = 16;
/// Offset of the first kind-specific word
pub const DESCRIPTOR_KIND_WORD_0: usize = 20;
/// Offset of the second kind-specific word
pub const DESCRIPTOR_KIND_WORD_1: usize = 24;
/// Offset of the generic context header, present when the descriptor is generic
pub const DESCRIPTOR_GENERIC_HEADER: usize = 28;
/// Size of a struct or enum descriptor without its generic header
pub const DESCRIPTOR_SIZE: usize = 28;
/// Size of the generic context header
pub const GENERIC_HEADER_SIZE: usize = 16;
/// Class descriptors: offset of the relative pointer to the superclass type name
pub const CLASS_DESCRIPTOR_SUPERCLASS: usize = 20;
/// Class descriptors: offset of the negative metadata size in words
pub const CLASS_DESCRIPTOR_NEGATIVE_SIZE: usize = 24;
/// Class descriptors: offset of the positive metadata size in words
pub const CLASS_DESCRIPTOR_POSITIVE_SIZE: usize = 28;
/// Class descriptors: offset of the immediate member count
pub const CLASS_DESCRIPTOR_IMMEDIATE_MEMBERS: usize = 32;
/// Class descriptors: offset of the field count
pub const CLASS_DESCRIPTOR_NUM_FIELDS: usize = 36;
/// Class descriptors: offset of the field offset vector offset
pub const CLASS_DESCRIPTOR_FIELD_OFFSET_VECTOR: usize = 40;
/// Class descriptors: offset of the generic context header
pub const CLASS_DESCRIPTOR_GENERIC_HEADER: usize = 44;
/// Size of a class descriptor without its generic header
pub const CLASS_DESCRIPTOR_SIZE: usize = 44;

const KIND_MASK: u32 = 0x1F;
const VERSION_SHIFT: u32 = 8;
const PAYLOAD_CASES_MASK: u32 = 0x00FF_FFFF;
const PAYLOAD_SIZE_OFFSET_SHIFT: u32 = 24;

bitflags! {
    /// Flags word of a context descriptor.
    ///
    /// The low five bits hold the [`ContextDescriptorKind`], bits 8-15 a layout version, and
    /// the upper sixteen bits are specific to the descriptor kind. Unknown bits are retained.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ContextDescriptorFlags: u32 {
        /// The context is uniqued, descriptor identity can be compared by address
        const UNIQUE = 0x40;
        /// The context has generic parameters
        const GENERIC = 0x80;
        /// Class only: the superclass layout may vary across independently compiled units
        const HAS_RESILIENT_SUPERCLASS = 1 << (16 + 13);
        /// Class only: immediate members such as generic arguments sit before the address point
        const IMMEDIATE_MEMBERS_NEGATIVE = 1 << (16 + 12);
    }
}

impl ContextDescriptorFlags {
    /// The descriptor kind stored in the low bits
    #[must_use]
    pub fn kind(self) -> ContextDescriptorKind {
        ContextDescriptorKind::from_raw((self.bits() & KIND_MASK) as u8)
    }

    /// The layout version byte
    #[must_use]
    pub fn version(self) -> u8 {
        ((self.bits() >> VERSION_SHIFT) & 0xFF) as u8
    }

    /// The kind-specific upper half of the flags
    #[must_use]
    pub fn kind_specific(self) -> u16 {
        (self.bits() >> 16) as u16
    }
}

/// The kind of a context descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ContextDescriptorKind {
    /// A module
    Module,
    /// An extension
    Extension,
    /// An anonymous context
    Anonymous,
    /// A protocol
    Protocol,
    /// An opaque result type
    OpaqueType,
    /// A class
    Class,
    /// A struct
    Struct,
    /// An enum
    Enum,
    /// A value reserved for future kinds
    Unknown,
}

impl ContextDescriptorKind {
    /// Decode the five kind bits of a descriptor's flags
    #[must_use]
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => ContextDescriptorKind::Module,
            1 => ContextDescriptorKind::Extension,
            2 => ContextDescriptorKind::Anonymous,
            3 => ContextDescriptorKind::Protocol,
            4 => ContextDescriptorKind::OpaqueType,
            16 => ContextDescriptorKind::Class,
            17 => ContextDescriptorKind::Struct,
            18 => ContextDescriptorKind::Enum,
            _ => ContextDescriptorKind::Unknown,
        }
    }

    /// The raw five-bit encoding, `None` for [`ContextDescriptorKind::Unknown`]
    #[must_use]
    pub fn to_raw(self) -> Option<u8> {
        match self {
            ContextDescriptorKind::Module => Some(0),
            ContextDescriptorKind::Extension => Some(1),
            ContextDescriptorKind::Anonymous => Some(2),
            ContextDescriptorKind::Protocol => Some(3),
            ContextDescriptorKind::OpaqueType => Some(4),
            ContextDescriptorKind::Class => Some(16),
            ContextDescriptorKind::Struct => Some(17),
            ContextDescriptorKind::Enum => Some(18),
            ContextDescriptorKind::Unknown => None,
        }
    }
}

/// Header describing the generic signature of a generic type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericContextHeader {
    /// Target of the instantiation cache pointer, if any
    pub instantiation_cache: Option<usize>,
    /// Target of the default instantiation pattern pointer, if any
    pub default_instantiation_pattern: Option<usize>,
    /// Number of generic parameters
    pub num_params: u16,
    /// Number of generic requirements
    pub num_requirements: u16,
    /// Number of key arguments stored in instantiated metadata
    pub num_key_arguments: u16,
    /// Header flags
    pub flags: u16,
}

/// A view over a type context descriptor.
///
/// # Examples
///
/// ```rust
/// use metascope::metadata::builder::{ImageBuilder, StructBuilder};
/// use metascope::metadata::descriptor::ContextDescriptorKind;
/// use metascope::{Image, LayoutConfig};
///
/// let mut builder = ImageBuilder::new(LayoutConfig::lp64());
/// let pair = StructBuilder::new("Pair")
///     .generic_parameters(2)
///     .build_descriptor(&mut builder)?;
///
/// let image = Image::from_mem(builder.finish(), LayoutConfig::lp64())?;
/// let descriptor = image.descriptor(pair)?;
/// assert_eq!(descriptor.kind(), ContextDescriptorKind::Struct);
/// assert_eq!(descriptor.name()?, "Pair");
/// assert_eq!(descriptor.generic_parameter_count()?, 2);
/// # Ok::<(), metascope::Error>(())
/// ```
#[derive(Clone, Copy)]
pub struct TypeContextDescriptor<'a> {
    view: ImageView<'a>,
    offset: usize,
    flags: ContextDescriptorFlags,
}

impl<'a> TypeContextDescriptor<'a> {
    /// Open the descriptor at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the flags word does not fit in the image.
    pub fn new(view: ImageView<'a>, offset: usize) -> Result<Self> {
        let flags = view.read::<u32>(offset + DESCRIPTOR_FLAGS)?;
        Ok(TypeContextDescriptor {
            view,
            offset,
            flags: ContextDescriptorFlags::from_bits_retain(flags),
        })
    }

    /// Image offset of the descriptor
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The image the descriptor lives in
    #[must_use]
    pub fn view(&self) -> ImageView<'a> {
        self.view
    }

    /// The raw flags word
    #[must_use]
    pub fn flags(&self) -> ContextDescriptorFlags {
        self.flags
    }

    /// The descriptor kind
    #[must_use]
    pub fn kind(&self) -> ContextDescriptorKind {
        self.flags.kind()
    }

    /// Whether the type has generic parameters
    #[must_use]
    pub fn is_generic(&self) -> bool {
        self.flags.contains(ContextDescriptorFlags::GENERIC)
    }

    /// Whether this is a class whose superclass layout is resilient.
    ///
    /// Always `false` for value types, which have no superclass.
    #[must_use]
    pub fn has_resilient_superclass(&self) -> bool {
        self.kind() == ContextDescriptorKind::Class
            && self
                .flags
                .contains(ContextDescriptorFlags::HAS_RESILIENT_SUPERCLASS)
    }

    /// Whether this is a class whose immediate members are addressed below the metadata.
    #[must_use]
    pub fn are_immediate_members_negative(&self) -> bool {
        self.kind() == ContextDescriptorKind::Class
            && self
                .flags
                .contains(ContextDescriptorFlags::IMMEDIATE_MEMBERS_NEGATIVE)
    }

    /// Offset of the parent context, if any
    ///
    /// # Errors
    /// Returns an error if the pointer cannot be read.
    pub fn parent(&self) -> Result<Option<usize>> {
        self.view.read_relative(self.offset + DESCRIPTOR_PARENT)
    }

    /// The declared name of the type
    ///
    /// # Errors
    /// Returns an error if the name pointer is null or the string is malformed.
    pub fn name(&self) -> Result<&'a str> {
        match self.view.read_relative(self.offset + DESCRIPTOR_NAME)? {
            Some(target) => self.view.c_str(target),
            None => Err(malformed_error!(
                "Context descriptor at {} has no name",
                self.offset
            )),
        }
    }

    /// Offset of the metadata access function, if any
    ///
    /// # Errors
    /// Returns an error if the pointer cannot be read.
    pub fn access_function(&self) -> Result<Option<usize>> {
        self.view
            .read_relative(self.offset + DESCRIPTOR_ACCESS_FUNCTION)
    }

    /// The field descriptor of the type, `None` when it declares no stored fields
    ///
    /// # Errors
    /// Returns an error if the pointer or the field descriptor header cannot be read.
    pub fn field_descriptor(&self) -> Result<Option<FieldDescriptor<'a>>> {
        match self.view.read_relative(self.offset + DESCRIPTOR_FIELDS)? {
            Some(target) => FieldDescriptor::new(self.view, target).map(Some),
            None => Ok(None),
        }
    }

    /// Struct descriptors: number of stored fields
    ///
    /// # Errors
    /// Returns an error if the word cannot be read.
    pub fn num_fields(&self) -> Result<u32> {
        self.view.read::<u32>(self.offset + DESCRIPTOR_KIND_WORD_0)
    }

    /// Struct descriptors: position of the field offset table in the metadata, in words
    ///
    /// # Errors
    /// Returns an error if the word cannot be read.
    pub fn field_offset_vector_offset(&self) -> Result<u32> {
        self.view.read::<u32>(self.offset + DESCRIPTOR_KIND_WORD_1)
    }

    /// Enum descriptors: number of cases carrying a payload
    ///
    /// # Errors
    /// Returns an error if the word cannot be read.
    pub fn num_payload_cases(&self) -> Result<u32> {
        Ok(self.view.read::<u32>(self.offset + DESCRIPTOR_KIND_WORD_0)? & PAYLOAD_CASES_MASK)
    }

    /// Enum descriptors: offset of the payload size in the metadata, in words
    ///
    /// # Errors
    /// Returns an error if the word cannot be read.
    pub fn payload_size_offset(&self) -> Result<u32> {
        Ok(self.view.read::<u32>(self.offset + DESCRIPTOR_KIND_WORD_0)? >> PAYLOAD_SIZE_OFFSET_SHIFT)
    }

    /// Enum descriptors: number of cases without a payload
    ///
    /// # Errors
    /// Returns an error if the word cannot be read.
    pub fn num_empty_cases(&self) -> Result<u32> {
        self.view.read::<u32>(self.offset + DESCRIPTOR_KIND_WORD_1)
    }

    /// Class descriptors: the mangled superclass type, `None` for root classes
    ///
    /// # Errors
    /// Returns an error if the pointer or the string cannot be read.
    pub fn superclass_type(&self) -> Result<Option<&'a str>> {
        match self.view.read_relative(self.offset + CLASS_DESCRIPTOR_SUPERCLASS)? {
            Some(target) => self.view.c_str(target).map(Some),
            None => Ok(None),
        }
    }

    /// Class descriptors: size of the metadata below the address point, in words
    ///
    /// # Errors
    /// Returns an error if the word cannot be read.
    pub fn metadata_negative_size(&self) -> Result<u32> {
        self.view.read::<u32>(self.offset + CLASS_DESCRIPTOR_NEGATIVE_SIZE)
    }

    /// Class descriptors: size of the metadata from the address point, in words
    ///
    /// # Errors
    /// Returns an error if the word cannot be read.
    pub fn metadata_positive_size(&self) -> Result<u32> {
        self.view.read::<u32>(self.offset + CLASS_DESCRIPTOR_POSITIVE_SIZE)
    }

    /// Class descriptors: number of members the class adds to its superclass's metadata
    ///
    /// # Errors
    /// Returns an error if the word cannot be read.
    pub fn num_immediate_members(&self) -> Result<u32> {
        self.view.read::<u32>(self.offset + CLASS_DESCRIPTOR_IMMEDIATE_MEMBERS)
    }

    /// Class descriptors: number of stored fields declared by the class itself
    ///
    /// # Errors
    /// Returns an error if the word cannot be read.
    pub fn class_num_fields(&self) -> Result<u32> {
        self.view.read::<u32>(self.offset + CLASS_DESCRIPTOR_NUM_FIELDS)
    }

    /// Class descriptors: position of the field offset vector in the metadata, in words
    ///
    /// # Errors
    /// Returns an error if the word cannot be read.
    pub fn class_field_offset_vector_offset(&self) -> Result<u32> {
        self.view
            .read::<u32>(self.offset + CLASS_DESCRIPTOR_FIELD_OFFSET_VECTOR)
    }

    /// The generic context header, present only on generic descriptors
    ///
    /// # Errors
    /// Returns an error if the header cannot be read.
    pub fn generic_header(&self) -> Result<Option<GenericContextHeader>> {
        if !self.is_generic() {
            return Ok(None);
        }

        let base = match self.kind() {
            ContextDescriptorKind::Class => self.offset + CLASS_DESCRIPTOR_GENERIC_HEADER,
            _ => self.offset + DESCRIPTOR_GENERIC_HEADER,
        };
        let mut parser = self.view.parser_at(base)?;
        let instantiation_cache = parser.read_relative()?;
        let default_instantiation_pattern = parser.read_relative()?;

        Ok(Some(GenericContextHeader {
            instantiation_cache,
            default_instantiation_pattern,
            num_params: parser.read_le::<u16>()?,
            num_requirements: parser.read_le::<u16>()?,
            num_key_arguments: parser.read_le::<u16>()?,
            flags: parser.read_le::<u16>()?,
        }))
    }

    /// Number of declared generic parameters, `0` for non-generic types
    ///
    /// # Errors
    /// Returns an error if the generic header cannot be read.
    pub fn generic_parameter_count(&self) -> Result<usize> {
        Ok(self
            .generic_header()?
            .map_or(0, |header| usize::from(header.num_params)))
    }
}

impl PartialEq for TypeContextDescriptor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.view.same_image(&other.view)
    }
}

impl Eq for TypeContextDescriptor<'_> {}

impl fmt::Debug for TypeContextDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeContextDescriptor")
            .field("offset", &self.offset)
            .field("kind", &self.kind())
            .field("name", &self.name().unwrap_or("<malformed>"))
            .finish()
    }
}
