//! Class metadata.
//!
//! Class records extend the common header with a superclass pointer, words reserved for the
//! runtime and the instance layout. Only native classes carry a context descriptor: a class
//! whose rodata word lacks the native bit belongs to a foreign object model and ends any
//! superclass walk.
//!
//! # Layout
//!
//! `W` is the image's pointer width, `M` the metadata offset and `L = M + 5W`.
//!
//! | Offset | Size | Content |
//! |--------|------|---------|
//! | `M` | W | kind, or an `isa` pointer |
//! | `M + W` | W | superclass metadata, null for a root class |
//! | `M + 2W` | 2W | reserved for the runtime |
//! | `M + 4W` | W | rodata, bit 0 set for native classes |
//! | `L` | 4 | class flags |
//! | `L + 4` | 4 | instance address point |
//! | `L + 8` | 4 | instance size |
//! | `L + 12` | 2 | instance alignment mask |
//! | `L + 16` | 4 | class object size |
//! | `L + 20` | 4 | class object address point |
//! | `L + 24` | W | pointer to the class [`TypeContextDescriptor`] |
//! | `L + 24 + W` | W | instance variable destroyer |
//! | `M + k·W` | W each | generic arguments, then field offsets, `k` from the descriptor |

use std::collections::HashSet;

use crate::{
    metadata::{
        descriptor::{ContextDescriptorKind, TypeContextDescriptor},
        kind::MetadataKind,
        view::{GenericArguments, TypeMetadata},
    },
    Error, Result,
};

/// Word index of the superclass pointer
pub const CLASS_SUPERCLASS_WORD: usize = 1;
/// Word index of the rodata word
pub const CLASS_RODATA_WORD: usize = 4;
/// Word index where the 32-bit instance layout fields start
pub const CLASS_LAYOUT_WORD: usize = 5;
/// Bytes of instance layout fields before the descriptor pointer
pub const CLASS_LAYOUT_SIZE: usize = 24;
/// Rodata bit marking a native class
pub const CLASS_IS_NATIVE_MASK: u64 = 1;

const INSTANCE_SIZE: usize = 8;
const INSTANCE_ALIGNMENT_MASK: usize = 12;

/// Word index of the first immediate member for a pointer width of `word_size` bytes
#[must_use]
pub const fn class_members_word(word_size: usize) -> usize {
    CLASS_LAYOUT_WORD + CLASS_LAYOUT_SIZE / word_size + 2
}

/// Class metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassMetadata<'a> {
    metadata: TypeMetadata<'a>,
}

impl<'a> ClassMetadata<'a> {
    pub(crate) fn new(metadata: TypeMetadata<'a>) -> Self {
        ClassMetadata { metadata }
    }

    /// The underlying record
    #[must_use]
    pub fn metadata(&self) -> TypeMetadata<'a> {
        self.metadata
    }

    /// Whether the class belongs to the native object model
    ///
    /// # Errors
    /// Returns an error if the rodata word cannot be read.
    pub fn is_native(&self) -> Result<bool> {
        let view = self.metadata.view();
        let rodata = view.read_word(self.metadata.word(CLASS_RODATA_WORD)?)?;
        Ok(rodata & CLASS_IS_NATIVE_MASK != 0)
    }

    /// Instance size in bytes
    ///
    /// # Errors
    /// Returns an error if the layout fields cannot be read.
    pub fn instance_size(&self) -> Result<u32> {
        self.metadata.view().read::<u32>(self.layout_field(INSTANCE_SIZE)?)
    }

    /// Instance alignment in bytes
    ///
    /// # Errors
    /// Returns an error if the layout fields cannot be read.
    pub fn instance_alignment(&self) -> Result<u32> {
        let mask = self
            .metadata
            .view()
            .read::<u16>(self.layout_field(INSTANCE_ALIGNMENT_MASK)?)?;
        Ok(u32::from(mask) + 1)
    }

    /// The direct superclass, `None` for root classes
    ///
    /// # Errors
    /// Returns [`crate::Error::KindMismatch`] if the superclass pointer does not lead to class
    /// metadata, or an error if the pointer cannot be read.
    pub fn superclass(&self) -> Result<Option<ClassMetadata<'a>>> {
        let view = self.metadata.view();
        let Some(superclass) = view.read_pointer(self.metadata.word(CLASS_SUPERCLASS_WORD)?)? else {
            return Ok(None);
        };

        let superclass = view.metadata(superclass)?;
        match superclass.kind() {
            MetadataKind::Class => Ok(Some(ClassMetadata::new(superclass))),
            found => Err(Error::KindMismatch {
                expected: MetadataKind::Class,
                found,
            }),
        }
    }

    /// The native ancestors of the class, nearest first.
    ///
    /// The walk stops at a root class or at the first foreign ancestor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the chain loops, or an error if a superclass
    /// cannot be read.
    pub fn superclasses(&self) -> Result<Vec<ClassMetadata<'a>>> {
        let mut seen = HashSet::from([self.metadata.offset()]);
        let mut chain = Vec::new();
        let mut current = self.superclass()?;

        while let Some(class) = current {
            if !class.is_native()? {
                log::trace!("superclass walk stops at foreign class {}", class.metadata.offset());
                break;
            }
            if !seen.insert(class.metadata.offset()) {
                return Err(malformed_error!(
                    "Superclass chain of {} loops at {}",
                    self.metadata.offset(),
                    class.metadata.offset()
                ));
            }
            chain.push(class);
            current = class.superclass()?;
        }

        Ok(chain)
    }

    /// The class's context descriptor
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for foreign classes, and
    /// [`crate::Error::Malformed`] if the descriptor is missing or is not a class descriptor.
    pub fn descriptor(&self) -> Result<TypeContextDescriptor<'a>> {
        if !self.is_native()? {
            return Err(Error::NotSupported);
        }

        let view = self.metadata.view();
        let slot = self.layout_field(CLASS_LAYOUT_SIZE)?;
        let Some(descriptor) = view.read_pointer(slot)? else {
            return Err(malformed_error!(
                "Class metadata at {} has no descriptor",
                self.metadata.offset()
            ));
        };

        let descriptor = view.descriptor(descriptor)?;
        if descriptor.kind() != ContextDescriptorKind::Class {
            return Err(malformed_error!(
                "Class metadata at {} points at a {} descriptor",
                self.metadata.offset(),
                descriptor.kind()
            ));
        }
        Ok(descriptor)
    }

    /// Whether the superclass layout is resilient, in which case member positions are only
    /// known to the runtime
    ///
    /// # Errors
    /// Returns an error if the descriptor cannot be read.
    pub fn has_resilient_superclass(&self) -> Result<bool> {
        Ok(self.descriptor()?.has_resilient_superclass())
    }

    /// The generic arguments of this instantiation
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for classes with a resilient superclass, or an
    /// error if the descriptor cannot be read.
    pub fn generic_arguments(&self) -> Result<GenericArguments<'a>> {
        let descriptor = self.descriptor()?;
        let count = descriptor.generic_parameter_count()?;
        if count == 0 {
            return Ok(GenericArguments::new(
                self.metadata.view(),
                self.metadata.offset(),
                0,
            ));
        }

        let offset = self.immediate_member(&descriptor, 0)?;
        Ok(GenericArguments::new(self.metadata.view(), offset, count))
    }

    /// Byte offsets of the fields the class declares itself, in declaration order
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for classes with a resilient superclass, and
    /// [`crate::Error::Malformed`] if the declared count does not fit in the image.
    pub fn field_offsets(&self) -> Result<Vec<u64>> {
        let descriptor = self.descriptor()?;
        if descriptor.has_resilient_superclass() {
            return Err(Error::NotSupported);
        }

        let view = self.metadata.view();
        let count = descriptor.class_num_fields()? as usize;
        let vector = self
            .metadata
            .word(descriptor.class_field_offset_vector_offset()? as usize)?;
        let available = view.data().len().saturating_sub(vector);
        if count.saturating_mul(view.word_size()) > available {
            return Err(malformed_error!(
                "Class {} claims {} field offsets but only {} bytes follow",
                descriptor.name()?,
                count,
                available
            ));
        }

        let mut parser = view.parser_at(vector)?;
        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            offsets.push(parser.read_word(view.pointer_width())?);
        }
        Ok(offsets)
    }

    fn layout_field(&self, offset: usize) -> Result<usize> {
        self.metadata
            .word(CLASS_LAYOUT_WORD)?
            .checked_add(offset)
            .ok_or_else(|| out_of_bounds_error!())
    }

    /// Image offset of immediate member `index`, located the way the runtime does for
    /// classes with a fixed superclass layout
    fn immediate_member(&self, descriptor: &TypeContextDescriptor<'a>, index: usize) -> Result<usize> {
        if descriptor.has_resilient_superclass() {
            return Err(Error::NotSupported);
        }

        let word = self.metadata.view().word_size();
        if descriptor.are_immediate_members_negative() {
            let below = (descriptor.metadata_negative_size()? as usize)
                .checked_sub(index)
                .and_then(|words| words.checked_mul(word))
                .ok_or_else(|| out_of_bounds_error!())?;
            return self
                .metadata
                .offset()
                .checked_sub(below)
                .ok_or_else(|| out_of_bounds_error!());
        }

        let start = descriptor
            .metadata_positive_size()?
            .checked_sub(descriptor.num_immediate_members()?)
            .ok_or_else(|| {
                malformed_error!(
                    "Class descriptor at {} has more immediate members than metadata words",
                    descriptor.offset()
                )
            })?;
        self.metadata.word(start as usize + index)
    }
}
