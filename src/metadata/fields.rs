//! Field descriptors and field records.
//!
//! Every nominal type that declares stored properties (or enum cases) carries a field
//! descriptor: a small header followed by one fixed-stride record per declared field, in
//! declaration order. A record holds the field's name and its encoded type reference; the byte
//! offset of the field lives separately, in the instantiated metadata's field offset table.
//!
//! # Layout
//!
//! | Offset | Size | Content |
//! |--------|------|---------|
//! | 0  | 4 | relative pointer to the owner's mangled type name |
//! | 4  | 4 | relative pointer to the superclass mangled name |
//! | 8  | 2 | [`FieldDescriptorKind`] |
//! | 10 | 2 | record stride in bytes |
//! | 12 | 4 | record count |
//! | 16 | stride · count | [`FieldRecord`]s |
//!
//! Decoding is purely structural. Anything beyond bounds and pointer sanity is the emitter's
//! responsibility.

use bitflags::bitflags;
use strum::Display;

use crate::{
    file::ImageView,
    metadata::typeref::EncodedTypeReference,
    Result,
};

/// Size of the field descriptor header
pub const FIELD_DESCRIPTOR_HEADER_SIZE: usize = 16;
/// Size of one field record
pub const FIELD_RECORD_SIZE: usize = 12;

const MANGLED_TYPE_NAME: usize = 0;
const SUPERCLASS: usize = 4;
const KIND: usize = 8;

const RECORD_FLAGS: usize = 0;
const RECORD_TYPE_NAME: usize = 4;
const RECORD_FIELD_NAME: usize = 8;

/// The kind of type a field descriptor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum FieldDescriptorKind {
    /// A struct
    Struct,
    /// A class
    Class,
    /// An enum with at most one payload case
    Enum,
    /// An enum with several payload cases
    MultiPayloadEnum,
    /// A protocol
    Protocol,
    /// A class-bound protocol
    ClassProtocol,
    /// An Objective-C protocol
    ObjCProtocol,
    /// An Objective-C class
    ObjCClass,
    /// A value this reader does not know
    Unknown(u16),
}

impl FieldDescriptorKind {
    /// Decode the raw kind half-word
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => FieldDescriptorKind::Struct,
            1 => FieldDescriptorKind::Class,
            2 => FieldDescriptorKind::Enum,
            3 => FieldDescriptorKind::MultiPayloadEnum,
            4 => FieldDescriptorKind::Protocol,
            5 => FieldDescriptorKind::ClassProtocol,
            6 => FieldDescriptorKind::ObjCProtocol,
            7 => FieldDescriptorKind::ObjCClass,
            other => FieldDescriptorKind::Unknown(other),
        }
    }

    /// The raw kind half-word
    #[must_use]
    pub fn to_raw(self) -> u16 {
        match self {
            FieldDescriptorKind::Struct => 0,
            FieldDescriptorKind::Class => 1,
            FieldDescriptorKind::Enum => 2,
            FieldDescriptorKind::MultiPayloadEnum => 3,
            FieldDescriptorKind::Protocol => 4,
            FieldDescriptorKind::ClassProtocol => 5,
            FieldDescriptorKind::ObjCProtocol => 6,
            FieldDescriptorKind::ObjCClass => 7,
            FieldDescriptorKind::Unknown(raw) => raw,
        }
    }

    /// Returns `true` for enum descriptors
    #[must_use]
    pub fn is_enum(self) -> bool {
        matches!(
            self,
            FieldDescriptorKind::Enum | FieldDescriptorKind::MultiPayloadEnum
        )
    }
}

bitflags! {
    /// Flags of a single field record
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldRecordFlags: u32 {
        /// Enum case whose payload is stored out of line
        const INDIRECT_CASE = 0x1;
        /// Mutable stored property
        const VAR = 0x2;
        /// Compiler-synthesized field
        const ARTIFICIAL = 0x4;
    }
}

/// A decoded field descriptor header
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor<'a> {
    view: ImageView<'a>,
    offset: usize,
    kind: FieldDescriptorKind,
    record_size: usize,
    num_fields: u32,
}

impl<'a> FieldDescriptor<'a> {
    /// Decode the header of the field descriptor at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the header does not fit, or
    /// [`crate::Error::Malformed`] if the record stride is smaller than a record.
    pub fn new(view: ImageView<'a>, offset: usize) -> Result<Self> {
        let mut parser = view.parser_at(offset)?;
        parser.advance_by(KIND)?;
        let kind = FieldDescriptorKind::from_raw(parser.read_le::<u16>()?);
        let record_size = usize::from(parser.read_le::<u16>()?);
        let num_fields = parser.read_le::<u32>()?;

        if num_fields > 0 && record_size < FIELD_RECORD_SIZE {
            return Err(malformed_error!(
                "Field descriptor at {} has record stride {}",
                offset,
                record_size
            ));
        }

        Ok(FieldDescriptor {
            view,
            offset,
            kind,
            record_size,
            num_fields,
        })
    }

    /// Image offset of the descriptor
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Kind of the owning type
    #[must_use]
    pub fn kind(&self) -> FieldDescriptorKind {
        self.kind
    }

    /// Stride between consecutive records
    #[must_use]
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Number of records
    #[must_use]
    pub fn num_fields(&self) -> u32 {
        self.num_fields
    }

    /// Mangled name of the owning type, if present
    ///
    /// # Errors
    /// Returns an error if the pointer or the reference cannot be read.
    pub fn mangled_type_name(&self) -> Result<Option<EncodedTypeReference<'a>>> {
        self.reference_at(self.offset + MANGLED_TYPE_NAME)
    }

    /// Mangled name of the superclass, if present
    ///
    /// # Errors
    /// Returns an error if the pointer or the reference cannot be read.
    pub fn superclass(&self) -> Result<Option<EncodedTypeReference<'a>>> {
        self.reference_at(self.offset + SUPERCLASS)
    }

    /// Iterate the records in declaration order
    #[must_use]
    pub fn records(&self) -> FieldRecords<'a> {
        FieldRecords {
            descriptor: *self,
            index: 0,
            failed: false,
        }
    }

    fn reference_at(&self, position: usize) -> Result<Option<EncodedTypeReference<'a>>> {
        match self.view.read_relative(position)? {
            Some(target) => EncodedTypeReference::new(self.view, target).map(Some),
            None => Ok(None),
        }
    }
}

/// Forward iterator over the records of a [`FieldDescriptor`].
///
/// Yields exactly [`FieldDescriptor::num_fields`] items unless a record cannot be read, in
/// which case the error is yielded once and iteration ends.
pub struct FieldRecords<'a> {
    descriptor: FieldDescriptor<'a>,
    index: u32,
    failed: bool,
}

impl<'a> Iterator for FieldRecords<'a> {
    type Item = Result<FieldRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.index >= self.descriptor.num_fields {
            return None;
        }

        let position = (self.index as usize)
            .checked_mul(self.descriptor.record_size)
            .and_then(|relative| relative.checked_add(FIELD_DESCRIPTOR_HEADER_SIZE))
            .and_then(|relative| relative.checked_add(self.descriptor.offset));
        self.index += 1;

        let record = match position {
            Some(position) => FieldRecord::new(self.descriptor.view, position),
            None => Err(out_of_bounds_error!()),
        };
        if record.is_err() {
            self.failed = true;
        }
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = (self.descriptor.num_fields - self.index) as usize;
        (0, Some(remaining))
    }
}

/// One declared field of a type
#[derive(Debug, Clone, Copy)]
pub struct FieldRecord<'a> {
    view: ImageView<'a>,
    offset: usize,
    flags: FieldRecordFlags,
}

impl<'a> FieldRecord<'a> {
    /// Decode the record at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the record does not fit in the image.
    pub fn new(view: ImageView<'a>, offset: usize) -> Result<Self> {
        let flags = view.read::<u32>(offset + RECORD_FLAGS)?;
        // The whole record must be present, not just its flags.
        view.read::<u32>(offset + RECORD_FIELD_NAME)?;

        Ok(FieldRecord {
            view,
            offset,
            flags: FieldRecordFlags::from_bits_retain(flags),
        })
    }

    /// Image offset of the record
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Record flags
    #[must_use]
    pub fn flags(&self) -> FieldRecordFlags {
        self.flags
    }

    /// `true` for mutable stored properties
    #[must_use]
    pub fn is_var(&self) -> bool {
        self.flags.contains(FieldRecordFlags::VAR)
    }

    /// `true` for indirect enum cases
    #[must_use]
    pub fn is_indirect_case(&self) -> bool {
        self.flags.contains(FieldRecordFlags::INDIRECT_CASE)
    }

    /// `true` for compiler-synthesized fields
    #[must_use]
    pub fn is_artificial(&self) -> bool {
        self.flags.contains(FieldRecordFlags::ARTIFICIAL)
    }

    /// Declared name of the field
    ///
    /// # Errors
    /// Returns an error if the name pointer is null or the string is malformed.
    pub fn name(&self) -> Result<&'a str> {
        match self.view.read_relative(self.offset + RECORD_FIELD_NAME)? {
            Some(target) => self.view.c_str(target),
            None => Err(malformed_error!(
                "Field record at {} has no name",
                self.offset
            )),
        }
    }

    /// The encoded type reference of the field; `None` for enum cases without payload
    ///
    /// # Errors
    /// Returns an error if the pointer or the reference cannot be read.
    pub fn type_reference(&self) -> Result<Option<EncodedTypeReference<'a>>> {
        match self.view.read_relative(self.offset + RECORD_TYPE_NAME)? {
            Some(target) => EncodedTypeReference::new(self.view, target).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{file::config::LayoutConfig, Error};

    #[rustfmt::skip]
    fn two_fields() -> Vec<u8> {
        vec![
            /* 0  */ 0x00, 0x00, 0x00, 0x00,
            /* 4  */ b'x', 0x00, b'y', 0x00,
            /* 8  */ b'S', b'i', 0x00, 0x00,
            // descriptor
            /* 12 */ 0x00, 0x00, 0x00, 0x00, // no mangled name
            /* 16 */ 0x00, 0x00, 0x00, 0x00, // no superclass
            /* 20 */ 0x00, 0x00,             // struct
            /* 22 */ 0x0C, 0x00,             // stride 12
            /* 24 */ 0x02, 0x00, 0x00, 0x00, // two records
            // record 0: let x: Si
            /* 28 */ 0x00, 0x00, 0x00, 0x00,
            /* 32 */ 0xE8, 0xFF, 0xFF, 0xFF, // -> 8
            /* 36 */ 0xE0, 0xFF, 0xFF, 0xFF, // -> 4
            // record 1: var y, no type
            /* 40 */ 0x02, 0x00, 0x00, 0x00,
            /* 44 */ 0x00, 0x00, 0x00, 0x00,
            /* 48 */ 0xD6, 0xFF, 0xFF, 0xFF, // -> 6
        ]
    }

    #[test]
    fn records_in_order() {
        let data = two_fields();
        let view = ImageView::new(&data, LayoutConfig::lp64());

        let descriptor = FieldDescriptor::new(view, 12).unwrap();
        assert_eq!(descriptor.kind(), FieldDescriptorKind::Struct);
        assert_eq!(descriptor.record_size(), FIELD_RECORD_SIZE);
        assert_eq!(descriptor.num_fields(), 2);
        assert!(descriptor.mangled_type_name().unwrap().is_none());
        assert!(descriptor.superclass().unwrap().is_none());

        let records: Vec<_> = descriptor.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].name().unwrap(), "x");
        assert!(!records[0].is_var());
        let reference = records[0].type_reference().unwrap().unwrap();
        assert_eq!(reference.bytes(), b"Si");

        assert_eq!(records[1].name().unwrap(), "y");
        assert!(records[1].is_var());
        assert!(!records[1].is_indirect_case());
        assert!(!records[1].is_artificial());
        assert!(records[1].type_reference().unwrap().is_none());
    }

    #[test]
    fn truncated_records() {
        let mut data = two_fields();
        data.truncate(46);
        let view = ImageView::new(&data, LayoutConfig::lp64());

        let descriptor = FieldDescriptor::new(view, 12).unwrap();
        let mut records = descriptor.records();
        assert!(records.next().unwrap().is_ok());
        assert!(matches!(
            records.next().unwrap(),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(records.next().is_none());
    }

    #[test]
    fn bad_stride() {
        let mut data = two_fields();
        data[22] = 0x04;
        let view = ImageView::new(&data, LayoutConfig::lp64());
        assert!(matches!(
            FieldDescriptor::new(view, 12),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn kinds() {
        for raw in 0..8 {
            assert_eq!(FieldDescriptorKind::from_raw(raw).to_raw(), raw);
        }
        assert_eq!(FieldDescriptorKind::from_raw(42), FieldDescriptorKind::Unknown(42));
        assert!(FieldDescriptorKind::MultiPayloadEnum.is_enum());
        assert!(!FieldDescriptorKind::Struct.is_enum());
    }
}
