//! Metadata kind tags.
//!
//! The first word of every type metadata record is its kind. The set of kinds is closed and
//! defined by the runtime that emitted the image; values above `0x7FF` are not kinds at all
//! but class `isa` pointers, which is why they decode to [`MetadataKind::Class`].

use strum::{Display, EnumIter, IntoStaticStr};

/// Bit set on kinds whose instances are not heap objects
pub const KIND_IS_NON_HEAP: u64 = 0x200;
/// Bit set on kinds that are private to the runtime
pub const KIND_IS_RUNTIME_PRIVATE: u64 = 0x100;
/// Bit set on kinds that do not describe a type
pub const KIND_IS_NON_TYPE: u64 = 0x400;
/// Largest value that is an enumerated kind rather than an `isa` pointer
pub const LAST_ENUMERATED_KIND: u64 = 0x7FF;

/// The kind of a type metadata record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
pub enum MetadataKind {
    /// A class; also every value outside the enumerated range
    #[strum(to_string = "class")]
    Class,
    /// A struct
    #[strum(to_string = "struct")]
    Struct,
    /// An enum
    #[strum(to_string = "enum")]
    Enum,
    /// An optional, laid out like an enum
    #[strum(to_string = "optional")]
    Optional,
    /// A foreign class
    #[strum(to_string = "foreign class")]
    ForeignClass,
    /// An opaque builtin type
    #[strum(to_string = "opaque")]
    Opaque,
    /// A tuple
    #[strum(to_string = "tuple")]
    Tuple,
    /// A function type
    #[strum(to_string = "function")]
    Function,
    /// An existential container
    #[strum(to_string = "existential")]
    Existential,
    /// A metatype
    #[strum(to_string = "metatype")]
    Metatype,
    /// An Objective-C class wrapper
    #[strum(to_string = "objc class wrapper")]
    ObjCClassWrapper,
    /// An existential metatype
    #[strum(to_string = "existential metatype")]
    ExistentialMetatype,
    /// A heap-allocated local variable box
    #[strum(to_string = "heap local variable")]
    HeapLocalVariable,
    /// A heap-allocated local variable box of generic type
    #[strum(to_string = "heap generic local variable")]
    HeapGenericLocalVariable,
    /// A boxed error
    #[strum(to_string = "error object")]
    ErrorObject,
    /// An asynchronous task
    #[strum(to_string = "task")]
    Task,
    /// An executor job
    #[strum(to_string = "job")]
    Job,
    /// A value in the enumerated range that names no known kind
    #[strum(to_string = "unknown")]
    Unknown,
}

impl MetadataKind {
    /// Decode a raw kind word.
    ///
    /// Both the current encoding (flag bits combined with a small discriminator) and the
    /// legacy sequential numbering are recognised.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        const NON_HEAP: u64 = KIND_IS_NON_HEAP;
        const PRIVATE_NON_HEAP: u64 = KIND_IS_RUNTIME_PRIVATE | KIND_IS_NON_HEAP;
        const NON_TYPE: u64 = KIND_IS_NON_TYPE;
        const PRIVATE_NON_TYPE: u64 = KIND_IS_NON_TYPE | KIND_IS_RUNTIME_PRIVATE;

        match raw {
            0 => MetadataKind::Class,
            raw if raw > LAST_ENUMERATED_KIND => MetadataKind::Class,

            NON_HEAP | 1 => MetadataKind::Struct,
            0x201 | 2 => MetadataKind::Enum,
            0x202 | 3 => MetadataKind::Optional,
            0x203 | 16 => MetadataKind::ForeignClass,

            PRIVATE_NON_HEAP | 8 => MetadataKind::Opaque,
            0x301 | 9 => MetadataKind::Tuple,
            0x302 | 10 => MetadataKind::Function,
            0x303 | 12 => MetadataKind::Existential,
            0x304 | 13 => MetadataKind::Metatype,
            0x305 | 14 => MetadataKind::ObjCClassWrapper,
            0x306 | 15 => MetadataKind::ExistentialMetatype,

            NON_TYPE | 64 => MetadataKind::HeapLocalVariable,
            PRIVATE_NON_TYPE | 65 => MetadataKind::HeapGenericLocalVariable,
            0x501 | 128 => MetadataKind::ErrorObject,
            0x502 => MetadataKind::Task,
            0x503 => MetadataKind::Job,

            _ => MetadataKind::Unknown,
        }
    }

    /// The current raw encoding of this kind.
    ///
    /// `Class` encodes as `0` and `Unknown` has no encoding.
    #[must_use]
    pub fn to_raw(self) -> Option<u64> {
        let raw = match self {
            MetadataKind::Class => 0,
            MetadataKind::Struct => KIND_IS_NON_HEAP,
            MetadataKind::Enum => 0x201,
            MetadataKind::Optional => 0x202,
            MetadataKind::ForeignClass => 0x203,
            MetadataKind::Opaque => 0x300,
            MetadataKind::Tuple => 0x301,
            MetadataKind::Function => 0x302,
            MetadataKind::Existential => 0x303,
            MetadataKind::Metatype => 0x304,
            MetadataKind::ObjCClassWrapper => 0x305,
            MetadataKind::ExistentialMetatype => 0x306,
            MetadataKind::HeapLocalVariable => 0x400,
            MetadataKind::HeapGenericLocalVariable => 0x500,
            MetadataKind::ErrorObject => 0x501,
            MetadataKind::Task => 0x502,
            MetadataKind::Job => 0x503,
            MetadataKind::Unknown => return None,
        };
        Some(raw)
    }

    /// Returns `true` for kinds whose metadata starts with a nominal type descriptor
    #[must_use]
    pub fn is_nominal(self) -> bool {
        matches!(
            self,
            MetadataKind::Struct | MetadataKind::Enum | MetadataKind::Optional
        )
    }
}
