//! Encoded type references.
//!
//! Field records name their type with an *encoded type reference*: a NUL-terminated byte string
//! of mangling text that may embed symbolic references to other records in the image. A
//! symbolic reference is a control byte followed by a fixed-size payload which can itself
//! contain zero bytes, so the string cannot be measured with a plain terminator scan.
//!
//! | Control byte | Payload |
//! |--------------|---------|
//! | `0x01..=0x17` | 4-byte relative pointer, relative to the payload's own position |
//! | `0x18..=0x1F` | pointer-sized absolute pointer |
//!
//! This module measures references and splits them into text and symbolic components. It never
//! interprets the mangling itself; that is the job of a
//! [`crate::resolver::GenericContextResolver`].

use std::fmt;

use crate::{file::ImageView, Result};

const RELATIVE_REFERENCE_FIRST: u8 = 0x01;
const RELATIVE_REFERENCE_LAST: u8 = 0x17;
const ABSOLUTE_REFERENCE_FIRST: u8 = 0x18;
const ABSOLUTE_REFERENCE_LAST: u8 = 0x1F;
const RELATIVE_PAYLOAD_SIZE: usize = 4;

/// What a symbolic reference points at, decoded from its control byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolicReferenceKind {
    /// `0x01`: the target is a context descriptor
    DirectContext,
    /// `0x02`: the target is a pointer-sized slot holding a context descriptor pointer
    IndirectContext,
    /// `0x09`: the target is a metadata access function
    AccessorFunction,
    /// Any other control byte; carried through undecoded
    Other(u8),
}

impl SymbolicReferenceKind {
    fn from_control(control: u8) -> Self {
        match control {
            0x01 => SymbolicReferenceKind::DirectContext,
            0x02 => SymbolicReferenceKind::IndirectContext,
            0x09 => SymbolicReferenceKind::AccessorFunction,
            other => SymbolicReferenceKind::Other(other),
        }
    }
}

/// A symbolic reference embedded in an encoded type reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolicReference {
    /// The control byte introducing the reference
    pub control: u8,
    /// Decoded kind of the reference
    pub kind: SymbolicReferenceKind,
    /// Image offset the payload points at
    pub target: usize,
    /// `true` when the payload was a pointer-sized absolute pointer
    pub absolute: bool,
}

impl SymbolicReference {
    /// Offset of the referenced context descriptor, following the indirection slot for
    /// [`SymbolicReferenceKind::IndirectContext`].
    ///
    /// Returns `None` for references that do not name a context descriptor.
    ///
    /// # Errors
    /// Returns an error if the indirection slot cannot be read or is null.
    pub fn context_descriptor(&self, view: &ImageView<'_>) -> Result<Option<usize>> {
        match self.kind {
            SymbolicReferenceKind::DirectContext => Ok(Some(self.target)),
            SymbolicReferenceKind::IndirectContext => match view.read_pointer(self.target)? {
                Some(descriptor) => Ok(Some(descriptor)),
                None => Err(malformed_error!(
                    "Indirect context reference at {} holds a null pointer",
                    self.target
                )),
            },
            _ => Ok(None),
        }
    }
}

/// One piece of an encoded type reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeReferenceComponent<'a> {
    /// A run of literal mangling text
    Text(&'a [u8]),
    /// An embedded symbolic reference
    Symbolic(SymbolicReference),
}

/// A measured encoded type reference inside an image.
///
/// # Examples
///
/// ```rust
/// use metascope::metadata::builder::{ImageBuilder, MangledPart};
/// use metascope::{Image, LayoutConfig};
/// use metascope::metadata::typeref::EncodedTypeReference;
///
/// let mut builder = ImageBuilder::new(LayoutConfig::lp64());
/// let reference = builder.mangled_name(&[MangledPart::Text("Sb")])?;
/// let image = Image::from_mem(builder.finish(), LayoutConfig::lp64())?;
///
/// let reference = EncodedTypeReference::new(image.view(), reference)?;
/// assert_eq!(reference.bytes(), b"Sb");
/// assert_eq!(reference.as_text(), Some("Sb"));
/// # Ok::<(), metascope::Error>(())
/// ```
#[derive(Clone, Copy)]
pub struct EncodedTypeReference<'a> {
    view: ImageView<'a>,
    offset: usize,
    len: usize,
}

impl<'a> EncodedTypeReference<'a> {
    /// Measure the reference starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the terminator or an embedded payload lies
    /// outside the image.
    pub fn new(view: ImageView<'a>, offset: usize) -> Result<Self> {
        let len = measure(view, offset)?;
        Ok(EncodedTypeReference { view, offset, len })
    }

    /// Image offset of the first byte
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The image the reference lives in
    #[must_use]
    pub fn view(&self) -> ImageView<'a> {
        self.view
    }

    /// Length in bytes, excluding the terminator
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for the empty reference
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The raw reference bytes, excluding the terminator
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        &self.view.data()[self.offset..self.offset + self.len]
    }

    /// Returns `true` if the reference embeds at least one symbolic reference
    #[must_use]
    pub fn is_symbolic(&self) -> bool {
        self.components()
            .any(|component| !matches!(component, Ok(TypeReferenceComponent::Text(_))))
    }

    /// The reference as a string, if it is plain UTF-8 mangling text
    #[must_use]
    pub fn as_text(&self) -> Option<&'a str> {
        if self.is_symbolic() {
            return None;
        }
        std::str::from_utf8(self.bytes()).ok()
    }

    /// Split the reference into text runs and symbolic references
    #[must_use]
    pub fn components(&self) -> TypeReferenceComponents<'a> {
        TypeReferenceComponents {
            view: self.view,
            position: self.offset,
            end: self.offset + self.len,
        }
    }

    /// The first symbolic reference, if any
    ///
    /// # Errors
    /// Returns an error if a symbolic payload cannot be decoded.
    pub fn first_symbolic(&self) -> Result<Option<SymbolicReference>> {
        for component in self.components() {
            if let TypeReferenceComponent::Symbolic(reference) = component? {
                return Ok(Some(reference));
            }
        }
        Ok(None)
    }
}

impl PartialEq for EncodedTypeReference<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.len == other.len && self.view.same_image(&other.view)
    }
}

impl Eq for EncodedTypeReference<'_> {}

impl fmt::Debug for EncodedTypeReference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedTypeReference")
            .field("offset", &self.offset)
            .field("bytes", &self.bytes().escape_ascii().to_string())
            .finish()
    }
}

/// Iterator over the components of an [`EncodedTypeReference`]
pub struct TypeReferenceComponents<'a> {
    view: ImageView<'a>,
    position: usize,
    end: usize,
}

impl<'a> TypeReferenceComponents<'a> {
    fn symbolic(&mut self, control: u8) -> Result<SymbolicReference> {
        let payload = self.position + 1;
        let mut parser = self.view.parser_at(payload)?;
        let absolute = control >= ABSOLUTE_REFERENCE_FIRST;

        let target = if absolute {
            parser.read_pointer(self.view.pointer_width())?
        } else {
            parser.read_relative()?
        };
        let Some(target) = target else {
            return Err(malformed_error!(
                "Symbolic reference {:#04x} at {} has a null target",
                control,
                self.position
            ));
        };

        self.position = parser.pos();
        Ok(SymbolicReference {
            control,
            kind: SymbolicReferenceKind::from_control(control),
            target,
            absolute,
        })
    }
}

impl<'a> Iterator for TypeReferenceComponents<'a> {
    type Item = Result<TypeReferenceComponent<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.end {
            return None;
        }

        let data = self.view.data();
        let control = data[self.position];
        if is_symbolic_control(control) {
            let result = self.symbolic(control);
            if result.is_err() {
                self.position = self.end;
            }
            return Some(result.map(TypeReferenceComponent::Symbolic));
        }

        let start = self.position;
        while self.position < self.end && !is_symbolic_control(data[self.position]) {
            self.position += 1;
        }
        Some(Ok(TypeReferenceComponent::Text(&data[start..self.position])))
    }
}

fn is_symbolic_control(byte: u8) -> bool {
    (RELATIVE_REFERENCE_FIRST..=ABSOLUTE_REFERENCE_LAST).contains(&byte)
}

fn payload_size(control: u8, view: ImageView<'_>) -> usize {
    match control {
        RELATIVE_REFERENCE_FIRST..=RELATIVE_REFERENCE_LAST => RELATIVE_PAYLOAD_SIZE,
        ABSOLUTE_REFERENCE_FIRST..=ABSOLUTE_REFERENCE_LAST => view.word_size(),
        _ => 0,
    }
}

/// Length of the reference at `offset`, skipping embedded payloads
fn measure(view: ImageView<'_>, offset: usize) -> Result<usize> {
    let data = view.data();
    let mut position = offset;

    loop {
        let Some(&byte) = data.get(position) else {
            return Err(out_of_bounds_error!());
        };
        if byte == 0 {
            return Ok(position - offset);
        }

        let step = 1 + payload_size(byte, view);
        match position.checked_add(step) {
            Some(next) if next <= data.len() => position = next,
            _ => return Err(out_of_bounds_error!()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{file::config::LayoutConfig, Error};

    #[test]
    fn plain_text() {
        let data = b"\0s5Int32V\0".to_vec();
        let view = ImageView::new(&data, LayoutConfig::lp64());

        let reference = EncodedTypeReference::new(view, 1).unwrap();
        assert_eq!(reference.len(), 8);
        assert_eq!(reference.bytes(), b"s5Int32V");
        assert_eq!(reference.as_text(), Some("s5Int32V"));
        assert!(!reference.is_symbolic());
        assert_eq!(reference.first_symbolic().unwrap(), None);

        let empty = EncodedTypeReference::new(view, 0).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.components().count(), 0);
    }

    #[test]
    fn relative_payload_with_zero_bytes() {
        #[rustfmt::skip]
        let data = vec![
            /* 0 */ 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            /* 8 */ 0x01, 0xF8, 0xFF, 0xFF, 0xFF, // direct context -> 9 - 8 = 1
            /* 13 */ b'y', b'G', 0x00,
        ];
        let view = ImageView::new(&data, LayoutConfig::lp64());

        let reference = EncodedTypeReference::new(view, 8).unwrap();
        assert_eq!(reference.len(), 7);
        assert!(reference.is_symbolic());
        assert_eq!(reference.as_text(), None);

        let components: Vec<_> = reference.components().map(|c| c.unwrap()).collect();
        assert_eq!(components.len(), 2);
        assert_eq!(
            components[0],
            TypeReferenceComponent::Symbolic(SymbolicReference {
                control: 0x01,
                kind: SymbolicReferenceKind::DirectContext,
                target: 1,
                absolute: false,
            })
        );
        assert_eq!(components[1], TypeReferenceComponent::Text(b"yG"));

        let symbolic = reference.first_symbolic().unwrap().unwrap();
        assert_eq!(symbolic.context_descriptor(&view).unwrap(), Some(1));
    }

    #[test]
    fn absolute_payload_uses_pointer_width() {
        #[rustfmt::skip]
        let data = vec![
            /* 0 */ 0x00, 0x00, 0x00, 0x00,
            /* 4 */ 0x18, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let lp64 = ImageView::new(&data, LayoutConfig::lp64());
        assert!(matches!(
            EncodedTypeReference::new(lp64, 4),
            Err(Error::OutOfBounds { .. })
        ));

        let wasm = ImageView::new(&data, LayoutConfig::wasm32());
        let reference = EncodedTypeReference::new(wasm, 4).unwrap();
        assert_eq!(reference.len(), 5);
        // A null absolute target is not a valid reference.
        assert!(matches!(
            reference.first_symbolic(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn indirect_context() {
        #[rustfmt::skip]
        let data = vec![
            /* 0 */ 0x00, 0x00, 0x00, 0x00,
            /* 4 */ 0x20, 0x00, 0x00, 0x00,             // slot -> descriptor at 0x20
            /* 8 */ 0x02, 0xFB, 0xFF, 0xFF, 0xFF, 0x00, // indirect -> slot at 4
        ];
        let view = ImageView::new(&data, LayoutConfig::wasm32());

        let reference = EncodedTypeReference::new(view, 8).unwrap();
        let symbolic = reference.first_symbolic().unwrap().unwrap();
        assert_eq!(symbolic.kind, SymbolicReferenceKind::IndirectContext);
        assert_eq!(symbolic.target, 4);
        assert!(!symbolic.absolute);
        assert_eq!(symbolic.context_descriptor(&view).unwrap(), Some(0x20));
    }

    #[test]
    fn unterminated() {
        let data = b"\0Si".to_vec();
        let view = ImageView::new(&data, LayoutConfig::lp64());
        assert!(matches!(
            EncodedTypeReference::new(view, 1),
            Err(Error::OutOfBounds { .. })
        ));
    }
}
