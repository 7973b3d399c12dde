//! Tuple metadata.
//!
//! Tuples are structural: they have no context descriptor and no field descriptor. Their
//! metadata stores the element count, an optional packed label list and one
//! `{type, offset}` pair per element directly after the kind word.

use crate::{
    metadata::{labels::LabelListReader, view::TypeMetadata},
    Result,
};

const NUM_ELEMENTS_WORD: usize = 1;
const LABELS_WORD: usize = 2;
const ELEMENTS_WORD: usize = 3;

/// One element of a tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleElement<'a> {
    /// The element label, empty when unlabelled
    pub label: &'a str,
    /// The element type
    pub ty: TypeMetadata<'a>,
    /// Byte offset of the element within the tuple
    pub offset: u64,
}

/// Tuple metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleMetadata<'a> {
    metadata: TypeMetadata<'a>,
}

impl<'a> TupleMetadata<'a> {
    pub(crate) fn new(metadata: TypeMetadata<'a>) -> Self {
        TupleMetadata { metadata }
    }

    /// The underlying record
    #[must_use]
    pub fn metadata(&self) -> TypeMetadata<'a> {
        self.metadata
    }

    /// Number of elements
    ///
    /// # Errors
    /// Returns an error if the count cannot be read, or
    /// [`crate::Error::Malformed`] if the element pairs it implies run past the image.
    pub fn num_elements(&self) -> Result<usize> {
        let view = self.metadata.view();
        let raw = view.read_word(self.metadata.word(NUM_ELEMENTS_WORD)?)?;
        let count = usize::try_from(raw)
            .map_err(|_| malformed_error!("Tuple element count {} is not addressable", raw))?;

        let start = self.metadata.word(ELEMENTS_WORD)?;
        let available = view.data().len().saturating_sub(start);
        match count.checked_mul(2 * view.word_size()) {
            Some(needed) if needed <= available => Ok(count),
            _ => Err(malformed_error!(
                "Tuple at {} claims {} elements but only {} bytes follow",
                self.metadata.offset(),
                count,
                available
            )),
        }
    }

    /// Reader over the packed labels, `None` when no element is labelled
    ///
    /// # Errors
    /// Returns an error if the label pointer cannot be read.
    pub fn labels(&self) -> Result<Option<LabelListReader<'a>>> {
        let view = self.metadata.view();
        match view.read_pointer(self.metadata.word(LABELS_WORD)?)? {
            Some(labels) => LabelListReader::from_image(view, labels).map(Some),
            None => Ok(None),
        }
    }

    /// Type and byte offset of element `index`
    ///
    /// # Errors
    /// Returns an error if the element is out of range or cannot be read.
    pub fn element(&self, index: usize) -> Result<(TypeMetadata<'a>, u64)> {
        self.element_at(index, self.num_elements()?)
    }

    fn element_at(&self, index: usize, count: usize) -> Result<(TypeMetadata<'a>, u64)> {
        if index >= count {
            return Err(out_of_bounds_error!());
        }

        let view = self.metadata.view();
        let pair = self.metadata.word(ELEMENTS_WORD + index * 2)?;
        let mut parser = view.parser_at(pair)?;
        let Some(ty) = parser.read_pointer(view.pointer_width())? else {
            return Err(malformed_error!("Tuple element {} has no type", index));
        };
        let offset = parser.read_word(view.pointer_width())?;

        Ok((view.metadata(ty)?, offset))
    }

    /// All elements with their labels, in order
    ///
    /// # Errors
    /// Returns an error if the count, a label or an element cannot be read.
    pub fn elements(&self) -> Result<Vec<TupleElement<'a>>> {
        let count = self.num_elements()?;
        let mut labels = self.labels()?;
        let mut elements = Vec::with_capacity(count);

        for index in 0..count {
            let label = match labels.as_mut() {
                Some(reader) => reader.next_label()?.unwrap_or_default(),
                None => "",
            };
            let (ty, offset) = self.element_at(index, count)?;
            elements.push(TupleElement { label, ty, offset });
        }

        Ok(elements)
    }
}
