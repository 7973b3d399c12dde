//! Packed tuple label lists.
//!
//! Tuple metadata stores its element labels as one string: labels separated by a single space
//! and terminated by NUL. Labels are positional. Consecutive spaces yield an empty label
//! instead of being collapsed, so `"a  c\0"` labels the first and third elements of a
//! three-element tuple and element `i` always pairs with label `i`. An empty label directly
//! before the NUL ends the list, so the trailing space the runtime writes after the last label
//! does not add an element.

use crate::{file::ImageView, Result};

const SEPARATOR: u8 = b' ';
const TERMINATOR: u8 = 0;

/// Sequential reader over a packed label list.
///
/// # Examples
///
/// ```rust
/// use metascope::metadata::labels::LabelListReader;
///
/// let mut labels = LabelListReader::new(b"a b c\0");
/// assert_eq!(labels.next_label()?, Some("a"));
/// assert_eq!(labels.next_label()?, Some("b"));
/// assert_eq!(labels.next_label()?, Some("c"));
/// assert_eq!(labels.next_label()?, None);
/// # Ok::<(), metascope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct LabelListReader<'a> {
    data: &'a [u8],
    position: usize,
    done: bool,
}

impl<'a> LabelListReader<'a> {
    /// Read labels from the start of `data`
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        LabelListReader {
            data,
            position: 0,
            done: false,
        }
    }

    /// Read the label list stored at `offset` in an image
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `offset` lies outside the image.
    pub fn from_image(view: ImageView<'a>, offset: usize) -> Result<Self> {
        match view.data().get(offset..) {
            Some(data) if !data.is_empty() => Ok(LabelListReader::new(data)),
            _ => Err(out_of_bounds_error!()),
        }
    }

    /// Read the next label.
    ///
    /// Returns `Ok(None)` once the terminator has been consumed. An empty label directly before
    /// the terminator marks the end of the list rather than an unlabelled element.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the data ends before a terminator, or
    /// [`crate::Error::Malformed`] if a label is not valid UTF-8.
    pub fn next_label(&mut self) -> Result<Option<&'a str>> {
        if self.done {
            return Ok(None);
        }

        let start = self.position;
        let remaining = self.data.get(start..).unwrap_or_default();
        let Some(len) = remaining
            .iter()
            .position(|byte| *byte == SEPARATOR || *byte == TERMINATOR)
        else {
            self.done = true;
            return Err(out_of_bounds_error!());
        };

        let end = start + len;
        self.position = end + 1;
        if self.data[end] == TERMINATOR {
            self.done = true;
            if len == 0 {
                return Ok(None);
            }
        }

        match std::str::from_utf8(&self.data[start..end]) {
            Ok(label) => Ok(Some(label)),
            Err(_) => {
                self.done = true;
                Err(malformed_error!("Invalid UTF-8 tuple label at {}", start))
            }
        }
    }

    /// Returns `true` once the terminator has been consumed
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.done
    }
}

impl<'a> Iterator for LabelListReader<'a> {
    type Item = Result<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_label().transpose()
    }
}
