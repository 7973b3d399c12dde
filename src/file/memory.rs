//! In-memory image backend.
//!
//! [`crate::file::memory::Memory`] owns the image bytes. It is the backend used by
//! [`crate::file::Image::from_mem`], typically fed by an
//! [`crate::metadata::builder::ImageBuilder`] or by bytes captured from a live process.

use super::Backend;

/// Image backend owning its bytes
#[derive(Debug)]
pub struct Memory(Box<[u8]>);

impl Memory {
    /// Take ownership of `data`
    pub fn new(data: impl Into<Box<[u8]>>) -> Memory {
        Memory(data.into())
    }
}

impl Backend for Memory {
    fn data(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn slices_within_bounds() {
        let memory = Memory::new(b"\x08\0\0\0Point\0".to_vec());

        assert_eq!(memory.len(), 10);
        assert_eq!(memory.data_slice(4, 5).unwrap(), b"Point");
        assert_eq!(memory.data_slice(10, 0).unwrap(), b"");
    }

    #[test]
    fn rejects_ranges_past_the_end() {
        let memory = Memory::new(vec![0u8; 16]);

        assert!(matches!(memory.data_slice(12, 8), Err(Error::OutOfBounds { .. })));
        assert!(matches!(memory.data_slice(usize::MAX, 1), Err(Error::OutOfBounds { .. })));
        assert!(memory.data_slice(17, 0).is_err());
    }

    #[test]
    fn empty() {
        let memory = Memory::new(Vec::<u8>::new());

        assert_eq!(memory.len(), 0);
        assert!(memory.data_slice(0, 1).is_err());
    }
}
