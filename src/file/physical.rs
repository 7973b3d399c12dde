//! Memory-mapped image backend.
//!
//! [`crate::file::physical::Physical`] maps an image file into the address space with
//! `memmap2`, so large metadata dumps are paged in on demand instead of being read up front.
//! It backs [`crate::file::Image::from_file`].

use super::Backend;
use crate::{
    Error::{Error, FileError},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// Image backend over a read-only memory mapping
#[derive(Debug)]
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Open and map the file at `path`
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened, or
    /// [`crate::Error::Error`] if mapping it fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path).map_err(FileError)?;

        // The mapping is read-only; images are never written through it.
        let data = unsafe { Mmap::map(&file) }.map_err(|error| Error(error.to_string()))?;
        log::trace!("mapped {} bytes", data.len());

        Ok(Physical { data })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        &self.data
    }
}
