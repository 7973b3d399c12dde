//! Layout configuration for metadata images
//!
//! Metadata records mix fixed 32-bit fields with pointer-sized words. The width of those
//! words depends on the target the image was emitted for, so it is configured per image
//! rather than taken from the host.

use strum::{Display, EnumIter};

/// Width of a pointer-sized word inside a metadata image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum PointerWidth {
    /// 32-bit targets (e.g. `wasm32`)
    #[strum(to_string = "32-bit")]
    Four,
    /// 64-bit targets
    #[strum(to_string = "64-bit")]
    Eight,
}

impl PointerWidth {
    /// Number of bytes in one word
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            PointerWidth::Four => 4,
            PointerWidth::Eight => 8,
        }
    }

    /// Pointer width of the running process
    #[must_use]
    pub const fn host() -> Self {
        if cfg!(target_pointer_width = "64") {
            PointerWidth::Eight
        } else {
            PointerWidth::Four
        }
    }
}

/// Configuration describing how a metadata image is laid out
///
/// # Examples
///
/// ```rust
/// use metascope::{LayoutConfig, PointerWidth};
///
/// let config = LayoutConfig::wasm32();
/// assert_eq!(config.pointer_width, PointerWidth::Four);
/// assert_eq!(config.word_size(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Width of pointer-sized words (kind values, absolute pointers, generic arguments,
    /// value witness sizes)
    pub pointer_width: PointerWidth,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::host()
    }
}

impl LayoutConfig {
    /// Layout matching the running process
    #[must_use]
    pub const fn host() -> Self {
        Self {
            pointer_width: PointerWidth::host(),
        }
    }

    /// Layout for 64-bit targets
    #[must_use]
    pub const fn lp64() -> Self {
        Self {
            pointer_width: PointerWidth::Eight,
        }
    }

    /// Layout for 32-bit WebAssembly targets
    #[must_use]
    pub const fn wasm32() -> Self {
        Self {
            pointer_width: PointerWidth::Four,
        }
    }

    /// Size in bytes of one pointer-sized word
    #[must_use]
    pub const fn word_size(&self) -> usize {
        self.pointer_width.bytes()
    }
}
