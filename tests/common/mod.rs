//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use metascope::prelude::*;

/// Deterministic in-memory resolution service.
///
/// Plain references are looked up by their mangled bytes; `x`, `q_` and `q<n>_` select the
/// owner's generic arguments 0, 1 and `n + 2`.
#[derive(Debug, Default)]
pub struct TableResolver {
    types: HashMap<Vec<u8>, usize>,
    calls: AtomicUsize,
}

impl TableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, mangled: &str, metadata: usize) -> Self {
        self.types.insert(mangled.as_bytes().to_vec(), metadata);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl GenericContextResolver for TableResolver {
    fn resolve_type<'a>(
        &self,
        reference: &EncodedTypeReference<'a>,
        _context: &TypeContextDescriptor<'a>,
        generic_arguments: &GenericArguments<'a>,
    ) -> Option<TypeMetadata<'a>> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let index = match reference.bytes() {
            b"x" => Some(0),
            b"q_" => Some(1),
            [b'q', digits @ .., b'_'] => std::str::from_utf8(digits)
                .ok()
                .and_then(|digits| digits.parse::<usize>().ok())
                .map(|n| n + 2),
            _ => None,
        };
        if let Some(index) = index {
            return generic_arguments.get(index).ok().flatten();
        }

        let metadata = self.types.get(reference.bytes())?;
        reference.view().metadata(*metadata).ok()
    }
}

/// A visited field reduced to comparable values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visited {
    pub name: String,
    pub offset: usize,
    pub ty: Option<usize>,
}

impl From<FieldInfo<'_>> for Visited {
    fn from(field: FieldInfo<'_>) -> Self {
        Visited {
            name: field.name.to_string(),
            offset: field.offset,
            ty: field.ty.map(|ty| ty.offset()),
        }
    }
}

pub fn visited(name: &str, offset: usize, ty: Option<usize>) -> Visited {
    Visited {
        name: name.to_string(),
        offset,
        ty,
    }
}
