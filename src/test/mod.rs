//! Resolution doubles shared by the unit tests.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{
    metadata::{
        descriptor::TypeContextDescriptor,
        typeref::EncodedTypeReference,
        view::{GenericArguments, TypeMetadata},
    },
    resolver::GenericContextResolver,
};

/// Resolves plain mangled names from a table, generic parameters from the owner's arguments
/// and direct or indirect context references from a descriptor table.
#[derive(Debug, Default)]
pub struct NameResolver {
    types: HashMap<Vec<u8>, usize>,
    contexts: HashMap<usize, usize>,
    calls: AtomicUsize,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, mangled: &str, metadata: usize) -> Self {
        self.types.insert(mangled.as_bytes().to_vec(), metadata);
        self
    }

    pub fn with_context(mut self, descriptor: usize, metadata: usize) -> Self {
        self.contexts.insert(descriptor, metadata);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl GenericContextResolver for NameResolver {
    fn resolve_type<'a>(
        &self,
        reference: &EncodedTypeReference<'a>,
        _context: &TypeContextDescriptor<'a>,
        generic_arguments: &GenericArguments<'a>,
    ) -> Option<TypeMetadata<'a>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let view = reference.view();

        if let Some(index) = generic_parameter_index(reference.bytes()) {
            return generic_arguments.get(index).ok().flatten();
        }
        if let Some(metadata) = self.types.get(reference.bytes()) {
            return view.metadata(*metadata).ok();
        }

        let symbolic = reference.first_symbolic().ok()??;
        let descriptor = symbolic.context_descriptor(&view).ok()??;
        view.metadata(*self.contexts.get(&descriptor)?).ok()
    }
}

/// `x` is parameter 0, `q_` parameter 1 and `q<n>_` parameter `n + 2`.
pub fn generic_parameter_index(mangled: &[u8]) -> Option<usize> {
    match mangled {
        b"x" => Some(0),
        b"q_" => Some(1),
        [b'q', digits @ .., b'_'] => std::str::from_utf8(digits)
            .ok()?
            .parse::<usize>()
            .ok()
            .map(|index| index + 2),
        _ => None,
    }
}

#[test]
fn generic_parameter_indices() {
    assert_eq!(generic_parameter_index(b"x"), Some(0));
    assert_eq!(generic_parameter_index(b"q_"), Some(1));
    assert_eq!(generic_parameter_index(b"q0_"), Some(2));
    assert_eq!(generic_parameter_index(b"q12_"), Some(14));
    assert_eq!(generic_parameter_index(b"Si"), None);
    assert_eq!(generic_parameter_index(b"qx_"), None);
}
