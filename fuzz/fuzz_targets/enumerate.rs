#![no_main]

use libfuzzer_sys::fuzz_target;
use metascope::prelude::*;

struct Unresolved;

impl GenericContextResolver for Unresolved {
    fn resolve_type<'a>(
        &self,
        _reference: &EncodedTypeReference<'a>,
        _context: &TypeContextDescriptor<'a>,
        generic_arguments: &GenericArguments<'a>,
    ) -> Option<TypeMetadata<'a>> {
        generic_arguments.get(0).ok().flatten()
    }
}

fn type_references(descriptor: &TypeContextDescriptor<'_>) {
    let Ok(Some(fields)) = descriptor.field_descriptor() else {
        return;
    };
    for record in fields.records().take(64) {
        let Ok(record) = record else {
            return;
        };
        let _ = record.name();
        if let Ok(Some(reference)) = record.type_reference() {
            let _ = reference.first_symbolic();
            for component in reference.components().take(64) {
                if component.is_err() {
                    break;
                }
            }
        }
    }
}

fn layouts(metadata: &TypeMetadata<'_>) {
    match metadata.layout() {
        MetadataLayout::Struct(layout) => {
            if let Ok(descriptor) = layout.descriptor() {
                type_references(&descriptor);
            }
            if let Ok(offsets) = layout.field_offsets() {
                let _ = offsets.iter().take(64).count();
            }
        }
        MetadataLayout::Enum(layout) | MetadataLayout::Optional(layout) => {
            let _ = layout.case_count();
            let _ = layout.cases(&Unresolved);
            if let Ok(descriptor) = layout.descriptor() {
                type_references(&descriptor);
            }
        }
        MetadataLayout::Tuple(layout) => {
            let _ = layout.elements();
            if let Ok(Some(labels)) = layout.labels() {
                let _ = labels.take(64).count();
            }
        }
        MetadataLayout::Class(layout) => {
            let _ = layout.instance_size();
            let _ = layout.superclasses();
            let _ = layout.generic_arguments();
            let _ = layout.field_offsets();
            if let Ok(descriptor) = layout.descriptor() {
                let _ = descriptor.superclass_type();
                type_references(&descriptor);
            }
        }
        MetadataLayout::Other(_) => {}
    }
}

fuzz_target!(|data: &[u8]| {
    for config in [LayoutConfig::lp64(), LayoutConfig::wasm32()] {
        let Ok(image) = Image::from_mem(data.to_vec(), config) else {
            return;
        };
        for offset in (0..image.len()).step_by(config.word_size()).take(64) {
            if let Ok(metadata) = image.metadata(offset) {
                let _ = try_enumerate_fields(&metadata, false, &Unresolved, |_| true);
                let _ = metadata.size();
                layouts(&metadata);
                let _ = type_info(&metadata, &Unresolved);
            }
        }
    }
});
