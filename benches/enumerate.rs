//! Benchmarks for field enumeration.
//!
//! Measures the traversal path over builder-emitted images:
//! - A small struct with two resolved fields
//! - A wide struct with 64 fields
//! - A generic struct resolving through its argument vector
//! - Label list decoding

extern crate metascope;

use criterion::{criterion_group, criterion_main, Criterion};
use metascope::{
    metadata::{
        builder::{ImageBuilder, StructBuilder},
        labels::LabelListReader,
    },
    prelude::*,
};
use std::hint::black_box;

/// Resolves `Si` to one fixed metadata and `x` to the first generic argument.
struct Fixed(usize);

impl GenericContextResolver for Fixed {
    fn resolve_type<'a>(
        &self,
        reference: &EncodedTypeReference<'a>,
        _context: &TypeContextDescriptor<'a>,
        generic_arguments: &GenericArguments<'a>,
    ) -> Option<TypeMetadata<'a>> {
        match reference.bytes() {
            b"x" => generic_arguments.get(0).ok().flatten(),
            _ => reference.view().metadata(self.0).ok(),
        }
    }
}

fn count_fields(metadata: &TypeMetadata<'_>, resolver: &Fixed) -> usize {
    let mut count = 0;
    enumerate_fields(metadata, false, resolver, |field| {
        count += usize::from(field.ty.is_some());
        true
    });
    count
}

/// Benchmark enumerating `struct Point { x: Int32, y: Int32 }`.
fn bench_enumerate_point(c: &mut Criterion) {
    let mut builder = ImageBuilder::new(LayoutConfig::lp64());
    let int32 = builder.value_type("Int32", 4, 4).unwrap();
    let point = StructBuilder::new("Point")
        .field("x", "Si", 0)
        .field("y", "Si", 4)
        .layout(8, 4)
        .build(&mut builder, &[])
        .unwrap();
    let image = builder.build_image().unwrap();
    let metadata = image.metadata(point.metadata).unwrap();
    let resolver = Fixed(int32.metadata);

    c.bench_function("enumerate_point", |b| {
        b.iter(|| black_box(count_fields(black_box(&metadata), &resolver)));
    });
}

/// Benchmark enumerating a struct with 64 `Int32` fields.
fn bench_enumerate_wide(c: &mut Criterion) {
    let names: Vec<String> = (0..64).map(|index| format!("field{index}")).collect();
    let mut builder = ImageBuilder::new(LayoutConfig::lp64());
    let int32 = builder.value_type("Int32", 4, 4).unwrap();
    let mut wide = StructBuilder::new("Wide").layout(256, 4);
    for (index, name) in names.iter().enumerate() {
        wide = wide.field(name, "Si", index as u32 * 4);
    }
    let wide = wide.build(&mut builder, &[]).unwrap();
    let image = builder.build_image().unwrap();
    let metadata = image.metadata(wide.metadata).unwrap();
    let resolver = Fixed(int32.metadata);

    c.bench_function("enumerate_wide_64", |b| {
        b.iter(|| black_box(count_fields(black_box(&metadata), &resolver)));
    });
}

/// Benchmark enumerating `struct Box<T> { value: T }` instantiated with `Int32`.
fn bench_enumerate_generic(c: &mut Criterion) {
    let mut builder = ImageBuilder::new(LayoutConfig::wasm32());
    let int32 = builder.value_type("Int32", 4, 4).unwrap();
    let boxed = StructBuilder::new("Box")
        .generic_parameters(1)
        .field("value", "x", 0)
        .layout(4, 4)
        .build(&mut builder, &[int32.metadata])
        .unwrap();
    let image = builder.build_image().unwrap();
    let metadata = image.metadata(boxed.metadata).unwrap();
    let resolver = Fixed(int32.metadata);

    c.bench_function("enumerate_generic", |b| {
        b.iter(|| black_box(count_fields(black_box(&metadata), &resolver)));
    });
}

/// Benchmark decoding a packed label list.
fn bench_labels(c: &mut Criterion) {
    let labels = b"origin size  weight tag\0";

    c.bench_function("labels_decode", |b| {
        b.iter(|| {
            let count = LabelListReader::new(black_box(labels)).count();
            black_box(count)
        });
    });
}

criterion_group!(
    benches,
    bench_enumerate_point,
    bench_enumerate_wide,
    bench_enumerate_generic,
    bench_labels
);
criterion_main!(benches);
