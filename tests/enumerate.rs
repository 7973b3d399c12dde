//! Field enumeration over images emitted by the builders.
//!
//! Every scenario runs against both pointer widths the builder supports, so the same logical
//! struct is read once with 8 byte and once with 4 byte words.

mod common;

use common::{visited, TableResolver, Visited};
use metascope::{
    metadata::builder::{EnumBuilder, ImageBuilder, StructBuilder, TupleBuilder},
    prelude::*,
};

const LAYOUTS: [LayoutConfig; 2] = [LayoutConfig::lp64(), LayoutConfig::wasm32()];

struct Shapes {
    image: Image,
    int32: usize,
    double: usize,
    point: usize,
    rect: usize,
}

fn shapes(config: LayoutConfig) -> Result<Shapes> {
    let mut builder = ImageBuilder::new(config);
    let int32 = builder.value_type("Int32", 4, 4)?;
    let double = builder.value_type("Double", 8, 8)?;
    let point = StructBuilder::new("Point")
        .field("x", "s5Int32V", 0)
        .field("y", "s5Int32V", 4)
        .layout(8, 4)
        .build(&mut builder, &[])?;
    let rect = StructBuilder::new("Rect")
        .var_field("origin", "4main5PointV", 0)
        .var_field("width", "Sd", 8)
        .var_field("height", "Sd", 16)
        .field("tag", "s5Int32V", 24)
        .layout(28, 8)
        .build(&mut builder, &[])?;

    Ok(Shapes {
        image: Image::from_mem(builder.finish(), config)?,
        int32: int32.metadata,
        double: double.metadata,
        point: point.metadata,
        rect: rect.metadata,
    })
}

impl Shapes {
    fn resolver(&self) -> TableResolver {
        TableResolver::new()
            .with_type("s5Int32V", self.int32)
            .with_type("Sd", self.double)
            .with_type("4main5PointV", self.point)
    }
}

#[test]
fn test_point_fields_in_order() -> Result<()> {
    for config in LAYOUTS {
        let shapes = shapes(config)?;
        let resolver = shapes.resolver();
        let metadata = shapes.image.metadata(shapes.point)?;

        let mut seen = Vec::new();
        let complete = enumerate_fields(&metadata, false, &resolver, |field| {
            seen.push(Visited::from(field));
            true
        });

        assert!(complete);
        assert_eq!(
            seen,
            [
                visited("x", 0, Some(shapes.int32)),
                visited("y", 4, Some(shapes.int32)),
            ]
        );
        for field in FieldEnumerator::new(&resolver)
            .fields(&metadata)?
            .unwrap_or_default()
        {
            assert_eq!(field.ty.map(|ty| ty.size()).transpose()?, Some(4));
        }
    }
    Ok(())
}

#[test]
fn test_offsets_match_offset_table() -> Result<()> {
    for config in LAYOUTS {
        let shapes = shapes(config)?;
        let resolver = shapes.resolver();
        let metadata = shapes.image.metadata(shapes.rect)?;
        let offsets = metadata
            .as_struct()?
            .field_offsets()?
            .iter()
            .collect::<Result<Vec<_>>>()?;

        let mut calls = 0;
        let mut mismatches = 0;
        let complete = enumerate_fields(&metadata, false, &resolver, |field| {
            if offsets.get(calls).map(|offset| *offset as usize) != Some(field.offset) {
                mismatches += 1;
            }
            calls += 1;
            true
        });

        assert!(complete);
        assert_eq!(calls, 4);
        assert_eq!(mismatches, 0);
        assert_eq!(offsets, [0, 8, 16, 24]);
    }
    Ok(())
}

#[test]
fn test_nested_struct_field_resolves_to_struct() -> Result<()> {
    let shapes = shapes(LayoutConfig::lp64())?;
    let resolver = shapes.resolver();
    let metadata = shapes.image.metadata(shapes.rect)?;

    let Some(fields) = FieldEnumerator::new(&resolver).fields(&metadata)? else {
        panic!("Rect is a struct");
    };
    let origin = fields[0].ty.expect("origin resolves");
    assert_eq!(origin.kind(), MetadataKind::Struct);
    assert_eq!(origin.size()?, 8);
    assert!(fields[..3].iter().all(|field| field.is_var));
    assert!(!fields[3].is_var);

    let mut nested = Vec::new();
    assert!(enumerate_fields(&origin, false, &resolver, |field| {
        nested.push(field.name);
        true
    }));
    assert_eq!(nested, ["x", "y"]);
    Ok(())
}

#[test]
fn test_visitor_stop_after_k_calls() -> Result<()> {
    let shapes = shapes(LayoutConfig::wasm32())?;
    let resolver = shapes.resolver();
    let metadata = shapes.image.metadata(shapes.rect)?;

    for k in 1..=4 {
        let mut calls = 0;
        let complete = enumerate_fields(&metadata, false, &resolver, |_| {
            calls += 1;
            calls < k
        });
        assert!(!complete);
        assert_eq!(calls, k);
    }
    Ok(())
}

#[test]
fn test_unsupported_kinds_never_call_visitor() -> Result<()> {
    for config in LAYOUTS {
        let mut builder = ImageBuilder::new(config);
        let int32 = builder.value_type("Int32", 4, 4)?;
        let shape = EnumBuilder::new("Shape")
            .payload_case("circle", "Sd")
            .empty_case("none")
            .layout(9, 8)
            .build(&mut builder, &[])?;
        let optional = EnumBuilder::new("Optional")
            .kind(MetadataKind::Optional)
            .generic_parameters(1)
            .payload_case("some", "x")
            .empty_case("none")
            .layout(5, 4)
            .build(&mut builder, &[int32.metadata])?;
        let tuple = TupleBuilder::new()
            .element(Some("a"), int32.metadata, 0)
            .element(Some("b"), int32.metadata, 4)
            .build(&mut builder)?;
        let class = builder.bare_metadata(MetadataKind::Class, 16, 8)?;
        let function = builder.bare_metadata(MetadataKind::Function, 8, 8)?;
        let existential = builder.bare_metadata(MetadataKind::Existential, 40, 8)?;
        let image = Image::from_mem(builder.finish(), config)?;

        let resolver = TableResolver::new();
        for offset in [
            shape.metadata,
            optional.metadata,
            tuple,
            class,
            function,
            existential,
        ] {
            let metadata = image.metadata(offset)?;
            for allow in [false, true] {
                let mut calls = 0;
                assert!(!enumerate_fields(&metadata, allow, &resolver, |_| {
                    calls += 1;
                    true
                }));
                assert_eq!(calls, 0, "{} visited fields", metadata.kind());
                assert!(!try_enumerate_fields(&metadata, allow, &resolver, |_| true)?);
            }
            assert!(FieldEnumerator::new(&resolver).fields(&metadata)?.is_none());
        }
        assert_eq!(resolver.calls(), 0);
    }
    Ok(())
}

#[test]
fn test_repeated_resolution_is_stable() -> Result<()> {
    let shapes = shapes(LayoutConfig::lp64())?;
    let resolver = shapes.resolver();
    let metadata = shapes.image.metadata(shapes.rect)?;

    let mut sizes = Vec::new();
    for _ in 0..3 {
        let Some(fields) = FieldEnumerator::new(&resolver).fields(&metadata)? else {
            panic!("Rect is a struct");
        };
        let width = fields[1].ty.expect("width resolves");
        sizes.push(width.size()?);
    }
    assert_eq!(sizes, [8, 8, 8]);
    assert_eq!(resolver.calls(), 12);
    Ok(())
}

#[test]
fn test_generic_struct_substitutes_arguments() -> Result<()> {
    for config in LAYOUTS {
        let mut builder = ImageBuilder::new(config);
        let int32 = builder.value_type("Int32", 4, 4)?;
        let boolean = builder.value_type("Bool", 1, 1)?;
        let double = builder.value_type("Double", 8, 8)?;
        let triple = StructBuilder::new("Triple")
            .generic_parameters(3)
            .field("first", "x", 0)
            .field("second", "q_", 8)
            .field("third", "q0_", 16)
            .layout(24, 8)
            .build(&mut builder, &[double.metadata, int32.metadata, boolean.metadata])?;
        let image = Image::from_mem(builder.finish(), config)?;

        let metadata = image.metadata(triple.metadata)?;
        assert_eq!(metadata.generic_arguments()?.len(), 3);

        let mut seen = Vec::new();
        assert!(try_enumerate_fields(&metadata, false, &TableResolver::new(), |field| {
            seen.push(Visited::from(field));
            true
        })?);
        assert_eq!(
            seen,
            [
                visited("first", 0, Some(double.metadata)),
                visited("second", 8, Some(int32.metadata)),
                visited("third", 16, Some(boolean.metadata)),
            ]
        );
    }
    Ok(())
}

#[test]
fn test_unresolved_field_has_no_type() -> Result<()> {
    let shapes = shapes(LayoutConfig::lp64())?;
    let resolver = TableResolver::new().with_type("s5Int32V", shapes.int32);
    let metadata = shapes.image.metadata(shapes.rect)?;

    let mut types = Vec::new();
    assert!(enumerate_fields(&metadata, false, &resolver, |field| {
        types.push(field.ty.map(|ty| ty.offset()));
        true
    }));
    assert_eq!(types, [None, None, None, Some(shapes.int32)]);
    Ok(())
}

#[test]
fn test_malformed_struct_folds_to_false() -> Result<()> {
    let mut builder = ImageBuilder::new(LayoutConfig::lp64());
    let orphan = builder.bare_metadata(MetadataKind::Struct, 4, 4)?;
    let image = Image::from_mem(builder.finish(), LayoutConfig::lp64())?;

    let metadata = image.metadata(orphan)?;
    let resolver = TableResolver::new();
    let mut calls = 0;
    assert!(!enumerate_fields(&metadata, false, &resolver, |_| {
        calls += 1;
        true
    }));
    assert_eq!(calls, 0);
    assert!(matches!(
        try_enumerate_fields(&metadata, false, &resolver, |_| true),
        Err(Error::Malformed { .. })
    ));
    Ok(())
}

#[test]
fn test_metadata_outside_image() -> Result<()> {
    let shapes = shapes(LayoutConfig::wasm32())?;
    let len = shapes.image.len();
    assert!(matches!(
        shapes.image.metadata(len),
        Err(Error::OutOfBounds { .. })
    ));
    Ok(())
}
