//! Tuple elements, enum cases, classes and label lists.

mod common;

use common::TableResolver;
use metascope::{
    metadata::{
        builder::{ClassBuilder, EnumBuilder, ImageBuilder, TupleBuilder},
        labels::LabelListReader,
    },
    prelude::*,
};

#[test]
fn test_label_list_yields_each_label_once() -> Result<()> {
    let labels = LabelListReader::new(b"a b c\0").collect::<Result<Vec<_>>>()?;
    assert_eq!(labels, ["a", "b", "c"]);

    let mut reader = LabelListReader::new(b"a b c\0");
    assert_eq!(reader.next_label()?, Some("a"));
    assert_eq!(reader.next_label()?, Some("b"));
    assert_eq!(reader.next_label()?, Some("c"));
    assert_eq!(reader.next_label()?, None);
    assert_eq!(reader.next_label()?, None);
    Ok(())
}

#[test]
fn test_tuple_elements_carry_labels() -> Result<()> {
    for config in [LayoutConfig::lp64(), LayoutConfig::wasm32()] {
        let mut builder = ImageBuilder::new(config);
        let int32 = builder.value_type("Int32", 4, 4)?;
        let double = builder.value_type("Double", 8, 8)?;
        let tuple = TupleBuilder::new()
            .element(Some("lo"), int32.metadata, 0)
            .element(None, int32.metadata, 4)
            .element(Some("weight"), double.metadata, 8)
            .layout(16, 8)
            .build(&mut builder)?;
        let image = Image::from_mem(builder.finish(), config)?;

        let metadata = image.metadata(tuple)?;
        assert_eq!(metadata.kind(), MetadataKind::Tuple);
        assert_eq!(metadata.size()?, 16);
        let MetadataLayout::Tuple(layout) = metadata.layout() else {
            panic!("expected a tuple layout");
        };

        let elements: Vec<_> = layout
            .elements()?
            .into_iter()
            .map(|element| (element.label, element.ty.offset(), element.offset))
            .collect();
        assert_eq!(
            elements,
            [
                ("lo", int32.metadata, 0),
                ("", int32.metadata, 4),
                ("weight", double.metadata, 8),
            ]
        );
    }
    Ok(())
}

#[test]
fn test_enum_cases_in_declaration_order() -> Result<()> {
    let config = LayoutConfig::lp64();
    let mut builder = ImageBuilder::new(config);
    let int32 = builder.value_type("Int32", 4, 4)?;
    let token = EnumBuilder::new("Token")
        .payload_case("number", "Si")
        .indirect_case("nested", "5TokenO")
        .empty_case("open")
        .empty_case("close")
        .layout(9, 8)
        .build(&mut builder, &[])?;
    let image = Image::from_mem(builder.finish(), config)?;

    let resolver = TableResolver::new()
        .with_type("Si", int32.metadata)
        .with_type("5TokenO", token.metadata);
    let MetadataLayout::Enum(layout) = image.metadata(token.metadata)?.layout() else {
        panic!("expected an enum layout");
    };

    assert_eq!(layout.payload_case_count()?, 2);
    assert_eq!(layout.empty_case_count()?, 2);
    assert_eq!(layout.case_count()?, 4);
    assert_eq!(layout.descriptor()?.name()?, "Token");

    let cases = layout.cases(&resolver)?;
    let summary: Vec<_> = cases
        .iter()
        .map(|case| (case.name, case.payload.map(|ty| ty.offset()), case.indirect))
        .collect();
    assert_eq!(
        summary,
        [
            ("number", Some(int32.metadata), false),
            ("nested", Some(token.metadata), true),
            ("open", None, false),
            ("close", None, false),
        ]
    );
    Ok(())
}

#[test]
fn test_generic_class_type_info_includes_ancestors() -> Result<()> {
    for config in [LayoutConfig::lp64(), LayoutConfig::wasm32()] {
        let mut builder = ImageBuilder::new(config);
        let int32 = builder.value_type("Int32", 4, 4)?;
        let double = builder.value_type("Double", 8, 8)?;
        let node = ClassBuilder::new("Node")
            .field("id", "Si", 16)
            .instance_layout(20, 4)
            .build(&mut builder, &[])?;
        let leaf = ClassBuilder::new("Leaf")
            .superclass("4NodeC", node.metadata)
            .generic_parameters(1)
            .var_field("value", "x", 24)
            .instance_layout(32, 8)
            .build(&mut builder, &[double.metadata])?;
        let image = Image::from_mem(builder.finish(), config)?;

        let resolver = TableResolver::new().with_type("Si", int32.metadata);
        let metadata = image.metadata(leaf.metadata)?;
        let MetadataLayout::Class(layout) = metadata.layout() else {
            panic!("expected a class layout");
        };
        assert_eq!(layout.instance_size()?, 32);
        assert_eq!(layout.field_offsets()?, [24]);

        let info = type_info(&metadata, &resolver)?.expect("classes have type info");
        assert_eq!(info.name, Some("Leaf"));
        assert_eq!(info.superclass().map(|ty| ty.offset()), Some(node.metadata));
        assert_eq!(info.generic_arguments.len(), 1);
        assert_eq!(info.generic_arguments[0].offset(), double.metadata);

        let properties: Vec<_> = info
            .properties
            .iter()
            .map(|p| (p.name, p.ty.map(|ty| ty.offset()), p.offset, p.is_var))
            .collect();
        assert_eq!(
            properties,
            [
                ("value", Some(double.metadata), 24, true),
                ("id", Some(int32.metadata), 16, false),
            ]
        );

        let mut calls = 0;
        assert!(!enumerate_fields(&metadata, true, &resolver, |_| {
            calls += 1;
            true
        }));
        assert_eq!(calls, 0);
    }
    Ok(())
}
