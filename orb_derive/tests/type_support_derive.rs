use dust_orb::{
    cdr::endianness::{CdrEndianness, CodecSettings, WCharWidth},
    xtypes::{
        dynamic_value::DynamicValue,
        struct_value::StructValue,
        type_descriptor::{TypeDescriptor, TypeKind},
        type_support::{TypeSupport, WString},
    },
    CdrCodec, OrbError,
};

#[derive(TypeSupport, Debug, Clone, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

#[test]
fn struct_descriptor_follows_field_order() {
    let descriptor = Point::type_descriptor();
    let members = &descriptor.as_struct().unwrap().members;
    assert_eq!(descriptor.name(), Some("Point"));
    assert_eq!(members[0].name, "x");
    assert_eq!(members[1].name, "y");
    assert_eq!(members[1].r#type, TypeDescriptor::long());
}

#[test]
fn struct_round_trips_through_dynamic_value() {
    let point = Point { x: 1, y: -2 };
    let value = DynamicValue::from_value(point.clone());
    assert_eq!(
        StructValue::try_from(value.clone())
            .unwrap()
            .get("y")
            .unwrap()
            .extract::<i32>(),
        Ok(-2)
    );
    assert_eq!(value.extract::<Point>(), Ok(point));
}

#[derive(TypeSupport, Debug, Clone, PartialEq)]
#[idl(name = "Geometry::Position")]
struct Position {
    x: i32,
    y: i32,
}

#[test]
fn structs_are_typed_by_name() {
    assert_eq!(
        Position::type_descriptor().name(),
        Some("Geometry::Position")
    );
    let value = DynamicValue::from_value(Point { x: 1, y: 2 });
    assert!(matches!(
        value.extract::<Position>(),
        Err(OrbError::TypeMismatch { .. })
    ));
}

#[derive(TypeSupport, Debug, Clone, Copy, PartialEq)]
enum Color {
    Red,
    Green,
    Blue,
}

#[derive(TypeSupport, Debug, Clone, PartialEq)]
struct Label {
    text: WString,
    color: Color,
}

#[test]
fn enum_is_encoded_as_ordinal() {
    let codec = CdrCodec::new(CodecSettings::new(
        CdrEndianness::BigEndian,
        WCharWidth::Two,
    ));
    assert!(matches!(
        Color::type_descriptor().kind(),
        TypeKind::Enum(e) if e.enumerators == ["Red", "Green", "Blue"]
    ));
    assert_eq!(codec.encode(Color::Blue).unwrap(), vec![0, 0, 0, 2]);

    let label = Label {
        text: WString::from("ok"),
        color: Color::Green,
    };
    let bytes = codec.encode(label.clone()).unwrap();
    assert_eq!(codec.decode::<Label>(&bytes), Ok(label));
    assert!(matches!(
        codec.decode::<Color>(&[0, 0, 0, 7]),
        Err(OrbError::InvalidData(_))
    ));
}

#[derive(TypeSupport, Debug, Clone, PartialEq)]
struct Node {
    value: i32,
    #[idl(recursive)]
    children: Vec<Node>,
}

#[test]
fn recursive_struct_round_trip() {
    let codec = CdrCodec::new(CodecSettings::default());
    let tree = Node {
        value: 1,
        children: vec![
            Node {
                value: 2,
                children: vec![],
            },
            Node {
                value: 3,
                children: vec![Node {
                    value: 4,
                    children: vec![],
                }],
            },
        ],
    };
    let bytes = codec.encode(tree.clone()).unwrap();
    assert_eq!(codec.decode::<Node>(&bytes), Ok(tree));
}
