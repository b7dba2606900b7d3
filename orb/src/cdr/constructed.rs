use crate::{
    cdr::{
        reader::CdrReader,
        value::{CdrCodec, ValueDecoder, ValueEncoder},
        writer::CdrWriter,
    },
    error::{OrbError, OrbResult},
    xtypes::{
        data_storage::{DataStorage, UnionStorage},
        struct_value::StructValue,
        type_descriptor::{PrimitiveKind, TypeDescriptor, TypeKind, UnionDescriptor},
        union_value::UnionValue,
    },
};

impl CdrCodec {
    /// Writes the members in declaration order, without any framing.
    pub fn encode_struct(&self, writer: &mut CdrWriter, value: &StructValue) -> OrbResult<()> {
        self.encode_with(writer, |encoder| {
            encoder.encode_struct(value.fields(), value.type_descriptor().resolve_alias())
        })
    }

    pub fn decode_struct(
        &self,
        reader: &mut CdrReader,
        type_descriptor: &TypeDescriptor,
    ) -> OrbResult<StructValue> {
        StructValue::try_from(self.decode_value(reader, type_descriptor)?)
    }

    /// Writes the discriminant followed by the active branch. A union
    /// without a discriminant cannot be encoded.
    pub fn encode_union(&self, writer: &mut CdrWriter, value: &UnionValue) -> OrbResult<()> {
        let (discriminant, storage) = value.active_storage().ok_or_else(|| {
            OrbError::PreconditionNotMet("union has no discriminant set".to_string())
        })?;
        self.encode_with(writer, |encoder| {
            encoder.encode_union(
                discriminant,
                storage,
                value.type_descriptor().resolve_alias(),
            )
        })
    }

    pub fn decode_union(
        &self,
        reader: &mut CdrReader,
        type_descriptor: &TypeDescriptor,
    ) -> OrbResult<UnionValue> {
        UnionValue::try_from(self.decode_value(reader, type_descriptor)?)
    }
}

fn union_of(type_descriptor: &TypeDescriptor) -> OrbResult<&UnionDescriptor> {
    type_descriptor
        .as_union()
        .ok_or_else(|| OrbError::TypeMismatch {
            expected: "union".to_string(),
            found: type_descriptor.type_name(),
        })
}

impl ValueEncoder<'_, '_> {
    /// `type_descriptor` is the struct itself, aliases already resolved.
    pub(crate) fn encode_struct(
        &mut self,
        fields: &[DataStorage],
        type_descriptor: &TypeDescriptor,
    ) -> OrbResult<()> {
        let descriptor = type_descriptor
            .as_struct()
            .ok_or_else(|| OrbError::TypeMismatch {
                expected: "struct".to_string(),
                found: type_descriptor.type_name(),
            })?;
        if descriptor.members.len() != fields.len() {
            return Err(OrbError::InvalidData(format!(
                "struct {} has {} members but the value holds {}",
                descriptor.name,
                descriptor.members.len(),
                fields.len()
            )));
        }
        self.enter(type_descriptor);
        for (member, field) in descriptor.members.iter().zip(fields) {
            self.encode(field, &member.r#type)?;
        }
        self.leave();
        Ok(())
    }

    pub(crate) fn encode_union(
        &mut self,
        discriminant: i64,
        value: &DataStorage,
        type_descriptor: &TypeDescriptor,
    ) -> OrbResult<()> {
        let descriptor = union_of(type_descriptor)?;
        if !descriptor.discriminant_in_range(discriminant) {
            return Err(OrbError::UnknownDiscriminant(discriminant));
        }
        let branch = descriptor
            .select_branch(discriminant)
            .ok_or(OrbError::UnknownDiscriminant(discriminant))?;
        self.enter(type_descriptor);
        self.encode_discriminant(discriminant, &descriptor.discriminant_type)?;
        self.encode(value, &descriptor.branches[branch].r#type)?;
        self.leave();
        Ok(())
    }

    fn encode_discriminant(
        &mut self,
        discriminant: i64,
        discriminant_type: &TypeDescriptor,
    ) -> OrbResult<()> {
        let w = &mut self.writer;
        match discriminant_type.resolve_alias().kind() {
            TypeKind::Primitive(kind) => match kind {
                PrimitiveKind::Boolean => w.write_bool(discriminant != 0),
                PrimitiveKind::Octet => w.write_octet(discriminant as u8),
                PrimitiveKind::Char => w.write_char(char::from(discriminant as u8))?,
                PrimitiveKind::WChar => {
                    let c = char::from_u32(discriminant as u32).ok_or_else(|| {
                        OrbError::InvalidData(format!(
                            "discriminant {discriminant} is not a character"
                        ))
                    })?;
                    w.write_wchar(c)?
                }
                PrimitiveKind::Short => w.write_i16(discriminant as i16),
                PrimitiveKind::UShort => w.write_u16(discriminant as u16),
                PrimitiveKind::Long => w.write_i32(discriminant as i32),
                PrimitiveKind::ULong => w.write_u32(discriminant as u32),
                PrimitiveKind::LongLong => w.write_i64(discriminant),
                PrimitiveKind::ULongLong => w.write_u64(discriminant as u64),
                PrimitiveKind::Float | PrimitiveKind::Double => {
                    return Err(illegal_discriminant_type(discriminant_type))
                }
            },
            TypeKind::Enum(_) => w.write_u32(discriminant as u32),
            _ => return Err(illegal_discriminant_type(discriminant_type)),
        }
        Ok(())
    }
}

fn illegal_discriminant_type(discriminant_type: &TypeDescriptor) -> OrbError {
    OrbError::InvalidDescriptor(format!(
        "{} cannot discriminate a union",
        discriminant_type.type_name()
    ))
}

impl ValueDecoder<'_, '_, '_> {
    pub(crate) fn decode_struct(
        &mut self,
        type_descriptor: &TypeDescriptor,
    ) -> OrbResult<DataStorage> {
        let descriptor = type_descriptor
            .as_struct()
            .ok_or_else(|| OrbError::TypeMismatch {
                expected: "struct".to_string(),
                found: type_descriptor.type_name(),
            })?;
        self.enter(type_descriptor);
        let mut fields = Vec::with_capacity(descriptor.members.len());
        for member in &descriptor.members {
            fields.push(self.decode(&member.r#type)?);
        }
        self.leave();
        Ok(DataStorage::Struct(fields))
    }

    /// Reads the discriminant, then the branch it selects.
    pub(crate) fn decode_union(
        &mut self,
        type_descriptor: &TypeDescriptor,
    ) -> OrbResult<DataStorage> {
        let descriptor = union_of(type_descriptor)?;
        self.enter(type_descriptor);
        let discriminant = self.decode_discriminant(&descriptor.discriminant_type)?;
        let branch = descriptor
            .select_branch(discriminant)
            .ok_or(OrbError::UnknownDiscriminant(discriminant))?;
        let value = self.decode(&descriptor.branches[branch].r#type)?;
        self.leave();
        Ok(DataStorage::Union(Box::new(UnionStorage {
            discriminant,
            value,
        })))
    }

    fn decode_discriminant(&mut self, discriminant_type: &TypeDescriptor) -> OrbResult<i64> {
        let r = &mut self.reader;
        Ok(match discriminant_type.resolve_alias().kind() {
            TypeKind::Primitive(kind) => match kind {
                PrimitiveKind::Boolean => r.read_bool()? as i64,
                PrimitiveKind::Octet => r.read_octet()? as i64,
                PrimitiveKind::Char => r.read_char()? as i64,
                PrimitiveKind::WChar => r.read_wchar()? as i64,
                PrimitiveKind::Short => r.read_i16()? as i64,
                PrimitiveKind::UShort => r.read_u16()? as i64,
                PrimitiveKind::Long => r.read_i32()? as i64,
                PrimitiveKind::ULong => r.read_u32()? as i64,
                PrimitiveKind::LongLong => r.read_i64()?,
                PrimitiveKind::ULongLong => r.read_u64()? as i64,
                PrimitiveKind::Float | PrimitiveKind::Double => {
                    return Err(illegal_discriminant_type(discriminant_type))
                }
            },
            TypeKind::Enum(_) => r.read_u32()? as i64,
            _ => return Err(illegal_discriminant_type(discriminant_type)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cdr::endianness::{CdrEndianness, CodecSettings, WCharWidth},
        xtypes::{
            dynamic_value::DynamicValue,
            type_descriptor::{UnionBranch, UnionLabel},
            type_support::WString,
        },
    };

    fn codec() -> CdrCodec {
        CdrCodec::new(CodecSettings::new(
            CdrEndianness::BigEndian,
            WCharWidth::Two,
        ))
    }

    fn shape() -> TypeDescriptor {
        TypeDescriptor::union(
            "Shape",
            TypeDescriptor::short(),
            vec![
                UnionBranch::new(UnionLabel::Value(1), "radius", TypeDescriptor::long()),
                UnionBranch::new(UnionLabel::Default, "label", TypeDescriptor::wstring()),
            ],
        )
        .unwrap()
    }

    fn node() -> TypeDescriptor {
        TypeDescriptor::structure(
            "Node",
            [
                ("value", TypeDescriptor::long()),
                (
                    "children",
                    TypeDescriptor::sequence(TypeDescriptor::recursive("Node"), None),
                ),
            ],
        )
        .unwrap()
    }

    fn encode_struct(codec: &CdrCodec, value: &StructValue) -> Vec<u8> {
        let mut writer = CdrWriter::new(codec.settings());
        codec.encode_struct(&mut writer, value).unwrap();
        writer.into_inner()
    }

    #[test]
    fn struct_members_in_declaration_order() {
        let codec = codec();
        let point = TypeDescriptor::structure(
            "Point",
            [("x", TypeDescriptor::octet()), ("y", TypeDescriptor::long())],
        )
        .unwrap();
        let mut value = StructValue::new(point.clone()).unwrap();
        value.set("x", DynamicValue::from_value(1u8)).unwrap();
        value.set("y", DynamicValue::from_value(2i32)).unwrap();
        let bytes = encode_struct(&codec, &value);
        assert_eq!(bytes, vec![1, 0, 0, 0, 0, 0, 0, 2]);
        let mut reader = CdrReader::new(&bytes, codec.settings());
        assert_eq!(codec.decode_struct(&mut reader, &point), Ok(value));
    }

    #[test]
    fn union_with_matched_branch() {
        let codec = codec();
        let mut value = UnionValue::new(shape()).unwrap();
        value.set("radius", DynamicValue::from_value(5i32)).unwrap();
        let mut writer = CdrWriter::new(codec.settings());
        codec.encode_union(&mut writer, &value).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes, vec![0, 1, 0, 0, 0, 0, 0, 5]);
        let mut reader = CdrReader::new(&bytes, codec.settings());
        assert_eq!(codec.decode_union(&mut reader, &shape()), Ok(value));
    }

    #[test]
    fn union_with_default_branch() {
        let codec = codec();
        let mut value = UnionValue::new(shape()).unwrap();
        value.set_discriminant(42).unwrap();
        value
            .set("label", DynamicValue::from_value(WString::from("hexagon")))
            .unwrap();
        let mut writer = CdrWriter::new(codec.settings());
        codec.encode_union(&mut writer, &value).unwrap();
        let bytes = writer.into_inner();
        let mut reader = CdrReader::new(&bytes, codec.settings());
        let decoded = codec.decode_union(&mut reader, &shape()).unwrap();
        assert_eq!(decoded.discriminant(), Some(42));
        assert_eq!(
            decoded.active_branch().unwrap().1.extract::<WString>(),
            Ok(WString::from("hexagon"))
        );
    }

    #[test]
    fn unset_union_is_not_encoded() {
        let codec = codec();
        let mut writer = CdrWriter::new(codec.settings());
        assert!(matches!(
            codec.encode_union(&mut writer, &UnionValue::new(shape()).unwrap()),
            Err(OrbError::PreconditionNotMet(_))
        ));
    }

    #[test]
    fn unknown_discriminant_on_decode() {
        let codec = codec();
        let no_default = TypeDescriptor::union(
            "Exact",
            TypeDescriptor::short(),
            vec![UnionBranch::new(
                UnionLabel::Value(1),
                "one",
                TypeDescriptor::octet(),
            )],
        )
        .unwrap();
        let bytes = [0, 7, 3];
        let mut reader = CdrReader::new(&bytes, codec.settings());
        assert_eq!(
            codec.decode_value(&mut reader, &no_default),
            Err(OrbError::UnknownDiscriminant(7))
        );
    }

    fn chain(depth: usize) -> DataStorage {
        let mut current = DataStorage::Struct(vec![DataStorage::Long(0), DataStorage::Sequence(vec![])]);
        for level in 1..depth {
            current = DataStorage::Struct(vec![
                DataStorage::Long(level as i32),
                DataStorage::Sequence(vec![current]),
            ]);
        }
        current
    }

    #[test]
    fn recursive_struct_round_trip() {
        let codec = codec();
        let value = StructValue::try_from(DynamicValue::from_storage(node(), chain(3)).unwrap()).unwrap();
        let bytes = encode_struct(&codec, &value);
        let mut reader = CdrReader::new(&bytes, codec.settings());
        let decoded = codec.decode_struct(&mut reader, &node()).unwrap();
        assert_eq!(decoded, value);
        let children = decoded.get("children").unwrap();
        assert_eq!(
            children.type_descriptor(),
            &TypeDescriptor::sequence(node(), None)
        );
    }

    #[test]
    fn nesting_beyond_the_limit_is_rejected() {
        let deep = DynamicValue::from_storage(node(), chain(6)).unwrap();
        let limited = codec().with_max_depth(5);
        let mut writer = CdrWriter::new(limited.settings());
        assert_eq!(
            limited.encode_value(&mut writer, &deep),
            Err(OrbError::DepthExceeded(5))
        );
        assert!(writer.as_bytes().is_empty());

        let bytes = {
            let mut writer = CdrWriter::new(codec().settings());
            codec().encode_value(&mut writer, &deep).unwrap();
            writer.into_inner()
        };
        let mut reader = CdrReader::new(&bytes, limited.settings());
        assert_eq!(
            limited.decode_value(&mut reader, &node()),
            Err(OrbError::DepthExceeded(5))
        );
    }

    #[test]
    fn enum_discriminated_union() {
        let codec = codec();
        let color = TypeDescriptor::enumeration("Color", ["Red", "Green"]).unwrap();
        let paint = TypeDescriptor::union(
            "Paint",
            color,
            vec![
                UnionBranch::new(UnionLabel::Value(0), "red", TypeDescriptor::octet()),
                UnionBranch::new(UnionLabel::Value(1), "green", TypeDescriptor::boolean()),
            ],
        )
        .unwrap();
        let mut value = UnionValue::new(paint.clone()).unwrap();
        value.set("green", DynamicValue::from_value(true)).unwrap();
        let mut writer = CdrWriter::new(codec.settings());
        codec.encode_union(&mut writer, &value).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes, vec![0, 0, 0, 1, 1]);
        let mut reader = CdrReader::new(&bytes, codec.settings());
        assert_eq!(codec.decode_union(&mut reader, &paint), Ok(value));
    }
}
