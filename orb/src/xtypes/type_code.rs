//! Binary form of a [`TypeDescriptor`], used to make `any` values
//! self-describing and to fingerprint a type.
//!
//! Each type code starts with a 4-byte kind identifier, followed by the
//! parameters of that kind. Kind identifiers follow the CORBA `TCKind`
//! numbering so peers can recognize the type codes of each other.

use crate::{
    cdr::{
        endianness::{CdrEndianness, CodecSettings},
        reader::CdrReader,
        writer::{length_prefix, CdrWriter},
    },
    error::{OrbError, OrbResult},
    xtypes::type_descriptor::{
        EnumDescriptor, MemberDescriptor, PrimitiveKind, StructDescriptor, TypeDescriptor,
        TypeKind, UnionBranch, UnionDescriptor, UnionLabel,
    },
};

const TK_NULL: u32 = 0;
const TK_SHORT: u32 = 2;
const TK_LONG: u32 = 3;
const TK_USHORT: u32 = 4;
const TK_ULONG: u32 = 5;
const TK_FLOAT: u32 = 6;
const TK_DOUBLE: u32 = 7;
const TK_BOOLEAN: u32 = 8;
const TK_CHAR: u32 = 9;
const TK_OCTET: u32 = 10;
const TK_ANY: u32 = 11;
const TK_OBJREF: u32 = 14;
const TK_STRUCT: u32 = 15;
const TK_UNION: u32 = 16;
const TK_ENUM: u32 = 17;
const TK_STRING: u32 = 18;
const TK_SEQUENCE: u32 = 19;
const TK_ARRAY: u32 = 20;
const TK_ALIAS: u32 = 21;
const TK_LONGLONG: u32 = 23;
const TK_ULONGLONG: u32 = 24;
const TK_WCHAR: u32 = 26;
const TK_WSTRING: u32 = 27;
const TK_RECURSIVE: u32 = 0xffff_ffff;

fn primitive_kind_id(kind: PrimitiveKind) -> u32 {
    match kind {
        PrimitiveKind::Octet => TK_OCTET,
        PrimitiveKind::Boolean => TK_BOOLEAN,
        PrimitiveKind::Short => TK_SHORT,
        PrimitiveKind::UShort => TK_USHORT,
        PrimitiveKind::Long => TK_LONG,
        PrimitiveKind::ULong => TK_ULONG,
        PrimitiveKind::LongLong => TK_LONGLONG,
        PrimitiveKind::ULongLong => TK_ULONGLONG,
        PrimitiveKind::Float => TK_FLOAT,
        PrimitiveKind::Double => TK_DOUBLE,
        PrimitiveKind::Char => TK_CHAR,
        PrimitiveKind::WChar => TK_WCHAR,
    }
}

pub fn encode_type_code(writer: &mut CdrWriter, type_descriptor: &TypeDescriptor) -> OrbResult<()> {
    match type_descriptor.kind() {
        TypeKind::Null => writer.write_u32(TK_NULL),
        TypeKind::Primitive(p) => writer.write_u32(primitive_kind_id(*p)),
        // strings are always written unbounded
        TypeKind::String => {
            writer.write_u32(TK_STRING);
            writer.write_u32(0);
        }
        TypeKind::WString => {
            writer.write_u32(TK_WSTRING);
            writer.write_u32(0);
        }
        TypeKind::Any => writer.write_u32(TK_ANY),
        TypeKind::ObjectRef { interface } => {
            writer.write_u32(TK_OBJREF);
            writer.write_string(interface)?;
        }
        TypeKind::Struct(s) => {
            writer.write_u32(TK_STRUCT);
            writer.write_string(&s.name)?;
            writer.write_u32(length_prefix(s.members.len())?);
            for member in &s.members {
                writer.write_string(&member.name)?;
                encode_type_code(writer, &member.r#type)?;
            }
        }
        TypeKind::Union(u) => {
            writer.write_u32(TK_UNION);
            writer.write_string(&u.name)?;
            encode_type_code(writer, &u.discriminant_type)?;
            writer.write_u32(length_prefix(u.branches.len())?);
            for branch in &u.branches {
                writer.write_u32(length_prefix(branch.labels.len())?);
                for label in &branch.labels {
                    match label {
                        UnionLabel::Value(v) => {
                            writer.write_bool(false);
                            writer.write_i64(*v);
                        }
                        UnionLabel::Default => {
                            writer.write_bool(true);
                            writer.write_i64(0);
                        }
                    }
                }
                writer.write_string(&branch.name)?;
                encode_type_code(writer, &branch.r#type)?;
            }
        }
        TypeKind::Enum(e) => {
            writer.write_u32(TK_ENUM);
            writer.write_string(&e.name)?;
            writer.write_u32(length_prefix(e.enumerators.len())?);
            for enumerator in &e.enumerators {
                writer.write_string(enumerator)?;
            }
        }
        TypeKind::Sequence { element, bound } => {
            writer.write_u32(TK_SEQUENCE);
            encode_type_code(writer, element)?;
            writer.write_u32(bound.unwrap_or(0));
        }
        TypeKind::Array { element, length } => {
            writer.write_u32(TK_ARRAY);
            encode_type_code(writer, element)?;
            writer.write_u32(*length);
        }
        TypeKind::Alias { name, underlying } => {
            writer.write_u32(TK_ALIAS);
            writer.write_string(name)?;
            encode_type_code(writer, underlying)?;
        }
        TypeKind::Recursive { name } => {
            writer.write_u32(TK_RECURSIVE);
            writer.write_string(name)?;
        }
    }
    Ok(())
}

/// Decodes a type code. Nesting deeper than `max_depth` fails with
/// [`OrbError::DepthExceeded`] and a recursive marker must name an
/// enclosing struct or union.
pub fn decode_type_code(reader: &mut CdrReader, max_depth: usize) -> OrbResult<TypeDescriptor> {
    TypeCodeDecoder {
        reader,
        max_depth,
        enclosing: Vec::new(),
    }
    .decode(0)
}

struct TypeCodeDecoder<'r, 'a> {
    reader: &'r mut CdrReader<'a>,
    max_depth: usize,
    enclosing: Vec<String>,
}

impl TypeCodeDecoder<'_, '_> {
    fn count(&mut self) -> OrbResult<usize> {
        let count = self.reader.read_u32()? as usize;
        // Every counted item takes at least one byte
        if count > self.reader.remaining() {
            return Err(OrbError::UnexpectedEnd {
                needed: count,
                remaining: self.reader.remaining(),
            });
        }
        Ok(count)
    }

    fn decode(&mut self, depth: usize) -> OrbResult<TypeDescriptor> {
        if depth > self.max_depth {
            return Err(OrbError::DepthExceeded(self.max_depth));
        }
        let primitive = |kind| -> OrbResult<TypeDescriptor> { Ok(TypeDescriptor::primitive(kind)) };
        match self.reader.read_u32()? {
            TK_NULL => Ok(TypeDescriptor::null()),
            TK_SHORT => primitive(PrimitiveKind::Short),
            TK_LONG => primitive(PrimitiveKind::Long),
            TK_USHORT => primitive(PrimitiveKind::UShort),
            TK_ULONG => primitive(PrimitiveKind::ULong),
            TK_FLOAT => primitive(PrimitiveKind::Float),
            TK_DOUBLE => primitive(PrimitiveKind::Double),
            TK_BOOLEAN => primitive(PrimitiveKind::Boolean),
            TK_CHAR => primitive(PrimitiveKind::Char),
            TK_OCTET => primitive(PrimitiveKind::Octet),
            TK_LONGLONG => primitive(PrimitiveKind::LongLong),
            TK_ULONGLONG => primitive(PrimitiveKind::ULongLong),
            TK_WCHAR => primitive(PrimitiveKind::WChar),
            TK_ANY => Ok(TypeDescriptor::any()),
            TK_STRING => {
                self.reader.read_u32()?;
                Ok(TypeDescriptor::string())
            }
            TK_WSTRING => {
                self.reader.read_u32()?;
                Ok(TypeDescriptor::wstring())
            }
            TK_OBJREF => Ok(TypeDescriptor::object_ref(self.reader.read_string()?)),
            TK_STRUCT => {
                let name = self.reader.read_string()?;
                let count = self.count()?;
                self.enclosing.push(name.clone());
                let mut members = Vec::with_capacity(count);
                for _ in 0..count {
                    let member_name = self.reader.read_string()?;
                    let r#type = self.decode(depth + 1)?;
                    members.push(MemberDescriptor {
                        name: member_name,
                        r#type,
                    });
                }
                self.enclosing.pop();
                TypeDescriptor::describe(TypeKind::Struct(StructDescriptor { name, members }))
            }
            TK_UNION => {
                let name = self.reader.read_string()?;
                self.enclosing.push(name.clone());
                let discriminant_type = self.decode(depth + 1)?;
                let count = self.count()?;
                let mut branches = Vec::with_capacity(count);
                for _ in 0..count {
                    let label_count = self.count()?;
                    let mut labels = Vec::with_capacity(label_count);
                    for _ in 0..label_count {
                        let is_default = self.reader.read_bool()?;
                        let value = self.reader.read_i64()?;
                        labels.push(match is_default {
                            true => UnionLabel::Default,
                            false => UnionLabel::Value(value),
                        });
                    }
                    let branch_name = self.reader.read_string()?;
                    let r#type = self.decode(depth + 1)?;
                    branches.push(UnionBranch::with_labels(labels, branch_name, r#type));
                }
                self.enclosing.pop();
                TypeDescriptor::describe(TypeKind::Union(UnionDescriptor {
                    name,
                    discriminant_type,
                    branches,
                }))
            }
            TK_ENUM => {
                let name = self.reader.read_string()?;
                let count = self.count()?;
                let enumerators = (0..count)
                    .map(|_| self.reader.read_string())
                    .collect::<OrbResult<Vec<_>>>()?;
                TypeDescriptor::describe(TypeKind::Enum(EnumDescriptor { name, enumerators }))
            }
            TK_SEQUENCE => {
                let element = self.decode(depth + 1)?;
                let bound = match self.reader.read_u32()? {
                    0 => None,
                    b => Some(b),
                };
                Ok(TypeDescriptor::sequence(element, bound))
            }
            TK_ARRAY => {
                let element = self.decode(depth + 1)?;
                Ok(TypeDescriptor::array(element, self.reader.read_u32()?))
            }
            TK_ALIAS => {
                let name = self.reader.read_string()?;
                let underlying = self.decode(depth + 1)?;
                Ok(TypeDescriptor::alias(name, underlying))
            }
            TK_RECURSIVE => {
                let name = self.reader.read_string()?;
                if !self.enclosing.contains(&name) {
                    return Err(OrbError::InvalidDescriptor(format!(
                        "recursive reference to {name} outside of {name}"
                    )));
                }
                Ok(TypeDescriptor::recursive(name))
            }
            kind => Err(OrbError::InvalidData(format!("unknown type code kind {kind}"))),
        }
    }
}

impl TypeDescriptor {
    /// md5 digest of the big endian type code. Equal for descriptors built
    /// from the same IDL source.
    pub fn fingerprint(&self) -> OrbResult<[u8; 16]> {
        let mut writer = CdrWriter::new(CodecSettings {
            endianness: CdrEndianness::BigEndian,
            ..Default::default()
        });
        encode_type_code(&mut writer, self)?;
        Ok(md5::compute(writer.as_bytes()).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::DEFAULT_MAX_DEPTH;

    fn round_trip(type_descriptor: &TypeDescriptor) -> TypeDescriptor {
        let settings = CodecSettings::default();
        let mut writer = CdrWriter::new(settings);
        encode_type_code(&mut writer, type_descriptor).unwrap();
        let bytes = writer.into_inner();
        let mut reader = CdrReader::new(&bytes, settings);
        let decoded = decode_type_code(&mut reader, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(reader.remaining(), 0);
        decoded
    }

    #[test]
    fn primitive_type_code_bytes() {
        let mut writer = CdrWriter::new(CodecSettings {
            endianness: CdrEndianness::BigEndian,
            ..Default::default()
        });
        encode_type_code(&mut writer, &TypeDescriptor::long()).unwrap();
        assert_eq!(writer.into_inner(), vec![0, 0, 0, 3]);
    }

    #[test]
    fn recursive_struct_round_trip() {
        let node = TypeDescriptor::structure(
            "Node",
            [
                ("value", TypeDescriptor::alias("Weight", TypeDescriptor::double())),
                (
                    "children",
                    TypeDescriptor::sequence(TypeDescriptor::recursive("Node"), Some(8)),
                ),
            ],
        )
        .unwrap();
        assert_eq!(round_trip(&node), node);
    }

    #[test]
    fn union_round_trip() {
        let u = TypeDescriptor::union(
            "U",
            TypeDescriptor::enumeration("Color", ["Red", "Green", "Blue"]).unwrap(),
            vec![
                UnionBranch::with_labels(
                    vec![UnionLabel::Value(0), UnionLabel::Value(1)],
                    "warm",
                    TypeDescriptor::array(TypeDescriptor::wchar(), 2),
                ),
                UnionBranch::new(UnionLabel::Default, "other", TypeDescriptor::object_ref("Cb")),
            ],
        )
        .unwrap();
        assert_eq!(round_trip(&u), u);
    }

    #[test]
    fn dangling_recursive_marker_is_rejected() {
        let settings = CodecSettings::default();
        let mut writer = CdrWriter::new(settings);
        encode_type_code(
            &mut writer,
            &TypeDescriptor::sequence(TypeDescriptor::recursive("Node"), None),
        )
        .unwrap();
        let bytes = writer.into_inner();
        assert!(matches!(
            decode_type_code(&mut CdrReader::new(&bytes, settings), DEFAULT_MAX_DEPTH),
            Err(OrbError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn nesting_is_depth_guarded() {
        let mut nested = TypeDescriptor::octet();
        for _ in 0..5 {
            nested = TypeDescriptor::sequence(nested, None);
        }
        let settings = CodecSettings::default();
        let mut writer = CdrWriter::new(settings);
        encode_type_code(&mut writer, &nested).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(
            decode_type_code(&mut CdrReader::new(&bytes, settings), 3),
            Err(OrbError::DepthExceeded(3))
        );
    }

    #[test]
    fn zero_sequence_bound_is_unbounded() {
        let sequence = TypeDescriptor::sequence(TypeDescriptor::octet(), Some(0));
        assert_eq!(sequence, TypeDescriptor::sequence(TypeDescriptor::octet(), None));
        assert_eq!(round_trip(&sequence), sequence);
        assert!(matches!(
            TypeDescriptor::describe(TypeKind::Sequence {
                element: TypeDescriptor::octet(),
                bound: Some(0),
            }),
            Err(OrbError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn fingerprint_distinguishes_aliases() {
        let plain = TypeDescriptor::long().fingerprint().unwrap();
        let alias = TypeDescriptor::alias("MyLong", TypeDescriptor::long())
            .fingerprint()
            .unwrap();
        assert_ne!(plain, alias);
        assert_eq!(plain, TypeDescriptor::long().fingerprint().unwrap());
    }
}
