use crate::{
    cdr::{endianness::CodecSettings, reader::CdrReader, writer::CdrWriter},
    configuration::{AliasPolicy, OrbConfiguration, DEFAULT_MAX_DEPTH},
    error::{OrbError, OrbResult},
    reference::{ConnectionId, ObjectId, ObjectReference},
    xtypes::{
        data_storage::DataStorage,
        dynamic_value::DynamicValue,
        type_code::{decode_type_code, encode_type_code},
        type_descriptor::{PrimitiveKind, TypeDescriptor, TypeKind},
        type_support::TypeSupport,
    },
};

/// Encodes and decodes dynamic values for one connection.
///
/// A codec decoding the messages of a connection is bound to that
/// connection: every object reference it decodes is bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdrCodec {
    settings: CodecSettings,
    max_depth: usize,
    alias_policy: AliasPolicy,
    binding: Option<ConnectionId>,
}

impl CdrCodec {
    pub fn new(settings: CodecSettings) -> Self {
        Self {
            settings,
            max_depth: DEFAULT_MAX_DEPTH,
            alias_policy: AliasPolicy::default(),
            binding: None,
        }
    }

    pub fn from_configuration(configuration: &OrbConfiguration) -> Self {
        Self {
            settings: configuration.codec_settings(),
            max_depth: configuration.max_depth(),
            alias_policy: configuration.alias_policy(),
            binding: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_alias_policy(mut self, alias_policy: AliasPolicy) -> Self {
        self.alias_policy = alias_policy;
        self
    }

    /// Codec whose decoded references are bound to `connection_id`.
    pub fn bound_to(mut self, connection_id: ConnectionId) -> Self {
        self.binding = Some(connection_id);
        self
    }

    pub fn settings(&self) -> CodecSettings {
        self.settings
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn alias_policy(&self) -> AliasPolicy {
        self.alias_policy
    }

    pub fn binding(&self) -> Option<ConnectionId> {
        self.binding
    }

    /// Appends `value` to `writer`. On failure nothing of the value is left
    /// in the writer.
    pub fn encode_value(&self, writer: &mut CdrWriter, value: &DynamicValue) -> OrbResult<()> {
        self.encode_storage(writer, value.storage(), value.type_descriptor())
    }

    pub(crate) fn encode_storage(
        &self,
        writer: &mut CdrWriter,
        storage: &DataStorage,
        type_descriptor: &TypeDescriptor,
    ) -> OrbResult<()> {
        self.encode_with(writer, |encoder| encoder.encode(storage, type_descriptor))
    }

    /// Runs one encoding walk, undoing its partial output on failure.
    pub(crate) fn encode_with(
        &self,
        writer: &mut CdrWriter,
        walk: impl FnOnce(&mut ValueEncoder) -> OrbResult<()>,
    ) -> OrbResult<()> {
        let start = writer.position();
        let result = walk(&mut ValueEncoder::new(self, writer));
        if result.is_err() {
            writer.truncate(start);
        }
        result
    }

    pub fn decode_value(
        &self,
        reader: &mut CdrReader,
        type_descriptor: &TypeDescriptor,
    ) -> OrbResult<DynamicValue> {
        let storage = ValueDecoder::new(self, reader).decode(type_descriptor)?;
        Ok(DynamicValue::from_parts(type_descriptor.clone(), storage))
    }

    /// Encodes `value` as a message of its own.
    pub fn encode<T: TypeSupport>(&self, value: T) -> OrbResult<Vec<u8>> {
        let mut writer = CdrWriter::new(self.settings);
        self.encode_value(&mut writer, &DynamicValue::from_value(value))?;
        Ok(writer.into_inner())
    }

    pub fn decode<T: TypeSupport>(&self, bytes: &[u8]) -> OrbResult<T> {
        let mut reader = CdrReader::new(bytes, self.settings);
        self.decode_value(&mut reader, &T::type_descriptor())?
            .extract()
    }

    /// Encodes `value` self-describingly: its type code followed by the
    /// value.
    pub fn encode_any(&self, value: &DynamicValue) -> OrbResult<Vec<u8>> {
        let mut writer = CdrWriter::new(self.settings);
        self.encode_storage(
            &mut writer,
            &DataStorage::Any(Box::new(value.clone())),
            &TypeDescriptor::any(),
        )?;
        Ok(writer.into_inner())
    }

    pub fn decode_any(&self, bytes: &[u8]) -> OrbResult<DynamicValue> {
        let mut reader = CdrReader::new(bytes, self.settings);
        match ValueDecoder::new(self, &mut reader).decode(&TypeDescriptor::any())? {
            DataStorage::Any(value) => Ok(*value),
            other => Err(OrbError::TypeMismatch {
                expected: "any".to_string(),
                found: other.kind_name().to_string(),
            }),
        }
    }
}

/// One encoding walk over a value tree.
pub(crate) struct ValueEncoder<'c, 'w> {
    pub(crate) codec: &'c CdrCodec,
    pub(crate) writer: &'w mut CdrWriter,
    depth: usize,
    enclosing: Vec<TypeDescriptor>,
}

impl<'c, 'w> ValueEncoder<'c, 'w> {
    pub(crate) fn new(codec: &'c CdrCodec, writer: &'w mut CdrWriter) -> Self {
        Self {
            codec,
            writer,
            depth: 0,
            enclosing: Vec::new(),
        }
    }

    /// Marks the start of a struct or union, the target of recursive
    /// markers met until the matching [`Self::leave`].
    pub(crate) fn enter(&mut self, type_descriptor: &TypeDescriptor) {
        self.enclosing.push(type_descriptor.clone());
    }

    pub(crate) fn leave(&mut self) {
        self.enclosing.pop();
    }

    /// Every call counts as one nesting level, whatever the kind, so the
    /// limit bounds the recursion of the walk itself.
    pub(crate) fn encode(
        &mut self,
        storage: &DataStorage,
        type_descriptor: &TypeDescriptor,
    ) -> OrbResult<()> {
        self.depth = descend(self.depth, self.codec.max_depth)?;
        let result = self.encode_nested(storage, type_descriptor);
        self.depth -= 1;
        result
    }

    fn encode_nested(
        &mut self,
        storage: &DataStorage,
        type_descriptor: &TypeDescriptor,
    ) -> OrbResult<()> {
        let resolved = type_descriptor.resolve_alias();
        match (resolved.kind(), storage) {
            (TypeKind::Null, DataStorage::Null) => (),
            (TypeKind::Primitive(kind), storage) => self.encode_primitive(*kind, storage)?,
            (TypeKind::String, DataStorage::String(s)) => self.writer.write_string(s)?,
            (TypeKind::WString, DataStorage::WString(s)) => self.writer.write_wstring(s)?,
            (TypeKind::Enum(e), DataStorage::Enum(ordinal)) => {
                if *ordinal as usize >= e.enumerators.len() {
                    return Err(OrbError::InvalidData(format!(
                        "enum {} has no enumerator {ordinal}",
                        e.name
                    )));
                }
                self.writer.write_u32(*ordinal);
            }
            (TypeKind::ObjectRef { .. }, DataStorage::ObjectRef(reference)) => {
                self.writer.write_string(reference.interface())?;
                self.encode_octets(reference.object_id().as_bytes())?;
            }
            (TypeKind::Any, DataStorage::Any(value)) => self.encode_any(value)?,
            (TypeKind::Sequence { element, bound }, DataStorage::Sequence(elements)) => {
                self.encode_sequence(elements, element, *bound)?
            }
            (TypeKind::Array { element, length }, DataStorage::Array(elements)) => {
                self.encode_array(elements, element, *length)?
            }
            (TypeKind::Struct(_), DataStorage::Struct(fields)) => {
                self.encode_struct(fields, resolved)?
            }
            (TypeKind::Union(_), DataStorage::Union(value)) => {
                self.encode_union(value.discriminant, &value.value, resolved)?
            }
            (TypeKind::Recursive { name }, storage) => {
                let target = self.recursive_target(name)?;
                self.encode(storage, &target)?
            }
            (_, storage) => return Err(shape_mismatch(type_descriptor, storage)),
        }
        Ok(())
    }

    fn recursive_target(&self, name: &str) -> OrbResult<TypeDescriptor> {
        find_enclosing(&self.enclosing, name)
    }

    fn encode_primitive(&mut self, kind: PrimitiveKind, storage: &DataStorage) -> OrbResult<()> {
        let w = &mut self.writer;
        match (kind, storage) {
            (PrimitiveKind::Octet, DataStorage::Octet(v)) => w.write_octet(*v),
            (PrimitiveKind::Boolean, DataStorage::Boolean(v)) => w.write_bool(*v),
            (PrimitiveKind::Short, DataStorage::Short(v)) => w.write_i16(*v),
            (PrimitiveKind::UShort, DataStorage::UShort(v)) => w.write_u16(*v),
            (PrimitiveKind::Long, DataStorage::Long(v)) => w.write_i32(*v),
            (PrimitiveKind::ULong, DataStorage::ULong(v)) => w.write_u32(*v),
            (PrimitiveKind::LongLong, DataStorage::LongLong(v)) => w.write_i64(*v),
            (PrimitiveKind::ULongLong, DataStorage::ULongLong(v)) => w.write_u64(*v),
            (PrimitiveKind::Float, DataStorage::Float(v)) => w.write_f32(*v),
            (PrimitiveKind::Double, DataStorage::Double(v)) => w.write_f64(*v),
            (PrimitiveKind::Char, DataStorage::Char(v)) => w.write_char(*v)?,
            (PrimitiveKind::WChar, DataStorage::WChar(v)) => w.write_wchar(*v)?,
            (kind, storage) => {
                return Err(OrbError::TypeMismatch {
                    expected: kind.idl_name().to_string(),
                    found: storage.kind_name().to_string(),
                })
            }
        }
        Ok(())
    }

    fn encode_any(&mut self, value: &DynamicValue) -> OrbResult<()> {
        let type_code = match self.codec.alias_policy {
            AliasPolicy::Preserve => value.type_descriptor().clone(),
            AliasPolicy::CollapseToBase => value.type_descriptor().collapse_aliases(),
        };
        encode_type_code(self.writer, &type_code)?;
        // the type code of an any is self-contained
        let outer = core::mem::take(&mut self.enclosing);
        let result = self.encode(value.storage(), value.type_descriptor());
        self.enclosing = outer;
        result
    }
}

/// One decoding walk over a message.
pub(crate) struct ValueDecoder<'c, 'r, 'a> {
    pub(crate) codec: &'c CdrCodec,
    pub(crate) reader: &'r mut CdrReader<'a>,
    depth: usize,
    enclosing: Vec<TypeDescriptor>,
}

impl<'c, 'r, 'a> ValueDecoder<'c, 'r, 'a> {
    pub(crate) fn new(codec: &'c CdrCodec, reader: &'r mut CdrReader<'a>) -> Self {
        Self {
            codec,
            reader,
            depth: 0,
            enclosing: Vec::new(),
        }
    }

    pub(crate) fn enter(&mut self, type_descriptor: &TypeDescriptor) {
        self.enclosing.push(type_descriptor.clone());
    }

    pub(crate) fn leave(&mut self) {
        self.enclosing.pop();
    }

    pub(crate) fn decode(&mut self, type_descriptor: &TypeDescriptor) -> OrbResult<DataStorage> {
        self.depth = descend(self.depth, self.codec.max_depth)?;
        let result = self.decode_nested(type_descriptor);
        self.depth -= 1;
        result
    }

    fn decode_nested(&mut self, type_descriptor: &TypeDescriptor) -> OrbResult<DataStorage> {
        let resolved = type_descriptor.resolve_alias();
        Ok(match resolved.kind() {
            TypeKind::Null => DataStorage::Null,
            TypeKind::Primitive(kind) => self.decode_primitive(*kind)?,
            TypeKind::String => DataStorage::String(self.reader.read_string()?),
            TypeKind::WString => DataStorage::WString(self.reader.read_wstring()?),
            TypeKind::Enum(e) => {
                let ordinal = self.reader.read_u32()?;
                if ordinal as usize >= e.enumerators.len() {
                    return Err(OrbError::InvalidData(format!(
                        "enum {} has no enumerator {ordinal}",
                        e.name
                    )));
                }
                DataStorage::Enum(ordinal)
            }
            TypeKind::ObjectRef { .. } => self.decode_reference()?,
            TypeKind::Any => DataStorage::Any(Box::new(self.decode_any()?)),
            TypeKind::Sequence { element, bound } => self.decode_sequence(element, *bound)?,
            TypeKind::Array { element, length } => self.decode_array(element, *length)?,
            TypeKind::Struct(_) => self.decode_struct(resolved)?,
            TypeKind::Union(_) => self.decode_union(resolved)?,
            TypeKind::Recursive { name } => {
                let target = find_enclosing(&self.enclosing, name)?;
                self.decode(&target)?
            }
            TypeKind::Alias { .. } => unreachable!("aliases are resolved above"),
        })
    }

    fn decode_primitive(&mut self, kind: PrimitiveKind) -> OrbResult<DataStorage> {
        let r = &mut self.reader;
        Ok(match kind {
            PrimitiveKind::Octet => DataStorage::Octet(r.read_octet()?),
            PrimitiveKind::Boolean => DataStorage::Boolean(r.read_bool()?),
            PrimitiveKind::Short => DataStorage::Short(r.read_i16()?),
            PrimitiveKind::UShort => DataStorage::UShort(r.read_u16()?),
            PrimitiveKind::Long => DataStorage::Long(r.read_i32()?),
            PrimitiveKind::ULong => DataStorage::ULong(r.read_u32()?),
            PrimitiveKind::LongLong => DataStorage::LongLong(r.read_i64()?),
            PrimitiveKind::ULongLong => DataStorage::ULongLong(r.read_u64()?),
            PrimitiveKind::Float => DataStorage::Float(r.read_f32()?),
            PrimitiveKind::Double => DataStorage::Double(r.read_f64()?),
            PrimitiveKind::Char => DataStorage::Char(r.read_char()?),
            PrimitiveKind::WChar => DataStorage::WChar(r.read_wchar()?),
        })
    }

    fn decode_reference(&mut self) -> OrbResult<DataStorage> {
        let interface = self.reader.read_string()?;
        let object_id = self.decode_octets()?;
        // nil stays unbound
        if interface.is_empty() && object_id.is_empty() {
            return Ok(DataStorage::ObjectRef(ObjectReference::nil()));
        }
        let object_id = ObjectId::new(object_id);
        Ok(DataStorage::ObjectRef(match self.codec.binding {
            Some(connection_id) => ObjectReference::bound(interface, object_id, connection_id),
            None => ObjectReference::new(interface, object_id),
        }))
    }

    fn decode_any(&mut self) -> OrbResult<DynamicValue> {
        // the type code shares the nesting budget of the value holding it
        let remaining_depth = self.codec.max_depth - self.depth;
        let type_descriptor =
            decode_type_code(self.reader, remaining_depth).map_err(|e| match e {
                OrbError::DepthExceeded(_) => OrbError::DepthExceeded(self.codec.max_depth),
                e => e,
            })?;
        let outer = core::mem::take(&mut self.enclosing);
        let result = self.decode(&type_descriptor);
        self.enclosing = outer;
        let storage = result?;
        Ok(DynamicValue::from_parts(type_descriptor, storage))
    }
}

fn descend(depth: usize, max_depth: usize) -> OrbResult<usize> {
    match depth < max_depth {
        true => Ok(depth + 1),
        false => Err(OrbError::DepthExceeded(max_depth)),
    }
}

fn find_enclosing(enclosing: &[TypeDescriptor], name: &str) -> OrbResult<TypeDescriptor> {
    enclosing
        .iter()
        .rev()
        .find(|t| t.name() == Some(name))
        .cloned()
        .ok_or_else(|| {
            OrbError::InvalidDescriptor(format!(
                "recursive reference to {name} outside of {name}"
            ))
        })
}

pub(crate) fn shape_mismatch(type_descriptor: &TypeDescriptor, storage: &DataStorage) -> OrbError {
    OrbError::TypeMismatch {
        expected: type_descriptor.type_name(),
        found: storage.kind_name().to_string(),
    }
}
