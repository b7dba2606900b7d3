use crate::{
    error::{OrbError, OrbResult},
    xtypes::{
        data_storage::DataStorage,
        type_descriptor::{PrimitiveKind, TypeDescriptor, TypeKind},
        type_support::TypeSupport,
    },
};

/// A value of any IDL type together with its descriptor (IDL `any`).
///
/// The descriptor and the payload are only ever set together so they cannot
/// diverge. Cloning deep-copies the payload; [`DynamicValue::take`] moves it
/// out and leaves the source empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DynamicValue {
    type_descriptor: TypeDescriptor,
    storage: DataStorage,
}

impl DynamicValue {
    /// An empty value. Its descriptor is the `null` type.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value<T: TypeSupport>(value: T) -> Self {
        Self {
            type_descriptor: T::type_descriptor(),
            storage: value.into_storage(),
        }
    }

    /// Builds a value from an explicit descriptor and payload, checking that
    /// the payload has the shape the descriptor describes.
    pub fn from_storage(type_descriptor: TypeDescriptor, storage: DataStorage) -> OrbResult<Self> {
        if !conforms(&storage, &type_descriptor, &mut Vec::new()) {
            return Err(OrbError::TypeMismatch {
                expected: type_descriptor.type_name(),
                found: storage.kind_name().to_string(),
            });
        }
        Ok(Self::from_parts(type_descriptor, storage))
    }

    pub(crate) fn from_parts(type_descriptor: TypeDescriptor, storage: DataStorage) -> Self {
        Self {
            type_descriptor,
            storage,
        }
    }

    pub(crate) fn into_parts(self) -> (TypeDescriptor, DataStorage) {
        (self.type_descriptor, self.storage)
    }

    /// Replaces the content with `value` and the descriptor of `T`.
    pub fn insert<T: TypeSupport>(&mut self, value: T) {
        *self = Self::from_value(value);
    }

    /// Replaces the content with `value` carried under `type_descriptor`
    /// instead of the descriptor of `T`, e.g. a `long` under an alias of
    /// `long`. Fails when `T` is not assignable to `type_descriptor` or its
    /// payload does not have the shape `type_descriptor` describes; the
    /// previous content is left in place in that case.
    pub fn insert_typed<T: TypeSupport>(
        &mut self,
        value: T,
        type_descriptor: TypeDescriptor,
    ) -> OrbResult<()> {
        let value_type = T::type_descriptor();
        if !value_type.is_assignable_to(&type_descriptor) {
            return Err(OrbError::TypeMismatch {
                expected: type_descriptor.type_name(),
                found: value_type.type_name(),
            });
        }
        *self = Self::from_storage(type_descriptor, value.into_storage())?;
        Ok(())
    }

    /// Copies the content out as a `T`. Fails with
    /// [`OrbError::TypeMismatch`] when the stored type is not assignable to
    /// the descriptor of `T`. The value itself is never modified.
    pub fn extract<T: TypeSupport>(&self) -> OrbResult<T> {
        let expected = T::type_descriptor();
        if !self.type_descriptor.is_assignable_to(&expected) {
            return Err(OrbError::TypeMismatch {
                expected: expected.type_name(),
                found: self.type_descriptor.type_name(),
            });
        }
        T::try_from_storage(self.storage.clone())
    }

    pub fn type_descriptor(&self) -> &TypeDescriptor {
        &self.type_descriptor
    }

    pub fn storage(&self) -> &DataStorage {
        &self.storage
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.type_descriptor.kind(), TypeKind::Null)
    }

    /// Moves the content out, leaving this value empty.
    pub fn take(&mut self) -> DynamicValue {
        core::mem::take(self)
    }
}

/// Checks the payload against the descriptor. `enclosing` holds the structs
/// and unions being walked so recursive markers can be followed.
pub(crate) fn conforms(
    storage: &DataStorage,
    type_descriptor: &TypeDescriptor,
    enclosing: &mut Vec<TypeDescriptor>,
) -> bool {
    let resolved = type_descriptor.resolve_alias();
    match (resolved.kind(), storage) {
        (TypeKind::Null, DataStorage::Null) => true,
        (TypeKind::Primitive(p), s) => matches!(
            (p, s),
            (PrimitiveKind::Octet, DataStorage::Octet(_))
                | (PrimitiveKind::Boolean, DataStorage::Boolean(_))
                | (PrimitiveKind::Short, DataStorage::Short(_))
                | (PrimitiveKind::UShort, DataStorage::UShort(_))
                | (PrimitiveKind::Long, DataStorage::Long(_))
                | (PrimitiveKind::ULong, DataStorage::ULong(_))
                | (PrimitiveKind::LongLong, DataStorage::LongLong(_))
                | (PrimitiveKind::ULongLong, DataStorage::ULongLong(_))
                | (PrimitiveKind::Float, DataStorage::Float(_))
                | (PrimitiveKind::Double, DataStorage::Double(_))
                | (PrimitiveKind::Char, DataStorage::Char(_))
                | (PrimitiveKind::WChar, DataStorage::WChar(_))
        ),
        (TypeKind::String, DataStorage::String(_))
        | (TypeKind::WString, DataStorage::WString(_))
        | (TypeKind::Any, DataStorage::Any(_))
        | (TypeKind::ObjectRef { .. }, DataStorage::ObjectRef(_)) => true,
        (TypeKind::Enum(e), DataStorage::Enum(ordinal)) => (*ordinal as usize) < e.enumerators.len(),
        (TypeKind::Struct(s), DataStorage::Struct(fields)) => {
            if s.members.len() != fields.len() {
                return false;
            }
            enclosing.push(resolved.clone());
            let ok = s
                .members
                .iter()
                .zip(fields)
                .all(|(m, f)| conforms(f, &m.r#type, enclosing));
            enclosing.pop();
            ok
        }
        (TypeKind::Union(u), DataStorage::Union(value)) => {
            let Some(index) = u.select_branch(value.discriminant) else {
                return false;
            };
            enclosing.push(resolved.clone());
            let ok = conforms(&value.value, &u.branches[index].r#type, enclosing);
            enclosing.pop();
            ok
        }
        (TypeKind::Sequence { element, .. }, DataStorage::Sequence(elements)) => {
            elements.iter().all(|e| conforms(e, element, enclosing))
        }
        (TypeKind::Array { element, length }, DataStorage::Array(elements)) => {
            elements.len() == *length as usize
                && elements.iter().all(|e| conforms(e, element, enclosing))
        }
        (TypeKind::Recursive { name }, s) => {
            let target = enclosing
                .iter()
                .rev()
                .find(|d| d.name() == Some(name.as_str()))
                .cloned();
            match target {
                Some(target) => conforms(s, &target, enclosing),
                None => false,
            }
        }
        _ => false,
    }
}
