use crate::{
    error::{OrbError, OrbResult},
    reference::ObjectReference,
    xtypes::dynamic_value::DynamicValue,
};

/// Payload of a dynamic value. The variant is always consistent with the
/// type descriptor the payload is stored with.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DataStorage {
    #[default]
    Null,
    Octet(u8),
    Boolean(bool),
    Short(i16),
    UShort(u16),
    Long(i32),
    ULong(u32),
    LongLong(i64),
    ULongLong(u64),
    Float(f32),
    Double(f64),
    Char(char),
    WChar(char),
    String(String),
    WString(String),
    /// Ordinal of the enumerator.
    Enum(u32),
    Sequence(Vec<DataStorage>),
    Array(Vec<DataStorage>),
    /// Member values in declaration order.
    Struct(Vec<DataStorage>),
    Union(Box<UnionStorage>),
    ObjectRef(ObjectReference),
    Any(Box<DynamicValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionStorage {
    pub discriminant: i64,
    pub value: DataStorage,
}

impl DataStorage {
    pub fn kind_name(&self) -> &'static str {
        match self {
            DataStorage::Null => "null",
            DataStorage::Octet(_) => "octet",
            DataStorage::Boolean(_) => "boolean",
            DataStorage::Short(_) => "short",
            DataStorage::UShort(_) => "unsigned short",
            DataStorage::Long(_) => "long",
            DataStorage::ULong(_) => "unsigned long",
            DataStorage::LongLong(_) => "long long",
            DataStorage::ULongLong(_) => "unsigned long long",
            DataStorage::Float(_) => "float",
            DataStorage::Double(_) => "double",
            DataStorage::Char(_) => "char",
            DataStorage::WChar(_) => "wchar",
            DataStorage::String(_) => "string",
            DataStorage::WString(_) => "wstring",
            DataStorage::Enum(_) => "enum",
            DataStorage::Sequence(_) => "sequence",
            DataStorage::Array(_) => "array",
            DataStorage::Struct(_) => "struct",
            DataStorage::Union(_) => "union",
            DataStorage::ObjectRef(_) => "object reference",
            DataStorage::Any(_) => "any",
        }
    }

    /// Whether an object reference appears anywhere in this payload.
    pub fn contains_reference(&self) -> bool {
        match self {
            DataStorage::ObjectRef(reference) => !reference.is_nil(),
            DataStorage::Sequence(v) | DataStorage::Array(v) | DataStorage::Struct(v) => {
                v.iter().any(DataStorage::contains_reference)
            }
            DataStorage::Union(u) => u.value.contains_reference(),
            DataStorage::Any(a) => a.storage().contains_reference(),
            _ => false,
        }
    }
}

/// Conversion between a Rust value and its dynamic payload.
pub trait DataStorageMapping: Sized {
    fn into_storage(self) -> DataStorage;

    fn try_from_storage(data_storage: DataStorage) -> OrbResult<Self>;
}

pub(crate) fn storage_mismatch(expected: &str, found: &DataStorage) -> OrbError {
    OrbError::TypeMismatch {
        expected: expected.to_string(),
        found: found.kind_name().to_string(),
    }
}

macro_rules! primitive_mapping {
    ($ty:ty, $variant:ident, $idl:literal) => {
        impl DataStorageMapping for $ty {
            fn into_storage(self) -> DataStorage {
                DataStorage::$variant(self)
            }

            fn try_from_storage(data_storage: DataStorage) -> OrbResult<Self> {
                match data_storage {
                    DataStorage::$variant(x) => Ok(x),
                    other => Err(storage_mismatch($idl, &other)),
                }
            }
        }
    };
}

primitive_mapping!(u8, Octet, "octet");
primitive_mapping!(bool, Boolean, "boolean");
primitive_mapping!(i16, Short, "short");
primitive_mapping!(u16, UShort, "unsigned short");
primitive_mapping!(i32, Long, "long");
primitive_mapping!(u32, ULong, "unsigned long");
primitive_mapping!(i64, LongLong, "long long");
primitive_mapping!(u64, ULongLong, "unsigned long long");
primitive_mapping!(f32, Float, "float");
primitive_mapping!(f64, Double, "double");
primitive_mapping!(char, Char, "char");
primitive_mapping!(String, String, "string");
primitive_mapping!(ObjectReference, ObjectRef, "object reference");

impl<T: DataStorageMapping> DataStorageMapping for Vec<T> {
    fn into_storage(self) -> DataStorage {
        DataStorage::Sequence(self.into_iter().map(T::into_storage).collect())
    }

    fn try_from_storage(data_storage: DataStorage) -> OrbResult<Self> {
        match data_storage {
            DataStorage::Sequence(elements) => {
                elements.into_iter().map(T::try_from_storage).collect()
            }
            other => Err(storage_mismatch("sequence", &other)),
        }
    }
}

impl<T: DataStorageMapping, const N: usize> DataStorageMapping for [T; N] {
    fn into_storage(self) -> DataStorage {
        DataStorage::Array(self.into_iter().map(T::into_storage).collect())
    }

    fn try_from_storage(data_storage: DataStorage) -> OrbResult<Self> {
        match data_storage {
            DataStorage::Array(elements) => {
                let length = elements.len();
                let elements = elements
                    .into_iter()
                    .map(T::try_from_storage)
                    .collect::<OrbResult<Vec<T>>>()?;
                elements.try_into().map_err(|_| {
                    OrbError::InvalidData(format!(
                        "array holds {length} elements instead of {N}"
                    ))
                })
            }
            other => Err(storage_mismatch("array", &other)),
        }
    }
}

impl DataStorageMapping for DynamicValue {
    fn into_storage(self) -> DataStorage {
        DataStorage::Any(Box::new(self))
    }

    fn try_from_storage(data_storage: DataStorage) -> OrbResult<Self> {
        match data_storage {
            DataStorage::Any(value) => Ok(*value),
            other => Err(storage_mismatch("any", &other)),
        }
    }
}
