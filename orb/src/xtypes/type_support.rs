use crate::{
    error::{OrbError, OrbResult},
    reference::ObjectReference,
    xtypes::{
        data_storage::{storage_mismatch, DataStorage, DataStorageMapping},
        dynamic_value::DynamicValue,
        type_descriptor::{TypeDescriptor, OBJECT_INTERFACE},
    },
};
use core::ops::Deref;

pub use dust_orb_derive::TypeSupport;

/// The TypeSupport trait represents a Rust type with a static IDL
/// description. It is what lets a value be inserted into and extracted from
/// a [`DynamicValue`] without naming its descriptor.
///
/// ## Derivable
///
/// This trait can be automatically derived for structs with named fields
/// and for fieldless enums:
///
/// ```rust
///     use dust_orb::xtypes::type_support::TypeSupport;
///
///     #[derive(TypeSupport, Debug, Clone, PartialEq)]
///     struct Point {
///         x: i32,
///         y: i32,
///     }
/// ```
pub trait TypeSupport: DataStorageMapping {
    /// Descriptor every value of this type is inserted with.
    fn type_descriptor() -> TypeDescriptor;
}

macro_rules! primitive_type_support {
    ($ty:ty, $descriptor:ident) => {
        impl TypeSupport for $ty {
            fn type_descriptor() -> TypeDescriptor {
                TypeDescriptor::$descriptor()
            }
        }
    };
}

primitive_type_support!(u8, octet);
primitive_type_support!(bool, boolean);
primitive_type_support!(i16, short);
primitive_type_support!(u16, ushort);
primitive_type_support!(i32, long);
primitive_type_support!(u32, ulong);
primitive_type_support!(i64, longlong);
primitive_type_support!(u64, ulonglong);
primitive_type_support!(f32, float);
primitive_type_support!(f64, double);
primitive_type_support!(char, char);
primitive_type_support!(String, string);
primitive_type_support!(DynamicValue, any);

impl TypeSupport for ObjectReference {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::object_ref(OBJECT_INTERFACE)
    }
}

/// IDL `wstring`. A plain [`String`] maps to the narrow `string`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct WString(pub String);

impl From<&str> for WString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Deref for WString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl DataStorageMapping for WString {
    fn into_storage(self) -> DataStorage {
        DataStorage::WString(self.0)
    }

    fn try_from_storage(data_storage: DataStorage) -> OrbResult<Self> {
        match data_storage {
            DataStorage::WString(x) => Ok(Self(x)),
            other => Err(storage_mismatch("wstring", &other)),
        }
    }
}

impl TypeSupport for WString {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::wstring()
    }
}

/// IDL `wchar`. A plain [`char`] maps to the narrow `char`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct WChar(pub char);

impl DataStorageMapping for WChar {
    fn into_storage(self) -> DataStorage {
        DataStorage::WChar(self.0)
    }

    fn try_from_storage(data_storage: DataStorage) -> OrbResult<Self> {
        match data_storage {
            DataStorage::WChar(x) => Ok(Self(x)),
            other => Err(storage_mismatch("wchar", &other)),
        }
    }
}

impl TypeSupport for WChar {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::wchar()
    }
}

impl<T: TypeSupport> TypeSupport for Vec<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::sequence(T::type_descriptor(), None)
    }
}

impl<T: TypeSupport, const N: usize> TypeSupport for [T; N] {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::array(T::type_descriptor(), N as u32)
    }
}

/// IDL `sequence<T, N>`. Holding more than `N` elements is possible so a
/// producer error reaches the codec, which rejects it with
/// [`OrbError::BoundViolation`] instead of truncating.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundedSequence<T, const N: u32>(pub Vec<T>);

impl<T, const N: u32> BoundedSequence<T, N> {
    pub fn new(elements: Vec<T>) -> Self {
        Self(elements)
    }

    pub const fn bound() -> u32 {
        N
    }

    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T, const N: u32> Deref for BoundedSequence<T, N> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T: DataStorageMapping, const N: u32> DataStorageMapping for BoundedSequence<T, N> {
    fn into_storage(self) -> DataStorage {
        self.0.into_storage()
    }

    fn try_from_storage(data_storage: DataStorage) -> OrbResult<Self> {
        let elements = Vec::<T>::try_from_storage(data_storage)?;
        if elements.len() > N as usize {
            return Err(OrbError::BoundViolation {
                bound: N,
                length: elements.len(),
            });
        }
        Ok(Self(elements))
    }
}

impl<T: TypeSupport, const N: u32> TypeSupport for BoundedSequence<T, N> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::sequence(T::type_descriptor(), Some(N))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_kinds_are_distinct() {
        assert_eq!(String::type_descriptor(), TypeDescriptor::string());
        assert_eq!(WString::type_descriptor(), TypeDescriptor::wstring());
        assert_eq!(char::type_descriptor(), TypeDescriptor::char());
        assert_eq!(WChar::type_descriptor(), TypeDescriptor::wchar());
    }

    #[test]
    fn container_descriptors() {
        assert_eq!(
            BoundedSequence::<WString, 10>::type_descriptor(),
            TypeDescriptor::sequence(TypeDescriptor::wstring(), Some(10))
        );
        assert_eq!(
            <[u16; 4]>::type_descriptor(),
            TypeDescriptor::array(TypeDescriptor::ushort(), 4)
        );
        assert_eq!(
            Vec::<Vec<u8>>::type_descriptor(),
            TypeDescriptor::sequence(TypeDescriptor::sequence(TypeDescriptor::octet(), None), None)
        );
    }

    #[test]
    fn bounded_sequence_rejects_oversized_payload() {
        let storage = vec![1u8, 2, 3].into_storage();
        assert_eq!(
            BoundedSequence::<u8, 2>::try_from_storage(storage),
            Err(OrbError::BoundViolation {
                bound: 2,
                length: 3
            })
        );
    }
}
