use crate::{
    error::{OrbError, OrbResult},
    xtypes::{
        data_storage::DataStorage,
        dynamic_value::DynamicValue,
        type_descriptor::{StructDescriptor, TypeDescriptor, TypeKind},
    },
};

/// Builder for a struct value whose type is only known at runtime. Every
/// member starts at its zero value.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    type_descriptor: TypeDescriptor,
    fields: Vec<DataStorage>,
}

impl StructValue {
    pub fn new(type_descriptor: TypeDescriptor) -> OrbResult<Self> {
        let fields = match type_descriptor.default_value() {
            DataStorage::Struct(fields) if type_descriptor.as_struct().is_some() => fields,
            _ => {
                return Err(OrbError::TypeMismatch {
                    expected: "struct".to_string(),
                    found: type_descriptor.type_name(),
                })
            }
        };
        Ok(Self {
            type_descriptor,
            fields,
        })
    }

    fn descriptor(&self) -> &StructDescriptor {
        match self.type_descriptor.resolve_alias().kind() {
            TypeKind::Struct(s) => s,
            _ => unreachable!("checked when the value was created"),
        }
    }

    fn member_index(&self, name: &str) -> OrbResult<usize> {
        let descriptor = self.descriptor();
        descriptor.member_index(name).ok_or_else(|| {
            OrbError::PreconditionNotMet(format!(
                "struct {} has no member {name}",
                descriptor.name
            ))
        })
    }

    pub fn type_descriptor(&self) -> &TypeDescriptor {
        &self.type_descriptor
    }

    pub(crate) fn fields(&self) -> &[DataStorage] {
        &self.fields
    }

    /// Stores `value` in member `name`. A member of type `any` takes the
    /// value as its content.
    pub fn set(&mut self, name: &str, value: DynamicValue) -> OrbResult<()> {
        let index = self.member_index(name)?;
        let member_type = &self.descriptor().members[index].r#type;
        let storage = if matches!(member_type.resolve_alias().kind(), TypeKind::Any)
            && !matches!(value.type_descriptor().resolve_alias().kind(), TypeKind::Any)
        {
            DataStorage::Any(Box::new(value))
        } else {
            if !value.type_descriptor().is_assignable_to(member_type) {
                return Err(OrbError::TypeMismatch {
                    expected: member_type.type_name(),
                    found: value.type_descriptor().type_name(),
                });
            }
            value.into_parts().1
        };
        self.fields[index] = storage;
        Ok(())
    }

    /// Copy of member `name`. Recursive markers in its type are replaced by
    /// this struct's descriptor.
    pub fn get(&self, name: &str) -> OrbResult<DynamicValue> {
        let index = self.member_index(name)?;
        let descriptor = self.descriptor();
        let member_type = descriptor.members[index]
            .r#type
            .substitute_recursive(&descriptor.name, self.type_descriptor.resolve_alias());
        Ok(DynamicValue::from_parts(
            member_type,
            self.fields[index].clone(),
        ))
    }
}

impl From<StructValue> for DynamicValue {
    fn from(value: StructValue) -> Self {
        DynamicValue::from_parts(value.type_descriptor, DataStorage::Struct(value.fields))
    }
}

impl TryFrom<DynamicValue> for StructValue {
    type Error = OrbError;

    fn try_from(value: DynamicValue) -> OrbResult<Self> {
        let (type_descriptor, storage) = value.into_parts();
        match (type_descriptor.as_struct(), storage) {
            (Some(descriptor), DataStorage::Struct(fields))
                if descriptor.members.len() != fields.len() =>
            {
                Err(OrbError::InvalidData(format!(
                    "struct {} has {} members but the value holds {}",
                    descriptor.name,
                    descriptor.members.len(),
                    fields.len()
                )))
            }
            (Some(_), DataStorage::Struct(fields)) => Ok(Self {
                type_descriptor,
                fields,
            }),
            (_, other) => Err(OrbError::TypeMismatch {
                expected: "struct".to_string(),
                found: other.kind_name().to_string(),
            }),
        }
    }
}
