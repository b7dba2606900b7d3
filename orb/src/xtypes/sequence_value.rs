use crate::{
    error::{OrbError, OrbResult},
    xtypes::{
        data_storage::DataStorage,
        dynamic_value::DynamicValue,
        type_descriptor::{TypeDescriptor, TypeKind},
    },
};

/// Runtime-typed sequence. Pushing past `max_len` is allowed; the bound is
/// enforced when the sequence is encoded, never by truncation.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceValue {
    element_type: TypeDescriptor,
    elements: Vec<DataStorage>,
    max_len: Option<u32>,
}

impl SequenceValue {
    /// A `max_len` of 0 means unbounded.
    pub fn new(element_type: TypeDescriptor, max_len: Option<u32>) -> Self {
        Self {
            element_type,
            elements: Vec::new(),
            max_len: max_len.filter(|b| *b != 0),
        }
    }

    pub(crate) fn from_parts(
        element_type: TypeDescriptor,
        elements: Vec<DataStorage>,
        max_len: Option<u32>,
    ) -> Self {
        Self {
            element_type,
            elements,
            max_len: max_len.filter(|b| *b != 0),
        }
    }

    pub(crate) fn storage_elements(&self) -> &[DataStorage] {
        &self.elements
    }

    /// Empty sequence of a (possibly aliased) sequence type.
    pub fn of_type(type_descriptor: &TypeDescriptor) -> OrbResult<Self> {
        match type_descriptor.resolve_alias().kind() {
            TypeKind::Sequence { element, bound } => Ok(Self::new(element.clone(), *bound)),
            _ => Err(OrbError::TypeMismatch {
                expected: "sequence".to_string(),
                found: type_descriptor.type_name(),
            }),
        }
    }

    pub fn element_type(&self) -> &TypeDescriptor {
        &self.element_type
    }

    pub fn max_len(&self) -> Option<u32> {
        self.max_len
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn push(&mut self, value: DynamicValue) -> OrbResult<()> {
        if !value.type_descriptor().is_assignable_to(&self.element_type) {
            return Err(OrbError::TypeMismatch {
                expected: self.element_type.type_name(),
                found: value.type_descriptor().type_name(),
            });
        }
        self.elements.push(value.into_parts().1);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<DynamicValue> {
        self.elements
            .get(index)
            .map(|e| DynamicValue::from_parts(self.element_type.clone(), e.clone()))
    }

    pub fn elements(&self) -> impl Iterator<Item = DynamicValue> + '_ {
        self.elements
            .iter()
            .map(|e| DynamicValue::from_parts(self.element_type.clone(), e.clone()))
    }

    pub fn type_descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::sequence(self.element_type.clone(), self.max_len)
    }
}

impl From<SequenceValue> for DynamicValue {
    fn from(value: SequenceValue) -> Self {
        DynamicValue::from_parts(
            value.type_descriptor(),
            DataStorage::Sequence(value.elements),
        )
    }
}

impl TryFrom<DynamicValue> for SequenceValue {
    type Error = OrbError;

    fn try_from(value: DynamicValue) -> OrbResult<Self> {
        let mut sequence = Self::of_type(value.type_descriptor())?;
        match value.into_parts().1 {
            DataStorage::Sequence(elements) => {
                sequence.elements = elements;
                Ok(sequence)
            }
            other => Err(OrbError::TypeMismatch {
                expected: "sequence".to_string(),
                found: other.kind_name().to_string(),
            }),
        }
    }
}
