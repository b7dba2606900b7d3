use crate::{
    error::{OrbError, OrbResult},
    xtypes::{
        data_storage::{DataStorage, UnionStorage},
        dynamic_value::DynamicValue,
        type_descriptor::{TypeDescriptor, TypeKind, UnionDescriptor, UnionLabel},
    },
};

#[derive(Debug, Clone, PartialEq)]
struct ActiveBranch {
    discriminant: i64,
    branch: usize,
    value: DataStorage,
}

/// Discriminated union built at runtime. It starts without a value; once a
/// discriminant is set exactly one branch is active.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionValue {
    type_descriptor: TypeDescriptor,
    active: Option<ActiveBranch>,
}

impl UnionValue {
    pub fn new(type_descriptor: TypeDescriptor) -> OrbResult<Self> {
        if type_descriptor.as_union().is_none() {
            return Err(OrbError::TypeMismatch {
                expected: "union".to_string(),
                found: type_descriptor.type_name(),
            });
        }
        Ok(Self {
            type_descriptor,
            active: None,
        })
    }

    pub fn type_descriptor(&self) -> &TypeDescriptor {
        &self.type_descriptor
    }

    /// Selects the branch labelled `discriminant`, or the default branch. A
    /// change of branch replaces the stored value by the zero value of the
    /// new branch.
    pub fn set_discriminant(&mut self, discriminant: i64) -> OrbResult<()> {
        let descriptor = union_descriptor(&self.type_descriptor);
        if !descriptor.discriminant_in_range(discriminant) {
            return Err(OrbError::UnknownDiscriminant(discriminant));
        }
        let branch = descriptor
            .select_branch(discriminant)
            .ok_or(OrbError::UnknownDiscriminant(discriminant))?;
        let value = match self.active.take() {
            Some(active) if active.branch == branch => active.value,
            _ => descriptor.branches[branch].r#type.default_value(),
        };
        self.active = Some(ActiveBranch {
            discriminant,
            branch,
            value,
        });
        Ok(())
    }

    /// Activates branch `name` holding `value`. The discriminant is kept
    /// when the branch is already active, otherwise it becomes the first
    /// label of the branch.
    pub fn set(&mut self, name: &str, value: DynamicValue) -> OrbResult<()> {
        let descriptor = union_descriptor(&self.type_descriptor);
        let branch = descriptor
            .branches
            .iter()
            .position(|b| b.name == name)
            .ok_or_else(|| {
                OrbError::PreconditionNotMet(format!(
                    "union {} has no branch {name}",
                    descriptor.name
                ))
            })?;
        let branch_type = &descriptor.branches[branch].r#type;
        if !value.type_descriptor().is_assignable_to(branch_type) {
            return Err(OrbError::TypeMismatch {
                expected: branch_type.type_name(),
                found: value.type_descriptor().type_name(),
            });
        }
        let discriminant = match &self.active {
            Some(active) if active.branch == branch => active.discriminant,
            _ => match descriptor.branches[branch].labels.first() {
                Some(UnionLabel::Value(v)) => *v,
                _ => descriptor.implicit_default_discriminant().ok_or_else(|| {
                    OrbError::PreconditionNotMet(format!(
                        "default branch of union {} has no free discriminant",
                        descriptor.name
                    ))
                })?,
            },
        };
        self.active = Some(ActiveBranch {
            discriminant,
            branch,
            value: value.into_parts().1,
        });
        Ok(())
    }

    pub(crate) fn active_storage(&self) -> Option<(i64, &DataStorage)> {
        self.active.as_ref().map(|a| (a.discriminant, &a.value))
    }

    pub fn discriminant(&self) -> Option<i64> {
        self.active.as_ref().map(|a| a.discriminant)
    }

    /// Name and value of the active branch.
    pub fn active_branch(&self) -> Option<(&str, DynamicValue)> {
        let active = self.active.as_ref()?;
        let descriptor = union_descriptor(&self.type_descriptor);
        let branch = &descriptor.branches[active.branch];
        let branch_type = branch
            .r#type
            .substitute_recursive(&descriptor.name, self.type_descriptor.resolve_alias());
        Some((
            branch.name.as_str(),
            DynamicValue::from_parts(branch_type, active.value.clone()),
        ))
    }
}

fn union_descriptor(type_descriptor: &TypeDescriptor) -> &UnionDescriptor {
    match type_descriptor.resolve_alias().kind() {
        TypeKind::Union(u) => u,
        _ => unreachable!("checked when the value was created"),
    }
}

impl TryFrom<UnionValue> for DynamicValue {
    type Error = OrbError;

    fn try_from(value: UnionValue) -> OrbResult<Self> {
        let active = value.active.ok_or_else(|| {
            OrbError::PreconditionNotMet("union has no discriminant set".to_string())
        })?;
        Ok(DynamicValue::from_parts(
            value.type_descriptor,
            DataStorage::Union(Box::new(UnionStorage {
                discriminant: active.discriminant,
                value: active.value,
            })),
        ))
    }
}

impl TryFrom<DynamicValue> for UnionValue {
    type Error = OrbError;

    fn try_from(value: DynamicValue) -> OrbResult<Self> {
        let (type_descriptor, storage) = value.into_parts();
        let mut union = UnionValue::new(type_descriptor)?;
        match storage {
            DataStorage::Union(u) => {
                let branch = union_descriptor(&union.type_descriptor)
                    .select_branch(u.discriminant)
                    .ok_or(OrbError::UnknownDiscriminant(u.discriminant))?;
                union.active = Some(ActiveBranch {
                    discriminant: u.discriminant,
                    branch,
                    value: u.value,
                });
                Ok(union)
            }
            other => Err(OrbError::TypeMismatch {
                expected: "union".to_string(),
                found: other.kind_name().to_string(),
            }),
        }
    }
}
