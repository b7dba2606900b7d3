use crate::{
    error::{OrbError, OrbResult},
    reference::ObjectReference,
    xtypes::data_storage::{DataStorage, UnionStorage},
};
use std::sync::Arc;

/// Name of the interface every object reference is assignable to.
pub const OBJECT_INTERFACE: &str = "Object";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Octet,
    Boolean,
    Short,
    UShort,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    Char,
    WChar,
}

impl PrimitiveKind {
    pub fn idl_name(self) -> &'static str {
        match self {
            PrimitiveKind::Octet => "octet",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Short => "short",
            PrimitiveKind::UShort => "unsigned short",
            PrimitiveKind::Long => "long",
            PrimitiveKind::ULong => "unsigned long",
            PrimitiveKind::LongLong => "long long",
            PrimitiveKind::ULongLong => "unsigned long long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Char => "char",
            PrimitiveKind::WChar => "wchar",
        }
    }

    /// Inclusive range of discriminant labels this kind can carry, `None` for
    /// kinds that cannot discriminate a union.
    fn label_range(self) -> Option<(i64, i64)> {
        match self {
            PrimitiveKind::Boolean => Some((0, 1)),
            PrimitiveKind::Octet | PrimitiveKind::Char => Some((0, u8::MAX as i64)),
            PrimitiveKind::WChar => Some((0, char::MAX as i64)),
            PrimitiveKind::Short => Some((i16::MIN as i64, i16::MAX as i64)),
            PrimitiveKind::UShort => Some((0, u16::MAX as i64)),
            PrimitiveKind::Long => Some((i32::MIN as i64, i32::MAX as i64)),
            PrimitiveKind::ULong => Some((0, u32::MAX as i64)),
            // unsigned long long labels above i64::MAX wrap to negative values
            PrimitiveKind::LongLong | PrimitiveKind::ULongLong => Some((i64::MIN, i64::MAX)),
            PrimitiveKind::Float | PrimitiveKind::Double => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescriptor {
    pub name: String,
    pub r#type: TypeDescriptor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDescriptor {
    pub name: String,
    pub members: Vec<MemberDescriptor>,
}

impl StructDescriptor {
    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDescriptor {
    pub name: String,
    pub enumerators: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionLabel {
    Value(i64),
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionBranch {
    pub labels: Vec<UnionLabel>,
    pub name: String,
    pub r#type: TypeDescriptor,
}

impl UnionBranch {
    pub fn new(label: UnionLabel, name: impl Into<String>, r#type: TypeDescriptor) -> Self {
        Self {
            labels: vec![label],
            name: name.into(),
            r#type,
        }
    }

    pub fn with_labels(
        labels: Vec<UnionLabel>,
        name: impl Into<String>,
        r#type: TypeDescriptor,
    ) -> Self {
        Self {
            labels,
            name: name.into(),
            r#type,
        }
    }

    fn is_default(&self) -> bool {
        self.labels.contains(&UnionLabel::Default)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionDescriptor {
    pub name: String,
    pub discriminant_type: TypeDescriptor,
    pub branches: Vec<UnionBranch>,
}

impl UnionDescriptor {
    /// Branch selected by `discriminant`: the exact label first, the default
    /// branch otherwise.
    pub fn select_branch(&self, discriminant: i64) -> Option<usize> {
        self.branches
            .iter()
            .position(|b| b.labels.contains(&UnionLabel::Value(discriminant)))
            .or_else(|| self.default_branch())
    }

    pub fn default_branch(&self) -> Option<usize> {
        self.branches.iter().position(UnionBranch::is_default)
    }

    fn explicit_labels(&self) -> impl Iterator<Item = i64> + '_ {
        self.branches.iter().flat_map(|b| {
            b.labels.iter().filter_map(|l| match l {
                UnionLabel::Value(v) => Some(*v),
                UnionLabel::Default => None,
            })
        })
    }

    fn label_range(&self) -> Option<(i64, i64)> {
        match self.discriminant_type.resolve_alias().kind() {
            TypeKind::Primitive(p) => p.label_range(),
            TypeKind::Enum(e) if !e.enumerators.is_empty() => {
                Some((0, e.enumerators.len() as i64 - 1))
            }
            _ => None,
        }
    }

    pub fn discriminant_in_range(&self, discriminant: i64) -> bool {
        self.label_range()
            .is_some_and(|(min, max)| (min..=max).contains(&discriminant))
    }

    /// Smallest in-range discriminant not claimed by any explicit label. This
    /// is the discriminant written when the default branch is active but no
    /// explicit value was given.
    pub fn implicit_default_discriminant(&self) -> Option<i64> {
        let (min, max) = self.label_range()?;
        let explicit: Vec<i64> = self.explicit_labels().collect();
        let start = min.max(0);
        (0..=explicit.len() as i64)
            .filter_map(|offset| start.checked_add(offset))
            .filter(|candidate| *candidate <= max)
            .find(|candidate| !explicit.contains(candidate))
    }

    fn validate(&self) -> OrbResult<()> {
        let (min, max) = self.label_range().ok_or_else(|| {
            OrbError::InvalidDescriptor(format!(
                "union {} cannot be discriminated by {}",
                self.name,
                self.discriminant_type.type_name()
            ))
        })?;
        if self.branches.is_empty() {
            return Err(OrbError::InvalidDescriptor(format!(
                "union {} declares no branch",
                self.name
            )));
        }
        let mut seen = Vec::new();
        let mut defaults = 0;
        for branch in &self.branches {
            if branch.labels.is_empty() {
                return Err(OrbError::InvalidDescriptor(format!(
                    "branch {} of union {} has no label",
                    branch.name, self.name
                )));
            }
            for label in &branch.labels {
                match label {
                    UnionLabel::Default => defaults += 1,
                    UnionLabel::Value(v) => {
                        if *v < min || *v > max {
                            return Err(OrbError::InvalidDescriptor(format!(
                                "label {v} of union {} is outside the discriminant range",
                                self.name
                            )));
                        }
                        if seen.contains(v) {
                            return Err(OrbError::InvalidDescriptor(format!(
                                "label {v} appears twice in union {}",
                                self.name
                            )));
                        }
                        seen.push(*v);
                    }
                }
            }
        }
        if defaults > 1 {
            return Err(OrbError::InvalidDescriptor(format!(
                "union {} declares {defaults} default branches",
                self.name
            )));
        }
        if defaults == 1 && self.implicit_default_discriminant().is_none() {
            return Err(OrbError::InvalidDescriptor(format!(
                "default branch of union {} is unreachable, every discriminant is labelled",
                self.name
            )));
        }
        Ok(())
    }

    /// Checks that a peer's branch table selects the same branches with
    /// compatible types. Run once when the peers agree on their types, never
    /// per value.
    pub fn verify_compatible(&self, other: &UnionDescriptor) -> OrbResult<()> {
        let mismatch = |reason: String| {
            Err(OrbError::InvalidDescriptor(format!(
                "union {} branch tables differ: {reason}",
                self.name
            )))
        };
        if self.name != other.name {
            return mismatch(format!("other union is named {}", other.name));
        }
        if !self.discriminant_type.is_assignable_to(&other.discriminant_type)
            || !other.discriminant_type.is_assignable_to(&self.discriminant_type)
        {
            return mismatch("discriminant types differ".to_string());
        }
        if self.default_branch().is_some() != other.default_branch().is_some() {
            return mismatch("only one side declares a default branch".to_string());
        }
        if self.branches.len() != other.branches.len() {
            return mismatch(format!(
                "{} branches against {}",
                self.branches.len(),
                other.branches.len()
            ));
        }
        for (mine, theirs) in self.branches.iter().zip(&other.branches) {
            let same_labels = mine.labels.len() == theirs.labels.len()
                && mine.labels.iter().all(|l| theirs.labels.contains(l));
            if !same_labels {
                return mismatch(format!("labels of branch {} differ", mine.name));
            }
            if !mine.r#type.is_assignable_to(&theirs.r#type)
                || !theirs.r#type.is_assignable_to(&mine.r#type)
            {
                return mismatch(format!("type of branch {} differs", mine.name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// Type of an empty dynamic value.
    Null,
    Primitive(PrimitiveKind),
    String,
    WString,
    Any,
    Enum(EnumDescriptor),
    Struct(StructDescriptor),
    Union(UnionDescriptor),
    Sequence {
        element: TypeDescriptor,
        bound: Option<u32>,
    },
    Array {
        element: TypeDescriptor,
        length: u32,
    },
    Alias {
        name: String,
        underlying: TypeDescriptor,
    },
    ObjectRef {
        interface: String,
    },
    /// Back-reference to the enclosing struct or union with this name.
    Recursive {
        name: String,
    },
}

/// Runtime description of an IDL type. Cloning is cheap, the description is
/// shared.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor(Arc<TypeKind>);

impl Default for TypeDescriptor {
    fn default() -> Self {
        Self::null()
    }
}

impl TypeDescriptor {
    /// Builds a descriptor, checking the constraints that must hold before
    /// any value of the type is marshaled.
    pub fn describe(kind: TypeKind) -> OrbResult<Self> {
        match &kind {
            TypeKind::Union(u) => u.validate()?,
            TypeKind::Struct(s) => {
                for (index, member) in s.members.iter().enumerate() {
                    if s.members[..index].iter().any(|m| m.name == member.name) {
                        return Err(OrbError::InvalidDescriptor(format!(
                            "member {} appears twice in struct {}",
                            member.name, s.name
                        )));
                    }
                    if matches!(member.r#type.kind(), TypeKind::Recursive { name } if *name == s.name)
                    {
                        return Err(OrbError::InvalidDescriptor(format!(
                            "struct {} contains itself directly through member {}",
                            s.name, member.name
                        )));
                    }
                }
            }
            TypeKind::Sequence {
                bound: Some(0), ..
            } => {
                return Err(OrbError::InvalidDescriptor(
                    "a sequence bound must be greater than 0".to_string(),
                ))
            }
            TypeKind::Enum(e) if e.enumerators.is_empty() => {
                return Err(OrbError::InvalidDescriptor(format!(
                    "enum {} has no enumerator",
                    e.name
                )))
            }
            _ => (),
        }
        Ok(Self::from_kind(kind))
    }

    pub(crate) fn from_kind(kind: TypeKind) -> Self {
        Self(Arc::new(kind))
    }

    pub fn null() -> Self {
        Self::from_kind(TypeKind::Null)
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::from_kind(TypeKind::Primitive(kind))
    }

    pub fn octet() -> Self {
        Self::primitive(PrimitiveKind::Octet)
    }

    pub fn boolean() -> Self {
        Self::primitive(PrimitiveKind::Boolean)
    }

    pub fn short() -> Self {
        Self::primitive(PrimitiveKind::Short)
    }

    pub fn ushort() -> Self {
        Self::primitive(PrimitiveKind::UShort)
    }

    pub fn long() -> Self {
        Self::primitive(PrimitiveKind::Long)
    }

    pub fn ulong() -> Self {
        Self::primitive(PrimitiveKind::ULong)
    }

    pub fn longlong() -> Self {
        Self::primitive(PrimitiveKind::LongLong)
    }

    pub fn ulonglong() -> Self {
        Self::primitive(PrimitiveKind::ULongLong)
    }

    pub fn float() -> Self {
        Self::primitive(PrimitiveKind::Float)
    }

    pub fn double() -> Self {
        Self::primitive(PrimitiveKind::Double)
    }

    pub fn char() -> Self {
        Self::primitive(PrimitiveKind::Char)
    }

    pub fn wchar() -> Self {
        Self::primitive(PrimitiveKind::WChar)
    }

    pub fn string() -> Self {
        Self::from_kind(TypeKind::String)
    }

    pub fn wstring() -> Self {
        Self::from_kind(TypeKind::WString)
    }

    pub fn any() -> Self {
        Self::from_kind(TypeKind::Any)
    }

    pub fn object_ref(interface: impl Into<String>) -> Self {
        Self::from_kind(TypeKind::ObjectRef {
            interface: interface.into(),
        })
    }

    /// A bound of 0 means unbounded, as it does in type codes.
    pub fn sequence(element: TypeDescriptor, bound: Option<u32>) -> Self {
        Self::from_kind(TypeKind::Sequence {
            element,
            bound: bound.filter(|b| *b != 0),
        })
    }

    pub fn array(element: TypeDescriptor, length: u32) -> Self {
        Self::from_kind(TypeKind::Array { element, length })
    }

    pub fn alias(name: impl Into<String>, underlying: TypeDescriptor) -> Self {
        Self::from_kind(TypeKind::Alias {
            name: name.into(),
            underlying,
        })
    }

    pub fn recursive(name: impl Into<String>) -> Self {
        Self::from_kind(TypeKind::Recursive { name: name.into() })
    }

    pub fn enumeration<S: Into<String>>(
        name: impl Into<String>,
        enumerators: impl IntoIterator<Item = S>,
    ) -> OrbResult<Self> {
        Self::describe(TypeKind::Enum(EnumDescriptor {
            name: name.into(),
            enumerators: enumerators.into_iter().map(Into::into).collect(),
        }))
    }

    pub fn structure<S: Into<String>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (S, TypeDescriptor)>,
    ) -> OrbResult<Self> {
        Self::describe(TypeKind::Struct(StructDescriptor {
            name: name.into(),
            members: members
                .into_iter()
                .map(|(name, r#type)| MemberDescriptor {
                    name: name.into(),
                    r#type,
                })
                .collect(),
        }))
    }

    pub fn union(
        name: impl Into<String>,
        discriminant_type: TypeDescriptor,
        branches: Vec<UnionBranch>,
    ) -> OrbResult<Self> {
        Self::describe(TypeKind::Union(UnionDescriptor {
            name: name.into(),
            discriminant_type,
            branches,
        }))
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0
    }

    /// Identifier of named kinds (alias, enum, struct, union, object
    /// reference, recursive marker).
    pub fn name(&self) -> Option<&str> {
        match self.kind() {
            TypeKind::Enum(e) => Some(&e.name),
            TypeKind::Struct(s) => Some(&s.name),
            TypeKind::Union(u) => Some(&u.name),
            TypeKind::Alias { name, .. } | TypeKind::Recursive { name } => Some(name),
            TypeKind::ObjectRef { interface } => Some(interface),
            _ => None,
        }
    }

    /// Human readable IDL spelling, used in error reports.
    pub fn type_name(&self) -> String {
        match self.kind() {
            TypeKind::Null => "null".to_string(),
            TypeKind::Primitive(p) => p.idl_name().to_string(),
            TypeKind::String => "string".to_string(),
            TypeKind::WString => "wstring".to_string(),
            TypeKind::Any => "any".to_string(),
            TypeKind::Sequence {
                element,
                bound: None,
            } => format!("sequence<{}>", element.type_name()),
            TypeKind::Sequence {
                element,
                bound: Some(bound),
            } => format!("sequence<{}, {}>", element.type_name(), bound),
            TypeKind::Array { element, length } => format!("{}[{}]", element.type_name(), length),
            _ => self.name().unwrap_or_default().to_string(),
        }
    }

    pub fn as_struct(&self) -> Option<&StructDescriptor> {
        match self.resolve_alias().kind() {
            TypeKind::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_union(&self) -> Option<&UnionDescriptor> {
        match self.resolve_alias().kind() {
            TypeKind::Union(u) => Some(u),
            _ => None,
        }
    }

    /// Follows alias chains down to the first non-alias type.
    pub fn resolve_alias(&self) -> &TypeDescriptor {
        let mut current = self;
        while let TypeKind::Alias { underlying, .. } = current.kind() {
            current = underlying;
        }
        current
    }

    pub fn is_assignable_to(&self, expected: &TypeDescriptor) -> bool {
        is_assignable(self, expected)
    }

    /// Same type with every alias, at any depth, replaced by its underlying
    /// type.
    pub fn collapse_aliases(&self) -> TypeDescriptor {
        self.map_kind(&|d| match d.kind() {
            TypeKind::Alias { underlying, .. } => Some(underlying.collapse_aliases()),
            _ => None,
        })
    }

    /// Replaces the back-references to `name` by `with`. Descending stops at
    /// a nested struct or union of that name since its markers refer to it.
    pub fn substitute_recursive(&self, name: &str, with: &TypeDescriptor) -> TypeDescriptor {
        self.map_kind(&|d| match d.kind() {
            TypeKind::Recursive { name: n } if n == name => Some(with.clone()),
            TypeKind::Struct(_) | TypeKind::Union(_) if d.name() == Some(name) => Some(d.clone()),
            _ => None,
        })
    }

    fn map_kind(&self, f: &dyn Fn(&TypeDescriptor) -> Option<TypeDescriptor>) -> TypeDescriptor {
        if let Some(replaced) = f(self) {
            return replaced;
        }
        let kind = match self.kind() {
            TypeKind::Struct(s) => TypeKind::Struct(StructDescriptor {
                name: s.name.clone(),
                members: s
                    .members
                    .iter()
                    .map(|m| MemberDescriptor {
                        name: m.name.clone(),
                        r#type: m.r#type.map_kind(f),
                    })
                    .collect(),
            }),
            TypeKind::Union(u) => TypeKind::Union(UnionDescriptor {
                name: u.name.clone(),
                discriminant_type: u.discriminant_type.map_kind(f),
                branches: u
                    .branches
                    .iter()
                    .map(|b| UnionBranch {
                        labels: b.labels.clone(),
                        name: b.name.clone(),
                        r#type: b.r#type.map_kind(f),
                    })
                    .collect(),
            }),
            TypeKind::Sequence { element, bound } => TypeKind::Sequence {
                element: element.map_kind(f),
                bound: *bound,
            },
            TypeKind::Array { element, length } => TypeKind::Array {
                element: element.map_kind(f),
                length: *length,
            },
            TypeKind::Alias { name, underlying } => TypeKind::Alias {
                name: name.clone(),
                underlying: underlying.map_kind(f),
            },
            _ => return self.clone(),
        };
        Self::from_kind(kind)
    }

    /// Zero value of this type: zeroed primitives, empty strings and
    /// sequences, defaulted members, a union at its first branch.
    pub fn default_value(&self) -> DataStorage {
        match self.resolve_alias().kind() {
            TypeKind::Null | TypeKind::Recursive { .. } => DataStorage::Null,
            TypeKind::Primitive(p) => match p {
                PrimitiveKind::Octet => DataStorage::Octet(0),
                PrimitiveKind::Boolean => DataStorage::Boolean(false),
                PrimitiveKind::Short => DataStorage::Short(0),
                PrimitiveKind::UShort => DataStorage::UShort(0),
                PrimitiveKind::Long => DataStorage::Long(0),
                PrimitiveKind::ULong => DataStorage::ULong(0),
                PrimitiveKind::LongLong => DataStorage::LongLong(0),
                PrimitiveKind::ULongLong => DataStorage::ULongLong(0),
                PrimitiveKind::Float => DataStorage::Float(0.0),
                PrimitiveKind::Double => DataStorage::Double(0.0),
                PrimitiveKind::Char => DataStorage::Char('\0'),
                PrimitiveKind::WChar => DataStorage::WChar('\0'),
            },
            TypeKind::String => DataStorage::String(String::new()),
            TypeKind::WString => DataStorage::WString(String::new()),
            TypeKind::Any => DataStorage::Any(Box::default()),
            TypeKind::Enum(_) => DataStorage::Enum(0),
            TypeKind::Struct(s) => {
                DataStorage::Struct(s.members.iter().map(|m| m.r#type.default_value()).collect())
            }
            TypeKind::Union(u) => match u.branches.first() {
                Some(first) => {
                    let discriminant = match first.labels.first() {
                        Some(UnionLabel::Value(v)) => *v,
                        _ => u.implicit_default_discriminant().unwrap_or_default(),
                    };
                    DataStorage::Union(Box::new(UnionStorage {
                        discriminant,
                        value: first.r#type.default_value(),
                    }))
                }
                None => DataStorage::Null,
            },
            TypeKind::Sequence { .. } => DataStorage::Sequence(Vec::new()),
            TypeKind::Array { element, length } => {
                DataStorage::Array((0..*length).map(|_| element.default_value()).collect())
            }
            TypeKind::ObjectRef { .. } => DataStorage::ObjectRef(ObjectReference::nil()),
            TypeKind::Alias { .. } => unreachable!("aliases are resolved above"),
        }
    }
}

/// Structural assignability with nominal struct, union and enum identity.
/// Aliases are transparent, bounded sequences accept candidates whose bound
/// does not exceed theirs and recursive markers compare by the name they
/// refer to.
pub fn is_assignable(value_type: &TypeDescriptor, expected_type: &TypeDescriptor) -> bool {
    let value = value_type.resolve_alias();
    let expected = expected_type.resolve_alias();
    match (value.kind(), expected.kind()) {
        (TypeKind::Null, _) | (_, TypeKind::Null) => false,
        (TypeKind::Primitive(a), TypeKind::Primitive(b)) => a == b,
        (TypeKind::String, TypeKind::String)
        | (TypeKind::WString, TypeKind::WString)
        | (TypeKind::Any, TypeKind::Any) => true,
        (TypeKind::Enum(a), TypeKind::Enum(b)) => a.name == b.name,
        (TypeKind::Struct(a), TypeKind::Struct(b)) => a.name == b.name,
        (TypeKind::Union(a), TypeKind::Union(b)) => a.name == b.name,
        (TypeKind::Recursive { name }, TypeKind::Struct(StructDescriptor { name: other, .. }))
        | (TypeKind::Recursive { name }, TypeKind::Union(UnionDescriptor { name: other, .. }))
        | (TypeKind::Struct(StructDescriptor { name, .. }), TypeKind::Recursive { name: other })
        | (TypeKind::Union(UnionDescriptor { name, .. }), TypeKind::Recursive { name: other })
        | (TypeKind::Recursive { name }, TypeKind::Recursive { name: other }) => name == other,
        (
            TypeKind::Sequence {
                element: value_element,
                bound: value_bound,
            },
            TypeKind::Sequence {
                element: expected_element,
                bound: expected_bound,
            },
        ) => {
            let bound_fits = match (value_bound, expected_bound) {
                (_, None) => true,
                (Some(v), Some(e)) => v <= e,
                (None, Some(_)) => false,
            };
            bound_fits && is_assignable(value_element, expected_element)
        }
        (
            TypeKind::Array {
                element: value_element,
                length: value_length,
            },
            TypeKind::Array {
                element: expected_element,
                length: expected_length,
            },
        ) => value_length == expected_length && is_assignable(value_element, expected_element),
        (TypeKind::ObjectRef { interface: a }, TypeKind::ObjectRef { interface: b }) => {
            a == b || b == OBJECT_INTERFACE
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> TypeDescriptor {
        TypeDescriptor::structure(
            "Point",
            [("x", TypeDescriptor::long()), ("y", TypeDescriptor::long())],
        )
        .unwrap()
    }

    #[test]
    fn primitives_must_match_exactly() {
        assert!(TypeDescriptor::long().is_assignable_to(&TypeDescriptor::long()));
        assert!(!TypeDescriptor::long().is_assignable_to(&TypeDescriptor::ulong()));
        assert!(!TypeDescriptor::long().is_assignable_to(&TypeDescriptor::wstring()));
    }

    #[test]
    fn aliases_are_assignable_both_ways() {
        let my_long = TypeDescriptor::alias("MyLong", TypeDescriptor::long());
        assert!(my_long.is_assignable_to(&TypeDescriptor::long()));
        assert!(TypeDescriptor::long().is_assignable_to(&my_long));
        assert_eq!(my_long.name(), Some("MyLong"));
    }

    #[test]
    fn structs_are_nominal() {
        let same_shape = TypeDescriptor::structure(
            "Vector",
            [("x", TypeDescriptor::long()), ("y", TypeDescriptor::long())],
        )
        .unwrap();
        assert!(point().is_assignable_to(&point()));
        assert!(!point().is_assignable_to(&same_shape));
    }

    #[test]
    fn bounded_sequence_assignability() {
        let unbounded = TypeDescriptor::sequence(TypeDescriptor::long(), None);
        let bounded_5 = TypeDescriptor::sequence(TypeDescriptor::long(), Some(5));
        let bounded_10 = TypeDescriptor::sequence(TypeDescriptor::long(), Some(10));
        assert!(bounded_5.is_assignable_to(&bounded_10));
        assert!(!bounded_10.is_assignable_to(&bounded_5));
        assert!(bounded_10.is_assignable_to(&unbounded));
        assert!(!unbounded.is_assignable_to(&bounded_10));
    }

    #[test]
    fn arrays_need_equal_length() {
        let a3 = TypeDescriptor::array(TypeDescriptor::octet(), 3);
        let a4 = TypeDescriptor::array(TypeDescriptor::octet(), 4);
        assert!(a3.is_assignable_to(&a3));
        assert!(!a3.is_assignable_to(&a4));
    }

    #[test]
    fn recursive_marker_compares_by_name_once() {
        let node = TypeDescriptor::structure(
            "Node",
            [
                ("value", TypeDescriptor::long()),
                (
                    "children",
                    TypeDescriptor::sequence(TypeDescriptor::recursive("Node"), None),
                ),
            ],
        )
        .unwrap();
        assert!(TypeDescriptor::recursive("Node").is_assignable_to(&node));
        assert!(node.is_assignable_to(&TypeDescriptor::recursive("Node")));
        assert!(!TypeDescriptor::recursive("Other").is_assignable_to(&node));
    }

    #[test]
    fn object_references_widen_to_object() {
        let callback = TypeDescriptor::object_ref("Callback");
        assert!(callback.is_assignable_to(&TypeDescriptor::object_ref(OBJECT_INTERFACE)));
        assert!(!callback.is_assignable_to(&TypeDescriptor::object_ref("Other")));
    }

    #[test]
    fn null_is_never_assignable() {
        assert!(!TypeDescriptor::null().is_assignable_to(&TypeDescriptor::null()));
    }

    #[test]
    fn union_validation_catches_configuration_errors() {
        let two_defaults = TypeDescriptor::union(
            "U",
            TypeDescriptor::long(),
            vec![
                UnionBranch::new(UnionLabel::Default, "a", TypeDescriptor::long()),
                UnionBranch::new(UnionLabel::Default, "b", TypeDescriptor::long()),
            ],
        );
        assert!(matches!(two_defaults, Err(OrbError::InvalidDescriptor(_))));

        let duplicate = TypeDescriptor::union(
            "U",
            TypeDescriptor::long(),
            vec![
                UnionBranch::new(UnionLabel::Value(1), "a", TypeDescriptor::long()),
                UnionBranch::new(UnionLabel::Value(1), "b", TypeDescriptor::long()),
            ],
        );
        assert!(matches!(duplicate, Err(OrbError::InvalidDescriptor(_))));

        let float_discriminant = TypeDescriptor::union(
            "U",
            TypeDescriptor::double(),
            vec![UnionBranch::new(
                UnionLabel::Value(1),
                "a",
                TypeDescriptor::long(),
            )],
        );
        assert!(matches!(
            float_discriminant,
            Err(OrbError::InvalidDescriptor(_))
        ));

        let unreachable_default = TypeDescriptor::union(
            "U",
            TypeDescriptor::boolean(),
            vec![
                UnionBranch::new(UnionLabel::Value(0), "f", TypeDescriptor::long()),
                UnionBranch::new(UnionLabel::Value(1), "t", TypeDescriptor::long()),
                UnionBranch::new(UnionLabel::Default, "d", TypeDescriptor::long()),
            ],
        );
        assert!(matches!(
            unreachable_default,
            Err(OrbError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn union_branch_selection_falls_back_to_default() {
        let u = TypeDescriptor::union(
            "U",
            TypeDescriptor::short(),
            vec![
                UnionBranch::with_labels(
                    vec![UnionLabel::Value(1), UnionLabel::Value(2)],
                    "small",
                    TypeDescriptor::long(),
                ),
                UnionBranch::new(UnionLabel::Default, "other", TypeDescriptor::string()),
            ],
        )
        .unwrap();
        let TypeKind::Union(u) = u.kind() else {
            panic!("union expected")
        };
        assert_eq!(u.select_branch(2), Some(0));
        assert_eq!(u.select_branch(7), Some(1));
        assert_eq!(u.implicit_default_discriminant(), Some(0));
    }

    #[test]
    fn differing_default_presence_is_incompatible() {
        let with_default = TypeDescriptor::union(
            "U",
            TypeDescriptor::long(),
            vec![
                UnionBranch::new(UnionLabel::Value(1), "a", TypeDescriptor::long()),
                UnionBranch::new(UnionLabel::Default, "b", TypeDescriptor::string()),
            ],
        )
        .unwrap();
        let without_default = TypeDescriptor::union(
            "U",
            TypeDescriptor::long(),
            vec![
                UnionBranch::new(UnionLabel::Value(1), "a", TypeDescriptor::long()),
                UnionBranch::new(UnionLabel::Value(2), "b", TypeDescriptor::string()),
            ],
        )
        .unwrap();
        let (TypeKind::Union(a), TypeKind::Union(b)) = (with_default.kind(), without_default.kind())
        else {
            panic!("unions expected")
        };
        assert!(a.verify_compatible(a).is_ok());
        assert!(matches!(
            a.verify_compatible(b),
            Err(OrbError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn struct_cannot_contain_itself_directly() {
        let direct = TypeDescriptor::structure("Loop", [("me", TypeDescriptor::recursive("Loop"))]);
        assert!(matches!(direct, Err(OrbError::InvalidDescriptor(_))));
    }

    #[test]
    fn collapse_aliases_is_deep() {
        let seq = TypeDescriptor::sequence(
            TypeDescriptor::alias("MyOctet", TypeDescriptor::octet()),
            None,
        );
        let collapsed = TypeDescriptor::alias("OctetSeq", seq).collapse_aliases();
        assert_eq!(
            collapsed,
            TypeDescriptor::sequence(TypeDescriptor::octet(), None)
        );
    }

    #[test]
    fn default_value_of_struct() {
        assert_eq!(
            point().default_value(),
            DataStorage::Struct(vec![DataStorage::Long(0), DataStorage::Long(0)])
        );
    }

    #[test]
    fn type_names() {
        assert_eq!(
            TypeDescriptor::sequence(TypeDescriptor::wstring(), Some(10)).type_name(),
            "sequence<wstring, 10>"
        );
        assert_eq!(
            TypeDescriptor::array(TypeDescriptor::ulong(), 3).type_name(),
            "unsigned long[3]"
        );
        assert_eq!(point().type_name(), "Point");
    }
}
