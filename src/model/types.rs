// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Static type representation used by the checker

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Prefix of FHIRPath system type codes in structure definitions
pub const SYSTEM_TYPE_PREFIX: &str = "http://hl7.org/fhirpath/System.";

/// FHIRPath system (primitive) types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SystemType {
    /// System.Boolean
    Boolean,
    /// System.String
    String,
    /// System.Integer
    Integer,
    /// System.Long
    Long,
    /// System.Decimal
    Decimal,
    /// System.Date
    Date,
    /// System.DateTime
    DateTime,
    /// System.Time
    Time,
    /// System.Quantity
    Quantity,
}

impl SystemType {
    /// All system types
    pub const ALL: [SystemType; 9] = [
        SystemType::Boolean,
        SystemType::String,
        SystemType::Integer,
        SystemType::Long,
        SystemType::Decimal,
        SystemType::Date,
        SystemType::DateTime,
        SystemType::Time,
        SystemType::Quantity,
    ];

    /// Unqualified name (`Boolean`)
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Long => "Long",
            Self::Decimal => "Decimal",
            Self::Date => "Date",
            Self::DateTime => "DateTime",
            Self::Time => "Time",
            Self::Quantity => "Quantity",
        }
    }

    /// Look up a system type by unqualified name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Look up a system type from a structure definition type code
    /// (`http://hl7.org/fhirpath/System.String`)
    pub fn from_code(code: &str) -> Option<Self> {
        code.strip_prefix(SYSTEM_TYPE_PREFIX)
            .and_then(Self::from_name)
    }

    /// Integer, Long or Decimal
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Long | Self::Decimal)
    }

    /// Date, DateTime or Time
    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::DateTime | Self::Time)
    }

    /// Types supporting `<`, `>`, `<=`, `>=`
    pub fn is_ordered(self) -> bool {
        !matches!(self, Self::Boolean)
    }

    /// Whether values of `self` and `other` can be ordered against each
    /// other after implicit conversion
    pub fn is_comparable_with(self, other: SystemType) -> bool {
        if self == other {
            return self.is_ordered();
        }
        (self.is_numeric() && other.is_numeric())
            || matches!(
                (self, other),
                (Self::Date, Self::DateTime) | (Self::DateTime, Self::Date)
            )
    }
}

impl fmt::Display for SystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "System.{}", self.name())
    }
}

/// Reference to a static type
///
/// `Unknown` is the sentinel for anything the model cannot resolve; it is
/// compatible with everything and has no navigable children.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    /// FHIRPath system type
    System(SystemType),
    /// Model type, keyed by name (`Patient`, `HumanName`, `code`,
    /// `Bundle.entry` for backbone elements)
    Named(Arc<str>),
    /// Unresolvable type
    Unknown,
}

impl TypeRef {
    /// Named model type
    pub fn named(name: impl AsRef<str>) -> Self {
        TypeRef::Named(Arc::from(name.as_ref()))
    }

    /// Is this the unknown sentinel
    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeRef::Unknown)
    }

    /// Model type name, if named
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRef::Named(name) => Some(name),
            _ => None,
        }
    }
}

impl From<SystemType> for TypeRef {
    fn from(value: SystemType) -> Self {
        TypeRef::System(value)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::System(s) => write!(f, "{s}"),
            TypeRef::Named(name) => write!(f, "FHIR.{name}"),
            TypeRef::Unknown => write!(f, "?"),
        }
    }
}

/// Cardinality hint of a type set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cardinality {
    /// At most one value
    #[default]
    Singleton,
    /// Any number of values
    Collection,
}

impl Cardinality {
    /// Collection if either side is
    pub fn widen(self, other: Cardinality) -> Cardinality {
        if self == Cardinality::Collection || other == Cardinality::Collection {
            Cardinality::Collection
        } else {
            Cardinality::Singleton
        }
    }
}

/// Set of candidate static types of an expression
///
/// An empty set means no value is possible under any input and is used for
/// error recovery.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeSet {
    types: BTreeSet<TypeRef>,
    cardinality: Cardinality,
}

impl TypeSet {
    /// Empty set
    pub fn empty() -> Self {
        Self::default()
    }

    /// Single candidate with the given cardinality
    pub fn of(ty: impl Into<TypeRef>, cardinality: Cardinality) -> Self {
        let mut types = BTreeSet::new();
        types.insert(ty.into());
        Self { types, cardinality }
    }

    /// Single candidate, at most one value
    pub fn singleton(ty: impl Into<TypeRef>) -> Self {
        Self::of(ty, Cardinality::Singleton)
    }

    /// Single candidate, any number of values
    pub fn collection(ty: impl Into<TypeRef>) -> Self {
        Self::of(ty, Cardinality::Collection)
    }

    /// The unknown sentinel
    pub fn unknown(cardinality: Cardinality) -> Self {
        Self::of(TypeRef::Unknown, cardinality)
    }

    /// Build from candidates
    pub fn from_types(types: impl IntoIterator<Item = TypeRef>, cardinality: Cardinality) -> Self {
        Self {
            types: types.into_iter().collect(),
            cardinality,
        }
    }

    /// Candidate types in stable order
    pub fn types(&self) -> impl Iterator<Item = &TypeRef> {
        self.types.iter()
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// No candidates
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Cardinality hint
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// At most one value
    pub fn is_singleton(&self) -> bool {
        self.cardinality == Cardinality::Singleton
    }

    /// Contains the unknown sentinel
    pub fn has_unknown(&self) -> bool {
        self.types.contains(&TypeRef::Unknown)
    }

    /// Whether `ty` is a candidate
    pub fn contains(&self, ty: &TypeRef) -> bool {
        self.types.contains(ty)
    }

    /// Add a candidate
    pub fn insert(&mut self, ty: impl Into<TypeRef>) {
        self.types.insert(ty.into());
    }

    /// Same candidates with another cardinality
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Same candidates, at most one value
    pub fn as_singleton(self) -> Self {
        self.with_cardinality(Cardinality::Singleton)
    }

    /// Same candidates, any number of values
    pub fn as_collection(self) -> Self {
        self.with_cardinality(Cardinality::Collection)
    }

    /// Union of candidates; cardinality widens
    pub fn union(&self, other: &TypeSet) -> TypeSet {
        TypeSet {
            types: self.types.union(&other.types).cloned().collect(),
            cardinality: self.cardinality.widen(other.cardinality),
        }
    }

    /// Merge `other` into `self`
    pub fn extend(&mut self, other: TypeSet) {
        self.cardinality = self.cardinality.widen(other.cardinality);
        self.types.extend(other.types);
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.types.is_empty() {
            return write!(f, "{{}}");
        }
        let names: Vec<String> = self.types.iter().map(ToString::to_string).collect();
        write!(f, "{}", names.join(" | "))?;
        if self.cardinality == Cardinality::Collection {
            write!(f, " [*]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_type_from_code() {
        assert_eq!(
            SystemType::from_code("http://hl7.org/fhirpath/System.String"),
            Some(SystemType::String)
        );
        assert_eq!(SystemType::from_code("string"), None);
    }

    #[test]
    fn test_comparability() {
        assert!(SystemType::Integer.is_comparable_with(SystemType::Decimal));
        assert!(SystemType::Date.is_comparable_with(SystemType::DateTime));
        assert!(!SystemType::Boolean.is_comparable_with(SystemType::Boolean));
        assert!(!SystemType::String.is_comparable_with(SystemType::Integer));
    }

    #[test]
    fn test_union_widens_cardinality() {
        let a = TypeSet::singleton(SystemType::String);
        let b = TypeSet::collection(TypeRef::named("HumanName"));
        let u = a.union(&b);
        assert_eq!(u.len(), 2);
        assert_eq!(u.cardinality(), Cardinality::Collection);
        assert_eq!(u.to_string(), "System.String | FHIR.HumanName [*]");
    }
}
