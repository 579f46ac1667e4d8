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

//! Type and element declarations of the data model

use super::types::{Cardinality, SystemType, TypeRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Kind of declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    /// Resource type
    Resource,
    /// Complex data type, including backbone elements
    ComplexType,
    /// Primitive data type
    Primitive,
    /// Logical model
    Logical,
}

/// How a declaration relates to its base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Derivation {
    /// New type
    #[default]
    Specialization,
    /// Profile constraining an existing type
    Constraint,
}

/// Shape of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// Ordinary element
    Plain,
    /// Polymorphic `name[x]` element, exposed under type-suffixed aliases
    Choice,
    /// `extension` / `modifierExtension`, looked up by canonical URL
    ExtensionSlot,
}

/// A named child of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDeclaration {
    /// Full path, e.g. `Observation.value[x]`
    pub path: String,
    /// Member name without the `[x]` suffix
    pub name: String,
    /// Minimum cardinality
    pub min: u32,
    /// Maximum cardinality, `None` when unbounded
    pub max: Option<u32>,
    /// Allowed types, pairwise distinct
    pub types: SmallVec<[TypeRef; 1]>,
    /// Element shape
    pub kind: ElementKind,
}

impl ElementDeclaration {
    /// Declare an element; `name` may carry the `[x]` choice suffix.
    ///
    /// Duplicate types are dropped and `max` is raised to `min` when lower.
    pub fn new(
        owner: &str,
        name: &str,
        types: impl IntoIterator<Item = TypeRef>,
        min: u32,
        max: Option<u32>,
    ) -> Self {
        let mut unique: SmallVec<[TypeRef; 1]> = SmallVec::new();
        for ty in types {
            if !unique.contains(&ty) {
                unique.push(ty);
            }
        }

        let (bare, kind) = match name.strip_suffix("[x]") {
            Some(bare) => (bare, ElementKind::Choice),
            None if name == "extension" || name == "modifierExtension" => {
                (name, ElementKind::ExtensionSlot)
            }
            None => (name, ElementKind::Plain),
        };

        Self {
            path: format!("{owner}.{name}"),
            name: bare.to_string(),
            min,
            max: max.map(|m| m.max(min)),
            types: unique,
            kind,
        }
    }

    /// Collection unless at most one value is allowed
    pub fn cardinality(&self) -> Cardinality {
        match self.max {
            Some(0) | Some(1) => Cardinality::Singleton,
            _ => Cardinality::Collection,
        }
    }

    /// Is this a polymorphic element
    pub fn is_choice(&self) -> bool {
        self.kind == ElementKind::Choice
    }

    /// For a choice element, the type selected by a suffixed alias such as
    /// `valueQuantity`
    pub fn choice_alternative(&self, requested: &str) -> Option<&TypeRef> {
        if !self.is_choice() {
            return None;
        }
        let suffix = requested.strip_prefix(self.name.as_str())?;
        if suffix.is_empty() {
            return None;
        }
        self.types
            .iter()
            .find(|ty| type_suffix(ty).is_some_and(|s| s == suffix))
    }
}

/// Alias suffix of a type: the name with its first letter upper-cased
pub fn type_suffix(ty: &TypeRef) -> Option<String> {
    let name = match ty {
        TypeRef::System(s) => s.name(),
        TypeRef::Named(n) => n,
        TypeRef::Unknown => return None,
    };
    let mut chars = name.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

/// An invariant attached to an element of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintDeclaration {
    /// Constraint key, e.g. `bdl-1`
    pub key: String,
    /// `error` or `warning`
    pub severity: String,
    /// Human description
    pub human: String,
    /// FHIRPath expression
    pub expression: String,
    /// Element path the constraint is evaluated on
    pub path: String,
}

/// A named type of the data model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    /// Type name; backbone elements use their path (`Bundle.entry`)
    pub name: String,
    /// Canonical URL
    pub url: Option<String>,
    /// Base type name
    pub base: Option<String>,
    /// Kind of type
    pub kind: TypeKind,
    /// Abstract types cannot be instantiated
    pub is_abstract: bool,
    /// Relation to the base type
    pub derivation: Derivation,
    /// Elements declared on this type, in declaration order
    pub elements: IndexMap<String, ElementDeclaration>,
    /// Constraints declared by this type
    pub constraints: Vec<ConstraintDeclaration>,
}

impl TypeDeclaration {
    /// Create a declaration without elements
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            url: None,
            base: None,
            kind,
            is_abstract: false,
            derivation: Derivation::Specialization,
            elements: IndexMap::new(),
            constraints: Vec::new(),
        }
    }

    /// Set the base type
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Set the canonical URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Mark the type abstract
    pub fn into_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark the declaration a constraint profile
    pub fn into_profile(mut self) -> Self {
        self.derivation = Derivation::Constraint;
        self
    }

    /// Add an element
    pub fn with_element(mut self, element: ElementDeclaration) -> Self {
        self.push_element(element);
        self
    }

    /// Add a constraint
    pub fn with_constraint(mut self, constraint: ConstraintDeclaration) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Add or replace an element
    pub fn push_element(&mut self, element: ElementDeclaration) {
        self.elements.insert(element.name.clone(), element);
    }

    /// Element declared directly on this type
    pub fn element(&self, name: &str) -> Option<&ElementDeclaration> {
        self.elements.get(name)
    }

    /// Is this a resource type
    pub fn is_resource(&self) -> bool {
        self.kind == TypeKind::Resource
    }

    /// System type carried by the `value` element of a primitive
    pub fn primitive_value_type(&self) -> Option<SystemType> {
        if self.kind != TypeKind::Primitive {
            return None;
        }
        self.element("value")?.types.iter().find_map(|ty| match ty {
            TypeRef::System(s) => Some(*s),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_element() {
        let element = ElementDeclaration::new(
            "Observation",
            "value[x]",
            [
                TypeRef::named("Quantity"),
                TypeRef::named("string"),
                TypeRef::named("Quantity"),
            ],
            0,
            Some(1),
        );
        assert_eq!(element.name, "value");
        assert_eq!(element.path, "Observation.value[x]");
        assert!(element.is_choice());
        assert_eq!(element.types.len(), 2);
        assert_eq!(
            element.choice_alternative("valueString"),
            Some(&TypeRef::named("string"))
        );
        assert_eq!(element.choice_alternative("value"), None);
        assert_eq!(element.choice_alternative("valueBoolean"), None);
    }

    #[test]
    fn test_cardinality_bounds() {
        let element = ElementDeclaration::new("Patient", "name", [], 2, Some(1));
        assert_eq!(element.max, Some(2));
        assert_eq!(element.cardinality(), Cardinality::Collection);
        let slot = ElementDeclaration::new("Patient", "extension", [], 0, None);
        assert_eq!(slot.kind, ElementKind::ExtensionSlot);
    }
}
