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

//! Navigable view of the data model
//!
//! [`ModelResolver`] answers "what are the typed children of type T" on top
//! of any [`TypeSource`]. Each type's element table is flattened once
//! (ancestors first, overrides applied) and cached.

use super::declaration::{ElementDeclaration, TypeDeclaration, TypeKind};
use super::error::{ModelError, ModelResult};
use super::source::TypeSource;
use super::types::{Cardinality, SystemType, TypeRef, TypeSet};
use dashmap::DashMap;
use indexmap::IndexMap;
use log::{debug, trace};
use std::sync::Arc;

/// Guard against malformed base chains
const MAX_DEPTH: usize = 32;

/// A declaration with its inherited elements merged in
#[derive(Debug, Clone)]
pub struct FlatType {
    /// The declaration itself
    pub declaration: Arc<TypeDeclaration>,
    /// Base type names, nearest first
    pub ancestors: Vec<String>,
    /// Own and inherited elements
    pub elements: IndexMap<String, ElementDeclaration>,
}

/// Result of looking up a member on one type
#[derive(Debug, Clone, PartialEq)]
pub enum MemberLookup {
    /// Member exists; candidate types with the element's cardinality
    Found(TypeSet),
    /// The type is known and has no such member
    Missing,
}

/// Type model queries used by the checker
pub struct ModelResolver {
    source: Arc<dyn TypeSource>,
    flattened: DashMap<String, Option<Arc<FlatType>>>,
}

/// FHIR primitive names with their system type, used when the model lacks
/// the primitive's own declaration
fn primitive_fallback(name: &str) -> Option<SystemType> {
    Some(match name {
        "boolean" => SystemType::Boolean,
        "integer" | "positiveInt" | "unsignedInt" => SystemType::Integer,
        "integer64" => SystemType::Long,
        "decimal" => SystemType::Decimal,
        "date" => SystemType::Date,
        "dateTime" | "instant" => SystemType::DateTime,
        "time" => SystemType::Time,
        "string" | "code" | "id" | "markdown" | "uri" | "url" | "canonical" | "oid" | "uuid"
        | "base64Binary" | "xhtml" => SystemType::String,
        _ => return None,
    })
}

impl ModelResolver {
    /// Create a resolver over `source`
    pub fn new(source: Arc<dyn TypeSource>) -> Self {
        Self {
            source,
            flattened: DashMap::new(),
        }
    }

    /// Underlying store
    pub fn source(&self) -> &Arc<dyn TypeSource> {
        &self.source
    }

    /// Look up a declaration by name or canonical URL.
    ///
    /// `Ok(None)` is the unknown sentinel; an empty name is a caller error.
    pub fn resolve_type(&self, name: &str) -> ModelResult<Option<Arc<TypeDeclaration>>> {
        if name.trim().is_empty() {
            return Err(ModelError::EmptyName);
        }
        Ok(self.source.resolve(name))
    }

    /// Every declaration of the underlying store
    pub fn declarations(&self) -> Vec<Arc<TypeDeclaration>> {
        self.source.declarations()
    }

    /// Base type names of `name`, nearest first
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self.source.resolve(name).and_then(|d| d.base.clone());
        while let Some(base) = current {
            if out.len() >= MAX_DEPTH || out.contains(&base) || base == name {
                debug!("Stopping at cyclic or deep base chain of {name}");
                break;
            }
            current = self.source.resolve(&base).and_then(|d| d.base.clone());
            out.push(base);
        }
        out
    }

    /// Is `name` equal to `ancestor` or derived from it
    pub fn is_subtype(&self, name: &str, ancestor: &str) -> bool {
        name == ancestor || self.ancestors(name).iter().any(|a| a == ancestor)
    }

    /// Flattened view of a declaration, cached
    pub fn flatten(&self, name: &str) -> Option<Arc<FlatType>> {
        if let Some(cached) = self.flattened.get(name) {
            return cached.value().clone();
        }
        let flat = self.build_flat(name).map(Arc::new);
        self.flattened.insert(name.to_string(), flat.clone());
        flat
    }

    fn build_flat(&self, name: &str) -> Option<FlatType> {
        let declaration = self.source.resolve(name)?;
        let ancestors = self.ancestors(&declaration.name);

        let mut chain: Vec<Arc<TypeDeclaration>> = ancestors
            .iter()
            .rev()
            .filter_map(|a| self.source.resolve(a))
            .collect();
        chain.push(declaration.clone());

        let mut elements: IndexMap<String, ElementDeclaration> = IndexMap::new();
        for level in &chain {
            for element in level.elements.values() {
                let merged = match elements.get(&element.name) {
                    Some(inherited) => self.narrow(inherited, element),
                    None => element.clone(),
                };
                elements.insert(merged.name.clone(), merged);
            }
        }

        trace!("Flattened {name}: {} elements", elements.len());
        Some(FlatType {
            declaration,
            ancestors,
            elements,
        })
    }

    /// Apply an override: types may only narrow, cardinality may only shrink
    fn narrow(
        &self,
        inherited: &ElementDeclaration,
        child: &ElementDeclaration,
    ) -> ElementDeclaration {
        let inherits_unknown = inherited.types.iter().any(TypeRef::is_unknown);
        let allowed: Vec<TypeRef> = child
            .types
            .iter()
            .filter(|ty| {
                inherits_unknown
                    || inherited.types.iter().any(|parent| self.is_assignable(ty, parent))
            })
            .cloned()
            .collect();

        let mut merged = child.clone();
        if allowed.len() != child.types.len() {
            debug!(
                "Ignoring widening override of {} ({} of {} types kept)",
                child.path,
                allowed.len(),
                child.types.len()
            );
        }
        merged.types = if allowed.is_empty() {
            inherited.types.clone()
        } else {
            allowed.into_iter().collect()
        };
        merged.max = match (inherited.max, child.max) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
        merged.min = merged.min.max(inherited.min);
        if let Some(max) = merged.max {
            merged.max = Some(max.max(merged.min));
        }
        merged.kind = inherited.kind;
        merged.name = inherited.name.clone();
        merged
    }

    /// Can a value of static type `from` be used where `to` is declared
    pub fn is_assignable(&self, from: &TypeRef, to: &TypeRef) -> bool {
        match (from, to) {
            (TypeRef::Unknown, _) | (_, TypeRef::Unknown) => true,
            (TypeRef::Named(a), TypeRef::Named(b)) => self.is_subtype(a, b),
            _ => from == to,
        }
    }

    /// Whether a value statically typed `a` may at runtime also be a `b`
    /// (equal, related by inheritance either way, or the same system value)
    pub fn is_compatible(&self, a: &TypeRef, b: &TypeRef) -> bool {
        if self.is_assignable(a, b) || self.is_assignable(b, a) {
            return true;
        }
        match (self.system_type(a), self.system_type(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Typed children of `ty` named `name`.
    ///
    /// Polymorphic elements match both their bare name (all alternatives)
    /// and type-suffixed aliases (`valueQuantity`). Unknown receivers, and
    /// named types without a declaration, yield the unknown sentinel.
    pub fn children_of(&self, ty: &TypeRef, name: &str) -> MemberLookup {
        let type_name = match ty {
            TypeRef::Unknown => {
                return MemberLookup::Found(TypeSet::unknown(Cardinality::Collection));
            }
            TypeRef::System(_) => return MemberLookup::Missing,
            TypeRef::Named(type_name) => type_name,
        };

        let Some(flat) = self.flatten(type_name) else {
            trace!("No declaration for {type_name}, member {name} is unknown");
            return MemberLookup::Found(TypeSet::unknown(Cardinality::Collection));
        };

        if let Some(element) = flat.elements.get(name) {
            return MemberLookup::Found(TypeSet::from_types(
                element.types.iter().cloned(),
                element.cardinality(),
            ));
        }

        for element in flat.elements.values() {
            if let Some(alternative) = element.choice_alternative(name) {
                return MemberLookup::Found(TypeSet::of(
                    alternative.clone(),
                    element.cardinality(),
                ));
            }
        }

        MemberLookup::Missing
    }

    /// Resolve an extension canonical URL to the extension's declaration
    pub fn extension_type(&self, url: &str) -> Option<TypeRef> {
        let declaration = self.source.resolve(url)?;
        if self.is_subtype(&declaration.name, "Extension") {
            Some(TypeRef::named(&declaration.name))
        } else {
            None
        }
    }

    /// System type a value of `ty` behaves as in operators, if any
    pub fn system_type(&self, ty: &TypeRef) -> Option<SystemType> {
        let name = match ty {
            TypeRef::System(system) => return Some(*system),
            TypeRef::Unknown => return None,
            TypeRef::Named(name) => name,
        };

        match self.flatten(name) {
            Some(flat) => {
                if flat.declaration.kind == TypeKind::Primitive {
                    let value = flat.elements.get("value").and_then(|v| {
                        v.types.iter().find_map(|t| match t {
                            TypeRef::System(s) => Some(*s),
                            _ => None,
                        })
                    });
                    return value.or_else(|| primitive_fallback(name));
                }
                if name.as_ref() == "Quantity" || flat.ancestors.iter().any(|a| a == "Quantity") {
                    return Some(SystemType::Quantity);
                }
                None
            }
            None => primitive_fallback(name).or_else(|| {
                matches!(name.as_ref(), "Quantity" | "SimpleQuantity" | "Age" | "Duration")
                    .then_some(SystemType::Quantity)
            }),
        }
    }

    /// Resolve a type specifier as written after `is`, `as` or in `ofType()`.
    ///
    /// Unqualified names are looked up in the model first, then among the
    /// system types.
    pub fn type_specifier(&self, namespace: Option<&str>, name: &str) -> Option<TypeRef> {
        match namespace {
            Some("System") => SystemType::from_name(name).map(TypeRef::System),
            Some("FHIR") => self.source.resolve(name).map(|d| TypeRef::named(&d.name)),
            Some(_) => None,
            None => self
                .source
                .resolve(name)
                .map(|d| TypeRef::named(&d.name))
                .or_else(|| SystemType::from_name(name).map(TypeRef::System)),
        }
    }

    /// Static type of a context path such as `Patient` or `Bundle.entry`
    ///
    /// Backbone paths resolve directly to their declaration; other dotted
    /// paths are navigated member by member. The result is a singleton since
    /// constraints are evaluated once per element instance.
    pub fn context_type(&self, path: &str) -> ModelResult<TypeSet> {
        let path = path.trim();
        if path.is_empty() {
            return Err(ModelError::EmptyName);
        }

        if let Some(declaration) = self.source.resolve(path) {
            return Ok(TypeSet::singleton(TypeRef::named(&declaration.name)));
        }

        let mut segments = path.split('.');
        let root = segments.next().unwrap_or(path);
        let Some(root_declaration) = self.source.resolve(root) else {
            debug!("Unknown context type {root}");
            return Ok(TypeSet::unknown(Cardinality::Singleton));
        };

        let mut current = TypeSet::singleton(TypeRef::named(&root_declaration.name));
        for segment in segments {
            let mut next = TypeSet::empty();
            for ty in current.types() {
                if let MemberLookup::Found(children) = self.children_of(ty, segment) {
                    next.extend(children);
                }
            }
            if next.is_empty() {
                debug!("Context path {path} does not resolve at {segment}");
                return Ok(TypeSet::unknown(Cardinality::Singleton));
            }
            current = next;
        }
        Ok(current.as_singleton())
    }
}

impl std::fmt::Debug for ModelResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelResolver")
            .field("source", &self.source.describe())
            .field("flattened", &self.flattened.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::builtin::builtin_model;
    use crate::model::declaration::ElementDeclaration;
    use crate::model::source::InMemorySource;

    fn resolver() -> ModelResolver {
        ModelResolver::new(builtin_model())
    }

    #[test]
    fn test_inherited_members() {
        let resolver = resolver();
        let patient = TypeRef::named("Patient");
        assert_eq!(
            resolver.children_of(&patient, "id"),
            MemberLookup::Found(TypeSet::singleton(SystemType::String))
        );
        assert_eq!(
            resolver.children_of(&patient, "name"),
            MemberLookup::Found(TypeSet::collection(TypeRef::named("HumanName")))
        );
        assert_eq!(
            resolver.children_of(&patient, "unknownMember"),
            MemberLookup::Missing
        );
    }

    #[test]
    fn test_choice_aliases() {
        let resolver = resolver();
        let observation = TypeRef::named("Observation");
        assert_eq!(
            resolver.children_of(&observation, "valueQuantity"),
            MemberLookup::Found(TypeSet::singleton(TypeRef::named("Quantity")))
        );
        let MemberLookup::Found(all) = resolver.children_of(&observation, "value") else {
            panic!("value should resolve");
        };
        assert_eq!(all.len(), 11);
        assert_eq!(
            resolver.children_of(&observation, "valueAddress"),
            MemberLookup::Missing
        );
    }

    #[test]
    fn test_unknown_receivers_are_silent() {
        let resolver = resolver();
        assert!(matches!(
            resolver.children_of(&TypeRef::Unknown, "anything"),
            MemberLookup::Found(set) if set.has_unknown()
        ));
        assert!(matches!(
            resolver.children_of(&TypeRef::named("NotInModel"), "anything"),
            MemberLookup::Found(set) if set.has_unknown()
        ));
        assert_eq!(
            resolver.children_of(&TypeRef::System(SystemType::String), "length"),
            MemberLookup::Missing
        );
    }

    #[test]
    fn test_system_type_mapping() {
        let resolver = resolver();
        assert_eq!(
            resolver.system_type(&TypeRef::named("code")),
            Some(SystemType::String)
        );
        assert_eq!(
            resolver.system_type(&TypeRef::named("SimpleQuantity")),
            Some(SystemType::Quantity)
        );
        assert_eq!(resolver.system_type(&TypeRef::named("HumanName")), None);
        assert!(resolver.is_compatible(
            &TypeRef::named("string"),
            &TypeRef::System(SystemType::String)
        ));
    }

    #[test]
    fn test_context_paths() {
        let resolver = resolver();
        assert_eq!(
            resolver.context_type("Bundle.entry").unwrap(),
            TypeSet::singleton(TypeRef::named("Bundle.entry"))
        );
        assert_eq!(
            resolver.context_type("Patient.name").unwrap(),
            TypeSet::singleton(TypeRef::named("HumanName"))
        );
        assert!(resolver.context_type("Nope").unwrap().has_unknown());
        assert!(matches!(
            resolver.context_type("  "),
            Err(ModelError::EmptyName)
        ));
    }

    #[test]
    fn test_extension_urls() {
        let resolver = resolver();
        assert_eq!(
            resolver.extension_type("http://hl7.org/fhir/StructureDefinition/patient-birthPlace"),
            Some(TypeRef::named("patient-birthPlace"))
        );
        assert_eq!(
            resolver.extension_type("http://hl7.org/fhir/StructureDefinition/Patient"),
            None
        );
        assert_eq!(resolver.extension_type("http://example.org/nope"), None);
    }

    #[test]
    fn test_profile_override_narrows() {
        let resolver = resolver();
        let MemberLookup::Found(value) =
            resolver.children_of(&TypeRef::named("patient-birthPlace"), "value")
        else {
            panic!("value should resolve");
        };
        assert_eq!(value, TypeSet::singleton(TypeRef::named("Address")));
    }

    #[test]
    fn test_widening_override_is_ignored() {
        let source = InMemorySource::new("test")
            .with(
                TypeDeclaration::new("Parent", TypeKind::ComplexType).with_element(
                    ElementDeclaration::new(
                        "Parent",
                        "flag",
                        [TypeRef::named("boolean")],
                        0,
                        Some(1),
                    ),
                ),
            )
            .with(
                TypeDeclaration::new("Child", TypeKind::ComplexType)
                    .with_base("Parent")
                    .with_element(ElementDeclaration::new(
                        "Child",
                        "flag",
                        [TypeRef::named("string")],
                        0,
                        None,
                    )),
            );
        let resolver = ModelResolver::new(Arc::new(source));
        assert_eq!(
            resolver.children_of(&TypeRef::named("Child"), "flag"),
            MemberLookup::Found(TypeSet::singleton(TypeRef::named("boolean")))
        );
    }
}
