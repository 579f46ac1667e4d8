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

//! Reader for FHIR `StructureDefinition` JSON
//!
//! Converts a definition into one [`TypeDeclaration`] for the type itself
//! plus one per backbone element, named by the backbone's path.

use super::declaration::{
    ConstraintDeclaration, Derivation, ElementDeclaration, TypeDeclaration, TypeKind,
};
use super::types::{SystemType, TypeRef};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde_json::Value;

/// Subset of a StructureDefinition needed for type checking
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureDefinition {
    /// Resource id
    pub id: Option<String>,
    /// Canonical URL
    pub url: Option<String>,
    /// Computer-friendly name
    pub name: Option<String>,
    /// Defined or constrained type
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    /// `resource`, `complex-type`, `primitive-type` or `logical`
    pub kind: Option<String>,
    /// Abstract flag
    #[serde(rename = "abstract", default)]
    pub is_abstract: bool,
    /// Canonical URL of the base definition
    pub base_definition: Option<String>,
    /// `specialization` or `constraint`
    pub derivation: Option<String>,
    /// Full element list
    pub snapshot: Option<ElementList>,
    /// Elements changed relative to the base
    pub differential: Option<ElementList>,
}

/// `snapshot` / `differential` content
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementList {
    /// Elements in path order
    #[serde(default)]
    pub element: Vec<ElementDefinition>,
}

/// Subset of an ElementDefinition
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDefinition {
    /// Element id, carries slice names after `:`
    pub id: Option<String>,
    /// Element path
    pub path: String,
    /// Minimum cardinality
    pub min: Option<u32>,
    /// Maximum cardinality, a number or `*`
    pub max: Option<String>,
    /// Allowed types
    #[serde(rename = "type", default)]
    pub types: Vec<ElementType>,
    /// Reference to another element's definition (`#Questionnaire.item`)
    pub content_reference: Option<String>,
    /// Invariants
    #[serde(default)]
    pub constraint: Vec<ElementConstraint>,
}

/// Element type entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementType {
    /// Type code or URL
    pub code: Option<String>,
}

/// Element invariant
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementConstraint {
    /// Constraint key
    pub key: String,
    /// `error` or `warning`
    pub severity: Option<String>,
    /// Human description
    pub human: Option<String>,
    /// FHIRPath expression
    pub expression: Option<String>,
}

impl ElementDefinition {
    fn is_slice(&self) -> bool {
        self.id.as_deref().is_some_and(|id| id.contains(':'))
    }

    fn max_value(&self) -> Option<u32> {
        self.max.as_deref().and_then(|m| m.parse().ok())
    }

    fn type_codes(&self) -> impl Iterator<Item = &str> {
        self.types.iter().filter_map(|t| t.code.as_deref())
    }
}

/// Map a type code to a type reference
pub fn type_ref_from_code(code: &str) -> TypeRef {
    if let Some(system) = SystemType::from_code(code) {
        return TypeRef::System(system);
    }
    let name = code.rsplit('/').next().unwrap_or(code);
    if name.is_empty() {
        TypeRef::Unknown
    } else {
        TypeRef::named(name)
    }
}

impl StructureDefinition {
    /// Whether this definition constrains an existing type
    pub fn is_profile(&self) -> bool {
        self.derivation.as_deref() == Some("constraint")
    }

    /// Name under which the main declaration is registered
    pub fn declaration_name(&self) -> Option<String> {
        if self.is_profile() {
            self.name.clone().or_else(|| self.id.clone())
        } else {
            self.type_name.clone()
        }
    }

    fn type_kind(&self) -> TypeKind {
        match self.kind.as_deref() {
            Some("resource") => TypeKind::Resource,
            Some("primitive-type") => TypeKind::Primitive,
            Some("logical") => TypeKind::Logical,
            _ => TypeKind::ComplexType,
        }
    }

    /// Convert into declarations: the type first, then its backbone elements
    pub fn to_declarations(&self) -> Vec<TypeDeclaration> {
        let (Some(root), Some(name)) = (self.type_name.as_deref(), self.declaration_name()) else {
            return Vec::new();
        };

        let mut main = TypeDeclaration::new(name.clone(), self.type_kind());
        main.url = self.url.clone();
        main.is_abstract = self.is_abstract;
        if self.is_profile() {
            main.derivation = Derivation::Constraint;
            main.base = Some(root.to_string());
        } else {
            main.base = self
                .base_definition
                .as_deref()
                .and_then(|b| b.rsplit('/').next())
                .map(str::to_string);
        }

        let elements: Vec<&ElementDefinition> = self
            .snapshot
            .as_ref()
            .or(self.differential.as_ref())
            .map(|list| list.element.iter().filter(|e| !e.is_slice()).collect())
            .unwrap_or_default();

        let parents: FxHashSet<&str> = elements
            .iter()
            .filter_map(|e| e.path.rsplit_once('.').map(|(owner, _)| owner))
            .collect();

        // backbone declarations are named after the declaration, not the root type
        let nested_name = |path: &str| format!("{name}{}", path.strip_prefix(root).unwrap_or(path));

        let mut nested: IndexMap<String, TypeDeclaration> = IndexMap::new();

        for element in &elements {
            if element.path == root {
                continue;
            }
            let Some((owner, member)) = element.path.rsplit_once('.') else {
                continue;
            };

            let types: Vec<TypeRef> = if let Some(reference) = element.content_reference.as_deref()
            {
                let target = reference.rsplit('#').next().unwrap_or(reference);
                vec![TypeRef::named(nested_name(target))]
            } else if parents.contains(element.path.as_str()) {
                let base = element.type_codes().next().unwrap_or("BackboneElement");
                let backbone = nested_name(&element.path);
                nested.entry(backbone.clone()).or_insert_with(|| {
                    TypeDeclaration::new(backbone.clone(), TypeKind::ComplexType).with_base(base)
                });
                vec![TypeRef::named(backbone)]
            } else {
                element.type_codes().map(type_ref_from_code).collect()
            };

            let declared = ElementDeclaration::new(
                owner,
                member,
                types,
                element.min.unwrap_or(0),
                element.max_value(),
            );

            if owner == root {
                main.push_element(declared);
            } else {
                let owner_name = nested_name(owner);
                nested
                    .entry(owner_name.clone())
                    .or_insert_with(|| {
                        TypeDeclaration::new(owner_name, TypeKind::ComplexType)
                            .with_base("BackboneElement")
                    })
                    .push_element(declared);
            }
        }

        let constraint_source = self.differential.as_ref().or(self.snapshot.as_ref());
        if let Some(list) = constraint_source {
            for element in &list.element {
                for constraint in &element.constraint {
                    let Some(expression) = constraint.expression.as_deref() else {
                        continue;
                    };
                    if expression.trim().is_empty() {
                        continue;
                    }
                    main.constraints.push(ConstraintDeclaration {
                        key: constraint.key.clone(),
                        severity: constraint.severity.clone().unwrap_or_else(|| "error".into()),
                        human: constraint.human.clone().unwrap_or_default(),
                        expression: expression.to_string(),
                        path: element.path.clone(),
                    });
                }
            }
        }

        let mut out = Vec::with_capacity(nested.len() + 1);
        out.push(main);
        out.extend(nested.into_values());
        out
    }
}

/// Extract structure definitions from a JSON document: a single definition
/// or a Bundle whose entries contain definitions. Other resources are skipped.
pub fn definitions_from_json(value: Value) -> Result<Vec<StructureDefinition>, serde_json::Error> {
    let resource_type = value
        .get("resourceType")
        .and_then(Value::as_str)
        .map(str::to_owned);
    match resource_type.as_deref() {
        Some("StructureDefinition") => Ok(vec![serde_json::from_value(value)?]),
        Some("Bundle") => {
            let mut definitions = Vec::new();
            let entries = value
                .get("entry")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for entry in entries {
                let Some(resource) = entry.get("resource") else {
                    continue;
                };
                if resource.get("resourceType").and_then(Value::as_str)
                    == Some("StructureDefinition")
                {
                    definitions.push(serde_json::from_value(resource.clone())?);
                }
            }
            Ok(definitions)
        }
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::declaration::ElementKind;
    use serde_json::json;

    fn bundle_definition() -> StructureDefinition {
        serde_json::from_value(json!({
            "resourceType": "StructureDefinition",
            "url": "http://hl7.org/fhir/StructureDefinition/Bundle",
            "name": "Bundle",
            "type": "Bundle",
            "kind": "resource",
            "abstract": false,
            "derivation": "specialization",
            "baseDefinition": "http://hl7.org/fhir/StructureDefinition/Resource",
            "snapshot": { "element": [
                { "path": "Bundle", "min": 0, "max": "*" },
                { "path": "Bundle.type", "min": 1, "max": "1", "type": [{ "code": "code" }] },
                { "path": "Bundle.total", "min": 0, "max": "1", "type": [{ "code": "unsignedInt" }] },
                { "path": "Bundle.entry", "min": 0, "max": "*", "type": [{ "code": "BackboneElement" }] },
                { "path": "Bundle.entry.fullUrl", "min": 0, "max": "1", "type": [{ "code": "uri" }] },
                { "path": "Bundle.entry.link", "min": 0, "max": "*", "contentReference": "#Bundle.link" },
                { "path": "Bundle.entry.id", "min": 0, "max": "1",
                  "type": [{ "code": "http://hl7.org/fhirpath/System.String" }] }
            ]},
            "differential": { "element": [
                { "path": "Bundle", "constraint": [
                    { "key": "bdl-1", "severity": "error", "human": "total only when a search or history",
                      "expression": "total.empty() or (type = 'searchset') or (type = 'history')" },
                    { "key": "bdl-x", "severity": "error", "human": "no expression" }
                ]},
                { "path": "Bundle.entry", "constraint": [
                    { "key": "bdl-5", "severity": "error", "human": "must be a resource unless there's a request or response",
                      "expression": "resource.exists() or request.exists() or response.exists()" }
                ]}
            ]}
        }))
        .unwrap()
    }

    #[test]
    fn test_backbone_elements_become_declarations() {
        let declarations = bundle_definition().to_declarations();
        assert_eq!(declarations.len(), 2);

        let bundle = &declarations[0];
        assert_eq!(bundle.name, "Bundle");
        assert_eq!(bundle.base.as_deref(), Some("Resource"));
        assert_eq!(
            bundle.element("entry").unwrap().types.as_slice(),
            &[TypeRef::named("Bundle.entry")]
        );

        let entry = &declarations[1];
        assert_eq!(entry.name, "Bundle.entry");
        assert_eq!(entry.base.as_deref(), Some("BackboneElement"));
        assert_eq!(
            entry.element("link").unwrap().types.as_slice(),
            &[TypeRef::named("Bundle.link")]
        );
        assert_eq!(
            entry.element("id").unwrap().types.as_slice(),
            &[TypeRef::System(SystemType::String)]
        );
    }

    #[test]
    fn test_constraints_come_from_differential() {
        let declarations = bundle_definition().to_declarations();
        let keys: Vec<(&str, &str)> = declarations[0]
            .constraints
            .iter()
            .map(|c| (c.key.as_str(), c.path.as_str()))
            .collect();
        assert_eq!(keys, vec![("bdl-1", "Bundle"), ("bdl-5", "Bundle.entry")]);
    }

    #[test]
    fn test_choice_and_profile() {
        let definition: StructureDefinition = serde_json::from_value(json!({
            "resourceType": "StructureDefinition",
            "url": "http://hl7.org/fhir/StructureDefinition/patient-birthPlace",
            "name": "birthPlace",
            "type": "Extension",
            "kind": "complex-type",
            "derivation": "constraint",
            "snapshot": { "element": [
                { "path": "Extension", "min": 0, "max": "*" },
                { "id": "Extension.extension:foo", "path": "Extension.extension", "min": 0, "max": "1" },
                { "path": "Extension.extension", "min": 0, "max": "0", "type": [{ "code": "Extension" }] },
                { "path": "Extension.value[x]", "min": 1, "max": "1", "type": [{ "code": "Address" }] }
            ]}
        }))
        .unwrap();

        let declarations = definition.to_declarations();
        assert_eq!(declarations.len(), 1);
        let profile = &declarations[0];
        assert_eq!(profile.name, "birthPlace");
        assert_eq!(profile.base.as_deref(), Some("Extension"));
        assert_eq!(profile.derivation, Derivation::Constraint);
        let value = profile.element("value").unwrap();
        assert_eq!(value.kind, ElementKind::Choice);
        assert_eq!(value.types.as_slice(), &[TypeRef::named("Address")]);
    }

    #[test]
    fn test_definitions_from_bundle() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                { "resource": { "resourceType": "StructureDefinition", "type": "Patient", "kind": "resource" } },
                { "resource": { "resourceType": "SearchParameter" } }
            ]
        });
        let definitions = definitions_from_json(bundle).unwrap();
        assert_eq!(definitions.len(), 1);
        assert!(definitions_from_json(json!({ "resourceType": "Patient" }))
            .unwrap()
            .is_empty());
    }
}
