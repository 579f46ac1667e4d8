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

//! Built-in minimal FHIR model
//!
//! Used when no definition store is configured or the configured store is
//! unavailable. Covers the base hierarchy, primitives, common data types and
//! a handful of resources together with some of their invariants.

use super::declaration::{ConstraintDeclaration, ElementDeclaration, TypeDeclaration, TypeKind};
use super::source::{InMemorySource, TypeSource};
use super::types::{SystemType, TypeRef};
use once_cell::sync::Lazy;
use std::sync::Arc;

const ONE: Option<u32> = Some(1);
const MANY: Option<u32> = None;

const FHIR_BASE: &str = "http://hl7.org/fhir/StructureDefinition/";

/// Element row: name (with `[x]` for choices), `|`-separated types, min, max
type Row = (&'static str, &'static str, u32, Option<u32>);

fn type_ref(spec: &str) -> TypeRef {
    match spec.strip_prefix("System.") {
        Some(system) => SystemType::from_name(system)
            .map(TypeRef::System)
            .unwrap_or(TypeRef::Unknown),
        None => TypeRef::named(spec),
    }
}

fn declare(name: &str, kind: TypeKind, base: Option<&str>, rows: &[Row]) -> TypeDeclaration {
    let mut declaration = TypeDeclaration::new(name, kind);
    if let Some(base) = base {
        declaration = declaration.with_base(base);
    }
    // backbone elements have no canonical URL of their own
    if !name.contains('.') {
        declaration = declaration.with_url(format!("{FHIR_BASE}{name}"));
    }
    for &(element, types, min, max) in rows {
        declaration.push_element(ElementDeclaration::new(
            name,
            element,
            types.split('|').map(type_ref),
            min,
            max,
        ));
    }
    declaration
}

fn complex(name: &str, base: &str, rows: &[Row]) -> TypeDeclaration {
    declare(name, TypeKind::ComplexType, Some(base), rows)
}

fn backbone(name: &str, rows: &[Row]) -> TypeDeclaration {
    complex(name, "BackboneElement", rows)
}

fn resource(name: &str, base: &str, rows: &[Row]) -> TypeDeclaration {
    declare(name, TypeKind::Resource, Some(base), rows)
}

fn primitive(name: &str, base: &str, value: SystemType) -> TypeDeclaration {
    declare(name, TypeKind::Primitive, Some(base), &[])
        .with_element(ElementDeclaration::new(
            name,
            "value",
            [TypeRef::System(value)],
            0,
            ONE,
        ))
}

fn extension(name: &str, value_types: &'static str) -> TypeDeclaration {
    TypeDeclaration::new(name, TypeKind::ComplexType)
        .with_base("Extension")
        .with_url(format!("{FHIR_BASE}{name}"))
        .into_profile()
        .with_element(ElementDeclaration::new(
            "Extension",
            "value[x]",
            value_types.split('|').map(type_ref),
            1,
            ONE,
        ))
}

fn invariant(path: &str, key: &str, human: &str, expression: &str) -> ConstraintDeclaration {
    ConstraintDeclaration {
        key: key.to_string(),
        severity: "error".to_string(),
        human: human.to_string(),
        expression: expression.to_string(),
        path: path.to_string(),
    }
}

const EXTENSION_VALUE_TYPES: &str = "base64Binary|boolean|canonical|code|date|dateTime|decimal|id|\
instant|integer|markdown|oid|positiveInt|string|time|unsignedInt|uri|url|uuid|Address|Age|\
Annotation|Attachment|CodeableConcept|Coding|ContactPoint|Count|Distance|Duration|HumanName|\
Identifier|Money|Period|Quantity|Range|Ratio|Reference|SampledData|Timing";

const OBSERVATION_VALUE_TYPES: &str = "Quantity|CodeableConcept|string|boolean|integer|Range|\
Ratio|SampledData|time|dateTime|Period";

fn foundation() -> Vec<TypeDeclaration> {
    vec![
        declare("Base", TypeKind::ComplexType, None, &[]).into_abstract(),
        complex(
            "Element",
            "Base",
            &[("id", "System.String", 0, ONE), ("extension", "Extension", 0, MANY)],
        )
        .into_abstract(),
        complex("BackboneElement", "Element", &[("modifierExtension", "Extension", 0, MANY)])
            .into_abstract(),
        declare(
            "Resource",
            TypeKind::Resource,
            Some("Base"),
            &[
                ("id", "System.String", 0, ONE),
                ("meta", "Meta", 0, ONE),
                ("implicitRules", "uri", 0, ONE),
                ("language", "code", 0, ONE),
            ],
        )
        .into_abstract(),
        resource(
            "DomainResource",
            "Resource",
            &[
                ("text", "Narrative", 0, ONE),
                ("contained", "Resource", 0, MANY),
                ("extension", "Extension", 0, MANY),
                ("modifierExtension", "Extension", 0, MANY),
            ],
        )
        .into_abstract(),
    ]
}

fn primitives() -> Vec<TypeDeclaration> {
    use SystemType as S;
    vec![
        primitive("boolean", "Element", S::Boolean),
        primitive("integer", "Element", S::Integer),
        primitive("integer64", "Element", S::Long),
        primitive("decimal", "Element", S::Decimal),
        primitive("string", "Element", S::String),
        primitive("uri", "Element", S::String),
        primitive("base64Binary", "Element", S::String),
        primitive("xhtml", "Element", S::String),
        primitive("date", "Element", S::Date),
        primitive("dateTime", "Element", S::DateTime),
        primitive("instant", "Element", S::DateTime),
        primitive("time", "Element", S::Time),
        primitive("code", "string", S::String),
        primitive("id", "string", S::String),
        primitive("markdown", "string", S::String),
        primitive("url", "uri", S::String),
        primitive("canonical", "uri", S::String),
        primitive("oid", "uri", S::String),
        primitive("uuid", "uri", S::String),
        primitive("positiveInt", "integer", S::Integer),
        primitive("unsignedInt", "integer", S::Integer),
    ]
}

fn data_types() -> Vec<TypeDeclaration> {
    vec![
        complex(
            "Extension",
            "Element",
            &[
                ("url", "System.String", 1, ONE),
                ("value[x]", EXTENSION_VALUE_TYPES, 0, ONE),
            ],
        ),
        complex(
            "Coding",
            "Element",
            &[
                ("system", "uri", 0, ONE),
                ("version", "string", 0, ONE),
                ("code", "code", 0, ONE),
                ("display", "string", 0, ONE),
                ("userSelected", "boolean", 0, ONE),
            ],
        ),
        complex(
            "CodeableConcept",
            "Element",
            &[("coding", "Coding", 0, MANY), ("text", "string", 0, ONE)],
        ),
        complex(
            "Identifier",
            "Element",
            &[
                ("use", "code", 0, ONE),
                ("type", "CodeableConcept", 0, ONE),
                ("system", "uri", 0, ONE),
                ("value", "string", 0, ONE),
                ("period", "Period", 0, ONE),
                ("assigner", "Reference", 0, ONE),
            ],
        ),
        complex(
            "HumanName",
            "Element",
            &[
                ("use", "code", 0, ONE),
                ("text", "string", 0, ONE),
                ("family", "string", 0, ONE),
                ("given", "string", 0, MANY),
                ("prefix", "string", 0, MANY),
                ("suffix", "string", 0, MANY),
                ("period", "Period", 0, ONE),
            ],
        ),
        complex(
            "Address",
            "Element",
            &[
                ("use", "code", 0, ONE),
                ("type", "code", 0, ONE),
                ("text", "string", 0, ONE),
                ("line", "string", 0, MANY),
                ("city", "string", 0, ONE),
                ("district", "string", 0, ONE),
                ("state", "string", 0, ONE),
                ("postalCode", "string", 0, ONE),
                ("country", "string", 0, ONE),
                ("period", "Period", 0, ONE),
            ],
        ),
        complex(
            "ContactPoint",
            "Element",
            &[
                ("system", "code", 0, ONE),
                ("value", "string", 0, ONE),
                ("use", "code", 0, ONE),
                ("rank", "positiveInt", 0, ONE),
                ("period", "Period", 0, ONE),
            ],
        ),
        complex(
            "Period",
            "Element",
            &[("start", "dateTime", 0, ONE), ("end", "dateTime", 0, ONE)],
        ),
        complex(
            "Quantity",
            "Element",
            &[
                ("value", "decimal", 0, ONE),
                ("comparator", "code", 0, ONE),
                ("unit", "string", 0, ONE),
                ("system", "uri", 0, ONE),
                ("code", "code", 0, ONE),
            ],
        ),
        complex("Age", "Quantity", &[]),
        complex("Count", "Quantity", &[]),
        complex("Distance", "Quantity", &[]),
        complex("Duration", "Quantity", &[]),
        complex("SimpleQuantity", "Quantity", &[]),
        complex(
            "Money",
            "Element",
            &[("value", "decimal", 0, ONE), ("currency", "code", 0, ONE)],
        ),
        complex(
            "Range",
            "Element",
            &[("low", "Quantity", 0, ONE), ("high", "Quantity", 0, ONE)],
        ),
        complex(
            "Ratio",
            "Element",
            &[
                ("numerator", "Quantity", 0, ONE),
                ("denominator", "Quantity", 0, ONE),
            ],
        ),
        complex(
            "SampledData",
            "Element",
            &[
                ("origin", "Quantity", 1, ONE),
                ("period", "decimal", 1, ONE),
                ("factor", "decimal", 0, ONE),
                ("lowerLimit", "decimal", 0, ONE),
                ("upperLimit", "decimal", 0, ONE),
                ("dimensions", "positiveInt", 1, ONE),
                ("data", "string", 0, ONE),
            ],
        ),
        complex(
            "Attachment",
            "Element",
            &[
                ("contentType", "code", 0, ONE),
                ("language", "code", 0, ONE),
                ("data", "base64Binary", 0, ONE),
                ("url", "url", 0, ONE),
                ("size", "unsignedInt", 0, ONE),
                ("hash", "base64Binary", 0, ONE),
                ("title", "string", 0, ONE),
                ("creation", "dateTime", 0, ONE),
            ],
        ),
        complex(
            "Reference",
            "Element",
            &[
                ("reference", "string", 0, ONE),
                ("type", "uri", 0, ONE),
                ("identifier", "Identifier", 0, ONE),
                ("display", "string", 0, ONE),
            ],
        ),
        complex(
            "Narrative",
            "Element",
            &[("status", "code", 1, ONE), ("div", "xhtml", 1, ONE)],
        ),
        complex(
            "Meta",
            "Element",
            &[
                ("versionId", "id", 0, ONE),
                ("lastUpdated", "instant", 0, ONE),
                ("source", "uri", 0, ONE),
                ("profile", "canonical", 0, MANY),
                ("security", "Coding", 0, MANY),
                ("tag", "Coding", 0, MANY),
            ],
        ),
        complex(
            "Annotation",
            "Element",
            &[
                ("author[x]", "Reference|string", 0, ONE),
                ("time", "dateTime", 0, ONE),
                ("text", "markdown", 1, ONE),
            ],
        ),
        complex(
            "Timing",
            "BackboneElement",
            &[
                ("event", "dateTime", 0, MANY),
                ("code", "CodeableConcept", 0, ONE),
            ],
        ),
    ]
}

fn patient() -> Vec<TypeDeclaration> {
    vec![
        resource(
            "Patient",
            "DomainResource",
            &[
                ("identifier", "Identifier", 0, MANY),
                ("active", "boolean", 0, ONE),
                ("name", "HumanName", 0, MANY),
                ("telecom", "ContactPoint", 0, MANY),
                ("gender", "code", 0, ONE),
                ("birthDate", "date", 0, ONE),
                ("deceased[x]", "boolean|dateTime", 0, ONE),
                ("address", "Address", 0, MANY),
                ("maritalStatus", "CodeableConcept", 0, ONE),
                ("multipleBirth[x]", "boolean|integer", 0, ONE),
                ("photo", "Attachment", 0, MANY),
                ("contact", "Patient.contact", 0, MANY),
                ("generalPractitioner", "Reference", 0, MANY),
                ("managingOrganization", "Reference", 0, ONE),
                ("link", "Patient.link", 0, MANY),
            ],
        )
        .with_constraint(invariant(
            "Patient.contact",
            "pat-1",
            "SHALL at least contain a contact's details or a reference to an organization",
            "name.exists() or telecom.exists() or address.exists() or organization.exists()",
        )),
        backbone(
            "Patient.contact",
            &[
                ("relationship", "CodeableConcept", 0, MANY),
                ("name", "HumanName", 0, ONE),
                ("telecom", "ContactPoint", 0, MANY),
                ("address", "Address", 0, ONE),
                ("gender", "code", 0, ONE),
                ("organization", "Reference", 0, ONE),
                ("period", "Period", 0, ONE),
            ],
        ),
        backbone(
            "Patient.link",
            &[("other", "Reference", 1, ONE), ("type", "code", 1, ONE)],
        ),
    ]
}

fn observation() -> Vec<TypeDeclaration> {
    vec![
        resource(
            "Observation",
            "DomainResource",
            &[
                ("identifier", "Identifier", 0, MANY),
                ("status", "code", 1, ONE),
                ("category", "CodeableConcept", 0, MANY),
                ("code", "CodeableConcept", 1, ONE),
                ("subject", "Reference", 0, ONE),
                ("focus", "Reference", 0, MANY),
                ("encounter", "Reference", 0, ONE),
                ("effective[x]", "dateTime|Period|Timing|instant", 0, ONE),
                ("issued", "instant", 0, ONE),
                ("performer", "Reference", 0, MANY),
                ("value[x]", OBSERVATION_VALUE_TYPES, 0, ONE),
                ("dataAbsentReason", "CodeableConcept", 0, ONE),
                ("interpretation", "CodeableConcept", 0, MANY),
                ("note", "Annotation", 0, MANY),
                ("bodySite", "CodeableConcept", 0, ONE),
                ("method", "CodeableConcept", 0, ONE),
                ("specimen", "Reference", 0, ONE),
                ("device", "Reference", 0, ONE),
                ("referenceRange", "Observation.referenceRange", 0, MANY),
                ("hasMember", "Reference", 0, MANY),
                ("derivedFrom", "Reference", 0, MANY),
                ("component", "Observation.component", 0, MANY),
            ],
        )
        .with_constraint(invariant(
            "Observation",
            "obs-6",
            "dataAbsentReason SHALL only be present if Observation.value[x] is not present",
            "dataAbsentReason.empty() or value.empty()",
        ))
        .with_constraint(invariant(
            "Observation",
            "obs-7",
            "If Observation.code is the same as an Observation.component.code then the value element associated with the code SHALL NOT be present",
            "value.empty() or component.code.where(coding.intersect(%resource.code.coding).exists()).empty()",
        ))
        .with_constraint(invariant(
            "Observation.referenceRange",
            "obs-3",
            "Must have at least a low or a high or text",
            "low.exists() or high.exists() or text.exists()",
        )),
        backbone(
            "Observation.referenceRange",
            &[
                ("low", "SimpleQuantity", 0, ONE),
                ("high", "SimpleQuantity", 0, ONE),
                ("type", "CodeableConcept", 0, ONE),
                ("appliesTo", "CodeableConcept", 0, MANY),
                ("age", "Range", 0, ONE),
                ("text", "string", 0, ONE),
            ],
        ),
        backbone(
            "Observation.component",
            &[
                ("code", "CodeableConcept", 1, ONE),
                ("value[x]", OBSERVATION_VALUE_TYPES, 0, ONE),
                ("dataAbsentReason", "CodeableConcept", 0, ONE),
                ("interpretation", "CodeableConcept", 0, MANY),
                ("referenceRange", "Observation.referenceRange", 0, MANY),
            ],
        ),
    ]
}

fn bundle() -> Vec<TypeDeclaration> {
    vec![
        resource(
            "Bundle",
            "Resource",
            &[
                ("identifier", "Identifier", 0, ONE),
                ("type", "code", 1, ONE),
                ("timestamp", "instant", 0, ONE),
                ("total", "unsignedInt", 0, ONE),
                ("link", "Bundle.link", 0, MANY),
                ("entry", "Bundle.entry", 0, MANY),
            ],
        )
        .with_constraint(invariant(
            "Bundle",
            "bdl-1",
            "total only when a search or history",
            "total.empty() or (type = 'searchset') or (type = 'history')",
        ))
        .with_constraint(invariant(
            "Bundle",
            "bdl-2",
            "entry.search only when a search",
            "(type = 'searchset') or entry.search.empty()",
        ))
        .with_constraint(invariant(
            "Bundle",
            "bdl-7",
            "FullUrl must be unique in a bundle, or else entries with the same fullUrl must have different meta.versionId (except in history bundles)",
            "(type = 'history') or entry.where(fullUrl.exists()).select(fullUrl&iif(resource.meta.versionId.exists(), resource.meta.versionId, '')).isDistinct()",
        ))
        .with_constraint(invariant(
            "Bundle",
            "bdl-9",
            "A document must have an identifier with a system and a value",
            "type = 'document' implies (identifier.system.exists() and identifier.value.exists())",
        ))
        .with_constraint(invariant(
            "Bundle.entry",
            "bdl-5",
            "must be a resource unless there's a request or response",
            "resource.exists() or request.exists() or response.exists()",
        ))
        .with_constraint(invariant(
            "Bundle.entry",
            "bdl-8",
            "fullUrl cannot be a version specific reference",
            "fullUrl.exists() implies fullUrl.contains('/_history/').not()",
        )),
        backbone(
            "Bundle.link",
            &[("relation", "string", 1, ONE), ("url", "uri", 1, ONE)],
        ),
        backbone(
            "Bundle.entry",
            &[
                ("link", "Bundle.link", 0, MANY),
                ("fullUrl", "uri", 0, ONE),
                ("resource", "Resource", 0, ONE),
                ("search", "Bundle.entry.search", 0, ONE),
                ("request", "Bundle.entry.request", 0, ONE),
                ("response", "Bundle.entry.response", 0, ONE),
            ],
        ),
        backbone(
            "Bundle.entry.search",
            &[("mode", "code", 0, ONE), ("score", "decimal", 0, ONE)],
        ),
        backbone(
            "Bundle.entry.request",
            &[
                ("method", "code", 1, ONE),
                ("url", "uri", 1, ONE),
                ("ifNoneMatch", "string", 0, ONE),
                ("ifModifiedSince", "instant", 0, ONE),
                ("ifMatch", "string", 0, ONE),
                ("ifNoneExist", "string", 0, ONE),
            ],
        ),
        backbone(
            "Bundle.entry.response",
            &[
                ("status", "string", 1, ONE),
                ("location", "uri", 0, ONE),
                ("etag", "string", 0, ONE),
                ("lastModified", "instant", 0, ONE),
                ("outcome", "Resource", 0, ONE),
            ],
        ),
    ]
}

fn questionnaire() -> Vec<TypeDeclaration> {
    vec![
        resource(
            "Questionnaire",
            "DomainResource",
            &[
                ("url", "uri", 0, ONE),
                ("identifier", "Identifier", 0, MANY),
                ("version", "string", 0, ONE),
                ("name", "string", 0, ONE),
                ("title", "string", 0, ONE),
                ("status", "code", 1, ONE),
                ("subjectType", "code", 0, MANY),
                ("code", "Coding", 0, MANY),
                ("item", "Questionnaire.item", 0, MANY),
            ],
        )
        .with_constraint(invariant(
            "Questionnaire",
            "que-2",
            "The link ids for groups and questions must be unique within the Questionnaire",
            "descendants().linkId.isDistinct()",
        ))
        .with_constraint(invariant(
            "Questionnaire.item",
            "que-1",
            "Group items must have nested items, display items cannot have nested items",
            "(type='group' implies item.empty().not()) and (type.trace('type')='display' implies item.trace('item').empty())",
        ))
        .with_constraint(invariant(
            "Questionnaire.item",
            "que-9",
            "Read-only can't be specified for \"display\" items",
            "type!='display' or readOnly.empty()",
        ))
        .with_constraint(invariant(
            "Questionnaire.item.enableWhen",
            "que-7",
            "If the operator is 'exists', the value must be a boolean",
            "operator = 'exists' implies (answer is boolean)",
        )),
        backbone(
            "Questionnaire.item",
            &[
                ("linkId", "string", 1, ONE),
                ("definition", "uri", 0, ONE),
                ("code", "Coding", 0, MANY),
                ("prefix", "string", 0, ONE),
                ("text", "string", 0, ONE),
                ("type", "code", 1, ONE),
                ("enableWhen", "Questionnaire.item.enableWhen", 0, MANY),
                ("required", "boolean", 0, ONE),
                ("repeats", "boolean", 0, ONE),
                ("readOnly", "boolean", 0, ONE),
                ("maxLength", "integer", 0, ONE),
                ("answerValueSet", "canonical", 0, ONE),
                ("answerOption", "Questionnaire.item.answerOption", 0, MANY),
                ("initial", "Questionnaire.item.initial", 0, MANY),
                ("item", "Questionnaire.item", 0, MANY),
            ],
        ),
        backbone(
            "Questionnaire.item.enableWhen",
            &[
                ("question", "string", 1, ONE),
                ("operator", "code", 1, ONE),
                (
                    "answer[x]",
                    "boolean|decimal|integer|date|dateTime|time|string|Coding|Quantity|Reference",
                    1,
                    ONE,
                ),
            ],
        ),
        backbone(
            "Questionnaire.item.answerOption",
            &[
                ("value[x]", "integer|date|time|string|Coding|Reference", 1, ONE),
                ("initialSelected", "boolean", 0, ONE),
            ],
        ),
        backbone(
            "Questionnaire.item.initial",
            &[(
                "value[x]",
                "boolean|decimal|integer|date|dateTime|time|string|uri|Attachment|Coding|Quantity|Reference",
                1,
                ONE,
            )],
        ),
    ]
}

fn diagnostic_report() -> Vec<TypeDeclaration> {
    vec![
        resource(
            "DiagnosticReport",
            "DomainResource",
            &[
                ("identifier", "Identifier", 0, MANY),
                ("basedOn", "Reference", 0, MANY),
                ("status", "code", 1, ONE),
                ("category", "CodeableConcept", 0, MANY),
                ("code", "CodeableConcept", 1, ONE),
                ("subject", "Reference", 0, ONE),
                ("effective[x]", "dateTime|Period", 0, ONE),
                ("issued", "instant", 0, ONE),
                ("performer", "Reference", 0, MANY),
                ("result", "Reference", 0, MANY),
                ("conclusion", "markdown", 0, ONE),
                ("composition", "Reference", 0, ONE),
                ("presentedForm", "Attachment", 0, MANY),
            ],
        )
        .with_constraint(invariant(
            "DiagnosticReport",
            "dgr-1",
            "When a Composition is referenced in `Diagnostic.composition`, all Observation resources referenced in `Composition.entry` must also be referenced in `Diagnostic.entry` or in the references Observations in `Observation.hasMember`",
            "composition.exists() implies (composition.resolve().section.entry.reference.where(resolve() is Observation) in (result.reference|result.reference.resolve().hasMember.reference))",
        )),
    ]
}

fn plan_definition() -> Vec<TypeDeclaration> {
    vec![
        resource(
            "PlanDefinition",
            "DomainResource",
            &[
                ("url", "uri", 0, ONE),
                ("name", "string", 0, ONE),
                ("title", "string", 0, ONE),
                ("status", "code", 1, ONE),
                ("goal", "PlanDefinition.goal", 0, MANY),
                ("action", "PlanDefinition.action", 0, MANY),
            ],
        )
        .with_constraint(invariant(
            "PlanDefinition",
            "pld-3",
            "goalid should reference the id of a goal definition",
            "%context.repeat(action).where((goalId in %context.goal.id).not()).exists().not()",
        )),
        backbone(
            "PlanDefinition.goal",
            &[
                ("category", "CodeableConcept", 0, ONE),
                ("description", "CodeableConcept", 1, ONE),
            ],
        ),
        backbone(
            "PlanDefinition.action",
            &[
                ("prefix", "string", 0, ONE),
                ("title", "string", 0, ONE),
                ("description", "markdown", 0, ONE),
                ("goalId", "id", 0, MANY),
                ("action", "PlanDefinition.action", 0, MANY),
            ],
        ),
    ]
}

fn extensions() -> Vec<TypeDeclaration> {
    vec![
        extension("patient-birthPlace", "Address"),
        extension("patient-mothersMaidenName", "string"),
        extension("data-absent-reason", "code"),
    ]
}

/// Build a fresh copy of the built-in model
pub fn builtin_source() -> InMemorySource {
    let mut source = InMemorySource::new("built-in model");
    let groups = [
        foundation(),
        primitives(),
        data_types(),
        patient(),
        observation(),
        bundle(),
        questionnaire(),
        diagnostic_report(),
        plan_definition(),
        extensions(),
    ];
    for declaration in groups.into_iter().flatten() {
        source.insert(declaration);
    }
    source
}

static BUILTIN: Lazy<Arc<InMemorySource>> = Lazy::new(|| Arc::new(builtin_source()));

/// Shared instance of the built-in model
pub fn builtin_model() -> Arc<dyn TypeSource> {
    BUILTIN.clone()
}
