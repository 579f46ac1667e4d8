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

//! FHIR data model: declarations, stores and the navigable resolver

pub mod builtin;
pub mod config;
pub mod declaration;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod structure_definition;
pub mod types;

pub use builtin::{builtin_model, builtin_source};
pub use config::{ResolverConfig, SourceConfig, open_local_source, open_source};
pub use declaration::{
    ConstraintDeclaration, Derivation, ElementDeclaration, ElementKind, TypeDeclaration, TypeKind,
};
pub use error::{ModelError, ModelResult};
pub use registry::RegistryClient;
pub use resolver::{FlatType, MemberLookup, ModelResolver};
pub use source::{
    BundleSource, CachedSource, DirectorySource, InMemorySource, MultiSource, TypeSource,
};
pub use structure_definition::{StructureDefinition, definitions_from_json};
pub use types::{Cardinality, SystemType, TypeRef, TypeSet};
