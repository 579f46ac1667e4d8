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

//! Stores of type declarations
//!
//! Every store implements [`TypeSource`]. Caching and fallback across several
//! stores are decorators ([`CachedSource`], [`MultiSource`]) rather than
//! variations of a store.

use super::declaration::TypeDeclaration;
use super::error::{ModelError, ModelResult};
use super::structure_definition::definitions_from_json;
use indexmap::IndexMap;
use log::{debug, info, warn};
use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolves declarations by type name or canonical URL
pub trait TypeSource: Send + Sync {
    /// Resolve a declaration; `None` when the source does not know `id`
    fn resolve(&self, id: &str) -> Option<Arc<TypeDeclaration>>;

    /// Every declaration the source can enumerate
    fn declarations(&self) -> Vec<Arc<TypeDeclaration>>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Declarations held in memory
#[derive(Debug, Default, Clone)]
pub struct InMemorySource {
    by_name: IndexMap<String, Arc<TypeDeclaration>>,
    by_url: FxHashMap<String, String>,
    label: String,
}

impl InMemorySource {
    /// Create an empty source
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Add or replace a declaration
    pub fn insert(&mut self, declaration: TypeDeclaration) {
        if let Some(url) = &declaration.url {
            self.by_url.insert(url.clone(), declaration.name.clone());
        }
        self.by_name
            .insert(declaration.name.clone(), Arc::new(declaration));
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, declaration: TypeDeclaration) -> Self {
        self.insert(declaration);
        self
    }

    /// Add all declarations found in a JSON document
    pub fn load_json(&mut self, value: serde_json::Value, origin: &Path) -> ModelResult<usize> {
        let definitions = definitions_from_json(value).map_err(|source| ModelError::Json {
            path: origin.to_path_buf(),
            source,
        })?;
        let mut count = 0;
        for definition in definitions {
            for declaration in definition.to_declarations() {
                self.insert(declaration);
                count += 1;
            }
        }
        Ok(count)
    }

    /// Add all declarations found in a JSON file
    pub fn load_file(&mut self, path: &Path) -> ModelResult<usize> {
        let text = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|source| ModelError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        self.load_json(value, path)
    }

    /// Number of declarations
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// No declarations
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl TypeSource for InMemorySource {
    fn resolve(&self, id: &str) -> Option<Arc<TypeDeclaration>> {
        if let Some(found) = self.by_name.get(id) {
            return Some(found.clone());
        }
        self.by_url
            .get(id)
            .and_then(|name| self.by_name.get(name))
            .cloned()
    }

    fn declarations(&self) -> Vec<Arc<TypeDeclaration>> {
        self.by_name.values().cloned().collect()
    }

    fn describe(&self) -> String {
        format!("{} ({} declarations)", self.label, self.by_name.len())
    }
}

/// Every `*.json` definition (or Bundle of definitions) in a directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    inner: InMemorySource,
}

impl DirectorySource {
    /// Load the directory eagerly. Files that are not definitions are
    /// skipped; unreadable or malformed files are skipped with a warning.
    pub fn open(root: impl Into<PathBuf>) -> ModelResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ModelError::Io {
                path: root.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }

        let pattern = root.join("*.json");
        let mut inner = InMemorySource::new(format!("directory {}", root.display()));
        for entry in glob::glob(&pattern.to_string_lossy())? {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    warn!("Skipping unreadable entry: {err}");
                    continue;
                }
            };
            match inner.load_file(&path) {
                Ok(0) => debug!("No definitions in {}", path.display()),
                Ok(count) => debug!("Loaded {count} declarations from {}", path.display()),
                Err(err) => warn!("Skipping {}: {err}", path.display()),
            }
        }

        info!("Loaded {} declarations from {}", inner.len(), root.display());
        Ok(Self { root, inner })
    }

    /// Directory this source was loaded from
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TypeSource for DirectorySource {
    fn resolve(&self, id: &str) -> Option<Arc<TypeDeclaration>> {
        self.inner.resolve(id)
    }

    fn declarations(&self) -> Vec<Arc<TypeDeclaration>> {
        self.inner.declarations()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

/// A single definitions Bundle such as `profiles-resources.json`
#[derive(Debug, Clone)]
pub struct BundleSource {
    inner: InMemorySource,
}

impl BundleSource {
    /// Load the bundle file; fails if it holds no definitions
    pub fn open(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let mut inner = InMemorySource::new(format!("bundle {}", path.display()));
        let count = inner.load_file(path)?;
        if count == 0 {
            return Err(ModelError::NotADefinition(path.display().to_string()));
        }
        info!("Loaded {count} declarations from {}", path.display());
        Ok(Self { inner })
    }
}

impl TypeSource for BundleSource {
    fn resolve(&self, id: &str) -> Option<Arc<TypeDeclaration>> {
        self.inner.resolve(id)
    }

    fn declarations(&self) -> Vec<Arc<TypeDeclaration>> {
        self.inner.declarations()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

/// LRU cache in front of another source; misses are cached too
pub struct CachedSource {
    inner: Arc<dyn TypeSource>,
    cache: Mutex<LruCache<String, Option<Arc<TypeDeclaration>>>>,
}

impl CachedSource {
    /// Default number of cached lookups
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Wrap `inner` with a cache of `capacity` entries
    pub fn new(inner: Arc<dyn TypeSource>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl TypeSource for CachedSource {
    fn resolve(&self, id: &str) -> Option<Arc<TypeDeclaration>> {
        if let Some(hit) = self.cache.lock().get(id) {
            return hit.clone();
        }
        let resolved = self.inner.resolve(id);
        self.cache.lock().put(id.to_string(), resolved.clone());
        resolved
    }

    fn declarations(&self) -> Vec<Arc<TypeDeclaration>> {
        self.inner.declarations()
    }

    fn describe(&self) -> String {
        format!("cached {}", self.inner.describe())
    }
}

/// Several sources queried in order; the first hit wins
#[derive(Default)]
pub struct MultiSource {
    sources: Vec<Arc<dyn TypeSource>>,
}

impl MultiSource {
    /// Create from sources in priority order
    pub fn new(sources: Vec<Arc<dyn TypeSource>>) -> Self {
        Self { sources }
    }

    /// Append a lower-priority source
    pub fn push(&mut self, source: Arc<dyn TypeSource>) {
        self.sources.push(source);
    }
}

impl TypeSource for MultiSource {
    fn resolve(&self, id: &str) -> Option<Arc<TypeDeclaration>> {
        self.sources.iter().find_map(|s| s.resolve(id))
    }

    fn declarations(&self) -> Vec<Arc<TypeDeclaration>> {
        let mut seen: IndexMap<String, Arc<TypeDeclaration>> = IndexMap::new();
        for source in &self.sources {
            for declaration in source.declarations() {
                seen.entry(declaration.name.clone()).or_insert(declaration);
            }
        }
        seen.into_values().collect()
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.sources.iter().map(|s| s.describe()).collect();
        format!("multi [{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::declaration::TypeKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        inner: InMemorySource,
        hits: AtomicUsize,
    }

    impl TypeSource for CountingSource {
        fn resolve(&self, id: &str) -> Option<Arc<TypeDeclaration>> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve(id)
        }

        fn declarations(&self) -> Vec<Arc<TypeDeclaration>> {
            self.inner.declarations()
        }

        fn describe(&self) -> String {
            "counting".into()
        }
    }

    fn patient() -> TypeDeclaration {
        TypeDeclaration::new("Patient", TypeKind::Resource)
            .with_url("http://hl7.org/fhir/StructureDefinition/Patient")
    }

    #[test]
    fn test_in_memory_resolves_by_name_and_url() {
        let source = InMemorySource::new("test").with(patient());
        assert!(source.resolve("Patient").is_some());
        assert!(
            source
                .resolve("http://hl7.org/fhir/StructureDefinition/Patient")
                .is_some()
        );
        assert!(source.resolve("Observation").is_none());
    }

    #[test]
    fn test_cache_hits_inner_once() {
        let counting = Arc::new(CountingSource {
            inner: InMemorySource::new("test").with(patient()),
            hits: AtomicUsize::new(0),
        });
        let cached = CachedSource::new(counting.clone(), 8);
        for _ in 0..3 {
            assert!(cached.resolve("Patient").is_some());
            assert!(cached.resolve("Missing").is_none());
        }
        assert_eq!(counting.hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_multi_source_priority() {
        let first = InMemorySource::new("first")
            .with(TypeDeclaration::new("Patient", TypeKind::Resource).with_base("DomainResource"));
        let second = InMemorySource::new("second")
            .with(patient())
            .with(TypeDeclaration::new("Observation", TypeKind::Resource));
        let multi = MultiSource::new(vec![Arc::new(first), Arc::new(second)]);

        let resolved = multi.resolve("Patient").unwrap();
        assert_eq!(resolved.base.as_deref(), Some("DomainResource"));
        assert!(multi.resolve("Observation").is_some());
        assert_eq!(multi.declarations().len(), 2);
    }

    #[test]
    fn test_directory_source_missing_dir() {
        assert!(DirectorySource::open("/definitely/not/here").is_err());
    }
}
