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

//! Variables and focus frames visible while checking

use crate::model::{SystemType, TypeSet};
use indexmap::IndexMap;

/// Prefixes of terminology constants that are always strings
const URL_CONSTANT_PREFIXES: [&str; 2] = ["vs-", "ext-"];

/// Constants that are always strings
const STRING_CONSTANTS: [&str; 3] = ["ucum", "sct", "loinc"];

/// Focus of an iteration or of the whole expression
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Type of `$this`
    pub this: TypeSet,
    /// Whether `$index` is bound
    pub indexed: bool,
    /// Type of `$total` inside `aggregate`
    pub total: Option<TypeSet>,
}

impl Frame {
    /// Root frame
    pub fn root(this: TypeSet) -> Self {
        Self {
            this,
            indexed: false,
            total: None,
        }
    }

    /// Frame of an iteration over `input`
    pub fn iteration(input: &TypeSet) -> Self {
        Self {
            this: input.clone().as_singleton(),
            indexed: true,
            total: None,
        }
    }
}

/// Named `%` variables and the stack of focus frames
#[derive(Debug, Clone, Default)]
pub struct Environment {
    variables: IndexMap<String, TypeSet>,
    frames: Vec<Frame>,
}

impl Environment {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `%name`, replacing an earlier binding
    pub fn define(&mut self, name: impl Into<String>, types: TypeSet) {
        self.variables.insert(name.into(), types);
    }

    /// Type of `%name`
    pub fn variable(&self, name: &str) -> Option<TypeSet> {
        if let Some(types) = self.variables.get(name) {
            return Some(types.clone());
        }
        let builtin = STRING_CONSTANTS.contains(&name)
            || URL_CONSTANT_PREFIXES.iter().any(|p| name.starts_with(p));
        builtin.then(|| TypeSet::singleton(SystemType::String))
    }

    /// Whether `%name` is bound explicitly
    pub fn is_defined(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Number of explicit bindings; see [`Environment::restore`]
    pub fn mark(&self) -> usize {
        self.variables.len()
    }

    /// Drop bindings made after `mark`
    pub fn restore(&mut self, mark: usize) {
        self.variables.truncate(mark);
    }

    /// Names of explicit bindings in definition order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Enter a focus frame
    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Leave the innermost focus frame
    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Innermost focus frame
    pub fn frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Mutable innermost focus frame
    pub fn frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Type of `$this`
    pub fn this(&self) -> TypeSet {
        self.frame().map(|f| f.this.clone()).unwrap_or_default()
    }

    /// Whether `$index` is bound in the innermost frame
    pub fn has_index(&self) -> bool {
        self.frame().is_some_and(|f| f.indexed)
    }

    /// Type of `$total` in the innermost frame
    pub fn total(&self) -> Option<TypeSet> {
        self.frame().and_then(|f| f.total.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cardinality, TypeRef};

    #[test]
    fn test_string_constants() {
        let env = Environment::new();
        assert_eq!(env.variable("ucum"), Some(TypeSet::singleton(SystemType::String)));
        assert!(env.variable("vs-administrative-gender").is_some());
        assert!(env.variable("ext-birthPlace").is_some());
        assert!(env.variable("undefined").is_none());
    }

    #[test]
    fn test_restore_drops_later_bindings() {
        let mut env = Environment::new();
        env.define("context", TypeSet::singleton(TypeRef::named("Patient")));
        let mark = env.mark();
        env.define("x", TypeSet::singleton(SystemType::Integer));
        assert!(env.is_defined("x"));
        env.restore(mark);
        assert!(!env.is_defined("x"));
        assert!(env.is_defined("context"));
    }

    #[test]
    fn test_frames() {
        let mut env = Environment::new();
        assert!(env.this().is_empty());
        env.push_frame(Frame::root(TypeSet::singleton(TypeRef::named("Patient"))));
        assert!(!env.has_index());
        env.push_frame(Frame::iteration(&TypeSet::collection(TypeRef::named("HumanName"))));
        assert!(env.has_index());
        assert_eq!(env.this().cardinality(), Cardinality::Singleton);
        env.pop_frame();
        assert_eq!(env.this(), TypeSet::singleton(TypeRef::named("Patient")));
    }
}
