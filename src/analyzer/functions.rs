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

//! Function signatures for type checking
//!
//! Every function the checker understands is described by a
//! [`FunctionSignature`]: the shape its input must have, how each argument is
//! evaluated and what it must reduce to, and a rule deriving the result type.

use crate::model::{Cardinality, SystemType};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::fmt;

/// Class of values an input or argument must belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// Anything
    Any,
    /// Boolean
    Boolean,
    /// String
    String,
    /// Integer (or Long)
    Integer,
    /// Integer, Long or Decimal
    Numeric,
    /// Numeric or Quantity
    NumericOrQuantity,
    /// Date, DateTime or Time
    Temporal,
    /// Quantity
    Quantity,
}

impl TypeClass {
    /// Whether a system type belongs to this class
    pub fn admits(self, ty: SystemType) -> bool {
        match self {
            TypeClass::Any => true,
            TypeClass::Boolean => ty == SystemType::Boolean,
            TypeClass::String => ty == SystemType::String,
            TypeClass::Integer => matches!(ty, SystemType::Integer | SystemType::Long),
            TypeClass::Numeric => ty.is_numeric(),
            TypeClass::NumericOrQuantity => ty.is_numeric() || ty == SystemType::Quantity,
            TypeClass::Temporal => ty.is_temporal(),
            TypeClass::Quantity => ty == SystemType::Quantity,
        }
    }
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeClass::Any => "any value",
            TypeClass::Boolean => "Boolean",
            TypeClass::String => "String",
            TypeClass::Integer => "Integer",
            TypeClass::Numeric => "a number",
            TypeClass::NumericOrQuantity => "a number or Quantity",
            TypeClass::Temporal => "a date or time",
            TypeClass::Quantity => "Quantity",
        };
        f.write_str(name)
    }
}

/// Input requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRule {
    /// Any collection
    Collection,
    /// At most one item of the given class
    Singleton(TypeClass),
    /// Any number of items of the given class
    Items(TypeClass),
}

/// How an argument is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    /// Evaluated once against the caller's focus
    Value(TypeClass),
    /// Evaluated per input item with `$this` and `$index` bound
    Lambda(TypeClass),
    /// A type name such as `Patient` or `System.String`
    TypeSpecifier,
}

/// Result type derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnRule {
    /// Fixed system type
    Fixed(SystemType, Cardinality),
    /// Input types and cardinality
    Input,
    /// Input types, at most one item
    InputItem,
    /// Input types as a collection
    InputCollection,
    /// Input types reduced to their system types, at most one item
    InputValue,
    /// Types of the lambda argument as a collection
    Projection,
    /// Input types together with the lambda argument's types
    Closure,
    /// Input and first argument combined
    Combine,
    /// Union of the second and third argument
    Conditional,
    /// The type named by the specifier, input cardinality
    Specifier,
    /// The type named by the specifier, collection
    SpecifierCollection,
    /// Lambda result and initial value of an aggregation
    Aggregate,
    /// Typed from the extension URL argument
    Extension,
    /// Not statically known
    Unknown(Cardinality),
}

/// Function signature for type checking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    /// Function name
    pub name: &'static str,
    /// Input requirements
    pub input: InputRule,
    /// Parameters in order
    pub parameters: Vec<Parameter>,
    /// Minimum number of arguments
    pub min_arity: usize,
    /// Whether the last parameter may repeat
    pub variadic: bool,
    /// Result type derivation
    pub returns: ReturnRule,
}

impl FunctionSignature {
    fn new(name: &'static str, returns: ReturnRule) -> Self {
        Self {
            name,
            input: InputRule::Collection,
            parameters: Vec::new(),
            min_arity: 0,
            variadic: false,
            returns,
        }
    }

    fn input(mut self, input: InputRule) -> Self {
        self.input = input;
        self
    }

    fn required(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self.min_arity = self.parameters.len();
        self
    }

    fn optional(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Maximum number of arguments, `None` when variadic
    pub fn max_arity(&self) -> Option<usize> {
        (!self.variadic).then_some(self.parameters.len())
    }

    /// Whether `count` arguments are acceptable
    pub fn accepts_arity(&self, count: usize) -> bool {
        count >= self.min_arity && self.max_arity().is_none_or(|max| count <= max)
    }

    /// Parameter descriptor for argument `index`
    pub fn parameter(&self, index: usize) -> Option<Parameter> {
        self.parameters
            .get(index)
            .or_else(|| self.variadic.then(|| self.parameters.last()).flatten())
            .copied()
    }

    /// Human-readable arity, e.g. `1..2`
    pub fn arity_text(&self) -> String {
        match self.max_arity() {
            Some(max) if max == self.min_arity => max.to_string(),
            Some(max) => format!("{}..{max}", self.min_arity),
            None => format!("{}..*", self.min_arity),
        }
    }
}

use Cardinality::{Collection, Singleton};
use Parameter::{Lambda, TypeSpecifier, Value};
use ReturnRule::*;
use SystemType as S;

fn fixed(name: &'static str, ty: SystemType) -> FunctionSignature {
    FunctionSignature::new(name, Fixed(ty, Singleton))
}

fn on(class: TypeClass) -> InputRule {
    InputRule::Singleton(class)
}

fn build_registry() -> Vec<FunctionSignature> {
    use TypeClass as C;
    let mut functions = vec![
        // Existence
        fixed("empty", S::Boolean),
        fixed("exists", S::Boolean).optional(Lambda(C::Boolean)),
        fixed("all", S::Boolean).required(Lambda(C::Boolean)),
        fixed("allTrue", S::Boolean).input(InputRule::Items(C::Boolean)),
        fixed("anyTrue", S::Boolean).input(InputRule::Items(C::Boolean)),
        fixed("allFalse", S::Boolean).input(InputRule::Items(C::Boolean)),
        fixed("anyFalse", S::Boolean).input(InputRule::Items(C::Boolean)),
        fixed("subsetOf", S::Boolean).required(Value(C::Any)),
        fixed("supersetOf", S::Boolean).required(Value(C::Any)),
        fixed("count", S::Integer),
        FunctionSignature::new("distinct", InputCollection),
        fixed("isDistinct", S::Boolean),
        // Filtering and projection
        FunctionSignature::new("where", Input).required(Lambda(C::Boolean)),
        FunctionSignature::new("select", Projection).required(Lambda(C::Any)),
        FunctionSignature::new("repeat", Closure).required(Lambda(C::Any)),
        FunctionSignature::new("repeatAll", Closure).required(Lambda(C::Any)),
        FunctionSignature::new("ofType", SpecifierCollection).required(TypeSpecifier),
        // Subsetting
        FunctionSignature::new("single", InputItem),
        FunctionSignature::new("first", InputItem),
        FunctionSignature::new("last", InputItem),
        FunctionSignature::new("tail", InputCollection),
        FunctionSignature::new("skip", InputCollection).required(Value(C::Integer)),
        FunctionSignature::new("take", InputCollection).required(Value(C::Integer)),
        FunctionSignature::new("intersect", InputCollection).required(Value(C::Any)),
        FunctionSignature::new("exclude", InputCollection).required(Value(C::Any)),
        // Combining
        FunctionSignature::new("union", Combine).required(Value(C::Any)),
        FunctionSignature::new("combine", Combine).required(Value(C::Any)),
        // Conversion
        FunctionSignature::new("iif", Conditional)
            .required(Lambda(C::Boolean))
            .required(Lambda(C::Any))
            .optional(Lambda(C::Any)),
        fixed("toQuantity", S::Quantity)
            .input(on(C::Any))
            .optional(Value(C::String)),
        fixed("convertsToQuantity", S::Boolean)
            .input(on(C::Any))
            .optional(Value(C::String)),
        // String manipulation
        fixed("indexOf", S::Integer).input(on(C::String)).required(Value(C::String)),
        fixed("lastIndexOf", S::Integer).input(on(C::String)).required(Value(C::String)),
        fixed("substring", S::String)
            .input(on(C::String))
            .required(Value(C::Integer))
            .optional(Value(C::Integer)),
        fixed("startsWith", S::Boolean).input(on(C::String)).required(Value(C::String)),
        fixed("endsWith", S::Boolean).input(on(C::String)).required(Value(C::String)),
        fixed("contains", S::Boolean).input(on(C::String)).required(Value(C::String)),
        fixed("upper", S::String).input(on(C::String)),
        fixed("lower", S::String).input(on(C::String)),
        fixed("replace", S::String)
            .input(on(C::String))
            .required(Value(C::String))
            .required(Value(C::String)),
        fixed("matches", S::Boolean).input(on(C::String)).required(Value(C::String)),
        fixed("matchesFull", S::Boolean).input(on(C::String)).required(Value(C::String)),
        fixed("replaceMatches", S::String)
            .input(on(C::String))
            .required(Value(C::String))
            .required(Value(C::String)),
        fixed("length", S::Integer).input(on(C::String)),
        FunctionSignature::new("toChars", Fixed(S::String, Collection)).input(on(C::String)),
        fixed("trim", S::String).input(on(C::String)),
        FunctionSignature::new("split", Fixed(S::String, Collection))
            .input(on(C::String))
            .required(Value(C::String)),
        fixed("join", S::String)
            .input(InputRule::Items(C::String))
            .optional(Value(C::String)),
        fixed("encode", S::String).input(on(C::String)).required(Value(C::String)),
        fixed("decode", S::String).input(on(C::String)).required(Value(C::String)),
        fixed("escape", S::String).input(on(C::String)).required(Value(C::String)),
        fixed("unescape", S::String).input(on(C::String)).required(Value(C::String)),
        // Math
        FunctionSignature::new("abs", InputValue).input(on(C::NumericOrQuantity)),
        FunctionSignature::new("ceiling", Fixed(S::Integer, Singleton)).input(on(C::Numeric)),
        FunctionSignature::new("floor", Fixed(S::Integer, Singleton)).input(on(C::Numeric)),
        FunctionSignature::new("truncate", Fixed(S::Integer, Singleton)).input(on(C::Numeric)),
        fixed("exp", S::Decimal).input(on(C::Numeric)),
        fixed("ln", S::Decimal).input(on(C::Numeric)),
        fixed("log", S::Decimal).input(on(C::Numeric)).required(Value(C::Numeric)),
        FunctionSignature::new("power", InputValue)
            .input(on(C::Numeric))
            .required(Value(C::Numeric)),
        fixed("round", S::Decimal).input(on(C::Numeric)).optional(Value(C::Integer)),
        fixed("sqrt", S::Decimal).input(on(C::Numeric)),
        // Tree navigation
        FunctionSignature::new("children", Unknown(Collection)),
        FunctionSignature::new("descendants", Unknown(Collection)),
        // Utility
        FunctionSignature::new("trace", Input)
            .required(Value(C::String))
            .optional(Lambda(C::Any)),
        fixed("now", S::DateTime),
        fixed("today", S::Date),
        fixed("timeOfDay", S::Time),
        FunctionSignature::new("defineVariable", Input)
            .required(Value(C::String))
            .optional(Lambda(C::Any)),
        FunctionSignature::new("lowBoundary", InputValue)
            .input(on(C::Any))
            .optional(Value(C::Integer)),
        FunctionSignature::new("highBoundary", InputValue)
            .input(on(C::Any))
            .optional(Value(C::Integer)),
        fixed("precision", S::Integer).input(on(C::Any)),
        fixed("comparable", S::Boolean)
            .input(on(C::Quantity))
            .required(Value(C::Quantity)),
        // Date and time components
        fixed("yearOf", S::Integer).input(on(C::Temporal)),
        fixed("monthOf", S::Integer).input(on(C::Temporal)),
        fixed("dayOf", S::Integer).input(on(C::Temporal)),
        fixed("hourOf", S::Integer).input(on(C::Temporal)),
        fixed("minuteOf", S::Integer).input(on(C::Temporal)),
        fixed("secondOf", S::Integer).input(on(C::Temporal)),
        fixed("millisecondOf", S::Integer).input(on(C::Temporal)),
        fixed("timezoneOffsetOf", S::Decimal).input(on(C::Temporal)),
        fixed("dateOf", S::Date).input(on(C::Temporal)),
        fixed("timeOf", S::Time).input(on(C::Temporal)),
        // Aggregates
        FunctionSignature::new("aggregate", Aggregate)
            .required(Lambda(C::Any))
            .optional(Value(C::Any)),
        FunctionSignature::new("sum", InputValue).input(InputRule::Items(C::NumericOrQuantity)),
        FunctionSignature::new("min", InputValue).input(InputRule::Items(C::Any)),
        FunctionSignature::new("max", InputValue).input(InputRule::Items(C::Any)),
        fixed("avg", S::Decimal).input(InputRule::Items(C::NumericOrQuantity)),
        FunctionSignature::new("sort", InputCollection)
            .optional(Lambda(C::Any))
            .variadic(),
        // Types
        fixed("is", S::Boolean).input(on(C::Any)).required(TypeSpecifier),
        FunctionSignature::new("as", Specifier).required(TypeSpecifier),
        FunctionSignature::new("type", Unknown(Collection)),
        // Boolean logic
        fixed("not", S::Boolean).input(on(C::Any)),
        // FHIR additions
        FunctionSignature::new("extension", Extension).required(Value(C::String)),
        fixed("hasValue", S::Boolean),
        FunctionSignature::new("getValue", InputValue).input(on(C::Any)),
        FunctionSignature::new("resolve", Unknown(Collection)),
        fixed("memberOf", S::Boolean).input(on(C::Any)).required(Value(C::String)),
        fixed("conformsTo", S::Boolean).required(Value(C::String)),
        fixed("htmlChecks", S::Boolean),
        fixed("htmlChecks2", S::Boolean),
        FunctionSignature::new("elementDefinition", Unknown(Collection)),
        FunctionSignature::new("slice", Input)
            .required(Value(C::String))
            .required(Value(C::String)),
        FunctionSignature::new("checkModifiers", Input)
            .required(Value(C::String))
            .variadic(),
        fixed("subsumes", S::Boolean).input(on(C::Any)).required(Value(C::Any)),
        fixed("subsumedBy", S::Boolean).input(on(C::Any)).required(Value(C::Any)),
        fixed("getResourceKey", S::String).input(on(C::Any)),
        fixed("getReferenceKey", S::String)
            .input(on(C::Any))
            .optional(TypeSpecifier),
        fixed("hasTemplateIdOf", S::Boolean).required(Value(C::String)),
    ];

    for target in [
        S::Boolean,
        S::Integer,
        S::Long,
        S::Decimal,
        S::Date,
        S::DateTime,
        S::Time,
        S::String,
    ] {
        let (to, converts) = conversion_names(target);
        functions.push(fixed(to, target).input(on(TypeClass::Any)));
        functions.push(fixed(converts, S::Boolean).input(on(TypeClass::Any)));
    }
    functions
}

fn conversion_names(target: SystemType) -> (&'static str, &'static str) {
    match target {
        S::Boolean => ("toBoolean", "convertsToBoolean"),
        S::Integer => ("toInteger", "convertsToInteger"),
        S::Long => ("toLong", "convertsToLong"),
        S::Decimal => ("toDecimal", "convertsToDecimal"),
        S::Date => ("toDate", "convertsToDate"),
        S::DateTime => ("toDateTime", "convertsToDateTime"),
        S::Time => ("toTime", "convertsToTime"),
        S::String | S::Quantity => ("toString", "convertsToString"),
    }
}

static REGISTRY: Lazy<FxHashMap<&'static str, FunctionSignature>> = Lazy::new(|| {
    build_registry()
        .into_iter()
        .map(|signature| (signature.name, signature))
        .collect()
});

/// Signature of a known function
pub fn lookup(name: &str) -> Option<&'static FunctionSignature> {
    REGISTRY.get(name)
}

/// Names of every known function, sorted
pub fn function_names() -> Vec<&'static str> {
    let mut names: Vec<_> = REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Functions whose first argument is a regular expression
pub fn takes_regex(name: &str) -> bool {
    matches!(name, "matches" | "matchesFull" | "replaceMatches")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_size() {
        assert!(function_names().len() >= 100);
    }

    #[test]
    fn test_arity() {
        let substring = lookup("substring").unwrap();
        assert!(!substring.accepts_arity(0));
        assert!(substring.accepts_arity(1));
        assert!(substring.accepts_arity(2));
        assert!(!substring.accepts_arity(3));
        assert_eq!(substring.arity_text(), "1..2");

        let modifiers = lookup("checkModifiers").unwrap();
        assert!(modifiers.accepts_arity(4));
        assert_eq!(modifiers.parameter(3), Some(Value(TypeClass::String)));
        assert_eq!(modifiers.arity_text(), "1..*");
    }

    #[test]
    fn test_conversions_registered() {
        assert_eq!(
            lookup("toInteger").unwrap().returns,
            Fixed(SystemType::Integer, Singleton)
        );
        assert!(lookup("convertsToDateTime").is_some());
        assert!(lookup("toQuantity").is_some());
    }

    #[test]
    fn test_type_class() {
        assert!(TypeClass::Numeric.admits(SystemType::Decimal));
        assert!(!TypeClass::Numeric.admits(SystemType::Quantity));
        assert!(TypeClass::Integer.admits(SystemType::Long));
        assert!(TypeClass::Temporal.admits(SystemType::Time));
    }

    #[test]
    fn test_unknown_function() {
        assert!(lookup("frobnicate").is_none());
    }
}
