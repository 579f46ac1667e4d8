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

//! Literal values

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal values in FHIRPath
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    /// Empty collection `{}`
    Empty,
    /// Boolean literal
    Boolean(bool),
    /// String literal, escapes resolved
    String(String),
    /// Integer literal
    Integer(i64),
    /// Long integer literal (`10L`)
    Long(i64),
    /// Decimal literal
    Decimal(Decimal),
    /// Date literal without the `@` prefix
    Date(String),
    /// DateTime literal without the `@` prefix
    DateTime(String),
    /// Time literal without the `@T` prefix
    Time(String),
    /// Quantity literal
    Quantity {
        /// Numeric value
        value: Decimal,
        /// UCUM code or calendar duration keyword
        unit: String,
    },
}

impl LiteralValue {
    /// FHIRPath system type name of the literal
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Boolean(_) => "Boolean",
            Self::String(_) => "String",
            Self::Integer(_) => "Integer",
            Self::Long(_) => "Long",
            Self::Decimal(_) => "Decimal",
            Self::Date(_) => "Date",
            Self::DateTime(_) => "DateTime",
            Self::Time(_) => "Time",
            Self::Quantity { .. } => "Quantity",
        }
    }

    /// String payload, if this is a string literal
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "{{}}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "'{s}'"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Long(i) => write!(f, "{i}L"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Date(d) => write!(f, "@{d}"),
            Self::DateTime(dt) => write!(f, "@{dt}"),
            Self::Time(t) => write!(f, "@T{t}"),
            Self::Quantity { value, unit } => write!(f, "{value} '{unit}'"),
        }
    }
}
