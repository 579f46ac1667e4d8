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

//! Parsing then echoing reproduces the source byte for byte

use octofhir_fhirpath_validator::ast::{ExpressionNode, echo, node_source};
use octofhir_fhirpath_validator::conformance::extract_invariants;
use octofhir_fhirpath_validator::model::builtin_model;
use octofhir_fhirpath_validator::parser::parse;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case::whitespace("name . given   .exists( )")]
#[case::leading_and_trailing("   active = true   ")]
#[case::newlines("name.exists()\n  and\n\tbirthDate.exists()\r\n")]
#[case::line_comment("active // is it?\n or deceased.exists()")]
#[case::block_comment("/* head */ name /* mid */ .given")]
#[case::single_quotes("name.where(use = 'official')")]
#[case::escapes(r"'it\'s a é \t test'")]
#[case::backticks("`given`.exists() and name.`family`")]
#[case::integers("1 + 02 + 10L")]
#[case::decimals("1.50 * 0.0 - 3.14159")]
#[case::quantities("4.5 'mg' + 2 days + 1 'wk'")]
#[case::dates("@2020-01-01 < @2020-01-01T10:00:00.000+01:00")]
#[case::partial_dates("@2020 | @2020-02 | @T10:00 | @2020-01-01T")]
#[case::externals("%resource.id | %`vs-x` | %'ext' | %vs-administrative-gender")]
#[case::specials("name.select($this.given).where($index > 0)")]
#[case::empty("{ } .empty()")]
#[case::unary("- 5 + +3")]
#[case::type_operators("value is  FHIR.Quantity and (value as Quantity).unit = 'mg'")]
#[case::indexer("name [ 0 ] .given[1]")]
#[case::keywords_as_names("div.contains('x') and contains.exists()")]
#[case::implies("a implies b implies c")]
fn echo_matches_source(#[case] source: &str) {
    let parsed = parse(source).unwrap();
    assert_eq!(echo(&parsed), source);
}

#[test]
fn echo_reparses_to_same_tree() {
    let source = "name.where(use = 'usual' or use.empty()).given.first() | 'x'";
    let first = parse(source).unwrap();
    let second = parse(&echo(&first)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn node_source_keeps_inner_text() {
    let parsed = parse("(a  +  b) * c").unwrap();
    let ExpressionNode::BinaryOperation(binary) = &parsed.root else {
        panic!("expected binary operation");
    };
    assert_eq!(node_source(&binary.left), "(a  +  b)");
}

#[test]
fn every_builtin_invariant_round_trips() {
    for case in extract_invariants(&builtin_model()) {
        let parsed = parse(&case.expression)
            .unwrap_or_else(|e| panic!("{} does not parse: {e}", case.id()));
        assert_eq!(echo(&parsed), case.expression, "{}", case.id());
    }
}
