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

//! Type-check one FHIRPath expression from the command line

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use octofhir_fhirpath_validator::analyzer::{CheckerConfig, TypeChecker};
use octofhir_fhirpath_validator::ast::echo;
use octofhir_fhirpath_validator::diagnostics::{DiagnosticFormatter, Format};
use octofhir_fhirpath_validator::model::{
    Cardinality, ModelResolver, ResolverConfig, TypeSet, open_local_source,
};
use octofhir_fhirpath_validator::parser::parse;
use std::path::PathBuf;
use std::process;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Compact,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => Format::Text,
            OutputFormat::Json => Format::Json,
            OutputFormat::Compact => Format::Compact,
        }
    }
}

#[derive(Parser)]
#[command(name = "fhirpath-check")]
#[command(about = "Statically type-check a FHIRPath expression against a FHIR type")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Args {
    /// FHIRPath expression to check
    expression: String,
    /// Context path, e.g. `Patient` or `Bundle.entry`
    #[arg(short, long)]
    context: String,
    /// Directory of StructureDefinitions or a definitions Bundle file
    #[arg(long, env = "FHIR_CORPUS_PATH")]
    corpus: Option<PathBuf>,
    /// Extra variable as `name=Type` (available as `%name`)
    #[arg(long = "var", value_name = "NAME=TYPE")]
    variables: Vec<String>,
    /// Strict member and cardinality checks
    #[arg(long)]
    strict: bool,
    /// Diagnostic output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Only print the OperationOutcome document
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    human_panic::setup_panic!();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(success) => process::exit(if success { 0 } else { 1 }),
        Err(err) => {
            eprintln!("❌ {err:#}");
            process::exit(2);
        }
    }
}

fn parse_variable(resolver: &ModelResolver, spec: &str) -> Result<(String, TypeSet)> {
    let Some((name, type_name)) = spec.split_once('=') else {
        bail!("variable `{spec}` is not of the form name=Type");
    };
    let (namespace, type_name) = match type_name.split_once('.') {
        Some((ns, name)) => (Some(ns), name),
        None => (None, type_name),
    };
    let ty = resolver
        .type_specifier(namespace, type_name)
        .with_context(|| format!("unknown type `{type_name}` for variable `{name}`"))?;
    Ok((name.trim_start_matches('%').to_string(), TypeSet::of(ty, Cardinality::Singleton)))
}

fn run(args: &Args) -> Result<bool> {
    let config = match &args.corpus {
        Some(path) if path.is_file() => ResolverConfig::bundle(path),
        Some(path) => ResolverConfig::directory(path),
        None => ResolverConfig::builtin(),
    };
    let resolver = ModelResolver::new(open_local_source(&config));
    let checker_config = if args.strict {
        CheckerConfig::strict()
    } else {
        CheckerConfig::default()
    };

    let expression = parse(&args.expression).context("cannot parse expression")?;
    let mut checker = TypeChecker::with_config(&resolver, checker_config);
    checker
        .set_context(&args.context)
        .with_context(|| format!("invalid context `{}`", args.context))?;
    for spec in &args.variables {
        let (name, types) = parse_variable(&resolver, spec)?;
        checker.register_variable(name, types);
    }
    let result = checker.visit(&expression);
    let outcome = checker.into_outcome();

    if !args.quiet {
        println!("Expression: {}", echo(&expression));
        println!("Context:    {}", args.context);
        println!("Result:     {result}");
        if !outcome.is_empty() {
            println!();
            let formatter = DiagnosticFormatter::new(args.format.into());
            print!("{}", formatter.format_outcome(&outcome, Some(&args.expression)));
        }
        println!();
    }
    println!("{}", serde_json::to_string_pretty(&outcome.to_operation_outcome())?);
    Ok(outcome.success())
}
