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

//! Checks every invariant declared by a FHIR definition corpus
//!
//! Exit codes: 0 when all cases pass (known failures ignored), 1 on
//! unexpected failures or stale known-failure entries, 2 on a fatal error
//! before any check ran.

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};
use octofhir_fhirpath_validator::analyzer::CheckerConfig;
use octofhir_fhirpath_validator::conformance::{
    Harness, HarnessConfig, HttpEvaluator, RunReport, TestOutcome, extract_invariants,
};
use octofhir_fhirpath_validator::model::{ModelResolver, ResolverConfig, open_local_source};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "invariant-runner")]
#[command(about = "Type-check every invariant declared by a FHIR definition corpus")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Args {
    /// Directory of StructureDefinitions or a definitions Bundle file
    #[arg(long, env = "FHIR_CORPUS_PATH")]
    corpus: Option<PathBuf>,
    /// Use only the built-in model, ignoring --corpus
    #[arg(long, env = "FHIR_DISABLE_SPEC_SOURCE")]
    disable_spec_source: bool,
    /// Known-failure list; searched in ./static, ./ and ../../static when absent
    #[arg(long, env = "FHIR_KNOWN_FAILURES")]
    known_failures: Option<PathBuf>,
    /// Directory receiving one JSON result document per case
    #[arg(long, env = "FHIRPATH_RESULTS_PATH")]
    results_path: Option<PathBuf>,
    /// Evaluate remotely against this endpoint instead of checking locally
    #[arg(long, env = "FHIRPATH_REMOTE_URL")]
    remote_url: Option<String>,
    /// Engine identifier sent to the remote evaluator
    #[arg(long)]
    engine: Option<String>,
    /// Report members found on only some alternatives as errors
    #[arg(long)]
    strict: bool,
    /// Do not count warnings as failures
    #[arg(long)]
    allow_warnings: bool,
    /// Concurrent remote requests
    #[arg(long, default_value_t = 8)]
    concurrency: usize,
    /// Remote request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
    /// Print every case, not only failures
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn resolver_config(&self) -> ResolverConfig {
        match &self.corpus {
            Some(_) if self.disable_spec_source => ResolverConfig::builtin(),
            Some(path) if path.is_file() => ResolverConfig::bundle(path),
            Some(path) => ResolverConfig::directory(path),
            None => ResolverConfig::builtin(),
        }
    }

    fn harness_config(&self) -> HarnessConfig {
        let checker = if self.strict {
            CheckerConfig::strict()
        } else {
            CheckerConfig::default()
        };
        HarnessConfig {
            known_failures: self.known_failures.clone(),
            results_dir: self.results_path.clone(),
            checker,
            require_zero_warnings: !self.allow_warnings,
            concurrency: self.concurrency,
            timeout_secs: self.timeout,
        }
    }
}

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let args = Args::parse();
    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();

    match run(&args).await {
        Ok(report) => {
            print_report(&report, args.verbose);
            process::exit(report.exit_code());
        }
        Err(err) => {
            eprintln!("❌ Fatal error: {err:#}");
            process::exit(2);
        }
    }
}

async fn run(args: &Args) -> Result<RunReport> {
    println!("FHIRPath Invariant Runner");
    println!("=========================");

    let source = open_local_source(&args.resolver_config());
    let cases = extract_invariants(&source);
    let resolver = Arc::new(ModelResolver::new(source));
    let harness = Harness::with_discovered_failures(resolver, args.harness_config());

    println!("Configuration:");
    println!("  Model: {}", harness_source_label(args));
    if let Some(path) = &args.results_path {
        println!("  Results Path: {}", path.display());
    }
    println!("  Known Failures: {} defined", harness.known_failures().len());
    println!();
    println!("Found {} invariants to check.", cases.len());
    println!();

    let report = match &args.remote_url {
        Some(url) => {
            let mut evaluator = HttpEvaluator::new(url, Duration::from_secs(args.timeout))
                .with_context(|| format!("cannot use remote evaluator {url}"))?;
            if let Some(engine) = &args.engine {
                evaluator = evaluator.with_engine(engine);
            }
            harness.run_remote(&cases, &evaluator).await?
        }
        None => harness.run_local(&cases)?,
    };
    Ok(report)
}

fn harness_source_label(args: &Args) -> String {
    match (&args.corpus, args.disable_spec_source) {
        (Some(path), false) => path.display().to_string(),
        _ => "built-in".to_string(),
    }
}

fn print_report(report: &RunReport, verbose: bool) {
    for case in &report.cases {
        let interesting = !matches!(case.outcome, TestOutcome::Passed);
        if !verbose && !interesting {
            continue;
        }
        match &case.message {
            Some(message) => {
                println!("{} {}... {} - {message}", case.group, case.key, case.outcome)
            }
            None => println!("{} {}... {}", case.group, case.key, case.outcome),
        }
    }

    let summary = &report.summary;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Outcome", "Count"]);
    for (label, count) in [
        ("Passed", summary.passed),
        ("Failed", summary.failed),
        ("Known Failures", summary.known_failures),
        ("Skipped", summary.skipped),
        ("Resolved", summary.resolved),
        ("Total", summary.total()),
    ] {
        table.add_row(vec![label.to_string(), count.to_string()]);
    }
    println!();
    println!("{table}");
    println!();

    if summary.failed > 0 {
        println!("❌ Invariants FAILED");
        println!(
            "   {} unexpected failures occurred (known failures are ignored)",
            summary.failed
        );
    } else if summary.resolved > 0 {
        println!("❌ Known failure list is stale");
        println!(
            "   {} listed failures now pass; remove them from the list",
            summary.resolved
        );
    } else if summary.known_failures > 0 {
        println!(
            "✅ All invariants PASSED ({} known failures ignored)",
            summary.known_failures
        );
    } else {
        println!("✅ All invariants PASSED");
    }
}
