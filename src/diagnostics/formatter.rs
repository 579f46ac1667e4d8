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

//! Formatting diagnostics for different output formats

use super::diagnostic::{Diagnostic, Severity};
use super::outcome::{Outcome, OutcomeIssue};

/// Output format for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable text format
    Text,
    /// JSON format
    Json,
    /// Compact single-line format
    Compact,
}

/// Formatter for diagnostics
#[derive(Debug, Clone)]
pub struct DiagnosticFormatter {
    format: Format,
    show_code: bool,
    show_help: bool,
    #[cfg(feature = "terminal")]
    use_color: bool,
}

impl DiagnosticFormatter {
    /// Create a new formatter
    pub fn new(format: Format) -> Self {
        Self {
            format,
            show_code: true,
            show_help: true,
            #[cfg(feature = "terminal")]
            use_color: true,
        }
    }

    /// Set whether to show error codes
    pub fn with_code(mut self, show: bool) -> Self {
        self.show_code = show;
        self
    }

    /// Set whether to show help lines
    pub fn with_help(mut self, show: bool) -> Self {
        self.show_help = show;
        self
    }

    /// Set whether to use color (terminal feature only)
    #[cfg(feature = "terminal")]
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    /// Format a diagnostic; `source` is the full expression text
    pub fn format(&self, diagnostic: &Diagnostic, source: Option<&str>) -> String {
        match self.format {
            Format::Text => self.format_text(diagnostic, source),
            Format::Json => serde_json::to_string_pretty(&OutcomeIssue::from(diagnostic))
                .unwrap_or_else(|_| format!("{diagnostic:?}")),
            Format::Compact => self.format_compact(diagnostic),
        }
    }

    /// Format every diagnostic of an outcome
    pub fn format_outcome(&self, outcome: &Outcome, source: Option<&str>) -> String {
        match self.format {
            Format::Text => outcome
                .iter()
                .map(|d| self.format_text(d, source))
                .collect::<Vec<_>>()
                .join("\n"),
            Format::Json => serde_json::to_string_pretty(&outcome.to_operation_outcome())
                .unwrap_or_else(|_| format!("{outcome:?}")),
            Format::Compact => outcome
                .iter()
                .map(|d| self.format_compact(d))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    fn header(&self, diagnostic: &Diagnostic) -> String {
        #[cfg(feature = "terminal")]
        if self.use_color {
            use colored::Colorize;
            let severity = match diagnostic.severity {
                Severity::Error => "error".red().bold(),
                Severity::Warning => "warning".yellow().bold(),
                Severity::Information => "info".blue().bold(),
            };
            return format!("{}: {}", severity, diagnostic.message.bold());
        }
        format!("{}: {}", diagnostic.severity, diagnostic.message)
    }

    #[cfg_attr(not(feature = "terminal"), allow(unused_variables))]
    fn underline(&self, severity: Severity, width: usize) -> String {
        let marks = "^".repeat(width.max(1));
        #[cfg(feature = "terminal")]
        if self.use_color {
            use colored::Colorize;
            return match severity {
                Severity::Error => marks.red().to_string(),
                Severity::Warning => marks.yellow().to_string(),
                Severity::Information => marks.blue().to_string(),
            };
        }
        marks
    }

    fn format_text(&self, diagnostic: &Diagnostic, source: Option<&str>) -> String {
        let mut result = self.header(diagnostic);
        if self.show_code {
            result.push_str(&format!(" [{}]", diagnostic.code_string()));
        }
        result.push('\n');

        if let Some(span) = diagnostic.span {
            result.push_str(&format!(" --> {span}\n"));
            // Only single-line expressions get an underline
            if let Some(text) = source.filter(|s| !s.contains('\n') && span.end <= s.len()) {
                let column = text
                    .get(..span.start)
                    .map(|prefix| prefix.chars().count())
                    .unwrap_or(0);
                let width = text
                    .get(span.start..span.end)
                    .map(|covered| covered.chars().count())
                    .unwrap_or(1);
                result.push_str(&format!("   | {text}\n"));
                result.push_str("   | ");
                result.push_str(&" ".repeat(column));
                result.push_str(&self.underline(diagnostic.severity, width));
                result.push('\n');
            }
        }

        if self.show_help {
            if let Some(help) = &diagnostic.help {
                result.push_str(&format!("   = help: {help}\n"));
            }
        }
        result
    }

    fn format_compact(&self, diagnostic: &Diagnostic) -> String {
        let code = if self.show_code {
            format!("[{}] ", diagnostic.code_string())
        } else {
            String::new()
        };
        let location = diagnostic
            .span
            .map(|span| format!("{span}: "))
            .unwrap_or_default();

        format!("{location}{}: {code}{}", diagnostic.severity, diagnostic.message)
    }
}

impl Default for DiagnosticFormatter {
    fn default() -> Self {
        Self::new(Format::Text)
    }
}
