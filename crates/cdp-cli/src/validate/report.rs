//! Validation diagnostics and the consolidated report

use crate::error::Result;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

/// Whether a diagnostic blocks generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// What went wrong
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DiagnosticKind {
    #[error("could not parse file: {message}")]
    ParseError { message: String },

    #[error("missing required field '{field}'")]
    MissingField { field: String },

    #[error("unknown {field} '{value}'")]
    UnknownEnumValue { field: String, value: String },

    #[error("duplicate id '{id}' used by: {}", .locations.join(", "))]
    DuplicateId { id: String, locations: Vec<String> },

    #[error("explicit id '{id}' contains characters outside [a-z0-9-]")]
    InvalidIdCharacters { id: String },

    #[error("id is empty after normalization")]
    EmptyId,

    #[error("malformed website URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("city '{city}' has no county mapping; county will be 'unknown'")]
    UnmappedCity { city: String },

    #[error("suppression entry '{entry}' matches no record")]
    OrphanedSuppression { entry: String },

    #[error("unknown field '{field}'")]
    UnknownField { field: String },
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::ParseError { .. }
            | DiagnosticKind::MissingField { .. }
            | DiagnosticKind::UnknownEnumValue { .. }
            | DiagnosticKind::DuplicateId { .. }
            | DiagnosticKind::InvalidIdCharacters { .. }
            | DiagnosticKind::EmptyId => Severity::Error,
            DiagnosticKind::MalformedUrl { .. }
            | DiagnosticKind::UnmappedCity { .. }
            | DiagnosticKind::OrphanedSuppression { .. }
            | DiagnosticKind::UnknownField { .. } => Severity::Warning,
        }
    }

    /// Stable machine-readable name
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::ParseError { .. } => "ParseError",
            DiagnosticKind::MissingField { .. } => "MissingField",
            DiagnosticKind::UnknownEnumValue { .. } => "UnknownEnumValue",
            DiagnosticKind::DuplicateId { .. } => "DuplicateId",
            DiagnosticKind::InvalidIdCharacters { .. } => "InvalidIdCharacters",
            DiagnosticKind::EmptyId => "EmptyId",
            DiagnosticKind::MalformedUrl { .. } => "MalformedUrl",
            DiagnosticKind::UnmappedCity { .. } => "UnmappedCity",
            DiagnosticKind::OrphanedSuppression { .. } => "OrphanedSuppression",
            DiagnosticKind::UnknownField { .. } => "UnknownField",
        }
    }
}

/// Position of a record inside its file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordRef {
    /// Zero-based index within the file
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl std::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name {
            Some(ref name) => write!(f, "record #{} ({})", self.index + 1, name),
            None => write!(f, "record #{}", self.index + 1),
        }
    }
}

/// One finding, tied to a file and optionally a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordRef>,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<String>, record: Option<RecordRef>, kind: DiagnosticKind) -> Self {
        Self {
            severity: kind.severity(),
            path: path.into(),
            record,
            message: kind.to_string(),
            kind,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Per-record summary shown in verbose mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub path: String,
    pub record: RecordRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub errors: usize,
    pub warnings: usize,
    pub suppressed: bool,
}

/// Every diagnostic of a run, ordered by file path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<Diagnostic>,
    pub records: Vec<RecordSummary>,
}

/// Terminal rendering switches
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Hide warnings (they are still counted)
    pub errors_only: bool,
    /// Include per-record detail
    pub verbose: bool,
}

impl ValidationReport {
    /// Sort into report order: path, record, severity, then kind
    pub fn sort(&mut self) {
        self.diagnostics.sort_by(|a, b| {
            (&a.path, &a.record, a.severity, a.kind.code(), &a.message).cmp(&(
                &b.path,
                &b.record,
                b.severity,
                b.kind.code(),
                &b.message,
            ))
        });
        self.records
            .sort_by(|a, b| (&a.path, a.record.index).cmp(&(&b.path, b.record.index)));
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.error_count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Diagnostics of one kind, by code
    pub fn of_kind<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.diagnostics.iter().filter(move |d| d.kind.code() == code)
    }

    /// Human-readable report: findings grouped by file, then a summary line
    pub fn render(&self, options: RenderOptions) -> String {
        let mut out = String::new();
        let mut by_file: BTreeMap<&str, Vec<&Diagnostic>> = BTreeMap::new();
        for diagnostic in &self.diagnostics {
            if options.errors_only && !diagnostic.is_error() {
                continue;
            }
            by_file.entry(&diagnostic.path).or_default().push(diagnostic);
        }

        for (path, diagnostics) in &by_file {
            let _ = writeln!(out, "{}", path.bold());
            for d in diagnostics {
                let tag = match d.severity {
                    Severity::Error => "error".red().bold(),
                    Severity::Warning => "warning".yellow().bold(),
                };
                let location = d
                    .record
                    .as_ref()
                    .map(|r| format!("{r}: "))
                    .unwrap_or_default();
                let _ = writeln!(out, "  {tag} [{}] {location}{}", d.kind.code(), d.message);
            }
        }

        if options.verbose && !self.records.is_empty() {
            if !by_file.is_empty() {
                out.push('\n');
            }
            let _ = writeln!(out, "{}", "Records:".cyan().bold());
            for summary in &self.records {
                let status = if summary.errors > 0 {
                    "✗".red()
                } else if summary.suppressed {
                    "-".dimmed()
                } else {
                    "✓".green()
                };
                let _ = writeln!(
                    out,
                    "  {status} {} {} ({}) errors={} warnings={}{}",
                    summary.id.as_deref().unwrap_or("<no id>"),
                    summary.path,
                    summary.record,
                    summary.errors,
                    summary.warnings,
                    if summary.suppressed { " suppressed" } else { "" },
                );
            }
        }

        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "{}", self.summary_line());
        out
    }

    /// Terminal pass/fail line
    pub fn summary_line(&self) -> String {
        let errors = self.error_count();
        let warnings = self.warning_count();
        if errors == 0 {
            format!(
                "{} Validation passed: {} record(s), {} warning(s)",
                "✓".green().bold(),
                self.records.len(),
                warnings
            )
        } else {
            format!(
                "{} Validation failed: {} error(s), {} warning(s) across {} record(s)",
                "✗".red().bold(),
                errors,
                warnings,
                self.records.len()
            )
        }
    }

    /// Write the full report (warnings included) as JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content + "\n")?;
        Ok(())
    }
}
