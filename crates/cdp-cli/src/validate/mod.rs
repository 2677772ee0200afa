//! Record validation
//!
//! Every check runs over the whole corpus before anything is reported, so a
//! single run surfaces every problem at once. Checks that look at one record
//! in isolation decide whether the record can be transformed; cross-record
//! checks (duplicate ids) only decide whether it can be published.

mod report;

pub use report::{
    Diagnostic, DiagnosticKind, RecordRef, RecordSummary, RenderOptions, Severity,
    ValidationReport,
};

use crate::id::{self, IdError};
use crate::loader::{LoadedCorpus, SourceFile};
use crate::record::RawRecord;
use crate::reference::{Keyed, KeySet, ReferenceTables, SuppressionEntry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

/// A record whose required fields are present and resolve against the
/// reference tables. Keys are canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRecord {
    /// Position within the source file
    pub index: usize,
    pub id: String,
    pub name: String,
    pub category: String,
    pub groups: Vec<String>,
    pub areas: Vec<String>,
    pub cities: Vec<String>,
    pub description: Option<String>,
    /// Only kept when well-formed
    pub website: Option<String>,
    pub eligibility: Option<String>,
}

/// Validation outcome for one loaded record
#[derive(Debug, Clone)]
pub struct CheckedRecord {
    pub path: String,
    pub record: RecordRef,
    pub id: Option<String>,
    /// Present when every per-record check passed
    pub validated: Option<ValidatedRecord>,
    pub errors: usize,
    pub warnings: usize,
    pub suppressed: bool,
}

impl CheckedRecord {
    /// Whether the record belongs in the published dataset
    pub fn is_publishable(&self) -> bool {
        self.errors == 0 && !self.suppressed && self.validated.is_some()
    }

    /// Valid, but withheld by suppression
    pub fn is_withheld(&self) -> bool {
        self.errors == 0 && self.suppressed
    }
}

/// Report plus per-record outcomes
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub report: ValidationReport,
    pub records: Vec<CheckedRecord>,
}

impl Validation {
    /// Records of `path` that can be transformed, in file order
    pub fn transformable(&self, path: &str) -> Vec<ValidatedRecord> {
        self.records
            .iter()
            .filter(|r| r.path == path)
            .filter_map(|r| r.validated.clone())
            .collect()
    }

    /// `(path, index)` of every record to publish
    pub fn publishable(&self) -> BTreeSet<(String, usize)> {
        self.records
            .iter()
            .filter(|r| r.is_publishable())
            .map(|r| (r.path.clone(), r.record.index))
            .collect()
    }

    pub fn withheld_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_withheld()).count()
    }
}

/// Per-record state gathered during the first pass
struct Pending {
    path: String,
    record: RecordRef,
    /// Human-readable location used in duplicate reports
    location: String,
    id: Option<String>,
    /// Id derived from name and category, for `{name, category}` suppression
    derived_id: Option<String>,
    inline_suppressed: bool,
    validated: Option<ValidatedRecord>,
}

/// Validate a loaded corpus against the reference tables
pub fn validate(corpus: &LoadedCorpus, tables: &ReferenceTables) -> Validation {
    let mut diagnostics = Vec::new();

    for failure in &corpus.failures {
        diagnostics.push(Diagnostic::new(
            failure.path.clone(),
            None,
            DiagnosticKind::ParseError {
                message: failure.message.clone(),
            },
        ));
    }

    let mut pending = Vec::with_capacity(corpus.record_count());
    for file in &corpus.files {
        for (index, raw) in file.records.iter().enumerate() {
            pending.push(check_record(file, index, raw, tables, &mut diagnostics));
        }
    }

    check_duplicates(&pending, &mut diagnostics);
    let suppressed = check_suppressions(&pending, tables, &mut diagnostics);

    let mut counts: BTreeMap<(&str, usize), (usize, usize)> = BTreeMap::new();
    for d in &diagnostics {
        if let Some(ref record) = d.record {
            let entry = counts.entry((d.path.as_str(), record.index)).or_default();
            match d.severity {
                Severity::Error => entry.0 += 1,
                Severity::Warning => entry.1 += 1,
            }
        }
    }

    let records: Vec<CheckedRecord> = pending
        .into_iter()
        .enumerate()
        .map(|(position, p)| {
            let (errors, warnings) = counts
                .get(&(p.path.as_str(), p.record.index))
                .copied()
                .unwrap_or_default();
            CheckedRecord {
                suppressed: p.inline_suppressed || suppressed.contains(&position),
                path: p.path,
                record: p.record,
                id: p.id,
                validated: p.validated,
                errors,
                warnings,
            }
        })
        .collect();

    let mut report = ValidationReport {
        diagnostics,
        records: records
            .iter()
            .map(|r| RecordSummary {
                path: r.path.clone(),
                record: r.record.clone(),
                id: r.id.clone(),
                errors: r.errors,
                warnings: r.warnings,
                suppressed: r.suppressed,
            })
            .collect(),
    };
    report.sort();

    tracing::debug!(
        records = records.len(),
        errors = report.error_count(),
        warnings = report.warning_count(),
        "Validation complete"
    );

    Validation { report, records }
}

fn check_record(
    file: &SourceFile,
    index: usize,
    raw: &RawRecord,
    tables: &ReferenceTables,
    diagnostics: &mut Vec<Diagnostic>,
) -> Pending {
    let record = RecordRef {
        index,
        name: raw.name().map(str::to_string),
    };
    let before = diagnostics.iter().filter(|d| d.is_error()).count();
    let mut report = |kind: DiagnosticKind| {
        diagnostics.push(Diagnostic::new(file.path.clone(), Some(record.clone()), kind));
    };

    let name = raw.name();
    if name.is_none() {
        report(missing("name"));
    }

    let category = match raw.category() {
        None => {
            report(missing("category"));
            None
        },
        Some(value) => resolve_one(&tables.categories, "category", value, &mut report),
    };

    let groups = resolve_many(&tables.groups, "group", &raw.groups(), &mut report);
    let areas = resolve_many(&tables.areas, "area", &raw.areas(), &mut report);

    let id = match id::resolve_id(raw.id.as_deref(), name, raw.category()) {
        Some(Ok(id)) => Some(id),
        Some(Err(IdError::InvalidCharacters(id))) => {
            report(DiagnosticKind::InvalidIdCharacters { id });
            None
        },
        Some(Err(IdError::Empty)) => {
            report(DiagnosticKind::EmptyId);
            None
        },
        None => None,
    };

    let website = raw.website().and_then(|url| match check_url(url) {
        Ok(()) => Some(url.to_string()),
        Err(reason) => {
            report(DiagnosticKind::MalformedUrl {
                url: url.to_string(),
                reason,
            });
            None
        },
    });

    let cities: Vec<String> = raw
        .cities
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    for city in &cities {
        if tables.cities.county(city).is_none() {
            report(DiagnosticKind::UnmappedCity { city: city.clone() });
        }
    }

    for field in raw.extra.keys() {
        report(DiagnosticKind::UnknownField {
            field: field.clone(),
        });
    }

    let has_errors = diagnostics.iter().filter(|d| d.is_error()).count() > before;
    let validated = match (has_errors, &id, name, category, groups, areas) {
        (false, Some(id), Some(name), Some(category), Some(groups), Some(areas)) => {
            Some(ValidatedRecord {
                index,
                id: id.clone(),
                name: name.to_string(),
                category,
                groups,
                areas,
                cities,
                description: non_blank(raw.description.as_deref()),
                website,
                eligibility: non_blank(raw.eligibility.as_deref()),
            })
        },
        _ => None,
    };

    Pending {
        location: if file.records.len() > 1 {
            format!("{}#{}", file.path, index + 1)
        } else {
            file.path.clone()
        },
        path: file.path.clone(),
        record,
        derived_id: name
            .zip(raw.category())
            .and_then(|(n, c)| id::derive_id(n, c).ok()),
        id,
        inline_suppressed: raw.suppressed,
        validated,
    }
}

fn missing(field: &str) -> DiagnosticKind {
    DiagnosticKind::MissingField {
        field: field.to_string(),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn resolve_one<T: Keyed>(
    set: &KeySet<T>,
    field: &str,
    value: &str,
    report: &mut impl FnMut(DiagnosticKind),
) -> Option<String> {
    match set.resolve(value) {
        Some(entry) => Some(entry.key().to_string()),
        None => {
            report(DiagnosticKind::UnknownEnumValue {
                field: field.to_string(),
                value: value.to_string(),
            });
            None
        },
    }
}

/// Resolve a required multi-valued field; `None` when missing or any value is unknown
fn resolve_many<T: Keyed>(
    set: &KeySet<T>,
    field: &str,
    values: &[&str],
    report: &mut impl FnMut(DiagnosticKind),
) -> Option<Vec<String>> {
    if values.is_empty() {
        report(missing(field));
        return None;
    }

    let mut keys = Vec::with_capacity(values.len());
    let mut complete = true;
    for value in values {
        match resolve_one(set, field, value, report) {
            Some(key) if !keys.contains(&key) => keys.push(key),
            Some(_) => {},
            None => complete = false,
        }
    }
    complete.then_some(keys)
}

/// Check a website URL: parseable, http(s), with a host
fn check_url(value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("scheme '{}' is not http or https", url.scheme()));
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err("missing host".to_string());
    }
    Ok(())
}

fn check_duplicates(pending: &[Pending], diagnostics: &mut Vec<Diagnostic>) {
    let mut by_id: BTreeMap<&str, Vec<&Pending>> = BTreeMap::new();
    for p in pending {
        if let Some(ref id) = p.id {
            by_id.entry(id.as_str()).or_default().push(p);
        }
    }

    for (id, participants) in by_id {
        if participants.len() < 2 {
            continue;
        }
        let mut locations: Vec<String> = participants.iter().map(|p| p.location.clone()).collect();
        locations.sort();
        for p in participants {
            diagnostics.push(Diagnostic::new(
                p.path.clone(),
                Some(p.record.clone()),
                DiagnosticKind::DuplicateId {
                    id: id.to_string(),
                    locations: locations.clone(),
                },
            ));
        }
    }
}

/// Match suppression entries to records; returns positions of suppressed records
fn check_suppressions(
    pending: &[Pending],
    tables: &ReferenceTables,
    diagnostics: &mut Vec<Diagnostic>,
) -> BTreeSet<usize> {
    let mut suppressed = BTreeSet::new();

    for entry in &tables.suppressed {
        let target = entry.target_id();
        let matches: Vec<usize> = pending
            .iter()
            .enumerate()
            .filter(|(_, p)| match (entry, target.as_deref()) {
                (_, None) => false,
                (SuppressionEntry::Id(_), Some(t)) => p.id.as_deref() == Some(t),
                (SuppressionEntry::NameCategory { .. }, Some(t)) => {
                    p.derived_id.as_deref() == Some(t)
                },
            })
            .map(|(position, _)| position)
            .collect();

        if matches.is_empty() {
            diagnostics.push(Diagnostic::new(
                tables.suppressed_path.clone(),
                None,
                DiagnosticKind::OrphanedSuppression {
                    entry: entry.to_string(),
                },
            ));
        }
        suppressed.extend(matches);
    }

    suppressed
}
