//! Record loader
//!
//! Walks the records directory and parses every YAML file. A file that cannot
//! be read or parsed is reported and skipped; it never aborts the batch. Only
//! a missing records root is fatal.

use crate::error::{CliError, Result};
use crate::record::{parse_records, RawRecord};
use cdp_common::checksum::{corpus_fingerprint, fingerprint, Fingerprint};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// A successfully parsed source file
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the records root, `/`-separated
    pub path: String,

    /// Fingerprint of the raw file bytes
    pub fingerprint: Fingerprint,

    /// Records in authored order
    pub records: Vec<RawRecord>,
}

/// A file that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub path: String,
    pub message: String,
}

/// Everything read from the records directory
#[derive(Debug, Clone, Default)]
pub struct LoadedCorpus {
    pub files: Vec<SourceFile>,
    pub failures: Vec<ParseFailure>,
}

impl LoadedCorpus {
    /// Total records across parsed files
    pub fn record_count(&self) -> usize {
        self.files.iter().map(|f| f.records.len()).sum()
    }

    /// Number of files read, parsed or not
    pub fn file_count(&self) -> usize {
        self.files.len() + self.failures.len()
    }

    /// Fingerprint of the parsed corpus, independent of discovery order
    pub fn fingerprint(&self) -> Fingerprint {
        corpus_fingerprint(self.files.iter().map(|f| (f.path.as_str(), &f.fingerprint)))
    }
}

/// Whether a path looks like a record file
fn is_record_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Load every record file under `root`
pub fn load_records(root: &Path) -> Result<LoadedCorpus> {
    if !root.is_dir() {
        return Err(CliError::RecordsDirNotFound(root.to_path_buf()));
    }

    let mut corpus = LoadedCorpus::default();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.path().is_some_and(|p| p.extension().is_some() && !is_record_file(p)) => {
                debug!(error = %e, "Ignoring unreadable non-record entry");
                continue;
            },
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| relative_path(root, p))
                    .unwrap_or_else(|| ".".to_string());
                warn!(path = %path, error = %e, "Skipping unreadable entry");
                corpus.failures.push(ParseFailure {
                    path,
                    message: e.to_string(),
                });
                continue;
            },
        };
        if !entry.file_type().is_file() || !is_record_file(entry.path()) {
            continue;
        }

        let path = relative_path(root, entry.path());
        let bytes = match std::fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path, error = %e, "Skipping unreadable record file");
                corpus.failures.push(ParseFailure {
                    path,
                    message: format!("failed to read file: {e}"),
                });
                continue;
            },
        };
        let fp = fingerprint(&bytes);

        let parsed = std::str::from_utf8(&bytes)
            .map_err(|e| format!("file is not valid UTF-8: {e}"))
            .and_then(|text| parse_records(text).map_err(|e| e.to_string()));

        match parsed {
            Ok(records) => {
                debug!(path = %path, records = records.len(), "Loaded record file");
                corpus.files.push(SourceFile {
                    path,
                    fingerprint: fp,
                    records,
                });
            },
            Err(message) => {
                warn!(path = %path, error = %message, "Skipping unparseable record file");
                corpus.failures.push(ParseFailure { path, message });
            },
        }
    }

    Ok(corpus)
}
