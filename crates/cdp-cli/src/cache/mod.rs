//! Incremental build cache
//!
//! A single JSON document under the cache directory maps each record file to
//! the fingerprint it had when last transformed and the programs it produced.
//! Staleness is decided by content fingerprint only. The whole cache is tied
//! to a reference-table fingerprint; when the tables change every entry is
//! dropped.

use crate::error::{CliError, Result};
use cdp_common::checksum::Fingerprint;
use cdp_common::types::ApiProgram;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// File name of the cache document inside the cache directory
pub const CACHE_FILE: &str = "build-cache.json";

/// Layout version of the cache document
pub const CACHE_VERSION: u32 = 1;

/// Why a persisted cache could not be used
#[derive(Debug, Error)]
pub enum CacheCorruption {
    #[error("cannot read cache file: {0}")]
    Unreadable(#[from] std::io::Error),

    #[error("cache file is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("cache version {found} does not match expected version {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}

/// A transformed program and the index of the record it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedProgram {
    pub index: usize,
    pub program: ApiProgram,
}

/// Last transform output of one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub programs: Vec<CachedProgram>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    reference_fingerprint: Fingerprint,
    entries: BTreeMap<String, CacheEntry>,
}

/// Cache handle owned by a single pipeline run
#[derive(Debug, Clone)]
pub struct BuildCache {
    path: PathBuf,
    reference_fingerprint: Fingerprint,
    entries: BTreeMap<String, CacheEntry>,
}

/// What `cdp status` shows about the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSummary {
    pub path: PathBuf,
    pub files: usize,
    pub programs: usize,
    pub size_bytes: u64,
    pub reference_fingerprint: Fingerprint,
}

impl BuildCache {
    /// An empty cache bound to `cache_dir`
    pub fn empty(cache_dir: &Path, reference_fingerprint: Fingerprint) -> Self {
        Self {
            path: cache_dir.join(CACHE_FILE),
            reference_fingerprint,
            entries: BTreeMap::new(),
        }
    }

    /// Load the persisted cache, degrading to an empty one when unusable
    pub fn load(cache_dir: &Path, reference_fingerprint: Fingerprint) -> Self {
        let mut cache = Self::empty(cache_dir, reference_fingerprint);
        if !cache.path.exists() {
            debug!(path = %cache.path.display(), "No build cache found");
            return cache;
        }

        match read_document(&cache.path) {
            Ok(document) if document.reference_fingerprint != cache.reference_fingerprint => {
                info!(
                    previous = %document.reference_fingerprint.short(),
                    current = %cache.reference_fingerprint.short(),
                    "Reference tables changed; discarding build cache"
                );
            },
            Ok(document) => {
                debug!(entries = document.entries.len(), "Loaded build cache");
                cache.entries = document.entries;
            },
            Err(e) => {
                warn!(
                    path = %cache.path.display(),
                    error = %e,
                    "Build cache unusable; falling back to a full rebuild"
                );
            },
        }
        cache
    }

    /// Cached programs of `path`, if its fingerprint is unchanged
    pub fn lookup(&self, path: &str, fingerprint: &Fingerprint) -> Option<&[CachedProgram]> {
        self.entries
            .get(path)
            .filter(|entry| &entry.fingerprint == fingerprint)
            .map(|entry| entry.programs.as_slice())
    }

    /// Record the transform output of `path`, replacing any previous entry
    pub fn insert(&mut self, path: String, fingerprint: Fingerprint, programs: Vec<CachedProgram>) {
        self.entries.insert(
            path,
            CacheEntry {
                fingerprint,
                programs,
            },
        );
    }

    /// Drop entries for files no longer in the corpus; returns how many were removed
    pub fn prune(&mut self, present: &BTreeSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| present.contains(path));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist atomically: write a temp file next to the cache, then rename
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let document = CacheDocument {
            version: CACHE_VERSION,
            reference_fingerprint: self.reference_fingerprint.clone(),
            entries: self.entries.clone(),
        };
        let content = serde_json::to_vec(&document)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content)
            .map_err(|e| CliError::cache(format!("failed to write {}: {e}", temp_path.display())))?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            CliError::cache(format!("failed to replace {}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "Saved build cache");
        Ok(())
    }

    /// Summarize the persisted cache without loading it for a run
    pub fn inspect(cache_dir: &Path) -> std::result::Result<Option<CacheSummary>, CacheCorruption> {
        let path = cache_dir.join(CACHE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let size_bytes = fs::metadata(&path)?.len();
        let document = read_document(&path)?;
        Ok(Some(CacheSummary {
            files: document.entries.len(),
            programs: document.entries.values().map(|e| e.programs.len()).sum(),
            size_bytes,
            reference_fingerprint: document.reference_fingerprint,
            path,
        }))
    }

    /// Delete the persisted cache; returns whether there was one
    pub fn clear(cache_dir: &Path) -> Result<bool> {
        let path = cache_dir.join(CACHE_FILE);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;

        // Leave a directory that holds anything else alone
        if fs::read_dir(cache_dir)?.next().is_none() {
            let _ = fs::remove_dir(cache_dir);
        }
        Ok(true)
    }
}

fn read_document(path: &Path) -> std::result::Result<CacheDocument, CacheCorruption> {
    let bytes = fs::read(path)?;
    let document: CacheDocument = serde_json::from_slice(&bytes)?;
    if document.version != CACHE_VERSION {
        return Err(CacheCorruption::VersionMismatch {
            found: document.version,
            expected: CACHE_VERSION,
        });
    }
    Ok(document)
}
