//! Validation and generation runs
//!
//! Load → validate (gate) → transform (cached, fanned out across files) →
//! publish. The pipeline owns the build cache for the whole run and is its
//! only writer; the cache is saved once, after every transform has joined.

use crate::cache::{BuildCache, CachedProgram};
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::loader::{load_records, LoadedCorpus};
use crate::reference::ReferenceTables;
use crate::transform::{transform, TransformError};
use crate::validate::{validate, Validation, ValidatedRecord, ValidationReport};
use crate::writer::{publish, ApiDataset};
use cdp_common::checksum::Fingerprint;
use cdp_common::types::{ApiMetadata, ApiProgram, RunCounts, SCHEMA_VERSION};
use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Environment variable pinning the generation timestamp (seconds since the epoch)
pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

/// Switches for a generation run
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Ignore the build cache and transform every file
    pub full: bool,
    /// Exclude records with errors instead of aborting
    pub lenient: bool,
    /// Timestamp written to `metadata.json`
    pub generated_at: DateTime<Utc>,
}

impl GenerateOptions {
    /// Options for a strict, incremental run stamped per `SOURCE_DATE_EPOCH`
    pub fn new() -> Result<Self> {
        Ok(Self {
            full: false,
            lenient: false,
            generated_at: generation_timestamp()?,
        })
    }
}

/// Timestamp of this run: `SOURCE_DATE_EPOCH` when set, else now
pub fn generation_timestamp() -> Result<DateTime<Utc>> {
    match std::env::var(SOURCE_DATE_EPOCH) {
        Ok(value) => {
            let seconds: i64 = value.trim().parse().map_err(|_| {
                CliError::config(format!("{SOURCE_DATE_EPOCH} must be an integer, got '{value}'"))
            })?;
            Utc.timestamp_opt(seconds, 0).single().ok_or_else(|| {
                CliError::config(format!("{SOURCE_DATE_EPOCH} value {seconds} is out of range"))
            })
        },
        Err(_) => Ok(Utc::now()),
    }
}

/// Everything read and checked before any output is produced
#[derive(Debug, Clone)]
pub struct Checked {
    pub corpus: LoadedCorpus,
    pub tables: ReferenceTables,
    pub validation: Validation,
}

/// Load reference tables and records, then validate
pub async fn check(config: &Config) -> Result<Checked> {
    let started = Instant::now();
    let reference_dir = config.reference_dir.clone();
    let records_dir = config.records_dir.clone();

    let (tables, corpus) = tokio::task::spawn_blocking(move || -> Result<_> {
        let tables = ReferenceTables::load(&reference_dir)?;
        let corpus = load_records(&records_dir)?;
        Ok((tables, corpus))
    })
    .await??;

    let validation = validate(&corpus, &tables);

    info!(
        files = corpus.file_count(),
        records = corpus.record_count(),
        errors = validation.report.error_count(),
        warnings = validation.report.warning_count(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Checked corpus"
    );

    Ok(Checked {
        corpus,
        tables,
        validation,
    })
}

/// Result of a generation run
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub report: ValidationReport,
    /// `None` when strict gating rejected the corpus
    pub published: Option<PublishSummary>,
}

/// What a successful run published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub programs: usize,
    pub suppressed: usize,
    /// Records left out because they had errors (lenient runs only)
    pub excluded: usize,
    pub documents: usize,
    pub cache_hits: usize,
    pub transformed: usize,
    pub pruned: usize,
}

/// One file handed to a transform worker
struct TransformUnit {
    path: String,
    fingerprint: Fingerprint,
    records: Vec<ValidatedRecord>,
}

struct TransformedFile {
    path: String,
    fingerprint: Fingerprint,
    programs: Vec<CachedProgram>,
}

fn transform_unit(
    unit: TransformUnit,
    tables: &ReferenceTables,
) -> std::result::Result<TransformedFile, TransformError> {
    let programs = unit
        .records
        .iter()
        .map(|record| {
            transform(record, &unit.path, tables).map(|program| CachedProgram {
                index: record.index,
                program,
            })
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(TransformedFile {
        path: unit.path,
        fingerprint: unit.fingerprint,
        programs,
    })
}

/// Validate, transform and publish
pub async fn generate(config: &Config, options: &GenerateOptions) -> Result<GenerateOutcome> {
    let started = Instant::now();
    let Checked {
        corpus,
        tables,
        validation,
    } = check(config).await?;

    let errors = validation.report.error_count();
    if errors > 0 && !options.lenient {
        info!(errors, "Validation failed; nothing will be published");
        return Ok(GenerateOutcome {
            report: validation.report,
            published: None,
        });
    }

    let mut cache = if options.full {
        BuildCache::empty(&config.cache_dir, tables.fingerprint.clone())
    } else {
        BuildCache::load(&config.cache_dir, tables.fingerprint.clone())
    };

    // Split files into cache hits and transform work
    let mut fragments: Vec<(String, Vec<CachedProgram>)> = Vec::new();
    let mut units = Vec::new();
    for file in &corpus.files {
        match cache.lookup(&file.path, &file.fingerprint) {
            Some(programs) => fragments.push((file.path.clone(), programs.to_vec())),
            None => units.push(TransformUnit {
                path: file.path.clone(),
                fingerprint: file.fingerprint.clone(),
                records: validation.transformable(&file.path),
            }),
        }
    }
    let cache_hits = fragments.len();
    let transformed = units.len();

    let tables = Arc::new(tables);
    let results: Vec<Result<TransformedFile>> = stream::iter(units)
        .map(|unit| {
            let tables = Arc::clone(&tables);
            async move {
                let file = tokio::task::spawn_blocking(move || transform_unit(unit, &tables)).await??;
                Ok::<_, CliError>(file)
            }
        })
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    for result in results {
        let file = result?;
        debug!(path = %file.path, programs = file.programs.len(), "Transformed file");
        fragments.push((file.path.clone(), file.programs.clone()));
        cache.insert(file.path, file.fingerprint, file.programs);
    }

    let present: BTreeSet<String> = corpus.files.iter().map(|f| f.path.clone()).collect();
    let pruned = cache.prune(&present);

    // Keep publishable records only, in a stable order
    let publishable = validation.publishable();
    let mut programs: Vec<ApiProgram> = fragments
        .into_iter()
        .flat_map(|(path, cached)| {
            cached
                .into_iter()
                .filter(|c| publishable.contains(&(path.clone(), c.index)))
                .map(|c| c.program)
                .collect::<Vec<_>>()
        })
        .collect();
    programs.sort_by(|a, b| a.id.cmp(&b.id));

    let suppressed = validation.withheld_count();
    let excluded = validation.records.iter().filter(|r| r.errors > 0).count();

    let metadata = ApiMetadata {
        schema_version: SCHEMA_VERSION,
        generated_at: options.generated_at,
        corpus_fingerprint: corpus.fingerprint(),
        reference_fingerprint: tables.fingerprint.clone(),
        counts: RunCounts {
            total: programs.len(),
            suppressed,
            warnings: validation.report.warning_count(),
            source_files: corpus.file_count(),
        },
        categories: tables.categories.iter().map(|c| c.key.clone()).collect(),
        areas: tables.areas.iter().map(|a| a.key.clone()).collect(),
    };

    let published = programs.len();
    let dataset = ApiDataset::build(programs, &tables, metadata);
    let output_dir = config.output_dir.clone();
    let documents = tokio::task::spawn_blocking(move || publish(&dataset, &output_dir)).await??;

    // Output is already published; a failed cache write is not fatal
    if let Err(e) = cache.save() {
        warn!(
            path = %cache.path().display(),
            error = %e,
            "Failed to save build cache; the next run will rebuild it"
        );
    }

    let summary = PublishSummary {
        programs: published,
        suppressed,
        excluded,
        documents,
        cache_hits,
        transformed,
        pruned,
    };

    info!(
        files = corpus.file_count(),
        programs = summary.programs,
        suppressed,
        cache_hits,
        transformed,
        pruned,
        documents,
        duration_ms = started.elapsed().as_millis() as u64,
        "Published dataset"
    );

    Ok(GenerateOutcome {
        report: validation.report,
        published: Some(summary),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const CALFRESH: &str =
        "name: CalFresh Benefits\ncategory: food\ngroup: families\narea: alameda\ncities: [Oakland]\n";
    const SHELTER: &str =
        "name: Night Shelter\ncategory: housing\ngroup: families\narea: contra-costa\n";

    fn workspace() -> (TempDir, Config) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let reference = root.join("reference");
        let records = root.join("records");
        fs::create_dir_all(&reference).unwrap();
        fs::create_dir_all(records.join("food")).unwrap();

        fs::write(
            reference.join("categories.yml"),
            "- key: food\n  label: Food\n- key: housing\n  label: Housing\n",
        )
        .unwrap();
        fs::write(reference.join("groups.yml"), "- key: families\n  label: Families\n").unwrap();
        fs::write(
            reference.join("areas.yml"),
            "- key: alameda\n  label: Alameda County\n- key: contra-costa\n  label: Contra Costa County\n",
        )
        .unwrap();
        fs::write(reference.join("cities.yml"), "Alameda: [Oakland]\n").unwrap();

        fs::write(records.join("food/calfresh.yml"), CALFRESH).unwrap();
        fs::write(records.join("shelter.yml"), SHELTER).unwrap();

        let config = Config {
            records_dir: records,
            reference_dir: reference,
            output_dir: root.join("dist/api"),
            cache_dir: root.join(".cdp-cache"),
            concurrency: 2,
        };
        (temp, config)
    }

    fn options() -> GenerateOptions {
        GenerateOptions {
            full: false,
            lenient: false,
            generated_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
        let mut files: Vec<_> = walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(dir).unwrap().display().to_string(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect();
        files.sort();
        files
    }

    #[tokio::test]
    async fn test_generate_publishes_dataset() {
        let (_temp, config) = workspace();
        let outcome = generate(&config, &options()).await.unwrap();

        let summary = outcome.published.unwrap();
        assert_eq!(summary.programs, 2);
        assert_eq!(summary.transformed, 2);
        assert_eq!(summary.cache_hits, 0);
        assert!(config
            .output_dir
            .join("programs/calfresh-benefits-food.json")
            .exists());
        assert!(config.cache_dir.join("build-cache.json").exists());
    }

    #[tokio::test]
    async fn test_cache_save_failure_does_not_fail_publish() {
        let (_temp, mut config) = workspace();
        let blocker = config.cache_dir.with_file_name("cache-blocker");
        fs::write(&blocker, "not a directory").unwrap();
        config.cache_dir = blocker;

        let summary = generate(&config, &options()).await.unwrap().published.unwrap();
        assert_eq!(summary.programs, 2);
        assert!(config.output_dir.join("metadata.json").exists());
    }

    #[tokio::test]
    async fn test_second_run_hits_cache_and_is_identical() {
        let (_temp, config) = workspace();
        generate(&config, &options()).await.unwrap();
        let first = snapshot(&config.output_dir);

        let summary = generate(&config, &options()).await.unwrap().published.unwrap();
        assert_eq!(summary.cache_hits, 2);
        assert_eq!(summary.transformed, 0);
        assert_eq!(snapshot(&config.output_dir), first);
    }

    #[tokio::test]
    async fn test_incremental_matches_full_rebuild() {
        let (_temp, config) = workspace();
        generate(&config, &options()).await.unwrap();

        fs::write(
            config.records_dir.join("shelter.yml"),
            SHELTER.replace("Night Shelter", "Winter Shelter"),
        )
        .unwrap();
        let summary = generate(&config, &options()).await.unwrap().published.unwrap();
        assert_eq!(summary.cache_hits, 1);
        assert_eq!(summary.transformed, 1);
        let incremental = snapshot(&config.output_dir);

        let full = GenerateOptions {
            full: true,
            ..options()
        };
        let summary = generate(&config, &full).await.unwrap().published.unwrap();
        assert_eq!(summary.transformed, 2);
        assert_eq!(snapshot(&config.output_dir), incremental);
    }

    #[tokio::test]
    async fn test_reference_change_invalidates_cache() {
        let (_temp, config) = workspace();
        generate(&config, &options()).await.unwrap();

        fs::write(
            config.reference_dir.join("groups.yml"),
            "- key: families\n  label: Families with Children\n",
        )
        .unwrap();
        let summary = generate(&config, &options()).await.unwrap().published.unwrap();
        assert_eq!(summary.cache_hits, 0);

        let program = fs::read_to_string(config.output_dir.join("programs/night-shelter-housing.json")).unwrap();
        assert!(program.contains("Families with Children"));
    }

    #[tokio::test]
    async fn test_removed_file_is_pruned() {
        let (_temp, config) = workspace();
        generate(&config, &options()).await.unwrap();

        fs::remove_file(config.records_dir.join("shelter.yml")).unwrap();
        let summary = generate(&config, &options()).await.unwrap().published.unwrap();
        assert_eq!(summary.pruned, 1);
        assert_eq!(summary.programs, 1);
        assert!(!config
            .output_dir
            .join("programs/night-shelter-housing.json")
            .exists());
    }

    #[tokio::test]
    async fn test_strict_mode_publishes_nothing_on_error() {
        let (_temp, config) = workspace();
        fs::write(config.records_dir.join("dupe.yml"), CALFRESH).unwrap();

        let outcome = generate(&config, &options()).await.unwrap();
        assert!(outcome.published.is_none());
        assert_eq!(outcome.report.of_kind("DuplicateId").count(), 2);
        assert!(!config.output_dir.exists());
        assert!(!config.cache_dir.exists());
    }

    #[tokio::test]
    async fn test_lenient_mode_excludes_bad_records() {
        let (_temp, config) = workspace();
        fs::write(
            config.records_dir.join("bad.yml"),
            "name: Mystery\ncategory: nope\ngroup: families\narea: alameda\n",
        )
        .unwrap();

        let lenient = GenerateOptions {
            lenient: true,
            ..options()
        };
        let summary = generate(&config, &lenient).await.unwrap().published.unwrap();
        assert_eq!(summary.programs, 2);
        assert_eq!(summary.excluded, 1);
    }

    #[tokio::test]
    async fn test_lenient_duplicate_recovers_from_cache() {
        let (_temp, config) = workspace();
        let lenient = GenerateOptions {
            lenient: true,
            ..options()
        };
        fs::write(config.records_dir.join("dupe.yml"), CALFRESH).unwrap();
        let summary = generate(&config, &lenient).await.unwrap().published.unwrap();
        assert_eq!(summary.programs, 1);

        // Once the duplicate is gone the cached fragment still holds the record
        fs::remove_file(config.records_dir.join("dupe.yml")).unwrap();
        let summary = generate(&config, &lenient).await.unwrap().published.unwrap();
        assert_eq!(summary.cache_hits, 2);
        assert_eq!(summary.programs, 2);
    }

    #[tokio::test]
    async fn test_suppressed_records_counted_not_published() {
        let (_temp, config) = workspace();
        fs::write(
            config.reference_dir.join("suppressed.yml"),
            "- calfresh-benefits-food\n",
        )
        .unwrap();

        let summary = generate(&config, &options()).await.unwrap().published.unwrap();
        assert_eq!(summary.suppressed, 1);
        assert_eq!(summary.programs, 1);

        let programs = fs::read_to_string(config.output_dir.join("programs.json")).unwrap();
        assert!(!programs.contains("calfresh-benefits-food"));
        let categories = fs::read_to_string(config.output_dir.join("categories.json")).unwrap();
        assert!(!categories.contains("calfresh-benefits-food"));

        let metadata: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(config.output_dir.join("metadata.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(metadata["counts"]["suppressed"], 1);
        assert_eq!(metadata["counts"]["total"], 1);
    }

    #[tokio::test]
    async fn test_corrupt_cache_falls_back_to_full_rebuild() {
        let (_temp, config) = workspace();
        fs::create_dir_all(&config.cache_dir).unwrap();
        fs::write(config.cache_dir.join("build-cache.json"), "garbage").unwrap();

        let summary = generate(&config, &options()).await.unwrap().published.unwrap();
        assert_eq!(summary.transformed, 2);
        assert!(BuildCache::inspect(&config.cache_dir).unwrap().is_some());
    }

    #[test]
    #[serial]
    fn test_source_date_epoch_pins_timestamp() {
        std::env::set_var(SOURCE_DATE_EPOCH, "1700000000");
        let timestamp = generation_timestamp().unwrap();
        std::env::remove_var(SOURCE_DATE_EPOCH);
        assert_eq!(timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    #[serial]
    fn test_invalid_source_date_epoch_rejected() {
        std::env::set_var(SOURCE_DATE_EPOCH, "yesterday");
        let result = generation_timestamp();
        std::env::remove_var(SOURCE_DATE_EPOCH);
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
