//! API writer
//!
//! Renders the published dataset into a staging directory next to the output
//! directory, then swaps it into place. Readers of the output directory see
//! either the previous dataset or the new one, never a mix.
//!
//! Layout:
//!
//! ```text
//! programs.json              all programs
//! programs/{id}.json         one program
//! categories.json            category listing with program id buckets
//! categories/{key}.json      programs of one category
//! areas.json                 area listing with program id buckets
//! areas/{key}.json           programs of one area
//! metadata.json              run metadata
//! ```

use crate::error::{CliError, Result};
use crate::reference::ReferenceTables;
use cdp_common::types::{ApiMetadata, ApiProgram, AreaListing, CategoryListing, ProgramsResponse};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const PROGRAMS_FILE: &str = "programs.json";
pub const CATEGORIES_FILE: &str = "categories.json";
pub const AREAS_FILE: &str = "areas.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Every document of one generated dataset, in memory
#[derive(Debug, Clone)]
pub struct ApiDataset {
    programs: Vec<ApiProgram>,
    categories: Vec<CategoryListing>,
    areas: Vec<AreaListing>,
    by_category: BTreeMap<String, Vec<ApiProgram>>,
    by_area: BTreeMap<String, Vec<ApiProgram>>,
    metadata: ApiMetadata,
}

impl ApiDataset {
    /// Assemble listings and buckets; every table entry gets a listing, even when empty
    pub fn build(
        mut programs: Vec<ApiProgram>,
        tables: &ReferenceTables,
        metadata: ApiMetadata,
    ) -> Self {
        programs.sort_by(|a, b| a.id.cmp(&b.id));

        let mut by_category: BTreeMap<String, Vec<ApiProgram>> = tables
            .categories
            .iter()
            .map(|c| (c.key.clone(), Vec::new()))
            .collect();
        let mut by_area: BTreeMap<String, Vec<ApiProgram>> = tables
            .areas
            .iter()
            .map(|a| (a.key.clone(), Vec::new()))
            .collect();

        for program in &programs {
            by_category
                .entry(program.category.key.clone())
                .or_default()
                .push(program.clone());
            for area in &program.areas {
                by_area.entry(area.key.clone()).or_default().push(program.clone());
            }
        }

        let ids = |bucket: Option<&Vec<ApiProgram>>| -> Vec<String> {
            bucket
                .map(|programs| programs.iter().map(|p| p.id.clone()).collect())
                .unwrap_or_default()
        };

        let categories = tables
            .categories
            .iter()
            .map(|category| {
                let program_ids = ids(by_category.get(&category.key));
                CategoryListing {
                    category: category.clone(),
                    program_count: program_ids.len(),
                    program_ids,
                }
            })
            .collect();

        let areas = tables
            .areas
            .iter()
            .map(|area| {
                let program_ids = ids(by_area.get(&area.key));
                AreaListing {
                    area: area.clone(),
                    program_count: program_ids.len(),
                    program_ids,
                }
            })
            .collect();

        Self {
            programs,
            categories,
            areas,
            by_category,
            by_area,
            metadata,
        }
    }

    pub fn programs(&self) -> &[ApiProgram] {
        &self.programs
    }

    pub fn metadata(&self) -> &ApiMetadata {
        &self.metadata
    }

    /// Write every document under `dir`
    fn render_into(&self, dir: &Path) -> Result<usize> {
        let mut written = 0;

        write_json(&dir.join(PROGRAMS_FILE), &ProgramsResponse::new(self.programs.clone()))?;
        written += 1;

        let programs_dir = dir.join("programs");
        fs::create_dir_all(&programs_dir)?;
        for program in &self.programs {
            write_json(&programs_dir.join(format!("{}.json", program.id)), program)?;
            written += 1;
        }

        write_json(&dir.join(CATEGORIES_FILE), &self.categories)?;
        written += 1;
        written += write_buckets(&dir.join("categories"), &self.by_category)?;

        write_json(&dir.join(AREAS_FILE), &self.areas)?;
        written += 1;
        written += write_buckets(&dir.join("areas"), &self.by_area)?;

        write_json(&dir.join(METADATA_FILE), &self.metadata)?;
        written += 1;

        Ok(written)
    }
}

fn write_buckets(dir: &Path, buckets: &BTreeMap<String, Vec<ApiProgram>>) -> Result<usize> {
    fs::create_dir_all(dir)?;
    for (key, programs) in buckets {
        write_json(
            &dir.join(format!("{key}.json")),
            &ProgramsResponse::new(programs.clone()),
        )?;
    }
    Ok(buckets.len())
}

/// Pretty-printed JSON with a trailing newline
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    fs::write(path, bytes)?;
    Ok(())
}

/// Sibling directory named after `output_dir` with a suffix
fn sibling(output_dir: &Path, suffix: &str) -> Result<PathBuf> {
    let name = output_dir
        .file_name()
        .ok_or_else(|| CliError::write_failure(output_dir, "output path has no directory name"))?;
    let mut sibling_name = std::ffi::OsString::from(".");
    sibling_name.push(name);
    sibling_name.push(suffix);
    Ok(output_dir.with_file_name(sibling_name))
}

fn remove_dir_if_exists(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}

/// Stage and atomically publish a dataset; returns the number of documents written
pub fn publish(dataset: &ApiDataset, output_dir: &Path) -> Result<usize> {
    let staging = sibling(output_dir, ".staging")?;
    let previous = sibling(output_dir, ".previous")?;

    if let Some(parent) = output_dir.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| CliError::write_failure(parent, e))?;
        }
    }
    remove_dir_if_exists(&staging).map_err(|e| CliError::write_failure(&staging, e))?;
    fs::create_dir_all(&staging).map_err(|e| CliError::write_failure(&staging, e))?;

    let written = match dataset.render_into(&staging) {
        Ok(written) => written,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(CliError::write_failure(&staging, e));
        },
    };
    debug!(staging = %staging.display(), documents = written, "Staged dataset");

    let had_previous = output_dir.exists();
    if had_previous {
        if let Err(e) = remove_dir_if_exists(&previous).and_then(|_| fs::rename(output_dir, &previous)) {
            let _ = fs::remove_dir_all(&staging);
            return Err(CliError::write_failure(output_dir, e));
        }
    }

    if let Err(e) = fs::rename(&staging, output_dir) {
        if had_previous {
            let _ = fs::rename(&previous, output_dir);
        }
        let _ = fs::remove_dir_all(&staging);
        return Err(CliError::write_failure(output_dir, e));
    }

    if had_previous {
        if let Err(e) = fs::remove_dir_all(&previous) {
            warn!(path = %previous.display(), error = %e, "Failed to remove previous dataset");
        }
    }

    Ok(written)
}

/// Metadata of the currently published dataset, if any
pub fn read_published_metadata(output_dir: &Path) -> Result<Option<ApiMetadata>> {
    let path = output_dir.join(METADATA_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transform::transform;
    use crate::validate::tests::tables;
    use crate::validate::ValidatedRecord;
    use cdp_common::checksum::fingerprint;
    use cdp_common::types::{RunCounts, SCHEMA_VERSION};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn program(id: &str, category: &str, areas: &[&str]) -> ApiProgram {
        let record = ValidatedRecord {
            index: 0,
            id: id.to_string(),
            name: id.to_string(),
            category: category.to_string(),
            groups: vec!["families".to_string()],
            areas: areas.iter().map(|a| a.to_string()).collect(),
            cities: Vec::new(),
            description: None,
            website: None,
            eligibility: None,
        };
        transform(&record, &format!("{id}.yml"), &tables()).unwrap()
    }

    fn dataset(programs: Vec<ApiProgram>) -> ApiDataset {
        let metadata = ApiMetadata {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            corpus_fingerprint: fingerprint(b"corpus"),
            reference_fingerprint: fingerprint(b"refs"),
            counts: RunCounts {
                total: programs.len(),
                ..RunCounts::default()
            },
            categories: vec!["food".to_string(), "housing".to_string()],
            areas: vec!["alameda".to_string(), "contra-costa".to_string()],
        };
        ApiDataset::build(programs, &tables(), metadata)
    }

    fn read(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_publish_layout() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("api");
        let data = dataset(vec![
            program("shelter-housing", "housing", &["contra-costa"]),
            program("calfresh-benefits-food", "food", &["alameda", "contra-costa"]),
        ]);

        let written = publish(&data, &out).unwrap();
        // programs.json + 2 programs + categories.json + 2 + areas.json + 2 + metadata.json
        assert_eq!(written, 10);

        let programs = read(&out.join(PROGRAMS_FILE));
        assert_eq!(programs["count"], 2);
        assert_eq!(programs["programs"][0]["id"], "calfresh-benefits-food");

        let categories = read(&out.join(CATEGORIES_FILE));
        assert_eq!(categories[0]["key"], "food");
        assert_eq!(categories[0]["program_ids"][0], "calfresh-benefits-food");
        assert_eq!(categories[0]["program_count"], 1);

        let contra_costa = read(&out.join("areas/contra-costa.json"));
        assert_eq!(contra_costa["count"], 2);

        assert!(out.join("programs/calfresh-benefits-food.json").exists());
        assert_eq!(read(&out.join(METADATA_FILE))["counts"]["total"], 2);
    }

    #[test]
    fn test_empty_buckets_still_written() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("api");
        publish(&dataset(Vec::new()), &out).unwrap();

        let housing = read(&out.join("categories/housing.json"));
        assert_eq!(housing["count"], 0);
        assert_eq!(read(&out.join(CATEGORIES_FILE))[1]["program_count"], 0);
    }

    #[test]
    fn test_documents_end_with_newline() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("api");
        publish(&dataset(Vec::new()), &out).unwrap();
        let raw = fs::read_to_string(out.join(METADATA_FILE)).unwrap();
        assert!(raw.ends_with("}\n"));
    }

    #[test]
    fn test_republish_replaces_and_cleans_up() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("api");
        publish(&dataset(vec![program("old-food", "food", &["alameda"])]), &out).unwrap();
        publish(&dataset(vec![program("new-food", "food", &["alameda"])]), &out).unwrap();

        assert!(!out.join("programs/old-food.json").exists());
        assert!(out.join("programs/new-food.json").exists());
        assert!(!temp.path().join(".api.staging").exists());
        assert!(!temp.path().join(".api.previous").exists());
    }

    #[test]
    fn test_identical_input_is_byte_identical() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        let programs = vec![program("a-food", "food", &["alameda"])];
        publish(&dataset(programs.clone()), &first).unwrap();
        publish(&dataset(programs), &second).unwrap();

        for file in [PROGRAMS_FILE, CATEGORIES_FILE, AREAS_FILE, METADATA_FILE] {
            assert_eq!(
                fs::read(first.join(file)).unwrap(),
                fs::read(second.join(file)).unwrap()
            );
        }
    }

    #[test]
    fn test_failed_publish_leaves_output_untouched() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("api");
        publish(&dataset(vec![program("a-food", "food", &["alameda"])]), &out).unwrap();

        // A program id that cannot be a file name makes staging fail
        let mut broken = program("b-food", "food", &["alameda"]);
        broken.id = "missing-dir/b-food".to_string();
        let result = publish(&dataset(vec![broken]), &out);

        assert!(matches!(result, Err(CliError::WriteFailure { .. })));
        assert!(out.join("programs/a-food.json").exists());
        assert!(!temp.path().join(".api.staging").exists());
    }

    #[test]
    fn test_read_published_metadata() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("api");
        assert!(read_published_metadata(&out).unwrap().is_none());

        publish(&dataset(Vec::new()), &out).unwrap();
        let metadata = read_published_metadata(&out).unwrap().unwrap();
        assert_eq!(metadata.schema_version, SCHEMA_VERSION);
    }
}
