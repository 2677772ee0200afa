//! Reference tables
//!
//! Static lookup data maintained alongside the records:
//!
//! | File             | Shape                                   |
//! |------------------|-----------------------------------------|
//! | `categories.yml` | list of `{key, label, description?, icon?}` |
//! | `groups.yml`     | list of `{key, label, description?, icon?}` |
//! | `areas.yml`      | list of `{key, label, description?}`    |
//! | `cities.yml`     | map of county name to list of cities     |
//! | `suppressed.yml` | optional list of ids or `{name, category}` |

use crate::error::{CliError, Result};
use crate::id;
use cdp_common::checksum::{corpus_fingerprint, fingerprint, Fingerprint};
use cdp_common::types::{Area, CategoryMetadata, GroupMetadata};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CATEGORIES_FILE: &str = "categories.yml";
pub const GROUPS_FILE: &str = "groups.yml";
pub const AREAS_FILE: &str = "areas.yml";
pub const CITIES_FILE: &str = "cities.yml";
pub const SUPPRESSED_FILE: &str = "suppressed.yml";

/// Reference entries addressable by key
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for CategoryMetadata {
    fn key(&self) -> &str {
        &self.key
    }
}

impl Keyed for GroupMetadata {
    fn key(&self) -> &str {
        &self.key
    }
}

impl Keyed for Area {
    fn key(&self) -> &str {
        &self.key
    }
}

/// Closed set of reference entries
///
/// Lookups normalize the authored value the same way ids are normalized, so
/// `"Contra Costa"` resolves to the `contra-costa` entry.
#[derive(Debug, Clone)]
pub struct KeySet<T> {
    entries: BTreeMap<String, T>,
}

impl<T: Keyed> KeySet<T> {
    /// Build a set, rejecting duplicate or malformed keys
    pub fn new(items: Vec<T>, file: &Path) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for item in items {
            let key = item.key().to_string();
            if id::normalize(&key) != key || key.is_empty() {
                return Err(CliError::reference(
                    file,
                    format!("key '{key}' must be non-empty and use only [a-z0-9-]"),
                ));
            }
            if entries.insert(key.clone(), item).is_some() {
                return Err(CliError::reference(file, format!("duplicate key '{key}'")));
            }
        }
        Ok(Self { entries })
    }

    /// Resolve an authored value to its entry
    pub fn resolve(&self, value: &str) -> Option<&T> {
        self.entries.get(&id::normalize(value))
    }

    /// Entries ordered by key
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// City to county lookup
#[derive(Debug, Clone, Default)]
pub struct CityMapping {
    counties: BTreeMap<String, String>,
}

impl CityMapping {
    /// Invert the authored `county: [cities]` map
    pub fn from_counties(by_county: BTreeMap<String, Vec<String>>, file: &Path) -> Result<Self> {
        let mut counties = BTreeMap::new();
        for (county, cities) in by_county {
            for city in cities {
                let key = normalize_city(&city);
                if key.is_empty() {
                    continue;
                }
                if let Some(previous) = counties.insert(key, county.clone()) {
                    if previous != county {
                        return Err(CliError::reference(
                            file,
                            format!("city '{city}' is listed under both '{previous}' and '{county}'"),
                        ));
                    }
                }
            }
        }
        Ok(Self { counties })
    }

    /// County of a city, if mapped
    pub fn county(&self, city: &str) -> Option<&str> {
        self.counties.get(&normalize_city(city)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.counties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counties.is_empty()
    }
}

/// Normalize a city name for lookup: lowercase, single spaces
pub fn normalize_city(city: &str) -> String {
    city.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// An entry of the suppression list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuppressionEntry {
    Id(String),
    NameCategory { name: String, category: String },
}

impl SuppressionEntry {
    /// Identifier this entry refers to, in the shared id namespace
    pub fn target_id(&self) -> Option<String> {
        match self {
            SuppressionEntry::Id(id) => Some(id.trim().to_string()).filter(|id| !id.is_empty()),
            SuppressionEntry::NameCategory { name, category } => id::derive_id(name, category).ok(),
        }
    }
}

impl std::fmt::Display for SuppressionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuppressionEntry::Id(id) => write!(f, "{id}"),
            SuppressionEntry::NameCategory { name, category } => {
                write!(f, "{name} ({category})")
            },
        }
    }
}

/// All reference data needed to validate and transform records
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    pub categories: KeySet<CategoryMetadata>,
    pub groups: KeySet<GroupMetadata>,
    pub areas: KeySet<Area>,
    pub cities: CityMapping,
    pub suppressed: Vec<SuppressionEntry>,

    /// Path of the suppression list, for diagnostics
    pub suppressed_path: String,

    /// Fingerprint of the tables that shape transformed output
    ///
    /// The suppression list is excluded: it filters output but never changes
    /// a transformed program.
    pub fingerprint: Fingerprint,
}

impl ReferenceTables {
    /// Load every table from a reference directory
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(CliError::config(format!(
                "reference directory '{}' does not exist",
                dir.display()
            )));
        }

        let (categories, categories_fp) = read_table::<Vec<CategoryMetadata>>(dir, CATEGORIES_FILE)?;
        let (groups, groups_fp) = read_table::<Vec<GroupMetadata>>(dir, GROUPS_FILE)?;
        let (areas, areas_fp) = read_table::<Vec<Area>>(dir, AREAS_FILE)?;
        let (cities, cities_fp) = read_table::<BTreeMap<String, Vec<String>>>(dir, CITIES_FILE)?;

        let suppressed_file = dir.join(SUPPRESSED_FILE);
        let suppressed = if suppressed_file.exists() {
            read_table::<Option<Vec<SuppressionEntry>>>(dir, SUPPRESSED_FILE)?
                .0
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let fingerprint = corpus_fingerprint([
            (CATEGORIES_FILE, &categories_fp),
            (GROUPS_FILE, &groups_fp),
            (AREAS_FILE, &areas_fp),
            (CITIES_FILE, &cities_fp),
        ]);

        let tables = Self {
            categories: KeySet::new(categories, &dir.join(CATEGORIES_FILE))?,
            groups: KeySet::new(groups, &dir.join(GROUPS_FILE))?,
            areas: KeySet::new(areas, &dir.join(AREAS_FILE))?,
            cities: CityMapping::from_counties(cities, &dir.join(CITIES_FILE))?,
            suppressed,
            suppressed_path: SUPPRESSED_FILE.to_string(),
            fingerprint,
        };

        tracing::debug!(
            categories = tables.categories.len(),
            groups = tables.groups.len(),
            areas = tables.areas.len(),
            cities = tables.cities.len(),
            suppressed = tables.suppressed.len(),
            "Loaded reference tables"
        );

        Ok(tables)
    }
}

fn read_table<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<(T, Fingerprint)> {
    let path: PathBuf = dir.join(name);
    if !path.exists() {
        return Err(CliError::reference(&path, "file is missing"));
    }
    let bytes = std::fs::read(&path)?;
    let table = serde_yaml::from_slice(&bytes)
        .map_err(|e| CliError::reference(&path, format!("failed to parse YAML: {e}")))?;
    Ok((table, fingerprint(&bytes)))
}
