//! Public data model of the generated dataset
//!
//! These types are serialized into the static JSON documents consumed by the
//! client applications. Field order is part of the output contract: documents
//! must be byte-identical across runs on unchanged input.

use crate::checksum::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version of the document layout written by the generator
pub const SCHEMA_VERSION: u32 = 1;

/// Marker written in place of a county that could not be resolved
pub const UNKNOWN_COUNTY: &str = "unknown";

// ============================================================================
// Reference Metadata
// ============================================================================

/// A program category (e.g. "food", "housing")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMetadata {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// An audience group (e.g. "families", "seniors")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMetadata {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// A service area (e.g. "alameda", "statewide")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================================================
// Programs
// ============================================================================

/// County resolved for a city, or explicitly unknown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum County {
    Known(String),
    Unknown,
}

impl County {
    pub fn is_known(&self) -> bool {
        matches!(self, County::Known(_))
    }
}

impl From<String> for County {
    fn from(value: String) -> Self {
        if value == UNKNOWN_COUNTY {
            County::Unknown
        } else {
            County::Known(value)
        }
    }
}

impl From<County> for String {
    fn from(value: County) -> Self {
        match value {
            County::Known(name) => name,
            County::Unknown => UNKNOWN_COUNTY.to_string(),
        }
    }
}

/// A city a program serves, with its county
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityInfo {
    pub name: String,
    pub county: County,
}

/// A single published program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiProgram {
    /// Stable identifier, explicit or derived from name and category
    pub id: String,

    pub name: String,

    pub category: CategoryMetadata,

    pub groups: Vec<GroupMetadata>,

    pub areas: Vec<Area>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cities: Vec<CityInfo>,

    /// Distinct known counties of `cities`, sorted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub counties: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligibility: Option<String>,

    /// Lowercased text used by client-side search
    pub search_text: String,

    /// Source file the program was generated from, relative to the records root
    pub source_path: String,
}

/// An ordered collection of programs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramsResponse {
    pub count: usize,
    pub programs: Vec<ApiProgram>,
}

impl ProgramsResponse {
    pub fn new(programs: Vec<ApiProgram>) -> Self {
        Self {
            count: programs.len(),
            programs,
        }
    }
}

// ============================================================================
// Listings
// ============================================================================

/// Entry of `categories.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryListing {
    #[serde(flatten)]
    pub category: CategoryMetadata,
    pub program_count: usize,
    pub program_ids: Vec<String>,
}

/// Entry of `areas.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaListing {
    #[serde(flatten)]
    pub area: Area,
    pub program_count: usize,
    pub program_ids: Vec<String>,
}

// ============================================================================
// Run Metadata
// ============================================================================

/// Counters describing one generation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Programs published
    pub total: usize,
    /// Valid programs withheld by the suppression list or inline flag
    pub suppressed: usize,
    /// Validation warnings recorded for the corpus
    pub warnings: usize,
    /// Source files read
    pub source_files: usize,
}

/// Contents of `metadata.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMetadata {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub corpus_fingerprint: Fingerprint,
    pub reference_fingerprint: Fingerprint,
    pub counts: RunCounts,
    /// Category keys, ascending
    pub categories: Vec<String>,
    /// Area keys, ascending
    pub areas: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_county_serializes_unknown_marker() {
        let city = CityInfo {
            name: "Gilroy".to_string(),
            county: County::Unknown,
        };
        let json = serde_json::to_string(&city).unwrap();
        assert_eq!(json, r#"{"name":"Gilroy","county":"unknown"}"#);

        let back: CityInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.county, County::Unknown);
    }

    #[test]
    fn test_category_listing_is_flat() {
        let listing = CategoryListing {
            category: CategoryMetadata {
                key: "food".to_string(),
                label: "Food".to_string(),
                description: None,
                icon: None,
            },
            program_count: 1,
            program_ids: vec!["calfresh-benefits-food".to_string()],
        };
        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(value["key"], "food");
        assert_eq!(value["program_ids"][0], "calfresh-benefits-food");
        assert!(value.get("description").is_none());
    }

    #[test]
    fn test_programs_response_counts() {
        let response = ProgramsResponse::new(Vec::new());
        assert_eq!(response.count, 0);
    }
}
