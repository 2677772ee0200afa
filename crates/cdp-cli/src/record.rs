//! Source record schema
//!
//! Every field of an authored record is optional at parse time so that a
//! missing `category` is reported by the validator against the right file,
//! instead of aborting the YAML parse. Unknown keys are retained and surface
//! as warnings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value authored either as a single scalar or as a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Non-blank values in authored order
    pub fn values(&self) -> Vec<&str> {
        let all: Vec<&str> = match self {
            OneOrMany::One(value) => vec![value.as_str()],
            OneOrMany::Many(values) => values.iter().map(String::as_str).collect(),
        };
        all.into_iter().filter(|v| !v.trim().is_empty()).collect()
    }
}

/// One authored program entry, as parsed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub group: Option<OneOrMany>,

    #[serde(default)]
    pub area: Option<OneOrMany>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub website: Option<String>,

    #[serde(default)]
    pub cities: Vec<String>,

    #[serde(default)]
    pub eligibility: Option<String>,

    #[serde(default)]
    pub suppressed: bool,

    /// Keys outside the schema
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl RawRecord {
    /// Name with surrounding whitespace removed, if non-blank
    pub fn name(&self) -> Option<&str> {
        non_blank(self.name.as_deref())
    }

    pub fn category(&self) -> Option<&str> {
        non_blank(self.category.as_deref())
    }

    pub fn groups(&self) -> Vec<&str> {
        self.group.as_ref().map(OneOrMany::values).unwrap_or_default()
    }

    pub fn areas(&self) -> Vec<&str> {
        self.area.as_ref().map(OneOrMany::values).unwrap_or_default()
    }

    pub fn website(&self) -> Option<&str> {
        non_blank(self.website.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse the YAML text of a record file
///
/// A file holds either one record (a mapping) or a group of records (a
/// sequence). An empty file holds none.
pub fn parse_records(text: &str) -> Result<Vec<RawRecord>, serde_yaml::Error> {
    let value: serde_yaml::Value = serde_yaml::from_str(text)?;
    match value {
        serde_yaml::Value::Null => Ok(Vec::new()),
        serde_yaml::Value::Sequence(_) => serde_yaml::from_value(value),
        _ => serde_yaml::from_value::<RawRecord>(value).map(|r| vec![r]),
    }
}
