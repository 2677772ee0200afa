//! Validated record to published program

use crate::reference::{KeySet, ReferenceTables};
use crate::validate::ValidatedRecord;
use cdp_common::types::{ApiProgram, CityInfo, County};
use std::collections::BTreeSet;
use thiserror::Error;

/// A validated key no longer resolves against the tables it is transformed with
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field} '{key}' of program '{id}' is not in the reference tables")]
pub struct TransformError {
    pub id: String,
    pub field: &'static str,
    pub key: String,
}

/// Build the published shape of one record
pub fn transform(
    record: &ValidatedRecord,
    source_path: &str,
    tables: &ReferenceTables,
) -> Result<ApiProgram, TransformError> {
    let lookup = |field: &'static str, key: &str| TransformError {
        id: record.id.clone(),
        field,
        key: key.to_string(),
    };

    let category = tables
        .categories
        .resolve(&record.category)
        .cloned()
        .ok_or_else(|| lookup("category", &record.category))?;
    let groups = resolve_all(&tables.groups, &record.groups, |k| lookup("group", k))?;
    let areas = resolve_all(&tables.areas, &record.areas, |k| lookup("area", k))?;

    let cities: Vec<CityInfo> = record
        .cities
        .iter()
        .map(|city| CityInfo {
            name: city.clone(),
            county: tables
                .cities
                .county(city)
                .map(|c| County::Known(c.to_string()))
                .unwrap_or(County::Unknown),
        })
        .collect();

    let counties: Vec<String> = cities
        .iter()
        .filter_map(|c| match c.county {
            County::Known(ref name) => Some(name.clone()),
            County::Unknown => None,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let search_text = search_text(
        [
            Some(record.name.as_str()),
            Some(category.label.as_str()),
            record.description.as_deref(),
            record.eligibility.as_deref(),
        ]
        .into_iter()
        .flatten()
        .chain(groups.iter().map(|g| g.label.as_str()))
        .chain(areas.iter().map(|a| a.label.as_str()))
        .chain(cities.iter().map(|c| c.name.as_str())),
    );

    Ok(ApiProgram {
        id: record.id.clone(),
        name: record.name.clone(),
        category,
        groups,
        areas,
        cities,
        counties,
        description: record.description.clone(),
        website: record.website.clone(),
        eligibility: record.eligibility.clone(),
        search_text,
        source_path: source_path.to_string(),
    })
}

fn resolve_all<T: crate::reference::Keyed + Clone>(
    set: &KeySet<T>,
    keys: &[String],
    missing: impl Fn(&str) -> TransformError,
) -> Result<Vec<T>, TransformError> {
    keys.iter()
        .map(|key| set.resolve(key).cloned().ok_or_else(|| missing(key)))
        .collect()
}

/// Lowercased, whitespace-collapsed concatenation of the searchable fields
fn search_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::validate::tests::tables;

    fn record() -> ValidatedRecord {
        ValidatedRecord {
            index: 0,
            id: "calfresh-benefits-food".to_string(),
            name: "CalFresh Benefits".to_string(),
            category: "food".to_string(),
            groups: vec!["families".to_string()],
            areas: vec!["alameda".to_string()],
            cities: vec![
                "Oakland".to_string(),
                "Gilroy".to_string(),
                "Berkeley".to_string(),
            ],
            description: Some("Monthly  food\nbenefits".to_string()),
            website: Some("https://www.getcalfresh.org".to_string()),
            eligibility: None,
        }
    }

    #[test]
    fn test_transform_resolves_metadata() {
        let program = transform(&record(), "food/calfresh.yml", &tables()).unwrap();
        assert_eq!(program.id, "calfresh-benefits-food");
        assert_eq!(program.category.label, "Food");
        assert_eq!(program.groups[0].label, "Families");
        assert_eq!(program.areas[0].label, "Alameda County");
        assert_eq!(program.source_path, "food/calfresh.yml");
    }

    #[test]
    fn test_unmapped_city_is_unknown_county() {
        let program = transform(&record(), "a.yml", &tables()).unwrap();
        assert_eq!(program.cities[1].county, County::Unknown);
        assert_eq!(program.counties, vec!["Alameda"]);
    }

    #[test]
    fn test_search_text_is_lowercased_and_collapsed() {
        let program = transform(&record(), "a.yml", &tables()).unwrap();
        assert_eq!(
            program.search_text,
            "calfresh benefits food monthly food benefits families alameda county oakland gilroy berkeley"
        );
    }

    #[test]
    fn test_transform_is_pure() {
        let tables = tables();
        let first = transform(&record(), "a.yml", &tables).unwrap();
        let second = transform(&record(), "a.yml", &tables).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unresolvable_key_is_error() {
        let mut record = record();
        record.groups.push("veterans".to_string());
        let err = transform(&record, "a.yml", &tables()).unwrap_err();
        assert_eq!(err.field, "group");
        assert_eq!(err.key, "veterans");
    }
}
