//! Program identifier generation
//!
//! Ids are derived deterministically from name and category unless the
//! record supplies one. Collisions are never resolved here: the validator
//! reports them and the author disambiguates.

use thiserror::Error;

/// Separator between the name and category parts of a derived id
pub const ID_SEPARATOR: char = '-';

/// Why no usable id could be produced for a record
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("id '{0}' contains characters outside [a-z0-9-]")]
    InvalidCharacters(String),

    #[error("id is empty after normalization")]
    Empty,
}

/// Normalize free text into an id fragment
///
/// Lowercases, trims, turns whitespace runs into single hyphens, drops every
/// character outside `[a-z0-9-]`, then collapses repeated hyphens and strips
/// them from both ends.
pub fn normalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let hyphenated = lowered.split_whitespace().collect::<Vec<_>>().join("-");

    let mut out = String::with_capacity(hyphenated.len());
    for c in hyphenated.chars() {
        if c == '-' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Derive an id from a record's name and category
pub fn derive_id(name: &str, category: &str) -> Result<String, IdError> {
    let name = normalize(name);
    if name.is_empty() {
        return Err(IdError::Empty);
    }
    let category = normalize(category);
    if category.is_empty() {
        return Err(IdError::Empty);
    }
    Ok(format!("{name}{ID_SEPARATOR}{category}"))
}

/// Check an explicitly authored id; it is used verbatim when valid
pub fn validate_explicit_id(id: &str) -> Result<String, IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(IdError::InvalidCharacters(id.to_string()));
    }
    Ok(id.to_string())
}

/// Resolve the id of a record
///
/// Returns `None` when there is no explicit id and the name or category
/// needed to derive one is missing; those fields are reported separately.
pub fn resolve_id(
    explicit: Option<&str>,
    name: Option<&str>,
    category: Option<&str>,
) -> Option<Result<String, IdError>> {
    match (explicit, name) {
        (Some(id), _) => Some(validate_explicit_id(id)),
        (None, Some(name)) => category
            .filter(|c| !normalize(c).is_empty())
            .map(|category| derive_id(name, category)),
        (None, None) => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_derive_example_id() {
        assert_eq!(
            derive_id("CalFresh Benefits", "food").unwrap(),
            "calfresh-benefits-food"
        );
        assert_eq!(derive_id("Food Bank", "food").unwrap(), "food-bank-food");
    }

    #[test]
    fn test_normalize_strips_and_collapses() {
        assert_eq!(normalize("  Meals   on\tWheels "), "meals-on-wheels");
        assert_eq!(normalize("Food & Shelter"), "food-shelter");
        assert_eq!(normalize("Head Start (Ages 3-5)"), "head-start-ages-3-5");
        assert_eq!(normalize("Café Olé"), "caf-ol");
        assert_eq!(normalize("--Legal Aid--"), "legal-aid");
    }

    #[test]
    fn test_derive_rejects_empty_name() {
        assert_eq!(derive_id("!!!", "food"), Err(IdError::Empty));
    }

    #[test]
    fn test_explicit_id_used_verbatim() {
        assert_eq!(validate_explicit_id("snap-2024").unwrap(), "snap-2024");
    }

    #[test]
    fn test_explicit_id_not_corrected() {
        assert_eq!(
            validate_explicit_id("SNAP_2024"),
            Err(IdError::InvalidCharacters("SNAP_2024".to_string()))
        );
        assert_eq!(validate_explicit_id(""), Err(IdError::Empty));
    }

    #[test]
    fn test_resolve_prefers_explicit() {
        let id = resolve_id(Some("custom"), Some("Food Bank"), Some("food"));
        assert_eq!(id, Some(Ok("custom".to_string())));
        assert_eq!(resolve_id(None, None, Some("food")), None);
    }

    #[test]
    fn test_no_id_without_category() {
        assert_eq!(resolve_id(None, Some("Food Bank Food"), None), None);
        assert_eq!(resolve_id(None, Some("Food Bank Food"), Some("???")), None);
        assert_eq!(derive_id("Food Bank Food", ""), Err(IdError::Empty));
        assert_eq!(
            resolve_id(Some("custom"), Some("Food Bank Food"), None),
            Some(Ok("custom".to_string()))
        );
    }

    proptest! {
        #[test]
        fn normalized_ids_use_allowed_charset(text in "\\PC{0,40}") {
            let id = normalize(&text);
            prop_assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!id.starts_with('-') && !id.ends_with('-'));
            prop_assert!(!id.contains("--"));
        }

        #[test]
        fn normalize_is_idempotent(text in "\\PC{0,40}") {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once.clone());
        }

        #[test]
        fn derived_ids_pass_explicit_validation(name in "[A-Za-z][A-Za-z0-9 ]{0,20}", category in "[a-z]{1,10}") {
            let id = derive_id(&name, &category).unwrap();
            prop_assert_eq!(validate_explicit_id(&id).unwrap(), id);
        }
    }
}
