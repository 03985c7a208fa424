//! Input checks shared by the list and write handlers.
//!
//! Anything that ends up in SQL text rather than a bind parameter (sort columns, table names)
//! must come out of one of these helpers as a `&'static str` from an allow-list.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::errors::{Error, Result};

pub const MAX_SEARCH_LENGTH: usize = 100;

/// Postgres truncates identifiers past this length.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

pub const MAX_CONFIG_KEY_LENGTH: usize = 100;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("identifier regex"));

static CONFIG_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("config key regex"));

fn bad_request(message: String) -> Error {
    Error::BadRequest { message }
}

/// Normalize a free-text search term for use inside an `ILIKE '%…%'` bind.
///
/// Trims, drops empty input, caps the length and escapes the LIKE metacharacters so the term
/// only ever matches literally.
pub fn sanitize_search(search: Option<&str>) -> Option<String> {
    let trimmed = search?.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut escaped = String::with_capacity(trimmed.len());
    for c in trimmed.chars().take(MAX_SEARCH_LENGTH) {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Some(escaped)
}

/// Check a schema or table name.
pub fn validate_identifier<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(bad_request(format!("{field} is required")));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(bad_request(format!(
            "{field} must be at most {MAX_IDENTIFIER_LENGTH} characters"
        )));
    }
    if !IDENTIFIER.is_match(value) {
        return Err(bad_request(format!(
            "{field} must start with a letter or underscore and contain only letters, digits, '_' or '$'"
        )));
    }
    Ok(value)
}

/// Check a configuration key: dotted or dashed names such as `sync.chunk_size` are allowed.
pub fn validate_config_key(key: &str) -> Result<&str> {
    let key = key.trim();
    if key.is_empty() {
        return Err(bad_request("key is required".to_string()));
    }
    if key.len() > MAX_CONFIG_KEY_LENGTH {
        return Err(bad_request(format!("key must be at most {MAX_CONFIG_KEY_LENGTH} characters")));
    }
    if !CONFIG_KEY.is_match(key) {
        return Err(bad_request(
            "key may contain only letters, digits, '_', '.' or '-'".to_string(),
        ));
    }
    Ok(key)
}

/// Case-insensitive membership check; returns the canonical spelling from `allowed`.
pub fn validate_enum(value: &str, allowed: &[&'static str], field: &str) -> Result<&'static str> {
    let value = value.trim();
    allowed
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(value))
        .copied()
        .ok_or_else(|| bad_request(format!("Invalid {field} '{value}'. Must be one of: {}", allowed.join(", "))))
}

/// Like [`validate_enum`], for an optional query parameter where empty means "no filter".
pub fn validate_optional_enum(value: Option<&str>, allowed: &[&'static str], field: &str) -> Result<Option<&'static str>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => validate_enum(v, allowed, field).map(Some),
        None => Ok(None),
    }
}

/// Parse a `true`/`false` query filter. Empty means "no filter".
pub fn parse_bool_filter(value: Option<&str>, field: &str) -> Result<Option<bool>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(v) => Err(bad_request(format!("Invalid {field} '{v}'. Must be true or false"))),
    }
}

/// Pick a sort column from an allow-list, falling back to `default` when none was asked for.
pub fn validate_sort(field: Option<&str>, allowed: &[&'static str], default: &'static str) -> Result<&'static str> {
    match field.map(str::trim).filter(|f| !f.is_empty()) {
        Some(f) => validate_enum(f, allowed, "sort_by"),
        None => Ok(default),
    }
}

/// Optional text filter: trimmed, empty dropped.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[serde(alias = "ASC")]
    Asc,
    #[default]
    #[serde(alias = "DESC")]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(Self::default()),
            Some(v) if v.eq_ignore_ascii_case("asc") => Ok(SortDirection::Asc),
            Some(v) if v.eq_ignore_ascii_case("desc") => Ok(SortDirection::Desc),
            Some(v) => Err(bad_request(format!("Invalid sort_order '{v}'. Must be asc or desc"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_search() {
        assert_eq!(sanitize_search(None), None);
        assert_eq!(sanitize_search(Some("   ")), None);
        assert_eq!(sanitize_search(Some("  orders ")), Some("orders".to_string()));
        assert_eq!(sanitize_search(Some("100%_a\\b")), Some("100\\%\\_a\\\\b".to_string()));

        let long = "x".repeat(250);
        assert_eq!(sanitize_search(Some(&long)).unwrap().len(), MAX_SEARCH_LENGTH);
    }

    #[test]
    fn test_validate_identifier() {
        assert_eq!(validate_identifier("public", "schema_name").unwrap(), "public");
        assert_eq!(validate_identifier(" _tmp$1 ", "table_name").unwrap(), "_tmp$1");
        assert!(validate_identifier("", "schema_name").is_err());
        assert!(validate_identifier("1abc", "schema_name").is_err());
        assert!(validate_identifier("orders; DROP TABLE x", "table_name").is_err());
        assert!(validate_identifier("a-b", "table_name").is_err());
        assert!(validate_identifier(&"a".repeat(64), "table_name").is_err());
        assert!(validate_identifier(&"a".repeat(63), "table_name").is_ok());
    }

    #[test]
    fn test_validate_config_key() {
        assert_eq!(validate_config_key(" sync.chunk_size ").unwrap(), "sync.chunk_size");
        assert!(validate_config_key("max-workers").is_ok());
        assert!(validate_config_key("").is_err());
        assert!(validate_config_key(".hidden").is_err());
        assert!(validate_config_key("key with spaces").is_err());
        assert!(validate_config_key(&"k".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_enum_is_case_insensitive() {
        const STATUSES: &[&str] = &["FULL_LOAD", "LISTENING_CHANGES", "ERROR"];
        assert_eq!(validate_enum("error", STATUSES, "status").unwrap(), "ERROR");
        let err = validate_enum("bogus", STATUSES, "status").unwrap_err();
        assert!(err.user_message().contains("FULL_LOAD, LISTENING_CHANGES, ERROR"));
        assert_eq!(validate_optional_enum(Some(""), STATUSES, "status").unwrap(), None);
    }

    #[test]
    fn test_parse_bool_filter() {
        assert_eq!(parse_bool_filter(None, "active").unwrap(), None);
        assert_eq!(parse_bool_filter(Some("TRUE"), "active").unwrap(), Some(true));
        assert_eq!(parse_bool_filter(Some("false"), "active").unwrap(), Some(false));
        assert!(parse_bool_filter(Some("yes"), "active").is_err());
    }

    #[test]
    fn test_sorting() {
        const COLUMNS: &[&str] = &["schema_name", "table_size"];
        assert_eq!(validate_sort(None, COLUMNS, "schema_name").unwrap(), "schema_name");
        assert_eq!(validate_sort(Some("TABLE_SIZE"), COLUMNS, "schema_name").unwrap(), "table_size");
        assert!(validate_sort(Some("password_hash"), COLUMNS, "schema_name").is_err());

        assert_eq!(SortDirection::parse(None).unwrap(), SortDirection::Desc);
        assert_eq!(SortDirection::parse(Some("ASC")).unwrap().as_sql(), "ASC");
        assert!(SortDirection::parse(Some("sideways")).is_err());
    }
}
