// crates/remote-storage-store-sqlite/src/query.rs
// ============================================================================
// Module: SQLite Query Builder
// Description: Parameterized predicates over key components and time bounds.
// Purpose: Compose WHERE clauses generically instead of per-arity SQL strings.
// Dependencies: remote-storage-core, rusqlite
// ============================================================================

//! ## Overview
//! [`VersionFilter`] turns a key or query into positional SQL predicates.
//! Literal components become equality predicates; wildcard dimensions are
//! omitted entirely. Every value is bound as a parameter; only validated
//! column names are ever interpolated into SQL text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use remote_storage_core::DimensionFilter;
use remote_storage_core::DimensionSchema;
use remote_storage_core::EncodedContent;
use remote_storage_core::LatestQuery;
use remote_storage_core::PartialKey;
use remote_storage_core::Timestamp;
use remote_storage_core::VersionKey;
use rusqlite::ParamsFromIter;
use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::schema::VERSIONS_TABLE;
use crate::schema::dimension_column;

// ============================================================================
// SECTION: Filter
// ============================================================================

/// Conjunction of positional predicates over the version table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionFilter {
    /// Rendered predicates, each referencing one positional parameter.
    predicates: Vec<String>,
    /// Bound values in parameter order.
    values: Vec<Value>,
}

impl VersionFilter {
    /// Filters on exactly one canonical key.
    #[must_use]
    pub fn for_key(key: &VersionKey) -> Self {
        let mut filter = Self::default();
        filter.push_equal("variable_name", Value::Text(key.name().as_str().to_string()));
        for dimension in key.dimensions() {
            let value = Value::Text(dimension.value.clone());
            filter.push_equal(&dimension_column(&dimension.name), value);
        }
        filter
    }

    /// Filters on a partial key; wildcard dimensions add no predicate.
    #[must_use]
    pub fn for_partial(key: &PartialKey) -> Self {
        let mut filter = Self::default();
        filter.push_equal("variable_name", Value::Text(key.name().as_str().to_string()));
        for predicate in key.dimensions() {
            if let DimensionFilter::Exact(value) = &predicate.filter {
                filter.push_equal(&dimension_column(&predicate.name), Value::Text(value.clone()));
            }
        }
        filter
    }

    /// Filters on a latest-match query: partial key plus inclusive bounds.
    #[must_use]
    pub fn for_query(query: &LatestQuery) -> Self {
        let mut filter = Self::for_partial(&query.key);
        if let Some(after) = query.after {
            filter.push("recorded_at", ">=", timestamp_value(after));
        }
        if let Some(before) = query.before {
            filter.push("recorded_at", "<=", timestamp_value(before));
        }
        filter
    }

    /// Appends a trailing parameter that no predicate references (for
    /// example a `LIMIT`).
    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.values.push(value);
        self
    }

    /// Adds an equality predicate.
    fn push_equal(&mut self, column: &str, value: Value) {
        self.push(column, "=", value);
    }

    /// Adds a comparison predicate bound to the next positional parameter.
    fn push(&mut self, column: &str, operator: &str, value: Value) {
        self.values.push(value);
        self.predicates.push(format!("{column} {operator} ?{}", self.values.len()));
    }

    /// Returns the number of bound parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when the filter matches every row.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Renders the `WHERE` clause (empty when there are no predicates).
    #[must_use]
    pub fn where_clause(&self) -> String {
        if self.predicates.is_empty() {
            return String::new();
        }
        format!("WHERE {}", self.predicates.join(" AND "))
    }

    /// Returns the bound values for `rusqlite`.
    pub fn params(&self) -> ParamsFromIter<std::slice::Iter<'_, Value>> {
        params_from_iter(self.values.iter())
    }
}

/// Converts a timestamp into a bindable value.
#[must_use]
pub fn timestamp_value(timestamp: Timestamp) -> Value {
    Value::Real(timestamp.as_secs())
}

// ============================================================================
// SECTION: Statements
// ============================================================================

/// Renders the parameterized insert for `schema`.
///
/// Parameters: name, each dimension in schema order, `recorded_at`,
/// `content`, `content_hash`, `hash_algorithm`.
#[must_use]
pub fn insert_statement(schema: &DimensionSchema) -> String {
    let mut columns = vec!["variable_name".to_string()];
    columns.extend(schema.names().iter().map(dimension_column));
    columns.extend(
        ["recorded_at", "content", "content_hash", "hash_algorithm"].map(ToString::to_string),
    );
    let placeholders: Vec<String> =
        (1 ..= columns.len()).map(|index| format!("?{index}")).collect();
    format!(
        "INSERT INTO {VERSIONS_TABLE} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Returns the insert parameters in [`insert_statement`] order.
#[must_use]
pub fn insert_values(
    key: &VersionKey,
    timestamp: Timestamp,
    content: &EncodedContent,
) -> Vec<Value> {
    let mut values = Vec::with_capacity(key.dimensions().len() + 5);
    values.push(Value::Text(key.name().as_str().to_string()));
    values.extend(key.dimensions().iter().map(|dimension| Value::Text(dimension.value.clone())));
    values.push(timestamp_value(timestamp));
    values.push(Value::Text(content.text().to_string()));
    values.push(Value::Text(content.digest().value.clone()));
    values.push(Value::Text(content.digest().algorithm.label().to_string()));
    values
}

/// Renders the latest-match select for `filter`.
#[must_use]
pub fn latest_statement(filter: &VersionFilter) -> String {
    format!(
        "SELECT recorded_at, content, content_hash, hash_algorithm FROM {VERSIONS_TABLE} {} \
         ORDER BY recorded_at DESC, id DESC LIMIT 1",
        filter.where_clause()
    )
}

/// Renders the count select for `filter`.
#[must_use]
pub fn count_statement(filter: &VersionFilter) -> String {
    format!("SELECT COUNT(*) FROM {VERSIONS_TABLE} {}", filter.where_clause())
}

/// Renders the history select for `filter`, newest first.
#[must_use]
pub fn history_statement(filter: &VersionFilter) -> String {
    format!(
        "SELECT recorded_at, content_hash, hash_algorithm, length(CAST(content AS BLOB)) FROM \
         {VERSIONS_TABLE} {} ORDER BY recorded_at DESC, id DESC",
        filter.where_clause()
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    fn schema() -> DimensionSchema {
        DimensionSchema::new(["environment", "test_id"]).unwrap()
    }

    #[test]
    fn exact_key_constrains_every_column() {
        let key = schema().key(Some("var"), [("test_id", "t1")]).unwrap();
        let filter = VersionFilter::for_key(&key);
        assert_eq!(
            filter.where_clause(),
            "WHERE variable_name = ?1 AND dim_environment = ?2 AND dim_test_id = ?3"
        );
        assert_eq!(filter.len(), 3);
    }

    #[test]
    fn wildcards_omit_predicates_but_empty_values_do_not() {
        let partial = schema().partial_key(Some("var"), [("test_id", "")]).unwrap();
        let filter = VersionFilter::for_partial(&partial);
        assert_eq!(filter.where_clause(), "WHERE variable_name = ?1 AND dim_test_id = ?2");
    }

    #[test]
    fn bounds_follow_key_parameters() {
        let partial = schema().partial_key(Some("var"), []).unwrap();
        let query = LatestQuery::new(partial)
            .after(Some(Timestamp::from_secs(1.0).unwrap()))
            .before(Some(Timestamp::from_secs(2.0).unwrap()));
        let filter = VersionFilter::for_query(&query);
        assert_eq!(
            filter.where_clause(),
            "WHERE variable_name = ?1 AND recorded_at >= ?2 AND recorded_at <= ?3"
        );
    }

    #[test]
    fn insert_binds_every_column() {
        assert_eq!(
            insert_statement(&schema()),
            "INSERT INTO variable_versions (variable_name, dim_environment, dim_test_id, \
             recorded_at, content, content_hash, hash_algorithm) VALUES (?1, ?2, ?3, ?4, ?5, \
             ?6, ?7)"
        );
    }
}
