// crates/remote-storage-core/src/core/key.rs
// ============================================================================
// Module: Remote Storage Key Model
// Description: Composite variable keys over a deployment-fixed dimension list.
// Purpose: Normalize caller keys into canonical tuples and wildcard queries.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A key is a mandatory variable name plus one value per dimension of the
//! deployment's [`DimensionSchema`]. Dimensions the caller omits are stored as
//! the empty string so they index and compare uniformly; two keys are equal
//! iff every position of the canonical tuple is equal.
//!
//! Query keys ([`PartialKey`]) distinguish an *unspecified* dimension
//! ([`DimensionFilter::Any`], a wildcard) from an *explicitly empty* one
//! ([`DimensionFilter::Exact`] with `""`), which still matches literally.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum number of dimensions a deployment may configure.
pub const MAX_DIMENSIONS: usize = 16;
/// Maximum length of a dimension name in bytes.
pub const MAX_DIMENSION_NAME_BYTES: usize = 64;
/// Maximum length of a variable name or dimension value in bytes.
pub const MAX_KEY_COMPONENT_BYTES: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Key validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The mandatory variable name was absent or empty.
    #[error("variable name is missing; it is a mandatory key component")]
    MissingPrimaryName,
    /// A dimension outside the configured schema was supplied.
    #[error("unknown dimension: {0}")]
    UnknownDimension(String),
    /// The same dimension was supplied more than once.
    #[error("dimension supplied more than once: {0}")]
    DuplicateDimension(String),
    /// A configured dimension name is not a valid identifier.
    #[error("invalid dimension name: {0}")]
    InvalidDimensionName(String),
    /// The schema lists more dimensions than supported.
    #[error("too many dimensions: {actual} (max {max})")]
    TooManyDimensions {
        /// Maximum supported dimensions.
        max: usize,
        /// Configured dimension count.
        actual: usize,
    },
    /// A key component exceeds [`MAX_KEY_COMPONENT_BYTES`].
    #[error("{field} exceeds {max_bytes} bytes")]
    ComponentTooLong {
        /// Offending component label.
        field: String,
        /// Maximum allowed bytes.
        max_bytes: usize,
    },
    /// A key was built for a different dimension layout.
    #[error("key layout does not match store dimensions: {0}")]
    LayoutMismatch(String),
}

// ============================================================================
// SECTION: Names
// ============================================================================

/// Validated primary name of a stored variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariableName(String);

impl VariableName {
    /// Creates a variable name.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::MissingPrimaryName`] for empty names and
    /// [`KeyError::ComponentTooLong`] for oversized ones. Whitespace is a
    /// literal name.
    pub fn new(name: impl Into<String>) -> Result<Self, KeyError> {
        let name = name.into();
        if name.is_empty() {
            return Err(KeyError::MissingPrimaryName);
        }
        ensure_component_len("variable name", &name)?;
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for VariableName {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for VariableName {
    type Error = KeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VariableName> for String {
    fn from(value: VariableName) -> Self {
        value.0
    }
}

/// Validated dimension identifier.
///
/// # Invariants
/// - Starts with an ASCII lowercase letter; remaining bytes are lowercase
///   letters, digits, or `_`.
/// - At most [`MAX_DIMENSION_NAME_BYTES`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DimensionName(String);

impl DimensionName {
    /// Creates a dimension name.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidDimensionName`] when the identifier rules are
    /// violated.
    pub fn new(name: impl Into<String>) -> Result<Self, KeyError> {
        let name = name.into();
        let mut bytes = name.bytes();
        let valid_head = bytes.next().is_some_and(|byte| byte.is_ascii_lowercase());
        let valid_tail = bytes.all(|byte| {
            byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'_'
        });
        if !valid_head || !valid_tail || name.len() > MAX_DIMENSION_NAME_BYTES {
            return Err(KeyError::InvalidDimensionName(name));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DimensionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for DimensionName {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DimensionName> for String {
    fn from(value: DimensionName) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Dimension Schema
// ============================================================================

/// Ordered dimension names fixed at deployment time.
///
/// # Invariants
/// - No duplicate names; at most [`MAX_DIMENSIONS`] entries.
/// - Order is significant: it defines the canonical key tuple.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct DimensionSchema {
    /// Dimension names in canonical order.
    names: Vec<DimensionName>,
}

impl DimensionSchema {
    /// Builds a schema from ordered dimension names.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] for invalid, duplicate, or too many names.
    pub fn new<I, S>(names: I) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut validated: Vec<DimensionName> = Vec::new();
        for name in names {
            let name = DimensionName::new(name)?;
            if validated.contains(&name) {
                return Err(KeyError::DuplicateDimension(name.0));
            }
            validated.push(name);
        }
        if validated.len() > MAX_DIMENSIONS {
            return Err(KeyError::TooManyDimensions {
                max: MAX_DIMENSIONS,
                actual: validated.len(),
            });
        }
        Ok(Self {
            names: validated,
        })
    }

    /// Returns the dimension names in canonical order.
    #[must_use]
    pub fn names(&self) -> &[DimensionName] {
        &self.names
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true when the schema has no dimensions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Normalizes an exact key; omitted dimensions default to `""`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::MissingPrimaryName`] when `name` is absent or empty,
    /// and other [`KeyError`] variants for unknown, repeated, or oversized
    /// dimensions.
    pub fn key<'a, I>(&self, name: Option<&str>, values: I) -> Result<VersionKey, KeyError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let name = VariableName::new(name.unwrap_or_default())?;
        let slots = self.assign(values)?;
        let dimensions = self
            .names
            .iter()
            .zip(slots)
            .map(|(dimension, value)| DimensionValue {
                name: dimension.clone(),
                value: value.unwrap_or_default(),
            })
            .collect();
        Ok(VersionKey {
            name,
            dimensions,
        })
    }

    /// Normalizes a query key; omitted dimensions become wildcards.
    ///
    /// # Errors
    ///
    /// Same as [`DimensionSchema::key`].
    pub fn partial_key<'a, I>(&self, name: Option<&str>, values: I) -> Result<PartialKey, KeyError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let name = VariableName::new(name.unwrap_or_default())?;
        let slots = self.assign(values)?;
        let dimensions = self
            .names
            .iter()
            .zip(slots)
            .map(|(dimension, value)| DimensionPredicate {
                name: dimension.clone(),
                filter: value.map_or(DimensionFilter::Any, DimensionFilter::Exact),
            })
            .collect();
        Ok(PartialKey {
            name,
            dimensions,
        })
    }

    /// Checks that an exact key was normalized against this schema.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::LayoutMismatch`] when names or order differ.
    pub fn conforms_key(&self, key: &VersionKey) -> Result<(), KeyError> {
        self.conforms(key.dimensions.iter().map(|dimension| &dimension.name), key)
    }

    /// Checks that a query key was normalized against this schema.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::LayoutMismatch`] when names or order differ.
    pub fn conforms_partial(&self, key: &PartialKey) -> Result<(), KeyError> {
        self.conforms(key.dimensions.iter().map(|predicate| &predicate.name), key)
    }

    /// Compares a key's dimension names against the schema.
    fn conforms<'a, I>(&self, names: I, key: &dyn fmt::Display) -> Result<(), KeyError>
    where
        I: ExactSizeIterator<Item = &'a DimensionName>,
    {
        if names.len() != self.names.len()
            || !names.zip(&self.names).all(|(left, right)| left == right)
        {
            return Err(KeyError::LayoutMismatch(key.to_string()));
        }
        Ok(())
    }

    /// Places caller-supplied values into schema order.
    fn assign<'a, I>(&self, values: I) -> Result<Vec<Option<String>>, KeyError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut slots: Vec<Option<String>> = vec![None; self.names.len()];
        for (dimension, value) in values {
            let index = self
                .names
                .iter()
                .position(|name| name.as_str() == dimension)
                .ok_or_else(|| KeyError::UnknownDimension(dimension.to_string()))?;
            if slots[index].is_some() {
                return Err(KeyError::DuplicateDimension(dimension.to_string()));
            }
            ensure_component_len(dimension, value)?;
            slots[index] = Some(value.to_string());
        }
        Ok(slots)
    }
}

impl TryFrom<Vec<String>> for DimensionSchema {
    type Error = KeyError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DimensionSchema> for Vec<String> {
    fn from(value: DimensionSchema) -> Self {
        value.names.into_iter().map(String::from).collect()
    }
}

// ============================================================================
// SECTION: Exact Keys
// ============================================================================

/// One dimension value of a canonical key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DimensionValue {
    /// Dimension name.
    pub name: DimensionName,
    /// Stored value; `""` when the caller omitted the dimension.
    pub value: String,
}

/// Canonical exact key: variable name plus every schema dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VersionKey {
    /// Variable name.
    name: VariableName,
    /// Dimension values in schema order.
    dimensions: Vec<DimensionValue>,
}

impl VersionKey {
    /// Returns the variable name.
    #[must_use]
    pub const fn name(&self) -> &VariableName {
        &self.name
    }

    /// Returns the dimension values in schema order.
    #[must_use]
    pub fn dimensions(&self) -> &[DimensionValue] {
        &self.dimensions
    }

    /// Returns the value stored for `dimension`, if the schema has it.
    #[must_use]
    pub fn value(&self, dimension: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|entry| entry.name.as_str() == dimension)
            .map(|entry| entry.value.as_str())
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.dimensions.is_empty() {
            return Ok(());
        }
        f.write_str("[")?;
        for (index, dimension) in self.dimensions.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}='{}'", dimension.name, dimension.value)?;
        }
        f.write_str("]")
    }
}

// ============================================================================
// SECTION: Partial Keys
// ============================================================================

/// Per-dimension filter of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DimensionFilter {
    /// Unspecified: matches any stored value.
    Any,
    /// Matches the stored value literally, including `""`.
    Exact(String),
}

/// One dimension filter of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DimensionPredicate {
    /// Dimension name.
    pub name: DimensionName,
    /// Filter applied to the dimension.
    pub filter: DimensionFilter,
}

/// Query key with optional wildcard dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PartialKey {
    /// Variable name (always matched exactly).
    name: VariableName,
    /// Dimension filters in schema order.
    dimensions: Vec<DimensionPredicate>,
}

impl PartialKey {
    /// Builds a fully literal query key matching exactly `key`.
    #[must_use]
    pub fn exact(key: &VersionKey) -> Self {
        Self::from(key)
    }

    /// Returns the variable name.
    #[must_use]
    pub const fn name(&self) -> &VariableName {
        &self.name
    }

    /// Returns the dimension filters in schema order.
    #[must_use]
    pub fn dimensions(&self) -> &[DimensionPredicate] {
        &self.dimensions
    }

    /// Returns true when every dimension is literal.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.dimensions
            .iter()
            .all(|predicate| matches!(predicate.filter, DimensionFilter::Exact(_)))
    }

    /// Returns true when `key` satisfies this query key.
    #[must_use]
    pub fn matches(&self, key: &VersionKey) -> bool {
        if self.name != key.name || self.dimensions.len() != key.dimensions.len() {
            return false;
        }
        self.dimensions.iter().zip(&key.dimensions).all(|(predicate, stored)| {
            predicate.name == stored.name
                && match &predicate.filter {
                    DimensionFilter::Any => true,
                    DimensionFilter::Exact(value) => *value == stored.value,
                }
        })
    }
}

impl From<&VersionKey> for PartialKey {
    fn from(key: &VersionKey) -> Self {
        Self {
            name: key.name.clone(),
            dimensions: key
                .dimensions
                .iter()
                .map(|dimension| DimensionPredicate {
                    name: dimension.name.clone(),
                    filter: DimensionFilter::Exact(dimension.value.clone()),
                })
                .collect(),
        }
    }
}

impl fmt::Display for PartialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.dimensions.is_empty() {
            return Ok(());
        }
        f.write_str("[")?;
        for (index, predicate) in self.dimensions.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            match &predicate.filter {
                DimensionFilter::Any => write!(f, "{}=*", predicate.name)?,
                DimensionFilter::Exact(value) => write!(f, "{}='{value}'", predicate.name)?,
            }
        }
        f.write_str("]")
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects key components longer than [`MAX_KEY_COMPONENT_BYTES`].
fn ensure_component_len(field: &str, value: &str) -> Result<(), KeyError> {
    if value.len() > MAX_KEY_COMPONENT_BYTES {
        return Err(KeyError::ComponentTooLong {
            field: field.to_string(),
            max_bytes: MAX_KEY_COMPONENT_BYTES,
        });
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
