//! Schema registry: the expected column layout of ingested datasets.

use crate::error::MlError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One entry of the schema's `columns` list.
///
/// Accepts both a bare name (`- Elevation`) and a one-entry map
/// (`- Elevation: int`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnEntry {
    Name(String),
    Typed(BTreeMap<String, String>),
}

impl ColumnEntry {
    pub fn name(&self) -> Option<&str> {
        match self {
            ColumnEntry::Name(name) => Some(name.as_str()),
            ColumnEntry::Typed(map) => map.keys().next().map(String::as_str),
        }
    }

    pub fn dtype(&self) -> Option<&str> {
        match self {
            ColumnEntry::Name(_) => None,
            ColumnEntry::Typed(map) => map.values().next().map(String::as_str),
        }
    }
}

/// Expected column specification loaded from the schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSpec {
    pub columns: Vec<ColumnEntry>,
    #[serde(default)]
    pub numerical_columns: Vec<String>,
    #[serde(default)]
    pub categorical_columns: Vec<String>,
}

impl SchemaSpec {
    /// Parse a schema document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, MlError> {
        let spec: SchemaSpec = serde_yaml::from_str(yaml)?;
        spec.check()?;
        Ok(spec)
    }

    /// Load the schema document at `path`.
    pub fn load(path: &Path) -> Result<Self, MlError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MlError::schema(format!("failed to read schema `{}`: {e}", path.display()))
        })?;
        let spec = Self::from_yaml_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            columns = spec.expected_column_count(),
            numerical = spec.numerical_columns.len(),
            "schema loaded"
        );
        Ok(spec)
    }

    /// Number of columns a conforming dataframe must have.
    pub fn expected_column_count(&self) -> usize {
        self.columns.len()
    }

    /// Declared column names, in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().filter_map(ColumnEntry::name).collect()
    }

    fn check(&self) -> Result<(), MlError> {
        if let Some(idx) = self.columns.iter().position(|c| match c {
            ColumnEntry::Name(name) => name.is_empty(),
            ColumnEntry::Typed(map) => map.len() != 1,
        }) {
            return Err(MlError::schema(format!(
                "columns[{idx}] must be a name or a single `name: dtype` pair"
            )));
        }
        Ok(())
    }
}
