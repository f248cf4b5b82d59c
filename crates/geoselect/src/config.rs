//! Run configuration.
//!
//! A run can be described entirely on the command line or in a TOML file
//! (`--config`), with command-line values taking precedence:
//!
//! ```toml
//! target = "NC_BUILDING_FP"
//! selecting = "data/nc_counties.shp"
//! field = "NAME"
//! output_workspace = "out/work.duckdb"
//! append_target_name = true
//! ```

use crate::selector::SelectionFilter;
use crate::value::FilterValue;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_LOG_NAME: &str = "Selection";
pub const DEFAULT_GEOMETRY_COLUMN: &str = "geom";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A literal filter value written in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<ConfigValue> for FilterValue {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Integer(v) => FilterValue::Integer(v),
            ConfigValue::Float(v) => FilterValue::Float(v),
            ConfigValue::Text(v) => FilterValue::Text(v),
        }
    }
}

/// Partially specified settings, as read from a file or the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSettings {
    pub target: Option<String>,
    pub selecting: Option<String>,
    pub field: Option<String>,
    pub output_workspace: Option<PathBuf>,
    pub append_target_name: Option<bool>,
    #[serde(default)]
    pub values: Vec<ConfigValue>,
    pub log_name: Option<String>,
    pub source_db: Option<PathBuf>,
    pub geometry_column: Option<String>,
}

impl RunSettings {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Overlay `overrides` on top of `self`; set values in `overrides` win.
    pub fn merge(self, overrides: RunSettings) -> RunSettings {
        RunSettings {
            target: overrides.target.or(self.target),
            selecting: overrides.selecting.or(self.selecting),
            field: overrides.field.or(self.field),
            output_workspace: overrides.output_workspace.or(self.output_workspace),
            append_target_name: overrides.append_target_name.or(self.append_target_name),
            values: if overrides.values.is_empty() {
                self.values
            } else {
                overrides.values
            },
            log_name: overrides.log_name.or(self.log_name),
            source_db: overrides.source_db.or(self.source_db),
            geometry_column: overrides.geometry_column.or(self.geometry_column),
        }
    }

    pub fn resolve(self) -> Result<RunConfig, ConfigError> {
        let config = RunConfig {
            target: self.target.ok_or(ConfigError::Missing("target"))?,
            selecting: self.selecting.ok_or(ConfigError::Missing("selecting"))?,
            field: self.field.filter(|f| !f.trim().is_empty()),
            output_workspace: self
                .output_workspace
                .ok_or(ConfigError::Missing("output_workspace"))?,
            append_target_name: self.append_target_name.unwrap_or(false),
            values: self.values.into_iter().map(FilterValue::from).collect(),
            log_name: self.log_name.unwrap_or_else(|| DEFAULT_LOG_NAME.to_string()),
            source_db: self.source_db,
            geometry_column: self
                .geometry_column
                .unwrap_or_else(|| DEFAULT_GEOMETRY_COLUMN.to_string()),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub target: String,
    pub selecting: String,
    pub field: Option<String>,
    pub output_workspace: PathBuf,
    pub append_target_name: bool,
    /// Explicit values; when empty and a field is set, values are collected.
    pub values: Vec<FilterValue>,
    pub log_name: String,
    pub source_db: Option<PathBuf>,
    pub geometry_column: String,
}

/// Where the selection filter of a run comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSource {
    /// Scan `field` of the selecting dataset for distinct values.
    Collect { field: String },
    /// Values given up front.
    Explicit {
        field: String,
        filter: SelectionFilter,
    },
    /// Intersect with the whole selecting dataset.
    Unfiltered,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.field.is_none() && !self.values.is_empty() {
            return Err(ConfigError::Invalid(
                "values were given without a field to filter on".to_string(),
            ));
        }
        if self.log_name.trim().is_empty() {
            return Err(ConfigError::Invalid("log_name is empty".to_string()));
        }
        if self.output_workspace.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output_workspace is empty".to_string()));
        }
        Ok(())
    }

    pub fn filter_source(&self) -> FilterSource {
        let Some(field) = self.field.clone() else {
            return FilterSource::Unfiltered;
        };
        match self.values.as_slice() {
            [] => FilterSource::Collect { field },
            [value] => FilterSource::Explicit {
                field,
                filter: SelectionFilter::OneValue(value.clone()),
            },
            values => FilterSource::Explicit {
                field,
                filter: SelectionFilter::ManyValues(values.to_vec()),
            },
        }
    }
}
