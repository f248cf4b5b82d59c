//! Geoprocessing engine contract.
//!
//! The engine owns everything spatial: reading attribute rows, building
//! filtered views, running select-by-location, and writing outputs. The
//! collector and selector only sequence these calls.
//!
//! Settings that would otherwise be process-wide (overwrite policy) travel
//! with every call in an [`EngineEnv`].

use crate::error::EngineError;
use crate::naming::OutputPath;
use crate::predicate::WhereClause;
use crate::value::FilterValue;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[cfg(feature = "duckdb")]
pub mod duckdb;
#[cfg(feature = "duckdb")]
mod lock;

/// Per-run engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEnv {
    /// Replace an existing output dataset instead of failing the copy.
    pub overwrite_output: bool,
}

impl Default for EngineEnv {
    fn default() -> Self {
        Self {
            overwrite_output: true,
        }
    }
}

/// Reference to a dataset the engine can open (table name or file path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DatasetRef(String);

impl DatasetRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DatasetRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DatasetRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// What the engine reports about a dataset. Only `name` drives naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescription {
    pub name: String,
    pub geometry_type: Option<String>,
}

/// Spatial relationship used by select-by-location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapType {
    /// Geometries share at least one point, boundaries included.
    Intersect,
}

impl OverlapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlapType::Intersect => "INTERSECT",
        }
    }
}

/// Features that bound a spatial selection.
#[derive(Debug)]
pub enum SelectingFeatures<'a, V> {
    /// The whole selecting dataset.
    Dataset(&'a DatasetRef),
    /// An attribute-filtered view of the selecting dataset.
    View(&'a V),
}

/// Result of a successful copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopiedDataset {
    pub path: PathBuf,
    pub rows: u64,
}

/// Rows of a single-field read cursor.
pub type AttributeCursor<'a> = Box<dyn Iterator<Item = Result<FilterValue, EngineError>> + 'a>;

/// The geoprocessing operations the selection pipeline depends on.
pub trait GeoEngine {
    /// Handle to an attribute-filtered view.
    type View;
    /// Handle to a set of selected target features.
    type Selection;

    /// Read-only sequential cursor over one field of a dataset.
    fn open_attribute_cursor<'a>(
        &'a self,
        env: &EngineEnv,
        dataset: &DatasetRef,
        field: &str,
    ) -> Result<AttributeCursor<'a>, EngineError>;

    fn describe(
        &self,
        env: &EngineEnv,
        dataset: &DatasetRef,
    ) -> Result<DatasetDescription, EngineError>;

    /// Temporary view of `dataset` restricted to rows matching `where_clause`.
    fn make_attribute_filtered_view(
        &self,
        env: &EngineEnv,
        dataset: &DatasetRef,
        where_clause: &WhereClause,
    ) -> Result<Self::View, EngineError>;

    /// Features of `target` that satisfy `overlap` against `selecting`.
    fn select_by_location(
        &self,
        env: &EngineEnv,
        target: &DatasetRef,
        overlap: OverlapType,
        selecting: SelectingFeatures<'_, Self::View>,
    ) -> Result<Self::Selection, EngineError>;

    /// Write `selection` to `output`, honouring `env.overwrite_output`.
    fn copy_features(
        &self,
        env: &EngineEnv,
        selection: &Self::Selection,
        output: &OutputPath,
    ) -> Result<CopiedDataset, EngineError>;
}
