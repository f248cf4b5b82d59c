//! Error types for value collection and intersect selection.

use std::fmt;
use thiserror::Error;

/// Selection result type.
pub type Result<T> = std::result::Result<T, SelectError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure reported by the geoprocessing engine.
///
/// Covers everything the engine can surface: missing datasets or fields,
/// malformed predicates, locked outputs, invalid geometry, full disks.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
    #[source]
    source: Option<BoxedSource>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Pipeline step that failed inside one selection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStage {
    FilterView,
    SpatialSelect,
    Copy,
}

impl SelectionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStage::FilterView => "attribute filter view",
            SelectionStage::SpatialSelect => "select by location",
            SelectionStage::Copy => "copy features",
        }
    }
}

impl fmt::Display for SelectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while collecting filter values or running selections.
#[derive(Debug, Error)]
pub enum SelectError {
    /// Reading the selecting dataset failed. Fatal for the whole run.
    #[error("Failed to collect values of field '{field}' from {dataset}: {source}")]
    Collection {
        dataset: String,
        field: String,
        #[source]
        source: EngineError,
    },

    /// The attribute predicate could not be built for a value.
    #[error("Cannot build predicate on field '{field}': {reason}")]
    PredicateBuild { field: String, reason: String },

    /// One of the three pipeline steps failed for a task.
    #[error("{stage} failed: {source}")]
    Selection {
        stage: SelectionStage,
        #[source]
        source: EngineError,
    },

    /// Any other engine failure (e.g. describing the target dataset).
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

impl SelectError {
    pub fn predicate(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PredicateBuild {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn stage(stage: SelectionStage) -> impl FnOnce(EngineError) -> Self {
        move |source| Self::Selection { stage, source }
    }

    /// Whether this error is isolated to one task (never aborts a batch).
    pub fn is_task_local(&self) -> bool {
        !matches!(self, SelectError::Collection { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_selection_error_message_names_stage() {
        let err = SelectError::stage(SelectionStage::Copy)(EngineError::new("disk full"));
        assert_eq!(err.to_string(), "copy features failed: disk full");
        assert!(err.source().is_some());
        assert!(err.is_task_local());
    }

    #[test]
    fn test_collection_error_is_fatal() {
        let err = SelectError::Collection {
            dataset: "counties".to_string(),
            field: "NAME".to_string(),
            source: EngineError::new("no such field"),
        };
        assert!(!err.is_task_local());
        assert!(err.to_string().contains("'NAME'"));
    }

    #[test]
    fn test_engine_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        let err = EngineError::with_source("cannot open dataset", io);
        assert_eq!(err.message(), "cannot open dataset");
        assert_eq!(err.source().unwrap().to_string(), "locked");
    }
}
