//! Builds the set of distinct values of one field.

use crate::engine::{DatasetRef, EngineEnv, GeoEngine};
use crate::error::{Result, SelectError};
use crate::events::{EventSink, SelectionEvent};
use crate::value::FilterSet;
use tracing::debug;

/// Scans one field of a dataset into a [`FilterSet`].
pub struct RowValueCollector<'e, E> {
    engine: &'e E,
    env: &'e EngineEnv,
}

impl<'e, E: GeoEngine> RowValueCollector<'e, E> {
    pub fn new(engine: &'e E, env: &'e EngineEnv) -> Self {
        Self { engine, env }
    }

    /// Read every row of `field` exactly once and collapse duplicates.
    ///
    /// Nulls are kept as a set member. Any cursor failure aborts the scan
    /// with [`SelectError::Collection`]; no partial set is returned.
    pub fn collect(
        &self,
        dataset: &DatasetRef,
        field: &str,
        events: &mut dyn EventSink,
    ) -> Result<FilterSet> {
        events.emit(SelectionEvent::CollectionStarted {
            dataset: dataset.to_string(),
            field: field.to_string(),
        });

        let collection_error = |source| SelectError::Collection {
            dataset: dataset.to_string(),
            field: field.to_string(),
            source,
        };

        let cursor = self
            .engine
            .open_attribute_cursor(self.env, dataset, field)
            .map_err(collection_error)?;

        let mut set = FilterSet::new();
        for row in cursor {
            set.insert(row.map_err(collection_error)?);
        }

        debug!(
            "Scanned {} rows of {}.{} into {} distinct values",
            set.rows_scanned(),
            dataset,
            field,
            set.len()
        );
        events.emit(SelectionEvent::CollectionCompleted {
            dataset: dataset.to_string(),
            field: field.to_string(),
            rows_scanned: set.rows_scanned(),
            distinct: set.len(),
        });

        Ok(set)
    }
}
