//! GeoSelect - split a target layer by the features of a selecting layer
//!
//! For every distinct value of a field in the *selecting* dataset (for
//! example county names), the target dataset (for example building
//! footprints) is spatially filtered to the features intersecting the
//! matching selecting rows, and the result is copied to its own output
//! dataset.
//!
//! # Pipeline
//!
//! 1. [`RowValueCollector`] scans the field once and builds a [`FilterSet`]
//! 2. [`IntersectSelector`] runs filter view -> select by location -> copy
//!    for each value, isolating per-value failures
//!
//! All spatial work is delegated to a [`GeoEngine`]. Progress is reported
//! as [`SelectionEvent`]s so callers choose how to render it.

pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod naming;
pub mod predicate;
pub mod selector;
pub mod value;

pub use collector::RowValueCollector;
pub use config::{FilterSource, RunConfig, RunSettings};
pub use engine::{
    CopiedDataset, DatasetDescription, DatasetRef, EngineEnv, GeoEngine, OverlapType,
    SelectingFeatures,
};
pub use error::{EngineError, Result, SelectError, SelectionStage};
pub use events::{EventSink, FnSink, SelectionEvent, SelectionMode, Tee, TracingSink};
pub use naming::{sanitize_name, OutputPath};
pub use predicate::WhereClause;
pub use selector::{
    IntersectSelector, PassThroughKind, SelectionFilter, SelectionReport, TaskOutcome,
};
pub use value::{FilterSet, FilterValue};

/// Run a configured selection end to end.
///
/// Collects values first when the configuration names a field but no
/// explicit values. A collection failure is returned as an error; task
/// failures are only reported in the returned [`SelectionReport`].
pub fn run_selection<E: GeoEngine>(
    engine: &E,
    env: &EngineEnv,
    config: &RunConfig,
    events: &mut dyn EventSink,
) -> Result<SelectionReport> {
    let target = DatasetRef::new(config.target.clone());
    let selecting = DatasetRef::new(config.selecting.clone());

    let (field, filter) = match config.filter_source() {
        FilterSource::Unfiltered => (None, SelectionFilter::NoFilter),
        FilterSource::Explicit { field, filter } => (Some(field), filter),
        FilterSource::Collect { field } => {
            let set = RowValueCollector::new(engine, env).collect(&selecting, &field, events)?;
            (Some(field), SelectionFilter::from(set))
        }
    };

    let selector = IntersectSelector::new(
        engine,
        env,
        target,
        selecting,
        config.output_workspace.clone(),
    );
    selector.run(
        &filter,
        field.as_deref(),
        config.append_target_name,
        events,
    )
}
