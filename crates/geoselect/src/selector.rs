//! Intersect selection: one select-by-location + copy per filter value.
//!
//! Every task runs the same three engine calls:
//!
//! 1. attribute-filtered view of the selecting dataset (`<field> = '<value>'`)
//! 2. select target features that INTERSECT the view
//! 3. copy the selection to `<workspace>/<sanitized value>[_<target name>]`
//!
//! A failing task is reported in the [`SelectionReport`] and as a
//! [`SelectionEvent::TaskFailed`]; the remaining tasks still run.

use crate::engine::{
    CopiedDataset, DatasetRef, EngineEnv, GeoEngine, OverlapType, SelectingFeatures,
};
use crate::error::{Result, SelectError, SelectionStage};
use crate::events::{EventSink, SelectionEvent, SelectionMode};
use crate::naming::{
    find_collisions, select_all_output_name, value_output_name, OutputPath,
};
use crate::predicate::WhereClause;
use crate::value::{FilterSet, FilterValue};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Filter inputs that are accepted but never produce a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassThroughKind {
    Mapping,
    Range,
    FrozenSet,
    Boolean,
}

impl fmt::Display for PassThroughKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PassThroughKind::Mapping => "mapping",
            PassThroughKind::Range => "range",
            PassThroughKind::FrozenSet => "frozen set",
            PassThroughKind::Boolean => "boolean",
        };
        f.write_str(label)
    }
}

/// What to select by.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionFilter {
    /// Intersect with the whole selecting dataset.
    NoFilter,
    /// One task for a single value.
    OneValue(FilterValue),
    /// One task per value, in order.
    ManyValues(Vec<FilterValue>),
    /// Accepted without running anything.
    PassThrough(PassThroughKind),
}

impl From<FilterSet> for SelectionFilter {
    fn from(set: FilterSet) -> Self {
        SelectionFilter::ManyValues(set.into_values())
    }
}

/// Outcome of one task.
#[derive(Debug)]
pub struct TaskOutcome {
    /// 1-based position within the run.
    pub position: usize,
    pub value: Option<FilterValue>,
    /// `None` when the output name could not be resolved.
    pub output: Option<OutputPath>,
    pub result: Result<CopiedDataset>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything a selection run did.
#[derive(Debug)]
pub struct SelectionReport {
    pub mode: SelectionMode,
    pub outcomes: Vec<TaskOutcome>,
    pub skipped: Option<PassThroughKind>,
}

impl SelectionReport {
    fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            outcomes: Vec::new(),
            skipped: None,
        }
    }

    pub fn task_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Paths written by successful tasks, in task order.
    pub fn outputs(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|copied| copied.path.as_path())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Runs intersect selections of `target` against `selecting`.
pub struct IntersectSelector<'e, E> {
    engine: &'e E,
    env: &'e EngineEnv,
    target: DatasetRef,
    selecting: DatasetRef,
    output_workspace: PathBuf,
    target_name: RefCell<Option<String>>,
}

impl<'e, E: GeoEngine> IntersectSelector<'e, E> {
    pub fn new(
        engine: &'e E,
        env: &'e EngineEnv,
        target: DatasetRef,
        selecting: DatasetRef,
        output_workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            env,
            target,
            selecting,
            output_workspace: output_workspace.into(),
            target_name: RefCell::new(None),
        }
    }

    /// Dispatch on the filter variant.
    ///
    /// `field` is required for [`SelectionFilter::OneValue`] and
    /// [`SelectionFilter::ManyValues`]; its absence is the only error.
    pub fn run(
        &self,
        filter: &SelectionFilter,
        field: Option<&str>,
        append_target_name: bool,
        events: &mut dyn EventSink,
    ) -> Result<SelectionReport> {
        let require_field = || {
            field.ok_or_else(|| {
                SelectError::predicate("", "a field is required to select by value")
            })
        };

        match filter {
            SelectionFilter::NoFilter => Ok(self.select_all(events)),
            SelectionFilter::OneValue(value) => {
                Ok(self.select_one(require_field()?, value, append_target_name, events))
            }
            SelectionFilter::ManyValues(values) => {
                Ok(self.select_many(require_field()?, values, append_target_name, events))
            }
            SelectionFilter::PassThrough(kind) => Ok(self.pass_through(*kind, events)),
        }
    }

    /// Select target features intersecting the whole selecting dataset.
    ///
    /// Writes `Selection_<target name>`.
    pub fn select_all(&self, events: &mut dyn EventSink) -> SelectionReport {
        let mut report = SelectionReport::new(SelectionMode::All);
        events.emit(SelectionEvent::SelectionStarted {
            mode: SelectionMode::All,
            total: 1,
        });
        events.emit(SelectionEvent::TaskStarted {
            position: 1,
            total: 1,
            value: None,
        });

        let output = self
            .target_name()
            .map(|name| OutputPath::new(&self.output_workspace, select_all_output_name(&name)));
        let (output, result) = match output {
            Ok(output) => {
                let result = self.run_unfiltered(&output);
                (Some(output), result)
            }
            Err(err) => (None, Err(err)),
        };

        self.record(&mut report, 1, 1, None, output, result, events);
        self.finish(report, events)
    }

    /// Select target features intersecting the rows where `field = value`.
    pub fn select_one(
        &self,
        field: &str,
        value: &FilterValue,
        append_target_name: bool,
        events: &mut dyn EventSink,
    ) -> SelectionReport {
        let mut report = SelectionReport::new(SelectionMode::One);
        events.emit(SelectionEvent::SelectionStarted {
            mode: SelectionMode::One,
            total: 1,
        });
        self.run_value_task(&mut report, field, value, 1, 1, append_target_name, events);
        self.finish(report, events)
    }

    /// One selection per value, continuing past failed values.
    pub fn select_many(
        &self,
        field: &str,
        values: &[FilterValue],
        append_target_name: bool,
        events: &mut dyn EventSink,
    ) -> SelectionReport {
        let total = values.len();
        let mut report = SelectionReport::new(SelectionMode::Many);
        events.emit(SelectionEvent::SelectionStarted {
            mode: SelectionMode::Many,
            total,
        });

        self.warn_collisions(values, append_target_name, events);

        for (index, value) in values.iter().enumerate() {
            self.run_value_task(
                &mut report,
                field,
                value,
                index + 1,
                total,
                append_target_name,
                events,
            );
        }

        self.finish(report, events)
    }

    fn pass_through(&self, kind: PassThroughKind, events: &mut dyn EventSink) -> SelectionReport {
        let mut report = SelectionReport::new(SelectionMode::PassThrough);
        report.skipped = Some(kind);
        events.emit(SelectionEvent::FilterSkipped { kind });
        report
    }

    #[allow(clippy::too_many_arguments)]
    fn run_value_task(
        &self,
        report: &mut SelectionReport,
        field: &str,
        value: &FilterValue,
        position: usize,
        total: usize,
        append_target_name: bool,
        events: &mut dyn EventSink,
    ) {
        events.emit(SelectionEvent::TaskStarted {
            position,
            total,
            value: Some(value.clone()),
        });

        let (output, result) = match self.value_output(value, append_target_name) {
            Ok(output) => {
                let result = self.run_filtered(field, value, &output);
                (Some(output), result)
            }
            Err(err) => (None, Err(err)),
        };

        self.record(report, position, total, Some(value.clone()), output, result, events);
    }

    fn value_output(&self, value: &FilterValue, append_target_name: bool) -> Result<OutputPath> {
        let name = if append_target_name {
            value_output_name(value, Some(&self.target_name()?))
        } else {
            value_output_name(value, None)
        };
        Ok(OutputPath::new(&self.output_workspace, name))
    }

    fn run_filtered(
        &self,
        field: &str,
        value: &FilterValue,
        output: &OutputPath,
    ) -> Result<CopiedDataset> {
        let clause = WhereClause::equals(field, value)?;
        debug!("Filtering {} with {}", self.selecting, clause);

        let view = self
            .engine
            .make_attribute_filtered_view(self.env, &self.selecting, &clause)
            .map_err(SelectError::stage(SelectionStage::FilterView))?;

        let selection = self
            .engine
            .select_by_location(
                self.env,
                &self.target,
                OverlapType::Intersect,
                SelectingFeatures::View(&view),
            )
            .map_err(SelectError::stage(SelectionStage::SpatialSelect))?;

        self.engine
            .copy_features(self.env, &selection, output)
            .map_err(SelectError::stage(SelectionStage::Copy))
    }

    fn run_unfiltered(&self, output: &OutputPath) -> Result<CopiedDataset> {
        let selection = self
            .engine
            .select_by_location(
                self.env,
                &self.target,
                OverlapType::Intersect,
                SelectingFeatures::Dataset(&self.selecting),
            )
            .map_err(SelectError::stage(SelectionStage::SpatialSelect))?;

        self.engine
            .copy_features(self.env, &selection, output)
            .map_err(SelectError::stage(SelectionStage::Copy))
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        report: &mut SelectionReport,
        position: usize,
        total: usize,
        value: Option<FilterValue>,
        output: Option<OutputPath>,
        result: Result<CopiedDataset>,
        events: &mut dyn EventSink,
    ) {
        match &result {
            Ok(copied) => events.emit(SelectionEvent::TaskCompleted {
                position,
                total,
                value: value.clone(),
                output: copied.path.clone(),
                rows: copied.rows,
            }),
            Err(err) => events.emit(SelectionEvent::TaskFailed {
                position,
                total,
                value: value.clone(),
                message: err.to_string(),
            }),
        }

        report.outcomes.push(TaskOutcome {
            position,
            value,
            output,
            result,
        });
    }

    fn finish(&self, report: SelectionReport, events: &mut dyn EventSink) -> SelectionReport {
        events.emit(SelectionEvent::SelectionFinished {
            succeeded: report.succeeded(),
            failed: report.failed(),
        });
        report
    }

    fn warn_collisions(
        &self,
        values: &[FilterValue],
        append_target_name: bool,
        events: &mut dyn EventSink,
    ) {
        let target_name = if append_target_name {
            match self.target_name() {
                Ok(name) => Some(name),
                // Each task reports the describe failure itself.
                Err(_) => return,
            }
        } else {
            None
        };

        for (name, values) in find_collisions(values, target_name.as_deref()) {
            events.emit(SelectionEvent::NameCollision { name, values });
        }
    }

    /// Target dataset name, described once and cached on success.
    fn target_name(&self) -> Result<String> {
        if let Some(name) = self.target_name.borrow().as_ref() {
            return Ok(name.clone());
        }
        let description = self.engine.describe(self.env, &self.target)?;
        *self.target_name.borrow_mut() = Some(description.name.clone());
        Ok(description.name)
    }
}
