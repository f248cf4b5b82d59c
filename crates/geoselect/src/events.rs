//! Progress and outcome events emitted by the collector and selector.
//!
//! The pipeline never logs directly; it emits [`SelectionEvent`]s into an
//! [`EventSink`] and the caller decides how to render them.

use crate::selector::PassThroughKind;
use crate::value::FilterValue;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// Which selection operation is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    All,
    One,
    Many,
    PassThrough,
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SelectionMode::All => "no definition query",
            SelectionMode::One => "single value",
            SelectionMode::Many => "value set",
            SelectionMode::PassThrough => "pass-through",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SelectionEvent {
    CollectionStarted {
        dataset: String,
        field: String,
    },
    CollectionCompleted {
        dataset: String,
        field: String,
        rows_scanned: u64,
        distinct: usize,
    },
    SelectionStarted {
        mode: SelectionMode,
        total: usize,
    },
    TaskStarted {
        position: usize,
        total: usize,
        value: Option<FilterValue>,
    },
    TaskCompleted {
        position: usize,
        total: usize,
        value: Option<FilterValue>,
        output: PathBuf,
        rows: u64,
    },
    TaskFailed {
        position: usize,
        total: usize,
        value: Option<FilterValue>,
        message: String,
    },
    FilterSkipped {
        kind: PassThroughKind,
    },
    NameCollision {
        name: String,
        values: Vec<FilterValue>,
    },
    SelectionFinished {
        succeeded: usize,
        failed: usize,
    },
}

impl SelectionEvent {
    /// Events that belong on the warning channel.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            SelectionEvent::TaskFailed { .. } | SelectionEvent::NameCollision { .. }
        )
    }
}

fn quoted(value: &Option<FilterValue>) -> String {
    match value {
        Some(value) => format!(" '{}'", value),
        None => String::new(),
    }
}

impl fmt::Display for SelectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionEvent::CollectionStarted { dataset, field } => {
                write!(f, "Building Row Value Set from {} field '{}'", dataset, field)
            }
            SelectionEvent::CollectionCompleted {
                rows_scanned,
                distinct,
                ..
            } => write!(
                f,
                "Row Value Set Built: {} rows scanned, {} distinct values",
                rows_scanned, distinct
            ),
            SelectionEvent::SelectionStarted { mode, total } => write!(
                f,
                "Initiating Intersect Selection Module ({}, {} task{})",
                mode,
                total,
                if *total == 1 { "" } else { "s" }
            ),
            SelectionEvent::TaskStarted {
                position,
                total,
                value,
            } => write!(
                f,
                "Processing{} Spatial Selection ({} of {})",
                quoted(value),
                position,
                total
            ),
            SelectionEvent::TaskCompleted {
                value,
                output,
                rows,
                ..
            } => write!(
                f,
                "Completed{} Spatial Selection -> {} ({} features)",
                quoted(value),
                output.display(),
                rows
            ),
            SelectionEvent::TaskFailed { value, message, .. } => write!(
                f,
                "A process error occurred during{} Spatial Selection: {}",
                quoted(value),
                message
            ),
            SelectionEvent::FilterSkipped { kind } => write!(
                f,
                "Definition query of kind {} is passed through; no selection performed",
                kind
            ),
            SelectionEvent::NameCollision { name, values } => {
                let listed: Vec<String> = values.iter().map(|v| format!("'{}'", v)).collect();
                write!(
                    f,
                    "Values {} all map to output '{}'; the last one processed overwrites the others",
                    listed.join(", "),
                    name
                )
            }
            SelectionEvent::SelectionFinished { succeeded, failed } => write!(
                f,
                "Intersect Selection finished: {} succeeded, {} failed",
                succeeded, failed
            ),
        }
    }
}

/// Receiver for pipeline events.
pub trait EventSink {
    fn emit(&mut self, event: SelectionEvent);
}

impl EventSink for Vec<SelectionEvent> {
    fn emit(&mut self, event: SelectionEvent) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: SelectionEvent) {
        (**self).emit(event);
    }
}

/// Renders events as `tracing` records: warnings at WARN, the rest at INFO.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: SelectionEvent) {
        if event.is_warning() {
            warn!("{}", event);
        } else {
            info!("{}", event);
        }
    }
}

/// Adapts a closure into an [`EventSink`].
pub struct FnSink<F>(pub F);

impl<F: FnMut(SelectionEvent)> EventSink for FnSink<F> {
    fn emit(&mut self, event: SelectionEvent) {
        (self.0)(event);
    }
}

/// Forwards every event to two sinks, in order.
#[derive(Debug, Default)]
pub struct Tee<A, B>(pub A, pub B);

impl<A: EventSink, B: EventSink> EventSink for Tee<A, B> {
    fn emit(&mut self, event: SelectionEvent) {
        self.0.emit(event.clone());
        self.1.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_messages() {
        let started = SelectionEvent::TaskStarted {
            position: 2,
            total: 100,
            value: Some(FilterValue::from("Wake")),
        };
        assert_eq!(
            started.to_string(),
            "Processing 'Wake' Spatial Selection (2 of 100)"
        );

        let failed = SelectionEvent::TaskFailed {
            position: 1,
            total: 1,
            value: None,
            message: "copy features failed: locked".to_string(),
        };
        assert!(failed.is_warning());
        assert_eq!(
            failed.to_string(),
            "A process error occurred during Spatial Selection: copy features failed: locked"
        );
    }

    #[test]
    fn test_tee_delivers_to_both() {
        let mut tee = Tee(Vec::new(), Vec::new());
        tee.emit(SelectionEvent::FilterSkipped {
            kind: PassThroughKind::Range,
        });
        assert_eq!(tee.0.len(), 1);
        assert_eq!(tee.0, tee.1);
    }

    #[test]
    fn test_closure_sink_counts_warnings() {
        let mut warnings = 0;
        let mut sink = FnSink(|event: SelectionEvent| {
            if event.is_warning() {
                warnings += 1;
            }
        });
        sink.emit(SelectionEvent::NameCollision {
            name: "A_B".to_string(),
            values: vec![FilterValue::from("A B"), FilterValue::from("A-B")],
        });
        sink.emit(SelectionEvent::SelectionFinished {
            succeeded: 2,
            failed: 0,
        });
        drop(sink);
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_events_serialize_with_tag() {
        let event = SelectionEvent::CollectionCompleted {
            dataset: "counties".to_string(),
            field: "NAME".to_string(),
            rows_scanned: 120,
            distinct: 100,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "collection_completed");
        assert_eq!(json["distinct"], 100);
    }
}
