//! Terminal progress bar driven by selection events.

use geoselect::{EventSink, SelectionEvent};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Renders collection as a spinner and selection tasks as a bar.
pub struct ProgressSink {
    bar: ProgressBar,
}

impl ProgressSink {
    /// A hidden sink draws nothing (JSON mode or non-terminal stderr).
    pub fn new(hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr())
        };
        Self { bar }
    }

    pub fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn spinner(&self, message: String) {
        self.bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        self.bar.set_message(message);
        self.bar.enable_steady_tick(Duration::from_millis(120));
    }

    fn tasks(&self, total: usize) {
        self.bar.disable_steady_tick();
        self.bar.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
    }
}

impl EventSink for ProgressSink {
    fn emit(&mut self, event: SelectionEvent) {
        match &event {
            SelectionEvent::CollectionStarted { .. } => self.spinner(event.to_string()),
            SelectionEvent::SelectionStarted { total, .. } => self.tasks(*total),
            SelectionEvent::TaskStarted { value, .. } => {
                let label = value
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "all features".to_string());
                self.bar.set_message(label);
            }
            SelectionEvent::TaskCompleted { .. } => self.bar.inc(1),
            SelectionEvent::TaskFailed { .. } | SelectionEvent::NameCollision { .. } => {
                // Warnings stay visible above the bar.
                self.bar.println(event.to_string());
                if matches!(event, SelectionEvent::TaskFailed { .. }) {
                    self.bar.inc(1);
                }
            }
            SelectionEvent::SelectionFinished { .. } | SelectionEvent::FilterSkipped { .. } => {
                self.finish()
            }
            SelectionEvent::CollectionCompleted { .. } => {}
        }
    }
}
