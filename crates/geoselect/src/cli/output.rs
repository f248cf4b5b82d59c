//! Report rendering: a table for people, JSON for scripts.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use geoselect::{RunConfig, SelectionReport, TaskOutcome};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct TaskJson {
    position: usize,
    value: Option<String>,
    output: Option<PathBuf>,
    rows: Option<u64>,
    error: Option<String>,
}

impl From<&TaskOutcome> for TaskJson {
    fn from(outcome: &TaskOutcome) -> Self {
        let (rows, error) = match &outcome.result {
            Ok(copied) => (Some(copied.rows), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Self {
            position: outcome.position,
            value: outcome.value.as_ref().map(|v| v.to_string()),
            output: outcome.output.as_ref().map(|o| o.path()),
            rows,
            error,
        }
    }
}

#[derive(Debug, Serialize)]
struct ReportJson<'a> {
    target: &'a str,
    selecting: &'a str,
    field: Option<&'a str>,
    mode: geoselect::SelectionMode,
    skipped: Option<geoselect::PassThroughKind>,
    succeeded: usize,
    failed: usize,
    log_file: &'a Path,
    tasks: Vec<TaskJson>,
}

fn status_cell(outcome: &TaskOutcome) -> Cell {
    match &outcome.result {
        Ok(_) => Cell::new("ok").fg(Color::Green),
        Err(err) => Cell::new(format!("failed: {}", err)).fg(Color::Red),
    }
}

/// Build the per-task summary table.
pub fn summary_table(report: &SelectionReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header: Vec<Cell> = ["#", "Value", "Output", "Features", "Status"]
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header);

    for outcome in &report.outcomes {
        table.add_row(vec![
            Cell::new(outcome.position),
            Cell::new(
                outcome
                    .value
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "(all)".to_string()),
            ),
            Cell::new(
                outcome
                    .output
                    .as_ref()
                    .map(|o| o.name().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(
                outcome
                    .result
                    .as_ref()
                    .map(|c| c.rows.to_string())
                    .unwrap_or_else(|_| "-".to_string()),
            ),
            status_cell(outcome),
        ]);
    }
    table
}

pub fn print_summary(report: &SelectionReport) {
    if let Some(kind) = report.skipped {
        println!("Definition query of kind {} passed through; nothing selected", kind);
        return;
    }
    if report.task_count() > 0 {
        println!("{}", summary_table(report));
    }
    println!(
        "{} of {} selections succeeded, {} failed",
        report.succeeded(),
        report.task_count(),
        report.failed()
    );
}

pub fn print_json_report(
    config: &RunConfig,
    report: &SelectionReport,
    log_file: &Path,
) -> anyhow::Result<()> {
    let json = ReportJson {
        target: &config.target,
        selecting: &config.selecting,
        field: config.field.as_deref(),
        mode: report.mode,
        skipped: report.skipped,
        succeeded: report.succeeded(),
        failed: report.failed(),
        log_file,
        tasks: report.outcomes.iter().map(TaskJson::from).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

pub fn print_json_error(err: &anyhow::Error) {
    let chain: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
    let json = serde_json::json!({
        "error": err.to_string(),
        "causes": chain,
    });
    println!("{}", json);
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoselect::{
        CopiedDataset, EngineError, FilterValue, OutputPath, SelectError, SelectionMode,
        SelectionStage,
    };

    fn report() -> SelectionReport {
        SelectionReport {
            mode: SelectionMode::Many,
            skipped: None,
            outcomes: vec![
                TaskOutcome {
                    position: 1,
                    value: Some(FilterValue::from("Wake")),
                    output: Some(OutputPath::new("out/work.duckdb", "Wake")),
                    result: Ok(CopiedDataset {
                        path: PathBuf::from("out/work.duckdb/Wake"),
                        rows: 42,
                    }),
                },
                TaskOutcome {
                    position: 2,
                    value: Some(FilterValue::from("Durham")),
                    output: Some(OutputPath::new("out/work.duckdb", "Durham")),
                    result: Err(SelectError::Selection {
                        stage: SelectionStage::Copy,
                        source: EngineError::new("disk full"),
                    }),
                },
            ],
        }
    }

    #[test]
    fn test_summary_table_lists_each_task() {
        let rendered = summary_table(&report()).to_string();
        assert!(rendered.contains("Wake"));
        assert!(rendered.contains("42"));
        assert!(rendered.contains("Durham"));
    }

    #[test]
    fn test_task_json_carries_error() {
        let report = report();
        let tasks: Vec<TaskJson> = report.outcomes.iter().map(TaskJson::from).collect();
        let json = serde_json::to_value(&tasks).unwrap();
        assert_eq!(json[0]["rows"], 42);
        assert!(json[0]["error"].is_null());
        assert_eq!(json[1]["error"], "copy features failed: disk full");
        assert_eq!(json[1]["value"], "Durham");
    }
}
