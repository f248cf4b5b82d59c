//! End-to-end runs driven by a resolved configuration.

use geoselect::config::ConfigValue;
use geoselect::{
    run_selection, EngineEnv, FilterValue, RunSettings, SelectError, SelectionEvent,
    SelectionMode, Tee,
};
use geoselect_test_utils::fixtures::{self, BUILDINGS, COUNTIES, NAME_FIELD, WORKSPACE};
use std::path::{Path, PathBuf};

fn settings() -> RunSettings {
    RunSettings {
        target: Some(BUILDINGS.to_string()),
        selecting: Some(COUNTIES.to_string()),
        output_workspace: Some(PathBuf::from(WORKSPACE)),
        ..RunSettings::default()
    }
}

#[test]
fn test_collects_then_selects_every_value() {
    let engine = fixtures::county_engine();
    let env = EngineEnv::default();
    let config = RunSettings {
        field: Some(NAME_FIELD.to_string()),
        append_target_name: Some(true),
        ..settings()
    }
    .resolve()
    .unwrap();
    let mut events = Vec::new();

    let report = run_selection(&engine, &env, &config, &mut events).unwrap();

    assert_eq!(report.mode, SelectionMode::Many);
    assert_eq!(report.task_count(), 4);
    assert_eq!(report.succeeded(), 4);
    assert_eq!(
        report.outputs(),
        vec![
            Path::new(WORKSPACE).join("NULL_Buildings").as_path(),
            Path::new(WORKSPACE).join("Durham_Buildings").as_path(),
            Path::new(WORKSPACE).join("Orange_Buildings").as_path(),
            Path::new(WORKSPACE).join("Wake_Buildings").as_path(),
        ]
    );

    assert!(matches!(events[0], SelectionEvent::CollectionStarted { .. }));
    assert!(matches!(
        events[1],
        SelectionEvent::CollectionCompleted { distinct: 4, .. }
    ));
    assert!(matches!(
        events.last(),
        Some(SelectionEvent::SelectionFinished {
            succeeded: 4,
            failed: 0
        })
    ));
}

#[test]
fn test_explicit_single_value_skips_collection() {
    let engine = fixtures::county_engine();
    let env = EngineEnv::default();
    let config = RunSettings {
        field: Some(NAME_FIELD.to_string()),
        values: vec![ConfigValue::Text("Orange".to_string())],
        ..settings()
    }
    .resolve()
    .unwrap();
    let mut events = Vec::new();

    let report = run_selection(&engine, &env, &config, &mut events).unwrap();

    assert_eq!(report.mode, SelectionMode::One);
    assert_eq!(report.outcomes[0].value, Some(FilterValue::from("Orange")));
    assert!(!events
        .iter()
        .any(|e| matches!(e, SelectionEvent::CollectionStarted { .. })));
}

#[test]
fn test_no_field_selects_all() {
    let engine = fixtures::county_engine();
    let env = EngineEnv::default();
    let config = settings().resolve().unwrap();

    let report = run_selection(&engine, &env, &config, &mut Vec::new()).unwrap();

    assert_eq!(report.mode, SelectionMode::All);
    assert!(engine
        .output(&Path::new(WORKSPACE).join("Selection_Buildings"))
        .is_some());
}

#[test]
fn test_collection_failure_aborts_run() {
    let engine = fixtures::county_engine().fail_cursor_after(COUNTIES, 3);
    let env = EngineEnv::default();
    let config = RunSettings {
        field: Some(NAME_FIELD.to_string()),
        ..settings()
    }
    .resolve()
    .unwrap();

    let result = run_selection(&engine, &env, &config, &mut Vec::new());

    assert!(matches!(result, Err(SelectError::Collection { .. })));
    assert!(engine.outputs().is_empty());
}

#[test]
fn test_tee_feeds_both_sinks() {
    let engine = fixtures::county_engine();
    let env = EngineEnv::default();
    let config = settings().resolve().unwrap();
    let mut first = Vec::new();
    let mut second = Vec::new();

    run_selection(
        &engine,
        &env,
        &config,
        &mut Tee(&mut first, &mut second),
    )
    .unwrap();

    assert!(!first.is_empty());
    assert_eq!(first, second);
}
