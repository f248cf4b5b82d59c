//! DuckDB engine backed by the `spatial` extension.
//!
//! Datasets are either tables of the source database or vector files
//! (`.shp`, `.geojson`, `.gpkg`, ...) read through `ST_Read`. Filtered
//! views and selections are temp views on the connection; outputs are
//! tables in the output workspace database, attached on first copy.

use super::lock::WorkspaceLock;
use super::{
    AttributeCursor, CopiedDataset, DatasetDescription, DatasetRef, EngineEnv, GeoEngine,
    OverlapType, SelectingFeatures,
};
use crate::error::EngineError;
use crate::naming::OutputPath;
use crate::predicate::WhereClause;
use crate::value::FilterValue;
use chrono::{DateTime, NaiveDateTime};
use duckdb::types::Value;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const OUTPUT_ALIAS: &str = "geoselect_out";
const FILTER_VIEW: &str = "geoselect_filter_view";
const SELECTION_VIEW: &str = "geoselect_selection";
const VECTOR_EXTENSIONS: &[&str] = &[
    "shp", "geojson", "json", "gpkg", "fgb", "kml", "gml", "gdb",
];

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn engine_err(message: impl Into<String>) -> impl FnOnce(duckdb::Error) -> EngineError {
    let message = message.into();
    move |err| EngineError::with_source(format!("{}: {}", message, err), err)
}

fn is_vector_file(dataset: &DatasetRef) -> bool {
    Path::new(dataset.as_str())
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VECTOR_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Output dataset names must be plain identifiers.
fn validate_output_name(name: &str) -> Result<(), EngineError> {
    if name.is_empty() {
        return Err(EngineError::new("output dataset name is empty"));
    }
    if let Some(bad) = name.chars().find(|c| !(c.is_alphanumeric() || *c == '_')) {
        return Err(EngineError::new(format!(
            "output dataset name '{}' contains invalid character {:?}",
            name, bad
        )));
    }
    Ok(())
}

/// Handle to an attribute-filtered temp view.
#[derive(Debug, Clone)]
pub struct DuckDbView {
    name: String,
}

/// Handle to a temp view of selected target features.
#[derive(Debug, Clone)]
pub struct DuckDbSelection {
    name: String,
}

pub struct DuckDbEngine {
    conn: duckdb::Connection,
    geometry_column: String,
    attached: RefCell<Option<PathBuf>>,
    _lock_guard: WorkspaceLock,
}

impl DuckDbEngine {
    /// Open the engine.
    ///
    /// `source_db` holds table datasets (in-memory when `None`). The output
    /// workspace is locked for the lifetime of the engine.
    pub fn open(
        source_db: Option<&Path>,
        output_workspace: &Path,
        geometry_column: &str,
    ) -> anyhow::Result<Self> {
        use anyhow::Context;

        if let Some(parent) = output_workspace.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create workspace directory: {}", parent.display())
                })?;
            }
        }

        let lock_guard = WorkspaceLock::acquire(output_workspace)?;

        let conn = match source_db {
            Some(path) => duckdb::Connection::open(path)
                .with_context(|| format!("Failed to open DuckDB database: {}", path.display()))?,
            None => duckdb::Connection::open_in_memory()
                .context("Failed to open in-memory DuckDB database")?,
        };
        conn.execute_batch("INSTALL spatial; LOAD spatial;")
            .context("Failed to load the DuckDB spatial extension")?;

        info!(
            "Opened DuckDB engine (source: {}, workspace: {})",
            source_db
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string()),
            output_workspace.display()
        );

        Ok(Self {
            conn,
            geometry_column: geometry_column.to_string(),
            attached: RefCell::new(None),
            _lock_guard: lock_guard,
        })
    }

    fn relation(&self, dataset: &DatasetRef) -> String {
        if is_vector_file(dataset) {
            format!("ST_Read({})", quote_literal(dataset.as_str()))
        } else {
            quote_ident(dataset.as_str())
        }
    }

    fn attach_workspace(&self, workspace: &Path) -> Result<(), EngineError> {
        let mut attached = self.attached.borrow_mut();
        if attached.as_deref() == Some(workspace) {
            return Ok(());
        }
        if attached.is_some() {
            self.conn
                .execute_batch(&format!("DETACH {}", OUTPUT_ALIAS))
                .map_err(engine_err("Failed to detach output workspace"))?;
            *attached = None;
        }

        let sql = format!(
            "ATTACH {} AS {}",
            quote_literal(&workspace.to_string_lossy()),
            OUTPUT_ALIAS
        );
        debug!("ATTACH: {}", sql);
        self.conn.execute_batch(&sql).map_err(engine_err(format!(
            "Failed to attach output workspace {}",
            workspace.display()
        )))?;
        *attached = Some(workspace.to_path_buf());
        Ok(())
    }
}

fn convert_value(value: Value, text: Option<String>) -> FilterValue {
    match value {
        Value::Null => FilterValue::Null,
        Value::TinyInt(v) => FilterValue::Integer(i64::from(v)),
        Value::SmallInt(v) => FilterValue::Integer(i64::from(v)),
        Value::Int(v) => FilterValue::Integer(i64::from(v)),
        Value::BigInt(v) => FilterValue::Integer(v),
        Value::UTinyInt(v) => FilterValue::Integer(i64::from(v)),
        Value::USmallInt(v) => FilterValue::Integer(i64::from(v)),
        Value::UInt(v) => FilterValue::Integer(i64::from(v)),
        Value::Float(v) => FilterValue::Float(f64::from(v)),
        Value::Double(v) => FilterValue::Float(v),
        Value::Text(v) => FilterValue::Text(v),
        Value::Date32(days) => DateTime::from_timestamp(i64::from(days) * 86_400, 0)
            .map(|dt| FilterValue::Date(dt.naive_utc()))
            .unwrap_or_else(|| FilterValue::from(text)),
        Value::Timestamp(_, _) => text
            .as_deref()
            .and_then(|t| NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S%.f").ok())
            .map(FilterValue::Date)
            .unwrap_or_else(|| FilterValue::from(text)),
        _ => FilterValue::from(text),
    }
}

impl GeoEngine for DuckDbEngine {
    type View = DuckDbView;
    type Selection = DuckDbSelection;

    fn open_attribute_cursor<'a>(
        &'a self,
        _env: &EngineEnv,
        dataset: &DatasetRef,
        field: &str,
    ) -> Result<AttributeCursor<'a>, EngineError> {
        let column = quote_ident(field);
        let sql = format!(
            "SELECT {col}, CAST({col} AS VARCHAR) FROM {rel}",
            col = column,
            rel = self.relation(dataset)
        );
        debug!("CURSOR: {}", sql);

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(engine_err(format!("Cannot read field '{}' of {}", field, dataset)))?;
        let rows = stmt
            .query_map([], |row| {
                let value: Value = row.get(0)?;
                let text: Option<String> = row.get(1)?;
                Ok(convert_value(value, text))
            })
            .map_err(engine_err(format!("Cannot read field '{}' of {}", field, dataset)))?;

        // The statement borrows the connection, so rows are drained here.
        let values: Vec<Result<FilterValue, EngineError>> = rows
            .map(|row| row.map_err(engine_err("Failed to read row")))
            .collect();
        Ok(Box::new(values.into_iter()))
    }

    fn describe(
        &self,
        _env: &EngineEnv,
        dataset: &DatasetRef,
    ) -> Result<DatasetDescription, EngineError> {
        let name = if is_vector_file(dataset) {
            let path = Path::new(dataset.as_str());
            if !path.exists() {
                return Err(EngineError::new(format!("Dataset not found: {}", dataset)));
            }
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(dataset.as_str())
                .to_string()
        } else {
            let exists: i64 = self
                .conn
                .query_row(
                    "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
                    [dataset.as_str()],
                    |row| row.get(0),
                )
                .map_err(engine_err(format!("Cannot describe {}", dataset)))?;
            if exists == 0 {
                return Err(EngineError::new(format!("Dataset not found: {}", dataset)));
            }
            dataset.as_str().to_string()
        };

        Ok(DatasetDescription {
            name,
            geometry_type: None,
        })
    }

    fn make_attribute_filtered_view(
        &self,
        _env: &EngineEnv,
        dataset: &DatasetRef,
        where_clause: &WhereClause,
    ) -> Result<Self::View, EngineError> {
        let sql = format!(
            "CREATE OR REPLACE TEMP VIEW {} AS SELECT * FROM {} WHERE {}",
            FILTER_VIEW,
            self.relation(dataset),
            where_clause
        );
        debug!("FILTER VIEW: {}", sql);
        self.conn
            .execute_batch(&sql)
            .map_err(engine_err(format!("Invalid where clause [{}]", where_clause)))?;
        Ok(DuckDbView {
            name: FILTER_VIEW.to_string(),
        })
    }

    fn select_by_location(
        &self,
        _env: &EngineEnv,
        target: &DatasetRef,
        overlap: OverlapType,
        selecting: SelectingFeatures<'_, Self::View>,
    ) -> Result<Self::Selection, EngineError> {
        let predicate = match overlap {
            OverlapType::Intersect => "ST_Intersects",
        };
        let selecting_rel = match selecting {
            SelectingFeatures::Dataset(dataset) => self.relation(dataset),
            SelectingFeatures::View(view) => view.name.clone(),
        };
        let geom = quote_ident(&self.geometry_column);
        let sql = format!(
            "CREATE OR REPLACE TEMP VIEW {sel} AS SELECT t.* FROM {target} AS t \
             WHERE EXISTS (SELECT 1 FROM {selecting} AS s WHERE {pred}(t.{geom}, s.{geom}))",
            sel = SELECTION_VIEW,
            target = self.relation(target),
            selecting = selecting_rel,
            pred = predicate,
            geom = geom,
        );
        debug!("SELECT BY LOCATION ({}): {}", overlap.as_str(), sql);
        self.conn
            .execute_batch(&sql)
            .map_err(engine_err(format!("Select by location on {} failed", target)))?;
        Ok(DuckDbSelection {
            name: SELECTION_VIEW.to_string(),
        })
    }

    fn copy_features(
        &self,
        env: &EngineEnv,
        selection: &Self::Selection,
        output: &OutputPath,
    ) -> Result<CopiedDataset, EngineError> {
        validate_output_name(output.name())?;
        self.attach_workspace(output.workspace())?;

        let table = format!("{}.{}", OUTPUT_ALIAS, quote_ident(output.name()));
        let create = if env.overwrite_output {
            "CREATE OR REPLACE TABLE"
        } else {
            "CREATE TABLE"
        };
        let sql = format!("{} {} AS SELECT * FROM {}", create, table, selection.name);
        debug!("COPY: {}", sql);
        self.conn
            .execute_batch(&sql)
            .map_err(engine_err(format!("Failed to write {}", output)))?;

        let rows: i64 = self
            .conn
            .query_row(&format!("SELECT count(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .map_err(engine_err(format!("Failed to count rows of {}", output)))?;

        Ok(CopiedDataset {
            path: output.path(),
            rows: rows.max(0) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_files_use_st_read() {
        assert!(is_vector_file(&DatasetRef::from("data/counties.shp")));
        assert!(is_vector_file(&DatasetRef::from("data/Counties.GeoJSON")));
        assert!(!is_vector_file(&DatasetRef::from("buildings")));
    }

    #[test]
    fn test_quote_helpers() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_output_name_validation() {
        assert!(validate_output_name("Wake_County_Buildings").is_ok());
        assert!(validate_output_name("37183").is_ok());
        assert!(validate_output_name("St/Louis").is_err());
        assert!(validate_output_name("").is_err());
    }

    #[test]
    fn test_convert_value() {
        assert_eq!(convert_value(Value::Int(7), None), FilterValue::Integer(7));
        assert_eq!(
            convert_value(Value::Text("Wake".to_string()), None),
            FilterValue::from("Wake")
        );
        assert_eq!(convert_value(Value::Null, None), FilterValue::Null);
        let date = convert_value(Value::Date32(1), None);
        assert_eq!(date.predicate_text(), "1970-01-02 00:00:00");
    }

    #[test]
    fn test_out_of_range_date_keeps_its_text() {
        let value = convert_value(Value::Date32(i32::MAX), Some("5881580-07-11".to_string()));
        assert_eq!(value, FilterValue::from("5881580-07-11"));
    }

    fn county_tables(engine: &DuckDbEngine) {
        engine
            .conn
            .execute_batch(
                "CREATE TABLE counties AS SELECT * FROM (VALUES \
                   ('Wake', ST_MakeEnvelope(0, 0, 10, 10)), \
                   ('Durham', ST_MakeEnvelope(20, 0, 30, 10))) AS v(\"NAME\", geom); \
                 CREATE TABLE buildings AS SELECT * FROM (VALUES \
                   (1, ST_MakeEnvelope(1, 1, 2, 2)), \
                   (2, ST_MakeEnvelope(21, 1, 22, 2)), \
                   (3, ST_MakeEnvelope(50, 50, 51, 51))) AS v(id, geom);",
            )
            .unwrap();
    }

    #[test]
    fn test_select_and_copy_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("work.duckdb");
        let engine = DuckDbEngine::open(None, &workspace, "geom").unwrap();
        county_tables(&engine);

        let env = EngineEnv::default();
        let counties = DatasetRef::from("counties");
        let buildings = DatasetRef::from("buildings");

        let mut names: Vec<FilterValue> = engine
            .open_attribute_cursor(&env, &counties, "NAME")
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        names.sort();
        assert_eq!(names, vec![FilterValue::from("Durham"), FilterValue::from("Wake")]);

        assert_eq!(engine.describe(&env, &buildings).unwrap().name, "buildings");
        assert!(engine.describe(&env, &DatasetRef::from("roads")).is_err());

        let clause = WhereClause::equals("NAME", &FilterValue::from("Wake")).unwrap();
        let view = engine
            .make_attribute_filtered_view(&env, &counties, &clause)
            .unwrap();
        let selection = engine
            .select_by_location(
                &env,
                &buildings,
                OverlapType::Intersect,
                SelectingFeatures::View(&view),
            )
            .unwrap();
        let output = OutputPath::new(&workspace, "Wake_buildings");
        let copied = engine.copy_features(&env, &selection, &output).unwrap();
        assert_eq!(copied.rows, 1);
        assert_eq!(copied.path, output.path());

        let selection = engine
            .select_by_location(
                &env,
                &buildings,
                OverlapType::Intersect,
                SelectingFeatures::Dataset(&counties),
            )
            .unwrap();
        let all = OutputPath::new(&workspace, "Selection_buildings");
        assert_eq!(engine.copy_features(&env, &selection, &all).unwrap().rows, 2);

        let keep = EngineEnv {
            overwrite_output: false,
        };
        assert!(engine.copy_features(&keep, &selection, &output).is_err());
        assert_eq!(engine.copy_features(&env, &selection, &output).unwrap().rows, 2);
    }

    #[test]
    fn test_second_engine_on_workspace_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("work.duckdb");
        let _engine = DuckDbEngine::open(None, &workspace, "geom").unwrap();
        let err = DuckDbEngine::open(None, &workspace, "geom").err().unwrap();
        assert!(err.to_string().contains("locked by another writer"));
    }
}
