//! Command-line surface of the `geoselect` binary.

pub mod output;
#[cfg_attr(not(feature = "duckdb"), allow(dead_code))]
pub mod progress;

use anyhow::{Context, Result};
use clap::Parser;
use geoselect::config::ConfigValue;
use geoselect::{EngineEnv, RunConfig, RunSettings, SelectionReport};
use geoselect_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "geoselect",
    version,
    about = "Split a target dataset by the values of a field in a selecting dataset"
)]
pub struct Args {
    /// Dataset whose features are copied (table name or vector file)
    pub target: Option<String>,

    /// Dataset whose features bound each selection
    pub selecting: Option<String>,

    /// Field of the selecting dataset to iterate; "" selects by the whole dataset
    pub field: Option<String>,

    /// DuckDB database file receiving one table per value
    pub output_workspace: Option<PathBuf>,

    /// Append the target dataset's name to every output name
    #[arg(long)]
    pub append_target_name: bool,

    /// Select only these values (repeatable) instead of scanning the field
    #[arg(long = "value", value_name = "VALUE")]
    pub values: Vec<String>,

    /// TOML file with run settings; command-line values take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// DuckDB database holding table datasets
    #[arg(long)]
    pub source_db: Option<PathBuf>,

    /// Geometry column of table datasets
    #[arg(long)]
    pub geometry_column: Option<String>,

    /// Prefix of the log file name
    #[arg(long)]
    pub log_name: Option<String>,

    /// Fail a copy instead of replacing an existing output
    #[arg(long)]
    pub no_overwrite: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Args {
    /// Settings given on the command line, to be overlaid on the config file.
    fn settings(&self) -> RunSettings {
        RunSettings {
            target: self.target.clone(),
            selecting: self.selecting.clone(),
            field: self.field.clone(),
            output_workspace: self.output_workspace.clone(),
            append_target_name: self.append_target_name.then_some(true),
            // Values compare by their text form, so they stay text here.
            values: self.values.iter().cloned().map(ConfigValue::Text).collect(),
            log_name: self.log_name.clone(),
            source_db: self.source_db.clone(),
            geometry_column: self.geometry_column.clone(),
        }
    }

    fn resolve(&self) -> Result<RunConfig> {
        let file_settings = match &self.config {
            Some(path) => RunSettings::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => RunSettings::default(),
        };
        file_settings
            .merge(self.settings())
            .resolve()
            .context("Invalid run configuration")
    }
}

pub fn run(args: Args) -> Result<()> {
    let config = args.resolve()?;
    let env = EngineEnv {
        overwrite_output: !args.no_overwrite,
    };

    let run_log = init_logging(LogConfig {
        run_name: &config.log_name,
        output_workspace: &config.output_workspace,
        verbose: args.verbose,
        progress_mode: !args.verbose && !args.json,
    })?;

    info!("Log file: {}", run_log.path.display());
    info!(
        "Target: {} | Selecting: {} | Field: {} | Output workspace: {}",
        config.target,
        config.selecting,
        config.field.as_deref().unwrap_or("(none)"),
        config.output_workspace.display()
    );

    let report = execute(&config, &env, args.json)?;

    if args.json {
        output::print_json_report(&config, &report, &run_log.path)?;
    } else {
        output::print_summary(&report);
        println!("Log file: {}", run_log.path.display());
    }
    Ok(())
}

#[cfg(feature = "duckdb")]
fn execute(config: &RunConfig, env: &EngineEnv, quiet: bool) -> Result<SelectionReport> {
    use geoselect::engine::duckdb::DuckDbEngine;
    use geoselect::{run_selection, Tee, TracingSink};

    let engine = DuckDbEngine::open(
        config.source_db.as_deref(),
        &config.output_workspace,
        &config.geometry_column,
    )?;

    let mut progress = progress::ProgressSink::new(quiet);
    let report = run_selection(&engine, env, config, &mut Tee(TracingSink, &mut progress))
        .context("Selection aborted")?;
    progress.finish();
    Ok(report)
}

#[cfg(not(feature = "duckdb"))]
fn execute(_config: &RunConfig, _env: &EngineEnv, _quiet: bool) -> Result<SelectionReport> {
    anyhow::bail!(
        "geoselect was built without a spatial engine; rebuild with `--features duckdb`"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoselect::FilterValue;

    #[test]
    fn test_positional_arguments() {
        let args = Args::try_parse_from([
            "geoselect",
            "buildings",
            "counties.shp",
            "NAME",
            "out/work.duckdb",
            "--append-target-name",
        ])
        .unwrap();
        let config = args.resolve().unwrap();
        assert_eq!(config.target, "buildings");
        assert_eq!(config.field.as_deref(), Some("NAME"));
        assert!(config.append_target_name);
        assert!(config.values.is_empty());
    }

    #[test]
    fn test_empty_field_means_no_filter() {
        let args =
            Args::try_parse_from(["geoselect", "buildings", "counties", "", "out/work.duckdb"])
                .unwrap();
        assert_eq!(args.resolve().unwrap().field, None);
    }

    #[test]
    fn test_repeated_values() {
        let args = Args::try_parse_from([
            "geoselect",
            "buildings",
            "counties",
            "NAME",
            "out/work.duckdb",
            "--value",
            "Wake",
            "--value",
            "Durham",
        ])
        .unwrap();
        assert_eq!(
            args.resolve().unwrap().values,
            vec![FilterValue::from("Wake"), FilterValue::from("Durham")]
        );
    }

    #[test]
    fn test_config_file_fills_missing_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(
            &path,
            "target = \"buildings\"\nselecting = \"counties\"\nfield = \"NAME\"\noutput_workspace = \"out/work.duckdb\"\nappend_target_name = true\n",
        )
        .unwrap();

        let args =
            Args::try_parse_from(["geoselect", "--config", path.to_str().unwrap()]).unwrap();
        let config = args.resolve().unwrap();
        assert_eq!(config.selecting, "counties");
        assert!(config.append_target_name);
    }

    #[test]
    fn test_missing_workspace_is_an_error() {
        let args = Args::try_parse_from(["geoselect", "buildings", "counties"]).unwrap();
        assert!(args.resolve().is_err());
    }
}
