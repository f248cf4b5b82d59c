//! GeoSelect command-line entry point
//!
//! ```text
//! geoselect NC_BUILDING_FP data/nc_counties.shp NAME out/work.duckdb --append-target-name
//! ```

use clap::Parser;
use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    let args = cli::Args::parse();
    let json = args.json;

    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json {
                cli::output::print_json_error(&err);
            } else {
                eprintln!("Error: {:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
