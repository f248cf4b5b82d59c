//! A small county/building layout shared by the integration tests.
//!
//! ```text
//!  y
//! 15 +----+
//!    |Wake|            (second Wake part)
//! 10 +----+----+----+
//!    |Wake|Durh|Oran|
//!  0 +----+----+----+
//!    0    10   20   30  x
//! ```
//!
//! Building 2 straddles the Wake/Durham edge, building 5 lies outside
//! every county, and county row 5 has a NULL name far from everything
//! except building 6.

use crate::engine::{Envelope, Feature, MemoryEngine};
use geoselect::FilterValue;

pub const COUNTIES: &str = "counties";
pub const COUNTIES_NAME: &str = "NC_Counties";
pub const BUILDINGS: &str = "buildings";
pub const BUILDINGS_NAME: &str = "Buildings";
pub const NAME_FIELD: &str = "NAME";
pub const FIPS_FIELD: &str = "FIPS";
pub const WORKSPACE: &str = "/out/work.duckdb";

pub fn counties() -> Vec<Feature> {
    vec![
        Feature::new(1, Envelope::new(0.0, 0.0, 10.0, 10.0))
            .with(NAME_FIELD, "Wake")
            .with(FIPS_FIELD, 37183),
        Feature::new(2, Envelope::new(10.0, 0.0, 20.0, 10.0))
            .with(NAME_FIELD, "Durham")
            .with(FIPS_FIELD, 37063),
        Feature::new(3, Envelope::new(20.0, 0.0, 30.0, 10.0))
            .with(NAME_FIELD, "Orange")
            .with(FIPS_FIELD, 37135),
        Feature::new(4, Envelope::new(0.0, 10.0, 5.0, 15.0))
            .with(NAME_FIELD, "Wake")
            .with(FIPS_FIELD, 37183),
        Feature::new(5, Envelope::new(40.0, 40.0, 50.0, 50.0))
            .with(NAME_FIELD, FilterValue::Null)
            .with(FIPS_FIELD, FilterValue::Null),
    ]
}

pub fn buildings() -> Vec<Feature> {
    vec![
        Feature::new(1, Envelope::new(1.0, 1.0, 2.0, 2.0)),
        Feature::new(2, Envelope::new(9.5, 1.0, 10.5, 2.0)),
        Feature::new(3, Envelope::new(15.0, 5.0, 16.0, 6.0)),
        Feature::new(4, Envelope::new(25.0, 5.0, 26.0, 6.0)),
        Feature::new(5, Envelope::new(100.0, 100.0, 101.0, 101.0)),
        Feature::new(6, Envelope::new(41.0, 41.0, 42.0, 42.0)),
        Feature::new(7, Envelope::new(1.0, 11.0, 2.0, 12.0)),
    ]
}

/// Engine loaded with [`counties`] and [`buildings`].
pub fn county_engine() -> MemoryEngine {
    MemoryEngine::new()
        .with_dataset(COUNTIES, COUNTIES_NAME, &[NAME_FIELD, FIPS_FIELD], counties())
        .with_dataset(BUILDINGS, BUILDINGS_NAME, &[], buildings())
}

/// Counties whose names collide once sanitized ("A B" and "A-B").
pub fn colliding_engine() -> MemoryEngine {
    let counties = vec![
        Feature::new(1, Envelope::new(0.0, 0.0, 10.0, 10.0)).with(NAME_FIELD, "A B"),
        Feature::new(2, Envelope::new(10.0, 0.0, 20.0, 10.0)).with(NAME_FIELD, "A-B"),
    ];
    MemoryEngine::new()
        .with_dataset(COUNTIES, COUNTIES_NAME, &[NAME_FIELD], counties)
        .with_dataset(BUILDINGS, BUILDINGS_NAME, &[], buildings())
}
