//! GeoSelect Test Utilities
//!
//! An in-memory [`GeoEngine`](geoselect::GeoEngine) for exercising the
//! collector and selector without a spatial database.
//!
//! # Usage
//!
//! ```rust,ignore
//! use geoselect::{EngineEnv, IntersectSelector};
//! use geoselect_test_utils::fixtures;
//!
//! let engine = fixtures::county_engine();
//! let env = EngineEnv::default();
//! let selector = IntersectSelector::new(
//!     &engine, &env,
//!     fixtures::BUILDINGS.into(), fixtures::COUNTIES.into(),
//!     fixtures::WORKSPACE,
//! );
//! let report = selector.select_all(&mut Vec::new());
//! assert_eq!(report.succeeded(), 1);
//! ```

pub mod engine;
pub mod fixtures;

pub use engine::{EngineCall, Envelope, Feature, MemoryDataset, MemoryEngine, StoredOutput};
