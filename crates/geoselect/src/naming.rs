//! Output naming convention.
//!
//! Output datasets are named after the filter value with ` `, `-` and `.`
//! replaced by `_`. Any other character is kept as-is; engines reject
//! names they cannot store when the copy runs.

use crate::value::FilterValue;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Prefix of the output written by an unfiltered selection.
pub const SELECT_ALL_PREFIX: &str = "Selection_";

/// Replace space, hyphen and period with underscore.
pub fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|ch| match ch {
            ' ' | '-' | '.' => '_',
            other => other,
        })
        .collect()
}

/// Output name for one filter value.
///
/// With `append_to = Some(target_name)` the target dataset's name is
/// appended after an underscore (the target name itself is not sanitized).
pub fn value_output_name(value: &FilterValue, append_to: Option<&str>) -> String {
    let base = sanitize_name(&value.predicate_text());
    match append_to {
        Some(target_name) => format!("{}_{}", base, target_name),
        None => base,
    }
}

/// Output name for an unfiltered selection: `Selection_<target>`.
pub fn select_all_output_name(target_name: &str) -> String {
    format!("{}{}", SELECT_ALL_PREFIX, target_name)
}

/// Location of one output dataset inside the output workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OutputPath {
    workspace: PathBuf,
    name: String,
}

impl OutputPath {
    pub fn new(workspace: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            name: name.into(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `workspace/name`
    pub fn path(&self) -> PathBuf {
        self.workspace.join(&self.name)
    }
}

impl fmt::Display for OutputPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

/// Output names shared by more than one value.
///
/// Each entry lists the values in processing order; the last one wins
/// because copies overwrite existing outputs.
pub fn find_collisions(
    values: &[FilterValue],
    append_to: Option<&str>,
) -> Vec<(String, Vec<FilterValue>)> {
    let mut by_name: BTreeMap<String, Vec<FilterValue>> = BTreeMap::new();
    for value in values {
        by_name
            .entry(value_output_name(value, append_to))
            .or_default()
            .push(value.clone());
    }
    by_name
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .collect()
}
