//! In-memory [`GeoEngine`] with envelope geometries and failure injection.

use geoselect::{
    CopiedDataset, DatasetDescription, DatasetRef, EngineEnv, EngineError, FilterValue,
    GeoEngine, OutputPath, OverlapType, SelectingFeatures, WhereClause,
};
use geoselect::engine::AttributeCursor;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Axis-aligned bounding box; the only geometry this engine knows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Shares at least one point, touching edges included.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: u64,
    pub attributes: BTreeMap<String, FilterValue>,
    pub geometry: Envelope,
}

impl Feature {
    pub fn new(id: u64, geometry: Envelope) -> Self {
        Self {
            id,
            attributes: BTreeMap::new(),
            geometry,
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<FilterValue>) -> Self {
        self.attributes.insert(field.to_string(), value.into());
        self
    }

    fn value(&self, field: &str) -> FilterValue {
        self.attributes
            .get(field)
            .cloned()
            .unwrap_or(FilterValue::Null)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    pub name: String,
    pub fields: BTreeSet<String>,
    pub features: Vec<Feature>,
}

/// Every engine call, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    OpenCursor { dataset: String, field: String },
    Describe { dataset: String },
    MakeView { dataset: String, where_clause: String },
    SelectByLocation { target: String, filtered: bool },
    CopyFeatures { output: PathBuf },
}

/// What a copy left behind at one output path.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOutput {
    pub features: Vec<Feature>,
    /// How many copies wrote this path.
    pub writes: usize,
}

impl StoredOutput {
    pub fn ids(&self) -> Vec<u64> {
        self.features.iter().map(|f| f.id).collect()
    }
}

#[derive(Debug, Default)]
struct Faults {
    copy_to: BTreeSet<String>,
    view_for: BTreeSet<String>,
    describe: bool,
    cursor_after: Option<(String, usize)>,
}

/// Engine holding datasets in memory. Outputs are recorded, not written.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    datasets: BTreeMap<String, MemoryDataset>,
    outputs: RefCell<BTreeMap<PathBuf, StoredOutput>>,
    calls: RefCell<Vec<EngineCall>>,
    faults: Faults,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset under `key` (what a [`DatasetRef`] names).
    pub fn with_dataset(
        mut self,
        key: &str,
        name: &str,
        fields: &[&str],
        features: Vec<Feature>,
    ) -> Self {
        self.datasets.insert(
            key.to_string(),
            MemoryDataset {
                name: name.to_string(),
                fields: fields.iter().map(|f| f.to_string()).collect(),
                features,
            },
        );
        self
    }

    /// Fail copies whose output name is `name`.
    pub fn fail_copy_to(mut self, name: &str) -> Self {
        self.faults.copy_to.insert(name.to_string());
        self
    }

    /// Fail filtered-view creation for this exact where clause.
    pub fn fail_view_for(mut self, where_clause: &str) -> Self {
        self.faults.view_for.insert(where_clause.to_string());
        self
    }

    pub fn fail_describe(mut self) -> Self {
        self.faults.describe = true;
        self
    }

    /// Cursors on `dataset` error after yielding `rows` rows.
    pub fn fail_cursor_after(mut self, dataset: &str, rows: usize) -> Self {
        self.faults.cursor_after = Some((dataset.to_string(), rows));
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.borrow().clone()
    }

    pub fn outputs(&self) -> BTreeMap<PathBuf, StoredOutput> {
        self.outputs.borrow().clone()
    }

    pub fn output(&self, path: &Path) -> Option<StoredOutput> {
        self.outputs.borrow().get(path).cloned()
    }

    fn record(&self, call: EngineCall) {
        debug!("memory engine call: {:?}", call);
        self.calls.borrow_mut().push(call);
    }

    fn dataset(&self, dataset: &DatasetRef) -> Result<&MemoryDataset, EngineError> {
        self.datasets
            .get(dataset.as_str())
            .ok_or_else(|| EngineError::new(format!("Dataset not found: {}", dataset)))
    }

    fn require_field(&self, data: &MemoryDataset, field: &str) -> Result<(), EngineError> {
        if data.fields.contains(field) {
            Ok(())
        } else {
            Err(EngineError::new(format!(
                "Field '{}' does not exist in {}",
                field, data.name
            )))
        }
    }
}

/// Parsed form of the two where-clause shapes the engine understands.
enum Condition {
    Equals { field: String, literal: String },
    IsNull { field: String },
}

impl Condition {
    fn parse(clause: &str) -> Result<Self, EngineError> {
        let malformed = || EngineError::new(format!("Malformed where clause: {}", clause));

        if let Some(field) = clause.strip_suffix(" IS NULL") {
            return Ok(Condition::IsNull {
                field: field.trim().to_string(),
            });
        }

        let (field, rest) = clause.split_once(" = ").ok_or_else(malformed)?;
        let literal = rest
            .trim()
            .strip_prefix('\'')
            .and_then(|r| r.strip_suffix('\''))
            .ok_or_else(malformed)?;
        if literal.contains('\'') {
            return Err(malformed());
        }

        Ok(Condition::Equals {
            field: field.trim().to_string(),
            literal: literal.to_string(),
        })
    }

    fn field(&self) -> &str {
        match self {
            Condition::Equals { field, .. } | Condition::IsNull { field } => field,
        }
    }

    fn matches(&self, feature: &Feature) -> bool {
        let value = feature.value(self.field());
        match self {
            Condition::IsNull { .. } => value.is_null(),
            Condition::Equals { literal, .. } => {
                !value.is_null() && value.predicate_text() == *literal
            }
        }
    }
}

impl GeoEngine for MemoryEngine {
    type View = Vec<Feature>;
    type Selection = Vec<Feature>;

    fn open_attribute_cursor<'a>(
        &'a self,
        _env: &EngineEnv,
        dataset: &DatasetRef,
        field: &str,
    ) -> Result<AttributeCursor<'a>, EngineError> {
        self.record(EngineCall::OpenCursor {
            dataset: dataset.to_string(),
            field: field.to_string(),
        });
        let data = self.dataset(dataset)?;
        self.require_field(data, field)?;

        let limit = match &self.faults.cursor_after {
            Some((name, rows)) if name == dataset.as_str() => Some(*rows),
            _ => None,
        };

        let field = field.to_string();
        let rows = data.features.iter().enumerate().map(move |(index, feature)| {
            if limit.is_some_and(|limit| index >= limit) {
                return Err(EngineError::new(format!(
                    "Cursor failed after {} rows",
                    index
                )));
            }
            Ok(feature.value(&field))
        });
        Ok(Box::new(rows))
    }

    fn describe(
        &self,
        _env: &EngineEnv,
        dataset: &DatasetRef,
    ) -> Result<DatasetDescription, EngineError> {
        self.record(EngineCall::Describe {
            dataset: dataset.to_string(),
        });
        if self.faults.describe {
            return Err(EngineError::new(format!("Cannot describe {}", dataset)));
        }
        let data = self.dataset(dataset)?;
        Ok(DatasetDescription {
            name: data.name.clone(),
            geometry_type: Some("Polygon".to_string()),
        })
    }

    fn make_attribute_filtered_view(
        &self,
        _env: &EngineEnv,
        dataset: &DatasetRef,
        where_clause: &WhereClause,
    ) -> Result<Self::View, EngineError> {
        self.record(EngineCall::MakeView {
            dataset: dataset.to_string(),
            where_clause: where_clause.to_string(),
        });
        if self.faults.view_for.contains(where_clause.as_str()) {
            return Err(EngineError::new(format!(
                "Dataset is locked: cannot create view [{}]",
                where_clause
            )));
        }

        let data = self.dataset(dataset)?;
        let condition = Condition::parse(where_clause.as_str())?;
        self.require_field(data, condition.field())?;

        Ok(data
            .features
            .iter()
            .filter(|feature| condition.matches(feature))
            .cloned()
            .collect())
    }

    fn select_by_location(
        &self,
        _env: &EngineEnv,
        target: &DatasetRef,
        overlap: OverlapType,
        selecting: SelectingFeatures<'_, Self::View>,
    ) -> Result<Self::Selection, EngineError> {
        let filtered = matches!(selecting, SelectingFeatures::View(_));
        self.record(EngineCall::SelectByLocation {
            target: target.to_string(),
            filtered,
        });

        let target_data = self.dataset(target)?;
        let boundaries: &[Feature] = match selecting {
            SelectingFeatures::Dataset(dataset) => &self.dataset(dataset)?.features,
            SelectingFeatures::View(view) => view,
        };

        let OverlapType::Intersect = overlap;
        Ok(target_data
            .features
            .iter()
            .filter(|feature| {
                boundaries
                    .iter()
                    .any(|boundary| feature.geometry.intersects(&boundary.geometry))
            })
            .cloned()
            .collect())
    }

    fn copy_features(
        &self,
        env: &EngineEnv,
        selection: &Self::Selection,
        output: &OutputPath,
    ) -> Result<CopiedDataset, EngineError> {
        let path = output.path();
        self.record(EngineCall::CopyFeatures {
            output: path.clone(),
        });

        if self.faults.copy_to.contains(output.name()) {
            return Err(EngineError::new(format!("Disk full writing {}", output)));
        }

        let mut outputs = self.outputs.borrow_mut();
        if outputs.contains_key(&path) && !env.overwrite_output {
            return Err(EngineError::new(format!("{} already exists", output)));
        }

        let writes = outputs.get(&path).map_or(0, |stored| stored.writes) + 1;
        outputs.insert(
            path.clone(),
            StoredOutput {
                features: selection.clone(),
                writes,
            },
        );

        Ok(CopiedDataset {
            path,
            rows: selection.len() as u64,
        })
    }
}
