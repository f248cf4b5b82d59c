//! Attribute values read from the selecting dataset.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One value of the filter field, typed after the field's native type.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDateTime),
}

impl FilterValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Null)
    }

    /// String form used in attribute predicates and output names.
    ///
    /// Floats render in positional notation and always carry a fractional
    /// part (`3.0`, `10000000000000000.0`, `0.0000001`). Dates render as
    /// `YYYY-MM-DD HH:MM:SS`.
    pub fn predicate_text(&self) -> String {
        match self {
            FilterValue::Null => "NULL".to_string(),
            FilterValue::Text(text) => text.clone(),
            FilterValue::Integer(value) => value.to_string(),
            FilterValue::Float(value) => float_text(*value),
            FilterValue::Date(value) => value.format(DATE_FORMAT).to_string(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FilterValue::Null => 0,
            FilterValue::Integer(_) => 1,
            FilterValue::Float(_) => 2,
            FilterValue::Text(_) => 3,
            FilterValue::Date(_) => 4,
        }
    }
}

fn float_text(value: f64) -> String {
    // Display never switches to exponent form.
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.predicate_text())
    }
}

impl PartialEq for FilterValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FilterValue {}

impl PartialOrd for FilterValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FilterValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FilterValue::Null, FilterValue::Null) => Ordering::Equal,
            (FilterValue::Text(a), FilterValue::Text(b)) => a.cmp(b),
            (FilterValue::Integer(a), FilterValue::Integer(b)) => a.cmp(b),
            (FilterValue::Float(a), FilterValue::Float(b)) => a.total_cmp(b),
            (FilterValue::Date(a), FilterValue::Date(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for FilterValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            FilterValue::Null => {}
            FilterValue::Text(value) => value.hash(state),
            FilterValue::Integer(value) => value.hash(state),
            FilterValue::Float(value) => value.to_bits().hash(state),
            FilterValue::Date(value) => value.hash(state),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Integer(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<NaiveDateTime> for FilterValue {
    fn from(value: NaiveDateTime) -> Self {
        FilterValue::Date(value)
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(value: NaiveDate) -> Self {
        FilterValue::Date(value.and_time(chrono::NaiveTime::MIN))
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FilterValue::Null, Into::into)
    }
}

/// Distinct values of one field, in a deterministic order.
///
/// Also remembers how many rows were read to build it, so callers can
/// report the scanned count next to the distinct count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    values: BTreeSet<FilterValue>,
    rows_scanned: u64,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one scanned row. Returns `true` when the value was new.
    pub fn insert(&mut self, value: FilterValue) -> bool {
        self.rows_scanned += 1;
        self.values.insert(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &FilterValue) -> bool {
        self.values.contains(value)
    }

    pub fn rows_scanned(&self) -> u64 {
        self.rows_scanned
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterValue> {
        self.values.iter()
    }

    pub fn into_values(self) -> Vec<FilterValue> {
        self.values.into_iter().collect()
    }
}

impl FromIterator<FilterValue> for FilterSet {
    fn from_iter<I: IntoIterator<Item = FilterValue>>(iter: I) -> Self {
        let mut set = FilterSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<FilterValue> for FilterSet {
    fn extend<I: IntoIterator<Item = FilterValue>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl IntoIterator for FilterSet {
    type Item = FilterValue;
    type IntoIter = std::collections::btree_set::IntoIter<FilterValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_text_by_type() {
        assert_eq!(FilterValue::from("Wake County").predicate_text(), "Wake County");
        assert_eq!(FilterValue::from(37183).predicate_text(), "37183");
        assert_eq!(FilterValue::from(3.0).predicate_text(), "3.0");
        assert_eq!(FilterValue::from(0.25).predicate_text(), "0.25");
        let date = NaiveDate::from_ymd_opt(2021, 7, 4).unwrap();
        assert_eq!(FilterValue::from(date).predicate_text(), "2021-07-04 00:00:00");
        assert_eq!(FilterValue::Null.predicate_text(), "NULL");
    }

    #[test]
    fn test_float_text_never_uses_exponent() {
        assert_eq!(FilterValue::from(1e16).predicate_text(), "10000000000000000.0");
        assert_eq!(FilterValue::from(1e-7).predicate_text(), "0.0000001");
        assert_eq!(FilterValue::from(-2.0).predicate_text(), "-2.0");
        assert_eq!(FilterValue::from(1.5e300).predicate_text().len(), 303);
        assert_eq!(FilterValue::from(f64::INFINITY).predicate_text(), "inf");
    }

    #[test]
    fn test_set_collapses_duplicates_and_counts_rows() {
        let set: FilterSet = vec![
            FilterValue::from("Wake"),
            FilterValue::from("Durham"),
            FilterValue::from("Wake"),
            FilterValue::Null,
            FilterValue::Null,
        ]
        .into_iter()
        .collect();

        assert_eq!(set.rows_scanned(), 5);
        assert_eq!(set.len(), 3);
        assert!(set.contains(&FilterValue::Null));
    }

    #[test]
    fn test_float_identity_is_bitwise() {
        let mut set = FilterSet::new();
        assert!(set.insert(FilterValue::Float(f64::NAN)));
        assert!(!set.insert(FilterValue::Float(f64::NAN)));
        assert!(set.insert(FilterValue::Float(1.5)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_types_do_not_mix() {
        assert_ne!(FilterValue::from(1), FilterValue::from("1"));
        assert_ne!(FilterValue::from(1), FilterValue::from(1.0));
    }

    #[test]
    fn test_order_is_deterministic() {
        let forward: FilterSet = ["b", "a", "c"].into_iter().map(FilterValue::from).collect();
        let backward: FilterSet = ["c", "b", "a"].into_iter().map(FilterValue::from).collect();
        assert_eq!(forward, backward);
        assert_eq!(
            forward.into_values(),
            vec![
                FilterValue::from("a"),
                FilterValue::from("b"),
                FilterValue::from("c")
            ]
        );
    }
}
