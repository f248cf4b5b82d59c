//! Attribute predicates of the form `<field> = '<value>'`.

use crate::error::{Result, SelectError};
use crate::value::FilterValue;
use std::fmt;

/// A where clause passed to the engine when building a filtered view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhereClause(String);

impl WhereClause {
    /// Exact-equality predicate on `field`.
    ///
    /// The value is string-quoted without escaping, so a value holding a
    /// single quote is rejected rather than producing a clause that
    /// filters on something else. `Null` becomes `<field> IS NULL`.
    pub fn equals(field: &str, value: &FilterValue) -> Result<Self> {
        let field = field.trim();
        if field.is_empty() {
            return Err(SelectError::predicate(field, "field name is empty"));
        }

        if value.is_null() {
            return Ok(Self(format!("{} IS NULL", field)));
        }

        let text = value.predicate_text();
        if text.contains('\'') {
            return Err(SelectError::predicate(
                field,
                format!("value {:?} contains a single quote", text),
            ));
        }

        Ok(Self(format!("{} = '{}'", field, text)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_value_is_quoted() {
        let clause = WhereClause::equals("NAME", &FilterValue::from("Wake County")).unwrap();
        assert_eq!(clause.as_str(), "NAME = 'Wake County'");
    }

    #[test]
    fn test_numbers_are_quoted_as_text() {
        let clause = WhereClause::equals("FIPS", &FilterValue::from(37183)).unwrap();
        assert_eq!(clause.as_str(), "FIPS = '37183'");
        let clause = WhereClause::equals("AREA", &FilterValue::from(2.0)).unwrap();
        assert_eq!(clause.as_str(), "AREA = '2.0'");
        let clause = WhereClause::equals("AREA", &FilterValue::from(1e16)).unwrap();
        assert_eq!(clause.as_str(), "AREA = '10000000000000000.0'");
    }

    #[test]
    fn test_null_uses_is_null() {
        let clause = WhereClause::equals("NAME", &FilterValue::Null).unwrap();
        assert_eq!(clause.as_str(), "NAME IS NULL");
    }

    #[test]
    fn test_single_quote_is_rejected() {
        let err = WhereClause::equals("NAME", &FilterValue::from("O'Brien")).unwrap_err();
        match err {
            SelectError::PredicateBuild { field, reason } => {
                assert_eq!(field, "NAME");
                assert!(reason.contains("O'Brien"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_field_is_rejected() {
        assert!(WhereClause::equals("  ", &FilterValue::from("x")).is_err());
    }
}
