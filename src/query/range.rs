//! Numeric, term and date range queries.
//!
//! Unset inclusivity follows the usual half-open convention: the lower
//! bound is inclusive and the upper bound exclusive.

use super::{QueryKind, Validatable, impl_boostable, impl_fieldable};
use crate::error::{CompileError, ValidationError};
use crate::index::IndexReader;
use crate::mapping::{FieldType, IndexMapping};
use crate::search::{
    PlanNode, SearchContext, SearchPlan, Searchable, SearcherOptions, check_field_type,
    dictionary_matches, resolve_field,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Formats tried, in order, when a date range names no parser.
const DEFAULT_DATE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NumericRangeQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusive_min: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusive_max: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl NumericRangeQuery {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            ..Default::default()
        }
    }

    pub fn inclusive_min(&self) -> bool {
        self.inclusive_min.unwrap_or(true)
    }

    pub fn inclusive_max(&self) -> bool {
        self.inclusive_max.unwrap_or(false)
    }
}

impl Validatable for NumericRangeQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        match (self.min, self.max) {
            (None, None) => Err(ValidationError::MissingBounds(QueryKind::NumericRange)),
            (Some(min), Some(max)) if min > max => Err(ValidationError::InvertedRange {
                kind: QueryKind::NumericRange,
                min: min.to_string(),
                max: max.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl Searchable for NumericRangeQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        _reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        self.validate()?;
        let field = resolve_field(&self.field, mapping);
        check_field_type(mapping, QueryKind::NumericRange, field, FieldType::Numeric)?;
        Ok(SearchPlan::new(
            PlanNode::NumericRange {
                field: field.to_string(),
                min: self.min,
                max: self.max,
                inclusive_min: self.inclusive_min(),
                inclusive_max: self.inclusive_max(),
            },
            self.boost,
            options,
        ))
    }
}

/// Lexicographic range over the terms of a field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TermRangeQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusive_min: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusive_max: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl TermRangeQuery {
    pub fn new(min: Option<String>, max: Option<String>) -> Self {
        Self {
            min,
            max,
            ..Default::default()
        }
    }

    pub fn inclusive_min(&self) -> bool {
        self.inclusive_min.unwrap_or(true)
    }

    pub fn inclusive_max(&self) -> bool {
        self.inclusive_max.unwrap_or(false)
    }

    fn contains(&self, term: &str) -> bool {
        let above = match self.min.as_deref() {
            Some(min) if self.inclusive_min() => term >= min,
            Some(min) => term > min,
            None => true,
        };
        let below = match self.max.as_deref() {
            Some(max) if self.inclusive_max() => term <= max,
            Some(max) => term < max,
            None => true,
        };
        above && below
    }
}

impl Validatable for TermRangeQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        match (&self.min, &self.max) {
            (None, None) => Err(ValidationError::MissingBounds(QueryKind::TermRange)),
            (Some(min), Some(max)) if min > max => Err(ValidationError::InvertedRange {
                kind: QueryKind::TermRange,
                min: min.clone(),
                max: max.clone(),
            }),
            _ => Ok(()),
        }
    }
}

impl Searchable for TermRangeQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        self.validate()?;
        let field = resolve_field(&self.field, mapping);
        let terms = dictionary_matches(reader, field, |t| self.contains(t));
        Ok(SearchPlan::term_set(field, terms, self.boost, options))
    }
}

/// Range over a date-time field, with bounds given as text.
///
/// An empty bound string is the same as an absent bound.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DateRangeQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusive_start: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusive_end: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime_parser: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl DateRangeQuery {
    pub fn new(start: Option<String>, end: Option<String>) -> Self {
        Self {
            start,
            end,
            ..Default::default()
        }
    }

    pub fn inclusive_start(&self) -> bool {
        self.inclusive_start.unwrap_or(true)
    }

    pub fn inclusive_end(&self) -> bool {
        self.inclusive_end.unwrap_or(false)
    }

    fn bounds(&self) -> (Option<&str>, Option<&str>) {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|s| !s.is_empty())
        }
        (non_empty(&self.start), non_empty(&self.end))
    }

    /// Parses both bounds, using `formats` or the built-in formats.
    fn parse_bounds(
        &self,
        formats: Option<&[String]>,
    ) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ValidationError> {
        let (start, end) = self.bounds();
        if start.is_none() && end.is_none() {
            return Err(ValidationError::MissingBounds(QueryKind::DateRange));
        }

        let start = start.map(|s| parse_datetime(s, formats)).transpose()?;
        let end = end.map(|s| parse_datetime(s, formats)).transpose()?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ValidationError::InvertedRange {
                    kind: QueryKind::DateRange,
                    min: start.to_rfc3339(),
                    max: end.to_rfc3339(),
                });
            }
        }
        Ok((start, end))
    }
}

impl Validatable for DateRangeQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.datetime_parser.is_some() {
            // Named parsers are resolved by the mapping at compile time.
            let (start, end) = self.bounds();
            if start.is_none() && end.is_none() {
                return Err(ValidationError::MissingBounds(QueryKind::DateRange));
            }
            return Ok(());
        }
        self.parse_bounds(None).map(|_| ())
    }
}

impl Searchable for DateRangeQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        _reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        let field = resolve_field(&self.field, mapping);
        check_field_type(mapping, QueryKind::DateRange, field, FieldType::DateTime)?;

        let formats = match self.datetime_parser.as_deref() {
            Some(name) => Some(
                mapping
                    .date_time_formats(name)
                    .ok_or_else(|| CompileError::UnknownDateTimeParser(name.to_string()))?,
            ),
            None => None,
        };
        let (start, end) = self.parse_bounds(formats.as_deref())?;

        Ok(SearchPlan::new(
            PlanNode::DateRange {
                field: field.to_string(),
                start,
                end,
                inclusive_start: self.inclusive_start(),
                inclusive_end: self.inclusive_end(),
            },
            self.boost,
            options,
        ))
    }
}

impl_boostable!(NumericRangeQuery, TermRangeQuery, DateRangeQuery);
impl_fieldable!(NumericRangeQuery, TermRangeQuery, DateRangeQuery);

/// Parses a date-time with the given formats, or RFC 3339 followed by the
/// built-in formats when none are given. Values without an offset are UTC.
pub(crate) fn parse_datetime(
    value: &str,
    formats: Option<&[String]>,
) -> Result<DateTime<Utc>, ValidationError> {
    let invalid = |message: String| ValidationError::InvalidDate {
        value: value.to_string(),
        message,
    };

    match formats {
        Some(formats) => formats
            .iter()
            .find_map(|f| parse_with_format(value, f))
            .ok_or_else(|| invalid(format!("no format matched ({})", formats.join(", ")))),
        None => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
                return Ok(dt.with_timezone(&Utc));
            }
            DEFAULT_DATE_FORMATS
                .iter()
                .find_map(|f| parse_with_format(value, f))
                .or_else(|| parse_with_format(value, "%Y-%m-%d"))
                .ok_or_else(|| invalid("expected RFC 3339 or YYYY-MM-DD[ HH:MM:SS]".to_string()))
        }
    }
}

fn parse_with_format(value: &str, format: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(value, format) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_numeric_range_needs_a_bound() {
        assert_eq!(
            NumericRangeQuery::default().validate(),
            Err(ValidationError::MissingBounds(QueryKind::NumericRange))
        );
        assert!(NumericRangeQuery::new(Some(1.0), None).validate().is_ok());
    }

    #[test]
    fn test_numeric_range_inverted() {
        let q = NumericRangeQuery::new(Some(10.0), Some(5.0));
        assert!(matches!(
            q.validate(),
            Err(ValidationError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_default_inclusivity() {
        let q = NumericRangeQuery::new(Some(1.0), Some(2.0));
        assert!(q.inclusive_min());
        assert!(!q.inclusive_max());
    }

    #[test]
    fn test_term_range_contains() {
        let q = TermRangeQuery::new(Some("b".to_string()), Some("d".to_string()));
        assert!(q.contains("b"));
        assert!(q.contains("cat"));
        assert!(!q.contains("d"));
        assert!(!q.contains("a"));

        let mut q = q;
        q.inclusive_max = Some(true);
        assert!(q.contains("d"));
    }

    #[test]
    fn test_parse_datetime_forms() {
        let dt = parse_datetime("2024-03-01", None).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 1));

        let dt = parse_datetime("2024-03-01 10:30:00", None).unwrap();
        assert_eq!(dt.hour(), 10);

        let dt = parse_datetime("2024-03-01T10:30:00+02:00", None).unwrap();
        assert_eq!(dt.hour(), 8);

        assert!(parse_datetime("yesterday", None).is_err());
    }

    #[test]
    fn test_parse_datetime_named_formats() {
        let formats = vec!["%d/%m/%Y".to_string()];
        let dt = parse_datetime("05/04/2023", Some(&formats)).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2023, 4, 5));
        assert!(parse_datetime("2023-04-05", Some(&formats)).is_err());
    }

    #[test]
    fn test_date_range_bounds() {
        let q = DateRangeQuery::new(Some(String::new()), None);
        assert_eq!(
            q.validate(),
            Err(ValidationError::MissingBounds(QueryKind::DateRange))
        );

        let q = DateRangeQuery::new(Some("2024-02-01".to_string()), Some("2024-01-01".to_string()));
        assert!(matches!(
            q.validate(),
            Err(ValidationError::InvertedRange { .. })
        ));

        let q = DateRangeQuery::new(Some("not a date".to_string()), None);
        let err = q.validate().unwrap_err();
        assert!(err.to_string().contains("'not a date'"));
    }
}
