//! Error types for decoding, expansion, validation and compilation.

use crate::mapping::FieldType;
use crate::query::QueryKind;

/// Errors produced while decoding a JSON query.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed query: {0}")]
    Json(#[from] serde_json::Error),

    #[error("query must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("invalid {variant} query: {source}")]
    Shape {
        variant: QueryKind,
        #[source]
        source: serde_json::Error,
    },

    /// No key of the input selects a query variant.
    #[error("unknown query type{}", describe_keys(.keys))]
    UnknownVariant { keys: Vec<String> },
}

fn describe_keys(keys: &[String]) -> String {
    if keys.is_empty() {
        " (empty object)".to_string()
    } else {
        format!(" (keys: {})", keys.join(", "))
    }
}

/// Query-string text that the grammar parser rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not parse '{text}': {message}")]
pub struct GrammarParseError {
    pub text: String,
    pub message: String,
}

impl GrammarParseError {
    pub fn new(text: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            message: message.into(),
        }
    }
}

/// Errors produced while expanding query-string nodes.
#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error(transparent)]
    Parse(#[from] GrammarParseError),

    #[error("query string '{text}' expands deeper than {limit} levels")]
    TooDeep { text: String, limit: usize },

    /// Failure inside a child of a composite node.
    #[error("{location}: {source}")]
    Child {
        location: String,
        #[source]
        source: Box<ExpandError>,
    },
}

impl ExpandError {
    pub(crate) fn child(location: impl Into<String>, source: ExpandError) -> Self {
        ExpandError::Child {
            location: location.into(),
            source: Box::new(source),
        }
    }

    /// The grammar error at the bottom of a chain of child failures, if any.
    pub fn parse_error(&self) -> Option<&GrammarParseError> {
        match self {
            ExpandError::Parse(err) => Some(err),
            ExpandError::TooDeep { .. } => None,
            ExpandError::Child { source, .. } => source.parse_error(),
        }
    }
}

/// Errors produced by the debug dumper.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error(transparent)]
    Expand(#[from] ExpandError),

    #[error("could not serialize query: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors produced while decoding pre-search data.
#[derive(Debug, thiserror::Error)]
pub enum PreSearchDecodeError {
    #[error("malformed pre-search data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for pre-search key '{key}': {source}")]
    Payload {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A violated structural or semantic constraint of a single query variant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("fuzziness {0} is out of range, must be between 0 and 2")]
    FuzzinessOutOfRange(i64),

    #[error("{0} query must specify min or max")]
    MissingBounds(QueryKind),

    #[error("{kind} query min {min} is greater than max {max}")]
    InvertedRange {
        kind: QueryKind,
        min: String,
        max: String,
    },

    #[error("date '{value}' could not be parsed: {message}")]
    InvalidDate { value: String, message: String },

    #[error("{0} query must contain at least one term")]
    EmptyPhrase(QueryKind),

    #[error("disjunction query has {clauses} clauses but requires {min} to match")]
    DisjunctionMin { min: u32, clauses: usize },

    #[error("boolean query must contain at least one must, should or must_not clause")]
    EmptyBoolean,

    #[error("invalid regexp '{pattern}': {message}")]
    InvalidRegexp { pattern: String, message: String },

    #[error("wildcard query must not be empty")]
    EmptyWildcard,

    #[error("invalid geo point (lon {lon}, lat {lat}): {reason}")]
    InvalidGeoPoint { lon: f64, lat: f64, reason: String },

    #[error("geo polygon needs at least 3 points, got {0}")]
    PolygonTooSmall(usize),

    #[error("invalid geo shape: {0}")]
    InvalidShape(String),

    #[error("invalid geo distance '{0}'")]
    InvalidDistance(String),

    #[error("invalid cidr '{cidr}': {message}")]
    InvalidCidr { cidr: String, message: String },

    #[error(transparent)]
    Syntax(#[from] GrammarParseError),

    /// Failure inside a child of a composite node.
    #[error("{location}: {source}")]
    Child {
        location: String,
        #[source]
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    pub(crate) fn child(location: impl Into<String>, source: ValidationError) -> Self {
        ValidationError::Child {
            location: location.into(),
            source: Box::new(source),
        }
    }
}

/// Errors produced while compiling a query into a search plan.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("compilation cancelled")]
    Cancelled,

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("{kind} query cannot search field '{field}' mapped as {actual}, expected {expected}")]
    FieldType {
        kind: QueryKind,
        field: String,
        expected: FieldType,
        actual: FieldType,
    },

    #[error("unknown analyzer '{0}'")]
    UnknownAnalyzer(String),

    #[error("unknown date time parser '{0}'")]
    UnknownDateTimeParser(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Syntax(#[from] GrammarParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_variant_lists_keys() {
        let err = DecodeError::UnknownVariant {
            keys: vec!["foo".to_string(), "bar".to_string()],
        };
        assert_eq!(err.to_string(), "unknown query type (keys: foo, bar)");

        let err = DecodeError::UnknownVariant { keys: Vec::new() };
        assert_eq!(err.to_string(), "unknown query type (empty object)");
    }

    #[test]
    fn test_expand_error_names_location_and_text() {
        let parse = GrammarParseError::new("title:", "expected a value after 'title:'");
        let err = ExpandError::child("must", ExpandError::child("conjuncts[1]", parse.clone().into()));

        let message = err.to_string();
        assert!(message.starts_with("must: conjuncts[1]: "));
        assert!(message.contains("'title:'"));
        assert_eq!(err.parse_error(), Some(&parse));
    }
}
