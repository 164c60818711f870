//! Shape inference for untagged JSON queries.
//!
//! The wire format carries no type tag, and the key sets of several
//! variants overlap (`min` is both a numeric and a term range bound,
//! `fuzziness` appears on fuzzy, match and phrase queries). [`select_kind`]
//! resolves the variant with a fixed ordered cascade, so the same input
//! always decodes to the same variant. The selected variant is then
//! decoded strictly; a failure there is reported as-is and never retried
//! as another variant, with one exception: a `terms` list that is not a
//! flat phrase is retried as a multi-phrase.

use super::*;
use crate::error::DecodeError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Decodes a query tree from raw JSON bytes.
pub fn decode_query(input: impl AsRef<[u8]>) -> Result<Query, DecodeError> {
    let value: Value = serde_json::from_slice(input.as_ref())?;
    decode_value(value)
}

/// Decodes a query tree from an already parsed JSON value.
pub fn decode_value(value: Value) -> Result<Query, DecodeError> {
    let map = match &value {
        Value::Object(map) => map,
        other => return Err(DecodeError::NotAnObject(json_type(other))),
    };

    let Some(kind) = select_kind(map) else {
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        return Err(DecodeError::UnknownVariant { keys });
    };
    log::debug!("decoding {} query", kind);

    match kind {
        QueryKind::Term => strict(kind, value).map(Query::Term),
        QueryKind::Match => strict(kind, value).map(Query::Match),
        QueryKind::MatchPhrase => strict(kind, value).map(Query::MatchPhrase),
        QueryKind::Fuzzy => strict(kind, value).map(Query::Fuzzy),
        QueryKind::Phrase | QueryKind::MultiPhrase => decode_terms(value),
        QueryKind::Boolean => strict(kind, value).map(Query::Boolean),
        QueryKind::Conjunction => strict(kind, value).map(Query::Conjunction),
        QueryKind::Disjunction => strict(kind, value).map(Query::Disjunction),
        QueryKind::QueryString => strict(kind, value).map(Query::QueryString),
        QueryKind::NumericRange => strict(kind, value).map(Query::NumericRange),
        QueryKind::TermRange => strict(kind, value).map(Query::TermRange),
        QueryKind::DateRange => strict(kind, value).map(Query::DateRange),
        QueryKind::Prefix => strict(kind, value).map(Query::Prefix),
        QueryKind::Regexp => strict(kind, value).map(Query::Regexp),
        QueryKind::Wildcard => strict(kind, value).map(Query::Wildcard),
        QueryKind::MatchAll => strict(kind, value).map(Query::MatchAll),
        QueryKind::MatchNone => strict(kind, value).map(Query::MatchNone),
        QueryKind::DocId => strict(kind, value).map(Query::DocId),
        QueryKind::BoolField => strict(kind, value).map(Query::BoolField),
        QueryKind::GeoBoundingBox => strict(kind, value).map(Query::GeoBoundingBox),
        QueryKind::GeoDistance => strict(kind, value).map(Query::GeoDistance),
        QueryKind::GeoBoundingPolygon => strict(kind, value).map(Query::GeoBoundingPolygon),
        QueryKind::GeoShape => strict(kind, value).map(Query::GeoShape),
        QueryKind::IpRange => strict(kind, value).map(Query::IpRange),
    }
}

/// Picks the variant for a JSON object by key presence. Order matters.
///
/// Presence means the key exists, even with a `null` value. The `terms`
/// branch reports [`QueryKind::Phrase`]; the multi-phrase fallback happens
/// during the strict decode.
pub fn select_kind(map: &Map<String, Value>) -> Option<QueryKind> {
    let has = |key: &str| map.contains_key(key);
    let bound_is = |pred: fn(&Value) -> bool| {
        ["min", "max"]
            .iter()
            .any(|key| map.get(*key).is_some_and(pred))
    };

    let kind = if has("fuzziness") && !has("match") && !has("match_phrase") && !has("terms") {
        QueryKind::Fuzzy
    } else if has("match") {
        QueryKind::Match
    } else if has("match_phrase") {
        QueryKind::MatchPhrase
    } else if has("terms") {
        QueryKind::Phrase
    } else if has("term") {
        QueryKind::Term
    } else if has("must") || has("should") || has("must_not") {
        QueryKind::Boolean
    } else if has("conjuncts") {
        QueryKind::Conjunction
    } else if has("disjuncts") {
        QueryKind::Disjunction
    } else if has("query") {
        QueryKind::QueryString
    } else if bound_is(Value::is_number) {
        QueryKind::NumericRange
    } else if bound_is(Value::is_string) {
        QueryKind::TermRange
    } else if has("start") || has("end") {
        QueryKind::DateRange
    } else if has("prefix") {
        QueryKind::Prefix
    } else if has("regexp") {
        QueryKind::Regexp
    } else if has("wildcard") {
        QueryKind::Wildcard
    } else if has("match_all") {
        QueryKind::MatchAll
    } else if has("match_none") {
        QueryKind::MatchNone
    } else if has("ids") {
        QueryKind::DocId
    } else if has("bool") {
        QueryKind::BoolField
    } else if has("top_left") && has("bottom_right") {
        QueryKind::GeoBoundingBox
    } else if has("distance") {
        QueryKind::GeoDistance
    } else if has("polygon_points") {
        QueryKind::GeoBoundingPolygon
    } else if has("geometry") {
        QueryKind::GeoShape
    } else if has("cidr") {
        QueryKind::IpRange
    } else {
        return None;
    };
    Some(kind)
}

fn strict<T: DeserializeOwned>(variant: QueryKind, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::Shape { variant, source })
}

/// `terms` is a flat phrase, or failing that a list of alternatives per
/// position.
fn decode_terms(value: Value) -> Result<Query, DecodeError> {
    match serde_json::from_value::<PhraseQuery>(value.clone()) {
        Ok(phrase) => Ok(Query::Phrase(phrase)),
        Err(err) => {
            log::debug!("terms is not a flat phrase ({}), trying multi-phrase", err);
            strict(QueryKind::MultiPhrase, value).map(Query::MultiPhrase)
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kind_of(value: Value) -> Option<QueryKind> {
        match value {
            Value::Object(map) => select_kind(&map),
            _ => None,
        }
    }

    #[test]
    fn test_fuzziness_alone_selects_fuzzy() {
        assert_eq!(
            kind_of(json!({"term": "rust", "fuzziness": 1})),
            Some(QueryKind::Fuzzy)
        );
        assert_eq!(
            kind_of(json!({"match": "rust", "fuzziness": 1})),
            Some(QueryKind::Match)
        );
        assert_eq!(
            kind_of(json!({"terms": ["a"], "fuzziness": 1})),
            Some(QueryKind::Phrase)
        );
    }

    #[test]
    fn test_presence_includes_null() {
        assert_eq!(kind_of(json!({"prefix": null})), Some(QueryKind::Prefix));
    }

    #[test]
    fn test_range_bound_type_selects_variant() {
        assert_eq!(kind_of(json!({"min": 1})), Some(QueryKind::NumericRange));
        assert_eq!(kind_of(json!({"max": "m"})), Some(QueryKind::TermRange));
        assert_eq!(
            kind_of(json!({"min": "a", "max": 5})),
            Some(QueryKind::NumericRange)
        );
        // A null bound is neither, so a later branch decides.
        assert_eq!(kind_of(json!({"min": null, "prefix": "a"})), Some(QueryKind::Prefix));
    }

    #[test]
    fn test_bounding_box_needs_both_corners() {
        assert_eq!(kind_of(json!({"top_left": [0, 0]})), None);
        assert_eq!(
            kind_of(json!({"top_left": [0, 0], "bottom_right": [1, 1]})),
            Some(QueryKind::GeoBoundingBox)
        );
    }

    #[test]
    fn test_terms_falls_back_to_multi_phrase() {
        let q = decode_value(json!({"terms": [["a", "b"], ["c"]], "field": "body"})).unwrap();
        assert_eq!(q.kind(), QueryKind::MultiPhrase);

        let q = decode_value(json!({"terms": ["a", "b"]})).unwrap();
        assert_eq!(q.kind(), QueryKind::Phrase);
    }

    #[test]
    fn test_terms_surfaces_multi_phrase_error() {
        let err = decode_value(json!({"terms": 5})).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Shape {
                variant: QueryKind::MultiPhrase,
                ..
            }
        ));
    }

    #[test]
    fn test_strict_failure_is_not_reinterpreted() {
        let err = decode_value(json!({"term": 42, "prefix": "a"})).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Shape {
                variant: QueryKind::Term,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_variant_lists_sorted_keys() {
        let err = decode_value(json!({"zeta": 1, "alpha": 2})).unwrap_err();
        assert_eq!(err.to_string(), "unknown query type (keys: alpha, zeta)");
    }

    #[test]
    fn test_non_object_is_rejected() {
        let err = decode_query("[1, 2]").unwrap_err();
        assert!(matches!(err, DecodeError::NotAnObject("an array")));

        let err = decode_query("{").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_children_use_the_cascade() {
        let q = decode_value(json!({
            "must": {"conjuncts": [{"term": "a"}, {"match": "b c"}]},
            "must_not": {"prefix": "x"}
        }))
        .unwrap();
        let Query::Boolean(b) = q else {
            panic!("expected boolean");
        };
        let Some(Query::Conjunction(c)) = b.must.as_deref() else {
            panic!("expected conjunction");
        };
        assert_eq!(c.conjuncts[1].kind(), QueryKind::Match);
        assert!(b.should.is_none());
    }
}
