//! Query model.
//!
//! A [`Query`] is one node of a query tree. Its JSON form carries no type
//! tag: [`decode`] infers the variant from the keys that are present, and
//! serializing a node writes back the same untagged shape.
//!
//! Besides the variant itself, a node may implement any of three optional
//! capabilities:
//!
//! - [`Boostable`] - a relevance multiplier (every variant)
//! - [`Fieldable`] - restriction to a single named field
//! - [`Validatable`] - an explicit structural check before compilation
//!
//! Use [`Query::as_boostable`], [`Query::as_fieldable`] and
//! [`Query::as_validatable`] to probe for them. `None` means the variant
//! does not support the capability.

pub mod compound;
pub mod decode;
pub mod expand;
pub mod geo;
pub mod ip;
pub mod parser;
pub mod range;
pub mod special;
pub mod term;
pub mod text;

pub use compound::{BooleanQuery, ConjunctionQuery, DisjunctionQuery, QueryStringQuery};
pub use decode::{decode_query, decode_value};
pub use expand::{Expander, SyntaxParser, dump_query, expand_query};
pub use geo::{
    GeoBoundingBoxQuery, GeoBoundingPolygonQuery, GeoDistanceQuery, GeoPoint, GeoShapeQuery,
    GeometryFilter, Relation, Shape,
};
pub use ip::IpRangeQuery;
pub use parser::{QueryStringParser, parse_query_string};
pub use range::{DateRangeQuery, NumericRangeQuery, TermRangeQuery};
pub use special::{DocIdQuery, MatchAllQuery, MatchNoneQuery};
pub use term::{BoolFieldQuery, FuzzyQuery, PrefixQuery, RegexpQuery, TermQuery, WildcardQuery};
pub use text::{
    Fuzziness, MatchOperator, MatchPhraseQuery, MatchQuery, MultiPhraseQuery, PhraseQuery,
};

use crate::error::{CompileError, ValidationError};
use crate::index::IndexReader;
use crate::mapping::IndexMapping;
use crate::search::{SearchContext, SearchPlan, Searchable, SearcherOptions};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Default boost applied when a query does not carry one.
pub const DEFAULT_BOOST: f64 = 1.0;

/// A query that can be boosted relative to other queries.
pub trait Boostable {
    fn boost(&self) -> f64;
    fn set_boost(&mut self, boost: f64);
}

/// A query that can be restricted to a single field.
///
/// An empty field means "the mapping's default search field".
pub trait Fieldable {
    fn field(&self) -> &str;
    fn set_field(&mut self, field: &str);
}

/// A query that can be checked before execution.
pub trait Validatable {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Implements [`Boostable`] over an `Option<f64>` field named `boost`.
macro_rules! impl_boostable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::query::Boostable for $ty {
                fn boost(&self) -> f64 {
                    self.boost.unwrap_or($crate::query::DEFAULT_BOOST)
                }

                fn set_boost(&mut self, boost: f64) {
                    self.boost = Some(boost);
                }
            }
        )+
    };
}

/// Implements [`Fieldable`] over a `String` field named `field`.
macro_rules! impl_fieldable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::query::Fieldable for $ty {
                fn field(&self) -> &str {
                    &self.field
                }

                fn set_field(&mut self, field: &str) {
                    self.field = field.to_string();
                }
            }
        )+
    };
}

pub(crate) use impl_boostable;
pub(crate) use impl_fieldable;

/// The variant of a [`Query`], used in diagnostics and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Term,
    Match,
    MatchPhrase,
    Fuzzy,
    Phrase,
    MultiPhrase,
    Boolean,
    Conjunction,
    Disjunction,
    QueryString,
    NumericRange,
    TermRange,
    DateRange,
    Prefix,
    Regexp,
    Wildcard,
    MatchAll,
    MatchNone,
    DocId,
    BoolField,
    GeoBoundingBox,
    GeoDistance,
    GeoBoundingPolygon,
    GeoShape,
    IpRange,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Term => "term",
            QueryKind::Match => "match",
            QueryKind::MatchPhrase => "match phrase",
            QueryKind::Fuzzy => "fuzzy",
            QueryKind::Phrase => "phrase",
            QueryKind::MultiPhrase => "multi-phrase",
            QueryKind::Boolean => "boolean",
            QueryKind::Conjunction => "conjunction",
            QueryKind::Disjunction => "disjunction",
            QueryKind::QueryString => "query string",
            QueryKind::NumericRange => "numeric range",
            QueryKind::TermRange => "term range",
            QueryKind::DateRange => "date range",
            QueryKind::Prefix => "prefix",
            QueryKind::Regexp => "regexp",
            QueryKind::Wildcard => "wildcard",
            QueryKind::MatchAll => "match all",
            QueryKind::MatchNone => "match none",
            QueryKind::DocId => "doc id",
            QueryKind::BoolField => "bool field",
            QueryKind::GeoBoundingBox => "geo bounding box",
            QueryKind::GeoDistance => "geo distance",
            QueryKind::GeoBoundingPolygon => "geo bounding polygon",
            QueryKind::GeoShape => "geo shape",
            QueryKind::IpRange => "ip range",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of a query tree.
///
/// Serializes untagged; deserialization goes through the shape inference
/// in [`decode`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Query {
    Term(TermQuery),
    Match(MatchQuery),
    MatchPhrase(MatchPhraseQuery),
    Fuzzy(FuzzyQuery),
    Phrase(PhraseQuery),
    MultiPhrase(MultiPhraseQuery),
    Boolean(BooleanQuery),
    Conjunction(ConjunctionQuery),
    Disjunction(DisjunctionQuery),
    QueryString(QueryStringQuery),
    NumericRange(NumericRangeQuery),
    TermRange(TermRangeQuery),
    DateRange(DateRangeQuery),
    Prefix(PrefixQuery),
    Regexp(RegexpQuery),
    Wildcard(WildcardQuery),
    MatchAll(MatchAllQuery),
    MatchNone(MatchNoneQuery),
    DocId(DocIdQuery),
    BoolField(BoolFieldQuery),
    GeoBoundingBox(GeoBoundingBoxQuery),
    GeoDistance(GeoDistanceQuery),
    GeoBoundingPolygon(GeoBoundingPolygonQuery),
    GeoShape(GeoShapeQuery),
    IpRange(IpRangeQuery),
}

/// Applies `$body` to the inner value of every variant.
macro_rules! each_variant {
    ($query:expr, $inner:ident => $body:expr) => {
        match $query {
            Query::Term($inner) => $body,
            Query::Match($inner) => $body,
            Query::MatchPhrase($inner) => $body,
            Query::Fuzzy($inner) => $body,
            Query::Phrase($inner) => $body,
            Query::MultiPhrase($inner) => $body,
            Query::Boolean($inner) => $body,
            Query::Conjunction($inner) => $body,
            Query::Disjunction($inner) => $body,
            Query::QueryString($inner) => $body,
            Query::NumericRange($inner) => $body,
            Query::TermRange($inner) => $body,
            Query::DateRange($inner) => $body,
            Query::Prefix($inner) => $body,
            Query::Regexp($inner) => $body,
            Query::Wildcard($inner) => $body,
            Query::MatchAll($inner) => $body,
            Query::MatchNone($inner) => $body,
            Query::DocId($inner) => $body,
            Query::BoolField($inner) => $body,
            Query::GeoBoundingBox($inner) => $body,
            Query::GeoDistance($inner) => $body,
            Query::GeoBoundingPolygon($inner) => $body,
            Query::GeoShape($inner) => $body,
            Query::IpRange($inner) => $body,
        }
    };
}

/// Applies `$body` to the inner value of every field-restricted variant,
/// evaluating `$other` for the rest.
macro_rules! fieldable_variant {
    ($query:expr, $inner:ident => $body:expr, _ => $other:expr) => {
        match $query {
            Query::Term($inner) => $body,
            Query::Match($inner) => $body,
            Query::MatchPhrase($inner) => $body,
            Query::Fuzzy($inner) => $body,
            Query::Phrase($inner) => $body,
            Query::MultiPhrase($inner) => $body,
            Query::NumericRange($inner) => $body,
            Query::TermRange($inner) => $body,
            Query::DateRange($inner) => $body,
            Query::Prefix($inner) => $body,
            Query::Regexp($inner) => $body,
            Query::Wildcard($inner) => $body,
            Query::BoolField($inner) => $body,
            Query::GeoBoundingBox($inner) => $body,
            Query::GeoDistance($inner) => $body,
            Query::GeoBoundingPolygon($inner) => $body,
            Query::GeoShape($inner) => $body,
            Query::IpRange($inner) => $body,
            Query::Boolean(_)
            | Query::Conjunction(_)
            | Query::Disjunction(_)
            | Query::QueryString(_)
            | Query::MatchAll(_)
            | Query::MatchNone(_)
            | Query::DocId(_) => $other,
        }
    };
}

/// Applies `$body` to the inner value of every validatable variant,
/// evaluating `$other` for the rest.
macro_rules! validatable_variant {
    ($query:expr, $inner:ident => $body:expr, _ => $other:expr) => {
        match $query {
            Query::Match($inner) => $body,
            Query::MatchPhrase($inner) => $body,
            Query::Fuzzy($inner) => $body,
            Query::Phrase($inner) => $body,
            Query::MultiPhrase($inner) => $body,
            Query::Boolean($inner) => $body,
            Query::Conjunction($inner) => $body,
            Query::Disjunction($inner) => $body,
            Query::QueryString($inner) => $body,
            Query::NumericRange($inner) => $body,
            Query::TermRange($inner) => $body,
            Query::DateRange($inner) => $body,
            Query::Regexp($inner) => $body,
            Query::Wildcard($inner) => $body,
            Query::GeoBoundingBox($inner) => $body,
            Query::GeoDistance($inner) => $body,
            Query::GeoBoundingPolygon($inner) => $body,
            Query::GeoShape($inner) => $body,
            Query::IpRange($inner) => $body,
            Query::Term(_)
            | Query::Prefix(_)
            | Query::MatchAll(_)
            | Query::MatchNone(_)
            | Query::DocId(_)
            | Query::BoolField(_) => $other,
        }
    };
}

impl Query {
    pub fn kind(&self) -> QueryKind {
        match self {
            Query::Term(_) => QueryKind::Term,
            Query::Match(_) => QueryKind::Match,
            Query::MatchPhrase(_) => QueryKind::MatchPhrase,
            Query::Fuzzy(_) => QueryKind::Fuzzy,
            Query::Phrase(_) => QueryKind::Phrase,
            Query::MultiPhrase(_) => QueryKind::MultiPhrase,
            Query::Boolean(_) => QueryKind::Boolean,
            Query::Conjunction(_) => QueryKind::Conjunction,
            Query::Disjunction(_) => QueryKind::Disjunction,
            Query::QueryString(_) => QueryKind::QueryString,
            Query::NumericRange(_) => QueryKind::NumericRange,
            Query::TermRange(_) => QueryKind::TermRange,
            Query::DateRange(_) => QueryKind::DateRange,
            Query::Prefix(_) => QueryKind::Prefix,
            Query::Regexp(_) => QueryKind::Regexp,
            Query::Wildcard(_) => QueryKind::Wildcard,
            Query::MatchAll(_) => QueryKind::MatchAll,
            Query::MatchNone(_) => QueryKind::MatchNone,
            Query::DocId(_) => QueryKind::DocId,
            Query::BoolField(_) => QueryKind::BoolField,
            Query::GeoBoundingBox(_) => QueryKind::GeoBoundingBox,
            Query::GeoDistance(_) => QueryKind::GeoDistance,
            Query::GeoBoundingPolygon(_) => QueryKind::GeoBoundingPolygon,
            Query::GeoShape(_) => QueryKind::GeoShape,
            Query::IpRange(_) => QueryKind::IpRange,
        }
    }

    pub fn as_boostable(&self) -> Option<&dyn Boostable> {
        Some(each_variant!(self, q => q as &dyn Boostable))
    }

    pub fn as_boostable_mut(&mut self) -> Option<&mut dyn Boostable> {
        Some(each_variant!(self, q => q as &mut dyn Boostable))
    }

    pub fn as_fieldable(&self) -> Option<&dyn Fieldable> {
        fieldable_variant!(self, q => Some(q as &dyn Fieldable), _ => None)
    }

    pub fn as_fieldable_mut(&mut self) -> Option<&mut dyn Fieldable> {
        fieldable_variant!(self, q => Some(q as &mut dyn Fieldable), _ => None)
    }

    pub fn as_validatable(&self) -> Option<&dyn Validatable> {
        validatable_variant!(self, q => Some(q as &dyn Validatable), _ => None)
    }

    /// Validates the node if its variant supports validation.
    ///
    /// Variants without the capability always pass.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.as_validatable() {
            Some(q) => q.validate(),
            None => Ok(()),
        }
    }

    /// Whether the tree contains at least one query-string node.
    pub fn has_query_string(&self) -> bool {
        match self {
            Query::QueryString(_) => true,
            Query::Conjunction(q) => q.conjuncts.iter().any(Query::has_query_string),
            Query::Disjunction(q) => q.disjuncts.iter().any(Query::has_query_string),
            Query::Boolean(q) => [&q.must, &q.should, &q.must_not]
                .into_iter()
                .flatten()
                .any(|slot| slot.has_query_string()),
            _ => false,
        }
    }
}

impl Searchable for Query {
    fn compile(
        &self,
        ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        ctx.check()?;
        log::trace!("compiling {} query", self.kind());
        each_variant!(self, q => q.compile(ctx, reader, mapping, options))
    }
}

impl<'de> Deserialize<'de> for Query {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        decode::decode_value(value).map_err(serde::de::Error::custom)
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        $(
            impl From<$ty> for Query {
                fn from(query: $ty) -> Self {
                    Query::$variant(query)
                }
            }
        )+
    };
}

impl_from_variant!(
    Term(TermQuery),
    Match(MatchQuery),
    MatchPhrase(MatchPhraseQuery),
    Fuzzy(FuzzyQuery),
    Phrase(PhraseQuery),
    MultiPhrase(MultiPhraseQuery),
    Boolean(BooleanQuery),
    Conjunction(ConjunctionQuery),
    Disjunction(DisjunctionQuery),
    QueryString(QueryStringQuery),
    NumericRange(NumericRangeQuery),
    TermRange(TermRangeQuery),
    DateRange(DateRangeQuery),
    Prefix(PrefixQuery),
    Regexp(RegexpQuery),
    Wildcard(WildcardQuery),
    MatchAll(MatchAllQuery),
    MatchNone(MatchNoneQuery),
    DocId(DocIdQuery),
    BoolField(BoolFieldQuery),
    GeoBoundingBox(GeoBoundingBoxQuery),
    GeoDistance(GeoDistanceQuery),
    GeoBoundingPolygon(GeoBoundingPolygonQuery),
    GeoShape(GeoShapeQuery),
    IpRange(IpRangeQuery),
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boost_defaults_to_one() {
        let q = Query::from(TermQuery::new("rust"));
        assert_eq!(q.as_boostable().unwrap().boost(), 1.0);
    }

    #[test]
    fn test_set_boost_leaves_field_alone() {
        let mut q = Query::from(TermQuery::new("rust").with_field("title"));
        q.as_boostable_mut().unwrap().set_boost(3.5);

        assert_eq!(q.as_boostable().unwrap().boost(), 3.5);
        assert_eq!(q.as_fieldable().unwrap().field(), "title");
    }

    #[test]
    fn test_set_field_leaves_boost_alone() {
        let mut q = Query::from(PrefixQuery::new("ru"));
        q.as_boostable_mut().unwrap().set_boost(2.0);
        q.as_fieldable_mut().unwrap().set_field("body");

        assert_eq!(q.as_fieldable().unwrap().field(), "body");
        assert_eq!(q.as_boostable().unwrap().boost(), 2.0);
    }

    #[test]
    fn test_composites_are_not_fieldable() {
        let conj = Query::from(ConjunctionQuery::new(vec![]));
        assert!(conj.as_fieldable().is_none());

        let all = Query::from(MatchAllQuery::default());
        assert!(all.as_fieldable().is_none());
        assert!(all.as_validatable().is_none());
        assert!(all.validate().is_ok());
    }

    #[test]
    fn test_has_query_string() {
        let q = Query::from(BooleanQuery {
            must: Some(Box::new(Query::from(ConjunctionQuery::new(vec![
                Query::from(TermQuery::new("a")),
                Query::from(QueryStringQuery::new("b c")),
            ])))),
            ..Default::default()
        });
        assert!(q.has_query_string());
        assert!(!Query::from(TermQuery::new("a")).has_query_string());
    }
}
