use super::impl_boostable;
use crate::error::CompileError;
use crate::index::IndexReader;
use crate::mapping::IndexMapping;
use crate::search::{PlanNode, SearchContext, SearchPlan, Searchable, SearcherOptions};
use serde::de::IgnoredAny;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder value of the `match_all` / `match_none` keys.
///
/// Any value is accepted on input; it is always written as `{}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Marker;

impl Serialize for Marker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_map(Some(0))?.end()
    }
}

impl<'de> Deserialize<'de> for Marker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Marker)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchAllQuery {
    #[serde(rename = "match_all", default)]
    pub marker: Marker,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl Searchable for MatchAllQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        _reader: &dyn IndexReader,
        _mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        Ok(SearchPlan::new(PlanNode::MatchAll, self.boost, options))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchNoneQuery {
    #[serde(rename = "match_none", default)]
    pub marker: Marker,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl Searchable for MatchNoneQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        _reader: &dyn IndexReader,
        _mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        Ok(SearchPlan::new(PlanNode::MatchNone, self.boost, options))
    }
}

/// Matches documents by external id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocIdQuery {
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl DocIdQuery {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids, boost: None }
    }
}

impl Searchable for DocIdQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        _reader: &dyn IndexReader,
        _mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        let mut ids = self.ids.clone();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(SearchPlan::match_none(options));
        }
        Ok(SearchPlan::new(PlanNode::DocIds(ids), self.boost, options))
    }
}

impl_boostable!(MatchAllQuery, MatchNoneQuery, DocIdQuery);
