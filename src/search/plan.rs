use super::SearcherOptions;
use crate::query::{GeoPoint, Relation, Shape};
use chrono::{DateTime, Utc};
use std::net::IpAddr;

/// A compiled query: what to match, how much it counts, and the options
/// it runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPlan {
    pub node: PlanNode,
    pub boost: f64,
    pub options: SearcherOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    Term {
        field: String,
        term: String,
    },
    /// Any of a fixed set of terms, typically a dictionary expansion.
    TermSet {
        field: String,
        terms: Vec<String>,
    },
    /// Consecutive positions, each matching any of its alternatives. An
    /// empty slot matches any term.
    Phrase {
        field: String,
        positions: Vec<Vec<String>>,
    },
    NumericRange {
        field: String,
        min: Option<f64>,
        max: Option<f64>,
        inclusive_min: bool,
        inclusive_max: bool,
    },
    DateRange {
        field: String,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        inclusive_start: bool,
        inclusive_end: bool,
    },
    DocIds(Vec<String>),
    /// Documents with precomputed scores, from a pre-search phase.
    ScoredDocs(Vec<(String, f64)>),
    GeoBoundingBox {
        field: String,
        top_left: GeoPoint,
        bottom_right: GeoPoint,
    },
    GeoDistance {
        field: String,
        center: GeoPoint,
        radius_meters: f64,
    },
    GeoPolygon {
        field: String,
        points: Vec<GeoPoint>,
    },
    GeoShape {
        field: String,
        shape: Shape,
        relation: Relation,
    },
    IpRange {
        field: String,
        network: IpAddr,
        prefix_len: u8,
    },
    Conjunction(Vec<SearchPlan>),
    Disjunction {
        children: Vec<SearchPlan>,
        min: usize,
    },
    Boolean {
        must: Option<Box<SearchPlan>>,
        should: Option<Box<SearchPlan>>,
        must_not: Option<Box<SearchPlan>>,
    },
    MatchAll,
    MatchNone,
}

impl SearchPlan {
    pub fn new(node: PlanNode, boost: Option<f64>, options: &SearcherOptions) -> Self {
        Self {
            node,
            boost: boost.unwrap_or(crate::query::DEFAULT_BOOST),
            options: options.clone(),
        }
    }

    pub fn match_none(options: &SearcherOptions) -> Self {
        Self::new(PlanNode::MatchNone, None, options)
    }

    /// A term-set plan; no terms means nothing can match.
    pub fn term_set(
        field: &str,
        terms: Vec<String>,
        boost: Option<f64>,
        options: &SearcherOptions,
    ) -> Self {
        if terms.is_empty() {
            return Self::match_none(options);
        }
        Self::new(
            PlanNode::TermSet {
                field: field.to_string(),
                terms,
            },
            boost,
            options,
        )
    }

    /// Whether the plan can never match, ignoring what the index holds.
    pub fn is_match_none(&self) -> bool {
        matches!(self.node, PlanNode::MatchNone)
    }

    /// Number of plan nodes, this one included.
    pub fn size(&self) -> usize {
        1 + match &self.node {
            PlanNode::Conjunction(children) | PlanNode::Disjunction { children, .. } => {
                children.iter().map(SearchPlan::size).sum()
            }
            PlanNode::Boolean {
                must,
                should,
                must_not,
            } => [must, should, must_not]
                .into_iter()
                .flatten()
                .map(|plan| plan.size())
                .sum(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_term_set_matches_nothing() {
        let options = SearcherOptions::default();
        let plan = SearchPlan::term_set("body", Vec::new(), Some(2.0), &options);
        assert!(plan.is_match_none());
        assert_eq!(plan.boost, 1.0);
    }

    #[test]
    fn test_options_are_carried() {
        let mut options = SearcherOptions::default();
        options.explain = true;
        let plan = SearchPlan::new(PlanNode::MatchAll, None, &options);
        assert!(plan.options.explain);
    }

    #[test]
    fn test_size_counts_nested_nodes() {
        let options = SearcherOptions::default();
        let leaf = || SearchPlan::new(PlanNode::MatchAll, None, &options);
        let plan = SearchPlan::new(
            PlanNode::Boolean {
                must: Some(Box::new(SearchPlan::new(
                    PlanNode::Conjunction(vec![leaf(), leaf()]),
                    None,
                    &options,
                ))),
                should: None,
                must_not: Some(Box::new(leaf())),
            },
            None,
            &options,
        );
        assert_eq!(plan.size(), 5);
    }
}
