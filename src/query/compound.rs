//! Composite queries and the embedded query-string node.

use super::parser::parse_query_string;
use super::{Query, Validatable, impl_boostable};
use crate::error::{CompileError, ValidationError};
use crate::index::IndexReader;
use crate::mapping::IndexMapping;
use crate::search::{PlanNode, SearchContext, SearchPlan, Searchable, SearcherOptions};
use serde::{Deserialize, Deserializer, Serialize};

/// Combines up to three independent clauses.
///
/// An absent slot places no constraint; it is not an empty composite.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BooleanQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must: Option<Box<Query>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should: Option<Box<Query>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_not: Option<Box<Query>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl BooleanQuery {
    fn slots(&self) -> [(&'static str, Option<&Query>); 3] {
        [
            ("must", self.must.as_deref()),
            ("should", self.should.as_deref()),
            ("must_not", self.must_not.as_deref()),
        ]
    }
}

impl Validatable for BooleanQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.must.is_none() && self.should.is_none() && self.must_not.is_none() {
            return Err(ValidationError::EmptyBoolean);
        }
        for (name, slot) in self.slots() {
            if let Some(query) = slot {
                query
                    .validate()
                    .map_err(|e| ValidationError::child(name, e))?;
            }
        }
        Ok(())
    }
}

impl Searchable for BooleanQuery {
    fn compile(
        &self,
        ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        let compile_slot = |slot: Option<&Query>| {
            slot.map(|q| q.compile(ctx, reader, mapping, options).map(Box::new))
                .transpose()
        };
        let mut must = compile_slot(self.must.as_deref())?;
        let should = compile_slot(self.should.as_deref())?;
        let must_not = compile_slot(self.must_not.as_deref())?;

        if must.is_none() && should.is_none() {
            if must_not.is_none() {
                return Ok(SearchPlan::match_none(options));
            }
            // Only exclusions: exclude from the whole index.
            must = Some(Box::new(SearchPlan::new(PlanNode::MatchAll, None, options)));
        }

        Ok(SearchPlan::new(
            PlanNode::Boolean {
                must,
                should,
                must_not,
            },
            self.boost,
            options,
        ))
    }
}

/// Matches documents matching every child.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConjunctionQuery {
    pub conjuncts: Vec<Query>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl ConjunctionQuery {
    pub fn new(conjuncts: Vec<Query>) -> Self {
        Self {
            conjuncts,
            boost: None,
        }
    }
}

impl Validatable for ConjunctionQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_children("conjuncts", &self.conjuncts)
    }
}

impl Searchable for ConjunctionQuery {
    fn compile(
        &self,
        ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        if self.conjuncts.is_empty() {
            return Ok(SearchPlan::match_none(options));
        }
        let children = compile_children(&self.conjuncts, ctx, reader, mapping, options)?;
        Ok(SearchPlan::new(
            PlanNode::Conjunction(children),
            self.boost,
            options,
        ))
    }
}

/// Matches documents matching at least `min` children.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DisjunctionQuery {
    pub disjuncts: Vec<Query>,
    #[serde(
        default,
        deserialize_with = "deserialize_min",
        skip_serializing_if = "Option::is_none"
    )]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl DisjunctionQuery {
    pub fn new(disjuncts: Vec<Query>) -> Self {
        Self {
            disjuncts,
            min: None,
            boost: None,
        }
    }

    pub fn min(&self) -> u32 {
        self.min.unwrap_or(0)
    }
}

impl Validatable for DisjunctionQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.min() as usize > self.disjuncts.len() {
            return Err(ValidationError::DisjunctionMin {
                min: self.min(),
                clauses: self.disjuncts.len(),
            });
        }
        validate_children("disjuncts", &self.disjuncts)
    }
}

impl Searchable for DisjunctionQuery {
    fn compile(
        &self,
        ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        if self.min() as usize > self.disjuncts.len() {
            return Err(ValidationError::DisjunctionMin {
                min: self.min(),
                clauses: self.disjuncts.len(),
            }
            .into());
        }
        if self.disjuncts.is_empty() {
            return Ok(SearchPlan::match_none(options));
        }
        let children = compile_children(&self.disjuncts, ctx, reader, mapping, options)?;
        Ok(SearchPlan::new(
            PlanNode::Disjunction {
                children,
                min: self.min() as usize,
            },
            self.boost,
            options,
        ))
    }
}

/// Query text in the query-string syntax.
///
/// Compiling this node directly always uses the bundled
/// [`QueryStringParser`](super::QueryStringParser). To use another
/// [`SyntaxParser`](super::SyntaxParser), expand the tree with an
/// [`Expander`](super::Expander) before compiling it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStringQuery {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl QueryStringQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            boost: None,
        }
    }
}

impl Validatable for QueryStringQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        parse_query_string(&self.query)?.validate()
    }
}

impl Searchable for QueryStringQuery {
    fn compile(
        &self,
        ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        let parsed = parse_query_string(&self.query)?;
        log::debug!("query string '{}' parsed as {} query", self.query, parsed.kind());
        parsed.compile(ctx, reader, mapping, options)
    }
}

impl_boostable!(BooleanQuery, ConjunctionQuery, DisjunctionQuery, QueryStringQuery);

/// Accepts `min` as any whole, non-negative JSON number, so `1` and `1.0`
/// decode alike.
fn deserialize_min<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = Option::<f64>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) {
        Ok(Some(value as u32))
    } else {
        Err(serde::de::Error::custom(format!(
            "min must be a whole non-negative number, got {}",
            value
        )))
    }
}

fn validate_children(label: &str, children: &[Query]) -> Result<(), ValidationError> {
    for (i, child) in children.iter().enumerate() {
        child
            .validate()
            .map_err(|e| ValidationError::child(format!("{}[{}]", label, i), e))?;
    }
    Ok(())
}

fn compile_children(
    children: &[Query],
    ctx: &SearchContext,
    reader: &dyn IndexReader,
    mapping: &dyn IndexMapping,
    options: &SearcherOptions,
) -> Result<Vec<SearchPlan>, CompileError> {
    children
        .iter()
        .map(|child| child.compile(ctx, reader, mapping, options))
        .collect()
}
