//! Rewrites query-string nodes into the structured trees they denote.

use super::parser::QueryStringParser;
use super::{BooleanQuery, Query};
use crate::error::{DumpError, ExpandError, GrammarParseError};

/// Expansion stops after this many nested query-string rewrites.
pub const MAX_EXPANSION_DEPTH: usize = 64;

/// Turns query-string text into a query tree.
pub trait SyntaxParser {
    fn parse(&self, text: &str) -> Result<Query, GrammarParseError>;
}

impl<F> SyntaxParser for F
where
    F: Fn(&str) -> Result<Query, GrammarParseError>,
{
    fn parse(&self, text: &str) -> Result<Query, GrammarParseError> {
        self(text)
    }
}

/// Replaces every query-string node in a tree with its parsed form.
///
/// Expansion consumes the tree; clone it first if the original is still
/// needed.
pub struct Expander<'p> {
    parser: &'p dyn SyntaxParser,
}

impl<'p> Expander<'p> {
    pub fn new(parser: &'p dyn SyntaxParser) -> Self {
        Self { parser }
    }

    pub fn expand(&self, query: Query) -> Result<Query, ExpandError> {
        self.expand_at(query, 0)
    }

    fn expand_at(&self, query: Query, depth: usize) -> Result<Query, ExpandError> {
        match query {
            Query::QueryString(q) => {
                if depth >= MAX_EXPANSION_DEPTH {
                    return Err(ExpandError::TooDeep {
                        text: q.query,
                        limit: MAX_EXPANSION_DEPTH,
                    });
                }
                let mut parsed = self.parser.parse(&q.query)?;
                log::debug!("expanded '{}' into {} query", q.query, parsed.kind());
                if let (Some(boost), Some(target)) = (q.boost, parsed.as_boostable_mut()) {
                    target.set_boost(boost);
                }
                self.expand_at(parsed, depth + 1)
            }
            Query::Conjunction(mut q) => {
                q.conjuncts = self.expand_children("conjuncts", q.conjuncts, depth)?;
                Ok(Query::Conjunction(q))
            }
            Query::Disjunction(mut q) => {
                q.disjuncts = self.expand_children("disjuncts", q.disjuncts, depth)?;
                Ok(Query::Disjunction(q))
            }
            Query::Boolean(q) => self.expand_boolean(q, depth).map(Query::Boolean),
            other => Ok(other),
        }
    }

    fn expand_children(
        &self,
        label: &str,
        children: Vec<Query>,
        depth: usize,
    ) -> Result<Vec<Query>, ExpandError> {
        children
            .into_iter()
            .enumerate()
            .map(|(i, child)| {
                self.expand_at(child, depth)
                    .map_err(|e| ExpandError::child(format!("{}[{}]", label, i), e))
            })
            .collect()
    }

    fn expand_boolean(&self, q: BooleanQuery, depth: usize) -> Result<BooleanQuery, ExpandError> {
        let slot = |name: &str, query: Option<Box<Query>>| -> Result<_, ExpandError> {
            query
                .map(|q| {
                    self.expand_at(*q, depth)
                        .map(Box::new)
                        .map_err(|e| ExpandError::child(name, e))
                })
                .transpose()
        };
        Ok(BooleanQuery {
            must: slot("must", q.must)?,
            should: slot("should", q.should)?,
            must_not: slot("must_not", q.must_not)?,
            boost: q.boost,
        })
    }
}

/// Expands a tree with the bundled query-string parser.
pub fn expand_query(query: Query) -> Result<Query, ExpandError> {
    Expander::new(&QueryStringParser).expand(query)
}

/// Expands a copy of `query` and renders it as pretty JSON. Debug output
/// only; the format is not a stable interface.
pub fn dump_query(query: &Query) -> Result<String, DumpError> {
    let expanded = expand_query(query.clone())?;
    Ok(serde_json::to_string_pretty(&expanded)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ConjunctionQuery, DisjunctionQuery, QueryKind, QueryStringQuery, TermQuery};

    fn term(text: &str) -> Query {
        Query::from(TermQuery::new(text))
    }

    fn qs(text: &str) -> Query {
        Query::from(QueryStringQuery::new(text))
    }

    #[test]
    fn test_non_composites_pass_through() {
        let parser = |_: &str| -> Result<Query, GrammarParseError> { panic!("not called") };
        let expander = Expander::new(&parser);
        assert_eq!(expander.expand(term("a")).unwrap(), term("a"));
    }

    #[test]
    fn test_expands_nested_query_strings() {
        // "outer" parses to another query string, which parses to a term.
        let parser = |text: &str| -> Result<Query, GrammarParseError> {
            Ok(match text {
                "outer" => qs("inner"),
                other => term(other),
            })
        };
        let expander = Expander::new(&parser);
        let tree = Query::from(DisjunctionQuery::new(vec![term("x"), qs("outer")]));

        let Query::Disjunction(d) = expander.expand(tree).unwrap() else {
            panic!("expected disjunction");
        };
        assert_eq!(d.disjuncts, vec![term("x"), term("inner")]);
    }

    #[test]
    fn test_boolean_keeps_absent_slots_absent() {
        let parser = |text: &str| -> Result<Query, GrammarParseError> { Ok(term(text)) };
        let tree = Query::from(BooleanQuery {
            should: Some(Box::new(qs("a"))),
            ..Default::default()
        });

        let Query::Boolean(b) = Expander::new(&parser).expand(tree).unwrap() else {
            panic!("expected boolean");
        };
        assert!(b.must.is_none());
        assert!(b.must_not.is_none());
        assert_eq!(b.should.as_deref(), Some(&term("a")));
    }

    #[test]
    fn test_child_failure_names_position_and_text() {
        let parser = |text: &str| -> Result<Query, GrammarParseError> {
            Err(GrammarParseError::new(text, "bad"))
        };
        let tree = Query::from(BooleanQuery {
            must: Some(Box::new(Query::from(ConjunctionQuery::new(vec![
                term("ok"),
                qs("broken text"),
            ])))),
            ..Default::default()
        });

        let err = Expander::new(&parser).expand(tree).unwrap_err();
        assert_eq!(
            err.to_string(),
            "must: conjuncts[1]: could not parse 'broken text': bad"
        );
        assert_eq!(err.parse_error().unwrap().text, "broken text");
    }

    #[test]
    fn test_self_referential_parser_is_bounded() {
        let parser = |text: &str| -> Result<Query, GrammarParseError> { Ok(qs(text)) };
        let err = Expander::new(&parser).expand(qs("loop")).unwrap_err();
        assert!(matches!(err, ExpandError::TooDeep { .. }));
    }

    #[test]
    fn test_query_string_boost_moves_to_parsed_root() {
        let parser = |text: &str| -> Result<Query, GrammarParseError> { Ok(term(text)) };
        let mut node = QueryStringQuery::new("a");
        node.boost = Some(3.0);

        let expanded = Expander::new(&parser).expand(Query::from(node)).unwrap();
        assert_eq!(expanded.as_boostable().unwrap().boost(), 3.0);
    }

    #[test]
    fn test_dump_expands_a_copy() {
        let tree = Query::from(ConjunctionQuery::new(vec![qs("title:rust")]));
        let dumped = dump_query(&tree).unwrap();

        assert!(tree.has_query_string());
        assert!(!dumped.contains("\"query\""));
        assert!(dumped.contains("\n  \"conjuncts\""));

        let reparsed = crate::query::decode_query(&dumped).unwrap();
        assert_eq!(reparsed.kind(), QueryKind::Conjunction);
    }
}
