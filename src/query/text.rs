//! Analyzed text queries and phrases.

use super::{QueryKind, Validatable, impl_boostable, impl_fieldable};
use crate::analysis::Analyzer;
use crate::error::{CompileError, ValidationError};
use crate::index::IndexReader;
use crate::mapping::IndexMapping;
use crate::search::{
    PlanNode, SearchContext, SearchPlan, Searchable, SearcherOptions, fuzzy_matches,
    resolve_field,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Largest edit distance accepted by fuzzy matching.
pub const MAX_FUZZINESS: i64 = 2;

/// Allowed edit distance for fuzzy term matching.
///
/// On the wire this is either a number of edits or the string `"auto"`,
/// which picks the distance from the term length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FuzzinessRepr", into = "FuzzinessRepr")]
pub enum Fuzziness {
    Edits(i64),
    Auto,
}

impl Default for Fuzziness {
    fn default() -> Self {
        Fuzziness::Edits(0)
    }
}

impl Fuzziness {
    /// Edit distance to use for `term`.
    pub fn edits_for(&self, term: &str) -> i64 {
        match self {
            Fuzziness::Edits(n) => *n,
            Fuzziness::Auto => match term.chars().count() {
                0..=2 => 0,
                3..=5 => 1,
                _ => 2,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Fuzziness::Edits(n) if !(0..=MAX_FUZZINESS).contains(n) => {
                Err(ValidationError::FuzzinessOutOfRange(*n))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FuzzinessRepr {
    Edits(i64),
    Keyword(String),
}

impl TryFrom<FuzzinessRepr> for Fuzziness {
    type Error = String;

    fn try_from(repr: FuzzinessRepr) -> Result<Self, Self::Error> {
        match repr {
            FuzzinessRepr::Edits(n) => Ok(Fuzziness::Edits(n)),
            FuzzinessRepr::Keyword(s) if s.eq_ignore_ascii_case("auto") => Ok(Fuzziness::Auto),
            FuzzinessRepr::Keyword(s) => Err(format!(
                "invalid fuzziness '{}', expected a number or \"auto\"",
                s
            )),
        }
    }
}

impl From<Fuzziness> for FuzzinessRepr {
    fn from(fuzziness: Fuzziness) -> Self {
        match fuzziness {
            Fuzziness::Edits(n) => FuzzinessRepr::Edits(n),
            Fuzziness::Auto => FuzzinessRepr::Keyword("auto".to_string()),
        }
    }
}

/// How the analyzed terms of a match query combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOperator {
    /// Any term may match.
    #[default]
    Or,
    /// Every term must match.
    And,
}

/// Analyzes `match` with the field's analyzer and searches for the
/// resulting terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchQuery {
    #[serde(rename = "match")]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzziness: Option<Fuzziness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<MatchOperator>,
}

impl MatchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            field: String::new(),
            analyzer: None,
            boost: None,
            prefix_length: None,
            fuzziness: None,
            operator: None,
        }
    }

    pub fn operator(&self) -> MatchOperator {
        self.operator.unwrap_or_default()
    }
}

impl Validatable for MatchQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        self.fuzziness.unwrap_or_default().validate()
    }
}

impl Searchable for MatchQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        self.validate()?;
        let field = resolve_field(&self.field, mapping);
        let analyzer = resolve_analyzer(self.analyzer.as_deref(), field, mapping)?;
        let tokens = analyzer.analyze(&self.text);
        if tokens.is_empty() {
            return Ok(SearchPlan::match_none(options));
        }

        let fuzziness = self.fuzziness.unwrap_or_default();
        let prefix = self.prefix_length.unwrap_or(0) as usize;
        let mut children: Vec<SearchPlan> = tokens
            .iter()
            .map(|token| {
                let edits = fuzziness.edits_for(&token.term);
                let node = if edits > 0 {
                    PlanNode::TermSet {
                        field: field.to_string(),
                        terms: fuzzy_matches(reader, field, &token.term, edits, prefix),
                    }
                } else {
                    PlanNode::Term {
                        field: field.to_string(),
                        term: token.term.clone(),
                    }
                };
                SearchPlan::new(node, None, options)
            })
            .collect();

        if children.len() == 1 {
            let mut only = children.remove(0);
            only.boost = self.boost.unwrap_or(super::DEFAULT_BOOST);
            return Ok(only);
        }

        let node = match self.operator() {
            MatchOperator::Or => PlanNode::Disjunction { children, min: 1 },
            MatchOperator::And => PlanNode::Conjunction(children),
        };
        Ok(SearchPlan::new(node, self.boost, options))
    }
}

/// Analyzes `match_phrase` and searches for the terms at their analyzed
/// positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPhraseQuery {
    #[serde(rename = "match_phrase")]
    pub phrase: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzziness: Option<Fuzziness>,
}

impl MatchPhraseQuery {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            field: String::new(),
            analyzer: None,
            boost: None,
            fuzziness: None,
        }
    }
}

impl Validatable for MatchPhraseQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        self.fuzziness.unwrap_or_default().validate()
    }
}

impl Searchable for MatchPhraseQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        self.validate()?;
        let field = resolve_field(&self.field, mapping);
        let analyzer = resolve_analyzer(self.analyzer.as_deref(), field, mapping)?;
        let tokens = analyzer.analyze(&self.phrase);
        let Some(first) = tokens.first().map(|t| t.position) else {
            return Ok(SearchPlan::match_none(options));
        };

        // Tokens sharing a position become alternatives; skipped positions
        // (for example removed stop words) stay as empty slots.
        let mut positions: Vec<Vec<String>> = Vec::new();
        for token in &tokens {
            let slot = token.position.saturating_sub(first) as usize;
            if positions.len() <= slot {
                positions.resize_with(slot + 1, Vec::new);
            }
            positions[slot].push(token.term.clone());
        }

        let positions = fuzz_positions(reader, field, positions, self.fuzziness.unwrap_or_default());
        Ok(SearchPlan::new(
            PlanNode::Phrase {
                field: field.to_string(),
                positions,
            },
            self.boost,
            options,
        ))
    }
}

/// Matches documents containing `terms` at consecutive positions, without
/// analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseQuery {
    pub terms: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzziness: Option<Fuzziness>,
}

impl PhraseQuery {
    pub fn new(terms: Vec<String>) -> Self {
        Self {
            terms,
            field: String::new(),
            boost: None,
            fuzziness: None,
        }
    }
}

impl Validatable for PhraseQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.terms.is_empty() {
            return Err(ValidationError::EmptyPhrase(QueryKind::Phrase));
        }
        self.fuzziness.unwrap_or_default().validate()
    }
}

impl Searchable for PhraseQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        self.validate()?;
        let field = resolve_field(&self.field, mapping);
        let positions = self.terms.iter().map(|t| vec![t.clone()]).collect();
        let positions = fuzz_positions(reader, field, positions, self.fuzziness.unwrap_or_default());
        Ok(SearchPlan::new(
            PlanNode::Phrase {
                field: field.to_string(),
                positions,
            },
            self.boost,
            options,
        ))
    }
}

/// A phrase where each position lists alternative terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPhraseQuery {
    pub terms: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzziness: Option<Fuzziness>,
}

impl MultiPhraseQuery {
    pub fn new(terms: Vec<Vec<String>>) -> Self {
        Self {
            terms,
            field: String::new(),
            boost: None,
            fuzziness: None,
        }
    }
}

impl Validatable for MultiPhraseQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.terms.iter().all(|position| position.is_empty()) {
            return Err(ValidationError::EmptyPhrase(QueryKind::MultiPhrase));
        }
        self.fuzziness.unwrap_or_default().validate()
    }
}

impl Searchable for MultiPhraseQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        self.validate()?;
        let field = resolve_field(&self.field, mapping);
        let positions = fuzz_positions(
            reader,
            field,
            self.terms.clone(),
            self.fuzziness.unwrap_or_default(),
        );
        Ok(SearchPlan::new(
            PlanNode::Phrase {
                field: field.to_string(),
                positions,
            },
            self.boost,
            options,
        ))
    }
}

impl_boostable!(MatchQuery, MatchPhraseQuery, PhraseQuery, MultiPhraseQuery);
impl_fieldable!(MatchQuery, MatchPhraseQuery, PhraseQuery, MultiPhraseQuery);

/// Resolves an explicitly named analyzer, or the field's analyzer.
fn resolve_analyzer(
    name: Option<&str>,
    field: &str,
    mapping: &dyn IndexMapping,
) -> Result<Arc<dyn Analyzer>, CompileError> {
    match name {
        Some(name) => mapping
            .analyzer_named(name)
            .ok_or_else(|| CompileError::UnknownAnalyzer(name.to_string())),
        None => Ok(mapping.analyzer_for_field(field)),
    }
}

/// Replaces every phrase term with its fuzzy dictionary matches.
fn fuzz_positions(
    reader: &dyn IndexReader,
    field: &str,
    positions: Vec<Vec<String>>,
    fuzziness: Fuzziness,
) -> Vec<Vec<String>> {
    positions
        .into_iter()
        .map(|alternatives| {
            let mut expanded = Vec::with_capacity(alternatives.len());
            for term in alternatives {
                let edits = fuzziness.edits_for(&term);
                if edits == 0 {
                    expanded.push(term);
                } else {
                    expanded.extend(fuzzy_matches(reader, field, &term, edits, 0));
                }
            }
            expanded.sort();
            expanded.dedup();
            expanded
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fuzziness_wire_forms() {
        let n: Fuzziness = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(n, Fuzziness::Edits(2));

        let auto: Fuzziness = serde_json::from_value(json!("AUTO")).unwrap();
        assert_eq!(auto, Fuzziness::Auto);
        assert_eq!(serde_json::to_value(auto).unwrap(), json!("auto"));

        assert!(serde_json::from_value::<Fuzziness>(json!("lots")).is_err());
    }

    #[test]
    fn test_auto_fuzziness_scales_with_length() {
        assert_eq!(Fuzziness::Auto.edits_for("ab"), 0);
        assert_eq!(Fuzziness::Auto.edits_for("rust"), 1);
        assert_eq!(Fuzziness::Auto.edits_for("compiler"), 2);
    }

    #[test]
    fn test_fuzziness_range() {
        assert!(Fuzziness::Edits(2).validate().is_ok());
        assert_eq!(
            Fuzziness::Edits(3).validate(),
            Err(ValidationError::FuzzinessOutOfRange(3))
        );
        assert_eq!(
            Fuzziness::Edits(-1).validate(),
            Err(ValidationError::FuzzinessOutOfRange(-1))
        );
    }

    #[test]
    fn test_operator_wire_form() {
        let mut q = MatchQuery::new("quick fox");
        q.operator = Some(MatchOperator::And);
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json, json!({"match": "quick fox", "operator": "and"}));
    }

    #[test]
    fn test_empty_phrase_is_invalid() {
        let q = PhraseQuery::new(Vec::new());
        assert_eq!(
            q.validate(),
            Err(ValidationError::EmptyPhrase(QueryKind::Phrase))
        );

        let q = MultiPhraseQuery::new(vec![Vec::new()]);
        assert!(q.validate().is_err());
    }
}
