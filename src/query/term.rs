//! Single-term queries: exact, fuzzy, prefix, regexp, wildcard and boolean
//! field lookups.

use super::text::Fuzziness;
use super::{QueryKind, Validatable, impl_boostable, impl_fieldable};
use crate::error::{CompileError, ValidationError};
use crate::index::IndexReader;
use crate::mapping::{FieldType, IndexMapping};
use crate::search::{
    PlanNode, SearchContext, SearchPlan, Searchable, SearcherOptions, check_field_type,
    dictionary_matches, fuzzy_matches, resolve_field,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches documents containing exactly `term` (no analysis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub term: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl TermQuery {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            field: String::new(),
            boost: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

impl Searchable for TermQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        _reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        let field = resolve_field(&self.field, mapping);
        Ok(SearchPlan::new(
            PlanNode::Term {
                field: field.to_string(),
                term: self.term.clone(),
            },
            self.boost,
            options,
        ))
    }
}

/// Matches terms within an edit distance of `term`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyQuery {
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzziness: Option<Fuzziness>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl FuzzyQuery {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            prefix_length: None,
            fuzziness: None,
            field: String::new(),
            boost: None,
        }
    }

    /// Fuzziness defaults to a single edit when unset.
    pub fn fuzziness(&self) -> Fuzziness {
        self.fuzziness.unwrap_or(Fuzziness::Edits(1))
    }
}

impl Validatable for FuzzyQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        self.fuzziness().validate()
    }
}

impl Searchable for FuzzyQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        self.validate()?;
        let field = resolve_field(&self.field, mapping);
        let edits = self.fuzziness().edits_for(&self.term);
        if edits == 0 {
            return Ok(SearchPlan::new(
                PlanNode::Term {
                    field: field.to_string(),
                    term: self.term.clone(),
                },
                self.boost,
                options,
            ));
        }

        let prefix = self.prefix_length.unwrap_or(0) as usize;
        let terms = fuzzy_matches(reader, field, &self.term, edits, prefix);
        Ok(SearchPlan::term_set(field, terms, self.boost, options))
    }
}

/// Matches terms starting with `prefix`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixQuery {
    pub prefix: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl PrefixQuery {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            field: String::new(),
            boost: None,
        }
    }
}

impl Searchable for PrefixQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        let field = resolve_field(&self.field, mapping);
        let terms = dictionary_matches(reader, field, |t| t.starts_with(&self.prefix));
        Ok(SearchPlan::term_set(field, terms, self.boost, options))
    }
}

/// Matches terms that the regular expression matches in full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexpQuery {
    pub regexp: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl RegexpQuery {
    pub fn new(regexp: impl Into<String>) -> Self {
        Self {
            regexp: regexp.into(),
            field: String::new(),
            boost: None,
        }
    }

    fn compile_pattern(&self) -> Result<Regex, ValidationError> {
        anchored_regex(&self.regexp, &self.regexp)
    }
}

impl Validatable for RegexpQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        self.compile_pattern().map(|_| ())
    }
}

impl Searchable for RegexpQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        let pattern = self.compile_pattern()?;
        let field = resolve_field(&self.field, mapping);
        let terms = dictionary_matches(reader, field, |t| pattern.is_match(t));
        Ok(SearchPlan::term_set(field, terms, self.boost, options))
    }
}

/// Matches terms against a pattern where `*` is any run of characters and
/// `?` any single character. A backslash escapes the next character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WildcardQuery {
    pub wildcard: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl WildcardQuery {
    pub fn new(wildcard: impl Into<String>) -> Self {
        Self {
            wildcard: wildcard.into(),
            field: String::new(),
            boost: None,
        }
    }

    fn compile_pattern(&self) -> Result<Regex, ValidationError> {
        if self.wildcard.is_empty() {
            return Err(ValidationError::EmptyWildcard);
        }
        anchored_regex(&wildcard_to_regex(&self.wildcard), &self.wildcard)
    }
}

impl Validatable for WildcardQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        self.compile_pattern().map(|_| ())
    }
}

impl Searchable for WildcardQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        let pattern = self.compile_pattern()?;
        let field = resolve_field(&self.field, mapping);
        let terms = dictionary_matches(reader, field, |t| pattern.is_match(t));
        Ok(SearchPlan::term_set(field, terms, self.boost, options))
    }
}

/// Matches documents whose boolean field has the given value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoolFieldQuery {
    #[serde(rename = "bool")]
    pub value: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl BoolFieldQuery {
    pub fn new(value: bool) -> Self {
        Self {
            value,
            field: String::new(),
            boost: None,
        }
    }
}

impl Searchable for BoolFieldQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        _reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        let field = resolve_field(&self.field, mapping);
        check_field_type(mapping, QueryKind::BoolField, field, FieldType::Boolean)?;
        // Booleans are indexed as the single-letter terms "T" and "F".
        let term = if self.value { "T" } else { "F" };
        Ok(SearchPlan::new(
            PlanNode::Term {
                field: field.to_string(),
                term: term.to_string(),
            },
            self.boost,
            options,
        ))
    }
}

impl_boostable!(
    TermQuery,
    FuzzyQuery,
    PrefixQuery,
    RegexpQuery,
    WildcardQuery,
    BoolFieldQuery
);
impl_fieldable!(
    TermQuery,
    FuzzyQuery,
    PrefixQuery,
    RegexpQuery,
    WildcardQuery,
    BoolFieldQuery
);

/// Compiles `pattern` so that it must match a whole term.
fn anchored_regex(pattern: &str, original: &str) -> Result<Regex, ValidationError> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| ValidationError::InvalidRegexp {
        pattern: original.to_string(),
        message: e.to_string(),
    })
}

/// Translate a wildcard pattern into regex syntax.
fn wildcard_to_regex(wildcard: &str) -> String {
    let mut out = String::with_capacity(wildcard.len() * 2);
    let mut chars = wildcard.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push_str(&regex::escape(escaped.encode_utf8(&mut [0u8; 4])));
                } else {
                    out.push_str(r"\\");
                }
            }
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }

    out
}
