//! Compilation of query trees into search plans.
//!
//! The crate stops at the plan: executing it against an index is the job
//! of a downstream searcher.

mod plan;

pub use plan::{PlanNode, SearchPlan};

use crate::error::CompileError;
use crate::index::IndexReader;
use crate::mapping::{FieldType, IndexMapping};
use crate::query::QueryKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cancellation shared between a caller and in-flight compilations.
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    cancelled: Arc<AtomicBool>,
}

impl SearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), CompileError> {
        if self.is_cancelled() {
            Err(CompileError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Options copied into every plan node.
///
/// Keys other than the recognized ones are kept in `extra` and passed
/// through unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearcherOptions {
    /// Attach scoring explanations to matches.
    #[serde(default)]
    pub explain: bool,
    /// Scoring mode; `"none"` disables scoring.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub score: String,
    #[serde(default)]
    pub include_term_vectors: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SearcherOptions {
    pub fn skip_scoring(&self) -> bool {
        self.score.eq_ignore_ascii_case("none")
    }
}

/// A node that can be compiled into a [`SearchPlan`].
pub trait Searchable {
    fn compile(
        &self,
        ctx: &SearchContext,
        reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError>;
}

/// The field a query targets; empty means the mapping's default field.
pub(crate) fn resolve_field<'a>(field: &'a str, mapping: &'a dyn IndexMapping) -> &'a str {
    if field.is_empty() {
        mapping.default_search_field()
    } else {
        field
    }
}

/// Checks that `field` is mapped as `expected`.
///
/// Unmapped fields pass in a dynamic mapping.
pub(crate) fn check_field_type(
    mapping: &dyn IndexMapping,
    kind: QueryKind,
    field: &str,
    expected: FieldType,
) -> Result<(), CompileError> {
    match mapping.field_type(field) {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(CompileError::FieldType {
            kind,
            field: field.to_string(),
            expected,
            actual,
        }),
        None if mapping.is_dynamic() => Ok(()),
        None => Err(CompileError::UnknownField(field.to_string())),
    }
}

/// Terms of `field` accepted by `predicate`, in dictionary order.
pub(crate) fn dictionary_matches(
    reader: &dyn IndexReader,
    field: &str,
    predicate: impl Fn(&str) -> bool,
) -> Vec<String> {
    reader
        .terms(field)
        .filter(|term| predicate(*term))
        .map(str::to_string)
        .collect()
}

/// Terms of `field` within `edits` Levenshtein edits of `term` that share
/// its first `prefix_len` characters.
pub(crate) fn fuzzy_matches(
    reader: &dyn IndexReader,
    field: &str,
    term: &str,
    edits: i64,
    prefix_len: usize,
) -> Vec<String> {
    let max = usize::try_from(edits).unwrap_or(0);
    let prefix: String = term.chars().take(prefix_len).collect();
    let terms = dictionary_matches(reader, field, |candidate| {
        candidate.starts_with(&prefix) && strsim::levenshtein(term, candidate) <= max
    });
    log::trace!(
        "fuzzy '{}' (edits {}) matched {} terms in {}",
        term,
        edits,
        terms.len(),
        field
    );
    terms
}
