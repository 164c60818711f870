use super::IndexReader;
use crate::analysis::Analyzer;
use std::collections::{BTreeMap, BTreeSet};

/// In-memory term dictionary, for tests and tooling.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    fields: BTreeMap<String, BTreeSet<String>>,
    ids: BTreeSet<String>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds raw terms to a field's dictionary.
    pub fn with_terms<I, S>(mut self, field: &str, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .entry(field.to_string())
            .or_default()
            .extend(terms.into_iter().map(Into::into));
        self
    }

    /// Analyzes each `(field, text)` pair and adds the resulting terms.
    /// Re-indexing an id adds its terms again without counting it twice.
    pub fn index_document(&mut self, id: &str, fields: &[(&str, &str)], analyzer: &dyn Analyzer) {
        for (field, text) in fields {
            let dictionary = self.fields.entry(field.to_string()).or_default();
            dictionary.extend(analyzer.analyze(text).into_iter().map(|token| token.term));
        }
        if !self.ids.insert(id.to_string()) {
            log::debug!("document '{}' indexed again", id);
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl IndexReader for MemoryIndex {
    fn doc_count(&self) -> u64 {
        self.ids.len() as u64
    }

    fn terms<'a>(&'a self, field: &str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        match self.fields.get(field) {
            Some(terms) => Box::new(terms.iter().map(String::as_str)),
            None => Box::new(std::iter::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SimpleAnalyzer;

    #[test]
    fn test_terms_are_sorted_and_deduplicated() {
        let index = MemoryIndex::new().with_terms("tag", ["b", "a", "b"]);
        assert_eq!(index.terms("tag").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(index.terms("missing").count(), 0);
    }

    #[test]
    fn test_index_document() {
        let mut index = MemoryIndex::new();
        index.index_document("1", &[("title", "Rust Book"), ("body", "ownership")], &SimpleAnalyzer);
        index.index_document("1", &[("title", "Rust")], &SimpleAnalyzer);
        index.index_document("2", &[("title", "Go Tour")], &SimpleAnalyzer);

        assert_eq!(index.doc_count(), 2);
        assert_eq!(
            index.terms("title").collect::<Vec<_>>(),
            vec!["book", "go", "rust", "tour"]
        );
        assert_eq!(index.field_names().collect::<Vec<_>>(), vec!["body", "title"]);
    }
}
