//! Field types and analyzers, as seen by query compilation.

use crate::analysis::{Analyzer, KeywordAnalyzer, SimpleAnalyzer, StandardAnalyzer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// How a field is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Numeric,
    DateTime,
    Boolean,
    GeoPoint,
    GeoShape,
    Ip,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Numeric => "numeric",
            FieldType::DateTime => "datetime",
            FieldType::Boolean => "boolean",
            FieldType::GeoPoint => "geopoint",
            FieldType::GeoShape => "geoshape",
            FieldType::Ip => "ip",
        };
        f.write_str(name)
    }
}

/// Resolves field types and analyzers for a single index.
pub trait IndexMapping: Send + Sync {
    /// Field searched by queries that do not name one.
    fn default_search_field(&self) -> &str;

    /// `None` for a field the mapping does not know.
    fn field_type(&self, field: &str) -> Option<FieldType>;

    fn analyzer_named(&self, name: &str) -> Option<Arc<dyn Analyzer>>;

    fn analyzer_for_field(&self, field: &str) -> Arc<dyn Analyzer>;

    /// Layouts (chrono format strings) of a named date-time parser.
    fn date_time_formats(&self, _name: &str) -> Option<Vec<String>> {
        None
    }

    /// Whether unknown fields are allowed.
    fn is_dynamic(&self) -> bool {
        true
    }
}

/// A mapping built up front from explicit tables.
///
/// ```
/// use fxq::mapping::{FieldType, StaticMapping};
///
/// let mapping = StaticMapping::new()
///     .with_field("stars", FieldType::Numeric)
///     .with_field_analyzer("tag", "keyword");
/// ```
#[derive(Clone)]
pub struct StaticMapping {
    default_field: String,
    default_analyzer: String,
    fields: HashMap<String, FieldType>,
    field_analyzers: HashMap<String, String>,
    analyzers: HashMap<String, Arc<dyn Analyzer>>,
    date_time_parsers: HashMap<String, Vec<String>>,
    dynamic: bool,
}

impl Default for StaticMapping {
    fn default() -> Self {
        let mut analyzers: HashMap<String, Arc<dyn Analyzer>> = HashMap::new();
        analyzers.insert("keyword".to_string(), Arc::new(KeywordAnalyzer));
        analyzers.insert("simple".to_string(), Arc::new(SimpleAnalyzer));
        analyzers.insert("standard".to_string(), Arc::new(StandardAnalyzer));

        Self {
            default_field: "_all".to_string(),
            default_analyzer: "standard".to_string(),
            fields: HashMap::new(),
            field_analyzers: HashMap::new(),
            analyzers,
            date_time_parsers: HashMap::new(),
            dynamic: true,
        }
    }
}

impl StaticMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_field(mut self, field: impl Into<String>) -> Self {
        self.default_field = field.into();
        self
    }

    pub fn with_field(mut self, field: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(field.into(), field_type);
        self
    }

    /// Maps a text field and analyzes it with the named analyzer.
    pub fn with_field_analyzer(mut self, field: impl Into<String>, analyzer: impl Into<String>) -> Self {
        let field = field.into();
        self.fields.insert(field.clone(), FieldType::Text);
        self.field_analyzers.insert(field, analyzer.into());
        self
    }

    pub fn with_analyzer(mut self, name: impl Into<String>, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzers.insert(name.into(), analyzer);
        self
    }

    pub fn with_date_time_parser(mut self, name: impl Into<String>, formats: Vec<String>) -> Self {
        self.date_time_parsers.insert(name.into(), formats);
        self
    }

    /// Rejects fields that were not mapped explicitly.
    pub fn strict(mut self) -> Self {
        self.dynamic = false;
        self
    }
}

impl IndexMapping for StaticMapping {
    fn default_search_field(&self) -> &str {
        &self.default_field
    }

    fn field_type(&self, field: &str) -> Option<FieldType> {
        self.fields.get(field).copied()
    }

    fn analyzer_named(&self, name: &str) -> Option<Arc<dyn Analyzer>> {
        self.analyzers.get(name).cloned()
    }

    fn analyzer_for_field(&self, field: &str) -> Arc<dyn Analyzer> {
        let name = self
            .field_analyzers
            .get(field)
            .unwrap_or(&self.default_analyzer);
        match self.analyzers.get(name) {
            Some(analyzer) => analyzer.clone(),
            None => {
                log::warn!("analyzer '{}' for field '{}' is not registered, using standard", name, field);
                Arc::new(StandardAnalyzer)
            }
        }
    }

    fn date_time_formats(&self, name: &str) -> Option<Vec<String>> {
        self.date_time_parsers.get(name).cloned()
    }

    fn is_dynamic(&self) -> bool {
        self.dynamic
    }
}

impl fmt::Debug for StaticMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut analyzers: Vec<&String> = self.analyzers.keys().collect();
        analyzers.sort();
        f.debug_struct("StaticMapping")
            .field("default_field", &self.default_field)
            .field("fields", &self.fields)
            .field("analyzers", &analyzers)
            .field("dynamic", &self.dynamic)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let mapping = StaticMapping::new();
        assert_eq!(mapping.default_search_field(), "_all");
        assert!(mapping.is_dynamic());
        assert!(mapping.analyzer_named("keyword").is_some());
        assert!(mapping.analyzer_named("klingon").is_none());
        assert!(mapping.date_time_formats("iso").is_none());
    }

    #[test]
    fn test_field_analyzer() {
        let mapping = StaticMapping::new().with_field_analyzer("tag", "keyword");
        let tokens = mapping.analyzer_for_field("tag").analyze("New York");
        assert_eq!(tokens.len(), 1);
        assert_eq!(mapping.field_type("tag"), Some(FieldType::Text));

        let tokens = mapping.analyzer_for_field("body").analyze("New York");
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_unregistered_analyzer_falls_back() {
        let mapping = StaticMapping::new().with_field_analyzer("tag", "missing");
        let tokens = mapping.analyzer_for_field("tag").analyze("the fox");
        assert_eq!(tokens.len(), 1);
    }
}
