//! Auxiliary results computed before the main search, such as KNN
//! candidates gathered from other shards.

use crate::error::PreSearchDecodeError;
use crate::search::{PlanNode, SearchPlan, SearcherOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Reserved key carrying approximate-nearest-neighbour candidates.
pub const KNN_PRE_SEARCH_DATA_KEY: &str = "_knn_pre_search_data_key";

/// One candidate hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMatch {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub index: String,
    pub id: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreSearchPayload {
    KnnHits(Vec<DocumentMatch>),
}

/// Decoded pre-search data, keyed by reserved identifier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreSearchData {
    entries: BTreeMap<String, PreSearchPayload>,
}

impl PreSearchData {
    pub fn get(&self, key: &str) -> Option<&PreSearchPayload> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn insert(&mut self, key: impl Into<String>, payload: PreSearchPayload) {
        self.entries.insert(key.into(), payload);
    }

    /// KNN candidates; empty when the key is absent or carried no hits.
    pub fn knn_hits(&self) -> &[DocumentMatch] {
        match self.entries.get(KNN_PRE_SEARCH_DATA_KEY) {
            Some(PreSearchPayload::KnnHits(hits)) => hits,
            None => &[],
        }
    }

    /// A plan matching exactly the KNN candidates with their scores, or
    /// `None` when there are none.
    pub fn knn_plan(&self, options: &SearcherOptions) -> Option<SearchPlan> {
        let hits = self.knn_hits();
        if hits.is_empty() {
            return None;
        }
        let scored = hits.iter().map(|hit| (hit.id.clone(), hit.score)).collect();
        Some(SearchPlan::new(PlanNode::ScoredDocs(scored), None, options))
    }
}

/// Decodes pre-search data from raw JSON bytes.
///
/// A `null` body is no data at all. A `null` KNN value yields the key with
/// no hits. Keys other than the reserved ones are ignored.
pub fn decode_pre_search(input: impl AsRef<[u8]>) -> Result<PreSearchData, PreSearchDecodeError> {
    let raw: Option<BTreeMap<String, Value>> = serde_json::from_slice(input.as_ref())?;
    let raw = raw.unwrap_or_default();
    let mut data = PreSearchData::default();

    for (key, value) in raw {
        if key != KNN_PRE_SEARCH_DATA_KEY {
            log::trace!("skipping pre-search key '{}'", key);
            continue;
        }
        let hits = match value {
            Value::Null => Vec::new(),
            value => serde_json::from_value(value)
                .map_err(|source| PreSearchDecodeError::Payload { key: key.clone(), source })?,
        };
        log::debug!("pre-search data carries {} knn hits", hits.len());
        data.insert(key, PreSearchPayload::KnnHits(hits));
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_knn_is_present_but_empty() {
        let data = decode_pre_search(r#"{"_knn_pre_search_data_key": null}"#).unwrap();
        assert!(data.contains_key(KNN_PRE_SEARCH_DATA_KEY));
        assert_eq!(data.get(KNN_PRE_SEARCH_DATA_KEY), Some(&PreSearchPayload::KnnHits(Vec::new())));
        assert!(data.knn_hits().is_empty());
    }

    #[test]
    fn test_null_body_is_empty() {
        let data = decode_pre_search("null").unwrap();
        assert!(data.is_empty());
        assert!(data.knn_hits().is_empty());

        assert!(decode_pre_search("[1]").is_err());
    }

    #[test]
    fn test_unrelated_keys_are_ignored() {
        let data = decode_pre_search(r#"{"unrelated": 1}"#).unwrap();
        assert!(data.is_empty());
        assert!(data.knn_hits().is_empty());
        assert!(data.knn_plan(&SearcherOptions::default()).is_none());
    }

    #[test]
    fn test_knn_hits() {
        let data = decode_pre_search(
            r#"{"_knn_pre_search_data_key": [
                {"id": "a", "score": 0.9, "index": "shard-1"},
                {"id": "b", "score": 0.4}
            ], "other": {}}"#,
        )
        .unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data.knn_hits()[0].index, "shard-1");

        let plan = data.knn_plan(&SearcherOptions::default()).unwrap();
        assert_eq!(
            plan.node,
            PlanNode::ScoredDocs(vec![("a".to_string(), 0.9), ("b".to_string(), 0.4)])
        );
    }

    #[test]
    fn test_bad_payload_names_key() {
        let err = decode_pre_search(r#"{"_knn_pre_search_data_key": 7}"#).unwrap_err();
        assert!(err.to_string().contains(KNN_PRE_SEARCH_DATA_KEY));

        assert!(matches!(
            decode_pre_search("[]"),
            Err(PreSearchDecodeError::Json(_))
        ));
    }
}
