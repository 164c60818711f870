//! Integration tests for expansion, dumping, pre-search decoding and
//! compilation against the in-memory collaborators.

use fxq::analysis::SimpleAnalyzer;
use fxq::index::MemoryIndex;
use fxq::mapping::{FieldType, StaticMapping};
use fxq::presearch::{KNN_PRE_SEARCH_DATA_KEY, PreSearchPayload};
use fxq::query::{Query, QueryKind, decode_query, dump_query, expand_query};
use fxq::search::{PlanNode, SearchContext, Searchable, SearcherOptions};
use fxq::{CompileError, decode_pre_search};
use serde_json::Value;
use std::sync::Arc;

fn sample_index() -> MemoryIndex {
    let mut index = MemoryIndex::new();
    let docs = [
        ("1", "Rust ownership and borrowing", "rust systems"),
        ("2", "Async Rust with Tokio", "rust async"),
        ("3", "Trusty old Java", "java"),
    ];
    for (id, title, tags) in docs {
        index.index_document(id, &[("title", title), ("tags", tags)], &SimpleAnalyzer);
    }
    index
}

fn sample_mapping() -> StaticMapping {
    StaticMapping::new()
        .with_default_field("title")
        .with_field("title", FieldType::Text)
        .with_field_analyzer("tags", "keyword")
        .with_field("stars", FieldType::Numeric)
        .with_field("created", FieldType::DateTime)
        .with_field("published", FieldType::Boolean)
        .with_field("loc", FieldType::GeoPoint)
        .with_field("addr", FieldType::Ip)
        .with_date_time_parser("day", vec!["%d/%m/%Y".to_string()])
}

fn compile(query: &Query) -> Result<fxq::search::SearchPlan, CompileError> {
    query.compile(
        &SearchContext::new(),
        &sample_index(),
        &sample_mapping(),
        &SearcherOptions::default(),
    )
}

#[test]
fn test_expansion_is_identity_without_query_strings() {
    let query = decode_query(
        r#"{"must": {"conjuncts": [{"term": "a"}, {"prefix": "b"}]}, "should": {"match": "c"}}"#,
    )
    .unwrap();
    assert_eq!(expand_query(query.clone()).unwrap(), query);
}

#[test]
fn test_expansion_rewrites_only_query_string_leaves() {
    let query = decode_query(
        r#"{"must": {"conjuncts": [{"term": "a"}, {"query": "title:rust"}, {"prefix": "b"}]}}"#,
    )
    .unwrap();
    let expanded = expand_query(query).unwrap();
    assert!(!expanded.has_query_string());

    let Query::Boolean(b) = &expanded else {
        panic!("expected boolean");
    };
    assert!(b.should.is_none() && b.must_not.is_none());
    let Some(Query::Conjunction(c)) = b.must.as_deref() else {
        panic!("expected conjunction");
    };
    let kinds: Vec<QueryKind> = c.conjuncts.iter().map(Query::kind).collect();
    assert_eq!(
        kinds,
        vec![QueryKind::Term, QueryKind::Boolean, QueryKind::Prefix]
    );
}

#[test]
fn test_expansion_failure_names_text() {
    let query = decode_query(r#"{"disjuncts": [{"query": "ok"}, {"query": "title:\"open"}]}"#).unwrap();
    let err = expand_query(query).unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("disjuncts[1]: "), "{}", message);
    assert!(message.contains(r#"'title:"open'"#), "{}", message);
}

#[test]
fn test_dump_output_is_json() {
    let query = decode_query(r#"{"conjuncts": [{"query": "+rust tokio^2"}, {"min": 10}]}"#).unwrap();
    let dumped = dump_query(&query).unwrap();

    let value: Value = serde_json::from_str(&dumped).unwrap();
    assert!(value["conjuncts"].is_array());
    assert_eq!(decode_query(&dumped).unwrap(), expand_query(query).unwrap());
}

#[test]
fn test_pre_search_permissiveness() {
    let data = decode_pre_search(format!(r#"{{"{}": null}}"#, KNN_PRE_SEARCH_DATA_KEY)).unwrap();
    assert_eq!(
        data.get(KNN_PRE_SEARCH_DATA_KEY),
        Some(&PreSearchPayload::KnnHits(Vec::new()))
    );

    let data = decode_pre_search(r#"{"unrelated": 1}"#).unwrap();
    assert!(data.is_empty());
    assert!(data.knn_hits().is_empty());
}

#[test]
fn test_compile_query_string_against_dictionary() {
    let query = decode_query(r#"{"query": "+rust -java tok*"}"#).unwrap();
    let plan = compile(&query).unwrap();

    let PlanNode::Boolean {
        must,
        should,
        must_not,
    } = &plan.node
    else {
        panic!("expected boolean plan, got {:?}", plan.node);
    };
    assert!(must.is_some() && should.is_some() && must_not.is_some());
}

#[test]
fn test_compile_fuzzy_and_prefix_expand_terms() {
    let fuzzy = decode_query(r#"{"term": "rusty", "fuzziness": 1, "field": "title"}"#).unwrap();
    let PlanNode::TermSet { terms, .. } = compile(&fuzzy).unwrap().node else {
        panic!("expected term set");
    };
    assert_eq!(terms, vec!["rust", "trusty"]);

    let prefix = decode_query(r#"{"prefix": "bo"}"#).unwrap();
    let PlanNode::TermSet { field, terms } = compile(&prefix).unwrap().node else {
        panic!("expected term set");
    };
    assert_eq!(field, "title");
    assert_eq!(terms, vec!["borrowing"]);

    let nothing = decode_query(r#"{"regexp": "z.*"}"#).unwrap();
    assert!(compile(&nothing).unwrap().is_match_none());
}

#[test]
fn test_compile_match_uses_field_analyzer() {
    let keyword = decode_query(r#"{"match": "rust async", "field": "tags"}"#).unwrap();
    let PlanNode::Term { term, .. } = compile(&keyword).unwrap().node else {
        panic!("expected a single term");
    };
    assert_eq!(term, "rust async");

    let text = decode_query(r#"{"match": "Rust Tokio", "operator": "and"}"#).unwrap();
    let PlanNode::Conjunction(children) = compile(&text).unwrap().node else {
        panic!("expected conjunction");
    };
    assert_eq!(children.len(), 2);

    let unknown = decode_query(r#"{"match": "x", "analyzer": "klingon"}"#).unwrap();
    assert!(matches!(
        compile(&unknown),
        Err(CompileError::UnknownAnalyzer(name)) if name == "klingon"
    ));
}

#[test]
fn test_compile_checks_field_types() {
    let ok = decode_query(r#"{"min": 10, "field": "stars"}"#).unwrap();
    assert!(matches!(
        compile(&ok).unwrap().node,
        PlanNode::NumericRange { .. }
    ));

    let wrong = decode_query(r#"{"cidr": "10.0.0.0/8", "field": "stars"}"#).unwrap();
    assert!(matches!(
        compile(&wrong),
        Err(CompileError::FieldType {
            kind: QueryKind::IpRange,
            ..
        })
    ));

    let ip = decode_query(r#"{"cidr": "10.1.2.3/16", "field": "addr"}"#).unwrap();
    let PlanNode::IpRange { prefix_len, .. } = compile(&ip).unwrap().node else {
        panic!("expected ip range");
    };
    assert_eq!(prefix_len, 16);
}

#[test]
fn test_compile_date_range_with_named_parser() {
    let q = decode_query(
        r#"{"start": "01/02/2024", "datetime_parser": "day", "field": "created"}"#,
    )
    .unwrap();
    let PlanNode::DateRange { start, end, .. } = compile(&q).unwrap().node else {
        panic!("expected date range");
    };
    assert_eq!(start.unwrap().to_rfc3339(), "2024-02-01T00:00:00+00:00");
    assert!(end.is_none());

    let q = decode_query(r#"{"start": "2024-01-01", "datetime_parser": "nope", "field": "created"}"#).unwrap();
    assert!(matches!(
        compile(&q),
        Err(CompileError::UnknownDateTimeParser(_))
    ));
}

#[test]
fn test_compile_reports_invalid_queries() {
    let q = decode_query(r#"{"polygon_points": [[0.0, 0.0], [1.0, 1.0]], "field": "loc"}"#).unwrap();
    assert!(q.validate().is_err());
    assert!(matches!(compile(&q), Err(CompileError::Invalid(_))));

    let q = decode_query(r#"{"disjuncts": [{"term": "a"}], "min": 3}"#).unwrap();
    assert!(matches!(compile(&q), Err(CompileError::Invalid(_))));
}

#[test]
fn test_custom_parser_applies_only_through_expansion() {
    let query = decode_query(r#"{"query": "rust"}"#).unwrap();
    let keyword = |text: &str| -> Result<Query, fxq::GrammarParseError> {
        Ok(Query::from(fxq::query::TermQuery::new(text).with_field("tags")))
    };

    let direct = compile(&query).unwrap();
    assert!(matches!(direct.node, PlanNode::Boolean { .. }));

    let expanded = fxq::query::Expander::new(&keyword).expand(query).unwrap();
    let PlanNode::Term { field, term } = compile(&expanded).unwrap().node else {
        panic!("expected a term plan");
    };
    assert_eq!((field.as_str(), term.as_str()), ("tags", "rust"));
}

#[test]
fn test_boolean_with_only_exclusions_runs_against_everything() {
    let q = decode_query(r#"{"must_not": {"term": "java"}}"#).unwrap();
    let PlanNode::Boolean { must, .. } = compile(&q).unwrap().node else {
        panic!("expected boolean");
    };
    assert_eq!(must.map(|plan| plan.node), Some(PlanNode::MatchAll));
}

#[test]
fn test_cancelled_context_stops_compilation() {
    let ctx = SearchContext::new();
    ctx.cancel();
    let q = decode_query(r#"{"term": "rust"}"#).unwrap();
    let result = q.compile(&ctx, &sample_index(), &sample_mapping(), &SearcherOptions::default());
    assert!(matches!(result, Err(CompileError::Cancelled)));
}

#[test]
fn test_options_reach_every_plan_node() {
    let options: SearcherOptions =
        serde_json::from_str(r#"{"explain": true, "shard_hint": "eu-1"}"#).unwrap();
    let q = decode_query(r#"{"conjuncts": [{"term": "a"}, {"term": "b"}]}"#).unwrap();
    let plan = q
        .compile(&SearchContext::new(), &sample_index(), &sample_mapping(), &options)
        .unwrap();

    let PlanNode::Conjunction(children) = &plan.node else {
        panic!("expected conjunction");
    };
    for child in children.iter().chain(std::iter::once(&plan)) {
        assert!(child.options.explain);
        assert_eq!(child.options.extra["shard_hint"], "eu-1");
    }
}

#[test]
fn test_trees_compile_concurrently() {
    let query = Arc::new(
        expand_query(decode_query(r#"{"query": "rust tok* -java"}"#).unwrap()).unwrap(),
    );
    let index = Arc::new(sample_index());
    let mapping = Arc::new(sample_mapping());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let (query, index, mapping) = (query.clone(), index.clone(), mapping.clone());
            std::thread::spawn(move || {
                query
                    .compile(
                        &SearchContext::new(),
                        index.as_ref(),
                        mapping.as_ref(),
                        &SearcherOptions::default(),
                    )
                    .map(|plan| plan.size())
            })
        })
        .collect();

    let sizes: Vec<usize> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    assert!(sizes.windows(2).all(|w| w[0] == w[1]));
}
