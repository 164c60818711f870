//! Performance benchmarks for FXQ
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use fxq::index::MemoryIndex;
use fxq::mapping::StaticMapping;
use fxq::search::{SearchContext, Searchable, SearcherOptions};

const SAMPLE_QUERIES: &[(&str, &str)] = &[
    ("term", r#"{"term": "rust", "field": "title", "boost": 2.0}"#),
    ("numeric_range", r#"{"min": 10, "max": 100, "field": "stars"}"#),
    ("geo_distance", r#"{"location": [-71.34, 41.12], "distance": "10km", "field": "loc"}"#),
    (
        "boolean",
        r#"{
            "must": {"conjuncts": [{"match": "memory safety"}, {"prefix": "own"}]},
            "should": {"disjuncts": [{"term": "tokio"}, {"term": "async"}], "min": 1},
            "must_not": {"query": "-java +go"}
        }"#,
    ),
];

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for (name, json) in SAMPLE_QUERIES {
        group.bench_with_input(BenchmarkId::from_parameter(name), json, |b, &json| {
            b.iter(|| fxq::decode_query(black_box(json)))
        });
    }
    group.finish();
}

fn bench_query_string_parsing(c: &mut Criterion) {
    let queries = vec![
        "simple",
        "two words",
        "\"exact phrase\"",
        "title:rust +async -java",
        "/ru.t/ stars:>=100",
        "tokio~2 hyper^3 created:>\"2024-01-01\"",
    ];

    let mut group = c.benchmark_group("query_string_parsing");
    for query in queries {
        group.bench_with_input(BenchmarkId::from_parameter(query), &query, |b, &q| {
            b.iter(|| fxq::query::parse_query_string(black_box(q)))
        });
    }
    group.finish();
}

fn bench_expand_and_compile(c: &mut Criterion) {
    let query = fxq::decode_query(SAMPLE_QUERIES[3].1).expect("sample query decodes");
    let index = MemoryIndex::new().with_terms("_all", ["async", "memory", "owner", "ownership", "rust", "safety", "tokio"]);
    let mapping = StaticMapping::new();
    let options = SearcherOptions::default();
    let ctx = SearchContext::new();

    c.bench_function("expand", |b| {
        b.iter(|| fxq::expand_query(black_box(query.clone())))
    });

    let expanded = fxq::expand_query(query.clone()).expect("sample query expands");
    c.bench_function("compile", |b| {
        b.iter(|| black_box(&expanded).compile(&ctx, &index, &mapping, &options))
    });
}

criterion_group!(
    benches,
    bench_decode,
    bench_query_string_parsing,
    bench_expand_and_compile,
);

criterion_main!(benches);
