//! Criterion benchmarks for the per-request hot path.
//!
//! - hash_embedding: query-sized and record-sized texts
//! - index_search: exact L2 scan over synthetic catalogs
//! - rerank_heuristic: intent extraction, filtering, selection and explanation

use std::collections::BTreeSet;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use arec::catalog::{CatalogRecord, Category};
use arec::rerank::{HeuristicGenerator, Reranker, ResultBounds};
use arec::search::{CatalogIndex, Embedder, HashEmbedder};
use arec::test_utils::sample_catalog;

fn synthetic_catalog(n: usize) -> Vec<CatalogRecord> {
    let topics = ["Java", "Python", "SQL", "Teamwork", "Leadership", "Numerical", "Sales"];
    (0..n)
        .map(|i| {
            let topic = topics[i % topics.len()];
            CatalogRecord {
                id: format!("rec-{i}"),
                name: format!("{topic} Assessment {i}"),
                url: format!("https://catalog.example.com/view/rec-{i}/"),
                description: format!("Measures {topic} ability for role family {}.", i % 13),
                category: if i % 2 == 0 {
                    Category::KnowledgeSkills
                } else {
                    Category::PersonalityBehavior
                },
                job_levels: BTreeSet::from(["Mid-Professional".to_string()]),
                languages: BTreeSet::new(),
                duration_minutes: Some(10 + (i % 50) as u32),
            }
        })
        .collect()
}

fn hash_embedding_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_embedding");
    let embedder = HashEmbedder::default();

    for words in [8usize, 64, 250] {
        let input = "collaborative java developer ".repeat(words / 3 + 1);
        let input = embedder.truncate(&input).into_owned();
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("words", words), &input, |b, input| {
            b.iter(|| embedder.embed(black_box(input)));
        });
    }
    group.finish();
}

fn index_search_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_search");
    let embedder = HashEmbedder::default();
    let query = embedder
        .embed("Java developer who can collaborate effectively, 40 minutes")
        .unwrap_or_default();

    for n in [500usize, 5_000] {
        let Ok(index) = CatalogIndex::build(synthetic_catalog(n), &embedder) else {
            continue;
        };
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("records", n), &index, |b, index| {
            b.iter(|| index.search(black_box(&query), 20));
        });
    }
    group.finish();
}

fn rerank_benchmarks(c: &mut Criterion) {
    let reranker = Reranker::new(Box::new(HeuristicGenerator), ResultBounds::default());
    let candidates = sample_catalog();
    c.bench_function("rerank_heuristic", |b| {
        b.iter(|| {
            reranker.rerank(
                black_box("Java developer who can collaborate effectively, 40 minutes"),
                black_box(&candidates),
            )
        });
    });
}

criterion_group!(
    benches,
    hash_embedding_benchmarks,
    index_search_benchmarks,
    rerank_benchmarks
);
criterion_main!(benches);
