use std::collections::BTreeMap;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use claimscope::document::Document;
use claimscope::filter::FilterSpec;
use claimscope::search::Corpus;
use claimscope::vector::Embedding;

const STATUSES: [&str; 3] = ["Approved", "Denied", "Pending"];
const SPECIALTIES: [&str; 4] = ["Cardiology", "Pediatrics", "Orthopedics", "Dermatology"];

fn generate_corpus(count: usize, dimension: usize) -> Corpus {
    let mut documents = Vec::with_capacity(count);
    let mut embeddings: Vec<Embedding> = Vec::with_capacity(count);
    for i in 0..count {
        let mut metadata = BTreeMap::new();
        metadata.insert("claim_id".to_string(), format!("CLM-{i}"));
        metadata.insert("status".to_string(), STATUSES[i % STATUSES.len()].to_string());
        metadata.insert(
            "specialty".to_string(),
            SPECIALTIES[i % SPECIALTIES.len()].to_string(),
        );
        metadata.insert(
            "claim_date".to_string(),
            format!("2023-{:02}-{:02}", i % 12 + 1, i % 28 + 1),
        );
        documents.push(Document::new(format!("CLM-{i}_0"), format!("claim {i}"), metadata));

        let vector = (0..dimension)
            .map(|j| ((i as f32 * 0.1 + j as f32 * 0.01).sin() * 0.5 + 0.5) * 2.0 - 1.0)
            .collect();
        embeddings.push(vector);
    }
    match Corpus::build(documents, embeddings) {
        Ok(corpus) => corpus,
        Err(e) => panic!("failed to build benchmark corpus: {e}"),
    }
}

fn bench_search(c: &mut Criterion) {
    let dimension = 384;
    let mut group = c.benchmark_group("flat_search");

    for count in [1_000, 10_000] {
        let corpus = generate_corpus(count, dimension);
        let query: Vec<f32> = (0..dimension).map(|j| (j as f32 * 0.03).cos()).collect();
        let filters = FilterSpec::new()
            .with_status("denied")
            .with_start_date("2023-03-01")
            .with_end_date("2023-09-30");

        group.bench_with_input(BenchmarkId::new("unfiltered", count), &count, |b, _| {
            b.iter(|| corpus.search(black_box(&query), 10, None))
        });
        group.bench_with_input(BenchmarkId::new("filtered", count), &count, |b, _| {
            b.iter(|| corpus.search(black_box(&query), 10, Some(&filters)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
