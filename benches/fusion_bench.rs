//! Fusion and evaluation benchmarks
//!
//! Synthetic runs sized like a typical benchmark: 50 candidates per
//! retriever, a few hundred queries.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rankeval::eval::{evaluate, Qrels, Run};
use rankeval::search::ReciprocalRankFusion;

/// Deterministic ranked list of `len` IDs drawn from a pool of `pool` IDs
fn synthetic_list(seed: usize, len: usize, pool: usize) -> Vec<String> {
    (0..len)
        .map(|i| format!("doc{}", (seed * 7919 + i * 104_729) % pool))
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn benchmark_rrf_fusion(c: &mut Criterion) {
    let rrf = ReciprocalRankFusion::new();
    let mut group = c.benchmark_group("rrf_fusion");

    for list_len in [50, 200, 1000] {
        let lists = vec![
            synthetic_list(1, list_len, list_len * 4),
            synthetic_list(2, list_len, list_len * 4),
        ];
        group.bench_with_input(BenchmarkId::from_parameter(list_len), &lists, |b, lists| {
            b.iter(|| rrf.fuse(black_box(lists), 50));
        });
    }
    group.finish();
}

fn benchmark_evaluate(c: &mut Criterion) {
    let num_queries = 500;
    let mut run = Run::new();
    let mut qrels = Qrels::new();

    for q in 0..num_queries {
        let query_id = format!("q{}", q);
        let ranked = synthetic_list(q, 50, 2000);
        for (i, doc_id) in ranked.iter().step_by(7).enumerate() {
            qrels.insert(query_id.clone(), doc_id.clone(), (i % 3) as u32 + 1);
        }
        run.insert(query_id, ranked);
    }

    c.bench_function("evaluate_500_queries", |b| {
        b.iter(|| evaluate(black_box(&run), black_box(&qrels), 10, 10, 50));
    });
}

criterion_group!(benches, benchmark_rrf_fusion, benchmark_evaluate);
criterion_main!(benches);
