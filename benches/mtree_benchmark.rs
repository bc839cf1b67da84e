//! Criterion benchmarks for the M-tree

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use m_tree::{Levenshtein, MTree, Manhattan};
use rand::distributions::Alphanumeric;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_points(n: usize, dim: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(-100.0..100.0)).collect())
        .collect()
}

fn random_words(n: usize, len: usize, seed: u64) -> Vec<String> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect()
        })
        .collect()
}

fn benchmark_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for size in [100, 1000, 5000].iter() {
        let points = random_points(*size, 16, 7);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut tree = MTree::with_distance(Manhattan);
                for p in &points {
                    tree.insert(black_box(p.clone()));
                }
                tree
            });
        });
    }

    group.finish();
}

fn benchmark_knn(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn");

    let points = random_points(10_000, 16, 11);
    let tree = MTree::from_values(Manhattan, 16, points).expect("valid capacity");
    let query = random_points(1, 16, 99).remove(0);

    for k in [1, 10, 50].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(k), k, |b, k| {
            b.iter(|| tree.knn(black_box(&query), *k));
        });
    }

    group.finish();
}

fn benchmark_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("range");

    let points = random_points(10_000, 16, 13);
    let tree = MTree::from_values(Manhattan, 16, points).expect("valid capacity");
    let query = random_points(1, 16, 99).remove(0);

    for radius in [50.0, 200.0, 400.0].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(radius), radius, |b, r| {
            b.iter(|| tree.range(black_box(&query), *r).count());
        });
    }

    group.finish();
}

fn benchmark_edit_distance_knn(c: &mut Criterion) {
    let words = random_words(2_000, 10, 17);
    let tree = MTree::from_values(Levenshtein, 8, words).expect("valid capacity");
    let query = String::from("abcdefghij");

    c.bench_function("knn_levenshtein_k5", |b| {
        b.iter(|| tree.knn(black_box(&query), 5));
    });
}

criterion_group!(
    benches,
    benchmark_insert,
    benchmark_knn,
    benchmark_range,
    benchmark_edit_distance_knn
);
criterion_main!(benches);
