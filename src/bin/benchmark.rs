//! M-Tree Benchmark Suite
//!
//! Measures:
//! 1. Insertion throughput and distance calls per insert
//! 2. k-NN query latency, recall against a linear scan, distance calls
//! 3. Range query latency and distance calls
//! 4. Scaling behavior as the tree grows

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use instant::Instant;
use m_tree::{CountingDistance, MTree, Manhattan};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

type Point = Vec<f64>;

#[derive(Parser, Debug, Clone)]
#[command(name = "benchmark")]
#[command(about = "M-tree insertion and query benchmarks against a linear scan")]
struct BenchmarkConfig {
    /// Number of points to index
    #[arg(short = 'n', long, default_value_t = 10_000)]
    num_points: usize,

    /// Dimension of each point
    #[arg(short, long, default_value_t = 8)]
    dimension: usize,

    /// Maximum entries per node
    #[arg(short, long, default_value_t = 16)]
    capacity: usize,

    /// Number of k-NN and range queries
    #[arg(short, long, default_value_t = 200)]
    queries: usize,

    /// Neighbors per k-NN query
    #[arg(short, long, default_value_t = 10)]
    k: usize,

    /// Range query radius
    #[arg(short, long, default_value_t = 4.0)]
    radius: f64,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Also run the scaling benchmark
    #[arg(long)]
    scaling: bool,
}

#[derive(Debug)]
struct BenchmarkResults {
    insert_time_per_point_us: f64,
    insert_calls_per_point: f64,
    knn_time_per_query_us: f64,
    knn_calls_per_query: f64,
    range_time_per_query_us: f64,
    range_calls_per_query: f64,
    recall_at_k: f64,
    tree_height: usize,
    node_count: usize,
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let template = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta})";
    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        pb.set_style(style);
    }
    pb
}

/// Generate points clustered around random centers
fn generate_clustered_points(
    rng: &mut ChaCha8Rng,
    num_points: usize,
    dim: usize,
    num_clusters: usize,
) -> anyhow::Result<Vec<Point>> {
    let normal = Normal::new(0.0, 1.0)?;

    let centers: Vec<Point> = (0..num_clusters)
        .map(|_| (0..dim).map(|_| normal.sample(rng) * 10.0).collect())
        .collect();

    Ok((0..num_points)
        .map(|id| {
            let center = &centers[id % num_clusters];
            center.iter().map(|c| c + normal.sample(rng)).collect()
        })
        .collect())
}

/// Distances from `query` to every point, ascending
fn linear_scan(points: &[Point], query: &Point) -> Vec<f64> {
    let mut distances: Vec<f64> = points
        .iter()
        .map(|p| p.iter().zip(query).map(|(a, b)| (a - b).abs()).sum())
        .collect();
    distances.sort_by(|a, b| a.total_cmp(b));
    distances
}

/// Fraction of the true k-th distances matched by the tree's answer
fn compute_recall(tree_distances: &[f64], ground_truth: &[f64], k: usize) -> f64 {
    let matched = tree_distances
        .iter()
        .zip(ground_truth.iter().take(k))
        .filter(|(a, b)| (*a - *b).abs() <= 1e-9)
        .count();
    matched as f64 / k.max(1) as f64
}

fn run_benchmark(config: &BenchmarkConfig) -> anyhow::Result<BenchmarkResults> {
    println!("\n========================================");
    println!("  M-Tree Benchmark Suite");
    println!("========================================\n");

    println!("Configuration:");
    println!("  Points: {}", config.num_points);
    println!("  Dimension: {}", config.dimension);
    println!("  Node capacity: {}", config.capacity);
    println!("  Queries: {}", config.queries);
    println!("  k: {}", config.k);
    println!("  Radius: {}", config.radius);
    println!();

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    println!("Generating {} clustered points...", config.num_points);
    let points = generate_clustered_points(&mut rng, config.num_points, config.dimension, 20)?;

    let mut tree: MTree<Point, _> = MTree::new(CountingDistance::new(Manhattan), config.capacity)?;

    // Insertion
    println!("\n--- Insertion Benchmark ---");
    let pb = progress_bar(points.len());
    let insert_start = Instant::now();
    for p in &points {
        tree.insert(p.clone());
        pb.inc(1);
    }
    let insert_time = insert_start.elapsed();
    pb.finish_with_message("Done");

    let n = config.num_points.max(1) as f64;
    let insert_time_per_point_us = insert_time.as_micros() as f64 / n;
    let insert_calls_per_point = tree.distance().calls() as f64 / n;

    println!("  Total time: {:.2} ms", insert_time.as_secs_f64() * 1000.0);
    println!("  Per point: {:.2} µs", insert_time_per_point_us);
    println!("  Distance calls per point: {:.1}", insert_calls_per_point);

    let stats = tree.stats();
    println!("\nTree Statistics:");
    println!("  Height: {}", stats.height);
    println!("  Leaf nodes: {}", stats.leaf_nodes);
    println!("  Internal nodes: {}", stats.internal_nodes);

    let query_indices: Vec<usize> = if points.is_empty() {
        Vec::new()
    } else {
        (0..config.queries)
            .map(|_| rng.gen_range(0..points.len()))
            .collect()
    };
    let queries: Vec<Point> = query_indices
        .iter()
        .map(|&i| points[i].iter().map(|x| x + 0.5).collect())
        .collect();
    let q = config.queries.max(1) as f64;

    // k-NN
    println!("\n--- k-NN Benchmark ---");
    let pb = progress_bar(queries.len());
    let mut total_recall = 0.0;
    let mut knn_calls = 0usize;
    let mut knn_time = std::time::Duration::ZERO;
    for query in &queries {
        tree.distance().reset_counter();
        let start = Instant::now();
        let hits = tree.knn_with_distances(query, config.k);
        knn_time += start.elapsed();
        knn_calls += tree.distance().calls();

        let found: Vec<f64> = hits.iter().map(|h| h.distance).collect();
        total_recall += compute_recall(&found, &linear_scan(&points, query), config.k);
        pb.inc(1);
    }
    pb.finish_with_message("Done");

    let knn_time_per_query_us = knn_time.as_micros() as f64 / q;
    let knn_calls_per_query = knn_calls as f64 / q;
    let recall_at_k = total_recall / q;

    println!("  Per query: {:.2} µs", knn_time_per_query_us);
    println!(
        "  Distance calls per query: {:.1} (linear scan: {})",
        knn_calls_per_query, config.num_points
    );
    println!("  Recall@{}: {:.2}%", config.k, recall_at_k * 100.0);

    // Range
    println!("\n--- Range Benchmark ---");
    let mut range_calls = 0usize;
    let mut range_hits = 0usize;
    let range_start = Instant::now();
    for query in &queries {
        tree.distance().reset_counter();
        range_hits += tree.range(query, config.radius).count();
        range_calls += tree.distance().calls();
    }
    let range_time = range_start.elapsed();

    let range_time_per_query_us = range_time.as_micros() as f64 / q;
    let range_calls_per_query = range_calls as f64 / q;

    println!("  Per query: {:.2} µs", range_time_per_query_us);
    println!("  Avg matches: {:.1}", range_hits as f64 / q);
    println!("  Distance calls per query: {:.1}", range_calls_per_query);

    // Integrity
    println!("\n--- Integrity Check ---");
    match tree.verify_integrity() {
        Ok(()) => println!("  Structure: PASSED ✓"),
        Err(e) => println!("  Structure: FAILED ✗ ({e})"),
    }

    Ok(BenchmarkResults {
        insert_time_per_point_us,
        insert_calls_per_point,
        knn_time_per_query_us,
        knn_calls_per_query,
        range_time_per_query_us,
        range_calls_per_query,
        recall_at_k,
        tree_height: stats.height,
        node_count: stats.leaf_nodes + stats.internal_nodes,
    })
}

fn run_scaling_benchmark(base: &BenchmarkConfig) -> anyhow::Result<()> {
    println!("\n========================================");
    println!("  Scaling Benchmark");
    println!("========================================\n");

    let sizes = [1_000, 5_000, 10_000, 25_000];
    let mut rows = Vec::with_capacity(sizes.len());

    for n in sizes {
        let config = BenchmarkConfig {
            num_points: n,
            queries: 100,
            ..base.clone()
        };
        rows.push((n, run_benchmark(&config)?));
    }

    println!(
        "\n{:>10} {:>12} {:>14} {:>10} {:>10}",
        "N", "k-NN µs", "k-NN calls", "Height", "Nodes"
    );
    println!("{:-<60}", "");
    for (n, results) in rows {
        println!(
            "{:>10} {:>12.1} {:>14.1} {:>10} {:>10}",
            n,
            results.knn_time_per_query_us,
            results.knn_calls_per_query,
            results.tree_height,
            results.node_count
        );
    }

    println!("\nNote: distance calls per query should grow far slower than N");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let config = BenchmarkConfig::parse();

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║         M-Tree: Metric-Space Index Benchmarks              ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let results = run_benchmark(&config)?;

    println!("\n========================================");
    println!("  Summary");
    println!("========================================");
    println!();
    println!("Performance:");
    println!(
        "  Insert throughput: {:.0} points/sec",
        1_000_000.0 / results.insert_time_per_point_us.max(f64::EPSILON)
    );
    println!("  k-NN latency:      {:.1} µs", results.knn_time_per_query_us);
    println!("  Range latency:     {:.1} µs", results.range_time_per_query_us);
    println!();
    println!("Distance calls:");
    println!("  Per insert:        {:.1}", results.insert_calls_per_point);
    println!(
        "  Per k-NN query:    {:.1} ({:.1}% of a linear scan)",
        results.knn_calls_per_query,
        100.0 * results.knn_calls_per_query / config.num_points.max(1) as f64
    );
    println!("  Per range query:   {:.1}", results.range_calls_per_query);
    println!();
    println!("Accuracy:");
    println!("  Recall@{}: {:.1}%", config.k, results.recall_at_k * 100.0);

    if config.scaling {
        run_scaling_benchmark(&config)?;
    }

    println!("\n✓ Benchmarks complete!");
    Ok(())
}
