//! M-Tree Demo
//!
//! This demonstrates the key properties of the M-tree:
//! 1. Exact k-NN and range search over an arbitrary metric (edit distance)
//! 2. Far fewer distance calls than a linear scan
//! 3. Structural self-check
//!
//! For comprehensive benchmarks, run: cargo run --release --bin benchmark

use m_tree::{CachedDistance, CountingDistance, Levenshtein, MTree, MTreeConfig};
use rand::distributions::Alphanumeric;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_word(rng: &mut ChaCha8Rng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║  M-Tree: metric-space index for range and k-NN search      ║");
    println!("╚════════════════════════════════════════════════════════════╝\n");

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let words: Vec<String> = (0..2000).map(|_| random_word(&mut rng, 12)).collect();

    let distance = CachedDistance::new(CountingDistance::new(Levenshtein));
    let mut tree: MTree<String, _> = MTree::with_config(distance, &MTreeConfig::default())?;

    println!("1. Inserting {} random words...\n", words.len());
    tree.extend(words.iter().cloned());

    let stats = tree.stats();
    println!("   Stored values:  {}", stats.size);
    println!("   Tree height:    {}", stats.height);
    println!("   Leaf nodes:     {}", stats.leaf_nodes);
    println!("   Internal nodes: {}", stats.internal_nodes);
    println!("   Distance calls: {}\n", tree.distance().inner().calls());

    println!("2. Querying for k-nearest neighbors...\n");

    let query = {
        let mut q = words[500].clone();
        q.replace_range(0..2, "zz");
        q
    };
    tree.distance().inner().reset_counter();
    let results = tree.knn_with_distances(&query, 5);

    println!("   Query: {:?}", query);
    for (i, hit) in results.iter().enumerate() {
        println!("     {}. {:?} (distance: {})", i + 1, hit.value, hit.distance);
    }
    println!(
        "   Distance calls: {} (linear scan: {})\n",
        tree.distance().inner().calls(),
        words.len()
    );

    println!("3. Range query (radius 9)...\n");

    tree.distance().inner().reset_counter();
    let within = tree.range(&query, 9.0).count();
    println!("   Matches: {}", within);
    println!("   Distance calls: {}\n", tree.distance().inner().calls());

    println!("4. Repeating the k-NN query...\n");

    tree.distance().inner().reset_counter();
    let again = tree.knn(&query, 5);
    println!("   Same answer: {}", again.len() == results.len());
    println!(
        "   New distance evaluations: {} (cached pairs: {})\n",
        tree.distance().inner().calls(),
        tree.distance().cached_pairs()
    );

    println!("5. Membership...\n");
    println!("   contains({:?}): {}", words[0], tree.contains(&words[0]));
    println!("   contains({:?}): {}\n", query, tree.contains(&query));

    println!("6. Structural integrity verification...\n");
    match tree.verify_integrity() {
        Ok(()) => println!("   Integrity check: PASSED ✓\n"),
        Err(e) => println!("   Integrity check: FAILED ✗ ({e})\n"),
    }

    println!("   Stats: {}", serde_json::to_string(&tree.stats())?);

    println!("\n════════════════════════════════════════════════════════════");
    println!("  For comprehensive benchmarks, run:");
    println!("  cargo run --release --bin benchmark");
    println!("════════════════════════════════════════════════════════════\n");

    Ok(())
}
