//! Property tests over random insertion sequences. Each case builds a
//! tree with arbitrary (but small, for runtime's sake) dimension and
//! capacity parameters, inserts an arbitrary number of random vectors,
//! and re-checks the structural invariants after every single insert
//! rather than only at the end.

use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::{check_cluster_centroid_means, check_invariants, count_dfs};
use crate::{Tree, TreeConfig};

fn random_vector(rng: &mut SmallRng, dim: usize) -> Vec<f32> {
    (0..dim).map(|_| rng.gen_range(-50.0f32..50.0)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Invariants 1 (identity), 3 (capacity), 4 (structural coherence), 5
    /// (height uniformity), and 6 (leaf centroid equality) hold after
    /// every insert of an arbitrary random sequence.
    #[test]
    fn structural_invariants_after_every_insert(
        dim in 1usize..=8,
        max_vectors in 2u32..=6,
        max_centroids in 2u32..=6,
        seed in any::<u64>(),
        n in 1usize..80,
    ) {
        let config = TreeConfig::new(dim).max_vectors(max_vectors).max_centroids(max_centroids);
        let mut tree = Tree::new(config);
        let mut rng = SmallRng::seed_from_u64(seed);

        for i in 0..n {
            let v = random_vector(&mut rng, dim);
            let vid = tree.insert(&v).unwrap();
            prop_assert_eq!(vid as usize, i, "VectorIds must be dense and monotonic");
            check_invariants(&tree);
        }
    }

    /// Invariant 7: every cluster's incrementally maintained centroid
    /// tracks the true mean of the vectors it holds, independent of how
    /// many splits it has been through.
    #[test]
    fn cluster_centroids_track_true_mean(
        dim in 1usize..=6,
        max_vectors in 2u32..=6,
        max_centroids in 2u32..=6,
        seed in any::<u64>(),
        n in 1usize..60,
    ) {
        let config = TreeConfig::new(dim).max_vectors(max_vectors).max_centroids(max_centroids);
        let mut tree = Tree::new(config);
        let mut rng = SmallRng::seed_from_u64(seed);
        for _ in 0..n {
            let v = random_vector(&mut rng, dim);
            tree.insert(&v).unwrap();
        }
        check_cluster_centroid_means(&tree);
    }

    /// Invariant 11: `num_nodes`/`num_leaf_nodes` agree with an
    /// independent DFS count, and are pure (repeated calls agree).
    #[test]
    fn node_counts_match_independent_dfs(
        dim in 1usize..=6,
        max_vectors in 2u32..=6,
        max_centroids in 2u32..=6,
        seed in any::<u64>(),
        n in 0usize..60,
    ) {
        let config = TreeConfig::new(dim).max_vectors(max_vectors).max_centroids(max_centroids);
        let mut tree = Tree::new(config);
        let mut rng = SmallRng::seed_from_u64(seed);
        for _ in 0..n {
            let v = random_vector(&mut rng, dim);
            tree.insert(&v).unwrap();
        }
        let (total, leaves) = count_dfs(&tree);
        prop_assert_eq!(tree.num_nodes(), total);
        prop_assert_eq!(tree.num_leaf_nodes(), leaves);
        prop_assert_eq!(tree.num_nodes(), tree.num_nodes());
        prop_assert_eq!(tree.num_leaf_nodes(), tree.num_leaf_nodes());
    }

    /// Invariant 9: when every leaf is well within the beam width (tiny
    /// trees), `search` returns the exact k nearest neighbors, matching a
    /// brute-force scan over every stored vector.
    #[test]
    fn search_is_exact_at_trivial_scale(
        dim in 1usize..=4,
        seed in any::<u64>(),
        n in 1usize..20,
    ) {
        // Generous capacities relative to `n` keep the whole tree inside a
        // single leaf, so the beam search degenerates to a full scan.
        let config = TreeConfig::new(dim).max_vectors(32).max_centroids(32);
        let mut tree = Tree::new(config);
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut stored: Vec<Vec<f32>> = Vec::new();
        for _ in 0..n {
            let v = random_vector(&mut rng, dim);
            tree.insert(&v).unwrap();
            stored.push(v);
        }

        let q = random_vector(&mut rng, dim);
        let k = (n / 2).max(1);

        let mut brute: Vec<(u32, f32)> = stored
            .iter()
            .enumerate()
            .map(|(id, v)| (id as u32, crate::distance::l2sq(v, &q)))
            .collect();
        brute.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));
        let expected_dist: Vec<f32> = brute.iter().take(k).map(|&(_, d)| d).collect();

        let got = tree.search(&q, k).unwrap();
        prop_assert_eq!(got.len(), k);
        let got_dist: Vec<f32> = got.iter().map(|&(id, v)| crate::distance::l2sq(v, &q)).collect();
        // Compare distance multisets rather than ids: several ids can tie
        // on distance (especially in low dimension with small `n`), and
        // any of them is an equally valid "exact" answer.
        let mut got_sorted = got_dist.clone();
        got_sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mut expected_sorted = expected_dist.clone();
        expected_sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for (g, e) in got_sorted.iter().zip(&expected_sorted) {
            prop_assert!((g - e).abs() < 1e-3, "search returned a worse distance than brute force: {g} vs {e}");
        }
    }
}
