//! Structural invariant checks shared by the property tests
//! ([`invariants`]) and the end-to-end scenarios ([`scenarios`]), plus the
//! scenario and invariant test modules themselves.

use std::collections::HashSet;

use crate::node::{Node, NodeId};
use crate::Tree;

mod invariants;

/// Walks every node reachable from `tree`'s root and asserts the
/// identity/capacity/structural-coherence/height-uniformity/leaf-centroid
/// invariants. Panics (via `assert!`) on the first violation, so callers
/// just need to call this after every mutation they want to check.
fn check_invariants(tree: &Tree) {
    let Some(root) = tree.root() else {
        assert_eq!(tree.len(), 0, "a null root must mean nothing has been inserted");
        return;
    };

    let max_vectors = tree.config().max_vectors;
    let max_centroids = tree.config().max_centroids;

    let mut seen_vids: HashSet<u32> = HashSet::new();
    let mut leaf_depths: Vec<usize> = Vec::new();

    // (node id, depth, expected parent, expected parent_index)
    let mut stack = vec![(root, 0usize, None::<NodeId>, 0u32)];
    while let Some((id, depth, expected_parent, expected_idx)) = stack.pop() {
        let node = &tree.nodes()[id.0];

        assert_eq!(node.parent, expected_parent, "invariant 4 violated: wrong parent back-reference");
        if expected_parent.is_some() {
            assert_eq!(node.parent_index, expected_idx, "invariant 4 violated: wrong parent_index");
        }

        assert!(
            node.len() <= max_centroids as usize,
            "invariant 3 violated: node has {} centroids > max {}",
            node.len(),
            max_centroids
        );

        if node.is_leaf() {
            leaf_depths.push(depth);
            assert_eq!(
                node.centroids().len(),
                node.clusters().len(),
                "leaf must carry one centroid per cluster"
            );
            for (i, cluster) in node.clusters().iter().enumerate() {
                assert!(
                    cluster.len() <= max_vectors as usize,
                    "invariant 3 violated: cluster has {} vectors > max {}",
                    cluster.len(),
                    max_vectors
                );
                assert_eq!(
                    node.centroids()[i],
                    cluster.centroid(),
                    "invariant 6 violated: leaf centroid does not mirror its cluster's centroid"
                );
                for &vid in cluster.ids() {
                    assert!(seen_vids.insert(vid), "invariant 1 violated: duplicate VectorId {vid}");
                }
            }
        } else {
            assert_eq!(
                node.centroids().len(),
                node.children().len(),
                "inner node must carry one centroid per child"
            );
            for (i, &child) in node.children().iter().enumerate() {
                stack.push((child, depth + 1, Some(id), i as u32));
            }
        }
    }

    assert_eq!(
        seen_vids.len(),
        tree.len(),
        "invariant 1 violated: {} distinct vids reachable, expected {}",
        seen_vids.len(),
        tree.len()
    );
    let expected: HashSet<u32> = (0..tree.len() as u32).collect();
    assert_eq!(seen_vids, expected, "invariant 1 violated: reachable vids must be exactly 0..len");

    if let Some(&first) = leaf_depths.first() {
        assert!(
            leaf_depths.iter().all(|&d| d == first),
            "invariant 5 violated: leaves at unequal depths: {leaf_depths:?}"
        );
    }
}

/// Invariant 7: every cluster's maintained centroid equals the arithmetic
/// mean of the vectors it actually holds, computed independently from the
/// vector store.
fn check_cluster_centroid_means(tree: &Tree) {
    let Some(root) = tree.root() else { return };
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let node = &tree.nodes()[id.0];
        if node.is_leaf() {
            for cluster in node.clusters() {
                if cluster.is_empty() {
                    continue;
                }
                let dim = tree.dim();
                let mut mean = vec![0.0f32; dim];
                for &vid in cluster.ids() {
                    for (m, x) in mean.iter_mut().zip(tree.vector(vid)) {
                        *m += x;
                    }
                }
                let n = cluster.len() as f32;
                for m in mean.iter_mut() {
                    *m /= n;
                }
                for (got, want) in cluster.centroid().iter().zip(&mean) {
                    assert!(
                        (got - want).abs() < 1e-2,
                        "invariant 7 violated: cluster centroid {got} far from recomputed mean {want}"
                    );
                }
            }
        } else {
            stack.extend(node.children());
        }
    }
}

fn count_dfs(tree: &Tree) -> (usize, usize) {
    let Some(root) = tree.root() else { return (0, 0) };
    let mut total = 0usize;
    let mut leaves = 0usize;
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        total += 1;
        let node: &Node = &tree.nodes()[id.0];
        if node.is_leaf() {
            leaves += 1;
        } else {
            stack.extend(node.children());
        }
    }
    (total, leaves)
}
