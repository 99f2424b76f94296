//! Owns the root, assigns vector identifiers, drives beam-search descent,
//! and executes node-split-and-promote up to the root.

use std::collections::BTreeSet;

use ordered_float::OrderedFloat;

use crate::config::TreeConfig;
use crate::distance::l2sq;
use crate::error::{Error, Result};
use crate::kmeans::local_kmeans2;
use crate::node::{Node, NodeId, NodeKind};
use crate::store::{VecStore, VectorStore};
use crate::VectorId;

/// An in-memory approximate nearest neighbor index: a hierarchical,
/// dynamically-balancing tree of centroids whose leaves group real
/// vectors into fixed-capacity clusters.
///
/// `Tree` owns every node it ever creates in a flat arena and owns the
/// vector payloads themselves in an internal [`VecStore`]. No vector is
/// ever deleted; `VectorId`s are assigned densely and monotonically
/// starting at 0.
#[derive(Debug)]
pub struct Tree {
    config: TreeConfig,
    nodes: Vec<Node>,
    root: Option<NodeId>,
    store: VecStore,
}

impl Tree {
    /// Builds an empty tree over vectors of `config.dim()` dimensions.
    pub fn new(config: TreeConfig) -> Self {
        config.validate();
        let store = VecStore::new(config.dim());
        Tree { config, nodes: Vec::new(), root: None, store }
    }

    pub fn dim(&self) -> usize {
        self.config.dim()
    }

    /// Number of vectors stored in the tree.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub(crate) fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub(crate) fn vector(&self, id: VectorId) -> &[f32] {
        self.store.get(id)
    }

    /// Inserts `v`, assigning it the next [`VectorId`] in sequence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `v.len() != self.dim()`.
    #[tracing::instrument(skip(self, v), fields(dim = self.config.dim()))]
    pub fn insert(&mut self, v: &[f32]) -> Result<VectorId> {
        if v.len() != self.config.dim() {
            return Err(Error::DimensionMismatch { expected: self.config.dim(), received: v.len() });
        }

        let vid = self.store.push(v);

        if self.root.is_none() {
            self.root = Some(self.push_node(Node::new_leaf(self.config.dim(), self.config.max_centroids)));
        }

        let target = self.find_target_insert_leaf(v);
        self.nodes[target.0].insert(vid, v, self.config.max_vectors, &self.store);

        if self.nodes[target.0].is_full() {
            tracing::trace!(node = target.0, "leaf full, splitting and promoting");
            self.split_node(target);
        }

        tracing::debug!(vid, depth = self.depth(), "inserted vector");
        Ok(vid)
    }

    /// Returns the approximate `k` nearest neighbors of `q`, best-first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `q.len() != self.dim()`, or
    /// [`Error::EmptyTree`] if nothing has been inserted yet. If fewer
    /// than `k` vectors are reachable, returns what is available.
    #[tracing::instrument(skip(self, q), fields(dim = self.config.dim()))]
    pub fn search(&self, q: &[f32], k: usize) -> Result<Vec<(VectorId, &[f32])>> {
        if q.len() != self.config.dim() {
            return Err(Error::DimensionMismatch { expected: self.config.dim(), received: q.len() });
        }
        let root = self.root.ok_or(Error::EmptyTree)?;

        let mut result: BTreeSet<(OrderedFloat<f32>, VectorId)> = BTreeSet::new();
        let mut leaves_visited = 0usize;

        let root_node = &self.nodes[root.0];
        if root_node.is_leaf() {
            self.scan_leaf(root_node, q, k, &mut result);
            leaves_visited += 1;
        } else {
            let mut frontier: BTreeSet<(OrderedFloat<f32>, NodeId)> = BTreeSet::new();
            for (c, &child) in root_node.centroids().iter().zip(root_node.children()) {
                propose(&mut frontier, self.config.query_beam_width, l2sq(c, q), child);
            }

            while let Some(&(d, n)) = frontier.iter().next() {
                frontier.remove(&(d, n));
                let node = &self.nodes[n.0];
                if node.is_leaf() {
                    self.scan_leaf(node, q, k, &mut result);
                    leaves_visited += 1;
                } else {
                    for (c, &child) in node.centroids().iter().zip(node.children()) {
                        propose(&mut frontier, self.config.query_beam_width, l2sq(c, q), child);
                    }
                }
            }
        }

        tracing::debug!(beam_width = self.config.query_beam_width, leaves_visited, "search");
        Ok(result.into_iter().map(|(_, vid)| (vid, self.store.get(vid))).collect())
    }

    fn scan_leaf(
        &self,
        node: &Node,
        q: &[f32],
        k: usize,
        result: &mut BTreeSet<(OrderedFloat<f32>, VectorId)>,
    ) {
        for cluster in node.clusters() {
            for &vid in cluster.ids() {
                let d = l2sq(self.store.get(vid), q);
                propose(result, k, d, vid);
            }
        }
    }

    /// Length of any root-to-leaf path (all leaves sit at the same depth,
    /// since the tree only grows by pushing a new root on top).
    pub fn depth(&self) -> usize {
        let Some(root) = self.root else { return 0 };
        let mut depth = 1;
        let mut cur = &self.nodes[root.0];
        while !cur.is_leaf() {
            depth += 1;
            cur = &self.nodes[cur.children()[0].0];
        }
        depth
    }

    /// Total number of nodes (inner + leaf) reachable from the root.
    pub fn num_nodes(&self) -> usize {
        self.dfs().len()
    }

    /// Number of leaf nodes reachable from the root.
    pub fn num_leaf_nodes(&self) -> usize {
        self.dfs().into_iter().filter(|&id| self.nodes[id.0].is_leaf()).count()
    }

    /// A human-readable dump of every leaf's cluster fan-out, useful for
    /// eyeballing how balanced a tree is after a batch of inserts.
    pub fn describe_leaves(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        for id in self.dfs() {
            let node = &self.nodes[id.0];
            if node.is_leaf() {
                let sizes: Vec<usize> = node.clusters().iter().map(|c| c.len()).collect();
                let _ = writeln!(out, "leaf {}: {} cluster(s), sizes {:?}", id.0, node.len(), sizes);
            }
        }
        out
    }

    fn dfs(&self) -> Vec<NodeId> {
        let Some(root) = self.root else { return Vec::new() };
        let mut stack = vec![root];
        let mut order = Vec::new();
        while let Some(id) = stack.pop() {
            order.push(id);
            let node = &self.nodes[id.0];
            if !node.is_leaf() {
                stack.extend(node.children().iter().rev());
            }
        }
        order
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    // Beam search over inner levels to find the leaf `v` should be
    // inserted into.
    fn find_target_insert_leaf(&self, v: &[f32]) -> NodeId {
        let root = self.root.expect("root must exist by the time this is called");
        let root_node = &self.nodes[root.0];
        if root_node.is_leaf() {
            return root;
        }

        let mut frontier: BTreeSet<(OrderedFloat<f32>, NodeId)> = BTreeSet::new();
        for (c, &child) in root_node.centroids().iter().zip(root_node.children()) {
            propose(&mut frontier, self.config.insert_beam_width, l2sq(c, v), child);
        }

        let mut best: Option<(f32, NodeId)> = None;
        while let Some(&(d, n)) = frontier.iter().next() {
            frontier.remove(&(d, n));
            let node = &self.nodes[n.0];
            if node.is_leaf() {
                if best.map_or(true, |(best_d, _)| d.0 < best_d) {
                    best = Some((d.0, n));
                }
                continue;
            }
            for (c, &child) in node.centroids().iter().zip(node.children()) {
                propose(&mut frontier, self.config.insert_beam_width, l2sq(c, v), child);
            }
        }

        let (_, leaf) = best.expect("beam search over a non-empty tree must reach a leaf");
        debug_assert!(self.nodes[leaf.0].is_leaf(), "find_target_insert_leaf must return a leaf");
        leaf
    }

    // Split-and-promote: partitions an overflowing node's entries by
    // local k-means (k = 2), keeps one half in place, moves the other
    // half into a fresh sibling, and promotes both representative
    // centroids into the parent (growing a new root first if `n` had
    // none), recursing if the parent is now full too.
    fn split_node(&mut self, n: NodeId) {
        let max_centroids = self.nodes[n.0].max_centroids();
        let is_leaf = self.nodes[n.0].is_leaf();
        let dim = self.config.dim();
        let parent = self.nodes[n.0].parent;
        let parent_index = self.nodes[n.0].parent_index;

        let centroid_refs: Vec<&[f32]> =
            self.nodes[n.0].centroids().iter().map(Vec::as_slice).collect();
        let split = local_kmeans2(&centroid_refs);
        let assignment = split.assignment;
        drop(centroid_refs);

        let r = self.push_node(if is_leaf {
            Node::new_leaf(dim, max_centroids)
        } else {
            Node::new_inner(dim, max_centroids)
        });

        {
            let old_centroids = std::mem::take(self.nodes[n.0].centroids_mut());
            let mut retained_centroids = Vec::with_capacity(old_centroids.len());
            let mut moved_centroids = Vec::new();

            match self.nodes[n.0].kind_mut() {
                NodeKind::Leaf(clusters) => {
                    let old_clusters = std::mem::take(clusters);
                    let mut retained = Vec::with_capacity(old_clusters.len());
                    let mut moved = Vec::new();
                    for (i, (centroid, cluster)) in
                        old_centroids.into_iter().zip(old_clusters).enumerate()
                    {
                        if assignment[i] == 0 {
                            retained_centroids.push(centroid);
                            retained.push(cluster);
                        } else {
                            moved_centroids.push(centroid);
                            moved.push(cluster);
                        }
                    }
                    *self.nodes[n.0].kind_mut() = NodeKind::Leaf(retained);
                    *self.nodes[r.0].kind_mut() = NodeKind::Leaf(moved);
                }
                NodeKind::Inner(children) => {
                    let old_children = std::mem::take(children);
                    let mut retained = Vec::with_capacity(old_children.len());
                    let mut moved = Vec::new();
                    for (i, (centroid, child)) in
                        old_centroids.into_iter().zip(old_children).enumerate()
                    {
                        if assignment[i] == 0 {
                            retained_centroids.push(centroid);
                            retained.push(child);
                        } else {
                            moved_centroids.push(centroid);
                            moved.push(child);
                        }
                    }
                    *self.nodes[n.0].kind_mut() = NodeKind::Inner(retained);
                    *self.nodes[r.0].kind_mut() = NodeKind::Inner(moved);
                }
            }

            *self.nodes[n.0].centroids_mut() = retained_centroids;
            *self.nodes[r.0].centroids_mut() = moved_centroids;
        }

        if !is_leaf {
            self.renumber_children(n);
            self.renumber_children(r);
        }

        let (p, created_new_root) = match parent {
            Some(p) => (p, false),
            None => {
                let new_root = self.push_node(Node::new_inner(dim, max_centroids));
                self.root = Some(new_root);
                (new_root, true)
            }
        };

        if created_new_root {
            *self.nodes[p.0].centroids_mut() = vec![split.centroid_a, split.centroid_b];
            if let NodeKind::Inner(children) = self.nodes[p.0].kind_mut() {
                *children = vec![n, r];
            }
            self.nodes[n.0].set_parent(p, 0);
            self.nodes[r.0].set_parent(p, 1);
        } else {
            let idx = parent_index as usize;
            {
                let centroids = self.nodes[p.0].centroids_mut();
                centroids[idx] = split.centroid_a;
                centroids.insert(idx + 1, split.centroid_b);
            }
            if let NodeKind::Inner(children) = self.nodes[p.0].kind_mut() {
                children.insert(idx + 1, r);
            }
            self.renumber_children(p);
        }

        if self.nodes[p.0].is_full() {
            tracing::trace!(node = p.0, centroids = self.nodes[p.0].len(), "parent full after promotion, splitting again");
            self.split_node(p);
        }
    }

    // Re-derives parent/parent_index for every child of `id` from its
    // current position in `id.children()`.
    fn renumber_children(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self.nodes[id.0].children().to_vec();
        for (idx, child) in children.into_iter().enumerate() {
            self.nodes[child.0].set_parent(id, idx as u32);
        }
    }
}

// Proposes `(d, item)` into a bounded, ascending-distance frontier: if
// under capacity, inserts unconditionally; otherwise inserts only if `d`
// beats the current maximum, evicting it.
fn propose<T: Ord + Copy>(frontier: &mut BTreeSet<(OrderedFloat<f32>, T)>, cap: usize, d: f32, item: T) {
    if cap == 0 {
        return;
    }
    if frontier.len() < cap {
        frontier.insert((OrderedFloat(d), item));
        return;
    }
    if let Some(&(max_d, max_item)) = frontier.iter().next_back() {
        if OrderedFloat(d) < max_d {
            frontier.remove(&(max_d, max_item));
            frontier.insert((OrderedFloat(d), item));
        }
    }
}
