// Node <-> parent back-references would form an ownership cycle under
// strict ownership, so the tree holds every node in a flat arena and
// nodes refer to each other by `NodeId`, an index into that arena,
// rather than by pointer or `Rc`/`Weak`.

use crate::cluster::Cluster;
use crate::distance::l2sq;
use crate::VectorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(pub(crate) usize);

#[derive(Debug)]
pub(crate) enum NodeKind {
    Leaf(Vec<Cluster>),
    Inner(Vec<NodeId>),
}

#[derive(Debug)]
pub(crate) struct Node {
    dim: usize,
    max_centroids: u32,
    centroids: Vec<Vec<f32>>,
    kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) parent_index: u32,
}

impl Node {
    pub(crate) fn new_leaf(dim: usize, max_centroids: u32) -> Self {
        Node {
            dim,
            max_centroids,
            centroids: Vec::new(),
            kind: NodeKind::Leaf(Vec::new()),
            parent: None,
            parent_index: 0,
        }
    }

    pub(crate) fn new_inner(dim: usize, max_centroids: u32) -> Self {
        Node {
            dim,
            max_centroids,
            centroids: Vec::new(),
            kind: NodeKind::Inner(Vec::new()),
            parent: None,
            parent_index: 0,
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    pub(crate) fn is_full(&self) -> bool {
        self.centroids.len() == self.max_centroids as usize
    }

    pub(crate) fn max_centroids(&self) -> u32 {
        self.max_centroids
    }

    pub(crate) fn len(&self) -> usize {
        self.centroids.len()
    }

    pub(crate) fn centroids(&self) -> &[Vec<f32>] {
        &self.centroids
    }

    pub(crate) fn clusters(&self) -> &[Cluster] {
        match &self.kind {
            NodeKind::Leaf(clusters) => clusters,
            NodeKind::Inner(_) => &[],
        }
    }

    pub(crate) fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Inner(children) => children,
            NodeKind::Leaf(_) => &[],
        }
    }

    pub(crate) fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    pub(crate) fn centroids_mut(&mut self) -> &mut Vec<Vec<f32>> {
        &mut self.centroids
    }

    pub(crate) fn set_parent(&mut self, parent: NodeId, parent_index: u32) {
        self.parent = Some(parent);
        self.parent_index = parent_index;
    }

    // Ties broken by lowest index.
    pub(crate) fn closest(&self, v: &[f32]) -> usize {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for (i, c) in self.centroids.iter().enumerate() {
            let d = l2sq(c, v);
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        best
    }

    // Defined only for leaf nodes. On overflow of the chosen cluster,
    // splits it and splices the two halves in if there's room for one more
    // centroid; otherwise the split is discarded and the node is left over
    // its 90%-full cluster but still under max_centroids, leaving the node
    // split to the tree.
    pub(crate) fn insert(
        &mut self,
        vid: VectorId,
        v: &[f32],
        max_vectors: u32,
        store: &dyn crate::store::VectorStore,
    ) {
        if !self.is_leaf() {
            panic!("insert called on a non-leaf node");
        }

        if self.clusters().is_empty() {
            let mut cluster = Cluster::new(self.dim, max_vectors);
            cluster.insert(vid, v);
            self.centroids.push(cluster.centroid().to_vec());
            if let NodeKind::Leaf(clusters) = &mut self.kind {
                clusters.push(cluster);
            }
            return;
        }

        let cid = self.closest(v);
        let almost_full = {
            let clusters = match &mut self.kind {
                NodeKind::Leaf(clusters) => clusters,
                NodeKind::Inner(_) => unreachable!("checked is_leaf above"),
            };
            clusters[cid].insert(vid, v);
            self.centroids[cid] = clusters[cid].centroid().to_vec();
            clusters[cid].is_almost_full()
        };

        if !almost_full {
            return;
        }

        if self.centroids.len() - 1 + 2 <= self.max_centroids as usize {
            let (a, b) = {
                let clusters = match &self.kind {
                    NodeKind::Leaf(clusters) => clusters,
                    NodeKind::Inner(_) => unreachable!("checked is_leaf above"),
                };
                clusters[cid].split(store)
            };
            let centroid_a = a.centroid().to_vec();
            let centroid_b = b.centroid().to_vec();
            if let NodeKind::Leaf(clusters) = &mut self.kind {
                clusters.splice(cid..=cid, [a, b]);
            }
            self.centroids.splice(cid..=cid, [centroid_a, centroid_b]);
        } else {
            tracing::trace!(
                node_centroids = self.centroids.len(),
                max_centroids = self.max_centroids,
                "cluster split discarded: node has no room to absorb it, deferring to a node split"
            );
        }
    }
}
