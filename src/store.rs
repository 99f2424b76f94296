//! The vector-storage contract.
//!
//! Clusters and nodes hold [`crate::VectorId`]s, never a second copy of a
//! vector's payload, and resolve them against whichever [`VectorStore`]
//! the [`crate::Tree`] was built over: a contiguous, externally owned
//! `N x D` row-major buffer that the tree neither copies nor frees a row
//! of. The borrow checker enforces that rows stay immutable and alive for
//! the lifetime of the index.

use crate::VectorId;

/// A contiguous, externally owned collection of `dim`-length rows, indexed
/// by [`crate::VectorId`].
///
/// One implementor, [`VecStore`], ships in this crate. Consumers may supply
/// their own (e.g. a memory-mapped `fvecs` file) as long as rows stay alive
/// and immutable for the lifetime of the index built over them.
pub trait VectorStore {
    /// Number of 32-bit floats in every row.
    fn dim(&self) -> usize;

    /// Returns the row stored at `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never pushed to this store. The tree never
    /// constructs a [`crate::VectorId`] it has not just stored, so this is a
    /// programming-error path, not a caller-facing one.
    fn get(&self, id: VectorId) -> &[f32];
}

/// A simple append-only, in-memory [`VectorStore`] backed by a single flat
/// buffer of `dim`-length rows.
#[derive(Debug, Clone)]
pub struct VecStore {
    dim: usize,
    rows: Vec<f32>,
}

impl VecStore {
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "dim must be positive");
        VecStore { dim, rows: Vec::new() }
    }

    pub fn with_capacity(dim: usize, capacity: usize) -> Self {
        assert!(dim > 0, "dim must be positive");
        VecStore { dim, rows: Vec::with_capacity(dim * capacity) }
    }

    /// Number of rows currently stored.
    pub fn len(&self) -> usize {
        self.rows.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends `v` and returns the id it was stored under.
    ///
    /// # Panics
    ///
    /// Panics if `v.len() != self.dim()`.
    pub fn push(&mut self, v: &[f32]) -> VectorId {
        assert_eq!(v.len(), self.dim, "vector length must match store dimension");
        let id = self.len() as VectorId;
        self.rows.extend_from_slice(v);
        id
    }
}

impl VectorStore for VecStore {
    fn dim(&self) -> usize {
        self.dim
    }

    fn get(&self, id: VectorId) -> &[f32] {
        let start = id as usize * self.dim;
        &self.rows[start..start + self.dim]
    }
}
