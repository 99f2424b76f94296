// Local k-means with k = 2, the rebalancing primitive shared by cluster
// splitting and node splitting: the former runs it over the raw vectors
// held by an overflowing Cluster, the latter over the centroid list of an
// overflowing Node.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::distance::l2sq;

const MAX_RESEED_ATTEMPTS: usize = 3;

pub(crate) struct Split {
    pub assignment: Vec<u8>,
    pub centroid_a: Vec<f32>,
    pub centroid_b: Vec<f32>,
}

fn converge(points: &[&[f32]], dim: usize, seed_a: usize, seed_b: usize) -> Split {
    let n = points.len();
    let mut centroid_a = points[seed_a].to_vec();
    let mut centroid_b = points[seed_b].to_vec();

    // Initial assignment: first half to A, second half (inclusive of the
    // midpoint) to B.
    let mut assignment: Vec<u8> = (0..n).map(|i| if i < n / 2 { 0 } else { 1 }).collect();

    loop {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let da = l2sq(p, &centroid_a);
            let db = l2sq(p, &centroid_b);
            // Ties keep the current assignment: breaking ties toward
            // whichever centroid is numerically closer first would, on
            // fully-degenerate input (every point identical), collapse
            // every point onto one side and leave the other empty.
            let new_label = if da < db {
                0
            } else if db < da {
                1
            } else {
                assignment[i]
            };
            if new_label != assignment[i] {
                assignment[i] = new_label;
                changed = true;
            }
        }

        if !changed {
            break;
        }

        centroid_a = fill(dim);
        centroid_b = fill(dim);
        let mut count_a = 0u32;
        let mut count_b = 0u32;
        for (i, p) in points.iter().enumerate() {
            if assignment[i] == 0 {
                incremental_update(&mut centroid_a, p, count_a);
                count_a += 1;
            } else {
                incremental_update(&mut centroid_b, p, count_b);
                count_b += 1;
            }
        }
    }

    Split { assignment, centroid_a, centroid_b }
}

fn fill(dim: usize) -> Vec<f32> {
    vec![0.0; dim]
}

// centroid := (centroid * n_prev + v) / (n_prev + 1)
fn incremental_update(centroid: &mut [f32], v: &[f32], n_prev: u32) {
    let n_prev = n_prev as f32;
    for (c, x) in centroid.iter_mut().zip(v) {
        *c = (*c * n_prev + x) / (n_prev + 1.0);
    }
}

fn is_degenerate(assignment: &[u8]) -> bool {
    let ones = assignment.iter().filter(|&&l| l == 1).count();
    ones == 0 || ones == assignment.len()
}

// Splits `points` into two groups via local k-means (k = 2), seeded from
// the first and last point. Retries with alternate seed pairs if the
// result collapses to one side, falling back to a plain index bisection
// if every attempt still collapses.
pub(crate) fn local_kmeans2(points: &[&[f32]]) -> Split {
    let n = points.len();
    assert!(n >= 2, "cannot split fewer than two points");
    let dim = points[0].len();

    // The first seed is the mandated (first, last) pair; every reseed
    // attempt after a collapse picks a random pair instead. The RNG is
    // seeded from `n` so that, for a fixed input, reseeding stays
    // deterministic without hand-picking more index pairs.
    let mut rng = SmallRng::seed_from_u64(n as u64);
    let mut seeds = vec![(0usize, n - 1)];
    while seeds.len() < MAX_RESEED_ATTEMPTS {
        let a = rng.gen_range(0..n);
        let mut b = rng.gen_range(0..n);
        while b == a {
            b = rng.gen_range(0..n);
        }
        seeds.push((a, b));
    }

    for &(seed_a, seed_b) in &seeds {
        let split = converge(points, dim, seed_a, seed_b);
        if !is_degenerate(&split.assignment) {
            return split;
        }
        tracing::warn!(
            seed_a,
            seed_b,
            "k-means split collapsed to a single partition, reseeding"
        );
    }

    tracing::warn!("k-means split could not separate points after all reseed attempts, falling back to index bisection");
    let assignment: Vec<u8> = (0..n).map(|i| if i < n / 2 { 0 } else { 1 }).collect();
    let mut centroid_a = fill(dim);
    let mut centroid_b = fill(dim);
    let mut count_a = 0u32;
    let mut count_b = 0u32;
    for (i, p) in points.iter().enumerate() {
        if assignment[i] == 0 {
            incremental_update(&mut centroid_a, p, count_a);
            count_a += 1;
        } else {
            incremental_update(&mut centroid_b, p, count_b);
            count_b += 1;
        }
    }
    Split { assignment, centroid_a, centroid_b }
}
