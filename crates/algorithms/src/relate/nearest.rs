//! k-nearest-neighbor linkage via a 2D k-d tree.
//!
//! Builds the tree over the right-hand collection's representative points
//! (centroids; points are their own representative) and answers k-NN
//! queries for every left-hand feature. Distances are planar, in the
//! shared CRS's units; link in a projected CRS for metre distances.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use geo::Centroid;
use geo_types::Geometry;

use terralink_core::feature::visit_coords;
use terralink_core::{Error, FeatureCollection, Result};

/// One neighbor found for a query feature.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborHit {
    /// Index of the neighbor in the right-hand collection.
    pub index: usize,
    /// The neighbor's feature ID, if it has one.
    pub id: Option<String>,
    /// Planar distance in CRS units.
    pub distance: f64,
}

/// For each feature of `left`, the `k` closest features of `right`
/// sorted by ascending distance.
pub fn nearest(
    left: &FeatureCollection,
    right: &FeatureCollection,
    k: usize,
) -> Result<Vec<Vec<NeighborHit>>> {
    left.ensure_same_crs(right)?;
    if k == 0 {
        return Err(Error::InvalidParameter {
            name: "k",
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }
    if right.is_empty() {
        return Err(Error::EmptyResult(
            "nearest-neighbor target collection is empty".into(),
        ));
    }

    let entries: Vec<(f64, f64, usize)> = right
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let (x, y) = representative_point(&f.geometry);
            (x, y, i)
        })
        .collect();
    let tree = KdTree::build(&entries);

    let results = left
        .iter()
        .map(|feature| {
            let (qx, qy) = representative_point(&feature.geometry);
            tree.k_nearest(qx, qy, k)
                .into_iter()
                .map(|(dist_sq, index)| NeighborHit {
                    index,
                    id: right.features()[index].id.clone(),
                    distance: dist_sq.sqrt(),
                })
                .collect()
        })
        .collect();

    Ok(results)
}

/// Centroid, falling back to the first coordinate for degenerate shapes.
fn representative_point(geometry: &Geometry<f64>) -> (f64, f64) {
    if let Some(c) = geometry.centroid() {
        return (c.x(), c.y());
    }
    let mut first = None;
    visit_coords(geometry, &mut |x, y| {
        if first.is_none() {
            first = Some((x, y));
        }
    });
    // Features never have empty geometry, so a coordinate always exists.
    first.unwrap_or((f64::NAN, f64::NAN))
}

// ── k-d tree ─────────────────────────────────────────────────────────────

/// A 2D k-d tree over (x, y, payload-index) entries.
struct KdTree {
    nodes: Vec<KdNode>,
    entries: Vec<(f64, f64, usize)>,
}

struct KdNode {
    /// Index into `entries`
    entry_idx: usize,
    /// Split dimension: 0 = x, 1 = y
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

impl KdTree {
    /// Build a k-d tree with median-of-coordinate splitting.
    fn build(entries: &[(f64, f64, usize)]) -> Self {
        if entries.is_empty() {
            return Self {
                nodes: Vec::new(),
                entries: Vec::new(),
            };
        }

        let mut indices: Vec<usize> = (0..entries.len()).collect();
        let stored = entries.to_vec();
        let mut nodes = Vec::with_capacity(entries.len());

        build_recursive(&stored, &mut indices, 0, &mut nodes);

        Self {
            nodes,
            entries: stored,
        }
    }

    /// The k nearest entries to (qx, qy), as (distance², payload-index),
    /// sorted ascending.
    fn k_nearest(&self, qx: f64, qy: f64, k: usize) -> Vec<(f64, usize)> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }

        // Max-heap of size k kept as a descending sorted vec
        let mut heap: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, qx, qy, k, &mut heap);

        heap.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        heap.into_iter()
            .map(|(dist_sq, idx)| (dist_sq, self.entries[idx].2))
            .collect()
    }

    fn knn_recursive(
        &self,
        node_idx: usize,
        qx: f64,
        qy: f64,
        k: usize,
        heap: &mut Vec<(f64, usize)>,
    ) {
        let node = &self.nodes[node_idx];
        let (px, py, _) = self.entries[node.entry_idx];

        let dx = qx - px;
        let dy = qy - py;
        let dist_sq = dx * dx + dy * dy;

        let max_dist_sq = if heap.len() >= k { heap[0].0 } else { f64::MAX };

        if dist_sq < max_dist_sq || heap.len() < k {
            if heap.len() >= k {
                heap.remove(0); // drop the farthest
            }
            let pos = heap
                .binary_search_by(|probe| {
                    probe
                        .0
                        .partial_cmp(&dist_sq)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .reverse()
                })
                .unwrap_or_else(|e| e);
            heap.insert(pos, (dist_sq, node.entry_idx));
        }

        let diff = if node.split_dim == 0 { dx } else { dy };
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.knn_recursive(child, qx, qy, k, heap);
        }

        let threshold = if heap.len() >= k { heap[0].0 } else { f64::MAX };
        if diff * diff < threshold {
            if let Some(child) = second {
                self.knn_recursive(child, qx, qy, k, heap);
            }
        }
    }
}

fn build_recursive(
    entries: &[(f64, f64, usize)],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let n = indices.len();
    let split_dim = (depth % 2) as u8;

    indices.sort_by(|&a, &b| {
        let va = if split_dim == 0 {
            entries[a].0
        } else {
            entries[a].1
        };
        let vb = if split_dim == 0 {
            entries[b].0
        } else {
            entries[b].1
        };
        va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let median = n / 2;
    let entry_idx = indices[median];

    let node_idx = nodes.len();
    nodes.push(KdNode {
        entry_idx,
        split_dim,
        left: None,
        right: None,
    });

    if median > 0 {
        let mut left_indices = indices[..median].to_vec();
        let left_idx = build_recursive(entries, &mut left_indices, depth + 1, nodes);
        nodes[node_idx].left = Some(left_idx);
    }

    if median + 1 < n {
        let mut right_indices = indices[median + 1..].to_vec();
        let right_idx = build_recursive(entries, &mut right_indices, depth + 1, nodes);
        nodes[node_idx].right = Some(right_idx);
    }

    node_idx
}
