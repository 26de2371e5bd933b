//! Two-hop distance labelling.
//!
//! Pruned landmark labelling over the road network: vertices are processed
//! highest-degree first (ties by id), and each pivot runs a pruned Dijkstra
//! that appends `(pivot, dist)` to the label of every vertex whose distance
//! is not already covered by earlier pivots. The resulting index is
//! canonical: every shortest path is witnessed by the highest-ranked vertex
//! on it, so `query(u, v)` returns the exact network distance for every
//! reachable pair and `+∞` otherwise.

pub mod pivot_reverse;

use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::RoadNetwork;

/// One label entry: a pivot and the distance to it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelEntry {
    pub pivot: i64,
    pub dist: f64,
}

/// Build statistics, reported once after construction
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelStats {
    pub vertices: usize,
    pub entries: usize,
    pub max_label: usize,
    pub build_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapEntry {
    dist: f64,
    vertex: i64,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.vertex.cmp(&other.vertex))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Two-hop label index: `L(v) = {(pivot, dist)}` with
/// `d_G(u, v) = min over common pivots of L(u, o) + L(v, o)`
#[derive(Debug)]
pub struct TwoHopIndex {
    // Sorted by ascending distance, then pivot (the scan side)
    entries: FxHashMap<i64, Vec<LabelEntry>>,
    // pivot -> dist per vertex, the hash-join side of query()
    maps: FxHashMap<i64, FxHashMap<i64, f64>>,
    pub stats: LabelStats,
}

impl TwoHopIndex {
    pub fn build(net: &RoadNetwork) -> Self {
        let start = Instant::now();

        // Pivot ordering: highest degree first, ties by id. Concentrates
        // labels on hubs; any stable total order would be correct.
        let mut order: Vec<i64> = net.vertex_ids().collect();
        order.sort_by_key(|&v| (Reverse(net.degree(v)), v));

        let mut entries: FxHashMap<i64, Vec<LabelEntry>> = FxHashMap::default();
        let mut maps: FxHashMap<i64, FxHashMap<i64, f64>> = FxHashMap::default();
        for &v in &order {
            entries.insert(v, Vec::new());
            maps.insert(v, FxHashMap::default());
        }

        for &pivot in &order {
            let mut dist: FxHashMap<i64, f64> = FxHashMap::default();
            let mut done: FxHashSet<i64> = FxHashSet::default();
            let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::new();

            dist.insert(pivot, 0.0);
            heap.push(Reverse(HeapEntry {
                dist: 0.0,
                vertex: pivot,
            }));

            while let Some(Reverse(HeapEntry { dist: d, vertex: v })) = heap.pop() {
                if !done.insert(v) {
                    continue;
                }
                // Prune when earlier pivots already witness a path of at
                // most this length; pruned vertices are not relaxed either.
                if hub_dist(&maps[&pivot], &maps[&v]) <= d {
                    continue;
                }
                maps.get_mut(&v).unwrap().insert(pivot, d);
                entries
                    .get_mut(&v)
                    .unwrap()
                    .push(LabelEntry { pivot, dist: d });

                for e in net.neighbors(v) {
                    if done.contains(&e.to) {
                        continue;
                    }
                    let nd = d + e.weight;
                    if dist.get(&e.to).map_or(true, |&cur| nd < cur) {
                        dist.insert(e.to, nd);
                        heap.push(Reverse(HeapEntry {
                            dist: nd,
                            vertex: e.to,
                        }));
                    }
                }
            }
        }

        let mut total = 0;
        let mut max_label = 0;
        for label in entries.values_mut() {
            label.sort_by(|a, b| a.dist.total_cmp(&b.dist).then_with(|| a.pivot.cmp(&b.pivot)));
            total += label.len();
            max_label = max_label.max(label.len());
        }

        let stats = LabelStats {
            vertices: entries.len(),
            entries: total,
            max_label,
            build_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            vertices = stats.vertices,
            entries = stats.entries,
            max_label = stats.max_label,
            build_ms = stats.build_ms,
            "built two-hop labels"
        );

        Self {
            entries,
            maps,
            stats,
        }
    }

    /// Exact network distance via the label intersection, `+∞` when the
    /// vertices share no pivot (unreachable or unknown)
    pub fn query(&self, u: i64, v: i64) -> f64 {
        let (Some(lu), Some(lv)) = (self.entries.get(&u), self.entries.get(&v)) else {
            return f64::INFINITY;
        };
        // Join over the smaller label list against the other side's map
        let (scan, probe) = if lu.len() <= lv.len() {
            (lu, &self.maps[&v])
        } else {
            (lv, &self.maps[&u])
        };
        let mut best = f64::INFINITY;
        for entry in scan {
            if let Some(&other) = probe.get(&entry.pivot) {
                let total = entry.dist + other;
                if total < best {
                    best = total;
                }
            }
        }
        best
    }

    /// Label of a vertex, sorted by ascending distance
    pub fn label(&self, v: i64) -> &[LabelEntry] {
        self.entries.get(&v).map_or(&[], |l| l.as_slice())
    }

    pub fn contains(&self, v: i64) -> bool {
        self.entries.contains_key(&v)
    }

    /// All (vertex, label) pairs; the pivot-reverse index inverts this
    pub fn iter(&self) -> impl Iterator<Item = (i64, &[LabelEntry])> {
        self.entries.iter().map(|(&v, l)| (v, l.as_slice()))
    }
}

fn hub_dist(a: &FxHashMap<i64, f64>, b: &FxHashMap<i64, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut best = f64::INFINITY;
    for (pivot, &da) in small {
        if let Some(&db) = large.get(pivot) {
            let total = da + db;
            if total < best {
                best = total;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_network(n: usize) -> RoadNetwork {
        // n x n grid, horizontal edges 100m, vertical edges 130m
        let mut net = RoadNetwork::new();
        let id = |r: usize, c: usize| (r * n + c) as i64;
        for r in 0..n {
            for c in 0..n {
                net.add_node(id(r, c), r as f64 * 1e-3, c as f64 * 1e-3, &[] as &[&str]);
            }
        }
        for r in 0..n {
            for c in 0..n {
                if c + 1 < n {
                    net.add_bidirectional_edge(id(r, c), id(r, c + 1), 100.0).unwrap();
                }
                if r + 1 < n {
                    net.add_bidirectional_edge(id(r, c), id(r + 1, c), 130.0).unwrap();
                }
            }
        }
        net
    }

    #[test]
    fn test_oracle_agrees_with_dijkstra_on_grid() {
        let net = grid_network(4);
        let index = TwoHopIndex::build(&net);
        for u in net.vertex_ids() {
            for v in net.vertex_ids() {
                let exact = net.network_distance(u, v);
                let labelled = index.query(u, v);
                assert!(
                    (exact - labelled).abs() < 1e-6,
                    "disagreement for ({u},{v}): dijkstra={exact}, labels={labelled}"
                );
            }
        }
    }

    #[test]
    fn test_self_distance_is_zero() {
        let net = grid_network(3);
        let index = TwoHopIndex::build(&net);
        for v in net.vertex_ids() {
            assert_eq!(index.query(v, v), 0.0);
        }
    }

    #[test]
    fn test_disconnected_pair_is_infinite() {
        let mut net = grid_network(3);
        net.add_node(100, 1.0, 1.0, &[] as &[&str]);
        net.add_node(101, 1.0, 1.001, &[] as &[&str]);
        net.add_bidirectional_edge(100, 101, 50.0).unwrap();
        let index = TwoHopIndex::build(&net);
        assert!(index.query(0, 100).is_infinite());
        assert_eq!(index.query(100, 101), 50.0);
    }

    #[test]
    fn test_unknown_vertex_is_infinite() {
        let net = grid_network(2);
        let index = TwoHopIndex::build(&net);
        assert!(index.query(0, 999).is_infinite());
    }

    #[test]
    fn test_labels_sorted_by_distance() {
        let net = grid_network(4);
        let index = TwoHopIndex::build(&net);
        for v in net.vertex_ids() {
            let label = index.label(v);
            assert!(!label.is_empty(), "every vertex holds at least its self-label");
            for pair in label.windows(2) {
                assert!(pair[0].dist <= pair[1].dist);
            }
        }
    }
}
