//! Road network: nodes with keyword sets, undirected weighted adjacency,
//! inverted keyword index, and a memoized Dijkstra distance oracle.
//!
//! The network is built once at load time and is read-only afterwards; the
//! only mutation during queries is the append-only distance memo, which sits
//! behind a write lock so multiple queries can run on independent threads.
//!
//! Adjacency is stored as `id → Vec<Edge>` (an arena + index model), never as
//! node-to-node pointers.

use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::OnceLock;

use parking_lot::RwLock;
use rstar::RTree;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{EngineError, Result};
use crate::geo::{nearest_vertex_spatial, VertexPoint};

/// Interned keyword vocabulary: lowercased keyword string ↔ dense u32 id.
///
/// Everything past the API boundary (nodes, inverted index, subtree keyword
/// summaries) works on ids; strings only appear on ingest, export, and clue
/// resolution.
#[derive(Debug, Default)]
pub struct KeywordTable {
    by_name: FxHashMap<String, u32>,
    names: Vec<String>,
}

impl KeywordTable {
    pub fn intern(&mut self, keyword: &str) -> u32 {
        let lower = keyword.to_lowercase();
        if let Some(&id) = self.by_name.get(&lower) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(lower.clone());
        self.by_name.insert(lower, id);
        id
    }

    pub fn get(&self, keyword: &str) -> Option<u32> {
        self.by_name.get(&keyword.to_lowercase()).copied()
    }

    pub fn name(&self, id: u32) -> &str {
        &self.names[id as usize]
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A network vertex. Identity and hashing use `id` only.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub keywords: FxHashSet<u32>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A directed half of an undirected edge; weight in meters, > 0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub from: i64,
    pub to: i64,
    pub weight: f64,
}

/// Min-heap entry for Dijkstra, ordered by (dist, vertex)
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

/// Undirected weighted road network with per-vertex keyword sets
#[derive(Debug, Default)]
pub struct RoadNetwork {
    nodes: FxHashMap<i64, Node>,
    adjacency: FxHashMap<i64, Vec<Edge>>,
    keyword_index: FxHashMap<u32, FxHashSet<i64>>,
    keywords: KeywordTable,
    // Symmetric pair-distance memo; append-only during queries
    memo: RwLock<FxHashMap<(i64, i64), f64>>,
    // Built on first nearest_vertex call; invalid if nodes are added after
    spatial: OnceLock<RTree<VertexPoint>>,
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex. A repeated id merges the keyword sets.
    pub fn add_node<S: AsRef<str>>(&mut self, id: i64, lat: f64, lon: f64, keywords: &[S]) {
        let ids: Vec<u32> = keywords
            .iter()
            .map(|kw| self.keywords.intern(kw.as_ref()))
            .collect();
        for &kw in &ids {
            self.keyword_index.entry(kw).or_default().insert(id);
        }
        let node = self.nodes.entry(id).or_insert(Node {
            id,
            lat,
            lon,
            keywords: FxHashSet::default(),
        });
        node.keywords.extend(ids);
    }

    /// Attach a keyword to an existing vertex. Returns false if the vertex
    /// is unknown.
    pub fn index_keyword(&mut self, id: i64, keyword: &str) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        let kw = self.keywords.intern(keyword);
        self.keyword_index.entry(kw).or_default().insert(id);
        self.nodes.get_mut(&id).unwrap().keywords.insert(kw);
        true
    }

    /// Add one direction of an edge. A non-positive or non-finite weight
    /// fails with `InvalidArgument`. Duplicate (from, to) pairs are merged
    /// by minimum weight; self-loops and unknown endpoints are skipped.
    pub fn add_edge(&mut self, from: i64, to: i64, weight: f64) -> Result<()> {
        if !(weight > 0.0) || !weight.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "edge ({from}, {to}) must have a positive finite weight, got {weight}"
            )));
        }
        if from == to || !self.nodes.contains_key(&from) || !self.nodes.contains_key(&to) {
            return Ok(());
        }
        let edges = self.adjacency.entry(from).or_default();
        if let Some(existing) = edges.iter_mut().find(|e| e.to == to) {
            if weight < existing.weight {
                existing.weight = weight;
            }
        } else {
            edges.push(Edge { from, to, weight });
        }
        Ok(())
    }

    /// Add an undirected edge as a symmetric pair
    pub fn add_bidirectional_edge(&mut self, from: i64, to: i64, weight: f64) -> Result<()> {
        self.add_edge(from, to, weight)?;
        self.add_edge(to, from, weight)
    }

    /// Drop vertices with no incident edges. Only call before indices are
    /// built; existing indices would keep referencing the removed ids.
    pub fn remove_isolated_nodes(&mut self) -> usize {
        let isolated: Vec<i64> = self
            .nodes
            .keys()
            .filter(|id| self.adjacency.get(id).map_or(true, |e| e.is_empty()))
            .copied()
            .collect();
        for id in &isolated {
            if let Some(node) = self.nodes.remove(id) {
                for kw in node.keywords {
                    if let Some(set) = self.keyword_index.get_mut(&kw) {
                        set.remove(id);
                        if set.is_empty() {
                            self.keyword_index.remove(&kw);
                        }
                    }
                }
            }
            self.adjacency.remove(id);
        }
        isolated.len()
    }

    pub fn node(&self, id: i64) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains_vertex(&self, id: i64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(|e| e.len()).sum::<usize>() / 2
    }

    pub fn neighbors(&self, id: i64) -> &[Edge] {
        self.adjacency.get(&id).map_or(&[], |e| e.as_slice())
    }

    pub fn degree(&self, id: i64) -> usize {
        self.adjacency.get(&id).map_or(0, |e| e.len())
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.nodes.keys().copied()
    }

    pub fn keyword_id(&self, keyword: &str) -> Option<u32> {
        self.keywords.get(keyword)
    }

    pub fn keyword_name(&self, id: u32) -> &str {
        self.keywords.name(id)
    }

    pub fn known_keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.names()
    }

    /// Vertices carrying the keyword. The inverted index is the authority:
    /// every keyword present here has at least one vertex.
    pub fn nodes_with_keyword(&self, keyword: &str) -> Option<&FxHashSet<i64>> {
        self.keywords
            .get(keyword)
            .and_then(|id| self.keyword_index.get(&id))
    }

    pub fn node_has_keyword(&self, id: i64, keyword: u32) -> bool {
        self.nodes
            .get(&id)
            .map_or(false, |n| n.keywords.contains(&keyword))
    }

    /// Nearest vertex to a (lat, lon) coordinate
    pub fn nearest_vertex(&self, lat: f64, lon: f64) -> Option<i64> {
        let tree = self.spatial.get_or_init(|| {
            let points: Vec<VertexPoint> = self
                .nodes
                .values()
                .map(|n| VertexPoint::new([n.lon, n.lat], n.id))
                .collect();
            RTree::bulk_load(points)
        });
        nearest_vertex_spatial((lat, lon), tree)
    }

    /// Dijkstra from `source`, optionally stopping once `target` settles.
    /// Returns settled (vertex, dist) pairs in pop order.
    fn run_dijkstra(&self, source: i64, target: Option<i64>) -> Vec<(i64, f64)> {
        let mut settled = Vec::new();
        if !self.nodes.contains_key(&source) {
            return settled;
        }

        let mut dist: FxHashMap<i64, f64> = FxHashMap::default();
        let mut done: FxHashSet<i64> = FxHashSet::default();
        let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::new();

        dist.insert(source, 0.0);
        heap.push(Reverse(HeapEntry {
            dist: 0.0,
            vertex: source,
        }));

        while let Some(Reverse(HeapEntry { dist: d, vertex: u })) = heap.pop() {
            if !done.insert(u) {
                continue;
            }
            settled.push((u, d));
            if target == Some(u) {
                break;
            }
            for e in self.neighbors(u) {
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

        settled
    }

    /// All reachable vertices from `source` in ascending distance order
    pub fn dijkstra_all(&self, source: i64) -> Vec<(i64, f64)> {
        self.run_dijkstra(source, None)
    }

    /// Shortest-path distance between two vertices, `+∞` if unreachable.
    ///
    /// Consults the symmetric memo first; on a miss, runs Dijkstra and
    /// memoizes every settled pair in both directions.
    pub fn network_distance(&self, u: i64, v: i64) -> f64 {
        if u == v {
            return if self.nodes.contains_key(&u) {
                0.0
            } else {
                f64::INFINITY
            };
        }
        if let Some(&d) = self.memo.read().get(&(u, v)) {
            return d;
        }

        let settled = self.run_dijkstra(u, Some(v));
        let result = match settled.last() {
            Some(&(last, d)) if last == v => d,
            _ => f64::INFINITY,
        };

        let mut memo = self.memo.write();
        for &(x, d) in &settled {
            if x != u {
                memo.insert((u, x), d);
                memo.insert((x, u), d);
            }
        }
        if result.is_infinite() {
            memo.insert((u, v), f64::INFINITY);
            memo.insert((v, u), f64::INFINITY);
        }
        result
    }

    /// Shortest path with the full vertex sequence, `None` if unreachable
    pub fn shortest_path(&self, u: i64, v: i64) -> Option<(f64, Vec<i64>)> {
        if !self.nodes.contains_key(&u) || !self.nodes.contains_key(&v) {
            return None;
        }
        if u == v {
            return Some((0.0, vec![u]));
        }

        let mut dist: FxHashMap<i64, f64> = FxHashMap::default();
        let mut parent: FxHashMap<i64, i64> = FxHashMap::default();
        let mut done: FxHashSet<i64> = FxHashSet::default();
        let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::new();

        dist.insert(u, 0.0);
        heap.push(Reverse(HeapEntry {
            dist: 0.0,
            vertex: u,
        }));

        while let Some(Reverse(HeapEntry { dist: d, vertex: x })) = heap.pop() {
            if !done.insert(x) {
                continue;
            }
            if x == v {
                let mut path = vec![v];
                let mut cur = v;
                while let Some(&p) = parent.get(&cur) {
                    path.push(p);
                    cur = p;
                }
                path.reverse();
                let mut memo = self.memo.write();
                memo.insert((u, v), d);
                memo.insert((v, u), d);
                return Some((d, path));
            }
            for e in self.neighbors(x) {
                if done.contains(&e.to) {
                    continue;
                }
                let nd = d + e.weight;
                if dist.get(&e.to).map_or(true, |&cur| nd < cur) {
                    dist.insert(e.to, nd);
                    parent.insert(e.to, x);
                    heap.push(Reverse(HeapEntry {
                        dist: nd,
                        vertex: e.to,
                    }));
                }
            }
        }

        None
    }

    /// Snapshot of the memo for invariant checks
    pub fn memoized_pairs(&self) -> Vec<((i64, i64), f64)> {
        self.memo
            .read()
            .iter()
            .map(|(&k, &v)| (k, v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_network() -> RoadNetwork {
        // 1 - 2 - 3 - 4, all edges 100m
        let mut net = RoadNetwork::new();
        net.add_node(1, 0.0, 0.0, &["start"]);
        net.add_node(2, 0.0, 0.001, &["bank"]);
        net.add_node(3, 0.0, 0.002, &[] as &[&str]);
        net.add_node(4, 0.0, 0.003, &["cafe"]);
        net.add_bidirectional_edge(1, 2, 100.0).unwrap();
        net.add_bidirectional_edge(2, 3, 100.0).unwrap();
        net.add_bidirectional_edge(3, 4, 100.0).unwrap();
        net
    }

    #[test]
    fn test_network_distance_on_path() {
        let net = path_network();
        assert_eq!(net.network_distance(1, 1), 0.0);
        assert_eq!(net.network_distance(1, 2), 100.0);
        assert_eq!(net.network_distance(1, 4), 300.0);
        assert_eq!(net.network_distance(4, 1), 300.0);
    }

    #[test]
    fn test_memo_is_symmetric() {
        let net = path_network();
        net.network_distance(1, 4);
        for ((a, b), d) in net.memoized_pairs() {
            assert_eq!(net.network_distance(b, a), d, "memo asymmetric for ({a},{b})");
        }
    }

    #[test]
    fn test_unreachable_is_infinite_and_memoized() {
        let mut net = path_network();
        net.add_node(99, 1.0, 1.0, &["island"]);
        net.add_node(98, 1.0, 1.001, &[] as &[&str]);
        net.add_bidirectional_edge(99, 98, 50.0).unwrap();
        assert!(net.network_distance(1, 99).is_infinite());
        // Served from the memo on the second call
        assert!(net.network_distance(99, 1).is_infinite());
    }

    #[test]
    fn test_duplicate_edges_merge_by_min_weight() {
        let mut net = RoadNetwork::new();
        net.add_node(1, 0.0, 0.0, &[] as &[&str]);
        net.add_node(2, 0.0, 0.001, &[] as &[&str]);
        net.add_bidirectional_edge(1, 2, 100.0).unwrap();
        net.add_bidirectional_edge(1, 2, 80.0).unwrap();
        net.add_bidirectional_edge(1, 2, 120.0).unwrap();
        assert_eq!(net.neighbors(1).len(), 1);
        assert_eq!(net.network_distance(1, 2), 80.0);
    }

    #[test]
    fn test_non_positive_edge_weight_is_rejected() {
        let mut net = RoadNetwork::new();
        net.add_node(1, 0.0, 0.0, &[] as &[&str]);
        net.add_node(2, 0.0, 0.001, &[] as &[&str]);
        assert!(matches!(
            net.add_edge(1, 2, 0.0),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(net.add_bidirectional_edge(1, 2, -5.0).is_err());
        assert!(net.add_bidirectional_edge(1, 2, f64::NAN).is_err());
        assert!(net.add_bidirectional_edge(1, 2, f64::INFINITY).is_err());
        assert_eq!(net.edge_count(), 0);
    }

    #[test]
    fn test_keywords_lowercased_and_indexed() {
        let mut net = RoadNetwork::new();
        net.add_node(1, 0.0, 0.0, &["Bank"]);
        net.add_node(2, 0.0, 0.001, &["BANK", "cafe"]);
        let banks = net.nodes_with_keyword("bank").unwrap();
        assert_eq!(banks.len(), 2);
        assert!(net.nodes_with_keyword("BaNk").is_some());
        assert!(net.nodes_with_keyword("pharmacy").is_none());
    }

    #[test]
    fn test_remove_isolated_nodes_updates_keyword_index() {
        let mut net = path_network();
        net.add_node(50, 0.5, 0.5, &["lonely"]);
        assert_eq!(net.remove_isolated_nodes(), 1);
        assert!(!net.contains_vertex(50));
        assert!(net.nodes_with_keyword("lonely").is_none());
        assert_eq!(net.node_count(), 4);
    }

    #[test]
    fn test_shortest_path_sequence() {
        let net = path_network();
        let (d, path) = net.shortest_path(1, 4).unwrap();
        assert_eq!(d, 300.0);
        assert_eq!(path, vec![1, 2, 3, 4]);
        assert!(net.shortest_path(1, 999).is_none());
    }

    #[test]
    fn test_shortest_path_prefers_lighter_route() {
        let mut net = path_network();
        // Shortcut 1 - 4 heavier than the path through 2, 3
        net.add_bidirectional_edge(1, 4, 350.0).unwrap();
        let (d, path) = net.shortest_path(1, 4).unwrap();
        assert_eq!(d, 300.0);
        assert_eq!(path, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_nearest_vertex() {
        let net = path_network();
        assert_eq!(net.nearest_vertex(0.0, 0.0001), Some(1));
        assert_eq!(net.nearest_vertex(0.0, 0.0029), Some(4));
    }

    #[test]
    fn test_index_keyword_on_existing_node() {
        let mut net = path_network();
        assert!(net.index_keyword(3, "Pharmacy"));
        assert!(net.node_has_keyword(3, net.keyword_id("pharmacy").unwrap()));
        assert!(!net.index_keyword(999, "pharmacy"));
    }
}
