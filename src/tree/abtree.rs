//! AB-tree: a per-source AVL tree keyed by network distance.
//!
//! Built from a single Dijkstra enumeration of every vertex reachable from
//! the source, inserted in pop order. Each tree node carries the keyword
//! union of its subtree, so a range scan can skip any subtree that cannot
//! contain the requested keyword. Nodes live in an index arena; children
//! are arena indices, not pointers.

use std::cmp::Ordering;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::RoadNetwork;

#[derive(Debug)]
struct AbNode {
    dist: f64,
    vertex: i64,
    // Own keywords, and the union over the whole subtree
    keywords: FxHashSet<u32>,
    summary: FxHashSet<u32>,
    height: u32,
    left: Option<usize>,
    right: Option<usize>,
}

/// Balanced ordered index over all vertices reachable from one source,
/// keyed by `(d_G(source, v), v)`
#[derive(Debug)]
pub struct AbTree {
    pub source: i64,
    nodes: Vec<AbNode>,
    root: Option<usize>,
}

fn cmp_key(a_dist: f64, a_vertex: i64, b_dist: f64, b_vertex: i64) -> Ordering {
    a_dist
        .total_cmp(&b_dist)
        .then_with(|| a_vertex.cmp(&b_vertex))
}

impl AbTree {
    /// One full Dijkstra from `source`; insertion order is ascending
    /// distance by construction.
    pub fn build(net: &RoadNetwork, source: i64) -> Self {
        let mut tree = Self {
            source,
            nodes: Vec::new(),
            root: None,
        };
        for (vertex, dist) in net.dijkstra_all(source) {
            let keywords = net
                .node(vertex)
                .map(|n| n.keywords.clone())
                .unwrap_or_default();
            tree.insert(dist, vertex, keywords);
        }
        tracing::debug!(source, size = tree.len(), "built ab-tree");
        tree
    }

    pub fn insert(&mut self, dist: f64, vertex: i64, keywords: FxHashSet<u32>) {
        let idx = self.nodes.len();
        self.nodes.push(AbNode {
            dist,
            vertex,
            summary: keywords.clone(),
            keywords,
            height: 1,
            left: None,
            right: None,
        });
        self.root = Some(self.insert_rec(self.root, idx));
    }

    fn insert_rec(&mut self, root: Option<usize>, new: usize) -> usize {
        let Some(n) = root else { return new };
        let ord = cmp_key(
            self.nodes[new].dist,
            self.nodes[new].vertex,
            self.nodes[n].dist,
            self.nodes[n].vertex,
        );
        if ord == Ordering::Less {
            let child = self.insert_rec(self.nodes[n].left, new);
            self.nodes[n].left = Some(child);
        } else {
            let child = self.insert_rec(self.nodes[n].right, new);
            self.nodes[n].right = Some(child);
        }
        self.rebalance(n)
    }

    fn height(&self, node: Option<usize>) -> u32 {
        node.map_or(0, |n| self.nodes[n].height)
    }

    fn balance_factor(&self, n: usize) -> i32 {
        self.height(self.nodes[n].left) as i32 - self.height(self.nodes[n].right) as i32
    }

    /// Recompute height and subtree keyword union from the children
    fn update(&mut self, n: usize) {
        let mut height = 1;
        let mut summary = self.nodes[n].keywords.clone();
        for child in [self.nodes[n].left, self.nodes[n].right]
            .into_iter()
            .flatten()
        {
            height = height.max(1 + self.nodes[child].height);
            summary.extend(self.nodes[child].summary.iter().copied());
        }
        self.nodes[n].height = height;
        self.nodes[n].summary = summary;
    }

    fn rotate_right(&mut self, n: usize) -> usize {
        let l = self.nodes[n].left.expect("rotate_right without left child");
        self.nodes[n].left = self.nodes[l].right;
        self.nodes[l].right = Some(n);
        self.update(n);
        self.update(l);
        l
    }

    fn rotate_left(&mut self, n: usize) -> usize {
        let r = self.nodes[n].right.expect("rotate_left without right child");
        self.nodes[n].right = self.nodes[r].left;
        self.nodes[r].left = Some(n);
        self.update(n);
        self.update(r);
        r
    }

    fn rebalance(&mut self, n: usize) -> usize {
        self.update(n);
        let bf = self.balance_factor(n);
        if bf > 1 {
            let left = self.nodes[n].left.unwrap();
            if self.balance_factor(left) < 0 {
                let new_left = self.rotate_left(left);
                self.nodes[n].left = Some(new_left);
            }
            return self.rotate_right(n);
        }
        if bf < -1 {
            let right = self.nodes[n].right.unwrap();
            if self.balance_factor(right) > 0 {
                let new_right = self.rotate_right(right);
                self.nodes[n].right = Some(new_right);
            }
            return self.rotate_left(n);
        }
        n
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn tree_height(&self) -> u32 {
        self.height(self.root)
    }

    /// Smallest (dist, vertex) with dist ≥ x
    pub fn successor(&self, x: f64) -> Option<(f64, i64)> {
        let mut cur = self.root;
        let mut best = None;
        while let Some(n) = cur {
            let node = &self.nodes[n];
            if node.dist >= x {
                best = Some((node.dist, node.vertex));
                cur = node.left;
            } else {
                cur = node.right;
            }
        }
        best
    }

    /// Largest (dist, vertex) with dist ≤ x
    pub fn predecessor(&self, x: f64) -> Option<(f64, i64)> {
        let mut cur = self.root;
        let mut best = None;
        while let Some(n) = cur {
            let node = &self.nodes[n];
            if node.dist <= x {
                best = Some((node.dist, node.vertex));
                cur = node.right;
            } else {
                cur = node.left;
            }
        }
        best
    }

    /// In-order scan of vertices with distance in `[lo, hi]` carrying
    /// `keyword` and not in `forbidden`. Subtrees whose keyword union lacks
    /// the keyword, or whose key range misses the window, are skipped.
    pub fn range_scan(
        &self,
        lo: f64,
        hi: f64,
        keyword: u32,
        forbidden: &FxHashSet<i64>,
        out: &mut Vec<(i64, f64)>,
    ) {
        self.scan_rec(self.root, lo, hi, keyword, forbidden, out);
    }

    fn scan_rec(
        &self,
        node: Option<usize>,
        lo: f64,
        hi: f64,
        keyword: u32,
        forbidden: &FxHashSet<i64>,
        out: &mut Vec<(i64, f64)>,
    ) {
        let Some(n) = node else { return };
        let nd = &self.nodes[n];
        if !nd.summary.contains(&keyword) {
            return;
        }
        if nd.dist >= lo {
            self.scan_rec(nd.left, lo, hi, keyword, forbidden, out);
        }
        if nd.dist >= lo
            && nd.dist <= hi
            && nd.keywords.contains(&keyword)
            && !forbidden.contains(&nd.vertex)
        {
            out.push((nd.vertex, nd.dist));
        }
        if nd.dist <= hi {
            self.scan_rec(nd.right, lo, hi, keyword, forbidden, out);
        }
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        fn walk(tree: &AbTree, n: Option<usize>) -> (u32, FxHashSet<u32>) {
            let Some(n) = n else {
                return (0, FxHashSet::default());
            };
            let node = &tree.nodes[n];
            let (lh, lkw) = walk(tree, node.left);
            let (rh, rkw) = walk(tree, node.right);
            assert!(
                (lh as i32 - rh as i32).abs() <= 1,
                "avl balance violated at vertex {}",
                node.vertex
            );
            let mut expect: FxHashSet<u32> = node.keywords.clone();
            expect.extend(lkw);
            expect.extend(rkw);
            assert_eq!(expect, node.summary, "summary mismatch at {}", node.vertex);
            (1 + lh.max(rh), expect)
        }
        walk(self, self.root);
    }
}

/// Lazily materialized AB-trees, one per query source, behind a write lock
/// so concurrent queries can share them
#[derive(Debug, Default)]
pub struct AbForest {
    trees: RwLock<FxHashMap<i64, Arc<AbTree>>>,
    build_ms: AtomicU64,
}

impl AbForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree for `source`, building it on first use
    pub fn tree_for(&self, net: &RoadNetwork, source: i64) -> Arc<AbTree> {
        if let Some(tree) = self.trees.read().get(&source) {
            return Arc::clone(tree);
        }
        let start = Instant::now();
        let tree = Arc::new(AbTree::build(net, source));
        self.build_ms.fetch_add(
            start.elapsed().as_millis() as u64,
            std::sync::atomic::Ordering::Relaxed,
        );
        let mut trees = self.trees.write();
        Arc::clone(trees.entry(source).or_insert(tree))
    }

    /// Total milliseconds spent building trees so far
    pub fn build_ms(&self) -> u64 {
        self.build_ms.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.trees.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.read().is_empty()
    }
}
