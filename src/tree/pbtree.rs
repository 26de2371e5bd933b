//! PB-tree: a per-pivot balanced tree over the pivot-reverse entries.
//!
//! Built by median split over `PR(o)` sorted by distance, so the tree is
//! balanced by construction. Every node carries a subtree summary
//! `(min_dist, max_dist, keyword union)`; a window scan enters a subtree
//! only when the summary admits it. One tree per pivot, built in parallel.

use std::time::Instant;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::RoadNetwork;
use crate::label::pivot_reverse::{PivotReverseIndex, PrEntry};
use crate::label::TwoHopIndex;

#[derive(Debug)]
struct PbNode {
    entry: usize,
    left: Option<usize>,
    right: Option<usize>,
    // Subtree summary
    min_dist: f64,
    max_dist: f64,
    summary: FxHashSet<u32>,
}

/// Balanced binary tree over one pivot's reverse entries
#[derive(Debug)]
pub struct PbTree {
    pub pivot: i64,
    entries: Vec<PrEntry>,
    nodes: Vec<PbNode>,
    root: Option<usize>,
}

impl PbTree {
    /// `entries` must already be sorted by (dist, vertex), as the
    /// pivot-reverse index produces them
    pub fn from_entries(pivot: i64, entries: Vec<PrEntry>) -> Self {
        let mut tree = Self {
            pivot,
            entries,
            nodes: Vec::new(),
            root: None,
        };
        tree.root = tree.build_range(0, tree.entries.len());
        tree
    }

    fn build_range(&mut self, lo: usize, hi: usize) -> Option<usize> {
        if lo >= hi {
            return None;
        }
        let mid = lo + (hi - lo) / 2;
        let left = self.build_range(lo, mid);
        let right = self.build_range(mid + 1, hi);

        let (mut min_dist, mut max_dist, mut summary) = {
            let e = &self.entries[mid];
            (e.dist, e.dist, e.keywords.clone())
        };
        for child in [left, right].into_iter().flatten() {
            min_dist = min_dist.min(self.nodes[child].min_dist);
            max_dist = max_dist.max(self.nodes[child].max_dist);
            summary.extend(self.nodes[child].summary.iter().copied());
        }

        let idx = self.nodes.len();
        self.nodes.push(PbNode {
            entry: mid,
            left,
            right,
            min_dist,
            max_dist,
            summary,
        });
        Some(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Subtree summary of the root: (min_dist, max_dist, distinct keywords)
    pub fn root_summary(&self) -> Option<(f64, f64, usize)> {
        self.root
            .map(|r| (self.nodes[r].min_dist, self.nodes[r].max_dist, self.nodes[r].summary.len()))
    }

    pub fn entries(&self) -> &[PrEntry] {
        &self.entries
    }

    /// Collect entries with `dist ∈ [lo, hi]`, carrying `keyword`, not in
    /// `forbidden`, as (vertex, dist) pairs in ascending distance order
    pub fn scan(
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
        if nd.max_dist < lo || nd.min_dist > hi || !nd.summary.contains(&keyword) {
            return;
        }
        self.scan_rec(nd.left, lo, hi, keyword, forbidden, out);
        let e = &self.entries[nd.entry];
        if e.dist >= lo && e.dist <= hi && e.keywords.contains(&keyword) && !forbidden.contains(&e.vertex)
        {
            out.push((e.vertex, e.dist));
        }
        self.scan_rec(nd.right, lo, hi, keyword, forbidden, out);
    }

    /// Walk the whole tree checking the summary invariant: every node's
    /// range covers its subtree and its keyword union is a superset of the
    /// subtree's keywords
    pub fn validate_summaries(&self) -> Result<(), String> {
        self.validate_rec(self.root).map(|_| ())
    }

    fn validate_rec(
        &self,
        node: Option<usize>,
    ) -> Result<Option<(f64, f64, FxHashSet<u32>)>, String> {
        let Some(n) = node else { return Ok(None) };
        let nd = &self.nodes[n];
        let e = &self.entries[nd.entry];

        let mut min_dist = e.dist;
        let mut max_dist = e.dist;
        let mut union: FxHashSet<u32> = e.keywords.clone();
        for child in [self.validate_rec(nd.left)?, self.validate_rec(nd.right)?]
            .into_iter()
            .flatten()
        {
            min_dist = min_dist.min(child.0);
            max_dist = max_dist.max(child.1);
            union.extend(child.2);
        }

        if nd.min_dist > min_dist || nd.max_dist < max_dist {
            return Err(format!(
                "pivot {}: node range [{}, {}] does not cover subtree [{}, {}]",
                self.pivot, nd.min_dist, nd.max_dist, min_dist, max_dist
            ));
        }
        if !union.is_subset(&nd.summary) {
            return Err(format!(
                "pivot {}: keyword summary misses subtree keywords at entry {}",
                self.pivot, e.vertex
            ));
        }
        Ok(Some((min_dist, max_dist, union)))
    }
}

/// All PB-trees, one per pivot of the two-hop index
#[derive(Debug)]
pub struct PbForest {
    trees: FxHashMap<i64, PbTree>,
    pub build_ms: u64,
}

impl PbForest {
    pub fn build(net: &RoadNetwork, labels: &TwoHopIndex) -> Self {
        let start = Instant::now();
        let pr = PivotReverseIndex::build(net, labels);
        let per_pivot: Vec<(i64, Vec<PrEntry>)> = pr.into_entries().into_iter().collect();
        let trees: FxHashMap<i64, PbTree> = per_pivot
            .into_par_iter()
            .map(|(pivot, entries)| (pivot, PbTree::from_entries(pivot, entries)))
            .collect();
        let build_ms = start.elapsed().as_millis() as u64;
        tracing::info!(pivots = trees.len(), build_ms, "built pb-trees");
        Self { trees, build_ms }
    }

    pub fn tree(&self, pivot: i64) -> Option<&PbTree> {
        self.trees.get(&pivot)
    }

    pub fn trees(&self) -> impl Iterator<Item = &PbTree> {
        self.trees.values()
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}
