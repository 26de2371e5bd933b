//! Pivot-reverse index: the inversion of the two-hop labels.
//!
//! For each pivot `o`, `PR(o)` lists every vertex whose label contains `o`,
//! with the labelled distance and the vertex's keyword set, sorted by
//! ascending distance. This is the backing array the PB-trees are built
//! over.

use rustc_hash::{FxHashMap, FxHashSet};

use super::TwoHopIndex;
use crate::graph::RoadNetwork;

/// One reverse entry: a vertex that uses the pivot, `L(v, o)`, and the
/// vertex's interned keywords
#[derive(Debug, Clone)]
pub struct PrEntry {
    pub vertex: i64,
    pub dist: f64,
    pub keywords: FxHashSet<u32>,
}

#[derive(Debug, Default)]
pub struct PivotReverseIndex {
    entries: FxHashMap<i64, Vec<PrEntry>>,
}

impl PivotReverseIndex {
    pub fn build(net: &RoadNetwork, labels: &TwoHopIndex) -> Self {
        let mut entries: FxHashMap<i64, Vec<PrEntry>> = FxHashMap::default();
        for (vertex, label) in labels.iter() {
            let keywords = net
                .node(vertex)
                .map(|n| n.keywords.clone())
                .unwrap_or_default();
            for e in label {
                entries.entry(e.pivot).or_default().push(PrEntry {
                    vertex,
                    dist: e.dist,
                    keywords: keywords.clone(),
                });
            }
        }
        for list in entries.values_mut() {
            list.sort_by(|a, b| {
                a.dist
                    .total_cmp(&b.dist)
                    .then_with(|| a.vertex.cmp(&b.vertex))
            });
        }
        Self { entries }
    }

    pub fn entries(&self, pivot: i64) -> &[PrEntry] {
        self.entries.get(&pivot).map_or(&[], |l| l.as_slice())
    }

    pub fn pivots(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the index, handing the per-pivot entry lists to the PB-tree
    /// builder
    pub fn into_entries(self) -> FxHashMap<i64, Vec<PrEntry>> {
        self.entries
    }
}
