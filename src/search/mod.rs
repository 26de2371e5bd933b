//! The findNext operator: given a partial route's head, one clue, the
//! accumulated matching distance θ and the global upper bound, return the
//! admissible next vertices in best-first order.
//!
//! Two realizations share the contract as tagged alternatives, not a class
//! hierarchy: the AB-tree scans exact per-source distances, the PB-tree
//! decomposes the search over the source's label pivots and confirms each
//! hit with the two-hop oracle. Both must produce the same best matching
//! distance on a consistent network.

pub mod bab;

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::graph::RoadNetwork;
use crate::label::TwoHopIndex;
use crate::query::Clue;
use crate::tree::abtree::AbForest;
use crate::tree::pbtree::PbForest;

/// One admissible next vertex for a clue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub vertex: i64,
    pub network_dist: f64,
    pub matching_dist: f64,
}

/// One search-step trace record; pruning reasons are spelled out in
/// `result`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    pub action: String,
    pub node_type: String,
    pub candidate: Option<i64>,
    pub result: String,
}

/// Append-only trace of search steps
#[derive(Debug, Default)]
pub struct SearchTrace {
    events: Vec<TraceEvent>,
}

impl SearchTrace {
    pub fn push(
        &mut self,
        action: &str,
        node_type: &str,
        candidate: Option<i64>,
        result: impl Into<String>,
    ) {
        self.events.push(TraceEvent {
            action: action.to_string(),
            node_type: node_type.to_string(),
            candidate,
            result: result.into(),
        });
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// The two interchangeable findNext accelerators
#[derive(Debug)]
pub enum SearchIndex {
    /// Per-source AB-trees, materialized lazily
    Ab(AbForest),
    /// Two-hop labels with one PB-tree per pivot
    Pb {
        labels: TwoHopIndex,
        forest: PbForest,
    },
}

impl SearchIndex {
    pub fn ab() -> Self {
        SearchIndex::Ab(AbForest::new())
    }

    pub fn build_pb(net: &RoadNetwork) -> Self {
        let labels = TwoHopIndex::build(net);
        let forest = PbForest::build(net, &labels);
        SearchIndex::Pb { labels, forest }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SearchIndex::Ab(_) => "ab-tree",
            SearchIndex::Pb { .. } => "pb-tree",
        }
    }

    pub fn labels(&self) -> Option<&TwoHopIndex> {
        match self {
            SearchIndex::Ab(_) => None,
            SearchIndex::Pb { labels, .. } => Some(labels),
        }
    }

    pub fn pb_forest(&self) -> Option<&PbForest> {
        match self {
            SearchIndex::Ab(_) => None,
            SearchIndex::Pb { forest, .. } => Some(forest),
        }
    }

    pub fn label_build_ms(&self) -> u64 {
        self.labels().map_or(0, |l| l.stats.build_ms)
    }

    pub fn tree_build_ms(&self) -> u64 {
        match self {
            SearchIndex::Ab(forest) => forest.build_ms(),
            SearchIndex::Pb { forest, .. } => forest.build_ms,
        }
    }

    /// Best admissible candidate, or `None` when the clue cannot be
    /// satisfied under the bound
    pub fn find_next(
        &self,
        net: &RoadNetwork,
        source: i64,
        clue: &Clue,
        theta: f64,
        ub: f64,
        forbidden: &FxHashSet<i64>,
        trace: &mut SearchTrace,
    ) -> Option<Candidate> {
        self.candidates(net, source, clue, theta, ub, forbidden, trace)
            .into_iter()
            .next()
    }

    /// All admissible candidates in ascending (matching distance, network
    /// distance, vertex id) order. A candidate is admissible when its hop
    /// distance lies in the clue's confidence interval and
    /// `θ + matching < UB`.
    pub fn candidates(
        &self,
        net: &RoadNetwork,
        source: i64,
        clue: &Clue,
        theta: f64,
        ub: f64,
        forbidden: &FxHashSet<i64>,
        trace: &mut SearchTrace,
    ) -> Vec<Candidate> {
        let Some(keyword) = net.keyword_id(clue.keyword()) else {
            trace.push(
                "find_next",
                self.kind(),
                None,
                format!("keyword '{}' matches no vertex", clue.keyword()),
            );
            return Vec::new();
        };

        let slack = ub - theta;
        if slack <= 0.0 {
            trace.push("find_next", self.kind(), None, "bound exhausted");
            return Vec::new();
        }

        // Window on the hop distance: confidence interval, narrowed by the
        // remaining slack
        let lo = clue.d_min().max(clue.distance() - slack);
        let hi = clue.d_max().min(clue.distance() + slack);
        if lo > hi {
            trace.push("find_next", self.kind(), None, "empty window");
            return Vec::new();
        }

        let mut candidates = match self {
            SearchIndex::Ab(forest) => {
                let tree = forest.tree_for(net, source);
                let mut hits = Vec::new();
                tree.range_scan(lo, hi, keyword, forbidden, &mut hits);
                hits.into_iter()
                    .map(|(vertex, dist)| Candidate {
                        vertex,
                        network_dist: dist,
                        matching_dist: clue.matching_distance(dist),
                    })
                    .collect::<Vec<_>>()
            }
            SearchIndex::Pb { labels, forest } => {
                pb_candidates(labels, forest, source, clue, keyword, lo, hi, forbidden)
            }
        };

        candidates.retain(|c| {
            c.matching_dist < slack && clue.is_within_confidence_interval(c.network_dist)
        });
        candidates.sort_by(|a, b| {
            a.matching_dist
                .total_cmp(&b.matching_dist)
                .then_with(|| a.network_dist.total_cmp(&b.network_dist))
                .then_with(|| a.vertex.cmp(&b.vertex))
        });

        trace.push(
            "find_next",
            self.kind(),
            candidates.first().map(|c| c.vertex),
            format!(
                "{} candidate(s) for '{}' in [{:.1}, {:.1}]",
                candidates.len(),
                clue.keyword(),
                lo,
                hi
            ),
        );
        candidates
    }
}

/// Pivot-decomposed candidate search: for each pivot of the source's label
/// (most promising first), scan the pivot's PB-tree with the composed
/// window, then confirm survivors with the exact oracle distance.
#[allow(clippy::too_many_arguments)]
fn pb_candidates(
    labels: &TwoHopIndex,
    forest: &PbForest,
    source: i64,
    clue: &Clue,
    keyword: u32,
    lo: f64,
    hi: f64,
    forbidden: &FxHashSet<i64>,
) -> Vec<Candidate> {
    let mut pivots: Vec<(i64, f64)> = labels
        .label(source)
        .iter()
        .map(|e| (e.pivot, e.dist))
        .collect();
    pivots.sort_by(|a, b| {
        (a.1 - clue.distance())
            .abs()
            .total_cmp(&(b.1 - clue.distance()).abs())
            .then_with(|| a.0.cmp(&b.0))
    });

    let mut evaluated: FxHashSet<i64> = FxHashSet::default();
    let mut out = Vec::new();
    let mut hits = Vec::new();
    for (pivot, dist_to_pivot) in pivots {
        // Triangle composition: L(s,o) + L(v,o) must land in [lo, hi]
        let window_hi = hi - dist_to_pivot;
        if window_hi < 0.0 {
            continue;
        }
        let window_lo = (lo - dist_to_pivot).max(0.0);
        let Some(tree) = forest.tree(pivot) else {
            continue;
        };
        hits.clear();
        tree.scan(window_lo, window_hi, keyword, forbidden, &mut hits);
        for &(vertex, _) in &hits {
            if !evaluated.insert(vertex) {
                continue;
            }
            let exact = labels.query(source, vertex);
            if !clue.is_within_confidence_interval(exact) {
                continue;
            }
            out.push(Candidate {
                vertex,
                network_dist: exact,
                matching_dist: clue.matching_distance(exact),
            });
        }
    }
    out
}
