//! Branch-and-bound route search.
//!
//! Partial routes grow depth-first; children are pushed best-candidate on
//! top, so the first descent is the greedy route and every completed route
//! tightens the global upper bound. A partial route is cut as soon as its
//! accumulated matching distance reaches the bound. With the deterministic
//! candidate order (matching distance, network distance, vertex id) two
//! runs over identical inputs produce identical routes and traces.

use std::time::Instant;

use rustc_hash::FxHashSet;
use serde::Serialize;

use super::{Candidate, SearchIndex, SearchTrace, TraceEvent};
use crate::error::{EngineError, Result};
use crate::graph::RoadNetwork;
use crate::query::{Clue, Query};

/// Build and search timings in milliseconds, plus the number of frontier
/// pops
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
    pub label_build_ms: u64,
    pub tree_build_ms: u64,
    pub search_ms: u64,
    pub iterations: u64,
}

/// Outcome of one route search. An empty `route` means no feasible route
/// exists (or none was found before the deadline); that is a value, not an
/// error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Source followed by one vertex per clue; empty if no feasible route
    pub route: Vec<i64>,
    /// Route with every hop expanded to its shortest-path vertex sequence
    pub full_path: Vec<i64>,
    pub matching_distance: f64,
    pub network_distance: f64,
    pub trace: Vec<TraceEvent>,
    pub timings: Timings,
    pub deadline_exceeded: bool,
}

impl SearchResult {
    pub fn is_no_route(&self) -> bool {
        self.route.is_empty()
    }
}

#[derive(Debug)]
struct Partial {
    prefix: Vec<i64>,
    theta: f64,
}

/// The query engine: an immutable road network plus one findNext index
#[derive(Debug)]
pub struct RouteEngine {
    net: RoadNetwork,
    index: SearchIndex,
}

impl RouteEngine {
    /// Engine backed by lazily built per-source AB-trees
    pub fn with_ab_tree(net: RoadNetwork) -> Self {
        Self {
            index: SearchIndex::ab(),
            net,
        }
    }

    /// Engine backed by the two-hop labels and per-pivot PB-trees; indices
    /// are built here, once
    pub fn with_pb_tree(net: RoadNetwork) -> Self {
        let index = SearchIndex::build_pb(&net);
        Self { net, index }
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.net
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// One findNext probe against the engine's index
    pub fn find_next(
        &self,
        source: i64,
        clue: &Clue,
        theta: f64,
        ub: f64,
        forbidden: &FxHashSet<i64>,
    ) -> Result<(Option<Candidate>, Vec<TraceEvent>)> {
        if !self.net.contains_vertex(source) {
            return Err(EngineError::UnknownVertex(source));
        }
        let mut trace = SearchTrace::default();
        let best = self
            .index
            .find_next(&self.net, source, clue, theta, ub, forbidden, &mut trace);
        Ok((best, trace.into_events()))
    }

    pub fn search(&self, query: &Query) -> Result<SearchResult> {
        self.search_with_deadline(query, None)
    }

    /// Branch-and-bound over partial routes. The optional deadline is
    /// checked at every frontier pop; when it fires, the best route so far
    /// is returned with `deadline_exceeded` set.
    pub fn search_with_deadline(
        &self,
        query: &Query,
        deadline: Option<Instant>,
    ) -> Result<SearchResult> {
        if !self.net.contains_vertex(query.source()) {
            return Err(EngineError::UnknownVertex(query.source()));
        }

        let start = Instant::now();
        let clues = query.clues();
        let depth_goal = clues.len();

        let mut trace = SearchTrace::default();
        let mut ub = f64::INFINITY;
        let mut best: Option<(Vec<i64>, f64)> = None;
        let mut iterations = 0u64;
        let mut deadline_exceeded = false;

        let mut stack = vec![Partial {
            prefix: vec![query.source()],
            theta: 0.0,
        }];

        while let Some(partial) = stack.pop() {
            if let Some(limit) = deadline {
                if Instant::now() >= limit {
                    deadline_exceeded = true;
                    trace.push("deadline", "driver", None, "returning best route so far");
                    break;
                }
            }
            iterations += 1;

            let head = *partial.prefix.last().unwrap();
            if partial.theta >= ub {
                trace.push(
                    "prune",
                    "driver",
                    Some(head),
                    format!("θ {:.3} ≥ ub {:.3}", partial.theta, ub),
                );
                continue;
            }

            let depth = partial.prefix.len() - 1;
            if depth == depth_goal {
                ub = partial.theta;
                trace.push(
                    "record",
                    "driver",
                    Some(head),
                    format!("complete route, ub tightened to {:.3}", ub),
                );
                best = Some((partial.prefix, partial.theta));
                continue;
            }

            let forbidden: FxHashSet<i64> = partial.prefix.iter().copied().collect();
            let candidates = self.index.candidates(
                &self.net,
                head,
                &clues[depth],
                partial.theta,
                ub,
                &forbidden,
                &mut trace,
            );
            // Reverse push keeps the best candidate on top of the stack
            for c in candidates.into_iter().rev() {
                let mut prefix = partial.prefix.clone();
                prefix.push(c.vertex);
                stack.push(Partial {
                    prefix,
                    theta: partial.theta + c.matching_dist,
                });
            }
        }

        let (route, matching_distance) = best.unwrap_or((Vec::new(), f64::INFINITY));
        let (full_path, network_distance) = self.expand_route(&route);

        let timings = Timings {
            label_build_ms: self.index.label_build_ms(),
            tree_build_ms: self.index.tree_build_ms(),
            search_ms: start.elapsed().as_millis() as u64,
            iterations,
        };
        tracing::debug!(
            source = query.source(),
            clues = depth_goal,
            iterations,
            matching = matching_distance,
            "search finished"
        );

        Ok(SearchResult {
            route,
            full_path,
            matching_distance,
            network_distance,
            trace: trace.into_events(),
            timings,
            deadline_exceeded,
        })
    }

    /// Re-expand every hop of the route to its shortest-path vertex
    /// sequence and total the network distance
    fn expand_route(&self, route: &[i64]) -> (Vec<i64>, f64) {
        if route.is_empty() {
            return (Vec::new(), f64::INFINITY);
        }
        let mut full_path = vec![route[0]];
        let mut network_distance = 0.0;
        for hop in route.windows(2) {
            match self.net.shortest_path(hop[0], hop[1]) {
                Some((dist, path)) => {
                    network_distance += dist;
                    full_path.extend_from_slice(&path[1..]);
                }
                None => {
                    network_distance = f64::INFINITY;
                }
            }
        }
        (full_path, network_distance)
    }
}
