//! Runtime invariant validation.
//!
//! Fast-fail cross-checks over a loaded network:
//! - Symmetric distance memo
//! - Two-hop oracle agreement with plain Dijkstra on a random sample
//! - findNext equivalence between the AB-tree and PB-tree realizations
//! - PB-tree subtree summary containment

use rand::prelude::*;
use rustc_hash::FxHashSet;

use crate::graph::RoadNetwork;
use crate::query::Clue;
use crate::search::{SearchIndex, SearchTrace};

/// Validation outcome
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub passed: bool,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            passed: true,
            ..Default::default()
        }
    }

    fn check_passed(&mut self) {
        self.checks_run += 1;
        self.checks_passed += 1;
    }

    fn check_failed(&mut self, msg: String) {
        self.checks_run += 1;
        self.passed = false;
        self.errors.push(msg);
    }

    fn warn(&mut self, msg: String) {
        self.warnings.push(msg);
    }
}

/// Run all invariant checks. Builds both findNext indices locally, so this
/// is intended for moderate networks and CI-style smoke runs.
pub fn validate_network(net: &RoadNetwork, samples: usize, seed: u64) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut rng = StdRng::seed_from_u64(seed);

    let vertices: Vec<i64> = {
        let mut v: Vec<i64> = net.vertex_ids().collect();
        v.sort_unstable();
        v
    };
    if vertices.is_empty() {
        result.warn("network is empty, nothing to validate".to_string());
        return result;
    }

    let ab = SearchIndex::ab();
    let pb = SearchIndex::build_pb(net);
    let labels = pb.labels().unwrap();

    // 1. Oracle agreement on a random pair sample
    for _ in 0..samples {
        let u = vertices[rng.random_range(0..vertices.len())];
        let v = vertices[rng.random_range(0..vertices.len())];
        let exact = net.network_distance(u, v);
        let labelled = labels.query(u, v);
        let agrees = if exact.is_infinite() {
            labelled.is_infinite()
        } else {
            (exact - labelled).abs() < 1e-6
        };
        if agrees {
            result.check_passed();
        } else {
            result.check_failed(format!(
                "oracle disagreement for ({u}, {v}): dijkstra={exact}, labels={labelled}"
            ));
        }
    }

    // 2. Memo symmetry (the memo is populated by the sampling above)
    for ((u, v), d) in net.memoized_pairs() {
        let reverse = net.network_distance(v, u);
        let symmetric = if d.is_infinite() {
            reverse.is_infinite()
        } else {
            (reverse - d).abs() < 1e-9
        };
        if symmetric {
            result.check_passed();
        } else {
            result.check_failed(format!(
                "memo asymmetry for ({u}, {v}): forward={d}, reverse={reverse}"
            ));
        }
    }

    // 3. findNext equivalence on random probes
    let keywords: Vec<String> = net.known_keywords().map(|s| s.to_string()).collect();
    if keywords.is_empty() {
        result.warn("no keywords in network, skipping findNext equivalence".to_string());
    } else {
        for _ in 0..samples {
            let source = vertices[rng.random_range(0..vertices.len())];
            let keyword = &keywords[rng.random_range(0..keywords.len())];
            let distance = rng.random_range(50.0..2000.0);
            let epsilon = rng.random_range(0.0..=1.0);
            let clue = match Clue::new(keyword, distance, epsilon) {
                Ok(c) => c,
                Err(_) => continue,
            };

            let mut trace = SearchTrace::default();
            let forbidden = FxHashSet::default();
            let a = ab.find_next(
                net,
                source,
                &clue,
                0.0,
                f64::INFINITY,
                &forbidden,
                &mut trace,
            );
            let b = pb.find_next(
                net,
                source,
                &clue,
                0.0,
                f64::INFINITY,
                &forbidden,
                &mut trace,
            );
            let equivalent = match (&a, &b) {
                (None, None) => true,
                (Some(ca), Some(cb)) => (ca.matching_dist - cb.matching_dist).abs() < 1e-6,
                _ => false,
            };
            if equivalent {
                result.check_passed();
            } else {
                result.check_failed(format!(
                    "findNext divergence for source {source}, clue ({keyword}, {distance:.1}, {epsilon:.2}): ab={a:?}, pb={b:?}"
                ));
            }
        }
    }

    // 4. PB-tree summary containment
    for tree in pb.pb_forest().unwrap().trees() {
        match tree.validate_summaries() {
            Ok(()) => result.check_passed(),
            Err(msg) => result.check_failed(msg),
        }
    }

    tracing::info!(
        checks = result.checks_run,
        passed = result.checks_passed,
        errors = result.errors.len(),
        "validation finished"
    );
    result
}
