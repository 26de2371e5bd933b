//! End-to-end search scenarios, run against both findNext realizations.

use clue_route::{Clue, Query, RoadNetwork, RouteEngine, SearchResult};
use rand::prelude::*;
use rustc_hash::FxHashSet;

fn clue(keyword: &str, distance: f64, epsilon: f64) -> Clue {
    Clue::new(keyword, distance, epsilon).unwrap()
}

fn engines(build: fn() -> RoadNetwork) -> [RouteEngine; 2] {
    [
        RouteEngine::with_ab_tree(build()),
        RouteEngine::with_pb_tree(build()),
    ]
}

/// Every hop of a found route must carry the clue keyword, land in the
/// clue's confidence interval, and never revisit a vertex
fn assert_route_valid(engine: &RouteEngine, query: &Query, result: &SearchResult) {
    if result.is_no_route() {
        return;
    }
    let net = engine.network();
    assert_eq!(result.route.len(), query.clues().len() + 1);
    assert_eq!(result.route[0], query.source());

    let unique: FxHashSet<i64> = result.route.iter().copied().collect();
    assert_eq!(unique.len(), result.route.len(), "route revisits a vertex");

    let mut total = 0.0;
    for (i, hop) in result.route.windows(2).enumerate() {
        let clue = &query.clues()[i];
        let d = net.network_distance(hop[0], hop[1]);
        assert!(
            clue.is_within_confidence_interval(d),
            "hop {} -> {} at {d}m outside [{}, {}]",
            hop[0],
            hop[1],
            clue.d_min(),
            clue.d_max()
        );
        assert!(
            net.nodes_with_keyword(clue.keyword())
                .is_some_and(|s| s.contains(&hop[1])),
            "vertex {} does not carry '{}'",
            hop[1],
            clue.keyword()
        );
        total += clue.matching_distance(d);
    }
    assert!(
        (total - result.matching_distance).abs() < 1e-6,
        "reported matching distance {} != recomputed {total}",
        result.matching_distance
    );
}

/// 4-node path 1 - 2 - 3 - 4, edges 100m; 2: bank, 4: cafe
fn four_node_path() -> RoadNetwork {
    let mut net = RoadNetwork::new();
    net.add_node(1, 0.0, 0.000, &[] as &[&str]);
    net.add_node(2, 0.0, 0.001, &["bank"]);
    net.add_node(3, 0.0, 0.002, &[] as &[&str]);
    net.add_node(4, 0.0, 0.003, &["cafe"]);
    net.add_bidirectional_edge(1, 2, 100.0).unwrap();
    net.add_bidirectional_edge(2, 3, 100.0).unwrap();
    net.add_bidirectional_edge(3, 4, 100.0).unwrap();
    net
}

#[test]
fn s1_trivial_path() {
    let query = Query::new(1, vec![clue("bank", 100.0, 0.0), clue("cafe", 200.0, 0.0)]).unwrap();
    for engine in engines(four_node_path) {
        let result = engine.search(&query).unwrap();
        assert_eq!(result.route, vec![1, 2, 4]);
        assert_eq!(result.matching_distance, 0.0);
        assert_eq!(result.full_path, vec![1, 2, 3, 4]);
        assert_route_valid(&engine, &query, &result);
    }
}

#[test]
fn s2_tolerance_admits_inexact_hop() {
    let query = Query::new(1, vec![clue("bank", 150.0, 0.5)]).unwrap();
    for engine in engines(four_node_path) {
        let result = engine.search(&query).unwrap();
        assert_eq!(result.route, vec![1, 2]);
        assert_eq!(result.matching_distance, 50.0);
        assert_route_valid(&engine, &query, &result);
    }
}

#[test]
fn s3_infeasible_clue_reports_no_route() {
    let query = Query::new(1, vec![clue("bank", 500.0, 0.1)]).unwrap();
    for engine in engines(four_node_path) {
        let result = engine.search(&query).unwrap();
        assert!(result.is_no_route());
        assert!(result.route.is_empty());
    }
}

#[test]
fn s4_equal_distance_tie_breaks_by_smaller_id() {
    fn star() -> RoadNetwork {
        let mut net = RoadNetwork::new();
        net.add_node(1, 0.0, 0.0, &[] as &[&str]);
        net.add_node(5, 0.0, 0.002, &["shop"]);
        net.add_node(7, 0.0, -0.002, &["shop"]);
        net.add_bidirectional_edge(1, 5, 200.0).unwrap();
        net.add_bidirectional_edge(1, 7, 200.0).unwrap();
        net
    }
    let query = Query::new(1, vec![clue("shop", 200.0, 0.0)]).unwrap();
    for engine in engines(star) {
        let result = engine.search(&query).unwrap();
        assert_eq!(result.route, vec![1, 5]);
        assert_eq!(result.matching_distance, 0.0);
    }
}

#[test]
fn s5_forbidden_source_forces_second_best() {
    // The perfect match for the second clue is the source itself; the
    // driver must fall back to the farther shop
    fn net() -> RoadNetwork {
        let mut net = RoadNetwork::new();
        net.add_node(1, 0.0, 0.000, &["shop"]);
        net.add_node(2, 0.0, 0.001, &["bar"]);
        net.add_node(3, 0.0, 0.002, &[] as &[&str]);
        net.add_node(4, 0.0, 0.003, &["shop"]);
        net.add_node(5, 0.0, 0.004, &[] as &[&str]);
        net.add_bidirectional_edge(1, 2, 100.0).unwrap();
        net.add_bidirectional_edge(2, 3, 100.0).unwrap();
        net.add_bidirectional_edge(3, 4, 100.0).unwrap();
        net.add_bidirectional_edge(3, 5, 50.0).unwrap();
        net
    }
    let query = Query::new(1, vec![clue("bar", 100.0, 0.0), clue("shop", 100.0, 1.0)]).unwrap();
    for engine in engines(net) {
        let result = engine.search(&query).unwrap();
        assert_eq!(result.route, vec![1, 2, 4]);
        assert_eq!(result.matching_distance, 100.0);
        assert_route_valid(&engine, &query, &result);
    }
}

const VOCAB: [&str; 6] = ["bank", "cafe", "shop", "hotel", "fuel", "park"];

/// Connected random network: a chain for connectivity plus random extra
/// edges, every vertex carrying one or two vocabulary keywords
fn random_network(seed: u64, n: usize) -> RoadNetwork {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut net = RoadNetwork::new();
    for i in 0..n {
        let mut kws = vec![VOCAB[rng.random_range(0..VOCAB.len())]];
        if rng.random_range(0..4) == 0 {
            kws.push(VOCAB[rng.random_range(0..VOCAB.len())]);
        }
        net.add_node(i as i64, rng.random_range(-0.05..0.05), rng.random_range(-0.05..0.05), &kws);
    }
    for i in 1..n {
        net.add_bidirectional_edge(i as i64 - 1, i as i64, rng.random_range(50.0..300.0)).unwrap();
    }
    for _ in 0..n {
        let a = rng.random_range(0..n) as i64;
        let b = rng.random_range(0..n) as i64;
        if a != b {
            net.add_bidirectional_edge(a, b, rng.random_range(50.0..500.0)).unwrap();
        }
    }
    net
}

#[test]
fn s6_cross_index_agreement_on_random_network() {
    let n = 200;
    let ab = RouteEngine::with_ab_tree(random_network(99, n));
    let pb = RouteEngine::with_pb_tree(random_network(99, n));

    let mut rng = StdRng::seed_from_u64(7);
    let mut routes_found = 0;
    for _ in 0..80 {
        let source = rng.random_range(0..n) as i64;
        let clues: Vec<Clue> = (0..3)
            .map(|_| {
                clue(
                    VOCAB[rng.random_range(0..VOCAB.len())],
                    rng.random_range(100.0..1200.0),
                    rng.random_range(0.05..0.3),
                )
            })
            .collect();
        let query = Query::new(source, clues).unwrap();

        let ra = ab.search(&query).unwrap();
        let rb = pb.search(&query).unwrap();
        assert_eq!(
            ra.is_no_route(),
            rb.is_no_route(),
            "feasibility disagreement for {query:?}"
        );
        if !ra.is_no_route() {
            routes_found += 1;
            assert!(
                (ra.matching_distance - rb.matching_distance).abs() < 1e-6,
                "matching distance disagreement for {query:?}: ab={}, pb={}",
                ra.matching_distance,
                rb.matching_distance
            );
            assert_route_valid(&ab, &query, &ra);
            assert_route_valid(&pb, &query, &rb);
        }
    }
    assert!(routes_found > 0, "scenario never produced a feasible route");
}

/// Exhaustive minimum aggregate matching distance, or None if infeasible
fn brute_force(net: &RoadNetwork, query: &Query) -> Option<f64> {
    fn rec(net: &RoadNetwork, prev: i64, clues: &[Clue], used: &mut Vec<i64>) -> Option<f64> {
        let Some(clue) = clues.first() else {
            return Some(0.0);
        };
        let candidates: Vec<i64> = net
            .nodes_with_keyword(clue.keyword())
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        let mut best: Option<f64> = None;
        for v in candidates {
            if used.contains(&v) {
                continue;
            }
            let d = net.network_distance(prev, v);
            if !clue.is_within_confidence_interval(d) {
                continue;
            }
            used.push(v);
            if let Some(rest) = rec(net, v, &clues[1..], used) {
                let total = clue.matching_distance(d) + rest;
                if best.map_or(true, |b| total < b) {
                    best = Some(total);
                }
            }
            used.pop();
        }
        best
    }
    let mut used = vec![query.source()];
    rec(net, query.source(), query.clues(), &mut used)
}

#[test]
fn bab_is_optimal_against_brute_force() {
    for seed in [11, 23, 47] {
        let n = 30;
        let ab = RouteEngine::with_ab_tree(random_network(seed, n));
        let pb = RouteEngine::with_pb_tree(random_network(seed, n));

        let mut rng = StdRng::seed_from_u64(seed ^ 0xbeef);
        for _ in 0..15 {
            let source = rng.random_range(0..n) as i64;
            let clue_count = rng.random_range(1..=3);
            let clues: Vec<Clue> = (0..clue_count)
                .map(|_| {
                    clue(
                        VOCAB[rng.random_range(0..VOCAB.len())],
                        rng.random_range(80.0..900.0),
                        rng.random_range(0.1..0.5),
                    )
                })
                .collect();
            let query = Query::new(source, clues).unwrap();
            let expected = brute_force(ab.network(), &query);

            for engine in [&ab, &pb] {
                let result = engine.search(&query).unwrap();
                match expected {
                    None => assert!(
                        result.is_no_route(),
                        "engine found a route where brute force found none: {query:?}"
                    ),
                    Some(best) => {
                        assert!(
                            !result.is_no_route(),
                            "engine missed a feasible route: {query:?}"
                        );
                        assert!(
                            (result.matching_distance - best).abs() < 1e-6,
                            "suboptimal route for {query:?}: got {}, brute force {best}",
                            result.matching_distance
                        );
                        assert_route_valid(engine, &query, &result);
                    }
                }
            }
        }
    }
}

#[test]
fn deadline_zero_reports_partial_result() {
    let query = Query::new(1, vec![clue("bank", 100.0, 0.0)]).unwrap();
    for engine in engines(four_node_path) {
        let result = engine
            .search_with_deadline(
                &query,
                Some(std::time::Instant::now() - std::time::Duration::from_millis(1)),
            )
            .unwrap();
        assert!(result.deadline_exceeded);
        assert!(result.is_no_route());
    }
}
