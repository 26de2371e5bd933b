//! CLI commands for clue-route.
//!
//! Exit codes: 0 on success, 1 on invalid arguments or I/O failure, 2 when
//! no route (or no findNext candidate) exists.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rustc_hash::FxHashSet;

use crate::error::suggest_keyword;
use crate::export;
use crate::graph::RoadNetwork;
use crate::label::TwoHopIndex;
use crate::query::{Clue, Query};
use crate::search::bab::RouteEngine;
use crate::tree::pbtree::PbForest;
use crate::validate::validate_network;

#[derive(Parser)]
#[command(name = "clue-route")]
#[command(about = "Clue-based route search on road networks", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Which findNext accelerator backs the search
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum IndexKind {
    /// Per-source AB-trees
    Ab,
    /// Two-hop labels with per-pivot PB-trees
    Pb,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the findNext operator for a single clue
    Findnext {
        /// Graph JSON file
        graph: PathBuf,
        /// Source vertex id
        source: i64,
        /// Clue keyword
        keyword: String,
        /// Clue target distance in meters
        distance: f64,
        /// Clue tolerance in [0, 1]
        epsilon: f64,
        /// Matching distance already accumulated
        theta: f64,
        /// Global upper bound (use `inf` for unbounded)
        ub: f64,
        #[arg(long, value_enum, default_value = "pb")]
        index: IndexKind,
    },
    /// Branch-and-bound search over an ordered clue list
    Bab {
        /// Graph JSON file
        graph: PathBuf,
        /// Source vertex id
        source: i64,
        /// Clues as keyword,distance,epsilon triples
        clues: Vec<String>,
        #[arg(long, value_enum, default_value = "pb")]
        index: IndexKind,
        /// Search deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Emit the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Exact network distance between two vertices
    Distance {
        graph: PathBuf,
        u: i64,
        v: i64,
    },
    /// Print a vertex's two-hop label
    Label { graph: PathBuf, vertex: i64 },
    /// Print a pivot's PB-tree summary
    Pbtree { graph: PathBuf, pivot: i64 },
    /// Export the network as visualizer JSON
    Export { graph: PathBuf, out: PathBuf },
    /// Run the runtime invariant checks
    Validate {
        graph: PathBuf,
        #[arg(long, default_value_t = 200)]
        samples: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn parse_clue(s: &str) -> Result<Clue> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        bail!("clue must be in format 'keyword,distance,epsilon', got '{s}'");
    }
    let distance = parts[1].trim().parse::<f64>().context("bad clue distance")?;
    let epsilon = parts[2].trim().parse::<f64>().context("bad clue epsilon")?;
    Ok(Clue::new(parts[0], distance, epsilon)?)
}

fn load_network(path: &PathBuf) -> Result<RoadNetwork> {
    println!("Loading graph from {}...", path.display());
    let net = export::read_network(path)
        .with_context(|| format!("failed to load graph {}", path.display()))?;
    println!("Loaded {} nodes, {} edges", net.node_count(), net.edge_count());
    Ok(net)
}

fn build_engine(net: RoadNetwork, index: IndexKind) -> RouteEngine {
    match index {
        IndexKind::Ab => RouteEngine::with_ab_tree(net),
        IndexKind::Pb => RouteEngine::with_pb_tree(net),
    }
}

fn hint_unknown_keywords(net: &RoadNetwork, clues: &[Clue]) {
    for clue in clues {
        if net.keyword_id(clue.keyword()).is_none() {
            match suggest_keyword(clue.keyword(), net.known_keywords()) {
                Some(suggestion) => println!(
                    "Keyword '{}' matches no vertex, did you mean '{}'?",
                    clue.keyword(),
                    suggestion
                ),
                None => println!("Keyword '{}' matches no vertex", clue.keyword()),
            }
        }
    }
}

impl Cli {
    pub fn run(self) -> Result<i32> {
        match self.command {
            Commands::Findnext {
                graph,
                source,
                keyword,
                distance,
                epsilon,
                theta,
                ub,
                index,
            } => {
                let net = load_network(&graph)?;
                let clue = Clue::new(&keyword, distance, epsilon)?;
                let engine = build_engine(net, index);
                hint_unknown_keywords(engine.network(), std::slice::from_ref(&clue));

                let start = Instant::now();
                let (best, trace) =
                    engine.find_next(source, &clue, theta, ub, &FxHashSet::default())?;
                println!(
                    "findNext probed in {:.3}s ({} trace events)",
                    start.elapsed().as_secs_f64(),
                    trace.len()
                );

                match best {
                    Some(c) => {
                        println!("Best candidate: vertex {}", c.vertex);
                        println!("  network distance:  {:.1}m", c.network_dist);
                        println!("  matching distance: {:.1}m", c.matching_dist);
                        Ok(0)
                    }
                    None => {
                        println!("No admissible candidate");
                        Ok(2)
                    }
                }
            }
            Commands::Bab {
                graph,
                source,
                clues,
                index,
                timeout_ms,
                json,
            } => {
                if clues.is_empty() {
                    bail!("at least one clue is required");
                }
                let net = load_network(&graph)?;
                let parsed = clues
                    .iter()
                    .map(|c| parse_clue(c))
                    .collect::<Result<Vec<_>>>()?;
                let query = Query::new(source, parsed)?;
                let engine = build_engine(net, index);
                hint_unknown_keywords(engine.network(), query.clues());

                let deadline = timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
                let result = engine.search_with_deadline(&query, deadline)?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                } else {
                    println!("\n=== BAB Search Results ===");
                    if result.is_no_route() {
                        println!("No feasible route");
                    } else {
                        println!("Route: {:?}", result.route);
                        println!("Full path: {:?}", result.full_path);
                        println!("Matching distance: {:.1}m", result.matching_distance);
                        println!("Network distance:  {:.1}m", result.network_distance);
                    }
                    if result.deadline_exceeded {
                        println!("(deadline exceeded, result may be suboptimal)");
                    }
                    println!(
                        "Timings: labels {}ms, trees {}ms, search {}ms, {} iterations",
                        result.timings.label_build_ms,
                        result.timings.tree_build_ms,
                        result.timings.search_ms,
                        result.timings.iterations
                    );
                }
                Ok(if result.is_no_route() { 2 } else { 0 })
            }
            Commands::Distance { graph, u, v } => {
                let net = load_network(&graph)?;
                let d = net.network_distance(u, v);
                if d.is_infinite() {
                    println!("{u} -> {v}: unreachable");
                } else {
                    println!("{u} -> {v}: {d:.1}m");
                }
                Ok(0)
            }
            Commands::Label { graph, vertex } => {
                let net = load_network(&graph)?;
                let labels = TwoHopIndex::build(&net);
                let label = labels.label(vertex);
                if label.is_empty() {
                    println!("Vertex {vertex} has no label (unknown vertex?)");
                    return Ok(0);
                }
                println!("L({vertex}): {} entries", label.len());
                for e in label {
                    println!("  pivot {:>8}  dist {:.1}m", e.pivot, e.dist);
                }
                Ok(0)
            }
            Commands::Pbtree { graph, pivot } => {
                let net = load_network(&graph)?;
                let labels = TwoHopIndex::build(&net);
                let forest = PbForest::build(&net, &labels);
                match forest.tree(pivot) {
                    Some(tree) => {
                        println!("PB-tree for pivot {pivot}: {} entries", tree.len());
                        if let Some((min_dist, max_dist, keywords)) = tree.root_summary() {
                            println!(
                                "  distance range [{min_dist:.1}m, {max_dist:.1}m], {keywords} distinct keywords"
                            );
                        }
                        for e in tree.entries() {
                            let names: Vec<&str> = {
                                let mut n: Vec<&str> = e
                                    .keywords
                                    .iter()
                                    .map(|&kw| net.keyword_name(kw))
                                    .collect();
                                n.sort_unstable();
                                n
                            };
                            println!(
                                "  vertex {:>8}  dist {:>8.1}m  [{}]",
                                e.vertex,
                                e.dist,
                                names.join(", ")
                            );
                        }
                        Ok(0)
                    }
                    None => {
                        println!("No PB-tree for pivot {pivot} (not a pivot of any label)");
                        Ok(0)
                    }
                }
            }
            Commands::Export { graph, out } => {
                let net = load_network(&graph)?;
                export::write_network(&net, &out)
                    .with_context(|| format!("failed to write {}", out.display()))?;
                println!("Exported to {}", out.display());
                Ok(0)
            }
            Commands::Validate {
                graph,
                samples,
                seed,
            } => {
                let net = load_network(&graph)?;
                println!("\nRunning invariant checks ({samples} samples, seed {seed})...");
                let result = validate_network(&net, samples, seed);

                println!("\n=== VALIDATION SUMMARY ===");
                println!("  Checks run:    {}", result.checks_run);
                println!("  Checks passed: {}", result.checks_passed);
                println!("  Errors:        {}", result.errors.len());
                println!("  Warnings:      {}", result.warnings.len());
                for (i, e) in result.errors.iter().enumerate() {
                    println!("    {}. {}", i + 1, e);
                }
                for w in &result.warnings {
                    println!("    warning: {w}");
                }
                Ok(if result.passed { 0 } else { 1 })
            }
        }
    }
}
