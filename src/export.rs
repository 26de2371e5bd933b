//! Graph ingest and export.
//!
//! One JSON schema serves both directions, so an exported network loads
//! back unchanged:
//! `{ "nodes": [{"id", "lat", "lon", "keywords"}], "edges": [{"from", "to", "weight"}] }`
//!
//! Keywords are lowercased on ingest; duplicate edges merge by minimum
//! weight; every edge is undirected and exported once with `from < to`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::graph::RoadNetwork;

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    id: i64,
    lat: f64,
    lon: f64,
    keywords: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgeRecord {
    from: i64,
    to: i64,
    weight: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphFile {
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
}

/// Build a network from its JSON representation
pub fn network_from_json(json: &str) -> Result<RoadNetwork> {
    let file: GraphFile = serde_json::from_str(json)?;
    let mut net = RoadNetwork::new();
    for node in &file.nodes {
        net.add_node(node.id, node.lat, node.lon, &node.keywords);
    }
    for edge in &file.edges {
        if !net.contains_vertex(edge.from) || !net.contains_vertex(edge.to) {
            return Err(EngineError::InvalidArgument(format!(
                "edge ({}, {}) references an unknown vertex",
                edge.from, edge.to
            )));
        }
        net.add_bidirectional_edge(edge.from, edge.to, edge.weight)?;
    }
    tracing::info!(
        nodes = net.node_count(),
        edges = net.edge_count(),
        "loaded network"
    );
    Ok(net)
}

/// Serialize a network for the visualizer (and for re-ingest)
pub fn network_to_json(net: &RoadNetwork) -> Result<String> {
    let mut nodes: Vec<NodeRecord> = net
        .vertex_ids()
        .map(|id| {
            let node = net.node(id).unwrap();
            let mut keywords: Vec<String> = node
                .keywords
                .iter()
                .map(|&kw| net.keyword_name(kw).to_string())
                .collect();
            keywords.sort();
            NodeRecord {
                id,
                lat: node.lat,
                lon: node.lon,
                keywords,
            }
        })
        .collect();
    nodes.sort_by_key(|n| n.id);

    let mut edges: Vec<EdgeRecord> = Vec::new();
    for id in net.vertex_ids() {
        for e in net.neighbors(id) {
            if e.from < e.to {
                edges.push(EdgeRecord {
                    from: e.from,
                    to: e.to,
                    weight: e.weight,
                });
            }
        }
    }
    edges.sort_by_key(|e| (e.from, e.to));

    Ok(serde_json::to_string_pretty(&GraphFile { nodes, edges })?)
}

pub fn read_network<P: AsRef<Path>>(path: P) -> Result<RoadNetwork> {
    let json = fs::read_to_string(path)?;
    network_from_json(&json)
}

pub fn write_network<P: AsRef<Path>>(net: &RoadNetwork, path: P) -> Result<()> {
    fs::write(path, network_to_json(net)?)?;
    Ok(())
}
