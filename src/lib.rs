//! clue-route: clue-based route search on road networks.
//!
//! Pipeline:
//! - Ingest: JSON node/edge stream → immutable `RoadNetwork` with an
//!   inverted keyword index and a memoized Dijkstra oracle
//! - Indexing: network → two-hop labels → pivot-reverse entries → one
//!   PB-tree per pivot; or per-source AB-trees built lazily on demand
//! - Query: `Query` + network + index → findNext → branch-and-bound →
//!   `SearchResult` with the route, expanded path, trace, and timings
//!
//! Key principle: both findNext realizations answer the same contract, so
//! the branch-and-bound driver is oblivious to which index backs it.

pub mod cli;
pub mod error;
pub mod export;
pub mod geo;
pub mod graph;
pub mod label;
pub mod query;
pub mod search;
pub mod tree;
pub mod validate;

pub use error::{EngineError, Result};
pub use graph::{Edge, Node, RoadNetwork};
pub use label::{LabelEntry, TwoHopIndex};
pub use query::{Clue, Query};
pub use search::bab::{RouteEngine, SearchResult, Timings};
pub use search::{Candidate, SearchIndex};
pub use validate::{validate_network, ValidationResult};
