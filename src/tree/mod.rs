//! The two findNext accelerator indexes.
//!
//! - AB-tree: per-source AVL keyed by network distance, with subtree
//!   keyword summaries for pruned ordered scans.
//! - PB-tree: per-pivot median tree over the pivot-reverse entries, with
//!   subtree distance ranges and keyword summaries.

pub mod abtree;
pub mod pbtree;
