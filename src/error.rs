//! Error types and keyword suggestion utilities.
//!
//! Library code returns the typed [`EngineError`]; the CLI wraps it in
//! `anyhow` at the boundary. "No route found" is deliberately *not* an
//! error; it is an empty route on `SearchResult`.

use strsim::jaro_winkler;
use thiserror::Error;

/// Main error type for the route-search engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Clue or query validation failed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Source vertex id not present in the network
    #[error("unknown vertex {0}")]
    UnknownVertex(i64),

    /// File I/O error while reading or writing a graph file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed graph or query JSON
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Minimum similarity for a keyword suggestion. Below this the input is
/// considered a genuinely different word, not a typo.
const SUGGESTION_THRESHOLD: f64 = 0.78;

/// Suggest a close known keyword for a clue keyword that matched nothing.
///
/// Jaro-Winkler favors prefix-preserving typos ("cafee" → "cafe",
/// "hospitl" → "hospital"), which is how users actually misspell POI
/// keywords. Ties go to the lexicographically smaller candidate so the
/// suggestion is deterministic.
pub fn suggest_keyword<'a>(input: &str, known: impl Iterator<Item = &'a str>) -> Option<String> {
    let input_lower = input.to_lowercase();
    let mut best: Option<(f64, &str)> = None;

    for candidate in known {
        let score = jaro_winkler(&input_lower, candidate);
        if score < SUGGESTION_THRESHOLD {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_score, best_kw)) => {
                score > best_score || (score == best_score && candidate < best_kw)
            }
        };
        if better {
            best = Some((score, candidate));
        }
    }

    best.map(|(_, kw)| kw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_keyword_typos() {
        let known = ["bank", "cafe", "hospital", "pharmacy"];
        assert_eq!(
            suggest_keyword("cafee", known.iter().copied()),
            Some("cafe".to_string())
        );
        assert_eq!(
            suggest_keyword("hospitl", known.iter().copied()),
            Some("hospital".to_string())
        );
        assert_eq!(
            suggest_keyword("BANK", known.iter().copied()),
            Some("bank".to_string())
        );
    }

    #[test]
    fn test_suggest_keyword_no_match() {
        let known = ["bank", "cafe"];
        assert_eq!(suggest_keyword("zoo", known.iter().copied()), None);
        assert_eq!(suggest_keyword("", known.iter().copied()), None);
    }
}
