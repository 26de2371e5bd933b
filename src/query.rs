//! Clue and query value objects.
//!
//! A clue `m(w, d, ε)` names a landmark keyword `w`, a target network
//! distance `d` in meters, and a tolerance `ε`; the hop is acceptable when
//! its network distance falls inside the confidence interval
//! `[d(1−ε), d(1+ε)]`. Both types validate on construction and are immutable
//! afterwards.

use serde::Deserialize;

use crate::error::{EngineError, Result};

/// A single landmark clue
#[derive(Debug, Clone, PartialEq)]
pub struct Clue {
    keyword: String,
    distance: f64,
    epsilon: f64,
}

impl Clue {
    /// Validates and lowercases the keyword. Fails with `InvalidArgument`
    /// when the keyword is empty, `d ≤ 0`, or `ε ∉ [0, 1]`.
    pub fn new(keyword: &str, distance: f64, epsilon: f64) -> Result<Self> {
        if keyword.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "clue keyword must not be empty".to_string(),
            ));
        }
        if !(distance > 0.0) || !distance.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "clue distance must be positive and finite, got {distance}"
            )));
        }
        if !(0.0..=1.0).contains(&epsilon) {
            return Err(EngineError::InvalidArgument(format!(
                "clue epsilon must be in [0, 1], got {epsilon}"
            )));
        }
        Ok(Self {
            keyword: keyword.trim().to_lowercase(),
            distance,
            epsilon,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Lower bound of the confidence interval: `d(1−ε)`
    pub fn d_min(&self) -> f64 {
        self.distance * (1.0 - self.epsilon)
    }

    /// Upper bound of the confidence interval: `d(1+ε)`
    pub fn d_max(&self) -> f64 {
        self.distance * (1.0 + self.epsilon)
    }

    pub fn is_within_confidence_interval(&self, x: f64) -> bool {
        self.d_min() <= x && x <= self.d_max()
    }

    /// Matching distance of a hop with network distance `x`
    pub fn matching_distance(&self, x: f64) -> f64 {
        (x - self.distance).abs()
    }
}

/// An ordered clue sequence anchored at a source vertex. Clue order is
/// significant: routes must visit the clues in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: i64,
    clues: Vec<Clue>,
}

impl Query {
    pub fn new(source: i64, clues: Vec<Clue>) -> Result<Self> {
        if clues.is_empty() {
            return Err(EngineError::InvalidArgument(
                "query must have at least one clue".to_string(),
            ));
        }
        Ok(Self { source, clues })
    }

    pub fn source(&self) -> i64 {
        self.source
    }

    pub fn clues(&self) -> &[Clue] {
        &self.clues
    }

    /// Parse the programmatic JSON form:
    /// `{ "source": 17, "clues": [{"keyword": "bank", "distance": 500.0, "epsilon": 0.2}] }`
    pub fn from_json(s: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct RawClue {
            keyword: String,
            distance: f64,
            epsilon: f64,
        }
        #[derive(Deserialize)]
        struct RawQuery {
            source: i64,
            clues: Vec<RawClue>,
        }

        let raw: RawQuery = serde_json::from_str(s)?;
        let clues = raw
            .clues
            .iter()
            .map(|c| Clue::new(&c.keyword, c.distance, c.epsilon))
            .collect::<Result<Vec<_>>>()?;
        Query::new(raw.source, clues)
    }
}
