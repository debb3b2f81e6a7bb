//! Types for the format rule graph.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stored relation from one format to another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Rule {
    /// Always preferred.
    Wins,
    /// Preferred only when the bitrate ratio reaches the value.
    RatioAtLeast(f64),
    /// Reverse side of a winning edge.
    Loses,
}

impl Rule {
    /// Whether the edge carries a win (unconditional or weighted).
    pub fn is_winning(&self) -> bool {
        !matches!(self, Rule::Loses)
    }

    /// Chain two winning edges; ratios multiply, `Wins` is the identity.
    pub fn compose(self, next: Rule) -> Rule {
        match (self, next) {
            (Rule::Wins, Rule::Wins) => Rule::Wins,
            (Rule::Wins, Rule::RatioAtLeast(x)) | (Rule::RatioAtLeast(x), Rule::Wins) => {
                Rule::RatioAtLeast(x)
            }
            (Rule::RatioAtLeast(x), Rule::RatioAtLeast(y)) => Rule::RatioAtLeast(x * y),
            (Rule::Loses, _) | (_, Rule::Loses) => Rule::Loses,
        }
    }
}

/// Answer to "does format A beat format B".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Dominance {
    None,
    Always,
    RatioAtLeast(f64),
}

/// Errors while compiling a rule specification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleGraphError {
    #[error("Invalid multiplier '{value}' in rule term '{term}'")]
    InvalidMultiplier { term: String, value: String },

    #[error("Invalid format name '{name}' in rule specification")]
    InvalidName { name: String },
}

/// Result type for rule graph operations.
pub type RuleGraphResult<T> = Result<T, RuleGraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_multiplies_ratios() {
        assert_eq!(Rule::Wins.compose(Rule::Wins), Rule::Wins);
        assert_eq!(
            Rule::Wins.compose(Rule::RatioAtLeast(1.5)),
            Rule::RatioAtLeast(1.5)
        );
        assert_eq!(
            Rule::RatioAtLeast(2.0).compose(Rule::RatioAtLeast(1.5)),
            Rule::RatioAtLeast(3.0)
        );
    }

    #[test]
    fn error_mentions_term() {
        let err = RuleGraphError::InvalidMultiplier {
            term: "eac3*x".into(),
            value: "x".into(),
        };
        assert!(err.to_string().contains("eac3*x"));
    }
}
