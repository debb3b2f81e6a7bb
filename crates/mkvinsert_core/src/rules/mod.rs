//! Format dominance rules.
//!
//! The rule graph is compiled once per run from the `merge.format_rules`
//! setting and is read-only afterwards.

mod graph;
mod types;

pub use graph::{normalize_name, RuleGraph};
pub use types::{Dominance, Rule, RuleGraphError, RuleGraphResult};
