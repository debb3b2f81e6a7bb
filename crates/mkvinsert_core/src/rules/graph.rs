//! Format dominance graph compiled from a chain specification.
//!
//! Syntax: comma-separated chains, each a `>`-ordered list of terms. A term
//! is one or more format names joined by `=` and may carry a `*<ratio>`
//! suffix: the term's formats beat the next term only when their bitrate is
//! at least `ratio` times the competitor's.
//!
//! `truehd=dts-hd ma>flac>eac3*1.5>ac3` reads: TrueHD and DTS-HD MA are peers,
//! both always beat FLAC, FLAC always beats E-AC3, E-AC3 beats AC3 only at
//! 1.5x the bitrate, and the relations propagate down the chain.

use std::collections::{BTreeMap, BTreeSet};

use super::types::{Dominance, Rule, RuleGraphError, RuleGraphResult};

/// One parsed term of a chain.
#[derive(Debug, Clone, PartialEq)]
struct Term {
    names: Vec<String>,
    ratio: Option<f64>,
}

/// Directed comparison graph between stream formats.
///
/// Antisymmetric: every winning edge `a -> b` has a `Loses` edge `b -> a`,
/// and declared peers carry no edge at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleGraph {
    edges: BTreeMap<String, BTreeMap<String, Rule>>,
    peers: BTreeSet<(String, String)>,
    known: BTreeSet<String>,
}

impl RuleGraph {
    /// Compile a rule specification.
    pub fn parse(spec: &str) -> RuleGraphResult<Self> {
        let mut chains = Vec::new();
        for chain in spec.split(',') {
            let mut terms = Vec::new();
            for raw in chain.split('>') {
                if let Some(term) = parse_term(raw)? {
                    terms.push(term);
                }
            }
            chains.push(terms);
        }

        let mut graph = RuleGraph::default();

        for term in chains.iter().flatten() {
            for name in &term.names {
                graph.known.insert(name.clone());
            }
            for (i, a) in term.names.iter().enumerate() {
                for b in &term.names[i + 1..] {
                    if a != b {
                        graph.peers.insert(peer_key(a, b));
                    }
                }
            }
        }

        for terms in &chains {
            for pair in terms.windows(2) {
                let rule = pair[0].ratio.map(Rule::RatioAtLeast).unwrap_or(Rule::Wins);
                for winner in &pair[0].names {
                    for loser in &pair[1].names {
                        graph.insert_direct(winner, loser, rule);
                    }
                }
            }
        }

        graph.propagate();

        tracing::debug!(
            "Compiled rule graph: {} formats, {} winning edges, {} peer pairs",
            graph.known.len(),
            graph.edge_count(),
            graph.peers.len()
        );

        Ok(graph)
    }

    /// How `a` compares against `b`.
    pub fn dominance(&self, a: &str, b: &str) -> Dominance {
        match self.rule(a, b) {
            Some(Rule::Wins) => Dominance::Always,
            Some(Rule::RatioAtLeast(x)) => Dominance::RatioAtLeast(x),
            Some(Rule::Loses) | None => Dominance::None,
        }
    }

    /// Raw edge from `a` to `b`, if any.
    pub fn rule(&self, a: &str, b: &str) -> Option<Rule> {
        let a = normalize_name(a);
        let b = normalize_name(b);
        self.edges.get(&a).and_then(|m| m.get(&b)).copied()
    }

    /// Whether `a` and `b` were declared interchangeable.
    pub fn are_peers(&self, a: &str, b: &str) -> bool {
        let a = normalize_name(a);
        let b = normalize_name(b);
        a != b && self.peers.contains(&peer_key(&a, &b))
    }

    /// Whether the format appeared anywhere in the specification.
    pub fn knows(&self, format: &str) -> bool {
        self.known.contains(&normalize_name(format))
    }

    /// Registered format names.
    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Number of winning (non-`Loses`) edges.
    pub fn edge_count(&self) -> usize {
        self.edges
            .values()
            .flat_map(|m| m.values())
            .filter(|r| r.is_winning())
            .count()
    }

    fn insert_direct(&mut self, winner: &str, loser: &str, rule: Rule) {
        if winner == loser || self.peers.contains(&peer_key(winner, loser)) {
            return;
        }
        if let Some(existing) = self.edges.get(winner).and_then(|m| m.get(loser)) {
            if *existing == Rule::Loses {
                tracing::warn!(
                    "Rule '{}>{}' contradicts an earlier chain; keeping the earlier one",
                    winner,
                    loser
                );
            }
            return;
        }
        self.set_pair(winner, loser, rule);
    }

    fn set_pair(&mut self, winner: &str, loser: &str, rule: Rule) {
        self.edges
            .entry(winner.to_string())
            .or_default()
            .insert(loser.to_string(), rule);
        self.edges
            .entry(loser.to_string())
            .or_default()
            .entry(winner.to_string())
            .or_insert(Rule::Loses);
    }

    /// Transitive closure over winning edges. Existing edges are never
    /// replaced, so a cycle resolves in favour of whichever direction is
    /// reached first.
    fn propagate(&mut self) {
        loop {
            let mut additions: Vec<(String, String, Rule)> = Vec::new();
            for (a, outs) in &self.edges {
                for (b, first) in outs.iter().filter(|(_, r)| r.is_winning()) {
                    let Some(next) = self.edges.get(b) else {
                        continue;
                    };
                    for (c, second) in next.iter().filter(|(_, r)| r.is_winning()) {
                        if a == c
                            || outs.contains_key(c)
                            || self.peers.contains(&peer_key(a, c))
                            || additions
                                .iter()
                                .any(|(x, y, _)| (x == a && y == c) || (x == c && y == a))
                        {
                            continue;
                        }
                        additions.push((a.clone(), c.clone(), first.compose(*second)));
                    }
                }
            }

            if additions.is_empty() {
                break;
            }
            for (winner, loser, rule) in additions {
                if self.edges.get(&winner).is_some_and(|m| m.contains_key(&loser)) {
                    continue;
                }
                self.set_pair(&winner, &loser, rule);
            }
        }
    }
}

fn parse_term(raw: &str) -> RuleGraphResult<Option<Term>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let (names_part, ratio) = match raw.split_once('*') {
        Some((names, ratio)) => (names, parse_ratio(raw, ratio)?),
        None => (raw, None),
    };

    let mut names = Vec::new();
    for name in names_part.split('=') {
        let name = normalize_name(name);
        if name.is_empty() {
            continue;
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '.' | '+' | '-'))
        {
            return Err(RuleGraphError::InvalidName { name });
        }
        if !names.contains(&name) {
            names.push(name);
        }
    }

    if names.is_empty() {
        return Ok(None);
    }
    Ok(Some(Term { names, ratio }))
}

fn parse_ratio(term: &str, value: &str) -> RuleGraphResult<Option<f64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse::<f64>() {
        Ok(x) if x.is_finite() && x > 0.0 => Ok(Some(x)),
        _ => Err(RuleGraphError::InvalidMultiplier {
            term: term.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Lower-case and trim a format name.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn peer_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_chain_is_antisymmetric() {
        let graph = RuleGraph::parse("truehd>ac3").unwrap();
        assert_eq!(graph.dominance("truehd", "ac3"), Dominance::Always);
        assert_eq!(graph.dominance("ac3", "truehd"), Dominance::None);
        assert_eq!(graph.rule("ac3", "truehd"), Some(Rule::Loses));
    }

    #[test]
    fn equality_has_no_edge_either_way() {
        let graph = RuleGraph::parse("dts=ac3").unwrap();
        assert_eq!(graph.dominance("dts", "ac3"), Dominance::None);
        assert_eq!(graph.dominance("ac3", "dts"), Dominance::None);
        assert!(graph.are_peers("ac3", "dts"));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn mixed_chain_with_multiplier() {
        let graph = RuleGraph::parse("A>B=C*1.5>D").unwrap();
        assert_eq!(graph.dominance("a", "b"), Dominance::Always);
        assert_eq!(graph.dominance("a", "c"), Dominance::Always);
        assert_eq!(graph.dominance("b", "c"), Dominance::None);
        assert_eq!(graph.dominance("c", "b"), Dominance::None);
        assert_eq!(graph.dominance("b", "d"), Dominance::RatioAtLeast(1.5));
        assert_eq!(graph.dominance("c", "d"), Dominance::RatioAtLeast(1.5));
        assert_eq!(graph.dominance("d", "b"), Dominance::None);
        // A reaches D through a weighted link.
        assert_eq!(graph.dominance("a", "d"), Dominance::RatioAtLeast(1.5));
    }

    #[test]
    fn multipliers_compose_across_chains() {
        let graph = RuleGraph::parse("eac3*1.2>ac3, ac3*1.5>aac").unwrap();
        match graph.dominance("eac3", "aac") {
            Dominance::RatioAtLeast(x) => assert!((x - 1.8).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(graph.dominance("aac", "eac3"), Dominance::None);
    }

    #[test]
    fn direct_rule_beats_propagated_one() {
        let graph = RuleGraph::parse("flac>eac3*2>ac3, flac*3>ac3").unwrap();
        // Declared later but directly, so the 3x ratio is kept over Always∘2.
        assert_eq!(graph.dominance("flac", "ac3"), Dominance::RatioAtLeast(3.0));
    }

    #[test]
    fn declared_equality_removes_edges_from_other_chains() {
        let graph = RuleGraph::parse("dts>ac3, ac3=dts").unwrap();
        assert_eq!(graph.dominance("dts", "ac3"), Dominance::None);
        assert_eq!(graph.dominance("ac3", "dts"), Dominance::None);
    }

    #[test]
    fn contradiction_keeps_first_chain() {
        let graph = RuleGraph::parse("dts>ac3, ac3>dts").unwrap();
        assert_eq!(graph.dominance("dts", "ac3"), Dominance::Always);
        assert_eq!(graph.dominance("ac3", "dts"), Dominance::None);
    }

    #[test]
    fn cycle_keeps_one_direction_per_pair() {
        let graph = RuleGraph::parse("a>b, b>c, c>d, d>a").unwrap();
        let names = ["a", "b", "c", "d"];
        for x in names {
            for y in names {
                if x == y {
                    continue;
                }
                let forward = graph.dominance(x, y) != Dominance::None;
                let backward = graph.dominance(y, x) != Dominance::None;
                assert!(!(forward && backward), "{} and {} both win", x, y);
            }
        }
        assert_eq!(graph.dominance("a", "b"), Dominance::Always);
        assert_eq!(graph.dominance("d", "a"), Dominance::Always);
        assert_eq!(graph.dominance("a", "c"), Dominance::Always);
        assert_eq!(graph.dominance("c", "a"), Dominance::None);
    }

    #[test]
    fn empty_terms_register_names_only() {
        let graph = RuleGraph::parse("opus>>, =, vorbis").unwrap();
        assert!(graph.knows("opus"));
        assert!(graph.knows("VORBIS"));
        assert_eq!(graph.edge_count(), 0);

        let empty = RuleGraph::parse("").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn bad_multiplier_is_an_error() {
        assert!(matches!(
            RuleGraph::parse("eac3*fast>ac3"),
            Err(RuleGraphError::InvalidMultiplier { .. })
        ));
        assert!(matches!(
            RuleGraph::parse("eac3*-1>ac3"),
            Err(RuleGraphError::InvalidMultiplier { .. })
        ));
    }

    #[test]
    fn bad_name_is_an_error() {
        assert!(matches!(
            RuleGraph::parse("eac3;rm>ac3"),
            Err(RuleGraphError::InvalidName { .. })
        ));
    }

    #[test]
    fn names_are_case_insensitive() {
        let graph = RuleGraph::parse(" TrueHD > DTS-HD MA ").unwrap();
        assert_eq!(graph.dominance("truehd", "dts-hd ma"), Dominance::Always);
    }
}
