//! Information metrics over activity graphs.
//!
//! The unit of measurement is [`node_entropy`]: the Shannon entropy (base 2)
//! of the distribution of predicates incident to a node, counting both the
//! statements it appears in as subject and those where it is the object. A
//! node mentioned through many distinct relation kinds scores high; one seen
//! through a single predicate scores zero.
//!
//! [`information_gain`] aggregates this per topic: it averages the entropy of
//! every term whose text mentions a tag, and reports how informative the
//! updated graph is about that topic. The signed variant
//! [`information_gain_delta`] subtracts the baseline average instead, so a
//! graph that merely repeats what was already known can score negative.

use std::collections::HashMap;

use tracing::debug;

use lifegraph_store::{Term, TripleStore};

/// Shannon entropy (bits) of the predicate distribution incident to `node`.
///
/// Returns 0.0 for a node with no incident statements.
pub fn node_entropy(node: &Term, store: &TripleStore) -> f64 {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut total = 0usize;
    for st in store.iter() {
        if st.subject_term() == *node {
            *counts.entry(st.predicate.as_str()).or_default() += 1;
            total += 1;
        }
        if st.object == *node {
            *counts.entry(st.predicate.as_str()).or_default() += 1;
            total += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Distinct terms (subjects, objects, literals included) whose text contains
/// `tag`, in first-appearance order.
pub fn tagged_nodes(tag: &str, store: &TripleStore) -> Vec<Term> {
    let mut out: Vec<Term> = Vec::new();
    let mut push = |term: Term| {
        if term.text().contains(tag) && !out.contains(&term) {
            out.push(term);
        }
    };
    for st in store.iter() {
        push(st.subject_term());
        push(st.object.clone());
    }
    out
}

/// Mean entropy over all terms mentioning `tag`; 0.0 when nothing matches.
pub fn mean_tag_entropy(tag: &str, store: &TripleStore) -> f64 {
    let nodes = tagged_nodes(tag, store);
    if nodes.is_empty() {
        return 0.0;
    }
    let sum: f64 = nodes.iter().map(|n| node_entropy(n, store)).sum();
    sum / nodes.len() as f64
}

/// How informative `after` is about `tag`: the mean entropy of its tagged
/// terms, floored at zero. `before` fixes the comparison baseline in the
/// signature but does not lower the score; use [`information_gain_delta`]
/// for the signed difference.
pub fn information_gain(tag: &str, before: &TripleStore, after: &TripleStore) -> f64 {
    let baseline = mean_tag_entropy(tag, before);
    let updated = mean_tag_entropy(tag, after);
    debug!(tag, baseline, updated, "information gain");
    updated.max(0.0)
}

/// Signed change in mean tagged-term entropy from `before` to `after`.
pub fn information_gain_delta(tag: &str, before: &TripleStore, after: &TripleStore) -> f64 {
    mean_tag_entropy(tag, after) - mean_tag_entropy(tag, before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lifegraph_store::Term;
    use proptest::prelude::*;

    fn store() -> TripleStore {
        TripleStore::new("http://example.org/")
    }

    #[test]
    fn entropy_of_unmentioned_node_is_zero() {
        let s = store();
        let node = Term::iri("http://example.org/ghost");
        assert_eq!(node_entropy(&node, &s), 0.0);
    }

    #[test]
    fn single_predicate_has_zero_entropy() {
        let mut s = store();
        s.add_statement("alice", "knows", "base:bob", None);
        s.add_statement("alice", "knows", "base:carol", None);
        let alice = Term::iri(s.resolve("alice"));
        assert_relative_eq!(node_entropy(&alice, &s), 0.0);
    }

    #[test]
    fn equal_counts_reach_log2_k() {
        let mut s = store();
        s.add_statement("trip", "startedAt", "base:denver", None);
        s.add_statement("trip", "endedAt", "base:moab", None);
        s.add_statement("trip", "mode", "base:car", None);
        s.add_statement("trip", "cost", "420", None);
        let trip = Term::iri(s.resolve("trip"));
        assert_relative_eq!(node_entropy(&trip, &s), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn object_position_counts_toward_entropy() {
        let mut s = store();
        s.add_statement("alice", "visited", "base:paris", None);
        s.add_statement("bob", "photographed", "base:paris", None);
        let paris = Term::iri(s.resolve("paris"));
        assert_relative_eq!(node_entropy(&paris, &s), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn tagged_nodes_span_subjects_objects_and_literals() {
        let mut s = store();
        s.add_statement("travel_log", "note", "travel was exhausting", None);
        s.add_statement("alice", "plans", "base:travel_2025", None);
        s.add_statement("alice", "age", "34", None);

        let tagged = tagged_nodes("travel", &s);
        assert_eq!(tagged.len(), 3);
        assert!(tagged.iter().any(|t| t.text() == "travel was exhausting"));
    }

    #[test]
    fn richer_travel_description_raises_the_gain() {
        let mut before = store();
        before.add_statement("trip_utah", "rdf:type", "base:Travel", None);

        let mut after = before.clone();
        after.add_statement("trip_utah", "destination", "base:moab", None);
        after.add_statement("trip_utah", "startDate", "2024-05-01", Some("xsd:date"));
        after.add_statement("trip_utah", "companion", "base:bob", None);

        let tag = "trip_utah";
        assert!(information_gain(tag, &before, &after) > information_gain(tag, &before, &before));
        assert!(information_gain_delta(tag, &before, &after) > 0.0);
    }

    #[test]
    fn delta_is_negative_when_detail_is_removed() {
        let mut before = store();
        before.add_statement("trip", "destination", "base:moab", None);
        before.add_statement("trip", "mode", "base:car", None);

        let mut after = store();
        after.add_statement("trip", "destination", "base:moab", None);
        after.add_statement("trip", "destination", "base:bend", None);

        assert!(information_gain_delta("trip", &before, &after) < 0.0);
        // The unsigned form still floors at zero.
        assert!(information_gain("trip", &before, &after) >= 0.0);
    }

    proptest! {
        #[test]
        fn information_gain_is_never_negative(
            triples in proptest::collection::vec(
                ("[a-c]", "[p-r]", "[a-c]|[0-9]{1,3}"),
                0..24,
            )
        ) {
            let mut before = store();
            let mut after = store();
            for (i, (s, p, o)) in triples.iter().enumerate() {
                let target = if i % 2 == 0 { &mut after } else { &mut before };
                target.add_statement(s, p, &format!("base:{o}"), None);
            }
            prop_assert!(information_gain("a", &before, &after) >= 0.0);
        }
    }
}
