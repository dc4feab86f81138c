//! Property tests for set semantics and serialization round-trips.

use proptest::prelude::*;

use lifegraph_store::{Literal, Node, RdfSyntax, Statement, Term, TripleStore};

const BASE: &str = "http://example.org/";

fn name() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9_]{0,8}").unwrap()
}

fn literal() -> impl Strategy<Value = Literal> {
    prop_oneof![
        any::<i64>().prop_map(Literal::integer),
        any::<bool>().prop_map(Literal::boolean),
        proptest::string::string_regex("[ -~]{0,24}")
            .unwrap()
            .prop_map(Literal::plain),
    ]
}

fn statement() -> impl Strategy<Value = Statement> {
    let object = prop_oneof![
        literal().prop_map(Term::Literal),
        name().prop_map(|n| Term::iri(format!("{BASE}{n}"))),
    ];
    (name(), name(), object).prop_map(|(s, p, o)| {
        Statement::new(
            Node::iri(format!("{BASE}{s}")),
            format!("{BASE}{p}"),
            o,
        )
    })
}

fn statements() -> impl Strategy<Value = Vec<Statement>> {
    proptest::collection::vec(statement(), 0..32)
}

fn build_store(sts: &[Statement]) -> TripleStore {
    let mut store = TripleStore::new(BASE);
    for st in sts {
        store.insert(st.clone());
    }
    store
}

fn statement_set(store: &TripleStore) -> std::collections::BTreeSet<Statement> {
    store.iter().cloned().collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn double_insert_keeps_count(sts in statements(), extra in statement()) {
        let mut store = build_store(&sts);
        store.insert(extra.clone());
        let before = store.len();
        store.insert(extra);
        prop_assert_eq!(store.len(), before);
    }

    #[test]
    fn remove_absent_is_noop(sts in statements(), ghost in statement()) {
        let mut store = build_store(&sts);
        let had = store.contains(&ghost);
        let before = store.len();
        let removed = store.remove(&ghost);
        prop_assert_eq!(removed, had);
        if !had {
            prop_assert_eq!(store.len(), before);
        }
    }

    #[test]
    fn insert_then_remove_restores_set(sts in statements(), extra in statement()) {
        let mut store = build_store(&sts);
        let was_new = store.insert(extra.clone());
        if was_new {
            store.remove(&extra);
        }
        prop_assert_eq!(statement_set(&store), statement_set(&build_store(&sts)));
    }

    #[test]
    fn ntriples_round_trips(sts in statements()) {
        let store = build_store(&sts);
        let rendered = store.serialize(RdfSyntax::NTriples).unwrap();

        let mut reimported = TripleStore::new(BASE);
        reimported.import_str(&rendered, RdfSyntax::NTriples).unwrap();
        prop_assert_eq!(statement_set(&reimported), statement_set(&store));
    }

    #[test]
    fn turtle_round_trips(sts in statements()) {
        let store = build_store(&sts);
        let rendered = store.serialize(RdfSyntax::Turtle).unwrap();

        let mut reimported = TripleStore::new(BASE);
        reimported.import_str(&rendered, RdfSyntax::Turtle).unwrap();
        prop_assert_eq!(statement_set(&reimported), statement_set(&store));
    }
}

#[test]
fn export_import_through_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();

    let mut store = TripleStore::new(BASE);
    store.add_statement("alice", "rdf:type", "base:Person", None);
    store.add_statement("alice", "steps", "8500", None);
    store.add_statement("alice", "note", "felt great", None);

    for (syntax, file) in [(RdfSyntax::NTriples, "out.nt"), (RdfSyntax::Turtle, "out.ttl")] {
        let path = dir.path().join(file);
        store.export(syntax, &path).unwrap();

        let mut reimported = TripleStore::new(BASE);
        reimported.import_path(&path).unwrap();
        assert_eq!(
            reimported.iter().cloned().collect::<std::collections::BTreeSet<_>>(),
            store.iter().cloned().collect::<std::collections::BTreeSet<_>>(),
            "{file} did not round-trip"
        );
    }
}
