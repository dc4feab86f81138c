//! Statement serialization: N-Triples (machine) and Turtle (human).
//!
//! Both writers round-trip through [`crate::import`]; RDF/XML is accepted on
//! import only. Writers take [`Namespaces`] explicitly so serialization stays
//! a pure function of its inputs.

use std::collections::HashMap;

use crate::{Iri, Namespaces, Node, StoreError, Term, TripleStore};

/// Supported RDF syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfSyntax {
    NTriples,
    Turtle,
    RdfXml,
}

impl RdfSyntax {
    /// Syntax for a file extension (`nt`, `ttl`, `turtle`, `n3`, `rdf`,
    /// `owl`, `xml`).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "nt" | "ntriples" => Some(Self::NTriples),
            "ttl" | "turtle" | "n3" => Some(Self::Turtle),
            "rdf" | "owl" | "xml" => Some(Self::RdfXml),
            _ => None,
        }
    }

    /// Syntax for a plain format name such as `"turtle"` or `"ntriples"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "nt" | "ntriples" | "n-triples" => Some(Self::NTriples),
            "ttl" | "turtle" | "n3" => Some(Self::Turtle),
            "xml" | "rdf" | "rdfxml" | "rdf/xml" => Some(Self::RdfXml),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NTriples => "ntriples",
            Self::Turtle => "turtle",
            Self::RdfXml => "rdfxml",
        }
    }
}

/// Render the store in the given syntax using its own namespace bindings.
pub fn serialize(store: &TripleStore, syntax: RdfSyntax) -> Result<String, StoreError> {
    serialize_with(store, syntax, store.namespaces())
}

/// Render the store with explicit namespace bindings.
pub fn serialize_with(
    store: &TripleStore,
    syntax: RdfSyntax,
    namespaces: &Namespaces,
) -> Result<String, StoreError> {
    match syntax {
        RdfSyntax::NTriples => Ok(write_ntriples(store)),
        RdfSyntax::Turtle => Ok(write_turtle(store, namespaces)),
        RdfSyntax::RdfXml => Err(StoreError::UnsupportedSyntax(
            "rdfxml (import only)".to_string(),
        )),
    }
}

// ============================================================================
// N-Triples
// ============================================================================

fn write_ntriples(store: &TripleStore) -> String {
    let mut out = String::new();
    for st in store.iter() {
        out.push_str(&st.subject_term().render());
        out.push(' ');
        out.push_str(&format!("<{}>", st.predicate));
        out.push(' ');
        out.push_str(&st.object.render());
        out.push_str(" .\n");
    }
    out
}

// ============================================================================
// Turtle
// ============================================================================

fn write_turtle(store: &TripleStore, namespaces: &Namespaces) -> String {
    let mut out = String::new();
    for (prefix, iri) in namespaces.iter() {
        out.push_str(&format!("@prefix {prefix}: <{iri}> .\n"));
    }
    if !store.is_empty() {
        out.push('\n');
    }

    // Group statements by subject, keeping first-appearance order.
    let mut order: Vec<&Node> = Vec::new();
    let mut grouped: HashMap<&Node, Vec<(&Iri, &Term)>> = HashMap::new();
    for st in store.iter() {
        let group = grouped.entry(&st.subject).or_default();
        if group.is_empty() {
            order.push(&st.subject);
        }
        group.push((&st.predicate, &st.object));
    }

    for subject in order {
        let group = &grouped[subject];
        out.push_str(&node_turtle(subject, namespaces));
        for (i, (predicate, object)) in group.iter().enumerate() {
            let sep = if i == 0 { " " } else { " ;\n    " };
            out.push_str(sep);
            out.push_str(&iri_turtle(predicate, namespaces));
            out.push(' ');
            out.push_str(&term_turtle(object, namespaces));
        }
        out.push_str(" .\n");
    }
    out
}

fn iri_turtle(iri: &Iri, namespaces: &Namespaces) -> String {
    if iri.as_str() == crate::vocab::rdf::TYPE {
        return "a".to_string();
    }
    namespaces
        .compact(iri)
        .unwrap_or_else(|| format!("<{iri}>"))
}

fn node_turtle(node: &Node, namespaces: &Namespaces) -> String {
    match node {
        Node::Iri(iri) => namespaces
            .compact(iri)
            .unwrap_or_else(|| format!("<{iri}>")),
        Node::Blank(label) => format!("_:{label}"),
    }
}

fn term_turtle(term: &Term, namespaces: &Namespaces) -> String {
    match term {
        Term::Node(node) => node_turtle(node, namespaces),
        Term::Literal(lit) => {
            let quoted = format!("\"{}\"", escape_literal(&lit.lexical));
            match &lit.datatype {
                Some(dt) => format!("{quoted}^^{}", {
                    namespaces.compact(dt).unwrap_or_else(|| format!("<{dt}>"))
                }),
                None => quoted,
            }
        }
    }
}

/// Escape a literal for double-quoted Turtle/N-Triples form.
pub(crate) fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Whether a local part is safe to render as a prefixed name.
pub(crate) fn pname_safe(local: &str) -> bool {
    let mut chars = local.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    let mut last = first;
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.') {
            return false;
        }
        last = c;
    }
    last != '.'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Literal;

    #[test]
    fn ntriples_renders_one_statement_per_line() {
        let mut store = TripleStore::new("http://example.org/");
        store.add_statement("alice", "knows", "base:bob", None);
        store.add_statement("alice", "age", "34", None);

        let nt = serialize(&store, RdfSyntax::NTriples).unwrap();
        let lines: Vec<_> = nt.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("<http://example.org/alice> <http://example.org/knows>"));
        assert!(lines[1].contains("\"34\"^^<http://www.w3.org/2001/XMLSchema#integer>"));
        assert!(lines.iter().all(|l| l.ends_with(" .")));
    }

    #[test]
    fn turtle_groups_by_subject_and_compacts() {
        let mut store = TripleStore::new("http://example.org/");
        store.add_statement("alice", "rdf:type", "base:Person", None);
        store.add_statement("alice", "name", "Alice", None);

        let ttl = serialize(&store, RdfSyntax::Turtle).unwrap();
        assert!(ttl.contains("@prefix xsd: <http://www.w3.org/2001/XMLSchema#> ."));
        assert!(ttl.contains("base:alice a base:Person ;"));
        assert!(ttl.contains("base:name \"Alice\" ."));
    }

    #[test]
    fn rdfxml_export_is_unsupported() {
        let store = TripleStore::new("http://example.org/");
        assert!(matches!(
            serialize(&store, RdfSyntax::RdfXml),
            Err(StoreError::UnsupportedSyntax(_))
        ));
    }

    #[test]
    fn escapes_quotes_and_newlines() {
        let lit = Literal::plain("say \"hi\"\nbye");
        let term = Term::Literal(lit);
        assert_eq!(term.render(), "\"say \\\"hi\\\"\\nbye\"");
    }
}
