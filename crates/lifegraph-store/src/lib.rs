//! Lifegraph triple store.
//!
//! Holds the statement set that every other Lifegraph component operates on:
//!
//! - **Term model**: tagged terms (`Iri` / blank node / typed literal), so
//!   the identifier-vs-literal decision is made at construction time rather
//!   than inferred later. A string-level [`TripleStore::add_statement`]
//!   heuristic is kept for callers that only have text.
//! - **Set semantics**: inserting an existing statement is a no-op; iteration
//!   follows insertion order.
//! - **Namespaces**: prefix bindings used for identifier construction and
//!   Turtle readability; they carry no query semantics.
//! - **Serialization**: N-Triples and Turtle writers ([`serialize`]), sophia
//!   backed import ([`import`]), and a conjunctive pattern query language
//!   ([`query`]).
//!
//! The store is single-threaded and synchronous; mutating calls touch only
//! in-memory state, and file I/O happens inside explicit import/export calls.

pub mod error;
pub mod import;
pub mod query;
pub mod serialize;
pub mod vocab;

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use error::{QueryError, StoreError};
pub use import::{import_path, import_str};
pub use query::{parse_query, BindingRow, PatternQuery};
pub use serialize::RdfSyntax;

// ============================================================================
// Term model
// ============================================================================

/// An absolute resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Iri {
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing path/fragment segment, used as a label fallback.
    pub fn local_name(&self) -> &str {
        self.0.rsplit(['#', '/']).next().unwrap_or(&self.0)
    }
}

impl From<&str> for Iri {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Iri {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A typed literal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Option<Iri>,
}

impl Literal {
    pub fn plain(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: None,
        }
    }

    pub fn typed(lexical: impl Into<String>, datatype: impl Into<Iri>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: Some(datatype.into()),
        }
    }

    pub fn integer(value: i64) -> Self {
        Self::typed(value.to_string(), vocab::xsd::INTEGER)
    }

    pub fn decimal(value: f64) -> Self {
        Self::typed(value.to_string(), vocab::xsd::DECIMAL)
    }

    pub fn boolean(value: bool) -> Self {
        Self::typed(value.to_string(), vocab::xsd::BOOLEAN)
    }

    pub fn date(value: chrono::NaiveDate) -> Self {
        Self::typed(value.format("%Y-%m-%d").to_string(), vocab::xsd::DATE)
    }

    pub fn date_time(value: chrono::NaiveDateTime) -> Self {
        Self::typed(
            value.format("%Y-%m-%dT%H:%M:%S").to_string(),
            vocab::xsd::DATE_TIME,
        )
    }
}

/// A node term: the subject position admits no literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Node {
    Iri(Iri),
    Blank(String),
}

impl Node {
    pub fn iri(iri: impl Into<Iri>) -> Self {
        Self::Iri(iri.into())
    }

    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Self::Iri(iri) => Some(iri),
            Self::Blank(_) => None,
        }
    }
}

/// Any term that may appear in the object position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Node(Node),
    Literal(Literal),
}

impl Term {
    pub fn iri(iri: impl Into<Iri>) -> Self {
        Self::Node(Node::Iri(iri.into()))
    }

    pub fn literal(lit: Literal) -> Self {
        Self::Literal(lit)
    }

    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Self::Node(node) => node.as_iri(),
            Self::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(lit) => Some(lit),
            Self::Node(_) => None,
        }
    }

    /// The plain text of the term: the IRI, blank label, or lexical form.
    pub fn text(&self) -> &str {
        match self {
            Self::Node(Node::Iri(iri)) => iri.as_str(),
            Self::Node(Node::Blank(label)) => label,
            Self::Literal(lit) => &lit.lexical,
        }
    }

    /// N-Triples rendering of the term.
    pub fn render(&self) -> String {
        match self {
            Self::Node(Node::Iri(iri)) => format!("<{iri}>"),
            Self::Node(Node::Blank(label)) => format!("_:{label}"),
            Self::Literal(lit) => match &lit.datatype {
                Some(dt) => format!("\"{}\"^^<{dt}>", serialize::escape_literal(&lit.lexical)),
                None => format!("\"{}\"", serialize::escape_literal(&lit.lexical)),
            },
        }
    }
}

impl From<Node> for Term {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// A subject-predicate-object statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Statement {
    pub subject: Node,
    pub predicate: Iri,
    pub object: Term,
}

impl Statement {
    pub fn new(subject: Node, predicate: impl Into<Iri>, object: Term) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }

    /// The subject viewed as a [`Term`], for uniform node handling.
    pub fn subject_term(&self) -> Term {
        Term::Node(self.subject.clone())
    }
}

// ============================================================================
// Namespace bindings
// ============================================================================

/// Prefix → base IRI bindings.
///
/// Bindings drive identifier construction (`resolve`) and Turtle readability
/// (`compact`); they have no bearing on query semantics. The serializer takes
/// these explicitly so the writers stay free of store state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespaces {
    base: Iri,
    bindings: Vec<(String, Iri)>,
}

impl Namespaces {
    /// Bind the common vocabularies plus `base:` for the given base IRI.
    pub fn new(base_uri: &str) -> Self {
        let base = if base_uri.ends_with('/') || base_uri.ends_with('#') {
            Iri::new(base_uri)
        } else {
            Iri::new(format!("{base_uri}/"))
        };
        let mut ns = Self {
            base: base.clone(),
            bindings: Vec::new(),
        };
        ns.bind("rdf", vocab::rdf::NS);
        ns.bind("rdfs", vocab::rdfs::NS);
        ns.bind("owl", vocab::owl::NS);
        ns.bind("xsd", vocab::xsd::NS);
        ns.bind("base", base.as_str());
        ns
    }

    pub fn base(&self) -> &Iri {
        &self.base
    }

    /// Bind or rebind a prefix.
    pub fn bind(&mut self, prefix: &str, iri: impl Into<Iri>) {
        let iri = iri.into();
        if let Some(slot) = self.bindings.iter_mut().find(|(p, _)| p == prefix) {
            slot.1 = iri;
        } else {
            self.bindings.push((prefix.to_string(), iri));
        }
    }

    pub fn get(&self, prefix: &str) -> Option<&Iri> {
        self.bindings
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, iri)| iri)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Iri)> {
        self.bindings.iter().map(|(p, iri)| (p.as_str(), iri))
    }

    /// Expand `prefix:local` against a bound prefix.
    pub fn expand(&self, name: &str) -> Option<Iri> {
        let (prefix, local) = name.split_once(':')?;
        let bound = self.get(prefix)?;
        Some(Iri::new(format!("{bound}{local}")))
    }

    /// Resolve a name to an absolute identifier: bound prefixes expand,
    /// strings with another namespace separator pass through, and bare names
    /// attach to the base namespace with reserved characters percent-encoded.
    pub fn resolve(&self, name: &str) -> Iri {
        if let Some(expanded) = self.expand(name) {
            return expanded;
        }
        if name.contains(':') {
            return Iri::new(name);
        }
        Iri::new(format!("{}{}", self.base, percent_encode(name)))
    }

    /// Compact an IRI to `prefix:local` when a binding covers it and the
    /// remainder is a safe prefixed name.
    pub fn compact(&self, iri: &Iri) -> Option<String> {
        let mut best: Option<(&str, &str)> = None;
        for (prefix, bound) in self.iter() {
            if let Some(local) = iri.as_str().strip_prefix(bound.as_str()) {
                if !local.is_empty() && serialize::pname_safe(local) {
                    let better = match best {
                        Some((_, prev)) => local.len() < prev.len(),
                        None => true,
                    };
                    if better {
                        best = Some((prefix, local));
                    }
                }
            }
        }
        best.map(|(prefix, local)| format!("{prefix}:{local}"))
    }
}

/// Percent-encode everything outside the unreserved set (plus `/`).
pub(crate) fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

// ============================================================================
// Triple store
// ============================================================================

/// In-memory statement set with set semantics and stable insertion order.
#[derive(Debug, Clone)]
pub struct TripleStore {
    statements: Vec<Statement>,
    seen: HashSet<Statement>,
    namespaces: Namespaces,
}

impl TripleStore {
    pub fn new(base_uri: &str) -> Self {
        Self {
            statements: Vec::new(),
            seen: HashSet::new(),
            namespaces: Namespaces::new(base_uri),
        }
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    pub fn namespaces_mut(&mut self) -> &mut Namespaces {
        &mut self.namespaces
    }

    pub fn resolve(&self, name: &str) -> Iri {
        self.namespaces.resolve(name)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Insert a statement. Returns `false` when it was already present.
    pub fn insert(&mut self, statement: Statement) -> bool {
        if self.seen.contains(&statement) {
            return false;
        }
        self.seen.insert(statement.clone());
        self.statements.push(statement);
        true
    }

    /// Remove a statement. Returns `false` when it was absent.
    pub fn remove(&mut self, statement: &Statement) -> bool {
        if !self.seen.remove(statement) {
            return false;
        }
        self.statements.retain(|st| st != statement);
        true
    }

    pub fn contains(&self, statement: &Statement) -> bool {
        self.seen.contains(statement)
    }

    /// Lazy, restartable walk over all statements in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Statement> + '_ {
        self.statements.iter()
    }

    // ------------------------------------------------------------------
    // String-level convenience API (heuristic object classification)
    // ------------------------------------------------------------------

    /// Add a triple from plain strings.
    ///
    /// Subject and predicate resolve as identifiers. The object classifies as
    /// numeric/boolean literal first, then identifier (scheme marker or bound
    /// prefix), then plain literal; an explicit `datatype` forces a typed
    /// literal. Inserting an existing triple is a no-op.
    pub fn add_statement(
        &mut self,
        subject: &str,
        predicate: &str,
        object: &str,
        datatype: Option<&str>,
    ) {
        let statement = Statement::new(
            Node::Iri(self.resolve(subject)),
            self.resolve(predicate),
            self.classify_object(object, datatype),
        );
        self.insert(statement);
    }

    /// Remove a triple given plain strings, resolving the same way as
    /// [`TripleStore::add_statement`]. Removing an absent triple is a no-op.
    pub fn remove_statement(&mut self, subject: &str, predicate: &str, object: &str) {
        let statement = Statement::new(
            Node::Iri(self.resolve(subject)),
            self.resolve(predicate),
            self.classify_object(object, None),
        );
        self.remove(&statement);
    }

    fn classify_object(&self, object: &str, datatype: Option<&str>) -> Term {
        if let Some(dt) = datatype {
            return Term::Literal(Literal::typed(object, self.resolve(dt)));
        }
        if object.parse::<i64>().is_ok() {
            return Term::Literal(Literal::typed(object, vocab::xsd::INTEGER));
        }
        if object.parse::<f64>().is_ok() {
            return Term::Literal(Literal::typed(object, vocab::xsd::DECIMAL));
        }
        if object == "true" || object == "false" {
            return Term::Literal(Literal::typed(object, vocab::xsd::BOOLEAN));
        }
        if object.contains(':') {
            return Term::iri(self.resolve(object));
        }
        Term::Literal(Literal::plain(object))
    }

    // ------------------------------------------------------------------
    // Pattern retrieval helpers
    // ------------------------------------------------------------------

    /// Statements matching the given positions; `None` is a wildcard.
    ///
    /// The returned statements borrow from the store, not from the pattern
    /// arguments.
    pub fn matching<'a, 'b: 'a>(
        &'b self,
        subject: Option<&'a Node>,
        predicate: Option<&'a Iri>,
        object: Option<&'a Term>,
    ) -> impl Iterator<Item = &'b Statement> + 'a {
        self.statements.iter().filter(move |st| {
            subject.is_none_or(|s| &st.subject == s)
                && predicate.is_none_or(|p| &st.predicate == p)
                && object.is_none_or(|o| &st.object == o)
        })
    }

    /// Distinct subjects carrying `rdf:type <class>`, in insertion order.
    pub fn subjects_of_type(&self, class: &Iri) -> Vec<&Node> {
        let rdf_type = Iri::new(vocab::rdf::TYPE);
        let target = Term::iri(class.clone());
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for st in self.matching(None, Some(&rdf_type), Some(&target)) {
            if seen.insert(&st.subject) {
                out.push(&st.subject);
            }
        }
        out
    }

    /// Objects of `(subject, predicate, ?)`, in insertion order.
    pub fn objects<'a>(&'a self, subject: &Node, predicate: &Iri) -> Vec<&'a Term> {
        self.matching(Some(subject), Some(predicate), None)
            .map(|st| &st.object)
            .collect()
    }

    pub fn contains_triple(&self, subject: &Node, predicate: &Iri, object: &Term) -> bool {
        self.matching(Some(subject), Some(predicate), Some(object))
            .next()
            .is_some()
    }

    /// Walk an `rdf:first`/`rdf:rest` list starting at `head`.
    pub fn rdf_list(&self, head: &Term) -> Vec<Term> {
        let first = Iri::new(vocab::rdf::FIRST);
        let rest = Iri::new(vocab::rdf::REST);
        let nil = Term::iri(vocab::rdf::NIL);

        let mut out = Vec::new();
        let mut queue: VecDeque<Term> = VecDeque::from([head.clone()]);
        let mut visited = HashSet::new();
        while let Some(cell) = queue.pop_front() {
            if cell == nil || !visited.insert(cell.clone()) {
                break;
            }
            let Term::Node(node) = &cell else { break };
            if let Some(value) = self.objects(node, &first).first() {
                out.push((*value).clone());
            }
            if let Some(next) = self.objects(node, &rest).first() {
                queue.push_back((*next).clone());
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Query and serialization surfaces
    // ------------------------------------------------------------------

    /// Evaluate a declarative pattern query, returning variable-binding rows.
    pub fn query(&self, text: &str) -> Result<Vec<BindingRow>, QueryError> {
        let parsed = query::parse_query(text)?;
        Ok(query::evaluate(self, &parsed))
    }

    /// Render all statements in the given syntax.
    pub fn serialize(&self, syntax: RdfSyntax) -> Result<String, StoreError> {
        serialize::serialize_with(self, syntax, &self.namespaces)
    }

    /// Render and write all statements to a file.
    pub fn export(&self, syntax: RdfSyntax, path: &Path) -> Result<(), StoreError> {
        let rendered = self.serialize(syntax)?;
        std::fs::write(path, rendered)?;
        tracing::debug!(path = %path.display(), syntax = syntax.name(), "exported store");
        Ok(())
    }

    /// Parse a document and merge its statements (atomic on failure).
    pub fn import_str(&mut self, text: &str, syntax: RdfSyntax) -> Result<usize, StoreError> {
        import::import_str(self, text, syntax)
    }

    /// Import a file, selecting the syntax by extension.
    pub fn import_path(&mut self, path: &Path) -> Result<usize, StoreError> {
        import::import_path(self, path)
    }
}

// ============================================================================
// Tests
// ============================================================================
