//! Document import via sophia parsers.
//!
//! Supported syntaxes: N-Triples, Turtle, RDF/XML. Import is atomic: the
//! whole document is parsed into a buffer before any statement or namespace
//! binding is merged, so a malformed document leaves the store unchanged.

use std::path::Path;

use sophia::api::prelude::*;
use tracing::debug;

use crate::{Iri, Literal, Node, RdfSyntax, Statement, StoreError, Term, TripleStore};

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
struct ImportSinkError {
    message: String,
}

impl From<String> for ImportSinkError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// Parse `text` in the given syntax and merge its statements.
///
/// Returns the number of statements that were actually new to the store.
pub fn import_str(
    store: &mut TripleStore,
    text: &str,
    syntax: RdfSyntax,
) -> Result<usize, StoreError> {
    let statements = parse_statements(text.as_bytes(), syntax)?;

    if matches!(syntax, RdfSyntax::Turtle) {
        for (prefix, iri) in scrape_turtle_prefixes(text) {
            store.namespaces_mut().bind(&prefix, iri);
        }
    }

    let mut inserted = 0;
    let total = statements.len();
    for st in statements {
        if store.insert(st) {
            inserted += 1;
        }
    }
    debug!(syntax = syntax.name(), total, inserted, "imported document");
    Ok(inserted)
}

/// Import a file, selecting the syntax from its extension.
pub fn import_path(store: &mut TripleStore, path: &Path) -> Result<usize, StoreError> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let syntax = RdfSyntax::from_extension(ext)
        .ok_or_else(|| StoreError::UnsupportedSyntax(format!(".{ext}")))?;
    let text = std::fs::read_to_string(path)?;
    import_str(store, &text, syntax)
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_statements(bytes: &[u8], syntax: RdfSyntax) -> Result<Vec<Statement>, StoreError> {
    let cursor = std::io::Cursor::new(bytes);
    let reader = std::io::BufReader::new(cursor);

    let mut out: Vec<Statement> = Vec::new();
    let mut sink = |s: String, p: String, o: String| -> Result<(), ImportSinkError> {
        let subject = node_from_display(&s)?;
        let predicate = match node_from_display(&p)? {
            Node::Iri(iri) => iri,
            // Blank predicates cannot occur in the supported syntaxes.
            Node::Blank(label) => return Err(format!("blank node predicate _:{label}").into()),
        };
        let object = term_from_display(&o)?;
        out.push(Statement::new(subject, predicate, object));
        Ok(())
    };

    // Each parser surfaces its own stream error type; flatten to a message
    // per branch.
    let result: Result<(), String> = match syntax {
        RdfSyntax::NTriples => {
            let mut parser = sophia::turtle::parser::nt::parse_bufread(reader);
            parser
                .try_for_each_triple(|t| {
                    sink(t.s().to_string(), t.p().to_string(), t.o().to_string())
                })
                .map_err(|e| e.to_string())
        }
        RdfSyntax::Turtle => {
            let mut parser = sophia::turtle::parser::turtle::parse_bufread(reader);
            parser
                .try_for_each_triple(|t| {
                    sink(t.s().to_string(), t.p().to_string(), t.o().to_string())
                })
                .map_err(|e| e.to_string())
        }
        RdfSyntax::RdfXml => {
            let mut parser = sophia::xml::parser::parse_bufread(reader);
            parser
                .try_for_each_triple(|t| {
                    sink(t.s().to_string(), t.p().to_string(), t.o().to_string())
                })
                .map_err(|e| e.to_string())
        }
    };

    result.map_err(|message| StoreError::Import {
        syntax: syntax.name(),
        message,
    })?;
    Ok(out)
}

/// Parse a term from its N-Triples-ish display form.
fn term_from_display(term: &str) -> Result<Term, String> {
    let s = term.trim();

    if let Some(iri) = s.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return Ok(Term::iri(iri));
    }

    if let Some(label) = s.strip_prefix("_:") {
        return Ok(Term::Node(Node::Blank(label.to_string())));
    }

    if s.starts_with('"') {
        let mut end_quote = None;
        let mut prev_was_escape = false;
        for (i, ch) in s.char_indices().skip(1) {
            if ch == '"' && !prev_was_escape {
                end_quote = Some(i);
                break;
            }
            prev_was_escape = ch == '\\' && !prev_was_escape;
        }
        let Some(end) = end_quote else {
            return Err(format!("invalid literal term (missing closing quote): {s}"));
        };

        let lexical = unescape_literal(&s[1..end]);
        let rest = s[end + 1..].trim();

        // Language tags are accepted on import but not modeled; the tag is
        // dropped and the lexical form kept.
        if rest.starts_with('@') || rest.is_empty() {
            return Ok(Term::Literal(Literal::plain(lexical)));
        }
        if let Some(dt) = rest.strip_prefix("^^") {
            let dt = dt.trim();
            let datatype = dt
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .unwrap_or(dt);
            // RDF 1.1 simple literals are xsd:string; normalize to the plain
            // form so round-trips compare equal.
            if datatype == crate::vocab::xsd::STRING {
                return Ok(Term::Literal(Literal::plain(lexical)));
            }
            return Ok(Term::Literal(Literal::typed(lexical, Iri::new(datatype))));
        }
        return Ok(Term::Literal(Literal::plain(lexical)));
    }

    Err(format!("unsupported RDF term form: {s}"))
}

fn node_from_display(term: &str) -> Result<Node, String> {
    match term_from_display(term)? {
        Term::Node(node) => Ok(node),
        Term::Literal(_) => Err(format!("expected identifier or blank node, got literal: {term}")),
    }
}

pub(crate) fn unescape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Collect `@prefix` / `PREFIX` declarations from a Turtle document so the
/// store's bindings merge alongside its statements.
fn scrape_turtle_prefixes(text: &str) -> Vec<(String, Iri)> {
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        let rest = if let Some(rest) = line.strip_prefix("@prefix") {
            rest
        } else if let Some(rest) = line
            .strip_prefix("PREFIX")
            .or_else(|| line.strip_prefix("prefix"))
        {
            rest
        } else {
            continue;
        };
        let rest = rest.trim();
        let Some((prefix, tail)) = rest.split_once(':') else {
            continue;
        };
        let tail = tail.trim();
        let Some(start) = tail.find('<') else { continue };
        let Some(end) = tail.find('>') else { continue };
        if start < end {
            out.push((
                prefix.trim().to_string(),
                Iri::new(&tail[start + 1..end]),
            ));
        }
    }
    out
}
