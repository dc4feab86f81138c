//! Declarative pattern queries over the statement set.
//!
//! The language is a small conjunctive subset of the usual RDF query shape:
//!
//! ```text
//! PREFIX health: <http://example.org/personal/health/>
//! SELECT DISTINCT ?activity ?date WHERE {
//!     ?person a base:Person .
//!     ?person health:hasActivity ?activity .
//!     ?activity health:timestamp ?date .
//!     FILTER(?date >= "2024-01-01T00:00:00"^^xsd:dateTime && ?date <= "2024-02-01T00:00:00"^^xsd:dateTime)
//! }
//! ORDER BY ?date
//! ```
//!
//! Supported: `PREFIX` declarations (rdf/rdfs/owl/xsd/base pre-bound),
//! `SELECT [DISTINCT]` with a variable list or `*`, conjunctive triple
//! patterns with shared variables (`a` for `rdf:type`), `FILTER` with
//! `&&`-joined comparisons over numeric, date-time and string literals, and
//! an optional `ORDER BY ?var`. Evaluation is a nested-loop join over the
//! live statement set; there is no planner.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use nom::{
    branch::alt,
    bytes::complete::{escaped, tag, tag_no_case, take_while1},
    character::complete::{char as pchar, multispace0, multispace1, one_of},
    combinator::{all_consuming, map, opt, peek, recognize, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::{vocab, Iri, Literal, Node, QueryError, Term, TripleStore};

/// One result row: variable name → bound term.
pub type BindingRow = BTreeMap<String, Term>;

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PatternQuery {
    pub distinct: bool,
    pub select: Selection,
    pub patterns: Vec<TriplePattern>,
    pub filters: Vec<Comparison>,
    pub order_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    All,
    Vars(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternTerm {
    Var(String),
    Iri(Iri),
    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub lhs: Operand,
    pub op: CompareOp,
    pub rhs: Operand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Var(String),
    Literal(Literal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

// ============================================================================
// Raw (unresolved) parse tree
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum RawTerm {
    Var(String),
    IriRef(String),
    QName(String, String),
    TypeKeyword,
    Literal { lexical: String, datatype: Option<RawDatatype> },
}

#[derive(Debug, Clone, PartialEq)]
enum RawDatatype {
    IriRef(String),
    QName(String, String),
}

#[derive(Debug)]
struct RawQuery {
    prefixes: Vec<(String, String)>,
    distinct: bool,
    select: Selection,
    items: Vec<RawItem>,
    order_by: Option<String>,
}

#[derive(Debug)]
enum RawItem {
    Pattern(RawTerm, RawTerm, RawTerm),
    Filter(Vec<(RawTerm, CompareOp, RawTerm)>),
}

// ============================================================================
// Parser (nom)
// ============================================================================

fn ident(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn variable(input: &str) -> IResult<&str, String> {
    map(preceded(pchar('?'), ident), str::to_string)(input)
}

fn iri_ref(input: &str) -> IResult<&str, &str> {
    delimited(pchar('<'), take_while1(|c: char| c != '>'), pchar('>'))(input)
}

fn local_part(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')(input)
}

fn qname(input: &str) -> IResult<&str, (String, String)> {
    map(
        tuple((ident, pchar(':'), local_part)),
        |(prefix, _, local)| (prefix.to_string(), local.to_string()),
    )(input)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    let inner = escaped(take_while1(|c: char| c != '"' && c != '\\'), '\\', one_of("\"\\nrt"));
    map(
        delimited(pchar('"'), opt(inner), pchar('"')),
        |content: Option<&str>| crate::import::unescape_literal(content.unwrap_or("")),
    )(input)
}

fn string_literal(input: &str) -> IResult<&str, RawTerm> {
    let datatype = preceded(
        tag("^^"),
        alt((
            map(iri_ref, |iri| RawDatatype::IriRef(iri.to_string())),
            map(qname, |(p, l)| RawDatatype::QName(p, l)),
        )),
    );
    map(
        pair(quoted_string, opt(datatype)),
        |(lexical, datatype)| RawTerm::Literal { lexical, datatype },
    )(input)
}

fn number_literal(input: &str) -> IResult<&str, RawTerm> {
    map(
        recognize(tuple((
            opt(one_of("+-")),
            take_while1(|c: char| c.is_ascii_digit()),
            opt(pair(pchar('.'), take_while1(|c: char| c.is_ascii_digit()))),
        ))),
        |text: &str| {
            let datatype = if text.contains('.') {
                vocab::xsd::DECIMAL
            } else {
                vocab::xsd::INTEGER
            };
            RawTerm::Literal {
                lexical: text.to_string(),
                datatype: Some(RawDatatype::IriRef(datatype.to_string())),
            }
        },
    )(input)
}

fn boolean_literal(input: &str) -> IResult<&str, RawTerm> {
    map(
        terminated(alt((tag("true"), tag("false"))), peek(multispace1)),
        |text: &str| RawTerm::Literal {
            lexical: text.to_string(),
            datatype: Some(RawDatatype::IriRef(vocab::xsd::BOOLEAN.to_string())),
        },
    )(input)
}

fn type_keyword(input: &str) -> IResult<&str, RawTerm> {
    value(RawTerm::TypeKeyword, terminated(tag("a"), peek(multispace1)))(input)
}

fn raw_term(input: &str) -> IResult<&str, RawTerm> {
    alt((
        map(variable, RawTerm::Var),
        map(iri_ref, |iri| RawTerm::IriRef(iri.to_string())),
        string_literal,
        number_literal,
        boolean_literal,
        map(qname, |(p, l)| RawTerm::QName(p, l)),
        type_keyword,
    ))(input)
}

fn raw_operand(input: &str) -> IResult<&str, RawTerm> {
    alt((
        map(variable, RawTerm::Var),
        string_literal,
        number_literal,
        map(iri_ref, |iri| RawTerm::IriRef(iri.to_string())),
    ))(input)
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        value(CompareOp::Ge, tag(">=")),
        value(CompareOp::Le, tag("<=")),
        value(CompareOp::Ne, tag("!=")),
        value(CompareOp::Gt, tag(">")),
        value(CompareOp::Lt, tag("<")),
        value(CompareOp::Eq, tag("=")),
    ))(input)
}

fn prefix_decl(input: &str) -> IResult<&str, (String, String)> {
    map(
        tuple((
            tag_no_case("PREFIX"),
            multispace1,
            ident,
            pchar(':'),
            multispace0,
            iri_ref,
        )),
        |(_, _, prefix, _, _, iri)| (prefix.to_string(), iri.to_string()),
    )(input)
}

fn select_clause(input: &str) -> IResult<&str, (bool, Selection)> {
    let vars = alt((
        value(Selection::All, pchar('*')),
        map(
            separated_list1(multispace1, variable),
            Selection::Vars,
        ),
    ));
    map(
        tuple((
            tag_no_case("SELECT"),
            multispace1,
            opt(terminated(tag_no_case("DISTINCT"), multispace1)),
            vars,
        )),
        |(_, _, distinct, select)| (distinct.is_some(), select),
    )(input)
}

fn comparison_raw(input: &str) -> IResult<&str, (RawTerm, CompareOp, RawTerm)> {
    map(
        tuple((
            preceded(multispace0, raw_operand),
            preceded(multispace0, compare_op),
            preceded(multispace0, raw_operand),
        )),
        |(lhs, op, rhs)| (lhs, op, rhs),
    )(input)
}

fn filter_item(input: &str) -> IResult<&str, RawItem> {
    map(
        terminated(
            preceded(
                pair(tag_no_case("FILTER"), multispace0),
                delimited(
                    pchar('('),
                    separated_list1(preceded(multispace0, tag("&&")), comparison_raw),
                    preceded(multispace0, pchar(')')),
                ),
            ),
            opt(preceded(multispace0, pchar('.'))),
        ),
        RawItem::Filter,
    )(input)
}

fn pattern_item(input: &str) -> IResult<&str, RawItem> {
    map(
        terminated(
            tuple((
                raw_term,
                preceded(multispace1, raw_term),
                preceded(multispace1, raw_term),
            )),
            preceded(multispace0, pchar('.')),
        ),
        |(s, p, o)| RawItem::Pattern(s, p, o),
    )(input)
}

fn where_clause(input: &str) -> IResult<&str, Vec<RawItem>> {
    preceded(
        tuple((tag_no_case("WHERE"), multispace0, pchar('{'))),
        terminated(
            many0(preceded(multispace0, alt((filter_item, pattern_item)))),
            pair(multispace0, pchar('}')),
        ),
    )(input)
}

fn order_clause(input: &str) -> IResult<&str, String> {
    preceded(
        tuple((
            tag_no_case("ORDER"),
            multispace1,
            tag_no_case("BY"),
            multispace1,
        )),
        variable,
    )(input)
}

fn raw_query(input: &str) -> IResult<&str, RawQuery> {
    map(
        tuple((
            multispace0,
            many0(terminated(prefix_decl, multispace0)),
            select_clause,
            multispace0,
            where_clause,
            opt(preceded(multispace0, order_clause)),
            multispace0,
        )),
        |(_, prefixes, (distinct, select), _, items, order_by, _)| RawQuery {
            prefixes,
            distinct,
            select,
            items,
            order_by,
        },
    )(input)
}

/// Parse a pattern query. Fails with [`QueryError`] on malformed syntax or an
/// undeclared prefix.
pub fn parse_query(text: &str) -> Result<PatternQuery, QueryError> {
    let (_, raw) = all_consuming(raw_query)(text).map_err(|e| match e {
        nom::Err::Error(inner) | nom::Err::Failure(inner) => {
            let at: String = inner.input.chars().take(40).collect();
            QueryError::Parse(if at.is_empty() {
                "unexpected end of input".to_string()
            } else {
                format!("unexpected input at: {at:?}")
            })
        }
        nom::Err::Incomplete(_) => QueryError::Parse("incomplete input".to_string()),
    })?;
    resolve_query(raw)
}

// ============================================================================
// Prefix resolution
// ============================================================================

fn default_prefixes() -> HashMap<String, String> {
    HashMap::from([
        ("rdf".to_string(), vocab::rdf::NS.to_string()),
        ("rdfs".to_string(), vocab::rdfs::NS.to_string()),
        ("owl".to_string(), vocab::owl::NS.to_string()),
        ("xsd".to_string(), vocab::xsd::NS.to_string()),
    ])
}

fn resolve_query(raw: RawQuery) -> Result<PatternQuery, QueryError> {
    let mut prefixes = default_prefixes();
    for (prefix, iri) in raw.prefixes {
        prefixes.insert(prefix, iri);
    }

    let expand = |prefix: &str, local: &str| -> Result<Iri, QueryError> {
        prefixes
            .get(prefix)
            .map(|ns| Iri::new(format!("{ns}{local}")))
            .ok_or_else(|| QueryError::UnknownPrefix(prefix.to_string()))
    };

    let resolve_datatype = |dt: RawDatatype| -> Result<Iri, QueryError> {
        match dt {
            RawDatatype::IriRef(iri) => Ok(Iri::new(iri)),
            RawDatatype::QName(prefix, local) => expand(&prefix, &local),
        }
    };

    let resolve_term = |term: RawTerm| -> Result<PatternTerm, QueryError> {
        Ok(match term {
            RawTerm::Var(name) => PatternTerm::Var(name),
            RawTerm::IriRef(iri) => PatternTerm::Iri(Iri::new(iri)),
            RawTerm::QName(prefix, local) => PatternTerm::Iri(expand(&prefix, &local)?),
            RawTerm::TypeKeyword => PatternTerm::Iri(Iri::new(vocab::rdf::TYPE)),
            RawTerm::Literal { lexical, datatype } => PatternTerm::Literal(Literal {
                lexical,
                datatype: datatype.map(resolve_datatype).transpose()?,
            }),
        })
    };

    let mut patterns = Vec::new();
    let mut filters = Vec::new();
    for item in raw.items {
        match item {
            RawItem::Pattern(s, p, o) => patterns.push(TriplePattern {
                subject: resolve_term(s)?,
                predicate: resolve_term(p)?,
                object: resolve_term(o)?,
            }),
            RawItem::Filter(conds) => {
                for (lhs, op, rhs) in conds {
                    let as_operand = |t: RawTerm| -> Result<Operand, QueryError> {
                        Ok(match resolve_term(t)? {
                            PatternTerm::Var(name) => Operand::Var(name),
                            PatternTerm::Literal(lit) => Operand::Literal(lit),
                            PatternTerm::Iri(iri) => {
                                Operand::Literal(Literal::plain(iri.as_str()))
                            }
                        })
                    };
                    filters.push(Comparison {
                        lhs: as_operand(lhs)?,
                        op,
                        rhs: as_operand(rhs)?,
                    });
                }
            }
        }
    }

    Ok(PatternQuery {
        distinct: raw.distinct,
        select: raw.select,
        patterns,
        filters,
        order_by: raw.order_by,
    })
}

// ============================================================================
// Evaluation
// ============================================================================

/// Evaluate a parsed query against the store.
pub fn evaluate(store: &TripleStore, query: &PatternQuery) -> Vec<BindingRow> {
    let mut rows: Vec<BindingRow> = vec![BindingRow::new()];

    for pattern in &query.patterns {
        let mut next = Vec::new();
        for row in &rows {
            for st in store.iter() {
                if let Some(extended) = unify(pattern, st, row) {
                    next.push(extended);
                }
            }
        }
        rows = next;
        if rows.is_empty() {
            break;
        }
    }

    rows.retain(|row| query.filters.iter().all(|cmp| holds(cmp, row)));

    // Order on the full rows, so the sort variable need not be selected.
    if let Some(var) = &query.order_by {
        rows.sort_by(|a, b| compare_rows(a, b, var));
    }

    if let Selection::Vars(vars) = &query.select {
        for row in &mut rows {
            row.retain(|name, _| vars.contains(name));
        }
    }

    if query.distinct {
        let mut seen: HashSet<Vec<(String, String)>> = HashSet::new();
        rows.retain(|row| {
            let key: Vec<_> = row
                .iter()
                .map(|(name, term)| (name.clone(), term.render()))
                .collect();
            seen.insert(key)
        });
    }

    rows
}

fn unify(pattern: &TriplePattern, st: &crate::Statement, row: &BindingRow) -> Option<BindingRow> {
    let mut extended = row.clone();
    let subject = st.subject_term();
    let predicate = Term::Node(Node::Iri(st.predicate.clone()));
    if bind(&pattern.subject, &subject, &mut extended)
        && bind(&pattern.predicate, &predicate, &mut extended)
        && bind(&pattern.object, &st.object, &mut extended)
    {
        Some(extended)
    } else {
        None
    }
}

fn bind(pattern: &PatternTerm, actual: &Term, row: &mut BindingRow) -> bool {
    match pattern {
        PatternTerm::Var(name) => match row.get(name) {
            Some(bound) => bound == actual,
            None => {
                row.insert(name.clone(), actual.clone());
                true
            }
        },
        PatternTerm::Iri(iri) => actual.as_iri() == Some(iri),
        PatternTerm::Literal(lit) => actual.as_literal() == Some(lit),
    }
}

// ----------------------------------------------------------------------------
// Typed literal comparison
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Number(f64),
    DateTime(NaiveDateTime),
    Text(String),
}

fn operand_value(operand: &Operand, row: &BindingRow) -> Option<Value> {
    match operand {
        Operand::Var(name) => row.get(name).map(term_value),
        Operand::Literal(lit) => Some(literal_value(lit)),
    }
}

fn term_value(term: &Term) -> Value {
    match term {
        Term::Literal(lit) => literal_value(lit),
        other => Value::Text(other.text().to_string()),
    }
}

fn literal_value(lit: &Literal) -> Value {
    if let Some(dt) = &lit.datatype {
        let local = dt.local_name().to_ascii_lowercase();
        if local.contains("date") {
            if let Some(ts) = parse_date_time(&lit.lexical) {
                return Value::DateTime(ts);
            }
        }
        if matches!(
            local.as_str(),
            "integer" | "int" | "long" | "short" | "byte" | "decimal" | "float" | "double"
        ) {
            if let Ok(n) = lit.lexical.parse::<f64>() {
                return Value::Number(n);
            }
        }
        return Value::Text(lit.lexical.clone());
    }
    if let Some(ts) = parse_date_time(&lit.lexical) {
        return Value::DateTime(ts);
    }
    if let Ok(n) = lit.lexical.parse::<f64>() {
        return Value::Number(n);
    }
    Value::Text(lit.lexical.clone())
}

fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.naive_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn holds(cmp: &Comparison, row: &BindingRow) -> bool {
    let (Some(lhs), Some(rhs)) = (operand_value(&cmp.lhs, row), operand_value(&cmp.rhs, row))
    else {
        return false;
    };
    let Some(ordering) = compare_values(&lhs, &rhs) else {
        return false;
    };
    match cmp.op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
    }
}

fn compare_rows(a: &BindingRow, b: &BindingRow, var: &str) -> Ordering {
    match (a.get(var), b.get(var)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_values(&term_value(x), &term_value(y))
            .unwrap_or_else(|| x.render().cmp(&y.render())),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_query() {
        let q = parse_query("SELECT * WHERE { ?s ?p ?o . }").unwrap();
        assert_eq!(q.select, Selection::All);
        assert_eq!(q.patterns.len(), 1);
        assert!(!q.distinct);
    }

    #[test]
    fn parses_type_keyword_as_rdf_type() {
        let q = parse_query("SELECT ?s WHERE { ?s a owl:Class . }").unwrap();
        match &q.patterns[0].predicate {
            PatternTerm::Iri(iri) => assert_eq!(iri.as_str(), vocab::rdf::TYPE),
            other => panic!("unexpected predicate: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_query() {
        assert!(matches!(
            parse_query("SELECT WHERE { }"),
            Err(QueryError::Parse(_))
        ));
        assert!(matches!(
            parse_query("SELECT ?s WHERE { ?s ?p }"),
            Err(QueryError::Parse(_))
        ));
    }

    #[test]
    fn rejects_unknown_prefix() {
        assert!(matches!(
            parse_query("SELECT ?s WHERE { ?s a nope:Thing . }"),
            Err(QueryError::UnknownPrefix(p)) if p == "nope"
        ));
    }

    #[test]
    fn filter_comparisons_parse() {
        let q = parse_query(
            r#"SELECT ?d WHERE { ?s ?p ?d . FILTER(?d >= 3 && ?d < 10) }"#,
        )
        .unwrap();
        assert_eq!(q.filters.len(), 2);
        assert_eq!(q.filters[0].op, CompareOp::Ge);
        assert_eq!(q.filters[1].op, CompareOp::Lt);
    }

    #[test]
    fn date_time_literals_compare_chronologically() {
        let early = literal_value(&Literal::typed(
            "2024-01-02T00:00:00",
            vocab::xsd::DATE_TIME,
        ));
        let late = literal_value(&Literal::typed(
            "2024-01-10T12:30:00",
            vocab::xsd::DATE_TIME,
        ));
        assert_eq!(compare_values(&early, &late), Some(Ordering::Less));
    }
}
