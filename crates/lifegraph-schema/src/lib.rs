//! Schema model for Lifegraph.
//!
//! [`SchemaModel::extract`] scans a schema-description graph already loaded
//! in a [`TripleStore`] and builds an in-memory model of its classes,
//! properties (object- vs. datatype-valued) and value constraints. The
//! instance generator consumes this model read-only.
//!
//! Extraction is deliberately total: malformed or partial schemas degrade to
//! defaults (missing labels fall back to the identifier's trailing segment,
//! missing ranges mean "unconstrained") instead of failing. Only the lookup
//! accessors ([`SchemaModel::class_of`] / [`SchemaModel::property_of`])
//! surface errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use lifegraph_store::vocab::{owl, rdf, rdfs, xsd};
use lifegraph_store::{Iri, Node, Term, TripleStore};

// ============================================================================
// Model types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    Object,
    Datatype,
}

/// Datatype tag for a datatype property's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Datatype {
    Integer,
    Decimal,
    Boolean,
    String,
    Date,
    DateTime,
    Other,
}

impl Datatype {
    /// Classify a range identifier by its trailing segment. Matching is by
    /// loose name groups, so `xsd:int` and `xsd:integer` land together.
    pub fn from_iri(iri: &Iri) -> Self {
        let local = iri.local_name().to_ascii_lowercase();
        match local.as_str() {
            "datetime" => Self::DateTime,
            "date" => Self::Date,
            "boolean" => Self::Boolean,
            "string" => Self::String,
            "decimal" | "float" | "double" => Self::Decimal,
            name if name.contains("int") => Self::Integer,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaClass {
    pub iri: Iri,
    pub label: String,
    /// Properties declaring this class as domain (back-linked by extraction).
    pub properties: Vec<Iri>,
    pub subclass_of: Vec<Iri>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaProperty {
    pub iri: Iri,
    pub kind: PropertyKind,
    pub label: String,
    pub domains: Vec<Iri>,
    pub ranges: Vec<Iri>,
    /// At most one value per subject.
    pub functional: bool,
}

impl SchemaProperty {
    /// Datatype of the first declared range; `Other` when none is declared.
    pub fn datatype(&self) -> Datatype {
        self.ranges
            .first()
            .map(Datatype::from_iri)
            .unwrap_or(Datatype::Other)
    }
}

/// Value constraint accumulated from restriction statements.
///
/// Later restriction nodes overwrite earlier min/max values for the same
/// property; enumerated values accumulate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueConstraint {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub allowed: Vec<Term>,
}

impl ValueConstraint {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.allowed.is_empty()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown class: {0}")]
    UnknownClass(String),
    #[error("unknown property: {0}")]
    UnknownProperty(String),
}

// ============================================================================
// Schema model
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaModel {
    classes: BTreeMap<Iri, SchemaClass>,
    properties: BTreeMap<Iri, SchemaProperty>,
    constraints: BTreeMap<Iri, ValueConstraint>,
}

impl SchemaModel {
    /// Build the model by scanning a schema graph loaded in `store`.
    pub fn extract(store: &TripleStore) -> Self {
        let mut model = Self::default();
        model.collect_classes(store);
        model.collect_properties(store, owl::OBJECT_PROPERTY, PropertyKind::Object);
        model.collect_properties(store, owl::DATATYPE_PROPERTY, PropertyKind::Datatype);
        model.back_link_domains();
        model.collect_constraints(store);
        debug!(
            classes = model.classes.len(),
            properties = model.properties.len(),
            constraints = model.constraints.len(),
            "extracted schema model"
        );
        model
    }

    pub fn classes(&self) -> impl Iterator<Item = &SchemaClass> {
        self.classes.values()
    }

    pub fn properties(&self) -> impl Iterator<Item = &SchemaProperty> {
        self.properties.values()
    }

    pub fn contains_class(&self, iri: &Iri) -> bool {
        self.classes.contains_key(iri)
    }

    pub fn class_of(&self, iri: &Iri) -> Result<&SchemaClass, SchemaError> {
        self.classes
            .get(iri)
            .ok_or_else(|| SchemaError::UnknownClass(iri.as_str().to_string()))
    }

    pub fn property_of(&self, iri: &Iri) -> Result<&SchemaProperty, SchemaError> {
        self.properties
            .get(iri)
            .ok_or_else(|| SchemaError::UnknownProperty(iri.as_str().to_string()))
    }

    pub fn constraint_for(&self, property: &Iri) -> Option<&ValueConstraint> {
        self.constraints.get(property)
    }

    // ------------------------------------------------------------------
    // Extraction passes
    // ------------------------------------------------------------------

    fn collect_classes(&mut self, store: &TripleStore) {
        for node in store.subjects_of_type(&Iri::new(owl::CLASS)) {
            let Some(iri) = node.as_iri() else {
                // Anonymous class expressions carry no usable identifier.
                continue;
            };
            let subclass_of = iri_objects(store, node, rdfs::SUB_CLASS_OF);
            self.classes.insert(
                iri.clone(),
                SchemaClass {
                    iri: iri.clone(),
                    label: label_of(store, node, iri),
                    properties: Vec::new(),
                    subclass_of,
                },
            );
        }
    }

    fn collect_properties(&mut self, store: &TripleStore, type_iri: &str, kind: PropertyKind) {
        let functional = Iri::new(owl::FUNCTIONAL_PROPERTY);
        let rdf_type = Iri::new(rdf::TYPE);
        for node in store.subjects_of_type(&Iri::new(type_iri)) {
            let Some(iri) = node.as_iri() else { continue };
            self.properties.insert(
                iri.clone(),
                SchemaProperty {
                    iri: iri.clone(),
                    kind,
                    label: label_of(store, node, iri),
                    domains: iri_objects(store, node, rdfs::DOMAIN),
                    ranges: iri_objects(store, node, rdfs::RANGE),
                    functional: store.contains_triple(
                        node,
                        &rdf_type,
                        &Term::iri(functional.clone()),
                    ),
                },
            );
        }
    }

    fn back_link_domains(&mut self) {
        let links: Vec<(Iri, Iri)> = self
            .properties
            .values()
            .flat_map(|prop| {
                prop.domains
                    .iter()
                    .map(|domain| (domain.clone(), prop.iri.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (domain, property) in links {
            if let Some(class) = self.classes.get_mut(&domain) {
                class.properties.push(property);
            }
        }
    }

    fn collect_constraints(&mut self, store: &TripleStore) {
        let on_property = Iri::new(owl::ON_PROPERTY);
        let rdf_type = Iri::new(rdf::TYPE);
        let restriction = Term::iri(owl::RESTRICTION);

        // Restriction nodes in statement order, so later min/max overwrite
        // earlier ones deterministically.
        for st in store.iter() {
            if st.predicate != on_property {
                continue;
            }
            let Some(target) = st.object.as_iri().cloned() else {
                continue;
            };
            if !self.properties.contains_key(&target) {
                continue;
            }
            if !store.contains_triple(&st.subject, &rdf_type, &restriction) {
                continue;
            }
            let entry = self.constraints.entry(target).or_default();
            read_restriction_node(store, &st.subject, entry);
        }

        // `owl:withRestrictions` facet lists and `owl:oneOf` enumerations
        // attached to the property itself.
        let property_iris: Vec<Iri> = self.properties.keys().cloned().collect();
        for iri in property_iris {
            let node = Node::Iri(iri.clone());
            let mut extra = ValueConstraint::default();

            for head in store.objects(&node, &Iri::new(owl::WITH_RESTRICTIONS)) {
                for facet in store.rdf_list(head) {
                    let Term::Node(facet_node) = &facet else { continue };
                    if let Some(min) = numeric_object(store, facet_node, xsd::MIN_INCLUSIVE) {
                        extra.min = Some(min);
                    }
                    if let Some(max) = numeric_object(store, facet_node, xsd::MAX_INCLUSIVE) {
                        extra.max = Some(max);
                    }
                }
            }
            for head in store.objects(&node, &Iri::new(owl::ONE_OF)) {
                extra.allowed.extend(store.rdf_list(head));
            }

            if !extra.is_empty() {
                let entry = self.constraints.entry(iri).or_default();
                if extra.min.is_some() {
                    entry.min = extra.min;
                }
                if extra.max.is_some() {
                    entry.max = extra.max;
                }
                entry.allowed.extend(extra.allowed);
            }
        }

        self.constraints.retain(|_, c| !c.is_empty());
    }
}

// ============================================================================
// Scan helpers
// ============================================================================

fn label_of(store: &TripleStore, node: &Node, iri: &Iri) -> String {
    store
        .objects(node, &Iri::new(rdfs::LABEL))
        .iter()
        .find_map(|term| term.as_literal().map(|lit| lit.lexical.clone()))
        .unwrap_or_else(|| iri.local_name().to_string())
}

fn iri_objects(store: &TripleStore, node: &Node, predicate: &str) -> Vec<Iri> {
    store
        .objects(node, &Iri::new(predicate))
        .iter()
        .filter_map(|term| term.as_iri().cloned())
        .collect()
}

fn numeric_object(store: &TripleStore, node: &Node, predicate: &str) -> Option<f64> {
    store
        .objects(node, &Iri::new(predicate))
        .iter()
        .find_map(|term| term.as_literal().and_then(|lit| lit.lexical.parse().ok()))
}

/// Read min/max cardinality bounds and `owl:hasValue` assertions from one
/// restriction node into the constraint.
fn read_restriction_node(store: &TripleStore, node: &Node, constraint: &mut ValueConstraint) {
    if let Some(min) = numeric_object(store, node, owl::MIN_CARDINALITY) {
        constraint.min = Some(min);
    }
    if let Some(max) = numeric_object(store, node, owl::MAX_CARDINALITY) {
        constraint.max = Some(max);
    }
    for value in store.objects(node, &Iri::new(owl::HAS_VALUE)) {
        if !constraint.allowed.contains(value) {
            constraint.allowed.push((*value).clone());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use lifegraph_store::RdfSyntax;

    const SENSOR_SCHEMA: &str = r#"
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix ex: <http://example.org/schema/> .

ex:Sensor a owl:Class ;
    rdfs:label "Sensor" .
ex:Room a owl:Class .

ex:reading a owl:DatatypeProperty ;
    rdfs:domain ex:Sensor ;
    rdfs:range xsd:decimal .

ex:installedIn a owl:ObjectProperty ;
    a owl:FunctionalProperty ;
    rdfs:domain ex:Sensor ;
    rdfs:range ex:Room .

_:r1 a owl:Restriction ;
    owl:onProperty ex:reading ;
    owl:minCardinality "0"^^xsd:integer ;
    owl:maxCardinality "10"^^xsd:integer .
"#;

    fn sensor_model() -> SchemaModel {
        let mut store = TripleStore::new("http://example.org/schema/");
        store.import_str(SENSOR_SCHEMA, RdfSyntax::Turtle).unwrap();
        SchemaModel::extract(&store)
    }

    #[test]
    fn extracts_classes_with_label_fallback() {
        let model = sensor_model();
        let sensor = model
            .class_of(&Iri::new("http://example.org/schema/Sensor"))
            .unwrap();
        assert_eq!(sensor.label, "Sensor");

        // No rdfs:label on Room: fall back to the trailing segment.
        let room = model
            .class_of(&Iri::new("http://example.org/schema/Room"))
            .unwrap();
        assert_eq!(room.label, "Room");
    }

    #[test]
    fn back_links_properties_into_domain_classes() {
        let model = sensor_model();
        let sensor = model
            .class_of(&Iri::new("http://example.org/schema/Sensor"))
            .unwrap();
        assert_eq!(sensor.properties.len(), 2);
    }

    #[test]
    fn datatype_and_functional_flags() {
        let model = sensor_model();
        let reading = model
            .property_of(&Iri::new("http://example.org/schema/reading"))
            .unwrap();
        assert_eq!(reading.kind, PropertyKind::Datatype);
        assert_eq!(reading.datatype(), Datatype::Decimal);
        assert!(!reading.functional);

        let installed = model
            .property_of(&Iri::new("http://example.org/schema/installedIn"))
            .unwrap();
        assert_eq!(installed.kind, PropertyKind::Object);
        assert!(installed.functional);
    }

    #[test]
    fn restriction_bounds_are_extracted() {
        let model = sensor_model();
        let constraint = model
            .constraint_for(&Iri::new("http://example.org/schema/reading"))
            .unwrap();
        assert_eq!(constraint.min, Some(0.0));
        assert_eq!(constraint.max, Some(10.0));
        assert!(constraint.allowed.is_empty());
    }

    #[test]
    fn later_restriction_overwrites_bounds() {
        let mut store = TripleStore::new("http://example.org/schema/");
        store.import_str(SENSOR_SCHEMA, RdfSyntax::Turtle).unwrap();
        store.import_str(
            r#"
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix ex: <http://example.org/schema/> .
_:r2 a owl:Restriction ;
    owl:onProperty ex:reading ;
    owl:maxCardinality "99"^^xsd:integer .
"#,
            RdfSyntax::Turtle,
        )
        .unwrap();

        let model = SchemaModel::extract(&store);
        let constraint = model
            .constraint_for(&Iri::new("http://example.org/schema/reading"))
            .unwrap();
        assert_eq!(constraint.min, Some(0.0));
        assert_eq!(constraint.max, Some(99.0));
    }

    #[test]
    fn one_of_list_becomes_enumeration() {
        let mut store = TripleStore::new("http://example.org/schema/");
        store
            .import_str(
                r#"
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix ex: <http://example.org/schema/> .
ex:Mood a owl:Class .
ex:moodLevel a owl:DatatypeProperty ;
    rdfs:domain ex:Mood ;
    owl:oneOf ( "low" "medium" "high" ) .
"#,
                RdfSyntax::Turtle,
            )
            .unwrap();

        let model = SchemaModel::extract(&store);
        let constraint = model
            .constraint_for(&Iri::new("http://example.org/schema/moodLevel"))
            .unwrap();
        let values: Vec<_> = constraint.allowed.iter().map(|t| t.text()).collect();
        assert_eq!(values, ["low", "medium", "high"]);
    }

    #[test]
    fn empty_graph_extracts_empty_model() {
        let store = TripleStore::new("http://example.org/");
        let model = SchemaModel::extract(&store);
        assert_eq!(model.classes().count(), 0);
        assert!(matches!(
            model.class_of(&Iri::new("http://example.org/Nope")),
            Err(SchemaError::UnknownClass(_))
        ));
    }
}
