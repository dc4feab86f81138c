//! Synthetic instance generation.
//!
//! [`InstanceGenerator`] walks a [`SchemaModel`] and asserts plausible
//! instance data into a [`TripleStore`]: one value per property declared on
//! the requested class, honoring enumerations and numeric bounds from the
//! schema's constraints. Object-valued properties recurse into the range
//! class, bounded by a depth budget and a path-scoped visited set so
//! self-referential schemas (a `Person` who `knows` a `Person`) terminate.
//!
//! Value selection is driven by a seedable RNG; a fixed seed reproduces the
//! same population, which the tests rely on.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use lifegraph_schema::{Datatype, PropertyKind, SchemaError, SchemaModel, SchemaProperty};
use lifegraph_store::vocab::rdf;
use lifegraph_store::{Iri, Literal, Node, Statement, Term, TripleStore};

/// Default recursion budget for nested object values.
pub const DEFAULT_MAX_DEPTH: usize = 8;

// ============================================================================
// Simulation clock
// ============================================================================

/// Advancing wall-clock stand-in for timestamping generated data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    current: NaiveDateTime,
}

impl SimClock {
    pub fn new(start: NaiveDate) -> Self {
        Self {
            current: start.and_hms_opt(0, 0, 0).unwrap_or_default(),
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.current
    }

    pub fn advance_day(&mut self) {
        self.current += Duration::days(1);
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default())
    }
}

// ============================================================================
// Generated instance record
// ============================================================================

/// What one property received during generation.
///
/// A reference's `id` is a store-local name for generated neighbors, or the
/// absolute identifier when the schema pins the target with `owl:hasValue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeneratedValue {
    Literal(Literal),
    Reference { class: Iri, id: String },
}

/// Summary of one generated instance, keyed by property name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedInstance {
    pub id: String,
    pub class: Iri,
    pub values: BTreeMap<String, GeneratedValue>,
}

// ============================================================================
// Generator
// ============================================================================

#[derive(Debug)]
pub struct InstanceGenerator {
    schema: SchemaModel,
    clock: SimClock,
    rng: StdRng,
    max_depth: usize,
}

impl InstanceGenerator {
    pub fn new(schema: SchemaModel) -> Self {
        Self {
            schema,
            clock: SimClock::default(),
            rng: StdRng::from_entropy(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Seeded construction: the same seed yields the same population.
    pub fn with_seed(schema: SchemaModel, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(schema)
        }
    }

    pub fn set_max_depth(&mut self, depth: usize) {
        self.max_depth = depth;
    }

    pub fn clock_mut(&mut self) -> &mut SimClock {
        &mut self.clock
    }

    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    /// Generate one instance of `class` into `store`.
    ///
    /// `instance_id` overrides the minted identifier; nested instances always
    /// mint their own. Fails only when `class` is not in the schema.
    pub fn generate_instance(
        &mut self,
        store: &mut TripleStore,
        class: &Iri,
        instance_id: Option<&str>,
    ) -> Result<GeneratedInstance, SchemaError> {
        if !self.schema.contains_class(class) {
            return Err(SchemaError::UnknownClass(class.as_str().to_string()));
        }
        let mut path = Vec::new();
        let instance = self.generate_at(store, class, instance_id, self.max_depth, &mut path);
        debug!(class = %class, id = %instance.id, values = instance.values.len(), "generated instance");
        Ok(instance)
    }

    /// Generate `count` instances, with identifiers `{base}_{i}` when a base
    /// is given and RNG-minted otherwise.
    pub fn generate_population(
        &mut self,
        store: &mut TripleStore,
        class: &Iri,
        count: usize,
        base_id: Option<&str>,
    ) -> Result<Vec<GeneratedInstance>, SchemaError> {
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let id = base_id.map(|base| format!("{base}_{i}"));
            out.push(self.generate_instance(store, class, id.as_deref())?);
        }
        Ok(out)
    }

    fn generate_at(
        &mut self,
        store: &mut TripleStore,
        class: &Iri,
        instance_id: Option<&str>,
        depth: usize,
        path: &mut Vec<Iri>,
    ) -> GeneratedInstance {
        let id = match instance_id {
            Some(id) => id.to_string(),
            None => self.mint_id(),
        };
        let subject = Node::Iri(store.resolve(&id));
        store.insert(Statement::new(
            subject.clone(),
            rdf::TYPE,
            Term::iri(class.clone()),
        ));

        let mut values = BTreeMap::new();
        let property_iris = match self.schema.class_of(class) {
            Ok(c) => c.properties.clone(),
            // Nested reference to a class the schema never declared: the bare
            // type assertion above is all we can say about it.
            Err(_) => Vec::new(),
        };

        path.push(class.clone());
        for prop_iri in &property_iris {
            let Ok(prop) = self.schema.property_of(prop_iri) else {
                continue;
            };
            let prop = prop.clone();
            let key = prop.iri.local_name().to_string();
            match prop.kind {
                PropertyKind::Datatype => {
                    if let Some(lit) = self.datatype_value(&prop) {
                        store.insert(Statement::new(
                            subject.clone(),
                            prop.iri.clone(),
                            Term::Literal(lit.clone()),
                        ));
                        values.insert(key, GeneratedValue::Literal(lit));
                    }
                }
                PropertyKind::Object => {
                    if let Some(value) = self.object_value(store, &prop, depth, path) {
                        if let GeneratedValue::Reference { id: target, .. } = &value {
                            store.insert(Statement::new(
                                subject.clone(),
                                prop.iri.clone(),
                                Term::iri(store.resolve(target)),
                            ));
                        }
                        values.insert(key, value);
                    }
                }
            }
        }
        path.pop();

        GeneratedInstance {
            id,
            class: class.clone(),
            values,
        }
    }

    /// Pick a literal for a datatype property: enumerated values first, then
    /// the datatype's range (constrained or default).
    fn datatype_value(&mut self, prop: &SchemaProperty) -> Option<Literal> {
        let constraint = self.schema.constraint_for(&prop.iri).cloned();
        if let Some(c) = &constraint {
            if let Some(choice) = c.allowed.choose(&mut self.rng) {
                return match choice {
                    Term::Literal(lit) => Some(lit.clone()),
                    Term::Node(node) => Some(Literal::plain(match node {
                        Node::Iri(iri) => iri.local_name().to_string(),
                        Node::Blank(label) => label.clone(),
                    })),
                };
            }
        }
        let min = constraint.as_ref().and_then(|c| c.min);
        let max = constraint.as_ref().and_then(|c| c.max);

        match prop.datatype() {
            Datatype::Integer => {
                let lo = min.unwrap_or(0.0) as i64;
                let hi = max.unwrap_or(100.0) as i64;
                Some(Literal::integer(self.rng.gen_range(lo..=hi.max(lo))))
            }
            Datatype::Decimal => {
                let lo = min.unwrap_or(0.0);
                let hi = max.unwrap_or(100.0).max(lo);
                let raw = if hi > lo {
                    self.rng.gen_range(lo..=hi)
                } else {
                    lo
                };
                Some(Literal::decimal((raw * 100.0).round() / 100.0))
            }
            Datatype::Boolean => Some(Literal::boolean(self.rng.gen())),
            Datatype::String => {
                Some(Literal::plain(format!(
                    "Value_{}",
                    self.rng.gen_range(1000..10000)
                )))
            }
            Datatype::Date => Some(Literal::date(self.clock.now().date())),
            Datatype::DateTime => {
                let offset = Duration::days(self.rng.gen_range(0..365));
                Some(Literal::date_time(self.clock.now() + offset))
            }
            Datatype::Other => {
                debug!(property = %prop.iri, "skipping property with unsupported range");
                None
            }
        }
    }

    /// Produce the target of an object property, recursing into the range
    /// class while the depth budget and the path allow it.
    fn object_value(
        &mut self,
        store: &mut TripleStore,
        prop: &SchemaProperty,
        depth: usize,
        path: &mut Vec<Iri>,
    ) -> Option<GeneratedValue> {
        // `owl:hasValue` pins the target outright.
        if let Some(constraint) = self.schema.constraint_for(&prop.iri) {
            let pinned: Vec<Iri> = constraint
                .allowed
                .iter()
                .filter_map(|t| t.as_iri().cloned())
                .collect();
            if let Some(target) = pinned.choose(&mut self.rng) {
                // The pinned identifier is linked verbatim, whatever namespace
                // it lives in.
                return Some(GeneratedValue::Reference {
                    class: prop.ranges.first().cloned().unwrap_or_else(|| target.clone()),
                    id: target.as_str().to_string(),
                });
            }
        }

        let range = prop.ranges.first()?.clone();
        let expand = depth > 0 && !path.contains(&range) && self.schema.contains_class(&range);
        let nested = if expand {
            self.generate_at(store, &range, None, depth - 1, path)
        } else {
            // Budget exhausted, cycle, or undeclared range: assert the type
            // and stop.
            let id = self.mint_id();
            let subject = Node::Iri(store.resolve(&id));
            store.insert(Statement::new(subject, rdf::TYPE, Term::iri(range.clone())));
            GeneratedInstance {
                id,
                class: range.clone(),
                values: BTreeMap::new(),
            }
        };
        Some(GeneratedValue::Reference {
            class: range,
            id: nested.id,
        })
    }

    fn mint_id(&mut self) -> String {
        format!("instance_{:08x}", self.rng.gen::<u32>())
    }
}

// ============================================================================
// Tests
// ============================================================================
