//! The entity model: vertices, edges and the class registry.
//!
//! Entities are cheaply clonable handles over shared state, because the
//! same instance is reachable from the rid cache, from edge endpoints and
//! from user code at once. Equality is rid equality.
//!
//! Application classes are registered explicitly — class name plus
//! vertex/edge kind, optionally with the declared persistent fields. The
//! serializers reject class names the registry does not know.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use filament_wire::{Error, Result};
use parking_lot::Mutex;

use crate::ridbag::ReferenceBag;
use crate::types::{FieldValue, Record, Rid};

/// Vertex or edge, the only two entity bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Vertex,
    Edge,
}

#[derive(Debug, Clone)]
struct ClassSpec {
    kind: EntityKind,
    declared_fields: Option<BTreeSet<String>>,
}

/// Explicit class directory: class name to entity kind, with optional
/// declared persistent fields.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    classes: DashMap<String, ClassSpec>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_vertex(&self, class_name: impl Into<String>) {
        self.classes.insert(
            class_name.into(),
            ClassSpec {
                kind: EntityKind::Vertex,
                declared_fields: None,
            },
        );
    }

    pub fn register_edge(&self, class_name: impl Into<String>) {
        self.classes.insert(
            class_name.into(),
            ClassSpec {
                kind: EntityKind::Edge,
                declared_fields: None,
            },
        );
    }

    /// Registers a vertex class with its declared persistent fields.
    /// Decoding a field outside this set fails with `Serialization`.
    pub fn register_vertex_with_fields<I, S>(&self, class_name: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes.insert(
            class_name.into(),
            ClassSpec {
                kind: EntityKind::Vertex,
                declared_fields: Some(fields.into_iter().map(Into::into).collect()),
            },
        );
    }

    pub fn kind_of(&self, class_name: &str) -> Option<EntityKind> {
        self.classes.get(class_name).map(|spec| spec.kind)
    }

    fn expect(&self, class_name: &str) -> Result<ClassSpec> {
        self.classes
            .get(class_name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                Error::Serialization(format!("there is no class with name '{class_name}'"))
            })
    }
}

#[derive(Debug, Default)]
struct VertexData {
    class_name: String,
    rid: Option<Rid>,
    version: i32,
    fields: BTreeMap<String, FieldValue>,
    out_edges: BTreeMap<String, Vec<Edge>>,
    in_edges: BTreeMap<String, Vec<Edge>>,
    /// Reference bags that did not route into an edge map — tree-resident
    /// bags and bags on fields without the out_/in_ prefix.
    link_bags: BTreeMap<String, ReferenceBag>,
}

/// A vertex handle. Clones share the same underlying entity.
#[derive(Clone, Default)]
pub struct Vertex(Arc<Mutex<VertexData>>);

#[derive(Debug, Default)]
struct EdgeData {
    class_name: String,
    rid: Option<Rid>,
    version: i32,
    fields: BTreeMap<String, FieldValue>,
    in_vertex: Option<Vertex>,
    out_vertex: Option<Vertex>,
    /// Target rid parsed from a reference bag, pending resolution.
    tmp_rid: Option<Rid>,
}

/// An edge handle. Clones share the same underlying entity.
#[derive(Clone, Default)]
pub struct Edge(Arc<Mutex<EdgeData>>);

impl Vertex {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self(Arc::new(Mutex::new(VertexData {
            class_name: class_name.into(),
            ..VertexData::default()
        })))
    }

    pub fn class_name(&self) -> String {
        self.0.lock().class_name.clone()
    }

    pub fn rid(&self) -> Option<Rid> {
        self.0.lock().rid
    }

    pub fn set_rid(&self, rid: Rid) {
        self.0.lock().rid = Some(rid);
    }

    pub fn version(&self) -> i32 {
        self.0.lock().version
    }

    pub fn set_version(&self, version: i32) {
        self.0.lock().version = version;
    }

    pub fn field(&self, name: &str) -> Option<FieldValue> {
        self.0.lock().fields.get(name).cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: FieldValue) {
        self.0.lock().fields.insert(name.into(), value);
    }

    pub fn fields(&self) -> BTreeMap<String, FieldValue> {
        self.0.lock().fields.clone()
    }

    pub fn out_edges(&self) -> BTreeMap<String, Vec<Edge>> {
        self.0.lock().out_edges.clone()
    }

    pub fn in_edges(&self) -> BTreeMap<String, Vec<Edge>> {
        self.0.lock().in_edges.clone()
    }

    pub fn link_bags(&self) -> BTreeMap<String, ReferenceBag> {
        self.0.lock().link_bags.clone()
    }

    /// Replaces the outgoing edge map. Every contained edge is back-linked
    /// so that its `in_vertex` is this vertex.
    pub fn set_out_edges(&self, edges: BTreeMap<String, Vec<Edge>>) {
        for edge in edges.values().flatten() {
            edge.set_in_vertex(self.clone());
        }
        self.0.lock().out_edges = edges;
    }

    /// Replaces the incoming edge map. Every contained edge is back-linked
    /// so that its `out_vertex` is this vertex.
    pub fn set_in_edges(&self, edges: BTreeMap<String, Vec<Edge>>) {
        for edge in edges.values().flatten() {
            edge.set_out_vertex(self.clone());
        }
        self.0.lock().in_edges = edges;
    }

    /// Appends one outgoing edge under the given edge-class key,
    /// back-linking it to this vertex.
    pub fn add_out_edge(&self, key: impl Into<String>, edge: Edge) {
        edge.set_in_vertex(self.clone());
        self.0.lock().out_edges.entry(key.into()).or_default().push(edge);
    }

    pub fn add_in_edge(&self, key: impl Into<String>, edge: Edge) {
        edge.set_out_vertex(self.clone());
        self.0.lock().in_edges.entry(key.into()).or_default().push(edge);
    }

    fn add_link_bag(&self, name: impl Into<String>, bag: ReferenceBag) {
        self.0.lock().link_bags.insert(name.into(), bag);
    }

    /// Pointer identity, used for cycle detection during write traversals.
    pub fn same_instance(&self, other: &Vertex) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        match (self.rid(), other.rid()) {
            (Some(a), Some(b)) => a == b,
            _ => Arc::ptr_eq(&self.0, &other.0),
        }
    }
}

impl fmt::Debug for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.lock();
        f.debug_struct("Vertex")
            .field("class", &data.class_name)
            .field("rid", &data.rid)
            .field("version", &data.version)
            .finish_non_exhaustive()
    }
}

impl Edge {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self(Arc::new(Mutex::new(EdgeData {
            class_name: class_name.into(),
            ..EdgeData::default()
        })))
    }

    /// An edge stub created from a reference-bag entry; `tmp_rid` awaits
    /// resolution against the fetched record set.
    pub fn placeholder(class_name: impl Into<String>, tmp_rid: Rid) -> Self {
        let edge = Self::new(class_name);
        edge.0.lock().tmp_rid = Some(tmp_rid);
        edge
    }

    pub fn class_name(&self) -> String {
        self.0.lock().class_name.clone()
    }

    pub fn rid(&self) -> Option<Rid> {
        self.0.lock().rid
    }

    pub fn set_rid(&self, rid: Rid) {
        self.0.lock().rid = Some(rid);
    }

    pub fn version(&self) -> i32 {
        self.0.lock().version
    }

    pub fn set_version(&self, version: i32) {
        self.0.lock().version = version;
    }

    pub fn field(&self, name: &str) -> Option<FieldValue> {
        self.0.lock().fields.get(name).cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: FieldValue) {
        self.0.lock().fields.insert(name.into(), value);
    }

    pub fn fields(&self) -> BTreeMap<String, FieldValue> {
        self.0.lock().fields.clone()
    }

    pub fn tmp_rid(&self) -> Option<Rid> {
        self.0.lock().tmp_rid
    }

    pub fn in_vertex(&self) -> Option<Vertex> {
        self.0.lock().in_vertex.clone()
    }

    pub fn out_vertex(&self) -> Option<Vertex> {
        self.0.lock().out_vertex.clone()
    }

    pub fn set_in_vertex(&self, vertex: Vertex) {
        self.0.lock().in_vertex = Some(vertex);
    }

    pub fn set_out_vertex(&self, vertex: Vertex) {
        self.0.lock().out_vertex = Some(vertex);
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        match (self.rid(), other.rid()) {
            (Some(a), Some(b)) => a == b,
            _ => Arc::ptr_eq(&self.0, &other.0),
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.lock();
        f.debug_struct("Edge")
            .field("class", &data.class_name)
            .field("rid", &data.rid)
            .field("version", &data.version)
            .finish_non_exhaustive()
    }
}

/// Either entity base.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Vertex(Vertex),
    Edge(Edge),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Vertex(_) => EntityKind::Vertex,
            Self::Edge(_) => EntityKind::Edge,
        }
    }

    pub fn class_name(&self) -> String {
        match self {
            Self::Vertex(v) => v.class_name(),
            Self::Edge(e) => e.class_name(),
        }
    }

    pub fn rid(&self) -> Option<Rid> {
        match self {
            Self::Vertex(v) => v.rid(),
            Self::Edge(e) => e.rid(),
        }
    }

    pub fn set_rid(&self, rid: Rid) {
        match self {
            Self::Vertex(v) => v.set_rid(rid),
            Self::Edge(e) => e.set_rid(rid),
        }
    }

    pub fn set_version(&self, version: i32) {
        match self {
            Self::Vertex(v) => v.set_version(version),
            Self::Edge(e) => e.set_version(version),
        }
    }

    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            Self::Vertex(v) => Some(v),
            Self::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Self::Edge(e) => Some(e),
            Self::Vertex(_) => None,
        }
    }
}

impl From<&Vertex> for Entity {
    fn from(vertex: &Vertex) -> Self {
        Entity::Vertex(vertex.clone())
    }
}

impl From<&Edge> for Entity {
    fn from(edge: &Edge) -> Self {
        Entity::Edge(edge.clone())
    }
}

/// Turns a decoded record into an entity of its registered class.
///
/// Vertex fields named `out_X` or `in_X` whose value is an embedded
/// reference bag become placeholder edges of class `X` under that key;
/// tree bags and other bag fields stay in the link-bag map; everything
/// else becomes an ordinary attribute.
pub fn materialize(record: Record, registry: &EntityRegistry) -> Result<Entity> {
    let spec = registry.expect(&record.class_name)?;

    match spec.kind {
        EntityKind::Vertex => {
            let vertex = Vertex::new(record.class_name.clone());
            for (name, value) in record.fields {
                if let FieldValue::LinkBag(bag) = value {
                    route_bag(&vertex, &name, bag);
                    continue;
                }
                if let Some(declared) = &spec.declared_fields {
                    if !declared.contains(&name) {
                        return Err(Error::Serialization(format!(
                            "class '{}' has no attribute with the name '{name}'",
                            record.class_name
                        )));
                    }
                }
                vertex.set_field(name, value);
            }
            Ok(Entity::Vertex(vertex))
        }
        EntityKind::Edge => {
            let edge = Edge::new(record.class_name);
            for (name, value) in record.fields {
                edge.set_field(name, value);
            }
            Ok(Entity::Edge(edge))
        }
    }
}

fn route_bag(vertex: &Vertex, field_name: &str, bag: ReferenceBag) {
    let routed = match field_name.strip_prefix("out_") {
        Some(key) => match &bag {
            ReferenceBag::Embedded(rids) => {
                for rid in rids {
                    vertex.add_out_edge(key, Edge::placeholder(key, *rid));
                }
                true
            }
            ReferenceBag::Tree(_) => false,
        },
        None => match field_name.strip_prefix("in_") {
            Some(key) => match &bag {
                ReferenceBag::Embedded(rids) => {
                    for rid in rids {
                        vertex.add_in_edge(key, Edge::placeholder(key, *rid));
                    }
                    true
                }
                ReferenceBag::Tree(_) => false,
            },
            None => false,
        },
    };
    if !routed {
        vertex.add_link_bag(field_name, bag);
    }
}
