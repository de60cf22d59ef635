//! Client and object-graph materializer.
//!
//! `Client::open` authenticates, opens the database and loads the
//! global-property schema. Reads decode every returned record through the
//! configured serializer, index the entities by rid and resolve edge
//! placeholders against that index. Writes walk the vertex graph depth
//! first: the vertex insert comes back with its rid before the outgoing
//! edges are persisted, so already-resolved entities short-circuit and
//! cycles cannot re-insert.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use filament_record::binary::BinarySerializer;
use filament_record::csv::CsvSerializer;
use filament_record::{
    Edge, Entity, EntityRegistry, FieldValue, Record, Rid, Schema, SharedSchema, Vertex,
    materialize,
};
use filament_wire::ops::{CommandClass, CommandMode, CommandPayload};
use filament_wire::{Error, Result};

use crate::config::{DriverConfig, Serialization};
use crate::db::{CommandResult, Database, DbType, RawRecord};
use crate::query::{Create, Select, Statement, Traverse};

pub struct Client {
    db: Database,
    registry: EntityRegistry,
    schema: SharedSchema,
    cache: DashMap<Rid, Entity>,
    serialization: Serialization,
}

impl Client {
    /// Connects, authenticates, opens `database` and loads the
    /// global-property dictionary. Entity classes must already be
    /// registered on `registry`.
    pub fn open(
        config: DriverConfig,
        database: &str,
        user: &str,
        password: &str,
        registry: EntityRegistry,
    ) -> Result<Self> {
        let serialization = config.serialization;
        let mut db = Database::open(config)?;
        db.connect(user, password)?;
        db.db_open(database, DbType::Graph, user, password)?;

        let mut client = Self {
            db,
            registry,
            schema: Arc::new(parking_lot::RwLock::new(Schema::new())),
            cache: DashMap::new(),
            serialization,
        };
        client.load_schema()?;
        Ok(client)
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn database(&mut self) -> &mut Database {
        &mut self.db
    }

    /// The rid-indexed cache of every entity materialized so far.
    pub fn cached(&self, rid: Rid) -> Option<Entity> {
        self.cache.get(&rid).map(|entry| entry.value().clone())
    }

    /// Fetches the global-property dictionary from the schema metadata
    /// record. Only the binary serializer consumes it; in CSV mode field
    /// names always travel inline.
    fn load_schema(&mut self) -> Result<()> {
        if self.serialization != Serialization::Binary {
            return Ok(());
        }
        let result = self.db.command(
            CommandClass::Idempotent,
            CommandMode::Sync,
            CommandPayload::sql("select globalProperties from metadata:schema"),
        )?;
        let Some(content) = result.records.first().and_then(|r| r.content.as_deref()) else {
            tracing::warn!("schema metadata record is empty, field ids will not resolve");
            return Ok(());
        };
        // the schema record itself always carries inline field names
        let bootstrap = Schema::new();
        let decoded = BinarySerializer::new(&bootstrap).decode(content)?;
        let schema = Schema::from_record(&decoded)?;
        tracing::debug!(properties = schema.len(), "global property schema loaded");
        *self.schema.write() = schema;
        Ok(())
    }

    /// Re-reads the global-property dictionary.
    pub fn reload_schema(&mut self) -> Result<()> {
        self.load_schema()
    }

    /// Runs a built statement as a synchronous command.
    pub fn execute(
        &mut self,
        statement: &dyn Statement,
        class: CommandClass,
    ) -> Result<CommandResult> {
        let text = statement.parse()?;
        tracing::debug!(query = %text, "executing statement");
        self.db
            .command(class, CommandMode::Sync, CommandPayload::sql(text))
    }

    /// Runs a raw query string, the escape hatch for statements the
    /// builder does not model.
    pub fn execute_raw(&mut self, text: &str, class: CommandClass) -> Result<CommandResult> {
        self.db
            .command(class, CommandMode::Sync, CommandPayload::sql(text))
    }

    /// Persists a vertex and, depth-first, every detached vertex reachable
    /// through its outgoing edges, then the edges themselves.
    pub fn create_vertex(&mut self, vertex: &Vertex) -> Result<()> {
        let mut visiting = Vec::new();
        self.create_vertex_inner(vertex, &mut visiting)
    }

    fn create_vertex_inner(&mut self, vertex: &Vertex, visiting: &mut Vec<Vertex>) -> Result<()> {
        if vertex.rid().is_some() {
            // already persisted, nothing to emit
            return Ok(());
        }
        if visiting.iter().any(|v| v.same_instance(vertex)) {
            return Err(Error::Serialization(
                "cycle detected during vertex write traversal".into(),
            ));
        }
        visiting.push(vertex.clone());

        let statement = Create::vertex(vertex).parse()?;
        let result = self.execute_raw(&statement, CommandClass::NonIdempotent)?;
        let (rid, version) = result.first_rid().ok_or_else(|| {
            Error::Serialization("no cluster information in create response".into())
        })?;
        vertex.set_rid(rid);
        if let Some(version) = version {
            vertex.set_version(version);
        }
        self.cache.insert(rid, Entity::Vertex(vertex.clone()));
        tracing::debug!(%rid, class = %vertex.class_name(), "vertex persisted");

        for edges in vertex.out_edges().into_values() {
            for edge in edges {
                if edge.rid().is_some() {
                    continue;
                }
                let target = edge.out_vertex().ok_or_else(|| {
                    Error::WrongType("outgoing edge without a target vertex".into())
                })?;
                self.create_vertex_inner(&target, visiting)?;
                self.persist_edge(&edge)?;
            }
        }

        visiting.pop();
        Ok(())
    }

    /// Persists a single edge whose endpoints are already resolved.
    pub fn create_edge(&mut self, edge: &Edge) -> Result<()> {
        if edge.rid().is_some() {
            return Ok(());
        }
        self.persist_edge(edge)
    }

    fn persist_edge(&mut self, edge: &Edge) -> Result<()> {
        let statement = Create::edge(edge).parse()?;
        let result = self.execute_raw(&statement, CommandClass::NonIdempotent)?;
        let (rid, version) = result.first_rid().ok_or_else(|| {
            Error::Serialization("no cluster information in create response".into())
        })?;
        edge.set_rid(rid);
        if let Some(version) = version {
            edge.set_version(version);
        }
        self.cache.insert(rid, Entity::Edge(edge.clone()));
        tracing::debug!(%rid, class = %edge.class_name(), "edge persisted");
        Ok(())
    }

    /// Runs a select and materializes the result graph. Returns the
    /// entities of the selected class; everything else decoded stays
    /// reachable through the rid cache.
    pub fn fetch(&mut self, select: &Select) -> Result<Vec<Entity>> {
        let result = self.execute(select, CommandClass::Idempotent)?;
        let indexed = self.assemble(&result.records);
        for (rid, entity) in &indexed {
            self.cache.insert(*rid, entity.clone());
        }
        Ok(indexed
            .into_values()
            .filter(|entity| entity.class_name() == select.class_name())
            .collect())
    }

    /// Runs a traverse and materializes every returned entity.
    pub fn traverse(&mut self, traverse: &Traverse) -> Result<Vec<Entity>> {
        let result = self.execute(traverse, CommandClass::Idempotent)?;
        let indexed = self.assemble(&result.records);
        for (rid, entity) in &indexed {
            self.cache.insert(*rid, entity.clone());
        }
        Ok(indexed.into_values().collect())
    }

    fn assemble(&self, records: &[RawRecord]) -> BTreeMap<Rid, Entity> {
        let schema = self.schema.read();
        assemble_records(&self.registry, &schema, self.serialization, records)
    }

    /// DB_CLOSE and socket shutdown.
    pub fn close(&mut self) -> Result<()> {
        self.db.db_close()
    }
}

/// Decodes, indexes and cross-links a batch of raw records.
///
/// Records that fail to decode are logged and skipped; the surrounding
/// result set survives. Edge placeholders parsed from reference bags are
/// resolved against the index: an outgoing placeholder gets the entity at
/// its rid as `out_vertex`, an incoming one as `in_vertex`. Full edge
/// records resolve their `in`/`out` link fields the same way.
pub fn assemble_records(
    registry: &EntityRegistry,
    schema: &Schema,
    serialization: Serialization,
    records: &[RawRecord],
) -> BTreeMap<Rid, Entity> {
    let mut indexed = BTreeMap::new();
    for record in records {
        let Some(rid) = record.rid else { continue };
        let Some(content) = record.content.as_deref() else {
            continue;
        };
        let decoded: Result<Record> = match serialization {
            Serialization::Csv => CsvSerializer::decode(content),
            Serialization::Binary => BinarySerializer::new(schema).decode(content),
        };
        match decoded.and_then(|r| materialize(r, registry)) {
            Ok(entity) => {
                entity.set_rid(rid);
                if let Some(version) = record.version {
                    entity.set_version(version);
                }
                indexed.insert(rid, entity);
            }
            Err(err) => {
                tracing::warn!(%rid, error = %err, "skipping undecodable record");
            }
        }
    }
    resolve_links(&indexed);
    indexed
}

fn resolve_links(indexed: &BTreeMap<Rid, Entity>) {
    for entity in indexed.values() {
        match entity {
            Entity::Vertex(vertex) => {
                for edges in vertex.out_edges().into_values() {
                    for edge in edges {
                        if let Some(tmp) = edge.tmp_rid() {
                            if let Some(Entity::Vertex(target)) = indexed.get(&tmp) {
                                edge.set_out_vertex(target.clone());
                            }
                        }
                    }
                }
                for edges in vertex.in_edges().into_values() {
                    for edge in edges {
                        if let Some(tmp) = edge.tmp_rid() {
                            if let Some(Entity::Vertex(source)) = indexed.get(&tmp) {
                                edge.set_in_vertex(source.clone());
                            }
                        }
                    }
                }
            }
            Entity::Edge(edge) => {
                if let Some(FieldValue::Link(rid)) = edge.field("in") {
                    if let Some(Entity::Vertex(vertex)) = indexed.get(&rid) {
                        edge.set_in_vertex(vertex.clone());
                    }
                }
                if let Some(FieldValue::Link(rid)) = edge.field("out") {
                    if let Some(Entity::Vertex(vertex)) = indexed.get(&rid) {
                        edge.set_out_vertex(vertex.clone());
                    }
                }
            }
        }
    }
}
