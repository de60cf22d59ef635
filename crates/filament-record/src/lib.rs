//! Filament record layer — serializers and the entity model.
//!
//! Records arrive from the server in one of two encodings: a textual
//! CSV-like form ([`csv`]) and a positional binary form ([`binary`]).
//! Both decode into a [`Record`] of typed field values, which
//! [`entity::materialize`] turns into vertex/edge handles, routing
//! `out_*`/`in_*` reference bags into the edge maps.

pub mod binary;
pub mod csv;
pub mod entity;
pub mod ridbag;
pub mod schema;
pub mod types;

pub use entity::{Edge, Entity, EntityKind, EntityRegistry, Vertex, materialize};
pub use ridbag::{BagPointer, ReferenceBag};
pub use schema::{GlobalProperty, Schema, SharedSchema};
pub use types::{BinaryType, FieldValue, Record, Rid};
