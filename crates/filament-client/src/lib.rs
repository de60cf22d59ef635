//! Filament client — synchronous driver for the binary graph protocol.
//!
//! Layering, bottom up: [`conn`] owns the socket, the session and the
//! connection state machine; [`db`] exposes one blocking call per server
//! opcode; [`query`] builds canonical query strings from typed statement
//! objects; [`client`] ties it together with the entity registry, the
//! global-property schema and the object-graph materializer.

pub mod client;
pub mod config;
pub mod conn;
pub mod db;
pub mod query;

pub use client::Client;
pub use config::{DriverConfig, ReceiveConfig, Serialization};
pub use conn::{ConnState, Connection};
pub use db::{Cluster, CommandResult, Database, DbOpenResult, RawRecord};
pub use filament_wire::{Error, Result};
