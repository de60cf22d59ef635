//! Filament wire layer — binary codec, profile grammar and operation catalog.
//!
//! The server speaks a length-framed, big-endian binary protocol. Every
//! request and response is described by a small textual "profile" (see
//! [`profile`]); the executor in [`exec`] walks a parsed profile against raw
//! bytes or an argument map, and [`ops`] holds one descriptor per server
//! opcode, including the custom decoders for the responses whose shape the
//! grammar cannot express.

pub mod codec;
pub mod error;
pub mod exec;
pub mod ops;
pub mod profile;
pub mod varint;

pub use codec::{Reader, Writer};
pub use error::{Error, Result, ServerException};
pub use exec::{Value, ValueMap};
pub use ops::{Opcode, Operation};
pub use profile::Profile;
