//! Operation catalog.
//!
//! One descriptor per server opcode. Each carries the opcode byte, a
//! request profile and a response profile; operations whose response shape
//! the grammar cannot express override [`Operation::decode_body`].
//!
//! Every response starts with the shared header `(success:byte)
//! (session:int32)`, plus `(token:bytes)` when token auth is active and the
//! operation is neither CONNECT nor DB_OPEN. A success byte of 1 aborts
//! normal decoding: the remainder of the buffer is handed to the error
//! decoder and surfaced as [`Error::NotConnected`].

mod command;
mod config;
mod db;
mod record;
mod session;
mod tx;

pub use command::{Command, CommandClass, CommandMode, CommandPayload};
pub use config::{ConfigGet, ConfigList, ConfigSet};
pub use db::{
    DbClose, DbCountRecords, DbCreate, DbDrop, DbExist, DbList, DbOpen, DbReload, DbSize,
};
pub use record::{RecordCreate, RecordDelete, RecordLoad, RecordUpdate, RidbagSize};
pub use session::{Connect, Shutdown};
pub use tx::{TxCommit, TxEntry};

use crate::codec::Reader;
use crate::error::{Error, Result, ServerException};
use crate::exec::{self, Value, ValueMap};
use crate::profile::Profile;

/// Server opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum Opcode {
    Shutdown = 1,
    Connect = 2,
    DbOpen = 3,
    DbCreate = 4,
    DbClose = 5,
    DbExist = 6,
    DbDrop = 7,
    DbSize = 8,
    DbCountRecords = 9,
    RecordLoad = 30,
    RecordCreate = 31,
    RecordUpdate = 32,
    RecordDelete = 33,
    Command = 41,
    TxCommit = 60,
    ConfigGet = 70,
    ConfigSet = 71,
    ConfigList = 72,
    DbReload = 73,
    DbList = 74,
    RidbagGetSize = 114,
}

impl Opcode {
    pub fn as_i8(self) -> i8 {
        self as i8
    }

    /// Whether the frame for this opcode carries the session token. The
    /// handshake operations establish the token, so they never echo it.
    pub fn echoes_token(self) -> bool {
        !matches!(self, Opcode::Connect | Opcode::DbOpen)
    }
}

/// Record type discriminator carried by record operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordType {
    RawBytes,
    Flat,
    #[default]
    Document,
}

impl RecordType {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::RawBytes => b'b',
            Self::Flat => b'f',
            Self::Document => b'd',
        }
    }
}

/// Synchronous/asynchronous dispatch mode for record operations (0/1 on
/// the wire, unlike the COMMAND mode character).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Synchronous,
    Asynchronous,
}

impl Mode {
    pub fn as_i8(self) -> i8 {
        match self {
            Self::Synchronous => 0,
            Self::Asynchronous => 1,
        }
    }
}

/// Record kind discriminator preceding every record in a response.
pub const RECORD_KIND_NULL: i16 = -2;
/// Record kind for a bare rid.
pub const RECORD_KIND_RID: i16 = -3;

/// One server operation: opcode plus request/response shapes.
pub trait Operation {
    fn opcode(&self) -> Opcode;

    fn request_profile(&self) -> &Profile;

    fn response_profile(&self) -> &Profile;

    /// DB_CLOSE is fire-and-forget; everything else reads a response.
    fn expects_response(&self) -> bool {
        true
    }

    fn encode_request(&self, args: &ValueMap) -> Result<Vec<u8>> {
        exec::encode(self.request_profile(), args)
    }

    /// Decodes the response body after the shared header.
    fn decode_body(&self, reader: &mut Reader<'_>) -> Result<ValueMap> {
        exec::decode(self.response_profile(), reader)
    }
}

/// Parses one of the built-in profile constants.
pub(crate) fn parse_static(src: &str) -> Profile {
    Profile::parse(src).expect("built-in profile must parse")
}

/// Decodes a full response frame: shared header, error branch, token echo,
/// then the operation body. The header session id lands under
/// `session-id`; handshake bodies overwrite it with the fresh one.
pub fn decode_response(
    op: &dyn Operation,
    data: &[u8],
    token_in_header: bool,
) -> Result<ValueMap> {
    let mut reader = Reader::new(data);
    let success = reader.read_i8()?;
    let session = reader.read_i32()?;

    if success == 1 {
        let exceptions = decode_error_payload(&mut reader)?;
        tracing::debug!(count = exceptions.len(), "server reported an error");
        return Err(Error::NotConnected {
            message: "server reported an error".into(),
            exceptions,
        });
    }

    let mut out = ValueMap::new();
    out.insert("session-id".into(), Value::Int(session));

    if token_in_header {
        match reader.read_bytes()? {
            Some(token) => {
                out.insert("token".into(), Value::Bytes(token));
            }
            None => {
                out.insert("token".into(), Value::Null);
            }
        }
    }

    let body = op.decode_body(&mut reader)?;
    out.extend(body);
    Ok(out)
}

/// Decodes the error payload: repeated `(1)(class)(message)` tuples
/// terminated by a zero byte, optionally followed by a serialized
/// exception blob which is left opaque.
pub fn decode_error_payload(reader: &mut Reader<'_>) -> Result<Vec<ServerException>> {
    let mut exceptions = Vec::new();
    while reader.remaining() > 0 && reader.peek_i8()? == 1 {
        reader.read_i8()?;
        let class = reader.read_string()?.unwrap_or_default();
        let message = reader.read_string()?.unwrap_or_default();
        exceptions.push(ServerException { class, message });
    }
    if reader.remaining() > 0 && reader.peek_i8()? == 0 {
        reader.read_i8()?;
    }
    if reader.remaining() >= 4 {
        // serialized server-side exception; transported, never parsed
        let _ = reader.read_bytes()?;
    }
    Ok(exceptions)
}

/// Reads one record preceded by its kind discriminator: -2 null, -3 a bare
/// rid, anything else a full record.
pub fn read_record(reader: &mut Reader<'_>) -> Result<ValueMap> {
    let kind = reader.read_i16()?;
    let mut map = ValueMap::new();
    map.insert("record-kind".into(), Value::Short(kind));
    match kind {
        RECORD_KIND_NULL => {}
        RECORD_KIND_RID => {
            map.insert("cluster-id".into(), Value::Short(reader.read_i16()?));
            map.insert("cluster-position".into(), Value::Long(reader.read_i64()?));
        }
        _ => {
            map.insert("record-type".into(), Value::Byte(reader.read_i8()?));
            map.insert("cluster-id".into(), Value::Short(reader.read_i16()?));
            map.insert("cluster-position".into(), Value::Long(reader.read_i64()?));
            map.insert("record-version".into(), Value::Int(reader.read_i32()?));
            let content = match reader.read_bytes()? {
                Some(bytes) => Value::Bytes(bytes),
                None => Value::Null,
            };
            map.insert("record-content".into(), content);
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Writer;

    #[test]
    fn error_payload_with_one_exception() {
        let mut w = Writer::new();
        w.write_i8(1);
        w.write_i32(42);
        w.write_i8(1);
        w.write_string("ClassX");
        w.write_string("msg");
        w.write_i8(0);
        let bytes = w.into_bytes();

        let err = decode_response(&DbSize, &bytes, false).unwrap_err();
        let exceptions = err.exceptions();
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].class, "ClassX");
        assert_eq!(exceptions[0].message, "msg");
    }

    #[test]
    fn error_payload_with_two_exceptions() {
        let mut w = Writer::new();
        w.write_i8(1);
        w.write_i32(42);
        w.write_i8(1);
        w.write_string("ClassX");
        w.write_string("msg");
        w.write_i8(1);
        w.write_string("ClassY");
        w.write_string("caused by");
        w.write_i8(0);
        let bytes = w.into_bytes();

        let err = decode_response(&DbSize, &bytes, false).unwrap_err();
        let exceptions = err.exceptions();
        assert_eq!(exceptions.len(), 2);
        assert_eq!(exceptions[1].class, "ClassY");
        assert_eq!(exceptions[1].message, "caused by");
    }

    #[test]
    fn error_payload_ignores_serialized_blob() {
        let mut w = Writer::new();
        w.write_i8(1);
        w.write_i32(-1);
        w.write_i8(1);
        w.write_string("C");
        w.write_string("m");
        w.write_i8(0);
        w.write_bytes(Some(&[0xde, 0xad]));
        let bytes = w.into_bytes();

        let err = decode_response(&DbSize, &bytes, false).unwrap_err();
        assert_eq!(err.exceptions().len(), 1);
    }

    #[test]
    fn token_in_header_is_decoded() {
        let mut w = Writer::new();
        w.write_i8(0);
        w.write_i32(42);
        w.write_bytes(Some(&[9u8; 16]));
        w.write_i64(1024);
        let bytes = w.into_bytes();

        let map = decode_response(&DbSize, &bytes, true).unwrap();
        assert_eq!(map["token"], Value::Bytes(vec![9u8; 16]));
        assert_eq!(map["size"], Value::Long(1024));
    }

    #[test]
    fn read_record_kinds() {
        let mut w = Writer::new();
        w.write_i16(RECORD_KIND_NULL);
        w.write_i16(RECORD_KIND_RID);
        w.write_i16(9);
        w.write_i64(7);
        w.write_i16(0);
        w.write_u8(b'd');
        w.write_i16(10);
        w.write_i64(3);
        w.write_i32(2);
        w.write_bytes(Some(b"City@name:\"Berlin\""));
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);

        let null = read_record(&mut r).unwrap();
        assert_eq!(null["record-kind"], Value::Short(RECORD_KIND_NULL));

        let rid = read_record(&mut r).unwrap();
        assert_eq!(rid["cluster-id"], Value::Short(9));
        assert_eq!(rid["cluster-position"], Value::Long(7));

        let full = read_record(&mut r).unwrap();
        assert_eq!(full["record-type"], Value::Byte(b'd' as i8));
        assert_eq!(full["record-version"], Value::Int(2));
        assert_eq!(
            full["record-content"],
            Value::Bytes(b"City@name:\"Berlin\"".to_vec())
        );
        assert_eq!(r.remaining(), 0);
    }
}
