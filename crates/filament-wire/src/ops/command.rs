//! COMMAND — query and script execution.
//!
//! The request nests a serialized command payload behind a length field;
//! the response shape depends on the mode byte and, for synchronous
//! commands, on the single result-type byte that follows the header.

use std::sync::LazyLock;

use super::{Opcode, Operation, parse_static, read_record};
use crate::codec::{Reader, Writer};
use crate::error::Result;
use crate::exec::{self, Value, ValueMap};
use crate::profile::Profile;

/// Command class sent as the payload class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    /// `q` — idempotent query (SELECT, TRAVERSE).
    Idempotent,
    /// `c` — non-idempotent command (INSERT, UPDATE, CREATE ...).
    NonIdempotent,
    /// `s` — server-side script.
    Script,
}

impl CommandClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idempotent => "q",
            Self::NonIdempotent => "c",
            Self::Script => "s",
        }
    }
}

/// Dispatch mode, one byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandMode {
    #[default]
    Sync,
    Async,
}

impl CommandMode {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Sync => b's',
            Self::Async => b'a',
        }
    }
}

static SQL_PROFILE: LazyLock<Profile> = LazyLock::new(|| {
    parse_static("(text:string)(non-text-limit:int)(fetchplan:string)(serialized-params:bytes)")
});
static SCRIPT_PROFILE: LazyLock<Profile> = LazyLock::new(|| {
    parse_static(
        "(language:string)(text:string)(non-text-limit:int)(fetchplan:string)\
         (serialized-params:bytes)",
    )
});

/// The serialized command carried inside the payload length.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandPayload {
    Sql {
        text: String,
        non_text_limit: i32,
        fetch_plan: String,
        serialized_params: Vec<u8>,
    },
    Script {
        language: String,
        text: String,
        non_text_limit: i32,
        fetch_plan: String,
        serialized_params: Vec<u8>,
    },
}

impl CommandPayload {
    /// A plain SQL command with the default limit and fetch plan.
    pub fn sql(text: impl Into<String>) -> Self {
        Self::Sql {
            text: text.into(),
            non_text_limit: -1,
            fetch_plan: "*:-1".into(),
            serialized_params: Vec::new(),
        }
    }

    fn profile(&self) -> &'static Profile {
        match self {
            Self::Sql { .. } => &SQL_PROFILE,
            Self::Script { .. } => &SCRIPT_PROFILE,
        }
    }

    fn args(&self) -> ValueMap {
        let mut map = ValueMap::new();
        match self {
            Self::Sql {
                text,
                non_text_limit,
                fetch_plan,
                serialized_params,
            } => {
                map.insert("text".into(), Value::from(text.clone()));
                map.insert("non-text-limit".into(), Value::Int(*non_text_limit));
                map.insert("fetchplan".into(), Value::from(fetch_plan.clone()));
                map.insert(
                    "serialized-params".into(),
                    Value::Bytes(serialized_params.clone()),
                );
            }
            Self::Script {
                language,
                text,
                non_text_limit,
                fetch_plan,
                serialized_params,
            } => {
                map.insert("language".into(), Value::from(language.clone()));
                map.insert("text".into(), Value::from(text.clone()));
                map.insert("non-text-limit".into(), Value::Int(*non_text_limit));
                map.insert("fetchplan".into(), Value::from(fetch_plan.clone()));
                map.insert(
                    "serialized-params".into(),
                    Value::Bytes(serialized_params.clone()),
                );
            }
        }
        map
    }
}

static COMMAND_REQ: LazyLock<Profile> =
    LazyLock::new(|| parse_static("(mode:byte)(command-payload-length:int)(class-name:string)"));
static COMMAND_RES_SYNC: LazyLock<Profile> = LazyLock::new(|| {
    parse_static(
        "[(synch-result-type:byte)\
         [{records}(pre-fetched-record-size:byte)(synch-result-content:record)]]+",
    )
});

/// One COMMAND invocation. The payload and mode fix both the request
/// encoding and the response decoder.
pub struct Command {
    pub class: CommandClass,
    pub mode: CommandMode,
    pub payload: CommandPayload,
    pub protocol_version: i16,
}

impl Command {
    pub fn sync(class: CommandClass, payload: CommandPayload, protocol_version: i16) -> Self {
        Self {
            class,
            mode: CommandMode::Sync,
            payload,
            protocol_version,
        }
    }
}

impl Operation for Command {
    fn opcode(&self) -> Opcode {
        Opcode::Command
    }

    fn request_profile(&self) -> &Profile {
        &COMMAND_REQ
    }

    fn response_profile(&self) -> &Profile {
        &COMMAND_RES_SYNC
    }

    /// The payload length covers the class name and the serialized
    /// command, so the payload is assembled first and framed after.
    fn encode_request(&self, _args: &ValueMap) -> Result<Vec<u8>> {
        let mut payload = Writer::new();
        payload.write_string(self.class.as_str());
        exec::encode_into(self.payload.profile(), &self.payload.args(), &mut payload)?;

        let mut out = Writer::new();
        out.write_u8(self.mode.as_byte());
        out.write_i32(payload.len() as i32);
        out.write_raw(payload.as_bytes());
        Ok(out.into_bytes())
    }

    fn decode_body(&self, reader: &mut Reader<'_>) -> Result<ValueMap> {
        match self.mode {
            CommandMode::Sync => decode_sync(reader, self.protocol_version),
            CommandMode::Async => decode_async(reader),
        }
    }
}

fn decode_sync(reader: &mut Reader<'_>, protocol_version: i16) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    let result_type = reader.read_i8()?;
    out.insert("synch-result-type".into(), Value::Byte(result_type));

    let mut records = Vec::new();
    match result_type as u8 {
        b'n' => {}
        b'r' => records.push(read_record(reader)?),
        b'l' => {
            let count = reader.read_i32()?;
            out.insert("count".into(), Value::Int(count));
            for _ in 0..count {
                records.push(read_record(reader)?);
            }
        }
        b'a' => {
            // serialized result, transported opaquely
            if let Some(bytes) = reader.read_bytes()? {
                out.insert("serialized-result".into(), Value::Bytes(bytes));
            }
        }
        _ if protocol_version > 17 => {
            // supplementary records gated by a status byte
            let mut status = result_type;
            while status > 0 {
                records.push(read_record(reader)?);
                if reader.remaining() == 0 {
                    break;
                }
                status = reader.read_i8()?;
            }
        }
        other => {
            tracing::debug!(result_type = other, "unhandled synchronous result type");
        }
    }
    out.insert("records".into(), Value::List(records));
    Ok(out)
}

fn decode_async(reader: &mut Reader<'_>) -> Result<ValueMap> {
    let mut records = Vec::new();
    while reader.remaining() > 0 {
        let status = reader.read_i8()?;
        if status == 0 {
            break;
        }
        // 1 is a result record, 2 a pre-fetched record for the cache
        records.push(read_record(reader)?);
    }
    let mut out = ValueMap::new();
    out.insert("records".into(), Value::List(records));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::decode_response;

    #[test]
    fn request_frames_payload_behind_length() {
        let op = Command::sync(
            CommandClass::Idempotent,
            CommandPayload::sql("select from City  where name = 'Berlin' "),
            35,
        );
        let bytes = op.encode_request(&ValueMap::new()).unwrap();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), b's');
        let payload_len = r.read_i32().unwrap();
        assert_eq!(payload_len as usize, r.remaining());
        assert_eq!(r.read_string().unwrap().as_deref(), Some("q"));
        assert_eq!(
            r.read_string().unwrap().as_deref(),
            Some("select from City  where name = 'Berlin' ")
        );
        assert_eq!(r.read_i32().unwrap(), -1);
        assert_eq!(r.read_string().unwrap().as_deref(), Some("*:-1"));
        assert_eq!(r.read_bytes().unwrap(), Some(Vec::new()));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn sync_list_result_decodes_each_record() {
        let mut w = Writer::new();
        w.write_i8(0);
        w.write_i32(7);
        w.write_u8(b'l');
        w.write_i32(1);
        w.write_i16(0);
        w.write_u8(b'd');
        w.write_i16(11);
        w.write_i64(0);
        w.write_i32(1);
        w.write_bytes(Some(b"City@name:\"Berlin\""));
        let bytes = w.into_bytes();

        let op = Command::sync(CommandClass::Idempotent, CommandPayload::sql("select"), 35);
        let map = decode_response(&op, &bytes, false).unwrap();
        assert_eq!(map["synch-result-type"], Value::Byte(b'l' as i8));
        assert_eq!(map["count"], Value::Int(1));
        let records = map["records"].as_list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["cluster-id"], Value::Short(11));
        assert_eq!(
            records[0]["record-content"],
            Value::Bytes(b"City@name:\"Berlin\"".to_vec())
        );
    }

    #[test]
    fn sync_null_result_is_empty() {
        let mut w = Writer::new();
        w.write_i8(0);
        w.write_i32(7);
        w.write_u8(b'n');
        let bytes = w.into_bytes();

        let op = Command::sync(CommandClass::NonIdempotent, CommandPayload::sql("x"), 35);
        let map = decode_response(&op, &bytes, false).unwrap();
        assert!(map["records"].as_list().unwrap().is_empty());
    }

    #[test]
    fn sync_single_record_result() {
        let mut w = Writer::new();
        w.write_i8(0);
        w.write_i32(7);
        w.write_u8(b'r');
        w.write_i16(crate::ops::RECORD_KIND_RID);
        w.write_i16(9);
        w.write_i64(0);
        let bytes = w.into_bytes();

        let op = Command::sync(CommandClass::NonIdempotent, CommandPayload::sql("x"), 35);
        let map = decode_response(&op, &bytes, false).unwrap();
        let records = map["records"].as_list().unwrap();
        assert_eq!(records[0]["cluster-id"], Value::Short(9));
        assert_eq!(records[0]["cluster-position"], Value::Long(0));
    }

    #[test]
    fn script_payload_carries_language() {
        let op = Command::sync(
            CommandClass::Script,
            CommandPayload::Script {
                language: "sql".into(),
                text: "begin".into(),
                non_text_limit: -1,
                fetch_plan: String::new(),
                serialized_params: Vec::new(),
            },
            35,
        );
        let bytes = op.encode_request(&ValueMap::new()).unwrap();
        let mut r = Reader::new(&bytes);
        r.read_u8().unwrap();
        r.read_i32().unwrap();
        assert_eq!(r.read_string().unwrap().as_deref(), Some("s"));
        assert_eq!(r.read_string().unwrap().as_deref(), Some("sql"));
        assert_eq!(r.read_string().unwrap().as_deref(), Some("begin"));
    }
}
