//! Record-level operations and the reference-bag size query.

use std::sync::LazyLock;

use super::{Opcode, Operation, parse_static};
use crate::codec::Reader;
use crate::error::Result;
use crate::exec::{Value, ValueMap};
use crate::profile::Profile;

/// RECORD_LOAD fetches a record by rid. The response is a payload block:
/// a status byte, and when non-zero, the record content, version and type.
/// The block nominally repeats, but servers send it at most once, so the
/// decoder reads at most one.
pub struct RecordLoad;

static RECORD_LOAD_REQ: LazyLock<Profile> = LazyLock::new(|| {
    parse_static(
        "(cluster-id:short)(cluster-position:long)(fetch-plan:string)\
         (ignore-cache:byte)(load-tombstones:byte)",
    )
});
static RECORD_LOAD_RES: LazyLock<Profile> = LazyLock::new(|| {
    parse_static(
        "[{payload}(payload-status:byte)\
         [{records}(record-content:bytes)(record-version:int)(record-type:byte)]*]+",
    )
});

impl Operation for RecordLoad {
    fn opcode(&self) -> Opcode {
        Opcode::RecordLoad
    }

    fn request_profile(&self) -> &Profile {
        &RECORD_LOAD_REQ
    }

    fn response_profile(&self) -> &Profile {
        &RECORD_LOAD_RES
    }

    fn decode_body(&self, reader: &mut Reader<'_>) -> Result<ValueMap> {
        let mut out = ValueMap::new();
        let status = reader.read_i8()?;
        out.insert("payload-status".into(), Value::Byte(status));

        let mut records = Vec::new();
        if status != 0 {
            let mut record = ValueMap::new();
            let content = match reader.read_bytes()? {
                Some(bytes) => Value::Bytes(bytes),
                None => Value::Null,
            };
            record.insert("record-content".into(), content);
            record.insert("record-version".into(), Value::Int(reader.read_i32()?));
            record.insert("record-type".into(), Value::Byte(reader.read_i8()?));
            records.push(record);
        }
        out.insert("records".into(), Value::List(records));
        Ok(out)
    }
}

/// RECORD_CREATE appends a record to a cluster (-1 lets the server pick).
pub struct RecordCreate;

static RECORD_CREATE_REQ: LazyLock<Profile> = LazyLock::new(|| {
    parse_static("(cluster-id:short)(record-content:bytes)(record-type:byte)(mode:byte)")
});
static RECORD_CREATE_RES: LazyLock<Profile> = LazyLock::new(|| {
    parse_static(
        "(cluster-position:long)(record-version:int)(count-of-collection-changes:int)\
         [{changes}(uuid-most-sig-bits:long)(uuid-least-sig-bits:long)(updated-file-id:long)\
         (updated-page-index:long)(updated-page-offset:int)]*",
    )
});

impl Operation for RecordCreate {
    fn opcode(&self) -> Opcode {
        Opcode::RecordCreate
    }

    fn request_profile(&self) -> &Profile {
        &RECORD_CREATE_REQ
    }

    fn response_profile(&self) -> &Profile {
        &RECORD_CREATE_RES
    }
}

/// RECORD_UPDATE rewrites a record under optimistic versioning.
pub struct RecordUpdate;

static RECORD_UPDATE_REQ: LazyLock<Profile> = LazyLock::new(|| {
    parse_static(
        "(cluster-id:short)(cluster-position:long)(update-content:boolean)\
         (record-content:bytes)(record-version:int)(record-type:byte)(mode:byte)",
    )
});
static RECORD_UPDATE_RES: LazyLock<Profile> = LazyLock::new(|| {
    parse_static(
        "(record-version:int)(count-of-collection-changes:int)\
         [{changes}(uuid-most-sig-bits:long)(uuid-least-sig-bits:long)(updated-file-id:long)\
         (updated-page-index:long)(updated-page-offset:int)]*",
    )
});

impl Operation for RecordUpdate {
    fn opcode(&self) -> Opcode {
        Opcode::RecordUpdate
    }

    fn request_profile(&self) -> &Profile {
        &RECORD_UPDATE_REQ
    }

    fn response_profile(&self) -> &Profile {
        &RECORD_UPDATE_RES
    }
}

/// RECORD_DELETE removes a record; the payload status tells whether the
/// record existed.
pub struct RecordDelete;

static RECORD_DELETE_REQ: LazyLock<Profile> = LazyLock::new(|| {
    parse_static("(cluster-id:short)(cluster-position:long)(record-version:int)(mode:byte)")
});
static RECORD_DELETE_RES: LazyLock<Profile> =
    LazyLock::new(|| parse_static("(payload-status:byte)"));

impl Operation for RecordDelete {
    fn opcode(&self) -> Opcode {
        Opcode::RecordDelete
    }

    fn request_profile(&self) -> &Profile {
        &RECORD_DELETE_REQ
    }

    fn response_profile(&self) -> &Profile {
        &RECORD_DELETE_RES
    }
}

/// RIDBAG_GET_SIZE asks for the size of a tree-resident reference bag,
/// identified by its collection pointer plus a serialized change-set.
pub struct RidbagSize;

static RIDBAG_SIZE_REQ: LazyLock<Profile> = LazyLock::new(|| {
    parse_static("(file-id:long)(page-index:long)(page-offset:int)(changes:bytes)")
});
static RIDBAG_SIZE_RES: LazyLock<Profile> = LazyLock::new(|| parse_static("(size:int)"));

impl Operation for RidbagSize {
    fn opcode(&self) -> Opcode {
        Opcode::RidbagGetSize
    }

    fn request_profile(&self) -> &Profile {
        &RIDBAG_SIZE_REQ
    }

    fn response_profile(&self) -> &Profile {
        &RIDBAG_SIZE_RES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Writer;
    use crate::ops::decode_response;

    #[test]
    fn record_load_reads_at_most_one_payload_block() {
        let mut w = Writer::new();
        w.write_i8(0);
        w.write_i32(7);
        w.write_i8(1);
        w.write_bytes(Some(b"City@name:\"Berlin\""));
        w.write_i32(3);
        w.write_i8(b'd' as i8);
        w.write_i8(0); // end-of-payload marker, left unread by design
        let bytes = w.into_bytes();

        let map = decode_response(&RecordLoad, &bytes, false).unwrap();
        let records = map["records"].as_list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["record-version"], Value::Int(3));
    }

    #[test]
    fn record_load_miss_yields_no_records() {
        let mut w = Writer::new();
        w.write_i8(0);
        w.write_i32(7);
        w.write_i8(0);
        let bytes = w.into_bytes();

        let map = decode_response(&RecordLoad, &bytes, false).unwrap();
        assert!(map["records"].as_list().unwrap().is_empty());
    }

    #[test]
    fn record_create_decodes_position_and_version() {
        let mut w = Writer::new();
        w.write_i8(0);
        w.write_i32(7);
        w.write_i64(12);
        w.write_i32(1);
        w.write_i32(0);
        let bytes = w.into_bytes();

        let map = decode_response(&RecordCreate, &bytes, false).unwrap();
        assert_eq!(map["cluster-position"], Value::Long(12));
        assert_eq!(map["record-version"], Value::Int(1));
        assert!(map["changes"].as_list().unwrap().is_empty());
    }

    #[test]
    fn record_update_decodes_collection_changes() {
        let mut w = Writer::new();
        w.write_i8(0);
        w.write_i32(7);
        w.write_i32(4);
        w.write_i32(1);
        w.write_i64(1);
        w.write_i64(2);
        w.write_i64(3);
        w.write_i64(4);
        w.write_i32(5);
        let bytes = w.into_bytes();

        let map = decode_response(&RecordUpdate, &bytes, false).unwrap();
        assert_eq!(map["record-version"], Value::Int(4));
        let changes = map["changes"].as_list().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["updated-page-offset"], Value::Int(5));
    }
}
