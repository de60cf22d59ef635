//! TX_COMMIT — batched create/update/delete entries in one transaction.
//!
//! The request interleaves a fixed head with one sub-profile per entry;
//! the entry shapes alternate by operation, so the encoding is assembled
//! directly rather than through a single profile string.

use std::sync::LazyLock;

use super::{Opcode, Operation, RecordType, parse_static};
use crate::codec::Writer;
use crate::error::Result;
use crate::exec::ValueMap;
use crate::profile::Profile;

/// One transaction entry. Records created inside the transaction use a
/// temporary rid: cluster -1 and a negative, transaction-local position.
#[derive(Debug, Clone, PartialEq)]
pub enum TxEntry {
    Create {
        record_type: RecordType,
        /// Transaction-local cluster position, below -1.
        record_id: i64,
        content: Vec<u8>,
    },
    Update {
        record_type: RecordType,
        cluster_id: i16,
        cluster_position: i64,
        version: i32,
        content: Vec<u8>,
    },
    Delete {
        record_type: RecordType,
        cluster_id: i16,
        cluster_position: i64,
        version: i32,
    },
}

impl TxEntry {
    fn operation_byte(&self) -> i8 {
        match self {
            Self::Update { .. } => 1,
            Self::Delete { .. } => 2,
            Self::Create { .. } => 3,
        }
    }

    fn encode(&self, w: &mut Writer) {
        // shared entry head: begin marker, operation, rid, record type
        w.write_i8(1);
        w.write_i8(self.operation_byte());
        match self {
            Self::Create {
                record_type,
                record_id,
                content,
            } => {
                w.write_i16(-1);
                w.write_i64(*record_id);
                w.write_u8(record_type.as_byte());
                w.write_bytes(Some(content));
            }
            Self::Update {
                record_type,
                cluster_id,
                cluster_position,
                version,
                content,
            } => {
                w.write_i16(*cluster_id);
                w.write_i64(*cluster_position);
                w.write_u8(record_type.as_byte());
                w.write_i32(*version);
                w.write_bytes(Some(content));
            }
            Self::Delete {
                record_type,
                cluster_id,
                cluster_position,
                version,
            } => {
                w.write_i16(*cluster_id);
                w.write_i64(*cluster_position);
                w.write_u8(record_type.as_byte());
                w.write_i32(*version);
            }
        }
    }
}

static TX_COMMIT_REQ: LazyLock<Profile> =
    LazyLock::new(|| parse_static("(tx-id:int)(using-tx-log:boolean)"));
static TX_COMMIT_RES: LazyLock<Profile> = LazyLock::new(|| {
    parse_static(
        "(created-record-count:int)[{created}(client-specified-cluster-id:short)\
         (client-specified-cluster-position:long)(created-cluster-id:short)\
         (created-cluster-position:long)]*\
         (updated-record-count:int)[{updated}(updated-cluster-id:short)\
         (updated-cluster-position:long)(new-record-version:int)]*\
         (count-of-collection-changes:int)[{changes}(uuid-most-sig-bits:long)\
         (uuid-least-sig-bits:long)(updated-file-id:long)(updated-page-index:long)\
         (updated-page-offset:int)]*",
    )
});

pub struct TxCommit {
    pub tx_id: i32,
    pub using_log: bool,
    pub entries: Vec<TxEntry>,
}

impl Operation for TxCommit {
    fn opcode(&self) -> Opcode {
        Opcode::TxCommit
    }

    fn request_profile(&self) -> &Profile {
        &TX_COMMIT_REQ
    }

    fn response_profile(&self) -> &Profile {
        &TX_COMMIT_RES
    }

    fn encode_request(&self, _args: &ValueMap) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        w.write_i32(self.tx_id);
        w.write_bool(self.using_log);
        for entry in &self.entries {
            entry.encode(&mut w);
        }
        w.write_i8(0);
        // remote index changes, unused by this driver
        w.write_string("");
        Ok(w.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Reader, Writer};
    use crate::exec::Value;
    use crate::ops::decode_response;

    #[test]
    fn request_interleaves_entries_between_head_and_tail() {
        let op = TxCommit {
            tx_id: 5,
            using_log: true,
            entries: vec![
                TxEntry::Create {
                    record_type: RecordType::Document,
                    record_id: -2,
                    content: b"V@".to_vec(),
                },
                TxEntry::Delete {
                    record_type: RecordType::Document,
                    cluster_id: 9,
                    cluster_position: 3,
                    version: 1,
                },
            ],
        };
        let bytes = op.encode_request(&ValueMap::new()).unwrap();
        let mut r = Reader::new(&bytes);

        assert_eq!(r.read_i32().unwrap(), 5);
        assert!(r.read_bool().unwrap());

        assert_eq!(r.read_i8().unwrap(), 1);
        assert_eq!(r.read_i8().unwrap(), 3);
        assert_eq!(r.read_i16().unwrap(), -1);
        assert_eq!(r.read_i64().unwrap(), -2);
        assert_eq!(r.read_u8().unwrap(), b'd');
        assert_eq!(r.read_bytes().unwrap(), Some(b"V@".to_vec()));

        assert_eq!(r.read_i8().unwrap(), 1);
        assert_eq!(r.read_i8().unwrap(), 2);
        assert_eq!(r.read_i16().unwrap(), 9);
        assert_eq!(r.read_i64().unwrap(), 3);
        assert_eq!(r.read_u8().unwrap(), b'd');
        assert_eq!(r.read_i32().unwrap(), 1);

        assert_eq!(r.read_i8().unwrap(), 0);
        assert_eq!(r.read_string().unwrap().as_deref(), Some(""));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn response_decodes_all_three_count_gated_lists() {
        let mut w = Writer::new();
        w.write_i8(0);
        w.write_i32(7);
        w.write_i32(1); // created
        w.write_i16(-1);
        w.write_i64(-2);
        w.write_i16(9);
        w.write_i64(0);
        w.write_i32(1); // updated
        w.write_i16(9);
        w.write_i64(1);
        w.write_i32(2);
        w.write_i32(0); // collection changes
        let bytes = w.into_bytes();

        let op = TxCommit {
            tx_id: 5,
            using_log: true,
            entries: Vec::new(),
        };
        let map = decode_response(&op, &bytes, false).unwrap();

        let created = map["created"].as_list().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0]["created-cluster-id"], Value::Short(9));
        assert_eq!(
            created[0]["client-specified-cluster-position"],
            Value::Long(-2)
        );

        let updated = map["updated"].as_list().unwrap();
        assert_eq!(updated[0]["new-record-version"], Value::Int(2));

        assert!(map["changes"].as_list().unwrap().is_empty());
    }
}
