//! Reference bags — server-side rid collections.
//!
//! A bag is either *embedded* (the rids travel inline with the record) or
//! *tree-resident* (the record carries only a pointer into a server-side
//! tree). Only the embedded variant is consumed by the materializer; the
//! tree variant surfaces as an opaque handle whose size can be queried via
//! RIDBAG_GET_SIZE.
//!
//! Two wire forms exist: the LINKBAG field encoding inside binary records
//! (flags byte, optional uuid, fixed 10-byte rid entries) and a document
//! sub-format that the CSV serializer receives base64-encoded.

use filament_wire::{Error, Reader, Result, Writer};
use uuid::Uuid;

use crate::types::Rid;

const EMBEDDED_FLAG: i8 = 1;
const UUID_FLAG: i8 = 2;
/// Each embedded entry is a cluster id (2 bytes) plus a position (8).
const ENTRY_BYTES: i32 = 10;

/// Pointer to a tree-resident bag, plus its bookkeeping counters. The
/// client never dereferences the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BagPointer {
    pub file_id: i64,
    pub page_index: i64,
    pub page_offset: i32,
    pub size: i32,
    pub changes_size: i32,
}

/// An ordered collection of rids, inline or behind a tree pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceBag {
    Embedded(Vec<Rid>),
    Tree(BagPointer),
}

impl ReferenceBag {
    /// Declared size: entry count for embedded bags, the server-reported
    /// counter for tree bags.
    pub fn size(&self) -> i64 {
        match self {
            Self::Embedded(rids) => rids.len() as i64,
            Self::Tree(pointer) => i64::from(pointer.size),
        }
    }

    /// The inline rids, when this is an embedded bag.
    pub fn rids(&self) -> Option<&[Rid]> {
        match self {
            Self::Embedded(rids) => Some(rids),
            Self::Tree(_) => None,
        }
    }

    /// Decodes the LINKBAG field form. Returns the bag uuid when the
    /// flags carry one.
    pub fn decode_linkbag(reader: &mut Reader<'_>) -> Result<(Option<Uuid>, Self)> {
        let flags = reader.read_i8()?;

        let uuid = if flags & UUID_FLAG != 0 {
            let most = reader.read_i64()?;
            let least = reader.read_i64()?;
            Some(Uuid::from_u64_pair(most as u64, least as u64))
        } else {
            None
        };

        if flags & EMBEDDED_FLAG != 0 {
            let size = reader.read_i32()?;
            let count = reader.read_i32()?;
            if size != count {
                return Err(Error::Serialization(format!(
                    "reference bag declares {size} entries but content holds {count}"
                )));
            }
            let mut rids = Vec::with_capacity(count.max(0) as usize);
            for _ in 0..count {
                let cluster = reader.read_i16()?;
                let position = reader.read_i64()?;
                rids.push(Rid::new(cluster, position));
            }
            return Ok((uuid, Self::Embedded(rids)));
        }

        let pointer = BagPointer {
            file_id: reader.read_i64()?,
            page_index: reader.read_i64()?,
            page_offset: reader.read_i32()?,
            size: reader.read_i32()?,
            changes_size: reader.read_i32()?,
        };
        // skip the change entries: rid (10) + change type (1) + value (4)
        let change_bytes = pointer.changes_size.max(0) as usize * 15;
        reader.read_raw(change_bytes)?;
        Ok((uuid, Self::Tree(pointer)))
    }

    /// Encodes the LINKBAG field form. Tree bags belong to the server and
    /// cannot be written back.
    pub fn encode_linkbag(&self, writer: &mut Writer) -> Result<()> {
        match self {
            Self::Embedded(rids) => {
                writer.write_i8(EMBEDDED_FLAG);
                writer.write_i32(rids.len() as i32);
                writer.write_i32(rids.len() as i32);
                for rid in rids {
                    writer.write_i16(rid.cluster);
                    writer.write_i64(rid.position);
                }
                Ok(())
            }
            Self::Tree(_) => Err(Error::TypeNotFound(
                "tree-resident reference bag".to_string(),
            )),
        }
    }

    /// Decodes the document sub-format carried base64-encoded inside CSV
    /// records: `(config:byte)` then either the inline rid list or the
    /// tree pointer.
    pub fn decode_document(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        let config = reader.read_i8()?;

        if config & UUID_FLAG != 0 {
            reader.read_i64()?;
            reader.read_i64()?;
        }

        if config & EMBEDDED_FLAG != 0 {
            let size = reader.read_i32()?;
            let mut rids = Vec::with_capacity(size.max(0) as usize);
            for _ in 0..size {
                let cluster = reader.read_i16()?;
                let position = reader.read_i64()?;
                rids.push(Rid::new(cluster, position));
            }
            return Ok(Self::Embedded(rids));
        }

        let pointer = BagPointer {
            file_id: reader.read_i64()?,
            page_index: reader.read_i64()?,
            page_offset: reader.read_i32()?,
            size: reader.read_i32()?,
            changes_size: reader.read_i32()?,
        };
        Ok(Self::Tree(pointer))
    }

    /// Encodes the document sub-format, the inverse of
    /// [`Self::decode_document`].
    pub fn encode_document(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        match self {
            Self::Embedded(rids) => {
                writer.write_i8(EMBEDDED_FLAG);
                writer.write_i32(rids.len() as i32);
                for rid in rids {
                    writer.write_i16(rid.cluster);
                    writer.write_i64(rid.position);
                }
                Ok(writer.into_bytes())
            }
            Self::Tree(_) => Err(Error::TypeNotFound(
                "tree-resident reference bag".to_string(),
            )),
        }
    }

    /// Total wire size of the embedded content block, counted the way the
    /// server frames it: entry bytes plus the leading count.
    pub fn content_bytes(count: i32) -> i32 {
        count * ENTRY_BYTES + 4
    }
}
