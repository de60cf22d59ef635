//! Positional binary record serializer.
//!
//! Layout per record: a version byte, the varint-prefixed class name, a
//! header of field entries, a varint-0 terminator, then the value region.
//! Each header entry is either an inline field name or a negative length
//! referring to the global-property dictionary, followed by an absolute
//! i32 offset into the record buffer and (for inline names) a type tag.
//!
//! Every offset — header and embedded-map alike — is measured from the
//! start of the outermost record buffer, on encode and decode alike. A
//! header offset pointing back before the end of its header is rejected;
//! an offset of zero marks a null field.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use filament_wire::{Error, Reader, Result};

use crate::ridbag::ReferenceBag;
use crate::schema::Schema;
use crate::types::{BinaryType, FieldValue, Record, Rid};

const SERIALIZER_VERSION: i8 = 0;

/// Encoder/decoder for the binary record format. Holds the session's
/// global-property dictionary for negative header entries.
pub struct BinarySerializer<'a> {
    schema: &'a Schema,
}

impl<'a> BinarySerializer<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Decodes a full record, version byte included.
    pub fn decode(&self, data: &[u8]) -> Result<Record> {
        if data.is_empty() {
            return Err(Error::Serialization("empty record content".into()));
        }
        let mut reader = Reader::new(data);
        let version = reader.read_i8()?;
        tracing::debug!(version, len = data.len(), "decoding binary record");
        self.decode_document(&mut reader)
    }

    /// Encodes a full record, version byte included.
    pub fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        let mut buf = vec![SERIALIZER_VERSION as u8];
        self.encode_document(&mut buf, record)?;
        Ok(buf)
    }

    /// Decodes a document at the reader's position. Embedded documents
    /// reuse this without the leading version byte. On return the reader
    /// stands past the whole document, header and value region both.
    fn decode_document(&self, reader: &mut Reader<'_>) -> Result<Record> {
        let class_name = reader.read_varint_string()?;
        let mut record = Record::new(class_name);

        struct HeaderEntry {
            name: String,
            offset: i32,
            ty: BinaryType,
        }

        let mut entries = Vec::new();
        loop {
            let len = reader.read_varint()?;
            if len == 0 {
                break;
            }
            if len > 0 {
                let raw = reader.read_raw(len as usize)?;
                let name = String::from_utf8(raw.to_vec()).map_err(|e| {
                    Error::Serialization(format!("invalid utf-8 in field name: {e}"))
                })?;
                let offset = reader.read_i32()?;
                let ty = BinaryType::from_tag(reader.read_i8()?)?;
                entries.push(HeaderEntry { name, offset, ty });
            } else {
                let property = self.schema.resolve(len)?;
                let offset = reader.read_i32()?;
                entries.push(HeaderEntry {
                    name: property.name.clone(),
                    offset,
                    ty: property.ty,
                });
            }
        }

        let header_end = reader.position();
        let mut end = header_end;
        for entry in entries {
            if entry.offset == 0 {
                // null field
                continue;
            }
            if (entry.offset as usize) < header_end {
                return Err(Error::Serialization(format!(
                    "field '{}' points at offset {} inside the header",
                    entry.name, entry.offset
                )));
            }
            let mut value_reader = Reader::new(reader.buffer());
            value_reader.set_position(entry.offset as usize);
            let value = self.decode_value(entry.ty, &mut value_reader)?;
            end = end.max(value_reader.position());
            record.fields.insert(entry.name, value);
        }
        reader.set_position(end);
        Ok(record)
    }

    fn decode_value(&self, ty: BinaryType, reader: &mut Reader<'_>) -> Result<FieldValue> {
        Ok(match ty {
            BinaryType::Boolean => FieldValue::Boolean(reader.read_bool()?),
            BinaryType::Byte => FieldValue::Byte(reader.read_i8()?),
            BinaryType::Integer => FieldValue::Integer(reader.read_varint()? as i32),
            BinaryType::Short => FieldValue::Short(reader.read_varint()? as i16),
            BinaryType::Long => FieldValue::Long(reader.read_varint()?),
            BinaryType::Float => FieldValue::Float(reader.read_f32()?),
            BinaryType::Double => FieldValue::Double(reader.read_f64()?),
            BinaryType::String => FieldValue::String(reader.read_varint_string()?),
            BinaryType::Binary => {
                let len = reader.read_varint()?;
                if len < 0 {
                    return Err(Error::Serialization(format!(
                        "negative binary length {len}"
                    )));
                }
                FieldValue::Binary(reader.read_raw(len as usize)?.to_vec())
            }
            BinaryType::DateTime => {
                let millis = reader.read_varint()?;
                let stamp = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
                    Error::Serialization(format!("timestamp {millis} out of range"))
                })?;
                FieldValue::DateTime(stamp)
            }
            BinaryType::Date => {
                let days = reader.read_varint()?;
                let date = DateTime::UNIX_EPOCH.date_naive() + TimeDelta::days(days);
                FieldValue::Date(date)
            }
            BinaryType::Embedded => {
                FieldValue::Embedded(Box::new(self.decode_document(reader)?))
            }
            BinaryType::EmbeddedList => FieldValue::EmbeddedList(self.decode_elements(reader)?),
            BinaryType::EmbeddedSet => FieldValue::EmbeddedSet(self.decode_elements(reader)?),
            BinaryType::EmbeddedMap => self.decode_embedded_map(reader)?,
            BinaryType::Link => {
                let cluster = reader.read_varint()? as i16;
                let position = reader.read_varint()?;
                FieldValue::Link(Rid::new(cluster, position))
            }
            BinaryType::LinkList => FieldValue::LinkList(decode_links(reader)?),
            BinaryType::LinkSet => FieldValue::LinkSet(decode_links(reader)?),
            BinaryType::LinkMap => {
                let count = reader.read_varint()?;
                let mut map = std::collections::BTreeMap::new();
                for _ in 0..count {
                    let key_tag = BinaryType::from_tag(reader.read_i8()?)?;
                    if key_tag != BinaryType::String {
                        return Err(Error::Serialization(format!(
                            "link map key of type {key_tag:?}, expected STRING"
                        )));
                    }
                    let key = reader.read_varint_string()?;
                    let cluster = reader.read_varint()? as i16;
                    let position = reader.read_varint()?;
                    map.insert(key, Rid::new(cluster, position));
                }
                FieldValue::LinkMap(map)
            }
            BinaryType::LinkBag => {
                let (_uuid, bag) = ReferenceBag::decode_linkbag(reader)?;
                FieldValue::LinkBag(bag)
            }
            BinaryType::Any | BinaryType::Transient | BinaryType::Custom | BinaryType::Decimal => {
                return Err(Error::Serialization(format!(
                    "cannot decode a value of type {ty:?}"
                )));
            }
        })
    }

    /// Inline collection elements: count, the ANY marker, then one tag
    /// byte per element.
    fn decode_elements(&self, reader: &mut Reader<'_>) -> Result<Vec<FieldValue>> {
        let count = reader.read_varint()?;
        let outer = BinaryType::from_tag(reader.read_i8()?)?;
        let mut out = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            let tag = if outer == BinaryType::Any {
                BinaryType::from_tag(reader.read_i8()?)?
            } else {
                outer
            };
            if tag == BinaryType::Any {
                // a null element
                continue;
            }
            out.push(self.decode_value(tag, reader)?);
        }
        Ok(out)
    }

    /// Map header first (typed keys plus value offsets), values at their
    /// recorded offsets. The reader ends past the value region.
    fn decode_embedded_map(&self, reader: &mut Reader<'_>) -> Result<FieldValue> {
        let count = reader.read_varint()?;
        let mut headers = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            let key_tag = BinaryType::from_tag(reader.read_i8()?)?;
            if key_tag != BinaryType::String {
                return Err(Error::Serialization(format!(
                    "embedded map key of type {key_tag:?}, expected STRING"
                )));
            }
            let key = reader.read_varint_string()?;
            let offset = reader.read_i32()?;
            let value_tag = BinaryType::from_tag(reader.read_i8()?)?;
            headers.push((key, offset, value_tag));
        }

        let mut map = std::collections::BTreeMap::new();
        let mut end = reader.position();
        for (key, offset, value_tag) in headers {
            if offset == 0 {
                continue;
            }
            let mut value_reader = Reader::new(reader.buffer());
            value_reader.set_position(offset as usize);
            let value = self.decode_value(value_tag, &mut value_reader)?;
            end = end.max(value_reader.position());
            map.insert(key, value);
        }
        reader.set_position(end);
        Ok(FieldValue::EmbeddedMap(map))
    }

    /// Encodes a document at the end of `buf`: header with offset
    /// placeholders, then the value region, patching each offset as its
    /// value lands.
    fn encode_document(&self, buf: &mut Vec<u8>, record: &Record) -> Result<()> {
        write_varint_string(buf, &record.class_name);

        let mut fixups = Vec::with_capacity(record.fields.len());
        for (name, value) in &record.fields {
            let ty = value.binary_type()?;
            write_varint_string(buf, name);
            fixups.push((buf.len(), value, ty));
            buf.extend_from_slice(&0i32.to_be_bytes());
            buf.push(ty.tag() as u8);
        }
        filament_wire::varint::write(buf, 0);

        for (fixup, value, ty) in fixups {
            let offset = buf.len() as i32;
            buf[fixup..fixup + 4].copy_from_slice(&offset.to_be_bytes());
            self.encode_value(buf, ty, value)?;
        }
        Ok(())
    }

    fn encode_value(&self, buf: &mut Vec<u8>, ty: BinaryType, value: &FieldValue) -> Result<()> {
        use filament_wire::varint;
        match (ty, value) {
            (BinaryType::Boolean, FieldValue::Boolean(v)) => buf.push(u8::from(*v)),
            (BinaryType::Byte, FieldValue::Byte(v)) => buf.push(*v as u8),
            (BinaryType::Integer, FieldValue::Integer(v)) => varint::write(buf, i64::from(*v)),
            (BinaryType::Short, FieldValue::Short(v)) => varint::write(buf, i64::from(*v)),
            (BinaryType::Long, FieldValue::Long(v)) => varint::write(buf, *v),
            (BinaryType::Float, FieldValue::Float(v)) => {
                buf.extend_from_slice(&v.to_be_bytes());
            }
            (BinaryType::Double, FieldValue::Double(v)) => {
                buf.extend_from_slice(&v.to_be_bytes());
            }
            (BinaryType::String, FieldValue::String(v)) => write_varint_string(buf, v),
            (BinaryType::Binary, FieldValue::Binary(v)) => {
                varint::write(buf, v.len() as i64);
                buf.extend_from_slice(v);
            }
            (BinaryType::DateTime, FieldValue::DateTime(v)) => {
                varint::write(buf, v.timestamp_millis());
            }
            (BinaryType::Date, FieldValue::Date(v)) => {
                let days = (*v - DateTime::UNIX_EPOCH.date_naive()).num_days();
                varint::write(buf, days);
            }
            (BinaryType::Embedded, FieldValue::Embedded(doc)) => {
                self.encode_document(buf, doc)?;
            }
            (BinaryType::EmbeddedList, FieldValue::EmbeddedList(items))
            | (BinaryType::EmbeddedSet, FieldValue::EmbeddedSet(items)) => {
                self.encode_elements(buf, items)?;
            }
            (BinaryType::EmbeddedMap, FieldValue::EmbeddedMap(map)) => {
                self.encode_embedded_map(buf, map)?;
            }
            (BinaryType::Link, FieldValue::Link(rid)) => {
                varint::write(buf, i64::from(rid.cluster));
                varint::write(buf, rid.position);
            }
            (BinaryType::LinkList, FieldValue::LinkList(rids))
            | (BinaryType::LinkSet, FieldValue::LinkSet(rids)) => {
                varint::write(buf, rids.len() as i64);
                for rid in rids {
                    varint::write(buf, i64::from(rid.cluster));
                    varint::write(buf, rid.position);
                }
            }
            (BinaryType::LinkMap, FieldValue::LinkMap(map)) => {
                varint::write(buf, map.len() as i64);
                for (key, rid) in map {
                    buf.push(BinaryType::String.tag() as u8);
                    write_varint_string(buf, key);
                    varint::write(buf, i64::from(rid.cluster));
                    varint::write(buf, rid.position);
                }
            }
            (BinaryType::LinkBag, FieldValue::LinkBag(bag)) => {
                let mut writer = filament_wire::Writer::new();
                bag.encode_linkbag(&mut writer)?;
                buf.extend_from_slice(writer.as_bytes());
            }
            (ty, value) => {
                return Err(Error::TypeNotFound(format!(
                    "cannot encode {value:?} as {ty:?}"
                )));
            }
        }
        Ok(())
    }

    fn encode_elements(&self, buf: &mut Vec<u8>, items: &[FieldValue]) -> Result<()> {
        filament_wire::varint::write(buf, items.len() as i64);
        buf.push(BinaryType::Any.tag() as u8);
        for item in items {
            let ty = item.binary_type()?;
            buf.push(ty.tag() as u8);
            self.encode_value(buf, ty, item)?;
        }
        Ok(())
    }

    fn encode_embedded_map(
        &self,
        buf: &mut Vec<u8>,
        map: &std::collections::BTreeMap<String, FieldValue>,
    ) -> Result<()> {
        filament_wire::varint::write(buf, map.len() as i64);
        let mut fixups = Vec::with_capacity(map.len());
        for (key, value) in map {
            let ty = value.binary_type()?;
            buf.push(BinaryType::String.tag() as u8);
            write_varint_string(buf, key);
            fixups.push((buf.len(), value, ty));
            buf.extend_from_slice(&0i32.to_be_bytes());
            buf.push(ty.tag() as u8);
        }
        for (fixup, value, ty) in fixups {
            let offset = buf.len() as i32;
            buf[fixup..fixup + 4].copy_from_slice(&offset.to_be_bytes());
            self.encode_value(buf, ty, value)?;
        }
        Ok(())
    }
}

fn write_varint_string(buf: &mut Vec<u8>, value: &str) {
    filament_wire::varint::write(buf, value.len() as i64);
    buf.extend_from_slice(value.as_bytes());
}

fn decode_links(reader: &mut Reader<'_>) -> Result<Vec<Rid>> {
    let count = reader.read_varint()?;
    let mut out = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let cluster = reader.read_varint()? as i16;
        let position = reader.read_varint()?;
        out.push(Rid::new(cluster, position));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::GlobalProperty;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn roundtrip(record: &Record) -> Record {
        let schema = Schema::new();
        let serializer = BinarySerializer::new(&schema);
        let bytes = serializer.encode(record).unwrap();
        serializer.decode(&bytes).unwrap()
    }

    #[test]
    fn simple_record_round_trip() {
        let record = Record::new("City")
            .with_field("name", FieldValue::from("Kassel"))
            .with_field("population", FieldValue::Integer(200_000));
        assert_eq!(roundtrip(&record), record);
    }

    #[test]
    fn vertex_with_embedded_document_round_trips() {
        let city = Record::new("City").with_field("name", FieldValue::from("Kassel"));
        let record = Record::new("Location")
            .with_field("label", FieldValue::from("home"))
            .with_field("rank", FieldValue::Integer(3))
            .with_field("city", FieldValue::Embedded(Box::new(city)));
        let decoded = roundtrip(&record);
        assert_eq!(decoded.class_name, "Location");
        assert_eq!(decoded, record);
    }

    #[test]
    fn embedded_map_round_trips() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), FieldValue::Integer(1));
        map.insert("b".to_string(), FieldValue::from("two"));
        map.insert("c".to_string(), FieldValue::Double(3.5));
        let record = Record::new("C").with_field("m", FieldValue::EmbeddedMap(map));
        assert_eq!(roundtrip(&record), record);
    }

    #[test]
    fn random_embedded_maps_round_trip() {
        use rand::Rng;
        let mut rng = rand::rng();
        for _ in 0..50 {
            let count = rng.random_range(0..=16);
            let mut map = BTreeMap::new();
            for i in 0..count {
                let key = format!("k{i}");
                let value = match rng.random_range(0..3) {
                    0 => FieldValue::Integer(rng.random()),
                    1 => FieldValue::from(format!("s{}", rng.random::<u32>())),
                    _ => FieldValue::Double(rng.random()),
                };
                map.insert(key, value);
            }
            let record = Record::new("C").with_field("m", FieldValue::EmbeddedMap(map));
            assert_eq!(roundtrip(&record), record);
        }
    }

    #[test]
    fn collections_and_links_round_trip() {
        let record = Record::new("C")
            .with_field(
                "list",
                FieldValue::EmbeddedList(vec![
                    FieldValue::Integer(1),
                    FieldValue::from("x"),
                    FieldValue::Boolean(true),
                ]),
            )
            .with_field("friend", FieldValue::Link(Rid::new(10, 3)))
            .with_field(
                "friends",
                FieldValue::LinkList(vec![Rid::new(10, 0), Rid::new(10, 1)]),
            )
            .with_field("bag", {
                FieldValue::LinkBag(ReferenceBag::Embedded(vec![Rid::new(11, 4)]))
            });
        assert_eq!(roundtrip(&record), record);
    }

    #[test]
    fn link_map_round_trips() {
        let mut map = BTreeMap::new();
        map.insert("best".to_string(), Rid::new(10, 0));
        map.insert("worst".to_string(), Rid::new(10, 9));
        let record = Record::new("C").with_field("m", FieldValue::LinkMap(map));
        assert_eq!(roundtrip(&record), record);
    }

    #[test]
    fn temporal_values_round_trip() {
        let stamp = Utc.timestamp_millis_opt(1_430_000_000_123).single().unwrap();
        let record = Record::new("C")
            .with_field("at", FieldValue::DateTime(stamp))
            .with_field(
                "on",
                FieldValue::Date(NaiveDate::from_ymd_opt(2015, 4, 25).unwrap()),
            );
        assert_eq!(roundtrip(&record), record);
    }

    #[test]
    fn global_property_headers_resolve_through_the_schema() {
        let mut schema = Schema::new();
        schema.insert(GlobalProperty {
            id: 0,
            name: "name".into(),
            ty: BinaryType::String,
        });

        // version, class "City", one property-id entry, terminator, value
        let mut buf = vec![0u8];
        write_varint_string(&mut buf, "City");
        filament_wire::varint::write(&mut buf, -1); // property id 0
        let fixup = buf.len();
        buf.extend_from_slice(&0i32.to_be_bytes());
        filament_wire::varint::write(&mut buf, 0);
        let offset = buf.len() as i32;
        buf[fixup..fixup + 4].copy_from_slice(&offset.to_be_bytes());
        write_varint_string(&mut buf, "Berlin");

        let serializer = BinarySerializer::new(&schema);
        let record = serializer.decode(&buf).unwrap();
        assert_eq!(record.class_name, "City");
        assert_eq!(record.fields["name"], FieldValue::from("Berlin"));
    }

    #[test]
    fn offsets_inside_the_header_are_rejected() {
        let mut buf = vec![0u8];
        write_varint_string(&mut buf, "C");
        write_varint_string(&mut buf, "f");
        buf.extend_from_slice(&1i32.to_be_bytes()); // points into the header
        buf.push(BinaryType::Integer.tag() as u8);
        filament_wire::varint::write(&mut buf, 0);

        let schema = Schema::new();
        let err = BinarySerializer::new(&schema).decode(&buf).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn zero_offset_marks_a_null_field() {
        let mut buf = vec![0u8];
        write_varint_string(&mut buf, "C");
        write_varint_string(&mut buf, "f");
        buf.extend_from_slice(&0i32.to_be_bytes());
        buf.push(BinaryType::Integer.tag() as u8);
        filament_wire::varint::write(&mut buf, 0);

        let schema = Schema::new();
        let record = BinarySerializer::new(&schema).decode(&buf).unwrap();
        assert!(record.fields.is_empty());
    }

    #[test]
    fn unknown_property_ids_are_serialization_errors() {
        let mut buf = vec![0u8];
        write_varint_string(&mut buf, "C");
        filament_wire::varint::write(&mut buf, -5);
        buf.extend_from_slice(&64i32.to_be_bytes());
        filament_wire::varint::write(&mut buf, 0);

        let schema = Schema::new();
        assert!(BinarySerializer::new(&schema).decode(&buf).is_err());
    }
}
