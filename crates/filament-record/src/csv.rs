//! Textual (CSV) record serializer.
//!
//! Format: `ClassName@field:value,field:value,...`. String values are
//! double-quoted, numeric literals bare, links textual rids, and a bare
//! `%...;` token is base64 over the reference-bag document sub-format.
//! Anything that does not split cleanly on `@`/`,`/`:` is a
//! `Serialization` error.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use filament_wire::{Error, Result};

use crate::ridbag::ReferenceBag;
use crate::types::{FieldValue, Record, Rid};

pub struct CsvSerializer;

impl CsvSerializer {
    /// Decodes one record from its textual form.
    pub fn decode(data: &[u8]) -> Result<Record> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::Serialization(format!("record content is not utf-8: {e}")))?;
        let (class_name, body) = text.split_once('@').ok_or_else(|| {
            Error::Serialization(format!("could not split record content '{text}' by @"))
        })?;

        let mut record = Record::new(class_name);
        for field in split_fields(body) {
            if field.is_empty() {
                continue;
            }
            let (name, raw) = field.split_once(':').ok_or_else(|| {
                Error::Serialization(format!("could not split '{field}' by :"))
            })?;
            let value = decode_value(raw.trim())?;
            record.fields.insert(name.trim().to_string(), value);
        }
        Ok(record)
    }

    /// Encodes one record into its textual form.
    pub fn encode(record: &Record) -> Result<Vec<u8>> {
        let mut out = String::with_capacity(64);
        out.push_str(&record.class_name);
        out.push('@');
        let mut first = true;
        for (name, value) in &record.fields {
            if !first {
                out.push(',');
            }
            first = false;
            out.push_str(name);
            out.push(':');
            encode_value(value, &mut out)?;
        }
        Ok(out.into_bytes())
    }
}

/// Splits the field list on commas, ignoring commas inside quoted values.
fn split_fields(body: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in body.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(&body[start..]);
    fields
}

fn decode_value(raw: &str) -> Result<FieldValue> {
    if let Some(quoted) = raw.strip_prefix('"') {
        let inner = quoted.strip_suffix('"').ok_or_else(|| {
            Error::Serialization(format!("unterminated string value '{raw}'"))
        })?;
        return Ok(FieldValue::String(inner.to_string()));
    }
    if let Some(token) = raw.strip_prefix('%') {
        let encoded = token.strip_suffix(';').ok_or_else(|| {
            Error::Serialization(format!("unterminated bag token '{raw}'"))
        })?;
        let binary = BASE64
            .decode(encoded)
            .map_err(|e| Error::Serialization(format!("invalid base64 bag token: {e}")))?;
        let bag = ReferenceBag::decode_document(&binary)?;
        return Ok(FieldValue::LinkBag(bag));
    }
    if raw.starts_with('#') {
        return Ok(FieldValue::Link(raw.parse::<Rid>()?));
    }
    match raw {
        "true" => return Ok(FieldValue::Boolean(true)),
        "false" => return Ok(FieldValue::Boolean(false)),
        _ => {}
    }
    if raw.contains('.') {
        return raw
            .parse::<f64>()
            .map(FieldValue::Double)
            .map_err(|_| Error::Serialization(format!("bad numeric literal '{raw}'")));
    }
    let number: i64 = raw
        .parse()
        .map_err(|_| Error::Serialization(format!("bad field value '{raw}'")))?;
    if let Ok(small) = i32::try_from(number) {
        Ok(FieldValue::Integer(small))
    } else {
        Ok(FieldValue::Long(number))
    }
}

fn encode_value(value: &FieldValue, out: &mut String) -> Result<()> {
    match value {
        FieldValue::String(s) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        FieldValue::Integer(v) => out.push_str(&v.to_string()),
        FieldValue::Short(v) => out.push_str(&v.to_string()),
        FieldValue::Long(v) => out.push_str(&v.to_string()),
        FieldValue::Byte(v) => out.push_str(&v.to_string()),
        FieldValue::Float(v) => out.push_str(&v.to_string()),
        FieldValue::Double(v) => out.push_str(&v.to_string()),
        FieldValue::Boolean(v) => out.push_str(if *v { "true" } else { "false" }),
        FieldValue::Link(rid) => out.push_str(&rid.to_string()),
        FieldValue::LinkBag(bag) => {
            let document = bag.encode_document()?;
            out.push('%');
            out.push_str(&BASE64.encode(document));
            out.push(';');
        }
        other => {
            return Err(Error::TypeNotFound(format!(
                "csv serializer cannot encode {other:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityRegistry, materialize};

    #[test]
    fn decodes_the_profile_record() {
        let record =
            CsvSerializer::decode(b"Profile@name:\"Barack\",surname:\"Obama\"").unwrap();
        assert_eq!(record.class_name, "Profile");
        assert_eq!(record.fields["name"], FieldValue::from("Barack"));
        assert_eq!(record.fields["surname"], FieldValue::from("Obama"));

        let registry = EntityRegistry::new();
        registry.register_vertex("Profile");
        let entity = materialize(record, &registry).unwrap();
        let vertex = entity.as_vertex().unwrap();
        assert_eq!(vertex.field("name"), Some(FieldValue::from("Barack")));
        assert_eq!(vertex.field("surname"), Some(FieldValue::from("Obama")));
        assert!(vertex.link_bags().is_empty());
        assert!(vertex.out_edges().is_empty());
        assert!(vertex.in_edges().is_empty());
    }

    #[test]
    fn decodes_numeric_and_boolean_literals() {
        let record =
            CsvSerializer::decode(b"City@population:3645000,area:891.8,capital:true").unwrap();
        assert_eq!(record.fields["population"], FieldValue::Integer(3_645_000));
        assert_eq!(record.fields["area"], FieldValue::Double(891.8));
        assert_eq!(record.fields["capital"], FieldValue::Boolean(true));
    }

    #[test]
    fn wide_integers_decode_as_longs() {
        let record = CsvSerializer::decode(b"C@n:5000000000").unwrap();
        assert_eq!(record.fields["n"], FieldValue::Long(5_000_000_000));
    }

    #[test]
    fn decodes_base64_bag_tokens() {
        let bag = ReferenceBag::Embedded(vec![Rid::new(10, 0), Rid::new(10, 1)]);
        let token = BASE64.encode(bag.encode_document().unwrap());
        let text = format!("Person@out_Follows:%{token};");

        let record = CsvSerializer::decode(text.as_bytes()).unwrap();
        assert_eq!(record.fields["out_Follows"], FieldValue::LinkBag(bag));
    }

    #[test]
    fn quoted_commas_do_not_split_fields() {
        let record = CsvSerializer::decode(b"City@name:\"a,b\",n:1").unwrap();
        assert_eq!(record.fields["name"], FieldValue::from("a,b"));
        assert_eq!(record.fields["n"], FieldValue::Integer(1));
    }

    #[test]
    fn malformed_records_are_serialization_errors() {
        assert!(matches!(
            CsvSerializer::decode(b"no-class-marker"),
            Err(Error::Serialization(_))
        ));
        assert!(matches!(
            CsvSerializer::decode(b"C@fieldwithoutcolon"),
            Err(Error::Serialization(_))
        ));
        assert!(matches!(
            CsvSerializer::decode(b"C@f:\"unterminated"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let record = Record::new("City")
            .with_field("name", FieldValue::from("Berlin"))
            .with_field("population", FieldValue::Integer(3_645_000))
            .with_field("mayor", FieldValue::Link(Rid::new(4, 2)));
        let bytes = CsvSerializer::encode(&record).unwrap();
        assert_eq!(CsvSerializer::decode(&bytes).unwrap(), record);
    }
}
