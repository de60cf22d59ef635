//! The global-property dictionary.
//!
//! Binary records may encode a field by numeric id instead of by name: a
//! negative header length `len` refers to property `(-len) - 1` in this
//! dictionary. It is fetched once per database session from the schema
//! metadata record and refreshed only on explicit reload.

use std::collections::HashMap;
use std::sync::Arc;

use filament_wire::{Error, Result};
use parking_lot::RwLock;

use crate::types::{BinaryType, FieldValue, Record};

/// One schema-level field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalProperty {
    pub id: i32,
    pub name: String,
    pub ty: BinaryType,
}

/// Property-id lookup table for one database session.
#[derive(Debug, Default)]
pub struct Schema {
    properties: HashMap<i32, GlobalProperty>,
}

/// The schema is shared between the client and the binary serializer and
/// mutated only at session open and on reload.
pub type SharedSchema = Arc<RwLock<Schema>>;

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, property: GlobalProperty) {
        self.properties.insert(property.id, property);
    }

    pub fn property(&self, id: i32) -> Option<&GlobalProperty> {
        self.properties.get(&id)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Resolves a negative header length to its property.
    pub fn resolve(&self, header_len: i64) -> Result<&GlobalProperty> {
        let id = (-header_len - 1) as i32;
        self.property(id).ok_or_else(|| {
            Error::Serialization(format!("no global property with id {id}"))
        })
    }

    /// Builds the dictionary from the decoded schema metadata record,
    /// whose `globalProperties` field is a list of `{id, name, type}`
    /// documents.
    pub fn from_record(record: &Record) -> Result<Self> {
        let mut schema = Self::new();
        let Some(FieldValue::EmbeddedList(entries)) = record.fields.get("globalProperties")
        else {
            return Err(Error::Serialization(
                "schema record has no globalProperties list".into(),
            ));
        };
        for entry in entries {
            let property = match entry {
                FieldValue::Embedded(doc) => property_from_map(&doc.fields)?,
                FieldValue::EmbeddedMap(fields) => property_from_map(fields)?,
                other => {
                    return Err(Error::Serialization(format!(
                        "unexpected globalProperties entry: {other:?}"
                    )));
                }
            };
            schema.insert(property);
        }
        Ok(schema)
    }
}

fn property_from_map(
    fields: &std::collections::BTreeMap<String, FieldValue>,
) -> Result<GlobalProperty> {
    let id = match fields.get("id") {
        Some(FieldValue::Integer(id)) => *id,
        Some(FieldValue::Long(id)) => *id as i32,
        Some(FieldValue::Short(id)) => i32::from(*id),
        _ => return Err(Error::Serialization("global property without id".into())),
    };
    let name = match fields.get("name") {
        Some(FieldValue::String(name)) => name.clone(),
        _ => return Err(Error::Serialization("global property without name".into())),
    };
    let ty = match fields.get("type") {
        Some(FieldValue::String(name)) => BinaryType::from_name(name)?,
        Some(FieldValue::Integer(tag)) => BinaryType::from_tag(*tag as i8)?,
        Some(FieldValue::Byte(tag)) => BinaryType::from_tag(*tag)?,
        _ => return Err(Error::Serialization("global property without type".into())),
    };
    Ok(GlobalProperty { id, name, ty })
}
