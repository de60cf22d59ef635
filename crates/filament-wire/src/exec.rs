//! Profile executor.
//!
//! Walks a parsed [`Profile`] in both directions: encoding consumes a
//! [`ValueMap`] of named arguments and produces wire bytes; decoding
//! consumes wire bytes through a [`DecodeContext`] and produces a nested
//! [`ValueMap`]. All mutable decode state lives in the context — buffer
//! cursor, pending repeat counter — never in free variables.
//!
//! Repeating groups decode under three policies:
//! - a group preceded by one of the canonical count terms iterates that
//!   many times;
//! - a group whose first member is a byte-static iterates while the
//!   sentinel matches (the static is consumed on match, peeked otherwise);
//! - any other repeating group consumes until at most one byte remains.

use std::collections::BTreeMap;

use crate::codec::{Reader, Writer};
use crate::error::{Error, Result};
use crate::profile::{Element, Group, Profile, Term, TermType};

/// Count terms whose decoded value drives the repetition of the group that
/// follows them.
pub const REPEAT_DRIVERS: &[&str] = &[
    "num-of-clusters",
    "count-of-collection-changes",
    "num-cfg-items",
    "created-record-count",
    "updated-record-count",
];

/// A decoded or to-be-encoded wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Bytes(Vec<u8>),
    Str(String),
    Strings(Vec<String>),
    /// Decoded repetitions of a labelled group.
    List(Vec<ValueMap>),
}

pub type ValueMap = BTreeMap<String, Value>;

impl Value {
    /// Numeric view across the integer widths.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().map(|v| v as i32)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ValueMap]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Byte(v)
    }
}
impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// Fetches a required decoded field, as the façade layer does.
pub fn require<'a>(map: &'a ValueMap, key: &str) -> Result<&'a Value> {
    map.get(key)
        .ok_or_else(|| Error::ProfileNotMatch(format!("response field '{key}' missing")))
}

/// Fetches a required integer field.
pub fn require_i64(map: &ValueMap, key: &str) -> Result<i64> {
    require(map, key)?
        .as_i64()
        .ok_or_else(|| Error::WrongType(format!("response field '{key}' is not numeric")))
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes `args` against `profile` into wire bytes.
pub fn encode(profile: &Profile, args: &ValueMap) -> Result<Vec<u8>> {
    let mut writer = Writer::new();
    encode_elements(&profile.elements, args, &mut writer)?;
    Ok(writer.into_bytes())
}

/// Encodes `args` against `profile`, appending to an existing writer.
pub fn encode_into(profile: &Profile, args: &ValueMap, writer: &mut Writer) -> Result<()> {
    encode_elements(&profile.elements, args, writer)
}

fn encode_elements(elements: &[Element], args: &ValueMap, writer: &mut Writer) -> Result<()> {
    for element in elements {
        match element {
            Element::Static(value) => writer.write_i8(*value),
            Element::Term(term) => encode_term(term, args, writer)?,
            Element::Group(group) => encode_group(group, args, writer)?,
        }
    }
    Ok(())
}

fn encode_group(group: &Group, args: &ValueMap, writer: &mut Writer) -> Result<()> {
    match &group.label {
        Some(label) => {
            let value = args.get(label).ok_or_else(|| {
                Error::ProfileNotMatch(format!("argument '{label}' could not be found"))
            })?;
            let items = value.as_list().ok_or_else(|| {
                Error::WrongType(format!("argument '{label}' is not a list of maps"))
            })?;
            for item in items {
                encode_elements(&group.members, item, writer)?;
            }
            Ok(())
        }
        None => encode_elements(&group.members, args, writer),
    }
}

fn encode_term(term: &Term, args: &ValueMap, writer: &mut Writer) -> Result<()> {
    let value = args.get(&term.name).ok_or_else(|| {
        Error::ProfileNotMatch(format!(
            "argument '{}' could not be found in argument data",
            term.name
        ))
    })?;
    if term.repeating {
        let items = match value {
            Value::List(items) => items,
            _ => {
                return Err(Error::WrongType(format!(
                    "repeating argument '{}' is not a list",
                    term.name
                )));
            }
        };
        for item in items {
            let inner = require(item, &term.name)?;
            encode_value(term, inner, writer)?;
        }
        return Ok(());
    }
    encode_value(term, value, writer)
}

fn encode_value(term: &Term, value: &Value, writer: &mut Writer) -> Result<()> {
    let mismatch = || {
        Error::WrongType(format!(
            "wrong value type for '{}' ({:?})",
            term.name, term.ty
        ))
    };
    match term.ty {
        TermType::Boolean => writer.write_bool(match value {
            Value::Bool(v) => *v,
            Value::Byte(v) => *v != 0,
            _ => return Err(mismatch()),
        }),
        TermType::Byte => match value {
            Value::Byte(v) => writer.write_i8(*v),
            // single-character mode bytes such as 's' or 'q'
            Value::Str(s) if s.len() == 1 => writer.write_u8(s.as_bytes()[0]),
            _ => return Err(mismatch()),
        },
        TermType::Short => writer.write_i16(value.as_i64().ok_or_else(mismatch)? as i16),
        TermType::Int => writer.write_i32(value.as_i64().ok_or_else(mismatch)? as i32),
        TermType::Long => writer.write_i64(value.as_i64().ok_or_else(mismatch)?),
        TermType::String => match value {
            Value::Str(s) => writer.write_string(s),
            Value::Null => writer.write_null_string(),
            _ => return Err(mismatch()),
        },
        TermType::Bytes => match value {
            Value::Bytes(b) => writer.write_bytes(Some(b)),
            // the wire treats strings and blobs alike on the way out
            Value::Str(s) => writer.write_bytes(Some(s.as_bytes())),
            Value::Null => writer.write_bytes(None),
            _ => return Err(mismatch()),
        },
        TermType::Strings => match value {
            Value::Strings(items) => writer.write_strings(items),
            _ => return Err(mismatch()),
        },
        TermType::Record => {
            return Err(Error::WrongType(format!(
                "record term '{}' cannot be encoded generically",
                term.name
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// All mutable state of a decode walk.
pub struct DecodeContext<'r, 'a> {
    pub reader: &'r mut Reader<'a>,
    /// Value of the most recent count term, consumed by the next group.
    repeat: Option<i64>,
}

impl<'r, 'a> DecodeContext<'r, 'a> {
    pub fn new(reader: &'r mut Reader<'a>) -> Self {
        Self {
            reader,
            repeat: None,
        }
    }
}

/// Decodes `profile` from the reader into a nested map.
pub fn decode(profile: &Profile, reader: &mut Reader<'_>) -> Result<ValueMap> {
    let mut ctx = DecodeContext::new(reader);
    let mut out = ValueMap::new();
    decode_elements(&profile.elements, &mut ctx, &mut out)?;
    Ok(out)
}

fn decode_elements(
    elements: &[Element],
    ctx: &mut DecodeContext<'_, '_>,
    out: &mut ValueMap,
) -> Result<()> {
    for element in elements {
        match element {
            Element::Static(expected) => {
                // consume only when the byte matches, otherwise leave it
                if ctx.reader.remaining() > 0 && ctx.reader.peek_i8()? == *expected {
                    ctx.reader.read_i8()?;
                }
            }
            Element::Term(term) => {
                let value = decode_term(term, ctx.reader)?;
                if REPEAT_DRIVERS.contains(&term.name.as_str()) {
                    ctx.repeat = value.as_i64();
                }
                out.insert(term.name.clone(), value);
            }
            Element::Group(group) => decode_group(group, ctx, out)?,
        }
    }
    Ok(())
}

fn decode_group(
    group: &Group,
    ctx: &mut DecodeContext<'_, '_>,
    out: &mut ValueMap,
) -> Result<()> {
    let mut items = Vec::new();

    if let Some(count) = ctx.repeat.take() {
        for _ in 0..count {
            let mut item = ValueMap::new();
            decode_elements(&group.members, ctx, &mut item)?;
            items.push(item);
        }
    } else if let Some(Element::Static(sentinel)) = group.members.first() {
        while ctx.reader.remaining() > 0 && ctx.reader.peek_i8()? == *sentinel {
            ctx.reader.read_i8()?;
            let mut item = ValueMap::new();
            decode_elements(&group.members[1..], ctx, &mut item)?;
            items.push(item);
        }
    } else if group.repeating {
        while ctx.reader.remaining() > 1 {
            let mut item = ValueMap::new();
            decode_elements(&group.members, ctx, &mut item)?;
            items.push(item);
        }
    } else {
        // a non-repeating unlabelled group is plain structure
        if group.label.is_none() {
            return decode_elements(&group.members, ctx, out);
        }
        let mut item = ValueMap::new();
        decode_elements(&group.members, ctx, &mut item)?;
        items.push(item);
    }

    let key = group.label.clone().unwrap_or_default();
    out.insert(key, Value::List(items));
    Ok(())
}

fn decode_term(term: &Term, reader: &mut Reader<'_>) -> Result<Value> {
    Ok(match term.ty {
        TermType::Boolean => Value::Bool(reader.read_bool()?),
        TermType::Byte => Value::Byte(reader.read_i8()?),
        TermType::Short => Value::Short(reader.read_i16()?),
        TermType::Int => Value::Int(reader.read_i32()?),
        TermType::Long => Value::Long(reader.read_i64()?),
        TermType::Bytes => match reader.read_bytes()? {
            Some(b) => Value::Bytes(b),
            None => Value::Null,
        },
        TermType::String => match reader.read_string()? {
            Some(s) => Value::Str(s),
            None => Value::Null,
        },
        TermType::Strings => Value::Strings(reader.read_strings()?),
        // a record starts with its i16 kind; full parsing is the
        // operation decoder's job
        TermType::Record => Value::Short(reader.read_i16()?),
    })
}
