//! Profile grammar.
//!
//! A profile is a compact description of request or response bytes:
//!
//! ```text
//! profile ::= element*
//! element ::= term | group
//! term    ::= '(' name ':' type ')' repeat?     named value
//!           | '(' digits ')'                    byte-static literal
//! group   ::= '[' label? element* ']' repeat?
//! label   ::= '{' name '}'
//! repeat  ::= '*' | '+'
//! ```
//!
//! A labelled group yields a list of child maps under the label in the
//! decoded structure. A byte-static inside a group is the sentinel that
//! terminates its repetition.

use crate::error::{Error, Result};

/// Wire type of a named term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Bytes,
    String,
    Strings,
    /// A record preceded by its i16 kind discriminator.
    Record,
}

impl TermType {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "boolean" => Self::Boolean,
            "byte" => Self::Byte,
            "short" => Self::Short,
            "int" => Self::Int,
            "long" => Self::Long,
            "bytes" => Self::Bytes,
            "string" => Self::String,
            "strings" => Self::Strings,
            "record" => Self::Record,
            other => {
                return Err(Error::ProfileNotMatch(format!(
                    "unknown term type '{other}'"
                )));
            }
        })
    }
}

/// A named value slot in a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub name: String,
    pub ty: TermType,
    pub repeating: bool,
}

/// A bracketed group of elements, optionally labelled and repeating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub label: Option<String>,
    pub members: Vec<Element>,
    pub repeating: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Term(Term),
    /// A byte literal fixed by the profile text, e.g. `(1)`.
    Static(i8),
    Group(Group),
}

/// A parsed profile tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Profile {
    pub elements: Vec<Element>,
}

impl Profile {
    /// Parses a profile string. The scanner is hand-written; profiles are
    /// authored constants, so any parse failure is a programming error
    /// surfaced as `ProfileNotMatch`.
    pub fn parse(src: &str) -> Result<Self> {
        let mut scanner = Scanner {
            src: src.as_bytes(),
            pos: 0,
        };
        let elements = scanner.elements(false)?;
        Ok(Self { elements })
    }
}

struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
}

impl Scanner<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    /// Consumes a trailing `*` or `+` if present.
    fn repeat_marker(&mut self) -> bool {
        match self.peek() {
            Some(b'*') | Some(b'+') => {
                self.pos += 1;
                // collapse doubled markers such as `*+`
                while matches!(self.peek(), Some(b'*') | Some(b'+')) {
                    self.pos += 1;
                }
                true
            }
            _ => false,
        }
    }

    fn text_until(&mut self, end: u8) -> Result<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == end {
                let text = std::str::from_utf8(&self.src[start..self.pos])
                    .map_err(|_| Error::ProfileNotMatch("profile is not utf-8".into()))?
                    .to_string();
                self.pos += 1;
                return Ok(text);
            }
            self.pos += 1;
        }
        Err(Error::ProfileNotMatch(format!(
            "unterminated token, expected '{}'",
            end as char
        )))
    }

    fn elements(&mut self, in_group: bool) -> Result<Vec<Element>> {
        let mut out = Vec::new();
        loop {
            match self.bump() {
                None => {
                    if in_group {
                        return Err(Error::ProfileNotMatch("unterminated group".into()));
                    }
                    return Ok(out);
                }
                Some(b'(') => out.push(self.term()?),
                Some(b'[') => out.push(self.group()?),
                Some(b']') if in_group => return Ok(out),
                Some(other) => {
                    return Err(Error::ProfileNotMatch(format!(
                        "unexpected character '{}' at offset {}",
                        other as char,
                        self.pos - 1
                    )));
                }
            }
        }
    }

    fn term(&mut self) -> Result<Element> {
        let body = self.text_until(b')')?;
        if let Some((name, ty)) = body.split_once(':') {
            let repeating = self.repeat_marker();
            return Ok(Element::Term(Term {
                name: name.to_string(),
                ty: TermType::parse(ty)?,
                repeating,
            }));
        }
        let value: i8 = body.parse().map_err(|_| {
            Error::ProfileNotMatch(format!("term '({body})' is neither name:type nor a byte"))
        })?;
        self.repeat_marker();
        Ok(Element::Static(value))
    }

    fn group(&mut self) -> Result<Element> {
        let label = if self.peek() == Some(b'{') {
            self.pos += 1;
            Some(self.text_until(b'}')?)
        } else {
            None
        };
        let members = self.elements(true)?;
        let repeating = self.repeat_marker();
        Ok(Element::Group(Group {
            label,
            members,
            repeating,
        }))
    }
}
