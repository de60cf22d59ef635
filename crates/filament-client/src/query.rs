//! Typed query builder.
//!
//! Statements (Select, Insert, Update, Delete, Create, Drop, Move,
//! Traverse, Truncate) and clause fragments compose into objects whose
//! `parse` emits the canonical textual query. Rendering is deterministic
//! and side-effect-free: clauses carry an explicit [`ClauseKind`] and are
//! emitted in a fixed canonical order regardless of construction order,
//! with a later clause of the same kind replacing the earlier one.
//!
//! Class names are interpolated unquoted; string values are
//! single-quoted, numeric values bare.

use filament_record::{Edge, Entity, EntityKind, FieldValue, Vertex};
use filament_wire::{Error, Result};

pub use filament_record::BinaryType as PropertyType;

/// Everything with a canonical textual form.
pub trait Statement {
    fn parse(&self) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Values and conditions
// ---------------------------------------------------------------------------

/// A literal usable in conditions and update actions.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl SqlValue {
    /// Strings single-quoted, everything else bare.
    fn render(&self) -> String {
        match self {
            Self::Str(s) => format!("'{s}'"),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
        }
    }

    /// The unquoted text, for contexts that add their own quoting.
    fn text(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}
impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}
impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}
impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}
impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}
impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// One comparison on an attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    rendered: String,
}

impl Condition {
    pub fn new(attribute: impl Into<String>) -> ConditionOn {
        ConditionOn {
            attribute: attribute.into(),
        }
    }
}

/// A condition waiting for its comparison operator.
#[derive(Debug, Clone)]
pub struct ConditionOn {
    attribute: String,
}

impl ConditionOn {
    fn compare(self, op: &str, value: impl Into<SqlValue>) -> Condition {
        Condition {
            rendered: format!("{} {op} {}", self.attribute, value.into().render()),
        }
    }

    pub fn is_eq(self, value: impl Into<SqlValue>) -> Condition {
        self.compare("=", value)
    }

    pub fn is_le(self, value: impl Into<SqlValue>) -> Condition {
        self.compare("<=", value)
    }

    pub fn is_lt(self, value: impl Into<SqlValue>) -> Condition {
        self.compare("<", value)
    }

    pub fn is_ge(self, value: impl Into<SqlValue>) -> Condition {
        self.compare(">=", value)
    }

    pub fn is_gt(self, value: impl Into<SqlValue>) -> Condition {
        self.compare(">", value)
    }

    pub fn is_in<V: Into<SqlValue>>(self, values: impl IntoIterator<Item = V>) -> Condition {
        let rendered: Vec<String> = values.into_iter().map(|v| v.into().render()).collect();
        Condition {
            rendered: format!("{} in [{}]", self.attribute, rendered.join(", ")),
        }
    }
}

/// Operator tree under a WHERE or WHILE clause.
#[derive(Debug, Clone)]
pub enum Filter {
    Cond(Condition),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    /// A sub-select, rendered inside parentheses.
    Sub(Box<Select>),
}

impl Filter {
    pub fn and(items: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(items.into_iter().collect())
    }

    pub fn or(items: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(items.into_iter().collect())
    }

    fn render(&self) -> Result<String> {
        match self {
            Self::Cond(c) => Ok(c.rendered.clone()),
            Self::And(items) => render_group(items, " and "),
            Self::Or(items) => render_group(items, " or "),
            Self::Sub(select) => Ok(format!("({})", select.parse()?)),
        }
    }
}

impl From<Condition> for Filter {
    fn from(c: Condition) -> Self {
        Self::Cond(c)
    }
}

impl From<Select> for Filter {
    fn from(s: Select) -> Self {
        Self::Sub(Box::new(s))
    }
}

fn render_group(items: &[Filter], joiner: &str) -> Result<String> {
    let mut out = String::from(" ( ");
    for (i, item) in items.iter().enumerate() {
        out.push_str(&item.render()?);
        out.push(' ');
        if i < items.len() - 1 {
            out.push_str(joiner);
        }
    }
    out.push_str(" ) ");
    Ok(out)
}

// ---------------------------------------------------------------------------
// Clause fragments
// ---------------------------------------------------------------------------

/// Discriminant used for canonical clause ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClauseKind {
    Let,
    Where,
    While,
    GroupBy,
    OrderBy,
    Skip,
    Limit,
    Fetchplan,
    Timeout,
    Lock,
    Parallel,
    Upsert,
    Return,
}

const SELECT_ORDER: &[ClauseKind] = &[
    ClauseKind::Let,
    ClauseKind::Where,
    ClauseKind::GroupBy,
    ClauseKind::OrderBy,
    ClauseKind::Skip,
    ClauseKind::Limit,
    ClauseKind::Fetchplan,
    ClauseKind::Timeout,
    ClauseKind::Lock,
    ClauseKind::Parallel,
];
const UPDATE_ORDER: &[ClauseKind] = &[
    ClauseKind::Upsert,
    ClauseKind::Return,
    ClauseKind::Where,
    ClauseKind::Lock,
    ClauseKind::Limit,
];
const DELETE_ORDER: &[ClauseKind] = &[ClauseKind::Where, ClauseKind::Limit];
const TRAVERSE_ORDER: &[ClauseKind] = &[ClauseKind::While, ClauseKind::Limit];

#[derive(Debug, Clone)]
enum LetSource {
    Field(String),
    Select(Box<Select>),
}

/// One clause fragment with its ordering discriminant.
#[derive(Debug, Clone)]
pub struct QueryElement {
    kind: ClauseKind,
    body: ElementBody,
}

#[derive(Debug, Clone)]
enum ElementBody {
    Let { name: String, source: LetSource },
    Where(Filter),
    While(Filter),
    GroupBy(String),
    OrderBy { field: String, direction: &'static str },
    Skip(u64),
    Limit { count: u64, timeout: Option<u64> },
    Fetchplan(String),
    Timeout { millis: u64, strategy: Option<String> },
    Lock(&'static str),
    Parallel,
    Upsert,
    Return { kind: &'static str, field: Option<String> },
}

impl QueryElement {
    pub fn kind(&self) -> ClauseKind {
        self.kind
    }

    pub fn render(&self) -> Result<String> {
        Ok(match &self.body {
            ElementBody::Let { name, source } => {
                let assignment = match source {
                    LetSource::Field(f) => f.clone(),
                    LetSource::Select(s) => format!("( {} ) ", s.parse()?),
                };
                format!(" let {name} = {assignment} ")
            }
            ElementBody::Where(filter) => format!(" where {} ", filter.render()?),
            ElementBody::While(filter) => format!(" while {} ", filter.render()?),
            ElementBody::GroupBy(field) => format!(" group by {field} "),
            ElementBody::OrderBy { field, direction } => {
                format!(" order by {field} {direction} ")
            }
            ElementBody::Skip(count) => format!(" skip {count} "),
            ElementBody::Limit { count, timeout } => match timeout {
                Some(t) => format!(" limit {count} timeout {t} "),
                None => format!(" limit {count} "),
            },
            ElementBody::Fetchplan(plan) => format!(" fetchplan {plan} "),
            ElementBody::Timeout { millis, strategy } => match strategy {
                Some(s) => format!(" timeout {millis} {s} "),
                None => format!(" timeout {millis} "),
            },
            ElementBody::Lock(mode) => format!(" lock {mode} "),
            ElementBody::Parallel => " parallel ".to_string(),
            ElementBody::Upsert => " upsert ".to_string(),
            ElementBody::Return { kind, field } => match field {
                Some(f) => format!(" return {kind} {f}"),
                None => format!(" return {kind}"),
            },
        })
    }
}

/// Renders the clauses of `elements` that appear in `order`, in that
/// order, each prefixed by a space. Later clauses of a kind win.
fn render_clauses(elements: &[QueryElement], order: &[ClauseKind]) -> Result<String> {
    let mut out = String::new();
    for kind in order {
        if let Some(element) = elements.iter().rev().find(|e| e.kind == *kind) {
            out.push(' ');
            out.push_str(&element.render()?);
        }
    }
    Ok(out)
}

pub struct Where;

impl Where {
    pub fn new(filter: impl Into<Filter>) -> QueryElement {
        QueryElement {
            kind: ClauseKind::Where,
            body: ElementBody::Where(filter.into()),
        }
    }
}

pub struct While;

impl While {
    pub fn new(filter: impl Into<Filter>) -> QueryElement {
        QueryElement {
            kind: ClauseKind::While,
            body: ElementBody::While(filter.into()),
        }
    }
}

pub struct Let;

impl Let {
    pub fn by_field(name: impl Into<String>, assignment: impl Into<String>) -> QueryElement {
        QueryElement {
            kind: ClauseKind::Let,
            body: ElementBody::Let {
                name: name.into(),
                source: LetSource::Field(assignment.into()),
            },
        }
    }

    pub fn by_select(name: impl Into<String>, select: Select) -> QueryElement {
        QueryElement {
            kind: ClauseKind::Let,
            body: ElementBody::Let {
                name: name.into(),
                source: LetSource::Select(Box::new(select)),
            },
        }
    }
}

pub struct GroupBy;

impl GroupBy {
    pub fn new(field: impl Into<String>) -> QueryElement {
        QueryElement {
            kind: ClauseKind::GroupBy,
            body: ElementBody::GroupBy(field.into()),
        }
    }
}

pub struct OrderBy;

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> QueryElement {
        QueryElement {
            kind: ClauseKind::OrderBy,
            body: ElementBody::OrderBy {
                field: field.into(),
                direction: "asc",
            },
        }
    }

    pub fn desc(field: impl Into<String>) -> QueryElement {
        QueryElement {
            kind: ClauseKind::OrderBy,
            body: ElementBody::OrderBy {
                field: field.into(),
                direction: "desc",
            },
        }
    }
}

pub struct Skip;

impl Skip {
    pub fn new(count: u64) -> QueryElement {
        QueryElement {
            kind: ClauseKind::Skip,
            body: ElementBody::Skip(count),
        }
    }
}

pub struct Limit;

impl Limit {
    pub fn new(count: u64) -> QueryElement {
        QueryElement {
            kind: ClauseKind::Limit,
            body: ElementBody::Limit {
                count,
                timeout: None,
            },
        }
    }

    pub fn with_timeout(count: u64, timeout: u64) -> QueryElement {
        QueryElement {
            kind: ClauseKind::Limit,
            body: ElementBody::Limit {
                count,
                timeout: Some(timeout),
            },
        }
    }
}

pub struct Fetchplan;

impl Fetchplan {
    pub fn new(plan: impl Into<String>) -> QueryElement {
        QueryElement {
            kind: ClauseKind::Fetchplan,
            body: ElementBody::Fetchplan(plan.into()),
        }
    }
}

pub struct Timeout;

impl Timeout {
    pub fn new(millis: u64) -> QueryElement {
        QueryElement {
            kind: ClauseKind::Timeout,
            body: ElementBody::Timeout {
                millis,
                strategy: None,
            },
        }
    }

    pub fn with_strategy(millis: u64, strategy: impl Into<String>) -> QueryElement {
        QueryElement {
            kind: ClauseKind::Timeout,
            body: ElementBody::Timeout {
                millis,
                strategy: Some(strategy.into()),
            },
        }
    }
}

pub struct Lock;

impl Lock {
    pub fn default() -> QueryElement {
        QueryElement {
            kind: ClauseKind::Lock,
            body: ElementBody::Lock("default"),
        }
    }

    pub fn record() -> QueryElement {
        QueryElement {
            kind: ClauseKind::Lock,
            body: ElementBody::Lock("record"),
        }
    }
}

pub struct Parallel;

impl Parallel {
    pub fn new() -> QueryElement {
        QueryElement {
            kind: ClauseKind::Parallel,
            body: ElementBody::Parallel,
        }
    }
}

pub struct Upsert;

impl Upsert {
    pub fn new() -> QueryElement {
        QueryElement {
            kind: ClauseKind::Upsert,
            body: ElementBody::Upsert,
        }
    }
}

pub struct Return;

impl Return {
    pub fn count() -> QueryElement {
        QueryElement {
            kind: ClauseKind::Return,
            body: ElementBody::Return {
                kind: "count",
                field: None,
            },
        }
    }

    pub fn after(field: impl Into<String>) -> QueryElement {
        QueryElement {
            kind: ClauseKind::Return,
            body: ElementBody::Return {
                kind: "after",
                field: Some(field.into()),
            },
        }
    }

    pub fn before(field: impl Into<String>) -> QueryElement {
        QueryElement {
            kind: ClauseKind::Return,
            body: ElementBody::Return {
                kind: "before",
                field: Some(field.into()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// SELECT
// ---------------------------------------------------------------------------

/// `select [proj, ...] from <class> [alias] <clauses>`
#[derive(Debug, Clone)]
pub struct Select {
    class_name: String,
    alias: Option<String>,
    projections: Vec<String>,
    elements: Vec<QueryElement>,
}

impl Select {
    pub fn from(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            alias: None,
            projections: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// Target alias, usable in projections and conditions.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn projections<I, S>(mut self, projections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projections = projections.into_iter().map(Into::into).collect();
        self
    }

    pub fn with(mut self, element: QueryElement) -> Self {
        self.elements.push(element);
        self
    }

    /// The selected class, used by the materializer to filter results.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }
}

impl Statement for Select {
    fn parse(&self) -> Result<String> {
        let mut q = String::from("select ");
        if !self.projections.is_empty() {
            q.push_str(&self.projections.join(", "));
            q.push(' ');
        }
        q.push_str("from ");
        q.push_str(&self.class_name);
        if let Some(alias) = &self.alias {
            q.push(' ');
            q.push_str(alias);
        }
        q.push_str(&render_clauses(&self.elements, SELECT_ORDER)?);
        Ok(q)
    }
}

// ---------------------------------------------------------------------------
// INSERT / UPDATE
// ---------------------------------------------------------------------------

/// `insert into <class> ( fields ) values ( 'values' )`
#[derive(Debug, Clone)]
pub struct Insert {
    class_name: String,
    fields: Vec<(String, SqlValue)>,
}

impl Insert {
    pub fn into(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn value(mut self, field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    /// An insert of a detached vertex's persistent attributes.
    pub fn from_vertex(vertex: &Vertex) -> Result<Self> {
        let mut insert = Self::into(vertex.class_name());
        for (name, value) in vertex.fields() {
            insert.fields.push((name, sql_value_of(&value)?));
        }
        Ok(insert)
    }
}

impl Statement for Insert {
    fn parse(&self) -> Result<String> {
        let mut q = String::from("insert into ");
        q.push_str(&self.class_name);
        q.push(' ');
        if !self.fields.is_empty() {
            q.push_str("( ");
            let names: Vec<&str> = self.fields.iter().map(|(n, _)| n.as_str()).collect();
            q.push_str(&names.join(", "));
            q.push_str(" )");
        }
        q.push_str(" values ");
        q.push('(');
        let values: Vec<String> = self
            .fields
            .iter()
            .map(|(_, v)| format!("'{}'", v.text()))
            .collect();
        q.push_str(&values.join(","));
        q.push(')');
        Ok(q)
    }
}

/// Update target: a rid, a class, or a persisted entity.
#[derive(Debug, Clone)]
pub enum UpdateTarget {
    Rid(String),
    Class(String),
    Entity(Entity),
}

impl From<&str> for UpdateTarget {
    fn from(rid: &str) -> Self {
        Self::Rid(rid.to_string())
    }
}

impl From<Entity> for UpdateTarget {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

/// One update action: set/increment/add/remove/put field lists, or a
/// content/merge document.
#[derive(Debug, Clone)]
pub struct UpdateAction {
    verb: &'static str,
    fields: Vec<(String, SqlValue)>,
    document: Option<String>,
}

impl UpdateAction {
    fn with_fields(verb: &'static str, fields: Vec<(String, SqlValue)>) -> Self {
        Self {
            verb,
            fields,
            document: None,
        }
    }

    pub fn set(fields: Vec<(String, SqlValue)>) -> Self {
        Self::with_fields("set", fields)
    }

    pub fn increment(fields: Vec<(String, SqlValue)>) -> Self {
        Self::with_fields("increment", fields)
    }

    pub fn add(fields: Vec<(String, SqlValue)>) -> Self {
        Self::with_fields("add", fields)
    }

    pub fn remove(fields: Vec<(String, SqlValue)>) -> Self {
        Self::with_fields("remove", fields)
    }

    pub fn put(fields: Vec<(String, SqlValue)>) -> Self {
        Self::with_fields("put", fields)
    }

    pub fn content(document: impl Into<String>) -> Self {
        Self {
            verb: "content",
            fields: Vec::new(),
            document: Some(document.into()),
        }
    }

    pub fn merge(document: impl Into<String>) -> Self {
        Self {
            verb: "merge",
            fields: Vec::new(),
            document: Some(document.into()),
        }
    }

    fn render(&self) -> String {
        if let Some(document) = &self.document {
            return format!(" {} {document}", self.verb);
        }
        let assignments: Vec<String> = self
            .fields
            .iter()
            .map(|(name, value)| format!("{name} = {}", value.render()))
            .collect();
        format!(" {} {}", self.verb, assignments.join(", "))
    }
}

/// `update <target> <action> [upsert] [return ...] [where ...] ...`
#[derive(Debug, Clone)]
pub struct Update {
    target: UpdateTarget,
    action: UpdateAction,
    elements: Vec<QueryElement>,
}

impl Update {
    pub fn new(target: impl Into<UpdateTarget>, action: UpdateAction) -> Self {
        Self {
            target: target.into(),
            action,
            elements: Vec::new(),
        }
    }

    pub fn with(mut self, element: QueryElement) -> Self {
        self.elements.push(element);
        self
    }
}

impl Statement for Update {
    fn parse(&self) -> Result<String> {
        let mut q = String::from("update ");
        match &self.target {
            UpdateTarget::Rid(rid) => q.push_str(rid),
            UpdateTarget::Class(name) => q.push_str(name),
            UpdateTarget::Entity(entity) => q.push_str(&rid_of(entity)?),
        }
        q.push(' ');
        q.push_str(&self.action.render());
        q.push_str(&render_clauses(&self.elements, UPDATE_ORDER)?);
        Ok(q)
    }
}

// ---------------------------------------------------------------------------
// DELETE
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum DeleteTarget {
    /// A bare vertex/edge token, combined with byRID/fromRID/toRID.
    Kind(EntityKind),
    /// A whole class.
    Class(Class),
    /// A concrete persisted entity.
    Entity(Entity),
}

/// `delete vertex|edge <rid>|from <rid> to <rid>|<class> [where] [limit]`
#[derive(Debug, Clone)]
pub struct Delete {
    target: DeleteTarget,
    rid: Option<String>,
    from_rid: Option<String>,
    to_rid: Option<String>,
    elements: Vec<QueryElement>,
}

impl Delete {
    pub fn vertex() -> Self {
        Self::with_target(DeleteTarget::Kind(EntityKind::Vertex))
    }

    pub fn edge() -> Self {
        Self::with_target(DeleteTarget::Kind(EntityKind::Edge))
    }

    pub fn class(class: Class) -> Self {
        Self::with_target(DeleteTarget::Class(class))
    }

    pub fn entity(entity: impl Into<Entity>) -> Self {
        Self::with_target(DeleteTarget::Entity(entity.into()))
    }

    fn with_target(target: DeleteTarget) -> Self {
        Self {
            target,
            rid: None,
            from_rid: None,
            to_rid: None,
            elements: Vec::new(),
        }
    }

    pub fn by_rid(mut self, rid: impl ToString) -> Self {
        self.rid = Some(rid.to_string());
        self
    }

    pub fn from_rid(mut self, rid: impl ToString) -> Self {
        self.from_rid = Some(rid.to_string());
        self
    }

    pub fn to_rid(mut self, rid: impl ToString) -> Self {
        self.to_rid = Some(rid.to_string());
        self
    }

    pub fn with(mut self, element: QueryElement) -> Self {
        self.elements.push(element);
        self
    }

    fn render_method(&self, from_rid: Option<&String>, to_rid: Option<&String>) -> String {
        if let Some(rid) = &self.rid {
            return format!(" {rid} ");
        }
        if from_rid.is_some() || to_rid.is_some() {
            let mut out = String::new();
            if let Some(from) = from_rid {
                out.push_str(" from ");
                out.push_str(from);
            }
            if let Some(to) = to_rid {
                out.push_str(" to ");
                out.push_str(to);
            }
            out.push(' ');
            return out;
        }
        " ".to_string()
    }
}

impl Statement for Delete {
    fn parse(&self) -> Result<String> {
        let mut q = String::new();
        match &self.target {
            DeleteTarget::Kind(kind) => {
                let mut from_rid = self.from_rid.as_ref();
                let mut to_rid = self.to_rid.as_ref();
                match kind {
                    EntityKind::Vertex => {
                        if from_rid.is_some() || to_rid.is_some() {
                            tracing::warn!(
                                "from/to are not allowed on vertex deletes, dropping them"
                            );
                            from_rid = None;
                            to_rid = None;
                        }
                        q.push_str("delete vertex ");
                    }
                    EntityKind::Edge => q.push_str("delete edge "),
                }
                q.push_str(&self.render_method(from_rid, to_rid));
            }
            DeleteTarget::Class(class) => {
                q.push_str("delete ");
                match class.kind {
                    EntityKind::Vertex => q.push_str(" vertex "),
                    EntityKind::Edge => q.push_str(" edge "),
                }
                q.push_str(&class.name);
            }
            DeleteTarget::Entity(entity) => {
                q.push_str("delete ");
                match entity.kind() {
                    EntityKind::Vertex => q.push_str(" vertex "),
                    EntityKind::Edge => q.push_str(" edge "),
                }
                q.push_str(&rid_of(entity)?);
                q.push(' ');
            }
        }
        q.push_str(&render_clauses(&self.elements, DELETE_ORDER)?);
        Ok(q)
    }
}

// ---------------------------------------------------------------------------
// Schema targets: CLASS / PROPERTY / INDEX / CLUSTER
// ---------------------------------------------------------------------------

/// A persistent class and its entity base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub name: String,
    pub kind: EntityKind,
}

impl Class {
    pub fn vertex(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntityKind::Vertex,
        }
    }

    pub fn edge(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntityKind::Edge,
        }
    }

    fn base_class(&self) -> &'static str {
        match self.kind {
            EntityKind::Vertex => "V",
            EntityKind::Edge => "E",
        }
    }
}

/// A schema property declaration, with an optional linked type or class
/// (the two are mutually exclusive).
#[derive(Debug, Clone)]
pub struct Property {
    class_name: String,
    name: String,
    ty: Option<PropertyType>,
    linked_type: Option<PropertyType>,
    linked_class: Option<String>,
}

impl Property {
    pub fn new(
        class_name: impl Into<String>,
        name: impl Into<String>,
        ty: PropertyType,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            ty: Some(ty),
            linked_type: None,
            linked_class: None,
        }
    }

    /// A bare property reference, enough for DROP.
    pub fn named(class_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            ty: None,
            linked_type: None,
            linked_class: None,
        }
    }

    pub fn with_linked_class(
        class_name: impl Into<String>,
        name: impl Into<String>,
        ty: PropertyType,
        linked_class: impl Into<String>,
    ) -> Self {
        let mut property = Self::new(class_name, name, ty);
        property.linked_class = Some(linked_class.into());
        property
    }

    pub fn with_linked_type(
        class_name: impl Into<String>,
        name: impl Into<String>,
        ty: PropertyType,
        linked_type: PropertyType,
    ) -> Self {
        let mut property = Self::new(class_name, name, ty);
        property.linked_type = Some(linked_type);
        property
    }

    pub fn linked_class(mut self, linked_class: impl Into<String>) -> Self {
        self.linked_class = Some(linked_class.into());
        self
    }

    pub fn linked_type(mut self, linked_type: PropertyType) -> Self {
        self.linked_type = Some(linked_type);
        self
    }

    fn render_create(&self) -> Result<String> {
        if self.linked_type.is_some() && self.linked_class.is_some() {
            return Err(Error::SqlCommand(
                "linked type and linked class are mutually exclusive".into(),
            ));
        }
        let ty = self.ty.ok_or_else(|| {
            Error::SqlCommand(format!(
                "property {}.{} has no type",
                self.class_name, self.name
            ))
        })?;
        let mut q = format!("create property {}.{} {}", self.class_name, self.name, ty.name());
        if let Some(linked) = self.linked_type {
            q.push(' ');
            q.push_str(linked.name());
        } else if let Some(linked) = &self.linked_class {
            q.push(' ');
            q.push_str(linked);
        }
        Ok(q)
    }

    fn render_drop(&self) -> String {
        format!("drop property {}.{}", self.class_name, self.name)
    }
}

/// Index type token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    Unique,
    NotUnique,
    FullText,
}

impl IndexType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Unique => "unique",
            Self::NotUnique => "notunique",
            Self::FullText => "fulltext",
        }
    }
}

/// An index declaration: either a named index over class properties, or
/// the `Class.prop` shorthand.
#[derive(Debug, Clone)]
pub struct Index {
    name: String,
    class_name: Option<String>,
    properties: Option<Vec<String>>,
    index_type: Option<IndexType>,
    metadata: Option<String>,
}

impl Index {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: None,
            properties: None,
            index_type: None,
            metadata: None,
        }
    }

    pub fn on(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    pub fn index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = Some(index_type);
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    fn render_create(&self) -> Result<String> {
        let class_name = self.class_name.as_ref().ok_or_else(|| {
            Error::SqlCommand(format!("index '{}' has no target class", self.name))
        })?;
        let mut q = String::from("create index ");
        match &self.properties {
            Some(properties) => {
                q.push_str(&self.name);
                q.push_str(" on ");
                q.push_str(class_name);
                q.push_str(" (");
                q.push_str(&properties.join(", "));
                q.push_str(") ");
            }
            None => {
                q.push_str(class_name);
                q.push('.');
                q.push_str(&self.name);
            }
        }
        if let Some(index_type) = self.index_type {
            q.push(' ');
            q.push_str(index_type.as_str());
        }
        if let Some(metadata) = &self.metadata {
            q.push_str(" metadata ");
            q.push_str(metadata);
        }
        Ok(q)
    }
}

// ---------------------------------------------------------------------------
// CREATE / DROP
// ---------------------------------------------------------------------------

/// The inner target of a CREATE.
#[derive(Debug, Clone)]
pub enum CreateTarget {
    Vertex(Vertex),
    Edge(Edge),
    Class(Class),
    Property(Property),
    Index(Index),
    Cluster(String),
}

/// `create vertex|edge|class|property|index|cluster ...`
#[derive(Debug, Clone)]
pub struct Create {
    target: CreateTarget,
}

impl Create {
    pub fn vertex(vertex: &Vertex) -> Self {
        Self {
            target: CreateTarget::Vertex(vertex.clone()),
        }
    }

    pub fn edge(edge: &Edge) -> Self {
        Self {
            target: CreateTarget::Edge(edge.clone()),
        }
    }

    pub fn class(class: Class) -> Self {
        Self {
            target: CreateTarget::Class(class),
        }
    }

    pub fn property(property: Property) -> Self {
        Self {
            target: CreateTarget::Property(property),
        }
    }

    pub fn index(index: Index) -> Self {
        Self {
            target: CreateTarget::Index(index),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            target: CreateTarget::Cluster(name.into()),
        }
    }
}

impl Statement for Create {
    fn parse(&self) -> Result<String> {
        match &self.target {
            CreateTarget::Vertex(vertex) => {
                let mut q = String::from("create vertex ");
                q.push_str(&vertex.class_name());
                let fields = vertex.fields();
                if !fields.is_empty() {
                    q.push_str(" set ");
                    let mut first = true;
                    for (name, value) in &fields {
                        if !first {
                            q.push_str(" , ");
                        }
                        first = false;
                        q.push_str(name);
                        q.push_str(" = \"");
                        q.push_str(&sql_value_of(value)?.text());
                        q.push('"');
                    }
                }
                Ok(q)
            }
            CreateTarget::Edge(edge) => {
                let from = edge.in_vertex().ok_or_else(|| {
                    Error::SqlCommand("edge has no source vertex".into())
                })?;
                let to = edge.out_vertex().ok_or_else(|| {
                    Error::SqlCommand("edge has no target vertex".into())
                })?;
                Ok(format!(
                    "create edge {} from {} to {}",
                    edge.class_name(),
                    rid_of(&Entity::Vertex(from))?,
                    rid_of(&Entity::Vertex(to))?,
                ))
            }
            CreateTarget::Class(class) => Ok(format!(
                "create class {} extends {}",
                class.name,
                class.base_class()
            )),
            CreateTarget::Property(property) => property.render_create(),
            CreateTarget::Index(index) => index.render_create(),
            CreateTarget::Cluster(name) => Ok(format!("create cluster {name}")),
        }
    }
}

/// The inner target of a DROP.
#[derive(Debug, Clone)]
pub enum DropTarget {
    Class(String),
    Property(Property),
    Index(String),
    Cluster(String),
}

/// `drop class|property|index|cluster ...`
#[derive(Debug, Clone)]
pub struct Drop {
    target: DropTarget,
}

impl Drop {
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            target: DropTarget::Class(name.into()),
        }
    }

    pub fn property(property: Property) -> Self {
        Self {
            target: DropTarget::Property(property),
        }
    }

    pub fn index(name: impl Into<String>) -> Self {
        Self {
            target: DropTarget::Index(name.into()),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            target: DropTarget::Cluster(name.into()),
        }
    }
}

impl Statement for Drop {
    fn parse(&self) -> Result<String> {
        Ok(match &self.target {
            DropTarget::Class(name) => format!("drop class {name}"),
            DropTarget::Property(property) => property.render_drop(),
            DropTarget::Index(name) => format!("drop index {name}"),
            DropTarget::Cluster(name) => format!("drop cluster {name}"),
        })
    }
}

// ---------------------------------------------------------------------------
// MOVE / TRAVERSE / TRUNCATE
// ---------------------------------------------------------------------------

/// Where a vertex moves to.
#[derive(Debug, Clone)]
pub enum MoveTarget {
    Class(String),
    Cluster(String),
}

/// `move vertex <rid> to class:|cluster: <name>`
#[derive(Debug, Clone)]
pub struct Move {
    rid: String,
    to: MoveTarget,
}

impl Move {
    pub fn to_class(rid: impl ToString, class_name: impl Into<String>) -> Self {
        Self {
            rid: rid.to_string(),
            to: MoveTarget::Class(class_name.into()),
        }
    }

    pub fn to_cluster(rid: impl ToString, cluster: impl Into<String>) -> Self {
        Self {
            rid: rid.to_string(),
            to: MoveTarget::Cluster(cluster.into()),
        }
    }
}

impl Statement for Move {
    fn parse(&self) -> Result<String> {
        Ok(match &self.to {
            MoveTarget::Class(name) => {
                format!("move vertex {} to class: {name}", self.rid)
            }
            MoveTarget::Cluster(name) => {
                format!("move vertex {} to cluster: {name}", self.rid)
            }
        })
    }
}

/// A traverse origin: rid, class, cluster, sub-select, or several of any.
#[derive(Debug, Clone)]
pub enum TraverseTarget {
    Rid(String),
    Class(String),
    Cluster(String),
    Select(Box<Select>),
    Multi(Vec<TraverseTarget>),
}

impl TraverseTarget {
    pub fn rids<I, S>(rids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self::Multi(rids.into_iter().map(|r| Self::Rid(r.to_string())).collect())
    }

    fn render(&self) -> Result<String> {
        Ok(match self {
            Self::Rid(rid) => format!("{rid} "),
            Self::Class(name) | Self::Cluster(name) => format!("{name} "),
            Self::Select(select) => format!(" ( {} ) ", select.parse()?),
            Self::Multi(targets) => {
                let mut parts = Vec::with_capacity(targets.len());
                for target in targets {
                    parts.push(target.render()?.trim_end().to_string());
                }
                format!("{} ", parts.join(", "))
            }
        })
    }
}

impl From<Select> for TraverseTarget {
    fn from(select: Select) -> Self {
        Self::Select(Box::new(select))
    }
}

/// `traverse <fields>  from <target> [while ...] [limit ...]`
#[derive(Debug, Clone)]
pub struct Traverse {
    target: TraverseTarget,
    fields: Vec<String>,
    elements: Vec<QueryElement>,
}

impl Traverse {
    pub fn new<I, S>(target: impl Into<TraverseTarget>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target: target.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            elements: Vec::new(),
        }
    }

    pub fn with(mut self, element: QueryElement) -> Self {
        self.elements.push(element);
        self
    }
}

impl From<&str> for TraverseTarget {
    fn from(rid: &str) -> Self {
        Self::Rid(rid.to_string())
    }
}

impl Statement for Traverse {
    fn parse(&self) -> Result<String> {
        let mut q = String::from("traverse ");
        q.push_str(&self.fields.join(", "));
        q.push(' ');
        q.push_str(" from ");
        q.push_str(&self.target.render()?);
        q.push_str(&render_clauses(&self.elements, TRAVERSE_ORDER)?);
        Ok(q)
    }
}

/// `truncate class|cluster|record <name>`
#[derive(Debug, Clone)]
pub struct Truncate {
    scope: &'static str,
    name: String,
}

impl Truncate {
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            scope: "class",
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            scope: "cluster",
            name: name.into(),
        }
    }

    pub fn record(rid: impl ToString) -> Self {
        Self {
            scope: "record",
            name: rid.to_string(),
        }
    }
}

impl Statement for Truncate {
    fn parse(&self) -> Result<String> {
        Ok(format!("truncate {} {}", self.scope, self.name))
    }
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn rid_of(entity: &Entity) -> Result<String> {
    entity
        .rid()
        .map(|rid| rid.to_string())
        .ok_or_else(|| Error::SqlCommand("entity has no rid yet".into()))
}

/// Scalar field values usable in statements; anything structured cannot
/// appear in a textual query.
fn sql_value_of(value: &FieldValue) -> Result<SqlValue> {
    Ok(match value {
        FieldValue::String(s) => SqlValue::Str(s.clone()),
        FieldValue::Integer(v) => SqlValue::Int(i64::from(*v)),
        FieldValue::Short(v) => SqlValue::Int(i64::from(*v)),
        FieldValue::Long(v) => SqlValue::Int(*v),
        FieldValue::Byte(v) => SqlValue::Int(i64::from(*v)),
        FieldValue::Float(v) => SqlValue::Float(f64::from(*v)),
        FieldValue::Double(v) => SqlValue::Float(*v),
        FieldValue::Boolean(v) => SqlValue::Bool(*v),
        FieldValue::Link(rid) => SqlValue::Str(rid.to_string()),
        other => {
            return Err(Error::SqlCommand(format!(
                "value {other:?} cannot appear in a query string"
            )));
        }
    })
}
