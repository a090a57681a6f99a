//! Core types for the graph store and the import ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a resource (item or item set) in the graph store.
pub type ObjectId = i64;

/// Identifier of a property in the graph schema.
pub type PropertyId = i64;

/// Identifier of a resource class in the graph schema.
pub type ClassId = i64;

/// A vocabulary term written as `prefix:local_name` (e.g. `dcterms:title`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Term {
    pub prefix: String,
    pub local_name: String,
}

impl Term {
    pub fn new(prefix: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.local_name)
    }
}

impl FromStr for Term {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => {
                Ok(Term::new(prefix.trim(), local.trim()))
            }
            _ => Err(format!("invalid term '{}': expected prefix:local_name", s)),
        }
    }
}

impl TryFrom<String> for Term {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Term> for String {
    fn from(term: Term) -> Self {
        term.to_string()
    }
}

/// The value side of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Literal(String),
    Uri(String),
    Resource(ObjectId),
}

impl Value {
    /// Storage tag used in the `statements.value_type` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Literal(_) => "literal",
            Value::Uri(_) => "uri",
            Value::Resource(_) => "resource",
        }
    }
}

/// A single property/value pair attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub property: PropertyId,
    pub value: Value,
}

impl Statement {
    pub fn literal(property: PropertyId, value: impl Into<String>) -> Self {
        Self {
            property,
            value: Value::Literal(value.into()),
        }
    }

    pub fn uri(property: PropertyId, uri: impl Into<String>) -> Self {
        Self {
            property,
            value: Value::Uri(uri.into()),
        }
    }

    pub fn resource(property: PropertyId, id: ObjectId) -> Self {
        Self {
            property,
            value: Value::Resource(id),
        }
    }
}

/// A resource loaded from the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetObject {
    pub id: ObjectId,
    pub resource_class: Option<ClassId>,
    pub item_sets: Vec<ObjectId>,
    pub statements: Vec<Statement>,
}

impl TargetObject {
    /// All values of one property, in insertion order.
    pub fn values(&self, property: PropertyId) -> impl Iterator<Item = &Value> {
        self.statements
            .iter()
            .filter(move |s| s.property == property)
            .map(|s| &s.value)
    }

    /// First literal (or URI) text carried by a property.
    pub fn text(&self, property: PropertyId) -> Option<&str> {
        self.values(property).find_map(|v| match v {
            Value::Literal(s) | Value::Uri(s) => Some(s.as_str()),
            Value::Resource(_) => None,
        })
    }
}

/// The payload of a create or update call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectDraft {
    pub resource_class: Option<ClassId>,
    pub item_set: Option<ObjectId>,
    pub statements: Vec<Statement>,
}

impl ObjectDraft {
    pub fn new(resource_class: Option<ClassId>) -> Self {
        Self {
            resource_class,
            ..Default::default()
        }
    }

    pub fn in_item_set(mut self, item_set: ObjectId) -> Self {
        self.item_set = Some(item_set);
        self
    }

    pub fn with(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn has_property(&self, property: PropertyId) -> bool {
        self.statements.iter().any(|s| s.property == property)
    }
}

/// How multi-valued properties are merged on a partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionAction {
    /// Values of every property named in the draft replace the stored ones.
    #[default]
    Replace,
    /// Values are added next to the stored ones; exact duplicates are skipped.
    Append,
}

/// Options for repository writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Only touch the properties present in the draft.
    pub partial: bool,
    pub collection: CollectionAction,
    /// Turn a validation rejection into a logged no-op.
    pub continue_on_error: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            partial: false,
            collection: CollectionAction::Replace,
            continue_on_error: true,
        }
    }
}

impl WriteOptions {
    pub fn partial() -> Self {
        Self {
            partial: true,
            ..Default::default()
        }
    }

    pub fn append() -> Self {
        Self {
            partial: true,
            collection: CollectionAction::Append,
            continue_on_error: true,
        }
    }

    pub fn strict(mut self) -> Self {
        self.continue_on_error = false;
        self
    }
}

/// Action recorded in the import ledger for one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LedgerAction {
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "createTag")]
    CreateTag,
    #[serde(rename = "createActor")]
    CreateActor,
    #[serde(rename = "createCita")]
    CreateCita,
    #[serde(rename = "updateCita")]
    UpdateCita,
    #[serde(rename = "createNote")]
    CreateNote,
    #[serde(rename = "createAnnotation")]
    CreateAnnotation,
    #[serde(rename = "updateAnnotation")]
    UpdateAnnotation,
}

impl LedgerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerAction::Create => "create",
            LedgerAction::Update => "update",
            LedgerAction::CreateTag => "createTag",
            LedgerAction::CreateActor => "createActor",
            LedgerAction::CreateCita => "createCita",
            LedgerAction::UpdateCita => "updateCita",
            LedgerAction::CreateNote => "createNote",
            LedgerAction::CreateAnnotation => "createAnnotation",
            LedgerAction::UpdateAnnotation => "updateAnnotation",
        }
    }

    /// Whether this action created the object (as opposed to updating it).
    pub fn is_create(&self) -> bool {
        !matches!(
            self,
            LedgerAction::Update | LedgerAction::UpdateCita | LedgerAction::UpdateAnnotation
        )
    }
}

impl fmt::Display for LedgerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(LedgerAction::Create),
            "update" => Ok(LedgerAction::Update),
            "createTag" => Ok(LedgerAction::CreateTag),
            "createActor" => Ok(LedgerAction::CreateActor),
            "createCita" => Ok(LedgerAction::CreateCita),
            "updateCita" => Ok(LedgerAction::UpdateCita),
            "createNote" => Ok(LedgerAction::CreateNote),
            "createAnnotation" => Ok(LedgerAction::CreateAnnotation),
            "updateAnnotation" => Ok(LedgerAction::UpdateAnnotation),
            other => Err(format!("unknown ledger action: {}", other)),
        }
    }
}

/// One row of the import ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub import_id: i64,
    pub item_id: ObjectId,
    pub diigo_key: String,
    pub action: LedgerAction,
    pub created_at: i64,
}

/// Lifecycle of an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Running,
    Completed,
    Stopped,
    Error,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Running => "running",
            ImportStatus::Completed => "completed",
            ImportStatus::Stopped => "stopped",
            ImportStatus::Error => "error",
        }
    }
}

impl FromStr for ImportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(ImportStatus::Running),
            "completed" => Ok(ImportStatus::Completed),
            "stopped" => Ok(ImportStatus::Stopped),
            "error" => Ok(ImportStatus::Error),
            other => Err(format!("unknown import status: {}", other)),
        }
    }
}

/// An import run (one invocation of the sync job).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRun {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub version: i32,
    pub transport: String,
    pub status: ImportStatus,
    pub error: Option<String>,
    pub started_at: i64,
    pub finished_at: Option<i64>,
}
