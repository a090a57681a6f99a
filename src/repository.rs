//! Capabilities the sync job consumes from the target store.
//!
//! The job only talks to these traits; `db::Database` is the bundled
//! SQLite implementation.

use crate::types::{
    ClassId, LedgerAction, ObjectDraft, ObjectId, PropertyId, Statement, TargetObject, Term,
    WriteOptions,
};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

/// Snapshot of the target schema, loaded once per job.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    vocabularies: HashMap<String, String>,
    properties: HashMap<Term, PropertyId>,
    classes: HashMap<Term, ClassId>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vocabulary(&mut self, prefix: impl Into<String>, namespace_uri: impl Into<String>) {
        self.vocabularies.insert(prefix.into(), namespace_uri.into());
    }

    pub fn add_property(&mut self, term: Term, id: PropertyId) {
        self.properties.insert(term, id);
    }

    pub fn add_class(&mut self, term: Term, id: ClassId) {
        self.classes.insert(term, id);
    }

    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.vocabularies.get(prefix).map(String::as_str)
    }

    pub fn property(&self, term: &Term) -> Option<PropertyId> {
        self.properties.get(term).copied()
    }

    pub fn class(&self, term: &Term) -> Option<ClassId> {
        self.classes.get(term).copied()
    }
}

/// Generic object storage of the target graph.
pub trait Repository {
    /// Load vocabularies, properties and resource classes.
    fn schema(&self) -> Result<Schema>;

    /// Read one object (item or item set).
    fn get(&self, id: ObjectId) -> Result<Option<TargetObject>>;

    /// Equality search on one property; results in ascending id order.
    fn search(&self, property: PropertyId, value: &str) -> Result<Vec<TargetObject>>;

    /// Create an item. `Ok(None)` means the draft was rejected and
    /// `continue_on_error` turned the rejection into a no-op.
    fn create(&self, draft: &ObjectDraft, opts: WriteOptions) -> Result<Option<TargetObject>>;

    /// Update an item, merging per `opts`. `Ok(None)` as for `create`.
    fn update(
        &self,
        id: ObjectId,
        draft: &ObjectDraft,
        opts: WriteOptions,
    ) -> Result<Option<TargetObject>>;

    /// Ingest a local file as media of an item. The caller owns `file`.
    fn attach_file(&self, id: ObjectId, file: &Path, source: &str) -> Result<i64>;

    /// Convenience: append statements to an item without touching others.
    fn append(&self, id: ObjectId, statements: Vec<Statement>) -> Result<Option<TargetObject>> {
        let draft = ObjectDraft {
            statements,
            ..Default::default()
        };
        self.update(id, &draft, WriteOptions::append())
    }
}

/// Append-only audit trail of the writes an import performed.
pub trait ImportLedger {
    fn record(
        &self,
        import_id: i64,
        target_id: ObjectId,
        diigo_key: &str,
        action: LedgerAction,
    ) -> Result<()>;
}
