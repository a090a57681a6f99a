//! Find-by-natural-key-else-create for single entities.

use crate::error::{SyncError, SyncResult};
use crate::repository::{ImportLedger, Repository};
use crate::types::{
    LedgerAction, ObjectDraft, ObjectId, PropertyId, Statement, TargetObject, WriteOptions,
};
use tracing::{debug, warn};

/// A `(property, value)` pair that identifies at most one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKey {
    pub property: PropertyId,
    pub value: String,
    uri: bool,
}

impl NaturalKey {
    pub fn literal(property: PropertyId, value: impl Into<String>) -> Self {
        Self {
            property,
            value: value.into(),
            uri: false,
        }
    }

    /// A key stored as a URI statement (bookmark URLs).
    pub fn uri(property: PropertyId, value: impl Into<String>) -> Self {
        Self {
            property,
            value: value.into(),
            uri: true,
        }
    }

    /// The statement that carries this key on a stored object.
    pub fn statement(&self) -> Statement {
        if self.uri {
            Statement::uri(self.property, self.value.as_str())
        } else {
            Statement::literal(self.property, self.value.as_str())
        }
    }
}

/// Ledger actions recorded for the create and update branch of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPair {
    pub create: LedgerAction,
    pub update: LedgerAction,
}

impl ActionPair {
    pub const ITEM: ActionPair = ActionPair {
        create: LedgerAction::Create,
        update: LedgerAction::Update,
    };
    pub const CITATION: ActionPair = ActionPair {
        create: LedgerAction::CreateCita,
        update: LedgerAction::UpdateCita,
    };
    pub const ANNOTATION: ActionPair = ActionPair {
        create: LedgerAction::CreateAnnotation,
        update: LedgerAction::UpdateAnnotation,
    };
}

/// Result of a successful write.
#[derive(Debug, Clone)]
pub struct Upserted {
    pub object: TargetObject,
    pub action: LedgerAction,
}

impl Upserted {
    pub fn id(&self) -> ObjectId {
        self.object.id
    }

    pub fn created(&self) -> bool {
        self.action.is_create()
    }
}

/// Writes entities of one import and keeps its ledger.
pub struct Upserter<'a, R> {
    repo: &'a R,
    import_id: i64,
}

impl<'a, R: Repository + ImportLedger> Upserter<'a, R> {
    pub fn new(repo: &'a R, import_id: i64) -> Self {
        Self { repo, import_id }
    }

    /// First object carrying the key, in ascending id order.
    pub fn find_one(&self, key: &NaturalKey) -> SyncResult<Option<TargetObject>> {
        let mut found = self.repo.search(key.property, &key.value)?;
        if found.len() > 1 {
            debug!(
                key = %key.value,
                matches = found.len(),
                "natural key is ambiguous, using the oldest object"
            );
        }
        Ok((!found.is_empty()).then(|| found.swap_remove(0)))
    }

    /// Update the object found by `key` (per-property overwrite) or create it.
    ///
    /// `Ok(None)` when the repository rejected the write; nothing is
    /// recorded in that case.
    pub fn upsert(
        &self,
        key: &NaturalKey,
        mut draft: ObjectDraft,
        actions: ActionPair,
    ) -> SyncResult<Option<Upserted>> {
        let (written, action) = match self.find_one(key)? {
            Some(existing) => (
                self.repo.update(existing.id, &draft, WriteOptions::partial())?,
                actions.update,
            ),
            None => {
                if !draft.has_property(key.property) {
                    draft.push(key.statement());
                }
                (
                    self.repo.create(&draft, WriteOptions::default())?,
                    actions.create,
                )
            }
        };

        Ok(written.map(|object| {
            self.record(object.id, &key.value, action);
            Upserted { object, action }
        }))
    }

    /// Return the object found by `key` untouched, or create it from `build`.
    pub fn resolve_or_create<F>(
        &self,
        key: &NaturalKey,
        build: F,
        create_action: LedgerAction,
    ) -> SyncResult<Option<TargetObject>>
    where
        F: FnOnce() -> ObjectDraft,
    {
        if let Some(existing) = self.find_one(key)? {
            return Ok(Some(existing));
        }

        let mut draft = build();
        if !draft.has_property(key.property) {
            draft.push(key.statement());
        }
        let created = self.repo.create(&draft, WriteOptions::default())?;
        if let Some(object) = &created {
            self.record(object.id, &key.value, create_action);
        }
        Ok(created)
    }

    /// Append a ledger entry. A failed ledger write never fails the import.
    pub fn record(&self, target_id: ObjectId, diigo_key: &str, action: LedgerAction) {
        if let Err(err) = self
            .repo
            .record(self.import_id, target_id, diigo_key, action)
        {
            warn!(
                import_id = self.import_id,
                target_id,
                action = %action,
                error = %SyncError::from(err),
                "failed to record ledger entry"
            );
        }
    }
}
