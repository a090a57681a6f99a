//! Resource and statement storage.
//!
//! Implements the `Repository` capability: equality search on one property,
//! create, and update with either replace or append merge semantics.
//! Drafts are validated before anything is written; a rejected draft is
//! either an error or a logged no-op depending on `continue_on_error`.

use super::{Database, now_ms};
use crate::error::SyncError;
use crate::repository::{Repository, Schema};
use crate::types::{
    CollectionAction, ObjectDraft, ObjectId, PropertyId, Statement, TargetObject, Value,
    WriteOptions,
};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Column values for one statement: (value_type, value, uri, value_resource_id).
fn columns(value: &Value) -> (&'static str, Option<&str>, Option<&str>, Option<ObjectId>) {
    match value {
        Value::Literal(text) => ("literal", Some(text.as_str()), None, None),
        Value::Uri(uri) => ("uri", None, Some(uri.as_str()), None),
        Value::Resource(id) => ("resource", None, None, Some(*id)),
    }
}

fn exists(conn: &Connection, sql: &str, id: i64) -> Result<bool> {
    Ok(conn
        .query_row(sql, params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

/// Check a draft against the schema and the stored resources.
/// Returns the rejection reason, if any.
fn validate_draft(conn: &Connection, draft: &ObjectDraft) -> Result<Option<String>> {
    if let Some(class_id) = draft.resource_class
        && !exists(conn, "SELECT 1 FROM resource_classes WHERE id = ?1", class_id)?
    {
        return Ok(Some(format!("unknown resource class {}", class_id)));
    }

    if let Some(set_id) = draft.item_set
        && !exists(
            conn,
            "SELECT 1 FROM resources WHERE id = ?1 AND kind = 'item_set'",
            set_id,
        )?
    {
        return Ok(Some(format!("item set {} does not exist", set_id)));
    }

    for statement in &draft.statements {
        if !exists(conn, "SELECT 1 FROM properties WHERE id = ?1", statement.property)? {
            return Ok(Some(format!("unknown property {}", statement.property)));
        }
        let reason = match &statement.value {
            Value::Literal(text) | Value::Uri(text) => text.trim().is_empty().then(|| {
                format!(
                    "empty {} value for property {}",
                    statement.value.type_name(),
                    statement.property
                )
            }),
            Value::Resource(id) => {
                let found = exists(conn, "SELECT 1 FROM resources WHERE id = ?1", *id)?;
                (!found).then(|| {
                    format!(
                        "property {} references missing resource {}",
                        statement.property, id
                    )
                })
            }
        };
        if reason.is_some() {
            return Ok(reason);
        }
    }

    Ok(None)
}

fn insert_statement(conn: &Connection, resource_id: ObjectId, statement: &Statement) -> Result<()> {
    let (value_type, value, uri, value_resource_id) = columns(&statement.value);
    conn.execute(
        "INSERT INTO statements (resource_id, property_id, value_type, value, uri, value_resource_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![resource_id, statement.property, value_type, value, uri, value_resource_id],
    )?;
    Ok(())
}

fn statement_exists(conn: &Connection, resource_id: ObjectId, statement: &Statement) -> Result<bool> {
    let (value_type, value, uri, value_resource_id) = columns(&statement.value);
    Ok(conn
        .query_row(
            "SELECT 1 FROM statements
             WHERE resource_id = ?1 AND property_id = ?2 AND value_type = ?3
               AND value IS ?4 AND uri IS ?5 AND value_resource_id IS ?6",
            params![resource_id, statement.property, value_type, value, uri, value_resource_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn add_membership(conn: &Connection, item_id: ObjectId, item_set: Option<ObjectId>) -> Result<()> {
    if let Some(set_id) = item_set {
        conn.execute(
            "INSERT OR IGNORE INTO item_set_members (item_id, item_set_id) VALUES (?1, ?2)",
            params![item_id, set_id],
        )?;
    }
    Ok(())
}

fn load_object(conn: &Connection, id: ObjectId) -> Result<Option<TargetObject>> {
    let resource_class: Option<Option<i64>> = conn
        .query_row(
            "SELECT resource_class_id FROM resources WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(resource_class) = resource_class else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT property_id, value_type, value, uri, value_resource_id
         FROM statements WHERE resource_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![id], |row| {
        let property: PropertyId = row.get(0)?;
        let value_type: String = row.get(1)?;
        let value: Option<String> = row.get(2)?;
        let uri: Option<String> = row.get(3)?;
        let value_resource_id: Option<i64> = row.get(4)?;
        Ok((property, value_type, value, uri, value_resource_id))
    })?;

    let mut statements = Vec::new();
    for row in rows {
        let (property, value_type, value, uri, value_resource_id) = row?;
        let value = match (value_type.as_str(), value, uri, value_resource_id) {
            ("uri", _, Some(uri), _) => Value::Uri(uri),
            ("resource", _, _, Some(rid)) => Value::Resource(rid),
            (_, Some(text), _, _) => Value::Literal(text),
            _ => continue,
        };
        statements.push(Statement { property, value });
    }

    let mut stmt = conn.prepare(
        "SELECT item_set_id FROM item_set_members WHERE item_id = ?1 ORDER BY item_set_id",
    )?;
    let item_sets = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<ObjectId>>>()?;

    Ok(Some(TargetObject {
        id,
        resource_class,
        item_sets,
        statements,
    }))
}

/// Log or raise a validation rejection.
fn rejected(opts: WriteOptions, reason: String) -> Result<Option<TargetObject>> {
    if opts.continue_on_error {
        warn!(reason = %reason, "repository rejected write, continuing");
        Ok(None)
    } else {
        Err(SyncError::validation(reason).into())
    }
}

impl Database {
    /// Create an item set (a collection that imported items join).
    pub fn create_item_set(&self, title: &str, title_property: PropertyId) -> Result<ObjectId> {
        let now = now_ms();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO resources (kind, resource_class_id, created_at, modified_at)
                 VALUES ('item_set', NULL, ?1, ?1)",
                params![now],
            )?;
            let id = tx.last_insert_rowid();
            insert_statement(&tx, id, &Statement::literal(title_property, title))?;
            tx.commit()?;
            Ok(id)
        })
    }

    /// Number of items, optionally restricted to one resource class.
    pub fn count_items(&self, resource_class: Option<i64>) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = match resource_class {
                Some(class_id) => conn.query_row(
                    "SELECT COUNT(*) FROM resources WHERE kind = 'item' AND resource_class_id = ?1",
                    params![class_id],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    "SELECT COUNT(*) FROM resources WHERE kind = 'item'",
                    [],
                    |row| row.get(0),
                )?,
            };
            Ok(count as usize)
        })
    }

    /// Ids of items that are members of an item set.
    pub fn item_set_members(&self, item_set: ObjectId) -> Result<Vec<ObjectId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT item_id FROM item_set_members WHERE item_set_id = ?1 ORDER BY item_id",
            )?;
            let ids = stmt
                .query_map(params![item_set], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<ObjectId>>>()?;
            Ok(ids)
        })
    }
}

impl Repository for Database {
    fn schema(&self) -> Result<Schema> {
        self.load_schema()
    }

    fn get(&self, id: ObjectId) -> Result<Option<TargetObject>> {
        self.with_conn(|conn| load_object(conn, id))
    }

    fn search(&self, property: PropertyId, value: &str) -> Result<Vec<TargetObject>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT s.resource_id FROM statements s
                 JOIN resources r ON r.id = s.resource_id
                 WHERE r.kind = 'item' AND s.property_id = ?1 AND (s.value = ?2 OR s.uri = ?2)
                 ORDER BY s.resource_id",
            )?;
            let ids = stmt
                .query_map(params![property, value], |row| row.get::<_, ObjectId>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut objects = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(object) = load_object(conn, id)? {
                    objects.push(object);
                }
            }
            Ok(objects)
        })
    }

    fn create(&self, draft: &ObjectDraft, opts: WriteOptions) -> Result<Option<TargetObject>> {
        let now = now_ms();
        let outcome = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if let Some(reason) = validate_draft(&tx, draft)? {
                return Ok(Err(reason));
            }

            tx.execute(
                "INSERT INTO resources (kind, resource_class_id, created_at, modified_at)
                 VALUES ('item', ?1, ?2, ?2)",
                params![draft.resource_class, now],
            )?;
            let id = tx.last_insert_rowid();
            add_membership(&tx, id, draft.item_set)?;
            for statement in &draft.statements {
                insert_statement(&tx, id, statement)?;
            }

            let object = load_object(&tx, id)?;
            tx.commit()?;
            Ok(Ok(object))
        })?;

        match outcome {
            Ok(object) => Ok(object),
            Err(reason) => rejected(opts, reason),
        }
    }

    fn update(
        &self,
        id: ObjectId,
        draft: &ObjectDraft,
        opts: WriteOptions,
    ) -> Result<Option<TargetObject>> {
        let now = now_ms();
        let outcome = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !exists(&tx, "SELECT 1 FROM resources WHERE id = ?1 AND kind = 'item'", id)? {
                return Ok(Err(format!("item {} does not exist", id)));
            }
            if let Some(reason) = validate_draft(&tx, draft)? {
                return Ok(Err(reason));
            }

            if !opts.partial {
                tx.execute("DELETE FROM statements WHERE resource_id = ?1", params![id])?;
                for statement in &draft.statements {
                    insert_statement(&tx, id, statement)?;
                }
            } else {
                match opts.collection {
                    CollectionAction::Replace => {
                        let touched: HashSet<PropertyId> =
                            draft.statements.iter().map(|s| s.property).collect();
                        for property in touched {
                            tx.execute(
                                "DELETE FROM statements WHERE resource_id = ?1 AND property_id = ?2",
                                params![id, property],
                            )?;
                        }
                        for statement in &draft.statements {
                            insert_statement(&tx, id, statement)?;
                        }
                    }
                    CollectionAction::Append => {
                        for statement in &draft.statements {
                            if !statement_exists(&tx, id, statement)? {
                                insert_statement(&tx, id, statement)?;
                            }
                        }
                    }
                }
            }

            if let Some(class_id) = draft.resource_class {
                tx.execute(
                    "UPDATE resources SET resource_class_id = ?2 WHERE id = ?1",
                    params![id, class_id],
                )?;
            }
            add_membership(&tx, id, draft.item_set)?;
            tx.execute(
                "UPDATE resources SET modified_at = ?2 WHERE id = ?1",
                params![id, now],
            )?;

            let object = load_object(&tx, id)?;
            tx.commit()?;
            Ok(Ok(object))
        })?;

        match outcome {
            Ok(object) => Ok(object),
            Err(reason) => rejected(opts, reason),
        }
    }

    fn attach_file(&self, id: ObjectId, file: &Path, source: &str) -> Result<i64> {
        self.ingest_media(id, file, source)
    }
}
