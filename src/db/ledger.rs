//! Import runs and their ledger entries.

use super::{Database, now_ms};
use crate::repository::ImportLedger;
use crate::types::{ImportRun, ImportStatus, LedgerAction, LedgerEntry, ObjectId};
use anyhow::{Result, anyhow};
use rusqlite::{OptionalExtension, Row, params};
use std::collections::BTreeMap;

fn row_to_import(row: &Row<'_>) -> rusqlite::Result<(ImportRun, String)> {
    let status: String = row.get(5)?;
    Ok((
        ImportRun {
            id: row.get(0)?,
            name: row.get(1)?,
            url: row.get(2)?,
            version: row.get(3)?,
            transport: row.get(4)?,
            status: ImportStatus::Running,
            error: row.get(6)?,
            started_at: row.get(7)?,
            finished_at: row.get(8)?,
        },
        status,
    ))
}

fn with_status((mut run, status): (ImportRun, String)) -> Result<ImportRun> {
    run.status = status.parse().map_err(|e: String| anyhow!(e))?;
    Ok(run)
}

const IMPORT_COLUMNS: &str =
    "id, name, url, version, transport, status, error, started_at, finished_at";

impl Database {
    /// Register a new import run in the `running` state.
    pub fn create_import(&self, name: &str, url: &str, version: i32, transport: &str) -> Result<i64> {
        let now = now_ms();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO imports (name, url, version, transport, status, started_at)
                 VALUES (?1, ?2, ?3, ?4, 'running', ?5)",
                params![name, url, version, transport, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Mark an import run as finished.
    pub fn finish_import(&self, id: i64, status: ImportStatus, error: Option<&str>) -> Result<()> {
        let now = now_ms();
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE imports SET status = ?2, error = ?3, finished_at = ?4 WHERE id = ?1",
                params![id, status.as_str(), error, now],
            )?;
            if updated == 0 {
                return Err(anyhow!("import {} not found", id));
            }
            Ok(())
        })
    }

    pub fn get_import(&self, id: i64) -> Result<Option<ImportRun>> {
        let row = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM imports WHERE id = ?1", IMPORT_COLUMNS),
                    params![id],
                    row_to_import,
                )
                .optional()?)
        })?;
        row.map(with_status).transpose()
    }

    /// All import runs, newest first.
    pub fn list_imports(&self) -> Result<Vec<ImportRun>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM imports ORDER BY id DESC",
                IMPORT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], row_to_import)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(with_status).collect()
    }

    /// Number of ledger entries per action for one import.
    pub fn import_action_counts(&self, import_id: i64) -> Result<BTreeMap<String, usize>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT action, COUNT(*) FROM import_items WHERE import_id = ?1 GROUP BY action",
            )?;
            let counts = stmt
                .query_map(params![import_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
                })?
                .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
            Ok(counts)
        })
    }

    /// Ledger entries of one import in write order.
    pub fn ledger_entries(&self, import_id: i64) -> Result<Vec<LedgerEntry>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, import_id, item_id, diigo_key, action, created_at
                 FROM import_items WHERE import_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map(params![import_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(id, import_id, item_id, diigo_key, action, created_at)| {
                Ok(LedgerEntry {
                    id,
                    import_id,
                    item_id,
                    diigo_key,
                    action: action.parse().map_err(|e: String| anyhow!(e))?,
                    created_at,
                })
            })
            .collect()
    }
}

impl ImportLedger for Database {
    fn record(
        &self,
        import_id: i64,
        target_id: ObjectId,
        diigo_key: &str,
        action: LedgerAction,
    ) -> Result<()> {
        let now = now_ms();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO import_items (import_id, item_id, diigo_key, action, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![import_id, target_id, diigo_key, action.as_str(), now],
            )?;
            Ok(())
        })
    }
}
