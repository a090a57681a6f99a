//! Media ingestion: copies a local file under the media directory and
//! records it against an item.

use super::{Database, now_ms};
use crate::types::ObjectId;
use anyhow::{Context, Result, anyhow};
use rusqlite::params;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A stored media file.
#[derive(Debug, Clone, Serialize)]
pub struct Media {
    pub id: i64,
    pub resource_id: ObjectId,
    pub source: String,
    pub storage_path: String,
    pub size_bytes: i64,
    pub created_at: i64,
}

/// File extension taken from the source URI, if it looks like one.
fn extension_of(source: &str) -> Option<&str> {
    let path = source.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then_some(ext)
}

impl Database {
    /// Copy `file` into `<media_dir>/<item id>/` and record it.
    ///
    /// The row and the copy are committed together: a failed copy leaves no
    /// media row behind.
    pub fn ingest_media(&self, resource_id: ObjectId, file: &Path, source: &str) -> Result<i64> {
        let media_dir = self
            .media_dir()
            .ok_or_else(|| anyhow!("no media directory configured"))?
            .to_path_buf();
        let size = std::fs::metadata(file)
            .with_context(|| format!("cannot stat {}", file.display()))?
            .len() as i64;
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO media (resource_id, source, storage_path, size_bytes, created_at)
                 VALUES (?1, ?2, '', ?3, ?4)",
                params![resource_id, source, size, now],
            )?;
            let media_id = tx.last_insert_rowid();

            let file_name = match extension_of(source) {
                Some(ext) => format!("{}.{}", media_id, ext),
                None => media_id.to_string(),
            };
            let dir: PathBuf = media_dir.join(resource_id.to_string());
            std::fs::create_dir_all(&dir)?;
            let target = dir.join(file_name);
            std::fs::copy(file, &target)
                .with_context(|| format!("cannot copy media to {}", target.display()))?;

            tx.execute(
                "UPDATE media SET storage_path = ?2 WHERE id = ?1",
                params![media_id, target.to_string_lossy()],
            )?;
            tx.commit()?;
            Ok(media_id)
        })
    }

    /// Media attached to an item.
    pub fn get_media(&self, resource_id: ObjectId) -> Result<Vec<Media>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, resource_id, source, storage_path, size_bytes, created_at
                 FROM media WHERE resource_id = ?1 ORDER BY id",
            )?;
            let media = stmt
                .query_map(params![resource_id], |row| {
                    Ok(Media {
                        id: row.get(0)?,
                        resource_id: row.get(1)?,
                        source: row.get(2)?,
                        storage_path: row.get(3)?,
                        size_bytes: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(media)
        })
    }
}
