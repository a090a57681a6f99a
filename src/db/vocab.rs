//! Vocabulary, property and resource class lookups.

use super::Database;
use crate::repository::Schema;
use crate::types::Term;
use anyhow::Result;

impl Database {
    /// Load every vocabulary with its properties and classes.
    pub fn load_schema(&self) -> Result<Schema> {
        self.with_conn(|conn| {
            let mut schema = Schema::new();

            let mut stmt = conn.prepare("SELECT prefix, namespace_uri FROM vocabularies")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (prefix, uri) = row?;
                schema.add_vocabulary(prefix, uri);
            }

            let mut stmt = conn.prepare(
                "SELECT p.id, v.prefix, p.local_name
                 FROM properties p JOIN vocabularies v ON v.id = p.vocabulary_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            for row in rows {
                let (id, prefix, local) = row?;
                schema.add_property(Term::new(prefix, local), id);
            }

            let mut stmt = conn.prepare(
                "SELECT c.id, v.prefix, c.local_name
                 FROM resource_classes c JOIN vocabularies v ON v.id = c.vocabulary_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            for row in rows {
                let (id, prefix, local) = row?;
                schema.add_class(Term::new(prefix, local), id);
            }

            Ok(schema)
        })
    }
}
