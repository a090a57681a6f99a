//! Declarative translation of record fields into graph statements.
//!
//! A `MappingTable` lists, per source field, the target properties to try in
//! priority order together with how the value is encoded. `FieldMapper`
//! resolves the table against the target schema once per job: each field
//! binds to the first candidate whose term exists.

use crate::diigo::records::{FieldValue, Fields};
use crate::repository::Schema;
use crate::types::{PropertyId, Statement, Term};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// How a field value becomes a statement value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    #[default]
    Literal,
    Uri,
    /// A link to another graph object, when the field carries one.
    Resource,
}

/// One target property a field may map to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub term: Term,
    #[serde(default)]
    pub encoding: Encoding,
}

impl Candidate {
    fn new(term: &str, encoding: Encoding) -> Self {
        let (prefix, local) = term.split_once(':').unwrap_or(("", term));
        Self {
            term: Term::new(prefix, local),
            encoding,
        }
    }
}

/// Source field → candidate properties, highest priority first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable {
    fields: BTreeMap<String, Vec<Candidate>>,
}

impl Default for MappingTable {
    fn default() -> Self {
        use Encoding::*;
        let entries = [
            ("url", "bibo:uri", Uri),
            ("shared", "schema:actionStatus", Literal),
            ("created_at", "dcterms:created", Literal),
            ("updated_at", "dcterms:dateSubmitted", Literal),
            ("desc", "dcterms:description", Literal),
            ("title", "dcterms:title", Literal),
            ("content", "bibo:content", Literal),
            ("isPartOf", "dcterms:isPartOf", Resource),
            ("user", "cito:isCompiledBy", Resource),
            ("isReferencedBy", "dcterms:isReferencedBy", Literal),
            ("semanticRelation", "skos:semanticRelation", Resource),
        ];
        let mut table = Self {
            fields: BTreeMap::new(),
        };
        for (field, term, encoding) in entries {
            table.push(field, Candidate::new(term, encoding));
        }
        table
    }
}

impl MappingTable {
    /// Read a table from YAML.
    ///
    /// ```yaml
    /// title:
    ///   - term: dcterms:title
    /// url:
    ///   - term: bibo:uri
    ///     encoding: uri
    ///   - term: schema:url
    ///     encoding: uri
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read mapping table {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("failed to parse mapping table {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Append a lower-priority candidate for `field`.
    pub fn push(&mut self, field: &str, candidate: Candidate) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(candidate);
    }

    pub fn candidates(&self, field: &str) -> &[Candidate] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

/// A mapping table bound to one schema.
#[derive(Debug, Clone, Default)]
pub struct FieldMapper {
    resolved: HashMap<String, (PropertyId, Encoding)>,
}

impl FieldMapper {
    pub fn new(table: &MappingTable, schema: &Schema) -> Self {
        let mut resolved = HashMap::new();
        for (field, candidates) in &table.fields {
            match candidates
                .iter()
                .find_map(|c| schema.property(&c.term).map(|id| (id, c.encoding)))
            {
                Some(binding) => {
                    resolved.insert(field.clone(), binding);
                }
                None => debug!(field = %field, "no mapping candidate exists in schema"),
            }
        }
        Self { resolved }
    }

    /// Property a field is bound to, if any.
    pub fn property(&self, field: &str) -> Option<PropertyId> {
        self.resolved.get(field).map(|(id, _)| *id)
    }

    /// Append one statement per mapped, non-empty field.
    pub fn map(&self, fields: &Fields, statements: &mut Vec<Statement>) {
        for (name, value) in fields {
            if value.is_empty() {
                continue;
            }
            let Some(&(property, encoding)) = self.resolved.get(*name) else {
                continue;
            };
            let statement = match (encoding, value) {
                (Encoding::Uri, FieldValue::Text(text)) => Statement::uri(property, text.trim()),
                (Encoding::Resource, FieldValue::Resource(id)) => Statement::resource(property, *id),
                (_, FieldValue::Text(text)) => Statement::literal(property, text.as_str()),
                (_, FieldValue::Resource(id)) => Statement::literal(property, id.to_string()),
            };
            statements.push(statement);
        }
    }

    pub fn map_fields(&self, fields: &Fields) -> Vec<Statement> {
        let mut statements = Vec::new();
        self.map(fields, &mut statements);
        statements
    }
}
