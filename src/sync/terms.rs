//! Fixed vocabulary terms the job writes regardless of the mapping table.

use crate::error::{SyncError, SyncResult};
use crate::repository::Schema;
use crate::types::{ClassId, PropertyId, Term};

fn property(schema: &Schema, prefix: &str, local: &str) -> SyncResult<PropertyId> {
    schema
        .property(&Term::new(prefix, local))
        .ok_or_else(|| SyncError::invalid_params(format!("schema lacks property {prefix}:{local}")))
}

fn class(schema: &Schema, prefix: &str, local: &str) -> SyncResult<ClassId> {
    schema
        .class(&Term::new(prefix, local))
        .ok_or_else(|| SyncError::invalid_params(format!("schema lacks class {prefix}:{local}")))
}

/// Resolved ids of every property and class the job needs.
#[derive(Debug, Clone, Copy)]
pub struct KnownTerms {
    pub uri: PropertyId,
    pub title: PropertyId,
    pub status: PropertyId,
    pub is_part_of: PropertyId,
    pub is_referenced_by: PropertyId,
    pub creator: PropertyId,
    pub pref_label: PropertyId,
    pub semantic_relation: PropertyId,
    pub account_name: PropertyId,
    pub foaf_name: PropertyId,
    pub motivated_by: PropertyId,
    pub has_purpose: PropertyId,
    pub has_body: PropertyId,
    pub has_target: PropertyId,
    pub has_source: PropertyId,
    pub rdf_value: PropertyId,
    pub rdf_type: PropertyId,

    pub webpage: ClassId,
    pub concept: ClassId,
    pub person: ClassId,
    pub citation: ClassId,
    pub note: ClassId,
    pub annotation: ClassId,
}

impl KnownTerms {
    pub fn resolve(schema: &Schema) -> SyncResult<Self> {
        Ok(Self {
            uri: property(schema, "bibo", "uri")?,
            title: property(schema, "dcterms", "title")?,
            status: property(schema, "bibo", "status")?,
            is_part_of: property(schema, "dcterms", "isPartOf")?,
            is_referenced_by: property(schema, "dcterms", "isReferencedBy")?,
            creator: property(schema, "dcterms", "creator")?,
            pref_label: property(schema, "skos", "prefLabel")?,
            semantic_relation: property(schema, "skos", "semanticRelation")?,
            account_name: property(schema, "foaf", "accountName")?,
            foaf_name: property(schema, "foaf", "name")?,
            motivated_by: property(schema, "oa", "motivatedBy")?,
            has_purpose: property(schema, "oa", "hasPurpose")?,
            has_body: property(schema, "oa", "hasBody")?,
            has_target: property(schema, "oa", "hasTarget")?,
            has_source: property(schema, "oa", "hasSource")?,
            rdf_value: property(schema, "rdf", "value")?,
            rdf_type: property(schema, "rdf", "type")?,

            webpage: class(schema, "bibo", "Webpage")?,
            concept: class(schema, "skos", "Concept")?,
            person: class(schema, "foaf", "Person")?,
            citation: class(schema, "cito", "Citation")?,
            note: class(schema, "bibo", "Note")?,
            annotation: class(schema, "oa", "Annotation")?,
        })
    }
}
