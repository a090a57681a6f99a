//! Objects hanging off a bookmark: tags, accounts, citations with their
//! notes, tagging annotations and image attachments.

use super::Importer;
use super::terms::KnownTerms;
use super::upsert::{ActionPair, NaturalKey};
use crate::diigo::TransportMode;
use crate::diigo::records::{Annotation, Bookmark, FieldValue, Fields, Note};
use crate::error::{SyncError, SyncResult};
use crate::repository::{ImportLedger, Repository};
use crate::types::{LedgerAction, ObjectDraft, ObjectId, Statement};
use tracing::debug;

/// Point the `user` field at an account object, adding it when absent.
fn set_author(fields: &mut Fields, author: Option<ObjectId>) {
    let Some(author) = author else {
        return;
    };
    match fields.iter_mut().find(|(name, _)| *name == "user") {
        Some((_, value)) => *value = FieldValue::Resource(author),
        None => fields.push(("user", FieldValue::Resource(author))),
    }
}

/// Parent link, natural key and title of a citation or note. These never
/// go through the mapping table.
fn link_statements(draft: &mut ObjectDraft, terms: &KnownTerms, parent: ObjectId, key: &str) {
    draft.push(Statement::resource(terms.is_part_of, parent));
    draft.push(Statement::literal(terms.is_referenced_by, key));
    draft.push(Statement::literal(terms.title, key));
}

impl<'a, R: Repository + ImportLedger> Importer<'a, R> {
    /// Concept for a tag, created on first use and cached for the run.
    pub(super) fn add_tag(&mut self, text: &str) -> SyncResult<Option<ObjectId>> {
        if let Some(id) = self.tags.get(text) {
            return Ok(Some(*id));
        }

        let terms = self.terms;
        let key = NaturalKey::literal(terms.pref_label, text);
        let tag = self.upserter().resolve_or_create(
            &key,
            || {
                ObjectDraft::new(Some(terms.concept))
                    .with(Statement::literal(terms.title, text))
                    .with(Statement::literal(terms.pref_label, text))
            },
            LedgerAction::CreateTag,
        )?;

        Ok(tag.map(|tag| {
            self.tags.insert(text.to_string(), tag.id);
            tag.id
        }))
    }

    /// Account object for a library user, created on first use and cached.
    /// An account that already exists is returned unchanged.
    pub(super) fn resolve_actor(
        &mut self,
        account: &str,
        real_name: Option<&str>,
    ) -> SyncResult<Option<ObjectId>> {
        let account = account.trim();
        if account.is_empty() {
            return Ok(None);
        }
        if let Some(id) = self.actors.get(account) {
            return Ok(Some(*id));
        }

        let terms = self.terms;
        let name = real_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(account);
        let key = NaturalKey::literal(terms.account_name, account);
        let actor = self.upserter().resolve_or_create(
            &key,
            || {
                ObjectDraft::new(Some(terms.person))
                    .with(Statement::literal(terms.title, name))
                    .with(Statement::literal(terms.foaf_name, name))
                    .with(Statement::literal(terms.account_name, account))
            },
            LedgerAction::CreateActor,
        )?;

        Ok(actor.map(|actor| {
            self.actors.insert(account.to_string(), actor.id);
            actor.id
        }))
    }

    fn citation_key(
        &self,
        doc_id: ObjectId,
        record: &Bookmark,
        annotation: &Annotation,
    ) -> SyncResult<String> {
        match self.mode() {
            TransportMode::Api => {
                let stamp = annotation
                    .created_at
                    .as_ref()
                    .map(|t| t.raw.clone())
                    .or_else(|| annotation.id.clone())
                    .ok_or_else(|| {
                        SyncError::validation(format!(
                            "annotation on {} has neither a timestamp nor an id",
                            record.url
                        ))
                    })?;
                Ok(format!("{} citation {}", doc_id, stamp))
            }
            TransportMode::Feed => {
                let (link_id, annotation_id) = self.feed_ids(record, annotation)?;
                Ok(format!(
                    "{} {} {} citation",
                    self.owner(record),
                    link_id,
                    annotation_id
                ))
            }
        }
    }

    fn feed_ids<'r>(
        &self,
        record: &'r Bookmark,
        annotation: &'r Annotation,
    ) -> SyncResult<(&'r str, &'r str)> {
        match (record.link_id.as_deref(), annotation.id.as_deref()) {
            (Some(link_id), Some(annotation_id)) => Ok((link_id, annotation_id)),
            _ => Err(SyncError::validation(format!(
                "feed annotation on {} lacks a link or annotation id",
                record.url
            ))),
        }
    }

    fn owner<'r>(&'r self, record: &'r Bookmark) -> &'r str {
        record.user.as_deref().unwrap_or(self.params.user.as_str())
    }

    /// Upsert a highlight as a citation of the document. Notes are only
    /// imported together with a newly created citation.
    pub(super) fn add_citation(
        &mut self,
        doc_id: ObjectId,
        record: &Bookmark,
        annotation: &Annotation,
        actor: Option<ObjectId>,
    ) -> SyncResult<Option<ObjectId>> {
        let key = self.citation_key(doc_id, record, annotation)?;

        let author = match (self.mode(), annotation.user.as_deref()) {
            (TransportMode::Feed, Some(account)) => self.resolve_actor(account, None)?,
            (TransportMode::Feed, None) => actor,
            (TransportMode::Api, _) => None,
        };
        let mut fields = annotation.fields();
        set_author(&mut fields, author);

        let mut draft =
            ObjectDraft::new(Some(self.terms.citation)).in_item_set(self.params.item_set_id);
        self.mapper.map(&fields, &mut draft.statements);
        link_statements(&mut draft, &self.terms, doc_id, &key);

        let natural_key = NaturalKey::literal(self.terms.is_referenced_by, key.as_str());
        let Some(citation) = self
            .upserter()
            .upsert(&natural_key, draft, ActionPair::CITATION)?
        else {
            return Err(SyncError::validation(format!("citation {} was rejected", key)));
        };

        if citation.created() {
            for (index, note) in annotation.notes.iter().enumerate() {
                self.step(|this| {
                    this.add_note(citation.id(), record, annotation, note, index, author)
                });
            }
        } else {
            debug!(key = %key, "citation already imported, notes left unchanged");
        }

        Ok(Some(citation.id()))
    }

    fn note_key(
        &self,
        citation_id: ObjectId,
        record: &Bookmark,
        annotation: &Annotation,
        note: &Note,
        index: usize,
    ) -> SyncResult<String> {
        let note_id = note.id.clone().unwrap_or_else(|| index.to_string());
        match self.mode() {
            TransportMode::Api => {
                let stamp = note
                    .created_at
                    .as_ref()
                    .map(|t| t.raw.clone())
                    .unwrap_or(note_id);
                Ok(format!("{} note {}", citation_id, stamp))
            }
            TransportMode::Feed => {
                let (link_id, annotation_id) = self.feed_ids(record, annotation)?;
                Ok(format!(
                    "{} {} {} note {}",
                    self.owner(record),
                    link_id,
                    annotation_id,
                    note_id
                ))
            }
        }
    }

    fn add_note(
        &mut self,
        citation_id: ObjectId,
        record: &Bookmark,
        annotation: &Annotation,
        note: &Note,
        index: usize,
        author: Option<ObjectId>,
    ) -> SyncResult<Option<ObjectId>> {
        let key = self.note_key(citation_id, record, annotation, note, index)?;

        let author = match (self.mode(), note.user.as_deref()) {
            (TransportMode::Feed, Some(account)) => self.resolve_actor(account, None)?,
            (TransportMode::Feed, None) => author,
            (TransportMode::Api, _) => None,
        };
        let mut fields = note.fields();
        set_author(&mut fields, author);

        let mut draft =
            ObjectDraft::new(Some(self.terms.note)).in_item_set(self.params.item_set_id);
        self.mapper.map(&fields, &mut draft.statements);
        link_statements(&mut draft, &self.terms, citation_id, &key);

        let natural_key = NaturalKey::literal(self.terms.is_referenced_by, key.as_str());
        let note = self
            .upserter()
            .resolve_or_create(&natural_key, || draft, LedgerAction::CreateNote)?;
        Ok(note.map(|note| note.id))
    }

    /// Record that `actor` tagged the document with `tag`.
    pub(super) fn add_tag_annotation(
        &mut self,
        doc_id: ObjectId,
        title: &str,
        actor_id: ObjectId,
        account: &str,
        tag_id: ObjectId,
        tag: &str,
    ) -> SyncResult<Option<ObjectId>> {
        let terms = self.terms;
        let key = format!("{} {} {} annotation", doc_id, actor_id, tag_id);
        let body = format!("{} tagged {} with {}", account, title, tag);

        let draft = ObjectDraft::new(Some(terms.annotation))
            .in_item_set(self.params.item_set_id)
            .with(Statement::literal(terms.is_referenced_by, key.as_str()))
            .with(Statement::literal(terms.title, body.as_str()))
            .with(Statement::literal(terms.motivated_by, "tagging"))
            .with(Statement::literal(terms.has_purpose, "tagging"))
            .with(Statement::literal(terms.rdf_value, body.as_str()))
            .with(Statement::resource(terms.has_body, tag_id))
            .with(Statement::resource(terms.has_target, doc_id))
            .with(Statement::resource(terms.has_source, doc_id))
            .with(Statement::literal(terms.rdf_type, "skos:Concept"))
            .with(Statement::resource(terms.creator, actor_id));

        let natural_key = NaturalKey::literal(terms.is_referenced_by, key.as_str());
        let annotation = self
            .upserter()
            .upsert(&natural_key, draft, ActionPair::ANNOTATION)?;
        Ok(annotation.map(|a| a.id()))
    }

    /// Download an image annotation and attach it to the document. The
    /// temp file is gone once this returns, whatever the outcome.
    pub(super) fn attach_image(
        &mut self,
        doc_id: ObjectId,
        annotation: &Annotation,
    ) -> SyncResult<Option<i64>> {
        let Some(url) = annotation
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        else {
            return Ok(None);
        };
        let Some(downloader) = &self.downloader else {
            debug!(url, "no downloader configured, image skipped");
            return Ok(None);
        };

        let file = downloader.download(url, doc_id).map_err(|failure| {
            SyncError::download(&failure.uri, &failure.cause)
                .with_details(format!("{} attempt(s)", failure.attempts))
        })?;
        let attached = self.repo.attach_file(doc_id, file.path(), url);
        drop(file);

        let media_id = attached?;
        debug!(doc_id, media_id, url, "attached image");
        Ok(Some(media_id))
    }
}
