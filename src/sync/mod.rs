//! The synchronization job.
//!
//! `Importer` walks the remote library page by page and pushes every record
//! through the pipeline:
//!
//! 1. resolve the owner account (feed only)
//! 2. map fields onto a `bibo:Webpage` draft and upsert it by `bibo:uri`
//! 3. link tags as `skos:Concept` objects
//! 4. turn highlights into citations (with their notes) and download images
//! 5. record tagging annotations (feed only)
//!
//! Every write lands in the import ledger, so a run can be audited or undone
//! and re-running against the same library updates instead of duplicating.

pub mod download;
pub mod mapping;
mod related;
pub mod terms;
pub mod upsert;

use crate::diigo::records::{Bookmark, FieldValue};
use crate::diigo::{Cursor, Transport, TransportMode};
use crate::error::{SyncError, SyncResult};
use crate::repository::{ImportLedger, Repository, Schema};
use crate::types::{ObjectDraft, ObjectId, Statement};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

pub use download::{BinarySource, DownloadFailure, FetchError, FileDownloader, LinkProbe};
pub use mapping::{Candidate, Encoding, FieldMapper, MappingTable};
pub use terms::KnownTerms;
use upsert::{ActionPair, NaturalKey, Upserter};
pub use tokio_util::sync::CancellationToken;

/// What a run imports and where.
#[derive(Debug, Clone)]
pub struct ImportParams {
    /// Ledger owner of every write.
    pub import_id: i64,
    /// Collection every imported object joins.
    pub item_set_id: ObjectId,
    /// Library owner.
    pub user: String,
    /// Records last updated before this epoch second are skipped.
    pub cutoff: Option<i64>,
    /// Record offset (API) or page number (feed) to start from.
    pub resume_offset: u64,
    pub page_size: u64,
    /// Download image annotations and attach them.
    pub import_files: bool,
    /// Record the HTTP status of each bookmarked URL.
    pub probe_links: bool,
}

impl ImportParams {
    pub fn new(import_id: i64, item_set_id: ObjectId, user: impl Into<String>) -> Self {
        Self {
            import_id,
            item_set_id,
            user: user.into(),
            cutoff: None,
            resume_offset: 0,
            page_size: 100,
            import_files: false,
            probe_links: false,
        }
    }
}

/// Why the page loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The remote returned an empty page.
    #[default]
    Exhausted,
    /// A feed page started with a URL this run already processed.
    DuplicatePage,
    /// A feed record crossed the cutoff.
    CutoffReached,
    Cancelled,
}

/// Outcome counters of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub pages: u64,
    /// Bookmarks written.
    pub processed: u64,
    /// Records before the cutoff.
    pub skipped: u64,
    /// Bookmarks that could not be written.
    pub failed: u64,
    /// Tags, citations, notes, annotations or images that could not be
    /// written for an otherwise imported bookmark.
    pub step_failures: u64,
    pub created: u64,
    pub updated: u64,
    pub stop: StopReason,
}

/// One synchronization run over one remote library.
pub struct Importer<'a, R> {
    repo: &'a R,
    transport: Box<dyn Transport + 'a>,
    params: ImportParams,
    schema: Schema,
    terms: KnownTerms,
    mapper: FieldMapper,
    downloader: Option<FileDownloader>,
    probe: Option<Box<dyn LinkProbe + 'a>>,
    cancel: CancellationToken,
    tags: HashMap<String, ObjectId>,
    actors: HashMap<String, ObjectId>,
    seen_urls: HashSet<String>,
    report: SyncReport,
}

impl<'a, R: Repository + ImportLedger> Importer<'a, R> {
    /// Bind a run to its store and transport.
    ///
    /// Fails with `InvalidParams` when the item set does not exist or the
    /// store lacks a term the job writes.
    pub fn new(
        repo: &'a R,
        transport: impl Transport + 'a,
        params: ImportParams,
    ) -> SyncResult<Self> {
        let schema = repo.schema()?;
        let terms = KnownTerms::resolve(&schema)?;
        if repo.get(params.item_set_id)?.is_none() {
            return Err(SyncError::invalid_params(format!(
                "item set {} does not exist",
                params.item_set_id
            )));
        }
        let mapper = FieldMapper::new(&MappingTable::default(), &schema);

        Ok(Self {
            repo,
            transport: Box::new(transport),
            params,
            schema,
            terms,
            mapper,
            downloader: None,
            probe: None,
            cancel: CancellationToken::new(),
            tags: HashMap::new(),
            actors: HashMap::new(),
            seen_urls: HashSet::new(),
            report: SyncReport::default(),
        })
    }

    /// Replace the built-in mapping table.
    pub fn with_mapping(mut self, table: &MappingTable) -> Self {
        self.mapper = FieldMapper::new(table, &self.schema);
        self
    }

    pub fn with_downloader(mut self, downloader: FileDownloader) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn with_probe(mut self, probe: impl LinkProbe + 'a) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn mode(&self) -> TransportMode {
        self.transport.mode()
    }

    fn upserter(&self) -> Upserter<'a, R> {
        Upserter::new(self.repo, self.params.import_id)
    }

    /// Walk the library until exhaustion, cancellation, a repeated feed
    /// page or the cutoff. A failed page fetch aborts the run.
    pub fn run(mut self) -> SyncResult<SyncReport> {
        let mode = self.mode();
        let mut cursor = Cursor::initial(mode, self.params.resume_offset, self.params.page_size);
        info!(
            import_id = self.params.import_id,
            user = %self.params.user,
            mode = %mode,
            cutoff = ?self.params.cutoff,
            "starting import"
        );

        'pages: loop {
            if self.cancel.is_cancelled() {
                self.report.stop = StopReason::Cancelled;
                break;
            }

            let page = self.transport.fetch_page(&cursor)?;
            self.report.pages += 1;
            debug!(cursor = ?cursor, records = page.len(), "fetched page");

            if page.is_empty() {
                self.report.stop = StopReason::Exhausted;
                break;
            }
            if mode == TransportMode::Feed && self.seen_urls.contains(page[0].url.as_str()) {
                info!(url = %page[0].url, "feed page repeats a processed record, stopping");
                self.report.stop = StopReason::DuplicatePage;
                break;
            }

            for record in &page {
                if self.cancel.is_cancelled() {
                    self.report.stop = StopReason::Cancelled;
                    break 'pages;
                }

                if let Some(cutoff) = self.params.cutoff
                    && record.is_before(cutoff)
                {
                    if mode == TransportMode::Feed {
                        info!(url = %record.url, "feed record predates cutoff, stopping");
                        self.report.stop = StopReason::CutoffReached;
                        break 'pages;
                    }
                    self.report.skipped += 1;
                    continue;
                }

                self.seen_urls.insert(record.url.clone());
                match self.import_bookmark(record) {
                    Ok(created) => {
                        self.report.processed += 1;
                        if created {
                            self.report.created += 1;
                        } else {
                            self.report.updated += 1;
                        }
                    }
                    Err(err) => {
                        warn!(url = %record.url, error = %err, "failed to import bookmark");
                        self.report.failed += 1;
                    }
                }
            }

            cursor.advance();
        }

        info!(
            import_id = self.params.import_id,
            pages = self.report.pages,
            processed = self.report.processed,
            skipped = self.report.skipped,
            failed = self.report.failed,
            stop = ?self.report.stop,
            "import finished"
        );
        Ok(self.report)
    }

    /// Write one bookmark and everything hanging off it. Returns whether
    /// the bookmark was created.
    fn import_bookmark(&mut self, record: &Bookmark) -> SyncResult<bool> {
        let url = record.url.trim();
        if url.is_empty() {
            return Err(SyncError::validation("record has no url"));
        }
        let feed = self.mode() == TransportMode::Feed;

        let actor = match (feed, record.user.as_deref()) {
            (true, Some(account)) => {
                self.step(|this| this.resolve_actor(account, record.real_name.as_deref()))
            }
            _ => None,
        };

        let mut fields = record.fields();
        if let Some(actor_id) = actor {
            for (name, value) in fields.iter_mut() {
                if *name == "user" {
                    *value = FieldValue::Resource(actor_id);
                }
            }
        }

        let mut draft =
            ObjectDraft::new(Some(self.terms.webpage)).in_item_set(self.params.item_set_id);
        self.mapper.map(&fields, &mut draft.statements);

        if self.params.probe_links
            && let Some(probe) = &self.probe
        {
            let status = probe
                .status(url)
                .map(|code| code.to_string())
                .unwrap_or_else(|| "unreachable".to_string());
            draft.push(Statement::literal(self.terms.status, status));
        }

        let key = NaturalKey::uri(self.terms.uri, url);
        let document = self
            .upserter()
            .upsert(&key, draft, ActionPair::ITEM)?
            .ok_or_else(|| SyncError::validation(format!("bookmark {} was rejected", url)))?;
        let doc_id = document.id();
        let title = record.title.as_deref().unwrap_or(url).to_string();

        let mut tags = Vec::new();
        for tag in record.tag_list() {
            if let Some(tag_id) = self.step(|this| this.add_tag(&tag)) {
                tags.push((tag, tag_id));
            }
        }
        if !tags.is_empty() {
            let relations = tags
                .iter()
                .map(|(_, id)| Statement::resource(self.terms.semantic_relation, *id))
                .collect();
            self.step(|this| Ok(this.repo.append(doc_id, relations)?));
        }

        for annotation in &record.annotations {
            if annotation.is_image() {
                if self.params.import_files {
                    self.step(|this| this.attach_image(doc_id, annotation));
                }
            } else {
                self.step(|this| this.add_citation(doc_id, record, annotation, actor));
            }
        }

        if feed && let Some(actor_id) = actor {
            let account = record
                .user
                .clone()
                .unwrap_or_else(|| self.params.user.clone());
            for (tag, tag_id) in &tags {
                self.step(|this| {
                    this.add_tag_annotation(doc_id, &title, actor_id, &account, *tag_id, tag)
                });
            }
        }

        Ok(document.created())
    }

    /// Run one secondary write; a failure is logged and counted.
    fn step<T, F>(&mut self, f: F) -> Option<T>
    where
        F: FnOnce(&mut Self) -> SyncResult<Option<T>>,
    {
        match f(self) {
            Ok(value) => value,
            Err(err) => {
                warn!(code = ?err.code, error = %err, "import step failed");
                self.report.step_failures += 1;
                None
            }
        }
    }
}
