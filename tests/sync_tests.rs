//! Integration tests for the synchronization job.
//!
//! The job runs against an in-memory graph store and a scripted transport
//! that plays back fixed pages, so every run is deterministic.

use diigo_sync::db::Database;
use diigo_sync::diigo::records::Bookmark;
use diigo_sync::diigo::url::library_url;
use diigo_sync::diigo::{Cursor, Transport, TransportMode};
use diigo_sync::error::{ErrorCode, SyncError, SyncResult};
use diigo_sync::repository::{Repository, Schema};
use diigo_sync::sync::{
    BinarySource, CancellationToken, FetchError, FileDownloader, ImportParams, Importer,
    LinkProbe, MappingTable, StopReason, SyncReport,
};
use diigo_sync::types::{ClassId, LedgerAction, ObjectId, PropertyId, TargetObject, Value};
use serde_json::{Value as Json, json};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// `2019/01/15 10:26:52 +0000` as epoch seconds.
const T0: i64 = 1_547_548_012;
const T0_RAW: &str = "2019/01/15 10:26:52 +0000";
const BEFORE_T0_RAW: &str = "2019/01/10 08:00:00 +0000";

fn bookmark(value: Json) -> Bookmark {
    serde_json::from_value(value).expect("valid bookmark fixture")
}

fn simple(url: &str) -> Bookmark {
    bookmark(json!({ "url": url, "title": url, "updated_at": T0_RAW }))
}

/// Plays back fixed pages and remembers the cursors it was asked for.
#[derive(Clone)]
struct ScriptedTransport {
    mode: TransportMode,
    pages: Rc<Vec<Vec<Bookmark>>>,
    cursors: Rc<RefCell<Vec<Cursor>>>,
    fail_on: Option<usize>,
    cancel_on: Option<(usize, CancellationToken)>,
}

impl ScriptedTransport {
    fn new(mode: TransportMode, pages: Vec<Vec<Bookmark>>) -> Self {
        Self {
            mode,
            pages: Rc::new(pages),
            cursors: Rc::new(RefCell::new(Vec::new())),
            fail_on: None,
            cancel_on: None,
        }
    }

    fn api(pages: Vec<Vec<Bookmark>>) -> Self {
        Self::new(TransportMode::Api, pages)
    }

    fn feed(pages: Vec<Vec<Bookmark>>) -> Self {
        Self::new(TransportMode::Feed, pages)
    }

    fn failing_on(mut self, page: usize) -> Self {
        self.fail_on = Some(page);
        self
    }

    fn cancelling_on(mut self, page: usize, token: CancellationToken) -> Self {
        self.cancel_on = Some((page, token));
        self
    }

    fn fetched(&self) -> Vec<Cursor> {
        self.cursors.borrow().clone()
    }
}

impl Transport for ScriptedTransport {
    fn mode(&self) -> TransportMode {
        self.mode
    }

    fn fetch_page(&self, cursor: &Cursor) -> SyncResult<Vec<Bookmark>> {
        self.cursors.borrow_mut().push(*cursor);
        let index = match *cursor {
            Cursor::Paged { start, count } => (start / count) as usize,
            Cursor::Feed { page_num } => page_num as usize,
        };
        if self.fail_on == Some(index) {
            return Err(SyncError::transport(
                "https://scripted.example/page",
                "503 Service Unavailable",
            ));
        }
        if let Some((page, token)) = &self.cancel_on
            && *page == index
        {
            token.cancel();
        }
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }
}

/// Binary source that either always fails or writes fixed bytes.
struct ScriptedSource {
    fail: bool,
    calls: Rc<RefCell<u32>>,
}

impl BinarySource for ScriptedSource {
    fn fetch_to(&self, _uri: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        *self.calls.borrow_mut() += 1;
        if self.fail {
            return Err(FetchError::Transport("connection reset".into()));
        }
        sink.write_all(b"\x89PNG fake image")?;
        Ok(15)
    }
}

/// Link probe answering from a fixed table.
struct FixedProbe(Vec<(&'static str, Option<u16>)>);

impl LinkProbe for FixedProbe {
    fn status(&self, url: &str) -> Option<u16> {
        self.0
            .iter()
            .find(|(u, _)| *u == url)
            .and_then(|(_, status)| *status)
    }
}

struct Fixture {
    db: Database,
    schema: Schema,
    item_set: ObjectId,
}

impl Fixture {
    fn new() -> Self {
        Self::with_db(Database::open_in_memory().expect("Failed to create in-memory database"))
    }

    fn with_db(db: Database) -> Self {
        let schema = db.schema().unwrap();
        let title = schema.property(&"dcterms:title".parse().unwrap()).unwrap();
        let item_set = db.create_item_set("Diigo: alice", title).unwrap();
        Self {
            db,
            schema,
            item_set,
        }
    }

    fn property(&self, term: &str) -> PropertyId {
        self.schema
            .property(&term.parse().unwrap())
            .unwrap_or_else(|| panic!("missing property {term}"))
    }

    fn class(&self, term: &str) -> ClassId {
        self.schema
            .class(&term.parse().unwrap())
            .unwrap_or_else(|| panic!("missing class {term}"))
    }

    fn start_import(&self, mode: TransportMode) -> i64 {
        self.db
            .create_import("alice", &library_url("alice"), 2, mode.as_str())
            .unwrap()
    }

    fn importer<'a>(
        &'a self,
        transport: &ScriptedTransport,
        configure: impl FnOnce(&mut ImportParams),
    ) -> (i64, Importer<'a, Database>) {
        let import_id = self.start_import(transport.mode());
        let mut params = ImportParams::new(import_id, self.item_set, "alice");
        configure(&mut params);
        let importer = Importer::new(&self.db, transport.clone(), params).unwrap();
        (import_id, importer)
    }

    fn run(
        &self,
        transport: &ScriptedTransport,
        configure: impl FnOnce(&mut ImportParams),
    ) -> (i64, SyncReport) {
        let (import_id, importer) = self.importer(transport, configure);
        (import_id, importer.run().unwrap())
    }

    fn find(&self, term: &str, value: &str) -> Vec<TargetObject> {
        self.db.search(self.property(term), value).unwrap()
    }

    fn one(&self, term: &str, value: &str) -> TargetObject {
        let mut found = self.find(term, value);
        assert_eq!(found.len(), 1, "expected one object with {term} = {value}");
        found.remove(0)
    }

    fn count(&self, class: &str) -> usize {
        self.db.count_items(Some(self.class(class))).unwrap()
    }

    fn actions(&self, import_id: i64) -> Vec<LedgerAction> {
        self.db
            .ledger_entries(import_id)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect()
    }

    fn resources(&self, object: &TargetObject, term: &str) -> Vec<ObjectId> {
        object
            .values(self.property(term))
            .filter_map(|v| match v {
                Value::Resource(id) => Some(*id),
                _ => None,
            })
            .collect()
    }
}

mod end_to_end {
    use super::*;

    #[test]
    fn single_bookmark_with_two_tags() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![vec![bookmark(json!({
            "url": "https://x.example/a",
            "title": "A",
            "tags": "ml,ai",
            "updated_at": T0_RAW
        }))]]);

        let (import_id, report) = fx.run(&transport, |p| p.cutoff = Some(T0 - 1));

        assert_eq!(report.processed, 1);
        assert_eq!(report.created, 1);
        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(fx.count("bibo:Webpage"), 1);
        assert_eq!(fx.count("skos:Concept"), 2);

        let doc = fx.one("bibo:uri", "https://x.example/a");
        assert_eq!(
            doc.values(fx.property("bibo:uri")).collect::<Vec<_>>(),
            vec![&Value::Uri("https://x.example/a".into())]
        );
        assert_eq!(doc.text(fx.property("dcterms:title")), Some("A"));
        assert_eq!(doc.text(fx.property("dcterms:dateSubmitted")), Some(T0_RAW));
        assert_eq!(doc.resource_class, Some(fx.class("bibo:Webpage")));
        assert_eq!(doc.item_sets, vec![fx.item_set]);

        let ml = fx.one("skos:prefLabel", "ml");
        let ai = fx.one("skos:prefLabel", "ai");
        assert_eq!(fx.resources(&doc, "skos:semanticRelation"), vec![ml.id, ai.id]);
        assert_eq!(ml.text(fx.property("dcterms:title")), Some("ml"));

        let entries = fx.db.ledger_entries(import_id).unwrap();
        let summary: Vec<_> = entries
            .iter()
            .map(|e| (e.action, e.diigo_key.as_str(), e.item_id))
            .collect();
        assert_eq!(
            summary,
            vec![
                (LedgerAction::Create, "https://x.example/a", doc.id),
                (LedgerAction::CreateTag, "ml", ml.id),
                (LedgerAction::CreateTag, "ai", ai.id),
            ]
        );
    }
}

mod idempotence {
    use super::*;

    fn library() -> ScriptedTransport {
        ScriptedTransport::api(vec![vec![bookmark(json!({
            "url": "https://x.example/a",
            "title": "A",
            "tags": "ml,ai",
            "updated_at": T0_RAW,
            "annotations": [{
                "content": "a highlighted sentence",
                "created_at": "2019/01/15 11:00:00 +0000",
                "comments": [{"content": "why it matters", "created_at": "2019/01/15 11:05:00 +0000"}]
            }]
        }))]])
    }

    #[test]
    fn second_run_updates_instead_of_creating() {
        let fx = Fixture::new();

        let (first, report) = fx.run(&library(), |_| {});
        assert_eq!(report.created, 1);
        assert_eq!(
            fx.actions(first),
            vec![
                LedgerAction::Create,
                LedgerAction::CreateTag,
                LedgerAction::CreateTag,
                LedgerAction::CreateCita,
                LedgerAction::CreateNote,
            ]
        );

        let (second, report) = fx.run(&library(), |_| {});
        assert_eq!(report.updated, 1);
        assert_eq!(report.created, 0);
        assert_eq!(
            fx.actions(second),
            vec![LedgerAction::Update, LedgerAction::UpdateCita]
        );

        assert_eq!(fx.count("bibo:Webpage"), 1);
        assert_eq!(fx.count("skos:Concept"), 2);
        assert_eq!(fx.count("cito:Citation"), 1);
        assert_eq!(fx.count("bibo:Note"), 1);

        let doc = fx.one("bibo:uri", "https://x.example/a");
        assert_eq!(fx.resources(&doc, "skos:semanticRelation").len(), 2);
        assert_eq!(
            doc.values(fx.property("dcterms:title")).count(),
            1,
            "partial update must replace, not accumulate"
        );
    }
}

mod cutoff {
    use super::*;

    #[test]
    fn api_mode_skips_records_before_cutoff() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![vec![
            bookmark(json!({"url": "https://x.example/old", "tags": "stale", "updated_at": BEFORE_T0_RAW})),
            simple("https://x.example/new"),
        ]]);

        let (import_id, report) = fx.run(&transport, |p| p.cutoff = Some(T0 - 1));

        assert_eq!(report.skipped, 1);
        assert_eq!(report.processed, 1);
        assert!(fx.find("bibo:uri", "https://x.example/old").is_empty());
        assert!(fx.find("skos:prefLabel", "stale").is_empty());
        assert_eq!(fx.actions(import_id), vec![LedgerAction::Create]);
        // the skip does not end the walk in API mode
        assert_eq!(report.stop, StopReason::Exhausted);
    }

    #[test]
    fn records_without_timestamp_pass_the_cutoff() {
        let fx = Fixture::new();
        let transport =
            ScriptedTransport::api(vec![vec![bookmark(json!({"url": "https://x.example/n"}))]]);

        let (_, report) = fx.run(&transport, |p| p.cutoff = Some(T0));

        assert_eq!(report.processed, 1);
        assert_eq!(fx.find("bibo:uri", "https://x.example/n").len(), 1);
    }
}

mod dedup {
    use super::*;

    #[test]
    fn same_url_twice_resolves_to_one_object() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![vec![
            bookmark(json!({"url": "https://x.example/a", "title": "first", "updated_at": T0_RAW})),
            bookmark(json!({"url": "https://x.example/a", "title": "second", "updated_at": T0_RAW})),
        ]]);

        let (import_id, report) = fx.run(&transport, |_| {});

        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        let doc = fx.one("bibo:uri", "https://x.example/a");
        assert_eq!(doc.text(fx.property("dcterms:title")), Some("second"));

        let entries = fx.db.ledger_entries(import_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].item_id, entries[1].item_id);
        assert_eq!(entries[1].action, LedgerAction::Update);
    }
}

mod tag_relations {
    use super::*;

    fn tagged(tags: &str) -> ScriptedTransport {
        ScriptedTransport::api(vec![vec![bookmark(json!({
            "url": "https://x.example/a",
            "tags": tags,
            "updated_at": T0_RAW
        }))]])
    }

    #[test]
    fn relations_are_additive_across_runs() {
        let fx = Fixture::new();

        fx.run(&tagged("alpha"), |_| {});
        let (second, _) = fx.run(&tagged("alpha, beta"), |_| {});

        let alpha = fx.one("skos:prefLabel", "alpha");
        let beta = fx.one("skos:prefLabel", "beta");
        let doc = fx.one("bibo:uri", "https://x.example/a");
        assert_eq!(fx.resources(&doc, "skos:semanticRelation"), vec![alpha.id, beta.id]);
        assert_eq!(
            fx.actions(second),
            vec![LedgerAction::Update, LedgerAction::CreateTag]
        );
    }

    #[test]
    fn tags_are_shared_between_bookmarks() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![vec![
            bookmark(json!({"url": "https://x.example/a", "tags": "rust", "updated_at": T0_RAW})),
            bookmark(json!({"url": "https://x.example/b", "tags": " rust ,,", "updated_at": T0_RAW})),
        ]]);

        let (import_id, _) = fx.run(&transport, |_| {});

        assert_eq!(fx.count("skos:Concept"), 1);
        let tag = fx.one("skos:prefLabel", "rust");
        let b = fx.one("bibo:uri", "https://x.example/b");
        assert_eq!(fx.resources(&b, "skos:semanticRelation"), vec![tag.id]);
        assert_eq!(
            fx.actions(import_id),
            vec![LedgerAction::Create, LedgerAction::CreateTag, LedgerAction::Create]
        );
    }
}

mod pagination {
    use super::*;

    #[test]
    fn api_mode_stops_on_first_empty_page() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![
            vec![simple("https://x.example/1")],
            vec![simple("https://x.example/2")],
            vec![],
            vec![simple("https://x.example/never")],
        ]);

        let (_, report) = fx.run(&transport, |_| {});

        assert_eq!(report.processed, 2);
        assert_eq!(report.pages, 3);
        assert_eq!(
            transport.fetched(),
            vec![
                Cursor::Paged { start: 0, count: 100 },
                Cursor::Paged { start: 100, count: 100 },
                Cursor::Paged { start: 200, count: 100 },
            ]
        );
        assert!(fx.find("bibo:uri", "https://x.example/never").is_empty());
    }

    #[test]
    fn api_mode_resumes_at_offset() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![
            vec![simple("https://x.example/done")],
            vec![simple("https://x.example/todo")],
        ]);

        let (_, report) = fx.run(&transport, |p| p.resume_offset = 100);

        assert_eq!(report.processed, 1);
        assert_eq!(transport.fetched()[0], Cursor::Paged { start: 100, count: 100 });
        assert!(fx.find("bibo:uri", "https://x.example/done").is_empty());
    }

    #[test]
    fn feed_mode_stops_on_repeated_page() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::feed(vec![
            vec![simple("https://x.example/a"), simple("https://x.example/b")],
            vec![simple("https://x.example/c"), simple("https://x.example/d")],
            vec![simple("https://x.example/c"), simple("https://x.example/e")],
        ]);

        let (_, report) = fx.run(&transport, |_| {});

        assert_eq!(report.stop, StopReason::DuplicatePage);
        assert_eq!(report.processed, 4);
        assert_eq!(report.pages, 3);
        assert!(fx.find("bibo:uri", "https://x.example/e").is_empty());
        assert_eq!(
            transport.fetched().last(),
            Some(&Cursor::Feed { page_num: 2 })
        );
    }

    #[test]
    fn feed_mode_stops_at_cutoff_crossing() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::feed(vec![
            vec![
                simple("https://x.example/fresh"),
                bookmark(json!({"url": "https://x.example/old", "updated_at": BEFORE_T0_RAW})),
                simple("https://x.example/after-old"),
            ],
            vec![simple("https://x.example/next-page")],
        ]);

        let (_, report) = fx.run(&transport, |p| p.cutoff = Some(T0 - 1));

        assert_eq!(report.stop, StopReason::CutoffReached);
        assert_eq!(report.processed, 1);
        assert_eq!(report.pages, 1);
        assert!(fx.find("bibo:uri", "https://x.example/old").is_empty());
        assert!(fx.find("bibo:uri", "https://x.example/after-old").is_empty());
        assert!(fx.find("bibo:uri", "https://x.example/next-page").is_empty());
    }

    #[test]
    fn feed_mode_stops_on_empty_items() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::feed(vec![vec![simple("https://x.example/a")], vec![]]);

        let (_, report) = fx.run(&transport, |_| {});

        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(report.processed, 1);
        assert_eq!(report.pages, 2);
    }
}

mod cancellation {
    use super::*;

    #[test]
    fn cancelled_before_start_writes_nothing() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![vec![simple("https://x.example/a")]]);
        let token = CancellationToken::new();
        token.cancel();

        let (import_id, importer) = fx.importer(&transport, |_| {});
        let report = importer.with_cancel(token).run().unwrap();

        assert_eq!(report.stop, StopReason::Cancelled);
        assert_eq!(report.pages, 0);
        assert!(fx.actions(import_id).is_empty());
        assert_eq!(fx.count("bibo:Webpage"), 0);
    }

    #[test]
    fn cancel_mid_run_stops_before_next_record() {
        let fx = Fixture::new();
        let token = CancellationToken::new();
        let transport = ScriptedTransport::feed(vec![
            vec![simple("https://x.example/a")],
            vec![simple("https://x.example/b")],
            vec![simple("https://x.example/c")],
        ])
        .cancelling_on(1, token.clone());

        let (_, importer) = fx.importer(&transport, |_| {});
        let report = importer.with_cancel(token).run().unwrap();

        assert_eq!(report.stop, StopReason::Cancelled);
        assert_eq!(report.processed, 1);
        assert_eq!(fx.find("bibo:uri", "https://x.example/a").len(), 1);
        assert!(fx.find("bibo:uri", "https://x.example/b").is_empty());
        assert_eq!(transport.fetched().len(), 2);
    }
}

mod citations {
    use super::*;

    #[test]
    fn api_highlight_becomes_citation_with_notes() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![vec![bookmark(json!({
            "url": "https://x.example/a",
            "title": "A",
            "updated_at": T0_RAW,
            "annotations": [{
                "content": "quoted text",
                "created_at": "2019/01/15 11:00:00 +0000",
                "comments": [
                    {"content": "first note", "created_at": "2019/01/15 11:05:00 +0000"},
                    {"content": "second note", "created_at": "2019/01/15 11:06:00 +0000"}
                ]
            }]
        }))]]);

        let (import_id, report) = fx.run(&transport, |_| {});
        assert_eq!(report.step_failures, 0);

        let doc = fx.one("bibo:uri", "https://x.example/a");
        let key = format!("{} citation 2019/01/15 11:00:00 +0000", doc.id);
        let citation = fx.one("dcterms:isReferencedBy", &key);
        assert_eq!(citation.resource_class, Some(fx.class("cito:Citation")));
        assert_eq!(citation.text(fx.property("dcterms:title")), Some(key.as_str()));
        assert_eq!(citation.text(fx.property("bibo:content")), Some("quoted text"));
        assert_eq!(fx.resources(&citation, "dcterms:isPartOf"), vec![doc.id]);

        let note_key = format!("{} note 2019/01/15 11:05:00 +0000", citation.id);
        let note = fx.one("dcterms:isReferencedBy", &note_key);
        assert_eq!(note.resource_class, Some(fx.class("bibo:Note")));
        assert_eq!(note.text(fx.property("bibo:content")), Some("first note"));
        assert_eq!(fx.resources(&note, "dcterms:isPartOf"), vec![citation.id]);
        assert_eq!(fx.count("bibo:Note"), 2);

        assert_eq!(
            fx.actions(import_id),
            vec![
                LedgerAction::Create,
                LedgerAction::CreateCita,
                LedgerAction::CreateNote,
                LedgerAction::CreateNote,
            ]
        );
    }

    #[test]
    fn feed_keys_use_link_and_annotation_ids() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::feed(vec![vec![bookmark(json!({
            "url": "https://x.example/a",
            "title": "A",
            "user_name": "alice",
            "link_id": 4421,
            "updated_at": T0,
            "annotations": [{
                "id": 8,
                "type": "highlight",
                "content": "quote",
                "stickyNotes": [{"id": 1, "content": "why"}]
            }]
        }))]]);

        let (import_id, _) = fx.run(&transport, |_| {});

        let actor = fx.one("foaf:accountName", "alice");
        let citation = fx.one("dcterms:isReferencedBy", "alice 4421 8 citation");
        assert_eq!(fx.resources(&citation, "cito:isCompiledBy"), vec![actor.id]);
        let note = fx.one("dcterms:isReferencedBy", "alice 4421 8 note 1");
        assert_eq!(fx.resources(&note, "dcterms:isPartOf"), vec![citation.id]);

        assert_eq!(
            fx.actions(import_id),
            vec![
                LedgerAction::CreateActor,
                LedgerAction::Create,
                LedgerAction::CreateCita,
                LedgerAction::CreateNote,
            ]
        );
    }

    #[test]
    fn feed_annotation_without_ids_is_a_step_failure() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::feed(vec![vec![bookmark(json!({
            "url": "https://x.example/a",
            "updated_at": T0,
            "annotations": [{"type": "highlight", "content": "quote"}]
        }))]]);

        let (_, report) = fx.run(&transport, |_| {});

        assert_eq!(report.processed, 1);
        assert_eq!(report.step_failures, 1);
        assert_eq!(fx.count("cito:Citation"), 0);
    }
}

mod annotations {
    use super::*;

    fn tagged_by_alice() -> ScriptedTransport {
        ScriptedTransport::feed(vec![vec![bookmark(json!({
            "url": "https://x.example/a",
            "title": "A",
            "tags": ["rust"],
            "user_name": "alice",
            "real_name": "Alice A",
            "link_id": "1",
            "updated_at": T0
        }))]])
    }

    #[test]
    fn feed_tags_produce_tagging_annotations() {
        let fx = Fixture::new();

        let (import_id, _) = fx.run(&tagged_by_alice(), |_| {});

        let doc = fx.one("bibo:uri", "https://x.example/a");
        let actor = fx.one("foaf:accountName", "alice");
        let tag = fx.one("skos:prefLabel", "rust");
        assert_eq!(actor.text(fx.property("foaf:name")), Some("Alice A"));
        assert_eq!(actor.resource_class, Some(fx.class("foaf:Person")));
        assert_eq!(fx.resources(&doc, "cito:isCompiledBy"), vec![actor.id]);

        let key = format!("{} {} {} annotation", doc.id, actor.id, tag.id);
        let annotation = fx.one("dcterms:isReferencedBy", &key);
        assert_eq!(annotation.resource_class, Some(fx.class("oa:Annotation")));
        assert_eq!(
            annotation.text(fx.property("rdf:value")),
            Some("alice tagged A with rust")
        );
        assert_eq!(annotation.text(fx.property("oa:motivatedBy")), Some("tagging"));
        assert_eq!(annotation.text(fx.property("oa:hasPurpose")), Some("tagging"));
        assert_eq!(annotation.text(fx.property("rdf:type")), Some("skos:Concept"));
        assert_eq!(fx.resources(&annotation, "oa:hasBody"), vec![tag.id]);
        assert_eq!(fx.resources(&annotation, "oa:hasTarget"), vec![doc.id]);
        assert_eq!(fx.resources(&annotation, "oa:hasSource"), vec![doc.id]);
        assert_eq!(fx.resources(&annotation, "dcterms:creator"), vec![actor.id]);

        assert_eq!(
            fx.actions(import_id),
            vec![
                LedgerAction::CreateActor,
                LedgerAction::Create,
                LedgerAction::CreateTag,
                LedgerAction::CreateAnnotation,
            ]
        );
    }

    #[test]
    fn rerun_updates_annotation_and_keeps_actor() {
        let fx = Fixture::new();
        fx.run(&tagged_by_alice(), |_| {});

        let (second, _) = fx.run(&tagged_by_alice(), |_| {});

        assert_eq!(
            fx.actions(second),
            vec![LedgerAction::Update, LedgerAction::UpdateAnnotation]
        );
        assert_eq!(fx.count("foaf:Person"), 1);
        assert_eq!(fx.count("oa:Annotation"), 1);
    }

    #[test]
    fn api_mode_creates_no_actors_or_annotations() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![vec![bookmark(json!({
            "url": "https://x.example/a",
            "tags": "rust",
            "user": "alice",
            "updated_at": T0_RAW
        }))]]);

        fx.run(&transport, |_| {});

        assert_eq!(fx.count("foaf:Person"), 0);
        assert_eq!(fx.count("oa:Annotation"), 0);
        let doc = fx.one("bibo:uri", "https://x.example/a");
        assert_eq!(doc.text(fx.property("cito:isCompiledBy")), Some("alice"));
    }
}

mod images {
    use super::*;

    fn with_image() -> ScriptedTransport {
        ScriptedTransport::api(vec![vec![bookmark(json!({
            "url": "https://x.example/a",
            "updated_at": T0_RAW,
            "annotations": [{"type": "image", "image_url": "https://img.example/shot.png"}]
        }))]])
    }

    fn downloader(temp: &std::path::Path, fail: bool) -> (FileDownloader, Rc<RefCell<u32>>) {
        let calls = Rc::new(RefCell::new(0));
        let source = ScriptedSource {
            fail,
            calls: calls.clone(),
        };
        (FileDownloader::new(source, temp), calls)
    }

    fn dir_is_empty(dir: &std::path::Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn image_is_downloaded_and_attached() {
        let media = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let fx = Fixture::with_db(
            Database::open_in_memory()
                .unwrap()
                .with_media_dir(media.path()),
        );
        let transport = with_image();
        let (downloader, calls) = downloader(temp.path(), false);

        let (_, importer) = fx.importer(&transport, |p| p.import_files = true);
        let report = importer.with_downloader(downloader).run().unwrap();

        assert_eq!(report.step_failures, 0);
        assert_eq!(*calls.borrow(), 1);
        let doc = fx.one("bibo:uri", "https://x.example/a");
        let stored = fx.db.get_media(doc.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].source, "https://img.example/shot.png");
        assert_eq!(stored[0].size_bytes, 15);
        assert!(stored[0].storage_path.ends_with(".png"));
        assert!(dir_is_empty(temp.path()), "temp file must be removed");
        assert_eq!(fx.count("cito:Citation"), 0);
    }

    #[test]
    fn failed_download_does_not_abort_the_record() {
        let media = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let fx = Fixture::with_db(
            Database::open_in_memory()
                .unwrap()
                .with_media_dir(media.path()),
        );
        let transport = with_image();
        let (downloader, calls) = downloader(temp.path(), true);

        let (_, importer) = fx.importer(&transport, |p| p.import_files = true);
        let report = importer.with_downloader(downloader).run().unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.step_failures, 1);
        assert_eq!(*calls.borrow(), 3);
        let doc = fx.one("bibo:uri", "https://x.example/a");
        assert!(fx.db.get_media(doc.id).unwrap().is_empty());
        assert!(dir_is_empty(temp.path()));
    }

    #[test]
    fn images_are_ignored_without_import_files() {
        let temp = tempfile::tempdir().unwrap();
        let fx = Fixture::new();
        let transport = with_image();
        let (downloader, calls) = downloader(temp.path(), false);

        let (_, importer) = fx.importer(&transport, |_| {});
        let report = importer.with_downloader(downloader).run().unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(*calls.borrow(), 0);
    }
}

mod failures {
    use super::*;

    #[test]
    fn page_fetch_failure_is_fatal() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![
            vec![simple("https://x.example/a")],
            vec![simple("https://x.example/b")],
        ])
        .failing_on(1);

        let (_, importer) = fx.importer(&transport, |_| {});
        let err = importer.run().unwrap_err();

        assert_eq!(err.code, ErrorCode::TransportFailure);
        // records of earlier pages stay imported
        assert_eq!(fx.find("bibo:uri", "https://x.example/a").len(), 1);
        assert!(fx.find("bibo:uri", "https://x.example/b").is_empty());
    }

    #[test]
    fn missing_item_set_is_invalid_params() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![]);
        let mut params = ImportParams::new(1, 9_999, "alice");
        params.page_size = 10;

        let err = match Importer::new(&fx.db, transport, params) {
            Ok(_) => panic!("importer accepted a missing item set"),
            Err(err) => err,
        };
        assert_eq!(err.code, ErrorCode::InvalidParams);
    }

    #[test]
    fn record_without_url_is_counted_and_skipped() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![vec![
            bookmark(json!({"url": "  ", "updated_at": T0_RAW})),
            simple("https://x.example/ok"),
        ]]);

        let (_, report) = fx.run(&transport, |_| {});

        assert_eq!(report.failed, 1);
        assert_eq!(report.processed, 1);
    }
}

mod options {
    use super::*;

    #[test]
    fn probe_records_link_status() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![vec![
            simple("https://x.example/live"),
            simple("https://x.example/gone"),
            simple("https://x.example/down"),
        ]]);
        let probe = FixedProbe(vec![
            ("https://x.example/live", Some(200)),
            ("https://x.example/gone", Some(404)),
            ("https://x.example/down", None),
        ]);

        let (_, importer) = fx.importer(&transport, |p| p.probe_links = true);
        importer.with_probe(probe).run().unwrap();

        let status = fx.property("bibo:status");
        let text = |url: &str| fx.one("bibo:uri", url).text(status).map(str::to_string);
        assert_eq!(text("https://x.example/live").as_deref(), Some("200"));
        assert_eq!(text("https://x.example/gone").as_deref(), Some("404"));
        assert_eq!(text("https://x.example/down").as_deref(), Some("unreachable"));
    }

    #[test]
    fn custom_mapping_table_redirects_fields() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![vec![bookmark(json!({
            "url": "https://x.example/a",
            "title": "A",
            "updated_at": T0_RAW
        }))]]);
        let table = MappingTable::from_yaml("title:\n  - term: bibo:shortTitle\n").unwrap();

        let (_, importer) = fx.importer(&transport, |_| {});
        importer.with_mapping(&table).run().unwrap();

        let doc = fx.one("bibo:uri", "https://x.example/a");
        assert_eq!(doc.text(fx.property("bibo:shortTitle")), Some("A"));
        assert_eq!(doc.text(fx.property("dcterms:title")), None);
    }

    #[test]
    fn custom_mapping_table_keeps_citation_links() {
        let fx = Fixture::new();
        let transport = ScriptedTransport::api(vec![vec![bookmark(json!({
            "url": "https://x.example/a",
            "title": "A",
            "updated_at": T0_RAW,
            "annotations": [{
                "content": "quoted text",
                "created_at": T0_RAW,
                "comments": [{"content": "a note", "created_at": T0_RAW}]
            }]
        }))]]);
        let table = MappingTable::from_yaml("title:\n  - term: bibo:shortTitle\n").unwrap();

        let (_, importer) = fx.importer(&transport, |_| {});
        let report = importer.with_mapping(&table).run().unwrap();
        assert_eq!(report.step_failures, 0);

        let doc = fx.one("bibo:uri", "https://x.example/a");
        let key = format!("{} citation {}", doc.id, T0_RAW);
        let citation = fx.one("dcterms:isReferencedBy", &key);
        assert_eq!(fx.resources(&citation, "dcterms:isPartOf"), vec![doc.id]);
        assert_eq!(citation.text(fx.property("dcterms:title")), Some(key.as_str()));

        let note_key = format!("{} note {}", citation.id, T0_RAW);
        let note = fx.one("dcterms:isReferencedBy", &note_key);
        assert_eq!(fx.resources(&note, "dcterms:isPartOf"), vec![citation.id]);
        assert_eq!(note.text(fx.property("dcterms:title")), Some(note_key.as_str()));
    }
}
