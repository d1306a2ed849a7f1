//! Document store lifecycle on SQLite-backed collections.

mod common;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use ragchat::document_store::DocumentStore;
use ragchat::error::IngestionError;
use ragchat::ingest::{ingest_file, ingest_files, ingest_paths};
use ragchat::sqlite_index::SqliteIndex;
use ragchat_core::chunk::TextSplitter;
use ragchat_core::models::ContentKind;
use ragchat_core::store::VectorIndex;

use common::{minimal_pdf_with_phrase, BagOfWordsEmbedder};

struct SqliteFixture {
    _tmp: TempDir,
    root: PathBuf,
    store: DocumentStore,
    active: Arc<SqliteIndex>,
    archive: Arc<SqliteIndex>,
}

async fn fixture() -> SqliteFixture {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    let active = Arc::new(
        SqliteIndex::open(&root.join("chroma/ragchat.sqlite"), "LocalRAG")
            .await
            .unwrap(),
    );
    let archive = Arc::new(
        SqliteIndex::open(&root.join("chroma_archive/ragchat.sqlite"), "LocalRAG_Archive")
            .await
            .unwrap(),
    );
    let store = DocumentStore::new(active.clone(), archive.clone(), Arc::new(BagOfWordsEmbedder));
    SqliteFixture {
        _tmp: tmp,
        root,
        store,
        active,
        archive,
    }
}

fn long_text() -> String {
    (0..40)
        .map(|i| format!("Paragraph {} talks about topic number {} in some detail.", i, i))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[tokio::test]
async fn archive_round_trip_preserves_content_and_ids() {
    let f = fixture().await;
    let splitter = TextSplitter::new(200, 16);
    let n = ingest_file(&f.store, &splitter, "topics.txt", long_text().as_bytes(), &BTreeMap::new())
        .await
        .unwrap();
    assert!(n > 1);

    let before = f.active.fetch_all().await.unwrap();
    assert_eq!(before.len(), n);

    assert!(f.store.archive_current_documents().await);

    assert!(!f.store.has_documents().await);
    assert!(f.active.list_ids().await.unwrap().is_empty());
    let after = f.archive.fetch_all().await.unwrap();
    assert_eq!(after.len(), n);
    for (original, archived) in before.iter().zip(&after) {
        assert_eq!(original.chunk.id, archived.chunk.id);
        assert_eq!(original.chunk.content, archived.chunk.content);
        assert_eq!(original.chunk.metadata, archived.chunk.metadata);
        assert_eq!(original.vector, archived.vector);
    }
    assert_eq!(f.store.archived_count().await.unwrap(), n);
}

#[tokio::test]
async fn archive_and_clear_are_noops_on_empty_store() {
    let f = fixture().await;
    assert!(f.store.archive_current_documents().await);
    assert!(f.store.clear_documents().await);
    assert!(!f.store.has_documents().await);
    assert_eq!(f.store.archived_count().await.unwrap(), 0);
}

#[tokio::test]
async fn documents_survive_reopen() {
    let f = fixture().await;
    let splitter = TextSplitter::new(2048, 16);
    ingest_file(&f.store, &splitter, "a.txt", b"persistent words", &BTreeMap::new())
        .await
        .unwrap();

    let reopened = SqliteIndex::open(&f.root.join("chroma/ragchat.sqlite"), "LocalRAG")
        .await
        .unwrap();
    assert_eq!(reopened.count().await.unwrap(), 1);
}

#[tokio::test]
async fn pdf_upload_is_extracted_and_searchable() {
    let f = fixture().await;
    let splitter = TextSplitter::new(2048, 16);
    let pdf = minimal_pdf_with_phrase("Lastonia is the capital");

    let mut tags = BTreeMap::new();
    tags.insert("team".to_string(), "geo".to_string());
    let n = ingest_file(&f.store, &splitter, "atlas.PDF", &pdf, &tags).await.unwrap();
    assert_eq!(n, 1);

    let sources = f.store.get_relevant_sources("capital Lastonia", 3).await;
    assert_eq!(sources.len(), 1);
    assert!(sources[0].content.contains("Lastonia"));
    assert_eq!(sources[0].metadata.source, "atlas.PDF");
    assert_eq!(sources[0].metadata.kind, ContentKind::Pdf);
    assert_eq!(sources[0].metadata.tags.get("team").map(String::as_str), Some("geo"));
}

#[tokio::test]
async fn batch_reports_each_file_independently() {
    let f = fixture().await;
    let splitter = TextSplitter::new(2048, 16);

    let reports = ingest_files(
        &f.store,
        &splitter,
        vec![
            ("good.txt".to_string(), b"some useful text".to_vec()),
            ("deck.pptx".to_string(), b"PK\x03\x04".to_vec()),
            ("broken.pdf".to_string(), b"not really a pdf".to_vec()),
            ("latin1.txt".to_string(), vec![0x63, 0x61, 0x66, 0xe9]),
            ("empty.txt".to_string(), b"  \n ".to_vec()),
            ("../other.txt".to_string(), b"more useful text".to_vec()),
        ],
    )
    .await;

    let files: Vec<&str> = reports.iter().map(|r| r.file.as_str()).collect();
    assert_eq!(
        files,
        vec!["good.txt", "deck.pptx", "broken.pdf", "latin1.txt", "empty.txt", "other.txt"]
    );
    assert!(matches!(reports[0].outcome, Ok(1)));
    assert!(matches!(reports[1].outcome, Err(IngestionError::UnsupportedType(_))));
    assert!(matches!(reports[2].outcome, Err(IngestionError::Unreadable { .. })));
    assert!(matches!(reports[3].outcome, Err(IngestionError::Unreadable { .. })));
    assert!(matches!(reports[4].outcome, Err(IngestionError::Empty(_))));
    assert!(reports[5].succeeded());
    assert_eq!(f.store.document_count().await.unwrap(), 2);
}

#[tokio::test]
async fn paths_are_read_from_disk() {
    let f = fixture().await;
    let splitter = TextSplitter::new(2048, 16);
    let docs = f.root.join("docs");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("notes.txt"), "disk based notes").unwrap();
    std::fs::write(docs.join("image.png"), [0x89, 0x50]).unwrap();

    let reports = ingest_paths(
        &f.store,
        &splitter,
        &[
            docs.join("notes.txt"),
            docs.join("image.png"),
            docs.join("missing.txt"),
        ],
        &BTreeMap::new(),
    )
    .await;

    assert!(reports[0].succeeded());
    assert_eq!(reports[0].file, "notes.txt");
    assert!(matches!(reports[1].outcome, Err(IngestionError::UnsupportedType(_))));
    assert!(matches!(reports[2].outcome, Err(IngestionError::Unreadable { .. })));
}

#[tokio::test]
async fn reingesting_same_file_upserts() {
    let f = fixture().await;
    let splitter = TextSplitter::new(2048, 16);
    for _ in 0..2 {
        ingest_file(&f.store, &splitter, "same.txt", b"identical content", &BTreeMap::new())
            .await
            .unwrap();
    }
    assert_eq!(f.store.document_count().await.unwrap(), 1);
}
