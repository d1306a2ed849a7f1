//! Chat session behaviour: history, the fallback yes/no hand-off, uploads,
//! and session reset.

mod common;

use ragchat::router::FALLBACK_MESSAGE;
use ragchat::session::{ChatSession, UploadOutcome, DECLINE_MESSAGE, WELCOME_MESSAGE};
use ragchat_core::models::{Role, Turn};

use common::{harness, Harness, ScriptedModel};

const FREEDONIA: &str = "The capital of Freedonia is Lastonia.";

fn session(h: &Harness) -> ChatSession {
    ChatSession::new(h.app.router.clone(), h.app.splitter.clone())
}

#[tokio::test]
async fn starts_with_welcome_message() {
    let h = harness(ScriptedModel::new("relevant"));
    let session = session(&h);
    assert_eq!(session.history(), &[Turn::assistant(WELCOME_MESSAGE)]);
}

#[tokio::test]
async fn fragments_are_forwarded_and_recorded() {
    let h = harness(ScriptedModel::new("relevant"));
    let mut session = session(&h);

    let mut seen = Vec::new();
    let reply = session
        .respond("hello model", |f| seen.push(f.to_string()))
        .await;

    assert_eq!(seen, vec!["Answer: ", "hello ", "model"]);
    assert_eq!(reply.text, "Answer: hello model");
    assert!(reply.sources.is_empty());
    let history = session.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1], Turn::user("hello model"));
    assert_eq!(history[2], Turn::assistant("Answer: hello model"));
}

#[tokio::test]
async fn yes_after_fallback_answers_original_question_directly() {
    let h = harness(ScriptedModel::new("no"));
    let mut session = session(&h);
    session.upload("freedonia.txt", FREEDONIA.as_bytes()).await.unwrap();

    let first = session.respond("Who won the 1998 cup final?", |_| {}).await;
    assert_eq!(first.text, FALLBACK_MESSAGE);
    assert_eq!(h.model.completion_count(), 1);

    let second = session.respond(" Yes ", |_| {}).await;
    assert_eq!(second.text, "Answer: Who won the 1998 cup final?");
    assert!(second.sources.is_empty());
    // Forced direct: no second relevance check.
    assert_eq!(h.model.completion_count(), 1);
    assert_eq!(h.model.prompts(), vec!["Who won the 1998 cup final?".to_string()]);

    // The offer was consumed; "y" is now an ordinary message.
    session.respond("y", |_| {}).await;
    assert_eq!(h.model.completion_count(), 2);
}

#[tokio::test]
async fn anything_else_after_fallback_is_declined() {
    let h = harness(ScriptedModel::new("no"));
    let mut session = session(&h);
    session.upload("freedonia.txt", FREEDONIA.as_bytes()).await.unwrap();

    session.respond("Who won the 1998 cup final?", |_| {}).await;
    let reply = session.respond("no thanks", |_| {}).await;

    assert_eq!(reply.text, DECLINE_MESSAGE);
    assert!(h.model.prompts().is_empty());
    assert_eq!(h.model.completion_count(), 1);
    assert_eq!(session.history().last().map(|t| t.role), Some(Role::Assistant));
}

#[tokio::test]
async fn grounded_reply_carries_sources() {
    let h = harness(ScriptedModel::new("relevant"));
    let mut session = session(&h);
    session.upload("freedonia.txt", FREEDONIA.as_bytes()).await.unwrap();

    let reply = session.respond("What is the capital of Freedonia?", |_| {}).await;

    assert!(reply.text.contains("Lastonia"));
    assert_eq!(reply.sources.len(), 1);
    assert_eq!(reply.sources[0].content, FREEDONIA);
}

#[tokio::test]
async fn duplicate_upload_is_skipped() {
    let h = harness(ScriptedModel::new("relevant"));
    let mut session = session(&h);

    let first = session.upload("notes.txt", b"alpha beta").await.unwrap();
    assert!(matches!(first, UploadOutcome::Ingested { chunks: 1 }));
    let second = session.upload("dir/notes.txt", b"alpha beta").await.unwrap();
    assert!(matches!(second, UploadOutcome::AlreadyProcessed));
    assert_eq!(h.active.len(), 1);
    assert_eq!(session.processed_files().collect::<Vec<_>>(), vec!["notes.txt"]);
}

#[tokio::test]
async fn rejected_upload_is_not_recorded() {
    let h = harness(ScriptedModel::new("relevant"));
    let mut session = session(&h);

    assert!(session.upload("slides.pptx", b"PK").await.is_err());
    assert!(session.upload("blank.txt", b"   \n\n ").await.is_err());
    assert_eq!(session.processed_files().count(), 0);
    assert!(h.active.is_empty());
}

#[tokio::test]
async fn clear_chat_keeps_documents() {
    let h = harness(ScriptedModel::new("relevant"));
    let mut session = session(&h);
    session.upload("notes.txt", b"alpha beta").await.unwrap();
    session.respond("hello", |_| {}).await;

    session.clear_chat();

    assert_eq!(session.history(), &[Turn::assistant(WELCOME_MESSAGE)]);
    assert_eq!(h.active.len(), 1);
    assert_eq!(session.processed_files().count(), 1);
}

#[tokio::test]
async fn new_session_archives_documents() {
    let h = harness(ScriptedModel::new("relevant"));
    let mut session = session(&h);
    session.upload("notes.txt", b"alpha beta").await.unwrap();
    session.respond("hello", |_| {}).await;

    assert!(session.new_session().await);

    assert!(h.active.is_empty());
    assert_eq!(h.archive.len(), 1);
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.processed_files().count(), 0);
}

#[tokio::test]
async fn clear_documents_skips_archive() {
    let h = harness(ScriptedModel::new("relevant"));
    let mut session = session(&h);
    session.upload("notes.txt", b"alpha beta").await.unwrap();

    assert!(session.clear_documents().await);

    assert!(h.active.is_empty());
    assert!(h.archive.is_empty());
    assert_eq!(session.processed_files().count(), 0);
}

#[tokio::test]
async fn quoting_the_offer_does_not_arm_the_hand_off() {
    let h = harness(ScriptedModel::new("relevant"));
    let mut session = session(&h);

    let quoted = format!("Repeat after me: {}", FALLBACK_MESSAGE);
    let first = session.respond(&quoted, |_| {}).await;
    assert!(first.text.contains(FALLBACK_MESSAGE));

    let second = session.respond("yes", |_| {}).await;
    assert_eq!(second.text, "Answer: yes");
    assert_eq!(h.model.prompts(), vec![quoted, "yes".to_string()]);
}

#[tokio::test]
async fn clear_chat_drops_pending_offer() {
    let h = harness(ScriptedModel::new("no"));
    let mut session = session(&h);
    session.upload("freedonia.txt", FREEDONIA.as_bytes()).await.unwrap();

    let first = session.respond("Who won the 1998 cup final?", |_| {}).await;
    assert_eq!(first.text, FALLBACK_MESSAGE);
    session.clear_chat();

    let reply = session.respond("no", |_| {}).await;
    assert_ne!(reply.text, DECLINE_MESSAGE);
    assert_eq!(h.model.completion_count(), 2);
}
