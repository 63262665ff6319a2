//! Integration tests for the draft lifecycle

use std::sync::Arc;

use abstractu_content::config::RetryConfig;
use abstractu_content::models::NewConcept;
use abstractu_content::{ChainError, ContentService, Database};
use tempfile::TempDir;

const AUTHOR: &str = "0x3333333333333333333333333333333333333333";
const OTHER: &str = "0x4444444444444444444444444444444444444444";

async fn setup() -> (TempDir, ContentService) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let database = Database::open(dir.path().join("drafts.db")).expect("Failed to create database");
    let service = ContentService::with_database(Arc::new(database), RetryConfig::default());
    service
        .seed_concept(NewConcept {
            cid: "d".to_string(),
            title: "Drafting".to_string(),
            description: "Draft target".to_string(),
            cover_image: None,
            tags: None,
            initial_content: "# Drafting\n\nSeed body.".to_string(),
        })
        .await
        .expect("seed");
    (dir, service)
}

#[tokio::test]
async fn test_save_then_get() {
    let (_dir, service) = setup().await;
    let saved = service
        .save_draft("d", AUTHOR, "Some text".to_string())
        .await
        .expect("save");
    let loaded = service.get_draft("d", AUTHOR).await.expect("get");
    assert_eq!(saved, loaded);
    assert_eq!(loaded.author_address, AUTHOR);
}

#[tokio::test]
async fn test_author_address_is_case_insensitive() {
    let (_dir, service) = setup().await;
    let mixed = "0xABCDEFabcdef0000000000000000000000000000";
    let saved = service
        .save_draft("d", mixed, "text".to_string())
        .await
        .expect("save");
    assert_eq!(saved.author_address, mixed.to_lowercase());
    assert!(service.get_draft("d", &mixed.to_lowercase()).await.is_ok());
}

#[tokio::test]
async fn test_upsert_keeps_one_draft_per_author_and_concept() {
    let (_dir, service) = setup().await;
    let first = service.save_draft("d", AUTHOR, "v1".to_string()).await.expect("save");
    let second = service.save_draft("d", AUTHOR, "v2".to_string()).await.expect("save");
    let other = service.save_draft("d", OTHER, "mine".to_string()).await.expect("save");

    assert_eq!(first.did, second.did);
    assert_eq!(first.created_at, second.created_at);
    assert_ne!(first.did, other.did);
    assert_eq!(service.get_draft("d", AUTHOR).await.expect("get").content, "v2");
}

#[tokio::test]
async fn test_empty_draft_can_be_saved() {
    let (_dir, service) = setup().await;
    let draft = service.save_draft("d", AUTHOR, String::new()).await.expect("save");
    assert!(draft.content.is_empty());
}

#[tokio::test]
async fn test_publish_of_empty_draft_keeps_draft_and_chain() {
    let (_dir, service) = setup().await;
    let draft = service
        .save_draft("d", AUTHOR, "  \n\n ".to_string())
        .await
        .expect("save");

    let result = service.publish_draft(&draft.did.to_string(), AUTHOR).await;
    assert!(matches!(result, Err(ChainError::Parsing(_))));

    assert_eq!(service.get_draft("d", AUTHOR).await.expect("kept").did, draft.did);
    let page = service.get_sentences("d", None, None).await.expect("page");
    assert_eq!(page.sentences.len(), 2);
    assert_eq!(page.sentences[1].nsid, None);
}

#[tokio::test]
async fn test_publish_deletes_draft() {
    let (_dir, service) = setup().await;
    let draft = service
        .save_draft("d", AUTHOR, "New paragraph.".to_string())
        .await
        .expect("save");
    let added = service
        .publish_draft(&draft.did.to_string(), AUTHOR)
        .await
        .expect("publish");
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].sid, 2);

    assert!(matches!(
        service.get_draft("d", AUTHOR).await,
        Err(ChainError::DraftNotFound(_))
    ));
    assert!(matches!(
        service.publish_draft(&draft.did.to_string(), AUTHOR).await,
        Err(ChainError::DraftNotFound(_))
    ));
}

#[tokio::test]
async fn test_publish_by_other_author_is_not_found() {
    let (_dir, service) = setup().await;
    let draft = service
        .save_draft("d", AUTHOR, "Mine.".to_string())
        .await
        .expect("save");
    let result = service.publish_draft(&draft.did.to_string(), OTHER).await;
    assert!(matches!(result, Err(ChainError::DraftNotFound(_))));
    assert!(service.get_draft("d", AUTHOR).await.is_ok());
}

#[tokio::test]
async fn test_draft_for_unknown_concept() {
    let (_dir, service) = setup().await;
    let result = service.save_draft("x", AUTHOR, "text".to_string()).await;
    assert!(matches!(result, Err(ChainError::ConceptNotFound(_))));
}

#[tokio::test]
async fn test_malformed_draft_id() {
    let (_dir, service) = setup().await;
    let result = service.publish_draft("not-a-uuid", AUTHOR).await;
    assert!(matches!(result, Err(ChainError::Validation(_))));
}
