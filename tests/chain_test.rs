//! Integration tests for seeding and publishing into sentence chains

use std::sync::Arc;

use abstractu_content::chain::verify_chain;
use abstractu_content::config::RetryConfig;
use abstractu_content::models::{FragmentKind, ListItemMeta, NewConcept, PageRequest, MAX_PAGE_LIMIT};
use abstractu_content::render::SentenceFeed;
use abstractu_content::{Cid, ContentService, Database};
use tempfile::TempDir;

const AUTHOR: &str = "0x1111111111111111111111111111111111111111";

fn setup() -> (TempDir, Arc<ContentService>) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let database = Database::open(dir.path().join("chain.db")).expect("Failed to create database");
    let service = ContentService::with_database(Arc::new(database), RetryConfig::default());
    (dir, Arc::new(service))
}

fn new_concept(cid: &str, content: &str) -> NewConcept {
    NewConcept {
        cid: cid.to_string(),
        title: "Web3 Fundamentals".to_string(),
        description: "An introduction".to_string(),
        cover_image: Some("https://cdn.example/cover.png".to_string()),
        tags: Some(vec!["web3".to_string()]),
        initial_content: content.to_string(),
    }
}

fn cid(raw: &str) -> Cid {
    Cid::parse(raw).expect("cid")
}

async fn full_chain(service: &Arc<ContentService>, raw: &str) -> Vec<abstractu_content::Sentence> {
    let mut feed = SentenceFeed::new(Arc::clone(service), cid(raw), MAX_PAGE_LIMIT);
    feed.load_all().await.expect("load chain").to_vec()
}

#[tokio::test]
async fn test_seed_then_publish_scenario() {
    let (_dir, service) = setup();

    let outcome = service
        .seed_concept(new_concept("w", "# Title\n\nFirst para.\n\n- item A\n- item B\n"))
        .await
        .expect("seed");
    assert_eq!(outcome.sentences.len(), 4);

    let kinds: Vec<&str> = outcome.sentences.iter().map(|s| s.kind.type_name()).collect();
    assert_eq!(kinds, vec!["heading1", "paragraph", "listItem", "listItem"]);
    assert_eq!(outcome.sentences[0].psid, None);
    assert_eq!(outcome.sentences[3].nsid, None);

    let draft = service
        .save_draft("w", AUTHOR, "- item C\n".to_string())
        .await
        .expect("save draft");
    let added = service
        .publish_draft(&draft.did.to_string(), AUTHOR)
        .await
        .expect("publish");
    assert_eq!(added.len(), 1);

    let chain = full_chain(&service, "w").await;
    assert_eq!(chain.len(), 5);
    assert_eq!(chain[3].nsid, Some(4));
    assert_eq!(chain[4].sid, 4);
    assert_eq!(chain[4].psid, Some(3));
    assert_eq!(chain[4].nsid, None);
    assert_eq!(chain[4].content, "item C");
    assert_eq!(
        chain[4].kind,
        FragmentKind::ListItem(ListItemMeta {
            ordered: false,
            indentation: 0,
            item_number: None,
            start: None,
        })
    );
    verify_chain(&chain).expect("chain intact");
}

#[tokio::test]
async fn test_repeated_publishes_stay_contiguous() {
    let (_dir, service) = setup();
    service
        .seed_concept(new_concept("c", "Intro paragraph."))
        .await
        .expect("seed");

    for round in 0..5 {
        let content = format!("## Round {round}\n\n1. first\n2. second\n\n```rust\nlet x = {round};\n```\n");
        let draft = service.save_draft("c", AUTHOR, content).await.expect("save");
        let added = service
            .publish_draft(&draft.did.to_string(), AUTHOR)
            .await
            .expect("publish");
        assert_eq!(added.len(), 4);
    }

    let chain = full_chain(&service, "c").await;
    assert_eq!(chain.len(), 21);
    verify_chain(&chain).expect("chain intact");
}

#[tokio::test]
async fn test_concurrent_publishes_from_many_authors() {
    let (_dir, service) = setup();
    service.seed_concept(new_concept("k", "Start.")).await.expect("seed");

    let authors: Vec<String> = (0..6).map(|i| format!("0x{:040x}", i + 1)).collect();
    let mut dids = Vec::new();
    for author in &authors {
        let draft = service
            .save_draft("k", author, format!("Note from {author}\n\nSecond line."))
            .await
            .expect("save");
        dids.push(draft.did.to_string());
    }

    let mut handles = Vec::new();
    for (author, did) in authors.into_iter().zip(dids) {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move { service.publish_draft(&did, &author).await }));
    }
    for handle in handles {
        let added = handle.await.expect("join").expect("publish");
        assert_eq!(added.len(), 2);
    }

    let chain = full_chain(&service, "k").await;
    assert_eq!(chain.len(), 13);
    verify_chain(&chain).expect("chain intact");
}

#[tokio::test]
async fn test_chains_are_independent_per_concept() {
    let (_dir, service) = setup();
    service.seed_concept(new_concept("a", "one\n\ntwo")).await.expect("seed a");
    service.seed_concept(new_concept("b", "three")).await.expect("seed b");

    let page_b = service
        .page(cid("b"), PageRequest::default())
        .await
        .expect("page");
    assert_eq!(page_b.sentences.len(), 1);
    assert_eq!(page_b.sentences[0].sid, 0);
    assert_eq!(page_b.sentences[0].cid, cid("b"));
}

#[tokio::test]
async fn test_seed_rejects_content_without_blocks() {
    let (_dir, service) = setup();
    let result = service.seed_concept(new_concept("e", "   \n\n")).await;
    assert!(result.is_err());
    assert!(service.get_concept("e").await.is_err());
}

#[tokio::test]
async fn test_seed_stores_concept_fields() {
    let (_dir, service) = setup();
    service
        .seed_concept(new_concept("m", "Body"))
        .await
        .expect("seed");

    let concept = service.get_concept("m").await.expect("concept");
    assert_eq!(concept.title, "Web3 Fundamentals");
    assert_eq!(concept.cover_image.as_deref(), Some("https://cdn.example/cover.png"));
    assert_eq!(concept.tags, vec!["web3".to_string()]);

    let listed = service.list_concepts().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].cid, cid("m"));
}
