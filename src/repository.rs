use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::Database;
use crate::error::Result;
use crate::markdown::MarkdownIngest;
use crate::models::{Cid, Concept, ConceptSummary, Draft, PageRequest, ParsedFragment, Sentence, SentencePage};

/// Storage seam for concepts, sentence chains and drafts.
///
/// Implementations must make `seed_concept` and `publish_draft` atomic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn seed_concept(&self, concept: Concept, fragments: Vec<ParsedFragment>) -> Result<Vec<Sentence>>;
    async fn get_concept(&self, cid: Cid) -> Result<Option<Concept>>;
    async fn list_concepts(&self) -> Result<Vec<ConceptSummary>>;
    async fn list_concepts_admin(&self) -> Result<Vec<Concept>>;
    async fn get_sentences(&self, cid: Cid, page: PageRequest) -> Result<SentencePage>;
    async fn get_draft(&self, cid: Cid, author: String) -> Result<Option<Draft>>;
    async fn save_draft(&self, cid: Cid, author: String, content: String) -> Result<Draft>;
    async fn publish_draft(
        &self,
        did: Uuid,
        author: String,
        ingest: Arc<dyn MarkdownIngest>,
    ) -> Result<Vec<Sentence>>;
}

/// SQLite-backed repository; store calls run on the blocking pool
#[derive(Clone)]
pub struct SqliteRepository {
    database: Arc<Database>,
}

impl SqliteRepository {
    pub const fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let database = Arc::clone(&self.database);
        tokio::task::spawn_blocking(move || op(&database)).await?
    }
}

#[async_trait]
impl ContentRepository for SqliteRepository {
    async fn seed_concept(&self, concept: Concept, fragments: Vec<ParsedFragment>) -> Result<Vec<Sentence>> {
        self.blocking(move |db| db.seed_concept(&concept, fragments)).await
    }

    async fn get_concept(&self, cid: Cid) -> Result<Option<Concept>> {
        self.blocking(move |db| db.get_concept(cid)).await
    }

    async fn list_concepts(&self) -> Result<Vec<ConceptSummary>> {
        self.blocking(Database::list_concepts).await
    }

    async fn list_concepts_admin(&self) -> Result<Vec<Concept>> {
        self.blocking(Database::list_concepts_admin).await
    }

    async fn get_sentences(&self, cid: Cid, page: PageRequest) -> Result<SentencePage> {
        self.blocking(move |db| db.get_sentences(cid, page)).await
    }

    async fn get_draft(&self, cid: Cid, author: String) -> Result<Option<Draft>> {
        self.blocking(move |db| db.get_draft(cid, &author)).await
    }

    async fn save_draft(&self, cid: Cid, author: String, content: String) -> Result<Draft> {
        self.blocking(move |db| db.save_draft(cid, &author, &content)).await
    }

    async fn publish_draft(
        &self,
        did: Uuid,
        author: String,
        ingest: Arc<dyn MarkdownIngest>,
    ) -> Result<Vec<Sentence>> {
        self.blocking(move |db| db.publish_draft(did, &author, ingest.as_ref())).await
    }
}
