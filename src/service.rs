//! Content service
//!
//! Validates caller input, runs store operations with bounded retry on
//! aborted transactions, and reports metrics and logs around each call.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::db::Database;
use crate::error::{ChainError, Result};
use crate::markdown::{MarkdownIngest, MarkdownParser};
use crate::metrics::{MetricsCollector, MetricsTimer};
use crate::models::{
    Cid, Concept, ConceptSummary, Draft, NewConcept, PageRequest, ParsedFragment, SeedOutcome, Sentence,
    SentencePage,
};
use crate::render::SentenceSource;
use crate::repository::{ContentRepository, SqliteRepository};
use crate::validation::InputValidator;

pub struct ContentService {
    repository: Arc<dyn ContentRepository>,
    ingest: Arc<dyn MarkdownIngest>,
    retry: RetryConfig,
    metrics: MetricsCollector,
}

impl ContentService {
    pub fn new(repository: Arc<dyn ContentRepository>, ingest: Arc<dyn MarkdownIngest>, retry: RetryConfig) -> Self {
        Self {
            repository,
            ingest,
            retry,
            metrics: MetricsCollector::default(),
        }
    }

    /// Service over a SQLite database with the block parser
    pub fn with_database(database: Arc<Database>, retry: RetryConfig) -> Self {
        Self::new(Arc::new(SqliteRepository::new(database)), Arc::new(MarkdownParser), retry)
    }

    /// Parse markdown for `cid`, recording ingestion metrics
    pub fn parse(&self, markdown: &str, cid: Cid) -> Vec<ParsedFragment> {
        let start = Instant::now();
        let fragments = self.ingest.parse(markdown, cid);
        self.metrics.record_parse(fragments.len(), start.elapsed());
        fragments
    }

    /// Create a concept and its first sentence batch
    pub async fn seed_concept(&self, request: NewConcept) -> Result<SeedOutcome> {
        let cid = InputValidator::validate_cid(&request.cid)?;
        let title = InputValidator::validate_title(&request.title)?;
        let description = InputValidator::validate_description(&request.description)?;
        let cover_image = InputValidator::validate_cover_image(request.cover_image.as_deref())?;
        let tags = InputValidator::validate_tags(request.tags.as_deref())?;
        InputValidator::validate_initial_content(&request.initial_content)?;

        let fragments = self.parse(&request.initial_content, cid);
        if fragments.is_empty() {
            return Err(ChainError::Parsing(
                "Could not parse any valid sentences from initial content.".to_string(),
            ));
        }

        let concept = Concept {
            cid,
            title,
            description,
            cover_image,
            tags,
            created_at: Utc::now(),
        };

        let repository = &self.repository;
        let sentences = self
            .with_retry("seed_concept", || repository.seed_concept(concept.clone(), fragments.clone()))
            .await?;

        self.metrics.record_seed();
        self.record_append(cid, &sentences);
        info!(%cid, sentences = sentences.len(), "Concept seeded");

        Ok(SeedOutcome { concept, sentences })
    }

    /// Get a concept, failing with `ConceptNotFound` when absent
    pub async fn get_concept(&self, raw_cid: &str) -> Result<Concept> {
        let cid = InputValidator::validate_cid(raw_cid)?;
        let repository = &self.repository;
        self.with_retry("get_concept", || repository.get_concept(cid))
            .await?
            .ok_or_else(|| ChainError::ConceptNotFound(cid.to_string()))
    }

    pub async fn list_concepts(&self) -> Result<Vec<ConceptSummary>> {
        let repository = &self.repository;
        self.with_retry("list_concepts", || repository.list_concepts()).await
    }

    pub async fn list_concepts_admin(&self) -> Result<Vec<Concept>> {
        let repository = &self.repository;
        self.with_retry("list_concepts_admin", || repository.list_concepts_admin()).await
    }

    /// Page through a chain from raw query values
    pub async fn get_sentences(
        &self,
        raw_cid: &str,
        start_sid: Option<&str>,
        limit: Option<&str>,
    ) -> Result<SentencePage> {
        let cid = InputValidator::validate_cid(raw_cid)?;
        let page = InputValidator::page_request(start_sid, limit)?;
        self.page(cid, page).await
    }

    /// Page through a chain with an already validated request
    pub async fn page(&self, cid: Cid, page: PageRequest) -> Result<SentencePage> {
        let repository = &self.repository;
        let result = self
            .with_retry("get_sentences", || repository.get_sentences(cid, page))
            .await?;
        self.metrics.record_page(result.sentences.len(), result.next_sid.is_none());
        debug!(
            %cid,
            start_sid = page.start_sid,
            returned = result.sentences.len(),
            next_sid = ?result.next_sid,
            "Served sentence page"
        );
        Ok(result)
    }

    /// Fetch an author's draft for a concept
    pub async fn get_draft(&self, raw_cid: &str, author: &str) -> Result<Draft> {
        let cid = InputValidator::validate_cid(raw_cid)?;
        let author = InputValidator::validate_address(author)?;
        let repository = &self.repository;
        self.with_retry("get_draft", || repository.get_draft(cid, author.clone()))
            .await?
            .ok_or_else(|| ChainError::DraftNotFound("No draft found for this concept.".to_string()))
    }

    /// Create or update an author's draft for a concept
    pub async fn save_draft(&self, raw_cid: &str, author: &str, content: String) -> Result<Draft> {
        let cid = InputValidator::validate_cid(raw_cid)?;
        let author = InputValidator::validate_address(author)?;
        InputValidator::validate_draft_content(&content)?;

        let repository = &self.repository;
        let draft = self
            .with_retry("save_draft", || repository.save_draft(cid, author.clone(), content.clone()))
            .await?;
        debug!(%cid, did = %draft.did, bytes = draft.content.len(), "Draft saved");
        Ok(draft)
    }

    /// Publish a draft; returns the appended sentences
    pub async fn publish_draft(&self, raw_did: &str, author: &str) -> Result<Vec<Sentence>> {
        let did = InputValidator::validate_draft_id(raw_did)?;
        let author = InputValidator::validate_address(author)?;

        let repository = &self.repository;
        let ingest = &self.ingest;
        let sentences = self
            .with_retry("publish_draft", || {
                repository.publish_draft(did, author.clone(), Arc::clone(ingest))
            })
            .await?;

        self.metrics.record_publish();
        if let Some(first) = sentences.first() {
            self.record_append(first.cid, &sentences);
            info!(cid = %first.cid, %did, sentences = sentences.len(), "Draft published");
        }
        Ok(sentences)
    }

    fn record_append(&self, cid: Cid, sentences: &[Sentence]) {
        let length = sentences.last().map_or(0, |s| s.sid.saturating_add(1));
        self.metrics.record_append(cid.as_char(), sentences.len(), length);
    }

    /// Run `op`, retrying with exponential backoff while it reports an
    /// aborted transaction and attempts remain
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            let timer = MetricsTimer::new(self.metrics.clone(), operation);
            match op().await {
                Ok(value) => {
                    timer.finish(true);
                    return Ok(value);
                },
                Err(err) => {
                    timer.finish(false);
                    if err.is_retryable() && attempt < self.retry.max_attempts {
                        let delay = self.retry.backoff(attempt);
                        warn!(
                            operation,
                            attempt,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                            "Transaction aborted, retrying"
                        );
                        self.metrics.record_retry(operation);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    self.metrics.record_error(err.kind(), operation);
                    return Err(err);
                },
            }
        }
    }
}

#[async_trait]
impl SentenceSource for ContentService {
    async fn fetch_page(&self, cid: Cid, page: PageRequest) -> Result<SentencePage> {
        self.page(cid, page).await
    }
}
