use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

/// Metrics collection and management
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    // Store metrics
    pub db_operations_total: &'static str,
    pub db_operation_duration: &'static str,
    pub db_retries_total: &'static str,

    // Chain metrics
    pub sentences_appended_total: &'static str,
    pub concepts_seeded_total: &'static str,
    pub drafts_published_total: &'static str,
    pub chain_length: &'static str,

    // Retrieval metrics
    pub pages_served_total: &'static str,
    pub page_size: &'static str,

    // Ingestion metrics
    pub fragments_parsed_total: &'static str,
    pub parse_duration: &'static str,

    // Error metrics
    pub errors_total: &'static str,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            db_operations_total: "abstractu_db_operations_total",
            db_operation_duration: "abstractu_db_operation_duration_seconds",
            db_retries_total: "abstractu_db_retries_total",

            sentences_appended_total: "abstractu_sentences_appended_total",
            concepts_seeded_total: "abstractu_concepts_seeded_total",
            drafts_published_total: "abstractu_drafts_published_total",
            chain_length: "abstractu_chain_length",

            pages_served_total: "abstractu_pages_served_total",
            page_size: "abstractu_page_size",

            fragments_parsed_total: "abstractu_fragments_parsed_total",
            parse_duration: "abstractu_parse_duration_seconds",

            errors_total: "abstractu_errors_total",
        }
    }
}

impl MetricsCollector {
    /// Record a store operation
    pub fn record_db_operation(&self, operation: &'static str, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };
        counter!(self.db_operations_total, "operation" => operation, "status" => status).increment(1);
        histogram!(self.db_operation_duration, "operation" => operation).record(duration.as_secs_f64());
    }

    /// Record a retried write
    pub fn record_retry(&self, operation: &'static str) {
        counter!(self.db_retries_total, "operation" => operation).increment(1);
    }

    /// Record sentences appended to a chain and the chain's new length
    pub fn record_append(&self, cid: char, count: usize, chain_length: u32) {
        let cid = cid.to_string();
        counter!(self.sentences_appended_total, "cid" => cid.clone()).increment(count as u64);
        gauge!(self.chain_length, "cid" => cid).set(f64::from(chain_length));
    }

    /// Record a seeded concept
    pub fn record_seed(&self) {
        counter!(self.concepts_seeded_total).increment(1);
    }

    /// Record a published draft
    pub fn record_publish(&self) {
        counter!(self.drafts_published_total).increment(1);
    }

    /// Record a page returned to a reader
    pub fn record_page(&self, size: usize, exhausted: bool) {
        let exhausted = if exhausted { "true" } else { "false" };
        counter!(self.pages_served_total, "exhausted" => exhausted).increment(1);
        histogram!(self.page_size).record(size as f64);
    }

    /// Record a markdown ingestion run
    pub fn record_parse(&self, fragments: usize, duration: Duration) {
        counter!(self.fragments_parsed_total).increment(fragments as u64);
        histogram!(self.parse_duration).record(duration.as_secs_f64());
    }

    /// Record error metrics
    pub fn record_error(&self, error_type: &'static str, operation: &'static str) {
        counter!(self.errors_total, "type" => error_type, "operation" => operation).increment(1);
    }
}

/// Times a store operation and reports it on `finish`
#[derive(Debug)]
pub struct MetricsTimer {
    collector: MetricsCollector,
    operation: &'static str,
    start: Instant,
}

impl MetricsTimer {
    #[must_use]
    pub fn new(collector: MetricsCollector, operation: &'static str) -> Self {
        Self {
            collector,
            operation,
            start: Instant::now(),
        }
    }

    pub fn finish(self, success: bool) -> Duration {
        let duration = self.start.elapsed();
        self.collector.record_db_operation(self.operation, duration, success);
        duration
    }
}
