use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, ToSql, Transaction, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::chain;
use crate::config::DatabaseConfig;
use crate::error::{ChainError, Result};
use crate::markdown::MarkdownIngest;
use crate::models::{
    Cid, Concept, ConceptSummary, Draft, DraftKind, FragmentKind, PageRequest, ParsedFragment, Sentence,
    SentencePage,
};
use crate::schema::{concepts, drafts, sentences};

// Type alias for the database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

impl ToSql for Cid {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Cid {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Self::parse(value.as_str()?).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for DraftKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DraftKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e: ChainError| FromSqlError::Other(Box::new(e)))
    }
}

/// Column list shared by every sentence query
const SENTENCE_COLUMNS: [&str; 8] = [
    sentences::CID,
    sentences::SID,
    sentences::PSID,
    sentences::NSID,
    sentences::KIND,
    sentences::METADATA,
    sentences::CONTENT,
    sentences::PUBLISHED_AT,
];

/// Column list shared by every concept query
const CONCEPT_COLUMNS: [&str; 6] = [
    concepts::CID,
    concepts::TITLE,
    concepts::DESCRIPTION,
    concepts::COVER_IMAGE,
    concepts::TAGS,
    concepts::CREATED_AT,
];

/// Column list shared by every draft query
const DRAFT_COLUMNS: [&str; 7] = [
    drafts::DID,
    drafts::AUTHOR_ADDRESS,
    drafts::KIND,
    drafts::CID,
    drafts::CONTENT,
    drafts::CREATED_AT,
    drafts::UPDATED_AT,
];

/// Database manager for handling connections and chain operations
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database connection pool and apply migrations
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let path = config.path();

        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let manager = SqliteConnectionManager::file(path)
            .with_init(move |conn| Self::configure_connection(conn, busy_timeout, true));
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)?;

        Self::run_migrations(&*pool.get()?)?;
        info!(path, max_connections = config.max_connections, "Database ready");

        Ok(Self { pool })
    }

    /// Open a file database with default pool settings
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(&DatabaseConfig {
            url: path.as_ref().to_string_lossy().into_owned(),
            ..crate::config::AppConfig::default().database
        })
    }

    /// Open a private in-memory database; the pool holds a single connection
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| Self::configure_connection(conn, Duration::from_secs(5), false));
        let pool = Pool::builder().max_size(1).build(manager)?;
        Self::run_migrations(&*pool.get()?)?;
        Ok(Self { pool })
    }

    fn configure_connection(conn: &mut Connection, busy_timeout: Duration, wal: bool) -> rusqlite::Result<()> {
        if wal {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        }
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(busy_timeout)
    }

    /// Run database migrations
    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(include_str!("../migrations/2026-10-01-000000_create_tables/up.sql"))?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// Insert a concept together with its first sentence batch.
    ///
    /// Fails with `Conflict` when the cid is taken; nothing is written in that
    /// case.
    pub fn seed_concept(&self, concept: &Concept, fragments: Vec<ParsedFragment>) -> Result<Vec<Sentence>> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if Self::concept_exists(&tx, concept.cid)? {
            return Err(ChainError::Conflict(format!(
                "Concept with ID '{}' already exists.",
                concept.cid
            )));
        }

        tx.execute(
            &format!(
                "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                concepts::TABLE,
                concepts::CID,
                concepts::TITLE,
                concepts::DESCRIPTION,
                concepts::COVER_IMAGE,
                concepts::TAGS,
                concepts::CREATED_AT,
                concepts::NEXT_SID
            ),
            params![
                concept.cid,
                concept.title,
                concept.description,
                concept.cover_image,
                serde_json::to_string(&concept.tags)?,
                concept.created_at,
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                ChainError::Conflict(format!("Concept with ID '{}' already exists.", concept.cid))
            } else {
                e.into()
            }
        })?;

        let sentences = Self::append_batch(&tx, concept.cid, fragments, concept.created_at)?;
        tx.commit()?;

        debug!(cid = %concept.cid, sentences = sentences.len(), "Seeded concept");
        Ok(sentences)
    }

    /// Get a concept by cid
    pub fn get_concept(&self, cid: Cid) -> Result<Option<Concept>> {
        let conn = self.get_connection()?;
        let concept = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE {} = ?1",
                    CONCEPT_COLUMNS.join(", "),
                    concepts::TABLE,
                    concepts::CID
                ),
                params![cid],
                map_concept,
            )
            .optional()?;
        Ok(concept)
    }

    /// Concept summaries ordered by cid
    pub fn list_concepts(&self) -> Result<Vec<ConceptSummary>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {}, {} FROM {} ORDER BY {} ASC",
            concepts::CID,
            concepts::TITLE,
            concepts::TABLE,
            concepts::CID
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(ConceptSummary {
                cid: row.get(0)?,
                title: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Full concept records, newest first
    pub fn list_concepts_admin(&self) -> Result<Vec<Concept>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM {} ORDER BY {} DESC, {} ASC",
            CONCEPT_COLUMNS.join(", "),
            concepts::TABLE,
            concepts::CREATED_AT,
            concepts::CID
        ))?;
        let rows = stmt.query_map([], map_concept)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// One page of a concept's chain starting at `page.start_sid`
    pub fn get_sentences(&self, cid: Cid, page: PageRequest) -> Result<SentencePage> {
        let conn = self.get_connection()?;
        if !Self::concept_exists(&conn, cid)? {
            return Err(ChainError::ConceptNotFound(cid.to_string()));
        }

        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM {} WHERE {} = ?1 AND {} >= ?2 ORDER BY {} ASC LIMIT ?3",
            SENTENCE_COLUMNS.join(", "),
            sentences::TABLE,
            sentences::CID,
            sentences::SID,
            sentences::SID
        ))?;
        let rows = stmt.query_map(params![cid, page.start_sid, page.limit], map_sentence)?;
        let sentences = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        let full_page = u32::try_from(sentences.len()).is_ok_and(|n| n == page.limit);
        let next_sid = if full_page {
            sentences.last().and_then(|s| s.sid.checked_add(1))
        } else {
            None
        };

        Ok(SentencePage { sentences, next_sid })
    }

    /// Get the concept draft an author keeps for `cid`
    pub fn get_draft(&self, cid: Cid, author: &str) -> Result<Option<Draft>> {
        let conn = self.get_connection()?;
        let draft = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE {} = ?1 AND {} = ?2 AND {} = ?3",
                    DRAFT_COLUMNS.join(", "),
                    drafts::TABLE,
                    drafts::AUTHOR_ADDRESS,
                    drafts::CID,
                    drafts::KIND
                ),
                params![author, cid, DraftKind::Concept],
                map_draft,
            )
            .optional()?;
        Ok(draft)
    }

    /// Create or replace an author's concept draft.
    ///
    /// `created_at` is only set on insert; the draft id is stable across saves.
    pub fn save_draft(&self, cid: Cid, author: &str, content: &str) -> Result<Draft> {
        let conn = self.get_connection()?;
        if !Self::concept_exists(&conn, cid)? {
            return Err(ChainError::ConceptNotFound(cid.to_string()));
        }

        let now = Utc::now();
        let draft = conn.query_row(
            &format!(
                "INSERT INTO {table} ({did}, {author}, {kind}, {cid}, {content}, {created}, {updated}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6) \
                 ON CONFLICT ({author}, {cid}, {kind}) DO UPDATE SET \
                 {content} = excluded.{content}, {updated} = excluded.{updated} \
                 RETURNING {columns}",
                table = drafts::TABLE,
                did = drafts::DID,
                author = drafts::AUTHOR_ADDRESS,
                kind = drafts::KIND,
                cid = drafts::CID,
                content = drafts::CONTENT,
                created = drafts::CREATED_AT,
                updated = drafts::UPDATED_AT,
                columns = DRAFT_COLUMNS.join(", "),
            ),
            params![Uuid::new_v4().to_string(), author, DraftKind::Concept, cid, content, now],
            map_draft,
        )?;
        Ok(draft)
    }

    /// Publish a draft into its concept's chain.
    ///
    /// Runs in one transaction: the draft is loaded, parsed, deleted and its
    /// fragments appended. When parsing yields nothing the transaction rolls
    /// back and the draft is kept.
    pub fn publish_draft(&self, did: Uuid, author: &str, ingest: &dyn MarkdownIngest) -> Result<Vec<Sentence>> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let draft = tx
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE {} = ?1 AND {} = ?2 AND {} = ?3",
                    DRAFT_COLUMNS.join(", "),
                    drafts::TABLE,
                    drafts::DID,
                    drafts::AUTHOR_ADDRESS,
                    drafts::KIND
                ),
                params![did.to_string(), author, DraftKind::Concept],
                map_draft,
            )
            .optional()?
            .ok_or_else(|| {
                ChainError::DraftNotFound(
                    "Draft not found or you do not have permission to publish it.".to_string(),
                )
            })?;

        let fragments = ingest.parse(&draft.content, draft.cid);
        if fragments.is_empty() {
            return Err(ChainError::Parsing(
                "Could not parse any valid content from the draft.".to_string(),
            ));
        }

        tx.execute(
            &format!("DELETE FROM {} WHERE {} = ?1", drafts::TABLE, drafts::DID),
            params![did.to_string()],
        )?;
        let sentences = Self::append_batch(&tx, draft.cid, fragments, Utc::now())?;
        tx.commit()?;

        debug!(%did, cid = %draft.cid, sentences = sentences.len(), "Published draft");
        Ok(sentences)
    }

    /// Reserve sids from the concept counter and write the batch.
    ///
    /// The prior tail must exist and still be unlinked; anything else means
    /// the chain was corrupted outside this path.
    fn append_batch(
        tx: &Transaction<'_>,
        cid: Cid,
        fragments: Vec<ParsedFragment>,
        published_at: DateTime<Utc>,
    ) -> Result<Vec<Sentence>> {
        if fragments.is_empty() {
            return Err(ChainError::Parsing("No content to append.".to_string()));
        }
        let count = u32::try_from(fragments.len())
            .map_err(|_| ChainError::Validation("Batch is too large".to_string()))?;

        let start_sid: u32 = tx
            .query_row(
                &format!(
                    "UPDATE {table} SET {next} = {next} + ?1 WHERE {cid} = ?2 RETURNING {next} - ?1",
                    table = concepts::TABLE,
                    next = concepts::NEXT_SID,
                    cid = concepts::CID
                ),
                params![count, cid],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| ChainError::ConceptNotFound(cid.to_string()))?;

        let planned = chain::plan_batch(cid, start_sid, fragments)?;

        if let Some(tail) = start_sid.checked_sub(1) {
            let relinked = tx.execute(
                &format!(
                    "UPDATE {table} SET {nsid} = ?1 WHERE {cid} = ?2 AND {sid} = ?3 AND {nsid} IS NULL",
                    table = sentences::TABLE,
                    nsid = sentences::NSID,
                    cid = sentences::CID,
                    sid = sentences::SID
                ),
                params![start_sid, cid, tail],
            )?;
            if relinked != 1 {
                return Err(ChainError::Integrity(format!(
                    "tail sentence {tail} of concept {cid} is missing or already linked"
                )));
            }
        }

        let mut stmt = tx.prepare_cached(&format!(
            "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            sentences::TABLE,
            SENTENCE_COLUMNS.join(", ")
        ))?;

        let mut written = Vec::with_capacity(planned.len());
        for sentence in planned {
            let (kind, metadata) = sentence.kind.to_columns()?;
            stmt.execute(params![
                sentence.cid,
                sentence.sid,
                sentence.psid,
                sentence.nsid,
                kind,
                metadata,
                sentence.content,
                published_at,
            ])
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    ChainError::TransactionAborted(format!(
                        "sid {} of concept {cid} is already taken",
                        sentence.sid
                    ))
                } else {
                    e.into()
                }
            })?;

            written.push(Sentence {
                cid: sentence.cid,
                sid: sentence.sid,
                psid: sentence.psid,
                nsid: sentence.nsid,
                kind: sentence.kind,
                content: sentence.content,
                published_at,
            });
        }

        Ok(written)
    }

    fn concept_exists(conn: &Connection, cid: Cid) -> Result<bool> {
        let exists = conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
                concepts::TABLE,
                concepts::CID
            ),
            params![cid],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
}

/// Map a database row to a Concept
fn map_concept(row: &Row<'_>) -> rusqlite::Result<Concept> {
    let tags: String = row.get(4)?;
    Ok(Concept {
        cid: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        cover_image: row.get(3)?,
        tags: serde_json::from_str(&tags)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
        created_at: row.get(5)?,
    })
}

/// Map a database row to a Sentence
fn map_sentence(row: &Row<'_>) -> rusqlite::Result<Sentence> {
    let kind: String = row.get(4)?;
    let metadata: Option<String> = row.get(5)?;
    let kind = FragmentKind::from_columns(&kind, metadata.as_deref())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(Sentence {
        cid: row.get(0)?,
        sid: row.get(1)?,
        psid: row.get(2)?,
        nsid: row.get(3)?,
        kind,
        content: row.get(6)?,
        published_at: row.get(7)?,
    })
}

/// Map a database row to a Draft
fn map_draft(row: &Row<'_>) -> rusqlite::Result<Draft> {
    let did: String = row.get(0)?;
    Ok(Draft {
        did: Uuid::parse_str(&did)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        author_address: row.get(1)?,
        kind: row.get(2)?,
        cid: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::{MarkdownParser, MockMarkdownIngest};

    fn cid(raw: &str) -> Cid {
        Cid::parse(raw).expect("cid")
    }

    fn concept(raw: &str) -> Concept {
        Concept {
            cid: cid(raw),
            title: format!("Concept {raw}"),
            description: "About".to_string(),
            cover_image: None,
            tags: vec!["t".to_string()],
            created_at: Utc::now(),
        }
    }

    fn seed(db: &Database, raw: &str, markdown: &str) -> Vec<Sentence> {
        let fragments = MarkdownParser.parse(markdown, cid(raw));
        db.seed_concept(&concept(raw), fragments).expect("seed")
    }

    const AUTHOR: &str = "0x00000000000000000000000000000000000000aa";

    #[test]
    fn test_seed_and_read_back() {
        let db = Database::open_in_memory().expect("db");
        let written = seed(&db, "w", "# Title\n\nBody\n");
        assert_eq!(written.len(), 2);

        let stored = db.get_concept(cid("w")).expect("get").expect("exists");
        assert_eq!(stored.tags, vec!["t".to_string()]);

        let page = db.get_sentences(cid("w"), PageRequest::default()).expect("page");
        assert_eq!(page.sentences, written);
        assert_eq!(page.next_sid, None);
    }

    #[test]
    fn test_duplicate_seed_conflicts() {
        let db = Database::open_in_memory().expect("db");
        seed(&db, "w", "one");
        let again = db.seed_concept(&concept("w"), MarkdownParser.parse("two", cid("w")));
        assert!(matches!(again, Err(ChainError::Conflict(_))));
        let page = db.get_sentences(cid("w"), PageRequest::default()).expect("page");
        assert_eq!(page.sentences.len(), 1);
    }

    #[test]
    fn test_missing_concept_page() {
        let db = Database::open_in_memory().expect("db");
        let page = db.get_sentences(cid("z"), PageRequest::default());
        assert!(matches!(page, Err(ChainError::ConceptNotFound(_))));
    }

    #[test]
    fn test_draft_upsert_keeps_identity() {
        let db = Database::open_in_memory().expect("db");
        seed(&db, "w", "one");
        let first = db.save_draft(cid("w"), AUTHOR, "draft one").expect("save");
        let second = db.save_draft(cid("w"), AUTHOR, "draft two").expect("save");
        assert_eq!(first.did, second.did);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.content, "draft two");
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn test_publish_with_mocked_ingest_appends() {
        let db = Database::open_in_memory().expect("db");
        seed(&db, "w", "one\n\ntwo");
        let draft = db.save_draft(cid("w"), AUTHOR, "ignored").expect("save");

        let mut ingest = MockMarkdownIngest::new();
        ingest.expect_parse().times(1).returning(|_, cid| {
            vec![ParsedFragment {
                cid,
                position: 0,
                kind: FragmentKind::Blockquote,
                content: "quoted".to_string(),
            }]
        });

        let added = db.publish_draft(draft.did, AUTHOR, &ingest).expect("publish");
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].sid, 2);
        assert_eq!(added[0].psid, Some(1));
        assert!(db.get_draft(cid("w"), AUTHOR).expect("get").is_none());
    }

    #[test]
    fn test_publish_by_other_author_is_not_found() {
        let db = Database::open_in_memory().expect("db");
        seed(&db, "w", "one");
        let draft = db.save_draft(cid("w"), AUTHOR, "text").expect("save");
        let other = "0x00000000000000000000000000000000000000bb";
        let result = db.publish_draft(draft.did, other, &MarkdownParser);
        assert!(matches!(result, Err(ChainError::DraftNotFound(_))));
    }
}
