//! Article persistence.
//!
//! The service reaches storage only through [`ArticleStore`], handed to it
//! at construction. [`MemoryStore`] is the bundled implementation.

use chrono::Utc;
use futures_util::future::{self, BoxFuture};
use parking_lot::RwLock;
use thiserror::Error;

/// Longest accepted title, in characters.
pub const MAX_TITLE_LEN: usize = 32;

/// A stored article row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    /// Identifier, assigned ascending on insert.
    pub id: i32,
    /// Title.
    pub title: String,
    /// Creation time, unix seconds.
    pub created: i64,
    /// Last update time, unix seconds.
    pub updated: i64,
}

/// Store failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Used before [`ArticleStore::migrate`].
    #[error("article table does not exist, run migrate first")]
    NotMigrated,
    /// Used after [`ArticleStore::close`].
    #[error("store is closed")]
    Closed,
    /// Rejected record.
    #[error("invalid article: {0}")]
    InvalidRecord(String),
    /// Identifier space exhausted.
    #[error("article id overflow")]
    IdOverflow,
}

/// The storage collaborator.
///
/// Implementations must be safe to share across concurrent calls; no
/// operation spans more than one call.
pub trait ArticleStore: Send + Sync + 'static {
    /// Creates the article table if missing.
    fn migrate(&self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Inserts an article and returns the stored row.
    fn insert(&self, title: String) -> BoxFuture<'_, Result<ArticleRecord, StoreError>>;

    /// Up to `limit` rows ordered by id descending, skipping `offset`.
    fn find_page(
        &self,
        offset: i64,
        limit: i64,
    ) -> BoxFuture<'_, Result<Vec<ArticleRecord>, StoreError>>;

    /// Total number of rows.
    fn count(&self) -> BoxFuture<'_, Result<i64, StoreError>>;

    /// Releases resources; later calls fail with [`StoreError::Closed`].
    fn close(&self) -> BoxFuture<'_, Result<(), StoreError>>;
}

#[derive(Debug, Default)]
struct Table {
    migrated: bool,
    closed: bool,
    next_id: i32,
    rows: Vec<ArticleRecord>,
}

impl Table {
    fn usable(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else if !self.migrated {
            Err(StoreError::NotMigrated)
        } else {
            Ok(())
        }
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<Table>,
}

impl MemoryStore {
    /// Creates an empty, unmigrated store.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_now(&self, title: String) -> Result<ArticleRecord, StoreError> {
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(StoreError::InvalidRecord(format!(
                "title longer than {MAX_TITLE_LEN} characters"
            )));
        }
        let mut table = self.table.write();
        table.usable()?;
        let id = table.next_id.checked_add(1).ok_or(StoreError::IdOverflow)?;
        let now = Utc::now().timestamp();
        let record = ArticleRecord {
            id,
            title,
            created: now,
            updated: now,
        };
        table.next_id = id;
        table.rows.push(record.clone());
        Ok(record)
    }

    fn page_now(&self, offset: i64, limit: i64) -> Result<Vec<ArticleRecord>, StoreError> {
        let table = self.table.read();
        table.usable()?;
        let offset = usize::try_from(offset).unwrap_or(0);
        let limit = usize::try_from(limit).unwrap_or(0);
        // Rows are appended in id order.
        Ok(table
            .rows
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

impl ArticleStore for MemoryStore {
    fn migrate(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        let mut table = self.table.write();
        let result = if table.closed {
            Err(StoreError::Closed)
        } else {
            table.migrated = true;
            Ok(())
        };
        Box::pin(future::ready(result))
    }

    fn insert(&self, title: String) -> BoxFuture<'_, Result<ArticleRecord, StoreError>> {
        Box::pin(future::ready(self.insert_now(title)))
    }

    fn find_page(
        &self,
        offset: i64,
        limit: i64,
    ) -> BoxFuture<'_, Result<Vec<ArticleRecord>, StoreError>> {
        Box::pin(future::ready(self.page_now(offset, limit)))
    }

    fn count(&self) -> BoxFuture<'_, Result<i64, StoreError>> {
        let table = self.table.read();
        let result = table
            .usable()
            .map(|()| i64::try_from(table.rows.len()).unwrap_or(i64::MAX));
        Box::pin(future::ready(result))
    }

    fn close(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        self.table.write().closed = true;
        tracing::debug!("memory store closed");
        Box::pin(future::ready(Ok(())))
    }
}
