//! SQLite page cache
//!
//! This module provides a SQLite-based implementation of the PageCache trait.

use crate::page::Page;
use crate::storage::schema::initialize_schema;
use crate::storage::{PageCache, StorageError, StorageResult};
use crate::url::CrawlUrl;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Upper bound on storage operations in flight at once, across all sites
pub const MAX_STORAGE_CONNECTIONS: usize = 50;

const PAGE_COLUMNS: &str = "site, url, original_url, method, ok, parse, status, timestamp, \
                            content_type, charset, content";

/// SQLite page cache
///
/// Cheap to clone; clones share the connection and the operation limit.
/// Blocking SQLite calls run on the blocking thread pool.
#[derive(Clone)]
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
    permits: Arc<Semaphore>,
}

impl SqliteCache {
    /// Opens (or creates) the cache database at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Creates an in-memory cache
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            permits: Arc::new(Semaphore::new(MAX_STORAGE_CONNECTIONS)),
        }
    }

    async fn with_conn<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self.permits.acquire().await?;
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StorageError::Poisoned)?;
            f(&guard).map_err(StorageError::from)
        })
        .await?
    }
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    let url: String = row.get(1)?;
    let original_url: Option<String> = row.get(2)?;
    let original_url = original_url.unwrap_or_else(|| url.clone());

    let timestamp: String = row.get(7)?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    let mut page = Page::new(
        row.get::<_, Option<String>>(0)?.unwrap_or_default(),
        CrawlUrl::new(url),
        CrawlUrl::new(original_url),
    );
    page.method = row.get::<_, Option<String>>(3)?.unwrap_or_else(|| "GET".to_string());
    page.ok = row.get::<_, Option<bool>>(4)?.unwrap_or(false);
    page.parse = row.get::<_, Option<bool>>(5)?.unwrap_or(false);
    page.status = row.get(6)?;
    page.timestamp = timestamp;
    page.content_type = row.get(8)?;
    page.charset = row.get(9)?;
    page.set_content(row.get(10)?);
    page.retrieved = true;
    Ok(page)
}

#[async_trait]
impl PageCache for SqliteCache {
    async fn find(&self, url: &CrawlUrl) -> StorageResult<Option<Page>> {
        let url = url.as_str().to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM page WHERE url = ?1 OR original_url = ?1 LIMIT 1",
                    PAGE_COLUMNS
                ),
                params![url],
                page_from_row,
            )
            .optional()
        })
        .await
    }

    async fn save(&self, page: &Page) -> StorageResult<()> {
        let site = page.site.clone();
        let url = page.url.as_str().to_string();
        let original_url = page.original_url.as_str().to_string();
        let method = page.method.clone();
        let (ok, parse, status) = (page.ok, page.parse, page.status);
        let timestamp = page.timestamp.to_rfc3339();
        let content_type = page.content_type.clone();
        let charset = page.charset.clone();
        let content = page.content().map(|c| c.to_vec());

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO page (site, url, original_url, method, ok, parse, status, timestamp,
                                   headers, content_type, charset, content)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, ?10, ?11)
                 ON CONFLICT(url) DO UPDATE SET
                    ok = excluded.ok,
                    parse = excluded.parse,
                    status = excluded.status,
                    content_type = excluded.content_type,
                    charset = excluded.charset,
                    content = excluded.content,
                    timestamp = excluded.timestamp",
                params![
                    site,
                    url,
                    original_url,
                    method,
                    ok,
                    parse,
                    status,
                    timestamp,
                    content_type,
                    charset,
                    content
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn update_parse_flag(&self, page: &Page) -> StorageResult<()> {
        let url = page.url.as_str().to_string();
        let parse = page.parse;
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE page SET parse = ?1 WHERE url = ?2",
                params![parse, url],
            )?;
            Ok(())
        })
        .await
    }

    async fn marked_batch(
        &self,
        sites: &[String],
        after: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<Page>> {
        let mut sql = format!("SELECT {} FROM page WHERE parse = 1", PAGE_COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        if !sites.is_empty() {
            let placeholders = vec!["?"; sites.len()].join(", ");
            sql.push_str(&format!(" AND site IN ({})", placeholders));
            values.extend(sites.iter().cloned().map(Value::Text));
        }
        if let Some(after) = after {
            sql.push_str(" AND url > ?");
            values.push(Value::Text(after.to_string()));
        }
        sql.push_str(" ORDER BY url LIMIT ?");
        values.push(Value::Integer(limit as i64));

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let pages = stmt
                .query_map(params_from_iter(values), page_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(pages)
        })
        .await
    }
}
