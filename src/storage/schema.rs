//! Database schema definitions
//!
//! This module contains the SQL schema for the page cache.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Every fetched page, keyed by the URL it was served from
CREATE TABLE IF NOT EXISTS page (
    site TEXT,
    url TEXT PRIMARY KEY,
    original_url TEXT,
    method TEXT,
    ok INTEGER,
    parse INTEGER,
    status INTEGER,
    timestamp TEXT NOT NULL,
    headers TEXT,
    content_type TEXT,
    charset TEXT,
    content BLOB
);

CREATE INDEX IF NOT EXISTS idx_page_original_url ON page(original_url);
CREATE INDEX IF NOT EXISTS idx_page_parse ON page(parse);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
