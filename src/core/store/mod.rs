mod agents;
mod quotes;
mod tokens;
pub mod types;

use anyhow::Result;
use rusqlite::Connection;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::llm::Provider;
use crate::platform::{NativePlatform, Platform};
use types::{PersonaType, QuoteStatus};

/// SQLite-backed persistence for personas, quotes and API tokens. The
/// credential vault shares the same connection through [`Store::get_db`].
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS agents (
    agent_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    system_prompt TEXT NOT NULL,
    target_model TEXT NOT NULL,
    provider TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    persona_type TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS quotes (
    id TEXT PRIMARY KEY,
    year INTEGER NOT NULL,
    seq INTEGER NOT NULL,
    client_name TEXT NOT NULL,
    client_email TEXT NOT NULL,
    client_phone TEXT,
    location TEXT NOT NULL,
    delivery_date TEXT,
    payment_terms TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS quote_items (
    id TEXT PRIMARY KEY,
    quote_id TEXT NOT NULL REFERENCES quotes(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    product_type TEXT NOT NULL,
    subtype TEXT,
    dimension TEXT,
    quantity INTEGER NOT NULL,
    unit_price REAL
);

CREATE TABLE IF NOT EXISTS api_tokens (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    token_hash TEXT NOT NULL UNIQUE,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
";

impl Store {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await?;
            NativePlatform::restrict_dir_permissions(parent);
        }

        let db = Connection::open(path)?;
        NativePlatform::restrict_file_permissions(path);
        Self::init(db, Some(path))
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(db: Connection, path: Option<&Path>) -> Result<Self> {
        db.execute_batch("PRAGMA foreign_keys = ON;")?;
        db.execute_batch(SCHEMA)?;
        if let Some(path) = path {
            info!("Store ready at {:?}", path);
        }
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub fn get_db(&self) -> Arc<Mutex<Connection>> {
        self.db.clone()
    }
}

fn conversion_error(kind: &str, value: &str) -> FromSqlError {
    FromSqlError::Other(format!("unknown {} '{}' in database", kind, value).into())
}

impl ToSql for Provider {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Provider {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        Provider::from_id(raw).ok_or_else(|| conversion_error("provider", raw))
    }
}

impl ToSql for PersonaType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PersonaType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        PersonaType::parse(raw).ok_or_else(|| conversion_error("persona type", raw))
    }
}

impl ToSql for QuoteStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for QuoteStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        QuoteStatus::parse(raw).ok_or_else(|| conversion_error("quote status", raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_parent_dir_and_schema() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("flowdesk.db");
        let store = Store::open(&path).await.unwrap();
        assert!(path.exists());

        let db = store.get_db();
        let db = db.lock().await;
        let tables: i64 = db
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('agents', 'quotes', 'quote_items', 'api_tokens')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[tokio::test]
    async fn reopening_keeps_existing_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("flowdesk.db");
        {
            let store = Store::open(&path).await.unwrap();
            store.create_api_token("ci").await.unwrap();
        }
        let store = Store::open(&path).await.unwrap();
        assert_eq!(store.list_api_tokens().await.unwrap().len(), 1);
    }

    #[test]
    fn provider_column_rejects_unknown_values() {
        let db = Connection::open_in_memory().unwrap();
        let got: rusqlite::Result<Provider> = db.query_row("SELECT 'azure'", [], |r| r.get(0));
        assert!(got.is_err());
        let ok: Provider = db.query_row("SELECT 'google'", [], |r| r.get(0)).unwrap();
        assert_eq!(ok, Provider::Google);
    }
}
