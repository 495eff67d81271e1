//! libSQL backend: async `AccountStore` implementation.
//!
//! Supports local file and in-memory databases. The gateway only reads;
//! the insert helpers exist for provisioning and tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::migrations;
use crate::store::traits::{Account, AccountStore, Credential};

/// libSQL account store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlAccountStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlAccountStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Account store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to create in-memory database: {e}")))?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Insert a user, returning its id.
    pub async fn insert_user(&self, email: &str) -> Result<i64, StoreError> {
        self.conn
            .execute("INSERT INTO users (email) VALUES (?1)", params![email])
            .await
            .map_err(|e| StoreError::Query(format!("insert_user: {e}")))?;
        let id = self.conn.last_insert_rowid();
        debug!(user_id = id, "User inserted");
        Ok(id)
    }

    /// Attach a credential to a user.
    pub async fn insert_credential(
        &self,
        user_id: i64,
        app_id: Option<&str>,
        key: Option<&serde_json::Value>,
    ) -> Result<(), StoreError> {
        let app_id = app_id.map_or(Value::Null, |a| Value::Text(a.to_string()));
        let key = key.map_or(Value::Null, |k| Value::Text(k.to_string()));
        self.conn
            .execute(
                "INSERT INTO credentials (user_id, app_id, key) VALUES (?1, ?2, ?3)",
                params![user_id, app_id, key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert_credential: {e}")))?;
        Ok(())
    }

    async fn credentials_for(&self, user_id: i64) -> Result<Vec<Credential>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT app_id, key FROM credentials WHERE user_id = ?1 ORDER BY id",
                params![user_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("credentials_for: {e}")))?;

        let mut credentials = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => {
                    let app_id: Option<String> = row.get::<String>(0).ok();
                    let key = row.get::<String>(1).ok().map(|raw| parse_key(&raw));
                    credentials.push(Credential { app_id, key });
                }
                Ok(None) => break,
                Err(e) => return Err(StoreError::Query(format!("credentials_for: {e}"))),
            }
        }
        Ok(credentials)
    }
}

/// Parse a stored credential key. Non-JSON legacy values are kept as strings.
fn parse_key(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[async_trait]
impl AccountStore for LibSqlAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let mut rows = self
            .conn
            .query("SELECT id, email FROM users WHERE email = ?1", params![email])
            .await
            .map_err(|e| StoreError::Query(format!("find_by_email: {e}")))?;

        let (id, email) = match rows.next().await {
            Ok(Some(row)) => {
                let id: i64 = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("find_by_email row parse: {e}")))?;
                let email: String = row
                    .get(1)
                    .map_err(|e| StoreError::Query(format!("find_by_email row parse: {e}")))?;
                (id, email)
            }
            Ok(None) => return Ok(None),
            Err(e) => return Err(StoreError::Query(format!("find_by_email: {e}"))),
        };

        let credentials = self.credentials_for(id).await?;
        Ok(Some(Account {
            id,
            email,
            credentials,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> LibSqlAccountStore {
        LibSqlAccountStore::new_memory().await.unwrap()
    }

    #[tokio::test]
    async fn find_missing_account() {
        let store = test_store().await;
        assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_account_with_credentials_in_order() {
        let store = test_store().await;
        let id = store.insert_user("alice@example.com").await.unwrap();
        store
            .insert_credential(id, Some("google-calendar"), Some(&serde_json::json!({"t": 1})))
            .await
            .unwrap();
        store
            .insert_credential(id, Some("cal-ai"), Some(&serde_json::json!("installed")))
            .await
            .unwrap();

        let account = store.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.email, "alice@example.com");
        assert_eq!(account.credentials.len(), 2);
        assert_eq!(account.credentials[0].app_id.as_deref(), Some("google-calendar"));
        assert_eq!(account.credentials[1].key, Some(serde_json::json!("installed")));
        assert!(account.has_installed("cal-ai"));
    }

    #[tokio::test]
    async fn null_key_and_app_id_round_trip_as_none() {
        let store = test_store().await;
        let id = store.insert_user("bob@example.com").await.unwrap();
        store.insert_credential(id, None, None).await.unwrap();

        let account = store.find_by_email("bob@example.com").await.unwrap().unwrap();
        assert_eq!(
            account.credentials,
            vec![Credential {
                app_id: None,
                key: None
            }]
        );
        assert!(!account.has_installed("cal-ai"));
    }

    #[tokio::test]
    async fn lookup_is_exact_match() {
        let store = test_store().await;
        store.insert_user("carol@example.com").await.unwrap();
        assert!(store.find_by_email("carol@example.co").await.unwrap().is_none());
        assert!(store.find_by_email("xcarol@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn credentials_are_scoped_to_user() {
        let store = test_store().await;
        let a = store.insert_user("a@example.com").await.unwrap();
        let b = store.insert_user("b@example.com").await.unwrap();
        store
            .insert_credential(a, Some("cal-ai"), Some(&serde_json::json!("k")))
            .await
            .unwrap();

        let account_b = store.find_by_email("b@example.com").await.unwrap().unwrap();
        assert_eq!(account_b.id, b);
        assert!(account_b.credentials.is_empty());
    }

    #[tokio::test]
    async fn local_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("accounts.db");
        {
            let store = LibSqlAccountStore::new_local(&path).await.unwrap();
            store.insert_user("dave@example.com").await.unwrap();
        }
        let reopened = LibSqlAccountStore::new_local(&path).await.unwrap();
        assert!(reopened.find_by_email("dave@example.com").await.unwrap().is_some());
    }

    #[test]
    fn legacy_plain_key_kept_as_string() {
        assert_eq!(parse_key("not-json"), serde_json::json!("not-json"));
        assert_eq!(parse_key("{\"a\":1}"), serde_json::json!({"a": 1}));
    }
}
