//! `AccountStore` trait and the account model it returns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// An installed app credential belonging to an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// App store identifier (e.g. `cal-ai`). Legacy rows may lack one.
    pub app_id: Option<String>,
    /// Stored credential key, opaque JSON. `None` when absent or JSON null.
    pub key: Option<serde_json::Value>,
}

/// A user account as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    /// Credentials in insertion order.
    pub credentials: Vec<Credential>,
}

impl Account {
    /// Whether the account has a stored key for `app_id`.
    ///
    /// The first credential with a matching app id decides.
    pub fn has_installed(&self, app_id: &str) -> bool {
        self.credentials
            .iter()
            .find(|c| c.app_id.as_deref() == Some(app_id))
            .is_some_and(|c| c.key.as_ref().is_some_and(|k| !k.is_null()))
    }
}

/// Point lookup of accounts by email address.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find the account whose email exactly matches `email`.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;
}
