//! Account store: read-only lookup of users and their installed app credentials.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlAccountStore;
pub use traits::{Account, AccountStore, Credential};
