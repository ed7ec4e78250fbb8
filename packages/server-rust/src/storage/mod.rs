//! Tenant data access.

pub mod mysql;

pub use mysql::{MySqlChatStore, MySqlStoreProvider};
