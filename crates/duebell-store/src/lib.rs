//! # Duebell Store
//!
//! Read-only access to tasks and push subscriptions.
//!
//! | Backend | URL | Notes |
//! |---------|-----|-------|
//! | PostgREST / Supabase | `https://<project>.supabase.co` | `apikey` + bearer service key |
//! | SQLite | `sqlite://<path>` | tables created on open |
//! | JSON snapshot | `file://<path>` | re-read on every query |

pub mod file;
pub mod rest;
pub mod sqlite;

use chrono::{DateTime, NaiveDateTime, Utc};
use duebell_core::config::{DuebellConfig, StoreLocation, SubscriptionPolicy};
use duebell_core::error::{DuebellError, Result};
use duebell_core::traits::TaskStore;

pub use file::FileStore;
pub use rest::RestStore;
pub use sqlite::SqliteStore;

/// Open the store selected by the configured URL scheme.
pub fn open_store(config: &DuebellConfig) -> Result<Box<dyn TaskStore>> {
    match &config.store {
        StoreLocation::Rest { url } => {
            let linked = config.dispatch.policy == SubscriptionPolicy::Linked;
            Ok(Box::new(RestStore::new(url, &config.store_key)?.with_embedded_link(linked)))
        }
        StoreLocation::Sqlite { path } => Ok(Box::new(SqliteStore::open(path)?)),
        StoreLocation::File { path } => Ok(Box::new(FileStore::new(path))),
    }
}

/// Parse a stored timestamp. RFC 3339, or a naive timestamp taken as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DuebellError::StoreUnavailable(format!("Malformed timestamp '{raw}'")))
}
