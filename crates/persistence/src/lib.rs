// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Local draft cache for the bid lifecycle workflow.
//!
//! Holds two kinds of data in `SQLite`, via Diesel with embedded
//! migrations:
//!
//! - **Drafts**: in-progress edits (basic details, partner responses,
//!   allocation edits, final CPIs) that have not been committed to the
//!   store yet. Best-effort recovery only, never a source of truth.
//! - **Transition log**: one row per lifecycle transition committed from
//!   this machine.
//!
//! ## Testing
//!
//! Tests run against in-memory databases. Every `new_in_memory()` call
//! gets its own database so tests stay isolated.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::multiple_crate_versions)]

mod data_models;
mod diesel_schema;
mod drafts;
mod error;
mod sqlite;
mod transitions;

#[cfg(test)]
mod tests;

pub use data_models::TransitionRecord;
pub use error::PersistenceError;

use bidflow_audit::AuditEvent;
use bidflow_domain::BidNumber;
use diesel::SqliteConnection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};

/// Atomic counter for generating unique in-memory database names.
static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Well-known draft keys used by the workflow.
pub mod keys {
    /// The bid aggregate as last edited.
    pub const BID: &str = "bid";
    /// The partner response ledger.
    pub const RESPONSES: &str = "responses";
    /// Allocation edits not yet sent to the store.
    pub const ALLOCATIONS: &str = "allocations";
    /// Final CPIs entered on the invoice sheet.
    pub const FINAL_CPIS: &str = "final_cpis";
    /// Closure data edited since the last save.
    pub const CLOSURE: &str = "closure";
}

/// The local draft cache.
///
/// A draft is scoped by bid number so two bids never share edits.
pub struct DraftCache {
    conn: SqliteConnection,
}

impl DraftCache {
    /// Creates a cache backed by a fresh in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new_in_memory() -> Result<Self, PersistenceError> {
        let db_id: u64 = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
        let shared_memory_url: String = format!("file:bidflow_drafts_{db_id}?mode=memory&cache=shared");

        let conn: SqliteConnection = sqlite::initialize_database(&shared_memory_url)?;
        Ok(Self { conn })
    }

    /// Creates a cache backed by a file.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the `SQLite` database file
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new_with_file<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path_str: &str = path.as_ref().to_str().ok_or_else(|| {
            PersistenceError::InitializationError("Invalid database path".to_string())
        })?;

        let mut conn: SqliteConnection = sqlite::initialize_database(path_str)?;
        sqlite::enable_wal_mode(&mut conn)?;

        info!("Draft cache ready at {}", path_str);
        Ok(Self { conn })
    }

    /// Stores a draft, replacing any previous draft under the same key.
    ///
    /// # Arguments
    ///
    /// * `scope` - The bid number the draft belongs to
    /// * `draft_key` - Which draft (see [`keys`])
    /// * `value` - The payload, stored as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_draft<T: Serialize>(
        &mut self,
        scope: &BidNumber,
        draft_key: &str,
        value: &T,
    ) -> Result<(), PersistenceError> {
        let payload: String = serde_json::to_string(value)?;
        drafts::upsert_draft(&mut self.conn, scope.value(), draft_key, &payload, &now()?)
    }

    /// Loads a draft.
    ///
    /// Returns `Ok(None)` if nothing is stored under the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored payload no longer
    /// deserializes into `T`.
    pub fn load_draft<T: DeserializeOwned>(
        &mut self,
        scope: &BidNumber,
        draft_key: &str,
    ) -> Result<Option<T>, PersistenceError> {
        drafts::find_draft(&mut self.conn, scope.value(), draft_key)?
            .map(|payload| serde_json::from_str::<T>(&payload))
            .transpose()
            .map_err(PersistenceError::from)
    }

    /// Discards one draft. Returns true if a draft was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn discard_draft(
        &mut self,
        scope: &BidNumber,
        draft_key: &str,
    ) -> Result<bool, PersistenceError> {
        let removed: usize = drafts::delete_draft(&mut self.conn, scope.value(), draft_key)?;
        Ok(removed > 0)
    }

    /// Discards every draft of a bid. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn discard_scope(&mut self, scope: &BidNumber) -> Result<usize, PersistenceError> {
        let removed: usize = drafts::delete_scope(&mut self.conn, scope.value())?;
        debug!(scope = %scope, removed, "Discarded drafts");
        Ok(removed)
    }

    /// Lists the draft keys held for a bid.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn draft_keys(&mut self, scope: &BidNumber) -> Result<Vec<String>, PersistenceError> {
        drafts::list_keys(&mut self.conn, scope.value())
    }

    /// Appends a committed transition to the local log.
    ///
    /// # Returns
    ///
    /// The event ID assigned by the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_transition(&mut self, event: &AuditEvent) -> Result<i64, PersistenceError> {
        transitions::insert_transition(&mut self.conn, event, &now()?)
    }

    /// Returns the logged transitions of a bid, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be reconstructed.
    pub fn transition_history(
        &mut self,
        bid_number: &BidNumber,
    ) -> Result<Vec<TransitionRecord>, PersistenceError> {
        transitions::transitions_for(&mut self.conn, bid_number)
    }
}

fn now() -> Result<String, PersistenceError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| PersistenceError::SerializationError(e.to_string()))
}
