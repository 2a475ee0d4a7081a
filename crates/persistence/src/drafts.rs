// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Draft payload storage.
//!
//! Drafts are opaque JSON documents keyed by `(scope, draft_key)`. Writing
//! a key again replaces the previous payload.

use diesel::SqliteConnection;
use diesel::prelude::*;
use tracing::debug;

use crate::diesel_schema::drafts;
use crate::error::PersistenceError;

/// Inserts or replaces one draft payload.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn upsert_draft(
    conn: &mut SqliteConnection,
    scope: &str,
    draft_key: &str,
    payload: &str,
    updated_at: &str,
) -> Result<(), PersistenceError> {
    diesel::replace_into(drafts::table)
        .values((
            drafts::scope.eq(scope),
            drafts::draft_key.eq(draft_key),
            drafts::payload.eq(payload),
            drafts::updated_at.eq(updated_at),
        ))
        .execute(conn)?;

    debug!(scope, draft_key, bytes = payload.len(), "Stored draft");
    Ok(())
}

/// Reads one draft payload, if present.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_draft(
    conn: &mut SqliteConnection,
    scope: &str,
    draft_key: &str,
) -> Result<Option<String>, PersistenceError> {
    let payload: Option<String> = drafts::table
        .filter(drafts::scope.eq(scope))
        .filter(drafts::draft_key.eq(draft_key))
        .select(drafts::payload)
        .first::<String>(conn)
        .optional()?;
    Ok(payload)
}

/// Deletes one draft. Returns the number of rows removed.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_draft(
    conn: &mut SqliteConnection,
    scope: &str,
    draft_key: &str,
) -> Result<usize, PersistenceError> {
    let removed: usize = diesel::delete(
        drafts::table
            .filter(drafts::scope.eq(scope))
            .filter(drafts::draft_key.eq(draft_key)),
    )
    .execute(conn)?;
    Ok(removed)
}

/// Deletes every draft of a scope.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_scope(conn: &mut SqliteConnection, scope: &str) -> Result<usize, PersistenceError> {
    let removed: usize = diesel::delete(drafts::table.filter(drafts::scope.eq(scope))).execute(conn)?;
    Ok(removed)
}

/// Lists the draft keys stored under a scope, in key order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_keys(conn: &mut SqliteConnection, scope: &str) -> Result<Vec<String>, PersistenceError> {
    let keys: Vec<String> = drafts::table
        .filter(drafts::scope.eq(scope))
        .select(drafts::draft_key)
        .order(drafts::draft_key.asc())
        .load::<String>(conn)?;
    Ok(keys)
}
