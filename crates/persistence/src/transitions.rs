// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Local transition log.
//!
//! A record of every lifecycle transition committed from this machine.
//! The store keeps the authoritative history; this log only answers
//! "what did I do to this bid".

use bidflow_audit::{Actor, AuditEvent, Cause};
use bidflow_domain::{BidNumber, BidStatus};
use diesel::SqliteConnection;
use diesel::prelude::*;
use std::str::FromStr;
use tracing::debug;

use crate::data_models::TransitionRecord;
use crate::diesel_schema::transition_log;
use crate::error::PersistenceError;
use crate::sqlite::get_last_insert_rowid;

#[derive(Queryable, Selectable)]
#[diesel(table_name = transition_log)]
struct TransitionRow {
    event_id: i64,
    bid_number: String,
    action: String,
    details: Option<String>,
    actor_id: String,
    actor_type: String,
    cause_id: String,
    cause_description: String,
    from_status: String,
    to_status: String,
    recorded_at: String,
}

impl TransitionRow {
    fn into_record(self) -> Result<TransitionRecord, PersistenceError> {
        let from_status: BidStatus = BidStatus::from_str(&self.from_status)
            .map_err(|e| PersistenceError::ReconstructionError(e.to_string()))?;
        let to_status: BidStatus = BidStatus::from_str(&self.to_status)
            .map_err(|e| PersistenceError::ReconstructionError(e.to_string()))?;

        Ok(TransitionRecord {
            event_id: self.event_id,
            bid_number: BidNumber::new(&self.bid_number),
            action: self.action,
            details: self.details,
            actor: Actor::new(self.actor_id, self.actor_type),
            cause: Cause::new(self.cause_id, self.cause_description),
            from_status,
            to_status,
            recorded_at: self.recorded_at,
        })
    }
}

/// Appends one audit event to the log.
///
/// # Returns
///
/// The event ID assigned by the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_transition(
    conn: &mut SqliteConnection,
    event: &AuditEvent,
    recorded_at: &str,
) -> Result<i64, PersistenceError> {
    diesel::insert_into(transition_log::table)
        .values((
            transition_log::bid_number.eq(event.bid_number.value()),
            transition_log::action.eq(&event.action.name),
            transition_log::details.eq(event.action.details.as_deref()),
            transition_log::actor_id.eq(&event.actor.id),
            transition_log::actor_type.eq(&event.actor.actor_type),
            transition_log::cause_id.eq(&event.cause.id),
            transition_log::cause_description.eq(&event.cause.description),
            transition_log::from_status.eq(event.before.status.as_str()),
            transition_log::to_status.eq(event.after.status.as_str()),
            transition_log::recorded_at.eq(recorded_at),
        ))
        .execute(conn)?;

    let event_id: i64 = get_last_insert_rowid(conn)?;
    debug!(event_id, bid_number = %event.bid_number, "Recorded transition");
    Ok(event_id)
}

/// Reads the logged transitions of one bid, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails or a stored status is unknown.
pub fn transitions_for(
    conn: &mut SqliteConnection,
    bid_number: &BidNumber,
) -> Result<Vec<TransitionRecord>, PersistenceError> {
    let rows: Vec<TransitionRow> = transition_log::table
        .filter(transition_log::bid_number.eq(bid_number.value()))
        .order(transition_log::event_id.asc())
        .select(TransitionRow::as_select())
        .load::<TransitionRow>(conn)?;

    rows.into_iter().map(TransitionRow::into_record).collect()
}
