// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all
)]

use bidflow_domain::{BidNumber, BidStatus};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// The operator or process that triggered a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The unique identifier for this actor (e.g. a login name).
    pub id: String,
    /// The type of actor (e.g., "operator", "system").
    pub actor_type: String,
}

impl Actor {
    /// Creates a new Actor.
    ///
    /// # Arguments
    ///
    /// * `id` - The unique identifier for this actor
    /// * `actor_type` - The type of actor
    #[must_use]
    pub const fn new(id: String, actor_type: String) -> Self {
        Self { id, actor_type }
    }
}

/// Why a transition was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cause {
    /// A unique identifier for this cause (e.g., a request or session id).
    pub id: String,
    /// A description of the cause.
    pub description: String,
}

impl Cause {
    /// Creates a new Cause.
    #[must_use]
    pub const fn new(id: String, description: String) -> Self {
        Self { id, description }
    }
}

/// The lifecycle action that was performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// The name of the action (e.g., "`MoveToClosure`").
    pub name: String,
    /// Optional additional details about the action.
    pub details: Option<String>,
}

impl Action {
    /// Creates a new Action.
    #[must_use]
    pub const fn new(name: String, details: Option<String>) -> Self {
        Self { name, details }
    }
}

/// The lifecycle position of a bid on one side of a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// The bid status.
    pub status: BidStatus,
    /// A short rendering of the relevant state (counts, totals).
    pub data: String,
}

impl StateSnapshot {
    /// Creates a new `StateSnapshot`.
    #[must_use]
    pub const fn new(status: BidStatus, data: String) -> Self {
        Self { status, data }
    }
}

/// An immutable record of one committed lifecycle transition.
///
/// Every successful transition of a bid produces exactly one audit event
/// capturing:
/// - which bid moved
/// - who moved it (actor) and why (cause)
/// - what was done (action)
/// - the state before and after
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// The bid the transition applies to.
    pub bid_number: BidNumber,
    /// The actor who initiated this state change.
    pub actor: Actor,
    /// The cause or reason for this state change.
    pub cause: Cause,
    /// The action that was performed.
    pub action: Action,
    /// The state before the transition.
    pub before: StateSnapshot,
    /// The state after the transition.
    pub after: StateSnapshot,
}

impl AuditEvent {
    /// Creates a new `AuditEvent`.
    ///
    /// # Arguments
    ///
    /// * `bid_number` - The bid that transitioned
    /// * `actor` - The actor who initiated the change
    /// * `cause` - The reason for the change
    /// * `action` - The action that was performed
    /// * `before` - The state before the transition
    /// * `after` - The state after the transition
    #[must_use]
    pub const fn new(
        bid_number: BidNumber,
        actor: Actor,
        cause: Cause,
        action: Action,
        before: StateSnapshot,
        after: StateSnapshot,
    ) -> Self {
        Self {
            bid_number,
            actor,
            cause,
            action,
            before,
            after,
        }
    }

    /// Returns true if the status did not move (e.g. a Basic Details edit).
    #[must_use]
    pub fn is_status_preserving(&self) -> bool {
        self.before.status == self.after.status
    }

    /// Returns true if this was one of the correction transitions.
    #[must_use]
    pub const fn is_reverse(&self) -> bool {
        BidStatus::is_reverse(self.before.status, self.after.status)
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "bid {}: {} ({} -> {}) by {}",
            self.bid_number, self.action.name, self.before.status, self.after.status, self.actor.id
        )
    }
}
