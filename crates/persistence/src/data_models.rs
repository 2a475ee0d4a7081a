// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use bidflow_audit::{Actor, Cause};
use bidflow_domain::{BidNumber, BidStatus};
use serde::{Deserialize, Serialize};

/// One transition as recorded in the local log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// The row ID assigned by the database.
    pub event_id: i64,
    pub bid_number: BidNumber,
    /// The action name (e.g. `MoveToClosure`).
    pub action: String,
    pub details: Option<String>,
    pub actor: Actor,
    pub cause: Cause,
    pub from_status: BidStatus,
    pub to_status: BidStatus,
    /// RFC 3339 timestamp of when the transition was recorded locally.
    pub recorded_at: String,
}
