// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use bidflow_audit::{AuditEvent, StateSnapshot};
use bidflow_domain::{AllocationBook, Bid, ClosureBook, InvoiceSheet, ResponseLedger};
use std::collections::BTreeSet;

/// A screen-sized slice of bid data that can go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    BasicDetails,
    PartnerResponse,
    FieldAllocation,
    Closure,
    Invoice,
}

impl Stage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BasicDetails => "basic_details",
            Self::PartnerResponse => "partner_response",
            Self::FieldAllocation => "field_allocation",
            Self::Closure => "closure",
            Self::Invoice => "invoice",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about one bid across all lifecycle stages.
///
/// Downstream stages refer to audiences of `bid` by identifier only.
#[derive(Debug, Clone, PartialEq)]
pub struct BidState {
    /// The bid aggregate.
    pub bid: Bid,
    /// Partner responses for every selected (partner, LOI) pair.
    pub responses: ResponseLedger,
    /// Field allocations, seeded once responses are submitted.
    pub allocations: AllocationBook,
    /// Closure data, present once the bid has reached closure.
    pub closure: Option<ClosureBook>,
    /// The invoice, present once the bid is ready for invoice.
    pub invoice: Option<InvoiceSheet>,
    /// Stages whose data may no longer match upstream after a reverse
    /// transition. Cleared per stage when that stage is saved again.
    pub stale_stages: BTreeSet<Stage>,
}

impl BidState {
    /// Creates the state of a bid with no downstream data yet.
    #[must_use]
    pub fn new(bid: Bid) -> Self {
        Self {
            bid,
            responses: ResponseLedger::new(),
            allocations: AllocationBook::default(),
            closure: None,
            invoice: None,
            stale_stages: BTreeSet::new(),
        }
    }

    /// Returns true if the stage was invalidated by a reverse transition.
    #[must_use]
    pub fn is_stale(&self, stage: Stage) -> bool {
        self.stale_stages.contains(&stage)
    }

    /// Clears the stale flag of a stage after its data was saved.
    ///
    /// Returns true if the flag was set.
    pub fn mark_saved(&mut self, stage: Stage) -> bool {
        self.stale_stages.remove(&stage)
    }

    /// Captures the status and a short summary for the audit trail.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        let delivered: u64 = self.closure.as_ref().map_or(0, ClosureBook::delivered_total);
        StateSnapshot::new(
            self.bid.status,
            format!(
                "audiences={} responses={} allocated={} delivered={}",
                self.bid.target_audiences.len(),
                self.responses.len(),
                self.allocations.total_allocation(),
                delivered
            ),
        )
    }
}

/// The result of a successful transition.
///
/// Nothing is committed until the caller has persisted `new_state`.
#[derive(Debug, Clone)]
pub struct TransitionResult {
    /// The state after the transition.
    pub new_state: BidState,
    /// The audit event describing the transition.
    pub audit_event: AuditEvent,
    /// Stages invalidated by this transition, if it was a reverse one.
    pub stale_stages: Vec<Stage>,
}
