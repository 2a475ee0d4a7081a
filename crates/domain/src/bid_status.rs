// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Bid status tracking and transition logic.
//!
//! This module defines the bid lifecycle states and the transition table.
//! Illegal transitions are rejected here, not merely hidden by the caller.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle states of a bid, in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    /// Basic details are being captured.
    Draft,
    /// Waiting on partner pricing responses.
    PartnerResponse,
    /// Fieldwork is running; allocations may be adjusted.
    Infield,
    /// Fieldwork is closed; delivered counts and quality metrics are captured.
    Closure,
    /// Ready for the invoice to be prepared.
    ReadyForInvoice,
    /// Invoice submitted.
    Completed,
}

impl BidStatus {
    /// All states in forward order.
    pub const ALL: [Self; 6] = [
        Self::Draft,
        Self::PartnerResponse,
        Self::Infield,
        Self::Closure,
        Self::ReadyForInvoice,
        Self::Completed,
    ];

    /// Returns the string representation of the status.
    ///
    /// This is used for persistence and API serialization.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PartnerResponse => "partner_response",
            Self::Infield => "infield",
            Self::Closure => "closure",
            Self::ReadyForInvoice => "ready_for_invoice",
            Self::Completed => "completed",
        }
    }

    /// Parses a status from its string representation.
    ///
    /// Legacy spellings (`in_field`, `in-field`, `invoiced`) are accepted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidBidStatus` if the string is not a valid status.
    fn parse_str(s: &str) -> Result<Self, DomainError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "partner_response" => Ok(Self::PartnerResponse),
            "infield" | "in_field" | "in-field" => Ok(Self::Infield),
            "closure" => Ok(Self::Closure),
            "ready_for_invoice" => Ok(Self::ReadyForInvoice),
            "completed" | "invoiced" => Ok(Self::Completed),
            _ => Err(DomainError::InvalidBidStatus {
                status: s.to_string(),
            }),
        }
    }

    /// Returns true if no transition may leave this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns the next forward status, if any.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Draft => Some(Self::PartnerResponse),
            Self::PartnerResponse => Some(Self::Infield),
            Self::Infield => Some(Self::Closure),
            Self::Closure => Some(Self::ReadyForInvoice),
            Self::ReadyForInvoice => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    /// Returns true if `from -> to` is one of the correction transitions.
    #[must_use]
    pub const fn is_reverse(from: Self, to: Self) -> bool {
        matches!(
            (from, to),
            (Self::Closure, Self::Infield) | (Self::ReadyForInvoice, Self::Closure)
        )
    }

    /// Returns every status reachable from this one in a single step.
    #[must_use]
    pub fn allowed_targets(&self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|target| self.validate_transition(*target).is_ok())
            .collect()
    }

    /// Validates if a transition from this status to another is permitted.
    ///
    /// Forward transitions move exactly one step. The only backward
    /// transitions are `closure -> infield` and `ready_for_invoice -> closure`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is not allowed.
    pub fn validate_transition(&self, new_status: Self) -> Result<(), DomainError> {
        if self.is_terminal() {
            return Err(DomainError::InvalidStatusTransition {
                from: self.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason: "cannot transition from terminal state".to_string(),
            });
        }

        if self.next() == Some(new_status) || Self::is_reverse(*self, new_status) {
            return Ok(());
        }

        let reason: String = if new_status > *self {
            format!(
                "forward transitions must pass through '{}'",
                self.next().map_or("", |s| s.as_str())
            )
        } else {
            "transition not permitted by bid lifecycle rules".to_string()
        };

        Err(DomainError::InvalidStatusTransition {
            from: self.as_str().to_string(),
            to: new_status.as_str().to_string(),
            reason,
        })
    }
}

impl FromStr for BidStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl std::fmt::Display for BidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
