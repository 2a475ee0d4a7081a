// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use bidflow_domain::SampleDistribution;

/// A command represents operator intent as data only.
///
/// Commands are the only way to move a bid through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit Basic Details with the per-country sample grid.
    ///
    /// Moves a draft to `partner_response`. In `partner_response` it is an
    /// edit and the status is kept.
    SubmitBasicDetails {
        /// The audience × country distribution to write onto the bid.
        distribution: SampleDistribution,
    },
    /// Submit every partner response and move to `infield`.
    SubmitPartnerResponses,
    /// Close fieldwork.
    MoveToClosure,
    /// Reopen fieldwork from closure.
    BackToInfield,
    /// Mark closure complete.
    MoveToReadyForInvoice,
    /// Return from invoice preparation to closure.
    MoveBackToClosure,
    /// Submit the invoice and complete the bid.
    SubmitInvoice,
}

impl Command {
    /// Returns the action name recorded in the audit trail.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SubmitBasicDetails { .. } => "SubmitBasicDetails",
            Self::SubmitPartnerResponses => "SubmitPartnerResponses",
            Self::MoveToClosure => "MoveToClosure",
            Self::BackToInfield => "BackToInfield",
            Self::MoveToReadyForInvoice => "MoveToReadyForInvoice",
            Self::MoveBackToClosure => "MoveBackToClosure",
            Self::SubmitInvoice => "SubmitInvoice",
        }
    }
}
