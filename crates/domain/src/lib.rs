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
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]

mod allocation;
mod bid_status;
mod closure;
mod distribution;
mod error;
mod invoice;
mod partner_response;
mod reference;
mod types;
mod validation;

#[cfg(test)]
mod tests;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

pub use allocation::{
    AllocationBook, AllocationCell, AllocationCoercion, AllocationKey, parse_allocation,
};
pub use bid_status::BidStatus;
pub use closure::{ClosureBook, ClosureRecord, DeliveryMetrics, PartnerAudienceKey, PartnerMetrics};
pub use distribution::SampleDistribution;
pub use error::DomainError;
pub use invoice::{
    CostBreakdown, InvoiceDetails, InvoiceLine, InvoiceSheet, InvoiceSummary, compute_cost,
};
pub use partner_response::{
    AudiencePatch, AudienceResponse, CountryPatch, CountryResponse, DEFAULT_CURRENCY,
    PartnerResponse, PartnerSettings, ResponseKey, ResponseLedger, ResponsePatch, ResponseStatus,
};
pub use reference::{Client, Partner, ReferenceData, SalesContact, VmContact};
pub use types::{
    AudienceId, Bid, BidId, BidNumber, Country, DeliveryMode, FinancialSummary, Loi, Methodology,
    PartnerId, TargetAudience, round_currency,
};
pub use validation::{next_bid_number, validate_audience, validate_basic_details};

/// Parses an ISO `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns `DomainError::DateParseError` if the string is not a valid date.
pub fn parse_iso_date(value: &str) -> Result<time::Date, DomainError> {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    time::Date::parse(value.trim(), format).map_err(|e| DomainError::DateParseError {
        date_string: value.to_string(),
        error: e.to_string(),
    })
}
