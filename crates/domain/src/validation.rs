// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::error::DomainError;
use crate::types::{Bid, BidNumber, TargetAudience};

/// Validates the Basic Details of a bid before it may leave draft.
///
/// This function checks presence rules only. It does NOT check the
/// per-country distribution (see `SampleDistribution::validate`) and does
/// NOT resolve foreign keys (see `ReferenceData::check_bid`).
///
/// # Arguments
///
/// * `bid` - The bid to validate
///
/// # Errors
///
/// Returns the first violated rule, checked in this order:
/// - study name, methodology, sales contact, VM contact, client, project requirement
/// - at least one country, partner and LOI
/// - at least one target audience, each with a positive sample size and an
///   incidence rate between 1 and 100
pub fn validate_basic_details(bid: &Bid) -> Result<(), DomainError> {
    if bid.study_name.trim().is_empty() {
        return Err(DomainError::MissingField {
            field: "study_name",
        });
    }
    if bid.methodology.is_none() {
        return Err(DomainError::MissingField {
            field: "methodology",
        });
    }
    if bid.sales_contact.is_none() {
        return Err(DomainError::MissingField {
            field: "sales_contact",
        });
    }
    if bid.vm_contact.is_none() {
        return Err(DomainError::MissingField {
            field: "vm_contact",
        });
    }
    if bid.client.is_none() {
        return Err(DomainError::MissingField { field: "client" });
    }
    if bid.project_requirement.trim().is_empty() {
        return Err(DomainError::MissingField {
            field: "project_requirement",
        });
    }

    if bid.countries.is_empty() {
        return Err(DomainError::EmptySelection {
            selection: "country",
        });
    }
    if bid.partners.is_empty() {
        return Err(DomainError::EmptySelection {
            selection: "partner",
        });
    }
    if bid.lois.is_empty() {
        return Err(DomainError::EmptySelection { selection: "LOI" });
    }

    if bid.target_audiences.is_empty() {
        return Err(DomainError::NoTargetAudience);
    }
    for audience in &bid.target_audiences {
        validate_audience(audience)?;
    }

    Ok(())
}

/// Validates the numeric fields of a single audience.
///
/// # Errors
///
/// Returns an error if the sample size is zero or the incidence rate is
/// outside 1..=100.
pub fn validate_audience(audience: &TargetAudience) -> Result<(), DomainError> {
    if audience.sample_required == 0 {
        return Err(DomainError::InvalidSampleRequired {
            audience: audience.name.clone(),
        });
    }
    if !(1..=100).contains(&audience.incidence_rate) {
        return Err(DomainError::InvalidIncidenceRate {
            audience: audience.name.clone(),
            value: audience.incidence_rate,
        });
    }
    Ok(())
}

/// Issues the next bid number after the given existing numbers.
///
/// Non-numeric bid numbers are ignored. Numbering starts at 40000.
#[must_use]
pub fn next_bid_number<'a>(existing: impl IntoIterator<Item = &'a BidNumber>) -> BidNumber {
    let max: u64 = existing
        .into_iter()
        .filter_map(BidNumber::numeric)
        .fold(39_999, u64::max);
    BidNumber::new(&max.saturating_add(1).to_string())
}
