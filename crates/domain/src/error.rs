// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::types::{AudienceId, Country, Loi, PartnerId};

/// Errors that can occur during domain validation.
///
/// Every variant names the offending key so that callers can surface the
/// exact cell or field that blocked an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required basic-details field is empty.
    MissingField {
        /// The name of the missing field.
        field: &'static str,
    },
    /// A required selection (countries, partners, LOIs) is empty.
    EmptySelection {
        /// The name of the empty selection.
        selection: &'static str,
    },
    /// A bid must always keep at least one target audience.
    NoTargetAudience,
    /// The required sample size of an audience must be positive.
    InvalidSampleRequired {
        /// The audience display name.
        audience: String,
    },
    /// The incidence rate of an audience must be between 1 and 100.
    InvalidIncidenceRate {
        /// The audience display name.
        audience: String,
        /// The rejected value.
        value: u8,
    },
    /// An LOI must be a positive number of minutes.
    InvalidLoi(u16),
    /// The country is not part of the bid's (or audience's) selection.
    UnknownCountry {
        /// The audience display name.
        audience: String,
        /// The country that was referenced.
        country: Country,
    },
    /// The per-country samples of an audience do not add up to its required size.
    DistributionMismatch {
        /// The audience display name.
        audience: String,
        /// The required sample size.
        expected: u64,
        /// The distributed total.
        actual: u64,
    },
    /// The referenced audience does not exist on the bid.
    AudienceNotFound(AudienceId),
    /// No partner response record exists for the partner/LOI pair.
    ResponseNotFound {
        /// The partner.
        partner: PartnerId,
        /// The LOI.
        loi: Loi,
    },
    /// A submitted partner response can no longer be edited.
    ResponseAlreadySubmitted {
        /// The partner.
        partner: PartnerId,
        /// The LOI.
        loi: Loi,
    },
    /// A partner response is missing a commitment, CPI or timeline.
    IncompleteResponse {
        /// The partner.
        partner: PartnerId,
        /// The LOI.
        loi: Loi,
        /// The audience, if the gap is audience-scoped.
        audience: Option<AudienceId>,
        /// The country, if the gap is country-scoped.
        country: Option<Country>,
        /// What is missing.
        reason: &'static str,
    },
    /// A CPI value was negative or not a number.
    InvalidCpi {
        /// The rejected value, rendered for display.
        value: String,
    },
    /// A PMF value was negative or not a number.
    InvalidPmf {
        /// The rejected value, rendered for display.
        value: String,
    },
    /// No field-allocation cell exists for the key.
    AllocationNotFound {
        /// The partner.
        partner: PartnerId,
        /// The audience.
        audience: AudienceId,
        /// The country.
        country: Country,
        /// The LOI.
        loi: Loi,
    },
    /// Delivered counts can only be recorded where something was allocated.
    DeliveryWithoutAllocation {
        /// The partner.
        partner: PartnerId,
        /// The audience.
        audience: AudienceId,
        /// The country.
        country: Country,
        /// The LOI.
        loi: Loi,
    },
    /// A delivered invoice line has a missing or zero final CPI.
    InvalidFinalCpi {
        /// The partner.
        partner: PartnerId,
        /// The LOI.
        loi: Loi,
        /// The audience.
        audience: AudienceId,
        /// The country.
        country: Country,
    },
    /// No invoice line exists for the key.
    InvoiceLineNotFound {
        /// The partner.
        partner: PartnerId,
        /// The LOI.
        loi: Loi,
        /// The audience.
        audience: AudienceId,
        /// The country.
        country: Country,
    },
    /// The status string is not one of the lifecycle states.
    InvalidBidStatus {
        /// The rejected value.
        status: String,
    },
    /// The lifecycle transition is not permitted.
    InvalidStatusTransition {
        /// The current status.
        from: String,
        /// The requested status.
        to: String,
        /// Why the transition was refused.
        reason: String,
    },
    /// The bid can no longer be edited in its current status.
    BidLocked {
        /// The current status.
        status: String,
    },
    /// The methodology string is not recognised.
    InvalidMethodology(String),
    /// The delivery mode string is not recognised.
    InvalidDeliveryMode(String),
    /// The response status string is not recognised.
    InvalidResponseStatus(String),
    /// A foreign key does not match any loaded reference record.
    UnknownReference {
        /// The kind of reference (sales contact, client, ...).
        kind: &'static str,
        /// The unresolved identifier.
        id: String,
    },
    /// Failed to parse a date from a string.
    DateParseError {
        /// The invalid date string.
        date_string: String,
        /// The parsing error message.
        error: String,
    },
}

impl std::fmt::Display for DomainError {
    #[allow(clippy::too_many_lines)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "Missing required field: {field}"),
            Self::EmptySelection { selection } => {
                write!(f, "At least one {selection} must be selected")
            }
            Self::NoTargetAudience => write!(f, "A bid must have at least one target audience"),
            Self::InvalidSampleRequired { audience } => {
                write!(f, "{audience}: required sample size must be greater than 0")
            }
            Self::InvalidIncidenceRate { audience, value } => {
                write!(
                    f,
                    "{audience}: incidence rate {value} must be between 1 and 100"
                )
            }
            Self::InvalidLoi(loi) => write!(f, "Invalid LOI {loi}: must be at least 1 minute"),
            Self::UnknownCountry { audience, country } => {
                write!(f, "{audience}: country '{country}' is not selected")
            }
            Self::DistributionMismatch {
                audience,
                expected,
                actual,
            } => {
                let delta: i128 = i128::from(*expected) - i128::from(*actual);
                write!(
                    f,
                    "{audience}: Total ({actual}) does not match required samples ({expected}), off by {delta}"
                )
            }
            Self::AudienceNotFound(id) => write!(f, "Audience {id} not found"),
            Self::ResponseNotFound { partner, loi } => {
                write!(f, "No response recorded for partner {partner} at {loi}")
            }
            Self::ResponseAlreadySubmitted { partner, loi } => {
                write!(
                    f,
                    "Response for partner {partner} at {loi} is already submitted"
                )
            }
            Self::IncompleteResponse {
                partner,
                loi,
                audience,
                country,
                reason,
            } => {
                write!(f, "Incomplete response for partner {partner} at {loi}")?;
                if let Some(audience) = audience {
                    write!(f, ", audience {audience}")?;
                }
                if let Some(country) = country {
                    write!(f, ", country {country}")?;
                }
                write!(f, ": {reason}")
            }
            Self::InvalidCpi { value } => write!(f, "Invalid CPI '{value}': must be >= 0"),
            Self::InvalidPmf { value } => write!(f, "Invalid PMF '{value}': must be >= 0"),
            Self::AllocationNotFound {
                partner,
                audience,
                country,
                loi,
            } => {
                write!(
                    f,
                    "No allocation cell for partner {partner}, audience {audience}, country {country} at {loi}"
                )
            }
            Self::DeliveryWithoutAllocation {
                partner,
                audience,
                country,
                loi,
            } => {
                write!(
                    f,
                    "Cannot record deliveries for partner {partner}, audience {audience}, country {country} at {loi}: nothing allocated"
                )
            }
            Self::InvalidFinalCpi {
                partner,
                loi,
                audience,
                country,
            } => {
                write!(
                    f,
                    "Please fill in the Final CPI for {partner} with {loi} (audience {audience}, {country})"
                )
            }
            Self::InvoiceLineNotFound {
                partner,
                loi,
                audience,
                country,
            } => {
                write!(
                    f,
                    "No invoice line for partner {partner}, audience {audience}, country {country} at {loi}"
                )
            }
            Self::InvalidBidStatus { status } => write!(f, "Invalid bid status: '{status}'"),
            Self::InvalidStatusTransition { from, to, reason } => {
                write!(f, "Cannot move bid from '{from}' to '{to}': {reason}")
            }
            Self::BidLocked { status } => {
                write!(f, "Bid details cannot be edited in status '{status}'")
            }
            Self::InvalidMethodology(value) => write!(f, "Invalid methodology: '{value}'"),
            Self::InvalidDeliveryMode(value) => write!(f, "Invalid delivery mode: '{value}'"),
            Self::InvalidResponseStatus(value) => {
                write!(f, "Invalid response status: '{value}'")
            }
            Self::UnknownReference { kind, id } => write!(f, "Unknown {kind}: {id}"),
            Self::DateParseError { date_string, error } => {
                write!(f, "Failed to parse date '{date_string}': {error}")
            }
        }
    }
}

impl std::error::Error for DomainError {}
