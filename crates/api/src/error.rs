// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Error types for the API layer.
//!
//! Every failure a caller can see is classified into one of these variants.
//! Domain and core errors are translated explicitly so the classification
//! stays visible in one place.

use bidflow::CoreError;
use bidflow_domain::DomainError;
use bidflow_persistence::PersistenceError;
use thiserror::Error;

/// API-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Local input was rejected before any network call was made.
    #[error("{message}")]
    Validation {
        /// The field or rule that failed.
        field: String,
        /// A human-readable description of the failure.
        message: String,
    },
    /// A transition is blocked by incomplete data.
    #[error("{message}")]
    Completeness {
        /// The offending key (partner / LOI, audience / country).
        key: String,
        /// A human-readable description of the gap.
        message: String,
    },
    /// The lifecycle does not allow the requested move or edit.
    #[error("{message}")]
    Lifecycle {
        /// A human-readable description of the refusal.
        message: String,
    },
    /// The data store answered with a non-2xx status.
    #[error("Request failed with status {status}: {message}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The message supplied by the store.
        message: String,
    },
    /// The store refused an update because the bid changed underneath it.
    #[error("Conflict: {message}")]
    Conflict {
        /// The message supplied by the store.
        message: String,
    },
    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),
    /// The local draft cache failed.
    #[error("Draft cache error: {0}")]
    Cache(String),
    /// A fail-fast batch stopped at its first failing item.
    #[error("Batch item {key} failed: {source}")]
    BatchFailed {
        /// The key of the item that failed.
        key: String,
        /// Why it failed.
        #[source]
        source: Box<Self>,
    },
    /// An operation needs data that has not been loaded or created yet.
    #[error("{0}")]
    Precondition(String),
    /// Invoice export failed.
    #[error("Export failed: {0}")]
    Export(String),
}

impl ApiError {
    /// Returns true for failures of the store round-trip itself.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Status { .. } | Self::Conflict { .. } | Self::Transport(_) | Self::Decode(_)
        )
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        Self::Cache(err.to_string())
    }
}

/// Translates a domain error into an API error.
///
/// Completeness gaps keep the offending key; lifecycle refusals and every
/// other rule violation are classified separately.
#[must_use]
pub fn translate_domain_error(err: DomainError) -> ApiError {
    let message: String = err.to_string();
    match err {
        DomainError::IncompleteResponse {
            partner,
            loi,
            audience,
            country,
            ..
        } => {
            let mut parts: Vec<String> = vec![partner.to_string(), loi.to_string()];
            if let Some(audience) = audience {
                parts.push(format!("audience {audience}"));
            }
            if let Some(country) = country {
                parts.push(country.to_string());
            }
            ApiError::Completeness {
                key: parts.join(" / "),
                message,
            }
        }
        DomainError::InvalidFinalCpi {
            partner,
            loi,
            audience,
            country,
        } => ApiError::Completeness {
            key: format!("{partner} / {loi} / audience {audience} / {country}"),
            message,
        },
        DomainError::InvalidStatusTransition { .. }
        | DomainError::BidLocked { .. }
        | DomainError::ResponseAlreadySubmitted { .. } => ApiError::Lifecycle { message },
        DomainError::MissingField { field } => ApiError::Validation {
            field: String::from(field),
            message,
        },
        DomainError::EmptySelection { selection } => ApiError::Validation {
            field: String::from(selection),
            message,
        },
        DomainError::NoTargetAudience
        | DomainError::InvalidSampleRequired { .. }
        | DomainError::InvalidIncidenceRate { .. }
        | DomainError::AudienceNotFound(_) => ApiError::Validation {
            field: String::from("target_audiences"),
            message,
        },
        DomainError::UnknownCountry { .. } | DomainError::DistributionMismatch { .. } => {
            ApiError::Validation {
                field: String::from("sample_distribution"),
                message,
            }
        }
        DomainError::InvalidLoi(_) => ApiError::Validation {
            field: String::from("loi"),
            message,
        },
        DomainError::InvalidCpi { .. } => ApiError::Validation {
            field: String::from("cpi"),
            message,
        },
        DomainError::InvalidPmf { .. } => ApiError::Validation {
            field: String::from("pmf"),
            message,
        },
        DomainError::ResponseNotFound { .. } => ApiError::Validation {
            field: String::from("partner_response"),
            message,
        },
        DomainError::AllocationNotFound { .. } | DomainError::DeliveryWithoutAllocation { .. } => {
            ApiError::Validation {
                field: String::from("allocation"),
                message,
            }
        }
        DomainError::InvoiceLineNotFound { .. } => ApiError::Validation {
            field: String::from("invoice_line"),
            message,
        },
        DomainError::InvalidBidStatus { .. } => ApiError::Validation {
            field: String::from("status"),
            message,
        },
        DomainError::InvalidMethodology(_) => ApiError::Validation {
            field: String::from("methodology"),
            message,
        },
        DomainError::InvalidDeliveryMode(_) => ApiError::Validation {
            field: String::from("mode"),
            message,
        },
        DomainError::InvalidResponseStatus(_) => ApiError::Validation {
            field: String::from("response_status"),
            message,
        },
        DomainError::UnknownReference { kind, .. } => ApiError::Validation {
            field: String::from(kind),
            message,
        },
        DomainError::DateParseError { .. } => ApiError::Validation {
            field: String::from("date"),
            message,
        },
    }
}

/// Translates a core error into an API error.
#[must_use]
pub fn translate_core_error(err: CoreError) -> ApiError {
    match err {
        CoreError::DomainViolation(domain_err) => translate_domain_error(domain_err),
    }
}
