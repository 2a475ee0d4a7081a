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
#![allow(clippy::multiple_crate_versions)]

//! The boundary between the bid lifecycle and the remote data store.
//!
//! `BidStore` abstracts the store; `HttpBidStore` talks to it over JSON.
//! `BidWorkflow` sequences validation, store writes and state commits for
//! every lifecycle operation.

mod batch;
mod config;
mod error;
mod export;
mod http;
mod reconcile;
mod request_response;
mod store;
mod workflow;

#[cfg(test)]
mod tests;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

pub use batch::{BatchPolicy, BatchReport, run_batch};
pub use config::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::{ApiError, translate_core_error, translate_domain_error};
pub use export::{INVOICE_CSV_HEADERS, export_invoice_csv};
pub use http::HttpBidStore;
pub use reconcile::{
    reconcile_allocations, reconcile_bid, reconcile_final_cpis, reconcile_responses,
};
pub use request_response::{
    AllocationUpdate, AudienceClosure, BidSummary, ClosureData, DeliveredCount, FieldAudience,
    FieldCell, FieldCountry, FieldData, InvoiceData, InvoiceLineData, InvoicePartnerDetails,
    NextBidNumberResponse, PartnerClosure, PartnerResponsesPayload, StatusChangeRequest,
};
pub use store::BidStore;
pub use workflow::BidWorkflow;
