// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The authoritative data store seen from the workflow.
//!
//! The store owns bids, responses, allocations, closure and invoice data.
//! Nothing the workflow holds locally is considered committed until one of
//! these calls has succeeded.

use async_trait::async_trait;
use bidflow_domain::{
    AllocationKey, Bid, BidId, BidNumber, BidStatus, Client, InvoiceLine, Loi, Partner,
    PartnerId, PartnerResponse, SalesContact, VmContact,
};

use crate::error::ApiError;
use crate::request_response::{BidSummary, ClosureData, FieldData, InvoiceData};

/// Operations the bid workflow needs from the data store.
#[async_trait]
pub trait BidStore: Send + Sync {
    /// Issues the next free bid number.
    async fn next_bid_number(&self) -> Result<BidNumber, ApiError>;

    async fn sales_contacts(&self) -> Result<Vec<SalesContact>, ApiError>;

    async fn vm_contacts(&self) -> Result<Vec<VmContact>, ApiError>;

    async fn clients(&self) -> Result<Vec<Client>, ApiError>;

    async fn partners(&self) -> Result<Vec<Partner>, ApiError>;

    /// Creates a bid. The returned bid carries the store's id and revision.
    async fn create_bid(&self, bid: &Bid) -> Result<Bid, ApiError>;

    /// Replaces a bid.
    ///
    /// When the bid carries a revision the store rejects the write with
    /// `ApiError::Conflict` if it no longer matches.
    async fn update_bid(&self, bid: &Bid) -> Result<Bid, ApiError>;

    async fn get_bid(&self, id: BidId) -> Result<Bid, ApiError>;

    /// Moves a bid to a new status, optionally recording its PO number.
    async fn set_status(
        &self,
        id: BidId,
        status: BidStatus,
        po_number: Option<&str>,
    ) -> Result<(), ApiError>;

    async fn list_bids(&self, status: BidStatus) -> Result<Vec<BidSummary>, ApiError>;

    async fn field_data(&self, id: BidId) -> Result<FieldData, ApiError>;

    async fn partner_responses(&self, id: BidId) -> Result<Vec<PartnerResponse>, ApiError>;

    /// Writes a set of partner responses in one call.
    async fn put_partner_responses(
        &self,
        id: BidId,
        responses: &[PartnerResponse],
    ) -> Result<(), ApiError>;

    /// Writes the allocation of one cell.
    async fn put_allocation(
        &self,
        id: BidId,
        key: &AllocationKey,
        allocation: u32,
    ) -> Result<(), ApiError>;

    async fn closure(&self, id: BidId) -> Result<ClosureData, ApiError>;

    async fn save_closure(&self, id: BidId, data: &ClosureData) -> Result<(), ApiError>;

    /// Reads the invoice of a bid. Empty until closure data was saved.
    async fn invoice(&self, id: BidId) -> Result<InvoiceData, ApiError>;

    /// Reads the delivered lines of one (partner, LOI) pair.
    async fn partner_deliverables(
        &self,
        id: BidId,
        partner: &PartnerId,
        loi: Loi,
    ) -> Result<Vec<InvoiceLine>, ApiError>;

    async fn save_invoice(&self, id: BidId, data: &InvoiceData) -> Result<(), ApiError>;

    async fn submit_invoice(&self, id: BidId, data: &InvoiceData) -> Result<(), ApiError>;
}
