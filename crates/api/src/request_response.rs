// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Wire data transfer objects exchanged with the data store.
//!
//! Derived figures (costs, invoice amounts) are written out for display but
//! ignored when read back; they are always recomputed from the inputs.

use bidflow_domain::{
    AllocationBook, AllocationCell, AllocationKey, AudienceId, BidId, BidNumber, BidStatus,
    ClosureBook, CostBreakdown, Country, DeliveryMetrics, InvoiceDetails, InvoiceLine,
    InvoiceSheet, Loi, Partner, PartnerAudienceKey, PartnerId, PartnerMetrics, PartnerResponse,
};
use serde::{Deserialize, Serialize};
use time::Date;

/// Response of the bid number issuance endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextBidNumberResponse {
    pub bid_number: BidNumber,
}

/// Request body of a bid status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    pub status: BidStatus,
    /// Set when the bid moves into the field or its invoice is submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub po_number: Option<String>,
}

/// One row of a bid listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidSummary {
    pub id: BidId,
    pub bid_number: BidNumber,
    #[serde(default)]
    pub study_name: String,
    #[serde(default)]
    pub client_name: Option<String>,
    pub status: BidStatus,
    #[serde(default)]
    pub po_number: Option<String>,
}

/// Bulk read/write body of partner responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartnerResponsesPayload {
    #[serde(default)]
    pub responses: Vec<PartnerResponse>,
}

/// A country of an audience with its required sample size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCountry {
    pub country: Country,
    pub sample_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAudience {
    pub id: AudienceId,
    pub name: String,
    #[serde(default)]
    pub countries: Vec<FieldCountry>,
}

/// The commitment, CPI and allocation of one (partner, audience, country, LOI).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCell {
    pub partner_id: PartnerId,
    pub audience_id: AudienceId,
    pub country: Country,
    pub loi: Loi,
    #[serde(default)]
    pub commitment: u32,
    #[serde(default)]
    pub cpi: Option<f64>,
    #[serde(default)]
    pub allocation: u32,
}

impl FieldCell {
    #[must_use]
    pub fn key(&self) -> AllocationKey {
        AllocationKey::new(
            self.partner_id.clone(),
            self.audience_id,
            self.country.clone(),
            self.loi,
        )
    }
}

/// Everything the field allocation screen needs for one bid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldData {
    #[serde(default)]
    pub partners: Vec<Partner>,
    #[serde(default)]
    pub loi_options: Vec<Loi>,
    #[serde(default)]
    pub audiences: Vec<FieldAudience>,
    #[serde(default)]
    pub cells: Vec<FieldCell>,
}

impl FieldData {
    /// Seeds an allocation book from the cells. Nothing is pending.
    #[must_use]
    pub fn allocation_book(&self) -> AllocationBook {
        AllocationBook::seed(self.cells.iter().map(|cell| {
            (
                cell.key(),
                AllocationCell {
                    commitment: cell.commitment,
                    cpi: cell.cpi,
                    allocation: cell.allocation,
                },
            )
        }))
    }
}

/// Write body of one allocation cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationUpdate {
    pub partner_id: PartnerId,
    pub audience_id: AudienceId,
    pub country: Country,
    pub loi: Loi,
    pub allocation: u32,
}

impl AllocationUpdate {
    #[must_use]
    pub fn new(key: &AllocationKey, allocation: u32) -> Self {
        Self {
            partner_id: key.partner.clone(),
            audience_id: key.audience,
            country: key.country.clone(),
            loi: key.loi,
            allocation,
        }
    }
}

/// Field close date and delivery metrics of one audience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudienceClosure {
    pub audience_id: AudienceId,
    #[serde(default, with = "crate::iso_date::option")]
    pub field_close_date: Option<Date>,
    #[serde(default)]
    pub metrics: DeliveryMetrics,
}

/// Closure metrics of one partner on one audience at one LOI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerClosure {
    pub partner_id: PartnerId,
    pub loi: Loi,
    pub audience_id: AudienceId,
    #[serde(flatten)]
    pub metrics: PartnerMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredCount {
    pub partner_id: PartnerId,
    pub audience_id: AudienceId,
    pub country: Country,
    pub loi: Loi,
    pub n_delivered: u32,
}

impl DeliveredCount {
    #[must_use]
    pub fn key(&self) -> AllocationKey {
        AllocationKey::new(
            self.partner_id.clone(),
            self.audience_id,
            self.country.clone(),
            self.loi,
        )
    }
}

/// Closure data of one bid as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClosureData {
    #[serde(default)]
    pub audiences: Vec<AudienceClosure>,
    #[serde(default)]
    pub partners: Vec<PartnerClosure>,
    #[serde(default)]
    pub delivered: Vec<DeliveredCount>,
}

impl ClosureData {
    /// Captures a closure book for storage.
    ///
    /// Every allocated cell is written, including those with nothing
    /// delivered yet.
    #[must_use]
    pub fn from_book(book: &ClosureBook) -> Self {
        let audiences: Vec<AudienceClosure> = book
            .records()
            .into_iter()
            .map(|record| AudienceClosure {
                audience_id: record.audience,
                field_close_date: record.field_close_date,
                metrics: record.metrics,
            })
            .collect();
        let partners: Vec<PartnerClosure> = book
            .all_partner_metrics()
            .map(|(key, metrics)| PartnerClosure {
                partner_id: key.partner.clone(),
                loi: key.loi,
                audience_id: key.audience,
                metrics: metrics.clone(),
            })
            .collect();
        let delivered: Vec<DeliveredCount> = book
            .deliverables()
            .map(|(key, _, n_delivered)| DeliveredCount {
                partner_id: key.partner.clone(),
                audience_id: key.audience,
                country: key.country.clone(),
                loi: key.loi,
                n_delivered,
            })
            .collect();

        Self {
            audiences,
            partners,
            delivered,
        }
    }

    /// Writes stored closure data into a book built from the current
    /// allocations.
    ///
    /// Returns the keys of delivered counts that were dropped because the
    /// cell is no longer allocated.
    pub fn apply_to(&self, book: &mut ClosureBook) -> Vec<AllocationKey> {
        for audience in &self.audiences {
            if let Some(date) = audience.field_close_date {
                book.set_field_close(audience.audience_id, date);
            }
            book.set_delivery_metrics(audience.audience_id, audience.metrics);
        }
        for partner in &self.partners {
            book.set_partner_metrics(
                PartnerAudienceKey {
                    partner: partner.partner_id.clone(),
                    loi: partner.loi,
                    audience: partner.audience_id,
                },
                partner.metrics.clone(),
            );
        }

        let mut dropped: Vec<AllocationKey> = Vec::new();
        for count in &self.delivered {
            let key: AllocationKey = count.key();
            if book.set_delivered(&key, count.n_delivered).is_err() {
                dropped.push(key);
            }
        }
        dropped
    }
}

/// One invoice line on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineData {
    pub partner_id: PartnerId,
    pub loi: Loi,
    pub audience_id: AudienceId,
    pub country: Country,
    pub allocation: u32,
    pub n_delivered: u32,
    pub initial_cpi: f64,
    #[serde(default)]
    pub final_cpi: Option<f64>,
    #[serde(default)]
    pub initial_cost: f64,
    #[serde(default)]
    pub final_cost: f64,
    #[serde(default)]
    pub savings: f64,
}

impl InvoiceLineData {
    #[must_use]
    pub fn from_line(line: &InvoiceLine) -> Self {
        let cost: CostBreakdown = line.cost();
        Self {
            partner_id: line.key.partner.clone(),
            loi: line.key.loi,
            audience_id: line.key.audience,
            country: line.key.country.clone(),
            allocation: line.allocation,
            n_delivered: line.n_delivered,
            initial_cpi: line.initial_cpi(),
            final_cpi: line.final_cpi(),
            initial_cost: cost.initial_cost,
            final_cost: cost.final_cost,
            savings: cost.savings,
        }
    }

    /// Builds the domain line. Derived costs are discarded.
    #[must_use]
    pub fn into_line(self) -> InvoiceLine {
        InvoiceLine::new(
            AllocationKey::new(self.partner_id, self.audience_id, self.country, self.loi),
            self.allocation,
            self.n_delivered,
            self.initial_cpi,
            self.final_cpi,
        )
    }
}

/// Invoice bookkeeping of one (partner, LOI) pair on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoicePartnerDetails {
    pub partner_id: PartnerId,
    pub loi: Loi,
    #[serde(flatten)]
    pub details: InvoiceDetails,
    #[serde(default)]
    pub invoice_amount: f64,
}

/// The invoice of one bid on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceData {
    #[serde(default)]
    pub po_number: Option<String>,
    #[serde(default)]
    pub lines: Vec<InvoiceLineData>,
    #[serde(default)]
    pub details: Vec<InvoicePartnerDetails>,
}

impl InvoiceData {
    #[must_use]
    pub fn from_sheet(sheet: &InvoiceSheet) -> Self {
        let details: Vec<InvoicePartnerDetails> = sheet
            .all_details()
            .map(|(key, details)| InvoicePartnerDetails {
                partner_id: key.partner.clone(),
                loi: key.loi,
                details: details.clone(),
                invoice_amount: sheet.partner_total(&key.partner, key.loi),
            })
            .collect();

        Self {
            po_number: sheet.po_number().map(str::to_string),
            lines: sheet.lines().map(InvoiceLineData::from_line).collect(),
            details,
        }
    }

    /// Builds the domain sheet from the stored inputs.
    #[must_use]
    pub fn into_sheet(self) -> InvoiceSheet {
        let mut sheet: InvoiceSheet =
            InvoiceSheet::from_lines(self.lines.into_iter().map(InvoiceLineData::into_line));
        for entry in self.details {
            sheet.set_details(entry.partner_id, entry.loi, entry.details);
        }
        sheet.set_po_number(self.po_number);
        sheet
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
