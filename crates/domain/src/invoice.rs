// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Invoice lines and the cost / savings calculator.
//!
//! Costs are never stored. They are recomputed from the delivered count
//! and the two CPIs every time they are read.

use crate::allocation::AllocationKey;
use crate::closure::{ClosureBook, PartnerAudienceKey};
use crate::error::DomainError;
use crate::partner_response::ResponseKey;
use crate::types::{Bid, FinancialSummary, Loi, PartnerId, round_currency};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::Date;

/// Derived costs of one deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub initial_cost: f64,
    pub final_cost: f64,
    pub savings: f64,
}

/// Computes the costs of one deliverable.
///
/// `final_cost` uses `final_cpi` when present, `initial_cpi` otherwise.
/// `initial_cost` only ever depends on `initial_cpi`.
#[must_use]
pub fn compute_cost(n_delivered: u32, initial_cpi: f64, final_cpi: Option<f64>) -> CostBreakdown {
    let delivered: f64 = f64::from(n_delivered);
    let initial_cost: f64 = delivered * initial_cpi;
    let final_cost: f64 = delivered * final_cpi.unwrap_or(initial_cpi);
    CostBreakdown {
        initial_cost,
        final_cost,
        savings: initial_cost - final_cost,
    }
}

/// One billable (partner, LOI, audience, country) line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub key: AllocationKey,
    pub allocation: u32,
    pub n_delivered: u32,
    initial_cpi: f64,
    final_cpi: Option<f64>,
}

impl InvoiceLine {
    /// Creates a line. The initial CPI cannot be changed afterwards.
    #[must_use]
    pub const fn new(
        key: AllocationKey,
        allocation: u32,
        n_delivered: u32,
        initial_cpi: f64,
        final_cpi: Option<f64>,
    ) -> Self {
        Self {
            key,
            allocation,
            n_delivered,
            initial_cpi,
            final_cpi,
        }
    }

    #[must_use]
    pub const fn initial_cpi(&self) -> f64 {
        self.initial_cpi
    }

    /// The final CPI as entered, if any.
    #[must_use]
    pub const fn final_cpi(&self) -> Option<f64> {
        self.final_cpi
    }

    /// The CPI the line is billed at.
    #[must_use]
    pub fn effective_final_cpi(&self) -> f64 {
        self.final_cpi.unwrap_or(self.initial_cpi)
    }

    #[must_use]
    pub fn cost(&self) -> CostBreakdown {
        compute_cost(self.n_delivered, self.initial_cpi, self.final_cpi)
    }

    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        self.n_delivered > 0
    }
}

/// Invoice bookkeeping for one (partner, LOI) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDetails {
    #[serde(default, with = "crate::iso_date::option")]
    pub invoice_date: Option<Date>,
    #[serde(default, with = "crate::iso_date::option")]
    pub invoice_sent: Option<Date>,
    #[serde(default)]
    pub invoice_serial: String,
    #[serde(default)]
    pub invoice_number: String,
}

/// The invoice of one bid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceSheet {
    lines: BTreeMap<AllocationKey, InvoiceLine>,
    details: BTreeMap<ResponseKey, InvoiceDetails>,
    po_number: Option<String>,
}

impl InvoiceSheet {
    /// Builds one line per allocated cell, final CPI defaulting to the initial CPI.
    #[must_use]
    pub fn from_closure(closure: &ClosureBook) -> Self {
        let lines: BTreeMap<AllocationKey, InvoiceLine> = closure
            .deliverables()
            .map(|(key, cell, delivered)| {
                let line: InvoiceLine = InvoiceLine::new(
                    key.clone(),
                    cell.allocation,
                    delivered,
                    cell.cpi.unwrap_or(0.0),
                    None,
                );
                (key.clone(), line)
            })
            .collect();
        Self {
            lines,
            ..Self::default()
        }
    }

    /// Rebuilds the sheet from fresh closure data.
    ///
    /// Final CPIs entered for lines that still exist are kept, as are the
    /// invoice details and PO number.
    #[must_use]
    pub fn rebase(&self, closure: &ClosureBook) -> Self {
        let mut rebased: Self = Self::from_closure(closure);
        for (key, line) in &mut rebased.lines {
            if let Some(previous) = self.lines.get(key) {
                line.final_cpi = previous.final_cpi;
            }
        }
        rebased.details.clone_from(&self.details);
        rebased.po_number.clone_from(&self.po_number);
        rebased
    }

    /// Builds a sheet from lines already known to the store.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = InvoiceLine>) -> Self {
        Self {
            lines: lines.into_iter().map(|l| (l.key.clone(), l)).collect(),
            ..Self::default()
        }
    }

    /// Sets or clears the final CPI of one line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not exist or the CPI is negative or
    /// not a number.
    pub fn set_final_cpi(
        &mut self,
        key: &AllocationKey,
        final_cpi: Option<f64>,
    ) -> Result<CostBreakdown, DomainError> {
        if let Some(cpi) = final_cpi
            && !(cpi.is_finite() && cpi >= 0.0)
        {
            return Err(DomainError::InvalidCpi {
                value: cpi.to_string(),
            });
        }
        let line: &mut InvoiceLine =
            self.lines
                .get_mut(key)
                .ok_or_else(|| DomainError::InvoiceLineNotFound {
                    partner: key.partner.clone(),
                    loi: key.loi,
                    audience: key.audience,
                    country: key.country.clone(),
                })?;
        line.final_cpi = final_cpi;
        Ok(line.cost())
    }

    pub fn set_details(&mut self, partner: PartnerId, loi: Loi, details: InvoiceDetails) {
        self.details.insert(ResponseKey::new(partner, loi), details);
    }

    #[must_use]
    pub fn details(&self, partner: &PartnerId, loi: Loi) -> Option<&InvoiceDetails> {
        self.details.get(&ResponseKey::new(partner.clone(), loi))
    }

    /// Iterates the invoice details in key order.
    pub fn all_details(&self) -> impl Iterator<Item = (&ResponseKey, &InvoiceDetails)> {
        self.details.iter()
    }

    pub fn set_po_number(&mut self, po_number: Option<String>) {
        self.po_number = po_number.filter(|po| !po.trim().is_empty());
    }

    #[must_use]
    pub fn po_number(&self) -> Option<&str> {
        self.po_number.as_deref()
    }

    /// Checks every delivered line has a usable final CPI.
    ///
    /// Lines with nothing delivered are exempt.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidFinalCpi` for the first offending line.
    pub fn validate_before_submit(&self) -> Result<(), DomainError> {
        for line in self.lines.values().filter(|l| l.is_delivered()) {
            let cpi: f64 = line.effective_final_cpi();
            if !(cpi.is_finite() && cpi > 0.0) {
                return Err(DomainError::InvalidFinalCpi {
                    partner: line.key.partner.clone(),
                    loi: line.key.loi,
                    audience: line.key.audience,
                    country: line.key.country.clone(),
                });
            }
        }
        Ok(())
    }

    /// Sum of the final costs of every delivered line.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.delivered_lines().map(|l| l.cost().final_cost).sum()
    }

    /// Invoice amount of one (partner, LOI) pair.
    #[must_use]
    pub fn partner_total(&self, partner: &PartnerId, loi: Loi) -> f64 {
        self.delivered_lines()
            .filter(|l| &l.key.partner == partner && l.key.loi == loi)
            .map(|l| l.cost().final_cost)
            .sum()
    }

    /// Iterates every line in key order.
    pub fn lines(&self) -> impl Iterator<Item = &InvoiceLine> {
        self.lines.values()
    }

    #[must_use]
    pub fn line(&self, key: &AllocationKey) -> Option<&InvoiceLine> {
        self.lines.get(key)
    }

    /// Iterates lines with a positive delivered count.
    pub fn delivered_lines(&self) -> impl Iterator<Item = &InvoiceLine> {
        self.lines.values().filter(|l| l.is_delivered())
    }
}

/// Ready-for-invoice overview of one bid, over delivered lines only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub total_allocation: u64,
    pub total_delivered: u64,
    pub avg_initial_cpi: Option<f64>,
    pub avg_final_cpi: Option<f64>,
    pub avg_final_loi: Option<f64>,
    pub avg_final_ir: Option<f64>,
    pub invoice_amount: f64,
    pub quality_rejects: u64,
}

impl InvoiceSummary {
    /// Summarises a sheet.
    ///
    /// Final LOI and IR come from the partner closure metrics, falling back
    /// to the line's LOI and the audience's incidence rate.
    #[must_use]
    pub fn from_sheet(bid: &Bid, sheet: &InvoiceSheet, closure: &ClosureBook) -> Self {
        let delivered: Vec<&InvoiceLine> = sheet.delivered_lines().collect();

        let mut initial_cpis: Vec<f64> = Vec::with_capacity(delivered.len());
        let mut final_cpis: Vec<f64> = Vec::with_capacity(delivered.len());
        let mut final_lois: Vec<f64> = Vec::with_capacity(delivered.len());
        let mut final_irs: Vec<f64> = Vec::with_capacity(delivered.len());
        let mut total_allocation: u64 = 0;
        let mut total_delivered: u64 = 0;

        for line in &delivered {
            total_allocation += u64::from(line.allocation);
            total_delivered += u64::from(line.n_delivered);
            initial_cpis.push(line.initial_cpi());
            final_cpis.push(line.effective_final_cpi());

            let metrics_key: PartnerAudienceKey = PartnerAudienceKey {
                partner: line.key.partner.clone(),
                loi: line.key.loi,
                audience: line.key.audience,
            };
            let metrics = closure.partner_metrics(&metrics_key);
            final_lois.push(
                metrics
                    .and_then(|m| m.final_loi)
                    .unwrap_or_else(|| f64::from(line.key.loi.minutes())),
            );
            if let Some(ir) = metrics.and_then(|m| m.final_ir).or_else(|| {
                bid.audience(line.key.audience)
                    .map(|a| f64::from(a.incidence_rate))
            }) {
                final_irs.push(ir);
            }
        }

        Self {
            total_allocation,
            total_delivered,
            avg_initial_cpi: average(&initial_cpis),
            avg_final_cpi: average(&final_cpis),
            avg_final_loi: average(&final_lois),
            avg_final_ir: average(&final_irs),
            invoice_amount: round_currency(sheet.total()),
            quality_rejects: closure.quality_rejects_total(),
        }
    }

    /// The figures written back onto the bid.
    #[must_use]
    pub const fn financials(&self) -> FinancialSummary {
        FinancialSummary {
            total_delivered: Some(self.total_delivered),
            quality_rejects: Some(self.quality_rejects),
            avg_loi: self.avg_final_loi,
            avg_ir: self.avg_final_ir,
            invoice_amount: Some(self.invoice_amount),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    Some(round_currency(sum / values.len() as f64))
}
