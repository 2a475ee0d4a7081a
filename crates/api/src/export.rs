// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! CSV export of invoice lines.

use bidflow_domain::{CostBreakdown, InvoiceLine, InvoiceSheet, round_currency};
use serde::Serialize;
use std::io::Write;

use crate::error::ApiError;

/// Column headers of the invoice export.
pub const INVOICE_CSV_HEADERS: [&str; 11] = [
    "partner",
    "loi",
    "audience",
    "country",
    "allocation",
    "delivered",
    "initial_cpi",
    "final_cpi",
    "initial_cost",
    "final_cost",
    "savings",
];

#[derive(Debug, Serialize)]
struct InvoiceCsvRow<'a> {
    partner: &'a str,
    loi: u16,
    audience: i64,
    country: &'a str,
    allocation: u32,
    delivered: u32,
    initial_cpi: f64,
    final_cpi: f64,
    initial_cost: f64,
    final_cost: f64,
    savings: f64,
}

impl<'a> InvoiceCsvRow<'a> {
    fn from_line(line: &'a InvoiceLine) -> Self {
        let cost: CostBreakdown = line.cost();
        Self {
            partner: line.key.partner.value(),
            loi: line.key.loi.minutes(),
            audience: line.key.audience.0,
            country: line.key.country.name(),
            allocation: line.allocation,
            delivered: line.n_delivered,
            initial_cpi: line.initial_cpi(),
            final_cpi: line.effective_final_cpi(),
            initial_cost: round_currency(cost.initial_cost),
            final_cost: round_currency(cost.final_cost),
            savings: round_currency(cost.savings),
        }
    }
}

/// Writes every line of an invoice sheet as CSV, header first.
///
/// The header is written even when the sheet has no lines. The final CPI
/// column holds the CPI the line is billed at, which is the initial CPI
/// when no final CPI was entered.
///
/// # Returns
///
/// The number of data rows written.
///
/// # Errors
///
/// Returns `ApiError::Export` if a row cannot be written.
pub fn export_invoice_csv<W: Write>(sheet: &InvoiceSheet, writer: W) -> Result<usize, ApiError> {
    let mut csv_writer: csv::Writer<W> = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer
        .write_record(INVOICE_CSV_HEADERS)
        .map_err(|e| ApiError::Export(e.to_string()))?;

    let mut rows: usize = 0;
    for line in sheet.lines() {
        csv_writer
            .serialize(InvoiceCsvRow::from_line(line))
            .map_err(|e| ApiError::Export(e.to_string()))?;
        rows += 1;
    }
    csv_writer
        .flush()
        .map_err(|e| ApiError::Export(e.to_string()))?;
    Ok(rows)
}
