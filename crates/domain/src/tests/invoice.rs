// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::helpers::{allocation_key, create_allocation_book, create_test_bid, india, loi, partner, usa};
use crate::{
    AllocationBook, AllocationKey, ClosureBook, CostBreakdown, DeliveryMetrics, DomainError,
    InvoiceDetails, InvoiceSheet, InvoiceSummary, PartnerAudienceKey, PartnerMetrics, AudienceId,
    compute_cost,
};
use time::macros::date;

fn create_closure() -> ClosureBook {
    let allocations: AllocationBook = create_allocation_book();
    let mut closure: ClosureBook = ClosureBook::new(&allocations);
    closure
        .set_delivered(&allocation_key("P1", india(), 15), 50)
        .unwrap();
    closure
}

#[test]
fn test_compute_cost_scenario() {
    let cost: CostBreakdown = compute_cost(50, 5.0, Some(4.5));
    assert!((cost.initial_cost - 250.0).abs() < f64::EPSILON);
    assert!((cost.final_cost - 225.0).abs() < f64::EPSILON);
    assert!((cost.savings - 25.0).abs() < f64::EPSILON);
}

#[test]
fn test_compute_cost_defaults_final_to_initial() {
    let cost: CostBreakdown = compute_cost(10, 6.0, None);
    assert!((cost.final_cost - 60.0).abs() < f64::EPSILON);
    assert!(cost.savings.abs() < f64::EPSILON);
}

#[test]
fn test_delivery_requires_allocation() {
    let mut allocations: AllocationBook = create_allocation_book();
    allocations
        .set_allocation(&allocation_key("P1", usa(), 15), 0)
        .unwrap();
    let mut closure: ClosureBook = ClosureBook::new(&allocations);
    let result = closure.set_delivered(&allocation_key("P1", usa(), 15), 5);
    assert!(matches!(
        result,
        Err(DomainError::DeliveryWithoutAllocation { .. })
    ));
}

#[test]
fn test_closure_records_sum_per_country() {
    let mut closure: ClosureBook = create_closure();
    closure.set_field_close(AudienceId(1), date!(2026 - 04 - 30));
    closure.set_delivery_metrics(
        AudienceId(1),
        DeliveryMetrics {
            ir: Some(38.0),
            drop_rate: Some(12.5),
            incidence_rate: Some(40.0),
            loi: Some(16.0),
        },
    );
    let records = closure.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].field_close_date, Some(date!(2026 - 04 - 30)));
    assert_eq!(records[0].delivered.get(&india()), Some(&50));
    assert_eq!(records[0].delivered.get(&usa()), Some(&0));
    assert_eq!(closure.delivered_total(), 50);
}

#[test]
fn test_initial_cpi_is_fixed_while_final_cpi_changes() {
    let mut sheet: InvoiceSheet = InvoiceSheet::from_closure(&create_closure());
    let key: AllocationKey = allocation_key("P1", india(), 15);

    let cost: CostBreakdown = sheet.set_final_cpi(&key, Some(4.5)).unwrap();
    assert!((cost.final_cost - 225.0).abs() < f64::EPSILON);
    assert!((cost.savings - 25.0).abs() < f64::EPSILON);

    let cost: CostBreakdown = sheet.set_final_cpi(&key, Some(4.0)).unwrap();
    assert!((cost.initial_cost - 250.0).abs() < f64::EPSILON);
    assert!((sheet.line(&key).unwrap().initial_cpi() - 5.0).abs() < f64::EPSILON);
    assert!((sheet.total() - 200.0).abs() < f64::EPSILON);
}

#[test]
fn test_undelivered_lines_are_exempt_and_excluded() {
    let mut sheet: InvoiceSheet = InvoiceSheet::from_closure(&create_closure());
    let usa_key: AllocationKey = allocation_key("P1", usa(), 15);
    sheet.set_final_cpi(&usa_key, Some(0.0)).unwrap();
    assert!(sheet.validate_before_submit().is_ok());
    assert!((sheet.total() - 250.0).abs() < f64::EPSILON);
    assert!((sheet.partner_total(&partner("P1"), loi(15)) - 250.0).abs() < f64::EPSILON);
}

#[test]
fn test_zero_final_cpi_blocks_submission() {
    let mut sheet: InvoiceSheet = InvoiceSheet::from_closure(&create_closure());
    let key: AllocationKey = allocation_key("P1", india(), 15);
    sheet.set_final_cpi(&key, Some(0.0)).unwrap();
    match sheet.validate_before_submit() {
        Err(DomainError::InvalidFinalCpi { partner: p, loi: l, .. }) => {
            assert_eq!(p, partner("P1"));
            assert_eq!(l, loi(15));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_set_final_cpi_rejects_bad_values() {
    let mut sheet: InvoiceSheet = InvoiceSheet::from_closure(&create_closure());
    let key: AllocationKey = allocation_key("P1", india(), 15);
    assert!(matches!(
        sheet.set_final_cpi(&key, Some(f64::NAN)),
        Err(DomainError::InvalidCpi { .. })
    ));
    assert!(matches!(
        sheet.set_final_cpi(&allocation_key("P3", india(), 15), Some(1.0)),
        Err(DomainError::InvoiceLineNotFound { .. })
    ));
}

#[test]
fn test_invoice_details_and_po_number() {
    let mut sheet: InvoiceSheet = InvoiceSheet::from_closure(&create_closure());
    let details: InvoiceDetails = InvoiceDetails {
        invoice_date: Some(date!(2026 - 05 - 04)),
        invoice_sent: None,
        invoice_serial: String::from("S-7"),
        invoice_number: String::from("INV-0042"),
    };
    sheet.set_details(partner("P1"), loi(15), details.clone());
    sheet.set_po_number(Some(String::from("  ")));
    assert!(sheet.po_number().is_none());
    sheet.set_po_number(Some(String::from("PO-19")));
    assert_eq!(sheet.po_number(), Some("PO-19"));
    assert_eq!(sheet.details(&partner("P1"), loi(15)), Some(&details));
}

#[test]
fn test_summary_over_delivered_lines() {
    let bid = create_test_bid();
    let mut closure: ClosureBook = create_closure();
    closure.set_partner_metrics(
        PartnerAudienceKey {
            partner: partner("P1"),
            loi: loi(15),
            audience: AudienceId(1),
        },
        PartnerMetrics {
            final_loi: Some(17.0),
            quality_rejects: 3,
            ..PartnerMetrics::default()
        },
    );
    let mut sheet: InvoiceSheet = InvoiceSheet::from_closure(&closure);
    sheet
        .set_final_cpi(&allocation_key("P1", india(), 15), Some(4.5))
        .unwrap();

    let summary: InvoiceSummary = InvoiceSummary::from_sheet(&bid, &sheet, &closure);
    assert_eq!(summary.total_allocation, 70);
    assert_eq!(summary.total_delivered, 50);
    assert_eq!(summary.avg_initial_cpi, Some(5.0));
    assert_eq!(summary.avg_final_cpi, Some(4.5));
    assert_eq!(summary.avg_final_loi, Some(17.0));
    assert_eq!(summary.avg_final_ir, Some(40.0));
    assert!((summary.invoice_amount - 225.0).abs() < f64::EPSILON);
    assert_eq!(summary.financials().quality_rejects, Some(3));
}

#[test]
fn test_summary_of_empty_sheet() {
    let bid = create_test_bid();
    let closure: ClosureBook = ClosureBook::default();
    let sheet: InvoiceSheet = InvoiceSheet::from_closure(&closure);
    let summary: InvoiceSummary = InvoiceSummary::from_sheet(&bid, &sheet, &closure);
    assert_eq!(summary.total_delivered, 0);
    assert!(summary.avg_final_cpi.is_none());
    assert!(summary.invoice_amount.abs() < f64::EPSILON);
}
