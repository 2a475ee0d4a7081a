// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::helpers::{fill_basic_details, india_key, loi15, p1, usa_key};
use crate::{reconcile_allocations, reconcile_bid, reconcile_final_cpis, reconcile_responses};
use bidflow_domain::{
    AllocationBook, AllocationCell, AllocationKey, Bid, BidNumber, BidStatus, InvoiceLine,
    InvoiceSheet, Loi, PartnerId, PartnerResponse, PartnerSettings, ResponseLedger,
    ResponseStatus,
};
use time::macros::date;

fn create_bid() -> Bid {
    let mut bid: Bid = Bid::new(BidNumber::new("40000"), date!(2026 - 03 - 02));
    fill_basic_details(&mut bid);
    bid
}

fn create_record(partner: PartnerId, status: ResponseStatus, pmf: f64) -> PartnerResponse {
    let bid: Bid = create_bid();
    let settings: PartnerSettings = PartnerSettings {
        pmf,
        ..PartnerSettings::default()
    };
    let mut record: PartnerResponse =
        PartnerResponse::seeded(partner, loi15(), &settings, &bid.target_audiences);
    record.status = status;
    record
}

#[test]
fn test_local_selections_are_appended() {
    let server: Bid = create_bid();
    let mut local: Bid = server.clone();
    local.select_partners([PartnerId::new("P2"), p1()]);
    local.select_lois([Loi::new(20).unwrap()]);

    let merged: Bid = reconcile_bid(server, Some(&local));

    assert_eq!(merged.partners, vec![p1(), PartnerId::new("P2")]);
    assert_eq!(merged.lois, vec![loi15(), Loi::new(20).unwrap()]);
}

#[test]
fn test_locked_bid_ignores_draft() {
    let mut server: Bid = create_bid();
    server.status = BidStatus::Infield;
    let mut local: Bid = server.clone();
    local.select_partners([PartnerId::new("P2")]);

    let merged: Bid = reconcile_bid(server, Some(&local));
    assert_eq!(merged.partners, vec![p1()]);
}

#[test]
fn test_draft_of_other_bid_is_ignored() {
    let server: Bid = create_bid();
    let mut local: Bid = server.clone();
    local.bid_number = BidNumber::new("40001");
    local.select_partners([PartnerId::new("P2")]);

    let merged: Bid = reconcile_bid(server, Some(&local));
    assert_eq!(merged.partners, vec![p1()]);
}

#[test]
fn test_local_draft_response_wins() {
    let server: Vec<PartnerResponse> = vec![create_record(p1(), ResponseStatus::Saved, 0.0)];
    let local: ResponseLedger =
        ResponseLedger::from(vec![create_record(p1(), ResponseStatus::Draft, 2.5)]);

    let merged: ResponseLedger = reconcile_responses(server, Some(&local));

    let record = merged.get(&p1(), loi15()).unwrap();
    assert!((record.pmf - 2.5).abs() < f64::EPSILON);
}

#[test]
fn test_submitted_server_response_is_final() {
    let server: Vec<PartnerResponse> = vec![create_record(p1(), ResponseStatus::Submitted, 0.0)];
    let local: ResponseLedger =
        ResponseLedger::from(vec![create_record(p1(), ResponseStatus::Draft, 2.5)]);

    let merged: ResponseLedger = reconcile_responses(server, Some(&local));

    let record = merged.get(&p1(), loi15()).unwrap();
    assert_eq!(record.status, ResponseStatus::Submitted);
    assert!(record.pmf.abs() < f64::EPSILON);
}

#[test]
fn test_local_only_records_are_added() {
    let local: ResponseLedger = ResponseLedger::from(vec![create_record(
        PartnerId::new("P2"),
        ResponseStatus::Draft,
        0.0,
    )]);
    let merged: ResponseLedger = reconcile_responses(Vec::new(), Some(&local));
    assert_eq!(merged.len(), 1);
}

#[test]
fn test_allocation_edits_for_missing_cells_are_skipped() {
    let mut book: AllocationBook = AllocationBook::seed([(india_key(), AllocationCell::default())]);

    let skipped: Vec<AllocationKey> =
        reconcile_allocations(&mut book, &[(india_key(), 40), (usa_key(), 10)]);

    assert_eq!(skipped, vec![usa_key()]);
    assert_eq!(book.pending(), vec![(india_key(), 40)]);
}

#[test]
fn test_invalid_cached_final_cpi_is_skipped() {
    let mut sheet: InvoiceSheet =
        InvoiceSheet::from_lines([InvoiceLine::new(india_key(), 70, 60, 5.0, None)]);

    let skipped: Vec<AllocationKey> = reconcile_final_cpis(
        &mut sheet,
        &[(india_key(), Some(-1.0)), (usa_key(), Some(4.0))],
    );

    assert_eq!(skipped, vec![india_key(), usa_key()]);
    assert_eq!(sheet.line(&india_key()).unwrap().final_cpi(), None);
}

#[test]
fn test_cached_final_cpi_is_applied() {
    let mut sheet: InvoiceSheet =
        InvoiceSheet::from_lines([InvoiceLine::new(india_key(), 70, 60, 5.0, None)]);

    let skipped: Vec<AllocationKey> = reconcile_final_cpis(&mut sheet, &[(india_key(), Some(4.5))]);

    assert!(skipped.is_empty());
    assert_eq!(sheet.line(&india_key()).unwrap().final_cpi(), Some(4.5));
}
