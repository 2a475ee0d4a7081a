// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! `HttpBidStore` against a mocked store.

use super::helpers::{fill_basic_details, india_key, loi15, p1};
use crate::{ApiError, BidStore, BidSummary, ClientConfig, HttpBidStore};
use bidflow_domain::{Bid, BidId, BidNumber, BidStatus, InvoiceLine};
use std::time::Duration;
use time::macros::date;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_store(server: &MockServer) -> HttpBidStore {
    let config: ClientConfig = ClientConfig::new(&format!("{}/api/", server.uri()))
        .with_token(Some(String::from("secret-token")))
        .with_timeout(Duration::from_secs(5));
    HttpBidStore::new(config).unwrap()
}

fn create_stored_bid() -> Bid {
    let mut bid: Bid = Bid::new(BidNumber::new("40003"), date!(2026 - 03 - 02));
    fill_basic_details(&mut bid);
    bid.id = Some(BidId(9));
    bid.revision = Some(4);
    bid
}

#[tokio::test]
async fn test_requests_carry_bearer_token() {
    let server: MockServer = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bids/next-number"))
        .and(header("Authorization", "Bearer secret-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"bid_number": "40007"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let number: BidNumber = create_store(&server).next_bid_number().await.unwrap();
    assert_eq!(number, BidNumber::new("40007"));
}

#[tokio::test]
async fn test_get_bid_decodes_body() {
    let server: MockServer = MockServer::start().await;
    let bid: Bid = create_stored_bid();
    Mock::given(method("GET"))
        .and(path("/api/bids/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&bid))
        .mount(&server)
        .await;

    let loaded: Bid = create_store(&server).get_bid(BidId(9)).await.unwrap();
    assert_eq!(loaded, bid);
}

#[tokio::test]
async fn test_not_found_uses_store_message() {
    let server: MockServer = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bids/9"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({"error": "Bid not found"})),
        )
        .mount(&server)
        .await;

    let result = create_store(&server).get_bid(BidId(9)).await;
    assert_eq!(
        result,
        Err(ApiError::Status {
            status: 404,
            message: String::from("Bid not found"),
        })
    );
}

#[tokio::test]
async fn test_conflict_on_stale_update() {
    let server: MockServer = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/bids/9"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(serde_json::json!({"message": "revision mismatch"})),
        )
        .mount(&server)
        .await;

    let result = create_store(&server).update_bid(&create_stored_bid()).await;
    assert!(matches!(result, Err(ApiError::Conflict { ref message }) if message == "revision mismatch"));
}

#[tokio::test]
async fn test_update_without_id_is_refused_locally() {
    let server: MockServer = MockServer::start().await;
    let mut bid: Bid = create_stored_bid();
    bid.id = None;

    let result = create_store(&server).update_bid(&bid).await;
    assert!(matches!(result, Err(ApiError::Precondition(_))));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server: MockServer = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sales"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = create_store(&server).sales_contacts().await;
    assert!(matches!(result, Err(ApiError::Decode(_))));
}

#[tokio::test]
async fn test_status_change_sends_po_number() {
    let server: MockServer = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bids/9/status"))
        .and(body_json(
            serde_json::json!({"status": "infield", "po_number": "PO-881"}),
        ))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    create_store(&server)
        .set_status(BidId(9), BidStatus::Infield, Some("PO-881"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_bids_filters_by_status() {
    let server: MockServer = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bids"))
        .and(query_param("status", "ready_for_invoice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 9, "bid_number": "40003", "study_name": "Grocery shopper study", "status": "ready_for_invoice"}
        ])))
        .mount(&server)
        .await;

    let bids: Vec<BidSummary> = create_store(&server)
        .list_bids(BidStatus::ReadyForInvoice)
        .await
        .unwrap();

    assert_eq!(bids.len(), 1);
    assert_eq!(bids[0].id, BidId(9));
    assert!(bids[0].client_name.is_none());
}

#[tokio::test]
async fn test_allocation_update_body() {
    let server: MockServer = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bids/9/field-allocations"))
        .and(body_json(serde_json::json!({
            "partner_id": "P1",
            "audience_id": 1,
            "country": "India",
            "loi": 15,
            "allocation": 70
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    create_store(&server)
        .put_allocation(BidId(9), &india_key(), 70)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_partner_deliverables_ignore_derived_costs() {
    let server: MockServer = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/invoice/9/P1/15/details"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "partner_id": "P1",
            "loi": 15,
            "audience_id": 1,
            "country": "India",
            "allocation": 70,
            "n_delivered": 60,
            "initial_cpi": 5.0,
            "final_cpi": 4.5,
            "initial_cost": 1.0,
            "final_cost": 1.0,
            "savings": 0.0
        }])))
        .mount(&server)
        .await;

    let lines: Vec<InvoiceLine> = create_store(&server)
        .partner_deliverables(BidId(9), &p1(), loi15())
        .await
        .unwrap();

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].key, india_key());
    assert!((lines[0].cost().final_cost - 270.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_unreachable_store_is_transport_error() {
    let config: ClientConfig =
        ClientConfig::new("http://127.0.0.1:1/api").with_timeout(Duration::from_secs(2));
    let store: HttpBidStore = HttpBidStore::new(config).unwrap();

    let result = store.partners().await;
    assert!(matches!(result, Err(ref e) if matches!(e, ApiError::Transport(_)) && e.is_remote()));
}
