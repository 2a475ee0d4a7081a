// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::helpers::{create_test_bid, india, loi, partner, usa};
use crate::{
    AudienceId, Bid, BidNumber, BidStatus, DeliveryMode, DomainError, Loi, Methodology,
    parse_iso_date,
};
use std::str::FromStr;
use time::macros::date;

#[test]
fn test_new_bid_is_draft_with_one_audience() {
    let bid: Bid = Bid::new(BidNumber::new("40000"), date!(2026 - 01 - 05));
    assert_eq!(bid.status, BidStatus::Draft);
    assert_eq!(bid.target_audiences.len(), 1);
    assert_eq!(bid.target_audiences[0].name, "Audience - 1");
    assert!(bid.id.is_none());
}

#[test]
fn test_added_audiences_are_auto_numbered() {
    let mut bid: Bid = Bid::new(BidNumber::new("40000"), date!(2026 - 01 - 05));
    let second: AudienceId = bid.add_audience().unwrap();
    let third: AudienceId = bid.add_audience().unwrap();
    assert_eq!(second, AudienceId(2));
    assert_eq!(third, AudienceId(3));
    assert_eq!(bid.target_audiences[2].name, "Audience - 3");
}

#[test]
fn test_last_audience_cannot_be_removed() {
    let mut bid: Bid = Bid::new(BidNumber::new("40000"), date!(2026 - 01 - 05));
    let result = bid.remove_audience(AudienceId(1));
    assert!(matches!(result, Err(DomainError::NoTargetAudience)));
    assert_eq!(bid.target_audiences.len(), 1);

    bid.add_audience().unwrap();
    assert!(bid.remove_audience(AudienceId(1)).is_ok());
    assert_eq!(bid.target_audiences.len(), 1);
}

#[test]
fn test_details_locked_once_infield() {
    let mut bid: Bid = create_test_bid();
    bid.status = BidStatus::PartnerResponse;
    assert!(bid.ensure_editable().is_ok());

    bid.status = BidStatus::Infield;
    let result = bid.add_audience();
    assert!(matches!(result, Err(DomainError::BidLocked { status }) if status == "infield"));
}

#[test]
fn test_selections_are_deduplicated_in_order() {
    let mut bid: Bid = create_test_bid();
    bid.select_partners([partner("P2"), partner("P1"), partner("P2")]);
    bid.select_lois([loi(30), loi(15), loi(30)]);
    bid.select_countries([usa(), india(), usa()]);
    assert_eq!(bid.partners, vec![partner("P2"), partner("P1")]);
    assert_eq!(bid.lois, vec![loi(30), loi(15)]);
    assert_eq!(bid.countries, vec![usa(), india()]);
}

#[test]
fn test_zero_loi_rejected() {
    assert!(matches!(Loi::new(0), Err(DomainError::InvalidLoi(0))));
    assert_eq!(Loi::new(45).unwrap().minutes(), 45);
}

#[test]
fn test_methodology_wire_names() {
    assert_eq!(Methodology::from_str("quant").unwrap(), Methodology::Quantitative);
    assert_eq!(Methodology::from_str("Qual").unwrap(), Methodology::Qualitative);
    assert_eq!(Methodology::Both.as_str(), "both");
    assert!(Methodology::from_str("mixed").is_err());
    assert_eq!(DeliveryMode::from_str("offline").unwrap(), DeliveryMode::Offline);
}

#[test]
fn test_bid_json_shape() {
    let bid: Bid = create_test_bid();
    let json: serde_json::Value = serde_json::to_value(&bid).unwrap();
    assert_eq!(json["bid_number"], "40000");
    assert_eq!(json["bid_date"], "2026-03-02");
    assert_eq!(json["methodology"], "quant");
    assert_eq!(json["status"], "draft");
    assert_eq!(json["loi"], serde_json::json!([15]));
    assert_eq!(json["target_audiences"][0]["country_samples"]["India"], 70);

    let back: Bid = serde_json::from_value(json).unwrap();
    assert_eq!(back, bid);
}

#[test]
fn test_bid_json_rejects_zero_loi() {
    let mut json: serde_json::Value = serde_json::to_value(create_test_bid()).unwrap();
    json["loi"] = serde_json::json!([0]);
    assert!(serde_json::from_value::<Bid>(json).is_err());
}

#[test]
fn test_parse_iso_date() {
    assert_eq!(parse_iso_date("2026-02-28").unwrap(), date!(2026 - 02 - 28));
    assert!(matches!(
        parse_iso_date("28/02/2026"),
        Err(DomainError::DateParseError { .. })
    ));
}
