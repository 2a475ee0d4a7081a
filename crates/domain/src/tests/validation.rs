// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::helpers::{create_test_bid, partner};
use crate::{
    AudienceId, Bid, BidNumber, Client, DomainError, Partner, ReferenceData, SalesContact,
    VmContact, next_bid_number, validate_basic_details,
};

#[test]
fn test_validate_basic_details_accepts_complete_bid() {
    let bid: Bid = create_test_bid();
    assert!(validate_basic_details(&bid).is_ok());
}

#[test]
fn test_validate_basic_details_rejects_blank_study_name() {
    let mut bid: Bid = create_test_bid();
    bid.study_name = String::from("   ");
    assert!(matches!(
        validate_basic_details(&bid),
        Err(DomainError::MissingField {
            field: "study_name"
        })
    ));
}

#[test]
fn test_validate_basic_details_rejects_missing_client() {
    let mut bid: Bid = create_test_bid();
    bid.client = None;
    assert!(matches!(
        validate_basic_details(&bid),
        Err(DomainError::MissingField { field: "client" })
    ));
}

#[test]
fn test_validate_basic_details_checks_selections_in_order() {
    let mut bid: Bid = create_test_bid();
    bid.countries.clear();
    bid.partners.clear();
    assert!(matches!(
        validate_basic_details(&bid),
        Err(DomainError::EmptySelection {
            selection: "country"
        })
    ));

    let mut bid: Bid = create_test_bid();
    bid.lois.clear();
    assert!(matches!(
        validate_basic_details(&bid),
        Err(DomainError::EmptySelection { selection: "LOI" })
    ));
}

#[test]
fn test_validate_basic_details_checks_audience_numbers() {
    let mut bid: Bid = create_test_bid();
    bid.audience_mut(AudienceId(1)).unwrap().incidence_rate = 0;
    assert!(matches!(
        validate_basic_details(&bid),
        Err(DomainError::InvalidIncidenceRate { value: 0, .. })
    ));

    let mut bid: Bid = create_test_bid();
    bid.audience_mut(AudienceId(1)).unwrap().sample_required = 0;
    assert!(matches!(
        validate_basic_details(&bid),
        Err(DomainError::InvalidSampleRequired { .. })
    ));
}

#[test]
fn test_next_bid_number_starts_at_40000() {
    let none: Vec<BidNumber> = Vec::new();
    assert_eq!(next_bid_number(&none).value(), "40000");
}

#[test]
fn test_next_bid_number_ignores_non_numeric() {
    let existing: Vec<BidNumber> = vec![
        BidNumber::new("40007"),
        BidNumber::new("LEGACY-9"),
        BidNumber::new("40002"),
    ];
    assert_eq!(next_bid_number(&existing).value(), "40008");
}

fn create_reference_data() -> ReferenceData {
    ReferenceData {
        sales: vec![SalesContact {
            id: 1,
            sales_person: String::from("Dana"),
        }],
        vms: vec![VmContact {
            id: 2,
            vm_name: String::from("Sam"),
        }],
        clients: vec![Client {
            id: 3,
            client_name: String::from("Acme"),
        }],
        partners: vec![Partner {
            id: partner("P1"),
            partner_name: String::from("Panel One"),
        }],
    }
}

#[test]
fn test_reference_check_accepts_known_keys() {
    let reference: ReferenceData = create_reference_data();
    assert!(reference.check_bid(&create_test_bid()).is_ok());
    assert_eq!(reference.partner_name(&partner("P1")), "Panel One");
    assert_eq!(reference.partner_name(&partner("P9")), "P9");
}

#[test]
fn test_reference_check_rejects_unknown_partner() {
    let reference: ReferenceData = create_reference_data();
    let mut bid: Bid = create_test_bid();
    bid.select_partners([partner("P1"), partner("P9")]);
    assert!(matches!(
        reference.check_bid(&bid),
        Err(DomainError::UnknownReference { kind: "partner", id }) if id == "P9"
    ));
}
