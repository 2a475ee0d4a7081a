// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::{
    AllocationBook, AllocationCell, AllocationKey, AudienceId, Bid, BidNumber, BidStatus, Country,
    Loi, Methodology, PartnerId,
};
use time::macros::date;

pub fn india() -> Country {
    Country::new("India")
}

pub fn usa() -> Country {
    Country::new("USA")
}

pub fn loi(minutes: u16) -> Loi {
    Loi::new(minutes).unwrap()
}

pub fn partner(id: &str) -> PartnerId {
    PartnerId::new(id)
}

/// A bid with basic details filled in, one audience of 100 samples split
/// India 70 / USA 30, partner P1 and LOI 15.
pub fn create_test_bid() -> Bid {
    let mut bid: Bid = Bid::new(BidNumber::new("40000"), date!(2026 - 03 - 02));
    bid.study_name = String::from("Grocery shopper study");
    bid.methodology = Some(Methodology::Quantitative);
    bid.sales_contact = Some(1);
    bid.vm_contact = Some(2);
    bid.client = Some(3);
    bid.project_requirement = String::from("Online survey of weekly shoppers");
    bid.select_countries([india(), usa()]);
    bid.select_partners([partner("P1")]);
    bid.select_lois([loi(15)]);
    let audience = bid.audience_mut(AudienceId(1)).unwrap();
    audience.sample_required = 100;
    audience.incidence_rate = 40;
    audience.country_samples.insert(india(), 70);
    audience.country_samples.insert(usa(), 30);
    bid
}

/// The same bid after partner responses were submitted.
pub fn create_infield_bid() -> Bid {
    let mut bid: Bid = create_test_bid();
    bid.status = BidStatus::Infield;
    bid
}

pub fn allocation_key(partner_id: &str, country: Country, minutes: u16) -> AllocationKey {
    AllocationKey::new(partner(partner_id), AudienceId(1), country, loi(minutes))
}

/// An allocation grid for P1 at LOI 15: India 70 at CPI 5, USA 30 at CPI 6.
pub fn create_allocation_book() -> AllocationBook {
    AllocationBook::seed([
        (
            allocation_key("P1", india(), 15),
            AllocationCell {
                commitment: 70,
                cpi: Some(5.0),
                allocation: 70,
            },
        ),
        (
            allocation_key("P1", usa(), 15),
            AllocationCell {
                commitment: 30,
                cpi: Some(6.0),
                allocation: 30,
            },
        ),
    ])
}
