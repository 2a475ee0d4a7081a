// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::{BidState, Command, TransitionResult, apply};
use bidflow_audit::{Actor, Cause};
use bidflow_domain::{
    AllocationKey, AudienceId, Bid, BidNumber, Country, CountryPatch, Loi, Methodology, PartnerId,
    ResponsePatch, SampleDistribution,
};
use time::macros::date;

pub fn create_test_actor() -> Actor {
    Actor::new(String::from("dana"), String::from("operator"))
}

pub fn create_test_cause() -> Cause {
    Cause::new(String::from("req-456"), String::from("Operator request"))
}

pub fn india() -> Country {
    Country::new("India")
}

pub fn usa() -> Country {
    Country::new("USA")
}

pub fn p1() -> PartnerId {
    PartnerId::new("P1")
}

pub fn loi15() -> Loi {
    Loi::new(15).unwrap()
}

pub fn india_key() -> AllocationKey {
    AllocationKey::new(p1(), AudienceId(1), india(), loi15())
}

/// A draft bid with complete basic details: India + USA, one audience of
/// 100, partner P1, LOI 15.
pub fn create_draft_bid() -> Bid {
    let mut bid: Bid = Bid::new(BidNumber::new("40000"), date!(2026 - 03 - 02));
    bid.study_name = String::from("Grocery shopper study");
    bid.methodology = Some(Methodology::Quantitative);
    bid.sales_contact = Some(1);
    bid.vm_contact = Some(2);
    bid.client = Some(3);
    bid.project_requirement = String::from("Online survey");
    bid.select_countries([india(), usa()]);
    bid.select_partners([p1()]);
    bid.select_lois([loi15()]);
    let audience = bid.audience_mut(AudienceId(1)).unwrap();
    audience.sample_required = 100;
    audience.incidence_rate = 35;
    bid
}

pub fn create_distribution(bid: &Bid, india_n: u32, usa_n: u32) -> SampleDistribution {
    let mut grid: SampleDistribution = SampleDistribution::empty(bid);
    grid.set(AudienceId(1), &india(), india_n).unwrap();
    grid.set(AudienceId(1), &usa(), usa_n).unwrap();
    grid
}

pub fn step(state: &BidState, command: Command) -> BidState {
    let result: TransitionResult =
        apply(state, command, create_test_actor(), create_test_cause()).unwrap();
    result.new_state
}

/// Fills P1 / 15 with India 70 @ 5, USA 30 @ 6 and a 10 day timeline.
pub fn fill_responses(state: &mut BidState) {
    for (country, commitment, cpi) in [(india(), 70, 5.0), (usa(), 30, 6.0)] {
        state
            .responses
            .update(
                &p1(),
                loi15(),
                &ResponsePatch::cell(
                    AudienceId(1),
                    country,
                    CountryPatch {
                        commitment: Some(commitment),
                        cpi: Some(cpi),
                    },
                ),
            )
            .unwrap();
    }
    state
        .responses
        .update(&p1(), loi15(), &ResponsePatch::timeline(AudienceId(1), 10))
        .unwrap();
}

/// Drives a fresh bid to `infield` with India allocated 70 and USA 30.
pub fn create_infield_state() -> BidState {
    let bid: Bid = create_draft_bid();
    let distribution: SampleDistribution = create_distribution(&bid, 70, 30);
    let state: BidState = BidState::new(bid);
    let mut state: BidState = step(&state, Command::SubmitBasicDetails { distribution });
    fill_responses(&mut state);
    let mut state: BidState = step(&state, Command::SubmitPartnerResponses);
    state.allocations.set_allocation(&india_key(), 70).unwrap();
    state
        .allocations
        .set_allocation(&AllocationKey::new(p1(), AudienceId(1), usa(), loi15()), 30)
        .unwrap();
    state
}
