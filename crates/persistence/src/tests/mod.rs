// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![allow(clippy::expect_used, clippy::unwrap_used)]


use bidflow_audit::{Action, Actor, AuditEvent, Cause, StateSnapshot};
use bidflow_domain::{BidNumber, BidStatus};

use crate::DraftCache;

pub fn create_cache() -> DraftCache {
    DraftCache::new_in_memory().expect("in-memory cache")
}

pub fn create_test_actor() -> Actor {
    Actor::new(String::from("ops-1"), String::from("operator"))
}

pub fn create_test_cause() -> Cause {
    Cause::new(String::from("req-1"), String::from("Test transition"))
}

pub fn create_event(bid_number: &str, name: &str, from: BidStatus, to: BidStatus) -> AuditEvent {
    AuditEvent::new(
        BidNumber::new(bid_number),
        create_test_actor(),
        create_test_cause(),
        Action::new(String::from(name), Some(String::from("details"))),
        StateSnapshot::new(from, String::from("before")),
        StateSnapshot::new(to, String::from("after")),
    )
}
