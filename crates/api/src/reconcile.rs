// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Merging locally cached drafts with what the store returned.
//!
//! The store always wins on committed data. A local draft only fills in
//! what the store could not know yet: selections and edits that were never
//! sent.

use bidflow_domain::{
    AllocationBook, AllocationKey, Bid, InvoiceSheet, Loi, PartnerId, PartnerResponse,
    ResponseLedger, ResponseStatus,
};

/// Merges a cached bid draft into the bid read from the store.
///
/// The store's bid is kept as is, except that partner and LOI selections
/// present only in the draft are appended while the bid is still editable.
/// A draft of another bid is ignored.
#[must_use]
pub fn reconcile_bid(server: Bid, local: Option<&Bid>) -> Bid {
    let Some(local) = local else {
        return server;
    };
    if local.bid_number != server.bid_number || !server.is_editable() {
        return server;
    }

    let mut merged: Bid = server;
    let partners: Vec<PartnerId> = merged
        .partners
        .iter()
        .chain(local.partners.iter())
        .cloned()
        .collect();
    let lois: Vec<Loi> = merged
        .lois
        .iter()
        .chain(local.lois.iter())
        .copied()
        .collect();
    merged.select_partners(partners);
    merged.select_lois(lois);
    merged
}

/// Merges cached partner responses into the ones read from the store.
///
/// Submitted records from the store are final. For every other record the
/// local draft wins, since it holds edits the store has not seen. Local
/// records claiming to be submitted are not trusted.
#[must_use]
pub fn reconcile_responses(
    server: Vec<PartnerResponse>,
    local: Option<&ResponseLedger>,
) -> ResponseLedger {
    let mut ledger: ResponseLedger = ResponseLedger::from(server);
    let Some(local) = local else {
        return ledger;
    };

    for record in local.records() {
        if record.status == ResponseStatus::Submitted {
            continue;
        }
        let committed: bool = ledger
            .get(&record.partner, record.loi)
            .is_some_and(|existing| existing.status == ResponseStatus::Submitted);
        if !committed {
            ledger.insert(record.clone());
        }
    }
    ledger
}

/// Re-applies cached allocation edits on a freshly seeded book.
///
/// The edits become pending again. Returns the keys that no longer exist
/// in the grid.
pub fn reconcile_allocations(
    book: &mut AllocationBook,
    pending: &[(AllocationKey, u32)],
) -> Vec<AllocationKey> {
    pending
        .iter()
        .filter_map(|(key, value)| book.set_allocation(key, *value).err().map(|_| key.clone()))
        .collect()
}

/// Re-applies cached final CPIs on an invoice sheet.
///
/// Returns the keys that were skipped because the line no longer exists or
/// the cached value is not a valid CPI.
pub fn reconcile_final_cpis(
    sheet: &mut InvoiceSheet,
    local: &[(AllocationKey, Option<f64>)],
) -> Vec<AllocationKey> {
    local
        .iter()
        .filter_map(|(key, final_cpi)| {
            sheet
                .set_final_cpi(key, *final_cpi)
                .err()
                .map(|_| key.clone())
        })
        .collect()
}
