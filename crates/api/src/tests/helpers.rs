// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! An in-memory `BidStore` and fixtures for workflow tests.

use async_trait::async_trait;
use bidflow::BidState;
use bidflow_audit::Actor;
use bidflow_domain::{
    AllocationBook, AllocationKey, AudienceId, Bid, BidId, BidNumber, BidStatus, Client, Country,
    CountryPatch, InvoiceLine, Loi, Methodology, Partner, PartnerId, PartnerResponse,
    ReferenceData, ResponseLedger, ResponsePatch, SalesContact, SampleDistribution, VmContact,
    next_bid_number,
};
use bidflow_persistence::DraftCache;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use time::macros::date;

use crate::request_response::{
    BidSummary, ClosureData, FieldAudience, FieldCell, FieldCountry, FieldData, InvoiceData,
    InvoiceLineData,
};
use crate::{ApiError, BidStore, BidWorkflow};

/// Everything the in-memory store holds, open for inspection by tests.
#[derive(Debug, Default)]
pub struct StoreState {
    pub last_id: i64,
    pub bids: BTreeMap<BidId, Bid>,
    pub responses: BTreeMap<BidId, ResponseLedger>,
    pub allocations: BTreeMap<BidId, BTreeMap<AllocationKey, u32>>,
    pub closures: BTreeMap<BidId, ClosureData>,
    pub invoices: BTreeMap<BidId, InvoiceData>,
    pub submitted_invoices: BTreeSet<BidId>,
    pub status_calls: Vec<(BidId, BidStatus, Option<String>)>,
    pub failing_allocations: BTreeSet<AllocationKey>,
    pub fail_status: bool,
    pub fail_responses: bool,
    pub calls: Vec<String>,
}

/// A `BidStore` backed by maps, with failure injection.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<StoreState>,
    reference: ReferenceData,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreState::default()),
            reference: create_reference_data(),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().unwrap()
    }

    fn record(&self, call: &str) -> MutexGuard<'_, StoreState> {
        let mut state: MutexGuard<'_, StoreState> = self.state();
        state.calls.push(call.to_string());
        state
    }
}

fn not_found(id: BidId) -> ApiError {
    ApiError::Status {
        status: 404,
        message: format!("Bid {id} not found"),
    }
}

#[async_trait]
impl BidStore for MemoryStore {
    async fn next_bid_number(&self) -> Result<BidNumber, ApiError> {
        let state = self.record("next_bid_number");
        Ok(next_bid_number(state.bids.values().map(|b| &b.bid_number)))
    }

    async fn sales_contacts(&self) -> Result<Vec<SalesContact>, ApiError> {
        Ok(self.reference.sales.clone())
    }

    async fn vm_contacts(&self) -> Result<Vec<VmContact>, ApiError> {
        Ok(self.reference.vms.clone())
    }

    async fn clients(&self) -> Result<Vec<Client>, ApiError> {
        Ok(self.reference.clients.clone())
    }

    async fn partners(&self) -> Result<Vec<Partner>, ApiError> {
        Ok(self.reference.partners.clone())
    }

    async fn create_bid(&self, bid: &Bid) -> Result<Bid, ApiError> {
        let mut state = self.record("create_bid");
        state.last_id += 1;
        let mut stored: Bid = bid.clone();
        let id: BidId = BidId(state.last_id);
        stored.id = Some(id);
        stored.revision = Some(1);
        state.bids.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_bid(&self, bid: &Bid) -> Result<Bid, ApiError> {
        let mut state = self.record("update_bid");
        let id: BidId = bid.id.ok_or_else(|| ApiError::Status {
            status: 400,
            message: String::from("missing id"),
        })?;
        let current: &Bid = state.bids.get(&id).ok_or_else(|| not_found(id))?;
        if bid.revision.is_some() && bid.revision != current.revision {
            return Err(ApiError::Conflict {
                message: format!("Bid {id} was modified by someone else"),
            });
        }
        let mut stored: Bid = bid.clone();
        stored.revision = Some(current.revision.unwrap_or(0) + 1);
        state.bids.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_bid(&self, id: BidId) -> Result<Bid, ApiError> {
        let state = self.record("get_bid");
        state.bids.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn set_status(
        &self,
        id: BidId,
        status: BidStatus,
        po_number: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut state = self.record("set_status");
        if state.fail_status {
            return Err(ApiError::Status {
                status: 500,
                message: String::from("status update failed"),
            });
        }
        let bid: &mut Bid = state.bids.get_mut(&id).ok_or_else(|| not_found(id))?;
        bid.status = status;
        if let Some(po_number) = po_number {
            bid.po_number = Some(po_number.to_string());
        }
        state
            .status_calls
            .push((id, status, po_number.map(str::to_string)));
        Ok(())
    }

    async fn list_bids(&self, status: BidStatus) -> Result<Vec<BidSummary>, ApiError> {
        let state = self.record("list_bids");
        Ok(state
            .bids
            .iter()
            .filter(|(_, bid)| bid.status == status)
            .map(|(id, bid)| BidSummary {
                id: *id,
                bid_number: bid.bid_number.clone(),
                study_name: bid.study_name.clone(),
                client_name: None,
                status: bid.status,
                po_number: bid.po_number.clone(),
            })
            .collect())
    }

    async fn field_data(&self, id: BidId) -> Result<FieldData, ApiError> {
        let state = self.record("field_data");
        let bid: &Bid = state.bids.get(&id).ok_or_else(|| not_found(id))?;
        let ledger: ResponseLedger = state.responses.get(&id).cloned().unwrap_or_default();
        let stored: BTreeMap<AllocationKey, u32> =
            state.allocations.get(&id).cloned().unwrap_or_default();

        let book: AllocationBook = AllocationBook::from_responses(bid, &ledger);
        let cells: Vec<FieldCell> = book
            .cells()
            .map(|(key, cell)| FieldCell {
                partner_id: key.partner.clone(),
                audience_id: key.audience,
                country: key.country.clone(),
                loi: key.loi,
                commitment: cell.commitment,
                cpi: cell.cpi,
                allocation: stored.get(key).copied().unwrap_or_default(),
            })
            .collect();
        let audiences: Vec<FieldAudience> = bid
            .target_audiences
            .iter()
            .map(|audience| FieldAudience {
                id: audience.id,
                name: audience.name.clone(),
                countries: audience
                    .country_samples
                    .iter()
                    .map(|(country, n)| FieldCountry {
                        country: country.clone(),
                        sample_size: *n,
                    })
                    .collect(),
            })
            .collect();

        Ok(FieldData {
            partners: self
                .reference
                .partners
                .iter()
                .filter(|p| bid.partners.contains(&p.id))
                .cloned()
                .collect(),
            loi_options: bid.lois.clone(),
            audiences,
            cells,
        })
    }

    async fn partner_responses(&self, id: BidId) -> Result<Vec<PartnerResponse>, ApiError> {
        let state = self.record("partner_responses");
        Ok(state
            .responses
            .get(&id)
            .map(|ledger| ledger.records().cloned().collect())
            .unwrap_or_default())
    }

    async fn put_partner_responses(
        &self,
        id: BidId,
        responses: &[PartnerResponse],
    ) -> Result<(), ApiError> {
        let mut state = self.record("put_partner_responses");
        if state.fail_responses {
            return Err(ApiError::Status {
                status: 500,
                message: String::from("responses down"),
            });
        }
        let ledger: &mut ResponseLedger = state.responses.entry(id).or_default();
        for record in responses {
            ledger.insert(record.clone());
        }
        Ok(())
    }

    async fn put_allocation(
        &self,
        id: BidId,
        key: &AllocationKey,
        allocation: u32,
    ) -> Result<(), ApiError> {
        let mut state = self.record("put_allocation");
        if state.failing_allocations.contains(key) {
            return Err(ApiError::Status {
                status: 503,
                message: String::from("allocation service unavailable"),
            });
        }
        state
            .allocations
            .entry(id)
            .or_default()
            .insert(key.clone(), allocation);
        Ok(())
    }

    async fn closure(&self, id: BidId) -> Result<ClosureData, ApiError> {
        let state = self.record("closure");
        Ok(state.closures.get(&id).cloned().unwrap_or_default())
    }

    async fn save_closure(&self, id: BidId, data: &ClosureData) -> Result<(), ApiError> {
        let mut state = self.record("save_closure");
        state.closures.insert(id, data.clone());
        Ok(())
    }

    async fn invoice(&self, id: BidId) -> Result<InvoiceData, ApiError> {
        let state = self.record("invoice");
        Ok(state.invoices.get(&id).cloned().unwrap_or_default())
    }

    async fn partner_deliverables(
        &self,
        id: BidId,
        partner: &PartnerId,
        loi: Loi,
    ) -> Result<Vec<InvoiceLine>, ApiError> {
        let state = self.record("partner_deliverables");
        Ok(state
            .invoices
            .get(&id)
            .map(|data| {
                data.lines
                    .iter()
                    .filter(|l| &l.partner_id == partner && l.loi == loi)
                    .cloned()
                    .map(InvoiceLineData::into_line)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn save_invoice(&self, id: BidId, data: &InvoiceData) -> Result<(), ApiError> {
        let mut state = self.record("save_invoice");
        state.invoices.insert(id, data.clone());
        Ok(())
    }

    async fn submit_invoice(&self, id: BidId, data: &InvoiceData) -> Result<(), ApiError> {
        let mut state = self.record("submit_invoice");
        state.invoices.insert(id, data.clone());
        state.submitted_invoices.insert(id);
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn create_test_actor() -> Actor {
    Actor::new(String::from("dana"), String::from("operator"))
}

pub fn create_reference_data() -> ReferenceData {
    ReferenceData {
        sales: vec![SalesContact {
            id: 1,
            sales_person: String::from("Priya"),
        }],
        vms: vec![VmContact {
            id: 2,
            vm_name: String::from("Omar"),
        }],
        clients: vec![Client {
            id: 3,
            client_name: String::from("Acme Foods"),
        }],
        partners: vec![Partner {
            id: p1(),
            partner_name: String::from("Panel One"),
        }],
    }
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

pub fn usa_key() -> AllocationKey {
    AllocationKey::new(p1(), AudienceId(1), usa(), loi15())
}

pub fn create_workflow() -> BidWorkflow<MemoryStore> {
    BidWorkflow::new(MemoryStore::new(), create_test_actor())
}

pub fn create_cached_workflow() -> BidWorkflow<MemoryStore> {
    create_workflow().with_cache(DraftCache::new_in_memory().unwrap())
}

/// Fills in complete basic details: India + USA, one audience of 100,
/// partner P1, LOI 15.
pub fn fill_basic_details(bid: &mut Bid) {
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
}

pub fn create_distribution(bid: &Bid, india_n: u32, usa_n: u32) -> SampleDistribution {
    let mut grid: SampleDistribution = SampleDistribution::empty(bid);
    grid.set(AudienceId(1), &india(), india_n).unwrap();
    grid.set(AudienceId(1), &usa(), usa_n).unwrap();
    grid
}

/// Patches P1 / 15 with India 70 @ 5, USA 30 @ 6 and a 10 day timeline.
pub fn fill_responses(workflow: &BidWorkflow<MemoryStore>, state: &mut BidState) {
    for (country, commitment, cpi) in [(india(), 70, 5.0), (usa(), 30, 6.0)] {
        let patch: ResponsePatch = ResponsePatch::cell(
            AudienceId(1),
            country,
            CountryPatch {
                commitment: Some(commitment),
                cpi: Some(cpi),
            },
        );
        workflow
            .edit_partner_response(state, &p1(), loi15(), &patch)
            .unwrap();
    }
    workflow
        .edit_partner_response(
            state,
            &p1(),
            loi15(),
            &ResponsePatch::timeline(AudienceId(1), 10),
        )
        .unwrap();
}

/// Creates a bid in the store and moves it to `partner_response`.
pub async fn create_partner_response_state(workflow: &BidWorkflow<MemoryStore>) -> BidState {
    let mut state: BidState = workflow.start_bid(date!(2026 - 03 - 02)).await.unwrap();
    fill_basic_details(&mut state.bid);
    let distribution: SampleDistribution = create_distribution(&state.bid, 70, 30);
    workflow
        .submit_basic_details(&mut state, distribution, None)
        .await
        .unwrap();
    state
}

/// Drives a bid to `infield` with the field grid loaded; nothing allocated.
pub async fn create_infield_state(workflow: &BidWorkflow<MemoryStore>) -> BidState {
    let mut state: BidState = create_partner_response_state(workflow).await;
    fill_responses(workflow, &mut state);
    workflow.submit_partner_responses(&mut state).await.unwrap();
    workflow.load_field_allocations(&mut state).await.unwrap();
    state
}

/// Drives a bid to closure with India allocated 70 (60 delivered) and USA
/// allocated 30 (nothing delivered).
pub async fn create_closure_state(workflow: &BidWorkflow<MemoryStore>) -> BidState {
    let mut state: BidState = create_infield_state(workflow).await;
    workflow.set_allocation(&mut state, &india_key(), "70").unwrap();
    workflow.set_allocation(&mut state, &usa_key(), "30").unwrap();
    workflow.submit_allocations(&mut state).await.unwrap();
    workflow.move_to_closure(&mut state).await.unwrap();
    workflow
        .set_delivered(&mut state, &india_key(), 60)
        .unwrap();
    state
}
