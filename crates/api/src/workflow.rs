// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Bid workflow orchestration.
//!
//! Every operation follows the same order:
//!
//! 1. Validate locally (pure domain / core code, no I/O)
//! 2. Write to the store
//! 3. Only then replace the caller's `BidState`
//!
//! A failure at any step leaves the caller's state exactly as it was, so
//! the lifecycle never moves ahead of the store.
//!
//! Uncommitted edits are mirrored to the draft cache when one is attached.
//! The cache is best-effort: its failures are logged and never fail an
//! operation.

use bidflow::{BidState, Command, Stage, TransitionResult, apply};
use bidflow_audit::{Actor, AuditEvent, Cause};
use bidflow_domain::{
    AllocationBook, AllocationCoercion, AllocationKey, AudienceId, Bid, BidId, BidNumber,
    BidStatus, ClosureBook, CostBreakdown, DeliveryMetrics, DomainError, InvoiceLine,
    InvoiceSheet, InvoiceSummary, Loi, PartnerAudienceKey, PartnerId, PartnerMetrics,
    PartnerResponse, PartnerSettings, ReferenceData, ResponseLedger, ResponsePatch,
    ResponseStatus, SampleDistribution,
};
use bidflow_persistence::{DraftCache, PersistenceError, TransitionRecord, keys};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use time::Date;
use tracing::{debug, info, warn};

use crate::batch::{BatchPolicy, BatchReport, run_batch};
use crate::error::{ApiError, translate_core_error, translate_domain_error};
use crate::reconcile::{
    reconcile_allocations, reconcile_bid, reconcile_final_cpis, reconcile_responses,
};
use crate::request_response::{BidSummary, ClosureData, FieldData, InvoiceData};
use crate::store::BidStore;

/// Drives bids through their lifecycle against a data store.
pub struct BidWorkflow<S: BidStore> {
    store: S,
    cache: Option<Mutex<DraftCache>>,
    actor: Actor,
    policy: BatchPolicy,
}

impl<S: BidStore> BidWorkflow<S> {
    /// Creates a workflow acting as `actor`, with no draft cache and
    /// fail-fast batches.
    #[must_use]
    pub const fn new(store: S, actor: Actor) -> Self {
        Self {
            store,
            cache: None,
            actor,
            policy: BatchPolicy::FailFast,
        }
    }

    /// Attaches a draft cache.
    #[must_use]
    pub fn with_cache(mut self, cache: DraftCache) -> Self {
        self.cache = Some(Mutex::new(cache));
        self
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn actor(&self) -> &Actor {
        &self.actor
    }

    // ========================================================================
    // Reference data and bid creation
    // ========================================================================

    /// Loads sales contacts, VM contacts, clients and partners concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first failure; nothing is returned unless all four
    /// lists loaded.
    pub async fn load_reference_data(&self) -> Result<ReferenceData, ApiError> {
        let (sales, vms, clients, partners) = futures::try_join!(
            self.store.sales_contacts(),
            self.store.vm_contacts(),
            self.store.clients(),
            self.store.partners()
        )?;

        info!(
            sales = sales.len(),
            vms = vms.len(),
            clients = clients.len(),
            partners = partners.len(),
            "Loaded reference data"
        );
        Ok(ReferenceData {
            sales,
            vms,
            clients,
            partners,
        })
    }

    /// Starts a new draft bid under the next issued bid number.
    ///
    /// A cached draft for that number that was never created in the store
    /// is picked up again.
    ///
    /// # Errors
    ///
    /// Returns an error if no bid number could be issued.
    pub async fn start_bid(&self, bid_date: Date) -> Result<BidState, ApiError> {
        let bid_number: BidNumber = self.store.next_bid_number().await?;
        let bid: Bid = self
            .load_draft::<Bid>(&bid_number, keys::BID)
            .filter(|draft| draft.id.is_none() && draft.status == BidStatus::Draft)
            .unwrap_or_else(|| Bid::new(bid_number, bid_date));

        info!(bid_number = %bid.bid_number, "Started bid");
        Ok(BidState::new(bid))
    }

    /// Loads a bid and every stage its status has reached.
    ///
    /// Cached drafts are reconciled with the store's data.
    ///
    /// # Errors
    ///
    /// Returns the first store failure.
    pub async fn open_bid(&self, id: BidId) -> Result<BidState, ApiError> {
        let server: Bid = self.store.get_bid(id).await?;
        let local: Option<Bid> = self.load_draft(&server.bid_number, keys::BID);
        let mut state: BidState = BidState::new(reconcile_bid(server, local.as_ref()));
        let status: BidStatus = state.bid.status;

        if status >= BidStatus::PartnerResponse {
            let stored: Vec<PartnerResponse> = self.store.partner_responses(id).await?;
            let local: Option<ResponseLedger> =
                self.load_draft(&state.bid.bid_number, keys::RESPONSES);
            let mut ledger: ResponseLedger = reconcile_responses(stored, local.as_ref());
            ledger.prune(&state.bid);
            if status == BidStatus::PartnerResponse {
                ledger.initialize(&state.bid);
            }
            state.responses = ledger;
        }

        if status >= BidStatus::Infield {
            self.refresh_allocations(&mut state, id).await?;
        }

        if status >= BidStatus::Closure {
            let data: ClosureData = self.store.closure(id).await?;
            let mut book: ClosureBook = ClosureBook::new(&state.allocations);
            let mut dropped: Vec<AllocationKey> = data.apply_to(&mut book);
            if status == BidStatus::Closure {
                let cached: Option<ClosureData> =
                    self.load_draft(&state.bid.bid_number, keys::CLOSURE);
                if let Some(cached) = cached {
                    dropped.extend(cached.apply_to(&mut book));
                }
            }
            if !dropped.is_empty() {
                warn!(
                    bid_number = %state.bid.bid_number,
                    dropped = dropped.len(),
                    "Ignored delivered counts for cells without allocation"
                );
            }
            state.closure = Some(book);
        }

        if status >= BidStatus::ReadyForInvoice {
            self.refresh_invoice(&mut state, id).await?;
        }

        info!(bid_number = %state.bid.bid_number, %status, "Opened bid");
        Ok(state)
    }

    /// Mirrors the current basic details to the draft cache.
    pub fn save_bid_draft(&self, state: &BidState) {
        self.save_draft(&state.bid.bid_number, keys::BID, &state.bid);
    }

    // ========================================================================
    // Basic details and partner responses
    // ========================================================================

    /// Submits Basic Details with the sample distribution.
    ///
    /// A draft bid is created in the store and moves to `partner_response`.
    /// A bid already in `partner_response` is updated in place.
    ///
    /// # Arguments
    ///
    /// * `state` - The bid state, replaced on success
    /// * `distribution` - The audience × country sample grid
    /// * `reference` - When given, the bid's references must resolve in it
    ///
    /// # Errors
    ///
    /// Returns a validation error before any network call if the details
    /// or the distribution are invalid. Returns `ApiError::Conflict` if the
    /// bid was changed in the store since it was loaded. If the response
    /// write fails after the bid was stored, `state` keeps its status but
    /// carries the store's id and revision.
    pub async fn submit_basic_details(
        &self,
        state: &mut BidState,
        distribution: SampleDistribution,
        reference: Option<&ReferenceData>,
    ) -> Result<(), ApiError> {
        if let Some(reference) = reference {
            reference
                .check_bid(&state.bid)
                .map_err(translate_domain_error)?;
        }

        let command: Command = Command::SubmitBasicDetails { distribution };
        let mut result: TransitionResult = self.plan(state, command)?;

        let persisted: Bid = if result.new_state.bid.id.is_some() {
            self.store.update_bid(&result.new_state.bid).await?
        } else {
            self.store.create_bid(&result.new_state.bid).await?
        };
        let id: BidId = persisted.id.ok_or_else(|| {
            ApiError::Decode(String::from("store returned a bid without an id"))
        })?;
        // The bid exists in the store from here on; a retry must update it.
        state.bid.id = Some(id);
        state.bid.revision = persisted.revision;
        result.new_state.bid.id = Some(id);
        result.new_state.bid.revision = persisted.revision;

        let pending: Vec<PartnerResponse> = result
            .new_state
            .responses
            .records()
            .filter(|r| r.status != ResponseStatus::Submitted)
            .cloned()
            .collect();
        if !pending.is_empty() {
            self.store.put_partner_responses(id, &pending).await?;
        }

        let bid_number: BidNumber = result.new_state.bid.bid_number.clone();
        self.commit(state, result);
        self.discard_draft(&bid_number, keys::BID);
        self.discard_draft(&bid_number, keys::RESPONSES);
        Ok(())
    }

    /// Applies a patch to one partner response locally.
    ///
    /// Nothing is sent to the store; the ledger is mirrored to the draft
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the record does not exist, is already
    /// submitted, or the patch carries an invalid value.
    pub fn edit_partner_response(
        &self,
        state: &mut BidState,
        partner: &PartnerId,
        loi: Loi,
        patch: &ResponsePatch,
    ) -> Result<(), ApiError> {
        state
            .responses
            .update(partner, loi, patch)
            .map_err(translate_domain_error)?;
        self.save_draft(&state.bid.bid_number, keys::RESPONSES, &state.responses);
        Ok(())
    }

    /// Changes the currency and PMF of a partner across all its LOIs.
    ///
    /// # Returns
    ///
    /// The number of records updated.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the PMF is negative or not a number.
    pub fn set_partner_settings(
        &self,
        state: &mut BidState,
        partner: &PartnerId,
        settings: PartnerSettings,
    ) -> Result<usize, ApiError> {
        let updated: usize = state
            .responses
            .set_partner_settings(partner, &settings)
            .map_err(translate_domain_error)?;
        self.save_draft(&state.bid.bid_number, keys::RESPONSES, &state.responses);
        Ok(updated)
    }

    /// Saves one partner response without submitting it.
    ///
    /// The patch, if any, is applied first. The record moves from `draft`
    /// to `saved` and is written to the store.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the record cannot be saved, or the
    /// store failure.
    pub async fn save_partner_response(
        &self,
        state: &mut BidState,
        partner: &PartnerId,
        loi: Loi,
        patch: Option<&ResponsePatch>,
    ) -> Result<(), ApiError> {
        let id: BidId = require_id(state)?;
        let mut ledger: ResponseLedger = state.responses.clone();
        if let Some(patch) = patch {
            ledger
                .update(partner, loi, patch)
                .map_err(translate_domain_error)?;
        }
        let saved: PartnerResponse = ledger
            .save(partner, loi)
            .map_err(translate_domain_error)?
            .clone();

        self.store
            .put_partner_responses(id, std::slice::from_ref(&saved))
            .await?;

        debug!(bid_number = %state.bid.bid_number, %partner, %loi, "Saved partner response");
        state.responses = ledger;
        self.save_draft(&state.bid.bid_number, keys::RESPONSES, &state.responses);
        Ok(())
    }

    /// Submits every partner response in one write and moves the bid to
    /// `infield`.
    ///
    /// The bid's PO number, if set, is recorded with the status change.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Completeness` naming the first incomplete record
    /// before anything is sent, or the store failure.
    pub async fn submit_partner_responses(&self, state: &mut BidState) -> Result<(), ApiError> {
        let id: BidId = require_id(state)?;
        let result: TransitionResult = self.plan(state, Command::SubmitPartnerResponses)?;

        let submitted: Vec<PartnerResponse> = result
            .new_state
            .responses
            .records()
            .filter(|r| r.status == ResponseStatus::Submitted)
            .cloned()
            .collect();
        self.store.put_partner_responses(id, &submitted).await?;
        self.store
            .set_status(
                id,
                result.new_state.bid.status,
                result.new_state.bid.po_number.as_deref(),
            )
            .await?;

        let bid_number: BidNumber = result.new_state.bid.bid_number.clone();
        self.commit(state, result);
        self.discard_draft(&bid_number, keys::RESPONSES);
        Ok(())
    }

    // ========================================================================
    // Field allocation
    // ========================================================================

    /// Loads the field data of an infield bid and seeds its allocation book.
    ///
    /// Cached allocation edits that were never submitted are re-applied
    /// and stay pending.
    ///
    /// # Errors
    ///
    /// Returns the store failure.
    pub async fn load_field_allocations(&self, state: &mut BidState) -> Result<FieldData, ApiError> {
        let id: BidId = require_id(state)?;
        self.refresh_allocations(state, id).await
    }

    /// Sets one allocation from raw operator input.
    ///
    /// Input that cannot be taken literally is coerced (negative or
    /// non-numeric becomes 0, fractions are truncated); the coercion is
    /// returned and logged.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Lifecycle` unless the bid is infield, or a
    /// validation error if the cell does not exist.
    pub fn set_allocation(
        &self,
        state: &mut BidState,
        key: &AllocationKey,
        raw: &str,
    ) -> Result<Option<AllocationCoercion>, ApiError> {
        ensure_status(state, BidStatus::Infield, "Field allocations")?;
        let coercion: Option<AllocationCoercion> = state
            .allocations
            .set_allocation_raw(key, raw)
            .map_err(translate_domain_error)?;
        if let Some(coercion) = &coercion {
            warn!(bid_number = %state.bid.bid_number, %coercion, "Allocation input coerced");
        }
        self.save_draft(
            &state.bid.bid_number,
            keys::ALLOCATIONS,
            &state.allocations.pending(),
        );
        Ok(coercion)
    }

    /// Sends every pending allocation edit to the store as one batch.
    ///
    /// Edits that were not confirmed go back to the pending queue.
    ///
    /// # Errors
    ///
    /// With the fail-fast policy, returns the first failure and re-queues
    /// every edit of the batch. With the collect-all policy the report
    /// lists the failures instead.
    pub async fn submit_allocations(
        &self,
        state: &mut BidState,
    ) -> Result<BatchReport<AllocationKey>, ApiError> {
        let id: BidId = require_id(state)?;
        ensure_status(state, BidStatus::Infield, "Field allocations")?;

        let items: Vec<(AllocationKey, u32)> = state.allocations.take_pending();
        if items.is_empty() {
            return Ok(BatchReport::default());
        }
        let values: BTreeMap<AllocationKey, u32> = items.iter().cloned().collect();
        let store: &S = &self.store;

        let outcome: Result<BatchReport<AllocationKey>, ApiError> = run_batch(
            values.keys().cloned().collect(),
            self.policy,
            |key: AllocationKey| {
                let allocation: u32 = values.get(&key).copied().unwrap_or_default();
                async move { store.put_allocation(id, &key, allocation).await }
            },
        )
        .await;

        match outcome {
            Ok(report) => {
                let failed: Vec<(AllocationKey, u32)> = report
                    .failed
                    .iter()
                    .filter_map(|(key, _)| values.get(key).map(|v| (key.clone(), *v)))
                    .collect();
                state.allocations.restore_pending(failed);
                self.sync_pending_allocations(state);
                info!(
                    bid_number = %state.bid.bid_number,
                    submitted = report.succeeded.len(),
                    failed = report.failed.len(),
                    "Submitted field allocations"
                );
                Ok(report)
            }
            Err(err) => {
                state.allocations.restore_pending(items);
                self.sync_pending_allocations(state);
                Err(err)
            }
        }
    }

    // ========================================================================
    // Closure
    // ========================================================================

    /// Closes fieldwork.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Lifecycle` unless the bid is infield, or the
    /// store failure.
    pub async fn move_to_closure(&self, state: &mut BidState) -> Result<(), ApiError> {
        self.transition(state, Command::MoveToClosure).await?;
        Ok(())
    }

    /// Reopens fieldwork.
    ///
    /// # Returns
    ///
    /// The downstream stages whose data may now be stale.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Lifecycle` unless the bid is in closure, or the
    /// store failure.
    pub async fn back_to_infield(&self, state: &mut BidState) -> Result<Vec<Stage>, ApiError> {
        self.transition(state, Command::BackToInfield).await
    }

    /// Records the delivered count of one allocated cell.
    ///
    /// The edit stays local until `save_closure`; the closure data is
    /// mirrored to the draft cache.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Lifecycle` unless the bid is in closure, or a
    /// validation error if nothing was allocated for the cell.
    pub fn set_delivered(
        &self,
        state: &mut BidState,
        key: &AllocationKey,
        delivered: u32,
    ) -> Result<(), ApiError> {
        self.edit_closure(state, |book| book.set_delivered(key, delivered))
    }

    /// Records the field-close date of one audience.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Lifecycle` unless the bid is in closure.
    pub fn set_field_close(
        &self,
        state: &mut BidState,
        audience: AudienceId,
        date: Date,
    ) -> Result<(), ApiError> {
        self.edit_closure(state, |book| {
            book.set_field_close(audience, date);
            Ok(())
        })
    }

    /// Records the delivery metrics of one audience.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Lifecycle` unless the bid is in closure.
    pub fn set_delivery_metrics(
        &self,
        state: &mut BidState,
        audience: AudienceId,
        metrics: DeliveryMetrics,
    ) -> Result<(), ApiError> {
        self.edit_closure(state, |book| {
            book.set_delivery_metrics(audience, metrics);
            Ok(())
        })
    }

    /// Records how one partner performed on one audience at one LOI.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Lifecycle` unless the bid is in closure.
    pub fn set_partner_metrics(
        &self,
        state: &mut BidState,
        key: PartnerAudienceKey,
        metrics: PartnerMetrics,
    ) -> Result<(), ApiError> {
        self.edit_closure(state, |book| {
            book.set_partner_metrics(key, metrics);
            Ok(())
        })
    }

    /// Writes the closure data to the store and clears its stale flag.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Precondition` if no closure data is loaded, or the
    /// store failure.
    pub async fn save_closure(&self, state: &mut BidState) -> Result<(), ApiError> {
        let id: BidId = require_id(state)?;
        let book: &ClosureBook = state.closure.as_ref().ok_or_else(|| {
            ApiError::Precondition(format!(
                "Bid {} has no closure data loaded",
                state.bid.bid_number
            ))
        })?;

        self.store
            .save_closure(id, &ClosureData::from_book(book))
            .await?;

        self.discard_draft(&state.bid.bid_number, keys::CLOSURE);
        if state.mark_saved(Stage::Closure) {
            info!(bid_number = %state.bid.bid_number, "Closure data saved; no longer stale");
        }
        Ok(())
    }

    /// Marks closure complete and prepares the invoice sheet.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Lifecycle` unless the bid is in closure, or the
    /// store failure.
    pub async fn move_to_ready_for_invoice(&self, state: &mut BidState) -> Result<(), ApiError> {
        self.transition(state, Command::MoveToReadyForInvoice)
            .await?;
        Ok(())
    }

    /// Returns from invoice preparation to closure.
    ///
    /// # Returns
    ///
    /// The downstream stages whose data may now be stale.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Lifecycle` unless the bid is ready for invoice, or
    /// the store failure.
    pub async fn move_back_to_closure(&self, state: &mut BidState) -> Result<Vec<Stage>, ApiError> {
        self.transition(state, Command::MoveBackToClosure).await
    }

    // ========================================================================
    // Invoice
    // ========================================================================

    /// Loads the invoice sheet and returns its summary.
    ///
    /// Lines already stored win; otherwise the sheet is built from the
    /// closure data. Cached final CPIs are re-applied.
    ///
    /// # Errors
    ///
    /// Returns the store failure.
    pub async fn load_invoice(&self, state: &mut BidState) -> Result<InvoiceSummary, ApiError> {
        let id: BidId = require_id(state)?;
        self.refresh_invoice(state, id).await?;
        invoice_summary(state)
    }

    /// Reads the delivered lines of one (partner, LOI) pair from the store.
    ///
    /// # Errors
    ///
    /// Returns the store failure.
    pub async fn load_partner_deliverables(
        &self,
        state: &BidState,
        partner: &PartnerId,
        loi: Loi,
    ) -> Result<Vec<InvoiceLine>, ApiError> {
        let id: BidId = require_id(state)?;
        let lines: Vec<InvoiceLine> = self.store.partner_deliverables(id, partner, loi).await?;
        Ok(lines.into_iter().filter(InvoiceLine::is_delivered).collect())
    }

    /// Sets or clears the final CPI of one invoice line.
    ///
    /// # Returns
    ///
    /// The recomputed costs of the line.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Precondition` if no invoice is loaded, or a
    /// validation error for an unknown line or invalid CPI.
    pub fn set_final_cpi(
        &self,
        state: &mut BidState,
        key: &AllocationKey,
        final_cpi: Option<f64>,
    ) -> Result<CostBreakdown, ApiError> {
        let sheet: &mut InvoiceSheet = state
            .invoice
            .as_mut()
            .ok_or_else(|| no_invoice(&state.bid.bid_number))?;
        let cost: CostBreakdown = sheet
            .set_final_cpi(key, final_cpi)
            .map_err(translate_domain_error)?;

        let drafts: Vec<(AllocationKey, Option<f64>)> = sheet
            .lines()
            .map(|line| (line.key.clone(), line.final_cpi()))
            .collect();
        self.save_draft(&state.bid.bid_number, keys::FINAL_CPIS, &drafts);
        Ok(cost)
    }

    /// Writes the invoice sheet to the store and clears its stale flag.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Precondition` if no invoice is loaded, or the
    /// store failure.
    pub async fn save_invoice(&self, state: &mut BidState) -> Result<(), ApiError> {
        let id: BidId = require_id(state)?;
        let sheet: &InvoiceSheet = state
            .invoice
            .as_ref()
            .ok_or_else(|| no_invoice(&state.bid.bid_number))?;

        self.store
            .save_invoice(id, &InvoiceData::from_sheet(sheet))
            .await?;

        if state.mark_saved(Stage::Invoice) {
            info!(bid_number = %state.bid.bid_number, "Invoice saved; no longer stale");
        }
        self.discard_draft(&state.bid.bid_number, keys::FINAL_CPIS);
        Ok(())
    }

    /// Submits the invoice and completes the bid.
    ///
    /// # Returns
    ///
    /// The invoice summary written onto the bid.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Completeness` naming the first delivered line
    /// without a usable final CPI before anything is sent, or the store
    /// failure.
    pub async fn submit_invoice(&self, state: &mut BidState) -> Result<InvoiceSummary, ApiError> {
        let id: BidId = require_id(state)?;
        let result: TransitionResult = self.plan(state, Command::SubmitInvoice)?;

        let sheet: &InvoiceSheet = result
            .new_state
            .invoice
            .as_ref()
            .ok_or_else(|| no_invoice(&state.bid.bid_number))?;
        self.store
            .submit_invoice(id, &InvoiceData::from_sheet(sheet))
            .await?;
        self.store
            .set_status(
                id,
                result.new_state.bid.status,
                result.new_state.bid.po_number.as_deref(),
            )
            .await?;

        self.commit(state, result);
        let summary: InvoiceSummary = invoice_summary(state)?;
        let bid_number: BidNumber = state.bid.bid_number.clone();
        self.use_cache("discard bid drafts", |cache| cache.discard_scope(&bid_number));
        Ok(summary)
    }

    // ========================================================================
    // Listing and history
    // ========================================================================

    /// Lists the bids currently in `status`.
    ///
    /// # Errors
    ///
    /// Returns the store failure.
    pub async fn list_bids(&self, status: BidStatus) -> Result<Vec<BidSummary>, ApiError> {
        let bids: Vec<BidSummary> = self.store.list_bids(status).await?;
        debug!(%status, count = bids.len(), "Listed bids");
        Ok(bids)
    }

    /// Returns the transitions of a bid recorded from this machine.
    ///
    /// Empty when no draft cache is attached.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Cache` if the log cannot be read.
    pub fn history(&self, bid_number: &BidNumber) -> Result<Vec<TransitionRecord>, ApiError> {
        let Some(cache) = &self.cache else {
            return Ok(Vec::new());
        };
        let mut guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.transition_history(bid_number)?)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn cause(&self, command: &Command, bid: &Bid) -> Cause {
        Cause::new(
            format!("{}/{}", bid.bid_number, command.name()),
            format!("{} requested by {}", command.name(), self.actor.id),
        )
    }

    /// Runs the pure transition. Nothing is sent or committed.
    fn plan(&self, state: &BidState, command: Command) -> Result<TransitionResult, ApiError> {
        let cause: Cause = self.cause(&command, &state.bid);
        apply(state, command, self.actor.clone(), cause).map_err(translate_core_error)
    }

    /// Plans a status-only transition, writes the status and commits.
    async fn transition(
        &self,
        state: &mut BidState,
        command: Command,
    ) -> Result<Vec<Stage>, ApiError> {
        let id: BidId = require_id(state)?;
        let result: TransitionResult = self.plan(state, command)?;
        self.store
            .set_status(
                id,
                result.new_state.bid.status,
                result.new_state.bid.po_number.as_deref(),
            )
            .await?;

        let stale: Vec<Stage> = result.stale_stages.clone();
        self.commit(state, result);
        Ok(stale)
    }

    /// Replaces the caller's state after the store accepted the transition.
    fn commit(&self, state: &mut BidState, result: TransitionResult) {
        let event: AuditEvent = result.audit_event;
        info!(
            bid_number = %event.bid_number,
            from = %event.before.status,
            to = %event.after.status,
            action = %event.action.name,
            "Transition committed"
        );
        if !result.stale_stages.is_empty() {
            let stages: Vec<&str> = result.stale_stages.iter().map(Stage::as_str).collect();
            warn!(
                bid_number = %event.bid_number,
                stages = ?stages,
                "Downstream data may be stale until saved again"
            );
        }

        *state = result.new_state;
        self.use_cache("record transition", |cache| cache.record_transition(&event));
    }

    async fn refresh_allocations(
        &self,
        state: &mut BidState,
        id: BidId,
    ) -> Result<FieldData, ApiError> {
        let data: FieldData = self.store.field_data(id).await?;
        let mut book: AllocationBook = data.allocation_book();

        let mut edits: Vec<(AllocationKey, u32)> = self
            .load_draft(&state.bid.bid_number, keys::ALLOCATIONS)
            .unwrap_or_default();
        edits.extend(state.allocations.pending());
        let skipped: Vec<AllocationKey> = reconcile_allocations(&mut book, &edits);
        if !skipped.is_empty() {
            warn!(
                bid_number = %state.bid.bid_number,
                skipped = skipped.len(),
                "Dropped cached allocation edits for cells no longer in the grid"
            );
        }

        state.allocations = book;
        self.sync_pending_allocations(state);
        Ok(data)
    }

    async fn refresh_invoice(&self, state: &mut BidState, id: BidId) -> Result<(), ApiError> {
        let data: InvoiceData = self.store.invoice(id).await?;
        let closure: ClosureBook = state
            .closure
            .clone()
            .unwrap_or_else(|| ClosureBook::new(&state.allocations));

        let mut sheet: InvoiceSheet = if data.is_empty() {
            state.invoice.as_ref().map_or_else(
                || InvoiceSheet::from_closure(&closure),
                |existing| existing.rebase(&closure),
            )
        } else {
            data.into_sheet()
        };

        let cached: Option<Vec<(AllocationKey, Option<f64>)>> =
            self.load_draft(&state.bid.bid_number, keys::FINAL_CPIS);
        if let Some(cached) = cached {
            let skipped: Vec<AllocationKey> = reconcile_final_cpis(&mut sheet, &cached);
            if !skipped.is_empty() {
                warn!(
                    bid_number = %state.bid.bid_number,
                    skipped = skipped.len(),
                    "Dropped cached final CPIs that no longer apply"
                );
            }
        }

        state.closure = Some(closure);
        state.invoice = Some(sheet);
        Ok(())
    }

    /// Applies one local closure edit and mirrors the result to the cache.
    fn edit_closure(
        &self,
        state: &mut BidState,
        edit: impl FnOnce(&mut ClosureBook) -> Result<(), DomainError>,
    ) -> Result<(), ApiError> {
        ensure_status(state, BidStatus::Closure, "Closure data")?;
        let bid_number: BidNumber = state.bid.bid_number.clone();
        let book: &mut ClosureBook = state.closure.as_mut().ok_or_else(|| {
            ApiError::Precondition(format!("Bid {bid_number} has no closure data loaded"))
        })?;
        edit(book).map_err(translate_domain_error)?;
        let data: ClosureData = ClosureData::from_book(book);
        self.save_draft(&bid_number, keys::CLOSURE, &data);
        Ok(())
    }

    fn sync_pending_allocations(&self, state: &BidState) {
        let pending: Vec<(AllocationKey, u32)> = state.allocations.pending();
        if pending.is_empty() {
            self.discard_draft(&state.bid.bid_number, keys::ALLOCATIONS);
        } else {
            self.save_draft(&state.bid.bid_number, keys::ALLOCATIONS, &pending);
        }
    }

    fn use_cache<T>(
        &self,
        operation: &str,
        op: impl FnOnce(&mut DraftCache) -> Result<T, PersistenceError>,
    ) -> Option<T> {
        let cache: &Mutex<DraftCache> = self.cache.as_ref()?;
        let mut guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
        match op(&mut *guard) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(operation, error = %err, "Draft cache operation failed");
                None
            }
        }
    }

    fn save_draft<T: Serialize>(&self, scope: &BidNumber, draft_key: &str, value: &T) {
        self.use_cache("save draft", |cache| cache.save_draft(scope, draft_key, value));
    }

    fn load_draft<T: DeserializeOwned>(&self, scope: &BidNumber, draft_key: &str) -> Option<T> {
        self.use_cache("load draft", |cache| cache.load_draft(scope, draft_key))
            .flatten()
    }

    fn discard_draft(&self, scope: &BidNumber, draft_key: &str) {
        self.use_cache("discard draft", |cache| cache.discard_draft(scope, draft_key));
    }
}

fn require_id(state: &BidState) -> Result<BidId, ApiError> {
    state.bid.id.ok_or_else(|| {
        ApiError::Precondition(format!(
            "Bid {} has not been created in the store yet",
            state.bid.bid_number
        ))
    })
}

fn ensure_status(state: &BidState, expected: BidStatus, what: &str) -> Result<(), ApiError> {
    if state.bid.status == expected {
        return Ok(());
    }
    Err(ApiError::Lifecycle {
        message: format!(
            "{what} can only be changed while the bid is '{expected}' (bid {} is '{}')",
            state.bid.bid_number, state.bid.status
        ),
    })
}

fn no_invoice(bid_number: &BidNumber) -> ApiError {
    ApiError::Precondition(format!("Bid {bid_number} has no invoice loaded"))
}

fn invoice_summary(state: &BidState) -> Result<InvoiceSummary, ApiError> {
    let sheet: &InvoiceSheet = state
        .invoice
        .as_ref()
        .ok_or_else(|| no_invoice(&state.bid.bid_number))?;
    let closure: ClosureBook = state
        .closure
        .clone()
        .unwrap_or_else(|| ClosureBook::new(&state.allocations));
    Ok(InvoiceSummary::from_sheet(&state.bid, sheet, &closure))
}
