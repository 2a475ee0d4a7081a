// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::command::Command;
use crate::error::CoreError;
use crate::state::{BidState, Stage, TransitionResult};
use bidflow_audit::{Action, Actor, AuditEvent, Cause, StateSnapshot};
use bidflow_domain::{
    AllocationBook, BidStatus, ClosureBook, InvoiceSheet, InvoiceSummary, ResponseKey,
    validate_basic_details,
};

/// Applies a command to a bid state, producing a new state and an audit event.
///
/// This function is pure. The input state is never modified; the caller
/// persists `new_state` and only then treats the transition as committed.
///
/// # Arguments
///
/// * `state` - The current bid state (immutable)
/// * `command` - The command to apply
/// * `actor` - The actor performing this action
/// * `cause` - The cause or reason for this action
///
/// # Returns
///
/// * `Ok(TransitionResult)` containing the new state, audit event and any
///   stages made stale
/// * `Err(CoreError)` if the command is invalid in the current state
///
/// # Errors
///
/// Returns an error if:
/// - The status transition is not in the lifecycle table
/// - Basic Details or the sample distribution fail validation
/// - Partner responses are incomplete
/// - A delivered invoice line has no usable final CPI
pub fn apply(
    state: &BidState,
    command: Command,
    actor: Actor,
    cause: Cause,
) -> Result<TransitionResult, CoreError> {
    let before: StateSnapshot = state.snapshot();
    let action_name: &'static str = command.name();
    let mut new_state: BidState = state.clone();
    let mut stale: Vec<Stage> = Vec::new();

    let details: String = match command {
        Command::SubmitBasicDetails { distribution } => {
            state.bid.ensure_editable()?;
            validate_basic_details(&state.bid)?;
            distribution.apply_to(&mut new_state.bid)?;

            if state.bid.status == BidStatus::Draft {
                state
                    .bid
                    .status
                    .validate_transition(BidStatus::PartnerResponse)?;
                new_state.bid.status = BidStatus::PartnerResponse;
            }

            let dropped: Vec<ResponseKey> = new_state.responses.prune(&new_state.bid);
            let created: Vec<ResponseKey> = new_state.responses.initialize(&new_state.bid);
            format!(
                "Basic details accepted; {} response record(s) created, {} dropped",
                created.len(),
                dropped.len()
            )
        }
        Command::SubmitPartnerResponses => {
            state.bid.status.validate_transition(BidStatus::Infield)?;
            let submitted = new_state.responses.prepare_submission(&state.bid)?;
            new_state.responses.mark_submitted(&state.bid);
            new_state.allocations = AllocationBook::from_responses(&state.bid, &new_state.responses);
            new_state.bid.status = BidStatus::Infield;
            format!("Submitted {} partner response record(s)", submitted.len())
        }
        Command::MoveToClosure => {
            state.bid.status.validate_transition(BidStatus::Closure)?;
            let closure: ClosureBook = state.closure.as_ref().map_or_else(
                || ClosureBook::new(&state.allocations),
                |existing| existing.rebase(&state.allocations),
            );
            new_state.closure = Some(closure);
            new_state.bid.status = BidStatus::Closure;
            String::from("Fieldwork closed")
        }
        Command::BackToInfield => {
            state.bid.status.validate_transition(BidStatus::Infield)?;
            if state.closure.is_some() {
                stale.push(Stage::Closure);
            }
            if state.invoice.is_some() {
                stale.push(Stage::Invoice);
            }
            new_state.bid.status = BidStatus::Infield;
            String::from("Fieldwork reopened")
        }
        Command::MoveToReadyForInvoice => {
            state
                .bid
                .status
                .validate_transition(BidStatus::ReadyForInvoice)?;
            let closure: ClosureBook = state
                .closure
                .clone()
                .unwrap_or_else(|| ClosureBook::new(&state.allocations));
            let sheet: InvoiceSheet = state.invoice.as_ref().map_or_else(
                || InvoiceSheet::from_closure(&closure),
                |existing| existing.rebase(&closure),
            );
            new_state.closure = Some(closure);
            new_state.invoice = Some(sheet);
            new_state.bid.status = BidStatus::ReadyForInvoice;
            String::from("Closure complete")
        }
        Command::MoveBackToClosure => {
            state.bid.status.validate_transition(BidStatus::Closure)?;
            if state.invoice.is_some() {
                stale.push(Stage::Invoice);
            }
            new_state.bid.status = BidStatus::Closure;
            String::from("Invoice preparation reopened")
        }
        Command::SubmitInvoice => {
            state.bid.status.validate_transition(BidStatus::Completed)?;
            let closure: ClosureBook = state
                .closure
                .clone()
                .unwrap_or_else(|| ClosureBook::new(&state.allocations));
            let sheet: InvoiceSheet = state
                .invoice
                .clone()
                .unwrap_or_else(|| InvoiceSheet::from_closure(&closure));
            sheet.validate_before_submit()?;

            let summary: InvoiceSummary = InvoiceSummary::from_sheet(&state.bid, &sheet, &closure);
            if let Some(po_number) = sheet.po_number() {
                new_state.bid.po_number = Some(po_number.to_string());
            }
            new_state.bid.financials = summary.financials();
            new_state.bid.status = BidStatus::Completed;
            new_state.closure = Some(closure);
            new_state.invoice = Some(sheet);
            format!("Invoice submitted for {:.2}", summary.invoice_amount)
        }
    };

    new_state.stale_stages.extend(stale.iter().copied());

    let after: StateSnapshot = new_state.snapshot();
    let action: Action = Action::new(String::from(action_name), Some(details));
    let audit_event: AuditEvent = AuditEvent::new(
        state.bid.bid_number.clone(),
        actor,
        cause,
        action,
        before,
        after,
    );

    Ok(TransitionResult {
        new_state,
        audit_event,
        stale_stages: stale,
    })
}
