// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Field Allocation Engine.
//!
//! Final quotas placed with partners, keyed by (partner, audience, country,
//! LOI). Allocations are independent of commitments and have no
//! completeness gate.

use crate::error::DomainError;
use crate::partner_response::ResponseLedger;
use crate::types::{AudienceId, Bid, Country, Loi, PartnerId};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key of one allocation cell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AllocationKey {
    pub partner: PartnerId,
    pub audience: AudienceId,
    pub country: Country,
    pub loi: Loi,
}

impl AllocationKey {
    #[must_use]
    pub const fn new(partner: PartnerId, audience: AudienceId, country: Country, loi: Loi) -> Self {
        Self {
            partner,
            audience,
            country,
            loi,
        }
    }

    fn not_found(&self) -> DomainError {
        DomainError::AllocationNotFound {
            partner: self.partner.clone(),
            audience: self.audience,
            country: self.country.clone(),
            loi: self.loi,
        }
    }
}

impl std::fmt::Display for AllocationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / audience {} / {} / {}",
            self.partner, self.audience, self.country, self.loi
        )
    }
}

/// The figures shown for one allocation cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationCell {
    /// What the partner committed to during the response stage.
    pub commitment: u32,
    /// The CPI quoted with the commitment.
    pub cpi: Option<f64>,
    /// The final quota placed with the partner.
    pub allocation: u32,
}

/// Raw allocation input that could not be taken literally and was coerced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationCoercion {
    pub key: AllocationKey,
    pub raw: String,
    pub applied: u32,
}

impl std::fmt::Display for AllocationCoercion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "allocation input '{}' for {} was coerced to {}",
            self.raw, self.key, self.applied
        )
    }
}

/// Parses operator input leniently.
///
/// Empty input is zero. Fractions are truncated. Negative, non-numeric or
/// overflowing input becomes zero. Returns the value and whether the input
/// was coerced.
#[must_use]
pub fn parse_allocation(raw: &str) -> (u32, bool) {
    let trimmed: &str = raw.trim();
    if trimmed.is_empty() {
        return (0, false);
    }
    if let Ok(value) = trimmed.parse::<u32>() {
        return (value, false);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => (value.trunc().to_u32().unwrap_or(0), true),
        _ => (0, true),
    }
}

/// The allocation grid of one bid plus the edits not yet sent to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationBook {
    cells: BTreeMap<AllocationKey, AllocationCell>,
    pending: BTreeMap<AllocationKey, u32>,
}

impl AllocationBook {
    /// Builds the grid from field data. Nothing is pending afterwards.
    #[must_use]
    pub fn seed(cells: impl IntoIterator<Item = (AllocationKey, AllocationCell)>) -> Self {
        Self {
            cells: cells.into_iter().collect(),
            pending: BTreeMap::new(),
        }
    }

    /// Builds the grid from the submitted responses of the selected pairs.
    ///
    /// Allocations start at zero.
    #[must_use]
    pub fn from_responses(bid: &Bid, ledger: &ResponseLedger) -> Self {
        let mut cells: BTreeMap<AllocationKey, AllocationCell> = BTreeMap::new();
        for record in ledger
            .records()
            .filter(|r| bid.partners.contains(&r.partner) && bid.lois.contains(&r.loi))
        {
            for (audience, answer) in &record.audiences {
                for (country, response) in &answer.countries {
                    let key: AllocationKey = AllocationKey::new(
                        record.partner.clone(),
                        *audience,
                        country.clone(),
                        record.loi,
                    );
                    cells.insert(
                        key,
                        AllocationCell {
                            commitment: response.commitment,
                            cpi: response.cpi,
                            allocation: 0,
                        },
                    );
                }
            }
        }
        Self::seed(cells)
    }

    /// Sets the allocation of one cell and queues it for submission.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AllocationNotFound` if the key is not in the grid.
    pub fn set_allocation(&mut self, key: &AllocationKey, value: u32) -> Result<(), DomainError> {
        let cell: &mut AllocationCell = self.cells.get_mut(key).ok_or_else(|| key.not_found())?;
        cell.allocation = value;
        self.pending.insert(key.clone(), value);
        Ok(())
    }

    /// Sets an allocation from raw operator input.
    ///
    /// Returns the coercion applied, if any, so the caller can warn about it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AllocationNotFound` if the key is not in the grid.
    pub fn set_allocation_raw(
        &mut self,
        key: &AllocationKey,
        raw: &str,
    ) -> Result<Option<AllocationCoercion>, DomainError> {
        let (value, coerced) = parse_allocation(raw);
        self.set_allocation(key, value)?;
        Ok(coerced.then(|| AllocationCoercion {
            key: key.clone(),
            raw: raw.to_string(),
            applied: value,
        }))
    }

    #[must_use]
    pub fn allocation(&self, key: &AllocationKey) -> Option<u32> {
        self.cells.get(key).map(|cell| cell.allocation)
    }

    #[must_use]
    pub fn cell(&self, key: &AllocationKey) -> Option<&AllocationCell> {
        self.cells.get(key)
    }

    /// Iterates every cell in key order.
    pub fn cells(&self) -> impl Iterator<Item = (&AllocationKey, &AllocationCell)> {
        self.cells.iter()
    }

    /// Returns the edits not yet submitted.
    #[must_use]
    pub fn pending(&self) -> Vec<(AllocationKey, u32)> {
        self.pending
            .iter()
            .map(|(key, value)| (key.clone(), *value))
            .collect()
    }

    /// Removes and returns every pending edit.
    pub fn take_pending(&mut self) -> Vec<(AllocationKey, u32)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    /// Puts edits back in the queue after a failed submission.
    ///
    /// An edit made since the submission started wins over the restored one.
    pub fn restore_pending(&mut self, items: impl IntoIterator<Item = (AllocationKey, u32)>) {
        for (key, value) in items {
            self.pending.entry(key).or_insert(value);
        }
    }

    /// Cells allocated above their commitment. Informational only.
    #[must_use]
    pub fn over_committed(&self) -> Vec<AllocationKey> {
        self.cells
            .iter()
            .filter(|(_, cell)| cell.allocation > cell.commitment)
            .map(|(key, _)| key.clone())
            .collect()
    }

    #[must_use]
    pub fn total_allocation(&self) -> u64 {
        self.cells.values().map(|c| u64::from(c.allocation)).sum()
    }
}
