// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Sample Distribution Allocator.
//!
//! Splits each target audience's required sample size across the bid's
//! selected countries. The grid is edited freely and only written back to
//! the bid after every audience sums exactly to its required size.

use crate::error::DomainError;
use crate::types::{AudienceId, Bid, Country, TargetAudience};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An editable audience → country → sample grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDistribution {
    cells: BTreeMap<AudienceId, BTreeMap<Country, u32>>,
}

impl SampleDistribution {
    /// Creates a grid for a new bid with every cell at zero.
    #[must_use]
    pub fn empty(bid: &Bid) -> Self {
        let cells: BTreeMap<AudienceId, BTreeMap<Country, u32>> = bid
            .target_audiences
            .iter()
            .map(|audience| {
                let row: BTreeMap<Country, u32> =
                    bid.countries.iter().map(|c| (c.clone(), 0)).collect();
                (audience.id, row)
            })
            .collect();
        Self { cells }
    }

    /// Creates a grid pre-populated from the bid's stored `country_samples`.
    ///
    /// Countries that are no longer selected are dropped; newly selected
    /// countries start at zero.
    #[must_use]
    pub fn from_bid(bid: &Bid) -> Self {
        let mut grid: Self = Self::empty(bid);
        for audience in &bid.target_audiences {
            if let Some(row) = grid.cells.get_mut(&audience.id) {
                for (country, value) in row.iter_mut() {
                    if let Some(stored) = audience.country_samples.get(country) {
                        *value = *stored;
                    }
                }
            }
        }
        grid
    }

    /// Sets one cell.
    ///
    /// # Errors
    ///
    /// Returns an error if the audience or the country is not part of the grid.
    pub fn set(
        &mut self,
        audience: AudienceId,
        country: &Country,
        value: u32,
    ) -> Result<(), DomainError> {
        let row: &mut BTreeMap<Country, u32> = self
            .cells
            .get_mut(&audience)
            .ok_or(DomainError::AudienceNotFound(audience))?;
        let cell: &mut u32 = row
            .get_mut(country)
            .ok_or_else(|| DomainError::UnknownCountry {
                audience: audience.to_string(),
                country: country.clone(),
            })?;
        *cell = value;
        Ok(())
    }

    /// Returns one cell, if it exists.
    #[must_use]
    pub fn get(&self, audience: AudienceId, country: &Country) -> Option<u32> {
        self.cells
            .get(&audience)
            .and_then(|row| row.get(country))
            .copied()
    }

    /// Returns the distributed total of one audience.
    #[must_use]
    pub fn total(&self, audience: AudienceId) -> u64 {
        self.cells
            .get(&audience)
            .map_or(0, |row| row.values().map(|v| u64::from(*v)).sum())
    }

    /// Returns every audience whose total differs from its required size.
    #[must_use]
    pub fn mismatches(&self, bid: &Bid) -> Vec<DomainError> {
        bid.target_audiences
            .iter()
            .filter_map(|audience| self.check_audience(audience).err())
            .collect()
    }

    /// Validates the grid against the bid's audiences.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DistributionMismatch` for the first audience, in
    /// bid order, whose countries do not sum to its required sample size.
    pub fn validate(&self, bid: &Bid) -> Result<(), DomainError> {
        bid.target_audiences
            .iter()
            .try_for_each(|audience| self.check_audience(audience))
    }

    /// Validates the grid, then replaces every audience's `country_samples`.
    ///
    /// The bid is untouched when validation fails.
    ///
    /// # Errors
    ///
    /// Returns the validation error.
    pub fn apply_to(&self, bid: &mut Bid) -> Result<(), DomainError> {
        self.validate(bid)?;
        for audience in &mut bid.target_audiences {
            audience.country_samples = self.cells.get(&audience.id).cloned().unwrap_or_default();
        }
        Ok(())
    }

    fn check_audience(&self, audience: &TargetAudience) -> Result<(), DomainError> {
        let expected: u64 = u64::from(audience.sample_required);
        let actual: u64 = self.total(audience.id);
        if expected == actual {
            Ok(())
        } else {
            Err(DomainError::DistributionMismatch {
                audience: audience.name.clone(),
                expected,
                actual,
            })
        }
    }
}
