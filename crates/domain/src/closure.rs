// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Closure data: field-close dates, delivery metrics, partner quality
//! ratings and delivered counts.

use crate::allocation::{AllocationBook, AllocationCell, AllocationKey};
use crate::error::DomainError;
use crate::types::{AudienceId, Country, Loi, PartnerId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use time::Date;

/// Audience-level delivery metrics captured at field close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryMetrics {
    #[serde(default)]
    pub ir: Option<f64>,
    #[serde(default)]
    pub drop_rate: Option<f64>,
    #[serde(default)]
    pub incidence_rate: Option<f64>,
    #[serde(default)]
    pub loi: Option<f64>,
}

/// Key of the per-partner closure metrics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartnerAudienceKey {
    pub partner: PartnerId,
    pub loi: Loi,
    pub audience: AudienceId,
}

/// How a partner actually performed on one audience at one LOI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartnerMetrics {
    #[serde(default)]
    pub final_loi: Option<f64>,
    #[serde(default)]
    pub final_ir: Option<f64>,
    #[serde(default)]
    pub final_timeline: Option<u32>,
    #[serde(default)]
    pub quality_rejects: u32,
    #[serde(default)]
    pub communication: Option<u8>,
    #[serde(default)]
    pub engagement: Option<u8>,
    #[serde(default)]
    pub problem_solving: Option<u8>,
    #[serde(default)]
    pub additional_feedback: String,
}

/// The derived closure view of one audience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureRecord {
    pub audience: AudienceId,
    #[serde(default, with = "crate::iso_date::option")]
    pub field_close_date: Option<Date>,
    pub metrics: DeliveryMetrics,
    /// Delivered counts summed over partners and LOIs.
    pub delivered: BTreeMap<Country, u64>,
}

/// Closure data of one bid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClosureBook {
    allocated: BTreeMap<AllocationKey, AllocationCell>,
    field_close: BTreeMap<AudienceId, Date>,
    delivery: BTreeMap<AudienceId, DeliveryMetrics>,
    partner_metrics: BTreeMap<PartnerAudienceKey, PartnerMetrics>,
    delivered: BTreeMap<AllocationKey, u32>,
}

impl ClosureBook {
    /// Starts a closure book from the allocations in force.
    ///
    /// Only cells with a positive allocation can receive deliveries.
    #[must_use]
    pub fn new(allocations: &AllocationBook) -> Self {
        let allocated: BTreeMap<AllocationKey, AllocationCell> = allocations
            .cells()
            .filter(|(_, cell)| cell.allocation > 0)
            .map(|(key, cell)| (key.clone(), *cell))
            .collect();
        Self {
            allocated,
            ..Self::default()
        }
    }

    /// Rebuilds the book on a new set of allocations.
    ///
    /// Audience data is kept. Delivered counts are kept for cells that are
    /// still allocated and dropped for the rest.
    #[must_use]
    pub fn rebase(&self, allocations: &AllocationBook) -> Self {
        let mut rebased: Self = Self::new(allocations);
        rebased.field_close.clone_from(&self.field_close);
        rebased.delivery.clone_from(&self.delivery);
        rebased.partner_metrics.clone_from(&self.partner_metrics);
        rebased.delivered = self
            .delivered
            .iter()
            .filter(|(key, _)| rebased.allocated.contains_key(*key))
            .map(|(key, value)| (key.clone(), *value))
            .collect();
        rebased
    }

    pub fn set_field_close(&mut self, audience: AudienceId, date: Date) {
        self.field_close.insert(audience, date);
    }

    pub fn set_delivery_metrics(&mut self, audience: AudienceId, metrics: DeliveryMetrics) {
        self.delivery.insert(audience, metrics);
    }

    pub fn set_partner_metrics(&mut self, key: PartnerAudienceKey, metrics: PartnerMetrics) {
        self.partner_metrics.insert(key, metrics);
    }

    /// Records the delivered count of one allocation cell.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DeliveryWithoutAllocation` if nothing was
    /// allocated for the key.
    pub fn set_delivered(&mut self, key: &AllocationKey, delivered: u32) -> Result<(), DomainError> {
        if !self.allocated.contains_key(key) {
            return Err(DomainError::DeliveryWithoutAllocation {
                partner: key.partner.clone(),
                audience: key.audience,
                country: key.country.clone(),
                loi: key.loi,
            });
        }
        self.delivered.insert(key.clone(), delivered);
        Ok(())
    }

    #[must_use]
    pub fn delivered(&self, key: &AllocationKey) -> u32 {
        self.delivered.get(key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn field_close(&self, audience: AudienceId) -> Option<Date> {
        self.field_close.get(&audience).copied()
    }

    #[must_use]
    pub fn partner_metrics(&self, key: &PartnerAudienceKey) -> Option<&PartnerMetrics> {
        self.partner_metrics.get(key)
    }

    /// Iterates the per-partner metrics in key order.
    pub fn all_partner_metrics(&self) -> impl Iterator<Item = (&PartnerAudienceKey, &PartnerMetrics)> {
        self.partner_metrics.iter()
    }

    /// Iterates every allocated cell with its delivered count.
    pub fn deliverables(&self) -> impl Iterator<Item = (&AllocationKey, &AllocationCell, u32)> {
        self.allocated
            .iter()
            .map(|(key, cell)| (key, cell, self.delivered(key)))
    }

    /// Builds the per-audience closure records.
    #[must_use]
    pub fn records(&self) -> Vec<ClosureRecord> {
        let audiences: BTreeSet<AudienceId> = self
            .allocated
            .keys()
            .map(|k| k.audience)
            .chain(self.field_close.keys().copied())
            .chain(self.delivery.keys().copied())
            .collect();

        audiences
            .into_iter()
            .map(|audience| {
                let mut delivered: BTreeMap<Country, u64> = BTreeMap::new();
                for (key, _) in self.allocated.iter().filter(|(k, _)| k.audience == audience) {
                    *delivered.entry(key.country.clone()).or_insert(0) +=
                        u64::from(self.delivered(key));
                }
                ClosureRecord {
                    audience,
                    field_close_date: self.field_close(audience),
                    metrics: self.delivery.get(&audience).copied().unwrap_or_default(),
                    delivered,
                }
            })
            .collect()
    }

    /// Sum of every delivered count.
    #[must_use]
    pub fn delivered_total(&self) -> u64 {
        self.delivered.values().map(|v| u64::from(*v)).sum()
    }

    /// Sum of the quality rejects reported for every partner.
    #[must_use]
    pub fn quality_rejects_total(&self) -> u64 {
        self.partner_metrics
            .values()
            .map(|m| u64::from(m.quality_rejects))
            .sum()
    }
}
