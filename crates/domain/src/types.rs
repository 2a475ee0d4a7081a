// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::bid_status::BidStatus;
use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use time::Date;

/// The durable identifier the data store assigns to a persisted bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BidId(pub i64);

impl std::fmt::Display for BidId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The human-facing, sequentially issued bid number (e.g. `"40000"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BidNumber(String);

impl BidNumber {
    /// Creates a new `BidNumber`.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_string())
    }

    /// Returns the bid number value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }

    /// Returns the numeric value if the bid number is purely numeric.
    #[must_use]
    pub fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl std::fmt::Display for BidNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a panel partner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartnerId(String);

impl PartnerId {
    /// Creates a new `PartnerId`.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_string())
    }

    /// Returns the identifier value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PartnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a target audience within a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudienceId(pub i64);

impl std::fmt::Display for AudienceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A country name as selected on the bid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Country(String);

impl Country {
    /// Creates a new `Country`.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_string())
    }

    /// Returns the country name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Country {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Length of interview, in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Loi(u16);

impl Loi {
    /// Creates a new `Loi`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidLoi` if `minutes` is zero.
    pub const fn new(minutes: u16) -> Result<Self, DomainError> {
        if minutes == 0 {
            return Err(DomainError::InvalidLoi(minutes));
        }
        Ok(Self(minutes))
    }

    /// Returns the LOI in minutes.
    #[must_use]
    pub const fn minutes(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Loi {
    type Error = DomainError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Loi> for u16 {
    fn from(loi: Loi) -> Self {
        loi.0
    }
}

impl std::fmt::Display for Loi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} min LOI", self.0)
    }
}

/// Research methodology of a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Methodology {
    #[serde(rename = "quant")]
    Quantitative,
    #[serde(rename = "qual")]
    Qualitative,
    #[serde(rename = "both")]
    Both,
}

impl Methodology {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Quantitative => "quant",
            Self::Qualitative => "qual",
            Self::Both => "both",
        }
    }
}

impl FromStr for Methodology {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quant" | "quantitative" => Ok(Self::Quantitative),
            "qual" | "qualitative" => Ok(Self::Qualitative),
            "both" => Ok(Self::Both),
            _ => Err(DomainError::InvalidMethodology(s.to_string())),
        }
    }
}

/// How interviews for an audience are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryMode {
    Online,
    Offline,
    Both,
}

impl FromStr for DeliveryMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "both" => Ok(Self::Both),
            _ => Err(DomainError::InvalidDeliveryMode(s.to_string())),
        }
    }
}

/// A target audience owned by a bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetAudience {
    pub id: AudienceId,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub broader_category: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub mode: Option<DeliveryMode>,
    pub sample_required: u32,
    pub incidence_rate: u8,
    #[serde(default)]
    pub comments: String,
    /// Required samples per country. Only the Sample Distribution Allocator writes this.
    #[serde(default)]
    pub country_samples: BTreeMap<Country, u32>,
}

impl TargetAudience {
    /// Creates an empty audience with the default `"Audience - N"` name.
    #[must_use]
    pub fn numbered(id: AudienceId, ordinal: usize) -> Self {
        Self {
            id,
            name: format!("Audience - {ordinal}"),
            category: String::new(),
            broader_category: String::new(),
            definition: String::new(),
            mode: None,
            sample_required: 0,
            incidence_rate: 0,
            comments: String::new(),
            country_samples: BTreeMap::new(),
        }
    }

    /// Returns the sum of the per-country samples.
    #[must_use]
    pub fn distributed_total(&self) -> u64 {
        self.country_samples.values().map(|v| u64::from(*v)).sum()
    }
}

/// Delivery and financial figures attached to a bid once it has been fielded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    #[serde(default)]
    pub total_delivered: Option<u64>,
    #[serde(default)]
    pub quality_rejects: Option<u64>,
    #[serde(default)]
    pub avg_loi: Option<f64>,
    #[serde(default)]
    pub avg_ir: Option<f64>,
    #[serde(default)]
    pub invoice_amount: Option<f64>,
}

/// A bid and the target audiences it exclusively owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    /// `None` until the data store has persisted the bid.
    #[serde(default)]
    pub id: Option<BidId>,
    pub bid_number: BidNumber,
    #[serde(with = "crate::iso_date")]
    pub bid_date: Date,
    #[serde(default)]
    pub study_name: String,
    #[serde(default)]
    pub methodology: Option<Methodology>,
    #[serde(default)]
    pub sales_contact: Option<i64>,
    #[serde(default)]
    pub vm_contact: Option<i64>,
    #[serde(default)]
    pub client: Option<i64>,
    #[serde(default)]
    pub project_requirement: String,
    #[serde(default)]
    pub partners: Vec<PartnerId>,
    #[serde(default, rename = "loi")]
    pub lois: Vec<Loi>,
    #[serde(default)]
    pub countries: Vec<Country>,
    pub target_audiences: Vec<TargetAudience>,
    pub status: BidStatus,
    #[serde(default)]
    pub po_number: Option<String>,
    #[serde(default)]
    pub financials: FinancialSummary,
    /// Concurrency token echoed back to the store on update.
    #[serde(default)]
    pub revision: Option<i64>,
}

impl Bid {
    /// Creates a new draft bid with a single default audience.
    #[must_use]
    pub fn new(bid_number: BidNumber, bid_date: Date) -> Self {
        Self {
            id: None,
            bid_number,
            bid_date,
            study_name: String::new(),
            methodology: None,
            sales_contact: None,
            vm_contact: None,
            client: None,
            project_requirement: String::new(),
            partners: Vec::new(),
            lois: Vec::new(),
            countries: Vec::new(),
            target_audiences: vec![TargetAudience::numbered(AudienceId(1), 1)],
            status: BidStatus::Draft,
            po_number: None,
            financials: FinancialSummary::default(),
            revision: None,
        }
    }

    /// Returns whether basic details may still be edited.
    ///
    /// Details are editable in draft, and in `partner_response` when the
    /// operator goes back to amend them before responses are submitted.
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(self.status, BidStatus::Draft | BidStatus::PartnerResponse)
    }

    /// Fails with `DomainError::BidLocked` if details can no longer be edited.
    ///
    /// # Errors
    ///
    /// Returns an error if the bid has left the editable statuses.
    pub fn ensure_editable(&self) -> Result<(), DomainError> {
        if self.is_editable() {
            Ok(())
        } else {
            Err(DomainError::BidLocked {
                status: self.status.as_str().to_string(),
            })
        }
    }

    /// Appends a new auto-numbered audience and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the bid is no longer editable.
    pub fn add_audience(&mut self) -> Result<AudienceId, DomainError> {
        self.ensure_editable()?;
        let next_id: i64 = self
            .target_audiences
            .iter()
            .map(|a| a.id.0)
            .max()
            .unwrap_or(0)
            + 1;
        let id: AudienceId = AudienceId(next_id);
        let ordinal: usize = self.target_audiences.len() + 1;
        self.target_audiences
            .push(TargetAudience::numbered(id, ordinal));
        Ok(id)
    }

    /// Removes an audience. The last audience can never be removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the bid is locked, the audience is unknown,
    /// or it is the only audience left.
    pub fn remove_audience(&mut self, id: AudienceId) -> Result<TargetAudience, DomainError> {
        self.ensure_editable()?;
        let index: usize = self
            .target_audiences
            .iter()
            .position(|a| a.id == id)
            .ok_or(DomainError::AudienceNotFound(id))?;
        if self.target_audiences.len() == 1 {
            return Err(DomainError::NoTargetAudience);
        }
        Ok(self.target_audiences.remove(index))
    }

    /// Looks up an audience by identifier.
    #[must_use]
    pub fn audience(&self, id: AudienceId) -> Option<&TargetAudience> {
        self.target_audiences.iter().find(|a| a.id == id)
    }

    /// Mutable lookup of an audience by identifier.
    pub fn audience_mut(&mut self, id: AudienceId) -> Option<&mut TargetAudience> {
        self.target_audiences.iter_mut().find(|a| a.id == id)
    }

    /// Replaces the partner selection, keeping first-seen order and dropping duplicates.
    pub fn select_partners(&mut self, partners: impl IntoIterator<Item = PartnerId>) {
        self.partners = dedup_ordered(partners);
    }

    /// Replaces the LOI selection, keeping first-seen order and dropping duplicates.
    pub fn select_lois(&mut self, lois: impl IntoIterator<Item = Loi>) {
        self.lois = dedup_ordered(lois);
    }

    /// Replaces the country selection, keeping first-seen order and dropping duplicates.
    pub fn select_countries(&mut self, countries: impl IntoIterator<Item = Country>) {
        self.countries = dedup_ordered(countries);
    }

    /// Returns whether a country is part of the selection.
    #[must_use]
    pub fn has_country(&self, country: &Country) -> bool {
        self.countries.contains(country)
    }
}

fn dedup_ordered<T: Ord + Clone>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen: BTreeSet<T> = BTreeSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Rounds a currency amount to cents for presentation.
#[must_use]
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
