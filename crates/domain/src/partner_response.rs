// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Partner Response Ledger.
//!
//! One `PartnerResponse` exists for every selected (partner, LOI) pair.
//! Each record holds, per audience, a timeline and per-country commitments
//! and CPIs. The ledger is the completeness gate for leaving
//! `partner_response`.

use crate::error::DomainError;
use crate::types::{AudienceId, Bid, Country, Loi, PartnerId, TargetAudience};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Currency assigned to partners that have no explicit setting.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Editing state of a single response record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Draft,
    Saved,
    Submitted,
}

impl ResponseStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Saved => "saved",
            Self::Submitted => "submitted",
        }
    }
}

impl FromStr for ResponseStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" | "pending" => Ok(Self::Draft),
            "saved" => Ok(Self::Saved),
            "submitted" => Ok(Self::Submitted),
            _ => Err(DomainError::InvalidResponseStatus(s.to_string())),
        }
    }
}

/// A partner's answer for one country of one audience.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryResponse {
    pub commitment: u32,
    #[serde(default)]
    pub cpi: Option<f64>,
}

impl CountryResponse {
    /// Returns true if both commitment and CPI are positive.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.commitment > 0 && self.cpi.is_some_and(|cpi| cpi.is_finite() && cpi > 0.0)
    }
}

/// A partner's answer for one audience.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudienceResponse {
    /// Field time in days.
    #[serde(default)]
    pub timeline: Option<u32>,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub countries: BTreeMap<Country, CountryResponse>,
}

/// Key of a response record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResponseKey {
    pub partner: PartnerId,
    pub loi: Loi,
}

impl ResponseKey {
    #[must_use]
    pub const fn new(partner: PartnerId, loi: Loi) -> Self {
        Self { partner, loi }
    }
}

impl std::fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.partner, self.loi)
    }
}

/// The response of one partner at one LOI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerResponse {
    pub partner: PartnerId,
    pub loi: Loi,
    pub currency: String,
    pub pmf: f64,
    pub status: ResponseStatus,
    #[serde(default)]
    pub audiences: BTreeMap<AudienceId, AudienceResponse>,
}

impl PartnerResponse {
    /// Creates a draft record whose commitments equal each audience's
    /// required country samples.
    #[must_use]
    pub fn seeded(
        partner: PartnerId,
        loi: Loi,
        settings: &PartnerSettings,
        audiences: &[TargetAudience],
    ) -> Self {
        let mut record: Self = Self {
            partner,
            loi,
            currency: settings.currency.clone(),
            pmf: settings.pmf,
            status: ResponseStatus::Draft,
            audiences: BTreeMap::new(),
        };
        record.align_to(audiences);
        record
    }

    #[must_use]
    pub fn key(&self) -> ResponseKey {
        ResponseKey::new(self.partner.clone(), self.loi)
    }

    /// Matches the record to the bid's current audience × country grid.
    ///
    /// New audiences and countries are seeded from the required samples,
    /// deselected ones are dropped. Answers for cells still in the grid
    /// are kept.
    fn align_to(&mut self, audiences: &[TargetAudience]) {
        self.audiences
            .retain(|id, _| audiences.iter().any(|audience| audience.id == *id));
        for audience in audiences {
            let entry: &mut AudienceResponse = self.audiences.entry(audience.id).or_default();
            entry
                .countries
                .retain(|country, _| audience.country_samples.contains_key(country));
            for (country, samples) in &audience.country_samples {
                entry
                    .countries
                    .entry(country.clone())
                    .or_insert(CountryResponse {
                        commitment: *samples,
                        cpi: None,
                    });
            }
        }
    }

    /// Returns the first gap that keeps this record from being complete.
    fn first_gap(&self, audiences: &[TargetAudience]) -> Option<DomainError> {
        let gap = |audience: Option<AudienceId>, country: Option<Country>, reason: &'static str| {
            DomainError::IncompleteResponse {
                partner: self.partner.clone(),
                loi: self.loi,
                audience,
                country,
                reason,
            }
        };

        for audience in audiences {
            let Some(answer) = self.audiences.get(&audience.id) else {
                return Some(gap(Some(audience.id), None, "audience not answered"));
            };
            for country in audience.country_samples.keys() {
                match answer.countries.get(country) {
                    None => {
                        return Some(gap(
                            Some(audience.id),
                            Some(country.clone()),
                            "country not answered",
                        ));
                    }
                    Some(cell) if cell.commitment == 0 => {
                        return Some(gap(
                            Some(audience.id),
                            Some(country.clone()),
                            "commitment must be greater than 0",
                        ));
                    }
                    Some(cell) if !cell.is_filled() => {
                        return Some(gap(
                            Some(audience.id),
                            Some(country.clone()),
                            "CPI must be greater than 0",
                        ));
                    }
                    Some(_) => {}
                }
            }
            if !answer.timeline.is_some_and(|days| days > 0) {
                return Some(gap(Some(audience.id), None, "timeline must be positive"));
            }
        }
        None
    }
}

/// Per-partner settings shared by every LOI record of that partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerSettings {
    pub currency: String,
    pub pmf: f64,
}

impl Default for PartnerSettings {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            pmf: 0.0,
        }
    }
}

/// A partial update to one country cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryPatch {
    #[serde(default)]
    pub commitment: Option<u32>,
    #[serde(default)]
    pub cpi: Option<f64>,
}

/// A partial update to one audience of a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudiencePatch {
    #[serde(default)]
    pub timeline: Option<u32>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub countries: BTreeMap<Country, CountryPatch>,
}

/// A partial update to one record. Only the fields present are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePatch {
    #[serde(default)]
    pub audiences: BTreeMap<AudienceId, AudiencePatch>,
}

impl ResponsePatch {
    /// Builds a patch touching a single country cell.
    #[must_use]
    pub fn cell(audience: AudienceId, country: Country, cell: CountryPatch) -> Self {
        let mut countries: BTreeMap<Country, CountryPatch> = BTreeMap::new();
        countries.insert(country, cell);
        let mut audiences: BTreeMap<AudienceId, AudiencePatch> = BTreeMap::new();
        audiences.insert(
            audience,
            AudiencePatch {
                countries,
                ..AudiencePatch::default()
            },
        );
        Self { audiences }
    }

    /// Builds a patch setting the timeline of one audience.
    #[must_use]
    pub fn timeline(audience: AudienceId, days: u32) -> Self {
        let mut audiences: BTreeMap<AudienceId, AudiencePatch> = BTreeMap::new();
        audiences.insert(
            audience,
            AudiencePatch {
                timeline: Some(days),
                ..AudiencePatch::default()
            },
        );
        Self { audiences }
    }
}

/// The set of partner responses of one bid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PartnerResponse>", into = "Vec<PartnerResponse>")]
pub struct ResponseLedger {
    records: BTreeMap<ResponseKey, PartnerResponse>,
}

impl From<Vec<PartnerResponse>> for ResponseLedger {
    fn from(records: Vec<PartnerResponse>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.key(), r)).collect(),
        }
    }
}

impl From<ResponseLedger> for Vec<PartnerResponse> {
    fn from(ledger: ResponseLedger) -> Self {
        ledger.records.into_values().collect()
    }
}

impl ResponseLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates draft records for every selected (partner, LOI) pair that has none.
    ///
    /// Existing draft records follow the bid's audiences and countries:
    /// added cells are seeded, deselected cells are removed, answers already
    /// entered elsewhere are kept. Returns the keys created.
    pub fn initialize(&mut self, bid: &Bid) -> Vec<ResponseKey> {
        let mut created: Vec<ResponseKey> = Vec::new();
        for partner in &bid.partners {
            let settings: PartnerSettings = self.settings_for(partner);
            for loi in &bid.lois {
                let key: ResponseKey = ResponseKey::new(partner.clone(), *loi);
                match self.records.get_mut(&key) {
                    Some(record) => {
                        if record.status != ResponseStatus::Submitted {
                            record.align_to(&bid.target_audiences);
                        }
                    }
                    None => {
                        let record: PartnerResponse = PartnerResponse::seeded(
                            partner.clone(),
                            *loi,
                            &settings,
                            &bid.target_audiences,
                        );
                        self.records.insert(key.clone(), record);
                        created.push(key);
                    }
                }
            }
        }
        created
    }

    /// Drops records whose partner or LOI is no longer selected.
    ///
    /// Returns the keys removed.
    pub fn prune(&mut self, bid: &Bid) -> Vec<ResponseKey> {
        let stale: Vec<ResponseKey> = self
            .records
            .keys()
            .filter(|key| !bid.partners.contains(&key.partner) || !bid.lois.contains(&key.loi))
            .cloned()
            .collect();
        for key in &stale {
            self.records.remove(key);
        }
        stale
    }

    /// Merges a partial update into one record.
    ///
    /// Sibling fields the patch does not name are preserved. The whole patch
    /// is checked before anything is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist, is already submitted,
    /// names an unknown audience or country, or carries a negative CPI.
    pub fn update(
        &mut self,
        partner: &PartnerId,
        loi: Loi,
        patch: &ResponsePatch,
    ) -> Result<(), DomainError> {
        let record: &mut PartnerResponse = self.editable_record(partner, loi)?;

        for (audience_id, audience_patch) in &patch.audiences {
            let answer: &AudienceResponse = record
                .audiences
                .get(audience_id)
                .ok_or(DomainError::AudienceNotFound(*audience_id))?;
            for (country, cell) in &audience_patch.countries {
                if !answer.countries.contains_key(country) {
                    return Err(DomainError::UnknownCountry {
                        audience: audience_id.to_string(),
                        country: country.clone(),
                    });
                }
                if let Some(cpi) = cell.cpi
                    && !(cpi.is_finite() && cpi >= 0.0)
                {
                    return Err(DomainError::InvalidCpi {
                        value: cpi.to_string(),
                    });
                }
            }
        }

        for (audience_id, audience_patch) in &patch.audiences {
            let Some(answer) = record.audiences.get_mut(audience_id) else {
                continue;
            };
            if let Some(days) = audience_patch.timeline {
                answer.timeline = Some(days);
            }
            if let Some(comments) = &audience_patch.comments {
                answer.comments.clone_from(comments);
            }
            for (country, cell_patch) in &audience_patch.countries {
                if let Some(cell) = answer.countries.get_mut(country) {
                    if let Some(commitment) = cell_patch.commitment {
                        cell.commitment = commitment;
                    }
                    if let Some(cpi) = cell_patch.cpi {
                        cell.cpi = Some(cpi);
                    }
                }
            }
        }
        Ok(())
    }

    /// Marks one record as saved without submitting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist or is already submitted.
    pub fn save(&mut self, partner: &PartnerId, loi: Loi) -> Result<&PartnerResponse, DomainError> {
        let record: &mut PartnerResponse = self.editable_record(partner, loi)?;
        record.status = ResponseStatus::Saved;
        Ok(record)
    }

    /// Applies currency and PMF to every LOI record of a partner.
    ///
    /// Returns the number of records updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the PMF is negative or not a number, or if any
    /// record of the partner is already submitted.
    pub fn set_partner_settings(
        &mut self,
        partner: &PartnerId,
        settings: &PartnerSettings,
    ) -> Result<usize, DomainError> {
        if !(settings.pmf.is_finite() && settings.pmf >= 0.0) {
            return Err(DomainError::InvalidPmf {
                value: settings.pmf.to_string(),
            });
        }
        if let Some(submitted) = self
            .records
            .values()
            .find(|r| &r.partner == partner && r.status == ResponseStatus::Submitted)
        {
            return Err(DomainError::ResponseAlreadySubmitted {
                partner: partner.clone(),
                loi: submitted.loi,
            });
        }

        let mut updated: usize = 0;
        for record in self.records.values_mut().filter(|r| &r.partner == partner) {
            record.currency.clone_from(&settings.currency);
            record.pmf = settings.pmf;
            updated += 1;
        }
        Ok(updated)
    }

    /// Returns the settings currently applied to a partner's records.
    #[must_use]
    pub fn settings_for(&self, partner: &PartnerId) -> PartnerSettings {
        self.records
            .values()
            .find(|r| &r.partner == partner)
            .map_or_else(PartnerSettings::default, |r| PartnerSettings {
                currency: r.currency.clone(),
                pmf: r.pmf,
            })
    }

    /// Returns true iff every partner × LOI × audience × country is filled
    /// and every audience has a positive timeline.
    #[must_use]
    pub fn is_complete(&self, bid: &Bid) -> bool {
        self.first_incomplete(bid).is_none()
    }

    /// Returns the first gap found, walking partners, LOIs, audiences and
    /// countries in bid order.
    #[must_use]
    pub fn first_incomplete(&self, bid: &Bid) -> Option<DomainError> {
        for partner in &bid.partners {
            for loi in &bid.lois {
                let key: ResponseKey = ResponseKey::new(partner.clone(), *loi);
                let Some(record) = self.records.get(&key) else {
                    return Some(DomainError::IncompleteResponse {
                        partner: partner.clone(),
                        loi: *loi,
                        audience: None,
                        country: None,
                        reason: "no response recorded",
                    });
                };
                if let Some(gap) = record.first_gap(&bid.target_audiences) {
                    return Some(gap);
                }
            }
        }
        None
    }

    /// Returns the records to send to the store, each marked submitted.
    ///
    /// The ledger itself is unchanged until `mark_submitted` is called after
    /// the store accepted the batch.
    ///
    /// # Errors
    ///
    /// Returns the first completeness gap.
    pub fn prepare_submission(&self, bid: &Bid) -> Result<Vec<PartnerResponse>, DomainError> {
        if let Some(gap) = self.first_incomplete(bid) {
            return Err(gap);
        }
        Ok(self
            .selected(bid)
            .map(|record| {
                let mut submitted: PartnerResponse = record.clone();
                submitted.status = ResponseStatus::Submitted;
                submitted
            })
            .collect())
    }

    /// Marks every selected record submitted.
    pub fn mark_submitted(&mut self, bid: &Bid) {
        for record in self.records.values_mut() {
            if bid.partners.contains(&record.partner) && bid.lois.contains(&record.loi) {
                record.status = ResponseStatus::Submitted;
            }
        }
    }

    /// Inserts or replaces a record as a whole.
    pub fn insert(&mut self, record: PartnerResponse) {
        self.records.insert(record.key(), record);
    }

    #[must_use]
    pub fn get(&self, partner: &PartnerId, loi: Loi) -> Option<&PartnerResponse> {
        self.records.get(&ResponseKey::new(partner.clone(), loi))
    }

    /// Iterates every record in key order.
    pub fn records(&self) -> impl Iterator<Item = &PartnerResponse> {
        self.records.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn selected<'a>(&'a self, bid: &'a Bid) -> impl Iterator<Item = &'a PartnerResponse> + 'a {
        self.records
            .values()
            .filter(|r| bid.partners.contains(&r.partner) && bid.lois.contains(&r.loi))
    }

    fn editable_record(
        &mut self,
        partner: &PartnerId,
        loi: Loi,
    ) -> Result<&mut PartnerResponse, DomainError> {
        let record: &mut PartnerResponse = self
            .records
            .get_mut(&ResponseKey::new(partner.clone(), loi))
            .ok_or_else(|| DomainError::ResponseNotFound {
                partner: partner.clone(),
                loi,
            })?;
        if record.status == ResponseStatus::Submitted {
            return Err(DomainError::ResponseAlreadySubmitted {
                partner: partner.clone(),
                loi,
            });
        }
        Ok(record)
    }
}
