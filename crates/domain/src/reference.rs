// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Reference data a bid points at by identifier.

use crate::error::DomainError;
use crate::types::{Bid, PartnerId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesContact {
    pub id: i64,
    pub sales_person: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmContact {
    pub id: i64,
    pub vm_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub client_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    pub partner_name: String,
}

/// The lookup tables loaded before Basic Details can be edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub sales: Vec<SalesContact>,
    pub vms: Vec<VmContact>,
    pub clients: Vec<Client>,
    pub partners: Vec<Partner>,
}

impl ReferenceData {
    /// Returns the display name of a partner, falling back to its identifier.
    #[must_use]
    pub fn partner_name(&self, id: &PartnerId) -> String {
        self.partners
            .iter()
            .find(|p| &p.id == id)
            .map_or_else(|| id.value().to_string(), |p| p.partner_name.clone())
    }

    /// Checks that every foreign key on the bid resolves.
    ///
    /// Unset references are ignored here; `validate_basic_details` reports them.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownReference` for the first unresolved key.
    pub fn check_bid(&self, bid: &Bid) -> Result<(), DomainError> {
        if let Some(id) = bid.sales_contact
            && !self.sales.iter().any(|s| s.id == id)
        {
            return Err(DomainError::UnknownReference {
                kind: "sales contact",
                id: id.to_string(),
            });
        }
        if let Some(id) = bid.vm_contact
            && !self.vms.iter().any(|v| v.id == id)
        {
            return Err(DomainError::UnknownReference {
                kind: "VM contact",
                id: id.to_string(),
            });
        }
        if let Some(id) = bid.client
            && !self.clients.iter().any(|c| c.id == id)
        {
            return Err(DomainError::UnknownReference {
                kind: "client",
                id: id.to_string(),
            });
        }
        for partner in &bid.partners {
            if !self.partners.iter().any(|p| &p.id == partner) {
                return Err(DomainError::UnknownReference {
                    kind: "partner",
                    id: partner.value().to_string(),
                });
            }
        }
        Ok(())
    }
}
