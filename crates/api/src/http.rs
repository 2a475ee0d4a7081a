// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! `BidStore` over an authenticated JSON REST API.

use async_trait::async_trait;
use bidflow_domain::{
    AllocationKey, Bid, BidId, BidNumber, BidStatus, Client, InvoiceLine, Loi, Partner,
    PartnerId, PartnerResponse, SalesContact, VmContact,
};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::request_response::{
    AllocationUpdate, BidSummary, ClosureData, FieldData, InvoiceData, InvoiceLineData,
    NextBidNumberResponse, PartnerResponsesPayload, StatusChangeRequest,
};
use crate::store::BidStore;

/// Error body returned by the store on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the bid data store.
#[derive(Debug, Clone)]
pub struct HttpBidStore {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBidStore {
    /// Creates a store client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client: reqwest::Client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let response: Response = self.execute(Method::GET, endpoint, None).await?;
        decode(response, endpoint).await
    }

    async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response: Response = self.execute(method, endpoint, Some(encode(body)?)).await?;
        decode(response, endpoint).await
    }

    async fn send_unit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        self.execute(method, endpoint, Some(encode(body)?)).await?;
        Ok(())
    }

    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response, ApiError> {
        let url: String = self.config.url(endpoint);
        debug!(%method, %url, "Sending store request");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("Accept", "application/json");
        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response: Response = request.send().await.map_err(|e| {
            error!(%method, %url, error = %e, "Store request failed");
            ApiError::Transport(e.to_string())
        })?;

        let status: StatusCode = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text: String = response.text().await.unwrap_or_default();
        let message: String = error_message(status, &text);
        error!(%method, %url, status = status.as_u16(), %message, "Store rejected request");

        if status == StatusCode::CONFLICT {
            return Err(ApiError::Conflict { message });
        }
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body)
        .map_err(|e| ApiError::Transport(format!("failed to encode request body: {e}")))
}

async fn decode<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T, ApiError> {
    response.json::<T>().await.map_err(|e| {
        error!(endpoint, error = %e, "Failed to decode store response");
        ApiError::Decode(e.to_string())
    })
}

/// Picks the most useful message out of an error response.
fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error
        .or(parsed.message)
        .filter(|m| !m.trim().is_empty())
        .or_else(|| {
            let trimmed: &str = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        })
}

fn require_id(bid: &Bid) -> Result<BidId, ApiError> {
    bid.id.ok_or_else(|| {
        ApiError::Precondition(format!(
            "Bid {} has not been created in the store yet",
            bid.bid_number
        ))
    })
}

#[async_trait]
impl BidStore for HttpBidStore {
    async fn next_bid_number(&self) -> Result<BidNumber, ApiError> {
        let response: NextBidNumberResponse = self.get("bids/next-number").await?;
        Ok(response.bid_number)
    }

    async fn sales_contacts(&self) -> Result<Vec<SalesContact>, ApiError> {
        self.get("sales").await
    }

    async fn vm_contacts(&self) -> Result<Vec<VmContact>, ApiError> {
        self.get("vms").await
    }

    async fn clients(&self) -> Result<Vec<Client>, ApiError> {
        self.get("clients").await
    }

    async fn partners(&self) -> Result<Vec<Partner>, ApiError> {
        self.get("partners").await
    }

    async fn create_bid(&self, bid: &Bid) -> Result<Bid, ApiError> {
        self.send(Method::POST, "bids", bid).await
    }

    async fn update_bid(&self, bid: &Bid) -> Result<Bid, ApiError> {
        let id: BidId = require_id(bid)?;
        self.send(Method::PUT, &format!("bids/{id}"), bid).await
    }

    async fn get_bid(&self, id: BidId) -> Result<Bid, ApiError> {
        self.get(&format!("bids/{id}")).await
    }

    async fn set_status(
        &self,
        id: BidId,
        status: BidStatus,
        po_number: Option<&str>,
    ) -> Result<(), ApiError> {
        let body: StatusChangeRequest = StatusChangeRequest {
            status,
            po_number: po_number.map(str::to_string),
        };
        self.send_unit(Method::POST, &format!("bids/{id}/status"), &body)
            .await
    }

    async fn list_bids(&self, status: BidStatus) -> Result<Vec<BidSummary>, ApiError> {
        self.get(&format!("bids?status={}", status.as_str())).await
    }

    async fn field_data(&self, id: BidId) -> Result<FieldData, ApiError> {
        self.get(&format!("bids/{id}/field-data")).await
    }

    async fn partner_responses(&self, id: BidId) -> Result<Vec<PartnerResponse>, ApiError> {
        let payload: PartnerResponsesPayload =
            self.get(&format!("bids/{id}/partner-responses")).await?;
        Ok(payload.responses)
    }

    async fn put_partner_responses(
        &self,
        id: BidId,
        responses: &[PartnerResponse],
    ) -> Result<(), ApiError> {
        let body: PartnerResponsesPayload = PartnerResponsesPayload {
            responses: responses.to_vec(),
        };
        self.send_unit(Method::PUT, &format!("bids/{id}/partner-responses"), &body)
            .await
    }

    async fn put_allocation(
        &self,
        id: BidId,
        key: &AllocationKey,
        allocation: u32,
    ) -> Result<(), ApiError> {
        let body: AllocationUpdate = AllocationUpdate::new(key, allocation);
        self.send_unit(Method::POST, &format!("bids/{id}/field-allocations"), &body)
            .await
    }

    async fn closure(&self, id: BidId) -> Result<ClosureData, ApiError> {
        self.get(&format!("bids/{id}/closure")).await
    }

    async fn save_closure(&self, id: BidId, data: &ClosureData) -> Result<(), ApiError> {
        self.send_unit(Method::PUT, &format!("bids/{id}/closure"), data)
            .await
    }

    async fn invoice(&self, id: BidId) -> Result<InvoiceData, ApiError> {
        self.get(&format!("invoice/{id}/partner-data")).await
    }

    async fn partner_deliverables(
        &self,
        id: BidId,
        partner: &PartnerId,
        loi: Loi,
    ) -> Result<Vec<InvoiceLine>, ApiError> {
        let lines: Vec<InvoiceLineData> = self
            .get(&format!("invoice/{id}/{partner}/{}/details", loi.minutes()))
            .await?;
        Ok(lines.into_iter().map(InvoiceLineData::into_line).collect())
    }

    async fn save_invoice(&self, id: BidId, data: &InvoiceData) -> Result<(), ApiError> {
        self.send_unit(Method::POST, &format!("invoice/{id}/save"), data)
            .await
    }

    async fn submit_invoice(&self, id: BidId, data: &InvoiceData) -> Result<(), ApiError> {
        self.send_unit(Method::POST, &format!("invoice/{id}/submit"), data)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::error_message;
    use reqwest::StatusCode;

    #[test]
    fn test_error_message_prefers_error_field() {
        let message: String = error_message(
            StatusCode::BAD_REQUEST,
            r#"{"error": "Bid not found", "message": "ignored"}"#,
        );
        assert_eq!(message, "Bid not found");
    }

    #[test]
    fn test_error_message_falls_back_to_body_then_reason() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
    }
}
