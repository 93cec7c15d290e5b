// 💳 Stripe Gateway - Accounts API over HTTPS
// Concrete `AccountGateway` against the Stripe Accounts API. Every call is
// pinned to one API version and scoped by the caller's platform secret.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;

use crate::gateway::{AccountGateway, AccountUpdate, ConnectedAccount, GatewayError};

/// API version pinned for every call within a run
pub const STRIPE_API_VERSION: &str = "2022-08-01";

const DEFAULT_API_BASE: &str = "https://api.stripe.com";

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct AccountResponse {
    id: String,
    #[serde(default)]
    business_profile: Option<BusinessProfile>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct BusinessProfile {
    #[serde(default)]
    mcc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl From<AccountResponse> for ConnectedAccount {
    fn from(resp: AccountResponse) -> Self {
        ConnectedAccount {
            id: resp.id,
            mcc: resp.business_profile.and_then(|p| p.mcc),
            metadata: resp.metadata,
        }
    }
}

// ============================================================================
// GATEWAY
// ============================================================================

/// Stripe-backed account gateway
#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
}

impl StripeGateway {
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    /// Override the API base URL (used by tests against a local server)
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        StripeGateway {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn account_url(&self, account_id: &str) -> String {
        format!("{}/v1/accounts/{}", self.api_base, account_id)
    }

    /// Decode a response body into account state, or classify the failure.
    ///
    /// A non-2xx response carrying Stripe's `{"error": {"message": ...}}`
    /// envelope becomes `Service`; anything else becomes `Unknown`.
    async fn decode_response(
        response: reqwest::Response,
    ) -> Result<ConnectedAccount, GatewayError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Unknown(e.to_string()))?;

        if status.is_success() {
            let account: AccountResponse = serde_json::from_str(&body)
                .map_err(|e| GatewayError::Unknown(format!("malformed account response: {}", e)))?;
            return Ok(account.into());
        }

        Err(classify_error(status, &body))
    }
}

impl Default for StripeGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_error(status: StatusCode, body: &str) -> GatewayError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => GatewayError::Service {
            message: envelope
                .error
                .message
                .unwrap_or_else(|| format!("HTTP {}", status)),
        },
        Err(_) => GatewayError::Unknown(format!("HTTP {}", status)),
    }
}

#[async_trait]
impl AccountGateway for StripeGateway {
    async fn retrieve_account(
        &self,
        api_key: &str,
        account_id: &str,
    ) -> Result<ConnectedAccount, GatewayError> {
        let response = self
            .client
            .get(self.account_url(account_id))
            .bearer_auth(api_key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .send()
            .await
            .map_err(|e| GatewayError::Unknown(e.to_string()))?;

        Self::decode_response(response).await
    }

    async fn update_account(
        &self,
        api_key: &str,
        account_id: &str,
        update: AccountUpdate,
    ) -> Result<ConnectedAccount, GatewayError> {
        // Stripe takes nested fields as form-encoded bracket paths
        let mut form: Vec<(String, String)> =
            vec![("business_profile[mcc]".to_string(), update.mcc)];
        for (key, value) in update.metadata {
            form.push((format!("metadata[{}]", key), value));
        }

        let response = self
            .client
            .post(self.account_url(account_id))
            .bearer_auth(api_key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Unknown(e.to_string()))?;

        Self::decode_response(response).await
    }
}
