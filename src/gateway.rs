// 🌐 Remote Account Gateway - External account-management capability
// Two tenant-scoped operations: retrieve a connected account's state and
// update it. The concrete transport lives in `stripe.rs`; the engine only
// sees this trait, so tests can substitute a recording mock.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Metadata key recording the MCC value before the fix (`"n/a"` if absent)
pub const METADATA_OLD_VALUE: &str = "mcc_old_value";

/// Metadata key recording when the fix was applied (UTC, human-readable)
pub const METADATA_FIXED_AT: &str = "mcc_fixed_at";

// ============================================================================
// GATEWAY ERROR
// ============================================================================

/// Failure of a remote gateway call.
///
/// `Service` carries a message reported by the remote service itself;
/// `Unknown` is the catch-all for everything else (transport failures,
/// unparseable responses). The engine logs the two tiers differently but
/// classifies them identically.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("service error: {message}")]
    Service { message: String },

    #[error("unknown error: {0}")]
    Unknown(String),
}

// ============================================================================
// ACCOUNT STATE
// ============================================================================

/// Remote account state as observed through the gateway.
///
/// Only the fields the engine reads are modeled; `mcc` may be entirely
/// absent on the remote side.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedAccount {
    pub id: String,
    pub mcc: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// One atomic remote write: the corrected MCC plus provenance metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountUpdate {
    pub mcc: String,
    pub metadata: HashMap<String, String>,
}

// ============================================================================
// GATEWAY TRAIT
// ============================================================================

/// Tenant-scoped account operations.
///
/// The tenant scoping is the `api_key` argument: every call acts under one
/// platform's secret. Implementations pin a fixed protocol version for all
/// calls within a run.
#[async_trait]
pub trait AccountGateway: Send + Sync {
    /// Retrieve the current state of a connected account
    async fn retrieve_account(
        &self,
        api_key: &str,
        account_id: &str,
    ) -> Result<ConnectedAccount, GatewayError>;

    /// Apply an update to a connected account, returning the updated state
    async fn update_account(
        &self,
        api_key: &str,
        account_id: &str,
        update: AccountUpdate,
    ) -> Result<ConnectedAccount, GatewayError>;
}
