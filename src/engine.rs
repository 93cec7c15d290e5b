// 🔧 MCC Remediation Engine - Per-record fix state machine
// Resolves the tenant's API key, inspects the connected account's current
// MCC, updates it when it differs from the expected value, and classifies
// the result. Linear flow, four failure-free exits, no loops, no retries.
//
// Every path logs with the platform and connected account ids so a run can
// be audited line-by-line against the result file.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::credentials::ApiKeyStore;
use crate::gateway::{
    AccountGateway, AccountUpdate, GatewayError, METADATA_FIXED_AT, METADATA_OLD_VALUE,
};

/// The MCC every connected account in the batch is expected to carry
pub const EXPECTED_MCC: &str = "7512";

/// Sentinel recorded as the old value when the account had no MCC at all
const NO_PREVIOUS_MCC: &str = "n/a";

// ============================================================================
// OUTCOME
// ============================================================================

/// Classification of one processed record.
///
/// Closed set - adding a case means updating every consumer (logging,
/// aggregation, output encoding), which is the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FixOutcome {
    /// No API key for the platform account - no remote call was attempted
    PlatformApiKeyMissing,

    /// The retrieve call failed
    AccountNotRetrievable,

    /// The account already carries the expected MCC
    NoFixNeeded,

    /// The update call failed
    AccountNotUpdatable,

    /// The MCC was corrected
    Fixed,
}

impl FixOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixOutcome::PlatformApiKeyMissing => "PLATFORM_API_KEY_MISSING",
            FixOutcome::AccountNotRetrievable => "ACCOUNT_NOT_RETRIEVABLE",
            FixOutcome::NoFixNeeded => "NO_FIX_NEEDED",
            FixOutcome::AccountNotUpdatable => "ACCOUNT_NOT_UPDATABLE",
            FixOutcome::Fixed => "FIXED",
        }
    }

    /// True when the record ended in a failure classification
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FixOutcome::PlatformApiKeyMissing
                | FixOutcome::AccountNotRetrievable
                | FixOutcome::AccountNotUpdatable
        )
    }
}

// ============================================================================
// REMEDIATION ENGINE
// ============================================================================

/// Per-record remediation. Side-effect-isolated: one `remediate` call never
/// touches state shared with another, so an alternative bounded-concurrency
/// driver could be substituted without changing this contract.
pub struct RemediationEngine {
    keys: ApiKeyStore,
    gateway: Arc<dyn AccountGateway>,
    expected_mcc: String,
}

impl RemediationEngine {
    pub fn new(keys: ApiKeyStore, gateway: Arc<dyn AccountGateway>) -> Self {
        RemediationEngine {
            keys,
            gateway,
            expected_mcc: EXPECTED_MCC.to_string(),
        }
    }

    /// Fix one connected account's MCC, classifying the result.
    ///
    /// Never returns an error: every failure folds into a `FixOutcome`, so
    /// one bad record cannot abort the batch. Each remote call gets exactly
    /// one attempt.
    pub async fn remediate(
        &self,
        platform_account_id: &str,
        connected_account_id: &str,
    ) -> FixOutcome {
        // 1. Credential check - absent key means no remote call at all
        let Some(api_key) = self.keys.resolve(platform_account_id) else {
            error!(
                platform = %platform_account_id,
                account = %connected_account_id,
                "No API key for this platform account id"
            );
            return FixOutcome::PlatformApiKeyMissing;
        };

        // 2. Retrieval
        let account = match self
            .gateway
            .retrieve_account(api_key, connected_account_id)
            .await
        {
            Ok(account) => account,
            Err(err) => {
                log_gateway_error(
                    platform_account_id,
                    connected_account_id,
                    "Could not retrieve connected account",
                    &err,
                );
                return FixOutcome::AccountNotRetrievable;
            }
        };

        // 3. Decision - an absent MCC is "not equal", never "already fixed"
        if account.mcc.as_deref() == Some(self.expected_mcc.as_str()) {
            info!(
                platform = %platform_account_id,
                account = %connected_account_id,
                "No MCC fix needed"
            );
            return FixOutcome::NoFixNeeded;
        }

        // 4. Update - corrected MCC plus provenance, one atomic remote write
        let mut metadata = HashMap::new();
        metadata.insert(
            METADATA_OLD_VALUE.to_string(),
            account
                .mcc
                .clone()
                .unwrap_or_else(|| NO_PREVIOUS_MCC.to_string()),
        );
        metadata.insert(METADATA_FIXED_AT.to_string(), Utc::now().to_rfc2822());

        let update = AccountUpdate {
            mcc: self.expected_mcc.clone(),
            metadata,
        };

        match self
            .gateway
            .update_account(api_key, connected_account_id, update)
            .await
        {
            Ok(_) => {
                info!(
                    platform = %platform_account_id,
                    account = %connected_account_id,
                    mcc = %self.expected_mcc,
                    "Set MCC"
                );
                FixOutcome::Fixed
            }
            Err(err) => {
                log_gateway_error(
                    platform_account_id,
                    connected_account_id,
                    "Could not update connected account",
                    &err,
                );
                FixOutcome::AccountNotUpdatable
            }
        }
    }
}

/// Two-tier diagnostics: a service-reported error gets its message logged,
/// anything else is logged as unknown. The classification is the same
/// either way - only the log line differs.
fn log_gateway_error(
    platform_account_id: &str,
    connected_account_id: &str,
    action: &str,
    err: &GatewayError,
) {
    match err {
        GatewayError::Service { message } => {
            error!(
                platform = %platform_account_id,
                account = %connected_account_id,
                "{}: {}",
                action,
                message
            );
        }
        GatewayError::Unknown(cause) => {
            error!(
                platform = %platform_account_id,
                account = %connected_account_id,
                "Unknown error: {}",
                cause
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ConnectedAccount;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum GatewayCall {
        Retrieve {
            api_key: String,
            account_id: String,
        },
        Update {
            api_key: String,
            account_id: String,
            update: AccountUpdate,
        },
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Failure {
        None,
        Service,
        Unknown,
    }

    impl Failure {
        fn to_error(self) -> Option<GatewayError> {
            match self {
                Failure::None => None,
                Failure::Service => Some(GatewayError::Service {
                    message: "No such account".to_string(),
                }),
                Failure::Unknown => Some(GatewayError::Unknown("connection reset".to_string())),
            }
        }
    }

    /// In-memory gateway that records every call and applies updates to its
    /// stored state, so a second pass observes the effect of the first.
    struct MockGateway {
        accounts: Mutex<HashMap<String, ConnectedAccount>>,
        fail_retrieve: Failure,
        fail_update: Failure,
        calls: Mutex<Vec<GatewayCall>>,
    }

    impl MockGateway {
        fn new() -> Self {
            MockGateway {
                accounts: Mutex::new(HashMap::new()),
                fail_retrieve: Failure::None,
                fail_update: Failure::None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_account(self, id: &str, mcc: Option<&str>) -> Self {
            self.accounts.lock().unwrap().insert(
                id.to_string(),
                ConnectedAccount {
                    id: id.to_string(),
                    mcc: mcc.map(String::from),
                    metadata: HashMap::new(),
                },
            );
            self
        }

        fn calls(&self) -> Vec<GatewayCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AccountGateway for MockGateway {
        async fn retrieve_account(
            &self,
            api_key: &str,
            account_id: &str,
        ) -> Result<ConnectedAccount, GatewayError> {
            self.calls.lock().unwrap().push(GatewayCall::Retrieve {
                api_key: api_key.to_string(),
                account_id: account_id.to_string(),
            });

            if let Some(err) = self.fail_retrieve.to_error() {
                return Err(err);
            }

            self.accounts
                .lock()
                .unwrap()
                .get(account_id)
                .cloned()
                .ok_or_else(|| GatewayError::Service {
                    message: format!("No such account: {}", account_id),
                })
        }

        async fn update_account(
            &self,
            api_key: &str,
            account_id: &str,
            update: AccountUpdate,
        ) -> Result<ConnectedAccount, GatewayError> {
            self.calls.lock().unwrap().push(GatewayCall::Update {
                api_key: api_key.to_string(),
                account_id: account_id.to_string(),
                update: update.clone(),
            });

            if let Some(err) = self.fail_update.to_error() {
                return Err(err);
            }

            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts
                .get_mut(account_id)
                .ok_or_else(|| GatewayError::Service {
                    message: format!("No such account: {}", account_id),
                })?;
            account.mcc = Some(update.mcc);
            account.metadata.extend(update.metadata);
            Ok(account.clone())
        }
    }

    fn engine_with(gateway: Arc<MockGateway>, keys: &[(&str, &str)]) -> RemediationEngine {
        let store = ApiKeyStore::from_map(
            keys.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        RemediationEngine::new(store, gateway)
    }

    #[tokio::test]
    async fn test_missing_api_key_makes_no_remote_call() {
        let gateway = Arc::new(MockGateway::new());
        let engine = engine_with(gateway.clone(), &[]);

        let outcome = engine.remediate("acct_P2", "acct_C1").await;

        assert_eq!(outcome, FixOutcome::PlatformApiKeyMissing);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_service_failure() {
        let mut mock = MockGateway::new().with_account("acct_C1", Some("5812"));
        mock.fail_retrieve = Failure::Service;
        let gateway = Arc::new(mock);
        let engine = engine_with(gateway.clone(), &[("acct_P1", "sk_test_abc")]);

        let outcome = engine.remediate("acct_P1", "acct_C1").await;

        assert_eq!(outcome, FixOutcome::AccountNotRetrievable);
        // Retrieval was attempted, the update never was
        assert_eq!(gateway.calls().len(), 1);
        assert!(matches!(gateway.calls()[0], GatewayCall::Retrieve { .. }));
    }

    #[tokio::test]
    async fn test_retrieve_unknown_failure_classified_the_same() {
        let mut mock = MockGateway::new();
        mock.fail_retrieve = Failure::Unknown;
        let gateway = Arc::new(mock);
        let engine = engine_with(gateway.clone(), &[("acct_P1", "sk_test_abc")]);

        let outcome = engine.remediate("acct_P1", "acct_C1").await;

        assert_eq!(outcome, FixOutcome::AccountNotRetrievable);
    }

    #[tokio::test]
    async fn test_already_expected_mcc_is_a_noop() {
        let gateway = Arc::new(MockGateway::new().with_account("acct_C1", Some(EXPECTED_MCC)));
        let engine = engine_with(gateway.clone(), &[("acct_P1", "sk_test_abc")]);

        let outcome = engine.remediate("acct_P1", "acct_C1").await;

        assert_eq!(outcome, FixOutcome::NoFixNeeded);
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_mcc_gets_fixed_with_provenance() {
        let gateway = Arc::new(MockGateway::new().with_account("acct_C1", Some("5812")));
        let engine = engine_with(gateway.clone(), &[("acct_P1", "sk_test_abc")]);

        let outcome = engine.remediate("acct_P1", "acct_C1").await;

        assert_eq!(outcome, FixOutcome::Fixed);
        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        match &calls[1] {
            GatewayCall::Update {
                api_key,
                account_id,
                update,
            } => {
                assert_eq!(api_key, "sk_test_abc");
                assert_eq!(account_id, "acct_C1");
                assert_eq!(update.mcc, EXPECTED_MCC);
                assert_eq!(
                    update.metadata.get(METADATA_OLD_VALUE).map(String::as_str),
                    Some("5812")
                );
                assert!(update.metadata.contains_key(METADATA_FIXED_AT));
            }
            other => panic!("expected update call, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_absent_mcc_records_na_and_still_updates() {
        let gateway = Arc::new(MockGateway::new().with_account("acct_C1", None));
        let engine = engine_with(gateway.clone(), &[("acct_P1", "sk_test_abc")]);

        let outcome = engine.remediate("acct_P1", "acct_C1").await;

        assert_eq!(outcome, FixOutcome::Fixed);
        match &gateway.calls()[1] {
            GatewayCall::Update { update, .. } => {
                assert_eq!(
                    update.metadata.get(METADATA_OLD_VALUE).map(String::as_str),
                    Some("n/a")
                );
            }
            other => panic!("expected update call, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_failure() {
        let mut mock = MockGateway::new().with_account("acct_C1", Some("5812"));
        mock.fail_update = Failure::Service;
        let gateway = Arc::new(mock);
        let engine = engine_with(gateway.clone(), &[("acct_P1", "sk_test_abc")]);

        let outcome = engine.remediate("acct_P1", "acct_C1").await;

        assert_eq!(outcome, FixOutcome::AccountNotUpdatable);
        assert_eq!(gateway.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_second_pass_over_fixed_account_is_a_noop() {
        let gateway = Arc::new(MockGateway::new().with_account("acct_C1", Some("5812")));
        let engine = engine_with(gateway.clone(), &[("acct_P1", "sk_test_abc")]);

        let first = engine.remediate("acct_P1", "acct_C1").await;
        let second = engine.remediate("acct_P1", "acct_C1").await;

        assert_eq!(first, FixOutcome::Fixed);
        assert_eq!(second, FixOutcome::NoFixNeeded);
    }

    #[tokio::test]
    async fn test_resolved_key_is_passed_to_the_gateway() {
        let gateway = Arc::new(MockGateway::new().with_account("acct_C1", Some(EXPECTED_MCC)));
        let engine = engine_with(gateway.clone(), &[("acct_P1", "rk_live_xyz")]);

        engine.remediate("acct_P1", "acct_C1").await;

        match &gateway.calls()[0] {
            GatewayCall::Retrieve { api_key, .. } => assert_eq!(api_key, "rk_live_xyz"),
            other => panic!("expected retrieve call, got {:?}", other),
        }
    }

    #[test]
    fn test_outcome_string_forms() {
        assert_eq!(
            FixOutcome::PlatformApiKeyMissing.as_str(),
            "PLATFORM_API_KEY_MISSING"
        );
        assert_eq!(FixOutcome::Fixed.as_str(), "FIXED");

        // serde serialization matches as_str for every case
        for outcome in [
            FixOutcome::PlatformApiKeyMissing,
            FixOutcome::AccountNotRetrievable,
            FixOutcome::NoFixNeeded,
            FixOutcome::AccountNotUpdatable,
            FixOutcome::Fixed,
        ] {
            let json = serde_json::to_string(&outcome).unwrap();
            assert_eq!(json, format!("\"{}\"", outcome.as_str()));
        }
    }

    #[test]
    fn test_failure_classification() {
        assert!(FixOutcome::PlatformApiKeyMissing.is_failure());
        assert!(FixOutcome::AccountNotRetrievable.is_failure());
        assert!(FixOutcome::AccountNotUpdatable.is_failure());
        assert!(!FixOutcome::NoFixNeeded.is_failure());
        assert!(!FixOutcome::Fixed.is_failure());
    }
}
