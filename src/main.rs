use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mcc_remediation::{ApiKeyStore, BatchDriver, RemediationEngine, StripeGateway, EXPECTED_MCC};

// Fixed at build time - no command-line flags
const API_KEYS_FILE: &str = "api-keys.json";
const ACCOUNTS_FILE: &str = "accounts.csv";
const RESULTS_FILE: &str = "results.csv";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // 1. Load platform API keys
    let keys = ApiKeyStore::load(Path::new(API_KEYS_FILE))?;
    info!(tenants = keys.len(), "Loaded API keys");

    // 2. Remediate accounts one by one
    let engine = RemediationEngine::new(keys, Arc::new(StripeGateway::new()));
    let driver = BatchDriver::new(engine, ACCOUNTS_FILE.into(), RESULTS_FILE.into());
    let summary = driver.run().await?;

    // 3. Report - per-record failures are outcomes, not process errors
    info!(
        expected_mcc = EXPECTED_MCC,
        total = summary.total,
        fixed = summary.fixed,
        failures = summary.failures(),
        results_file = RESULTS_FILE,
        "Run finished"
    );

    Ok(())
}
