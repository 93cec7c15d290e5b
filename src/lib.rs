// MCC Remediation - Core Library
// Exposes all modules for use in the CLI binary and tests

pub mod batch;
pub mod credentials;
pub mod engine;
pub mod gateway;
pub mod stripe;

// Re-export commonly used types
pub use batch::{
    read_accounts_csv, run_records, write_results_csv, AccountRecord, BatchDriver, BatchSummary,
    ResultRecord,
};
pub use credentials::ApiKeyStore;
pub use engine::{FixOutcome, RemediationEngine, EXPECTED_MCC};
pub use gateway::{
    AccountGateway, AccountUpdate, ConnectedAccount, GatewayError, METADATA_FIXED_AT,
    METADATA_OLD_VALUE,
};
pub use stripe::StripeGateway;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
