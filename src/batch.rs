// 📋 Batch Driver - CSV in, one outcome per row, CSV out
// Decodes the full input into memory, remediates strictly sequentially in
// row order, and writes the complete result table once at the end. Output
// is a total, order-preserving map of the input: same length, same order,
// duplicates processed independently.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::engine::{FixOutcome, RemediationEngine};

// ============================================================================
// RECORDS
// ============================================================================

/// One remediation request, as read from the input CSV
#[derive(Debug, Clone, Deserialize)]
pub struct AccountRecord {
    #[serde(rename = "connectedAccountId")]
    pub connected_account_id: String,

    #[serde(rename = "platformAccountId")]
    pub platform_account_id: String,
}

/// One processed request plus its classification, as written to the output
/// CSV. Field order fixes the column order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "platformAccountId")]
    pub platform_account_id: String,

    #[serde(rename = "connectedAccountId")]
    pub connected_account_id: String,

    pub result: FixOutcome,
}

// ============================================================================
// CSV I/O
// ============================================================================

/// Load the full input into memory.
///
/// Eager, not streaming - fine for the batch sizes this tool is run over,
/// a known limit for much larger files.
pub fn read_accounts_csv(path: &Path) -> Result<Vec<AccountRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open accounts CSV: {}", path.display()))?;

    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: AccountRecord =
            row.with_context(|| format!("Failed to parse accounts CSV: {}", path.display()))?;
        records.push(record);
    }

    Ok(records)
}

/// Write the complete result table in one pass.
///
/// The header is written explicitly so an all-failures or empty run still
/// produces a well-formed file.
pub fn write_results_csv(path: &Path, results: &[ResultRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create results CSV: {}", path.display()))?;

    writer.write_record(["platformAccountId", "connectedAccountId", "result"])?;
    for record in results {
        writer.serialize(record)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write results CSV: {}", path.display()))?;

    Ok(())
}

// ============================================================================
// BATCH SUMMARY
// ============================================================================

/// Per-outcome counts for one batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub fixed: usize,
    pub no_fix_needed: usize,
    pub key_missing: usize,
    pub not_retrievable: usize,
    pub not_updatable: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: FixOutcome) {
        self.total += 1;
        match outcome {
            FixOutcome::Fixed => self.fixed += 1,
            FixOutcome::NoFixNeeded => self.no_fix_needed += 1,
            FixOutcome::PlatformApiKeyMissing => self.key_missing += 1,
            FixOutcome::AccountNotRetrievable => self.not_retrievable += 1,
            FixOutcome::AccountNotUpdatable => self.not_updatable += 1,
        }
    }

    pub fn failures(&self) -> usize {
        self.key_missing + self.not_retrievable + self.not_updatable
    }
}

// ============================================================================
// BATCH DRIVER
// ============================================================================

/// Remediate records one by one, in input order.
///
/// Strictly sequential: each record is awaited to completion before the
/// next begins, bounding remote-service load. Exposed separately from the
/// file-backed driver so tests can run batches without touching disk.
pub async fn run_records(
    engine: &RemediationEngine,
    records: &[AccountRecord],
) -> Vec<ResultRecord> {
    let mut results = Vec::with_capacity(records.len());

    for record in records {
        let outcome = engine
            .remediate(&record.platform_account_id, &record.connected_account_id)
            .await;
        results.push(ResultRecord {
            platform_account_id: record.platform_account_id.clone(),
            connected_account_id: record.connected_account_id.clone(),
            result: outcome,
        });
    }

    results
}

/// Orchestrates one full remediation pass over the input file.
pub struct BatchDriver {
    engine: RemediationEngine,
    accounts_path: PathBuf,
    results_path: PathBuf,
}

impl BatchDriver {
    pub fn new(engine: RemediationEngine, accounts_path: PathBuf, results_path: PathBuf) -> Self {
        BatchDriver {
            engine,
            accounts_path,
            results_path,
        }
    }

    /// Read the input, remediate every row, persist the results.
    ///
    /// Only the file I/O around the loop can fail; per-record failures are
    /// captured as outcomes. There is no partial flush - results are
    /// written once after the last record.
    pub async fn run(&self) -> Result<BatchSummary> {
        let records = read_accounts_csv(&self.accounts_path)?;
        info!(count = records.len(), "Loaded account records");

        let results = run_records(&self.engine, &records).await;

        let mut summary = BatchSummary::default();
        for record in &results {
            summary.record(record.result);
        }

        write_results_csv(&self.results_path, &results)?;
        info!(
            total = summary.total,
            fixed = summary.fixed,
            no_fix_needed = summary.no_fix_needed,
            "Batch complete"
        );
        if summary.failures() > 0 {
            warn!(failures = summary.failures(), "Some records failed");
        }

        Ok(summary)
    }
}
