//! The engine's resolved configuration, assembled once at startup from
//! whatever CLI/env layer sits above this crate (argument parsing itself
//! is a named-out-of-scope external collaborator, per spec §1).

use elephant_chain::FeeMode;
use ethers::types::Address;
use std::path::PathBuf;
use std::time::Duration;

/// Everything `PipelineEngine` needs to run one submission pass, with no
/// knowledge of where the values came from (CLI flag, env var, default).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the `<property_id>/<group_id>.json` input tree.
    pub input_dir: PathBuf,
    /// Path the errors CSV sink is written to.
    pub errors_csv_path: PathBuf,
    /// Path the warnings CSV sink is written to.
    pub warnings_csv_path: PathBuf,
    /// Batch size `DirectoryScanner::scan` yields at.
    pub scan_batch_size: usize,
    /// Bound on the in-memory schema LRU.
    pub schema_cache_size: usize,
    /// Optional disk layer directory for the schema cache.
    pub schema_disk_cache_dir: Option<PathBuf>,
    /// C8 semaphore size.
    pub max_concurrent_uploads: usize,
    /// Per-upload timeout.
    pub upload_timeout: Duration,
    /// Shared retry budget for C8 and C9.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retry_backoff_multiplier: f64,
    /// C9 chunk size.
    pub transaction_batch_size: usize,
    /// Per-query timeout for C6.
    pub chain_query_timeout: Duration,
    /// Concurrency bound for `LedgerOracle::batch_current_data_cids`.
    pub max_concurrent_chain_queries: usize,
    /// The active identity submitting on-ledger transactions.
    pub identity: Address,
    /// Fee policy selection for C9.
    pub fee_mode: FeeMode,
    pub fixed_legacy_gas_price: u128,
    pub fixed_eip1559_max_fee: u128,
    pub fixed_eip1559_priority_fee: u128,
    /// Whether C9 awaits one confirmation before returning a receipt.
    pub confirm: bool,
    pub confirm_timeout: Duration,
    /// Skip C8/C9 side effects entirely (spec §4.8, §4.11 Phase 4/5).
    pub dry_run: bool,
}

impl PipelineConfig {
    /// Reasonable defaults for every knob not named directly on the CLI
    /// surface in spec §6; callers override what they need.
    #[must_use]
    pub fn new(input_dir: PathBuf, identity: Address) -> Self {
        Self {
            input_dir,
            errors_csv_path: PathBuf::from("errors.csv"),
            warnings_csv_path: PathBuf::from("warnings.csv"),
            scan_batch_size: 50,
            schema_cache_size: 256,
            schema_disk_cache_dir: None,
            max_concurrent_uploads: 10,
            upload_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            retry_backoff_multiplier: 2.0,
            transaction_batch_size: 200,
            chain_query_timeout: Duration::from_secs(10),
            max_concurrent_chain_queries: 10,
            identity,
            fee_mode: FeeMode::Auto,
            fixed_legacy_gas_price: 30_000_000_000,
            fixed_eip1559_max_fee: 40_000_000_000,
            fixed_eip1559_priority_fee: 2_000_000_000,
            confirm: false,
            confirm_timeout: Duration::from_secs(120),
            dry_run: false,
        }
    }
}
