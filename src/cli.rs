//! Command-line interface for `elephant-cli`.
//!
//! Argument parsing and environment resolution are named as an external
//! collaborator by the pipeline specification; this module is the thin
//! seam between that surface and the typed `PipelineConfig` the engine
//! actually runs on.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use elephant_chain::{EthersChainClient, FeeMode};
use elephant_engine::{Phase, PipelineConfig, PipelineEngine, ProgressSink, TracingProgressSink};
use elephant_schema::HttpSchemaSource;
use elephant_upload::HttpPinningClient;
use elephant_utils::exit_codes::ExitCode;
use elephant_utils::types::ProgressMetrics;
use ethers::types::Address;
use indicatif::{ProgressBar, ProgressStyle};

/// Renders phase transitions to a terminal spinner. The progress-bar
/// rendering itself is named only by interface in the pipeline
/// specification; this is the CLI layer's one concrete implementation,
/// used when stdout is attached to a terminal.
struct IndicatifProgressSink {
    bar: ProgressBar,
}

impl IndicatifProgressSink {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .expect("static template is valid")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl ProgressSink for IndicatifProgressSink {
    fn on_phase(&self, phase: Phase, metrics: &ProgressMetrics) {
        self.bar.set_message(format!(
            "{:<11} scanned={} valid={} invalid={} skipped={} uploaded={} submitted={}",
            phase.label(),
            metrics.scanned,
            metrics.valid,
            metrics.invalid,
            metrics.skipped,
            metrics.uploaded,
            metrics.submitted,
        ));
        if phase == Phase::Finalization {
            self.bar.finish_and_clear();
        }
    }
}

/// Picks a terminal spinner when stdout is a TTY, falling back to plain
/// `tracing` lines for piped/headless output (CI logs, `--dry-run` in a
/// script).
fn default_progress_sink() -> Arc<dyn ProgressSink> {
    if std::io::stdout().is_terminal() {
        Arc::new(IndicatifProgressSink::new())
    } else {
        Arc::new(TracingProgressSink)
    }
}

const DEFAULT_SCHEMA_GATEWAY: &str = "https://ipfs.io";
const DEFAULT_PINNING_ENDPOINT: &str = "https://api.pinata.cloud/pinning/pinFileToIPFS";
const DEFAULT_CHAIN_ID: u64 = 1;

/// `elephant-cli` — validate, content-address, and submit property data
/// files to a public ledger.
#[derive(Parser)]
#[command(name = "elephant-cli")]
#[command(about = "Validate, content-address, and submit property data files to a public ledger")]
#[command(version)]
pub struct Cli {
    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate, upload, and submit the JSON files under `input_dir`
    ///
    /// EXAMPLES:
    ///   elephant-cli submit-files ./data --pinata-jwt $PINATA_JWT
    ///   elephant-cli submit-files ./data --dry-run
    SubmitFiles {
        /// Root of the `<property_id>/<group_id>.json` input tree
        input_dir: PathBuf,

        /// Pinning service credential (C8)
        #[arg(long, env = "PINATA_JWT")]
        pinata_jwt: Option<String>,

        /// Signing key for on-ledger submission
        #[arg(long, env = "ELEPHANT_PRIVATE_KEY")]
        private_key: Option<String>,

        /// Ledger RPC endpoint
        #[arg(long, env = "RPC_URL")]
        rpc_url: Option<String>,

        /// Submission contract address
        #[arg(long, env = "SUBMIT_CONTRACT_ADDRESS")]
        contract_address: Option<String>,

        /// Chain id used to sign transactions
        #[arg(long, env = "CHAIN_ID", default_value_t = DEFAULT_CHAIN_ID)]
        chain_id: u64,

        /// Overrides the C8 upload semaphore size
        #[arg(long)]
        max_concurrent_uploads: Option<usize>,

        /// Overrides the C9 batch chunk size
        #[arg(long)]
        transaction_batch_size: Option<usize>,

        /// Skip upload and submission side effects
        #[arg(long)]
        dry_run: bool,

        /// Gateway base URL C4 fetches schemas from
        #[arg(long, env = "SCHEMA_GATEWAY_URL", default_value = DEFAULT_SCHEMA_GATEWAY)]
        schema_gateway_url: String,

        /// Pinning service upload endpoint
        #[arg(long, env = "PINNING_ENDPOINT", default_value = DEFAULT_PINNING_ENDPOINT)]
        pinning_endpoint: String,

        /// Optional assignment-filter sidecar base URL (C7)
        #[arg(long, env = "ASSIGNMENT_SERVICE_URL")]
        assignment_service_url: Option<String>,

        /// Require one confirmation per submitted batch before returning
        #[arg(long)]
        confirm: bool,
    },
}

/// Build the CLI command structure without parsing arguments; used for
/// introspection in tests.
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}

/// Parse arguments, run the requested command, and report errors to
/// stderr. `main.rs` only translates the returned `ExitCode` into a
/// process exit status — it does not print.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = elephant_utils::logging::init_tracing(cli.verbose) {
        eprintln!("failed to initialize logging: {e}");
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    rt.block_on(async {
        match cli.command {
            Commands::SubmitFiles {
                input_dir,
                pinata_jwt,
                private_key,
                rpc_url,
                contract_address,
                chain_id,
                max_concurrent_uploads,
                transaction_batch_size,
                dry_run,
                schema_gateway_url,
                pinning_endpoint,
                assignment_service_url,
                confirm,
            } => {
                submit_files(
                    input_dir,
                    pinata_jwt,
                    private_key,
                    rpc_url,
                    contract_address,
                    chain_id,
                    max_concurrent_uploads,
                    transaction_batch_size,
                    dry_run,
                    schema_gateway_url,
                    pinning_endpoint,
                    assignment_service_url,
                    confirm,
                )
                .await
            }
        }
    })
}

#[allow(clippy::too_many_arguments)]
async fn submit_files(
    input_dir: PathBuf,
    pinata_jwt: Option<String>,
    private_key: Option<String>,
    rpc_url: Option<String>,
    contract_address: Option<String>,
    chain_id: u64,
    max_concurrent_uploads: Option<usize>,
    transaction_batch_size: Option<usize>,
    dry_run: bool,
    schema_gateway_url: String,
    pinning_endpoint: String,
    assignment_service_url: Option<String>,
    confirm: bool,
) -> Result<(), ExitCode> {
    let pinata_jwt = pinata_jwt.ok_or_else(missing_credential("--pinata-jwt", "PINATA_JWT"))?;
    let private_key =
        private_key.ok_or_else(missing_credential("--private-key", "ELEPHANT_PRIVATE_KEY"))?;
    let rpc_url = rpc_url.ok_or_else(missing_credential("--rpc-url", "RPC_URL"))?;
    let contract_address_str =
        contract_address.ok_or_else(missing_credential("--contract-address", "SUBMIT_CONTRACT_ADDRESS"))?;
    let contract_address: Address = contract_address_str.parse().map_err(|e| {
        eprintln!("invalid contract address {contract_address_str}: {e}");
        ExitCode::CLI_ARGS
    })?;

    let chain_client = EthersChainClient::new(&rpc_url, &private_key, contract_address, chain_id)
        .map_err(|e| {
            eprintln!("failed to construct chain client: {e}");
            ExitCode::CLI_ARGS
        })?;
    let identity = identity_from_private_key(&private_key)?;

    let mut config = PipelineConfig::new(input_dir, identity);
    config.dry_run = dry_run;
    config.fee_mode = FeeMode::Auto;
    config.confirm = confirm;
    if let Some(n) = max_concurrent_uploads {
        config.max_concurrent_uploads = n;
    }
    if let Some(n) = transaction_batch_size {
        config.transaction_batch_size = n;
    }

    let schema_source = HttpSchemaSource::new(schema_gateway_url);
    let pinning_client = HttpPinningClient::new(pinning_endpoint, pinata_jwt);
    let assignment_source = assignment_service_url
        .map(elephant_assignment::HttpAssignmentSource::new)
        .unwrap_or_else(|| elephant_assignment::HttpAssignmentSource::new(String::new()));

    let engine = PipelineEngine::with_progress(
        config,
        schema_source,
        chain_client,
        pinning_client,
        assignment_source,
        default_progress_sink(),
    );

    match engine.run().await {
        Ok(summary) => {
            println!(
                "scanned={} valid={} invalid={} skipped={} uploaded={} submitted={} errors={} warnings={}",
                summary.metrics.scanned,
                summary.metrics.valid,
                summary.metrics.invalid,
                summary.metrics.skipped,
                summary.metrics.uploaded,
                summary.metrics.submitted,
                summary.report.error_count,
                summary.report.warning_count,
            );
            if !summary.would_upload.is_empty() {
                println!("[DRY RUN] would upload and submit {} file(s):", summary.would_upload.len());
                for item in &summary.would_upload {
                    println!(
                        "  {}/{} -> {}",
                        item.property_id, item.group_id, item.data_cid
                    );
                }
            }
            if let Some(reason) = summary.submission_error {
                eprintln!("submission did not complete: {reason}");
                return Err(ExitCode::INTERNAL);
            }
            Ok(())
        }
        Err(elephant_engine::PipelineError::InputStructure(e)) => {
            eprintln!("input directory structure is invalid: {e}");
            Err(ExitCode::INVALID_STRUCTURE)
        }
        Err(e) => {
            eprintln!("unhandled error: {e}");
            Err(ExitCode::INTERNAL)
        }
    }
}

fn missing_credential(flag: &'static str, env: &'static str) -> impl FnOnce() -> ExitCode {
    move || {
        eprintln!("missing required credential: pass {flag} or set {env}");
        ExitCode::CLI_ARGS
    }
}

/// Derives the signer's address from the private key, the same wallet
/// construction `EthersChainClient` performs internally.
fn identity_from_private_key(private_key: &str) -> Result<Address, ExitCode> {
    private_key
        .parse::<ethers::signers::LocalWallet>()
        .map(|wallet| ethers::signers::Signer::address(&wallet))
        .map_err(|e| {
            eprintln!("invalid private key: {e}");
            ExitCode::CLI_ARGS
        })
}
