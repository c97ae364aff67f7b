//! C11 — PipelineEngine.
//!
//! Orchestrates the five phases described in spec §4.11, owning the
//! progress counters and routing items between the narrow capability
//! interfaces the other components expose (§9's polymorphism note). The
//! engine itself never talks to the filesystem, the chain, or the pinning
//! service directly except through those interfaces — generic type
//! parameters stand in for the concrete backend, so tests wire up
//! in-memory doubles instead.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use elephant_assignment::AssignmentFilter;
use elephant_assignment::AssignmentSource;
use elephant_chain::{ChainClient, LedgerOracle, LedgerSubmitter, SubmitterConfig};
use elephant_content::{canonicalize, cid_of};
use elephant_report::{ReportSummary, Reporter};
use elephant_schema::{SchemaCache, SchemaSource, SchemaValidator};
use elephant_upload::{PinningClient, Uploader, UploaderConfig, synthesize_dry_run_results};
use elephant_utils::types::{DataItem, FileEntry, ProcessedFile, ProgressMetrics};
use futures::StreamExt;
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::outcome::{Phase, ProcessingOutcome, ValidationOutcome};
use crate::progress::{NoopProgressSink, ProgressSink};

/// The terminal state of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub metrics: ProgressMetrics,
    pub report: ReportSummary,
    pub receipts: Vec<elephant_utils::types::BatchReceipt>,
    /// Set when phase 5 aborted because a batch exhausted its retry
    /// budget (`SubmissionFailed`, spec §7); receipts already yielded are
    /// still present in `receipts`.
    pub submission_error: Option<String>,
    /// The `DataItem`s that would have been uploaded and submitted, in
    /// dry-run mode only (spec §4.11 S4: dry runs must list the files
    /// "would be uploaded" with their computed CIDs). Empty outside
    /// dry-run mode, where `receipts` carries the real outcome instead.
    pub would_upload: Vec<DataItem>,
}

pub struct PipelineEngine<S, C, P, A>
where
    S: SchemaSource,
    C: ChainClient,
    P: PinningClient + 'static,
    A: AssignmentSource,
{
    config: PipelineConfig,
    schema_cache: Arc<SchemaCache<S>>,
    validator: SchemaValidator<S>,
    oracle: LedgerOracle<C>,
    submitter: LedgerSubmitter<C>,
    uploader: Uploader<P>,
    assignment_filter: AssignmentFilter<A>,
    progress: Arc<dyn ProgressSink>,
}

impl<S, C, P, A> PipelineEngine<S, C, P, A>
where
    S: SchemaSource,
    C: ChainClient,
    P: PinningClient + 'static,
    A: AssignmentSource,
{
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        schema_source: S,
        chain_client: C,
        pinning_client: P,
        assignment_source: A,
    ) -> Self {
        Self::with_progress(
            config,
            schema_source,
            chain_client,
            pinning_client,
            assignment_source,
            Arc::new(NoopProgressSink),
        )
    }

    #[must_use]
    pub fn with_progress(
        config: PipelineConfig,
        schema_source: S,
        chain_client: C,
        pinning_client: P,
        assignment_source: A,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let schema_cache = Arc::new(SchemaCache::new(
            schema_source,
            config.schema_cache_size,
            config.schema_disk_cache_dir.clone(),
        ));
        let validator = SchemaValidator::new(schema_cache.clone());
        let chain_client = Arc::new(chain_client);
        let oracle = LedgerOracle::new(
            chain_client.clone(),
            config.chain_query_timeout,
            config.max_concurrent_chain_queries,
        );
        let submitter = LedgerSubmitter::new(
            chain_client,
            SubmitterConfig {
                identity: config.identity,
                transaction_batch_size: config.transaction_batch_size,
                max_retries: config.max_retries,
                retry_delay: config.retry_delay,
                retry_backoff_multiplier: config.retry_backoff_multiplier,
                fee_mode: config.fee_mode,
                fixed_legacy_gas_price: config.fixed_legacy_gas_price,
                fixed_eip1559_max_fee: config.fixed_eip1559_max_fee,
                fixed_eip1559_priority_fee: config.fixed_eip1559_priority_fee,
                confirm: config.confirm,
                confirm_timeout: config.confirm_timeout,
            },
        );
        let uploader = Uploader::new(
            pinning_client,
            UploaderConfig {
                max_concurrent_uploads: config.max_concurrent_uploads,
                upload_timeout: config.upload_timeout,
                max_retries: config.max_retries,
                retry_delay: config.retry_delay,
                retry_backoff_multiplier: config.retry_backoff_multiplier,
            },
        );
        let assignment_filter = AssignmentFilter::new(assignment_source);

        Self {
            config,
            schema_cache,
            validator,
            oracle,
            submitter,
            uploader,
            assignment_filter,
            progress,
        }
    }

    /// Run the full five-phase pipeline over `config.input_dir`.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let mut metrics = ProgressMetrics::default();
        let reporter = Reporter::new(&self.config.errors_csv_path, &self.config.warnings_csv_path)?;

        // Phase 1 — Discovery
        self.progress.on_phase(Phase::Discovery, &metrics);
        if let Err(e) = elephant_scanner::DirectoryScanner::validate_structure(&self.config.input_dir).await
        {
            tracing::error!(error = %e, "input directory structure is invalid");
            reporter.finalize();
            return Err(PipelineError::InputStructure(e));
        }
        let total = elephant_scanner::DirectoryScanner::count(&self.config.input_dir).await;
        tracing::info!(total, "discovered candidate files");

        // Phase 1.5 — Assignment
        self.progress.on_phase(Phase::Assignment, &metrics);
        let identity_str = format!("{:#x}", self.config.identity);
        let assigned = self.assignment_filter.assigned_group_cids(&identity_str).await;
        if !assigned.is_empty() {
            tracing::info!(assigned = assigned.len(), "assignment filtering active");
        }

        // Phase 2 — Validation
        self.progress.on_phase(Phase::Validation, &metrics);
        let mut validated: Vec<(FileEntry, Value)> = Vec::new();
        let mut batches =
            elephant_scanner::DirectoryScanner::scan(self.config.input_dir.clone(), self.config.scan_batch_size);
        while let Some(batch) = batches.next().await {
            for entry in batch {
                metrics.scanned += 1;
                match self.validate_entry(entry, &assigned).await {
                    ValidationOutcome::Valid { entry, value } => {
                        metrics.valid += 1;
                        validated.push((entry, value));
                    }
                    ValidationOutcome::NotAssigned { entry } => {
                        metrics.skipped += 1;
                        metrics.warnings += 1;
                        let _ = reporter.record_warning(
                            &entry.property_id,
                            &entry.group_id,
                            &entry.path.display().to_string(),
                            "not assigned to active identity",
                        );
                    }
                    ValidationOutcome::Invalid { entry, reason } => {
                        metrics.invalid += 1;
                        metrics.errors += 1;
                        let _ = reporter.record_error(
                            &entry.property_id,
                            &entry.group_id,
                            &entry.path.display().to_string(),
                            &reason,
                        );
                    }
                }
            }
            self.progress.on_phase(Phase::Validation, &metrics);
        }

        // Phase 3 — Processing
        self.progress.on_phase(Phase::Processing, &metrics);
        let mut candidates: Vec<ProcessedFile> = Vec::new();
        for (entry, value) in validated {
            match self.process_entry(entry, &value).await {
                ProcessingOutcome::Candidate {
                    entry,
                    canonical_bytes,
                    computed_cid,
                } => {
                    candidates.push(ProcessedFile {
                        entry,
                        canonical_bytes,
                        computed_cid,
                    });
                }
                ProcessingOutcome::AlreadyAnchored { entry, cid } => {
                    metrics.skipped += 1;
                    metrics.warnings += 1;
                    let _ = reporter.record_warning(
                        &entry.property_id,
                        &entry.group_id,
                        &entry.path.display().to_string(),
                        &format!("data CID {cid} already exists on-ledger"),
                    );
                }
                ProcessingOutcome::Failed { entry, reason } => {
                    metrics.invalid += 1;
                    metrics.errors += 1;
                    let _ = reporter.record_error(
                        &entry.property_id,
                        &entry.group_id,
                        &entry.path.display().to_string(),
                        &reason,
                    );
                }
            }
        }

        // Phase 4 — Upload
        self.progress.on_phase(Phase::Upload, &metrics);
        let paths_by_key: HashMap<(String, String), PathBuf> = candidates
            .iter()
            .map(|c| ((c.entry.property_id.clone(), c.entry.group_id.clone()), c.entry.path.clone()))
            .collect();
        let mut items: Vec<DataItem> = Vec::new();
        if self.config.dry_run {
            for result in synthesize_dry_run_results(&candidates) {
                if let Some(cid) = result.cid {
                    items.push(DataItem {
                        property_id: result.property_id,
                        group_id: result.group_id,
                        data_cid: cid,
                    });
                }
            }
            tracing::info!(
                count = items.len(),
                cids = ?items.iter().map(|i| i.data_cid.as_str()).collect::<Vec<_>>(),
                "[DRY RUN] would upload files"
            );
        } else {
            let results = self.uploader.upload_batch(candidates).await;
            for result in results {
                if result.success {
                    metrics.uploaded += 1;
                    if let Some(cid) = result.cid {
                        items.push(DataItem {
                            property_id: result.property_id,
                            group_id: result.group_id,
                            data_cid: cid,
                        });
                    }
                } else {
                    metrics.errors += 1;
                    let key = (result.property_id.clone(), result.group_id.clone());
                    let path = paths_by_key.get(&key).map_or_else(String::new, |p| p.display().to_string());
                    let _ = reporter.record_error(
                        &result.property_id,
                        &result.group_id,
                        &path,
                        result.error.as_deref().unwrap_or("upload failed"),
                    );
                }
            }
        }

        // Phase 5 — Submission
        self.progress.on_phase(Phase::Submission, &metrics);
        let mut receipts = Vec::new();
        let mut submission_error = None;
        if self.config.dry_run {
            let batches = self.submitter.group_into_batches(items.clone());
            tracing::info!(
                batches = batches.len(),
                items = items.len(),
                cids = ?items.iter().map(|i| i.data_cid.as_str()).collect::<Vec<_>>(),
                "[DRY RUN] would submit batched transactions"
            );
        } else if !items.is_empty() {
            match self.submitter.submit_all(items).await {
                Ok(batch_receipts) => {
                    for receipt in &batch_receipts {
                        metrics.submitted += receipt.items_submitted;
                        tracing::info!(tx_hash = %receipt.tx_hash, items = receipt.items_submitted, "batch receipt");
                    }
                    receipts = batch_receipts;
                }
                Err(e) => {
                    tracing::error!(error = %e, "batch submission failed, remaining items counted as errors");
                    metrics.errors += 1;
                    submission_error = Some(e.to_string());
                }
            }
        }

        let would_upload = if self.config.dry_run { items.clone() } else { Vec::new() };

        // Finalization
        let report = reporter.finalize();
        self.progress.on_phase(Phase::Finalization, &metrics);
        tracing::info!(
            scanned = metrics.scanned,
            valid = metrics.valid,
            invalid = metrics.invalid,
            skipped = metrics.skipped,
            uploaded = metrics.uploaded,
            submitted = metrics.submitted,
            errors = report.error_count,
            warnings = report.warning_count,
            "run finished"
        );

        Ok(RunSummary {
            metrics,
            report,
            receipts,
            submission_error,
            would_upload,
        })
    }

    async fn validate_entry(
        &self,
        entry: FileEntry,
        assigned: &std::collections::HashSet<String>,
    ) -> ValidationOutcome {
        if !assigned.is_empty() && !assigned.contains(&entry.group_id) {
            return ValidationOutcome::NotAssigned { entry };
        }

        let bytes = match tokio::fs::read(&entry.path).await {
            Ok(b) => b,
            Err(e) => {
                return ValidationOutcome::Invalid {
                    entry,
                    reason: format!("failed to read file: {e}"),
                };
            }
        };
        let value: Value = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => {
                return ValidationOutcome::Invalid {
                    entry,
                    reason: format!("invalid JSON: {e}"),
                };
            }
        };
        let schema = match self.schema_cache.get(&entry.group_id).await {
            Ok(s) => s,
            Err(e) => {
                return ValidationOutcome::Invalid {
                    entry,
                    reason: format!("schema unavailable: {e}"),
                };
            }
        };
        let base_dir = parent_dir(&entry.path);
        match self.validator.validate(&value, &schema, &base_dir).await {
            Ok(errors) if errors.is_empty() => ValidationOutcome::Valid { entry, value },
            Ok(errors) => {
                let reason = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.pointer, e.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                ValidationOutcome::Invalid { entry, reason }
            }
            Err(e) => ValidationOutcome::Invalid {
                entry,
                reason: format!("schema resolution failed: {e}"),
            },
        }
    }

    async fn process_entry(&self, entry: FileEntry, value: &Value) -> ProcessingOutcome {
        let canonical_bytes = match canonicalize(value) {
            Ok(b) => b,
            Err(e) => {
                return ProcessingOutcome::Failed {
                    entry,
                    reason: format!("canonicalization failed: {e}"),
                };
            }
        };
        let computed_cid = match cid_of(&canonical_bytes) {
            Ok(c) => c,
            Err(e) => {
                return ProcessingOutcome::Failed {
                    entry,
                    reason: format!("content addressing failed: {e}"),
                };
            }
        };

        let anchored = self
            .oracle
            .current_data_cid(&entry.property_id, &entry.group_id)
            .await;
        if anchored.as_deref() == Some(computed_cid.as_str()) {
            return ProcessingOutcome::AlreadyAnchored {
                entry,
                cid: computed_cid,
            };
        }

        ProcessingOutcome::Candidate {
            entry,
            canonical_bytes,
            computed_cid,
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf()
}
