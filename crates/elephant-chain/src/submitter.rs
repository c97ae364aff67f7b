//! C9 — LedgerSubmitter.
//!
//! Groups accepted items into batches, estimates cost, and submits each
//! batch with nonce discipline and a bounded retry schedule, matching the
//! retry-with-backoff shape used for HTTP calls elsewhere in this
//! workspace but adapted for nonce-class chain errors.

use crate::client::{ChainClient, FeeMode, FeePolicy, OnChainItem};
use crate::digest::cid_to_digest;
use crate::error::ChainError;
use elephant_utils::types::{BatchReceipt, DataItem};
use ethers::types::{Address, U256};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

static NONCE_CLASS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)nonce|too low|too high|already used|replacement underpriced").unwrap()
});

#[must_use]
pub fn is_nonce_class_error(message: &str) -> bool {
    NONCE_CLASS_PATTERN.is_match(message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    Prepared,
    Estimating,
    Sending,
    AwaitingConfirm,
    Retrying,
    Done,
    Failed,
}

pub struct SubmitterConfig {
    pub identity: Address,
    pub transaction_batch_size: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retry_backoff_multiplier: f64,
    pub fee_mode: FeeMode,
    pub fixed_legacy_gas_price: u128,
    pub fixed_eip1559_max_fee: u128,
    pub fixed_eip1559_priority_fee: u128,
    pub confirm: bool,
    pub confirm_timeout: Duration,
}

struct NonceCounter {
    next: Option<U256>,
}

pub struct LedgerSubmitter<C: ChainClient> {
    client: Arc<C>,
    config: SubmitterConfig,
    nonce: Mutex<NonceCounter>,
}

impl<C: ChainClient> LedgerSubmitter<C> {
    #[must_use]
    pub fn new(client: Arc<C>, config: SubmitterConfig) -> Self {
        Self {
            client,
            config,
            nonce: Mutex::new(NonceCounter { next: None }),
        }
    }

    /// Deterministic chunking at `transaction_batch_size`.
    #[must_use]
    pub fn group_into_batches(&self, items: Vec<DataItem>) -> Vec<Vec<DataItem>> {
        items
            .chunks(self.config.transaction_batch_size.max(1))
            .map(<[DataItem]>::to_vec)
            .collect()
    }

    async fn resync_nonce(&self) -> Result<U256, ChainError> {
        let fresh = self.client.pending_nonce(self.config.identity).await?;
        self.nonce.lock().await.next = Some(fresh);
        Ok(fresh)
    }

    async fn next_nonce(&self, force_resync: bool) -> Result<U256, ChainError> {
        let mut guard = self.nonce.lock().await;
        if force_resync || guard.next.is_none() {
            drop(guard);
            return self.resync_nonce().await;
        }
        let n = guard.next.unwrap();
        guard.next = Some(n + U256::one());
        Ok(n)
    }

    async fn rollback_nonce(&self) {
        let mut guard = self.nonce.lock().await;
        if let Some(n) = guard.next {
            guard.next = Some(n.saturating_sub(U256::one()));
        }
    }

    fn to_onchain_items(batch: &[DataItem]) -> Result<Vec<OnChainItem>, ChainError> {
        batch
            .iter()
            .map(|item| {
                let property_digest = cid_to_digest(&item.property_id)
                    .ok_or_else(|| ChainError::Send(format!("invalid property cid {}", item.property_id)))?;
                let group_digest = cid_to_digest(&item.group_id)
                    .ok_or_else(|| ChainError::Send(format!("invalid group cid {}", item.group_id)))?;
                let data_digest = cid_to_digest(&item.data_cid)
                    .ok_or_else(|| ChainError::Send(format!("invalid data cid {}", item.data_cid)))?;
                Ok(OnChainItem {
                    property_digest,
                    group_digest,
                    data_digest,
                })
            })
            .collect()
    }

    async fn resolve_fees(&self) -> Result<FeePolicy, ChainError> {
        match self.config.fee_mode {
            FeeMode::Legacy => Ok(FeePolicy::Legacy {
                gas_price: self.config.fixed_legacy_gas_price,
            }),
            FeeMode::Eip1559 => Ok(FeePolicy::Eip1559 {
                max_fee_per_gas: self.config.fixed_eip1559_max_fee,
                max_priority_fee_per_gas: self.config.fixed_eip1559_priority_fee,
            }),
            FeeMode::Auto => match self.client.fee_suggestion().await {
                Ok(suggestion) => Ok(FeePolicy::Eip1559 {
                    max_fee_per_gas: suggestion.max_fee_per_gas,
                    max_priority_fee_per_gas: suggestion.max_priority_fee_per_gas,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "fee suggestion unavailable, falling back to fixed defaults");
                    Ok(FeePolicy::Eip1559 {
                        max_fee_per_gas: self.config.fixed_eip1559_max_fee,
                        max_priority_fee_per_gas: self.config.fixed_eip1559_priority_fee,
                    })
                }
            },
        }
    }

    /// Submit one batch per the state-machine protocol described in
    /// §4.9: PREPARED → ESTIMATING → SENDING → [AWAITING_CONFIRM] → DONE,
    /// with RETRYING looping back to ESTIMATING on a recoverable error.
    pub async fn submit_batch(&self, batch: &[DataItem]) -> Result<BatchReceipt, ChainError> {
        let mut state = BatchState::Prepared;
        let onchain_items = Self::to_onchain_items(batch)?;
        let mut force_resync = false;
        let mut last_error: Option<ChainError> = None;

        for attempt in 0..=self.config.max_retries {
            state = BatchState::Estimating;
            let cost = match self.client.estimate_submit_cost(&onchain_items).await {
                Ok(c) => c,
                Err(e) => {
                    last_error = Some(e);
                    state = BatchState::Retrying;
                    self.back_off(attempt).await;
                    continue;
                }
            };

            let fees = self.resolve_fees().await?;
            let nonce = match self.next_nonce(force_resync).await {
                Ok(n) => n,
                Err(e) => {
                    last_error = Some(e);
                    state = BatchState::Retrying;
                    self.back_off(attempt).await;
                    continue;
                }
            };

            state = BatchState::Sending;
            match self.client.send_submission(&onchain_items, nonce, fees).await {
                Ok(outcome) => {
                    let block_number = if self.config.confirm {
                        state = BatchState::AwaitingConfirm;
                        self.client
                            .await_confirmation(&outcome.tx_hash, self.config.confirm_timeout)
                            .await
                            .unwrap_or(None)
                    } else {
                        None
                    };
                    state = BatchState::Done;
                    let _ = state;
                    tracing::info!(tx_hash = %outcome.tx_hash, cost, "batch submitted");
                    return Ok(BatchReceipt {
                        tx_hash: outcome.tx_hash,
                        block_number,
                        cost_used: Some(cost),
                        items_submitted: batch.len(),
                    });
                }
                Err(e) => {
                    force_resync = e.is_nonce_class();
                    if force_resync {
                        tracing::warn!(error = %e, "nonce-class error, resynchronizing");
                    }
                    last_error = Some(e);
                    state = BatchState::Retrying;
                    self.back_off(attempt).await;
                }
            }
        }

        state = BatchState::Failed;
        let _ = state;
        self.rollback_nonce().await;
        Err(ChainError::SubmissionFailed(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    async fn back_off(&self, attempt: u32) {
        let multiplier = self.config.retry_backoff_multiplier.powi(attempt as i32);
        let delay = self.config.retry_delay.mul_f64(multiplier);
        tokio::time::sleep(delay).await;
    }

    /// Group then submit sequentially, yielding one receipt per batch. If
    /// any batch fails, propagate the error; receipts already yielded are
    /// not rolled back.
    pub async fn submit_all(
        &self,
        items: Vec<DataItem>,
    ) -> Result<Vec<BatchReceipt>, ChainError> {
        let batches = self.group_into_batches(items);
        let mut receipts = Vec::with_capacity(batches.len());
        for batch in batches {
            let receipt = self.submit_batch(&batch).await?;
            receipts.push(receipt);
        }
        Ok(receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_pattern_matches_known_phrases() {
        assert!(is_nonce_class_error("nonce too low"));
        assert!(is_nonce_class_error("NONCE too high for account"));
        assert!(is_nonce_class_error("already used"));
        assert!(is_nonce_class_error("replacement underpriced"));
        assert!(!is_nonce_class_error("insufficient funds"));
    }

    #[test]
    fn group_into_batches_is_deterministic() {
        let items: Vec<DataItem> = (0..5)
            .map(|i| DataItem {
                property_id: format!("p{i}"),
                group_id: format!("g{i}"),
                data_cid: format!("d{i}"),
            })
            .collect();
        let client = Arc::new(NoopClient);
        let submitter = LedgerSubmitter::new(
            client,
            SubmitterConfig {
                identity: Address::zero(),
                transaction_batch_size: 2,
                max_retries: 0,
                retry_delay: Duration::from_millis(1),
                retry_backoff_multiplier: 2.0,
                fee_mode: FeeMode::Legacy,
                fixed_legacy_gas_price: 1,
                fixed_eip1559_max_fee: 1,
                fixed_eip1559_priority_fee: 1,
                confirm: false,
                confirm_timeout: Duration::from_millis(1),
            },
        );
        let batches = submitter.group_into_batches(items);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[2].len(), 1);
    }

    struct NoopClient;
    #[async_trait::async_trait]
    impl ChainClient for NoopClient {
        async fn current_data_digest(
            &self,
            _p: crate::digest::Digest32,
            _g: crate::digest::Digest32,
        ) -> Result<Option<crate::digest::Digest32>, ChainError> {
            Ok(None)
        }
        async fn has_submitted(
            &self,
            _identity: Address,
            _item: OnChainItem,
        ) -> Result<bool, ChainError> {
            Ok(false)
        }
        async fn pending_nonce(&self, _identity: Address) -> Result<U256, ChainError> {
            Ok(U256::zero())
        }
        async fn estimate_submit_cost(&self, _items: &[OnChainItem]) -> Result<u128, ChainError> {
            Ok(0)
        }
        async fn fee_suggestion(&self) -> Result<crate::client::FeeSuggestion, ChainError> {
            Ok(crate::client::FeeSuggestion {
                max_fee_per_gas: 0,
                max_priority_fee_per_gas: 0,
            })
        }
        async fn send_submission(
            &self,
            _items: &[OnChainItem],
            _nonce: U256,
            _fees: FeePolicy,
        ) -> Result<crate::client::SendOutcome, ChainError> {
            unimplemented!()
        }
        async fn await_confirmation(
            &self,
            _tx_hash: &str,
            _timeout: Duration,
        ) -> Result<Option<u64>, ChainError> {
            Ok(None)
        }
    }
}
