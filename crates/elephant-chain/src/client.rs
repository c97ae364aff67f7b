//! The narrow capability interface C6/C9 are built on, and the concrete
//! `ethers`-backed implementation talking to the submission contract.

use crate::digest::Digest32;
use crate::error::ChainError;
use async_trait::async_trait;
use ethers::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// One item as it is represented on-ledger: three digests rather than
/// three CID strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnChainItem {
    pub property_digest: Digest32,
    pub group_digest: Digest32,
    pub data_digest: Digest32,
}

/// How transaction fees are populated for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeMode {
    Legacy,
    Eip1559,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeePolicy {
    Legacy {
        gas_price: u128,
    },
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

/// The provider's suggested fee, when `FeeMode::Auto` is configured and
/// the provider supports `eth_feeHistory`/`eth_maxPriorityFeePerGas`.
#[derive(Debug, Clone, Copy)]
pub struct FeeSuggestion {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub tx_hash: String,
}

/// Capability interface consumed by C6 (`LedgerOracle`) and C9
/// (`LedgerSubmitter`). The engine depends only on this trait, never on
/// the concrete `ethers` client, so tests substitute an in-memory double.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn current_data_digest(
        &self,
        property_digest: Digest32,
        group_digest: Digest32,
    ) -> Result<Option<Digest32>, ChainError>;

    async fn has_submitted(
        &self,
        identity: Address,
        item: OnChainItem,
    ) -> Result<bool, ChainError>;

    async fn pending_nonce(&self, identity: Address) -> Result<U256, ChainError>;

    async fn estimate_submit_cost(&self, items: &[OnChainItem]) -> Result<u128, ChainError>;

    async fn fee_suggestion(&self) -> Result<FeeSuggestion, ChainError>;

    /// Send a submission transaction for `items` at `nonce` with the
    /// given fee policy. Returns as soon as the transaction is accepted
    /// by the node (no wait for confirmation).
    async fn send_submission(
        &self,
        items: &[OnChainItem],
        nonce: U256,
        fees: FeePolicy,
    ) -> Result<SendOutcome, ChainError>;

    /// Block until one confirmation is observed for `tx_hash`, or the
    /// timeout elapses.
    async fn await_confirmation(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<Option<u64>, ChainError>;
}

abigen!(
    SubmissionContract,
    r#"[
        function currentDataDigest(bytes32 propertyDigest, bytes32 groupDigest) view returns (bytes32)
        function hasSubmitted(address identity, bytes32 propertyDigest, bytes32 groupDigest, bytes32 dataDigest) view returns (bool)
        function submitBatch((bytes32 propertyDigest, bytes32 groupDigest, bytes32 dataDigest)[] items) returns ()
    ]"#,
);

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Production `ChainClient`, backed by an `ethers` HTTP provider and a
/// locally-held signing key.
pub struct EthersChainClient {
    client: Arc<SignerClient>,
    contract: SubmissionContract<SignerClient>,
}

impl EthersChainClient {
    pub fn new(
        rpc_url: &str,
        private_key: &str,
        contract_address: Address,
        chain_id: u64,
    ) -> Result<Self, ChainError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ChainError::Query(format!("invalid rpc url: {e}")))?;
        let wallet = private_key
            .parse::<LocalWallet>()
            .map_err(|e| ChainError::Query(format!("invalid private key: {e}")))?
            .with_chain_id(chain_id);
        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let contract = SubmissionContract::new(contract_address, client.clone());
        Ok(Self { client, contract })
    }
}

fn zero_digest() -> Digest32 {
    [0u8; 32]
}

#[async_trait]
impl ChainClient for EthersChainClient {
    async fn current_data_digest(
        &self,
        property_digest: Digest32,
        group_digest: Digest32,
    ) -> Result<Option<Digest32>, ChainError> {
        let result: [u8; 32] = self
            .contract
            .current_data_digest(property_digest, group_digest)
            .call()
            .await
            .map_err(|e| ChainError::Query(e.to_string()))?;
        if result == zero_digest() {
            Ok(None)
        } else {
            Ok(Some(result))
        }
    }

    async fn has_submitted(
        &self,
        identity: Address,
        item: OnChainItem,
    ) -> Result<bool, ChainError> {
        self.contract
            .has_submitted(
                identity,
                item.property_digest,
                item.group_digest,
                item.data_digest,
            )
            .call()
            .await
            .map_err(|e| ChainError::Query(e.to_string()))
    }

    async fn pending_nonce(&self, identity: Address) -> Result<U256, ChainError> {
        self.client
            .get_transaction_count(identity, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| ChainError::Query(e.to_string()))
    }

    async fn estimate_submit_cost(&self, items: &[OnChainItem]) -> Result<u128, ChainError> {
        let tuples: Vec<(_, _, _)> = items
            .iter()
            .map(|i| (i.property_digest, i.group_digest, i.data_digest))
            .collect();
        let gas: U256 = self
            .contract
            .submit_batch(tuples)
            .estimate_gas()
            .await
            .map_err(|e| ChainError::Query(e.to_string()))?;
        // fixed 20% headroom per the submission protocol
        let with_headroom = gas.saturating_mul(U256::from(120)) / U256::from(100);
        Ok(with_headroom.as_u128())
    }

    async fn fee_suggestion(&self) -> Result<FeeSuggestion, ChainError> {
        let (max_fee, max_priority_fee) = self
            .client
            .estimate_eip1559_fees(None)
            .await
            .map_err(|e| ChainError::Query(e.to_string()))?;
        Ok(FeeSuggestion {
            max_fee_per_gas: max_fee.as_u128(),
            max_priority_fee_per_gas: max_priority_fee.as_u128(),
        })
    }

    async fn send_submission(
        &self,
        items: &[OnChainItem],
        nonce: U256,
        fees: FeePolicy,
    ) -> Result<SendOutcome, ChainError> {
        let tuples: Vec<(_, _, _)> = items
            .iter()
            .map(|i| (i.property_digest, i.group_digest, i.data_digest))
            .collect();
        let mut call = self.contract.submit_batch(tuples).nonce(nonce);
        call = match fees {
            FeePolicy::Legacy { gas_price } => call.gas_price(gas_price),
            FeePolicy::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let tx = call.tx.clone().into();
                match tx {
                    TypedTransaction::Eip1559(mut inner) => {
                        inner.max_fee_per_gas = Some(max_fee_per_gas.into());
                        inner.max_priority_fee_per_gas = Some(max_priority_fee_per_gas.into());
                        call.tx = inner.into();
                        call
                    }
                    other => {
                        call.tx = other;
                        call
                    }
                }
            }
        };

        let pending = call
            .send()
            .await
            .map_err(|e| ChainError::Send(e.to_string()))?;
        Ok(SendOutcome {
            tx_hash: format!("{:#x}", pending.tx_hash()),
        })
    }

    async fn await_confirmation(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<Option<u64>, ChainError> {
        let hash: H256 = tx_hash
            .parse()
            .map_err(|e| ChainError::Query(format!("invalid tx hash: {e}")))?;
        let fut = self.client.get_transaction_receipt(hash);
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(Some(receipt))) => Ok(receipt.block_number.map(|n| n.as_u64())),
            Ok(Ok(None)) => Ok(None),
            Ok(Err(e)) => Err(ChainError::Query(e.to_string())),
            Err(_) => Err(ChainError::Timeout(timeout)),
        }
    }
}
