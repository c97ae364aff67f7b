//! C6 — LedgerOracle.

use crate::client::{ChainClient, OnChainItem};
use crate::digest::{cid_to_digest, digest_to_cid};
use crate::error::ChainError;
use ethers::types::Address;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainQuery {
    pub property_id: String,
    pub group_id: String,
}

pub struct LedgerOracle<C: ChainClient> {
    client: Arc<C>,
    query_timeout: Duration,
    max_concurrent_queries: usize,
}

impl<C: ChainClient> LedgerOracle<C> {
    #[must_use]
    pub fn new(client: Arc<C>, query_timeout: Duration, max_concurrent_queries: usize) -> Self {
        Self {
            client,
            query_timeout,
            max_concurrent_queries: max_concurrent_queries.max(1),
        }
    }

    /// The CID currently anchored on the ledger for `(property_id,
    /// group_id)`, or `None` if unanchored, the stored value is the zero
    /// sentinel, or the pair fails to translate to valid digests.
    pub async fn current_data_cid(&self, property_id: &str, group_id: &str) -> Option<String> {
        let (Some(prop_digest), Some(group_digest)) =
            (cid_to_digest(property_id), cid_to_digest(group_id))
        else {
            tracing::warn!(property_id, group_id, "non-canonical CID, cannot query ledger");
            return None;
        };

        let fut = self.client.current_data_digest(prop_digest, group_digest);
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(Ok(Some(digest))) => Some(digest_to_cid(digest)),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                tracing::warn!(property_id, group_id, error = %e, "ledger query failed");
                None
            }
            Err(_) => {
                tracing::warn!(property_id, group_id, "ledger query timed out");
                None
            }
        }
    }

    pub async fn has_submitted(
        &self,
        identity: Address,
        property_id: &str,
        group_id: &str,
        data_cid: &str,
    ) -> Result<bool, ChainError> {
        let property_digest =
            cid_to_digest(property_id).ok_or_else(|| ChainError::Query("invalid property cid".into()))?;
        let group_digest =
            cid_to_digest(group_id).ok_or_else(|| ChainError::Query("invalid group cid".into()))?;
        let data_digest =
            cid_to_digest(data_cid).ok_or_else(|| ChainError::Query("invalid data cid".into()))?;

        let item = OnChainItem {
            property_digest,
            group_digest,
            data_digest,
        };
        let fut = self.client.has_submitted(identity, item);
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| ChainError::Timeout(self.query_timeout))?
    }

    /// Convenience batch lookup with bounded concurrency. Partial
    /// failures degrade to a `None` entry rather than aborting the batch.
    pub async fn batch_current_data_cids(
        &self,
        queries: Vec<ChainQuery>,
    ) -> HashMap<ChainQuery, Option<String>> {
        stream::iter(queries)
            .map(|q| async move {
                let result = self.current_data_cid(&q.property_id, &q.group_id).await;
                (q, result)
            })
            .buffer_unordered(self.max_concurrent_queries)
            .collect()
            .await
    }
}
