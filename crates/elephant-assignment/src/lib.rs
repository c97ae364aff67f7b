//! C7 — AssignmentFilter.
//!
//! Fetches the set of group-CIDs the active identity is permitted to
//! submit. Failure degrades to an empty set (the engine then treats
//! "empty" as "no filtering applied") rather than propagating an error:
//! assignment is an optimization, not a correctness gate. The result is
//! never cached across runs, since the assignment may change between
//! invocations.

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("assignment query failed: {0}")]
    Query(String),
    #[error("assignment source not configured")]
    Unsupported,
}

/// The external sidecar this component talks to, named only by
/// interface per the system's non-goals.
#[async_trait]
pub trait AssignmentSource: Send + Sync {
    async fn assigned_group_cids(&self, identity: &str) -> Result<HashSet<String>, AssignmentError>;
}

pub struct HttpAssignmentSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAssignmentSource {
    #[must_use]
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl AssignmentSource for HttpAssignmentSource {
    async fn assigned_group_cids(&self, identity: &str) -> Result<HashSet<String>, AssignmentError> {
        let url = format!("{}/{identity}/assignments", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AssignmentError::Query(e.to_string()))?
            .error_for_status()
            .map_err(|e| AssignmentError::Query(e.to_string()))?;
        let cids: Vec<String> = response
            .json()
            .await
            .map_err(|e| AssignmentError::Query(e.to_string()))?;
        Ok(cids.into_iter().collect())
    }
}

/// `AssignmentFilter` wraps a source and applies the degrade-on-failure
/// policy; the engine never sees an `AssignmentError`.
pub struct AssignmentFilter<S: AssignmentSource> {
    source: S,
}

impl<S: AssignmentSource> AssignmentFilter<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub async fn assigned_group_cids(&self, identity: &str) -> HashSet<String> {
        match self.source.assigned_group_cids(identity).await {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(error = %e, "assignment query failed, degrading to unfiltered mode");
                HashSet::new()
            }
        }
    }
}
