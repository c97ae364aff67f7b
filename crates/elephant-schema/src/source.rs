//! The concrete content-store backend `SchemaCache` fetches from on a
//! miss: the pinning service's public gateway, addressed by CID.

use crate::cache::{SchemaCacheError, SchemaSource};
use async_trait::async_trait;

/// Fetches schema bytes from an IPFS-style gateway at
/// `{base_url}/ipfs/{cid}`, matching the same gateway the uploader pins
/// content to.
pub struct HttpSchemaSource {
    client: reqwest::Client,
    gateway_base_url: String,
}

impl HttpSchemaSource {
    #[must_use]
    pub fn new(gateway_base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_base_url,
        }
    }
}

#[async_trait]
impl SchemaSource for HttpSchemaSource {
    async fn fetch_raw(&self, schema_cid: &str) -> Result<Vec<u8>, SchemaCacheError> {
        let url = format!(
            "{}/ipfs/{schema_cid}",
            self.gateway_base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SchemaCacheError::SchemaUnavailable {
                cid: schema_cid.to_string(),
                cause: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| SchemaCacheError::SchemaUnavailable {
                cid: schema_cid.to_string(),
                cause: e.to_string(),
            })?;
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| SchemaCacheError::SchemaUnavailable {
                cid: schema_cid.to_string(),
                cause: e.to_string(),
            })
    }
}
