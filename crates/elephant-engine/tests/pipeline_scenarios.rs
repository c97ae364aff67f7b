//! End-to-end scenarios for `PipelineEngine`, exercising every backend
//! through in-memory fakes instead of real HTTP/RPC collaborators.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use elephant_assignment::{AssignmentError, AssignmentSource};
use elephant_chain::{ChainError, ChainClient, Digest32, FeeMode, FeePolicy, FeeSuggestion, OnChainItem, SendOutcome};
use elephant_content::{canonicalize, cid_of};
use elephant_engine::{PipelineConfig, PipelineEngine};
use elephant_schema::{SchemaCacheError, SchemaSource};
use elephant_upload::{PinningClient, UploadError};
use ethers::types::{Address, U256};
use serde_json::json;
use tempfile::tempdir;

const SCHEMA_CID: &str = "QmSchemaAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

fn passthrough_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": { "name": { "type": "string" } },
    })
}

struct FakeSchemaSource {
    body: Vec<u8>,
    unavailable: HashSet<String>,
}

#[async_trait]
impl SchemaSource for FakeSchemaSource {
    async fn fetch_raw(&self, schema_cid: &str) -> Result<Vec<u8>, SchemaCacheError> {
        if self.unavailable.contains(schema_cid) {
            return Err(SchemaCacheError::SchemaUnavailable {
                cid: schema_cid.to_string(),
                cause: "gateway returned 504".into(),
            });
        }
        Ok(self.body.clone())
    }
}

struct FakePinningClient {
    calls: Mutex<usize>,
}

impl FakePinningClient {
    fn new() -> Self {
        Self { calls: Mutex::new(0) }
    }
}

#[async_trait]
impl PinningClient for FakePinningClient {
    async fn pin(&self, bytes: &[u8]) -> Result<String, UploadError> {
        *self.calls.lock().unwrap() += 1;
        cid_of(bytes).map_err(|e| UploadError::Request(e.to_string()))
    }
}

struct FakeAssignmentSource;

#[async_trait]
impl AssignmentSource for FakeAssignmentSource {
    async fn assigned_group_cids(&self, _identity: &str) -> Result<HashSet<String>, AssignmentError> {
        Ok(HashSet::new())
    }
}

#[derive(Default)]
struct FakeChainClient {
    anchored: Mutex<HashMap<(Digest32, Digest32), Digest32>>,
    fail_first_send: Mutex<bool>,
    next_nonce: Mutex<u64>,
    send_calls: Mutex<Vec<U256>>,
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn current_data_digest(
        &self,
        property_digest: Digest32,
        group_digest: Digest32,
    ) -> Result<Option<Digest32>, ChainError> {
        Ok(self.anchored.lock().unwrap().get(&(property_digest, group_digest)).copied())
    }

    async fn has_submitted(&self, _identity: Address, _item: OnChainItem) -> Result<bool, ChainError> {
        Ok(false)
    }

    async fn pending_nonce(&self, _identity: Address) -> Result<U256, ChainError> {
        Ok(U256::from(*self.next_nonce.lock().unwrap()))
    }

    async fn estimate_submit_cost(&self, _items: &[OnChainItem]) -> Result<u128, ChainError> {
        Ok(21_000)
    }

    async fn fee_suggestion(&self) -> Result<FeeSuggestion, ChainError> {
        Ok(FeeSuggestion { max_fee_per_gas: 1, max_priority_fee_per_gas: 1 })
    }

    async fn send_submission(
        &self,
        _items: &[OnChainItem],
        nonce: U256,
        _fees: FeePolicy,
    ) -> Result<SendOutcome, ChainError> {
        self.send_calls.lock().unwrap().push(nonce);
        let mut fail_first = self.fail_first_send.lock().unwrap();
        if *fail_first {
            *fail_first = false;
            return Err(ChainError::Send("nonce too low".into()));
        }
        Ok(SendOutcome { tx_hash: format!("0x{:064x}", nonce.as_u64()) })
    }

    async fn await_confirmation(&self, _tx_hash: &str, _timeout: Duration) -> Result<Option<u64>, ChainError> {
        Ok(Some(1))
    }
}

fn write_fixture(root: &std::path::Path, property: &str, group: &str, body: &serde_json::Value) {
    let dir = root.join(property);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{group}.json")), serde_json::to_vec(body).unwrap()).unwrap();
}

fn base_config(input_dir: PathBuf, errors: PathBuf, warnings: PathBuf) -> PipelineConfig {
    let mut config = PipelineConfig::new(input_dir, Address::zero());
    config.errors_csv_path = errors;
    config.warnings_csv_path = warnings;
    config.fee_mode = FeeMode::Legacy;
    config
}

#[tokio::test]
async fn s1_empty_directory_fails_fast() {
    let input = tempdir().unwrap();
    let out = tempdir().unwrap();
    let errors = out.path().join("errors.csv");
    let warnings = out.path().join("warnings.csv");
    let config = base_config(input.path().to_path_buf(), errors.clone(), warnings.clone());

    let engine = PipelineEngine::new(
        config,
        FakeSchemaSource { body: Vec::new(), unavailable: HashSet::new() },
        FakeChainClient::default(),
        FakePinningClient::new(),
        FakeAssignmentSource,
    );

    let result = engine.run().await;
    assert!(result.is_err(), "empty directory should be rejected as invalid structure");
    assert!(errors.exists());
    assert!(warnings.exists());
    assert_eq!(std::fs::read_to_string(&errors).unwrap().lines().count(), 1);
}

#[tokio::test]
async fn s2_already_anchored_file_is_skipped() {
    let input = tempdir().unwrap();
    let out = tempdir().unwrap();
    let property = "Qm".to_string() + &"p".repeat(44);
    let group = "Qm".to_string() + &"g".repeat(44);
    let value = json!({ "name": "parcel-1" });
    write_fixture(input.path(), &property, &group, &value);

    let canonical = canonicalize(&value).unwrap();
    let computed = cid_of(&canonical).unwrap();
    let digest = elephant_chain::cid_to_digest(&computed).unwrap();
    let property_digest = elephant_chain::cid_to_digest(&property).unwrap();
    let group_digest = elephant_chain::cid_to_digest(&group).unwrap();

    let chain = FakeChainClient::default();
    chain.anchored.lock().unwrap().insert((property_digest, group_digest), digest);

    let config = base_config(
        input.path().to_path_buf(),
        out.path().join("errors.csv"),
        out.path().join("warnings.csv"),
    );
    let engine = PipelineEngine::new(
        config,
        FakeSchemaSource { body: serde_json::to_vec(&passthrough_schema()).unwrap(), unavailable: HashSet::new() },
        chain,
        FakePinningClient::new(),
        FakeAssignmentSource,
    );

    let summary = engine.run().await.unwrap();
    assert_eq!(summary.metrics.scanned, 1);
    assert_eq!(summary.metrics.valid, 1);
    assert_eq!(summary.metrics.skipped, 1);
    assert_eq!(summary.metrics.uploaded, 0);
}

#[tokio::test]
async fn s3_one_valid_one_schema_unavailable() {
    let input = tempdir().unwrap();
    let out = tempdir().unwrap();
    let prop_a = "Qm".to_string() + &"a".repeat(44);
    let group_a = "Qm".to_string() + &"1".repeat(44);
    let prop_b = "Qm".to_string() + &"b".repeat(44);
    let group_b = "Qm".to_string() + &"2".repeat(44);
    write_fixture(input.path(), &prop_a, &group_a, &json!({ "name": "a" }));
    write_fixture(input.path(), &prop_b, &group_b, &json!({ "name": "b" }));

    let config = base_config(
        input.path().to_path_buf(),
        out.path().join("errors.csv"),
        out.path().join("warnings.csv"),
    );
    let _ = prop_b;
    let engine = PipelineEngine::new(
        config,
        FakeSchemaSource {
            body: serde_json::to_vec(&passthrough_schema()).unwrap(),
            unavailable: HashSet::from([group_b]),
        },
        FakeChainClient::default(),
        FakePinningClient::new(),
        FakeAssignmentSource,
    );

    let summary = engine.run().await.unwrap();
    assert_eq!(summary.metrics.scanned, 2);
    assert_eq!(summary.metrics.valid, 1);
    assert_eq!(summary.metrics.invalid, 1);
    assert_eq!(summary.metrics.uploaded, 1);
}

#[tokio::test]
async fn s4_dry_run_performs_no_side_effects() {
    let input = tempdir().unwrap();
    let out = tempdir().unwrap();
    let prop_a = "Qm".to_string() + &"a".repeat(44);
    let group_a = "Qm".to_string() + &"1".repeat(44);
    let prop_b = "Qm".to_string() + &"b".repeat(44);
    let group_b = "Qm".to_string() + &"2".repeat(44);
    write_fixture(input.path(), &prop_a, &group_a, &json!({ "name": "a" }));
    write_fixture(input.path(), &prop_b, &group_b, &json!({ "name": "b" }));

    let mut config = base_config(
        input.path().to_path_buf(),
        out.path().join("errors.csv"),
        out.path().join("warnings.csv"),
    );
    config.dry_run = true;

    let pinning = FakePinningClient::new();
    let engine = PipelineEngine::new(
        config,
        FakeSchemaSource { body: serde_json::to_vec(&passthrough_schema()).unwrap(), unavailable: HashSet::new() },
        FakeChainClient::default(),
        pinning,
        FakeAssignmentSource,
    );

    let summary = engine.run().await.unwrap();
    assert_eq!(summary.metrics.valid, 2);
    assert_eq!(summary.metrics.uploaded, 0);
    assert_eq!(summary.metrics.submitted, 0);
    assert!(summary.receipts.is_empty());

    // spec.md S4: dry runs must list both files "would be uploaded" with
    // their computed CIDs, not just a bare count.
    let expected_cid_a = cid_of(&canonicalize(&json!({ "name": "a" })).unwrap()).unwrap();
    let expected_cid_b = cid_of(&canonicalize(&json!({ "name": "b" })).unwrap()).unwrap();
    assert_eq!(summary.would_upload.len(), 2);
    let would_upload_cids: HashSet<_> = summary.would_upload.iter().map(|i| i.data_cid.clone()).collect();
    assert!(would_upload_cids.contains(&expected_cid_a));
    assert!(would_upload_cids.contains(&expected_cid_b));
}

#[tokio::test]
async fn s5_three_files_batch_size_two_yields_two_receipts() {
    let input = tempdir().unwrap();
    let out = tempdir().unwrap();
    for i in 0..3 {
        let prop = format!("Qm{}", "p".repeat(42)) + &i.to_string();
        let group = format!("Qm{}", "g".repeat(42)) + &i.to_string();
        write_fixture(input.path(), &prop, &group, &json!({ "name": format!("item-{i}") }));
    }

    let mut config = base_config(
        input.path().to_path_buf(),
        out.path().join("errors.csv"),
        out.path().join("warnings.csv"),
    );
    config.transaction_batch_size = 2;

    let engine = PipelineEngine::new(
        config,
        FakeSchemaSource { body: serde_json::to_vec(&passthrough_schema()).unwrap(), unavailable: HashSet::new() },
        FakeChainClient::default(),
        FakePinningClient::new(),
        FakeAssignmentSource,
    );

    let summary = engine.run().await.unwrap();
    assert_eq!(summary.metrics.valid, 3);
    assert_eq!(summary.metrics.uploaded, 3);
    assert_eq!(summary.receipts.len(), 2);
    let total: usize = summary.receipts.iter().map(|r| r.items_submitted).sum();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn s6_nonce_error_then_retry_yields_one_receipt() {
    let input = tempdir().unwrap();
    let out = tempdir().unwrap();
    let prop = "Qm".to_string() + &"p".repeat(44);
    let group = "Qm".to_string() + &"g".repeat(44);
    write_fixture(input.path(), &prop, &group, &json!({ "name": "solo" }));

    let config = base_config(
        input.path().to_path_buf(),
        out.path().join("errors.csv"),
        out.path().join("warnings.csv"),
    );

    let chain = FakeChainClient::default();
    *chain.fail_first_send.lock().unwrap() = true;

    let engine = PipelineEngine::new(
        config,
        FakeSchemaSource { body: serde_json::to_vec(&passthrough_schema()).unwrap(), unavailable: HashSet::new() },
        chain,
        FakePinningClient::new(),
        FakeAssignmentSource,
    );

    let summary = engine.run().await.unwrap();
    assert_eq!(summary.receipts.len(), 1);
    assert_eq!(summary.receipts[0].items_submitted, 1);
    assert!(summary.submission_error.is_none());
}
