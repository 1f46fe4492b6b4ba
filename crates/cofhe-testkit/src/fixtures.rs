//! Test fixtures: an in-process mock chain, a local signer, and a recording
//! ZK strategy.
//!
//! [`MockChain`] answers the contract calls the client makes: ACL discovery
//! and `eip712Domain()` for permit signing, plus the mock ZK verifier and
//! mock query decrypter when mock contracts are enabled. Plaintexts are
//! registered when a [`LocalSigner`] connected to the chain sends
//! `insertPackedCtHashes`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy_primitives::{keccak256, FixedBytes};
use alloy_sol_types::{SolCall, SolInterface};
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;

use cofhe_core::{Address, EncryptableItem, B256, U256};
use cofhe_perms::eip712::{IAcl, ITaskManager};
use cofhe_perms::{
    CallRequest, Provider, Signer, TransactionRequest, TypedData, TASK_MANAGER_ADDRESS,
};
use cofhe_sdk::mock::{
    IMockQueryDecrypter::{self, IMockQueryDecrypterCalls},
    IMockZkVerifier::{self, IMockZkVerifierCalls},
    MOCK_QUERY_DECRYPTER_ADDRESS, MOCK_ZK_VERIFIER_ADDRESS,
};
use cofhe_sdk::{VerifyResult, ZkStrategy};

/// ACL contract address the mock chain reports.
pub const MOCK_ACL_ADDRESS: Address = Address::new([0xac; 20]);

// ─────────────────────────────────────────────────────────────────────────────
// Mock chain
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ChainState {
    /// ct_hash → plaintext, filled by `insertPackedCtHashes`.
    plaintexts: HashMap<U256, U256>,
    /// ct hashes whose reads answer "not allowed".
    denied: Vec<U256>,
    domain_version: String,
    transactions: Vec<(Address, TransactionRequest)>,
}

/// An in-process chain.
pub struct MockChain {
    chain_id: u64,
    mock_contracts: bool,
    domain_name: String,
    state: Mutex<ChainState>,
}

impl MockChain {
    /// A chain with the mock verifier and decrypter deployed.
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            mock_contracts: true,
            domain_name: "ACL".to_string(),
            state: Mutex::new(ChainState {
                domain_version: "1".to_string(),
                ..ChainState::default()
            }),
        }
    }

    /// A chain without mock contracts: only ACL discovery works.
    pub fn without_mocks(chain_id: u64) -> Self {
        Self {
            mock_contracts: false,
            ..Self::new(chain_id)
        }
    }

    /// Change the EIP-712 domain version, invalidating existing signatures.
    pub fn set_domain_version(&self, version: impl Into<String>) -> anyhow::Result<()> {
        self.lock()?.domain_version = version.into();
        Ok(())
    }

    /// Make sealoutput/decrypt of `ct_hash` answer "not allowed".
    pub fn deny(&self, ct_hash: U256) -> anyhow::Result<()> {
        self.lock()?.denied.push(ct_hash);
        Ok(())
    }

    /// The plaintext registered for `ct_hash`.
    pub fn plaintext(&self, ct_hash: &U256) -> anyhow::Result<Option<U256>> {
        Ok(self.lock()?.plaintexts.get(ct_hash).copied())
    }

    /// Register a plaintext directly, as if it had been encrypted on chain.
    pub fn store_plaintext(&self, ct_hash: U256, value: U256) -> anyhow::Result<()> {
        self.lock()?.plaintexts.insert(ct_hash, value);
        Ok(())
    }

    /// Number of transactions executed.
    pub fn transaction_count(&self) -> anyhow::Result<usize> {
        Ok(self.lock()?.transactions.len())
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, ChainState>> {
        self.state.lock().map_err(|_| anyhow!("mock chain state poisoned"))
    }

    /// Execute a transaction from `from`.
    pub fn execute(&self, from: Address, tx: &TransactionRequest) -> anyhow::Result<String> {
        if tx.to != MOCK_ZK_VERIFIER_ADDRESS || !self.mock_contracts {
            bail!("execution reverted: no code at {}", tx.to);
        }

        let call = match IMockZkVerifierCalls::abi_decode(&tx.data, true) {
            Ok(IMockZkVerifierCalls::insertPackedCtHashes(call)) => call,
            _ => bail!("execution reverted: unknown function"),
        };
        if call.ctHashes.len() != call.values.len() {
            bail!("insertPackedCtHashes: length mismatch");
        }

        let mut state = self.lock()?;
        state.plaintexts.extend(call.ctHashes.into_iter().zip(call.values));
        state.transactions.push((from, tx.clone()));

        Ok(format!("0x{}", hex::encode(keccak256(&tx.data))))
    }

    fn calc_ct_hashes(call: IMockZkVerifier::zkVerifyCalcCtHashesPackedCall) -> Vec<u8> {
        let hashes: Vec<U256> = call
            .values
            .iter()
            .zip(&call.utypes)
            .enumerate()
            .map(|(i, (value, utype))| {
                let mut preimage = Vec::with_capacity(32 * 5 + 20);
                preimage.extend_from_slice(&value.to_be_bytes::<32>());
                preimage.extend_from_slice(&U256::from(*utype).to_be_bytes::<32>());
                preimage.extend_from_slice(call.user.as_slice());
                preimage.extend_from_slice(&U256::from(call.securityZone).to_be_bytes::<32>());
                preimage.extend_from_slice(&call.chainId.to_be_bytes::<32>());
                preimage.extend_from_slice(&U256::from(i).to_be_bytes::<32>());
                U256::from_be_bytes(keccak256(&preimage).0)
            })
            .collect();

        IMockZkVerifier::zkVerifyCalcCtHashesPackedCall::abi_encode_returns(&(hashes,))
    }

    /// `(allowed, plaintext)` for a decrypter query.
    fn lookup(&self, ct_hash: &U256) -> anyhow::Result<(bool, U256)> {
        let state = self.lock()?;
        let plaintext = state.plaintexts.get(ct_hash).copied();
        let allowed = plaintext.is_some() && !state.denied.contains(ct_hash);
        Ok((allowed, plaintext.unwrap_or(U256::ZERO)))
    }

    fn query(&self, call: IMockQueryDecrypterCalls) -> anyhow::Result<Vec<u8>> {
        match call {
            IMockQueryDecrypterCalls::querySealOutput(call) => {
                let (allowed, value) = self.lookup(&call.ctHash)?;
                let mask = U256::from_be_bytes(call.permission.sealingKey.0);
                let sealed = B256::from((value ^ mask).to_be_bytes::<32>());
                Ok(IMockQueryDecrypter::querySealOutputCall::abi_encode_returns(&(
                    allowed,
                    String::new(),
                    sealed,
                )))
            }
            IMockQueryDecrypterCalls::queryDecrypt(call) => {
                let (allowed, value) = self.lookup(&call.ctHash)?;
                Ok(IMockQueryDecrypter::queryDecryptCall::abi_encode_returns(&(
                    allowed,
                    String::new(),
                    value,
                )))
            }
            IMockQueryDecrypterCalls::exists(_) => {
                Ok(IMockQueryDecrypter::existsCall::abi_encode_returns(&(true,)))
            }
        }
    }
}

#[async_trait]
impl Provider for MockChain {
    async fn chain_id(&self) -> anyhow::Result<u64> {
        Ok(self.chain_id)
    }

    async fn call(&self, request: &CallRequest) -> anyhow::Result<Vec<u8>> {
        let data = request.data.as_slice();

        if request.to == TASK_MANAGER_ADDRESS
            && data.starts_with(&ITaskManager::aclCall::SELECTOR)
        {
            return Ok(ITaskManager::aclCall::abi_encode_returns(&(MOCK_ACL_ADDRESS,)));
        }

        if request.to == MOCK_ACL_ADDRESS && data.starts_with(&IAcl::eip712DomainCall::SELECTOR) {
            let version = self.lock()?.domain_version.clone();
            return Ok(IAcl::eip712DomainCall::abi_encode_returns(&(
                FixedBytes([0x0f]),
                self.domain_name.clone(),
                version,
                U256::from(self.chain_id),
                MOCK_ACL_ADDRESS,
                B256::ZERO,
                Vec::<U256>::new(),
            )));
        }

        if !self.mock_contracts {
            bail!("call to {} reverted: no code", request.to);
        }

        if request.to == MOCK_ZK_VERIFIER_ADDRESS {
            return match IMockZkVerifierCalls::abi_decode(data, true)
                .context("mock verifier call reverted")?
            {
                IMockZkVerifierCalls::exists(_) => {
                    Ok(IMockZkVerifier::existsCall::abi_encode_returns(&(true,)))
                }
                IMockZkVerifierCalls::zkVerifyCalcCtHashesPacked(call) => {
                    Ok(Self::calc_ct_hashes(call))
                }
                IMockZkVerifierCalls::insertPackedCtHashes(_) => {
                    bail!("insertPackedCtHashes is not a view function")
                }
            };
        }

        if request.to == MOCK_QUERY_DECRYPTER_ADDRESS {
            let call = IMockQueryDecrypterCalls::abi_decode(data, true)
                .context("mock decrypter call reverted")?;
            return self.query(call);
        }

        bail!("call to {} reverted: unknown function", request.to)
    }

    async fn send(
        &self,
        method: &str,
        _params: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        match method {
            "eth_chainId" => Ok(serde_json::Value::String(format!("0x{:x}", self.chain_id))),
            other => bail!("unsupported method {}", other),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Local signer
// ─────────────────────────────────────────────────────────────────────────────

/// A secp256k1 account that signs locally.
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
    chain: Option<Arc<MockChain>>,
}

impl LocalSigner {
    /// Signer for a raw 32-byte private key.
    pub fn from_bytes(secret: &[u8; 32]) -> anyhow::Result<Self> {
        let key = SigningKey::from_slice(secret).map_err(|e| anyhow!("invalid key: {}", e))?;
        Ok(Self::from_key(key))
    }

    /// Signer for a fresh random key.
    pub fn random() -> Self {
        Self::from_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    fn from_key(key: SigningKey) -> Self {
        let point = key.verifying_key().to_encoded_point(false);
        let address = Address::from_raw_public_key(&point.as_bytes()[1..]);
        Self {
            key,
            address,
            chain: None,
        }
    }

    /// Send transactions to `chain`.
    pub fn connect(mut self, chain: Arc<MockChain>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest: `0x` ‖ r ‖ s ‖ (27 + recid).
    pub fn sign_digest(&self, digest: &[u8; 32]) -> anyhow::Result<String> {
        let (signature, recid) = self
            .key
            .sign_prehash_recoverable(digest)
            .map_err(|e| anyhow!("signing failed: {}", e))?;
        Ok(format!(
            "0x{}{:02x}",
            hex::encode(signature.to_bytes()),
            recid.to_byte() + 27
        ))
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn address(&self) -> anyhow::Result<Address> {
        Ok(self.address)
    }

    async fn sign_typed_data(&self, data: &TypedData) -> anyhow::Result<String> {
        self.sign_digest(&data.signing_hash().0)
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> anyhow::Result<String> {
        let chain = self.chain.as_ref().context("signer not connected to a chain")?;
        chain.execute(self.address, tx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Recording ZK strategy
// ─────────────────────────────────────────────────────────────────────────────

/// A call observed by [`RecordingZk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZkCall {
    Pack(Vec<EncryptableItem>),
    Prove {
        address: Address,
        security_zone: u8,
        chain_id: u64,
    },
    Verify {
        verifier_url: String,
        address: Address,
        security_zone: u8,
        chain_id: u64,
    },
}

/// Which stage of [`RecordingZk`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZkStage {
    Pack,
    Prove,
    Verify,
}

/// A [`ZkStrategy`] that records its inputs and returns one synthetic result
/// per item: `ct_hash = i + 1`.
#[derive(Default)]
pub struct RecordingZk {
    calls: Mutex<Vec<ZkCall>>,
    fail_at: Option<ZkStage>,
}

impl RecordingZk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail at `stage` with the message `"{stage:?} failed"`.
    pub fn failing_at(stage: ZkStage) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_at: Some(stage),
        }
    }

    pub fn calls(&self) -> Vec<ZkCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: ZkCall) -> anyhow::Result<()> {
        self.calls
            .lock()
            .map_err(|_| anyhow!("recorder poisoned"))?
            .push(call);
        Ok(())
    }

    fn check(&self, stage: ZkStage) -> anyhow::Result<()> {
        if self.fail_at == Some(stage) {
            bail!("{:?} failed", stage);
        }
        Ok(())
    }
}

#[async_trait]
impl ZkStrategy for RecordingZk {
    type Builder = Vec<EncryptableItem>;
    type Proven = Vec<EncryptableItem>;

    fn pack(&self, items: &[EncryptableItem]) -> anyhow::Result<Self::Builder> {
        self.record(ZkCall::Pack(items.to_vec()))?;
        self.check(ZkStage::Pack)?;
        Ok(items.to_vec())
    }

    async fn prove(
        &self,
        builder: Self::Builder,
        address: &Address,
        security_zone: u8,
        chain_id: u64,
    ) -> anyhow::Result<Self::Proven> {
        self.record(ZkCall::Prove {
            address: *address,
            security_zone,
            chain_id,
        })?;
        self.check(ZkStage::Prove)?;
        Ok(builder)
    }

    async fn verify(
        &self,
        verifier_url: &str,
        proven: Self::Proven,
        address: &Address,
        security_zone: u8,
        chain_id: u64,
    ) -> anyhow::Result<Vec<VerifyResult>> {
        self.record(ZkCall::Verify {
            verifier_url: verifier_url.to_string(),
            address: *address,
            security_zone,
            chain_id,
        })?;
        self.check(ZkStage::Verify)?;
        Ok((0..proven.len())
            .map(|i| VerifyResult {
                ct_hash: U256::from(i as u64 + 1),
                signature: format!("0x{}", "00".repeat(65)),
            })
            .collect())
    }
}
