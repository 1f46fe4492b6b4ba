//! The pack/prove/verify strategy injected into the encrypt pipeline.
//!
//! The client does not know the proof system. It hands the extracted items to
//! a [`ZkStrategy`], threads the opaque builder and proof values between the
//! three calls, and gets back one [`VerifyResult`] per item.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cofhe_core::{u256_dec, Address, EncryptableItem, U256};

use crate::verifier::ZkVerifierClient;

/// A verified ciphertext hash and the verifier's signature over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    #[serde(with = "u256_dec")]
    pub ct_hash: U256,
    /// `0x`-prefixed, recovery byte last.
    pub signature: String,
}

/// Pack, prove and verify a list of encryptable items.
///
/// Implementations must return verify results aligned index-for-index with
/// the items passed to [`ZkStrategy::pack`].
#[async_trait]
pub trait ZkStrategy: Send + Sync {
    /// Opaque output of `pack`.
    type Builder: Send;
    /// Opaque output of `prove`.
    type Proven: Send;

    fn pack(&self, items: &[EncryptableItem]) -> anyhow::Result<Self::Builder>;

    async fn prove(
        &self,
        builder: Self::Builder,
        address: &Address,
        security_zone: u8,
        chain_id: u64,
    ) -> anyhow::Result<Self::Proven>;

    async fn verify(
        &self,
        verifier_url: &str,
        proven: Self::Proven,
        address: &Address,
        security_zone: u8,
        chain_id: u64,
    ) -> anyhow::Result<Vec<VerifyResult>>;
}

/// A strategy whose packer and prover produce a serialized compact list and
/// whose verifier posts it to the verifier service.
///
/// `pack_prove` is the proof-system binding: it receives the items and the
/// proof metadata triple and returns the serialized proven list.
pub struct CompactListStrategy<F> {
    pack_prove: F,
    client: ZkVerifierClient,
}

impl<F> CompactListStrategy<F>
where
    F: Fn(&[EncryptableItem], &Address, u8, u64) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    pub fn new(pack_prove: F) -> Self {
        Self {
            pack_prove,
            client: ZkVerifierClient::new(),
        }
    }

    pub fn with_client(pack_prove: F, client: ZkVerifierClient) -> Self {
        Self { pack_prove, client }
    }
}

#[async_trait]
impl<F> ZkStrategy for CompactListStrategy<F>
where
    F: Fn(&[EncryptableItem], &Address, u8, u64) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    type Builder = Vec<EncryptableItem>;
    type Proven = Vec<u8>;

    fn pack(&self, items: &[EncryptableItem]) -> anyhow::Result<Self::Builder> {
        for item in items {
            item.validate()?;
        }
        Ok(items.to_vec())
    }

    async fn prove(
        &self,
        builder: Self::Builder,
        address: &Address,
        security_zone: u8,
        chain_id: u64,
    ) -> anyhow::Result<Self::Proven> {
        (self.pack_prove)(&builder, address, security_zone, chain_id)
    }

    async fn verify(
        &self,
        verifier_url: &str,
        proven: Self::Proven,
        address: &Address,
        security_zone: u8,
        chain_id: u64,
    ) -> anyhow::Result<Vec<VerifyResult>> {
        Ok(self
            .client
            .verify(verifier_url, &proven, address, security_zone, chain_id)
            .await?)
    }
}
