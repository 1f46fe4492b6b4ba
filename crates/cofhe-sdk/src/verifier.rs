//! HTTP client for the ZK verifier service.
//!
//! The verifier checks a proven compact ciphertext list against its ZkPoK
//! metadata and returns one signed ciphertext hash per packed value.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cofhe_core::{concat_sig_recid, u256_dec, Address, U256};

use crate::error::{CofheError, Result};
use crate::zk::VerifyResult;

#[derive(Serialize)]
struct VerifyRequest<'a> {
    packed_list: String,
    account_addr: &'a str,
    security_zone: u8,
    chain_id: u64,
}

#[derive(Deserialize)]
struct VerifyResponse {
    status: String,
    #[serde(default)]
    data: Vec<VerifyResultRaw>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct VerifyResultRaw {
    #[serde(with = "u256_dec")]
    ct_hash: U256,
    signature: String,
    recid: u8,
}

/// Client for `{verifier}/verify` and `{verifier}/signerAddress`.
#[derive(Clone, Default)]
pub struct ZkVerifierClient {
    client: Client,
}

impl ZkVerifierClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_http_client(client: Client) -> Self {
        Self { client }
    }

    /// Submit a serialized proven list for verification.
    pub async fn verify(
        &self,
        verifier_url: &str,
        packed_list: &[u8],
        address: &Address,
        security_zone: u8,
        chain_id: u64,
    ) -> Result<Vec<VerifyResult>> {
        let url = format!("{}/verify", verifier_url);
        let account = address.to_checksum(None);
        let body = VerifyRequest {
            packed_list: hex::encode(packed_list),
            account_addr: &account,
            security_zone,
            chain_id,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CofheError::ZkVerifyFailed(format!("ZK proof verification failed: {e}")))?;

        let status = response.status();
        debug!(%url, %status, bytes = packed_list.len(), "zk verify response");

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CofheError::ZkVerifyFailed(format!(
                "HTTP error! ZK proof verification failed - {}",
                text
            )));
        }

        let parsed: VerifyResponse = response.json().await.map_err(|e| {
            CofheError::ZkVerifyFailed(format!("ZK proof verification response malformed - {e}"))
        })?;

        if parsed.status != "success" {
            return Err(CofheError::ZkVerifyFailed(format!(
                "ZK proof verification response malformed - {}",
                parsed.error.unwrap_or_default()
            )));
        }

        parsed
            .data
            .into_iter()
            .map(|raw| {
                let signature = concat_sig_recid(&raw.signature, raw.recid).map_err(|e| {
                    CofheError::ZkVerifyFailed(format!(
                        "ZK proof verification response malformed - {e}"
                    ))
                })?;
                Ok(VerifyResult {
                    ct_hash: raw.ct_hash,
                    signature,
                })
            })
            .collect()
    }

    /// Check the verifier is reachable. Any non-2xx status is an error.
    pub async fn check_signer_address(&self, verifier_url: &str) -> Result<()> {
        let url = format!("{}/signerAddress", verifier_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CofheError::internal("verifier signerAddress request failed", e))?;

        let status = response.status();
        debug!(%url, %status, "verifier signerAddress");

        if !status.is_success() {
            return Err(CofheError::internal(
                "verifier signerAddress request failed",
                anyhow::anyhow!("HTTP error! status: {}", status),
            ));
        }
        Ok(())
    }
}
