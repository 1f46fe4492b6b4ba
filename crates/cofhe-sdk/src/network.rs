//! HTTP clients for the CoFHE key server and the threshold network.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cofhe_core::{U256Ext, U256};
use cofhe_perms::{EthEncryptedData, Permission};

use crate::error::{CofheError, Result};

/// FHE public keys shorter than this (in hex characters) are rejected.
pub const PUBLIC_KEY_LENGTH_MIN: usize = 15_000;

// ─────────────────────────────────────────────────────────────────────────────
// Key server
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyRequest {
    security_zone: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyResponse {
    public_key: Option<String>,
}

#[derive(Deserialize)]
struct CrsResponse {
    crs: Option<String>,
}

/// The network material needed to pack and prove for one security zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkKeys {
    /// Hex-encoded FHE public key.
    pub public_key: String,
    /// Hex-encoded compact PKE CRS.
    pub crs: String,
}

/// Client for `{cofhe}/GetNetworkPublicKey` and `{cofhe}/GetCrs`.
#[derive(Clone, Default)]
pub struct KeyServerClient {
    client: Client,
}

impl KeyServerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetch and sanity-check the public key and CRS for `security_zone`.
    pub async fn fetch_keys(&self, cofhe_url: &str, security_zone: u8) -> Result<NetworkKeys> {
        let body = KeyRequest { security_zone };

        let public_key = self
            .post::<PublicKeyResponse>(cofhe_url, "GetNetworkPublicKey", &body)
            .await
            .map_err(|e| key_error("fetching FHE publicKey from CoFHE failed", e))?
            .public_key;

        let crs = self
            .post::<CrsResponse>(cofhe_url, "GetCrs", &body)
            .await
            .map_err(|e| key_error("fetching CRS from CoFHE failed", e))?
            .crs;

        let public_key = public_key.ok_or_else(|| {
            key_error_msg("FHE publicKey fetched from CoFHE invalid: missing or not a string")
        })?;

        if public_key == "0x" {
            return Err(key_error_msg(
                "provided chain is not FHE enabled, no FHE publicKey found",
            ));
        }

        if public_key.len() < PUBLIC_KEY_LENGTH_MIN {
            return Err(key_error_msg(&format!(
                "got shorter than expected FHE publicKey: {}. Expected length >= {}",
                public_key.len(),
                PUBLIC_KEY_LENGTH_MIN
            )));
        }

        let crs = crs.ok_or_else(|| {
            key_error_msg("CRS fetched from CoFHE invalid: missing or not a string")
        })?;

        Ok(NetworkKeys { public_key, crs })
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        base: &str,
        endpoint: &str,
        body: &KeyRequest,
    ) -> std::result::Result<T, reqwest::Error> {
        let url = format!("{}/{}", base, endpoint);
        let response = self.client.post(&url).json(body).send().await?;
        debug!(%url, status = %response.status(), "key server response");
        response.json().await
    }
}

fn key_error(message: &str, source: reqwest::Error) -> CofheError {
    CofheError::internal(format!("Error initializing client; {}", message), source)
}

fn key_error_msg(message: &str) -> CofheError {
    CofheError::internal(
        "Error initializing client",
        anyhow::anyhow!("{}", message.to_string()),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Threshold network
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct QueryRequest<'a> {
    /// Ciphertext hash, 64 hex characters, no prefix.
    ct_tempkey: String,
    host_chain_id: u64,
    permit: &'a Permission,
}

impl<'a> QueryRequest<'a> {
    fn new(ct_hash: U256, chain_id: u64, permission: &'a Permission) -> Self {
        Self {
            ct_tempkey: ct_hash.to_padded_hex(),
            host_chain_id: chain_id,
            permit: permission,
        }
    }
}

#[derive(Deserialize)]
struct SealOutputResponse {
    #[serde(default)]
    sealed: Option<EthEncryptedData>,
}

#[derive(Deserialize)]
struct DecryptResponse {
    #[serde(default)]
    decrypted: Option<Vec<u8>>,
    encryption_type: Option<u8>,
}

/// A value decrypted by the threshold network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decrypted {
    pub value: U256,
    /// The utype tag the network says the ciphertext has.
    pub encryption_type: u8,
}

/// Client for `{tn}/sealoutput` and `{tn}/decrypt`.
#[derive(Clone, Default)]
pub struct ThresholdNetworkClient {
    client: Client,
}

impl ThresholdNetworkClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_client(client: Client) -> Self {
        Self { client }
    }

    /// Ask the network to reseal `ct_hash` to the permit's sealing key.
    pub async fn seal_output(
        &self,
        url: &str,
        ct_hash: U256,
        chain_id: u64,
        permission: &Permission,
    ) -> Result<EthEncryptedData> {
        let response: SealOutputResponse = self
            .query(url, "sealoutput", &QueryRequest::new(ct_hash, chain_id, permission))
            .await
            .map_err(|e| {
                debug!(error = %e, "sealoutput request failed");
                CofheError::SealOutputFailed("sealOutput request failed".to_string())
            })?;

        response
            .sealed
            .ok_or_else(|| CofheError::SealOutputReturnedNull("sealed data not found".to_string()))
    }

    /// Ask the network to decrypt `ct_hash` in the clear.
    pub async fn decrypt(
        &self,
        url: &str,
        ct_hash: U256,
        chain_id: u64,
        permission: &Permission,
    ) -> Result<Decrypted> {
        let response: DecryptResponse = self
            .query(url, "decrypt", &QueryRequest::new(ct_hash, chain_id, permission))
            .await
            .map_err(|e| {
                debug!(error = %e, "decrypt request failed");
                CofheError::DecryptFailed("decrypt request failed".to_string())
            })?;

        let (Some(bytes), Some(encryption_type)) = (response.decrypted, response.encryption_type)
        else {
            return Err(CofheError::DecryptReturnedNull(
                "decrypted data not found".to_string(),
            ));
        };

        let value = U256::try_from_be_slice(&bytes).ok_or_else(|| {
            CofheError::DecryptFailed(format!(
                "decrypt request failed: {} byte value does not fit in 256 bits",
                bytes.len()
            ))
        })?;

        Ok(Decrypted {
            value,
            encryption_type,
        })
    }

    async fn query<T: for<'de> Deserialize<'de>>(
        &self,
        base: &str,
        endpoint: &str,
        body: &QueryRequest<'_>,
    ) -> std::result::Result<T, reqwest::Error> {
        let url = format!("{}/{}", base, endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        debug!(%url, status = %response.status(), "threshold network response");
        response.json().await
    }
}
