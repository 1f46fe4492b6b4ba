//! Client for a Lux FHE server running in threshold mode.
//!
//! The server encrypts and evaluates on its own key. Decryption goes through
//! the t-chain, a network of FHE parties that decrypt jointly, and proofs
//! through the z-chain coprocessor. Both chains sit behind the server by
//! default:
//!
//! | Call                  | Endpoint                    |
//! |-----------------------|-----------------------------|
//! | [`health`]            | `GET  {server}/health`      |
//! | [`public_key`]        | `GET  {server}/publickey`   |
//! | [`encrypt`]           | `POST {server}/encrypt`     |
//! | [`evaluate`]          | `POST {server}/evaluate`    |
//! | [`threshold_decrypt`] | `POST {t-chain}/decrypt`    |
//! | [`threshold_parties`] | `GET  {t-chain}/parties`    |
//! | [`zk_prove`]          | `POST {z-chain}/prove`      |
//! | [`zk_verify`]         | `POST {z-chain}/verify`     |
//!
//! Ciphertexts travel as raw response bodies and go back up as JSON arrays of
//! bytes.
//!
//! [`health`]: LuxFheClient::health
//! [`public_key`]: LuxFheClient::public_key
//! [`encrypt`]: LuxFheClient::encrypt
//! [`evaluate`]: LuxFheClient::evaluate
//! [`threshold_decrypt`]: LuxFheClient::threshold_decrypt
//! [`threshold_parties`]: LuxFheClient::threshold_parties
//! [`zk_prove`]: LuxFheClient::zk_prove
//! [`zk_verify`]: LuxFheClient::zk_verify

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use cofhe_core::{u256_dec, U256};

use crate::error::{CofheError, Result};

/// Public Lux FHE endpoint.
pub const DEFAULT_LUX_FHE_URL: &str = "https://fhe.lux.network";

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Integer widths the server encrypts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FheUintType {
    U4,
    U8,
    U16,
    U32,
    U64,
    U128,
    U160,
    U256,
}

impl FheUintType {
    pub fn bits(self) -> u16 {
        match self {
            FheUintType::U4 => 4,
            FheUintType::U8 => 8,
            FheUintType::U16 => 16,
            FheUintType::U32 => 32,
            FheUintType::U64 => 64,
            FheUintType::U128 => 128,
            FheUintType::U160 => 160,
            FheUintType::U256 => 256,
        }
    }

    pub fn from_bits(bits: u16) -> Option<Self> {
        Some(match bits {
            4 => FheUintType::U4,
            8 => FheUintType::U8,
            16 => FheUintType::U16,
            32 => FheUintType::U32,
            64 => FheUintType::U64,
            128 => FheUintType::U128,
            160 => FheUintType::U160,
            256 => FheUintType::U256,
            _ => return None,
        })
    }
}

/// A server-side ciphertext and the width it encrypts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedUint {
    pub data: Vec<u8>,
    pub bit_width: FheUintType,
}

impl EncryptedUint {
    pub fn from_bytes(data: Vec<u8>, bit_width: FheUintType) -> Self {
        Self { data, bit_width }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Homomorphic operations `evaluate` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FheOp {
    Add,
    Sub,
    Eq,
    Lt,
    Gt,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
}

/// Proof systems the z-chain produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZkProofType {
    #[default]
    Groth16,
    Plonk,
    Fflonk,
}

/// Options for a t-chain decryption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdDecryptOptions {
    /// Minimum number of parties that must take part.
    pub threshold: Option<u32>,
    /// Where the t-chain posts the result when decrypting asynchronously.
    pub callback_url: Option<String>,
}

/// `GET /health` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub threshold: bool,
    pub parties: u32,
    #[serde(default)]
    pub t_chain_connected: Option<bool>,
    #[serde(default)]
    pub z_chain_connected: Option<bool>,
}

/// One decryption party on the t-chain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdParty {
    pub id: u32,
    pub public_key: Vec<u8>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire bodies
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EncryptBody {
    value: u64,
    bit_width: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateBody<'a> {
    op: FheOp,
    left: &'a [u8],
    #[serde(skip_serializing_if = "Option::is_none")]
    right: Option<&'a [u8]>,
    bit_width: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThresholdDecryptBody<'a> {
    ciphertext: &'a [u8],
    #[serde(skip_serializing_if = "Option::is_none")]
    threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ZkProveBody<'a> {
    ciphertext: &'a [u8],
    #[serde(skip_serializing_if = "Option::is_none")]
    public_inputs: Option<&'a [u8]>,
    proof_type: ZkProofType,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ZkVerifyBody<'a> {
    proof: &'a [u8],
    #[serde(skip_serializing_if = "Option::is_none")]
    public_inputs: Option<&'a [u8]>,
}

#[derive(Deserialize)]
struct DecryptedValue {
    #[serde(with = "u256_dec")]
    value: U256,
}

#[derive(Deserialize)]
struct VerifiedResponse {
    #[serde(default)]
    verified: Option<bool>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Where the server and its chains live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LuxFheConfig {
    pub server_url: String,
    /// Defaults to `{server_url}/threshold`.
    #[serde(default)]
    pub t_chain_url: Option<String>,
    /// Defaults to `{server_url}/zk`.
    #[serde(default)]
    pub z_chain_url: Option<String>,
    #[serde(default = "default_threshold_mode")]
    pub threshold_mode: bool,
}

fn default_threshold_mode() -> bool {
    true
}

impl Default for LuxFheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LUX_FHE_URL)
    }
}

impl LuxFheConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            t_chain_url: None,
            z_chain_url: None,
            threshold_mode: true,
        }
    }
}

/// Client for one Lux FHE server.
pub struct LuxFheClient {
    client: Client,
    server_url: String,
    t_chain_url: String,
    z_chain_url: String,
    threshold_mode: bool,
    public_key: OnceCell<Vec<u8>>,
}

impl LuxFheClient {
    pub fn new(config: LuxFheConfig) -> Self {
        Self::with_http_client(config, Client::new())
    }

    /// A threshold-mode client for `server_url`.
    pub fn threshold(server_url: impl Into<String>) -> Self {
        Self::new(LuxFheConfig::new(server_url))
    }

    /// `config` with threshold mode forced on.
    pub fn threshold_with_config(config: LuxFheConfig) -> Self {
        Self::new(LuxFheConfig {
            threshold_mode: true,
            ..config
        })
    }

    pub fn with_http_client(config: LuxFheConfig, client: Client) -> Self {
        let server_url = config.server_url.trim_end_matches('/').to_string();
        let t_chain_url = config
            .t_chain_url
            .unwrap_or_else(|| format!("{}/threshold", server_url));
        let z_chain_url = config.z_chain_url.unwrap_or_else(|| format!("{}/zk", server_url));
        Self {
            client,
            server_url,
            t_chain_url,
            z_chain_url,
            threshold_mode: config.threshold_mode,
            public_key: OnceCell::new(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn t_chain_url(&self) -> &str {
        &self.t_chain_url
    }

    pub fn z_chain_url(&self) -> &str {
        &self.z_chain_url
    }

    pub fn threshold_mode(&self) -> bool {
        self.threshold_mode
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.server_url);
        let response = self.get(&url).await?;
        if !response.status().is_success() {
            return Err(lux_error(format!("Health check failed: {}", response.status())));
        }
        response
            .json()
            .await
            .map_err(|e| CofheError::internal("Health check returned malformed JSON", e))
    }

    /// The server's public key. Fetched once, then cached.
    pub async fn public_key(&self) -> Result<Vec<u8>> {
        self.public_key
            .get_or_try_init(|| async {
                let url = format!("{}/publickey", self.server_url);
                let response = self.get(&url).await?;
                if !response.status().is_success() {
                    return Err(CofheError::FheKeyNotFound(format!(
                        "Failed to fetch public key: {}",
                        response.status()
                    )));
                }
                body_bytes(response).await
            })
            .await
            .cloned()
    }

    /// Encrypt `value` on the server.
    pub async fn encrypt(&self, value: u64, bit_width: FheUintType) -> Result<EncryptedUint> {
        let url = format!("{}/encrypt", self.server_url);
        let body = EncryptBody {
            value,
            bit_width: bit_width.bits(),
        };
        let response = self.post(&url, &body).await?;
        let data = expect_bytes(response, "Encryption failed", lux_error).await?;
        Ok(EncryptedUint::from_bytes(data, bit_width))
    }

    /// Apply `op` to `left` and, for binary operations, `right`.
    pub async fn evaluate(
        &self,
        op: FheOp,
        left: &EncryptedUint,
        right: Option<&EncryptedUint>,
    ) -> Result<EncryptedUint> {
        let url = format!("{}/evaluate", self.server_url);
        let body = EvaluateBody {
            op,
            left: left.as_bytes(),
            right: right.map(EncryptedUint::as_bytes),
            bit_width: left.bit_width.bits(),
        };
        let response = self.post(&url, &body).await?;
        let data = expect_bytes(response, "Evaluation failed", lux_error).await?;
        Ok(EncryptedUint::from_bytes(data, left.bit_width))
    }

    /// Decrypt through the t-chain parties.
    pub async fn threshold_decrypt(
        &self,
        ciphertext: &[u8],
        options: &ThresholdDecryptOptions,
    ) -> Result<U256> {
        let url = format!("{}/decrypt", self.t_chain_url);
        let body = ThresholdDecryptBody {
            ciphertext,
            threshold: options.threshold,
            callback_url: options.callback_url.as_deref(),
        };
        let response = self.post(&url, &body).await?;
        decrypted_value(response, "Threshold decryption failed").await
    }

    pub async fn threshold_parties(&self) -> Result<Vec<ThresholdParty>> {
        let url = format!("{}/parties", self.t_chain_url);
        let response = self.get(&url).await?;
        if !response.status().is_success() {
            return Err(lux_error(format!("Failed to fetch parties: {}", response.status())));
        }
        response
            .json()
            .await
            .map_err(|e| CofheError::internal("Threshold parties malformed", e))
    }

    /// Prove `ciphertext` on the z-chain.
    pub async fn zk_prove(
        &self,
        ciphertext: &[u8],
        public_inputs: Option<&[u8]>,
        proof_type: ZkProofType,
    ) -> Result<Vec<u8>> {
        let url = format!("{}/prove", self.z_chain_url);
        let body = ZkProveBody {
            ciphertext,
            public_inputs,
            proof_type,
        };
        let response = self.post(&url, &body).await?;
        expect_bytes(response, "ZK proof generation failed", CofheError::ZkVerifyFailed).await
    }

    /// True only if the z-chain answers 2xx with `verified: true`.
    pub async fn zk_verify(&self, proof: &[u8], public_inputs: Option<&[u8]>) -> Result<bool> {
        let url = format!("{}/verify", self.z_chain_url);
        let body = ZkVerifyBody {
            proof,
            public_inputs,
        };
        let response = self.post(&url, &body).await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let verified = response
            .json::<VerifiedResponse>()
            .await
            .map_err(|e| CofheError::internal("ZK verify response malformed", e))?;
        Ok(verified.verified == Some(true))
    }

    /// Threshold decryption in threshold mode, else `POST {server}/decrypt`
    /// with the raw ciphertext.
    pub async fn decrypt(&self, ciphertext: &[u8]) -> Result<U256> {
        if self.threshold_mode {
            return self
                .threshold_decrypt(ciphertext, &ThresholdDecryptOptions::default())
                .await;
        }

        let url = format!("{}/decrypt", self.server_url);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(ciphertext.to_vec())
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;
        debug!(%url, status = %response.status(), "lux fhe response");
        decrypted_value(response, "Decryption failed").await
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;
        debug!(%url, status = %response.status(), "lux fhe response");
        Ok(response)
    }

    async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Response> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;
        debug!(%url, status = %response.status(), "lux fhe response");
        Ok(response)
    }
}

fn lux_error(message: String) -> CofheError {
    CofheError::internal("Lux FHE request failed", anyhow::anyhow!("{}", message))
}

fn request_error(url: &str, source: reqwest::Error) -> CofheError {
    CofheError::internal(format!("Lux FHE request to {} failed", url), source)
}

async fn body_bytes(response: Response) -> Result<Vec<u8>> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| CofheError::internal("Lux FHE response body unreadable", e))?;
    Ok(bytes.to_vec())
}

/// The body of a 2xx response; otherwise `fail("{context}: {body text}")`.
async fn expect_bytes(
    response: Response,
    context: &str,
    fail: fn(String) -> CofheError,
) -> Result<Vec<u8>> {
    if !response.status().is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(fail(format!("{}: {}", context, text)));
    }
    body_bytes(response).await
}

async fn decrypted_value(response: Response, context: &str) -> Result<U256> {
    if !response.status().is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(CofheError::DecryptFailed(format!("{}: {}", context, text)));
    }
    let decrypted = response.json::<DecryptedValue>().await.map_err(|e| {
        CofheError::DecryptFailed(format!("{}: malformed response: {}", context, e))
    })?;
    Ok(decrypted.value)
}
