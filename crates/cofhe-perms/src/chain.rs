//! Chain collaborators: the provider and signer the client talks through.
//!
//! These are implemented outside this workspace (by whichever Ethereum client
//! library the application uses) and injected as trait objects. Failures are
//! opaque `anyhow` errors; callers wrap them into their own error kinds.
//!
//! Contract calls are declared with `sol!` and encoded through
//! [`alloy_sol_types::SolCall`].

use alloy_sol_types::SolCall;
use async_trait::async_trait;

use cofhe_core::Address;

use crate::eip712::TypedData;
use crate::error::{PermsError, Result};

/// A read-only contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub to: Address,
    pub data: Vec<u8>,
}

impl CallRequest {
    /// ABI-encode `call` (selector included) against `to`.
    pub fn new<C: SolCall>(to: Address, call: &C) -> Self {
        Self {
            to,
            data: call.abi_encode(),
        }
    }
}

/// A state-changing transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: Address,
    pub data: Vec<u8>,
}

impl TransactionRequest {
    pub fn new<C: SolCall>(to: Address, call: &C) -> Self {
        Self {
            to,
            data: call.abi_encode(),
        }
    }
}

/// Read access to a chain.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The connected chain's id.
    async fn chain_id(&self) -> anyhow::Result<u64>;

    /// Execute a read-only call and return the raw return data.
    async fn call(&self, request: &CallRequest) -> anyhow::Result<Vec<u8>>;

    /// Send a raw JSON-RPC request.
    async fn send(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;
}

/// An account able to sign and send.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The signing account's address.
    async fn address(&self) -> anyhow::Result<Address>;

    /// Produce an EIP-712 signature (`0x`-prefixed, 65 bytes).
    async fn sign_typed_data(&self, data: &TypedData) -> anyhow::Result<String>;

    /// Submit a transaction, returning its hash.
    async fn send_transaction(&self, tx: &TransactionRequest) -> anyhow::Result<String>;
}

/// Call `call` on `to` and decode its return values.
pub async fn call_and_decode<C: SolCall + Sync>(
    provider: &dyn Provider,
    to: Address,
    call: &C,
) -> Result<C::Return> {
    let request = CallRequest::new(to, call);
    let data = provider.call(&request).await.map_err(PermsError::Chain)?;
    Ok(C::abi_decode_returns(&data, true)?)
}
