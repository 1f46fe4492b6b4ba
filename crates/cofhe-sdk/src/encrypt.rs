//! The encrypt pipeline: Extract → Pack → Prove → Verify → Replace → Done.
//!
//! ## Overview
//!
//! [`EncryptInputsBuilder`] holds a nested input structure and runs the six
//! steps in order when [`EncryptInputsBuilder::encrypt`] is called. Every
//! encryptable leaf is replaced by a verified [`CoFheInItem`]; every other
//! leaf is passed through.
//!
//! On a mock chain Pack, Prove and Verify are replaced by a round trip to the
//! mock verifier contract, with configurable delays between them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cofhe_sdk::{EncryptInputsBuilder, EncryptStep, ZkStrategy};
//! use cofhe_sdk::core::{Address, Encryptable, EncryptInput};
//!
//! async fn example<Z: ZkStrategy>(zk: Arc<Z>, sender: Address) {
//!     let input: EncryptInput = vec![Encryptable::uint128(100)].into();
//!     let mut builder =
//!         EncryptInputsBuilder::new(input, sender, 1, "https://verifier.example", zk);
//!
//!     let output = builder
//!         .set_security_zone(0)
//!         .set_step_callback(|step: EncryptStep| {
//!             println!("{step}");
//!             Ok(())
//!         })
//!         .encrypt()
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - Steps run strictly in sequence; the step callback fires on entry to each
//! - The first failing step aborts the run; later callbacks do not fire
//! - Setters mutate the builder; `encrypt` can be called again and reuses them

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use cofhe_core::{
    encrypt_extract, encrypt_replace, Address, CoFheInItem, EncryptInput, EncryptOutput,
    EncryptableItem,
};

use crate::config::MockConfig;
use crate::error::{CofheError, Result};
use crate::mock::MockZkVerifier;
use crate::zk::{VerifyResult, ZkStrategy};

/// A pipeline step, reported to the step callback on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptStep {
    Extract,
    Pack,
    Prove,
    Verify,
    Replace,
    Done,
}

impl EncryptStep {
    pub fn as_str(self) -> &'static str {
        match self {
            EncryptStep::Extract => "extract",
            EncryptStep::Pack => "pack",
            EncryptStep::Prove => "prove",
            EncryptStep::Verify => "verify",
            EncryptStep::Replace => "replace",
            EncryptStep::Done => "done",
        }
    }
}

impl fmt::Display for EncryptStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step observer. An error aborts the pipeline.
pub type StepCallback = Arc<dyn Fn(EncryptStep) -> anyhow::Result<()> + Send + Sync>;

struct MockPipeline {
    verifier: MockZkVerifier,
    config: MockConfig,
}

/// Builds and runs one encryption of a nested input.
pub struct EncryptInputsBuilder<Z> {
    inputs: EncryptInput,
    sender: Address,
    chain_id: u64,
    security_zone: u8,
    step_callback: Option<StepCallback>,
    zk_verifier_url: String,
    zk: Arc<Z>,
    mock: Option<MockPipeline>,
}

impl<Z: ZkStrategy> EncryptInputsBuilder<Z> {
    /// A builder for the real pipeline, security zone 0.
    pub fn new(
        inputs: EncryptInput,
        sender: Address,
        chain_id: u64,
        zk_verifier_url: impl Into<String>,
        zk: Arc<Z>,
    ) -> Self {
        Self {
            inputs,
            sender,
            chain_id,
            security_zone: 0,
            step_callback: None,
            zk_verifier_url: zk_verifier_url.into(),
            zk,
            mock: None,
        }
    }

    /// Run the mock pipeline instead of `zk`.
    pub fn with_mock(mut self, verifier: MockZkVerifier, config: MockConfig) -> Self {
        self.mock = Some(MockPipeline { verifier, config });
        self
    }

    /// Override the address the inputs are bound to.
    ///
    /// Defaults to the connected account. Set this when the transaction
    /// consuming the inputs has a different `msg.sender` (e.g. a paymaster).
    pub fn set_sender(&mut self, sender: Address) -> &mut Self {
        self.sender = sender;
        self
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn set_security_zone(&mut self, security_zone: u8) -> &mut Self {
        self.security_zone = security_zone;
        self
    }

    pub fn security_zone(&self) -> u8 {
        self.security_zone
    }

    pub fn set_step_callback<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(EncryptStep) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.step_callback = Some(Arc::new(callback));
        self
    }

    pub fn is_mock(&self) -> bool {
        self.mock.is_some()
    }

    /// Run the pipeline.
    pub async fn encrypt(&self) -> Result<EncryptOutput> {
        match &self.mock {
            Some(mock) => self.encrypt_mock(mock).await,
            None => self.encrypt_real().await,
        }
    }

    async fn encrypt_real(&self) -> Result<EncryptOutput> {
        self.fire(EncryptStep::Extract)?;
        let items = encrypt_extract(&self.inputs);

        self.fire(EncryptStep::Pack)?;
        let builder = self
            .zk
            .pack(&items)
            .map_err(|e| CofheError::from_collaborator("zk pack failed", e))?;

        self.fire(EncryptStep::Prove)?;
        let proven = self
            .zk
            .prove(builder, &self.sender, self.security_zone, self.chain_id)
            .await
            .map_err(|e| CofheError::from_collaborator("zk prove failed", e))?;

        self.fire(EncryptStep::Verify)?;
        let results = self
            .zk
            .verify(
                &self.zk_verifier_url,
                proven,
                &self.sender,
                self.security_zone,
                self.chain_id,
            )
            .await
            .map_err(|e| CofheError::from_collaborator("zk verify failed", e))?;

        self.finish(&items, results)
    }

    async fn encrypt_mock(&self, mock: &MockPipeline) -> Result<EncryptOutput> {
        self.fire(EncryptStep::Extract)?;
        let items = encrypt_extract(&self.inputs);

        self.fire(EncryptStep::Pack)?;
        tokio::time::sleep(mock.config.pack_delay()).await;

        self.fire(EncryptStep::Prove)?;
        tokio::time::sleep(mock.config.prove_delay()).await;

        self.fire(EncryptStep::Verify)?;
        tokio::time::sleep(mock.config.verify_delay()).await;

        let results = mock
            .verifier
            .zk_verify_sign(&self.sender, &items, self.security_zone)
            .await?;

        self.finish(&items, results)
    }

    /// Replace and Done, shared by both pipelines.
    fn finish(
        &self,
        items: &[EncryptableItem],
        results: Vec<VerifyResult>,
    ) -> Result<EncryptOutput> {
        if results.len() < items.len() {
            return Err(CofheError::ZkVerifyFailed(format!(
                "verifier returned {} results for {} items",
                results.len(),
                items.len()
            )));
        }
        let surplus = results.len() - items.len();

        let in_items: Vec<CoFheInItem> = items
            .iter()
            .zip(results)
            .map(|(item, result)| CoFheInItem {
                ct_hash: result.ct_hash,
                security_zone: self.security_zone,
                utype: item.utype,
                signature: result.signature,
            })
            .collect();

        self.fire(EncryptStep::Replace)?;
        let (output, remaining) = encrypt_replace(&self.inputs, in_items)?;

        if !remaining.is_empty() || surplus > 0 {
            return Err(CofheError::EncryptRemainingInItems(
                "Some encrypted inputs remaining after replacement".to_string(),
            ));
        }

        self.fire(EncryptStep::Done)?;
        Ok(output)
    }

    fn fire(&self, step: EncryptStep) -> Result<()> {
        debug!(%step, mock = self.is_mock(), "encrypt step");
        match &self.step_callback {
            Some(callback) => {
                callback(step).map_err(|e| CofheError::from_collaborator("step callback failed", e))
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use cofhe_core::{Encryptable, FheType, Shape, U256};

    use crate::error::ErrorCode;

    /// Returns one result per packed item, or a fixed count if set.
    struct EchoZk {
        result_count: Option<usize>,
        fail_prove: bool,
    }

    #[async_trait]
    impl ZkStrategy for EchoZk {
        type Builder = Vec<EncryptableItem>;
        type Proven = Vec<EncryptableItem>;

        fn pack(&self, items: &[EncryptableItem]) -> anyhow::Result<Self::Builder> {
            Ok(items.to_vec())
        }

        async fn prove(
            &self,
            builder: Self::Builder,
            _address: &Address,
            _security_zone: u8,
            _chain_id: u64,
        ) -> anyhow::Result<Self::Proven> {
            if self.fail_prove {
                anyhow::bail!("prover exploded");
            }
            Ok(builder)
        }

        async fn verify(
            &self,
            _verifier_url: &str,
            proven: Self::Proven,
            _address: &Address,
            _security_zone: u8,
            _chain_id: u64,
        ) -> anyhow::Result<Vec<VerifyResult>> {
            let count = self.result_count.unwrap_or(proven.len());
            Ok((0..count)
                .map(|i| VerifyResult {
                    ct_hash: U256::from(1000u32 + i as u32),
                    signature: format!("0x{:02x}", i),
                })
                .collect())
        }
    }

    fn builder(zk: EchoZk, input: EncryptInput) -> EncryptInputsBuilder<EchoZk> {
        EncryptInputsBuilder::new(input, Address::repeat_byte(0xaa), 1, "http://verifier", Arc::new(zk))
    }

    fn echo() -> EchoZk {
        EchoZk {
            result_count: None,
            fail_prove: false,
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<EncryptStep>>>, impl Fn(EncryptStep) -> anyhow::Result<()>) {
        let steps = Arc::new(Mutex::new(Vec::new()));
        let sink = steps.clone();
        (steps, move |step| {
            sink.lock().unwrap().push(step);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_steps_fire_in_order() {
        let (steps, callback) = recorder();
        let mut b = builder(echo(), vec![Encryptable::uint8(1)].into());
        b.set_step_callback(callback);

        b.encrypt().await.unwrap();

        assert_eq!(
            *steps.lock().unwrap(),
            vec![
                EncryptStep::Extract,
                EncryptStep::Pack,
                EncryptStep::Prove,
                EncryptStep::Verify,
                EncryptStep::Replace,
                EncryptStep::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_replaces_in_place_with_builder_zone() {
        let input = Shape::record([
            ("amount", Encryptable::uint128(100).into()),
            ("memo", Shape::plain("hi")),
            ("flag", Encryptable::bool(true).into()),
        ]);
        let mut b = builder(echo(), input);
        b.set_security_zone(2);

        let output = b.encrypt().await.unwrap();

        let amount = output.field("amount").unwrap().as_encrypted().unwrap();
        assert_eq!(amount.ct_hash, U256::from(1000u32));
        assert_eq!(amount.utype, FheType::Uint128);
        assert_eq!(amount.security_zone, 2);

        let flag = output.field("flag").unwrap().as_encrypted().unwrap();
        assert_eq!(flag.ct_hash, U256::from(1001u32));
        assert_eq!(flag.utype, FheType::Bool);

        assert!(output.field("memo").unwrap().as_encrypted().is_none());
    }

    #[tokio::test]
    async fn test_failure_stops_notifications() {
        let (steps, callback) = recorder();
        let mut b = builder(
            EchoZk {
                result_count: None,
                fail_prove: true,
            },
            vec![Encryptable::uint8(1)].into(),
        );
        b.set_step_callback(callback);

        let err = b.encrypt().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(err.to_string().contains("prover exploded"));
        assert_eq!(steps.lock().unwrap().last(), Some(&EncryptStep::Prove));
    }

    #[tokio::test]
    async fn test_surplus_results_are_rejected() {
        let (steps, callback) = recorder();
        let mut b = builder(
            EchoZk {
                result_count: Some(3),
                fail_prove: false,
            },
            vec![Encryptable::uint8(1)].into(),
        );
        b.set_step_callback(callback);

        let err = b.encrypt().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::EncryptRemainingInItems);
        assert_eq!(steps.lock().unwrap().last(), Some(&EncryptStep::Replace));
    }

    #[tokio::test]
    async fn test_missing_results_are_rejected() {
        let b = builder(
            EchoZk {
                result_count: Some(1),
                fail_prove: false,
            },
            vec![Encryptable::uint8(1), Encryptable::uint8(2)].into(),
        );
        let err = b.encrypt().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ZkVerifyFailed);
    }

    #[tokio::test]
    async fn test_callback_error_aborts() {
        let mut b = builder(echo(), vec![Encryptable::uint8(1)].into());
        b.set_step_callback(|step| {
            if step == EncryptStep::Pack {
                anyhow::bail!("ui gone");
            }
            Ok(())
        });
        let err = b.encrypt().await.unwrap_err();
        assert!(err.to_string().contains("ui gone"));
    }

    #[tokio::test]
    async fn test_setters_persist_across_runs() {
        let mut b = builder(echo(), vec![Encryptable::uint8(1)].into());
        b.set_sender(Address::repeat_byte(0xbb)).set_security_zone(5);
        assert_eq!(b.sender(), Address::repeat_byte(0xbb));

        let first = b.encrypt().await.unwrap();
        let second = b.encrypt().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(b.security_zone(), 5);
    }
}
