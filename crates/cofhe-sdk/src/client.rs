//! The client: unified API for CoFHE.
//!
//! `Cofhe` brings together the stores, the chain collaborators, and the
//! network clients. Every operation after [`Cofhe::initialize`] runs against
//! the chain id and account resolved there.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use cofhe_core::{
    convert_via_utype, parse_address, Address, EncryptInput, FheType, UnsealedValue, U256,
};
use cofhe_perms::{Permission, Permit, PermitOptions, PermitType, Provider, Signer};
use cofhe_store::{KeyStore, PermitStore};

use crate::config::CofheConfig;
use crate::encrypt::EncryptInputsBuilder;
use crate::error::{CofheError, Result};
use crate::mock::{check_is_mock_chain, mock_decrypt, mock_seal_output, MockZkVerifier};
use crate::network::{KeyServerClient, ThresholdNetworkClient};
use crate::verifier::ZkVerifierClient;
use crate::zk::ZkStrategy;

/// Chain collaborators handed to [`Cofhe::initialize`].
#[derive(Clone, Default)]
pub struct InitializationParams {
    /// Required.
    pub provider: Option<Arc<dyn Provider>>,
    /// Without a signer, the client can only read.
    pub signer: Option<Arc<dyn Signer>>,
    /// Sends `insertPackedCtHashes` on a mock chain. Defaults to `signer`.
    pub zkv_signer: Option<Arc<dyn Signer>>,
}

impl InitializationParams {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider: Some(provider),
            ..Default::default()
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_zkv_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.zkv_signer = Some(signer);
        self
    }
}

/// Material a [`ZkStrategy`] needs to pack and prove for the connected chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptKeys {
    /// Security zone 0 public key, hex.
    pub fhe_public_key: String,
    pub crs: String,
    pub cofhe_url: Option<String>,
    pub verifier_url: Option<String>,
    pub threshold_network_url: Option<String>,
    pub account: Address,
    pub chain_id: u64,
}

/// What an operation needs from initialization.
#[derive(Clone, Copy)]
struct Requirements {
    fhe_keys: bool,
    signer: bool,
}

impl Requirements {
    const ALL: Self = Self {
        fhe_keys: true,
        signer: true,
    };
}

/// The CoFHE client.
pub struct Cofhe<S> {
    store: Arc<S>,
    config: CofheConfig,
    provider: Option<Arc<dyn Provider>>,
    signer: Option<Arc<dyn Signer>>,
    zkv_signer: Option<Arc<dyn Signer>>,
    chain_id: Option<u64>,
    account: Option<Address>,
    is_mock: bool,
    fhe_keys_initialized: bool,
    key_server: KeyServerClient,
    verifier: ZkVerifierClient,
    threshold_network: ThresholdNetworkClient,
}

impl<S: PermitStore + KeyStore> Cofhe<S> {
    /// Create a client. Service URLs are resolved from the environment.
    pub fn new(store: S, config: CofheConfig) -> Result<Self> {
        Ok(Self {
            store: Arc::new(store),
            config: config.with_environment_defaults()?,
            provider: None,
            signer: None,
            zkv_signer: None,
            chain_id: None,
            account: None,
            is_mock: false,
            fhe_keys_initialized: false,
            key_server: KeyServerClient::new(),
            verifier: ZkVerifierClient::new(),
            threshold_network: ThresholdNetworkClient::new(),
        })
    }

    /// Use a preconfigured HTTP client for every network call.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.key_server = KeyServerClient::with_http_client(client.clone());
        self.verifier = ZkVerifierClient::with_http_client(client.clone());
        self.threshold_network = ThresholdNetworkClient::with_http_client(client);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CofheConfig {
        &self.config
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    /// True if initialize found the mock contracts on chain.
    pub fn is_mock(&self) -> bool {
        self.is_mock
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Initialization
    // ─────────────────────────────────────────────────────────────────────────

    /// Connect to a chain.
    ///
    /// Reads the chain id, detects a mock chain, resolves the account from the
    /// signer and fetches FHE keys for every configured security zone. Then
    /// returns the active permit, creating and signing a `self` permit if
    /// none is active. Returns `None` without a signer or when
    /// `generate_permit` is off.
    pub async fn initialize(&mut self, params: InitializationParams) -> Result<Option<Permit>> {
        let provider = params.provider.ok_or_else(|| {
            CofheError::MissingProviderParam(
                "Missing initialization parameter `provider`".to_string(),
            )
        })?;

        if self.config.security_zones.is_empty() {
            return Err(CofheError::EmptySecurityZonesParam(
                "Initialization parameter provided but empty `security_zones`".to_string(),
            ));
        }

        let chain_id = provider
            .chain_id()
            .await
            .map_err(|e| CofheError::internal("failed to read chain id", e))?;

        if let Some(url) = &self.config.verifier_url {
            self.verifier.check_signer_address(url).await?;
        }

        let is_mock = check_is_mock_chain(provider.as_ref()).await;

        let account = match &params.signer {
            Some(signer) => Some(
                signer
                    .address()
                    .await
                    .map_err(|e| CofheError::internal("failed to read signer address", e))?,
            ),
            None => None,
        };

        info!(chain_id, is_mock, account = ?account, "initializing client");

        self.provider = Some(provider);
        self.signer = params.signer;
        self.zkv_signer = params.zkv_signer;
        self.chain_id = Some(chain_id);
        self.account = account;
        self.is_mock = is_mock;
        self.fhe_keys_initialized = false;

        if !is_mock {
            self.fetch_keys(chain_id).await?;
        }
        self.fhe_keys_initialized = true;

        if !self.config.generate_permit || self.signer.is_none() {
            return Ok(None);
        }

        match self.get_permit(None).await {
            Ok(permit) => Ok(Some(permit)),
            Err(CofheError::PermitNotFound(_)) => self.create_permit(None).await.map(Some),
            Err(e) => Err(e),
        }
    }

    async fn fetch_keys(&self, chain_id: u64) -> Result<()> {
        for &zone in &self.config.security_zones {
            let cached_key = self.store.get_fhe_key(chain_id, zone).await?;
            let cached_crs = self.store.get_crs(chain_id).await?;
            if cached_key.is_some() && cached_crs.is_some() {
                debug!(chain_id, zone, "fhe keys cached");
                continue;
            }

            let url = self.config.cofhe_url.as_deref().ok_or_else(|| {
                CofheError::NotInitialized("`cofhe_url` missing from the client config.".into())
            })?;

            let keys = self.key_server.fetch_keys(url, zone).await?;
            self.store.set_fhe_key(chain_id, zone, &keys.public_key).await?;
            self.store.set_crs(chain_id, &keys.crs).await?;
            debug!(chain_id, zone, key_len = keys.public_key.len(), "fetched fhe keys");
        }
        Ok(())
    }

    fn check_initialized(&self, requirements: Requirements) -> Result<()> {
        if !self.is_mock {
            if requirements.fhe_keys && !self.fhe_keys_initialized {
                return Err(CofheError::NotInitialized(
                    "FHE publicKey or CRS not initialized.".to_string(),
                ));
            }
            for (name, url) in [
                ("cofhe_url", &self.config.cofhe_url),
                ("verifier_url", &self.config.verifier_url),
                ("threshold_network_url", &self.config.threshold_network_url),
            ] {
                if url.is_none() {
                    return Err(CofheError::NotInitialized(format!(
                        "`{}` missing from the client config.",
                        name
                    )));
                }
            }
        }

        if self.provider.is_none() {
            return Err(CofheError::ProviderNotInitialized(
                "`provider` missing, call `Cofhe::initialize` first.".to_string(),
            ));
        }

        if requirements.signer && self.signer.is_none() {
            return Err(CofheError::SignerNotInitialized(
                "`signer` missing from `InitializationParams`.".to_string(),
            ));
        }
        Ok(())
    }

    fn provider(&self) -> Result<&dyn Provider> {
        self.provider.as_deref().ok_or_else(|| {
            CofheError::ProviderNotInitialized("provider not initialized".to_string())
        })
    }

    /// Chain id and account, both required for store access.
    fn connection(&self) -> Result<(u64, Address)> {
        let chain_id = self.chain_id.ok_or_else(|| {
            CofheError::ChainIdUninitialized("chainId uninitialized".to_string())
        })?;
        let account = self.account.ok_or_else(|| {
            CofheError::AccountUninitialized("account uninitialized".to_string())
        })?;
        Ok((chain_id, account))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permits
    // ─────────────────────────────────────────────────────────────────────────

    /// Create, sign, store and activate a permit.
    ///
    /// Missing `type` defaults to `self` and missing `issuer` to the
    /// connected account.
    pub async fn create_permit(&self, options: Option<PermitOptions>) -> Result<Permit> {
        self.check_initialized(Requirements::ALL)?;
        let (chain_id, account) = self.connection()?;

        let mut options = options.unwrap_or_default();
        options
            .permit_type
            .get_or_insert_with(|| PermitType::Own.to_string());
        options.issuer.get_or_insert_with(|| account.to_string());

        let permit =
            Permit::create_and_sign(&options, self.provider()?, self.signer.as_deref()).await?;

        let hash = permit.get_hash();
        self.store.set_permit(chain_id, &account, &permit).await?;
        self.store
            .set_active_permit_hash(chain_id, &account, &hash)
            .await?;

        info!(%hash, permit_type = %permit.permit_type, "created permit");
        Ok(permit)
    }

    /// Import a fully formed permit from its JSON export.
    pub async fn import_permit_json(&self, json: &str) -> Result<Permit> {
        let options: PermitOptions =
            serde_json::from_str(json).map_err(|e| CofheError::InvalidPermitData {
                message: format!("permit JSON malformed: {}", e),
                issues: Vec::new(),
            })?;
        self.import_permit(options).await
    }

    /// Import a fully formed permit, store it and make it active.
    ///
    /// Non-`self` permits are re-typed relative to the connected account:
    /// `sharing` if the account issued it, `recipient` if it is the
    /// recipient. Nothing is signed; the permit must already be valid.
    pub async fn import_permit(&self, mut options: PermitOptions) -> Result<Permit> {
        self.check_initialized(Requirements::ALL)?;
        let (chain_id, account) = self.connection()?;

        // Parse once up front so field errors surface before re-typing.
        cofhe_perms::validate_permit_params(&options).map_err(cofhe_perms::PermsError::from)?;

        if options.permit_type.as_deref() != Some(PermitType::Own.as_str()) {
            let is_account = |field: &Option<String>| {
                field
                    .as_deref()
                    .and_then(|s| parse_address(s).ok())
                    .is_some_and(|a| a == account)
            };
            let retyped = if is_account(&options.issuer) {
                PermitType::Sharing
            } else if is_account(&options.recipient) {
                PermitType::Recipient
            } else {
                return Err(CofheError::InvalidPermitData {
                    message: format!("Connected account <{}> is not issuer or recipient", account),
                    issues: Vec::new(),
                });
            };
            options.permit_type = Some(retyped.to_string());
        }

        let permit = Permit::create(&options)?;

        let validity = permit.is_valid();
        if let Some(reason) = validity.reason() {
            return Err(CofheError::InvalidPermitData {
                message: format!("Imported permit is invalid - {}", reason),
                issues: Vec::new(),
            });
        }

        let hash = permit.get_hash();
        self.store.set_permit(chain_id, &account, &permit).await?;
        self.store
            .set_active_permit_hash(chain_id, &account, &hash)
            .await?;

        info!(%hash, permit_type = %permit.permit_type, "imported permit");
        Ok(permit)
    }

    /// Make a stored permit the active one.
    pub async fn select_active_permit(&self, hash: &str) -> Result<Permit> {
        self.check_initialized(Requirements::ALL)?;
        let (chain_id, account) = self.connection()?;

        let permit = self
            .store
            .get_permit(chain_id, &account, hash)
            .await?
            .ok_or_else(|| {
                CofheError::PermitNotFound(format!("Permit with hash <{}> not found", hash))
            })?;

        self.store
            .set_active_permit_hash(chain_id, &account, &permit.get_hash())
            .await?;
        debug!(%hash, "selected active permit");
        Ok(permit)
    }

    /// A stored permit by hash, or the active permit.
    pub async fn get_permit(&self, hash: Option<&str>) -> Result<Permit> {
        self.check_initialized(Requirements::ALL)?;
        let (chain_id, account) = self.connection()?;

        match hash {
            None => self
                .store
                .get_active_permit(chain_id, &account)
                .await?
                .ok_or_else(|| CofheError::PermitNotFound("Active permit not found".to_string())),
            Some(hash) => self
                .store
                .get_permit(chain_id, &account, hash)
                .await?
                .ok_or_else(|| {
                    CofheError::PermitNotFound(format!("Permit with hash <{}> not found", hash))
                }),
        }
    }

    /// The validated [`Permission`] of a stored permit, or of the active one.
    pub async fn get_permission(&self, hash: Option<&str>) -> Result<Permission> {
        Ok(self.get_permit(hash).await?.get_permission(false)?)
    }

    /// Every permit stored for the connected account, keyed by hash.
    pub async fn get_all_permits(&self) -> Result<BTreeMap<String, Permit>> {
        self.check_initialized(Requirements::ALL)?;
        let (chain_id, account) = self.connection()?;
        Ok(self.store.get_permits(chain_id, &account).await?)
    }

    /// Remove a permit and return its hash.
    ///
    /// Removing the active permit promotes another one; removing the last
    /// permit needs `force`.
    pub async fn remove_permit(&self, hash: &str, force: bool) -> Result<String> {
        let (chain_id, account) = self.connection()?;
        self.store
            .remove_permit(chain_id, &account, hash, force)
            .await?;
        info!(%hash, force, "removed permit");
        Ok(hash.to_string())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Encrypt
    // ─────────────────────────────────────────────────────────────────────────

    /// Keys and endpoints for constructing a [`ZkStrategy`].
    pub async fn encrypt_get_keys(&self) -> Result<EncryptKeys> {
        self.check_initialized(Requirements {
            fhe_keys: true,
            signer: false,
        })?;

        let account = self.account.ok_or_else(|| {
            CofheError::AccountUninitialized("account uninitialized".to_string())
        })?;
        let chain_id = self.chain_id.ok_or_else(|| {
            CofheError::ChainIdUninitialized("chainId uninitialized".to_string())
        })?;

        let fhe_public_key = self.store.get_fhe_key(chain_id, 0).await?.ok_or_else(|| {
            CofheError::FheKeyNotFound("fheKey for current chain not found".to_string())
        })?;
        let crs = self.store.get_crs(chain_id).await?.ok_or_else(|| {
            CofheError::CrsNotFound("CRS for current chain not found".to_string())
        })?;

        Ok(EncryptKeys {
            fhe_public_key,
            crs,
            cofhe_url: self.config.cofhe_url.clone(),
            verifier_url: self.config.verifier_url.clone(),
            threshold_network_url: self.config.threshold_network_url.clone(),
            account,
            chain_id,
        })
    }

    /// A builder that encrypts `inputs` for the connected account.
    ///
    /// On a mock chain the builder runs the mock pipeline and `zk` is unused.
    pub fn encrypt_inputs<Z: ZkStrategy>(
        &self,
        inputs: EncryptInput,
        zk: Arc<Z>,
    ) -> Result<EncryptInputsBuilder<Z>> {
        self.check_initialized(Requirements::ALL)?;
        let (chain_id, account) = self.connection()?;

        let builder = EncryptInputsBuilder::new(
            inputs,
            account,
            chain_id,
            self.config.verifier_url.clone().unwrap_or_default(),
            zk,
        );

        if !self.is_mock {
            return Ok(builder);
        }

        let provider = self.provider.clone().ok_or_else(|| {
            CofheError::ProviderNotInitialized("provider not initialized".to_string())
        })?;
        let signer = self
            .zkv_signer
            .clone()
            .or_else(|| self.signer.clone())
            .ok_or_else(|| {
                CofheError::SignerNotInitialized("signer not initialized".to_string())
            })?;

        Ok(builder.with_mock(
            MockZkVerifier::new(provider, signer),
            self.config.mock.clone(),
        ))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Decrypt
    // ─────────────────────────────────────────────────────────────────────────

    /// Reseal `ct_hash` to a permit's sealing key and open it locally.
    ///
    /// Uses `permit_hash`, or the active permit of `account` (default: the
    /// connected account).
    pub async fn unseal(
        &self,
        ct_hash: U256,
        utype: FheType,
        account: Option<Address>,
        permit_hash: Option<&str>,
    ) -> Result<UnsealedValue> {
        self.check_initialized(Requirements::ALL)?;
        let (chain_id, permit) = self.resolve_permit(account, permit_hash).await?;

        if self.is_mock {
            return mock_seal_output(
                self.provider()?,
                ct_hash,
                utype,
                &permit,
                self.config.mock.decrypt_delay(),
            )
            .await;
        }

        let url = self.threshold_network_url()?;
        let sealed = self
            .threshold_network
            .seal_output(url, ct_hash, chain_id, &permit.get_permission(false)?)
            .await?;

        let value = permit.unseal(&sealed)?;
        debug!(%ct_hash, %utype, "unsealed");
        Ok(convert_via_utype(utype, value)?)
    }

    /// Have the threshold network decrypt `ct_hash` in the clear.
    pub async fn decrypt(
        &self,
        ct_hash: U256,
        utype: FheType,
        account: Option<Address>,
        permit_hash: Option<&str>,
    ) -> Result<UnsealedValue> {
        self.check_initialized(Requirements::ALL)?;
        let (chain_id, permit) = self.resolve_permit(account, permit_hash).await?;

        if self.is_mock {
            return mock_decrypt(
                self.provider()?,
                ct_hash,
                utype,
                &permit,
                self.config.mock.decrypt_delay(),
            )
            .await;
        }

        let url = self.threshold_network_url()?;
        let decrypted = self
            .threshold_network
            .decrypt(url, ct_hash, chain_id, &permit.get_permission(false)?)
            .await?;

        if decrypted.encryption_type != utype.as_u8() {
            warn!(
                received = decrypted.encryption_type,
                expected = utype.as_u8(),
                "decrypt type mismatch"
            );
            return Err(CofheError::InvalidUtype(format!(
                "unexpected encryption type :: received {}, expected {}",
                decrypted.encryption_type,
                utype.as_u8()
            )));
        }

        debug!(%ct_hash, %utype, "decrypted");
        Ok(convert_via_utype(utype, decrypted.value)?)
    }

    async fn resolve_permit(
        &self,
        account: Option<Address>,
        permit_hash: Option<&str>,
    ) -> Result<(u64, Permit)> {
        let chain_id = self.chain_id.ok_or_else(|| {
            CofheError::ChainIdUninitialized("chainId uninitialized".to_string())
        })?;

        let resolved_account = account.or(self.account);
        let resolved_hash = match (resolved_account, permit_hash) {
            (_, Some(hash)) => Some(hash.to_string()),
            (Some(acct), None) => self.store.get_active_permit_hash(chain_id, &acct).await?,
            (None, None) => None,
        };

        let (Some(resolved_account), Some(resolved_hash)) = (resolved_account, resolved_hash)
        else {
            return Err(CofheError::PermitNotFound(
                "Permit hash not provided and active Permit not found".to_string(),
            ));
        };

        let permit = self
            .store
            .get_permit(chain_id, &resolved_account, &resolved_hash)
            .await?
            .ok_or_else(|| {
                CofheError::PermitNotFound(format!(
                    "Permit with account <{}> and hash <{}> not found",
                    resolved_account, resolved_hash
                ))
            })?;

        Ok((chain_id, permit))
    }

    fn threshold_network_url(&self) -> Result<&str> {
        self.config.threshold_network_url.as_deref().ok_or_else(|| {
            CofheError::NotInitialized(
                "`threshold_network_url` missing from the client config.".to_string(),
            )
        })
    }
}
