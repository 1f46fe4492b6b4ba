//! Client configuration.
//!
//! A [`CofheConfig`] names the three service URLs the client talks to (the
//! CoFHE key server, the ZK verifier, and the threshold network), the
//! security zones to fetch keys for, and the timing of the mock pipeline.
//! An [`Environment`] fills in the URLs for the known deployments.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{CofheError, Result};

/// A known deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    /// Local chain with the mock contracts deployed; no services.
    Mock,
    Local,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Mock => "MOCK",
            Environment::Local => "LOCAL",
            Environment::Testnet => "TESTNET",
            Environment::Mainnet => "MAINNET",
        }
    }

    /// `(cofhe, verifier, threshold network)` URLs, or `None` for mock.
    fn urls(self) -> Option<(&'static str, &'static str, &'static str)> {
        match self {
            Environment::Mock => None,
            Environment::Local => Some((
                "http://127.0.0.1:8448",
                "http://127.0.0.1:3001",
                "http://127.0.0.1:3000",
            )),
            Environment::Testnet => Some((
                "https://testnet-cofhe.fhenix.zone",
                "https://testnet-cofhe-vrf.fhenix.zone",
                "https://testnet-cofhe-tn.fhenix.zone",
            )),
            Environment::Mainnet => Some((
                "https://mainnet-cofhe.fhenix.zone",
                "https://mainnet-cofhe-vrf.fhenix.zone",
                "https://mainnet-cofhe-tn.fhenix.zone",
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = CofheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MOCK" => Ok(Environment::Mock),
            "LOCAL" => Ok(Environment::Local),
            "TESTNET" => Ok(Environment::Testnet),
            "MAINNET" => Ok(Environment::Mainnet),
            _ => Err(CofheError::UnknownEnvironment(format!(
                "Unknown environment: {}",
                s
            ))),
        }
    }
}

/// Artificial latencies of the mock pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Delay before a mock decrypt or sealoutput query.
    pub decrypt_delay_ms: u64,
    pub pack_delay_ms: u64,
    pub prove_delay_ms: u64,
    pub verify_delay_ms: u64,
}

impl MockConfig {
    /// All delays zero. Useful in tests.
    pub fn instant() -> Self {
        Self {
            decrypt_delay_ms: 0,
            pack_delay_ms: 0,
            prove_delay_ms: 0,
            verify_delay_ms: 0,
        }
    }

    pub fn decrypt_delay(&self) -> Duration {
        Duration::from_millis(self.decrypt_delay_ms)
    }

    pub fn pack_delay(&self) -> Duration {
        Duration::from_millis(self.pack_delay_ms)
    }

    pub fn prove_delay(&self) -> Duration {
        Duration::from_millis(self.prove_delay_ms)
    }

    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.verify_delay_ms)
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            decrypt_delay_ms: 0,
            pack_delay_ms: 100,
            prove_delay_ms: 500,
            verify_delay_ms: 500,
        }
    }
}

/// Configuration for the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CofheConfig {
    pub environment: Option<Environment>,
    pub cofhe_url: Option<String>,
    pub verifier_url: Option<String>,
    pub threshold_network_url: Option<String>,
    /// Zones whose FHE public keys are fetched on initialize.
    pub security_zones: Vec<u8>,
    /// Create and sign a `self` permit on initialize if none is active.
    pub generate_permit: bool,
    pub mock: MockConfig,
}

impl Default for CofheConfig {
    fn default() -> Self {
        Self {
            environment: None,
            cofhe_url: None,
            verifier_url: None,
            threshold_network_url: None,
            security_zones: vec![0],
            generate_permit: true,
            mock: MockConfig::default(),
        }
    }
}

impl CofheConfig {
    /// Config for a known deployment, URLs filled in.
    pub fn for_environment(environment: Environment) -> Self {
        let mut config = Self {
            environment: Some(environment),
            ..Self::default()
        };
        config.apply_urls(environment);
        config
    }

    /// Config with explicit service URLs and no environment.
    pub fn with_urls(
        cofhe_url: impl Into<String>,
        verifier_url: impl Into<String>,
        threshold_network_url: impl Into<String>,
    ) -> Self {
        Self {
            cofhe_url: Some(cofhe_url.into()),
            verifier_url: Some(verifier_url.into()),
            threshold_network_url: Some(threshold_network_url.into()),
            ..Self::default()
        }
    }

    /// Fill unset service URLs from `environment`.
    ///
    /// URLs already set are kept. Mock clears all URLs. With no environment
    /// every URL must already be set.
    pub fn with_environment_defaults(mut self) -> Result<Self> {
        match self.environment {
            Some(env) => self.apply_urls(env),
            None => {
                let missing: Vec<&str> = [
                    ("cofhe_url", &self.cofhe_url),
                    ("verifier_url", &self.verifier_url),
                    ("threshold_network_url", &self.threshold_network_url),
                ]
                .into_iter()
                .filter(|(_, url)| url.is_none())
                .map(|(name, _)| name)
                .collect();

                if !missing.is_empty() {
                    return Err(CofheError::UnknownEnvironment(format!(
                        "When environment is not provided, {} must be set",
                        missing.join(", ")
                    )));
                }
            }
        }
        Ok(self)
    }

    fn apply_urls(&mut self, environment: Environment) {
        let Some((cofhe, verifier, tn)) = environment.urls() else {
            self.cofhe_url = None;
            self.verifier_url = None;
            self.threshold_network_url = None;
            return;
        };
        self.cofhe_url.get_or_insert_with(|| cofhe.to_string());
        self.verifier_url.get_or_insert_with(|| verifier.to_string());
        self.threshold_network_url.get_or_insert_with(|| tn.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_defaults() {
        let config = CofheConfig::default();
        assert_eq!(config.security_zones, vec![0]);
        assert!(config.generate_permit);
        assert_eq!(config.mock.pack_delay(), Duration::from_millis(100));
        assert_eq!(config.mock.prove_delay(), Duration::from_millis(500));
        assert_eq!(config.mock.verify_delay(), Duration::from_millis(500));
        assert_eq!(config.mock.decrypt_delay(), Duration::ZERO);
    }

    #[test]
    fn test_environment_urls() {
        let testnet = CofheConfig::for_environment(Environment::Testnet);
        assert_eq!(
            testnet.threshold_network_url.as_deref(),
            Some("https://testnet-cofhe-tn.fhenix.zone")
        );

        let local = CofheConfig::for_environment(Environment::Local);
        assert_eq!(local.cofhe_url.as_deref(), Some("http://127.0.0.1:8448"));
        assert_eq!(local.verifier_url.as_deref(), Some("http://127.0.0.1:3001"));

        let mock = CofheConfig {
            environment: Some(Environment::Mock),
            cofhe_url: Some("http://stale".into()),
            ..CofheConfig::default()
        }
        .with_environment_defaults()
        .unwrap();
        assert!(mock.cofhe_url.is_none());
    }

    #[test]
    fn test_environment_defaults_keep_explicit_urls() {
        let config = CofheConfig {
            environment: Some(Environment::Testnet),
            cofhe_url: Some("http://my-cofhe".into()),
            ..CofheConfig::default()
        }
        .with_environment_defaults()
        .unwrap();
        assert_eq!(config.cofhe_url.as_deref(), Some("http://my-cofhe"));
        assert_eq!(
            config.threshold_network_url.as_deref(),
            Some("https://testnet-cofhe-tn.fhenix.zone")
        );
        assert!(config.verifier_url.is_some());
    }

    #[test]
    fn test_no_environment_requires_urls() {
        let err = CofheConfig {
            cofhe_url: Some("http://a".into()),
            ..CofheConfig::default()
        }
        .with_environment_defaults()
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownEnvironment);
        assert!(err.to_string().contains("verifier_url"));
        assert!(!err.to_string().contains("cofhe_url"));

        let ok = CofheConfig::with_urls("http://a", "http://b", "http://c")
            .with_environment_defaults()
            .unwrap();
        assert_eq!(ok.verifier_url.as_deref(), Some("http://b"));
    }

    #[test]
    fn test_deserialize() {
        let config: CofheConfig = serde_json::from_str(
            r#"{"environment":"TESTNET","security_zones":[0,1],"mock":{"decrypt_delay_ms":5}}"#,
        )
        .unwrap();
        assert_eq!(config.environment, Some(Environment::Testnet));
        assert_eq!(config.security_zones, vec![0, 1]);
        assert!(config.generate_permit);
        assert_eq!(config.mock.decrypt_delay_ms, 5);
        assert_eq!(config.mock.pack_delay_ms, 100);
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("mainnet".parse::<Environment>().unwrap(), Environment::Mainnet);
        assert_eq!(
            "devnet".parse::<Environment>().unwrap_err().code(),
            ErrorCode::UnknownEnvironment
        );
    }
}
