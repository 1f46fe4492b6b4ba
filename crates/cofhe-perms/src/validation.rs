//! Permit validation engine.
//!
//! One rule set, applied in two contexts:
//!
//! - **Creation params** ([`ValidationRules::PARAMS`]): optional fields are
//!   defaulted, signatures and the sealing pair are not required.
//! - **Fully formed** ([`ValidationRules::FULLY_FORMED`]): every field must be
//!   present, the sealing pair must exist, and the active party's signature
//!   must be set.
//!
//! Failures are reported as a list of `(path, message)` issues so callers can
//! point at the exact offending fields.
//!
//! ## Rules
//!
//! - `issuer` is a valid, non-zero address; `recipient` and
//!   `validatorContract` are valid addresses.
//! - `validatorId` and `validatorContract` are both set or both unset.
//! - `self` permits have a zero `recipient`; `sharing`/`recipient` permits
//!   have a non-zero one (only when `check_recipient`).
//! - `self`/`sharing` permits never carry a `recipientSignature`; `recipient`
//!   permits always carry the issuer's signature.

use serde::{Deserialize, Serialize};
use std::fmt;

use cofhe_core::{parse_address, Address};

use crate::permit::PermitType;
use crate::sealing::SealingKey;

pub const DEFAULT_PERMIT_NAME: &str = "Unnamed Permit";
pub const DEFAULT_EXPIRATION: u64 = 1_000_000_000_000;
pub const EMPTY_SIGNATURE: &str = "0x";

/// Candidate permit data, as supplied by a caller or an imported JSON blob.
///
/// Every field is optional and address fields are raw strings so that
/// malformed input can be reported field-by-field rather than failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermitOptions {
    #[serde(rename = "type")]
    pub permit_type: Option<String>,
    pub issuer: Option<String>,
    pub name: Option<String>,
    pub expiration: Option<u64>,
    pub recipient: Option<String>,
    pub validator_id: Option<u64>,
    pub validator_contract: Option<String>,
    pub sealing_pair: Option<SealingKey>,
    pub issuer_signature: Option<String>,
    pub recipient_signature: Option<String>,
}

impl PermitOptions {
    pub fn new(permit_type: PermitType, issuer: Address) -> Self {
        Self {
            permit_type: Some(permit_type.to_string()),
            issuer: Some(issuer.to_string()),
            ..Default::default()
        }
    }

    /// Options for a permit the issuer uses themselves.
    pub fn own(issuer: Address) -> Self {
        Self::new(PermitType::Own, issuer)
    }

    /// Options for a permit the issuer intends to share with `recipient`.
    pub fn sharing(issuer: Address, recipient: Address) -> Self {
        Self::new(PermitType::Sharing, issuer).with_recipient(recipient)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_expiration(mut self, expiration: u64) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn with_recipient(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient.to_string());
        self
    }

    pub fn with_validator(mut self, validator_id: u64, validator_contract: Address) -> Self {
        self.validator_id = Some(validator_id);
        self.validator_contract = Some(validator_contract.to_string());
        self
    }

    pub fn with_sealing_pair(mut self, sealing_pair: SealingKey) -> Self {
        self.sealing_pair = Some(sealing_pair);
        self
    }

    pub fn with_issuer_signature(mut self, signature: impl Into<String>) -> Self {
        self.issuer_signature = Some(signature.into());
        self
    }

    pub fn with_recipient_signature(mut self, signature: impl Into<String>) -> Self {
        self.recipient_signature = Some(signature.into());
        self
    }
}

/// Permit data after validation and defaulting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitParams {
    pub name: String,
    pub permit_type: PermitType,
    pub issuer: Address,
    pub expiration: u64,
    pub recipient: Address,
    pub validator_id: u64,
    pub validator_contract: Address,
    pub sealing_pair: Option<SealingKey>,
    pub issuer_signature: String,
    pub recipient_signature: String,
}

/// Which context-dependent checks apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    pub check_recipient: bool,
    pub check_sealing_pair: bool,
    pub check_signed: bool,
    /// Reject missing optional fields instead of defaulting them.
    pub require_all_fields: bool,
}

impl ValidationRules {
    pub const PARAMS: Self = Self {
        check_recipient: true,
        check_sealing_pair: false,
        check_signed: false,
        require_all_fields: false,
    };

    pub const FULLY_FORMED: Self = Self {
        check_recipient: true,
        check_sealing_pair: true,
        check_signed: true,
        require_all_fields: true,
    };
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: Vec<String>,
    pub message: String,
}

impl ValidationIssue {
    fn new<const N: usize>(path: [&str; N], message: impl Into<String>) -> Self {
        Self {
            path: path.iter().map(|p| p.to_string()).collect(),
            message: message.into(),
        }
    }
}

/// All failures found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(pub Vec<ValidationIssue>);

impl ValidationErrors {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }

    /// True if some issue names `field` in its path.
    pub fn has_path(&self, field: &str) -> bool {
        self.0.iter().any(|i| i.path.iter().any(|p| p == field))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|i| format!("[{}] {}", i.path.join("."), i.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate creation params, applying defaults.
pub fn validate_permit_params(options: &PermitOptions) -> Result<PermitParams, ValidationErrors> {
    validate_permit(options, ValidationRules::PARAMS)
}

/// Validate a complete, signed permit.
pub fn validate_fully_formed_permit(
    options: &PermitOptions,
) -> Result<PermitParams, ValidationErrors> {
    validate_permit(options, ValidationRules::FULLY_FORMED)
}

/// Run the shared rule set with the given context toggles.
pub fn validate_permit(
    options: &PermitOptions,
    rules: ValidationRules,
) -> Result<PermitParams, ValidationErrors> {
    let mut issues = Vec::new();
    let require = rules.require_all_fields;

    let permit_type = match options.permit_type.as_deref() {
        None => {
            issues.push(ValidationIssue::new(["type"], "Required"));
            None
        }
        Some(raw) => match raw.parse::<PermitType>() {
            Ok(t) => Some(t),
            Err(_) => {
                issues.push(ValidationIssue::new(
                    ["type"],
                    format!(
                        "Invalid enum value. Expected 'self' | 'sharing' | 'recipient', received '{}'",
                        raw
                    ),
                ));
                None
            }
        },
    };

    let issuer = match options.issuer.as_deref() {
        None => {
            issues.push(ValidationIssue::new(["issuer"], "Required"));
            None
        }
        Some(raw) => match parse_address(raw) {
            Ok(a) if a.is_zero() => {
                issues.push(ValidationIssue::new(
                    ["issuer"],
                    "Permit issuer :: must not be zeroAddress",
                ));
                None
            }
            Ok(a) => Some(a),
            Err(_) => {
                issues.push(ValidationIssue::new(
                    ["issuer"],
                    "Permit issuer :: invalid address",
                ));
                None
            }
        },
    };

    let name = or_default(
        &options.name,
        "name",
        require,
        DEFAULT_PERMIT_NAME.to_string(),
        &mut issues,
    );
    let expiration = or_default(
        &options.expiration,
        "expiration",
        require,
        DEFAULT_EXPIRATION,
        &mut issues,
    );
    let validator_id = or_default(&options.validator_id, "validatorId", require, 0, &mut issues);

    let recipient = or_default(
        &options.recipient,
        "recipient",
        require,
        Address::ZERO.to_string(),
        &mut issues,
    )
    .and_then(|raw| parse_address_field(&raw, "recipient", &mut issues));
    let validator_contract = or_default(
        &options.validator_contract,
        "validatorContract",
        require,
        Address::ZERO.to_string(),
        &mut issues,
    )
    .and_then(|raw| parse_address_field(&raw, "validatorContract", &mut issues));

    let issuer_signature = or_default(
        &options.issuer_signature,
        "issuerSignature",
        require,
        EMPTY_SIGNATURE.to_string(),
        &mut issues,
    );
    let recipient_signature = or_default(
        &options.recipient_signature,
        "recipientSignature",
        require,
        EMPTY_SIGNATURE.to_string(),
        &mut issues,
    );

    let (
        Some(permit_type),
        Some(issuer),
        Some(name),
        Some(expiration),
        Some(validator_id),
        Some(recipient),
        Some(validator_contract),
        Some(issuer_signature),
        Some(recipient_signature),
    ) = (
        permit_type,
        issuer,
        name,
        expiration,
        validator_id,
        recipient,
        validator_contract,
        issuer_signature,
        recipient_signature,
    )
    else {
        return Err(ValidationErrors(issues));
    };
    if !issues.is_empty() {
        return Err(ValidationErrors(issues));
    }

    let params = PermitParams {
        name,
        permit_type,
        issuer,
        expiration,
        recipient,
        validator_id,
        validator_contract,
        sealing_pair: options.sealing_pair.clone(),
        issuer_signature,
        recipient_signature,
    };

    check_cross_field(&params, rules, &mut issues);
    if issues.is_empty() {
        Ok(params)
    } else {
        Err(ValidationErrors(issues))
    }
}

fn check_cross_field(params: &PermitParams, rules: ValidationRules, issues: &mut Vec<ValidationIssue>) {
    let t = params.permit_type;

    if (params.validator_id != 0) != !params.validator_contract.is_zero() {
        issues.push(ValidationIssue::new(
            ["validatorId", "validatorContract"],
            "Permit external validator :: validatorId and validatorContract must either both be set or both be unset.",
        ));
    }

    if rules.check_recipient {
        match t {
            PermitType::Own if !params.recipient.is_zero() => {
                issues.push(ValidationIssue::new(
                    ["recipient"],
                    "Permit (type 'self') :: recipient must be empty (zeroAddress)",
                ));
            }
            PermitType::Sharing | PermitType::Recipient if params.recipient.is_zero() => {
                issues.push(ValidationIssue::new(
                    ["recipient"],
                    format!("Permit (type '{}') :: recipient must not be empty", t),
                ));
            }
            _ => {}
        }
    }

    match t {
        PermitType::Own | PermitType::Sharing if params.recipient_signature != EMPTY_SIGNATURE => {
            issues.push(ValidationIssue::new(
                ["recipientSignature"],
                format!("Permit (type '{}') :: recipientSignature must be empty (0x)", t),
            ));
        }
        PermitType::Recipient if params.issuer_signature == EMPTY_SIGNATURE => {
            issues.push(ValidationIssue::new(
                ["issuerSignature"],
                "Permit (type 'recipient') :: issuerSignature must be populated",
            ));
        }
        _ => {}
    }

    if rules.check_sealing_pair && params.sealing_pair.is_none() {
        issues.push(ValidationIssue::new(
            ["sealingPair"],
            "Permit sealingPair :: must be populated",
        ));
    }

    if rules.check_signed {
        match t {
            PermitType::Own | PermitType::Sharing if params.issuer_signature == EMPTY_SIGNATURE => {
                issues.push(ValidationIssue::new(
                    ["issuerSignature"],
                    format!("Permit (type '{}') :: issuerSignature must be populated", t),
                ));
            }
            PermitType::Recipient if params.recipient_signature == EMPTY_SIGNATURE => {
                issues.push(ValidationIssue::new(
                    ["recipientSignature"],
                    "Permit (type 'recipient') :: recipientSignature must be populated",
                ));
            }
            _ => {}
        }
    }
}

fn or_default<T: Clone>(
    value: &Option<T>,
    field: &str,
    require: bool,
    default: T,
    issues: &mut Vec<ValidationIssue>,
) -> Option<T> {
    match value {
        Some(v) => Some(v.clone()),
        None if require => {
            issues.push(ValidationIssue::new([field], "Required"));
            None
        }
        None => Some(default),
    }
}

fn parse_address_field(
    raw: &str,
    field: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Address> {
    match parse_address(raw) {
        Ok(a) => Some(a),
        Err(_) => {
            issues.push(ValidationIssue::new(
                [field],
                format!("Permit {} :: invalid address", field),
            ));
            None
        }
    }
}
