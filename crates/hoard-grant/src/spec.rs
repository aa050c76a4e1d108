use serde::{Deserialize, Serialize};

use hoard_core::encoding::{base64_bytes, base64_option};
use hoard_core::{HoardError, HoardResult};

/// How a grant's references are sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantSpec {
    /// References stored in the clear; anyone holding the grant can read.
    Plaintext {},
    /// Sealed with the key the secrets manager holds for `public_id`.
    Symmetric {
        #[serde(rename = "publicid")]
        public_id: String,
        /// Makes the link object and the sealing nonce reproducible
        #[serde(
            rename = "linknonce",
            with = "base64_option",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        link_nonce: Option<Vec<u8>>,
    },
    /// Sealed to an age X25519 recipient. Without `public_key` the grant is
    /// addressed to the local keyring.
    Asymmetric {
        #[serde(rename = "publickey", default, skip_serializing_if = "Option::is_none")]
        public_key: Option<String>,
    },
}

impl GrantSpec {
    pub fn plaintext() -> Self {
        GrantSpec::Plaintext {}
    }

    pub fn symmetric(public_id: impl Into<String>) -> Self {
        GrantSpec::Symmetric {
            public_id: public_id.into(),
            link_nonce: None,
        }
    }

    pub fn asymmetric(public_key: Option<String>) -> Self {
        GrantSpec::Asymmetric { public_key }
    }

    pub fn link_nonce(&self) -> Option<&[u8]> {
        match self {
            GrantSpec::Symmetric {
                link_nonce: Some(nonce),
                ..
            } => Some(nonce),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GrantSpec::Plaintext {} => "plaintext",
            GrantSpec::Symmetric { .. } => "symmetric",
            GrantSpec::Asymmetric { .. } => "asymmetric",
        }
    }

    pub fn validate(&self) -> HoardResult<()> {
        match self {
            GrantSpec::Symmetric { public_id, .. } if public_id.is_empty() => Err(
                HoardError::InvalidSpec("symmetric grant requires a public id".into()),
            ),
            GrantSpec::Symmetric {
                link_nonce: Some(nonce),
                ..
            } if nonce.is_empty() => Err(HoardError::InvalidSpec(
                "link nonce must not be empty when given".into(),
            )),
            GrantSpec::Asymmetric {
                public_key: Some(key),
            } if key.trim().is_empty() => Err(HoardError::InvalidSpec(
                "asymmetric grant public key is empty".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// A portable, sealed capability over a list of references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub spec: GrantSpec,
    #[serde(rename = "encryptedreferences", with = "base64_bytes")]
    pub encrypted_references: Vec<u8>,
    pub version: i32,
}

impl Grant {
    pub fn to_json(&self) -> HoardResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> HoardResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
