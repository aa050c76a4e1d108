//! References: the capability to fetch and decrypt one stored ciphertext.
//!
//! A list of references is serialized into a canonical plaintext before it is
//! sealed into a grant or stored as a LINK object. The layout of that plaintext
//! depends on the grant version:
//!
//! ```text
//! version 3 (latest)  {"refs":[{"address","secretKey","salt"?,"size","type"?}],"nonce"?}
//! version 2 (legacy)  {"refs":[{"address","secretKey","salt"?,"size","version"?}]}
//!                     where ref version 1 marked a HEADER reference
//! version 0, 1        rejected
//! ```

use serde::{Deserialize, Deserializer, Serialize};

use crate::encoding::{address_key, base64_bytes};
use crate::error::{HoardError, HoardResult};

/// Grant version written by this crate.
pub const LATEST_GRANT_VERSION: i32 = 3;

/// Oldest grant version that can still be unsealed.
pub const MIN_SUPPORTED_GRANT_VERSION: i32 = 2;

/// In version 2 grants the per-reference `version` field was overloaded to
/// mark header references.
pub const REF_VERSION_DENOTING_HEADER: i32 = 1;

/// What the plaintext behind a reference contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RefType {
    /// Raw body bytes
    #[default]
    Data,
    /// An encoded [`crate::types::Header`]
    Header,
    /// An encoded list of further references
    Link,
}

impl RefType {
    pub fn is_data(&self) -> bool {
        matches!(self, RefType::Data)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(with = "base64_bytes")]
    pub address: Vec<u8>,
    #[serde(rename = "secretKey", with = "base64_bytes")]
    pub secret_key: Vec<u8>,
    #[serde(
        with = "base64_bytes",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub salt: Vec<u8>,
    /// Plaintext size in bytes, excluding the salt
    #[serde(deserialize_with = "int64_from_number_or_string")]
    pub size: i64,
    #[serde(rename = "type", default, skip_serializing_if = "RefType::is_data")]
    pub ref_type: RefType,
}

impl Reference {
    pub fn new(address: Vec<u8>, secret_key: Vec<u8>, salt: &[u8], size: i64) -> Self {
        Self {
            address,
            secret_key,
            salt: salt.to_vec(),
            size,
            ref_type: RefType::Data,
        }
    }

    pub fn with_type(mut self, ref_type: RefType) -> Self {
        self.ref_type = ref_type;
        self
    }
}

impl std::fmt::Debug for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reference")
            .field("address", &address_key(&self.address))
            .field("secret_key", &"[REDACTED]")
            .field("salt_len", &self.salt.len())
            .field("size", &self.size)
            .field("ref_type", &self.ref_type)
            .finish()
    }
}

#[derive(Serialize)]
struct RefsWithNonce<'a> {
    refs: &'a [Reference],
    #[serde(with = "base64_bytes", skip_serializing_if = "<[u8]>::is_empty")]
    nonce: &'a [u8],
}

#[derive(Deserialize)]
struct OwnedRefsWithNonce {
    #[serde(default)]
    refs: Vec<Reference>,
}

#[derive(Deserialize)]
struct LegacyReference {
    #[serde(with = "base64_bytes")]
    address: Vec<u8>,
    #[serde(rename = "secretKey", with = "base64_bytes")]
    secret_key: Vec<u8>,
    #[serde(with = "base64_bytes", default)]
    salt: Vec<u8>,
    #[serde(default, deserialize_with = "int64_from_number_or_string")]
    size: i64,
    #[serde(default)]
    version: i32,
}

#[derive(Deserialize)]
struct LegacyRefs {
    #[serde(default)]
    refs: Vec<LegacyReference>,
}

impl From<LegacyReference> for Reference {
    fn from(legacy: LegacyReference) -> Self {
        let ref_type = if legacy.version == REF_VERSION_DENOTING_HEADER {
            RefType::Header
        } else {
            RefType::Data
        };
        Reference {
            address: legacy.address,
            secret_key: legacy.secret_key,
            salt: legacy.salt,
            size: legacy.size,
            ref_type,
        }
    }
}

/// Canonical plaintext for a list of references.
///
/// `nonce` makes an otherwise identical list encode to distinct bytes, which
/// is what gives every LINK object a unique address.
pub fn plaintext_from_refs(refs: &[Reference], nonce: &[u8]) -> HoardResult<Vec<u8>> {
    serde_json::to_vec(&RefsWithNonce { refs, nonce })
        .map_err(|_| HoardError::Serialization("failed to encode references".into()))
}

/// Decode a reference list written under the given grant version.
///
/// Decoding errors are reported without echoing any of the input.
pub fn refs_from_plaintext(plaintext: &[u8], version: i32) -> HoardResult<Vec<Reference>> {
    check_grant_version(version)?;
    let suppressed = |_| HoardError::Serialization("failed to decode references".into());
    if version < LATEST_GRANT_VERSION {
        let legacy: LegacyRefs = serde_json::from_slice(plaintext).map_err(suppressed)?;
        Ok(legacy.refs.into_iter().map(Reference::from).collect())
    } else {
        let current: OwnedRefsWithNonce = serde_json::from_slice(plaintext).map_err(suppressed)?;
        Ok(current.refs)
    }
}

pub fn check_grant_version(version: i32) -> HoardResult<()> {
    if (MIN_SUPPORTED_GRANT_VERSION..=LATEST_GRANT_VERSION).contains(&version) {
        Ok(())
    } else {
        Err(HoardError::UnsupportedVersion(version))
    }
}

/// Older encoders wrote 64-bit integers as JSON strings.
fn int64_from_number_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ref(fill: u8, ref_type: RefType) -> Reference {
        Reference::new(vec![fill; 32], vec![fill ^ 0xff; 32], b"salty", 42).with_type(ref_type)
    }

    #[test]
    fn test_refs_roundtrip_latest() {
        let refs = vec![
            sample_ref(1, RefType::Header),
            sample_ref(2, RefType::Data),
            sample_ref(3, RefType::Link),
        ];
        let plaintext = plaintext_from_refs(&refs, b"nonce").unwrap();
        let decoded = refs_from_plaintext(&plaintext, LATEST_GRANT_VERSION).unwrap();
        assert_eq!(decoded, refs);
    }

    #[test]
    fn test_encoding_is_canonical() {
        let refs = vec![sample_ref(7, RefType::Data)];
        let a = plaintext_from_refs(&refs, b"").unwrap();
        let b = plaintext_from_refs(&refs, b"").unwrap();
        assert_eq!(a, b);
        // re-encoding a decoded list reproduces the same bytes
        let decoded = refs_from_plaintext(&a, LATEST_GRANT_VERSION).unwrap();
        assert_eq!(plaintext_from_refs(&decoded, b"").unwrap(), a);
    }

    #[test]
    fn test_nonce_changes_encoding() {
        let refs = vec![sample_ref(7, RefType::Data)];
        let a = plaintext_from_refs(&refs, b"one").unwrap();
        let b = plaintext_from_refs(&refs, b"two").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_data_type_and_empty_salt_omitted() {
        let r = Reference::new(vec![1], vec![2], b"", 3);
        let json = String::from_utf8(plaintext_from_refs(&[r], b"").unwrap()).unwrap();
        assert_eq!(json, r#"{"refs":[{"address":"AQ==","secretKey":"Ag==","size":3}]}"#);
    }

    #[test]
    fn test_legacy_version_marks_header() {
        let json = br#"{"refs":[
            {"address":"AQ==","secretKey":"Ag==","size":"10","version":1},
            {"address":"Aw==","secretKey":"BA==","salt":"c2FsdA==","size":20}
        ]}"#;
        let refs = refs_from_plaintext(json, 2).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].ref_type, RefType::Header);
        assert_eq!(refs[0].size, 10);
        assert_eq!(refs[1].ref_type, RefType::Data);
        assert_eq!(refs[1].salt, b"salt");
    }

    #[test]
    fn test_deprecated_versions_rejected() {
        let plaintext = plaintext_from_refs(&[], b"").unwrap();
        for version in [0, 1, 4] {
            match refs_from_plaintext(&plaintext, version) {
                Err(HoardError::UnsupportedVersion(v)) => assert_eq!(v, version),
                other => panic!("expected UnsupportedVersion, got: {other:?}"),
            }
        }
    }

    #[test]
    fn test_garbage_does_not_decode() {
        let result = refs_from_plaintext(b"\x00\x01 not json", LATEST_GRANT_VERSION);
        assert!(matches!(result, Err(HoardError::Serialization(_))));
    }

    #[test]
    fn test_debug_redacts_secret_key() {
        let r = sample_ref(9, RefType::Data);
        let debug = format!("{r:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("246")); // 9 ^ 0xff
    }
}
