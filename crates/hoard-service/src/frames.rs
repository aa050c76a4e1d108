//! Messages exchanged by the streaming operations.

use bytes::Bytes;

use hoard_core::{Header, Plaintext, Reference, StatInfo};
use hoard_grant::GrantSpec;

/// Input frame of `put_seal`. Only the first frame carries the grant spec.
#[derive(Debug, Clone, Default)]
pub struct PlaintextAndGrantSpec {
    pub plaintext: Plaintext,
    pub grant_spec: Option<GrantSpec>,
}

impl PlaintextAndGrantSpec {
    /// Opening frame: the grant spec, an optional header, and no body.
    pub fn open(grant_spec: GrantSpec, head: Option<Header>) -> Self {
        Self {
            plaintext: Plaintext {
                head,
                body: Bytes::new(),
            },
            grant_spec: Some(grant_spec),
        }
    }

    pub fn body(body: impl Into<Bytes>) -> Self {
        Self {
            plaintext: Plaintext::body(body),
            grant_spec: None,
        }
    }
}

/// Input frame of `seal`. Only the first frame carries the grant spec.
#[derive(Debug, Clone, Default)]
pub struct ReferenceAndGrantSpec {
    pub reference: Option<Reference>,
    pub grant_spec: Option<GrantSpec>,
}

#[derive(Debug, Clone)]
pub struct ReferenceAndCiphertext {
    pub reference: Reference,
    pub ciphertext: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressStat {
    pub address: Vec<u8>,
    pub location: String,
    pub stat: StatInfo,
}
