use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::encoding::base64_bytes;

/// Largest single message any transport is expected to carry.
pub const TRANSPORT_FRAME_LIMIT: usize = 4 << 20;

/// Headroom reserved in each frame for envelope fields around the chunk.
pub const PROTOCOL_OVERHEAD: usize = 64 << 10;

/// Hard ceiling on chunk size; larger requests are clamped to this.
pub const MAX_CHUNK_SIZE: usize = TRANSPORT_FRAME_LIMIT - PROTOCOL_OVERHEAD;

/// Chunk size used by the service when neither config nor header says otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Resolve the effective chunk size: a non-zero request wins over the
/// fallback, and the result never exceeds [`MAX_CHUNK_SIZE`].
pub fn clamp_chunk_size(requested: u64, fallback: usize) -> usize {
    let size = if requested == 0 {
        fallback
    } else {
        usize::try_from(requested).unwrap_or(MAX_CHUNK_SIZE)
    };
    size.clamp(1, MAX_CHUNK_SIZE)
}

/// Snapshot of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatInfo {
    pub exists: bool,
    /// Stored (ciphertext) size in bytes
    pub size: u64,
}

/// Optional metadata unit sent as the first frame of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Salt applied to every chunk of the stream
    #[serde(with = "base64_bytes", default, skip_serializing_if = "Vec::is_empty")]
    pub salt: Vec<u8>,
    /// Opaque caller metadata (file name, mime type, ...)
    #[serde(with = "base64_bytes", default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
    /// Requested chunk size; 0 means unset
    #[serde(default)]
    pub chunk_size: u64,
}

/// One frame of a plaintext stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Plaintext {
    pub head: Option<Header>,
    pub body: Bytes,
}

impl Plaintext {
    pub fn body(body: impl Into<Bytes>) -> Self {
        Self {
            head: None,
            body: body.into(),
        }
    }

    pub fn header(head: Header) -> Self {
        Self {
            head: Some(head),
            body: Bytes::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_chunk_size() {
        assert_eq!(clamp_chunk_size(0, 100), 100);
        assert_eq!(clamp_chunk_size(10, 100), 10);
        assert_eq!(clamp_chunk_size(u64::MAX, 100), MAX_CHUNK_SIZE);
        assert_eq!(clamp_chunk_size((MAX_CHUNK_SIZE + 1) as u64, 100), MAX_CHUNK_SIZE);
        assert_eq!(clamp_chunk_size(0, 0), 1);
    }

    #[test]
    fn test_header_json_omits_empty_fields() {
        let json = serde_json::to_string(&Header {
            data: b"name.txt".to_vec(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json, r#"{"data":"bmFtZS50eHQ=","chunkSize":0}"#);
        let back: Header = serde_json::from_str(&json).unwrap();
        assert_eq!(back.data, b"name.txt");
        assert!(back.salt.is_empty());
    }
}
