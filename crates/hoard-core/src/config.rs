use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::DEFAULT_CHUNK_SIZE;

/// Top-level configuration (loaded from hoard.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HoardConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub chunking: ChunkingConfig,
    pub secrets: SecretsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Filesystem,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the filesystem backend, or key prefix for S3
    pub root: PathBuf,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket name
    pub bucket: String,
    /// Enforce HTTPS for S3 connections (warn/error on HTTP endpoints)
    pub enforce_tls: bool,
    /// Number of buckets in the per-address lock pool (default: 127)
    pub address_lock_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Chunk size in bytes used when a stream header does not set one
    pub chunk_size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Symmetric secrets addressable by public id from grant specs
    pub symmetric: Vec<SymmetricSecretConfig>,
    /// Age identity file used to open asymmetric grants
    pub age_identity: Option<PathBuf>,
    /// Argon2id memory cost in KiB for passphrase secrets (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: Option<u32>,
    /// Base64 Ed25519 seed that signs asymmetric grants
    pub signing_key: Option<String>,
    /// Base64 Ed25519 public keys whose asymmetric grants are accepted
    pub trusted_signers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SymmetricSecretConfig {
    pub public_id: String,
    /// Base64-encoded 32-byte key
    pub secret_key: Option<String>,
    /// Passphrase stretched with Argon2id into a key
    pub passphrase: Option<String>,
    /// Read the key (base64) from this environment variable instead
    pub from_env: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            root: PathBuf::from("/var/lib/hoard"),
            endpoint: "http://localhost:9000".into(),
            region: "us-east-1".into(),
            bucket: "hoard".into(),
            enforce_tls: false,
            address_lock_count: 127,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[logging]
level = "debug"
format = "json"

[storage]
backend = "s3"
endpoint = "https://s3.example.com"
region = "eu-west-1"
bucket = "vault"
enforce_tls = true
address_lock_count = 31

[chunking]
chunk_size = 65536

[secrets]
age_identity = "~/.config/hoard/age.txt"
signing_key = "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE="
trusted_signers = ["ICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgICA="]

[[secrets.symmetric]]
public_id = "team"
secret_key = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="

[[secrets.symmetric]]
public_id = "ops"
passphrase = "correct horse battery staple"
"#;

        let config: HoardConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.bucket, "vault");
        assert!(config.storage.enforce_tls);
        assert_eq!(config.storage.address_lock_count, 31);
        assert_eq!(config.chunking.chunk_size, 65536);
        assert_eq!(config.secrets.symmetric.len(), 2);
        assert_eq!(config.secrets.symmetric[1].public_id, "ops");
        assert!(config.secrets.symmetric[1].secret_key.is_none());
        assert_eq!(
            config.secrets.age_identity,
            Some(PathBuf::from("~/.config/hoard/age.txt"))
        );
        assert!(config.secrets.signing_key.is_some());
        assert_eq!(config.secrets.trusted_signers.len(), 1);
    }

    #[test]
    fn test_parse_defaults() {
        let config: HoardConfig = toml::from_str("").unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.address_lock_count, 127);
        assert_eq!(config.chunking.chunk_size, DEFAULT_CHUNK_SIZE as u64);
        assert!(config.secrets.symmetric.is_empty());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[storage]
backend = "filesystem"
root = "/tmp/hoard"
"#;
        let config: HoardConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Filesystem);
        assert_eq!(config.storage.root, PathBuf::from("/tmp/hoard"));
        // unspecified fields keep their defaults
        assert_eq!(config.storage.region, "us-east-1");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = HoardConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: HoardConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.storage.bucket, config.storage.bucket);
        assert_eq!(parsed.chunking.chunk_size, config.chunking.chunk_size);
    }
}
