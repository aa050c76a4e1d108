//! OpenDAL Operator factory for hoard storage backends

use anyhow::{Context, Result};
use opendal::Operator;

use hoard_core::config::{StorageBackend, StorageConfig};

/// S3 credentials, read from the environment
#[derive(Debug, Clone, Default)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl S3Credentials {
    pub fn from_env() -> Self {
        Self {
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
        }
    }
}

/// Build the operator selected by `storage.backend`.
///
/// If `enforce_tls` is true and an S3 endpoint uses HTTP, this returns an
/// error. Otherwise, a warning is logged for non-HTTPS endpoints.
pub fn build_operator(storage: &StorageConfig, creds: &S3Credentials) -> Result<Operator> {
    let op = match storage.backend {
        StorageBackend::Memory => Operator::new(opendal::services::Memory::default())
            .context("creating OpenDAL memory operator")?
            .finish(),
        StorageBackend::Filesystem => {
            let root = storage
                .root
                .to_str()
                .context("filesystem root is not valid UTF-8")?;
            Operator::new(opendal::services::Fs::default().root(root))
                .with_context(|| format!("creating OpenDAL fs operator at {root}"))?
                .layer(opendal::layers::LoggingLayer::default())
                .finish()
        }
        StorageBackend::S3 => build_s3_operator(storage, creds)?,
    };
    Ok(op)
}

fn build_s3_operator(storage: &StorageConfig, creds: &S3Credentials) -> Result<Operator> {
    if storage.endpoint.starts_with("http://") {
        if storage.enforce_tls {
            anyhow::bail!(
                "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                storage.endpoint
            );
        }
        tracing::warn!(
            endpoint = %storage.endpoint,
            "S3 endpoint uses plaintext HTTP; credentials are transmitted unencrypted"
        );
    }

    // path-style addressing is the opendal default, which MinIO-style endpoints need
    let mut builder = opendal::services::S3::default()
        .endpoint(&storage.endpoint)
        .region(&storage.region)
        .bucket(&storage.bucket)
        .access_key_id(&creds.access_key_id)
        .secret_access_key(&creds.secret_access_key);
    if let Some(root) = storage.root.to_str().filter(|r| !r.is_empty()) {
        builder = builder.root(root);
    }

    let op = Operator::new(builder)
        .context("creating OpenDAL S3 operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}
