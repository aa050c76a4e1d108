//! Age identity discovery chain

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use hoard_core::config::SecretsConfig;

/// Raw age identity file contents and where they came from
pub struct IdentitySource {
    pub key_data: String,
    pub source: String,
}

/// Discover the age identity using the priority chain:
///   1. $HOARD_AGE_IDENTITY_FILE  (explicit path env var)
///   2. $HOARD_AGE_IDENTITY  (literal key in env var, may be multi-line)
///   3. config.age_identity path (from hoard.toml)
///   4. ~/.config/hoard/age/keys.txt  (default XDG location)
///
/// No identity at all is not an error: the store still works for plaintext
/// and symmetric grants.
pub async fn find_age_identity(config: &SecretsConfig) -> Result<Option<IdentitySource>> {
    if let Ok(key_file) = std::env::var("HOARD_AGE_IDENTITY_FILE") {
        let path = PathBuf::from(&key_file);
        return read_identity(&path, "HOARD_AGE_IDENTITY_FILE").await.map(Some);
    }

    if let Ok(key_content) = std::env::var("HOARD_AGE_IDENTITY") {
        if !key_content.is_empty() {
            return Ok(Some(IdentitySource {
                key_data: key_content,
                source: "HOARD_AGE_IDENTITY (env)".into(),
            }));
        }
    }

    // an explicitly configured path must exist
    if let Some(identity_path) = &config.age_identity {
        let expanded = expand_tilde(identity_path);
        return read_identity(&expanded, "config").await.map(Some);
    }

    let default_path = default_age_key_path();
    if default_path.exists() {
        return read_identity(&default_path, "default").await.map(Some);
    }

    Ok(None)
}

async fn read_identity(path: &Path, origin: &str) -> Result<IdentitySource> {
    let key_data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading age identity ({origin}): {}", path.display()))?;
    Ok(IdentitySource {
        key_data,
        source: format!("{origin}:{}", path.display()),
    })
}

fn default_age_key_path() -> PathBuf {
    home_dir().join(".config/hoard/age/keys.txt")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        return home_dir().join(rest);
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("~/.config/hoard/age/keys.txt"));
        assert!(!expanded.to_str().unwrap().starts_with("~/"));
        assert_eq!(expand_tilde(Path::new("/abs/path")), PathBuf::from("/abs/path"));
    }

    #[tokio::test]
    async fn test_configured_path_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        std::fs::write(&path, "AGE-SECRET-KEY-PLACEHOLDER\n").unwrap();

        let config = SecretsConfig {
            age_identity: Some(path.clone()),
            ..Default::default()
        };
        // env overrides are not set in the test environment
        if std::env::var("HOARD_AGE_IDENTITY_FILE").is_err()
            && std::env::var("HOARD_AGE_IDENTITY").is_err()
        {
            let found = find_age_identity(&config).await.unwrap().unwrap();
            assert!(found.key_data.starts_with("AGE-SECRET-KEY"));
            assert!(found.source.starts_with("config:"));
        }
    }

    #[tokio::test]
    async fn test_missing_configured_path_errors() {
        let config = SecretsConfig {
            age_identity: Some(PathBuf::from("/definitely/not/here/keys.txt")),
            ..Default::default()
        };
        if std::env::var("HOARD_AGE_IDENTITY_FILE").is_err()
            && std::env::var("HOARD_AGE_IDENTITY").is_err()
        {
            assert!(find_age_identity(&config).await.is_err());
        }
    }
}
