//! hoard: content-addressed encrypted storage CLI
//!
//! Commands:
//!   put-seal [<file>]        - store a file (or stdin) and print a grant
//!   unseal-get <grant>       - write the plaintext a grant covers
//!   unseal <grant>           - print the references inside a grant
//!   reseal <grant>           - seal a grant's references under a new spec
//!   stat <address>           - show whether an address is stored
//!   unseal-delete <grant>    - delete the objects a grant refers to directly
//!   keygen <kind>            - print a fresh symmetric or signing key
//!   config show              - display current configuration
//!
//! Grants are read from a file path, or stdin when the path is `-`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use hoard_core::config::{HoardConfig, StorageBackend};
use hoard_core::encoding::{address_from_key, address_key, to_base64};
use hoard_crypto::generate_key;
use hoard_core::types::{clamp_chunk_size, DEFAULT_CHUNK_SIZE};
use hoard_core::{HoardError, Header};
use hoard_grant::{Grant, GrantSpec};
use hoard_secrets::{SecretsManager, Signer};
use hoard_service::{Client, Hoard, StreamingService};
use hoard_storage::{build_operator, OperatorStore, S3Credentials};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "hoard",
    version,
    about = "Content-addressed encrypted storage",
    long_about = "hoard: store files as convergently encrypted chunks and share them as grants"
)]
struct Cli {
    /// Path to hoard.toml configuration file
    #[arg(long, short = 'c', env = "HOARD_CONFIG", default_value = "/etc/hoard/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a file (or stdin) and print a grant for it
    #[command(name = "put-seal")]
    PutSeal {
        /// File to store; stdin when omitted or `-`
        input: Option<PathBuf>,
        #[command(flatten)]
        spec: SpecArgs,
        /// Salt applied to every chunk (enables cross-user isolation)
        #[arg(long)]
        salt: Option<String>,
        /// Opaque metadata stored in the stream header
        #[arg(long)]
        metadata: Option<String>,
        /// Chunk size in bytes (overrides config)
        #[arg(long)]
        chunk_size: Option<u64>,
        /// Write the grant here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Write the plaintext a grant covers to a file (or stdout)
    #[command(name = "unseal-get")]
    UnsealGet {
        grant: PathBuf,
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Print the references inside a grant as JSON
    Unseal { grant: PathBuf },

    /// Seal a grant's references under a different spec
    Reseal {
        grant: PathBuf,
        #[command(flatten)]
        spec: SpecArgs,
    },

    /// Show whether an address is stored, and where
    Stat {
        /// URL-safe base64 address
        address: String,
    },

    /// Delete the objects a grant refers to directly
    ///
    /// Chunks behind the grant's link object may be shared with other grants
    /// and are not removed.
    #[command(name = "unseal-delete")]
    UnsealDelete { grant: PathBuf },

    /// Print a fresh key for hoard.toml
    Keygen {
        #[arg(value_enum)]
        kind: KeyKind,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum KeyKind {
    /// 256-bit key for `[[secrets.symmetric]] secret_key`
    Symmetric,
    /// Ed25519 seed for `[secrets] signing_key`, with its public key
    Signing,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SpecKind {
    Plaintext,
    Symmetric,
    Asymmetric,
}

#[derive(Args, Debug)]
struct SpecArgs {
    /// How the grant is sealed
    #[arg(long, value_enum, default_value_t = SpecKind::Plaintext)]
    seal: SpecKind,
    /// Symmetric secret id (for --seal symmetric)
    #[arg(long)]
    public_id: Option<String>,
    /// Age recipient (for --seal asymmetric); defaults to the local keyring
    #[arg(long)]
    recipient: Option<String>,
}

impl SpecArgs {
    fn to_spec(&self) -> Result<GrantSpec> {
        let spec = match self.seal {
            SpecKind::Plaintext => GrantSpec::plaintext(),
            SpecKind::Symmetric => GrantSpec::symmetric(
                self.public_id
                    .clone()
                    .context("--seal symmetric requires --public-id")?,
            ),
            SpecKind::Asymmetric => GrantSpec::asymmetric(self.recipient.clone()),
        };
        spec.validate()?;
        Ok(spec)
    }
}

// ── Entrypoint ────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;
    init_logging(&config.logging.level, &config.logging.format);

    match cli.command {
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
        Commands::PutSeal {
            input,
            spec,
            salt,
            metadata,
            chunk_size,
            output,
        } => {
            let head = Header {
                salt: salt.map(String::into_bytes).unwrap_or_default(),
                data: metadata.map(String::into_bytes).unwrap_or_default(),
                chunk_size: chunk_size.unwrap_or(0),
            };
            cmd_put_seal(&config, input.as_deref(), spec.to_spec()?, head, output.as_deref()).await
        }
        Commands::UnsealGet { grant, output } => {
            cmd_unseal_get(&config, &grant, output.as_deref()).await
        }
        Commands::Unseal { grant } => cmd_unseal(&config, &grant).await,
        Commands::Reseal { grant, spec } => cmd_reseal(&config, &grant, spec.to_spec()?).await,
        Commands::Stat { address } => cmd_stat(&config, &address).await,
        Commands::UnsealDelete { grant } => cmd_unseal_delete(&config, &grant).await,
        Commands::Keygen { kind } => {
            for line in keygen(kind) {
                println!("{line}");
            }
            Ok(())
        }
    }
}

async fn load_config(path: &Path) -> Result<HoardConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(HoardConfig::default())
    }
}

/// Logs go to stderr so stdout stays free for grants and plaintext.
fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

async fn build_service(config: &HoardConfig) -> Result<StreamingService> {
    if config.storage.backend == StorageBackend::Memory {
        tracing::warn!("memory storage backend: nothing persists after this command exits");
    }
    let op = build_operator(&config.storage, &S3Credentials::from_env())?;
    let secrets = SecretsManager::load(&config.secrets)
        .await
        .context("loading secrets")?;
    let hoard = Hoard::from_backend(
        Arc::new(OperatorStore::new(op)),
        secrets,
        config.storage.address_lock_count,
    );
    let chunk_size = clamp_chunk_size(config.chunking.chunk_size, DEFAULT_CHUNK_SIZE);
    Ok(StreamingService::new(hoard).with_chunk_size(chunk_size))
}

async fn open_input(path: Option<&Path>) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    match path {
        None => Ok(Box::new(tokio::io::stdin())),
        Some(p) if p == Path::new("-") => Ok(Box::new(tokio::io::stdin())),
        Some(p) => {
            let file = tokio::fs::File::open(p)
                .await
                .with_context(|| format!("opening {}", p.display()))?;
            Ok(Box::new(file))
        }
    }
}

async fn open_output(path: Option<&Path>) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    match path {
        None => Ok(Box::new(tokio::io::stdout())),
        Some(p) => {
            let file = tokio::fs::File::create(p)
                .await
                .with_context(|| format!("creating {}", p.display()))?;
            Ok(Box::new(file))
        }
    }
}

async fn read_grant(path: &Path) -> Result<Grant> {
    let mut json = String::new();
    open_input(Some(path))
        .await?
        .read_to_string(&mut json)
        .await
        .with_context(|| format!("reading grant {}", path.display()))?;
    Grant::from_json(&json).with_context(|| format!("parsing grant {}", path.display()))
}

async fn write_grant(grant: &Grant, output: Option<&Path>) -> Result<()> {
    let json = grant.to_json()?;
    match output {
        Some(p) => tokio::fs::write(p, format!("{json}\n"))
            .await
            .with_context(|| format!("writing grant {}", p.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn cmd_put_seal(
    config: &HoardConfig,
    input: Option<&Path>,
    spec: GrantSpec,
    head: Header,
    output: Option<&Path>,
) -> Result<()> {
    let client = Client::new(build_service(config).await?);
    let reader = open_input(input).await?;
    let head = (head != Header::default()).then_some(head);
    let grant = client.put_seal(reader, spec, head).await?;
    write_grant(&grant, output).await
}

async fn cmd_unseal_get(config: &HoardConfig, grant: &Path, output: Option<&Path>) -> Result<()> {
    let client = Client::new(build_service(config).await?);
    let grant = read_grant(grant).await?;
    let writer = open_output(output).await?;
    let (head, written) = client.unseal_get(&grant, writer).await?;
    if let Some(head) = head {
        tracing::info!(
            metadata = %String::from_utf8_lossy(&head.data),
            "stream header"
        );
    }
    tracing::info!(bytes = written, "unseal-get complete");
    Ok(())
}

async fn cmd_unseal(config: &HoardConfig, grant: &Path) -> Result<()> {
    let service = build_service(config).await?;
    let refs = service.hoard().unseal(&read_grant(grant).await?)?;
    let rendered = serde_json::to_string_pretty(&refs).context("serializing references")?;
    println!("{rendered}");
    Ok(())
}

async fn cmd_reseal(config: &HoardConfig, grant: &Path, spec: GrantSpec) -> Result<()> {
    let service = build_service(config).await?;
    let resealed = service.reseal(&read_grant(grant).await?, spec).await?;
    write_grant(&resealed, None).await
}

async fn cmd_stat(config: &HoardConfig, address: &str) -> Result<()> {
    let address = address_from_key(address.trim()).context("address is not URL-safe base64")?;
    let service = build_service(config).await?;
    let stat = service.stat(&address).await?;
    println!("address:  {}", address_key(&stat.address));
    println!("location: {}", stat.location);
    println!("exists:   {}", stat.stat.exists);
    if stat.stat.exists {
        println!("size:     {} bytes", stat.stat.size);
    }
    Ok(())
}

async fn cmd_unseal_delete(config: &HoardConfig, grant: &Path) -> Result<()> {
    let service = build_service(config).await?;
    let grant = read_grant(grant).await?;

    let (tx, mut rx) = futures::channel::mpsc::unbounded::<Vec<u8>>();
    service
        .unseal_delete(&grant, tx.sink_map_err(|_| HoardError::Cancelled))
        .await?;
    while let Some(address) = rx.next().await {
        println!("deleted {}", address_key(&address));
    }
    Ok(())
}

/// TOML lines to paste into hoard.toml.
fn keygen(kind: KeyKind) -> Vec<String> {
    match kind {
        KeyKind::Symmetric => vec![format!("secret_key = \"{}\"", to_base64(generate_key().as_bytes()))],
        KeyKind::Signing => {
            let signer = Signer::generate();
            vec![
                format!("# public key: {}", signer.public_key_base64()),
                format!("signing_key = \"{}\"", signer.seed_base64()),
            ]
        }
    }
}

fn cmd_config_show(config: &HoardConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(&redacted(config)).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

/// Copy of `config` with inline secret material masked.
fn redacted(config: &HoardConfig) -> HoardConfig {
    let mut shown = config.clone();
    for secret in &mut shown.secrets.symmetric {
        if secret.secret_key.is_some() {
            secret.secret_key = Some("[REDACTED]".into());
        }
        if secret.passphrase.is_some() {
            secret.passphrase = Some("[REDACTED]".into());
        }
    }
    if shown.secrets.signing_key.is_some() {
        shown.secrets.signing_key = Some("[REDACTED]".into());
    }
    shown
}
