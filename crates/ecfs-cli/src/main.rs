//! ecfs: encrypted-directory filename tooling
//!
//! Commands:
//!   config show                      - display current configuration
//!   encode <hex> / decode <text>     - presented-name codec
//!   present <hex>                    - no-key presentation of a stored ciphertext name
//!   lookup <presented>               - what a no-key name resolves to
//!   encrypted-size <len>             - padded on-disk length of a name
//!   context show <hex>               - decode a stored encryption context
//!   context new --descriptor <hex>   - build a v1 context from the config defaults

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use ecfs_core::config::EcfsConfig;
use ecfs_core::{DirHash, FileKind};
use ecfs_crypto::policy::{mode, padding_flags, PolicyV1, KEY_DESCRIPTOR_SIZE};
use ecfs_crypto::{
    encrypted_size, shared_digest, supported_policy, EncryptionContext, EncryptionPolicy, Inode,
    NoKeyName, BLOCK_SIZE,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "ecfs",
    version,
    about = "Encrypted-directory filename tooling",
    long_about = "ecfs: inspect no-key names, name padding and encryption contexts"
)]
struct Cli {
    /// Path to ecfs.toml configuration file
    #[arg(long, short = 'c', env = "ECFS_CONFIG", default_value = "/etc/ecfs/config.toml")]
    config: PathBuf,

    /// Log filter (overrides logging.level)
    #[arg(long, env = "ECFS_LOG", global = true)]
    log: Option<String>,

    /// Log format: text or json (overrides logging.format)
    #[arg(long, env = "ECFS_LOG_FORMAT", global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Encode hex bytes in the presented-name alphabet
    Encode { hex: String },

    /// Decode a presented-name string to hex bytes
    Decode { text: String },

    /// Show how a stored ciphertext name appears without its key
    Present {
        /// Stored (ciphertext) name as hex
        disk_name: String,

        /// Directory index hash of the entry
        #[arg(long, default_value_t = 0)]
        hash: u32,

        /// Directory index minor hash of the entry
        #[arg(long, default_value_t = 0)]
        minor_hash: u32,
    },

    /// Decode a no-key name into its hash pair and stored-name material
    Lookup { presented: String },

    /// Padded on-disk length of a name of the given length
    EncryptedSize {
        len: usize,

        /// Padding multiple (overrides policy.padding)
        #[arg(long)]
        padding: Option<u8>,
    },

    /// Encryption context tools
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Subcommand, Debug)]
enum ContextAction {
    /// Decode a stored context (hex) and print it as JSON
    Show { hex: String },

    /// Build a v1 context with a fresh nonce from the configured policy defaults
    New {
        /// 8-byte master key descriptor as hex
        #[arg(long)]
        descriptor: String,
    },
}

// ── Entry point ────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EcfsConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;
    init_logging(
        log_filter(cli.log.as_deref(), &config.logging.level),
        cli.log_format.as_deref().unwrap_or(&config.logging.format),
    );

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
        Commands::Encode { hex } => cmd_encode(&hex),
        Commands::Decode { text } => cmd_decode(&text),
        Commands::Present { disk_name, hash, minor_hash } => {
            cmd_present(&config, &disk_name, hash, minor_hash)
        }
        Commands::Lookup { presented } => cmd_lookup(&config, &presented),
        Commands::EncryptedSize { len, padding } => cmd_encrypted_size(&config, len, padding),
        Commands::Context { action: ContextAction::Show { hex } } => cmd_context_show(&hex),
        Commands::Context { action: ContextAction::New { descriptor } } => {
            cmd_context_new(&config, &descriptor)
        }
    }
}

/// `--log`/`ECFS_LOG` wins outright; otherwise `RUST_LOG`, then the config.
fn log_filter(explicit: Option<&str>, configured: &str) -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;

    match explicit {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured)),
    }
}

/// Logs go to stderr so command output stays machine-readable.
fn init_logging(filter: tracing_subscriber::EnvFilter, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

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

fn parse_hex(label: &str, input: &str) -> Result<Vec<u8>> {
    hex::decode(input.trim()).with_context(|| format!("{label} is not valid hex"))
}

// ── `ecfs config show` ─────────────────────────────────────────────────────────

fn cmd_config_show(config: &EcfsConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── `ecfs encode` / `ecfs decode` ──────────────────────────────────────────────

fn cmd_encode(input: &str) -> Result<()> {
    let bytes = parse_hex("input", input)?;
    println!("{}", ecfs_crypto::encode(&bytes));
    Ok(())
}

fn cmd_decode(text: &str) -> Result<()> {
    let bytes = ecfs_crypto::decode(text.as_bytes()).context("decoding presented name")?;
    println!("{}", hex::encode(bytes));
    Ok(())
}

// ── `ecfs present` ─────────────────────────────────────────────────────────────

fn cmd_present(config: &EcfsConfig, disk_name: &str, hash: u32, minor_hash: u32) -> Result<()> {
    let disk = parse_hex("disk name", disk_name)?;
    if disk.len() < BLOCK_SIZE {
        anyhow::bail!(
            "{} bytes is shorter than any encrypted name ({BLOCK_SIZE})",
            disk.len()
        );
    }
    if disk.len() > config.names.max_namelen {
        anyhow::bail!(
            "{} bytes exceeds names.max_namelen ({})",
            disk.len(),
            config.names.max_namelen
        );
    }

    let nokey = NoKeyName::build(&disk, Some(DirHash::new(hash, minor_hash)), shared_digest())?;
    tracing::debug!(size = nokey.size(), digested = nokey.is_digested(), "built no-key name");
    println!("{}", nokey.encode());
    Ok(())
}

// ── `ecfs lookup` ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct LookupView {
    hash: u32,
    minor_hash: u32,
    /// Exact stored name (short form only)
    disk_name: Option<String>,
    leading_bytes: String,
    /// SHA-256 of the stored name past its first 149 bytes (long form only)
    tail_digest: Option<String>,
}

fn cmd_lookup(config: &EcfsConfig, presented: &str) -> Result<()> {
    if !config.names.allow_keyless_lookup {
        anyhow::bail!("keyless lookup is disabled (names.allow_keyless_lookup = false)");
    }
    let nokey = NoKeyName::decode(presented.as_bytes())
        .with_context(|| format!("{presented:?} is not a no-key name"))?;

    let dirhash = nokey.dirhash();
    let view = LookupView {
        hash: dirhash.hash,
        minor_hash: dirhash.minor_hash,
        disk_name: (!nokey.is_digested()).then(|| hex::encode(nokey.leading_bytes())),
        leading_bytes: hex::encode(nokey.leading_bytes()),
        tail_digest: nokey.digest().map(hex::encode),
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

// ── `ecfs encrypted-size` ──────────────────────────────────────────────────────

fn cmd_encrypted_size(config: &EcfsConfig, len: usize, padding: Option<u8>) -> Result<()> {
    let padding = padding.unwrap_or(config.policy.padding);
    let flags = padding_flags(padding)
        .with_context(|| format!("padding must be 4, 8, 16 or 32, got {padding}"))?;
    let size = encrypted_size(flags, len, config.names.max_namelen)?;
    println!("{size}");
    Ok(())
}

// ── `ecfs context` ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ContextView {
    version: u8,
    contents_mode: &'static str,
    filenames_mode: &'static str,
    flags: u8,
    padding: usize,
    master_key: String,
    nonce: String,
    supported: bool,
}

fn cmd_context_show(input: &str) -> Result<()> {
    let bytes = parse_hex("context", input)?;
    let ctx = EncryptionContext::from_bytes(0, &bytes)?;
    let policy = ctx.policy();
    let probe = Inode::new(0, FileKind::Directory, 0);

    let view = ContextView {
        version: ctx.version(),
        contents_mode: mode::name(policy.contents_mode()),
        filenames_mode: mode::name(policy.filenames_mode()),
        flags: policy.flags(),
        padding: policy.padding(),
        master_key: hex::encode(policy.master_key_spec()),
        nonce: hex::encode(ctx.nonce()),
        supported: supported_policy(&policy, &probe),
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn cmd_context_new(config: &EcfsConfig, descriptor: &str) -> Result<()> {
    let desc = parse_hex("descriptor", descriptor)?;
    let master_key_descriptor: [u8; KEY_DESCRIPTOR_SIZE] =
        desc.as_slice().try_into().with_context(|| {
            format!(
                "descriptor must be {KEY_DESCRIPTOR_SIZE} bytes, got {}",
                desc.len()
            )
        })?;

    let contents_mode = mode::from_name(&config.policy.contents_mode)
        .with_context(|| format!("unknown contents mode {:?}", config.policy.contents_mode))?;
    let filenames_mode = mode::from_name(&config.policy.filenames_mode)
        .with_context(|| format!("unknown filenames mode {:?}", config.policy.filenames_mode))?;
    let flags = padding_flags(config.policy.padding)
        .with_context(|| format!("invalid padding {}", config.policy.padding))?;

    let policy = EncryptionPolicy::V1(PolicyV1 {
        contents_mode,
        filenames_mode,
        flags,
        master_key_descriptor,
    });
    if !supported_policy(&policy, &Inode::new(0, FileKind::Directory, 0)) {
        anyhow::bail!(
            "policy {}/{} is not a supported combination",
            config.policy.contents_mode,
            config.policy.filenames_mode
        );
    }

    let ctx = EncryptionContext::new_from_policy(&policy);
    tracing::info!(size = ctx.size(), "built encryption context");
    println!("{}", hex::encode(ctx.to_bytes()));
    Ok(())
}
