//! LoanShield CLI - Command line access to the Privacy Shield.
//!
//! Seals and reveals sensitive loan fields, inspects stored values, and
//! re-encrypts exported fields after a passphrase change.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zeroize::Zeroizing;

use loanshield_common::Error;
use loanshield_crypto::{Envelope, KdfParams};
use loanshield_shield::config::CONFIG_FILENAME;
use loanshield_shield::{
    derive_in_background, is_marked, rekey_all, reveal, KeySession, RekeyPolicy, SaltPolicy,
    ShieldConfig, SENTINEL,
};

/// Environment variable consulted before prompting for the passphrase.
const PASSPHRASE_ENV: &str = "LOANSHIELD_PASSPHRASE";

/// Environment variable consulted before prompting for a new passphrase.
const NEW_PASSPHRASE_ENV: &str = "LOANSHIELD_NEW_PASSPHRASE";

#[derive(Parser)]
#[command(name = "loanshield")]
#[command(about = "LoanShield - Privacy Shield field encryption")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Path to the shield configuration file.
    #[arg(long, global = true, env = "LOANSHIELD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a field value for storage.
    Seal {
        /// Plaintext field value.
        #[arg(short, long)]
        value: String,
    },

    /// Decrypt a stored field value for display.
    Reveal {
        /// Stored field value.
        #[arg(short, long)]
        value: String,

        /// Do not unlock; show what a locked session displays.
        #[arg(long)]
        locked: bool,
    },

    /// Describe a stored value without decrypting it.
    Inspect {
        /// Stored field value.
        #[arg(short, long)]
        value: String,
    },

    /// Re-encrypt a JSON array of stored values under a new passphrase.
    Rekey {
        /// Input file (JSON array of strings).
        #[arg(short, long)]
        input: PathBuf,

        /// Output file.
        #[arg(short, long)]
        output: PathBuf,

        /// Also seal values that are currently plaintext.
        #[arg(long)]
        seal_plaintext: bool,
    },

    /// Manage the shield configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a new configuration file.
    Init {
        /// Use a random per-user salt instead of the application salt.
        #[arg(long)]
        per_user_salt: bool,

        /// PBKDF2 iteration count.
        #[arg(long)]
        iterations: Option<u32>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration.
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = resolve_config_path(cli.config)?;

    match cli.command {
        Commands::Seal { value } => cmd_seal(&config_path, &value).await,

        Commands::Reveal { value, locked } => cmd_reveal(&config_path, &value, locked).await,

        Commands::Inspect { value } => cmd_inspect(&value),

        Commands::Rekey {
            input,
            output,
            seal_plaintext,
        } => cmd_rekey(&config_path, &input, &output, seal_plaintext).await,

        Commands::Config { action } => match action {
            ConfigAction::Init {
                per_user_salt,
                iterations,
                force,
            } => cmd_config_init(&config_path, per_user_salt, iterations, force),
            ConfigAction::Show => cmd_config_show(&config_path),
        },

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "loanshield", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Explicit path, or `<config dir>/loanshield/config.json`.
fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => dirs::config_dir()
            .map(|dir| dir.join("loanshield").join(CONFIG_FILENAME))
            .context("Could not determine the configuration directory"),
    }
}

fn load_config(path: &Path) -> Result<ShieldConfig> {
    ShieldConfig::load_or_default(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Read a passphrase from `env_var`, or prompt for it securely.
fn read_passphrase(env_var: &str, prompt: &str) -> Result<Zeroizing<String>> {
    if let Ok(passphrase) = std::env::var(env_var) {
        return Ok(Zeroizing::new(passphrase));
    }

    let passphrase = rpassword::prompt_password(prompt).context("Failed to read passphrase")?;
    Ok(Zeroizing::new(passphrase))
}

/// Unlock a fresh session from the configured parameters.
async fn unlock_session(config: &ShieldConfig) -> Result<KeySession> {
    let passphrase = read_passphrase(PASSPHRASE_ENV, "Privacy passphrase: ")?;
    if passphrase.is_empty() {
        anyhow::bail!("Passphrase cannot be empty");
    }

    let session = KeySession::new();
    if let Err(e) = session.unlock(passphrase, config).await {
        let message = unlock_failure_message(&e);
        return Err(anyhow::Error::new(e).context(message));
    }
    Ok(session)
}

/// User-facing message for a failed unlock.
fn unlock_failure_message(error: &Error) -> &'static str {
    if error.is_retryable() {
        "Could not unlock, try again"
    } else {
        "Could not unlock"
    }
}

/// Seal a field value.
async fn cmd_seal(config_path: &Path, value: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let session = unlock_session(&config).await?;

    let sealed = session.seal(value).context("Failed to seal value")?;
    session.lock();

    println!("{}", sealed);
    Ok(())
}

/// Reveal a stored field value.
async fn cmd_reveal(config_path: &Path, value: &str, locked: bool) -> Result<()> {
    let session = if locked || !is_marked(value) {
        KeySession::new()
    } else {
        let config = load_config(config_path)?;
        unlock_session(&config).await?
    };

    let revealed = reveal(value, session.key().as_deref());
    session.lock();

    let readable = revealed.is_readable();
    println!("{}", revealed.into_display());
    if !readable {
        anyhow::bail!("Field could not be revealed");
    }
    Ok(())
}

/// Describe a stored value.
fn cmd_inspect(value: &str) -> Result<()> {
    let Some(encoded) = value.strip_prefix(SENTINEL) else {
        println!("Plaintext ({} bytes)", value.len());
        return Ok(());
    };

    match Envelope::parse(encoded) {
        Ok(envelope) => {
            println!("Sealed field:");
            println!("  Envelope: {} bytes", envelope.size());
            println!("  Plaintext: {} bytes", envelope.plaintext_len());
        }
        Err(_) => println!("Marked as sealed, but the envelope is malformed"),
    }

    Ok(())
}

/// Re-encrypt exported values under a new passphrase.
async fn cmd_rekey(config_path: &Path, input: &Path, output: &Path, seal_plaintext: bool) -> Result<()> {
    info!("Re-encrypting values from {}", input.display());

    let json = tokio::fs::read_to_string(input)
        .await
        .context("Failed to read input file")?;
    let values: Vec<String> =
        serde_json::from_str(&json).context("Input must be a JSON array of strings")?;

    let config = load_config(config_path)?;

    let old_passphrase = read_passphrase(PASSPHRASE_ENV, "Current passphrase: ")?;
    let new_passphrase = read_passphrase(NEW_PASSPHRASE_ENV, "New passphrase: ")?;
    if new_passphrase.is_empty() {
        anyhow::bail!("Passphrase cannot be empty");
    }
    if std::env::var(NEW_PASSPHRASE_ENV).is_err() {
        let confirm = read_passphrase(NEW_PASSPHRASE_ENV, "Confirm new passphrase: ")?;
        if *confirm != *new_passphrase {
            anyhow::bail!("New passphrases do not match");
        }
    }

    let old_key = derive_in_background(old_passphrase, config.clone())
        .await
        .context("Could not derive current key")?;
    let new_key = derive_in_background(new_passphrase, config)
        .await
        .context("Could not derive new key")?;

    let policy = if seal_plaintext {
        RekeyPolicy::SealPlaintext
    } else {
        RekeyPolicy::PreservePlaintext
    };

    let count = values.len();
    let rekeyed = rekey_all(values, Arc::new(old_key), Arc::new(new_key), policy)
        .await
        .context("Re-encryption failed; nothing was written")?;

    let json = serde_json::to_string_pretty(&rekeyed)?;
    tokio::fs::write(output, json)
        .await
        .context("Failed to write output file")?;

    println!("Re-encrypted {} values into {}", count, output.display());
    Ok(())
}

/// Write a new configuration file.
fn cmd_config_init(
    path: &Path,
    per_user_salt: bool,
    iterations: Option<u32>,
    force: bool,
) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    let kdf = iterations
        .map(KdfParams::with_iterations)
        .unwrap_or_default();
    let salt = if per_user_salt {
        SaltPolicy::per_user()
    } else {
        SaltPolicy::Application
    };

    let config = ShieldConfig::new(kdf, salt);
    config.save(path).context("Failed to write config")?;

    println!("Config written to {}", path.display());
    if per_user_salt {
        println!("  Keep this file: sealed fields cannot be opened without its salt.");
    }
    Ok(())
}

/// Print the effective configuration.
fn cmd_config_show(path: &Path) -> Result<()> {
    let config = load_config(path)?;

    println!("Shield Configuration:");
    println!("  File: {}", path.display());
    println!("  Version: {}.{}", config.version.major, config.version.minor);
    println!("  KDF: PBKDF2-HMAC-SHA256, {} iterations", config.kdf.iterations);
    match config.salt {
        SaltPolicy::Application => println!("  Salt: application-wide"),
        SaltPolicy::PerUser(_) => println!("  Salt: per-user"),
    }

    Ok(())
}
