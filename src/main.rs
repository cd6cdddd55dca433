use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use coinbal_core::{
    error_payload, CallerIdentity, CoinBalance, Ed25519Verifier, InMemoryActorRegistry,
    LedgerError, MemoryStore, Role, Transfer,
};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::{CliConfig, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(name = "coinbal", version, about = "Local host for the CoinBal token ledger")]
struct Cli {
    /// Configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// State snapshot file; overrides `state_file`.
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Caller role attribute; overrides `caller_role`.
    #[arg(long, global = true, value_parser = parse_role)]
    role: Option<Role>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one ledger operation in a single atomic invocation.
    Invoke {
        function: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Generate an ed25519 keypair as sk.hex / pk.hex.
    Keygen {
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Print the digest and signature arguments for a `transfer` invocation.
    Sign {
        #[arg(long)]
        sk_hex: String,
        transfer: String,
    },
}

fn parse_role(value: &str) -> std::result::Result<Role, String> {
    value.parse().map_err(|e: LedgerError| e.to_string())
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

//==================== invoke ====================//

/// Loads the snapshot, runs the invocation and persists the snapshot if it committed.
///
/// The outer `Result` carries host failures; the inner one the ledger's verdict.
fn run_invoke(
    config: &CliConfig,
    function: &str,
    args: &[String],
) -> Result<std::result::Result<Vec<u8>, LedgerError>> {
    let state_file = config.state_file();
    let store = MemoryStore::load(&state_file)
        .with_context(|| format!("open state {}", state_file.display()))?;
    let contract = CoinBalance::new(
        Box::new(Ed25519Verifier),
        Box::new(InMemoryActorRegistry::new(config.known_actors.iter().cloned())),
    );
    let caller = CallerIdentity {
        role: config.caller_role,
    };

    let height = store.height();
    let verdict = contract.execute(&store, &caller, function, args);
    if verdict.is_ok() && store.height() != height {
        store
            .save(&state_file)
            .with_context(|| format!("write state {}", state_file.display()))?;
        debug!(height = store.height(), path = %state_file.display(), "state saved");
    }
    Ok(verdict)
}

fn invoke_cmd(config: &CliConfig, function: &str, args: &[String]) -> Result<ExitCode> {
    match run_invoke(config, function, args)? {
        Ok(payload) => {
            if !payload.is_empty() {
                println!("{}", String::from_utf8_lossy(&payload));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("{}", error_payload(&err));
            Ok(ExitCode::from(1))
        }
    }
}

//==================== keygen / sign ====================//

fn fingerprint(public_key: &[u8]) -> String {
    let digest = Sha256::digest(public_key);
    hex::encode(&digest[..8])
}

fn keygen_cmd(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("mkdir {}", out_dir.display()))?;
    let sk = SigningKey::generate(&mut OsRng);
    let pk = sk.verifying_key();

    fs::write(out_dir.join("sk.hex"), hex::encode(sk.to_bytes()))
        .with_context(|| format!("write {}", out_dir.join("sk.hex").display()))?;
    fs::write(out_dir.join("pk.hex"), hex::encode(pk.as_bytes()))
        .with_context(|| format!("write {}", out_dir.join("pk.hex").display()))?;
    info!(fingerprint = %fingerprint(pk.as_bytes()), "keypair generated");
    println!("keypair written → {}", out_dir.display());
    Ok(())
}

fn parse_sk_hex(sk_hex: &str) -> Result<SigningKey> {
    let trimmed = sk_hex.trim();
    let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .context("invalid --sk-hex")?;
    let Ok(secret) = <[u8; 32]>::try_from(bytes.as_slice()) else {
        bail!("--sk-hex must be 32 bytes (64 hex chars), got {}", bytes.len());
    };
    Ok(SigningKey::from_bytes(&secret))
}

/// Digest and signature for `transfer`, in the order `invoke transfer` expects them.
fn sign_transfer(sk: &SigningKey, transfer_json: &str) -> Result<(String, String)> {
    let transfer: Transfer = serde_json::from_str(transfer_json).context("parse transfer JSON")?;
    let expected_from = hex::encode(sk.verifying_key().as_bytes());
    if !transfer.from.trim_start_matches("0x").eq_ignore_ascii_case(&expected_from) {
        bail!(
            "transfer From {} is not the public key of this secret ({expected_from})",
            transfer.from
        );
    }
    let digest = transfer.digest();
    let signature = sk.sign(&digest);
    Ok((hex::encode(digest), hex::encode(signature.to_bytes())))
}

fn sign_cmd(sk_hex: &str, transfer_json: &str) -> Result<()> {
    let sk = parse_sk_hex(sk_hex)?;
    let (digest, signature) = sign_transfer(&sk, transfer_json)?;
    println!("{digest}");
    println!("{signature}");
    Ok(())
}

//==================== main ====================//

fn run(cli: Cli) -> Result<ExitCode> {
    let explicit = cli.config.is_some();
    let path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = CliConfig::load(&path, explicit)?;
    config.apply_overrides(cli.state, cli.role);
    init_tracing(config.log_filter());

    match cli.command {
        Command::Invoke { function, args } => invoke_cmd(&config, &function, &args),
        Command::Keygen { out_dir } => keygen_cmd(&out_dir).map(|_| ExitCode::SUCCESS),
        Command::Sign { sk_hex, transfer } => {
            sign_cmd(&sk_hex, &transfer).map(|_| ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
