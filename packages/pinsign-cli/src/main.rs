//! PinSign command-line shell
//!
//! Thin front end over `pinsign-core`:
//!
//! 1. **status / watch**: report whether the credential device and its key
//!    container are present.
//!
//! 2. **enroll**: provision a device with a fresh key sealed under a PIN and
//!    export the public key for verifiers.
//!
//! 3. **sign / verify**: sign a PDF with the device key, or check a signed
//!    PDF against a public key file.
//!
//! Progress lines go to stdout, logs to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use color_eyre::{Report, Section};
use tracing_subscriber::EnvFilter;

use pinsign_core::enrollment::enroll_with_progress;
use pinsign_core::verifier::verify_with_progress;
use pinsign_core::{
    CredentialStaging, DeviceMonitor, Progress, ProgressReporter, Remedy, SignerConfig,
    SigningEngine, VerificationOutcome,
};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pinsign", version, about = "PIN-protected document signing")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "PINSIGN_CONFIG")]
    config: Option<PathBuf>,

    /// Mount points to scan, in order (comma-separated). Overrides the config.
    #[arg(long, global = true, env = "PINSIGN_MOUNTS", value_delimiter = ',')]
    mounts: Vec<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "PINSIGN_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll once and print the device state
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep polling and print every state change until Ctrl-C
    Watch,

    /// Provision a device with a new PIN-protected key
    Enroll {
        /// Root directory of the device to provision
        #[arg(long)]
        device: PathBuf,

        /// Where to write the public key (.pem or .der)
        #[arg(long)]
        public_key_out: PathBuf,

        /// PIN protecting the new key
        #[arg(long, env = "PINSIGN_PIN", hide_env_values = true)]
        pin: String,
    },

    /// Sign a PDF with the key on the inserted device
    Sign {
        /// Document to sign
        document: PathBuf,

        /// Device PIN
        #[arg(long, env = "PINSIGN_PIN", hide_env_values = true)]
        pin: String,

        /// Stage credentials in private temporary files instead of memory
        #[arg(long)]
        temp_files: bool,
    },

    /// Verify a signed PDF against a public key file
    Verify {
        /// Signed document
        document: PathBuf,

        /// Expected signer's public key (.pem or .der)
        #[arg(long)]
        public_key: PathBuf,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = load_config(cli.config.as_deref(), &cli.mounts)?;

    match cli.command {
        Command::Status { json } => status(config, json),
        Command::Watch => watch(config).await,
        Command::Enroll {
            device,
            public_key_out,
            pin,
        } => enroll(config, device, public_key_out, pin).await,
        Command::Sign {
            document,
            pin,
            temp_files,
        } => {
            let mut config = config;
            if temp_files {
                config.credential_staging = CredentialStaging::TempFiles;
            }
            sign(config, document, pin).await
        }
        Command::Verify {
            document,
            public_key,
            json,
        } => verify(document, public_key, json).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pinsign=info,pinsign_core=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Defaults, then the TOML file, then `--mounts`.
fn load_config(path: Option<&Path>, mounts: &[PathBuf]) -> Result<SignerConfig> {
    let mut config = match path {
        Some(path) => SignerConfig::from_toml_file(path).map_err(core_report)?,
        None => SignerConfig::default(),
    };

    if !mounts.is_empty() {
        config.mount_points = mounts.to_vec();
    }
    config.validate().map_err(core_report)?;

    tracing::debug!(mounts = ?config.mount_points, "Configuration loaded");
    Ok(config)
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn status(config: SignerConfig, json: bool) -> Result<ExitCode> {
    let monitor = DeviceMonitor::new(Arc::new(config));
    let state = monitor.poll_once();

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!("{}", state);
    }
    Ok(ExitCode::SUCCESS)
}

async fn watch(config: SignerConfig) -> Result<ExitCode> {
    let monitor = Arc::new(DeviceMonitor::new(Arc::new(config)));
    let mut changes = monitor.subscribe();
    let poller = monitor.spawn();

    println!("Watching for the signing device (Ctrl-C to stop)...");
    println!("{}", monitor.get_state());

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = changes.borrow_and_update().clone();
                println!("{}", state);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping device monitor");
                break;
            }
        }
    }

    poller.abort();
    Ok(ExitCode::SUCCESS)
}

async fn enroll(
    config: SignerConfig,
    device: PathBuf,
    public_key_out: PathBuf,
    pin: String,
) -> Result<ExitCode> {
    let report = run_with_progress(move |progress| {
        enroll_with_progress(&pin, &device, &public_key_out, &config, progress)
    })
    .await?;

    println!("Public key written to {}", report.public_key_path.display());
    println!("Fingerprint: {}", report.fingerprint);
    Ok(ExitCode::SUCCESS)
}

async fn sign(config: SignerConfig, document: PathBuf, pin: String) -> Result<ExitCode> {
    let config = Arc::new(config);
    let monitor = DeviceMonitor::new(config.clone());
    monitor.poll_once();
    let engine = SigningEngine::new(config, monitor.handle());

    let artifact =
        run_with_progress(move |progress| engine.sign_with_progress(&document, &pin, progress))
            .await?;

    tracing::debug!(serial = %artifact.identity.serial, "Signature identity");
    Ok(ExitCode::SUCCESS)
}

async fn verify(document: PathBuf, public_key: PathBuf, json: bool) -> Result<ExitCode> {
    let report =
        run_with_progress(move |progress| verify_with_progress(&document, &public_key, progress))
            .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        // The outcome line itself was already printed as progress.
        for line in report.summary().lines().skip(1) {
            println!("{}", line);
        }
    }
    Ok(ExitCode::from(verify_exit_status(report.outcome)))
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Run a blocking core operation off the runtime, printing its progress.
async fn run_with_progress<T, F>(op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&ProgressReporter) -> pinsign_core::Result<T> + Send + 'static,
{
    let (reporter, mut rx) = ProgressReporter::channel();

    let printer = tokio::spawn(async move {
        while let Some(step) = rx.recv().await {
            print_progress(&step);
        }
    });

    let result = tokio::task::spawn_blocking(move || op(&reporter))
        .await
        .wrap_err("Worker task failed")?;

    // All senders are gone once the closure returned; the printer drains and exits.
    let _ = printer.await;
    result.map_err(core_report)
}

fn print_progress(step: &Progress) {
    println!("{}", step.message());
}

/// Attach the user-facing remedy to a core error.
fn core_report(err: pinsign_core::Error) -> Report {
    let code = err.code();
    let hint = remedy_hint(err.remedy());
    let report = Report::new(err).with_note(|| format!("error code {}", code));
    match hint {
        Some(hint) => report.suggestion(hint),
        None => report,
    }
}

fn remedy_hint(remedy: Remedy) -> Option<&'static str> {
    match remedy {
        Remedy::ReenterPin => Some("Re-enter your PIN."),
        Remedy::ReinsertDevice => Some("Insert the signing device and try again."),
        Remedy::ReprovisionKey => {
            Some("The key on the device is unusable; enroll the device again.")
        }
        Remedy::CheckInput => Some("Check the file paths and arguments."),
        Remedy::Retry => Some("Try again; the failure may be transient."),
        Remedy::None => None,
    }
}

fn verify_exit_status(outcome: VerificationOutcome) -> u8 {
    match outcome {
        VerificationOutcome::ValidMatch => 0,
        VerificationOutcome::ValidKeyMismatch => 2,
        VerificationOutcome::SignatureInvalid => 3,
        VerificationOutcome::NoSignaturePresent => 4,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
