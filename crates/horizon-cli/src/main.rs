//! Horizon CLI: validate and persist uploads against the configured upload root.
//!
//! Configuration comes from the environment (and `.env`): UPLOAD_ROOT,
//! UPLOAD_PROFILE, MAX_FILE_SIZE_MB, COMPRESS_IMAGES, MIME_SNIFFING, ...

use anyhow::Context;
use clap::{Parser, Subcommand};
use horizon_cli::doctor::run_diagnostics;
use horizon_cli::{candidate_name, init_tracing, log_upload_error, ErrorBody};
use horizon_core::{AppConfig, UploadError};
use horizon_processing::{UploadCandidate, UploadPersister};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "horizon", about = "Horizon upload pipeline CLI")]
struct Cli {
    /// Upload root, overriding UPLOAD_ROOT
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the upload checks on a local file without storing it
    Validate {
        /// Path to the file to check
        file: PathBuf,
        /// Filename to validate under (defaults to the file's own name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Validate and store a local file
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        /// Filename to upload under (defaults to the file's own name)
        #[arg(long)]
        name: Option<String>,
        /// Prefix for the generated name, e.g. "profile"
        #[arg(long)]
        prefix: Option<String>,
        /// Store images as uploaded
        #[arg(long)]
        no_compress: bool,
    },
    /// Delete a stored upload by its generated name
    Delete {
        /// Generated name returned by `upload`
        name: String,
    },
    /// SHA-256 of a stored upload
    Hash {
        /// Generated name returned by `upload`
        name: String,
    },
    /// Check the upload root, content sniffing and effective limits
    Doctor,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

/// Log an upload error, print it as JSON and exit non-zero
fn fail(err: UploadError) -> anyhow::Result<()> {
    log_upload_error(&err);
    print_json(&ErrorBody::from(&err))?;
    std::process::exit(1);
}

fn open_candidate(
    file: &std::path::Path,
    name: Option<&str>,
) -> anyhow::Result<UploadCandidate<std::fs::File>> {
    let reader = std::fs::File::open(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    UploadCandidate::new(candidate_name(file, name), reader)
        .with_context(|| format!("Failed to read {}", file.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("Invalid upload configuration")?;
    if let Some(root) = cli.root {
        config.upload_root = root;
    }

    tracing::debug!(
        upload_root = %config.upload_root.display(),
        profile = %config.policy.profile,
        "Configuration loaded"
    );

    if let Commands::Doctor = cli.command {
        let report = run_diagnostics(&config).await;
        print_json(&report)?;
        if !report.healthy {
            std::process::exit(1);
        }
        return Ok(());
    }

    match UploadPersister::from_config(&config) {
        Ok(persister) => run_command(cli.command, &persister).await,
        Err(e) => fail(e),
    }
}

async fn run_command(command: Commands, persister: &UploadPersister) -> anyhow::Result<()> {
    match command {
        Commands::Validate { file, name } => {
            let mut candidate = open_candidate(&file, name.as_deref())?;
            let outcome = persister.validator().validate(&mut candidate);
            print_json(&outcome)?;
            if !outcome.accepted {
                std::process::exit(1);
            }
        }
        Commands::Upload {
            file,
            name,
            prefix,
            no_compress,
        } => {
            let mut candidate = open_candidate(&file, name.as_deref())?;
            let mut options = *persister.options();
            if no_compress {
                options.compress_images = false;
            }
            match persister
                .persist_with(&mut candidate, prefix.as_deref(), &options)
                .await
            {
                Ok(stored) => print_json(&stored)?,
                Err(e) => return fail(e),
            }
        }
        Commands::Delete { name } => match persister.delete(&name).await {
            Ok(outcome) => print_json(&serde_json::json!({
                "success": true,
                "result": outcome,
                "message": outcome.message(),
            }))?,
            Err(e) => return fail(e),
        },
        Commands::Hash { name } => match persister.hash(&name).await {
            Ok(sha256) => print_json(&serde_json::json!({ "name": name, "sha256": sha256 }))?,
            Err(e) => return fail(e),
        },
        Commands::Doctor => {}
    }

    Ok(())
}
