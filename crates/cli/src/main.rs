mod cli;
mod error;
mod wiring;

use crate::cli::{App, Commands, Cooking};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use pantry_cook::CookingOptions;
use pantry_records::{DeleteOutcome, RecordsService, format_file_name};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let app = App::parse();
    match run(app).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = ?e, "{}", &*e);
            ExitCode::FAILURE
        },
    }
}

async fn run(app: App) -> Result<ExitCode> {
    let config = pantry_config::Config::load(app.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let service = wiring::build_service(&config)?;
    match app.cmd {
        Commands::Exists { id } => {
            let tier = service.tier(id).await.or_raise(|| ErrorKind::Records)?;
            println!("{tier:?}");
            Ok(match tier {
                pantry_records::Tier::None => ExitCode::FAILURE,
                _ => ExitCode::SUCCESS,
            })
        },
        Commands::Metadata(cooking) => {
            let metadata = service.get_metadata(&options(cooking));
            println!("{}", serde_json::json!({"extension": metadata.extension, "mime": metadata.mime}));
            Ok(ExitCode::SUCCESS)
        },
        Commands::Info { id } => {
            let metadata = service.get_record_metadata(id).await.or_raise(|| ErrorKind::Records)?;
            let json = serde_json::to_string_pretty(&metadata).or_raise(|| ErrorKind::Output)?;
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        },
        Commands::Cook { id, cooking, output } => {
            cook(&service, id, options(cooking), output).await?;
            Ok(ExitCode::SUCCESS)
        },
        Commands::Delete { id } => match service.delete_detailed(id).await.or_raise(|| ErrorKind::Records)? {
            DeleteOutcome::InUse => {
                eprintln!("record {id} is in use, try again later");
                Ok(ExitCode::FAILURE)
            },
            DeleteOutcome::Deleted => Ok(ExitCode::SUCCESS),
            DeleteOutcome::DeletedLocalOnly { remote_error } => {
                eprintln!("record {id} deleted locally, remote objects remain: {remote_error}");
                Ok(ExitCode::FAILURE)
            },
        },
        Commands::Job { ids, cooking, job_id } => {
            let handles = service.submit_batch(&ids, &options(cooking), job_id).await.or_raise(|| ErrorKind::Records)?;
            let mut failed = 0usize;
            for handle in handles {
                match handle.await {
                    Ok(Ok(outcome)) => println!("{:?} ({} bytes)", outcome.location, outcome.bytes_written),
                    // Already logged by the job itself.
                    Ok(Err(_)) => failed += 1,
                    Err(e) => {
                        tracing::error!(error = %e, "Transcoding job panicked");
                        failed += 1;
                    },
                }
            }
            Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        },
    }
}

fn options(cooking: Cooking) -> CookingOptions {
    CookingOptions {
        dynaudnorm: cooking.dynaudnorm,
        ..CookingOptions::new(cooking.format, cooking.container)
    }
}

async fn cook(service: &RecordsService, id: u64, options: CookingOptions, output: Option<PathBuf>) -> Result<()> {
    let mut stream = service.stream(id, &options).await.or_raise(|| ErrorKind::Records)?;
    let path = match output {
        Some(path) if path == Path::new("-") => {
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut stream, &mut stdout).await.or_raise(|| ErrorKind::Output)?;
            stdout.flush().await.or_raise(|| ErrorKind::Output)?;
            return Ok(());
        },
        Some(path) => path,
        None => {
            // Best-effort: a record without readable metadata is named by its id.
            let metadata = service.get_record_metadata(id).await.ok();
            let extension = service.get_metadata(&options).extension;
            PathBuf::from(format_file_name(id, extension, metadata.as_ref()))
        },
    };
    let mut file = File::create(&path).await.or_raise(|| ErrorKind::Output)?;
    let bytes = tokio::io::copy(&mut stream, &mut file).await.or_raise(|| ErrorKind::Output)?;
    file.flush().await.or_raise(|| ErrorKind::Output)?;
    tracing::info!(path = %path.display(), bytes, "Record cooked");
    Ok(())
}
