mod api;
mod capture;
mod cli;
mod notify;
mod pending;
mod refresh;
mod settings;
mod staging;
mod store;
mod theme;
mod tui;
mod validation;
mod view;

use anyhow::{Context, Result};
use api::DoorbellClient;
use clap::Parser;
use cli::{Cli, Command, SetSettingsArgs, SettingsCommand, TestCameraArgs, UploadFaceArgs};
use settings::{CameraSource, SourceMode};
use std::ffi::OsStr;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = DoorbellClient::new(&cli.connection.client_config())?;

    match cli.command {
        None | Some(Command::Tui) => {
            // The alternate screen owns stdout and stderr, so the TUI logs to a file.
            let _log_guard = init_file_logging(cli.log_file.as_deref());
            let store = match store::LocalStore::open_default() {
                Ok(store) => Some(store),
                Err(err) => {
                    tracing::warn!(error = %format!("{err:#}"), "preferences unavailable");
                    None
                }
            };
            tui::run_tui(client, store).await?;
        }
        Some(command) => {
            init_stderr_logging();
            run_command(&client, command).await?;
        }
    }

    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

fn init_file_logging(path: Option<&Path>) -> Option<WorkerGuard> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match store::default_log_path() {
            Ok(path) => path,
            Err(err) => {
                eprintln!("Warning: logging disabled ({err:#}).");
                return None;
            }
        },
    };
    let Some((directory, file_name)) = log_file_parts(&path) else {
        eprintln!(
            "Warning: logging disabled, {} does not name a file.",
            path.display()
        );
        return None;
    };
    if let Err(err) = std::fs::create_dir_all(directory) {
        eprintln!(
            "Warning: logging disabled, cannot create {}: {err}",
            directory.display()
        );
        return None;
    }

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

/// Directory and file name of a log path. A bare file name logs to the working directory.
fn log_file_parts(path: &Path) -> Option<(&Path, &OsStr)> {
    let file_name = path.file_name()?;
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Some((directory, file_name))
}

async fn run_command(client: &DoorbellClient, command: Command) -> Result<()> {
    match command {
        Command::Tui => anyhow::bail!("the dashboard needs an interactive terminal"),
        Command::Capture => {
            let response = client.capture().await.context("capture failed")?;
            println!(
                "{}",
                response.message.as_deref().unwrap_or("Frame captured successfully!")
            );
            if let Some(path) = response.image_path.as_deref() {
                println!("Image: {path}");
            }
            println!("Detected {} face(s)", response.faces_detected());
        }
        Command::Stats(args) => {
            let stats = client.stats().await.context("failed loading stats")?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }
            println!("Total events:   {}", stats.total_events);
            println!("Known faces:    {}", stats.known_events);
            println!("Unknown faces:  {}", stats.unknown_events);
            println!("Persons:        {}", stats.total_persons);
        }
        Command::Events(args) => {
            let events = client
                .recent_events(args.limit)
                .await
                .context("failed loading events")?;
            if args.output.json {
                println!("{}", serde_json::to_string_pretty(&events)?);
                return Ok(());
            }
            if events.is_empty() {
                println!("No events recorded yet.");
                return Ok(());
            }
            println!("{:<8}  {:<19}  {:<20}  CONFIDENCE", "ID", "TIME", "PERSON");
            for event in &events {
                let id = event.id.map_or_else(|| "-".to_owned(), |id| id.to_string());
                let name = event.person_name.as_deref().unwrap_or("Unknown");
                let confidence = event
                    .confidence
                    .map_or_else(|| "-".to_owned(), |c| format!("{}%", (c * 100.0).round()));
                println!(
                    "{:<8}  {:<19}  {:<20}  {}",
                    id,
                    event.timestamp.as_deref().unwrap_or("-"),
                    name,
                    confidence
                );
            }
        }
        Command::Cameras(args) => {
            let cameras = client.cameras().await.context("failed loading cameras")?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&cameras)?);
                return Ok(());
            }
            if cameras.is_empty() {
                println!("No cameras found");
                return Ok(());
            }
            for camera in &cameras {
                println!("{:<40}  {}", camera.entity_id, camera.friendly_name);
            }
        }
        Command::Settings(args) => match args.command {
            SettingsCommand::Show(output) => {
                let current = client.settings().await.context("failed loading settings")?;
                if output.json {
                    println!("{}", serde_json::to_string_pretty(&current)?);
                    return Ok(());
                }
                println!(
                    "Confidence threshold: {}%",
                    settings::fraction_to_percent(current.confidence_threshold)
                );
                println!(
                    "Camera source:        {} ({})",
                    current.camera.mode().as_str(),
                    current.camera.value()
                );
                println!(
                    "HA access token:      {}",
                    if current.ha_access_token.is_some() {
                        "set"
                    } else {
                        "not set"
                    }
                );
            }
            SettingsCommand::Set(set) => update_settings(client, set).await?,
        },
        Command::TestCamera(args) => test_camera(client, args).await?,
        Command::UploadFace(args) => upload_face(client, args).await?,
    }

    Ok(())
}

async fn update_settings(client: &DoorbellClient, args: SetSettingsArgs) -> Result<()> {
    let mut current = client.settings().await.context("failed loading settings")?;
    if let Some(percent) = args.confidence {
        current.confidence_threshold = settings::percent_to_fraction(percent);
    }
    if let Some(url) = args.camera_url {
        current.camera = CameraSource::new(SourceMode::Url, url);
    }
    if let Some(entity) = args.camera_entity {
        current.camera = CameraSource::new(SourceMode::Entity, entity);
    }
    if let Some(token) = args.ha_token {
        settings::override_access_token(&mut current, &token);
    }

    client
        .save_settings(&current)
        .await
        .context("failed saving settings")?;
    println!("Settings saved successfully!");
    Ok(())
}

async fn test_camera(client: &DoorbellClient, args: TestCameraArgs) -> Result<()> {
    let (mode, value) = match (args.url, args.entity) {
        (Some(url), _) => (SourceMode::Url, url),
        (None, Some(entity)) => (SourceMode::Entity, entity),
        (None, None) => anyhow::bail!("{}", settings::TEST_EMPTY_VALUE),
    };
    let result = client.test_camera(mode, value.trim()).await;
    let (message, success) = settings::test_outcome_message(&result);
    if success {
        println!("{message}");
        Ok(())
    } else {
        anyhow::bail!(message)
    }
}

async fn upload_face(client: &DoorbellClient, args: UploadFaceArgs) -> Result<()> {
    let file = staging::stage_file(&args.path.to_string_lossy(), args.max_mb)
        .with_context(|| format!("cannot upload {}", args.path.display()))?;
    client
        .upload_face(args.person, &file)
        .await
        .context("Error uploading face")?;
    println!("Face image uploaded successfully!");
    Ok(())
}
