use crate::api::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_MS};
use crate::refresh::RECENT_EVENTS_LIMIT;
use crate::validation::DEFAULT_MAX_FILE_MB;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "doorbell-tui",
    version,
    about = "Terminal front-end for the doorbell face recognition add-on"
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Log file used while the TUI owns the terminal.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// Add-on base URL, including any ingress prefix.
    #[arg(long, env = "DOORBELL_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    /// Per-request timeout in milliseconds.
    #[arg(long, env = "DOORBELL_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS, global = true)]
    pub timeout_ms: u64,

    /// Bearer token sent with every request.
    #[arg(long, env = "DOORBELL_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,
}

impl ConnectionArgs {
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            token: self.token.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the interactive dashboard (default).
    Tui,
    /// Capture one frame from the doorbell camera and run face detection.
    Capture,
    /// Print dashboard counters.
    Stats(JsonArgs),
    /// List recent recognition events.
    Events(EventsArgs),
    /// List camera entities known to Home Assistant.
    Cameras(JsonArgs),
    /// Read or change add-on settings.
    Settings(SettingsArgs),
    /// Check that a camera URL or entity can be reached.
    TestCamera(TestCameraArgs),
    /// Add a face image to an existing person.
    UploadFace(UploadFaceArgs),
}

#[derive(Debug, Args)]
pub struct JsonArgs {
    /// Print machine-readable JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Number of events to fetch.
    #[arg(long, default_value_t = RECENT_EVENTS_LIMIT)]
    pub limit: u32,

    #[command(flatten)]
    pub output: JsonArgs,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Print the current settings record.
    Show(JsonArgs),
    /// Change one or more settings; untouched fields keep their stored value.
    Set(SetSettingsArgs),
}

#[derive(Debug, Args)]
pub struct SetSettingsArgs {
    /// Face confidence threshold in percent.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub confidence: Option<u8>,

    /// Use a direct stream URL as the camera source.
    #[arg(long, conflicts_with = "camera_entity")]
    pub camera_url: Option<String>,

    /// Use a Home Assistant camera entity as the camera source.
    #[arg(long)]
    pub camera_entity: Option<String>,

    /// Home Assistant long-lived access token. Pass an empty string to clear it.
    #[arg(long)]
    pub ha_token: Option<String>,
}

#[derive(Debug, Args)]
pub struct TestCameraArgs {
    /// Stream URL to test.
    #[arg(long, conflicts_with = "entity", required_unless_present = "entity")]
    pub url: Option<String>,

    /// Camera entity id to test.
    #[arg(long)]
    pub entity: Option<String>,
}

#[derive(Debug, Args)]
pub struct UploadFaceArgs {
    /// Id of the person the face belongs to.
    #[arg(long)]
    pub person: i64,

    /// Image file to upload.
    pub path: PathBuf,

    /// Largest accepted file size in megabytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_MB)]
    pub max_mb: u64,
}
