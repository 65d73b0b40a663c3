use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use h2stream_frame::V5_PROTOCOL_VERSION;
use h2stream_mux::StreamConfig;

use crate::exit::{io_error, mux_error, CliResult};
use crate::output::OutputFormat;

pub mod ids;
#[cfg(unix)]
pub mod send;
#[cfg(unix)]
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept sessions on a Unix socket and echo every named channel.
    Serve(ServeArgs),
    /// Open a session, write one payload on a channel.
    Send(SendArgs),
    /// Print the channel ids derived from channel names.
    Ids(IdsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        #[cfg(unix)]
        Command::Serve(args) => serve::run(args),
        #[cfg(unix)]
        Command::Send(args) => send::run(args, format),
        #[cfg(not(unix))]
        Command::Serve(_) | Command::Send(_) => Err(crate::exit::CliError::new(
            crate::exit::USAGE,
            "unix domain sockets are not available on this platform",
        )),
        Command::Ids(args) => ids::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Channels to echo (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "data")]
    pub channels: Vec<String>,
    /// Negotiated protocol version.
    #[arg(long, default_value = V5_PROTOCOL_VERSION)]
    pub version: String,
    /// Stream configuration file (JSON).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Channel to send on.
    #[arg(long, short = 'c', default_value = "data")]
    pub channel: String,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Wait for a reply on the same channel and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for a reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Negotiated protocol version.
    #[arg(long, default_value = V5_PROTOCOL_VERSION)]
    pub version: String,
    /// Stream configuration file (JSON).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct IdsArgs {
    /// Channel names.
    #[arg(required = true)]
    pub names: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Load a stream configuration file, or the defaults.
pub fn load_config(path: Option<&Path>) -> CliResult<StreamConfig> {
    let Some(path) = path else {
        return Ok(StreamConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    StreamConfig::from_json(&json)
        .map_err(|err| mux_error(&format!("invalid config {}", path.display()), err))
}
