use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::thread;

use h2stream_frame::ProtocolVersion;
use h2stream_mux::{CancelGuard, CancelToken, Channel, MuxError, Side, Stream, StreamConfig};
use h2stream_transport::{Duplex, UnixDomainSocket};

use crate::cmd::{load_config, ServeArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};

const ECHO_BUFFER_SIZE: usize = 32 * 1024;

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let version: ProtocolVersion = args
        .version
        .parse()
        .map_err(|err| frame_error("invalid --version", err))?;
    let config = load_config(args.config.as_deref())?;

    let listener =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;
    tracing::info!(
        path = %args.path.display(),
        version = %version,
        channels = ?args.channels,
        "listening"
    );

    let shutdown = CancelToken::new();
    install_ctrlc_handler(shutdown.clone(), args.path.clone())?;

    while !shutdown.is_cancelled() {
        let duplex = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        if shutdown.is_cancelled() {
            break;
        }

        let (cancel, _link) = session_token(&shutdown);

        match serve_connection(duplex, &args.channels, version.as_str(), &config, &cancel) {
            Ok(()) => tracing::info!("session ended"),
            Err(err) => tracing::warn!(error = %err, "session failed"),
        }
    }

    Ok(SUCCESS)
}

/// A token for one session that is also cancelled by `shutdown`.
fn session_token(shutdown: &CancelToken) -> (CancelToken, CancelGuard) {
    let cancel = CancelToken::new();
    let link = {
        let cancel = cancel.clone();
        shutdown.on_cancel(move || cancel.cancel())
    };
    (cancel, link)
}

/// Run one session, echoing each named channel until the peer disconnects
/// or `cancel` fires.
fn serve_connection(
    duplex: Duplex,
    channels: &[String],
    version: &str,
    config: &StreamConfig,
    cancel: &CancelToken,
) -> Result<(), MuxError> {
    let stream = Stream::with_config(Side::Server, duplex, version, config.clone())?;

    let mut echoers = Vec::with_capacity(channels.len());
    for name in channels {
        let channel = stream.channel(name)?;
        let echoer = thread::Builder::new()
            .name(format!("echo-{name}"))
            .spawn(move || echo(channel))
            .map_err(MuxError::Spawn)?;
        echoers.push(echoer);
    }
    tracing::info!(channels = channels.len(), "session accepted");

    let result = stream.run(cancel);
    for echoer in echoers {
        match echoer.join() {
            Ok(Ok(bytes)) => tracing::debug!(bytes, "echo finished"),
            Ok(Err(err)) => tracing::debug!(error = %err, "echo stopped"),
            Err(_) => tracing::warn!("echo thread panicked"),
        }
    }
    result
}

/// Copy everything read on `channel` back onto it. Ends when the session
/// closes the channel.
fn echo(mut channel: Channel) -> io::Result<u64> {
    let mut reader = channel.clone();
    let mut buf = vec![0u8; ECHO_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(total);
        }
        tracing::debug!(channel = channel.name(), size = n, "echoing");
        channel.write_all(&buf[..n])?;
        total += n as u64;
    }
}

fn install_ctrlc_handler(shutdown: CancelToken, path: PathBuf) -> CliResult<()> {
    ctrlc::set_handler(move || {
        shutdown.cancel();
        // Wake a blocked accept so the loop can observe shutdown.
        let _ = std::os::unix::net::UnixStream::connect(&path);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
