use std::fs;
use std::io::{self, Read, Write};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use h2stream_mux::{CancelToken, Side, Stream};
use h2stream_transport::UnixDomainSocket;

use crate::cmd::{load_config, SendArgs};
use crate::exit::{
    io_error, mux_error, transport_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS,
    TIMEOUT, USAGE,
};
use crate::output::{print_reply, OutputFormat};

const REPLY_BUFFER_SIZE: usize = 64 * 1024;

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let config = load_config(args.config.as_deref())?;
    let payload = resolve_payload(&args)?;

    let duplex = UnixDomainSocket::connect(&args.path)
        .map_err(|err| transport_error("connect failed", err))?;
    let stream = Arc::new(
        Stream::with_config(Side::Client, duplex, &args.version, config)
            .map_err(|err| mux_error("stream setup failed", err))?,
    );
    let mut channel = stream
        .channel(&args.channel)
        .map_err(|err| mux_error("channel open failed", err))?;

    let cancel = CancelToken::new();
    let driver = {
        let stream = Arc::clone(&stream);
        let cancel = cancel.clone();
        thread::Builder::new()
            .name("h2stream-recv".to_string())
            .spawn(move || stream.run(&cancel))
            .map_err(|err| io_error("failed to start session", err))?
    };

    let outcome = channel
        .write_all(&payload)
        .map_err(|err| io_error("send failed", err))
        .and_then(|()| stream.close().map_err(|err| mux_error("flush failed", err)))
        .and_then(|()| {
            if args.wait {
                wait_for_reply(channel.clone(), wait_timeout).map(Some)
            } else {
                Ok(None)
            }
        });

    cancel.cancel();
    match driver.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::debug!(error = %err, "session ended with error"),
        Err(_) => return Err(CliError::new(INTERNAL, "session thread panicked")),
    }

    if let Some(reply) = outcome? {
        print_reply(&args.channel, channel.id(), &reply, format);
    }
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

/// Read the first chunk that arrives on `reader`, or fail after `timeout`.
///
/// The reader thread is left behind on timeout; it ends once the session
/// closes the channel.
fn wait_for_reply<R>(mut reader: R, timeout: Duration) -> CliResult<Vec<u8>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("h2stream-reply".to_string())
        .spawn(move || {
            let mut buf = vec![0u8; REPLY_BUFFER_SIZE];
            let result = reader.read(&mut buf).map(|n| {
                buf.truncate(n);
                buf
            });
            let _ = tx.send(result);
        })
        .map_err(|err| io_error("failed to start reply reader", err))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(reply)) if reply.is_empty() => {
            Err(CliError::new(FAILURE, "session closed before a reply arrived"))
        }
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(err)) => Err(io_error("receive failed", err)),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(CliError::new(
            TIMEOUT,
            format!("no reply within {timeout:?}"),
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(io_error(
            "receive failed",
            io::Error::other("reply reader exited"),
        )),
    }
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use h2stream_transport::memory_pair;

    use super::*;

    #[test]
    fn reply_is_first_chunk() {
        let (reader, mut peer) = memory_pair();
        peer.write_all(b"pong").unwrap();

        let reply = wait_for_reply(reader, Duration::from_secs(5)).unwrap();
        assert_eq!(reply, b"pong");
    }

    #[test]
    fn missing_reply_times_out() {
        let (reader, _peer) = memory_pair();
        let err = wait_for_reply(reader, Duration::from_millis(50)).unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn closed_session_is_failure() {
        let (reader, peer) = memory_pair();
        peer.close().unwrap();

        let err = wait_for_reply(reader, Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }
}
