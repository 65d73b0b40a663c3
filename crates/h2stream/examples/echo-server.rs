//! Minimal echo server: accepts one session and echoes the `data` channel.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send /tmp/h2stream-echo-<pid>/echo.sock \
//!     --channel data --data hello --wait --wait-timeout 3s

use std::fs;
use std::io::{Read, Write};
use std::thread;

use h2stream::frame::V5_PROTOCOL_VERSION;
use h2stream::mux::{CancelToken, Stream};
use h2stream::transport::UnixDomainSocket;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("h2stream-echo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("echo.sock");

    let listener = UnixDomainSocket::bind(&sock_path)?;
    eprintln!("Listening on {}", sock_path.display());

    let stream = Stream::server(listener.accept()?, V5_PROTOCOL_VERSION)?;
    let mut channel = stream.channel("data")?;
    eprintln!("Session accepted, echoing channel data (id {})", channel.id());

    let mut reader = channel.clone();
    let echo = thread::spawn(move || -> std::io::Result<()> {
        let mut buf = [0u8; 4096];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                return Ok(());
            }
            eprintln!("Received {n} bytes");
            channel.write_all(&buf[..n])?;
        }
    });

    // Returns when the peer disconnects.
    stream.run(&CancelToken::new())?;
    if let Ok(Err(err)) = echo.join() {
        eprintln!("Echo stopped: {err}");
    }

    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
