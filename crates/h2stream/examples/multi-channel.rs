//! Multi-channel example: stdin/stdout/stderr style channels over one
//! in-memory connection.
//!
//! Run with:
//!   cargo run --example multi-channel

use std::io::{Read, Write};
use std::sync::Arc;
use std::thread;

use h2stream::frame::V5_PROTOCOL_VERSION;
use h2stream::mux::{CancelToken, Stream};
use h2stream::transport::memory_pair;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (client_end, server_end) = memory_pair();
    let client = Arc::new(Stream::client(client_end, V5_PROTOCOL_VERSION)?);
    let server = Arc::new(Stream::server(server_end, V5_PROTOCOL_VERSION)?);

    let mut stdin = client.channel("stdin")?;
    let mut stdout = client.channel("stdout")?;
    let mut stderr = client.channel("stderr")?;

    // The "remote process": upper-cases one line of stdin onto stdout and
    // reports on stderr.
    let mut remote_stdin = server.channel("stdin")?;
    let mut remote_stdout = server.channel("stdout")?;
    let mut remote_stderr = server.channel("stderr")?;
    let remote = thread::spawn(move || -> std::io::Result<()> {
        let mut input = String::new();
        let mut buf = [0u8; 64];
        while !input.ends_with('\n') {
            let n = remote_stdin.read(&mut buf)?;
            if n == 0 {
                break;
            }
            input.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
        remote_stdout.write_all(input.to_uppercase().as_bytes())?;
        remote_stderr.write_all(format!("read {} bytes", input.len()).as_bytes())?;
        Ok(())
    });

    let cancel = CancelToken::new();
    let drivers: Vec<_> = [Arc::clone(&client), Arc::clone(&server)]
        .into_iter()
        .map(|stream| {
            let cancel = cancel.clone();
            thread::spawn(move || stream.run(&cancel))
        })
        .collect();

    stdin.write_all(b"hello over h2stream\n")?;

    let mut out = [0u8; 20];
    stdout.read_exact(&mut out)?;
    eprintln!("[client] stdout: {}", String::from_utf8_lossy(&out).trim_end());

    let mut err = [0u8; 13];
    stderr.read_exact(&mut err)?;
    eprintln!("[client] stderr: {}", String::from_utf8_lossy(&err));

    remote.join().expect("remote thread should not panic")?;
    cancel.cancel();
    for driver in drivers {
        driver.join().expect("driver should not panic")?;
    }
    Ok(())
}
