#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/h2scli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn h2stream() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_h2stream"));
    cmd.env_remove("RUST_LOG").arg("--log-level").arg("error");
    cmd
}

fn spawn_server(sock_path: &Path, channels: &str) -> Child {
    h2stream()
        .arg("serve")
        .arg(sock_path)
        .arg("--channels")
        .arg(channels)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("serve command should start")
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("socket did not appear at {}", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn stop(mut child: Child, dir: &Path) {
    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}

fn send(sock_path: &Path, extra: &[&str]) -> Output {
    h2stream()
        .arg("--format")
        .arg("json")
        .arg("send")
        .arg(sock_path)
        .args(extra)
        .output()
        .expect("send should run")
}

#[test]
fn send_wait_receives_echo() {
    let dir = unique_temp_dir("echo");
    let sock_path = dir.join("echo.sock");
    let server = spawn_server(&sock_path, "stdin,data");
    wait_for_socket(&sock_path, Duration::from_secs(3));

    let output = send(
        &sock_path,
        &["--channel", "stdin", "--data", "hello", "--wait", "--wait-timeout", "3s"],
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let reply: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("reply should be json");
    assert_eq!(reply["channel"], "stdin");
    assert_eq!(reply["payload"], "hello");
    assert_eq!(reply["channel_id"], h2stream_frame::channel_id("stdin"));

    stop(server, &dir);
}

#[test]
fn sequential_sessions_are_served() {
    let dir = unique_temp_dir("seq");
    let sock_path = dir.join("echo.sock");
    let server = spawn_server(&sock_path, "data");
    wait_for_socket(&sock_path, Duration::from_secs(3));

    for payload in ["first", "second"] {
        let output = send(&sock_path, &["--data", payload, "--wait"]);
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains(payload));
    }

    stop(server, &dir);
}

#[test]
fn wait_on_unechoed_channel_times_out_with_124() {
    let dir = unique_temp_dir("timeout");
    let sock_path = dir.join("echo.sock");
    let server = spawn_server(&sock_path, "data");
    wait_for_socket(&sock_path, Duration::from_secs(3));

    let output = send(
        &sock_path,
        &["--channel", "silent", "--data", "x", "--wait", "--wait-timeout", "200ms"],
    );
    assert_eq!(output.status.code(), Some(124));

    stop(server, &dir);
}

#[test]
fn send_without_server_fails() {
    let dir = unique_temp_dir("missing");
    let output = send(&dir.join("missing.sock"), &["--data", "x"]);
    assert_eq!(output.status.code(), Some(1));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unsupported_version_is_usage_error() {
    let dir = unique_temp_dir("version");
    let output = h2stream()
        .arg("serve")
        .arg(dir.join("never.sock"))
        .arg("--version")
        .arg("v4.channel.k8s.io")
        .output()
        .expect("serve should run");

    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported protocol version"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn ids_prints_fnv_ids_as_json() {
    let output = h2stream()
        .args(["--format", "json", "ids", "a", "b"])
        .output()
        .expect("ids should run");

    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("ids output should be json");
    assert_eq!(value["scheme"], "fnv1-32");
    assert_eq!(value["channels"][0]["id"], 84_696_446);
    assert_eq!(value["channels"][1]["id"], 84_696_445);
}

#[test]
fn ids_raw_format_is_tab_separated() {
    let output = h2stream()
        .args(["--format", "raw", "ids", "stdin"])
        .output()
        .expect("ids should run");

    assert!(output.status.success());
    let expected = format!("stdin\t{}\n", h2stream_frame::channel_id("stdin"));
    assert_eq!(String::from_utf8_lossy(&output.stdout), expected);
}

#[test]
fn version_prints_package_version() {
    let output = h2stream().arg("version").output().expect("version should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("h2stream {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn version_extended_lists_protocols() {
    let output = h2stream()
        .args(["version", "--extended"])
        .output()
        .expect("version should run");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("protocol_versions: v5.channel.k8s.io"));
    assert!(stdout.contains("channel_ids: fnv1-32"));
}
