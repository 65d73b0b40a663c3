use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    channel: &'a str,
    channel_id: u32,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

/// Print bytes received on a channel.
pub fn print_reply(channel: &str, channel_id: u32, payload: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                channel,
                channel_id,
                payload_size: payload.len(),
                payload: payload_preview(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "ID", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    channel.to_string(),
                    channel_id.to_string(),
                    payload.len().to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "channel={} id={} size={} payload={}",
                channel,
                channel_id,
                payload.len(),
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

/// One row of `ids` output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IdRow {
    pub name: String,
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collides_with: Option<String>,
}

#[derive(Serialize)]
struct IdsOutput<'a> {
    scheme: &'a str,
    channels: &'a [IdRow],
}

pub fn print_ids(scheme: &str, rows: &[IdRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = IdsOutput {
                scheme,
                channels: rows,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NAME", "ID", "HEX", "COLLIDES WITH"]);
            for row in rows {
                table.add_row(vec![
                    row.name.clone(),
                    row.id.to_string(),
                    format!("{:#010x}", row.id),
                    row.collides_with.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                match &row.collides_with {
                    Some(other) => println!(
                        "{} id={} scheme={} collides_with={}",
                        row.name, row.id, scheme, other
                    ),
                    None => println!("{} id={} scheme={}", row.name, row.id, scheme),
                }
            }
        }
        OutputFormat::Raw => {
            for row in rows {
                println!("{}\t{}", row.name, row.id);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
