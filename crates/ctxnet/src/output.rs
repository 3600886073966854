use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

/// What happened on one client during a demo run.
#[derive(Debug, Serialize)]
pub struct ClientReport {
    pub peer: String,
    pub colors: [u8; 4],
    pub handled: usize,
    pub handler_thread: Option<String>,
    pub on_main_loop: bool,
    pub disconnect_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub channel: String,
    pub value: u8,
    pub index: u8,
    pub passthrough: bool,
    pub packet_bytes: usize,
    pub clients: Vec<ClientReport>,
}

/// Encodings of one signed varint.
#[derive(Debug, Serialize)]
pub struct VarintRow {
    pub value: i32,
    pub compact: String,
    pub passthrough: String,
}

pub fn print_demo(report: &DemoReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PEER", "COLORS", "HANDLED", "THREAD", "STATUS"]);
            for client in &report.clients {
                table.add_row(vec![
                    client.peer.clone(),
                    format!("{:?}", client.colors),
                    client.handled.to_string(),
                    client.handler_thread.clone().unwrap_or_else(|| "-".to_string()),
                    status(client),
                ]);
            }
            println!(
                "{} value={} index={} ({} byte payload{})",
                report.channel,
                report.value,
                report.index,
                report.packet_bytes,
                if report.passthrough { ", passthrough" } else { "" }
            );
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for client in &report.clients {
                println!(
                    "peer={} colors={:?} handled={} thread={} status={}",
                    client.peer,
                    client.colors,
                    client.handled,
                    client.handler_thread.as_deref().unwrap_or("-"),
                    status(client)
                );
            }
        }
    }
}

pub fn print_varints(rows: &[VarintRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(rows),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["VALUE", "COMPACT", "PASSTHROUGH"]);
            for row in rows {
                table.add_row(vec![
                    row.value.to_string(),
                    row.compact.clone(),
                    row.passthrough.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "{} compact=[{}] passthrough=[{}]",
                    row.value, row.compact, row.passthrough
                );
            }
        }
    }
}

pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn status(client: &ClientReport) -> String {
    match &client.disconnect_reason {
        Some(reason) => format!("disconnected: {reason}"),
        None => "connected".to_string(),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_space_separated() {
        assert_eq!(hex(&[0x00, 0x7f, 0xc4, 0x02]), "00 7f c4 02");
        assert_eq!(hex(&[]), "");
    }
}
