//! Interactive operator console
//!
//! Reads line-oriented commands from stdin for the lifetime of the
//! process. Command errors are reported and never fatal.

use crate::models::{BandwidthRow, TimingRow};
use crate::proxy::ProxyState;
use crate::utils::host_from_operator_input;
use crate::{log_error, log_info};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const BLOCK: &str = "block";
const UNBLOCK: &str = "unblock";
const LIST: &str = "list";
const BLOCKED: &str = "blocked";
const CACHED: &str = "cached";
const TIMING: &str = "timing";
const BANDWIDTH: &str = "bandwidth";

/// A parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Block(String),
    Unblock(String),
    ListBlocked,
    ListCached,
    ListTiming,
    ListBandwidth,
}

/// Parse one input line. `Ok(None)` means the line was blank.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.is_empty() {
        return Ok(None);
    }

    match fields[0].to_lowercase().as_str() {
        BLOCK => {
            if fields.len() == 2 {
                Ok(Some(Command::Block(fields[1].to_string())))
            } else {
                Err("Invalid block command".to_string())
            }
        }
        UNBLOCK => {
            if fields.len() == 2 {
                Ok(Some(Command::Unblock(fields[1].to_string())))
            } else {
                Err("Invalid unblock command".to_string())
            }
        }
        LIST => {
            if fields.len() == 2 {
                match fields[1] {
                    BLOCKED => Ok(Some(Command::ListBlocked)),
                    CACHED => Ok(Some(Command::ListCached)),
                    TIMING => Ok(Some(Command::ListTiming)),
                    BANDWIDTH => Ok(Some(Command::ListBandwidth)),
                    other => Err(format!("Invalid list specification \"{}\"", other)),
                }
            } else {
                Err("Invalid list command".to_string())
            }
        }
        _ => Err("Unrecognised command".to_string()),
    }
}

/// Spawn the console task reading operator commands from stdin
pub fn spawn(state: Arc<ProxyState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => execute(&state, &line),
                Ok(None) => break,
                Err(e) => log_error!("{}", e),
            }
        }
    })
}

/// Execute one input line against the shared stores
pub fn execute(state: &ProxyState, line: &str) {
    let command = match parse_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return,
        Err(message) => {
            log_error!("{}", message);
            return;
        }
    };

    match command {
        Command::Block(input) => {
            let host = match host_from_operator_input(&input) {
                Ok(host) => host,
                Err(e) => {
                    log_error!("Invalid host \"{}\": {}", input, e);
                    return;
                }
            };
            match state.blocklist.add(&host) {
                Ok(()) => log_info!("{} has been blocked successfully", host),
                Err(e) => log_error!("{}", e),
            }
        }
        Command::Unblock(input) => {
            let host = match host_from_operator_input(&input) {
                Ok(host) => host,
                Err(e) => {
                    log_error!("Invalid host \"{}\": {}", input, e);
                    return;
                }
            };
            match state.blocklist.remove(&host) {
                Ok(()) => log_info!("{} has been unblocked successfully", host),
                Err(e) => log_error!("{}", e),
            }
        }
        Command::ListBlocked => {
            println!("\nBLOCKED SITES:");
            for host in state.blocklist.list() {
                println!("{}", host);
            }
        }
        Command::ListCached => {
            println!("\nCACHED SITES:");
            for host in state.cache.list() {
                println!("{}", host);
            }
        }
        Command::ListTiming => {
            let rows = state.perf.average_times();
            println!(
                "{}",
                render_table(
                    [
                        "Host",
                        "Average Uncached Response Time",
                        "Average Cached Response Time",
                    ],
                    timing_cells(&rows),
                )
            );
        }
        Command::ListBandwidth => {
            let rows = state.perf.average_bandwidths();
            println!(
                "{}",
                render_table(
                    [
                        "Host",
                        "Average Uncached Bandwidth",
                        "Average Cached Bandwidth",
                    ],
                    bandwidth_cells(&rows),
                )
            );
        }
    }
}

fn timing_cells(rows: &[TimingRow]) -> Vec<[String; 3]> {
    rows.iter()
        .map(|row| {
            [
                row.host.clone(),
                format_ms(row.uncached_ms),
                format_ms(row.cached_ms),
            ]
        })
        .collect()
}

fn bandwidth_cells(rows: &[BandwidthRow]) -> Vec<[String; 3]> {
    rows.iter()
        .map(|row| {
            [
                row.host.clone(),
                format_kbps(row.uncached_kbps),
                format_kbps(row.cached_kbps),
            ]
        })
        .collect()
}

fn format_ms(value: Option<u64>) -> String {
    match value {
        Some(ms) => format!("{}ms", ms),
        None => "unused".to_string(),
    }
}

fn format_kbps(value: Option<f64>) -> String {
    match value {
        Some(kbps) => format!("{:.3} kB/s", kbps),
        None => "unused".to_string(),
    }
}

/// Render rows as a bordered, column-aligned text table
fn render_table(headers: [&str; 3], rows: Vec<[String; 3]>) -> String {
    let mut widths = [headers[0].len(), headers[1].len(), headers[2].len()];
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let border = format!(
        "+-{}-+-{}-+-{}-+",
        "-".repeat(widths[0]),
        "-".repeat(widths[1]),
        "-".repeat(widths[2])
    );

    let mut out = String::new();
    out.push('\n');
    out.push_str(&border);
    out.push('\n');
    out.push_str(&format!(
        "| {:w0$} | {:w1$} | {:w2$} |",
        headers[0],
        headers[1],
        headers[2],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2]
    ));
    out.push('\n');
    out.push_str(&border);
    out.push('\n');
    for row in &rows {
        out.push_str(&format!(
            "| {:w0$} | {:w1$} | {:w2$} |",
            row[0],
            row[1],
            row[2],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2]
        ));
        out.push('\n');
    }
    out.push_str(&border);
    out
}
