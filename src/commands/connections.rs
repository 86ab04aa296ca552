//! Connection-lifetime analysis command.
//!
//! Focused view over the connection registry: how many client connections
//! the log covers, how long they live, and how many operations each one
//! carries. Useful for spotting connection-pool misconfiguration (many
//! short-lived connections doing one operation each) and long-lived
//! connections dominating traffic.
//!
//! # Usage
//!
//! ```bash
//! ldap-audit connections audit.log
//!
//! # Wider top table
//! ldap-audit connections audit.log --top 25
//! ```
//!
//! # Output
//!
//! - Connection totals and operations-per-connection statistics
//! - Lifetime statistics over connections with parseable timestamps
//! - Top connections by operation count with first/last activity

use crate::commands::analyze::process_log_file;
use crate::utils::format::{format_millis, format_number};
use crate::utils::time::format_timestamp;
use anyhow::Result;

pub fn run(log_file: &str, top: usize) -> Result<()> {
    let (snapshot, stats, _metrics) = process_log_file(log_file, top, 0)?;
    let connections = &snapshot.connections;

    println!("\n{}", "=".repeat(100));
    println!("Connection Analysis: {}", log_file);
    println!("{}", "=".repeat(100));

    println!(
        "\nTotal connections: {}",
        format_number(connections.total_connections)
    );
    println!(
        "Total operations on connections: {}",
        format_number(connections.total_operations)
    );
    if connections.total_connections == 0 {
        println!("\nNo connection identifiers observed in {}", log_file);
        return Ok(());
    }

    println!(
        "Operations per connection: {:.1} average, {} max",
        connections.mean_operations.unwrap_or(0.0),
        format_number(connections.max_operations)
    );

    if connections.timed_connections > 0 {
        println!(
            "Connection lifetime: {:.0} ms average over {} timed connections (min {}, max {})",
            connections.mean_lifetime_ms.unwrap_or(0.0),
            format_number(connections.timed_connections),
            format_millis(connections.min_lifetime_ms),
            format_millis(connections.max_lifetime_ms)
        );
    }

    println!("\nTop {} Connections by Operations", connections.top.len());
    println!("{}", "-".repeat(100));
    println!(
        "{:<5} {:>14} {:>12} {:>14}   {:<26} {:<26}",
        "#", "Connection", "Ops", "Lifetime", "First Seen", "Last Seen"
    );
    println!("{}", "-".repeat(100));

    for (i, entry) in connections.top.iter().enumerate() {
        let first_seen = entry
            .first_seen
            .as_ref()
            .map_or("-".to_string(), format_timestamp);
        let last_seen = entry
            .last_seen
            .as_ref()
            .map_or("-".to_string(), format_timestamp);
        println!(
            "{:<5} {:>14} {:>12} {:>14}   {:<26} {:<26}",
            i + 1,
            entry.connection_id,
            format_number(entry.operations),
            format_millis(entry.lifetime_ms),
            first_seen,
            last_seen
        );
    }

    println!(
        "\nUnterminated operations: {}",
        format_number(stats.unterminated_operations)
    );
    println!("{}", "=".repeat(100));

    Ok(())
}
