//! Full audit log analysis report.
//!
//! Runs the single-pass parse/aggregate pipeline over one audit log and
//! prints usage and performance statistics. Supports analyzing compressed
//! logs (`.gz`, `.zst`) directly.
//!
//! # Usage
//!
//! ```bash
//! # Default logfile.txt next to the current directory
//! ldap-audit analyze
//!
//! # Specific file, larger top tables
//! ldap-audit analyze audit.log --top 20
//!
//! # Include processing performance statistics
//! ldap-audit analyze audit.log --performance
//!
//! # Machine-readable exports
//! ldap-audit analyze audit.log --json report.json --export tables.csv
//! ```
//!
//! # Output
//!
//! Displays comprehensive statistics:
//! - Operation counts and average execution times per type
//! - Overall execution time with percentiles
//! - Execution time distribution across fixed thresholds
//! - Top bind DNs, search bases, search filters, and clients
//! - Search filter attribute summary
//! - Slowest operations observed
//! - Connection lifetimes and operations per connection
//! - Log quality counters (malformed, unterminated, untimed, anomalies)

use crate::audit::aggregator::{Aggregator, Snapshot, TableEntry, DURATION_THRESHOLDS_MS};
use crate::audit::parser::{Parser, ParserStats};
use crate::utils::format::{format_millis, format_number};
use crate::utils::progress::ProgressBar;
use crate::utils::reader::open_file;
use crate::utils::time::format_timestamp;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{BufRead, BufReader};
use std::time::{Duration, Instant};

/// Processing metrics exposed for the `--performance` report path.
#[derive(Debug, Clone, Serialize)]
pub struct PassMetrics {
    pub elapsed: Duration,
    pub lines_total: u64,
    pub records_total: u64,
}

impl PassMetrics {
    pub fn lines_per_second(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.lines_total as f64 / seconds
        } else {
            0.0
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    snapshot: &'a Snapshot,
    parser: &'a ParserStats,
}

/// Run the pass over one log file and return the finalized state.
pub fn process_log_file(
    log_file: &str,
    top: usize,
    slowest: usize,
) -> Result<(Snapshot, ParserStats, PassMetrics)> {
    eprintln!("Processing: {}", log_file);

    let file_size = std::fs::metadata(log_file).ok().map(|m| m.len() as usize);
    let progress = if let Some(size) = file_size {
        ProgressBar::new(size, "Processing")
    } else {
        ProgressBar::new_spinner("Processing")
    };

    let file = open_file(log_file)?;
    let reader = BufReader::new(file);

    let start = Instant::now();
    let mut parser = Parser::new();
    let mut aggregator = Aggregator::with_limits(top, slowest);
    let mut events = Vec::new();

    let mut file_lines = 0usize;
    let mut bytes_read = 0usize;

    for line in reader.lines() {
        file_lines += 1;
        let line = line
            .with_context(|| format!("Failed to read line {} from {}", file_lines, log_file))?;
        bytes_read += line.len() + 1; // +1 for newline

        // Update progress every 10k lines for smooth animation
        if file_lines % 10_000 == 0 {
            if let Some(size) = file_size {
                progress.update(bytes_read.min(size)); // Cap at file size
            } else {
                progress.update(file_lines);
            }
        }

        parser.feed_line(&line, &mut events);
        for event in events.drain(..) {
            aggregator.fold(&event);
        }
    }

    parser.finish(&mut events);
    for event in events.drain(..) {
        aggregator.fold(&event);
    }

    let elapsed = start.elapsed();

    if let Some(size) = file_size {
        progress.update(size);
    }
    progress.finish_with_message(&format!(
        "Processed {} lines",
        format_number(parser.stats().lines_total)
    ));

    let stats = parser.stats().clone();
    let metrics = PassMetrics {
        elapsed,
        lines_total: stats.lines_total,
        records_total: stats.records_total,
    };
    Ok((aggregator.snapshot(), stats, metrics))
}

pub fn run(
    log_file: &str,
    top: usize,
    slowest: usize,
    performance: bool,
    json: Option<&str>,
    export: Option<&str>,
) -> Result<()> {
    let (snapshot, stats, metrics) = process_log_file(log_file, top, slowest)?;

    println!("\n{}", "=".repeat(100));
    println!("LDAP Audit Log Analysis: {}", log_file);
    println!("{}", "=".repeat(100));

    print_operation_counts(&snapshot);
    print_overall_durations(&snapshot);
    print_distribution(&snapshot);
    print_table("Top Bind DNs", &snapshot.top_bind_dns, snapshot.distinct_bind_dns);
    print_table(
        "Top Search Bases",
        &snapshot.top_search_bases,
        snapshot.distinct_search_bases,
    );
    print_table(
        "Top Search Filters",
        &snapshot.top_search_filters,
        snapshot.distinct_search_filters,
    );
    print_table("Top Clients", &snapshot.top_clients, snapshot.distinct_clients);
    print_filter_attributes(&snapshot);
    print_slowest(&snapshot);
    print_connections(&snapshot);
    print_log_quality(&snapshot, &stats);

    if performance {
        print_performance(&metrics);
    }

    println!("\n{}", "=".repeat(100));

    if let Some(path) = json {
        write_json(path, &snapshot, &stats)?;
        eprintln!("Wrote JSON snapshot: {}", path);
    }
    if let Some(path) = export {
        write_csv(path, &snapshot)?;
        eprintln!("Wrote CSV tables: {}", path);
    }

    Ok(())
}

fn print_operation_counts(snapshot: &Snapshot) {
    println!("\n1. Operations by Type");
    println!("{}", "-".repeat(100));
    println!(
        "{:<14} {:>12} {:>12} {:>14} {:>14}",
        "Operation", "Count", "Percentage", "Avg Time", "Max Time"
    );
    println!("{}", "-".repeat(100));

    for op in &snapshot.operations {
        if op.count == 0 {
            continue;
        }
        let pct = if snapshot.events_total > 0 {
            (op.count as f64 / snapshot.events_total as f64) * 100.0
        } else {
            0.0
        };
        let avg = op
            .durations
            .mean_ms
            .map_or("-".to_string(), |mean| format!("{:.0} ms", mean));
        println!(
            "{:<14} {:>12} {:>11.2}% {:>14} {:>14}",
            op.kind.as_str(),
            format_number(op.count),
            pct,
            avg,
            format_millis(op.durations.max_ms)
        );
    }

    println!("{}", "-".repeat(100));
    println!(
        "{:<14} {:>12} {:>11.2}%",
        "TOTAL",
        format_number(snapshot.events_total),
        100.0
    );
}

fn print_overall_durations(snapshot: &Snapshot) {
    let overall = &snapshot.overall_durations;
    println!("\n2. Overall Execution Time");
    println!("{}", "-".repeat(100));
    if overall.count == 0 {
        println!("No timed operations observed");
        return;
    }
    let mean = overall
        .mean_ms
        .map_or("-".to_string(), |mean| format!("{:.0} ms", mean));
    println!(
        "All Operations: {} average over {} timed operations (min {}, max {})",
        mean,
        format_number(overall.count),
        format_millis(overall.min_ms),
        format_millis(overall.max_ms)
    );
    println!(
        "Percentiles: p50 {}  p90 {}  p95 {}  p99 {}",
        percentile_label(overall.p50_ms),
        percentile_label(overall.p90_ms),
        percentile_label(overall.p95_ms),
        percentile_label(overall.p99_ms)
    );
}

/// Percentiles are bucketed: a value is the upper bound of the containing
/// threshold bucket, and anything past the last threshold reports as above
/// it.
fn percentile_label(ms: Option<u64>) -> String {
    match ms {
        Some(ms) => format!("<={} ms", format_number(ms)),
        None => {
            let last = DURATION_THRESHOLDS_MS[DURATION_THRESHOLDS_MS.len() - 1];
            format!(">{} ms", format_number(last))
        }
    }
}

fn print_distribution(snapshot: &Snapshot) {
    println!("\n3. Execution Time Distribution");
    println!("{}", "-".repeat(100));

    print!("{:<14}", "Operation");
    for threshold in DURATION_THRESHOLDS_MS {
        print!("{:>8}", format!("{} ms", threshold));
    }
    println!("{:>8}", "over");
    println!("{}", "-".repeat(100));

    for op in &snapshot.operations {
        if op.durations.count == 0 {
            continue;
        }
        print!("{:<14}", op.kind.as_str());
        for bucket in &op.durations.buckets {
            print!("{:>8}", format_number(bucket.count));
        }
        println!();
    }

    let overall = &snapshot.overall_durations;
    if overall.count > 0 {
        println!("{}", "-".repeat(100));
        print!("{:<14}", "ALL");
        for bucket in &overall.buckets {
            print!("{:>8}", format_number(bucket.count));
        }
        println!();
    }
}

fn print_table(title: &str, entries: &[TableEntry], distinct: u64) {
    println!(
        "\n{} ({} distinct)",
        title,
        format_number(distinct)
    );
    println!("{}", "-".repeat(100));

    if entries.is_empty() {
        println!("(none)");
        return;
    }

    println!("{:<5} {:<75} {:>12}", "#", "Key", "Count");
    for (i, entry) in entries.iter().enumerate() {
        let key_display = if entry.key.len() > 73 {
            format!("{}...", &entry.key[..70])
        } else {
            entry.key.clone()
        };
        println!(
            "{:<5} {:<75} {:>12}",
            i + 1,
            key_display,
            format_number(entry.count)
        );
    }
}

fn print_filter_attributes(snapshot: &Snapshot) {
    println!("\nFilter Attribute Summary");
    println!("{}", "-".repeat(100));

    if snapshot.filter_attributes.is_empty() {
        println!("(none)");
        return;
    }

    for entry in &snapshot.filter_attributes {
        println!("{}: {}", entry.key, format_number(entry.count));
    }
}

fn print_slowest(snapshot: &Snapshot) {
    println!("\nSlowest Operations");
    println!("{}", "-".repeat(100));

    if snapshot.slowest.is_empty() {
        println!("(no timed operations)");
        return;
    }

    println!(
        "{:<14} {:>12} {:>14} {:>14}   {:<30}",
        "Operation", "Duration", "Connection", "Operation ID", "Completed"
    );
    for slow in &snapshot.slowest {
        let completed = slow
            .timestamp
            .as_ref()
            .map_or("-".to_string(), format_timestamp);
        println!(
            "{:<14} {:>12} {:>14} {:>14}   {:<30}",
            slow.kind.as_str(),
            format_millis(Some(slow.duration_ms)),
            slow.connection_id
                .map_or("-".to_string(), |id| id.to_string()),
            slow.operation_id
                .map_or("-".to_string(), |id| id.to_string()),
            completed
        );
    }
}

fn print_connections(snapshot: &Snapshot) {
    let connections = &snapshot.connections;
    println!("\nConnections");
    println!("{}", "-".repeat(100));
    println!(
        "Total connections: {}",
        format_number(connections.total_connections)
    );
    if connections.total_connections == 0 {
        return;
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

    println!("\n{:<5} {:>14} {:>12} {:>14}", "#", "Connection", "Ops", "Lifetime");
    for (i, entry) in connections.top.iter().enumerate() {
        println!(
            "{:<5} {:>14} {:>12} {:>14}",
            i + 1,
            entry.connection_id,
            format_number(entry.operations),
            format_millis(entry.lifetime_ms)
        );
    }
}

fn print_log_quality(snapshot: &Snapshot, stats: &ParserStats) {
    println!("\nLog Quality");
    println!("{}", "-".repeat(100));
    println!("Lines processed: {}", format_number(stats.lines_total));
    println!("Records: {}", format_number(stats.records_total));
    println!("Malformed lines: {}", format_number(stats.malformed_lines));
    println!(
        "Unterminated operations: {}",
        format_number(stats.unterminated_operations)
    );
    println!(
        "Orphan responses: {}",
        format_number(stats.orphan_responses)
    );
    println!("Untimed events: {}", format_number(snapshot.untimed_events));
    println!(
        "Clock anomalies: {}",
        format_number(snapshot.clock_anomalies)
    );
}

fn print_performance(metrics: &PassMetrics) {
    println!("\nPerformance");
    println!("{}", "-".repeat(100));
    println!("Elapsed time: {:.3} s", metrics.elapsed.as_secs_f64());
    println!(
        "Throughput: {} lines ({:.0} lines/sec)",
        format_number(metrics.lines_total),
        metrics.lines_per_second()
    );
    println!("Records processed: {}", format_number(metrics.records_total));
}

fn write_json(path: &str, snapshot: &Snapshot, parser: &ParserStats) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create JSON output: {}", path))?;
    serde_json::to_writer_pretty(file, &JsonReport { snapshot, parser })
        .with_context(|| format!("Failed to write JSON output: {}", path))?;
    Ok(())
}

fn write_csv(path: &str, snapshot: &Snapshot) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV output: {}", path))?;
    writer.write_record(["table", "rank", "key", "count"])?;

    let tables: [(&str, &[TableEntry]); 5] = [
        ("bind_dns", &snapshot.top_bind_dns),
        ("search_bases", &snapshot.top_search_bases),
        ("search_filters", &snapshot.top_search_filters),
        ("clients", &snapshot.top_clients),
        ("filter_attributes", &snapshot.filter_attributes),
    ];
    for (table, entries) in tables {
        for (i, entry) in entries.iter().enumerate() {
            writer.write_record([
                table,
                &(i + 1).to_string(),
                &entry.key,
                &entry.count.to_string(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}
