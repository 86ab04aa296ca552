//! # LDAP Audit Tools
//!
//! Command-line tools for analyzing directory-server (LDAP) audit logs with
//! streaming parsing and bounded-memory aggregation.
//!
//! ## Overview
//!
//! This crate parses AuditV3-format audit logs — the line-oriented,
//! multi-line record format written by IBM-style directory servers — and
//! produces aggregate statistics about server usage and performance:
//! per-operation counts, response-time distributions and percentiles, the
//! busiest clients, the most frequent bind DNs, search bases and filters,
//! and connection-lifetime metrics. It is designed for large production
//! logs (millions of lines) and processes them in a single streaming pass
//! whose memory footprint does not grow with file size.
//!
//! ## Features
//!
//! - **Streaming record parser** that assembles multi-line AuditV3 records
//!   and pairs request/response records by connection and operation ID
//! - **Single-pass aggregation** with exact per-operation counters,
//!   fixed-threshold duration histograms, and deterministic top-N tables
//! - **Log-quality accounting** — malformed lines, unterminated operations,
//!   untimed events, and clock anomalies are counted, never fatal
//! - **Compressed file support** — direct analysis of `.gz` and `.zst` logs
//! - **JSON and CSV export** of the full statistics snapshot
//! - **Shell completion** for bash, zsh, fish, powershell, and elvish
//!
//! ## Architecture
//!
//! - [`audit`] - Core record parsing and statistical aggregation
//! - [`commands`] - Analysis command implementations
//! - [`utils`] - Shared utilities (readers, progress, time parsing)
//!
//! ## Example Usage
//!
//! ```bash
//! # Full usage report for the default logfile.txt
//! ldap-audit analyze
//!
//! # Specific file with processing performance statistics
//! ldap-audit analyze audit.log --performance
//!
//! # Compressed files work seamlessly
//! ldap-audit analyze audit.log.gz --top 20
//!
//! # Connection-lifetime view
//! ldap-audit connections audit.log
//!
//! # Machine-readable exports
//! ldap-audit analyze audit.log --json report.json --export tables.csv
//! ```

pub mod audit;
pub mod commands;
pub mod utils;
