//! Core audit log parsing and statistical aggregation.
//!
//! This module contains the single-pass pipeline at the heart of the crate:
//! a streaming parser that assembles AuditV3 records into [`types::Event`]s,
//! and an aggregator that folds those events into a statistics snapshot.
//!
//! ## Key Components
//!
//! - [`types`] - Data structures representing audit events
//! - [`parser`] - Streaming record parser with request/response pairing
//! - [`aggregator`] - Incremental statistics with bounded memory
//!
//! ## Example
//!
//! ```no_run
//! use ldap_audit_tools::audit::aggregator::Aggregator;
//! use ldap_audit_tools::audit::parser::Parser;
//! use std::io::{BufRead, BufReader};
//!
//! let file = std::fs::File::open("audit.log").unwrap();
//! let mut parser = Parser::new();
//! let mut aggregator = Aggregator::new();
//! let mut events = Vec::new();
//!
//! for line in BufReader::new(file).lines() {
//!     parser.feed_line(&line.unwrap(), &mut events);
//!     for event in events.drain(..) {
//!         aggregator.fold(&event);
//!     }
//! }
//! parser.finish(&mut events);
//! for event in events.drain(..) {
//!     aggregator.fold(&event);
//! }
//!
//! let snapshot = aggregator.snapshot();
//! println!("{} events", snapshot.events_total);
//! ```

pub mod aggregator;
pub mod parser;
pub mod types;
