//! Streaming AuditV3 record parser.
//!
//! Records arrive as one header line of `--`-separated segments
//! (`AuditV3--<timestamp>--<operation tag>--key: value--...--<result>`),
//! optionally followed by continuation lines holding further `key: value`
//! attributes. The parser assembles records one at a time, pairs request
//! records with their responses through a bounded pending map keyed by
//! `(connectionID, operationID)`, and emits [`Event`]s as soon as they are
//! complete. Every failure mode is recovered locally and surfaced through
//! [`ParserStats`]; nothing short of an unreadable input stream aborts a
//! pass.

use super::types::{AttrValue, Event, OperationKind, RecordError};
use crate::utils::time::parse_audit_timestamp;
use chrono::{DateTime, FixedOffset};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

const HEADER_PREFIX: &str = "AuditV3--";

/// Upper bound on simultaneously open (unpaired) operations.
///
/// A truncated or corrupt log can carry requests whose responses never
/// arrive; once the pending map reaches this size the oldest entry is
/// discarded and counted as unterminated, keeping memory bounded no matter
/// how long the input is.
pub const MAX_PENDING_OPERATIONS: usize = 65_536;

/// Side counters accumulated over a parse.
///
/// After [`Parser::finish`] the record accounting identity holds:
/// `records_total == events_emitted + malformed_records +
/// unterminated_operations`.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ParserStats {
    /// Physical lines consumed, including blank and malformed ones.
    pub lines_total: u64,
    pub blank_lines: u64,
    /// Lines that attached attributes to an open record.
    pub continuation_lines: u64,
    /// Lines that failed their grammar (bad headers, junk continuations,
    /// text outside any record).
    pub malformed_lines: u64,
    /// Logical records opened (header lines, garbage lines, orphan
    /// responses). Paired responses complete an existing record and do not
    /// open a new one.
    pub records_total: u64,
    pub events_emitted: u64,
    pub malformed_records: u64,
    /// Responses matched to a pending request.
    pub paired_responses: u64,
    /// Responses with no pending request; emitted as Unknown events.
    pub orphan_responses: u64,
    /// Requests never paired with a response (end-of-stream, eviction, or
    /// operation-id reuse).
    pub unterminated_operations: u64,
    /// Unterminated operations dropped early to keep the pending map
    /// bounded.
    pub pending_evictions: u64,
}

/// A record under assembly: the header segments plus any continuation
/// attributes seen so far.
#[derive(Debug)]
struct RecordBuilder {
    raw_header: String,
    timestamp: Option<DateTime<FixedOffset>>,
    tag: String,
    attrs: HashMap<String, AttrValue>,
    result: Option<String>,
}

impl RecordBuilder {
    fn add_segment(&mut self, segment: &str) {
        if let Some((key, value)) = segment.split_once(": ") {
            self.add_attr(key, value);
        } else if !segment.is_empty() {
            // bare trailing segment is the result word, last one wins
            self.result = Some(segment.to_string());
        }
    }

    fn add_attr(&mut self, key: &str, value: &str) {
        match self.attrs.entry(key.to_string()) {
            Entry::Occupied(mut slot) => slot.get_mut().push(value.to_string()),
            Entry::Vacant(slot) => {
                slot.insert(AttrValue::Single(value.to_string()));
            }
        }
    }

    fn attr_u64(&self, key: &str) -> Option<u64> {
        self.attrs.get(key).and_then(|v| v.first().trim().parse().ok())
    }

    fn ids(&self) -> (Option<u64>, Option<u64>) {
        (self.attr_u64("connectionID"), self.attr_u64("operationID"))
    }
}

/// A request held until its response arrives.
#[derive(Debug)]
struct PendingRequest {
    seq: u64,
    kind: OperationKind,
    timestamp: Option<DateTime<FixedOffset>>,
    attrs: HashMap<String, AttrValue>,
    result: Option<String>,
}

/// Streaming parser over audit log lines.
///
/// Feed lines in file order with [`feed_line`](Self::feed_line), then call
/// [`finish`](Self::finish) once at end-of-stream to flush the open record
/// and account for unpaired requests. Restartable only by constructing a
/// fresh parser.
pub struct Parser {
    current: Option<RecordBuilder>,
    pending: HashMap<(u64, u64), PendingRequest>,
    pending_order: VecDeque<(u64, (u64, u64))>,
    pending_capacity: usize,
    next_seq: u64,
    stats: ParserStats,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::with_pending_capacity(MAX_PENDING_OPERATIONS)
    }

    /// Parser with a custom pending-map bound (smaller bounds are useful
    /// for logs known to be heavily truncated).
    pub fn with_pending_capacity(capacity: usize) -> Self {
        Self {
            current: None,
            pending: HashMap::new(),
            pending_order: VecDeque::new(),
            pending_capacity: capacity.max(1),
            next_seq: 0,
            stats: ParserStats::default(),
        }
    }

    pub fn stats(&self) -> &ParserStats {
        &self.stats
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_operations(&self) -> usize {
        self.pending.len()
    }

    /// Consume one physical line, appending any completed events to `out`.
    pub fn feed_line(&mut self, line: &str, out: &mut Vec<Event>) {
        self.stats.lines_total += 1;
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            self.stats.blank_lines += 1;
            return;
        }

        if line.starts_with(HEADER_PREFIX) {
            self.close_current(out);
            match parse_header(line) {
                Ok(builder) => self.current = Some(builder),
                Err(_) => {
                    self.stats.malformed_lines += 1;
                    self.stats.records_total += 1;
                    self.stats.malformed_records += 1;
                }
            }
        } else if let Some(builder) = self.current.as_mut() {
            if let Some((key, value)) = line.split_once(": ") {
                self.stats.continuation_lines += 1;
                builder.add_attr(key.trim_start(), value);
            } else {
                self.stats.malformed_lines += 1;
            }
        } else {
            // free-standing text outside any record
            self.stats.malformed_lines += 1;
            self.stats.records_total += 1;
            self.stats.malformed_records += 1;
        }
    }

    /// Flush the open record and count unpaired requests as unterminated.
    pub fn finish(&mut self, out: &mut Vec<Event>) {
        self.close_current(out);
        self.stats.unterminated_operations += self.pending.len() as u64;
        self.pending.clear();
        self.pending_order.clear();
    }

    fn close_current(&mut self, out: &mut Vec<Event>) {
        if let Some(builder) = self.current.take() {
            self.process_record(builder, out);
        }
    }

    fn process_record(&mut self, builder: RecordBuilder, out: &mut Vec<Event>) {
        if OperationKind::is_response_tag(&builder.tag) {
            self.process_response(builder, out);
            return;
        }

        self.stats.records_total += 1;
        let kind = OperationKind::from_tag(&builder.tag);
        let (connection_id, operation_id) = builder.ids();

        if kind == OperationKind::Unknown {
            let RecordBuilder {
                raw_header,
                timestamp,
                attrs: mut fields,
                result,
                ..
            } = builder;
            fields
                .entry("raw".to_string())
                .or_insert_with(|| AttrValue::Single(raw_header));
            self.emit(
                Event {
                    kind,
                    timestamp,
                    connection_id,
                    operation_id,
                    fields,
                    result,
                    duration: None,
                    clock_anomaly: false,
                },
                out,
            );
            return;
        }

        // self-contained form: the header timestamp is written at
        // completion, `received` is request arrival
        if let Some(received_raw) = builder.attrs.get("received").map(|v| v.first().to_string()) {
            let received = parse_audit_timestamp(&received_raw).ok();
            let (duration, clock_anomaly) = duration_between(received, builder.timestamp);
            self.emit(
                Event {
                    kind,
                    timestamp: builder.timestamp,
                    connection_id,
                    operation_id,
                    fields: builder.attrs,
                    result: builder.result,
                    duration,
                    clock_anomaly,
                },
                out,
            );
            return;
        }

        // Unbind and Abandon have no LDAP response to wait for
        if matches!(kind, OperationKind::Unbind | OperationKind::Abandon) {
            self.emit(
                Event {
                    kind,
                    timestamp: builder.timestamp,
                    connection_id,
                    operation_id,
                    fields: builder.attrs,
                    result: builder.result,
                    duration: None,
                    clock_anomaly: false,
                },
                out,
            );
            return;
        }

        match (connection_id, operation_id) {
            (Some(conn), Some(op)) => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.insert_pending(
                    (conn, op),
                    PendingRequest {
                        seq,
                        kind,
                        timestamp: builder.timestamp,
                        attrs: builder.attrs,
                        result: builder.result,
                    },
                );
            }
            // without both identifiers the request can never pair
            _ => self.emit(
                Event {
                    kind,
                    timestamp: builder.timestamp,
                    connection_id,
                    operation_id,
                    fields: builder.attrs,
                    result: builder.result,
                    duration: None,
                    clock_anomaly: false,
                },
                out,
            ),
        }
    }

    fn process_response(&mut self, builder: RecordBuilder, out: &mut Vec<Event>) {
        let (connection_id, operation_id) = builder.ids();

        if let (Some(conn), Some(op)) = (connection_id, operation_id) {
            if let Some(request) = self.pending.remove(&(conn, op)) {
                self.stats.paired_responses += 1;
                let (duration, clock_anomaly) =
                    duration_between(request.timestamp, builder.timestamp);
                let mut fields = request.attrs;
                for (key, value) in builder.attrs {
                    match fields.entry(key) {
                        Entry::Occupied(mut slot) => {
                            for item in value.into_values() {
                                slot.get_mut().push(item);
                            }
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(value);
                        }
                    }
                }
                self.emit(
                    Event {
                        kind: request.kind,
                        timestamp: builder.timestamp.or(request.timestamp),
                        connection_id: Some(conn),
                        operation_id: Some(op),
                        fields,
                        result: builder.result.or(request.result),
                        duration,
                        clock_anomaly,
                    },
                    out,
                );
                return;
            }
        }

        // no matching request: the response is its own record
        self.stats.records_total += 1;
        self.stats.orphan_responses += 1;
        self.emit(
            Event {
                kind: OperationKind::Unknown,
                timestamp: builder.timestamp,
                connection_id,
                operation_id,
                fields: builder.attrs,
                result: builder.result,
                duration: None,
                clock_anomaly: false,
            },
            out,
        );
    }

    fn insert_pending(&mut self, key: (u64, u64), request: PendingRequest) {
        let seq = request.seq;
        if self.pending.insert(key, request).is_some() {
            // operation id reused before its response arrived; the earlier
            // request can never complete
            self.stats.unterminated_operations += 1;
        }
        self.pending_order.push_back((seq, key));

        while self.pending.len() > self.pending_capacity {
            let Some((old_seq, old_key)) = self.pending_order.pop_front() else {
                break;
            };
            // the queue keeps tombstones for entries already paired or
            // replaced; only a live entry counts as an eviction
            if self
                .pending
                .get(&old_key)
                .is_some_and(|r| r.seq == old_seq)
            {
                self.pending.remove(&old_key);
                self.stats.unterminated_operations += 1;
                self.stats.pending_evictions += 1;
            }
        }
    }

    fn emit(&mut self, event: Event, out: &mut Vec<Event>) {
        self.stats.events_emitted += 1;
        out.push(event);
    }
}

/// Lazy event iterator over any line source.
///
/// Adapts an in-memory or decoded line iterator into the event stream; the
/// parser's side counters become available once the stream is exhausted.
pub struct EventStream<I> {
    lines: I,
    parser: Parser,
    queue: VecDeque<Event>,
    buffer: Vec<Event>,
    done: bool,
}

impl<I> EventStream<I>
where
    I: Iterator<Item = String>,
{
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            parser: Parser::new(),
            queue: VecDeque::new(),
            buffer: Vec::new(),
            done: false,
        }
    }

    /// Side counters; complete once the iterator has returned `None`.
    pub fn stats(&self) -> &ParserStats {
        self.parser.stats()
    }
}

impl<I> Iterator for EventStream<I>
where
    I: Iterator<Item = String>,
{
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            if self.done {
                return None;
            }
            match self.lines.next() {
                Some(line) => self.parser.feed_line(&line, &mut self.buffer),
                None => {
                    self.parser.finish(&mut self.buffer);
                    self.done = true;
                }
            }
            self.queue.extend(self.buffer.drain(..));
        }
    }
}

/// Parse every event out of an iterable of lines.
///
/// Convenience for tests and small inputs; large files should drive
/// [`Parser`] or [`EventStream`] directly.
pub fn parse_lines<I>(lines: I) -> (Vec<Event>, ParserStats)
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut parser = Parser::new();
    let mut events = Vec::new();
    for line in lines {
        parser.feed_line(line.as_ref(), &mut events);
    }
    parser.finish(&mut events);
    let stats = parser.stats.clone();
    (events, stats)
}

fn parse_header(line: &str) -> Result<RecordBuilder, RecordError> {
    let rest = line
        .strip_prefix(HEADER_PREFIX)
        .ok_or_else(|| RecordError::NotAHeader(line.to_string()))?;

    let mut segments = rest.split("--");
    let timestamp_raw = segments
        .next()
        .filter(|s| !s.is_empty())
        .ok_or(RecordError::MissingTimestamp)?;
    let tag = segments
        .next()
        .filter(|s| !s.is_empty())
        .ok_or(RecordError::MissingOperation)?;

    let mut builder = RecordBuilder {
        raw_header: line.to_string(),
        timestamp: parse_audit_timestamp(timestamp_raw).ok(),
        tag: tag.to_string(),
        attrs: HashMap::new(),
        result: None,
    };
    for segment in segments {
        builder.add_segment(segment);
    }
    Ok(builder)
}

fn duration_between(
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
) -> (Option<Duration>, bool) {
    match (start, end) {
        (Some(start), Some(end)) => {
            let delta = end.signed_duration_since(start);
            if delta < chrono::Duration::zero() {
                (Some(Duration::ZERO), true)
            } else {
                (delta.to_std().ok(), false)
            }
        }
        _ => (None, false),
    }
}
