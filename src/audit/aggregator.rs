//! Single-pass statistical aggregation over audit events.
//!
//! An [`Aggregator`] owns all mutable statistics state for one run: it is
//! constructed empty, mutated exclusively by [`fold`](Aggregator::fold) in
//! event-arrival order, and read out through [`snapshot`](Aggregator::snapshot)
//! once the stream is exhausted. Snapshots are pure reads — calling twice
//! without an intervening fold returns identical results, and the same input
//! always produces the same snapshot, including top-table ordering.
//!
//! Memory stays bounded by the number of *distinct* keys, never by file
//! length: duration distributions use a fixed-threshold histogram, and the
//! slowest-event list is a bounded heap. Frequency tables deliberately keep
//! exact counts for every distinct key and truncate to top-N only at
//! snapshot time, since evicting during accumulation could misrank keys
//! that become frequent late in the log.

use super::types::{Event, OperationKind};
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::Serialize;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

/// Execution-time thresholds (milliseconds) for the distribution report.
pub const DURATION_THRESHOLDS_MS: [u64; 9] = [10, 50, 100, 200, 500, 1000, 2000, 5000, 10000];

const BUCKET_COUNT: usize = DURATION_THRESHOLDS_MS.len() + 1;

pub const DEFAULT_TOP_LIMIT: usize = 10;
pub const DEFAULT_SLOWEST_LIMIT: usize = 5;

/// Duration accumulator: count/min/max/sum plus the threshold histogram.
#[derive(Debug, Clone, Default, PartialEq)]
struct DurationStats {
    count: u64,
    min_ms: u64,
    max_ms: u64,
    sum_ms: u64,
    buckets: [u64; BUCKET_COUNT],
}

impl DurationStats {
    fn record(&mut self, ms: u64) {
        if self.count == 0 {
            self.min_ms = ms;
            self.max_ms = ms;
        } else {
            self.min_ms = self.min_ms.min(ms);
            self.max_ms = self.max_ms.max(ms);
        }
        self.count += 1;
        self.sum_ms += ms;

        let bucket = DURATION_THRESHOLDS_MS
            .iter()
            .position(|&threshold| ms <= threshold)
            .unwrap_or(BUCKET_COUNT - 1);
        self.buckets[bucket] += 1;
    }

    /// Nearest-rank percentile over the histogram.
    ///
    /// Returns the upper bound of the bucket holding the k-th sample
    /// (k = ceil(p/100 * count)); `None` means either no samples or the
    /// overflow bucket above the highest threshold.
    fn percentile_ms(&self, p: f64) -> Option<u64> {
        if self.count == 0 {
            return None;
        }
        let rank = ((p / 100.0) * self.count as f64).ceil().max(1.0) as u64;
        let mut seen = 0;
        for (bucket, &count) in self.buckets.iter().enumerate() {
            seen += count;
            if seen >= rank {
                return DURATION_THRESHOLDS_MS.get(bucket).copied();
            }
        }
        None
    }

    fn summary(&self) -> DurationSummary {
        DurationSummary {
            count: self.count,
            min_ms: (self.count > 0).then_some(self.min_ms),
            max_ms: (self.count > 0).then_some(self.max_ms),
            mean_ms: (self.count > 0).then(|| self.sum_ms as f64 / self.count as f64),
            p50_ms: self.percentile_ms(50.0),
            p90_ms: self.percentile_ms(90.0),
            p95_ms: self.percentile_ms(95.0),
            p99_ms: self.percentile_ms(99.0),
            buckets: DURATION_THRESHOLDS_MS
                .iter()
                .map(Some)
                .chain(std::iter::once(None))
                .zip(self.buckets.iter())
                .map(|(threshold, &count)| DurationBucket {
                    up_to_ms: threshold.copied(),
                    count,
                })
                .collect(),
        }
    }
}

/// Finalized duration distribution for one operation kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationSummary {
    pub count: u64,
    pub min_ms: Option<u64>,
    pub max_ms: Option<u64>,
    pub mean_ms: Option<f64>,
    pub p50_ms: Option<u64>,
    pub p90_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub buckets: Vec<DurationBucket>,
}

/// One histogram bucket; `up_to_ms: None` is the overflow bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationBucket {
    pub up_to_ms: Option<u64>,
    pub count: u64,
}

/// Exact-count frequency table, truncated to top-N only at snapshot time.
#[derive(Debug, Default)]
struct FrequencyTable {
    counts: HashMap<String, KeyStats>,
    inserts: u64,
}

#[derive(Debug)]
struct KeyStats {
    count: u64,
    first_seen: u64,
}

impl FrequencyTable {
    fn add(&mut self, key: &str) {
        if let Some(stats) = self.counts.get_mut(key) {
            stats.count += 1;
        } else {
            let first_seen = self.inserts;
            self.inserts += 1;
            self.counts
                .insert(key.to_string(), KeyStats { count: 1, first_seen });
        }
    }

    fn distinct(&self) -> u64 {
        self.counts.len() as u64
    }

    /// All keys ranked by count descending, ties broken by first-seen order.
    fn ranked(&self) -> Vec<TableEntry> {
        let mut entries: Vec<(&String, &KeyStats)> = self.counts.iter().collect();
        entries.sort_by(|a, b| {
            b.1.count
                .cmp(&a.1.count)
                .then(a.1.first_seen.cmp(&b.1.first_seen))
        });
        entries
            .into_iter()
            .map(|(key, stats)| TableEntry {
                key: key.clone(),
                count: stats.count,
            })
            .collect()
    }

    fn top(&self, limit: usize) -> Vec<TableEntry> {
        let mut ranked = self.ranked();
        ranked.truncate(limit);
        ranked
    }
}

/// One row of a finalized frequency table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableEntry {
    pub key: String,
    pub count: u64,
}

/// Running per-connection state.
#[derive(Debug)]
struct ConnectionState {
    first_index: u64,
    operations: u64,
    first_seen: Option<DateTime<FixedOffset>>,
    last_seen: Option<DateTime<FixedOffset>>,
}

/// Finalized per-connection row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionEntry {
    pub connection_id: u64,
    pub operations: u64,
    pub first_seen: Option<DateTime<FixedOffset>>,
    pub last_seen: Option<DateTime<FixedOffset>>,
    pub lifetime_ms: Option<u64>,
}

/// Connection-registry rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionSummary {
    pub total_connections: u64,
    pub total_operations: u64,
    pub max_operations: u64,
    pub mean_operations: Option<f64>,
    /// Connections with at least one parseable timestamp on both ends.
    pub timed_connections: u64,
    pub min_lifetime_ms: Option<u64>,
    pub max_lifetime_ms: Option<u64>,
    pub mean_lifetime_ms: Option<f64>,
    pub top: Vec<ConnectionEntry>,
}

/// One of the highest-duration operations observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowEvent {
    pub kind: OperationKind,
    pub duration_ms: u64,
    pub connection_id: Option<u64>,
    pub operation_id: Option<u64>,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone)]
struct SlowEntry {
    duration_ms: u64,
    seq: u64,
    kind: OperationKind,
    connection_id: Option<u64>,
    operation_id: Option<u64>,
    timestamp: Option<DateTime<FixedOffset>>,
}

// ordered so that the heap minimum is the entry to evict: shortest
// duration first, and among equal durations the latest arrival
impl Ord for SlowEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.duration_ms
            .cmp(&other.duration_ms)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for SlowEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SlowEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SlowEntry {}

/// Per-operation-kind rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSummary {
    pub kind: OperationKind,
    pub count: u64,
    pub durations: DurationSummary,
}

/// The finalized aggregate state of one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub events_total: u64,
    pub untimed_events: u64,
    pub clock_anomalies: u64,
    /// One entry per operation kind, in a fixed order.
    pub operations: Vec<OperationSummary>,
    pub overall_durations: DurationSummary,
    pub top_bind_dns: Vec<TableEntry>,
    pub distinct_bind_dns: u64,
    pub top_search_bases: Vec<TableEntry>,
    pub distinct_search_bases: u64,
    pub top_search_filters: Vec<TableEntry>,
    pub distinct_search_filters: u64,
    pub top_clients: Vec<TableEntry>,
    pub distinct_clients: u64,
    /// Attribute names appearing in search filters, fully ranked.
    pub filter_attributes: Vec<TableEntry>,
    pub connections: ConnectionSummary,
    pub slowest: Vec<SlowEvent>,
}

/// Incremental statistics over an event stream.
pub struct Aggregator {
    top_limit: usize,
    slowest_limit: usize,
    events_total: u64,
    untimed_events: u64,
    clock_anomalies: u64,
    next_seq: u64,
    kind_counts: [u64; OperationKind::COUNT],
    kind_durations: [DurationStats; OperationKind::COUNT],
    overall: DurationStats,
    bind_dns: FrequencyTable,
    search_bases: FrequencyTable,
    search_filters: FrequencyTable,
    clients: FrequencyTable,
    filter_attributes: FrequencyTable,
    connections: HashMap<u64, ConnectionState>,
    slowest: BinaryHeap<Reverse<SlowEntry>>,
    filter_attr: Regex,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_TOP_LIMIT, DEFAULT_SLOWEST_LIMIT)
    }

    /// Aggregator with custom top-table and slowest-event bounds.
    pub fn with_limits(top_limit: usize, slowest_limit: usize) -> Self {
        Self {
            top_limit,
            slowest_limit,
            events_total: 0,
            untimed_events: 0,
            clock_anomalies: 0,
            next_seq: 0,
            kind_counts: [0; OperationKind::COUNT],
            kind_durations: Default::default(),
            overall: DurationStats::default(),
            bind_dns: FrequencyTable::default(),
            search_bases: FrequencyTable::default(),
            search_filters: FrequencyTable::default(),
            clients: FrequencyTable::default(),
            filter_attributes: FrequencyTable::default(),
            connections: HashMap::new(),
            slowest: BinaryHeap::new(),
            filter_attr: Regex::new(r"\((\w+)[~<>]?=").expect("invalid filter attribute pattern"),
        }
    }

    pub fn events_total(&self) -> u64 {
        self.events_total
    }

    /// Fold one event into the running state.
    pub fn fold(&mut self, event: &Event) {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.events_total += 1;
        self.kind_counts[event.kind.index()] += 1;

        if event.timestamp.is_none() {
            self.untimed_events += 1;
        }
        if event.clock_anomaly {
            self.clock_anomalies += 1;
        }

        if let Some(ms) = event.duration_ms() {
            self.kind_durations[event.kind.index()].record(ms);
            self.overall.record(ms);
            self.offer_slow(SlowEntry {
                duration_ms: ms,
                seq,
                kind: event.kind,
                connection_id: event.connection_id,
                operation_id: event.operation_id,
                timestamp: event.timestamp,
            });
        }

        match event.kind {
            OperationKind::Bind => {
                if let Some(dn) = event.bind_dn() {
                    self.bind_dns.add(dn);
                }
            }
            OperationKind::Search => {
                if let Some(base) = event.search_base() {
                    self.search_bases.add(base);
                }
                if let Some(filter) = event.search_filter() {
                    self.search_filters.add(filter);
                    for captures in self.filter_attr.captures_iter(filter) {
                        self.filter_attributes.add(&captures[1]);
                    }
                }
            }
            _ => {}
        }

        if let Some(client) = event.client() {
            self.clients.add(client);
        }

        if let Some(connection_id) = event.connection_id {
            let state = self
                .connections
                .entry(connection_id)
                .or_insert_with(|| ConnectionState {
                    first_index: seq,
                    operations: 0,
                    first_seen: None,
                    last_seen: None,
                });
            state.operations += 1;
            if let Some(ts) = event.timestamp {
                state.first_seen = Some(state.first_seen.map_or(ts, |first| first.min(ts)));
                state.last_seen = Some(state.last_seen.map_or(ts, |last| last.max(ts)));
            }
        }
    }

    fn offer_slow(&mut self, entry: SlowEntry) {
        if self.slowest_limit == 0 {
            return;
        }
        if self.slowest.len() < self.slowest_limit {
            self.slowest.push(Reverse(entry));
        } else if let Some(Reverse(smallest)) = self.slowest.peek() {
            if entry > *smallest {
                self.slowest.pop();
                self.slowest.push(Reverse(entry));
            }
        }
    }

    /// Materialize the aggregate snapshot. Pure read; repeated calls
    /// without intervening folds return identical results.
    pub fn snapshot(&self) -> Snapshot {
        let operations = OperationKind::ALL
            .iter()
            .map(|&kind| OperationSummary {
                kind,
                count: self.kind_counts[kind.index()],
                durations: self.kind_durations[kind.index()].summary(),
            })
            .collect();

        let mut slow_entries: Vec<SlowEntry> = self
            .slowest
            .iter()
            .map(|Reverse(entry)| entry.clone())
            .collect();
        slow_entries.sort_by(|a, b| {
            b.duration_ms
                .cmp(&a.duration_ms)
                .then(a.seq.cmp(&b.seq))
        });
        let slowest = slow_entries
            .into_iter()
            .map(|entry| SlowEvent {
                kind: entry.kind,
                duration_ms: entry.duration_ms,
                connection_id: entry.connection_id,
                operation_id: entry.operation_id,
                timestamp: entry.timestamp,
            })
            .collect();

        Snapshot {
            events_total: self.events_total,
            untimed_events: self.untimed_events,
            clock_anomalies: self.clock_anomalies,
            operations,
            overall_durations: self.overall.summary(),
            top_bind_dns: self.bind_dns.top(self.top_limit),
            distinct_bind_dns: self.bind_dns.distinct(),
            top_search_bases: self.search_bases.top(self.top_limit),
            distinct_search_bases: self.search_bases.distinct(),
            top_search_filters: self.search_filters.top(self.top_limit),
            distinct_search_filters: self.search_filters.distinct(),
            top_clients: self.clients.top(self.top_limit),
            distinct_clients: self.clients.distinct(),
            filter_attributes: self.filter_attributes.ranked(),
            connections: self.connection_summary(),
            slowest,
        }
    }

    fn connection_summary(&self) -> ConnectionSummary {
        let total_connections = self.connections.len() as u64;
        let mut total_operations = 0u64;
        let mut max_operations = 0u64;
        let mut timed_connections = 0u64;
        let mut lifetime_sum_ms = 0u64;
        let mut min_lifetime_ms: Option<u64> = None;
        let mut max_lifetime_ms: Option<u64> = None;

        for state in self.connections.values() {
            total_operations += state.operations;
            max_operations = max_operations.max(state.operations);
            if let Some(ms) = lifetime_ms(state) {
                timed_connections += 1;
                lifetime_sum_ms += ms;
                min_lifetime_ms = Some(min_lifetime_ms.map_or(ms, |min| min.min(ms)));
                max_lifetime_ms = Some(max_lifetime_ms.map_or(ms, |max| max.max(ms)));
            }
        }

        let mut ranked: Vec<(&u64, &ConnectionState)> = self.connections.iter().collect();
        ranked.sort_by(|a, b| {
            b.1.operations
                .cmp(&a.1.operations)
                .then(a.1.first_index.cmp(&b.1.first_index))
        });
        ranked.truncate(self.top_limit);
        let top = ranked
            .into_iter()
            .map(|(&connection_id, state)| ConnectionEntry {
                connection_id,
                operations: state.operations,
                first_seen: state.first_seen,
                last_seen: state.last_seen,
                lifetime_ms: lifetime_ms(state),
            })
            .collect();

        ConnectionSummary {
            total_connections,
            total_operations,
            max_operations,
            mean_operations: (total_connections > 0)
                .then(|| total_operations as f64 / total_connections as f64),
            timed_connections,
            min_lifetime_ms,
            max_lifetime_ms,
            mean_lifetime_ms: (timed_connections > 0)
                .then(|| lifetime_sum_ms as f64 / timed_connections as f64),
            top,
        }
    }
}

fn lifetime_ms(state: &ConnectionState) -> Option<u64> {
    match (state.first_seen, state.last_seen) {
        (Some(first), Some(last)) => {
            Some(last.signed_duration_since(first).num_milliseconds().max(0) as u64)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::types::AttrValue;
    use crate::utils::time::parse_audit_timestamp;
    use std::time::Duration;

    fn event(kind: OperationKind) -> Event {
        Event {
            kind,
            timestamp: parse_audit_timestamp("2023-05-12-08:30:15.000000+02:00").ok(),
            connection_id: None,
            operation_id: None,
            fields: HashMap::new(),
            result: None,
            duration: None,
            clock_anomaly: false,
        }
    }

    fn with_field(mut e: Event, name: &str, value: &str) -> Event {
        e.fields
            .insert(name.to_string(), AttrValue::Single(value.to_string()));
        e
    }

    fn with_duration(mut e: Event, ms: u64) -> Event {
        e.duration = Some(Duration::from_millis(ms));
        e
    }

    #[test]
    fn test_empty_snapshot_is_all_zero() {
        let aggregator = Aggregator::new();
        let snapshot = aggregator.snapshot();

        assert_eq!(snapshot.events_total, 0);
        assert_eq!(snapshot.overall_durations.count, 0);
        assert!(snapshot.top_bind_dns.is_empty());
        assert!(snapshot.top_clients.is_empty());
        assert!(snapshot.slowest.is_empty());
        assert_eq!(snapshot.connections.total_connections, 0);
        for op in &snapshot.operations {
            assert_eq!(op.count, 0);
        }
    }

    #[test]
    fn test_per_kind_counters() {
        let mut aggregator = Aggregator::new();
        aggregator.fold(&event(OperationKind::Bind));
        aggregator.fold(&event(OperationKind::Search));
        aggregator.fold(&event(OperationKind::Search));
        aggregator.fold(&event(OperationKind::Unknown));

        let snapshot = aggregator.snapshot();
        let count_of = |kind: OperationKind| {
            snapshot
                .operations
                .iter()
                .find(|op| op.kind == kind)
                .unwrap()
                .count
        };
        assert_eq!(count_of(OperationKind::Bind), 1);
        assert_eq!(count_of(OperationKind::Search), 2);
        assert_eq!(count_of(OperationKind::Unknown), 1);
        assert_eq!(count_of(OperationKind::Delete), 0);
        assert_eq!(snapshot.events_total, 4);
    }

    #[test]
    fn test_duration_accumulation() {
        let mut aggregator = Aggregator::new();
        for ms in [5, 40, 150, 3000] {
            aggregator.fold(&with_duration(event(OperationKind::Search), ms));
        }

        let snapshot = aggregator.snapshot();
        let durations = &snapshot.overall_durations;
        assert_eq!(durations.count, 4);
        assert_eq!(durations.min_ms, Some(5));
        assert_eq!(durations.max_ms, Some(3000));
        assert_eq!(durations.mean_ms, Some((5.0 + 40.0 + 150.0 + 3000.0) / 4.0));
        // buckets: <=10, <=50, <=200, <=5000
        assert_eq!(durations.p50_ms, Some(50));
        assert_eq!(durations.p99_ms, Some(5000));
    }

    #[test]
    fn test_percentile_overflow_bucket() {
        let mut aggregator = Aggregator::new();
        aggregator.fold(&with_duration(event(OperationKind::Bind), 60_000));

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.overall_durations.count, 1);
        assert_eq!(snapshot.overall_durations.p50_ms, None);
        assert_eq!(snapshot.overall_durations.max_ms, Some(60_000));
    }

    #[test]
    fn test_top_table_ranking_and_tie_break() {
        let mut aggregator = Aggregator::with_limits(2, 5);
        for _ in 0..5 {
            aggregator.fold(&with_field(
                event(OperationKind::Bind),
                "bindDN",
                "cn=admin",
            ));
        }
        for _ in 0..3 {
            aggregator.fold(&with_field(
                event(OperationKind::Bind),
                "bindDN",
                "cn=user1",
            ));
        }
        // same count as cn=user1 but first seen later: must rank below
        for _ in 0..3 {
            aggregator.fold(&with_field(
                event(OperationKind::Bind),
                "bindDN",
                "cn=user2",
            ));
        }

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.distinct_bind_dns, 3);
        assert_eq!(
            snapshot.top_bind_dns,
            vec![
                TableEntry {
                    key: "cn=admin".to_string(),
                    count: 5
                },
                TableEntry {
                    key: "cn=user1".to_string(),
                    count: 3
                },
            ]
        );
    }

    #[test]
    fn test_search_tables_and_filter_attributes() {
        let mut aggregator = Aggregator::new();
        let search = with_field(
            with_field(
                event(OperationKind::Search),
                "filter",
                "(&(objectClass=person)(uid=jdoe)(age>=30))",
            ),
            "base",
            "ou=people,o=example",
        );
        aggregator.fold(&search);

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.top_search_bases[0].key, "ou=people,o=example");
        assert_eq!(
            snapshot.top_search_filters[0].key,
            "(&(objectClass=person)(uid=jdoe)(age>=30))"
        );
        let attrs: Vec<&str> = snapshot
            .filter_attributes
            .iter()
            .map(|e| e.key.as_str())
            .collect();
        assert_eq!(attrs, vec!["objectClass", "uid", "age"]);
    }

    #[test]
    fn test_connection_registry() {
        let mut aggregator = Aggregator::new();

        let mut first = event(OperationKind::Bind);
        first.connection_id = Some(7);
        aggregator.fold(&first);

        let mut second = event(OperationKind::Search);
        second.connection_id = Some(7);
        second.timestamp = parse_audit_timestamp("2023-05-12-08:30:25.000000+02:00").ok();
        aggregator.fold(&second);

        let mut other = event(OperationKind::Bind);
        other.connection_id = Some(9);
        aggregator.fold(&other);

        let snapshot = aggregator.snapshot();
        let connections = &snapshot.connections;
        assert_eq!(connections.total_connections, 2);
        assert_eq!(connections.total_operations, 3);
        assert_eq!(connections.max_operations, 2);
        assert_eq!(connections.mean_operations, Some(1.5));

        assert_eq!(connections.top[0].connection_id, 7);
        assert_eq!(connections.top[0].operations, 2);
        assert_eq!(connections.top[0].lifetime_ms, Some(10_000));
        assert_eq!(connections.top[1].connection_id, 9);
    }

    #[test]
    fn test_slowest_is_bounded_and_ordered() {
        let mut aggregator = Aggregator::with_limits(10, 3);
        for ms in [100, 900, 50, 700, 300] {
            let mut e = with_duration(event(OperationKind::Search), ms);
            e.connection_id = Some(ms);
            aggregator.fold(&e);
        }

        let snapshot = aggregator.snapshot();
        let durations: Vec<u64> = snapshot.slowest.iter().map(|s| s.duration_ms).collect();
        assert_eq!(durations, vec![900, 700, 300]);
    }

    #[test]
    fn test_untimed_and_anomaly_counters() {
        let mut aggregator = Aggregator::new();

        let mut untimed = event(OperationKind::Search);
        untimed.timestamp = None;
        aggregator.fold(&untimed);

        let mut anomalous = with_duration(event(OperationKind::Modify), 0);
        anomalous.clock_anomaly = true;
        aggregator.fold(&anomalous);

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.untimed_events, 1);
        assert_eq!(snapshot.clock_anomalies, 1);
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let mut aggregator = Aggregator::new();
        for ms in [10, 20, 30] {
            let mut e = with_duration(event(OperationKind::Search), ms);
            e.connection_id = Some(1);
            aggregator.fold(&with_field(e, "filter", "(cn=x)"));
        }

        let first = aggregator.snapshot();
        let second = aggregator.snapshot();
        assert_eq!(first, second);
    }
}
