//! Data structures representing directory-server audit log events.
//!
//! An AuditV3 record is one header line of `--`-separated segments,
//! optionally followed by continuation lines carrying further `key: value`
//! attributes. These types model the completed form of such a record: a
//! classified operation with its attribute map, identifiers, and timing.

use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Operation variants recognized in audit records.
///
/// `Unknown` covers records whose structure parses but whose operation tag
/// is not recognized; such records are still emitted and counted so that
/// unexpected input never disappears from the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Bind,
    Unbind,
    Search,
    Add,
    Modify,
    Delete,
    ModifyDn,
    Compare,
    Extended,
    Abandon,
    Unknown,
}

impl OperationKind {
    /// All variants in a fixed order, used for deterministic iteration.
    pub const ALL: [OperationKind; 11] = [
        OperationKind::Bind,
        OperationKind::Unbind,
        OperationKind::Search,
        OperationKind::Add,
        OperationKind::Modify,
        OperationKind::Delete,
        OperationKind::ModifyDn,
        OperationKind::Compare,
        OperationKind::Extended,
        OperationKind::Abandon,
        OperationKind::Unknown,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Classify an operation tag, e.g. `"V3 Search"` or `"Bind"`.
    ///
    /// The keyword is the last whitespace-separated token of the tag (audit
    /// records prefix a protocol version such as `V3`) and is matched
    /// case-insensitively. Unrecognized keywords classify as `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        let keyword = tag.split_whitespace().next_back().unwrap_or("");
        match keyword.to_ascii_lowercase().as_str() {
            "bind" => OperationKind::Bind,
            "unbind" => OperationKind::Unbind,
            "search" => OperationKind::Search,
            "add" => OperationKind::Add,
            "modify" => OperationKind::Modify,
            "delete" | "del" => OperationKind::Delete,
            "modifydn" | "modrdn" => OperationKind::ModifyDn,
            "compare" => OperationKind::Compare,
            "extended" | "extop" => OperationKind::Extended,
            "abandon" => OperationKind::Abandon,
            _ => OperationKind::Unknown,
        }
    }

    /// Whether a tag marks a response record rather than an operation.
    pub fn is_response_tag(tag: &str) -> bool {
        let keyword = tag.split_whitespace().next_back().unwrap_or("");
        keyword.eq_ignore_ascii_case("response") || keyword.eq_ignore_ascii_case("result")
    }

    /// Display name used in reports and serialized snapshots.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Bind => "Bind",
            OperationKind::Unbind => "Unbind",
            OperationKind::Search => "Search",
            OperationKind::Add => "Add",
            OperationKind::Modify => "Modify",
            OperationKind::Delete => "Delete",
            OperationKind::ModifyDn => "ModifyDN",
            OperationKind::Compare => "Compare",
            OperationKind::Extended => "Extended",
            OperationKind::Abandon => "Abandon",
            OperationKind::Unknown => "Unknown",
        }
    }

    /// Position of this variant in [`Self::ALL`], for array-indexed counters.
    pub fn index(self) -> usize {
        match self {
            OperationKind::Bind => 0,
            OperationKind::Unbind => 1,
            OperationKind::Search => 2,
            OperationKind::Add => 3,
            OperationKind::Modify => 4,
            OperationKind::Delete => 5,
            OperationKind::ModifyDn => 6,
            OperationKind::Compare => 7,
            OperationKind::Extended => 8,
            OperationKind::Abandon => 9,
            OperationKind::Unknown => 10,
        }
    }
}

impl serde::Serialize for OperationKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A raw attribute value from a record.
///
/// A key that appears once holds a single value; repeated keys (added
/// attribute values, controls, referrals) collect into a list in the order
/// they were seen.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Single(String),
    Multi(Vec<String>),
}

impl AttrValue {
    /// Append another occurrence of the same key.
    pub fn push(&mut self, value: String) {
        match self {
            AttrValue::Single(first) => {
                let first = std::mem::take(first);
                *self = AttrValue::Multi(vec![first, value]);
            }
            AttrValue::Multi(values) => values.push(value),
        }
    }

    /// The first (or only) value.
    pub fn first(&self) -> &str {
        match self {
            AttrValue::Single(value) => value,
            AttrValue::Multi(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// Consume into the list of collected values.
    pub fn into_values(self) -> Vec<String> {
        match self {
            AttrValue::Single(value) => vec![value],
            AttrValue::Multi(values) => values,
        }
    }

    /// Number of collected values.
    pub fn len(&self) -> usize {
        match self {
            AttrValue::Single(_) => 1,
            AttrValue::Multi(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One completed LDAP operation occurrence.
///
/// Events only materialize once every line needed to determine the kind and
/// timing has been consumed; in-flight request fragments live inside the
/// parser's pending state and are never exposed.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: OperationKind,
    /// Completion timestamp; `None` marks the event as untimed after a
    /// malformed or missing timestamp.
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub connection_id: Option<u64>,
    pub operation_id: Option<u64>,
    /// Attribute map extracted from the record(s) backing this event.
    pub fields: HashMap<String, AttrValue>,
    /// Result word from the record tail (e.g. `Success`), when present.
    pub result: Option<String>,
    /// Elapsed time between request arrival and completion, when both
    /// timestamps were observed and parsed.
    pub duration: Option<Duration>,
    /// Set when the response timestamp preceded the request timestamp and
    /// the duration was clamped to zero.
    pub clock_anomaly: bool,
}

impl Event {
    /// First value of the named attribute.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(AttrValue::first)
    }

    /// Bound DN for bind operations (`bindDN`, falling back to `dn`).
    pub fn bind_dn(&self) -> Option<&str> {
        self.field("bindDN").or_else(|| self.field("dn"))
    }

    /// Search base DN.
    pub fn search_base(&self) -> Option<&str> {
        self.field("base")
    }

    /// Search filter expression.
    pub fn search_filter(&self) -> Option<&str> {
        self.field("filter")
    }

    /// Search scope.
    pub fn search_scope(&self) -> Option<&str> {
        self.field("scope")
    }

    /// Client address with any trailing port stripped.
    ///
    /// Audit records carry `client: 192.168.1.10:45678`; statistics group by
    /// host, so `host:port` and `[v6host]:port` forms lose the port.
    pub fn client(&self) -> Option<&str> {
        let raw = self.field("client")?;
        if let Some(rest) = raw.strip_prefix('[') {
            if let Some(end) = rest.find(']') {
                return Some(&rest[..end]);
            }
        }
        if let Some((host, port)) = raw.rsplit_once(':') {
            if !host.is_empty()
                && !port.is_empty()
                && port.chars().all(|c| c.is_ascii_digit())
                && host.contains('.')
            {
                return Some(host);
            }
        }
        Some(raw)
    }

    /// Number of entries returned by a search, when recorded.
    pub fn entry_count(&self) -> Option<u64> {
        self.field("nentries").and_then(|v| v.parse().ok())
    }

    /// Duration in whole milliseconds, when timed.
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration.map(|d| d.as_millis() as u64)
    }
}

/// Grammar errors raised while splitting a record header.
///
/// These never escape the parser; each one is recovered locally as a
/// malformed-record count.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("not an AuditV3 header: {0}")]
    NotAHeader(String),
    #[error("header is missing the timestamp segment")]
    MissingTimestamp,
    #[error("header is missing the operation segment")]
    MissingOperation,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_with_field(name: &str, value: &str) -> Event {
        let mut fields = HashMap::new();
        fields.insert(name.to_string(), AttrValue::Single(value.to_string()));
        Event {
            kind: OperationKind::Search,
            timestamp: None,
            connection_id: None,
            operation_id: None,
            fields,
            result: None,
            duration: None,
            clock_anomaly: false,
        }
    }

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(OperationKind::from_tag("V3 Bind"), OperationKind::Bind);
        assert_eq!(OperationKind::from_tag("V3 Search"), OperationKind::Search);
        assert_eq!(OperationKind::from_tag("search"), OperationKind::Search);
        assert_eq!(OperationKind::from_tag("V3 MODIFYDN"), OperationKind::ModifyDn);
        assert_eq!(OperationKind::from_tag("V3 ModRDN"), OperationKind::ModifyDn);
        assert_eq!(OperationKind::from_tag("V3 ExtOp"), OperationKind::Extended);
        assert_eq!(OperationKind::from_tag("V3 Frobnicate"), OperationKind::Unknown);
        assert_eq!(OperationKind::from_tag(""), OperationKind::Unknown);
    }

    #[test]
    fn test_response_tag() {
        assert!(OperationKind::is_response_tag("V3 Response"));
        assert!(OperationKind::is_response_tag("RESULT"));
        assert!(!OperationKind::is_response_tag("V3 Search"));
    }

    #[test]
    fn test_kind_index_matches_all() {
        for (i, kind) in OperationKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_attr_value_collects_repeats() {
        let mut value = AttrValue::Single("cn".to_string());
        value.push("sn".to_string());
        value.push("mail".to_string());
        assert_eq!(
            value,
            AttrValue::Multi(vec![
                "cn".to_string(),
                "sn".to_string(),
                "mail".to_string()
            ])
        );
        assert_eq!(value.first(), "cn");
        assert_eq!(value.len(), 3);
    }

    #[test]
    fn test_client_strips_port() {
        let event = event_with_field("client", "192.168.1.10:45678");
        assert_eq!(event.client(), Some("192.168.1.10"));
    }

    #[test]
    fn test_client_bracketed_ipv6() {
        let event = event_with_field("client", "[2001:db8::1]:389");
        assert_eq!(event.client(), Some("2001:db8::1"));
    }

    #[test]
    fn test_client_without_port() {
        let event = event_with_field("client", "host.example.com");
        assert_eq!(event.client(), Some("host.example.com"));
    }

    #[test]
    fn test_bind_dn_fallback() {
        let event = event_with_field("dn", "cn=admin,o=example");
        assert_eq!(event.bind_dn(), Some("cn=admin,o=example"));
    }

    #[test]
    fn test_entry_count_parses() {
        let event = event_with_field("nentries", "42");
        assert_eq!(event.entry_count(), Some(42));
        let bad = event_with_field("nentries", "many");
        assert_eq!(bad.entry_count(), None);
    }
}
