use ldap_audit_tools::audit::parser::{EventStream, Parser};
use ldap_audit_tools::audit::types::OperationKind;
use std::io::{BufRead, BufReader, Write};
use tempfile::NamedTempFile;

fn write_sample_log(file: &mut NamedTempFile) {
    // self-contained bind with received timestamp
    writeln!(
        file,
        "AuditV3--2023-05-12-08:30:15.200000+02:00--V3 Bind--bindDN: cn=admin,o=example--client: 10.0.0.1:50311--connectionID: 1--operationID: 0--received: 2023-05-12-08:30:15.000000+02:00--Success"
    )
    .unwrap();
    // search paired with a response record
    writeln!(
        file,
        "AuditV3--2023-05-12-08:30:16.000000+02:00--V3 Search--base: ou=people,o=example--scope: wholeSubtree--filter: (uid=jdoe)--connectionID: 1--operationID: 1"
    )
    .unwrap();
    writeln!(
        file,
        "AuditV3--2023-05-12-08:30:16.150000+02:00--V3 Response--connectionID: 1--operationID: 1--nentries: 1--Success"
    )
    .unwrap();
    // add with continuation lines
    writeln!(
        file,
        "AuditV3--2023-05-12-08:30:17.050000+02:00--V3 Add--dn: cn=new,o=example--connectionID: 1--operationID: 2--received: 2023-05-12-08:30:17.000000+02:00--Success"
    )
    .unwrap();
    writeln!(file, "attributes: objectClass").unwrap();
    writeln!(file, "attributes: cn").unwrap();
    writeln!(
        file,
        "AuditV3--2023-05-12-08:30:18.000000+02:00--V3 Unbind--connectionID: 1--operationID: 3"
    )
    .unwrap();
    file.flush().unwrap();
}

fn read_events(
    path: &std::path::Path,
) -> (
    Vec<ldap_audit_tools::audit::types::Event>,
    ldap_audit_tools::audit::parser::ParserStats,
) {
    let file = std::fs::File::open(path).unwrap();
    let lines = BufReader::new(file).lines().map(Result::unwrap);
    let mut stream = EventStream::new(lines);
    let mut events = Vec::new();
    for event in stream.by_ref() {
        events.push(event);
    }
    let stats = stream.stats().clone();
    (events, stats)
}

#[test]
fn test_parse_sample_log() {
    let mut temp = NamedTempFile::new().unwrap();
    write_sample_log(&mut temp);

    let (events, stats) = read_events(temp.path());

    assert_eq!(events.len(), 4);
    assert_eq!(events[0].kind, OperationKind::Bind);
    assert_eq!(events[0].duration_ms(), Some(200));
    assert_eq!(events[1].kind, OperationKind::Search);
    assert_eq!(events[1].duration_ms(), Some(150));
    assert_eq!(events[1].entry_count(), Some(1));
    assert_eq!(events[2].kind, OperationKind::Add);
    assert_eq!(
        events[2].fields.get("attributes").map(|v| v.len()),
        Some(2)
    );
    assert_eq!(events[3].kind, OperationKind::Unbind);

    assert_eq!(stats.lines_total, 7);
    assert_eq!(stats.records_total, 4);
    assert_eq!(stats.continuation_lines, 2);
    assert_eq!(stats.paired_responses, 1);
    assert_eq!(stats.malformed_records, 0);
    assert_eq!(stats.unterminated_operations, 0);
}

#[test]
fn test_empty_file_yields_no_events() {
    let temp = NamedTempFile::new().unwrap();

    let (events, stats) = read_events(temp.path());

    assert!(events.is_empty());
    assert_eq!(stats.lines_total, 0);
    assert_eq!(stats.records_total, 0);
}

#[test]
fn test_mixed_garbage_keeps_accounting() {
    let mut temp = NamedTempFile::new().unwrap();
    // noise before any record opens counts as its own malformed record
    writeln!(temp, "not a record at all").unwrap();
    writeln!(
        temp,
        "AuditV3--2023-05-12-08:30:15.100000+02:00--V3 Delete--dn: cn=x--connectionID: 2--operationID: 0--received: 2023-05-12-08:30:15.000000+02:00--Success"
    )
    .unwrap();
    writeln!(
        temp,
        "AuditV3--2023-05-12-08:30:16.000000+02:00--V3 Compare--dn: cn=y--connectionID: 2--operationID: 1"
    )
    .unwrap();
    temp.flush().unwrap();

    let (events, stats) = read_events(temp.path());

    // garbage line and the unpaired compare yield no events
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, OperationKind::Delete);
    assert_eq!(stats.malformed_records, 1);
    assert_eq!(stats.unterminated_operations, 1);
    assert_eq!(
        stats.records_total,
        stats.events_emitted + stats.malformed_records + stats.unterminated_operations
    );
}

#[test]
fn test_parser_restart_requires_fresh_instance() {
    let mut first = Parser::new();
    let mut events = Vec::new();
    first.feed_line(
        "AuditV3--2023-05-12-08:30:15.000000+02:00--V3 Search--base: o=a--connectionID: 1--operationID: 1",
        &mut events,
    );
    first.finish(&mut events);
    assert_eq!(first.stats().unterminated_operations, 1);

    // a fresh parser starts from clean counters
    let second = Parser::new();
    assert_eq!(second.stats().lines_total, 0);
    assert_eq!(second.pending_operations(), 0);
}
