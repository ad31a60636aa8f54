//! End-to-end flushes against a mock collector.

use rstest::rstest;
use serde_json::{Value, json};
use splunkhec_rs::test_utils::MockCollector;
use splunkhec_rs::{DeliveryError, EventUnit, FlushSummary, HecForwarder, WriteError};

const OK: (u16, &str) = (200, r#"{"text":"Success","code":0}"#);

fn units(n: usize) -> Vec<EventUnit> {
    (0..n)
        .map(|i| {
            EventUnit::new(
                "app.log",
                1_000 + i as i64,
                json!({"message": format!("line {i}")}),
            )
        })
        .collect()
}

fn parse_lines(body: &str) -> Vec<Value> {
    body.lines()
        .map(|line| serde_json::from_str(line).expect("envelope is valid JSON"))
        .collect()
}

#[rstest]
fn batched_flush_issues_a_single_request() {
    let collector = MockCollector::start(vec![OK]);
    let config = collector
        .config()
        .with_send_batched_events(true)
        .build()
        .expect("config");
    let forwarder = HecForwarder::new(&config).expect("forwarder");

    let summary = forwarder.write(&units(3)).expect("flush");
    assert_eq!(summary, FlushSummary { events: 3, requests: 1 });

    let requests = collector.received();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/services/collector/event");
    assert_eq!(
        request.header("authorization"),
        Some("Splunk 00000000-0000-0000-0000-000000000000")
    );
    let envelopes = parse_lines(&request.body);
    let events: Vec<&str> = envelopes
        .iter()
        .map(|e| e["event"].as_str().expect("string event"))
        .collect();
    assert_eq!(
        events,
        [
            r#"{"message":"line 0"}"#,
            r#"{"message":"line 1"}"#,
            r#"{"message":"line 2"}"#
        ]
    );
    assert!(envelopes.iter().all(|e| e["host"] == "some_host"));
}

#[rstest]
fn unbatched_flush_issues_one_request_per_event_in_order() {
    let collector = MockCollector::start(vec![OK, OK, OK]);
    let config = collector.config().build().expect("config");
    let forwarder = HecForwarder::new(&config).expect("forwarder");

    let summary = forwarder.write(&units(3)).expect("flush");
    assert_eq!(summary, FlushSummary { events: 3, requests: 3 });

    let times: Vec<Value> = collector
        .received()
        .iter()
        .map(|r| parse_lines(&r.body).remove(0)["time"].clone())
        .collect();
    assert_eq!(times, [json!(1_000), json!(1_001), json!(1_002)]);
}

#[rstest]
fn unbatched_flush_stops_at_first_rejection() {
    let collector = MockCollector::start(vec![OK, (403, r#"{"text":"Token disabled","code":1}"#)]);
    let config = collector.config().build().expect("config");
    let forwarder = HecForwarder::new(&config).expect("forwarder");

    let err = forwarder.write(&units(3)).expect_err("flush fails");
    match err {
        WriteError::Delivery(DeliveryError::Rejected {
            message,
            status_code,
            http_status,
            ..
        }) => {
            assert_eq!(message, "Token disabled");
            assert_eq!(status_code, Some(1));
            assert_eq!(http_status, 403);
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert_eq!(collector.received().len(), 2);
}

#[rstest]
fn empty_batched_flush_sends_nothing() {
    let collector = MockCollector::start(vec![OK]);
    let config = collector
        .config()
        .with_send_batched_events(true)
        .build()
        .expect("config");
    let forwarder = HecForwarder::new(&config).expect("forwarder");

    let summary = forwarder.write(&units(0)).expect("flush");
    assert_eq!(summary, FlushSummary::default());
    assert!(collector.received().is_empty());
}

#[rstest]
fn chunk_with_raw_bytes_is_delivered_as_text() {
    let collector = MockCollector::start(vec![OK]);
    let config = collector
        .config()
        .with_send_event_as_json(true)
        .with_sourcetype("log")
        .build()
        .expect("config");
    let forwarder = HecForwarder::new(&config).expect("forwarder");

    // ["test", 1, {"message": bin8 "\xC2\xA92017"}]
    let mut chunk = vec![0x93, 0xA4, b't', b'e', b's', b't', 0x01, 0x81, 0xA7];
    chunk.extend_from_slice(b"message");
    chunk.extend_from_slice(&[0xC4, 0x06, 0xC2, 0xA9, b'2', b'0', b'1', b'7']);

    forwarder.write_chunk(&chunk).expect("flush");

    let requests = collector.received();
    let envelope = &parse_lines(&requests[0].body)[0];
    assert_eq!(envelope["event"], json!({"message": "©2017"}));
    assert_eq!(envelope["sourcetype"], "log");
}

#[rstest]
fn dynamic_index_reaches_the_wire() {
    let collector = MockCollector::start(vec![OK]);
    let config = collector
        .config()
        .with_dynamic_index(true)
        .with_dynamic_index_pattern("prefix_${source}_${record['kubernetes']['pod_name']}")
        .build()
        .expect("config");
    let forwarder = HecForwarder::new(&config).expect("forwarder");

    let unit = EventUnit::new(
        "kube",
        1,
        json!({"message": "data", "kubernetes": {"pod_name": "mypod"}}),
    );
    forwarder.write([&unit]).expect("flush");

    let requests = collector.received();
    assert_eq!(parse_lines(&requests[0].body)[0]["index"], "prefix_fluentd_mypod");
}
