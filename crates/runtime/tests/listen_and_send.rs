//! Synapse behaviour against the in-memory broker.
//!
//! Covers topic resolution, option merging, stop semantics, error isolation
//! in the poll loop, the send path and reloads.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use synapse_runtime::{
    handler_fn, ClientError, Context, Event, ForwardHandler, LogHandler, MemoryBroker, State,
    Synapse, SynapseError,
};
use tempfile::TempDir;

const SETTINGS: &str = r#"{
    "kafka": {
        "connection": {"bootstrap.servers": "localhost:9092", "client.id": "base"},
        "consumer": {"group.id": "g", "client.id": "consumer-side"},
        "topics": {"in": "topic-in", "out": "topic-out"}
    },
    "synapse": {"poll_timeout_ms": 5}
}"#;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("synapse_runtime=debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn write_settings(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("settings.json");
    std::fs::write(&path, contents).unwrap();
    path
}

fn build<H: synapse_runtime::EventHandler>(
    path: &std::path::Path,
    broker: &MemoryBroker,
    handler: H,
) -> Synapse<H> {
    Synapse::with_clients(
        path,
        handler,
        Arc::new(broker.clone()),
        Arc::new(broker.clone()),
    )
    .unwrap()
}

/// Records every payload and stops after `limit` events.
fn recording_handler(
    seen: Arc<Mutex<Vec<Vec<u8>>>>,
    limit: usize,
) -> impl synapse_runtime::EventHandler {
    handler_fn(move |event: &Event, ctx: &Context<'_>| {
        let mut seen = seen.lock().unwrap();
        seen.push(event.payload.clone());
        if seen.len() >= limit {
            ctx.stop();
        }
        Ok(())
    })
}

#[test]
fn test_listen_subscribes_to_physical_topic_with_merged_options() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, SETTINGS);
    let broker = MemoryBroker::new();
    broker.publish("topic-in", "one");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let synapse = build(&path, &broker, recording_handler(Arc::clone(&seen), 1));
    synapse.listen("in").unwrap();

    assert_eq!(broker.subscriptions(), vec!["topic-in".to_string()]);
    let options = &broker.consumer_options()[0];
    assert_eq!(options["client.id"], "consumer-side");
    assert_eq!(options["group.id"], "g");
    assert_eq!(options["bootstrap.servers"], "localhost:9092");
    assert_eq!(*seen.lock().unwrap(), vec![b"one".to_vec()]);
    assert_eq!(broker.consumers_closed(), 1);
}

#[test]
fn test_stop_before_first_poll_closes_without_consuming() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, SETTINGS);
    let broker = MemoryBroker::new();
    broker.publish("topic-in", "never handled");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let synapse = build(&path, &broker, recording_handler(Arc::clone(&seen), 1));
    synapse.stop();
    synapse.listen("in").unwrap();

    assert_eq!(broker.consumers_created(), 1);
    assert_eq!(broker.consumers_closed(), 1);
    assert_eq!(broker.polls(), 0);
    assert_eq!(broker.pending("topic-in"), 1);
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(synapse.state(), State::Stopped);
}

#[test]
fn test_error_records_are_skipped_and_events_delivered_in_order() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, SETTINGS);
    let broker = MemoryBroker::new();
    broker.publish("topic-in", "a");
    broker.inject_poll_error("topic-in", "Broker: Leader not available");
    broker.publish("topic-in", "b");
    broker.inject_poll_error("topic-in", "Broker: Unknown partition");
    broker.publish("topic-in", "c");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let synapse = build(&path, &broker, recording_handler(Arc::clone(&seen), 3));
    synapse.listen("in").unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
    );
    assert_eq!(broker.pending("topic-in"), 0);
}

#[test]
fn test_stop_from_another_thread_ends_idle_loop() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, SETTINGS);
    let broker = MemoryBroker::new();

    let synapse = Arc::new(build(&path, &broker, LogHandler));
    let listener = {
        let synapse = Arc::clone(&synapse);
        thread::spawn(move || synapse.listen("in"))
    };

    while synapse.state() != State::Listening {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(matches!(
        synapse.listen("in"),
        Err(SynapseError::AlreadyListening)
    ));

    synapse.stop_handle().stop();
    listener.join().unwrap().unwrap();

    assert_eq!(synapse.state(), State::Stopped);
    assert_eq!(broker.consumers_closed(), 1);
}

#[test]
fn test_send_resolves_logical_topic() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = write_settings(
        &dir,
        r#"{"kafka":{"connection":{},"consumer":{"group.id":"g"},"topics":{"in":"topic-in","out":"topic-out"}}}"#,
    );
    let broker = MemoryBroker::new();
    let synapse = build(&path, &broker, LogHandler);

    synapse.send("out", b"hello").unwrap();

    let produced = broker.produced();
    assert_eq!(produced.len(), 1);
    assert_eq!(produced[0].topic, "topic-out");
    assert_eq!(produced[0].payload, b"hello");
    // Producers only get the connection options.
    assert!(broker.producer_options()[0].is_empty());
}

#[test]
fn test_send_creates_a_producer_per_call() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, SETTINGS);
    let broker = MemoryBroker::new();
    let synapse = build(&path, &broker, LogHandler);

    synapse.send("out", b"1").unwrap();
    synapse.send("out", b"2").unwrap();

    assert_eq!(broker.producers_created(), 2);
    assert_eq!(broker.producer_options()[0]["client.id"], "base");
    assert!(!broker.producer_options()[0].contains_key("group.id"));
}

#[test]
fn test_send_flush_is_unbounded_by_default() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, SETTINGS);
    let broker = MemoryBroker::new();
    let synapse = build(&path, &broker, LogHandler);

    synapse.send("out", b"1").unwrap();

    std::fs::write(
        &path,
        r#"{"kafka":{"connection":{},"topics":{"out":"topic-out"}},"synapse":{"flush_timeout_ms":250}}"#,
    )
    .unwrap();
    synapse.reload().unwrap();
    synapse.send("out", b"2").unwrap();

    assert_eq!(
        broker.flush_timeouts(),
        vec![None, Some(Duration::from_millis(250))]
    );
}

#[test]
fn test_send_to_unknown_topic_never_creates_a_producer() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, SETTINGS);
    let broker = MemoryBroker::new();
    let synapse = build(&path, &broker, LogHandler);

    let result = synapse.send("missing", b"x");

    assert!(matches!(result, Err(SynapseError::Config(_))));
    assert_eq!(broker.producers_created(), 0);
    assert!(broker.produced().is_empty());
}

#[test]
fn test_send_failures_are_propagated() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, SETTINGS);
    let broker = MemoryBroker::new();
    let synapse = build(&path, &broker, LogHandler);

    broker.fail_next_produce(ClientError::QueueFull);
    match synapse.send("out", b"x") {
        Err(SynapseError::QueueFull { topic }) => assert_eq!(topic, "topic-out"),
        other => panic!("expected QueueFull, got {other:?}"),
    }

    broker.fail_next_produce(ClientError::Broker("Broker: Topic authorization failed".into()));
    assert!(matches!(
        synapse.send("out", b"x"),
        Err(SynapseError::Broker { .. })
    ));

    broker.fail_next_delivery("Local: Message timed out");
    match synapse.send("out", b"x") {
        Err(SynapseError::Broker { topic, message }) => {
            assert_eq!(topic, "topic-out");
            assert!(message.contains("timed out"));
        }
        other => panic!("expected Broker, got {other:?}"),
    }

    assert!(broker.produced().is_empty());
}

#[test]
fn test_reload_changes_next_listen_subscription() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let settings = |topic: &str| {
        format!(
            r#"{{"kafka":{{"connection":{{}},"consumer":{{"group.id":"g"}},"topics":{{"in":"{topic}"}}}},"synapse":{{"poll_timeout_ms":5}}}}"#
        )
    };
    let path = write_settings(&dir, &settings("a"));
    let broker = MemoryBroker::new();
    let synapse = build(&path, &broker, LogHandler);

    std::fs::write(&path, settings("b")).unwrap();
    synapse.reload().unwrap();
    assert_eq!(synapse.settings().physical_topic("in").unwrap(), "b");

    synapse.stop();
    synapse.listen("in").unwrap();
    assert_eq!(broker.subscriptions(), vec!["b".to_string()]);
}

#[test]
fn test_forward_handler_relays_to_output_topic() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, SETTINGS);
    let broker = MemoryBroker::new();
    broker.publish("topic-in", "first");
    broker.publish("topic-in", "second");

    let synapse = Arc::new(build(&path, &broker, ForwardHandler::new("out")));
    let listener = {
        let synapse = Arc::clone(&synapse);
        thread::spawn(move || synapse.listen("in"))
    };

    while broker.produced().len() < 2 {
        thread::sleep(Duration::from_millis(1));
    }
    synapse.stop();
    listener.join().unwrap().unwrap();

    let produced = broker.produced();
    assert_eq!(produced[0].topic, "topic-out");
    assert_eq!(produced[0].payload, b"first");
    assert_eq!(produced[1].payload, b"second");
    assert_eq!(broker.pending("topic-out"), 2);
}
