//! Publisher: bounded outbox, reconnect backoff, link thread lifecycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use co2monitor::adapters::mqtt::{BrokerSettings, MqttBroker, SimBrokerHandle};
use co2monitor::adapters::time::MonotonicClock;
use co2monitor::app::ports::PublishPort;
use co2monitor::config::Config;
use co2monitor::publisher::{Link, PublishOutcome, Publisher, QUEUE_DEPTH, Topic, Topics};
use co2monitor::scheduler::ShutdownToken;

const CO2: &str = "sensors/co2monitor/co2_ppm";

fn rig() -> (Publisher, Link<MqttBroker>, SimBrokerHandle) {
    let cfg = Config::default();
    let publisher = Publisher::new();
    let broker = MqttBroker::new(BrokerSettings::from_config(&cfg));
    let remote = broker.sim_handle();
    let link = publisher.link(broker, Topics::from_config(&cfg));
    (publisher, link, remote)
}

#[test]
fn offline_queue_keeps_newest_per_topic() {
    let (publisher, mut link, remote) = rig();
    remote.set_reachable(false);

    for i in 0..12 {
        let outcome = publisher.publish(Topic::Co2, &i.to_string()).unwrap();
        let expected = if i < QUEUE_DEPTH {
            PublishOutcome::Queued
        } else {
            PublishOutcome::QueuedDroppedOldest
        };
        assert_eq!(outcome, expected);
    }
    publisher.publish(Topic::Humidity, "40.00").unwrap();

    assert_eq!(link.service(0), 0);
    assert_eq!(publisher.pending(Topic::Co2), QUEUE_DEPTH);
    assert_eq!(publisher.stats().dropped, 4);

    remote.set_reachable(true);
    let wait = link.backoff_remaining_ms(0);
    assert_eq!(wait, 1_000);
    assert_eq!(link.service(wait), QUEUE_DEPTH + 1);

    let expected: Vec<String> = (4..12).map(|i: i32| i.to_string()).collect();
    assert_eq!(remote.payloads(CO2), expected);
    assert_eq!(
        remote.payloads("sensors/co2monitor/humidity_pct"),
        ["40.00"]
    );
}

#[test]
fn resume_after_outage_sends_each_payload_once() {
    let (publisher, mut link, remote) = rig();
    for v in ["600", "610", "620"] {
        publisher.publish(Topic::Co2, v).unwrap();
    }
    assert_eq!(link.service(0), 3);
    assert!(link.is_up());

    remote.set_reachable(false);
    publisher.publish(Topic::Co2, "630").unwrap();
    publisher.publish(Topic::Co2, "640").unwrap();
    assert_eq!(link.service(100), 0);
    assert!(!link.is_up());

    remote.set_reachable(true);
    // Still inside the 1 s backoff window.
    assert_eq!(link.service(600), 0);
    assert_eq!(link.service(1_100), 2);

    assert_eq!(remote.payloads(CO2), ["600", "610", "620", "630", "640"]);
    assert_eq!(remote.connects(), 2);
    let s = publisher.stats();
    assert_eq!((s.published, s.dropped, s.pending), (5, 0, 0));
    assert!(s.connected);
}

#[test]
fn backoff_doubles_between_attempts() {
    let (publisher, mut link, remote) = rig();
    remote.set_reachable(false);
    publisher.publish(Topic::Co2, "700").unwrap();

    let mut now = 0;
    let mut waits = Vec::new();
    for _ in 0..4 {
        link.service(now);
        let wait = link.backoff_remaining_ms(now);
        waits.push(wait);
        // Nothing happens until the window closes.
        link.service(now + wait - 1);
        now += wait;
    }
    assert_eq!(waits, [1_000, 2_000, 4_000, 8_000]);
    assert_eq!(publisher.stats().connect_attempts, 4);
}

#[test]
fn rejected_publish_is_requeued_in_order() {
    let (publisher, mut link, remote) = rig();
    link.service(0);
    remote.set_reject(true);
    publisher.publish(Topic::Co2, "800").unwrap();
    publisher.publish(Topic::Co2, "810").unwrap();

    assert_eq!(link.service(10), 0);
    assert_eq!(publisher.pending(Topic::Co2), 2);

    remote.set_reject(false);
    assert_eq!(link.service(20), 2);
    assert_eq!(remote.payloads(CO2), ["800", "810"]);
}

#[test]
fn link_thread_drains_and_stops_on_shutdown() {
    let cfg = Config::default();
    let publisher = Publisher::new();
    let broker = MqttBroker::new(BrokerSettings::from_config(&cfg));
    let remote = broker.sim_handle();
    let shutdown = Arc::new(ShutdownToken::new());
    let handle = publisher
        .spawn(
            broker,
            Topics::from_config(&cfg),
            MonotonicClock::new(),
            shutdown.clone(),
        )
        .unwrap();

    publisher.publish(Topic::Co2, "955").unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while remote.payloads(CO2).is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(remote.payloads(CO2), ["955"]);

    let stopping = Instant::now();
    shutdown.request();
    handle.join().unwrap();
    assert!(stopping.elapsed() < Duration::from_secs(2));
}
