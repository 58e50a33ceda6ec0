//! Scheduler driving MonitorService until shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use co2monitor::adapters::mqtt::{BrokerSettings, MqttBroker};
use co2monitor::adapters::time::MonotonicClock;
use co2monitor::alert::AlertLevel;
use co2monitor::app::ports::TickDelegate;
use co2monitor::app::service::MonitorService;
use co2monitor::config::Config;
use co2monitor::publisher::{Publisher, Topics};
use co2monitor::scheduler::{Scheduler, ShutdownToken};

use crate::mock_hw::{MockDisplay, MockEventSink, MockPublisher, MockSensors};

struct Loop {
    svc: MonitorService,
    sensors: MockSensors,
    display: MockDisplay,
    publisher: MockPublisher,
    sink: MockEventSink,
    stop_after: u64,
    shutdown: Arc<ShutdownToken>,
    stamps: Vec<u64>,
}

impl TickDelegate for Loop {
    fn on_tick(&mut self, tick: u64, now_ms: u64) {
        self.stamps.push(now_ms);
        self.svc.tick(
            now_ms,
            &mut self.sensors,
            &mut self.display,
            &self.publisher,
            &mut self.sink,
        );
        if tick == self.stop_after {
            self.shutdown.request();
        }
    }
}

fn rig(stop_after: u64) -> Loop {
    Loop {
        svc: MonitorService::new(&Config::default()),
        sensors: MockSensors::new(),
        display: MockDisplay::new(),
        publisher: MockPublisher::new(),
        sink: MockEventSink::new(),
        stop_after,
        shutdown: Arc::new(ShutdownToken::new()),
        stamps: Vec::new(),
    }
}

#[test]
fn runs_ticks_at_period_until_shutdown() {
    let mut l = rig(4);
    for ppm in [640, 900, 1700, 1700] {
        l.sensors.push_co2(ppm);
    }
    let shutdown = l.shutdown.clone();
    let summary = Scheduler::new(20).run(&MonotonicClock::new(), &shutdown, &mut l);

    assert_eq!(summary.ticks, 4);
    assert_eq!(l.svc.tick_count(), 4);
    assert_eq!(l.svc.level(), AlertLevel::Critical);
    // Deadlines are on a 20 ms grid from the first tick.
    for pair in l.stamps.windows(2) {
        assert!(pair[1] - pair[0] >= 19, "ticks too close: {:?}", l.stamps);
    }
}

#[test]
fn shutdown_requested_before_start_runs_no_tick() {
    let mut l = rig(u64::MAX);
    l.shutdown.request();
    let shutdown = l.shutdown.clone();
    let summary = Scheduler::new(20).run(&MonotonicClock::new(), &shutdown, &mut l);
    assert_eq!(summary.ticks, 0);
    assert_eq!(l.svc.tick_count(), 0);
}

#[test]
fn remote_shutdown_interrupts_long_period() {
    let mut l = rig(u64::MAX);
    let shutdown = l.shutdown.clone();
    let remote = shutdown.clone();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        remote.request();
    });
    let started = Instant::now();
    let summary = Scheduler::new(60_000).run(&MonotonicClock::new(), &shutdown, &mut l);
    stopper.join().unwrap();

    assert_eq!(summary.ticks, 1);
    assert!(started.elapsed() < Duration::from_secs(2));
}

/// User + system CPU ticks spent by the calling thread, where procfs has it.
fn thread_cpu_ticks() -> Option<u64> {
    let stat = std::fs::read_to_string("/proc/thread-self/stat").ok()?;
    let fields: Vec<&str> = stat.rsplit_once(')')?.1.split_whitespace().collect();
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}

#[test]
fn loop_and_link_thread_idle_between_ticks() {
    let cfg = Config::default();
    let mut l = rig(u64::MAX);
    let shutdown = l.shutdown.clone();

    let publisher = Publisher::new();
    let broker = MqttBroker::new(BrokerSettings::from_config(&cfg));
    let remote = broker.sim_handle();
    let link = publisher
        .spawn(
            broker,
            Topics::from_config(&cfg),
            MonotonicClock::new(),
            shutdown.clone(),
        )
        .unwrap();

    let stopper = {
        let remote_stop = shutdown.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(1_000));
            remote_stop.request();
        })
    };

    let before = thread_cpu_ticks();
    let summary = Scheduler::new(60_000).run(&MonotonicClock::new(), &shutdown, &mut l);
    let after = thread_cpu_ticks();
    stopper.join().unwrap();
    link.join().unwrap();

    assert_eq!(summary.ticks, 1);
    assert!(remote.connects() >= 1);
    if let (Some(before), Some(after)) = (before, after) {
        // A second of waiting should cost a few ticks at most, not the
        // whole second (100 ticks at the usual 100 Hz).
        assert!(after - before < 30, "loop thread burned {} ticks idle", after - before);
    }
}
