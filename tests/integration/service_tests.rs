//! MonitorService pipeline: sample → history → alert → display → publish.

use co2monitor::adapters::mqtt::{BrokerSettings, MqttBroker};
use co2monitor::alert::AlertLevel;
use co2monitor::app::events::{AppEvent, SensorKind};
use co2monitor::app::service::MonitorService;
use co2monitor::config::Config;
use co2monitor::error::SensorError;
use co2monitor::publisher::{Publisher, Topic, Topics};
use co2monitor::sensors::climate::ClimateProbe;
use co2monitor::sensors::mhz19::Mhz19;
use co2monitor::sensors::{ClimateSample, SensorHub};

use crate::mock_hw::{DrawCall, MockDisplay, MockEventSink, MockPublisher, MockSensors};

const ROOM: ClimateSample = ClimateSample {
    temperature_c: 21.5,
    pressure_hpa: 1008.25,
    humidity_pct: 43.0,
};

struct Rig {
    svc: MonitorService,
    sensors: MockSensors,
    display: MockDisplay,
    publisher: MockPublisher,
    sink: MockEventSink,
    now: u64,
}

impl Rig {
    fn new(cfg: &Config) -> Self {
        let mut sink = MockEventSink::new();
        let mut svc = MonitorService::new(cfg);
        svc.start(&mut sink);
        Self {
            svc,
            sensors: MockSensors::new(),
            display: MockDisplay::new(),
            publisher: MockPublisher::new(),
            sink,
            now: 0,
        }
    }

    fn tick(&mut self) -> AlertLevel {
        self.now += 1000;
        self.svc
            .tick(
                self.now,
                &mut self.sensors,
                &mut self.display,
                &self.publisher,
                &mut self.sink,
            )
            .level
    }
}

#[test]
fn start_emits_started_event() {
    let rig = Rig::new(&Config::default());
    assert_eq!(rig.sink.events[0], AppEvent::Started(AlertLevel::Normal));
}

#[test]
fn threshold_scenario_walks_levels() {
    let mut rig = Rig::new(&Config::default());
    for ppm in [700, 850, 1600, 1400, 750] {
        rig.sensors.push_co2(ppm);
    }
    let levels: Vec<_> = (0..5).map(|_| rig.tick()).collect();
    assert_eq!(
        levels,
        [
            AlertLevel::Normal,
            AlertLevel::Warning,
            AlertLevel::Critical,
            AlertLevel::Warning,
            AlertLevel::Normal,
        ]
    );
    assert_eq!(
        rig.sink.alert_changes(),
        [
            (AlertLevel::Normal, AlertLevel::Warning),
            (AlertLevel::Warning, AlertLevel::Critical),
            (AlertLevel::Critical, AlertLevel::Warning),
            (AlertLevel::Warning, AlertLevel::Normal),
        ]
    );

    let alerts = rig.publisher.payloads(Topic::Alert);
    assert_eq!(alerts.len(), 4);
    assert_eq!(
        alerts[1],
        r#"{"from":"warning","to":"critical","value":1600.0,"timestamp_ms":3000}"#
    );
    assert_eq!(
        rig.publisher.payloads(Topic::Co2),
        ["700", "850", "1600", "1400", "750"]
    );
}

#[test]
fn sensor_outage_holds_warning() {
    let mut rig = Rig::new(&Config::default());
    rig.sensors.push_co2(900);
    assert_eq!(rig.tick(), AlertLevel::Warning);

    for _ in 0..5 {
        rig.sensors.push_failure();
        assert_eq!(rig.tick(), AlertLevel::Warning);
    }

    assert_eq!(rig.sink.alert_changes().len(), 1);
    assert_eq!(rig.sink.unavailable(SensorKind::Co2), [1, 2, 3, 4, 5]);
    // Only the one good tick produced a CO2 payload.
    assert_eq!(rig.publisher.payloads(Topic::Co2), ["900"]);
    // Stat keeps showing the last value.
    assert_eq!(
        rig.display.last_co2(),
        Some((Some(900), AlertLevel::Warning))
    );
}

#[test]
fn unchanged_frame_is_not_flushed() {
    let mut rig = Rig::new(&Config::default());
    rig.sensors.push_co2(640);
    rig.tick();
    let flushes = rig.display.flushes();
    rig.sensors.push_failure();
    rig.tick();
    assert_eq!(rig.display.flushes(), flushes);
}

#[test]
fn graph_gets_decimated_raw_history() {
    let cfg = Config {
        history_every_n_ticks: 2,
        ..Config::default()
    };
    let mut rig = Rig::new(&cfg);
    for ppm in [500, 510, 520, 530, 540] {
        rig.sensors.push_co2(ppm);
    }
    for _ in 0..5 {
        rig.tick();
    }
    assert_eq!(rig.svc.history().snapshot().as_slice(), &[500, 520, 540]);
    let last_graph = rig.display.calls.iter().rev().find_map(|c| match c {
        DrawCall::History(v, _) => Some(v.clone()),
        _ => None,
    });
    assert_eq!(last_graph, Some(vec![500, 520, 540]));
}

#[test]
fn climate_failure_still_publishes_co2() {
    let mut co2 = Mhz19::new();
    co2.sim_push_ppm(655);
    let mut climate = ClimateProbe::new();
    climate.sim_push_error(SensorError::Bus);
    let mut hub = SensorHub::new(co2, climate);

    let mut svc = MonitorService::new(&Config::default());
    let mut display = MockDisplay::new();
    let publisher = MockPublisher::new();
    let mut sink = MockEventSink::new();
    let report = svc.tick(10, &mut hub, &mut display, &publisher, &mut sink);

    assert_eq!(report.reading.co2_ppm, Some(655));
    assert_eq!(report.reading.temperature_c, None);
    assert_eq!(publisher.payloads(Topic::Co2), ["655"]);
    assert!(publisher.payloads(Topic::Temperature).is_empty());
    assert_eq!(sink.unavailable(SensorKind::Climate), [1]);
}

#[test]
fn co2_failure_reopens_transport_and_still_publishes_climate() {
    let mut co2 = Mhz19::new();
    co2.sim_push_silence();
    let mut climate = ClimateProbe::new();
    climate.sim_push(ROOM);
    let mut hub = SensorHub::new(co2, climate);

    let mut svc = MonitorService::new(&Config::default());
    let publisher = MockPublisher::new();
    svc.tick(
        10,
        &mut hub,
        &mut MockDisplay::new(),
        &publisher,
        &mut MockEventSink::new(),
    );

    assert_eq!(hub.co2_sensor_mut().sim_reinit_count(), 1);
    assert!(publisher.payloads(Topic::Co2).is_empty());
    assert_eq!(publisher.payloads(Topic::Temperature), ["21.50"]);
    assert_eq!(publisher.payloads(Topic::Pressure), ["1008.25"]);
    assert_eq!(publisher.payloads(Topic::Humidity), ["43.00"]);
}

#[test]
fn full_pipeline_reaches_broker() {
    let cfg = Config {
        room_name: "office".into(),
        ..Config::default()
    };
    let mut co2 = Mhz19::new();
    for ppm in [600, 620, 640, 660] {
        co2.sim_push_ppm(ppm);
    }
    let mut climate = ClimateProbe::new();
    climate.sim_push(ROOM);
    let mut hub = SensorHub::new(co2, climate);

    let publisher = Publisher::new();
    let broker = MqttBroker::new(BrokerSettings::from_config(&cfg));
    let remote = broker.sim_handle();
    let mut link = publisher.link(broker, Topics::from_config(&cfg));

    let mut svc = MonitorService::new(&cfg);
    let mut display = MockDisplay::new();
    let mut sink = MockEventSink::new();
    for t in 0..4 {
        svc.tick(t * 1000, &mut hub, &mut display, &publisher, &mut sink);
    }
    link.service(4000);

    assert_eq!(
        remote.payloads("sensors/office/co2_ppm"),
        ["600", "620", "640", "660"]
    );
    // Probe repeats its last sample when nothing new is scripted.
    assert_eq!(remote.payloads("sensors/office/temperature_c").len(), 4);
    assert!(remote.payloads("sensors/office/co2_alert").is_empty());
    assert_eq!(publisher.stats().pending, 0);

    let telem = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Telemetry { co2_smoothed, .. } => *co2_smoothed,
            _ => None,
        })
        .last();
    assert_eq!(telem, Some(630.0));
}

#[test]
fn climate_probe_missing_at_boot_does_not_stop_monitoring() {
    let mut co2 = Mhz19::new();
    for ppm in [700, 710, 720] {
        co2.sim_push_ppm(ppm);
    }
    let mut climate = ClimateProbe::new();
    climate.sim_set_present(false);
    climate.sim_push(ROOM);
    let mut hub = SensorHub::new(co2, climate);

    let mut svc = MonitorService::new(&Config::default());
    let mut display = MockDisplay::new();
    let publisher = MockPublisher::new();
    let mut sink = MockEventSink::new();

    svc.tick(0, &mut hub, &mut display, &publisher, &mut sink);
    hub.climate_sensor_mut().sim_set_present(true);
    svc.tick(1000, &mut hub, &mut display, &publisher, &mut sink);
    svc.tick(2000, &mut hub, &mut display, &publisher, &mut sink);

    assert_eq!(publisher.payloads(Topic::Co2), ["700", "710", "720"]);
    assert_eq!(sink.unavailable(SensorKind::Climate), [1, 2]);
    assert_eq!(publisher.payloads(Topic::Temperature), ["21.50"]);
}
