//! End-to-end pipeline tests: scripted sensor → scheduler → router → recording sinks.

mod common;

use common::{RecordingHistory, RecordingTelemetry, ScriptedSensor, assert_float_eq, reading};

use pms_monitor::{
    acquisition::{AirQuality, Channel},
    config::MonitorConfig,
    error::{SensorError, SensorErrorCode},
    scheduler::{PollOutcome, Scheduler},
    sinks::{
        AccessoryInfo, CsvHistory, PropertyId, PropertyState, PropertyStore, SinkKind, SinkRouter,
        TopicMap,
    },
};

struct Rig {
    store: PropertyStore,
    history: RecordingHistory,
    telemetry: RecordingTelemetry,
    scheduler: Scheduler<ScriptedSensor>,
}

fn rig(sensor: ScriptedSensor) -> Rig {
    let store = PropertyStore::new(
        AccessoryInfo::for_host("Test", "host"),
        &PropertyId::exposed(true, true),
    );
    let history = RecordingHistory::default();
    let telemetry = RecordingTelemetry::default();
    let router = SinkRouter::new(Box::new(store.clone()), store.exposed())
        .with_history(Box::new(history.clone()), true)
        .with_telemetry(Box::new(telemetry.clone()), TopicMap::default(), true);
    Rig {
        store,
        history,
        telemetry,
        scheduler: Scheduler::new(sensor, router),
    }
}

fn poll_n(scheduler: &mut Scheduler<ScriptedSensor>, n: usize) -> Vec<PollOutcome> {
    (0..n).map(|_| scheduler.poll_once()).collect()
}

#[test]
fn thirty_clean_polls_emit_one_good_pm25_update() {
    let mut rig = rig(ScriptedSensor::new().repeat(reading(20, 30, 500), 30));
    let outcomes = poll_n(&mut rig.scheduler, 30);

    let pm25: Vec<_> = outcomes
        .into_iter()
        .flat_map(|o| match o {
            PollOutcome::Read(updates) => updates,
            PollOutcome::Failed(e) => panic!("unexpected failure: {}", e),
        })
        .filter(|u| u.channel == Channel::Pm25)
        .collect();
    assert_eq!(pm25.len(), 1);
    assert_float_eq(pm25[0].value, 20.0, 1e-9);
    assert_eq!(pm25[0].category, Some(AirQuality::Good));

    assert_eq!(rig.store.value(PropertyId::Pm25Density), Some(20.0));
    assert_eq!(
        rig.store.value(PropertyId::AirQuality),
        Some(f64::from(AirQuality::Good.ordinal()))
    );
    assert_eq!(rig.store.value(PropertyId::Pm10Density), Some(30.0));
    assert_float_eq(rig.store.value(PropertyId::HumidityTile).unwrap(), 5.0, 1e-9);

    let entries = rig.history.entries.lock();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().any(|e| e.ppm == Some(470.0)));
    assert!(entries.iter().any(|e| e.temp == Some(30.0)));
    assert!(entries
        .iter()
        .any(|e| e.humidity.is_some_and(|h| (h - 5.0).abs() < 1e-9)));

    assert_eq!(rig.telemetry.payload_for("PMS7003/PM2.5").as_deref(), Some("20"));
    assert_eq!(rig.telemetry.payload_for("PMS7003/PM10").as_deref(), Some("30"));
    assert_eq!(rig.telemetry.payload_for("PMS7003/0.3").as_deref(), Some("500"));
}

#[test]
fn out_of_range_pm25_never_reaches_window() {
    let mut rig = rig(ScriptedSensor::new().repeat(reading(1500, 10, 0), 30));
    let outcomes = poll_n(&mut rig.scheduler, 30);

    assert!(outcomes.iter().all(|o| match o {
        PollOutcome::Read(updates) => updates.iter().all(|u| u.channel != Channel::Pm25),
        PollOutcome::Failed(_) => false,
    }));
    let window = rig.scheduler.aggregator().window(Channel::Pm25);
    assert!(window.is_empty());
    assert_eq!(window.pending(), 0);
    assert_eq!(rig.scheduler.aggregator().current(Channel::Pm25), None);
    assert_eq!(rig.scheduler.stats().rejected_samples, 30);
    assert_eq!(
        rig.store.get(PropertyId::Pm25Density),
        Some(PropertyState::Pending)
    );
    // PM10 was fine and still completed its cycle.
    assert_eq!(rig.store.value(PropertyId::Pm10Density), Some(10.0));
}

#[test]
fn read_failure_marks_all_properties_and_skips_outputs() {
    let err = SensorError::new(SensorErrorCode::Checksum, "frame checksum mismatch");
    let mut rig = rig(ScriptedSensor::new().then(Err(err.clone())));

    assert_eq!(rig.scheduler.poll_once(), PollOutcome::Failed(err));
    for (id, state) in rig.store.snapshot() {
        assert_eq!(
            state,
            PropertyState::Unavailable("frame checksum mismatch".to_string()),
            "{} not marked unavailable",
            id
        );
    }
    assert!(rig.history.entries.lock().is_empty());
    assert!(rig.telemetry.published.lock().is_empty());
    assert!(rig.scheduler.aggregator().window(Channel::Pm25).is_empty());
}

#[test]
fn telemetry_toggle_resumes_publishing() {
    let mut rig = rig(ScriptedSensor::new().repeat(reading(10, 10, 0), 60));

    assert!(rig.scheduler.router_mut().set_enabled(SinkKind::Telemetry, false));
    poll_n(&mut rig.scheduler, 30);
    assert!(rig.telemetry.published.lock().is_empty());
    assert_eq!(rig.history.entries.lock().len(), 3);

    assert!(rig.scheduler.router_mut().set_enabled(SinkKind::Telemetry, true));
    poll_n(&mut rig.scheduler, 30);
    let topics = rig.telemetry.topics();
    assert!(topics.contains(&"PMS7003/PM2.5".to_string()));
    // Second round boundary also flushes the raw secondary channels.
    assert!(topics.contains(&"PMS7003/PM1.0 Standard".to_string()));
}

#[test]
fn failing_telemetry_does_not_block_history_or_properties() {
    let mut rig = rig(ScriptedSensor::new().repeat(reading(50, 50, 0), 30));
    *rig.telemetry.fail.lock() = true;

    poll_n(&mut rig.scheduler, 30);
    assert_eq!(rig.store.value(PropertyId::Pm25Density), Some(50.0));
    assert_eq!(rig.history.entries.lock().len(), 3);

    let stats = rig.scheduler.stats();
    assert_eq!(stats.telemetry.delivered, 0);
    assert!(stats.telemetry.failed >= 3);
    assert_eq!(stats.history.delivered, 3);
}

#[test]
fn disconnected_broker_skips_without_failing() {
    let mut rig = rig(ScriptedSensor::new().repeat(reading(5, 5, 5), 30));
    *rig.telemetry.connected.lock() = false;

    poll_n(&mut rig.scheduler, 30);
    let stats = rig.scheduler.stats();
    assert_eq!(stats.telemetry.failed, 0);
    assert!(stats.telemetry.skipped >= 3);
    assert!(rig.telemetry.published.lock().is_empty());
}

#[test]
fn recovery_after_failure_completes_pm10_cycle() {
    let sensor = ScriptedSensor::new()
        .then(Err(SensorError::timeout(1000)))
        .repeat(reading(0, 50, 0), 30);
    let mut rig = rig(sensor);

    poll_n(&mut rig.scheduler, 31);
    assert_eq!(rig.store.value(PropertyId::Pm10Density), Some(50.0));
    assert_eq!(rig.store.value(PropertyId::TemperatureTile), Some(50.0));
    let stats = rig.scheduler.stats();
    assert_eq!(stats.polls, 31);
    assert_eq!(stats.read_failures, 1);
}

#[test]
fn history_enabled_in_config_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    let config = MonitorConfig {
        name: "Living Room".to_string(),
        enable_history: true,
        history_storage_path: Some(dir.path().to_path_buf()),
        ..MonitorConfig::default()
    };
    let store = PropertyStore::new(
        AccessoryInfo::for_host(&config.name, "host"),
        &PropertyId::exposed(config.show_temperature_tile, config.show_humidity_tile),
    );
    let router = SinkRouter::from_config(&config, Box::new(store.clone()), "host-pms");
    assert!(router.is_active(SinkKind::History));
    assert!(!router.is_active(SinkKind::Telemetry));

    let sensor = ScriptedSensor::new().repeat(reading(12, 0, 0), 30);
    let mut scheduler = Scheduler::from_config(sensor, router, &config);
    poll_n(&mut scheduler, 30);

    let content = std::fs::read_to_string(dir.path().join("living_room_history.csv")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "time,ppm,temp,humidity");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].ends_with(",462.0,,"));
}

#[test]
fn reopened_history_appends_without_second_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pms_history.csv");
    for _ in 0..2 {
        let history = CsvHistory::open_path(path.clone()).unwrap();
        let store = PropertyStore::new(AccessoryInfo::for_host("T", "h"), &PropertyId::exposed(false, false));
        let router = SinkRouter::new(Box::new(store.clone()), store.exposed())
            .with_history(Box::new(history), true);
        let mut scheduler = Scheduler::new(ScriptedSensor::new().repeat(reading(1, 0, 0), 30), router);
        poll_n(&mut scheduler, 30);
    }

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.matches("time,ppm,temp,humidity").count(), 1);
    assert_eq!(content.lines().count(), 1 + 2 * 3);
}
