//! Config loading through the NVS adapter's simulation backend.

use co2monitor::adapters::nvs::NvsSettings;
use co2monitor::config::{
    Config, KEY_BROKER_HOST, KEY_CRIT_PPM, KEY_PERIOD_MS, KEY_ROOM_NAME, KEY_TOPIC_PREFIX,
    KEY_WARN_PPM, NS_OWNER, NS_SENSORS,
};
use co2monitor::error::ConfigError;
use co2monitor::publisher::{Topic, Topics};

#[test]
fn empty_store_yields_defaults() {
    let nvs = NvsSettings::new().unwrap();
    assert_eq!(Config::load(&nvs).unwrap(), Config::default());
}

#[test]
fn provisioned_values_shape_topics_and_url() {
    let mut nvs = NvsSettings::new().unwrap();
    nvs.set_string(NS_OWNER, KEY_ROOM_NAME, "living room");
    nvs.set_string(NS_SENSORS, KEY_BROKER_HOST, "10.0.0.5");
    nvs.set_string(NS_SENSORS, KEY_TOPIC_PREFIX, "/home/air/");
    nvs.set_string(NS_SENSORS, KEY_PERIOD_MS, "2000");

    let cfg = Config::load(&nvs).unwrap();
    assert_eq!(cfg.broker_url(), "mqtt://10.0.0.5:1883");
    assert_eq!(cfg.sample_period_ms, 2000);
    let topics = Topics::from_config(&cfg);
    assert_eq!(topics.path(Topic::Co2), "home/air/living_room/co2_ppm");
}

#[test]
fn unparsable_value_falls_back_per_key() {
    let mut nvs = NvsSettings::new().unwrap();
    nvs.set_string(NS_SENSORS, KEY_WARN_PPM, "lots");
    nvs.set_string(NS_SENSORS, KEY_CRIT_PPM, "2000");
    let cfg = Config::load(&nvs).unwrap();
    assert_eq!(cfg.warn_threshold_ppm, 800);
    assert_eq!(cfg.crit_threshold_ppm, 2000);
}

#[test]
fn inverted_thresholds_fall_back_to_defaults() {
    let mut nvs = NvsSettings::new().unwrap();
    nvs.set_string(NS_SENSORS, KEY_WARN_PPM, "1500");
    nvs.set_string(NS_SENSORS, KEY_CRIT_PPM, "900");
    let cfg = Config::load(&nvs).unwrap();
    assert_eq!((cfg.warn_threshold_ppm, cfg.crit_threshold_ppm), (800, 1500));
}

#[test]
fn out_of_range_period_keeps_user_thresholds() {
    let mut nvs = NvsSettings::new().unwrap();
    nvs.set_string(NS_SENSORS, KEY_WARN_PPM, "1000");
    nvs.set_string(NS_SENSORS, KEY_CRIT_PPM, "1800");
    nvs.set_string(NS_SENSORS, KEY_PERIOD_MS, "50");
    let cfg = Config::load(&nvs).unwrap();
    assert_eq!((cfg.warn_threshold_ppm, cfg.crit_threshold_ppm), (1000, 1800));
    assert_eq!(cfg.sample_period_ms, Config::default().sample_period_ms);
}

#[test]
fn unreachable_store_is_fatal() {
    let mut nvs = NvsSettings::new().unwrap();
    nvs.sim_set_available(false);
    assert_eq!(Config::load(&nvs), Err(ConfigError::StoreUnavailable));
}
