//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements    | Connects to                    |
//! |------------|---------------|--------------------------------|
//! | `display`  | DisplayPort   | Serial log (panel stand-in)    |
//! | `log_sink` | EventSink     | Serial log output              |
//! | `mqtt`     | BrokerPort    | ESP-IDF MQTT / in-memory sim   |
//! | `nvs`      | SettingsPort  | NVS / in-memory store          |
//! | `time`     | Clock         | ESP32 system timer             |
//! | `wifi`     | -             | ESP-IDF WiFi STA               |
//!
//! The sensor adapters live in [`crate::sensors`] next to their codecs.

pub mod display;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub mod wifi;
