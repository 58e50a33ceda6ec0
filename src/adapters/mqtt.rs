//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`] for the publisher's link thread.
//!
//! - **`target_os = "espidf"`**: `EspMqttClient`, created lazily on the
//!   first `connect`.  A dedicated thread drains the client's event
//!   connection and mirrors Connected / Disconnected into an atomic flag.
//!   The ESP-IDF client reconnects on its own once created; `connect`
//!   then only waits (bounded) for that flag.
//! - **all other targets**: an in-memory broker controlled through a
//!   cloneable [`SimBrokerHandle`].

use crate::app::ports::BrokerPort;
use crate::error::BrokerError;

#[cfg(target_os = "espidf")]
pub use esp::MqttBroker;
#[cfg(not(target_os = "espidf"))]
pub use sim::{MqttBroker, SimBrokerHandle};

/// Session parameters shared by both backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub url: String,
    pub client_id: String,
}

impl BrokerSettings {
    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Self {
            url: cfg.broker_url(),
            client_id: cfg.room_name.clone(),
        }
    }
}

#[cfg(target_os = "espidf")]
mod esp {
    use core::time::Duration;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Instant;

    use embedded_svc::mqtt::client::{EventPayload, QoS};
    use esp_idf_svc::mqtt::client::{EspMqttClient, EspMqttConnection, MqttClientConfiguration};
    use log::{debug, info, warn};

    use super::{BrokerError, BrokerPort, BrokerSettings};

    const KEEP_ALIVE: Duration = Duration::from_secs(30);
    const NETWORK_TIMEOUT: Duration = Duration::from_secs(5);
    const EVENT_STACK_SIZE: usize = 6 * 1024;

    pub struct MqttBroker {
        settings: BrokerSettings,
        client: Option<EspMqttClient<'static>>,
        connected: Arc<AtomicBool>,
    }

    impl MqttBroker {
        pub fn new(settings: BrokerSettings) -> Self {
            info!("MqttBroker: {} as {}", settings.url, settings.client_id);
            Self {
                settings,
                client: None,
                connected: Arc::new(AtomicBool::new(false)),
            }
        }

        fn create_client(&mut self) -> Result<(), BrokerError> {
            let conf = MqttClientConfiguration {
                client_id: Some(&self.settings.client_id),
                keep_alive_interval: Some(KEEP_ALIVE),
                network_timeout: NETWORK_TIMEOUT,
                ..Default::default()
            };
            let (client, conn) = EspMqttClient::new(&self.settings.url, &conf).map_err(|e| {
                warn!("MqttBroker: client creation failed: {}", e);
                BrokerError::Unavailable
            })?;

            let flag = self.connected.clone();
            thread::Builder::new()
                .name("mqtt-events".into())
                .stack_size(EVENT_STACK_SIZE)
                .spawn(move || event_loop(conn, flag))
                .map_err(|_| BrokerError::Unavailable)?;

            self.client = Some(client);
            Ok(())
        }
    }

    fn event_loop(mut conn: EspMqttConnection, connected: Arc<AtomicBool>) {
        loop {
            match conn.next() {
                Ok(event) => match event.payload() {
                    EventPayload::Connected(_) => {
                        connected.store(true, Ordering::Release);
                        debug!("MqttBroker: session up");
                    }
                    EventPayload::Disconnected => {
                        connected.store(false, Ordering::Release);
                        debug!("MqttBroker: session down");
                    }
                    _ => {}
                },
                // The connection is closed once the client is dropped.
                Err(_) => break,
            }
        }
        connected.store(false, Ordering::Release);
    }

    impl BrokerPort for MqttBroker {
        fn connect(&mut self) -> Result<(), BrokerError> {
            if self.client.is_none() {
                self.create_client()?;
            }
            let deadline = Instant::now() + NETWORK_TIMEOUT;
            while !self.connected.load(Ordering::Acquire) {
                if Instant::now() >= deadline {
                    return Err(BrokerError::Unavailable);
                }
                thread::sleep(Duration::from_millis(50));
            }
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.client.is_some() && self.connected.load(Ordering::Acquire)
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
            let client = self.client.as_mut().ok_or(BrokerError::Unavailable)?;
            client
                .publish(topic, QoS::AtMostOnce, false, payload)
                .map(|_| ())
                .map_err(|e| {
                    if self.connected.load(Ordering::Acquire) {
                        warn!("MqttBroker: publish rejected: {}", e);
                        BrokerError::Rejected
                    } else {
                        BrokerError::Unavailable
                    }
                })
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    use log::info;

    use super::{BrokerError, BrokerPort, BrokerSettings};

    #[derive(Debug)]
    struct SimState {
        reachable: bool,
        connected: bool,
        reject: bool,
        connects: u32,
        published: Vec<(String, Vec<u8>)>,
    }

    /// Test-side view of a simulated broker.  Clones share state.
    #[derive(Debug, Clone)]
    pub struct SimBrokerHandle {
        state: Arc<Mutex<SimState>>,
    }

    impl SimBrokerHandle {
        fn lock(&self) -> MutexGuard<'_, SimState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Unreachable also drops a live session.
        pub fn set_reachable(&self, reachable: bool) {
            let mut s = self.lock();
            s.reachable = reachable;
            if !reachable {
                s.connected = false;
            }
        }

        /// Make publishes on a live session fail with `Rejected`.
        pub fn set_reject(&self, reject: bool) {
            self.lock().reject = reject;
        }

        pub fn is_connected(&self) -> bool {
            self.lock().connected
        }

        pub fn connects(&self) -> u32 {
            self.lock().connects
        }

        pub fn published(&self) -> Vec<(String, Vec<u8>)> {
            self.lock().published.clone()
        }

        /// Payloads received on `topic`, as UTF-8.
        pub fn payloads(&self, topic: &str) -> Vec<String> {
            self.lock()
                .published
                .iter()
                .filter(|(t, _)| t == topic)
                .map(|(_, p)| String::from_utf8_lossy(p).into_owned())
                .collect()
        }
    }

    pub struct MqttBroker {
        handle: SimBrokerHandle,
    }

    impl MqttBroker {
        pub fn new(settings: BrokerSettings) -> Self {
            info!("MqttBroker: simulation backend for {}", settings.url);
            Self {
                handle: SimBrokerHandle {
                    state: Arc::new(Mutex::new(SimState {
                        reachable: true,
                        connected: false,
                        reject: false,
                        connects: 0,
                        published: Vec::new(),
                    })),
                },
            }
        }

        pub fn sim_handle(&self) -> SimBrokerHandle {
            self.handle.clone()
        }
    }

    impl BrokerPort for MqttBroker {
        fn connect(&mut self) -> Result<(), BrokerError> {
            let mut s = self.handle.lock();
            if !s.reachable {
                return Err(BrokerError::Unavailable);
            }
            if !s.connected {
                s.connected = true;
                s.connects += 1;
            }
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.handle.is_connected()
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
            let mut s = self.handle.lock();
            if !s.connected {
                return Err(BrokerError::Unavailable);
            }
            if s.reject {
                return Err(BrokerError::Rejected);
            }
            s.published.push((topic.to_owned(), payload.to_vec()));
            Ok(())
        }
    }
}
