//! WiFi station-mode bring-up.
//!
//! Credentials come from the settings store (`wifi/ssid`, `wifi/pass`);
//! storing them there is someone else's job.  On device the station is
//! started once at boot.  If the first association fails the monitor
//! still runs; the broker link keeps retrying until the network is up.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi`.
//! - **all other targets**: only credential loading and validation.

use core::fmt;
use log::warn;

use crate::app::ports::SettingsPort;

pub const NS_WIFI: &str = "wifi";
pub const KEY_SSID: &str = "ssid";
pub const KEY_PASSWORD: &str = "pass";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(
                f,
                "password invalid (must be 8-64 bytes for WPA2, or empty for open)"
            ),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl std::error::Error for ConnectivityError {}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        Ok(Self {
            ssid: heapless::String::try_from(ssid).map_err(|_| ConnectivityError::InvalidSsid)?,
            password: heapless::String::try_from(password)
                .map_err(|_| ConnectivityError::InvalidPassword)?,
        })
    }

    /// Open networks have an empty password.
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// Read credentials from the settings store.  A store that cannot be
    /// read at all is reported as such; a missing SSID is `NoCredentials`.
    pub fn load(store: &impl SettingsPort) -> Result<Self, ConnectivityError> {
        let read = |key| match store.get_string(NS_WIFI, key) {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!("WiFi: reading {}/{} failed: {}", NS_WIFI, key, e);
                Err(ConnectivityError::NoCredentials)
            }
        };
        let ssid = read(KEY_SSID)?.ok_or(ConnectivityError::NoCredentials)?;
        let password = read(KEY_PASSWORD)?.unwrap_or_default();
        Self::new(&ssid, &password)
    }
}

// ───────────────────────────────────────────────────────────────
// Station (device only)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use station::WifiStation;

#[cfg(target_os = "espidf")]
mod station {
    use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
    use log::{info, warn};

    use super::{ConnectivityError, WifiCredentials};

    /// Owns the driver for the lifetime of the program.
    pub struct WifiStation {
        wifi: BlockingWifi<EspWifi<'static>>,
    }

    impl WifiStation {
        pub fn start(
            modem: Modem,
            sysloop: EspSystemEventLoop,
            creds: &WifiCredentials,
        ) -> Result<Self, ConnectivityError> {
            let fail = |e: esp_idf_svc::sys::EspError| {
                warn!("WiFi: driver error: {}", e);
                ConnectivityError::ConnectionFailed
            };
            // Credentials live in our own namespace; the driver gets no NVS.
            let driver = EspWifi::new(modem, sysloop.clone(), None).map_err(fail)?;
            let mut wifi = BlockingWifi::wrap(driver, sysloop).map_err(fail)?;

            let auth_method = if creds.is_open() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            wifi.set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: creds.ssid.clone(),
                password: creds.password.clone(),
                auth_method,
                ..Default::default()
            }))
            .map_err(fail)?;
            wifi.start().map_err(fail)?;

            let mut station = Self { wifi };
            match station.ensure_connected() {
                Ok(()) => info!("WiFi: connected to {}", creds.ssid),
                Err(e) => warn!("WiFi: {} ({}), continuing offline", e, creds.ssid),
            }
            Ok(station)
        }

        pub fn ensure_connected(&mut self) -> Result<(), ConnectivityError> {
            let fail = |_| ConnectivityError::ConnectionFailed;
            if !self.wifi.is_connected().map_err(fail)? {
                self.wifi.connect().map_err(fail)?;
            }
            self.wifi.wait_netif_up().map_err(fail)
        }
    }
}
