//! NVS (Non-Volatile Storage) settings adapter.
//!
//! Implements [`SettingsPort`]: string values looked up by namespace and
//! key.  The monitor only ever reads; values are provisioned externally
//! (factory tooling or a serial console).
//!
//! - **`target_os = "espidf"`**: raw `nvs_*` calls on the default partition.
//! - **all other targets**: an in-memory map, writable from tests.

use log::info;

use crate::app::ports::SettingsPort;
use crate::error::{ConfigError, StorageError};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Longest value read back, including the NUL terminator.
pub const MAX_VALUE_LEN: usize = 128;

pub struct NvsSettings {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, String>,
    #[cfg(not(target_os = "espidf"))]
    available: bool,
}

impl NvsSettings {
    /// Initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::StoreUnavailable)` if flash initialisation
    /// fails unrecoverably.  On first boot or after a version mismatch the
    /// partition is erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                log::warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::StoreUnavailable);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::StoreUnavailable);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::StoreUnavailable);
            }
            info!("NvsSettings: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsSettings: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            available: true,
        })
    }

    /// Copy `s` into a NUL-terminated buffer, truncated to NVS's 15-char limit.
    #[cfg(target_os = "espidf")]
    fn c_name(s: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = s.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open a namespace read-only, run `f`, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, f: F) -> Result<T, esp_err_t>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe {
            nvs_open(
                ns.as_ptr().cast(),
                nvs_open_mode_t_NVS_READONLY,
                &mut handle,
            )
        };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

#[cfg(not(target_os = "espidf"))]
impl NvsSettings {
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Provision a value (simulation only).
    pub fn set_string(&mut self, namespace: &str, key: &str, value: &str) {
        self.store
            .insert(Self::composite_key(namespace, key), value.to_owned());
    }

    /// Make every read fail as if the partition were gone.
    pub fn sim_set_available(&mut self, available: bool) {
        self.available = available;
    }
}

impl SettingsPort for NvsSettings {
    fn get_string(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            if !self.available {
                return Err(StorageError::Unavailable);
            }
            Ok(self
                .store
                .get(&Self::composite_key(namespace, key))
                .cloned())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, |handle| {
                let mut buf = [0u8; MAX_VALUE_LEN];
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_str(
                        handle,
                        key_buf.as_ptr().cast(),
                        buf.as_mut_ptr().cast(),
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let value = core::ffi::CStr::from_bytes_until_nul(&buf)
                    .ok()
                    .and_then(|c| c.to_str().ok())
                    .map(str::to_owned);
                Ok(value)
            });
            match result {
                Ok(Some(v)) => Ok(Some(v)),
                Ok(None) => {
                    log::warn!("NVS: {}/{} is not valid UTF-8", namespace, key);
                    Err(StorageError::IoError)
                }
                // Missing namespace and missing key both mean "not set".
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
                Err(e) if e == ESP_ERR_NVS_NOT_INITIALIZED => Err(StorageError::Unavailable),
                Err(e) => {
                    log::warn!("NVS: reading {}/{} failed (err {})", namespace, key, e);
                    Err(StorageError::IoError)
                }
            }
        }
    }
}
