//! BME680 temperature / pressure / humidity probe (I2C).
//!
//! ## Dual-target design
//!
//! On ESP-IDF: `bme680` driver over an `I2cDriver`, one forced-mode
//! measurement per read, gas heater disabled.  The probe starts
//! uninitialised; a chip that is missing at boot makes reads fail with
//! [`SensorError::Bus`] until a later [`ClimateSensor::reinit`] finds it.
//! On host/test: returns scripted results; an empty script repeats the
//! last scripted sample.

use log::{debug, info};

use crate::app::ports::ClimateSensor;
use crate::error::SensorError;

use super::ClimateSample;

#[cfg(target_os = "espidf")]
type Bme = bme680::Bme680<esp_idf_hal::i2c::I2cDriver<'static>, esp_idf_hal::delay::Delay>;

#[cfg(target_os = "espidf")]
mod chip {
    /// Secondary address (SDO high).
    pub const ADDR: u8 = 0x77;
    pub const REG_CHIP_ID: u8 = 0xD0;
    pub const CHIP_ID: u8 = 0x61;
    pub const ID_TIMEOUT_MS: u64 = 50;
}

#[cfg(target_os = "espidf")]
enum Probe {
    /// Chip not answering yet; the bus is kept for the next attempt.
    Absent(esp_idf_hal::i2c::I2cDriver<'static>),
    Ready(Bme),
    /// Driver init failed after the chip answered and took the bus with it.
    Lost,
}

pub struct ClimateProbe {
    #[cfg(target_os = "espidf")]
    probe: Probe,
    #[cfg(target_os = "espidf")]
    delay: esp_idf_hal::delay::Delay,
    #[cfg(not(target_os = "espidf"))]
    script: std::collections::VecDeque<Result<ClimateSample, SensorError>>,
    #[cfg(not(target_os = "espidf"))]
    last: Option<ClimateSample>,
    #[cfg(not(target_os = "espidf"))]
    present: bool,
    #[cfg(not(target_os = "espidf"))]
    ready: bool,
    #[cfg(not(target_os = "espidf"))]
    reinits: u32,
}

#[cfg(target_os = "espidf")]
impl ClimateProbe {
    /// Take the bus and try a first bring-up.  Never fails: an absent
    /// chip is retried from [`ClimateSensor::reinit`].
    pub fn new(i2c: esp_idf_hal::i2c::I2cDriver<'static>) -> Self {
        let mut delay = esp_idf_hal::delay::Delay::new_default();
        let probe = Self::bring_up(i2c, &mut delay);
        if matches!(probe, Probe::Absent(_)) {
            log::warn!(
                "BME680: no response at {:#04x}, climate readings unavailable",
                chip::ADDR
            );
        }
        Self { probe, delay }
    }

    fn chip_answers(i2c: &mut esp_idf_hal::i2c::I2cDriver<'static>) -> bool {
        use esp_idf_hal::delay::TickType;

        let mut id = [0u8; 1];
        let timeout = TickType::new_millis(chip::ID_TIMEOUT_MS).ticks();
        i2c.write_read(chip::ADDR, &[chip::REG_CHIP_ID], &mut id, timeout)
            .is_ok()
            && id[0] == chip::CHIP_ID
    }

    fn bring_up(
        mut i2c: esp_idf_hal::i2c::I2cDriver<'static>,
        delay: &mut esp_idf_hal::delay::Delay,
    ) -> Probe {
        if !Self::chip_answers(&mut i2c) {
            return Probe::Absent(i2c);
        }
        match Self::configure(i2c, delay) {
            Ok(bme) => {
                info!("BME680: ready");
                Probe::Ready(bme)
            }
            Err(e) => {
                log::error!("BME680: init failed after chip answered ({})", e);
                Probe::Lost
            }
        }
    }

    /// Initialise at the secondary address (0x77) and configure oversampling.
    fn configure(
        i2c: esp_idf_hal::i2c::I2cDriver<'static>,
        delay: &mut esp_idf_hal::delay::Delay,
    ) -> Result<Bme, SensorError> {
        use bme680::{
            Bme680, I2CAddress, IIRFilterSize, OversamplingSetting, PowerMode, SettingsBuilder,
        };

        let mut bme =
            Bme680::init(i2c, delay, I2CAddress::Secondary).map_err(|_| SensorError::Bus)?;
        let settings = SettingsBuilder::new()
            .with_humidity_oversampling(OversamplingSetting::OS2x)
            .with_pressure_oversampling(OversamplingSetting::OS4x)
            .with_temperature_oversampling(OversamplingSetting::OS8x)
            .with_temperature_filter(IIRFilterSize::Size3)
            .with_run_gas(false)
            .build();
        bme.set_sensor_settings(delay, settings)
            .map_err(|_| SensorError::Bus)?;
        bme.set_sensor_mode(delay, PowerMode::ForcedMode)
            .map_err(|_| SensorError::Bus)?;
        Ok(bme)
    }

    fn measure(&mut self) -> Result<ClimateSample, SensorError> {
        use bme680::PowerMode;

        let Probe::Ready(bme) = &mut self.probe else {
            return Err(SensorError::Bus);
        };
        bme.set_sensor_mode(&mut self.delay, PowerMode::ForcedMode)
            .map_err(|_| SensorError::Bus)?;
        let (data, _condition) = bme
            .get_sensor_data(&mut self.delay)
            .map_err(|_| SensorError::Bus)?;
        Ok(ClimateSample {
            temperature_c: data.temperature_celsius(),
            pressure_hpa: data.pressure_hpa(),
            humidity_pct: data.humidity_percent(),
        })
    }

    fn retry_bring_up(&mut self) -> Result<(), SensorError> {
        match core::mem::replace(&mut self.probe, Probe::Lost) {
            Probe::Absent(i2c) => {
                self.probe = Self::bring_up(i2c, &mut self.delay);
                match self.probe {
                    Probe::Ready(_) => Ok(()),
                    _ => Err(SensorError::Bus),
                }
            }
            ready @ Probe::Ready(_) => {
                self.probe = ready;
                Ok(())
            }
            Probe::Lost => Err(SensorError::Bus),
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for ClimateProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl ClimateProbe {
    pub fn new() -> Self {
        Self {
            script: std::collections::VecDeque::new(),
            last: None,
            present: true,
            ready: true,
            reinits: 0,
        }
    }

    pub fn sim_push(&mut self, sample: ClimateSample) {
        self.script.push_back(Ok(sample));
    }

    pub fn sim_push_error(&mut self, err: SensorError) {
        self.script.push_back(Err(err));
    }

    /// Unplugging drops the initialised state; plugging back in only
    /// takes effect on the next reinit.
    pub fn sim_set_present(&mut self, present: bool) {
        self.present = present;
        if !present {
            self.ready = false;
        }
    }

    pub fn sim_reinit_count(&self) -> u32 {
        self.reinits
    }

    fn measure(&mut self) -> Result<ClimateSample, SensorError> {
        if !self.ready {
            return Err(SensorError::Bus);
        }
        match self.script.pop_front() {
            Some(Ok(s)) => {
                self.last = Some(s);
                Ok(s)
            }
            Some(Err(e)) => Err(e),
            None => self.last.ok_or(SensorError::Timeout),
        }
    }

    fn retry_bring_up(&mut self) -> Result<(), SensorError> {
        if self.ready {
            return Ok(());
        }
        self.reinits += 1;
        if self.present {
            info!("BME680: ready");
            self.ready = true;
            Ok(())
        } else {
            Err(SensorError::Bus)
        }
    }
}

impl ClimateSensor for ClimateProbe {
    fn read(&mut self) -> Result<ClimateSample, SensorError> {
        self.measure().inspect_err(|e| debug!("BME680: read failed: {}", e))
    }

    fn reinit(&mut self) -> Result<(), SensorError> {
        self.retry_bring_up()
            .inspect_err(|_| debug!("BME680: still not answering"))
    }
}
