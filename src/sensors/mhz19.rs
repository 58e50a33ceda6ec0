//! MH-Z19 NDIR CO2 sensor over UART (9600 8N1).
//!
//! Request: `FF 01 86 00 00 00 00 00 cs`.  Response: `FF 86 HH LL .. .. .. .. cs`
//! with ppm = `HH << 8 | LL`.  The checksum is the two's complement of
//! the byte sum of bytes 1..=7.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives a `UartDriver`, reading the 9-byte response against
//! a deadline.
//! On host/test: replays a per-instance script of response frames so the
//! codec and the hub's failure handling can be exercised.

use log::{debug, warn};

use crate::app::ports::Co2Sensor;
use crate::error::SensorError;

pub const MHZ19_BAUD: u32 = 9_600;
pub const FRAME_LEN: usize = 9;

const START: u8 = 0xFF;
const SENSOR_NUM: u8 = 0x01;
pub const CMD_READ_CO2: u8 = 0x86;

/// Default response deadline.
pub const READ_TIMEOUT_MS: u64 = 100;

// ── Codec ─────────────────────────────────────────────────────

/// Two's complement of the wrapping byte sum.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    (!sum).wrapping_add(1)
}

/// Build a command frame with the checksum filled in.
pub fn command_frame(cmd: u8, data: [u8; 5]) -> [u8; FRAME_LEN] {
    let mut frame = [START, SENSOR_NUM, cmd, data[0], data[1], data[2], data[3], data[4], 0];
    frame[8] = checksum(&frame[1..8]);
    frame
}

/// Validate a gas-concentration response and extract the ppm value.
pub fn decode_response(buf: &[u8; FRAME_LEN]) -> Result<u16, SensorError> {
    if buf[0] != START || buf[1] != CMD_READ_CO2 {
        return Err(SensorError::Frame);
    }
    let expected = checksum(&buf[1..8]);
    if buf[8] != expected {
        debug!(
            "MH-Z19: checksum expected {:02X}, got {:02X}, frame {:02X?}",
            expected, buf[8], buf
        );
        return Err(SensorError::Checksum);
    }
    Ok((u16::from(buf[2]) << 8) | u16::from(buf[3]))
}

/// Response frame for `ppm`, as the sensor would send it.
pub fn response_frame(ppm: u16) -> [u8; FRAME_LEN] {
    let [hi, lo] = ppm.to_be_bytes();
    let mut frame = [START, CMD_READ_CO2, hi, lo, 0, 0, 0, 0, 0];
    frame[8] = checksum(&frame[1..8]);
    frame
}

// ── Simulation script ─────────────────────────────────────────

/// One scripted reply for the host backend.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Copy)]
pub enum SimReply {
    Frame([u8; FRAME_LEN]),
    /// Fewer than 9 bytes before the deadline.
    Silence,
}

// ── Driver ────────────────────────────────────────────────────

pub struct Mhz19 {
    #[cfg(target_os = "espidf")]
    uart: esp_idf_hal::uart::UartDriver<'static>,
    #[cfg(not(target_os = "espidf"))]
    script: std::collections::VecDeque<SimReply>,
    #[cfg(not(target_os = "espidf"))]
    reinits: u32,
}

#[cfg(target_os = "espidf")]
impl Mhz19 {
    /// Take ownership of UART1 and the two pins.
    pub fn new(
        uart: esp_idf_hal::uart::UART1,
        tx: impl esp_idf_hal::peripheral::Peripheral<P = impl esp_idf_hal::gpio::OutputPin> + 'static,
        rx: impl esp_idf_hal::peripheral::Peripheral<P = impl esp_idf_hal::gpio::InputPin> + 'static,
    ) -> Result<Self, SensorError> {
        use esp_idf_hal::prelude::*;
        use esp_idf_hal::uart::{UartConfig, UartDriver};

        let cfg = UartConfig::new().baudrate(MHZ19_BAUD.Hz());
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            None::<esp_idf_hal::gpio::AnyIOPin>,
            None::<esp_idf_hal::gpio::AnyIOPin>,
            &cfg,
        )
        .map_err(|e| {
            warn!("MH-Z19: UART init failed: {}", e);
            SensorError::Bus
        })?;
        Ok(Self { uart })
    }

    fn transact(&mut self) -> Result<[u8; FRAME_LEN], SensorError> {
        use esp_idf_hal::delay::{BLOCK, TickType};
        use std::time::{Duration, Instant};

        let cmd = command_frame(CMD_READ_CO2, [0; 5]);
        // Drop any stale bytes from a previous, half-received reply.
        self.uart.clear_rx().map_err(|_| SensorError::Bus)?;
        self.uart.write(&cmd).map_err(|_| SensorError::Bus)?;
        self.uart.wait_tx_done(BLOCK).map_err(|_| SensorError::Bus)?;

        let mut buf = [0u8; FRAME_LEN];
        let mut received = 0usize;
        let deadline = Instant::now() + Duration::from_millis(READ_TIMEOUT_MS);
        while received < FRAME_LEN && Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let ticks = TickType::new_millis(remaining.as_millis() as u64).ticks();
            let n = self
                .uart
                .read(&mut buf[received..], ticks)
                .map_err(|_| SensorError::Bus)?;
            received += n;
        }
        if received < FRAME_LEN {
            debug!("MH-Z19: got {}/9 bytes: {:02X?}", received, &buf[..received]);
            return Err(SensorError::Timeout);
        }
        Ok(buf)
    }

    fn reopen(&mut self) -> Result<(), SensorError> {
        use esp_idf_hal::prelude::*;

        self.uart.clear_rx().map_err(|_| SensorError::Bus)?;
        self.uart
            .change_baudrate(MHZ19_BAUD.Hz())
            .map_err(|_| SensorError::Bus)?;
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for Mhz19 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl Mhz19 {
    pub fn new() -> Self {
        Self {
            script: std::collections::VecDeque::new(),
            reinits: 0,
        }
    }

    /// Queue a raw reply frame.
    pub fn sim_push_frame(&mut self, frame: [u8; FRAME_LEN]) {
        self.script.push_back(SimReply::Frame(frame));
    }

    /// Queue a well-formed reply carrying `ppm`.
    pub fn sim_push_ppm(&mut self, ppm: u16) {
        self.sim_push_frame(response_frame(ppm));
    }

    /// Queue a read that times out.
    pub fn sim_push_silence(&mut self) {
        self.script.push_back(SimReply::Silence);
    }

    /// How many times the transport has been reopened.
    pub fn sim_reinit_count(&self) -> u32 {
        self.reinits
    }

    fn transact(&mut self) -> Result<[u8; FRAME_LEN], SensorError> {
        match self.script.pop_front() {
            Some(SimReply::Frame(f)) => Ok(f),
            Some(SimReply::Silence) | None => Err(SensorError::Timeout),
        }
    }

    fn reopen(&mut self) -> Result<(), SensorError> {
        self.reinits += 1;
        Ok(())
    }
}

impl Co2Sensor for Mhz19 {
    fn read_ppm(&mut self) -> Result<u16, SensorError> {
        let frame = self.transact()?;
        decode_response(&frame)
    }

    fn reinit(&mut self) -> Result<(), SensorError> {
        warn!("MH-Z19: reopening UART");
        self.reopen()
    }
}
