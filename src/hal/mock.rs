//! In-memory, deterministic HAL used by unit and property tests.
//!
//! The whole HAL surface is backed by plain collections and a manually
//! advanced clock, so tests control time and I/O deterministically instead
//! of racing the wall clock.

use super::{Channel, Hal};
use crate::error::HalStatus;
use std::collections::HashMap;

#[derive(Default)]
pub struct MockHal {
    pub ticks_ms: u32,
    pub gpio: HashMap<Channel, bool>,
    pub adc: HashMap<Channel, u16>,
    pub dac: HashMap<Channel, u16>,
    pub store: HashMap<String, Vec<u8>>,
    pub log_lines: Vec<String>,
    pub initialized: bool,
    /// When set, the next call to the matching method returns this status
    /// instead of succeeding — used to exercise the scheduler's HAL-error
    /// handling paths.
    pub fail_gpio_read: bool,
    pub fail_persist_save: bool,
}

impl MockHal {
    pub fn new() -> Self {
        MockHal::default()
    }

    /// Test hook: advance the mock clock without sleeping.
    pub fn advance(&mut self, ms: u32) {
        self.ticks_ms = self.ticks_ms.wrapping_add(ms);
    }
}

impl Hal for MockHal {
    fn init(&mut self) -> HalStatus {
        self.initialized = true;
        HalStatus::Ok
    }

    fn shutdown(&mut self) -> HalStatus {
        self.initialized = false;
        HalStatus::Ok
    }

    fn tick(&mut self) -> u32 {
        self.ticks_ms
    }

    fn sleep(&mut self, ms: u32) {
        self.advance(ms);
    }

    fn gpio_read(&mut self, channel: Channel) -> Result<bool, HalStatus> {
        if self.fail_gpio_read {
            return Err(HalStatus::Error);
        }
        Ok(*self.gpio.get(&channel).unwrap_or(&false))
    }

    fn gpio_write(&mut self, channel: Channel, value: bool) -> HalStatus {
        self.gpio.insert(channel, value);
        HalStatus::Ok
    }

    fn adc_read(&mut self, channel: Channel) -> Result<u16, HalStatus> {
        Ok(*self.adc.get(&channel).unwrap_or(&0))
    }

    fn dac_write(&mut self, channel: Channel, value: u16) -> HalStatus {
        self.dac.insert(channel, value);
        HalStatus::Ok
    }

    fn persist_save(&mut self, key: &str, bytes: &[u8]) -> HalStatus {
        if self.fail_persist_save {
            return HalStatus::Error;
        }
        self.store.insert(super::sanitize_key(key), bytes.to_vec());
        HalStatus::Ok
    }

    fn persist_load(&mut self, key: &str) -> Result<Option<Vec<u8>>, HalStatus> {
        Ok(self.store.get(&super::sanitize_key(key)).cloned())
    }

    fn persist_delete(&mut self, key: &str) -> Result<bool, HalStatus> {
        Ok(self.store.remove(&super::sanitize_key(key)).is_some())
    }

    fn log(&mut self, line: &str) {
        self.log_lines.push(line.to_string());
    }
}
