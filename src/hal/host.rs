//! `std`-backed reference HAL adapter.
//!
//! GPIO/ADC/DAC have no real silicon behind them here — concrete drivers are
//! out of scope for a host build — but they go through the exact `HalStatus`
//! contract a real driver would, modeled as in-process channel maps.
//! Persistence and logging are the two capabilities a host build genuinely
//! needs, so those are real: atomic file replace and the `log` crate.

use super::{Channel, Hal};
use crate::error::HalStatus;
use log::info;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub struct HostHal {
    start: Instant,
    gpio: HashMap<Channel, bool>,
    adc: HashMap<Channel, u16>,
    dac: HashMap<Channel, u16>,
    store_dir: PathBuf,
}

impl HostHal {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        HostHal {
            start: Instant::now(),
            gpio: HashMap::new(),
            adc: HashMap::new(),
            dac: HashMap::new(),
            store_dir: store_dir.into(),
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.store_dir.join(super::sanitize_key(key))
    }

    /// Atomic replace: write to a sibling temp file, then rename over the
    /// target. If the process dies mid-write the original file is untouched
    /// and the previous value remains readable.
    fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)
    }
}

impl Hal for HostHal {
    fn init(&mut self) -> HalStatus {
        match fs::create_dir_all(&self.store_dir) {
            Ok(()) => HalStatus::Ok,
            Err(_) => HalStatus::Error,
        }
    }

    fn shutdown(&mut self) -> HalStatus {
        HalStatus::Ok
    }

    fn tick(&mut self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    fn sleep(&mut self, ms: u32) {
        let target = Duration::from_millis(ms as u64);
        let began = Instant::now();
        loop {
            let elapsed = began.elapsed();
            if elapsed >= target {
                break;
            }
            std::thread::sleep(target - elapsed);
        }
    }

    fn gpio_read(&mut self, channel: Channel) -> Result<bool, HalStatus> {
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
        match Self::atomic_write(&self.key_path(key), bytes) {
            Ok(()) => HalStatus::Ok,
            Err(_) => HalStatus::Error,
        }
    }

    fn persist_load(&mut self, key: &str) -> Result<Option<Vec<u8>>, HalStatus> {
        match fs::read(self.key_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(_) => Err(HalStatus::Error),
        }
    }

    fn persist_delete(&mut self, key: &str) -> Result<bool, HalStatus> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(_) => Err(HalStatus::Error),
        }
    }

    fn log(&mut self, line: &str) {
        info!("{}", line);
    }
}
