//! Hardware Abstraction Layer capability surface.
//!
//! `Hal` is the single seam through which the VM and scheduler touch time,
//! physical I/O and persistent storage. Every method returns `HalStatus` (or
//! a value wrapped in one), never a `Result` and never a panic: a HAL
//! implementation must not unwind into the scheduler.

pub mod host;
pub mod mock;

use crate::error::HalStatus;

/// A single analog/digital channel identifier. The core does not interpret
/// channel numbers; mapping channel -> physical pin is a HAL concern.
pub type Channel = u16;

/// Hardware Abstraction Layer: the capability surface required of any host.
/// The VM and Scheduler depend only on this trait, never on a concrete
/// adapter — production firmware, the `HostHal` reference adapter, and
/// `MockHal` in tests are interchangeable here.
pub trait Hal {
    /// Idempotent startup hook.
    fn init(&mut self) -> HalStatus;

    /// Idempotent shutdown hook.
    fn shutdown(&mut self) -> HalStatus;

    /// Monotonic milliseconds since `init`. Must never go backwards; 32-bit
    /// wraparound after approximately 49.7 days is tolerated by callers.
    fn tick(&mut self) -> u32;

    /// Blocks the caller for at least `ms` milliseconds. Implementations
    /// must resume after a spurious interruption until the full duration
    /// has elapsed — this is the one HAL operation the core may retry
    /// automatically.
    fn sleep(&mut self, ms: u32);

    fn gpio_read(&mut self, channel: Channel) -> Result<bool, HalStatus>;
    fn gpio_write(&mut self, channel: Channel, value: bool) -> HalStatus;

    fn adc_read(&mut self, channel: Channel) -> Result<u16, HalStatus>;
    fn dac_write(&mut self, channel: Channel, value: u16) -> HalStatus;

    /// Atomic key-addressed replace: on any mid-write failure the previous
    /// value for `key` must remain readable.
    fn persist_save(&mut self, key: &str, bytes: &[u8]) -> HalStatus;

    /// `Ok(Some(bytes))` on hit, `Ok(None)` if the key was never saved.
    fn persist_load(&mut self, key: &str) -> Result<Option<Vec<u8>>, HalStatus>;

    /// `Ok(true)` if a value existed and was removed, `Ok(false)` if the key
    /// was not found.
    fn persist_delete(&mut self, key: &str) -> Result<bool, HalStatus>;

    /// Line-oriented, immediately flushed log sink.
    fn log(&mut self, line: &str);
}

/// Persistence keys must have `/` rewritten to `_` before reaching the
/// underlying store, so a tag-derived key can never be misread as a path
/// component by a filesystem-backed HAL.
pub fn sanitize_key(key: &str) -> String {
    key.replace('/', "_")
}
