//! Cooperative, non-preemptive task scheduler.
//!
//! Each fire runs: lock the shared process image, latch inputs, write the
//! system registers, run one VM cycle under a watchdog, latch outputs,
//! unlock, record statistics. Two tasks never hold the lock at the same
//! time; within one scan, outputs reflect only the inputs latched at scan
//! start.

use crate::error::HalStatus;
use crate::hal::{Channel, Hal};
use crate::memory::{MemoryConfig, MemoryImage, SYSREGS_OFFSET};
use crate::task::{Task, TaskConfig, TaskState};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

pub const MAX_TASKS: usize = 8;

const SYSREG_LAST_CYCLE_US: u16 = 0;
const SYSREG_UPTIME_MS: u16 = 4;
const SYSREG_CURRENT_TASK: u16 = 8;
const SYSREG_FLAGS: u16 = 9;

const FLAG_FIRST_SCAN: u8 = 0b001;
const FLAG_WATCHDOG_WARN: u8 = 0b010;
const FLAG_RUNNING: u8 = 0b100;

/// HAL persistence key retentive memory is stored under.
pub const RETAIN_KEY: &str = "retain";

/// Maps one HAL channel to a fixed memory address, latched in or out once
/// per scan. A `Gpio` mapping reads/writes a single byte (0/1); an `Adc`/
/// `Dac` mapping reads/writes a 16-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    Gpio,
    Analog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoMapping {
    pub channel: Channel,
    pub addr: u16,
    pub kind: IoKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub input_map: Vec<IoMapping>,
    pub output_map: Vec<IoMapping>,
}

/// The shared memory image behind a timed mutex: `lock_timeout_ms` follows
/// the −1 (wait forever) / 0 (try once) / positive (poll up to N ms)
/// contract via `Mutex::try_lock` polled against a wall clock, since the
/// standard library has no timed mutex.
pub struct ProcessImage {
    inner: Mutex<MemoryImage>,
}

impl ProcessImage {
    pub fn new(mem: MemoryImage) -> Self {
        ProcessImage { inner: Mutex::new(mem) }
    }

    pub fn lock(&self, timeout_ms: i64) -> Result<MutexGuard<'_, MemoryImage>, crate::error::HalStatus> {
        use crate::error::HalStatus;
        if timeout_ms == 0 {
            return self.inner.try_lock().map_err(|_| HalStatus::Busy);
        }
        if timeout_ms < 0 {
            return self.inner.lock().map_err(|_| HalStatus::Error);
        }
        let deadline = Instant::now() + std::time::Duration::from_millis(timeout_ms as u64);
        loop {
            match self.inner.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(std::sync::TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(HalStatus::Timeout);
                    }
                    std::thread::yield_now();
                }
                Err(std::sync::TryLockError::Poisoned(_)) => return Err(HalStatus::Error),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub total_cycles: u64,
    pub total_overruns: u64,
}

/// Owns the process image and the registered task set; drives scans either
/// via the manual `poll` entry point (bare-metal/embedded hosts) or through
/// `HostedRunner` (see `hosted`), which is built on top of `poll`/`fire`.
pub struct Scheduler {
    pub image: ProcessImage,
    tasks: Vec<Task>,
    config: SchedulerConfig,
    start: Option<u64>,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(mem_config: MemoryConfig, config: SchedulerConfig) -> Self {
        Scheduler {
            image: ProcessImage::new(MemoryImage::new(mem_config)),
            tasks: Vec::new(),
            config,
            start: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn register_task(&mut self, task_config: TaskConfig, vm_config: crate::vm::VmConfig) -> Result<(), &'static str> {
        if self.tasks.len() >= MAX_TASKS {
            return Err("maximum number of registered tasks exceeded");
        }
        let mut task = Task::new(task_config, vm_config);
        task.state = TaskState::Ready;
        self.tasks.push(task);
        Ok(())
    }

    pub fn task_stats(&self, id: u16) -> Option<crate::task::TaskStats> {
        self.tasks.iter().find(|t| t.config.id == id).map(|t| t.stats)
    }

    pub fn task_state(&self, id: u16) -> Option<TaskState> {
        self.tasks.iter().find(|t| t.config.id == id).map(|t| t.state)
    }

    /// Host-requested pause: takes effect at the next instruction boundary,
    /// the same way a breakpoint hit does. Distinct from the in-program
    /// `BREAK` opcode, which pauses itself from inside `step`.
    pub fn pause_task(&mut self, id: u16) -> bool {
        match self.tasks.iter_mut().find(|t| t.config.id == id) {
            Some(task) => {
                task.vm.pause();
                task.state = TaskState::Paused;
                true
            }
            None => false,
        }
    }

    /// Resumes a task paused via `pause_task`, a breakpoint, or `BREAK`.
    pub fn resume_task(&mut self, id: u16) -> bool {
        match self.tasks.iter_mut().find(|t| t.config.id == id) {
            Some(task) => {
                task.vm.resume();
                task.state = TaskState::Ready;
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Restores retentive memory from the HAL's persistent store into the
    /// process image, meant to be called once at startup. A missing key
    /// leaves retain memory zeroed, its power-on-reset state.
    pub fn load_retain_from_hal(&mut self, hal: &mut dyn Hal) -> Result<(), HalStatus> {
        let mut guard = self.image.lock(-1)?;
        if let Some(data) = hal.persist_load(RETAIN_KEY)? {
            guard.load_retain(&data);
        }
        Ok(())
    }

    /// Commits retentive memory to the HAL's persistent store, meant to be
    /// called on host-initiated save or clean shutdown.
    pub fn save_retain_to_hal(&self, hal: &mut dyn Hal) -> Result<(), HalStatus> {
        let guard = self.image.lock(-1)?;
        let snapshot = guard.retain_snapshot().to_vec();
        drop(guard);
        match hal.persist_save(RETAIN_KEY, &snapshot) {
            HalStatus::Ok => Ok(()),
            other => Err(other),
        }
    }

    fn latch_inputs(&self, mem: &mut MemoryImage, hal: &mut dyn Hal) {
        for mapping in &self.config.input_map {
            match mapping.kind {
                IoKind::Gpio => {
                    if let Ok(value) = hal.gpio_read(mapping.channel) {
                        let _ = mem.write_u8(mapping.addr, value as u8);
                    }
                }
                IoKind::Analog => {
                    if let Ok(value) = hal.adc_read(mapping.channel) {
                        let _ = mem.write_u16(mapping.addr, value);
                    }
                }
            }
        }
    }

    fn latch_outputs(&self, mem: &MemoryImage, hal: &mut dyn Hal) {
        for mapping in &self.config.output_map {
            match mapping.kind {
                IoKind::Gpio => {
                    if let Ok(value) = mem.read_u8(mapping.addr) {
                        hal.gpio_write(mapping.channel, value != 0);
                    }
                }
                IoKind::Analog => {
                    if let Ok(value) = mem.read_u16(mapping.addr) {
                        hal.dac_write(mapping.channel, value);
                    }
                }
            }
        }
    }

    fn write_sysregs(mem: &mut MemoryImage, uptime_ms: u32, task_id: u16, flags: u8, last_cycle_us: u32) {
        let base = SYSREGS_OFFSET;
        let _ = mem.write_u32(base + SYSREG_LAST_CYCLE_US, last_cycle_us);
        let _ = mem.write_u32(base + SYSREG_UPTIME_MS, uptime_ms);
        let _ = mem.write_u8(base + SYSREG_CURRENT_TASK as u16, task_id as u8);
        let _ = mem.write_u8(base + SYSREG_FLAGS as u16, flags);
    }

    /// Drives one scan of task `index`, per the six-step discipline. Returns
    /// the scan duration in microseconds.
    fn fire(&mut self, index: usize, hal: &mut dyn Hal) -> u32 {
        let uptime_ms = hal.tick();
        let start = Instant::now();

        let first_scan = self.tasks[index].stats.scan_count == 0;
        let watchdog_budget = (self.tasks[index].config.interval_us / 4).max(1000);
        let task_id = self.tasks[index].config.id;
        let entry_point = self.tasks[index].config.entry_point;
        let last_scan_us = self.tasks[index].stats.last_scan_us;

        let mut guard = match self.image.lock(-1) {
            Ok(g) => g,
            Err(_) => return 0,
        };

        self.latch_inputs(&mut guard, hal);

        let mut flags = FLAG_RUNNING;
        if first_scan {
            flags |= FLAG_FIRST_SCAN;
        }
        Self::write_sysregs(&mut guard, uptime_ms, task_id, flags, last_scan_us);

        self.tasks[index].state = TaskState::Running;
        let status = self.tasks[index].vm.run_cycle(entry_point, watchdog_budget, &mut guard, hal);

        self.latch_outputs(&guard, hal);
        drop(guard);

        let elapsed_us = start.elapsed().as_micros() as u32;
        let task = &mut self.tasks[index];
        task.stats.record_scan(elapsed_us);
        self.stats.total_cycles += 1;

        let interval_us = task.config.interval_us;
        if elapsed_us > interval_us && interval_us > 0 {
            task.stats.overrun_count += 1;
            self.stats.total_overruns += 1;
        }

        task.state = match status {
            crate::vm::VmStatus::Fault(_) => TaskState::Faulted,
            crate::vm::VmStatus::Paused => TaskState::Paused,
            _ => TaskState::Idle,
        };

        elapsed_us
    }

    /// Fires every due task in priority order (higher priority first among
    /// simultaneous ties), then reschedules it. Intended to be called
    /// repeatedly from a bare-metal timer ISR loop or a host poll loop; it
    /// never blocks beyond the process-image lock itself.
    pub fn poll(&mut self, now_ms: u64, hal: &mut dyn Hal) {
        if self.start.is_none() {
            self.start = Some(now_ms);
        }
        let mut due: Vec<usize> = (0..self.tasks.len()).filter(|&i| self.tasks[i].is_due(now_ms)).collect();
        // Priority 0 is highest (spec convention), so ascending order fires
        // the highest-priority task first among simultaneous ties.
        due.sort_by(|&a, &b| self.tasks[a].config.priority.cmp(&self.tasks[b].config.priority));
        for index in due {
            self.fire(index, hal);
            self.tasks[index].schedule_next(now_ms);
        }
    }

    /// Fires the task with the given id directly, bypassing the due-time
    /// check — used by `HostedRunner`, whose own timer callback already
    /// decided it's time.
    pub fn poll_task(&mut self, task_id: u16, now_ms: u64, hal: &mut dyn Hal) {
        if let Some(index) = self.tasks.iter().position(|t| t.config.id == task_id) {
            self.fire(index, hal);
            self.tasks[index].schedule_next(now_ms);
        }
    }
}
