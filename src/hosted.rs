//! Threaded scheduling driver for hosted (non-bare-metal) builds.
//!
//! One repeating `timer::Timer` guard per registered task fires into a
//! shared channel; a single dispatcher thread drains the channel and calls
//! `Scheduler::fire_task` under the scheduler's own lock, so two tasks never
//! race on the shared process image even though each has its own timer.

use crate::hal::Hal;
use crate::scheduler::Scheduler;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use timer::{Guard, Timer};

struct TaskTimer {
    _guard: Guard,
}

/// Drives a `Scheduler` from wall-clock timer callbacks instead of a manual
/// `poll` loop. Built for hosts with OS threads; bare-metal targets should
/// drive `Scheduler::poll` directly from a timer ISR instead.
pub struct HostedRunner {
    timer: Timer,
    timers: Vec<TaskTimer>,
    tx: Sender<u16>,
    rx: Option<Receiver<u16>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl HostedRunner {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        HostedRunner { timer: Timer::new(), timers: Vec::new(), tx, rx: Some(rx), dispatcher: None }
    }

    /// Arms a repeating fire signal for `task_id` every `interval_ms`. Call
    /// once per registered task before `start`.
    pub fn arm(&mut self, task_id: u16, interval_ms: i64) {
        let tx = self.tx.clone();
        let guard = self
            .timer
            .schedule_repeating(chrono::Duration::milliseconds(interval_ms), move || {
                let _ = tx.send(task_id);
            });
        self.timers.push(TaskTimer { _guard: guard });
    }

    /// Spawns the dispatcher thread, which owns `scheduler` and `hal` for
    /// the lifetime of the runner and serializes every fire through the
    /// scheduler's process-image lock.
    pub fn start<H>(&mut self, scheduler: Arc<Mutex<Scheduler>>, mut hal: H)
    where
        H: Hal + Send + 'static,
    {
        let rx = match self.rx.take() {
            Some(rx) => rx,
            None => return,
        };
        let handle = std::thread::spawn(move || {
            while let Ok(task_id) = rx.recv() {
                let now_ms = hal.tick() as u64;
                if let Ok(mut sched) = scheduler.lock() {
                    sched.poll_task(task_id, now_ms, &mut hal);
                }
            }
        });
        self.dispatcher = Some(handle);
    }

    /// Drops all timer guards, stopping further fire signals, then waits
    /// briefly for the dispatcher to drain whatever was already queued.
    pub fn stop(&mut self) {
        self.timers.clear();
        drop(self.tx.clone());
        if let Some(handle) = self.dispatcher.take() {
            std::thread::sleep(Duration::from_millis(10));
            drop(handle);
        }
    }
}

impl Default for HostedRunner {
    fn default() -> Self {
        Self::new()
    }
}
