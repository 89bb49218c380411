//! Reference host binary: loads a `.zplc` file from argv, runs its tasks on
//! a manual poll loop for a bounded number of cycles, and prints scheduler
//! statistics. This is a smoke-test harness, not the IDE/shell tooling a
//! production deployment would ship.

use std::env;
use std::fs;
use std::process::ExitCode;

use zplc::hal::host::HostHal;
use zplc::hal::Hal;
use zplc::loader::{self, LoadMode};
use zplc::memory::MemoryConfig;
use zplc::scheduler::{Scheduler, SchedulerConfig};
use zplc::task::{TaskConfig, TaskType};
use zplc::vm::VmConfig;

const DEFAULT_CYCLES: u64 = 1000;

fn main() -> ExitCode {
    env_logger::init();

    let mut args = env::args().skip(1);
    let path = match args.next() {
        Some(p) => p,
        None => {
            eprintln!("usage: zplc-run <program.zplc>");
            return ExitCode::FAILURE;
        }
    };

    let bytes = match fs::read(&path) {
        Ok(b) => b,
        Err(e) => {
            log::error!("failed to read {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut scheduler = Scheduler::new(MemoryConfig::default(), SchedulerConfig::default());
    let artifact = {
        let mut guard = scheduler.image.lock(-1).unwrap();
        match loader::load(&bytes, &mut guard, LoadMode::Normal) {
            Ok(a) => a,
            Err(e) => {
                log::error!("load failed: {e}");
                return ExitCode::FAILURE;
            }
        }
    };

    if artifact.tasks.is_empty() {
        log::warn!("artifact has no task table; registering an implicit task at the entry point");
        let cfg = TaskConfig {
            id: 0,
            task_type: TaskType::Cyclic,
            priority: 0,
            interval_us: 10_000,
            entry_point: artifact.entry_point,
            stack_size: 0,
        };
        scheduler.register_task(cfg, VmConfig::default()).unwrap();
    } else {
        for task_def in &artifact.tasks {
            let cfg = TaskConfig {
                id: task_def.id,
                task_type: TaskType::from_byte(task_def.task_type),
                priority: task_def.priority,
                interval_us: task_def.interval_us.max(1),
                entry_point: task_def.entry_point,
                stack_size: task_def.stack_size,
            };
            if scheduler.register_task(cfg, VmConfig::default()).is_err() {
                log::warn!("dropping task {} past the maximum registered task count", task_def.id);
            }
        }
    }

    let store_dir = env::temp_dir().join("zplc-store");
    let mut hal = HostHal::new(store_dir);
    hal.init();

    if let Err(e) = scheduler.load_retain_from_hal(&mut hal) {
        log::warn!("failed to restore retentive memory: {e:?}");
    }

    for cycle in 0..DEFAULT_CYCLES {
        scheduler.poll(cycle, &mut hal);
    }

    if let Err(e) = scheduler.save_retain_to_hal(&mut hal) {
        log::warn!("failed to persist retentive memory on shutdown: {e:?}");
    }
    hal.shutdown();

    let stats = scheduler.stats();
    println!("cycles: {}  overruns: {}  tasks: {}", stats.total_cycles, stats.total_overruns, scheduler.task_count());
    ExitCode::SUCCESS
}
