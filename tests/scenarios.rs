//! End-to-end scenarios driving the loader, VM and scheduler together
//! through the public API, the way a host integration would.

use zplc::hal::mock::MockHal;
use zplc::loader::{load, LoadMode};
use zplc::memory::{MemoryConfig, MemoryImage, CODE_BASE};
use zplc::opcode::op;
use zplc::scheduler::{IoKind, IoMapping, Scheduler, SchedulerConfig};
use zplc::task::{TaskConfig, TaskType};
use zplc::vm::{Vm, VmConfig, VmStatus};

fn le16(addr: u16) -> [u8; 2] {
    addr.to_le_bytes()
}

fn load_code(code: &[u8]) -> MemoryImage {
    let mut mem = MemoryImage::new(MemoryConfig::default());
    load(code, &mut mem, LoadMode::Raw).unwrap();
    mem
}

#[test]
fn blinky_toggles_every_cycle() {
    // LOAD8 0x1000; PUSH8 1; XOR; STORE8 0x1000; HALT
    let mut code = vec![op::LOAD8];
    code.extend_from_slice(&le16(0x1000));
    code.push(op::PUSH8);
    code.push(1);
    code.push(op::XOR);
    code.push(op::STORE8);
    code.extend_from_slice(&le16(0x1000));
    code.push(op::HALT);

    let mut mem = load_code(&code);
    let mut hal = MockHal::new();
    let mut vm = Vm::new(VmConfig::default());

    for cycle in 1..=6u32 {
        let status = vm.run_cycle(CODE_BASE, 1000, &mut mem, &mut hal);
        assert_eq!(status, VmStatus::Halted);
        let expected = if cycle % 2 == 0 { 0 } else { 1 };
        assert_eq!(mem.read_u8(0x1000).unwrap(), expected, "cycle {cycle}");
    }
}

#[test]
fn temperature_conversion_celsius_to_fahrenheit() {
    // LOAD16 0x0000; I2F; PUSH32(9.0 bits); MULF; PUSH32(5.0 bits); DIVF;
    // PUSH32(32.0 bits); ADDF; F2I; STORE32 0x1000; HALT
    let mut code = vec![op::LOAD16];
    code.extend_from_slice(&le16(0x0000));
    code.push(op::I2F);
    code.push(op::PUSH32);
    code.extend_from_slice(&9.0f32.to_bits().to_le_bytes());
    code.push(op::MULF);
    code.push(op::PUSH32);
    code.extend_from_slice(&5.0f32.to_bits().to_le_bytes());
    code.push(op::DIVF);
    code.push(op::PUSH32);
    code.extend_from_slice(&32.0f32.to_bits().to_le_bytes());
    code.push(op::ADDF);
    code.push(op::F2I);
    code.push(op::STORE32);
    code.extend_from_slice(&le16(0x1000));
    code.push(op::HALT);

    let mut mem = load_code(&code);
    mem.write_u16(0x0000, 25).unwrap();
    let mut hal = MockHal::new();
    let mut vm = Vm::new(VmConfig::default());

    let status = vm.run_cycle(CODE_BASE, 1000, &mut mem, &mut hal);
    assert_eq!(status, VmStatus::Halted);
    assert_eq!(mem.read_u32(0x1000).unwrap() & 0xFFFF, 77);
}

#[test]
fn bounded_loop_increments_output_ten_times() {
    // OPI[0x1000] = 0; WORK[0x2000] = 0
    // loop: LOAD32 0x1000; PUSH8 1; ADD; STORE32 0x1000
    //       LOAD32 0x2000; PUSH8 1; ADD; STORE32 0x2000
    //       LOAD32 0x2000; PUSH8 10; LT; JRNZ loop
    //       HALT
    let loop_body = {
        let mut b = Vec::new();
        b.push(op::LOAD32);
        b.extend_from_slice(&le16(0x1000));
        b.push(op::PUSH8);
        b.push(1);
        b.push(op::ADD);
        b.push(op::STORE32);
        b.extend_from_slice(&le16(0x1000));
        b.push(op::LOAD32);
        b.extend_from_slice(&le16(0x2000));
        b.push(op::PUSH8);
        b.push(1);
        b.push(op::ADD);
        b.push(op::STORE32);
        b.extend_from_slice(&le16(0x2000));
        b.push(op::LOAD32);
        b.extend_from_slice(&le16(0x2000));
        b.push(op::PUSH8);
        b.push(10);
        b.push(op::LT);
        b
    };
    let loop_len = loop_body.len() as i32;
    let mut code = loop_body;
    // JRNZ back to the start of the loop body: offset is relative to the
    // address right after this instruction (2 bytes: opcode + i8 operand).
    let back_offset = -(loop_len + 2);
    code.push(op::JRNZ);
    code.push(back_offset as i8 as u8);
    code.push(op::HALT);

    let mut mem = load_code(&code);
    let mut hal = MockHal::new();
    let mut vm = Vm::new(VmConfig::default());

    let status = vm.run_cycle(CODE_BASE, 10_000, &mut mem, &mut hal);
    assert_eq!(status, VmStatus::Halted);
    assert_eq!(mem.read_u32(0x1000).unwrap(), 10);
    assert_eq!(mem.read_u32(0x2000).unwrap(), 10);
}

#[test]
fn scheduler_runs_each_task_roughly_proportional_to_its_interval() {
    let mut scheduler = Scheduler::new(MemoryConfig::default(), SchedulerConfig::default());
    {
        let mut guard = scheduler.image.lock(-1).unwrap();
        load(&[op::HALT], &mut guard, LoadMode::Raw).unwrap();
    }
    let fast = TaskConfig { id: 0, task_type: TaskType::Cyclic, priority: 1, interval_us: 10_000, entry_point: 0x5000, stack_size: 0 };
    let slow = TaskConfig { id: 1, task_type: TaskType::Cyclic, priority: 1, interval_us: 50_000, entry_point: 0x5000, stack_size: 0 };
    scheduler.register_task(fast, VmConfig::default()).unwrap();
    scheduler.register_task(slow, VmConfig::default()).unwrap();

    let mut hal = MockHal::new();
    let total_ms: u64 = 500;
    for now_ms in 0..total_ms {
        scheduler.poll(now_ms, &mut hal);
    }

    let fast_scans = scheduler.task_stats(0).unwrap().scan_count;
    let slow_scans = scheduler.task_stats(1).unwrap().scan_count;
    let expected_fast = total_ms / 10;
    let expected_slow = total_ms / 50;
    assert!((fast_scans as i64 - expected_fast as i64).abs() <= 1);
    assert!((slow_scans as i64 - expected_slow as i64).abs() <= 1);
}

#[test]
fn scheduler_flushes_outputs_written_before_a_watchdog_timeout() {
    // STORE a marker into OPI, then loop forever.
    let mut code = vec![op::PUSH8, 0x2A, op::STORE8];
    code.extend_from_slice(&le16(0x1000));
    code.push(op::JMP);
    code.extend_from_slice(&CODE_BASE.to_le_bytes());

    let mut scheduler = Scheduler::new(MemoryConfig::default(), SchedulerConfig::default());
    {
        let mut guard = scheduler.image.lock(-1).unwrap();
        load(&code, &mut guard, LoadMode::Raw).unwrap();
    }
    let cfg = TaskConfig { id: 0, task_type: TaskType::Cyclic, priority: 1, interval_us: 1000, entry_point: 0x5000, stack_size: 0 };
    scheduler.register_task(cfg, VmConfig::default()).unwrap();

    let mut hal = MockHal::new();
    scheduler.poll(0, &mut hal);

    assert_eq!(scheduler.stats().total_cycles, 1);
    let guard = scheduler.image.lock(-1).unwrap();
    assert_eq!(guard.read_u8(0x1000).unwrap(), 0x2A);
}

#[test]
fn io_mapping_latches_gpio_input_and_output() {
    let mapping_in = IoMapping { channel: 3, addr: 0x0000, kind: IoKind::Gpio };
    let mapping_out = IoMapping { channel: 7, addr: 0x1000, kind: IoKind::Gpio };
    let config = SchedulerConfig { input_map: vec![mapping_in], output_map: vec![mapping_out] };
    let mut scheduler = Scheduler::new(MemoryConfig::default(), config);

    // Copy IPI[0] straight to OPI[0x1000]: LOAD8 0; STORE8 0x1000; HALT
    let mut code = vec![op::LOAD8];
    code.extend_from_slice(&le16(0x0000));
    code.push(op::STORE8);
    code.extend_from_slice(&le16(0x1000));
    code.push(op::HALT);
    {
        let mut guard = scheduler.image.lock(-1).unwrap();
        load(&code, &mut guard, LoadMode::Raw).unwrap();
    }
    let cfg = TaskConfig { id: 0, task_type: TaskType::Cyclic, priority: 1, interval_us: 10_000, entry_point: 0x5000, stack_size: 0 };
    scheduler.register_task(cfg, VmConfig::default()).unwrap();

    let mut hal = MockHal::new();
    hal.gpio.insert(3, true);
    scheduler.poll(0, &mut hal);

    assert_eq!(hal.gpio.get(&7), Some(&true));
}
