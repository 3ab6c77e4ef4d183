//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! tern: x86 教学内核的任务核心
//!
//! 抢占式时间片轮转调度、PCB 槽位表、上下文切换、execute/halt 生命周期
//! 以及多终端焦点管理。文件系统、分页、显存、窗口和驱动都是外部协作者，
//! 通过 [`devices`] 里的 trait 接入；处理器通过 [`arch::Machine`] 接入。
//!
//! 启动流程（由启动代码完成）：
//! 1. `console::init()`、`logger::init()`
//! 2. 构造 `Kernel::new(machine, devices, &TASK_TABLE)`
//! 3. 把时钟、键盘、RTC 中断和异常分别接到 `timer_tick` / `keyboard` / `rtc_tick` / `exception`，
//!    软中断接到 `syscall::dispatch`
//! 4. `kernel.start(process::init_main)`

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod errno;
pub mod print;
pub mod console;
pub mod logger;
pub mod list;
pub mod sync;
pub mod arch;
pub mod devices;
pub mod fs;
pub mod process;
pub mod sched;
pub mod terminal;
pub mod signal;
pub mod rtc;
pub mod kernel;
pub mod syscall;

#[cfg(test)]
mod testing;

pub use errno::Errno;
pub use kernel::Kernel;
