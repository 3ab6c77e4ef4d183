//! 启动任务
//!
//! 对应 Linux 的 kernel_init() 与 cpu_idle 循环：
//! - `init_main`: 第一个任务，创建空闲任务后不断在新终端上重启 shell
//! - `idle_main`: 空闲任务，开中断等待下一个中断

use crate::kernel::Kernel;

use super::exec::WaitMode;

/// 空闲任务
pub fn idle_main(kernel: &'static Kernel) {
    loop {
        kernel.machine().wait_for_interrupt(kernel);
    }
}

/// init 任务
pub fn init_main(kernel: &'static Kernel) {
    if let Err(e) = kernel.execute(b"idle", WaitMode::SpawnIdle, false, Some(idle_main)) {
        log::error!("init: cannot start idle task: {:?}", e);
    }

    loop {
        match kernel.execute(b"shell", WaitMode::Yes, true, None) {
            Ok(status) => log::info!("init: shell exited with status {}", status),
            Err(e) => {
                log::warn!("init: cannot start shell: {:?}", e);
                kernel.yield_now();
            }
        }
    }
}
