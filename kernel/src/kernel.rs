//! 内核对象
//!
//! 启动代码构造一个 [`Kernel`]，之后所有中断入口和系统调用都经过它：
//! - `timer_tick` / `keyboard` / `rtc_tick` / `exception`: 中断和异常
//! - `syscall::dispatch`: 系统调用
//! - `start`: 启动 init，永不返回
//!
//! 全局可变状态（链表、终端表、焦点）集中在一个 [`KernelState`] 里，
//! 由唯一的 [`IrqLock`] 保护；PCB 放在 [`TaskTable`] 的槽位里。

use core::cell::UnsafeCell;

use crate::arch::{Machine, TaskFn};
use crate::config::{KERNEL_NAME, KERNEL_VERSION, MAX_TASKS};
use crate::devices::{Devices, RegionId};
use crate::process::{Task, TaskInfo, TaskRef, TaskTable, WaitMode};
use crate::sched::runqueue::{self, TaskLists};
use crate::signal::Signal;
use crate::sync::IrqLock;
use crate::terminal::{Focus, TermId, TerminalTable};

/// 调度锁保护的全局状态
pub struct KernelState {
    /// 运行队列、等待队列
    pub lists: TaskLists,
    /// 已分配的槽位数
    pub live: usize,
    /// 空闲任务
    pub idle: Option<TaskRef>,
    /// init 任务
    pub init: Option<TaskRef>,
    /// 时钟中断计数
    pub ticks: u64,
    /// RTC 中断计数
    pub rtc_ticks: u64,
    pub terminals: TerminalTable,
    pub focus: Focus,
}

impl KernelState {
    pub const fn new() -> Self {
        Self {
            lists: TaskLists::new(),
            live: 0,
            idle: None,
            init: None,
            ticks: 0,
            rtc_ticks: 0,
            terminals: TerminalTable::new(),
            focus: Focus::new(),
        }
    }

    /// 下一个要运行的任务，空闲任务排在最后
    pub fn pick_next(&mut self) -> Option<TaskRef> {
        runqueue::pick_next(&mut self.lists, self.idle)
    }
}

impl Default for KernelState {
    fn default() -> Self {
        Self::new()
    }
}

/// 内核
pub struct Kernel {
    machine: &'static dyn Machine,
    devices: Devices,
    pub(crate) tasks: &'static TaskTable,
    pub(crate) state: IrqLock<KernelState>,
    /// 启动栈在第一次 launch 时保存的栈指针，之后不会再被恢复
    pub(crate) boot_ksp: UnsafeCell<usize>,
}

// SAFETY: 单核；boot_ksp 只在第一次 launch 时写一次，其余可变状态在 IrqLock 内
unsafe impl Sync for Kernel {}

impl Kernel {
    pub fn new(machine: &'static dyn Machine, devices: Devices, tasks: &'static TaskTable) -> Self {
        Self {
            machine,
            devices,
            tasks,
            state: IrqLock::new(machine, KernelState::new()),
            boot_ksp: UnsafeCell::new(0),
        }
    }

    /// 启动 init 任务，永不返回
    pub fn start(&'static self, init: TaskFn) -> ! {
        log::info!("{} v{}: starting init", KERNEL_NAME, KERNEL_VERSION);
        if let Err(e) = self.execute(b"init", WaitMode::No, false, Some(init)) {
            log::error!("kernel: cannot start init: {:?}", e);
        }
        // 启动栈没有挂在任何链表上，不会被再次调度
        self.machine.halt_forever()
    }

    pub fn machine(&self) -> &'static dyn Machine {
        self.machine
    }

    pub fn devices(&self) -> Devices {
        self.devices
    }

    /// 当前任务：栈指针所在的 PCB 块
    ///
    /// 启动栈不在槽位表里，返回 None。
    pub fn current(&self) -> Option<TaskRef> {
        let task = self.tasks.slot_of(self.machine.stack_pointer())?;
        // SAFETY: 只读 valid 标志
        unsafe { (*self.tasks.task_ptr(task)).valid }.then_some(task)
    }

    /// PCB 访问
    ///
    /// 共享字段由调度锁保护，私有字段只由任务自己访问，见 `process::task`。
    #[allow(clippy::mut_from_ref)]
    pub(crate) fn task(&self, task: TaskRef) -> &mut Task {
        // SAFETY: 槽位表在内核生命周期内不会移动；并发访问遵守上面的约定
        unsafe { &mut *self.tasks.task_ptr(task) }
    }

    /// 当前任务的内存区
    pub(crate) fn current_region(&self) -> Option<RegionId> {
        self.current().and_then(|t| self.task(t).region)
    }

    /// 处理器异常
    ///
    /// 0 号（除零）发 DivZero，13/14 号（保护错误、缺页）发 Segfault，
    /// 其余异常直接以 256 结束任务。随后在内核出口派发信号。
    pub fn exception(&self, vector: u8) {
        let Some(cur) = self.current() else {
            log::error!("kernel: exception {} with no running task", vector);
            self.machine.halt_forever();
        };

        let signal = match vector {
            0 => Signal::DivZero,
            13 | 14 => Signal::Segfault,
            _ => {
                log::warn!("kernel: exception {} in task {}", vector, cur.index());
                let _ = self.halt_exception();
                return;
            }
        };
        self.raise_locked(&mut self.state.lock(), cur, signal);
        self.deliver_pending();
    }

    /// 所有任务的快照（对应 ps）
    pub fn tasks(&self) -> [Option<TaskInfo>; MAX_TASKS] {
        let _st = self.state.lock();
        let mut out = [None; MAX_TASKS];
        for (i, slot) in out.iter_mut().enumerate() {
            let task = TaskRef::from_index(i);
            let pcb = self.task(task);
            if pcb.valid {
                *slot = Some(TaskInfo::of(task, pcb));
            }
        }
        out
    }

    /// 已分配的槽位数
    pub fn live_tasks(&self) -> usize {
        self.state.lock().live
    }

    /// 已分配的终端数
    pub fn terminals_in_use(&self) -> usize {
        self.state.lock().terminals.in_use()
    }

    /// 时钟中断计数
    pub fn ticks(&self) -> u64 {
        self.state.lock().ticks
    }

    /// 终端的拥有者
    pub fn terminal_owner(&self, term: TermId) -> Option<TaskRef> {
        self.state.lock().terminals.get(term).and_then(|t| t.owner)
    }
}
