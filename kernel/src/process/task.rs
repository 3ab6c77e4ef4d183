//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 任务控制块 (Task Control Block)
//!
//! 对应 Linux 内核的 `struct task_struct` (include/linux/sched.h)，只保留调度核心需要的字段。
//!
//! 所有权约定：
//! - `flags`、`time_slice`、`parent`、`terminal` 由调度锁保护
//! - `rtc`、`signals` 也由调度锁保护：时钟、键盘、RTC 中断会读写其他任务的这两个字段
//! - `files` 只由任务自己在运行时修改
//! - `ksp` 只在切换原语里读写

use bitflags::bitflags;

use crate::config::{MAX_ARGS_LEN, MAX_NAME_LEN};
use crate::devices::RegionId;
use crate::fs::FdTable;
use crate::rtc::RtcState;
use crate::signal::SignalState;
use crate::terminal::TermId;

use super::table::TaskRef;

bitflags! {
    /// 任务标志
    ///
    /// 对应 Linux 的 PF_* 标志 (include/linux/sched.h)
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct TaskFlags: u32 {
        /// 第一个任务（init），不能退出
        const INIT_TASK      = 1 << 0;
        /// 内核态任务，没有用户内存区 (PF_KTHREAD)
        const KERNEL_TASK    = 1 << 1;
        /// 空闲任务 (PF_IDLE)
        const IDLE_TASK      = 1 << 2;
        /// 拥有自己的终端
        const TERMINAL_OWNER = 1 << 3;
        /// 阻塞在子任务等待队列上
        const WAITING_CHILD  = 1 << 4;
    }
}

/// 任务控制块
pub struct Task {
    /// 槽位是否被占用
    pub valid: bool,
    /// 可执行文件名
    name: [u8; MAX_NAME_LEN],
    name_len: usize,
    /// 参数字符串（不含结尾的 0）
    args: [u8; MAX_ARGS_LEN],
    args_len: usize,
    /// 剩余时间片 (毫秒)，可以减到负数
    pub time_slice: i32,
    pub flags: TaskFlags,
    /// 切出时保存的内核栈指针
    pub ksp: usize,
    /// 等待它退出的父任务（只有 wait 方式创建的任务才有）
    pub parent: Option<TaskRef>,
    /// 用户内存区，内核任务为 None
    pub region: Option<RegionId>,
    /// 所属终端
    pub terminal: TermId,
    /// 打开的文件
    pub files: FdTable,
    /// 虚拟 RTC
    pub rtc: RtcState,
    /// 信号
    pub signals: SignalState,
    /// 是否映射了显存
    pub vidmap: bool,
}

impl Task {
    pub const fn new() -> Self {
        Self {
            valid: false,
            name: [0; MAX_NAME_LEN],
            name_len: 0,
            args: [0; MAX_ARGS_LEN],
            args_len: 0,
            time_slice: 0,
            flags: TaskFlags::empty(),
            ksp: 0,
            parent: None,
            region: None,
            terminal: TermId::NULL,
            files: FdTable::new(),
            rtc: RtcState::new(),
            signals: SignalState::new(),
            vidmap: false,
        }
    }

    /// 重新初始化一个刚分配的槽位
    ///
    /// 名字和参数拷进 PCB 自己的块里，调用者的命令缓冲区之后可能不再可访问。
    pub fn reset(&mut self, name: &[u8], args: &[u8]) {
        *self = Self::new();
        self.valid = true;
        self.name_len = name.len().min(MAX_NAME_LEN);
        self.name[..self.name_len].copy_from_slice(&name[..self.name_len]);
        self.args_len = args.len().min(MAX_ARGS_LEN);
        self.args[..self.args_len].copy_from_slice(&args[..self.args_len]);
    }

    pub fn name(&self) -> &[u8] {
        &self.name[..self.name_len]
    }

    pub fn args(&self) -> &[u8] {
        &self.args[..self.args_len]
    }

    pub fn is_kernel(&self) -> bool {
        self.flags.contains(TaskFlags::KERNEL_TASK)
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

/// `ps` 风格的任务快照
#[derive(Debug, Copy, Clone)]
pub struct TaskInfo {
    pub task: TaskRef,
    name: [u8; MAX_NAME_LEN],
    name_len: usize,
    pub flags: TaskFlags,
    pub time_slice: i32,
    pub terminal: TermId,
    pub parent: Option<TaskRef>,
}

impl TaskInfo {
    pub(crate) fn of(task: TaskRef, pcb: &Task) -> Self {
        Self {
            task,
            name: pcb.name,
            name_len: pcb.name_len,
            flags: pcb.flags,
            time_slice: pcb.time_slice,
            terminal: pcb.terminal,
            parent: pcb.parent,
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name[..self.name_len]
    }
}
