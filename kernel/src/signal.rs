//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 信号处理机制
//!
//! 参考 Linux 内核的信号设计 (kernel/signal.c)，但只有五个信号：
//! - 每个任务一份待处理/屏蔽/保存三个掩码，所有读写都在调度锁内
//! - 发送信号时目标睡在可打断的等待队列上（终端输入、RTC），把它唤醒
//! - 内核出口（系统调用、中断、异常返回前）调用 `deliver_pending` 派发一个信号

use bitflags::bitflags;

use crate::config::ALARM_MS;
use crate::errno::Errno;
use crate::kernel::{Kernel, KernelState};
use crate::process::TaskRef;
use crate::sched::runqueue;

/// 信号数量
pub const NUM_SIGNALS: usize = 5;

/// 被默认动作杀死的任务的退出码（超出 u8 范围，和正常退出区分）
pub const KILLED_STATUS: u32 = 256;

/// 信号编号
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Signal {
    /// 除零异常
    DivZero = 0,
    /// 段错误 / 缺页
    Segfault = 1,
    /// Ctrl+C
    Interrupt = 2,
    /// 焦点任务的周期定时器
    Alarm = 3,
    /// 用户自定义
    User1 = 4,
}

/// 默认动作
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DefaultAction {
    /// 以 `KILLED_STATUS` 结束任务
    Kill,
    /// 忽略
    Ignore,
}

bitflags! {
    /// 信号集合
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct SigSet: u8 {
        const DIV_ZERO  = 1 << 0;
        const SEGFAULT  = 1 << 1;
        const INTERRUPT = 1 << 2;
        const ALARM     = 1 << 3;
        const USER1     = 1 << 4;
    }
}

impl Signal {
    /// 按编号排列的全部信号
    pub const ALL: [Signal; NUM_SIGNALS] = [
        Signal::DivZero,
        Signal::Segfault,
        Signal::Interrupt,
        Signal::Alarm,
        Signal::User1,
    ];

    /// 从用户态传入的编号转换
    pub fn from_number(n: usize) -> Option<Signal> {
        Self::ALL.get(n).copied()
    }

    pub fn number(self) -> usize {
        self as usize
    }

    pub fn mask(self) -> SigSet {
        SigSet::from_bits_truncate(1 << (self as u8))
    }

    pub fn default_action(self) -> DefaultAction {
        match self {
            Signal::DivZero | Signal::Segfault | Signal::Interrupt => DefaultAction::Kill,
            Signal::Alarm | Signal::User1 => DefaultAction::Ignore,
        }
    }
}

/// 每个任务的信号状态
#[derive(Debug, Copy, Clone)]
pub struct SignalState {
    /// 待处理
    pending: SigSet,
    /// 屏蔽
    masked: SigSet,
    /// 进入处理函数前的屏蔽集，sigreturn 时恢复
    saved: SigSet,
    /// 作为焦点任务累计的时间
    alarm_ms: u32,
    /// 用户处理函数地址，0 表示默认动作
    handlers: [usize; NUM_SIGNALS],
}

impl SignalState {
    pub const fn new() -> Self {
        Self {
            pending: SigSet::empty(),
            masked: SigSet::empty(),
            saved: SigSet::empty(),
            alarm_ms: 0,
            handlers: [0; NUM_SIGNALS],
        }
    }

    /// 新任务的初始状态
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// 标记信号待处理（对应 sigaddset(&pending)）
    pub fn raise(&mut self, sig: Signal) {
        self.pending |= sig.mask();
    }

    pub fn is_pending(&self, sig: Signal) -> bool {
        self.pending.contains(sig.mask())
    }

    pub fn masked(&self) -> SigSet {
        self.masked
    }

    pub fn set_handler(&mut self, sig: Signal, handler: usize) {
        self.handlers[sig.number()] = handler;
    }

    pub fn handler(&self, sig: Signal) -> Option<usize> {
        match self.handlers[sig.number()] {
            0 => None,
            addr => Some(addr),
        }
    }

    /// 是否有信号需要打断睡眠：未屏蔽，且有处理函数或默认动作是 Kill
    pub fn interrupts_sleep(&self) -> bool {
        let ready = self.pending & !self.masked;
        Signal::ALL
            .into_iter()
            .filter(|s| ready.contains(s.mask()))
            .any(|s| self.handler(s).is_some() || s.default_action() == DefaultAction::Kill)
    }

    /// 取出编号最小的、未被屏蔽的待处理信号
    pub fn take_deliverable(&mut self) -> Option<Signal> {
        let ready = self.pending & !self.masked;
        let sig = Signal::ALL.into_iter().find(|s| ready.contains(s.mask()))?;
        self.pending.remove(sig.mask());
        Some(sig)
    }

    /// 进入用户处理函数：保存屏蔽集并屏蔽全部信号
    pub fn enter_handler(&mut self) {
        self.saved = self.masked;
        self.masked = SigSet::all();
    }

    /// sigreturn：恢复进入处理函数前的屏蔽集
    pub fn leave_handler(&mut self) {
        self.masked = self.saved;
    }

    /// 累计 alarm 时间，跨过阈值时清零并返回 true
    pub fn add_alarm(&mut self, ms: u32) -> bool {
        self.alarm_ms = self.alarm_ms.saturating_add(ms);
        if self.alarm_ms >= ALARM_MS {
            self.alarm_ms = 0;
            true
        } else {
            false
        }
    }

    pub fn alarm_ms(&self) -> u32 {
        self.alarm_ms
    }
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// 内核出口检查：给当前任务派发一个待处理信号
    ///
    /// 有用户处理函数时交给 `SignalFrames` 构造栈帧；
    /// 否则执行默认动作，Kill 不会返回。
    pub fn deliver_pending(&self) {
        let Some(cur) = self.current() else {
            return;
        };

        let (sig, handler) = {
            let _st = self.state.lock();
            let signals = &mut self.task(cur).signals;
            let Some(sig) = signals.take_deliverable() else {
                return;
            };
            (sig, signals.handler(sig))
        };

        match handler {
            Some(addr) => match self.devices().signals.deliver(cur, sig, addr) {
                Ok(()) => {
                    let _st = self.state.lock();
                    self.task(cur).signals.enter_handler();
                }
                Err(e) => {
                    log::warn!("signal: cannot build frame for {:?} on task {}: {:?}", sig, cur.index(), e);
                    self.kill_current();
                }
            },
            None => match sig.default_action() {
                DefaultAction::Kill => {
                    log::info!("signal: task {} killed by {:?}", cur.index(), sig);
                    self.kill_current();
                }
                DefaultAction::Ignore => {}
            },
        }
    }

    /// 给当前任务注册处理函数
    pub fn set_handler(&self, signum: usize, handler: usize) -> Result<(), Errno> {
        let sig = Signal::from_number(signum).ok_or(Errno::InvalidArgument)?;
        let cur = self.current().ok_or(Errno::NoSuchProcess)?;
        let _st = self.state.lock();
        self.task(cur).signals.set_handler(sig, handler);
        Ok(())
    }

    /// 从用户处理函数返回
    pub fn sigreturn(&self) -> Result<(), Errno> {
        let cur = self.current().ok_or(Errno::NoSuchProcess)?;
        self.devices().signals.restore(cur)?;
        let _st = self.state.lock();
        self.task(cur).signals.leave_handler();
        Ok(())
    }

    /// 给焦点任务发送信号（Ctrl+C）
    pub(crate) fn raise_foreground(&self, sig: Signal) {
        let mut st = self.state.lock();
        if let Some(task) = st.focus.task() {
            self.raise_locked(&mut st, task, sig);
        }
    }

    /// 给任务发送信号，调用者持有调度锁
    ///
    /// 对应 Linux 的 signal_wake_up()：信号需要处理而目标睡在可打断的等待队列上时，
    /// 把它放回运行队列头部，由它自己在内核出口处理。
    pub(crate) fn raise_locked(&self, st: &mut KernelState, task: TaskRef, sig: Signal) {
        let signals = &mut self.task(task).signals;
        signals.raise(sig);
        if !signals.interrupts_sleep() {
            return;
        }
        if runqueue::list_of(&st.lists, task).is_some_and(runqueue::is_interruptible) {
            log::debug!("signal: {:?} wakes task {}", sig, task.index());
            self.wake_locked(st, task);
        }
    }

    fn kill_current(&self) {
        let _ = self.halt_exception();
    }
}
