//! 虚拟 RTC
//!
//! 硬件 RTC 固定以 `RTC_BASE_HZ` 触发中断，`Kernel::rtc_tick` 递增一个全局计数。
//! 每个任务有自己的虚拟频率和下一次就绪的截止计数：read 挂到 RTC 等待队列上，
//! 中断处理唤醒截止计数已到的任务。

use crate::config::{RTC_BASE_HZ, RTC_DEFAULT_HZ};
use crate::errno::Errno;
use crate::fs::FileDesc;
use crate::kernel::Kernel;
use crate::process::TaskRef;
use crate::sched::runqueue::RTC_WAIT;

/// 每个任务的虚拟 RTC 控制块
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RtcState {
    /// 虚拟频率
    rate_hz: u32,
    /// 下一次 read 返回时的全局计数
    deadline: u64,
}

impl RtcState {
    pub const fn new() -> Self {
        Self {
            rate_hz: RTC_DEFAULT_HZ,
            deadline: 0,
        }
    }

    /// 每个虚拟周期对应的硬件中断数
    pub fn interval(&self) -> u64 {
        u64::from(RTC_BASE_HZ / self.rate_hz)
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    /// 设置频率：2 到 `RTC_BASE_HZ` 之间的 2 的幂
    pub fn set_rate(&mut self, hz: u32, now: u64) -> Result<(), Errno> {
        if !(2..=RTC_BASE_HZ).contains(&hz) || !hz.is_power_of_two() {
            return Err(Errno::InvalidArgument);
        }
        self.rate_hz = hz;
        self.deadline = now + self.interval();
        Ok(())
    }

    /// 恢复默认频率
    pub fn reset(&mut self, now: u64) {
        self.rate_hz = RTC_DEFAULT_HZ;
        self.deadline = now + self.interval();
    }

    /// 是否已到截止计数
    pub fn due(&self, now: u64) -> bool {
        now >= self.deadline
    }

    /// 到达截止计数时推进到下一个周期并返回 true
    pub fn poll(&mut self, now: u64) -> bool {
        if !self.due(now) {
            return false;
        }
        self.deadline = now + self.interval();
        true
    }
}

impl Default for RtcState {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn rtc_open(kernel: &Kernel, _desc: &mut FileDesc) -> Result<(), Errno> {
    let cur = kernel.current().ok_or(Errno::NoSuchProcess)?;
    let st = kernel.state.lock();
    kernel.task(cur).rtc.reset(st.rtc_ticks);
    Ok(())
}

pub(crate) fn rtc_close(_kernel: &Kernel, _desc: &mut FileDesc) -> Result<(), Errno> {
    Ok(())
}

/// 阻塞到下一个虚拟中断，可以被信号打断
pub(crate) fn rtc_read(kernel: &Kernel, _desc: &mut FileDesc, _buf: &mut [u8]) -> Result<usize, Errno> {
    let cur = kernel.current().ok_or(Errno::NoSuchProcess)?;
    loop {
        let st = kernel.state.lock();
        let task = kernel.task(cur);
        if task.rtc.poll(st.rtc_ticks) {
            return Ok(0);
        }
        if task.signals.interrupts_sleep() {
            return Err(Errno::Interrupted);
        }
        kernel.block_on(st, cur, RTC_WAIT)?;
    }
}

/// 写入 4 字节频率
pub(crate) fn rtc_write(kernel: &Kernel, _desc: &mut FileDesc, buf: &[u8]) -> Result<usize, Errno> {
    let bytes: [u8; 4] = buf
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(Errno::InvalidArgument)?;
    let cur = kernel.current().ok_or(Errno::NoSuchProcess)?;
    let st = kernel.state.lock();
    kernel.task(cur).rtc.set_rate(u32::from_le_bytes(bytes), st.rtc_ticks)?;
    Ok(4)
}

impl Kernel {
    /// RTC 中断处理（`RTC_BASE_HZ`）
    ///
    /// 递增全局计数，唤醒所有截止计数已到的读者。
    pub fn rtc_tick(&self) {
        let mut st = self.state.lock();
        st.rtc_ticks += 1;
        let now = st.rtc_ticks;
        loop {
            let due = st
                .lists
                .iter(RTC_WAIT)
                .map(TaskRef::from_index)
                .find(|&t| self.task(t).rtc.due(now));
            let Some(task) = due else {
                break;
            };
            self.wake_locked(&mut st, task);
        }
        drop(st);
        self.machine().end_of_interrupt(crate::arch::IRQ_RTC);
        self.deliver_pending();
    }
}
