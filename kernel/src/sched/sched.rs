//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 调度器实现
//!
//! 参考 Linux 内核的调度入口 (kernel/sched/core.c)：
//! - scheduler_tick() → `Kernel::timer_tick`
//! - schedule() / context_switch() → `Kernel::switch_to`
//! - wake_up_process() → `Kernel::wake_locked`
//!
//! 当前实现: 单核时间片轮转。运行队列严格 FIFO，没有优先级；
//! 被唤醒的任务插到队首，空闲任务只在没有其他可运行任务时被调度。
//!
//! 时间片只在任务被放到队首或队尾的那一刻补满。

use crate::arch::IRQ_TIMER;
use crate::config::{RENDER_INTERVAL_TICKS, TICK_MS, TIME_SLICE_MS};
use crate::errno::Errno;
use crate::kernel::{Kernel, KernelState};
use crate::process::{TaskFlags, TaskRef};
use crate::signal::Signal;
use crate::sync::IrqLockGuard;

use super::runqueue::{self, RUN_QUEUE};

impl Kernel {
    /// 时钟中断处理
    ///
    /// 对应 Linux 的 scheduler_tick()，顺序：
    /// 1. 确认中断
    /// 2. 周期性工作：渲染、焦点任务的 alarm 计时
    /// 3. 空闲任务无条件轮转到队尾
    /// 4. 其他任务扣减时间片，用完则补满并轮转
    pub fn timer_tick(&self) {
        self.machine().end_of_interrupt(IRQ_TIMER);

        let Some(cur) = self.current() else {
            return;
        };

        let mut st = self.state.lock();
        st.ticks += 1;
        if st.ticks % RENDER_INTERVAL_TICKS == 0 {
            self.devices().windows.render();
        }
        if let Some(focused) = st.focus.task() {
            if self.task(focused).signals.add_alarm(TICK_MS as u32) {
                self.raise_locked(&mut st, focused, Signal::Alarm);
            }
        }

        if !st.lists.contains(RUN_QUEUE, cur.index()) {
            log::error!("sched: tick on task {} which is not runnable", cur.index());
            debug_assert!(false, "running task off the run queue");
            return;
        }

        let next = if st.idle == Some(cur) {
            runqueue::move_to_tail(&mut st.lists, cur);
            st.pick_next()
        } else {
            let task = self.task(cur);
            task.time_slice -= TICK_MS;
            if task.time_slice <= 0 {
                task.time_slice = TIME_SLICE_MS;
                runqueue::move_to_tail(&mut st.lists, cur);
                st.pick_next()
            } else {
                None
            }
        };

        match next {
            Some(next) if next != cur => self.switch_to(st, cur, next),
            _ => drop(st),
        }

        // 中断出口
        self.deliver_pending();
    }

    /// 主动让出 CPU
    ///
    /// 等价于时间片用完。只能在任务上下文中调用。
    pub fn yield_now(&self) {
        let Some(cur) = self.current() else {
            return;
        };
        let mut st = self.state.lock();
        if st.idle != Some(cur) {
            self.task(cur).time_slice = TIME_SLICE_MS;
        }
        runqueue::move_to_tail(&mut st.lists, cur);
        match st.pick_next() {
            Some(next) if next != cur => self.switch_to(st, cur, next),
            _ => {}
        }
    }

    /// 唤醒任务：补满时间片并插到运行队列头部
    ///
    /// 对应 Linux 的 wake_up_process()，调用者持有调度锁。
    pub(crate) fn wake_locked(&self, st: &mut KernelState, task: TaskRef) {
        if st.idle != Some(task) {
            self.task(task).time_slice = TIME_SLICE_MS;
        }
        runqueue::insert_to_head(&mut st.lists, task);
    }

    /// 把当前任务挂到等待队列 `head` 上并切换出去
    ///
    /// 被唤醒后返回 Ok。没有任何可运行任务时（连空闲任务都没有）
    /// 把任务放回运行队列并返回 ResourceDeadlock。
    pub(crate) fn block_on(
        &self,
        st: IrqLockGuard<'_, KernelState>,
        cur: TaskRef,
        head: usize,
    ) -> Result<(), Errno> {
        let mut st = st;
        runqueue::move_to_list(&mut st.lists, cur, head);
        match st.pick_next() {
            Some(next) => {
                self.switch_to(st, cur, next);
                Ok(())
            }
            None => {
                runqueue::insert_to_head(&mut st.lists, cur);
                Err(Errno::ResourceDeadlock)
            }
        }
    }

    /// 切换前的准备：视频输出目标、内存区、TSS 内核栈
    ///
    /// TSS 必须在切换完成之前指向目标任务的内核栈，
    /// 否则切换后立刻到来的中断会压到别的任务栈上。
    pub(crate) fn prepare_switch(&self, next: TaskRef) {
        let task = self.task(next);
        let devices = self.devices();

        devices.video.set_running(task.terminal);
        if let Some(region) = task.region {
            devices.memory.set_active(region);
        }
        self.machine().set_kernel_stack(self.tasks.kstack_top(next));
    }

    /// 上下文切换（对应 Linux 的 context_switch()）
    ///
    /// 释放调度锁但保持关中断，切换回来后守卫析构恢复中断状态。
    pub(crate) fn switch_to(&self, st: IrqLockGuard<'_, KernelState>, cur: TaskRef, next: TaskRef) {
        if self.task(next).flags.contains(TaskFlags::WAITING_CHILD) {
            log::error!("sched: task {} scheduled while waiting for a child", next.index());
            debug_assert!(false, "waiting task on the run queue");
        }
        self.prepare_switch(next);

        #[cfg(feature = "debug_log")]
        log::trace!("sched: switch {} -> {}", cur.index(), next.index());

        let save = &mut self.task(cur).ksp as *mut usize;
        let target = self.task(next).ksp;
        let _irq = st.unlock();
        // SAFETY: 中断已关闭；target 是 next 上一次切出时保存的栈指针
        unsafe { self.machine().switch(save, target) };
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{RENDER_INTERVAL_TICKS, TICK_MS, TIME_SLICE_MS};
    use crate::kernel::Kernel;
    use crate::process::WaitMode;
    use crate::testing::{interrupt, report, settle, Rig};

    fn quantum_body(k: &'static Kernel) {
        let me = k.current().unwrap();
        report(k, "start", k.task(me).time_slice as i64);
        let ticks = TIME_SLICE_MS / TICK_MS;
        for i in 0..ticks {
            interrupt(k, |k| k.timer_tick());
            report(k, "slice", i64::from(i) * 1000 + k.task(me).time_slice as i64);
        }
        settle(k);
    }

    fn quantum_init(k: &'static Kernel) {
        k.execute(b"idle", WaitMode::SpawnIdle, false, Some(crate::process::idle_main))
            .unwrap();
        k.execute(b"quantum", WaitMode::No, false, Some(quantum_body)).unwrap();
        settle(k);
    }

    #[test]
    fn test_quantum_strictly_decreases_until_refill() {
        let rig = Rig::new();
        rig.boot(quantum_init);

        assert_eq!(rig.expect("start"), TIME_SLICE_MS as i64);
        let ticks = TIME_SLICE_MS / TICK_MS;
        for i in 0..ticks {
            let got = rig.expect("slice");
            let slice = got - i64::from(i) * 1000;
            if i + 1 < ticks {
                assert_eq!(slice, (TIME_SLICE_MS - (i + 1) * TICK_MS) as i64);
            } else {
                // 用完后补满，并且是被切换回来之后才观察到的
                assert_eq!(slice, TIME_SLICE_MS as i64);
            }
        }

        // 持锁读取，时钟中断不会在两次读之间推进
        let st = rig.kernel.state.lock();
        assert!(st.ticks >= u64::from(ticks as u32));
        assert_eq!(rig.windows.renders() as u64, st.ticks / RENDER_INTERVAL_TICKS);
    }

    fn spinner(k: &'static Kernel) {
        for _ in 0..20 {
            interrupt(k, |k| k.timer_tick());
        }
        report(k, "spun", k.current().unwrap().index() as i64);
        settle(k);
    }

    fn idle_exclusion_init(k: &'static Kernel) {
        k.execute(b"idle", WaitMode::SpawnIdle, false, Some(crate::process::idle_main))
            .unwrap();
        k.execute(b"a", WaitMode::No, false, Some(spinner)).unwrap();
        k.execute(b"b", WaitMode::No, false, Some(spinner)).unwrap();
        settle(k);
    }

    #[test]
    fn test_idle_never_dispatched_while_others_runnable() {
        let rig = Rig::new();
        rig.boot(idle_exclusion_init);

        rig.expect("spun");
        rig.expect("spun");

        let idle = rig.find_task(b"idle").expect("idle task");
        let dispatched = rig.dispatched();
        assert!(!dispatched.is_empty());
        assert!(
            dispatched.iter().all(|&slot| slot != Some(idle.index())),
            "idle dispatched: {:?}",
            dispatched
        );
    }

    fn yielder(k: &'static Kernel) {
        let me = k.current().unwrap().index() as i64;
        for _ in 0..3 {
            report(k, "turn", me);
            k.yield_now();
        }
        settle(k);
    }

    fn yield_init(k: &'static Kernel) {
        k.execute(b"idle", WaitMode::SpawnIdle, false, Some(crate::process::idle_main))
            .unwrap();
        k.execute(b"y1", WaitMode::No, false, Some(yielder)).unwrap();
        k.execute(b"y2", WaitMode::No, false, Some(yielder)).unwrap();
        settle(k);
    }

    #[test]
    fn test_yield_passes_cpu() {
        let rig = Rig::new();
        rig.boot(yield_init);

        let turns: Vec<i64> = (0..6).map(|_| rig.expect("turn")).collect();
        let y1 = rig.find_task(b"y1").unwrap().index() as i64;
        let y2 = rig.find_task(b"y2").unwrap().index() as i64;
        assert_eq!(turns.iter().filter(|&&t| t == y1).count(), 3);
        assert_eq!(turns.iter().filter(|&&t| t == y2).count(), 3);
    }
}
