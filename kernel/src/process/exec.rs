//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 任务生命周期：execute / halt / getargs / vidmap
//!
//! 对应 Linux 的 kernel_execve() + do_exit()，但父任务的等待是同步的：
//! `execute(.., WaitMode::Yes, ..)` 在子任务 halt 之前不会返回，返回值就是子任务的退出码。
//!
//! execute 的每一步失败都只回滚已经完成的步骤（逆序），
//! 失败返回时不会留下任何已分配的槽位、终端、显存缓冲、窗口或内存区。

use core::convert::Infallible;

use crate::arch::{Entry, TaskFn};
use crate::config::{KERNEL_NAME, MAX_ARGS_LEN, MAX_NAME_LEN, MAX_TASKS, TIME_SLICE_MS, USER_STACK_TOP};
use crate::errno::Errno;
use crate::fs::{STDIN_OPS, STDOUT_OPS};
use crate::kernel::{Kernel, KernelState};
use crate::println;
use crate::sched::runqueue::{self, CHILD_WAIT};
use crate::signal::KILLED_STATUS;
use crate::terminal::TermId;

use super::table::TaskRef;
use super::task::TaskFlags;

/// 调用者是否等待新任务
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WaitMode {
    /// 阻塞到子任务退出，返回它的退出码
    Yes,
    /// 不等待，新任务开始运行后调用者排在它后面
    No,
    /// 创建空闲任务（不等待，时间片为 0）
    SpawnIdle,
}

/// 拆分命令行：第一个空格之前是可执行文件名，之后（去掉两端空格）是参数
pub fn parse_command(command: &[u8]) -> Result<(&[u8], &[u8]), Errno> {
    let command = command.split(|&c| c == 0).next().unwrap_or_default();
    let command = trim_spaces(command);
    let name_end = command
        .iter()
        .position(|&c| c == b' ')
        .unwrap_or(command.len());
    let (name, rest) = command.split_at(name_end);

    if name.is_empty() {
        return Err(Errno::InvalidArgument);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Errno::FileNameTooLong);
    }
    let args = trim_spaces(rest);
    if args.len() > MAX_ARGS_LEN {
        return Err(Errno::ArgumentListTooLong);
    }
    Ok((name, args))
}

fn trim_spaces(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&c| c != b' ').unwrap_or(s.len());
    let end = s.iter().rposition(|&c| c != b' ').map_or(start, |i| i + 1);
    &s[start..end]
}

fn display_name(name: &[u8]) -> &str {
    core::str::from_utf8(name).unwrap_or("?")
}

impl Kernel {
    /// 创建并启动一个新任务
    ///
    /// - `kernel_entry` 为 Some 时创建内核任务：不能等待、不能要新终端、不继承终端
    /// - 第一个任务（没有调用者）不能等待
    /// - 不要新终端的用户任务继承调用者的终端，调用者没有终端时拒绝
    ///
    /// 新任务插到运行队列头部并立即运行。`WaitMode::Yes` 返回子任务的退出码，
    /// 其他方式在调用者重新被调度时返回 0。
    pub fn execute(
        &'static self,
        command: &[u8],
        wait: WaitMode,
        new_terminal: bool,
        kernel_entry: Option<TaskFn>,
    ) -> Result<u32, Errno> {
        let (name, args) = parse_command(command)?;
        let cur = self.current();
        let kernel_task = kernel_entry.is_some();

        if cur.is_none() && wait == WaitMode::Yes {
            return Err(Errno::InvalidArgument);
        }
        if kernel_task && (wait == WaitMode::Yes || new_terminal) {
            return Err(Errno::InvalidArgument);
        }
        if wait == WaitMode::SpawnIdle && !kernel_task {
            return Err(Errno::InvalidArgument);
        }
        let inherited = cur.map_or(TermId::NULL, |c| self.task(c).terminal);
        if !kernel_task && !new_terminal && inherited.is_null() {
            return Err(Errno::InvalidArgument);
        }

        let new = {
            let mut st = self.state.lock();
            if wait == WaitMode::SpawnIdle && st.idle.is_some() {
                return Err(Errno::DeviceOrResourceBusy);
            }
            self.allocate_slot(&mut st, name, args)?
        };

        let term = if new_terminal {
            match self.open_terminal() {
                Ok(term) => term,
                Err(e) => {
                    self.deallocate_slot(&mut self.state.lock(), new);
                    return Err(e);
                }
            }
        } else if kernel_task {
            TermId::NULL
        } else {
            inherited
        };

        let (region, entry) = match kernel_entry {
            Some(f) => (None, Entry::Kernel(f)),
            None => match self.devices().memory.allocate_and_set(self.task(new).name()) {
                Ok((region, entry)) => (
                    Some(region),
                    Entry::User {
                        entry,
                        stack: USER_STACK_TOP,
                    },
                ),
                Err(e) => {
                    let mut st = self.state.lock();
                    if new_terminal {
                        self.teardown_terminal(&mut st, term);
                    }
                    self.deallocate_slot(&mut st, new);
                    return Err(e);
                }
            },
        };

        let mut st = self.state.lock();
        let task = self.task(new);
        task.region = region;
        task.terminal = term;
        task.files.init_std(&STDIN_OPS, &STDOUT_OPS);
        if wait == WaitMode::Yes {
            task.parent = cur;
        }

        let mut flags = TaskFlags::empty();
        if cur.is_none() {
            flags |= TaskFlags::INIT_TASK;
            st.init = Some(new);
        }
        if kernel_task {
            flags |= TaskFlags::KERNEL_TASK;
        }
        if wait == WaitMode::SpawnIdle {
            flags |= TaskFlags::IDLE_TASK;
            st.idle = Some(new);
        }
        if new_terminal {
            flags |= TaskFlags::TERMINAL_OWNER;
            if let Some(t) = st.terminals.get_mut(term) {
                t.owner = Some(new);
            }
        }
        task.flags = flags;
        task.time_slice = if wait == WaitMode::SpawnIdle { 0 } else { TIME_SLICE_MS };

        if !term.is_null() {
            st.focus.set_foreground(term, Some(new));
            if new_terminal {
                self.focus_locked(&mut st, term);
            }
        }

        runqueue::insert_to_head(&mut st.lists, new);
        if let (WaitMode::Yes, Some(parent)) = (wait, cur) {
            self.task(parent).flags |= TaskFlags::WAITING_CHILD;
            runqueue::move_to_list(&mut st.lists, parent, CHILD_WAIT);
        }

        log::info!(
            "process: execute {} in slot {} (terminal {:?}, {:?})",
            display_name(self.task(new).name()),
            new.index(),
            term,
            wait
        );

        self.prepare_switch(new);
        let save = match cur {
            Some(c) => &mut self.task(c).ksp as *mut usize,
            None => self.boot_ksp.get(),
        };
        let stack = self.tasks.kstack_top(new);
        let _irq = st.unlock();
        // SAFETY: 中断已关闭；stack 是刚分配的空闲块的栈顶
        let status = unsafe { self.machine().launch(self, save, stack, entry) };
        Ok(status as u32)
    }

    /// 结束当前任务
    ///
    /// 成功时不返回：有父任务时直接回到父任务的 execute 调用，返回 `status`；
    /// 否则切换到运行队列的下一个任务。init 退出时打印后停机。
    pub fn halt(&self, status: u8) -> Result<Infallible, Errno> {
        self.do_halt(u32::from(status))
    }

    /// 异常或信号默认动作结束当前任务
    pub fn halt_exception(&self) -> Result<Infallible, Errno> {
        self.do_halt(KILLED_STATUS)
    }

    fn do_halt(&self, status: u32) -> Result<Infallible, Errno> {
        let cur = self.current().ok_or(Errno::NoSuchProcess)?;
        if self.task(cur).flags.contains(TaskFlags::INIT_TASK) {
            log::error!("process: init halted with status {}", status);
            println!("{}: init exited, system halted", KERNEL_NAME);
            self.machine().halt_forever();
        }

        // 先关文件，再释放终端，最后释放槽位
        self.close_all(cur);

        let devices = self.devices();
        let mut st = self.state.lock();
        st.lists.del(cur.index());

        let parent = self.task(cur).parent;
        if let Some(p) = parent {
            self.task(p).flags.remove(TaskFlags::WAITING_CHILD);
            self.wake_locked(&mut st, p);
        }

        self.release_terminal(&mut st, cur, parent);
        self.task(cur).vidmap = false;
        if let Some(region) = self.task(cur).region.take() {
            devices.memory.deallocate(region);
        }

        log::info!(
            "process: task {} ({}) halted with status {}",
            cur.index(),
            display_name(self.task(cur).name()),
            status
        );
        let parent = self.deallocate_slot(&mut st, cur);

        match parent {
            Some(p) => {
                self.prepare_switch(p);
                let target = self.task(p).ksp;
                // 当前栈不会再回来，中断状态由父任务自己的守卫恢复
                core::mem::forget(st.unlock());
                // SAFETY: 父任务挂起在 launch 帧上，target 是那次保存的栈指针
                unsafe { self.machine().resume(target, status as usize) }
            }
            None => {
                let Some(next) = st.pick_next() else {
                    log::error!("process: no runnable task after halt");
                    drop(st);
                    self.machine().halt_forever();
                };
                self.prepare_switch(next);
                let target = self.task(next).ksp;
                core::mem::forget(st.unlock());
                // SAFETY: next 在运行队列上，target 是它切出时保存的栈指针
                unsafe { self.machine().jump(target) }
            }
        }
    }

    /// 把当前任务的参数字符串（带结尾 0）拷进 `buf`
    pub fn getargs(&self, buf: &mut [u8]) -> Result<(), Errno> {
        let cur = self.current().ok_or(Errno::NoSuchProcess)?;
        let args = self.task(cur).args();
        if args.is_empty() || args.len() + 1 > buf.len() {
            return Err(Errno::InvalidArgument);
        }
        buf[..args.len()].copy_from_slice(args);
        buf[args.len()] = 0;
        Ok(())
    }

    /// 把当前任务终端的显存窗口映射进它的内存区，返回用户地址
    ///
    /// 只有终端的拥有者可以映射。
    pub fn vidmap(&self) -> Result<usize, Errno> {
        let cur = self.current().ok_or(Errno::NoSuchProcess)?;
        let task = self.task(cur);
        if task.terminal.is_null() {
            return Err(Errno::InvalidArgument);
        }
        if !task.flags.contains(TaskFlags::TERMINAL_OWNER) {
            return Err(Errno::OperationNotPermitted);
        }
        let region = task.region.ok_or(Errno::BadAddress)?;
        let addr = self.devices().memory.map_video(region, task.terminal)?;
        task.vidmap = true;
        Ok(addr)
    }

    /// 分配槽位并初始化 PCB
    fn allocate_slot(&self, st: &mut KernelState, name: &[u8], args: &[u8]) -> Result<TaskRef, Errno> {
        let Some(task) = self.tasks.find_free() else {
            log::warn!("process: task table full ({} tasks)", MAX_TASKS);
            return Err(Errno::TryAgain);
        };
        self.task(task).reset(name, args);
        st.live += 1;
        Ok(task)
    }

    /// 释放槽位，返回父任务
    ///
    /// 调用前必须已经释放文件、终端和内存区。
    fn deallocate_slot(&self, st: &mut KernelState, task: TaskRef) -> Option<TaskRef> {
        let pcb = self.task(task);
        let parent = pcb.parent.take();
        pcb.valid = false;
        st.lists.del(task.index());
        st.live -= 1;
        if st.idle == Some(task) {
            st.idle = None;
        }
        parent
    }

    /// 分配终端、显存缓冲和窗口
    fn open_terminal(&self) -> Result<TermId, Errno> {
        let devices = self.devices();
        let term = self
            .state
            .lock()
            .terminals
            .allocate()
            .ok_or(Errno::TryAgain)?;

        if let Err(e) = devices.video.open(term) {
            self.state.lock().terminals.free(term);
            return Err(e);
        }
        if let Err(e) = devices.windows.new_window(term) {
            devices.video.close(term);
            self.state.lock().terminals.free(term);
            return Err(e);
        }
        Ok(term)
    }

    /// 销毁终端：窗口、显存缓冲、终端槽位
    fn teardown_terminal(&self, st: &mut KernelState, term: TermId) {
        let devices = self.devices();
        devices.windows.destroy_window(term);
        devices.video.close(term);
        st.terminals.free(term);
    }

    /// halt 时释放任务的终端
    ///
    /// - 拥有者退出：交给终端的前台任务，或槽位最小的仍在该终端上的任务；
    ///   都没有时销毁终端，焦点移到往前最近的有前台任务的终端
    /// - 非拥有者退出：前台任务退回父任务（或终端拥有者）
    fn release_terminal(&self, st: &mut KernelState, cur: TaskRef, parent: Option<TaskRef>) {
        let task = self.task(cur);
        let term = task.terminal;
        if term.is_null() {
            return;
        }
        task.terminal = TermId::NULL;

        if task.flags.contains(TaskFlags::TERMINAL_OWNER) {
            task.flags.remove(TaskFlags::TERMINAL_OWNER);
            match self.terminal_heir(st, cur, term) {
                Some(heir) => {
                    self.task(heir).flags |= TaskFlags::TERMINAL_OWNER;
                    if let Some(t) = st.terminals.get_mut(term) {
                        t.owner = Some(heir);
                    }
                    st.focus.set_foreground(term, Some(heir));
                    log::info!("terminal: {:?} handed to task {}", term, heir.index());
                }
                None => {
                    st.focus.set_foreground(term, None);
                    if st.focus.term() == term {
                        match st.focus.nearest_preceding(term) {
                            Some(next) => self.focus_locked(st, next),
                            None => st.focus.focus_on(TermId::NULL),
                        }
                    }
                    self.teardown_terminal(st, term);
                }
            }
        } else if st.focus.foreground(term) == Some(cur) {
            let back = parent
                .filter(|&p| self.task(p).terminal == term)
                .or_else(|| st.terminals.get(term).and_then(|t| t.owner));
            st.focus.set_foreground(term, back);
        }
    }

    /// 拥有者退出后接管终端的任务
    fn terminal_heir(&self, st: &KernelState, cur: TaskRef, term: TermId) -> Option<TaskRef> {
        let attached = |t: TaskRef| {
            let pcb = self.task(t);
            t != cur && pcb.valid && pcb.terminal == term
        };
        st.focus
            .foreground(term)
            .filter(|&t| attached(t))
            .or_else(|| (0..MAX_TASKS).map(TaskRef::from_index).find(|&t| attached(t)))
    }
}
