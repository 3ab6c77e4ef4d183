//! 终端焦点与前台任务
//!
//! - 每个终端最多一个前台任务（正在使用该终端输入的任务）
//! - 全局只有一个焦点终端，接收键盘输入并显示在屏幕上
//! - 焦点任务指针始终等于焦点终端的前台任务
//!
//! 所有修改都在调度锁内完成。

use crate::config::MAX_TERMINALS;
use crate::errno::Errno;
use crate::kernel::{Kernel, KernelState};
use crate::process::TaskRef;

use super::TermId;

/// 焦点与前台任务表
pub struct Focus {
    /// 终端 → 前台任务
    foreground: [Option<TaskRef>; MAX_TERMINALS],
    /// 焦点终端
    term: TermId,
    /// 焦点任务
    task: Option<TaskRef>,
}

impl Focus {
    pub const fn new() -> Self {
        Self {
            foreground: [None; MAX_TERMINALS],
            term: TermId::NULL,
            task: None,
        }
    }

    pub fn term(&self) -> TermId {
        self.term
    }

    pub fn task(&self) -> Option<TaskRef> {
        self.task
    }

    pub fn foreground(&self, term: TermId) -> Option<TaskRef> {
        self.foreground.get(term.index()).copied().flatten()
    }

    /// 设置前台任务；如果是焦点终端，焦点任务随之更新
    pub fn set_foreground(&mut self, term: TermId, task: Option<TaskRef>) {
        let Some(slot) = self.foreground.get_mut(term.index()) else {
            return;
        };
        *slot = task;
        if term == self.term {
            self.task = task;
        }
    }

    /// 把焦点移到 `term`
    pub fn focus_on(&mut self, term: TermId) {
        self.term = term;
        self.task = self.foreground(term);
    }

    /// 从 `from` 往前找最近的、有前台任务的终端（回绕），不含 `from` 本身
    pub fn nearest_preceding(&self, from: TermId) -> Option<TermId> {
        (1..MAX_TERMINALS)
            .map(|step| (from.index() + MAX_TERMINALS - step) % MAX_TERMINALS)
            .filter_map(TermId::new)
            .find(|&t| self.foreground(t).is_some())
    }
}

impl Default for Focus {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// 切换焦点终端
    ///
    /// 目标终端没有前台任务时在当前屏幕上提示并保持不变。
    /// 由 Alt+Fn 热键和窗口激活调用。
    pub fn change_focus(&self, index: usize) -> Result<(), Errno> {
        let term = TermId::new(index).ok_or(Errno::InvalidArgument)?;
        let video = self.devices().video;
        let mut st = self.state.lock();

        if st.focus.foreground(term).is_none() {
            let shown = st.focus.term();
            drop(st);
            log::info!("terminal: no task on terminal {}", index);
            if !shown.is_null() {
                video.write(shown, b"\n[terminal has no task]\n");
            }
            return Ok(());
        }
        if st.focus.term() != term {
            self.focus_locked(&mut st, term);
        }
        Ok(())
    }

    /// 保存旧焦点终端的光标，切换可见缓冲，恢复新终端的光标
    pub(crate) fn focus_locked(&self, st: &mut KernelState, term: TermId) {
        let video = self.devices().video;
        let old = st.focus.term();
        if let Some(t) = st.terminals.get_mut(old) {
            t.cursor = video.cursor();
        }
        video.show(term);
        st.focus.focus_on(term);
        if let Some(t) = st.terminals.get(term) {
            video.set_cursor(t.cursor);
        }
    }

    /// 焦点终端与焦点任务
    pub fn focus(&self) -> (TermId, Option<TaskRef>) {
        let st = self.state.lock();
        (st.focus.term(), st.focus.task())
    }

    /// 终端的前台任务
    pub fn foreground(&self, term: TermId) -> Option<TaskRef> {
        self.state.lock().focus.foreground(term)
    }
}
