//! 虚拟终端
//!
//! 每个终端有一个行缓冲区、保存的光标位置和一个拥有者任务。
//! 显存缓冲和窗口由外部协作者管理，这里只记录终端槽位的分配与输入行规则：
//! - 键盘中断把字符追加到焦点终端的行缓冲并回显
//! - 回车或缓冲区达到读请求长度时，唤醒阻塞在该终端上的读者
//! - read 每次最多返回一行

pub mod focus;

pub use focus::Focus;

use crate::config::{LINE_BUFFER_SIZE, MAX_TERMINALS};
use crate::devices::Cursor;
use crate::errno::Errno;
use crate::kernel::Kernel;
use crate::process::TaskRef;
use crate::sched::runqueue;
use crate::signal::Signal;

/// 终端编号
///
/// `TermId::NULL` 是"没有终端"的哨兵，内核任务和 init 使用它。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TermId(usize);

impl TermId {
    /// 空终端
    pub const NULL: TermId = TermId(MAX_TERMINALS);

    /// 用户传入的编号转换，越界返回 None
    pub fn new(index: usize) -> Option<TermId> {
        (index < MAX_TERMINALS).then_some(TermId(index))
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    /// 所有真实终端
    pub fn all() -> impl Iterator<Item = TermId> {
        (0..MAX_TERMINALS).map(TermId)
    }
}

/// 键盘驱动解码后的输入
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Key {
    /// 可打印字符
    Char(u8),
    /// 退格
    Backspace,
    /// 回车
    Enter,
    /// Ctrl+L
    Clear,
    /// Ctrl+C
    Interrupt,
    /// Alt+Fn
    SwitchTerminal(usize),
}

/// 单个终端
pub struct Terminal {
    /// 槽位是否已分配
    in_use: bool,
    /// 行缓冲区
    buf: [u8; LINE_BUFFER_SIZE],
    /// 已缓冲的字符数
    count: usize,
    /// 阻塞中的 read 请求长度，0 表示没有读者
    requested: usize,
    /// 失去焦点时保存的光标
    pub cursor: Cursor,
    /// 拥有者任务
    pub owner: Option<TaskRef>,
}

impl Terminal {
    pub const fn new() -> Self {
        Self {
            in_use: false,
            buf: [0; LINE_BUFFER_SIZE],
            count: 0,
            requested: 0,
            cursor: Cursor { x: 0, y: 0 },
            owner: None,
        }
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use
    }

    pub fn buffered(&self) -> usize {
        self.count
    }

    /// 是否已有一整行（或缓冲区已满）
    pub fn line_ready(&self) -> bool {
        self.count == LINE_BUFFER_SIZE || self.buf[..self.count].contains(&b'\n')
    }

    /// 读者是否可以被唤醒
    fn read_satisfied(&self) -> bool {
        self.line_ready() || (self.requested > 0 && self.count >= self.requested)
    }

    /// 追加可打印字符，为换行保留最后一个字节；缓冲区满时返回 false
    pub fn push(&mut self, c: u8) -> bool {
        if self.count + 1 >= LINE_BUFFER_SIZE {
            return false;
        }
        self.buf[self.count] = c;
        self.count += 1;
        true
    }

    /// 回车总能放进缓冲区
    pub fn push_newline(&mut self) {
        if self.count < LINE_BUFFER_SIZE {
            self.buf[self.count] = b'\n';
            self.count += 1;
        }
    }

    /// 删除最后一个还未提交的字符
    pub fn backspace(&mut self) -> bool {
        if self.count == 0 || self.buf[self.count - 1] == b'\n' {
            return false;
        }
        self.count -= 1;
        true
    }

    /// 取走最多一行，返回拷贝的字节数
    pub fn take_line(&mut self, out: &mut [u8]) -> usize {
        let line_len = self.buf[..self.count]
            .iter()
            .position(|&c| c == b'\n')
            .map_or(self.count, |i| i + 1);
        let n = line_len.min(out.len());
        out[..n].copy_from_slice(&self.buf[..n]);
        self.buf.copy_within(n..self.count, 0);
        self.count -= n;
        n
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

/// 终端槽位表
pub struct TerminalTable {
    terms: [Terminal; MAX_TERMINALS],
}

impl TerminalTable {
    pub const fn new() -> Self {
        Self {
            terms: [const { Terminal::new() }; MAX_TERMINALS],
        }
    }

    /// 分配最小的空闲终端
    pub fn allocate(&mut self) -> Option<TermId> {
        let index = self.terms.iter().position(|t| !t.in_use)?;
        self.terms[index].reset();
        self.terms[index].in_use = true;
        Some(TermId(index))
    }

    pub fn free(&mut self, id: TermId) {
        if let Some(t) = self.terms.get_mut(id.index()) {
            t.reset();
        }
    }

    pub fn get(&self, id: TermId) -> Option<&Terminal> {
        self.terms.get(id.index()).filter(|t| t.in_use)
    }

    pub fn get_mut(&mut self, id: TermId) -> Option<&mut Terminal> {
        self.terms.get_mut(id.index()).filter(|t| t.in_use)
    }

    pub fn in_use(&self) -> usize {
        self.terms.iter().filter(|t| t.in_use).count()
    }
}

impl Default for TerminalTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// 键盘中断处理
    pub fn keyboard(&self, key: Key) {
        match key {
            Key::SwitchTerminal(n) => {
                if let Err(e) = self.change_focus(n) {
                    log::debug!("terminal: switch to {} rejected: {:?}", n, e);
                }
            }
            Key::Interrupt => self.raise_foreground(Signal::Interrupt),
            Key::Clear => {
                let st = self.state.lock();
                if !st.focus.term().is_null() {
                    self.devices().video.clear(st.focus.term());
                }
            }
            Key::Char(_) | Key::Backspace | Key::Enter => self.line_input(key),
        }
        self.machine().end_of_interrupt(crate::arch::IRQ_KEYBOARD);
        self.deliver_pending();
    }

    /// 行规则：写入焦点终端并回显，满足读请求时唤醒读者
    fn line_input(&self, key: Key) {
        let mut st = self.state.lock();
        let term = st.focus.term();
        let video = self.devices().video;
        let Some(t) = st.terminals.get_mut(term) else {
            return;
        };

        let echoed = match key {
            Key::Char(c) => t.push(c).then_some(c),
            Key::Backspace => t.backspace().then_some(0x08),
            Key::Enter => {
                t.push_newline();
                Some(b'\n')
            }
            _ => None,
        };
        if let Some(c) = echoed {
            video.write(term, &[c]);
        }

        if t.read_satisfied() {
            let wait = runqueue::term_wait(term);
            if let Some(reader) = st.lists.first(wait) {
                self.wake_locked(&mut st, TaskRef::from_index(reader));
            }
        }
    }

    /// 终端 read：没有完整的一行时阻塞在终端等待队列上
    ///
    /// 等待中收到需要处理的信号时返回 Interrupted，信号在系统调用出口派发。
    pub(crate) fn terminal_read(&self, buf: &mut [u8]) -> Result<usize, Errno> {
        let cur = self.current().ok_or(Errno::NoSuchProcess)?;
        let term = self.task(cur).terminal;
        if term.is_null() {
            return Err(Errno::NotATypewriter);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let mut st = self.state.lock();
            let t = st.terminals.get_mut(term).ok_or(Errno::NoSuchDevice)?;
            if t.read_satisfied() {
                t.requested = 0;
                return Ok(t.take_line(buf));
            }
            if self.task(cur).signals.interrupts_sleep() {
                t.requested = 0;
                return Err(Errno::Interrupted);
            }
            t.requested = buf.len();
            self.block_on(st, cur, runqueue::term_wait(term))?;
        }
    }

    /// 终端 write：空终端上的输出被丢弃
    pub(crate) fn terminal_write(&self, buf: &[u8]) -> Result<usize, Errno> {
        let cur = self.current().ok_or(Errno::NoSuchProcess)?;
        let term = self.task(cur).terminal;
        if !term.is_null() {
            self.devices().video.write(term, buf);
        }
        Ok(buf.len())
    }
}
