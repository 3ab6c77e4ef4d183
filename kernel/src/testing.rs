//! 主机单元测试环境
//!
//! 每个任务跑在一个宿主线程上。`HostMachine` 用"栈指针令牌"代替真实的栈：
//! 任务线程的令牌就是它 PCB 块的内核栈顶，所以 `Kernel::current()` 照常工作。
//! 控制转移就是在令牌之间传递接力棒，同一时刻只有一个任务线程在内核里跑。
//!
//! 协作者都是记录调用的 mock；`Rig` 把它们装成一个完整的内核，
//! 在后台线程里启动，测试线程通过 `report` / `Rig::expect` 收取任务里的观测值。

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::arch::{Entry, Machine, TaskFn};
use crate::devices::{
    Cursor, DirEntry, Devices, FileKind, FileSystem, MemoryRegions, RegionId, SignalFrames,
    VideoBuffers, Windowing,
};
use crate::errno::Errno;
use crate::kernel::Kernel;
use crate::process::{TaskRef, TaskTable};
use crate::signal::Signal;
use crate::terminal::{Key, TermId};

const EXPECT_TIMEOUT: Duration = Duration::from_secs(5);

/// 用户程序的"入口地址"从这里开始编号
const PROGRAM_BASE: usize = 0x0804_8000;
const PROGRAM_STRIDE: usize = 0x1_0000;

/// vidmap 映射的用户地址
const VIDEO_MAP_BASE: usize = 0x0840_0000;

thread_local! {
    /// 当前线程的"栈指针"：任务线程是内核栈顶，其他线程是 0
    static SP: Cell<usize> = const { Cell::new(0) };
    /// 当前线程的中断标志
    static IF: Cell<bool> = const { Cell::new(false) };
}

/// 毒化的锁照样用，某个任务线程 panic 不应该拖垮其他测试
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn leak<T>(v: T) -> &'static T {
    Box::leak(Box::new(v))
}

/// 按名字注册的用户程序
#[derive(Default)]
pub struct ProgramTable {
    programs: Mutex<Vec<(Vec<u8>, TaskFn)>>,
}

impl ProgramTable {
    fn register(&self, name: &[u8], body: TaskFn) {
        lock(&self.programs).push((name.to_vec(), body));
    }

    fn entry_of(&self, name: &[u8]) -> Option<usize> {
        lock(&self.programs)
            .iter()
            .position(|(n, _)| n == name)
            .map(|i| PROGRAM_BASE + i * PROGRAM_STRIDE)
    }

    fn body_at(&self, entry: usize) -> Option<TaskFn> {
        let index = entry.checked_sub(PROGRAM_BASE)? / PROGRAM_STRIDE;
        lock(&self.programs).get(index).map(|(_, body)| *body)
    }
}

/// 注入的外部中断
#[derive(Debug, Copy, Clone)]
pub enum HostIrq {
    Key(Key),
    Rtc,
}

/// 线程模拟的处理器
pub struct HostMachine {
    /// 令牌 → 唤醒值
    baton: Mutex<HashMap<usize, usize>>,
    wake: Condvar,
    pending: Mutex<VecDeque<HostIrq>>,
    /// switch/jump 的目标令牌，按发生顺序
    dispatched: Mutex<Vec<usize>>,
    kernel_stack: AtomicUsize,
    eoi: Mutex<Vec<u8>>,
    shutdown: AtomicBool,
    programs: &'static ProgramTable,
}

impl HostMachine {
    fn new(programs: &'static ProgramTable) -> Self {
        Self {
            baton: Mutex::new(HashMap::new()),
            wake: Condvar::new(),
            pending: Mutex::new(VecDeque::new()),
            dispatched: Mutex::new(Vec::new()),
            kernel_stack: AtomicUsize::new(0),
            eoi: Mutex::new(Vec::new()),
            shutdown: AtomicBool::new(false),
            programs,
        }
    }

    /// 不挂内核的处理器，只用来测试中断开关
    pub fn leak_bare() -> &'static HostMachine {
        leak(HostMachine::new(leak(ProgramTable::default())))
    }

    fn post(&self, token: usize, value: usize) {
        lock(&self.baton).insert(token, value);
        self.wake.notify_all();
    }

    fn wait(&self, token: usize) -> usize {
        let mut baton = lock(&self.baton);
        loop {
            if let Some(value) = baton.remove(&token) {
                return value;
            }
            baton = self.wake.wait(baton).unwrap_or_else(|e| e.into_inner());
        }
    }

    fn park(&self) -> ! {
        loop {
            thread::park();
        }
    }

    pub fn inject(&self, irq: HostIrq) {
        lock(&self.pending).push_back(irq);
    }

    /// switch/jump 的目标令牌
    pub fn dispatched(&self) -> Vec<usize> {
        lock(&self.dispatched).clone()
    }

    pub fn kernel_stack(&self) -> usize {
        self.kernel_stack.load(Ordering::SeqCst)
    }

    pub fn eoi_count(&self, irq: u8) -> usize {
        lock(&self.eoi).iter().filter(|&&i| i == irq).count()
    }
}

impl Machine for HostMachine {
    fn interrupts_enabled(&self) -> bool {
        IF.with(Cell::get)
    }

    fn disable_interrupts(&self) {
        IF.with(|f| f.set(false));
    }

    fn enable_interrupts(&self) {
        IF.with(|f| f.set(true));
    }

    fn set_kernel_stack(&self, top: usize) {
        self.kernel_stack.store(top, Ordering::SeqCst);
    }

    fn stack_pointer(&self) -> usize {
        SP.with(Cell::get)
    }

    unsafe fn switch(&self, save: *mut usize, target: usize) {
        let me = SP.with(Cell::get);
        *save = me;
        lock(&self.dispatched).push(target);
        self.post(target, 0);
        self.wait(me);
    }

    unsafe fn launch(
        &self,
        kernel: &'static Kernel,
        save: *mut usize,
        stack: usize,
        entry: Entry,
    ) -> usize {
        let me = SP.with(Cell::get);
        *save = me;

        let body = match entry {
            Entry::Kernel(f) => f,
            Entry::User { entry, .. } => match self.programs.body_at(entry) {
                Some(f) => f,
                None => panic!("no program at {:#x}", entry),
            },
        };

        thread::Builder::new()
            .name(format!("task@{:#x}", stack))
            .spawn(move || {
                SP.with(|sp| sp.set(stack));
                IF.with(|f| f.set(true));
                body(kernel);
                let _ = kernel.halt(0);
                kernel.machine().halt_forever()
            })
            .unwrap_or_else(|e| panic!("cannot spawn task thread: {}", e));

        self.wait(me)
    }

    unsafe fn resume(&self, target: usize, value: usize) -> ! {
        self.post(target, value);
        self.park()
    }

    unsafe fn jump(&self, target: usize) -> ! {
        lock(&self.dispatched).push(target);
        self.post(target, 0);
        self.park()
    }

    fn halt_forever(&self) -> ! {
        self.park()
    }

    /// 开中断睡 1ms，然后按顺序处理积压的外部中断和一次时钟中断
    ///
    /// 中断一个一个地取：处理过程中任务可能被杀掉，剩下的留给下一个任务。
    fn wait_for_interrupt(&self, kernel: &'static Kernel) {
        if self.shutdown.load(Ordering::SeqCst) {
            self.park();
        }
        IF.with(|f| f.set(true));
        thread::sleep(Duration::from_millis(1));
        IF.with(|f| f.set(false));

        loop {
            let irq = lock(&self.pending).pop_front();
            match irq {
                Some(HostIrq::Key(key)) => kernel.keyboard(key),
                Some(HostIrq::Rtc) => kernel.rtc_tick(),
                None => break,
            }
        }
        kernel.timer_tick();
        IF.with(|f| f.set(true));
    }

    fn end_of_interrupt(&self, irq: u8) {
        lock(&self.eoi).push(irq);
    }
}

/// 根目录：`.`、`rtc` 和一个普通文件
pub struct MockFs;

const FILES: &[(&[u8], FileKind, u32, &[u8])] = &[
    (b".", FileKind::Directory, 0, b""),
    (b"rtc", FileKind::Rtc, 0, b""),
    (b"frame0.txt", FileKind::Regular, 1, b"fish frame\n"),
];

impl FileSystem for MockFs {
    fn lookup(&self, name: &[u8]) -> Result<DirEntry, Errno> {
        FILES
            .iter()
            .find(|(n, ..)| *n == name)
            .map(|&(_, kind, inode, _)| DirEntry { kind, inode })
            .ok_or(Errno::NoSuchFileOrDirectory)
    }

    fn read_data(&self, inode: u32, offset: usize, buf: &mut [u8]) -> Result<usize, Errno> {
        let (.., data) = FILES
            .iter()
            .find(|&&(_, kind, i, _)| kind == FileKind::Regular && i == inode)
            .ok_or(Errno::IOError)?;
        let rest = data.get(offset..).unwrap_or_default();
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        Ok(n)
    }

    fn read_dir(&self, index: usize, buf: &mut [u8]) -> Result<usize, Errno> {
        let Some((name, ..)) = FILES.get(index) else {
            return Ok(0);
        };
        let n = name.len().min(buf.len());
        buf[..n].copy_from_slice(&name[..n]);
        Ok(n)
    }
}

#[derive(Default)]
struct MemoryState {
    next: usize,
    live: Vec<usize>,
    active: Option<usize>,
    mapped: Vec<usize>,
}

/// 用户内存区：按程序表装入，地址校验只拒绝空指针
pub struct MockMemory {
    programs: &'static ProgramTable,
    state: Mutex<MemoryState>,
    pub fail: AtomicBool,
}

impl MockMemory {
    fn new(programs: &'static ProgramTable) -> Self {
        Self {
            programs,
            state: Mutex::new(MemoryState::default()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn live_regions(&self) -> usize {
        lock(&self.state).live.len()
    }

    pub fn active(&self) -> Option<RegionId> {
        lock(&self.state).active.map(RegionId)
    }

    pub fn mapped(&self) -> usize {
        lock(&self.state).mapped.len()
    }
}

impl MemoryRegions for MockMemory {
    fn allocate_and_set(&self, name: &[u8]) -> Result<(RegionId, usize), Errno> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Errno::OutOfMemory);
        }
        let entry = self
            .programs
            .entry_of(name)
            .ok_or(Errno::NoSuchFileOrDirectory)?;
        let mut st = lock(&self.state);
        let id = st.next;
        st.next += 1;
        st.live.push(id);
        st.active = Some(id);
        Ok((RegionId(id), entry))
    }

    fn deallocate(&self, region: RegionId) {
        let mut st = lock(&self.state);
        st.live.retain(|&r| r != region.0);
        st.mapped.retain(|&r| r != region.0);
    }

    fn set_active(&self, region: RegionId) {
        lock(&self.state).active = Some(region.0);
    }

    fn map_video(&self, region: RegionId, term: TermId) -> Result<usize, Errno> {
        let mut st = lock(&self.state);
        if !st.live.contains(&region.0) {
            return Err(Errno::BadAddress);
        }
        st.mapped.push(region.0);
        Ok(VIDEO_MAP_BASE + term.index() * 0x1000)
    }

    fn check_user(&self, region: RegionId, addr: usize, len: usize) -> bool {
        addr != 0 && addr.checked_add(len).is_some() && lock(&self.state).live.contains(&region.0)
    }
}

#[derive(Default)]
struct VideoState {
    open: Vec<usize>,
    written: HashMap<usize, Vec<u8>>,
    cleared: Vec<usize>,
    shown: Option<usize>,
    running: Option<usize>,
    cursor: Cursor,
}

/// 显存缓冲：记录每个终端收到的字节
#[derive(Default)]
pub struct MockVideo {
    state: Mutex<VideoState>,
    pub fail_open: AtomicBool,
}

impl MockVideo {
    pub fn written(&self, term: usize) -> Vec<u8> {
        lock(&self.state).written.get(&term).cloned().unwrap_or_default()
    }

    pub fn written_str(&self, term: usize) -> String {
        String::from_utf8_lossy(&self.written(term)).into_owned()
    }

    pub fn shown(&self) -> Option<usize> {
        lock(&self.state).shown
    }

    pub fn running(&self) -> Option<usize> {
        lock(&self.state).running
    }

    pub fn open_buffers(&self) -> usize {
        lock(&self.state).open.len()
    }

    pub fn cleared(&self, term: usize) -> bool {
        lock(&self.state).cleared.contains(&term)
    }
}

fn term_index(term: TermId) -> Option<usize> {
    (!term.is_null()).then(|| term.index())
}

impl VideoBuffers for MockVideo {
    fn open(&self, term: TermId) -> Result<(), Errno> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(Errno::OutOfMemory);
        }
        lock(&self.state).open.push(term.index());
        Ok(())
    }

    fn close(&self, term: TermId) {
        let mut st = lock(&self.state);
        st.open.retain(|&t| t != term.index());
        st.written.remove(&term.index());
    }

    fn write(&self, term: TermId, bytes: &[u8]) {
        if let Some(t) = term_index(term) {
            lock(&self.state).written.entry(t).or_default().extend_from_slice(bytes);
        }
    }

    fn clear(&self, term: TermId) {
        if let Some(t) = term_index(term) {
            lock(&self.state).cleared.push(t);
        }
    }

    fn show(&self, term: TermId) {
        lock(&self.state).shown = term_index(term);
    }

    fn set_running(&self, term: TermId) {
        lock(&self.state).running = term_index(term);
    }

    fn cursor(&self) -> Cursor {
        lock(&self.state).cursor
    }

    fn set_cursor(&self, cursor: Cursor) {
        lock(&self.state).cursor = cursor;
    }
}

/// 窗口系统
#[derive(Default)]
pub struct MockWindows {
    windows: Mutex<Vec<usize>>,
    renders: AtomicUsize,
    pub fail: AtomicBool,
}

impl MockWindows {
    pub fn count(&self) -> usize {
        lock(&self.windows).len()
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl Windowing for MockWindows {
    fn new_window(&self, term: TermId) -> Result<(), Errno> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Errno::NoSuchDevice);
        }
        lock(&self.windows).push(term.index());
        Ok(())
    }

    fn destroy_window(&self, term: TermId) {
        lock(&self.windows).retain(|&t| t != term.index());
    }

    fn render(&self) {
        self.renders.fetch_add(1, Ordering::SeqCst);
    }
}

/// 信号栈帧：只记录
#[derive(Default)]
pub struct MockSignals {
    delivered: Mutex<Vec<(usize, Signal, usize)>>,
    restored: AtomicUsize,
}

impl MockSignals {
    pub fn delivered(&self) -> Vec<(usize, Signal, usize)> {
        lock(&self.delivered).clone()
    }

    pub fn restored(&self) -> usize {
        self.restored.load(Ordering::SeqCst)
    }
}

impl SignalFrames for MockSignals {
    fn deliver(&self, task: TaskRef, signal: Signal, handler: usize) -> Result<(), Errno> {
        lock(&self.delivered).push((task.index(), signal, handler));
        Ok(())
    }

    fn restore(&self, _task: TaskRef) -> Result<(), Errno> {
        self.restored.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 任务线程 → 测试线程的观测值，按 (内核, 键) 先进先出
static MAILBOX: Mutex<Vec<(usize, &'static str, i64)>> = Mutex::new(Vec::new());
static MAIL: Condvar = Condvar::new();

fn kernel_key(kernel: &Kernel) -> usize {
    kernel as *const Kernel as usize
}

/// 在任务里报告一个观测值
pub fn report(kernel: &Kernel, key: &'static str, value: i64) {
    lock(&MAILBOX).push((kernel_key(kernel), key, value));
    MAIL.notify_all();
}

/// 任务做完了：像空闲任务一样一直等中断，保持可运行
pub fn settle(kernel: &'static Kernel) -> ! {
    loop {
        kernel.machine().wait_for_interrupt(kernel);
    }
}

/// 在关中断的上下文里调用中断处理函数
pub fn interrupt(kernel: &'static Kernel, handler: impl FnOnce(&'static Kernel)) {
    let _irq = crate::sync::IrqGuard::new(kernel.machine());
    handler(kernel);
}

/// 一个完整装配好的内核
pub struct Rig {
    pub kernel: &'static Kernel,
    pub machine: &'static HostMachine,
    pub memory: &'static MockMemory,
    pub video: &'static MockVideo,
    pub windows: &'static MockWindows,
    pub signals: &'static MockSignals,
    programs: &'static ProgramTable,
}

impl Rig {
    pub fn new() -> Rig {
        crate::logger::init();

        let programs = leak(ProgramTable::default());
        let machine = leak(HostMachine::new(programs));
        let memory = leak(MockMemory::new(programs));
        let video = leak(MockVideo::default());
        let windows = leak(MockWindows::default());
        let signals = leak(MockSignals::default());
        let devices = Devices {
            fs: leak(MockFs),
            memory,
            video,
            windows,
            signals,
        };
        let tasks: &'static TaskTable = Box::leak(Box::new(TaskTable::new()));
        let kernel = leak(Kernel::new(machine, devices, tasks));

        Rig {
            kernel,
            machine,
            memory,
            video,
            windows,
            signals,
            programs,
        }
    }

    /// 注册一个可以被 execute 的用户程序
    pub fn program(&self, name: &[u8], body: TaskFn) {
        self.programs.register(name, body);
    }

    /// 在启动线程上运行 `Kernel::start`
    pub fn boot(&self, init: TaskFn) {
        let kernel = self.kernel;
        thread::Builder::new()
            .name(String::from("boot"))
            .spawn(move || kernel.start(init))
            .unwrap_or_else(|e| panic!("cannot spawn boot thread: {}", e));
    }

    pub fn press(&self, key: Key) {
        self.machine.inject(HostIrq::Key(key));
    }

    pub fn type_line(&self, line: &[u8]) {
        for &c in line {
            self.press(if c == b'\n' { Key::Enter } else { Key::Char(c) });
        }
    }

    pub fn rtc(&self) {
        self.machine.inject(HostIrq::Rtc);
    }

    /// 取下一个 `key` 的观测值，超时 panic
    pub fn expect(&self, key: &str) -> i64 {
        let me = kernel_key(self.kernel);
        let deadline = Instant::now() + EXPECT_TIMEOUT;
        let mut mail = lock(&MAILBOX);
        loop {
            if let Some(pos) = mail.iter().position(|&(k, kk, _)| k == me && kk == key) {
                return mail.remove(pos).2;
            }
            let now = Instant::now();
            if now >= deadline {
                panic!("timed out waiting for report {:?}", key);
            }
            mail = MAIL
                .wait_timeout(mail, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }

    /// 轮询直到条件成立或超时
    pub fn wait_for(&self, cond: impl Fn(&Kernel) -> bool) -> bool {
        let deadline = Instant::now() + EXPECT_TIMEOUT;
        while Instant::now() < deadline {
            if cond(self.kernel) {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond(self.kernel)
    }

    pub fn find_task(&self, name: &[u8]) -> Option<TaskRef> {
        self.kernel
            .tasks()
            .iter()
            .flatten()
            .find(|t| t.name() == name)
            .map(|t| t.task)
    }

    /// switch/jump 目标的槽位（None 表示启动栈）
    pub fn dispatched(&self) -> Vec<Option<usize>> {
        self.machine
            .dispatched()
            .into_iter()
            .map(|sp| self.kernel.tasks.slot_of(sp).map(TaskRef::index))
            .collect()
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        self.machine.shutdown.store(true, Ordering::SeqCst);
    }
}
