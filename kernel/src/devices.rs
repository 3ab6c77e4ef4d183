//! 外部协作者接口
//!
//! 文件系统、用户内存区、显存缓冲、窗口系统和信号栈帧都不属于调度核心，
//! 核心只通过这里的 trait 调用它们。启动代码把具体实现以 `&'static dyn`
//! 的形式装进 [`Devices`]。

use crate::errno::Errno;
use crate::process::TaskRef;
use crate::signal::Signal;
use crate::terminal::TermId;

/// 用户内存区编号（每个用户任务一个 4MB 区域）
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegionId(pub usize);

/// 屏幕光标位置
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub x: u16,
    pub y: u16,
}

/// 目录项类型
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// RTC 设备
    Rtc,
    /// 目录（只有根目录）
    Directory,
    /// 普通文件
    Regular,
}

/// 目录项
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub kind: FileKind,
    pub inode: u32,
}

/// 只读文件系统
pub trait FileSystem: Sync {
    /// 按名字查找目录项
    fn lookup(&self, name: &[u8]) -> Result<DirEntry, Errno>;

    /// 从 `offset` 开始读取文件数据，返回读到的字节数（0 表示文件结束）
    fn read_data(&self, inode: u32, offset: usize, buf: &mut [u8]) -> Result<usize, Errno>;

    /// 读取第 `index` 个目录项的名字，返回名字长度（0 表示目录结束）
    fn read_dir(&self, index: usize, buf: &mut [u8]) -> Result<usize, Errno>;
}

/// 用户内存区（分页）
pub trait MemoryRegions: Sync {
    /// 为可执行文件分配内存区、装入程序并切换到该区，返回 (区编号, 入口地址)
    fn allocate_and_set(&self, name: &[u8]) -> Result<(RegionId, usize), Errno>;

    /// 释放内存区
    fn deallocate(&self, region: RegionId);

    /// 切换当前生效的内存区
    fn set_active(&self, region: RegionId);

    /// 把终端的显存窗口映射进用户区，返回用户虚拟地址
    fn map_video(&self, region: RegionId, term: TermId) -> Result<usize, Errno>;

    /// `[addr, addr + len)` 是否完全落在该区的用户可访问范围内
    fn check_user(&self, region: RegionId, addr: usize, len: usize) -> bool;
}

/// 每个终端的显存缓冲
pub trait VideoBuffers: Sync {
    /// 为终端分配显存缓冲
    fn open(&self, term: TermId) -> Result<(), Errno>;

    /// 释放终端的显存缓冲
    fn close(&self, term: TermId);

    /// 向终端写字符
    fn write(&self, term: TermId, bytes: &[u8]);

    /// 清屏
    fn clear(&self, term: TermId);

    /// 把该终端的缓冲切换为可见
    fn show(&self, term: TermId);

    /// 记录当前运行任务所属终端（影响 vidmap 映射的输出位置）
    fn set_running(&self, term: TermId);

    /// 读取硬件光标
    fn cursor(&self) -> Cursor;

    /// 设置硬件光标
    fn set_cursor(&self, cursor: Cursor);
}

/// 图形窗口
pub trait Windowing: Sync {
    /// 为终端创建窗口
    fn new_window(&self, term: TermId) -> Result<(), Errno>;

    /// 销毁终端的窗口
    fn destroy_window(&self, term: TermId);

    /// 渲染一帧
    fn render(&self);
}

/// 用户态信号栈帧
pub trait SignalFrames: Sync {
    /// 在任务的用户栈上构造处理函数栈帧，中断返回后进入 `handler`
    fn deliver(&self, task: TaskRef, signal: Signal, handler: usize) -> Result<(), Errno>;

    /// sigreturn：拆掉处理函数栈帧，恢复被打断的用户上下文
    fn restore(&self, task: TaskRef) -> Result<(), Errno>;
}

/// 协作者集合
#[derive(Copy, Clone)]
pub struct Devices {
    pub fs: &'static dyn FileSystem,
    pub memory: &'static dyn MemoryRegions,
    pub video: &'static dyn VideoBuffers,
    pub windows: &'static dyn Windowing,
    pub signals: &'static dyn SignalFrames,
}
