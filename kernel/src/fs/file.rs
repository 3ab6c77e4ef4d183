//! 文件描述符和文件描述符表
//!
//! 参考 Linux 内核的 fdtable 设计 (fs/file.c, include/linux/fdtable.h)
//!
//! 核心概念：
//! - `FileDesc`: 打开的文件 = 操作表 + inode + 偏移 + 使用标志
//! - `FdTable`: 每个任务固定 `MAX_FILES` 个槽位，0/1 固定为标准输入/输出
//! - `FileOps`: 按文件类型分派的函数指针表，空槽位表示不支持该操作

use crate::config::MAX_FILES;
use crate::errno::Errno;
use crate::kernel::Kernel;

/// 标准输入
pub const STDIN: usize = 0;

/// 标准输出
pub const STDOUT: usize = 1;

/// 文件操作函数指针表
///
/// 对应 Linux 的 struct file_operations (include/linux/fs.h)
pub struct FileOps {
    /// 打开文件
    pub open: Option<fn(&Kernel, &mut FileDesc) -> Result<(), Errno>>,
    /// 关闭文件
    pub close: Option<fn(&Kernel, &mut FileDesc) -> Result<(), Errno>>,
    /// 读取文件
    pub read: Option<fn(&Kernel, &mut FileDesc, &mut [u8]) -> Result<usize, Errno>>,
    /// 写入文件
    pub write: Option<fn(&Kernel, &mut FileDesc, &[u8]) -> Result<usize, Errno>>,
}

/// 空操作表，未使用的槽位指向它
pub const NO_OPS: FileOps = FileOps {
    open: None,
    close: None,
    read: None,
    write: None,
};

/// 文件描述符
///
/// 可复制：读写时先拷出，操作完成后写回，阻塞期间不借用任务结构。
#[derive(Copy, Clone)]
pub struct FileDesc {
    /// 文件操作表
    pub ops: &'static FileOps,
    /// 关联的 inode
    pub inode: u32,
    /// 文件位置（目录是目录项下标）
    pub offset: usize,
    /// 槽位是否在使用
    pub in_use: bool,
}

impl FileDesc {
    /// 空槽位
    pub const EMPTY: FileDesc = FileDesc {
        ops: &NO_OPS,
        inode: 0,
        offset: 0,
        in_use: false,
    };

    /// 新打开的文件
    pub fn new(ops: &'static FileOps, inode: u32) -> Self {
        Self {
            ops,
            inode,
            offset: 0,
            in_use: true,
        }
    }
}

impl core::fmt::Debug for FileDesc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileDesc")
            .field("inode", &self.inode)
            .field("offset", &self.offset)
            .field("in_use", &self.in_use)
            .finish()
    }
}

/// 文件描述符表
///
/// 对应 Linux 的 struct fdtable
pub struct FdTable {
    fds: [FileDesc; MAX_FILES],
}

impl FdTable {
    /// 创建空的文件描述符表
    pub const fn new() -> Self {
        Self {
            fds: [FileDesc::EMPTY; MAX_FILES],
        }
    }

    /// 清空并安装标准输入/输出
    pub fn init_std(&mut self, stdin: &'static FileOps, stdout: &'static FileOps) {
        self.fds = [FileDesc::EMPTY; MAX_FILES];
        self.fds[STDIN] = FileDesc::new(stdin, 0);
        self.fds[STDOUT] = FileDesc::new(stdout, 0);
    }

    /// 校验用户传入的描述符
    fn index(fd: i32) -> Result<usize, Errno> {
        usize::try_from(fd)
            .ok()
            .filter(|&i| i < MAX_FILES)
            .ok_or(Errno::BadFileNumber)
    }

    /// 找到最小的空闲描述符（不含 0/1）
    pub fn free_slot(&self) -> Result<usize, Errno> {
        (STDOUT + 1..MAX_FILES)
            .find(|&i| !self.fds[i].in_use)
            .ok_or(Errno::TooManyOpenFiles)
    }

    /// 在指定空闲槽位安装文件
    pub fn install(&mut self, fd: usize, desc: FileDesc) {
        debug_assert!(!self.fds[fd].in_use, "fd {} already in use", fd);
        self.fds[fd] = desc;
    }

    /// 拷出一个打开的描述符
    pub fn get(&self, fd: i32) -> Result<FileDesc, Errno> {
        let i = Self::index(fd)?;
        let desc = self.fds[i];
        if !desc.in_use {
            return Err(Errno::BadFileNumber);
        }
        Ok(desc)
    }

    /// 写回读写后的描述符（偏移等）
    pub fn update(&mut self, fd: i32, desc: FileDesc) {
        if let Ok(i) = Self::index(fd) {
            if self.fds[i].in_use {
                self.fds[i] = desc;
            }
        }
    }

    /// close 系统调用：标准输入/输出不能关闭
    pub fn release(&mut self, fd: i32) -> Result<FileDesc, Errno> {
        let i = Self::index(fd)?;
        if i == STDIN || i == STDOUT || !self.fds[i].in_use {
            return Err(Errno::BadFileNumber);
        }
        Ok(core::mem::replace(&mut self.fds[i], FileDesc::EMPTY))
    }

    /// 任务退出时逐个取出所有打开的描述符（含 0/1）
    pub fn take(&mut self, fd: usize) -> Option<FileDesc> {
        let desc = core::mem::replace(self.fds.get_mut(fd)?, FileDesc::EMPTY);
        desc.in_use.then_some(desc)
    }

    /// 打开的描述符数量
    pub fn open_count(&self) -> usize {
        self.fds.iter().filter(|d| d.in_use).count()
    }

    pub fn is_open(&self, fd: usize) -> bool {
        self.fds.get(fd).is_some_and(|d| d.in_use)
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}
