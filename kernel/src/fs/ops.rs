//! 按文件类型分派的操作表与文件系统调用
//!
//! 对应 Linux 的 vfs_read()/vfs_write() (fs/read_write.c)：
//! 描述符从当前任务的表中拷出，经操作表分派，再把新的偏移写回。

use crate::devices::FileKind;
use crate::errno::Errno;
use crate::kernel::Kernel;

use super::file::{FileDesc, FileOps};

/// 标准输入：只能读终端
pub static STDIN_OPS: FileOps = FileOps {
    open: None,
    close: None,
    read: Some(stdin_read),
    write: None,
};

/// 标准输出：只能写终端
pub static STDOUT_OPS: FileOps = FileOps {
    open: None,
    close: None,
    read: None,
    write: Some(stdout_write),
};

/// 虚拟 RTC
pub static RTC_OPS: FileOps = FileOps {
    open: Some(crate::rtc::rtc_open),
    close: Some(crate::rtc::rtc_close),
    read: Some(crate::rtc::rtc_read),
    write: Some(crate::rtc::rtc_write),
};

/// 目录：每次读一个目录项名字
pub static DIR_OPS: FileOps = FileOps {
    open: None,
    close: None,
    read: Some(dir_read),
    write: Some(read_only_write),
};

/// 普通文件
pub static REG_FILE_OPS: FileOps = FileOps {
    open: None,
    close: None,
    read: Some(file_read),
    write: Some(read_only_write),
};

fn stdin_read(kernel: &Kernel, _desc: &mut FileDesc, buf: &mut [u8]) -> Result<usize, Errno> {
    kernel.terminal_read(buf)
}

fn stdout_write(kernel: &Kernel, _desc: &mut FileDesc, buf: &[u8]) -> Result<usize, Errno> {
    kernel.terminal_write(buf)
}

fn dir_read(kernel: &Kernel, desc: &mut FileDesc, buf: &mut [u8]) -> Result<usize, Errno> {
    let n = kernel.devices().fs.read_dir(desc.offset, buf)?;
    if n > 0 {
        desc.offset += 1;
    }
    Ok(n)
}

fn file_read(kernel: &Kernel, desc: &mut FileDesc, buf: &mut [u8]) -> Result<usize, Errno> {
    let n = kernel.devices().fs.read_data(desc.inode, desc.offset, buf)?;
    desc.offset += n;
    Ok(n)
}

fn read_only_write(_kernel: &Kernel, _desc: &mut FileDesc, _buf: &[u8]) -> Result<usize, Errno> {
    Err(Errno::ReadOnlyFileSystem)
}

impl Kernel {
    /// 打开文件，返回最小的空闲描述符
    pub fn open(&self, name: &[u8]) -> Result<usize, Errno> {
        let cur = self.current().ok_or(Errno::NoSuchProcess)?;
        if name.is_empty() {
            return Err(Errno::NoSuchFileOrDirectory);
        }

        let entry = self.devices().fs.lookup(name)?;
        let ops: &'static FileOps = match entry.kind {
            FileKind::Rtc => &RTC_OPS,
            FileKind::Directory => &DIR_OPS,
            FileKind::Regular => &REG_FILE_OPS,
        };

        let fd = self.task(cur).files.free_slot()?;
        let mut desc = FileDesc::new(ops, entry.inode);
        if let Some(open) = ops.open {
            open(self, &mut desc)?;
        }
        self.task(cur).files.install(fd, desc);
        Ok(fd)
    }

    /// 关闭描述符；0/1、越界或未打开的描述符返回 BadFileNumber
    pub fn close(&self, fd: i32) -> Result<(), Errno> {
        let cur = self.current().ok_or(Errno::NoSuchProcess)?;
        let mut desc = self.task(cur).files.release(fd)?;
        match desc.ops.close {
            Some(close) => close(self, &mut desc),
            None => Ok(()),
        }
    }

    /// 读文件，可能阻塞（终端、RTC）
    pub fn read(&self, fd: i32, buf: &mut [u8]) -> Result<usize, Errno> {
        let cur = self.current().ok_or(Errno::NoSuchProcess)?;
        let mut desc = self.task(cur).files.get(fd)?;
        let read = desc.ops.read.ok_or(Errno::BadFileNumber)?;
        let n = read(self, &mut desc, buf)?;
        self.task(cur).files.update(fd, desc);
        Ok(n)
    }

    /// 写文件
    pub fn write(&self, fd: i32, buf: &[u8]) -> Result<usize, Errno> {
        let cur = self.current().ok_or(Errno::NoSuchProcess)?;
        let mut desc = self.task(cur).files.get(fd)?;
        let write = desc.ops.write.ok_or(Errno::BadFileNumber)?;
        let n = write(self, &mut desc, buf)?;
        self.task(cur).files.update(fd, desc);
        Ok(n)
    }

    /// 任务退出时关闭所有描述符
    pub(crate) fn close_all(&self, cur: crate::process::TaskRef) {
        for fd in 0..crate::config::MAX_FILES {
            let Some(mut desc) = self.task(cur).files.take(fd) else {
                continue;
            };
            if let Some(close) = desc.ops.close {
                if let Err(e) = close(self, &mut desc) {
                    log::warn!("fs: close fd {} of task {} failed: {:?}", fd, cur.index(), e);
                }
            }
        }
    }
}
