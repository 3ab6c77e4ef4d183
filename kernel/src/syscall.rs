//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 系统调用分发
//!
//! 软中断入口把 (调用号, 参数1, 参数2, 参数3) 交给 [`dispatch`]。
//! 约定:
//! - 返回值非负表示成功，-1 表示失败（具体原因只进日志）
//! - 用户指针先经 `MemoryRegions::check_user` 校验再访问
//! - 返回用户态之前检查待处理信号

use core::mem::size_of;

use crate::config::{MAX_ARGS_LEN, MAX_NAME_LEN};
use crate::errno::Errno;
use crate::kernel::Kernel;
use crate::process::WaitMode;

/// 系统调用号
#[repr(usize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyscallNo {
    Halt = 1,
    Execute = 2,
    Read = 3,
    Write = 4,
    Open = 5,
    Close = 6,
    Getargs = 7,
    Vidmap = 8,
    SetHandler = 9,
    Sigreturn = 10,
}

impl SyscallNo {
    pub fn from_number(nr: usize) -> Option<SyscallNo> {
        Some(match nr {
            1 => SyscallNo::Halt,
            2 => SyscallNo::Execute,
            3 => SyscallNo::Read,
            4 => SyscallNo::Write,
            5 => SyscallNo::Open,
            6 => SyscallNo::Close,
            7 => SyscallNo::Getargs,
            8 => SyscallNo::Vidmap,
            9 => SyscallNo::SetHandler,
            10 => SyscallNo::Sigreturn,
            _ => return None,
        })
    }
}

/// 命令行最大长度：名字 + 空格 + 参数
const MAX_COMMAND_LEN: usize = MAX_NAME_LEN + 1 + MAX_ARGS_LEN;

/// 系统调用入口
pub fn dispatch(kernel: &'static Kernel, nr: usize, a1: usize, a2: usize, a3: usize) -> isize {
    let ret = match SyscallNo::from_number(nr) {
        Some(no) => handle(kernel, no, a1, a2, a3),
        None => Err(Errno::FunctionNotImplemented),
    };

    kernel.deliver_pending();

    match ret {
        Ok(v) => v as isize,
        Err(e) => {
            log::debug!("syscall: {} failed: {:?}", nr, e);
            -1
        }
    }
}

fn handle(kernel: &'static Kernel, no: SyscallNo, a1: usize, a2: usize, a3: usize) -> Result<usize, Errno> {
    match no {
        SyscallNo::Halt => match kernel.halt(a1 as u8) {
            Ok(never) => match never {},
            Err(e) => Err(e),
        },
        SyscallNo::Execute => {
            let command = user_cstr(kernel, a1, MAX_COMMAND_LEN, Errno::ArgumentListTooLong)?;
            let wait = if a2 != 0 { WaitMode::Yes } else { WaitMode::No };
            kernel
                .execute(command, wait, a3 != 0, None)
                .map(|status| status as usize)
        }
        SyscallNo::Read => {
            let buf = user_slice_mut(kernel, a2, a3)?;
            kernel.read(a1 as i32, buf)
        }
        SyscallNo::Write => {
            let buf = user_slice(kernel, a2, a3)?;
            kernel.write(a1 as i32, buf)
        }
        SyscallNo::Open => {
            let name = user_cstr(kernel, a1, MAX_NAME_LEN + 1, Errno::FileNameTooLong)?;
            kernel.open(name)
        }
        SyscallNo::Close => kernel.close(a1 as i32).map(|()| 0),
        SyscallNo::Getargs => {
            let buf = user_slice_mut(kernel, a1, a2)?;
            kernel.getargs(buf).map(|()| 0)
        }
        SyscallNo::Vidmap => {
            // 先校验输出指针，避免映射成功后才发现写不回去
            check_user(kernel, a1, size_of::<usize>())?;
            let addr = kernel.vidmap()?;
            // SAFETY: 上面已经确认这段用户内存可写
            unsafe { (a1 as *mut usize).write_unaligned(addr) };
            Ok(0)
        }
        SyscallNo::SetHandler => kernel.set_handler(a1, a2).map(|()| 0),
        SyscallNo::Sigreturn => kernel.sigreturn().map(|()| 0),
    }
}

fn check_user(kernel: &Kernel, addr: usize, len: usize) -> Result<(), Errno> {
    let region = kernel.current_region().ok_or(Errno::BadAddress)?;
    if addr == 0 || !kernel.devices().memory.check_user(region, addr, len) {
        return Err(Errno::BadAddress);
    }
    Ok(())
}

fn user_slice<'a>(kernel: &Kernel, addr: usize, len: usize) -> Result<&'a [u8], Errno> {
    check_user(kernel, addr, len)?;
    // SAFETY: check_user 确认了 [addr, addr + len) 属于当前任务的内存区
    Ok(unsafe { core::slice::from_raw_parts(addr as *const u8, len) })
}

fn user_slice_mut<'a>(kernel: &Kernel, addr: usize, len: usize) -> Result<&'a mut [u8], Errno> {
    check_user(kernel, addr, len)?;
    // SAFETY: 同上
    Ok(unsafe { core::slice::from_raw_parts_mut(addr as *mut u8, len) })
}

/// 以 0 结尾的用户字符串（不含结尾的 0）
fn user_cstr<'a>(kernel: &Kernel, addr: usize, max: usize, too_long: Errno) -> Result<&'a [u8], Errno> {
    for len in 0..max {
        let byte = addr.checked_add(len).ok_or(Errno::BadAddress)?;
        check_user(kernel, byte, 1)?;
        // SAFETY: 这个字节刚刚校验过
        if unsafe { *(byte as *const u8) } == 0 {
            return user_slice(kernel, addr, len);
        }
    }
    Err(too_long)
}
