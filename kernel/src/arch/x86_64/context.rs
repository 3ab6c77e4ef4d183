//! 上下文切换原语
//!
//! 四个原语共用同一种栈帧：rbp/rbx/r12-r15 依次压栈，栈顶下面是返回地址，
//! 保存的 rsp 写进 PCB。恢复时弹出这六个寄存器再 ret，rax 作为返回值：
//! - `tern_switch` 恢复出来返回 0
//! - `tern_resume` 恢复出来返回父任务等到的退出码
//!
//! 降到用户态用 iretq，选择子与 GDT 布局一致：用户数据段 0x1b，用户代码段 0x23。

use core::arch::global_asm;

use crate::arch::TaskFn;
use crate::kernel::Kernel;

/// 用户代码段选择子 (RPL 3)
pub const USER_CODE_SELECTOR: u64 = 0x23;

/// 用户数据段选择子 (RPL 3)
pub const USER_DATA_SELECTOR: u64 = 0x1b;

/// 进入用户态时的 RFLAGS：只置 IF
pub const USER_RFLAGS: u64 = 0x202;

global_asm!(
    r#"
.global tern_switch
tern_switch:
    push rbp
    push rbx
    push r12
    push r13
    push r14
    push r15
    mov [rdi], rsp
    mov rsp, rsi
    xor eax, eax
    pop r15
    pop r14
    pop r13
    pop r12
    pop rbx
    pop rbp
    ret

.global tern_resume
tern_resume:
    mov rsp, rdi
    mov rax, rsi
    pop r15
    pop r14
    pop r13
    pop r12
    pop rbx
    pop rbp
    ret

.global tern_launch_user
tern_launch_user:
    push rbp
    push rbx
    push r12
    push r13
    push r14
    push r15
    mov [rdi], rsp
    mov rsp, rsi
    mov ax, {udata}
    mov ds, ax
    mov es, ax
    push {udata}
    push rcx
    push {rflags}
    push {ucode}
    push rdx
    iretq

.global tern_launch_kernel
tern_launch_kernel:
    push rbp
    push rbx
    push r12
    push r13
    push r14
    push r15
    mov [rdi], rsp
    mov rsp, rsi
    mov rdi, rdx
    mov rsi, rcx
    sti
    call {entry}
    ud2
"#,
    udata = const USER_DATA_SELECTOR,
    ucode = const USER_CODE_SELECTOR,
    rflags = const USER_RFLAGS,
    entry = sym kernel_task_entry,
);

#[allow(improper_ctypes)]
extern "C" {
    pub fn tern_switch(save: *mut usize, target: usize);
    pub fn tern_resume(target: usize, value: usize) -> !;
    pub fn tern_launch_user(save: *mut usize, kstack: usize, entry: usize, ustack: usize) -> usize;
    pub fn tern_launch_kernel(
        save: *mut usize,
        kstack: usize,
        kernel: &'static Kernel,
        f: TaskFn,
    ) -> usize;
}

/// 内核任务的第一帧：调用任务函数，返回即 halt(0)
#[allow(improper_ctypes_definitions)]
extern "C" fn kernel_task_entry(kernel: &'static Kernel, f: TaskFn) -> ! {
    f(kernel);
    if let Err(e) = kernel.halt(0) {
        log::error!("x86_64: kernel task cannot halt: {:?}", e);
    }
    kernel.machine().halt_forever()
}
