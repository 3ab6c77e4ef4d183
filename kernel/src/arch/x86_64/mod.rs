//! x86_64 裸机后端
//!
//! - `context`: 切换/启动/恢复原语（汇编）
//! - `tss`: ring0 栈
//!
//! 中断控制器是级联的 8259A，EOI 写 0x20（从片再写 0xA0）。

pub mod context;
pub mod tss;

use core::arch::asm;

use x86_64::instructions::{hlt, interrupts, port::Port};

use crate::kernel::Kernel;

use super::{Entry, Machine};

const PIC1_COMMAND: u16 = 0x20;
const PIC2_COMMAND: u16 = 0xA0;
const PIC_EOI: u8 = 0x20;

/// 裸机处理器
pub struct X86Machine;

impl Machine for X86Machine {
    fn interrupts_enabled(&self) -> bool {
        interrupts::are_enabled()
    }

    fn disable_interrupts(&self) {
        interrupts::disable();
    }

    fn enable_interrupts(&self) {
        interrupts::enable();
    }

    fn set_kernel_stack(&self, top: usize) {
        tss::set_kernel_stack(top);
    }

    fn stack_pointer(&self) -> usize {
        let sp: usize;
        // SAFETY: 只读 rsp
        unsafe { asm!("mov {}, rsp", out(reg) sp, options(nomem, nostack, preserves_flags)) };
        sp
    }

    unsafe fn switch(&self, save: *mut usize, target: usize) {
        context::tern_switch(save, target);
    }

    unsafe fn launch(&self, kernel: &'static Kernel, save: *mut usize, stack: usize, entry: Entry) -> usize {
        match entry {
            Entry::User { entry, stack: ustack } => context::tern_launch_user(save, stack, entry, ustack),
            Entry::Kernel(f) => context::tern_launch_kernel(save, stack, kernel, f),
        }
    }

    unsafe fn resume(&self, target: usize, value: usize) -> ! {
        context::tern_resume(target, value)
    }

    unsafe fn jump(&self, target: usize) -> ! {
        context::tern_resume(target, 0)
    }

    fn halt_forever(&self) -> ! {
        loop {
            interrupts::disable();
            hlt();
        }
    }

    fn wait_for_interrupt(&self, _kernel: &'static Kernel) {
        interrupts::enable_and_hlt();
    }

    fn end_of_interrupt(&self, irq: u8) {
        // SAFETY: 8259A 命令端口
        unsafe {
            if irq >= 8 {
                Port::<u8>::new(PIC2_COMMAND).write(PIC_EOI);
            }
            Port::<u8>::new(PIC1_COMMAND).write(PIC_EOI);
        }
    }
}

/// 裸机上唯一的处理器实例
pub static MACHINE: X86Machine = X86Machine;
