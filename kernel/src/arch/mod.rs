//! 架构相关代码
//!
//! 调度核心只通过 [`Machine`] 与处理器打交道：开关中断、TSS 内核栈、
//! 以及四个共用同一种栈帧布局的控制转移原语。
//!
//! 栈帧布局（x86_64）：被调用者保存寄存器 rbx/rbp/r12-r15 压在当前内核栈上，
//! 栈顶是返回地址，保存下来的 rsp 写进 PCB 的 `ksp`。因此：
//! - `launch` 挂起的调用者既可以被 `switch` 唤醒（返回 0），
//!   也可以被 `resume` 唤醒（返回子任务的退出码）
//! - `switch` 挂起的任务只会被 `switch` 或 `jump` 唤醒

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod x86_64;

use crate::kernel::Kernel;

/// 内核态任务入口
///
/// 函数返回等价于 `halt(0)`。
pub type TaskFn = fn(&'static Kernel);

/// 新任务的第一次进入方式
#[derive(Debug, Copy, Clone)]
pub enum Entry {
    /// 降到用户态执行，`entry` 是用户虚拟地址，`stack` 是用户栈顶
    User { entry: usize, stack: usize },
    /// 直接在内核态调用
    Kernel(TaskFn),
}

/// 处理器抽象
///
/// 单核。所有保存/恢复的"栈指针"都是不透明的 `usize`。
pub trait Machine: Sync {
    /// 当前是否允许中断
    fn interrupts_enabled(&self) -> bool;

    /// 关中断（对应 local_irq_disable）
    fn disable_interrupts(&self);

    /// 开中断（对应 local_irq_enable）
    fn enable_interrupts(&self);

    /// 把 TSS 的 ring0 栈指向 `top`，下一次特权级切换从这里压栈
    fn set_kernel_stack(&self, top: usize);

    /// 读取当前栈指针
    fn stack_pointer(&self) -> usize;

    /// 协作式切换：保存当前上下文到 `*save`，然后在 `target` 栈上继续执行
    ///
    /// # Safety
    /// 调用者必须关中断，`target` 必须是一个之前由 `switch`/`launch` 保存的值。
    unsafe fn switch(&self, save: *mut usize, target: usize);

    /// 第一次进入新任务
    ///
    /// 保存当前上下文到 `*save` 后，在 `stack` 上以 `entry` 启动新任务。
    /// 只有当保存的上下文被 `resume` 或 `switch` 唤醒时才返回。
    ///
    /// # Safety
    /// 调用者必须关中断，`stack` 必须是一个空闲 PCB 块的内核栈顶。
    unsafe fn launch(
        &self,
        kernel: &'static Kernel,
        save: *mut usize,
        stack: usize,
        entry: Entry,
    ) -> usize;

    /// 恢复到 `launch` 保存的上下文，并让那次 `launch` 返回 `value`
    ///
    /// # Safety
    /// `target` 必须是某个仍然挂起的 `launch` 帧。
    unsafe fn resume(&self, target: usize, value: usize) -> !;

    /// 放弃当前上下文，直接在 `target` 上继续
    ///
    /// # Safety
    /// 同 `switch`，但当前上下文不再被保存。
    unsafe fn jump(&self, target: usize) -> !;

    /// 永久停机
    fn halt_forever(&self) -> !;

    /// 空闲任务的一步：开中断等待下一个中断
    fn wait_for_interrupt(&self, kernel: &'static Kernel);

    /// 向中断控制器确认中断
    fn end_of_interrupt(&self, irq: u8);
}

/// PIT 时钟中断号
pub const IRQ_TIMER: u8 = 0;

/// 键盘中断号
pub const IRQ_KEYBOARD: u8 = 1;

/// RTC 中断号
pub const IRQ_RTC: u8 = 8;
