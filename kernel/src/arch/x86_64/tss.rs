//! 任务状态段 (TSS)
//!
//! 只用到 ring0 栈（privilege_stack_table[0]）：用户态被中断时处理器从这里开始压栈。
//! 每次切换任务前都要改成目标任务的内核栈顶。GDT 的装载由启动代码完成。

use core::ops::Deref;

use spin::Mutex;
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

static TSS: Mutex<TaskStateSegment> = Mutex::new(TaskStateSegment::new());

/// 供 GDT 描述符引用的 TSS
pub fn get_tss() -> &'static TaskStateSegment {
    // SAFETY: TSS 是静态变量，地址在内核生命周期内不变
    unsafe { &*(TSS.lock().deref() as *const TaskStateSegment) }
}

/// 设置 ring0 栈
pub fn set_kernel_stack(top: usize) {
    TSS.lock().privilege_stack_table[0] = VirtAddr::new(top as u64);
}
