//! PCB 槽位表
//!
//! 每个任务占一个 8KB 对齐的块：块首是 PCB，剩下的部分是该任务的内核栈。
//! 于是"当前任务"不需要全局变量，把栈指针按 8KB 掩码就能得到块基址，
//! 再减去表基址除以块大小就是槽位号（对应 Linux 早期的 current_thread_info()）。
//!
//! 槽位 i 位于 `base + i * TASK_BLOCK_SIZE`，表向高地址增长。

use core::cell::UnsafeCell;
use core::mem::size_of;

use crate::config::MAX_TASKS;

use super::task::Task;

/// PCB + 内核栈块大小
pub const TASK_BLOCK_SIZE: usize = 8192;

/// 内核栈顶离块末尾的保留字节
const STACK_TOP_RESERVED: usize = 16;

/// 任务句柄：PCB 槽位号
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskRef(usize);

impl TaskRef {
    pub(crate) const fn from_index(index: usize) -> Self {
        TaskRef(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// PCB 与它的内核栈
#[repr(C, align(8192))]
pub struct TaskBlock {
    task: UnsafeCell<Task>,
    stack: [u8; TASK_BLOCK_SIZE - size_of::<UnsafeCell<Task>>()],
}

const _: () = assert!(size_of::<TaskBlock>() == TASK_BLOCK_SIZE);

impl TaskBlock {
    const fn new() -> Self {
        Self {
            task: UnsafeCell::new(Task::new()),
            stack: [0; TASK_BLOCK_SIZE - size_of::<UnsafeCell<Task>>()],
        }
    }
}

/// PCB 槽位表
///
/// 启动代码把它放在一个静态区里，整个内核生命周期内不会移动。
pub struct TaskTable {
    blocks: [TaskBlock; MAX_TASKS],
}

// SAFETY: PCB 只在调度锁内或由任务自己在运行时访问
unsafe impl Sync for TaskTable {}

impl TaskTable {
    pub const fn new() -> Self {
        Self {
            blocks: [const { TaskBlock::new() }; MAX_TASKS],
        }
    }

    fn base(&self) -> usize {
        self.blocks.as_ptr() as usize
    }

    /// 由栈指针推出槽位；不在表内的栈（启动栈）返回 None
    pub fn slot_of(&self, sp: usize) -> Option<TaskRef> {
        let block = sp & !(TASK_BLOCK_SIZE - 1);
        let offset = block.checked_sub(self.base())?;
        let index = offset / TASK_BLOCK_SIZE;
        (index < MAX_TASKS).then_some(TaskRef(index))
    }

    /// 任务内核栈顶（TSS 的 ring0 栈、新任务的初始栈）
    pub fn kstack_top(&self, task: TaskRef) -> usize {
        self.base() + (task.0 + 1) * TASK_BLOCK_SIZE - STACK_TOP_RESERVED
    }

    /// 找一个空闲槽位（调用者持有调度锁）
    pub(crate) fn find_free(&self) -> Option<TaskRef> {
        (0..MAX_TASKS)
            .map(TaskRef)
            // SAFETY: 只读 valid 标志，调用者持有调度锁
            .find(|&t| unsafe { !(*self.task_ptr(t)).valid })
    }

    /// PCB 的裸指针
    pub(crate) fn task_ptr(&self, task: TaskRef) -> *mut Task {
        self.blocks[task.0].task.get()
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::boxed::Box;

    #[test]
    fn test_block_alignment() {
        let table = Box::leak(Box::new(TaskTable::new()));
        assert_eq!(table.base() % TASK_BLOCK_SIZE, 0);
        for i in 0..MAX_TASKS {
            let top = table.kstack_top(TaskRef(i));
            assert_eq!(top % 16, 0);
            assert_eq!(table.slot_of(top), Some(TaskRef(i)));
        }
    }

    #[test]
    fn test_slot_of_masks_any_stack_address() {
        let table = Box::leak(Box::new(TaskTable::new()));
        let block = table.base() + 2 * TASK_BLOCK_SIZE;
        assert_eq!(table.slot_of(block), Some(TaskRef(2)));
        assert_eq!(table.slot_of(block + 100), Some(TaskRef(2)));
        assert_eq!(table.slot_of(block + TASK_BLOCK_SIZE - 1), Some(TaskRef(2)));

        // 表外的栈
        assert_eq!(table.slot_of(table.base() - 8), None);
        assert_eq!(table.slot_of(table.base() + MAX_TASKS * TASK_BLOCK_SIZE), None);
    }

    #[test]
    fn test_fresh_table_all_free() {
        let table = Box::leak(Box::new(TaskTable::new()));
        assert_eq!(table.find_free(), Some(TaskRef(0)));
    }
}
