//! 运行队列与等待队列
//!
//! 所有任务节点和链表哨兵放在同一个 [`ListArena`] 里：
//! - `0..MAX_TASKS`: 任务节点，下标就是 PCB 槽位号
//! - `RUN_QUEUE`: 运行队列哨兵
//! - `CHILD_WAIT`: 等待子任务退出的父任务
//! - `RTC_WAIT`: 等待下一个虚拟 RTC 中断的任务
//! - `term_wait(t)`: 阻塞在终端 t 上的读者
//!
//! 后两种等待可以被信号打断，子任务等待不行。
//!
//! 一个任务节点任何时刻最多挂在一条链表上；正在运行的任务在运行队列里。
//! 这里的函数只做链表操作，调用者必须持有调度锁。

use crate::config::{MAX_TASKS, MAX_TERMINALS};
use crate::list::ListArena;
use crate::process::TaskRef;
use crate::terminal::TermId;

/// 节点总数
pub const NODES: usize = MAX_TASKS + 3 + MAX_TERMINALS;

/// 任务链表
pub type TaskLists = ListArena<NODES>;

/// 运行队列哨兵
pub const RUN_QUEUE: usize = MAX_TASKS;

/// 子任务等待队列哨兵
pub const CHILD_WAIT: usize = MAX_TASKS + 1;

/// 虚拟 RTC 等待队列哨兵
pub const RTC_WAIT: usize = MAX_TASKS + 2;

/// 终端输入等待队列哨兵
pub fn term_wait(term: TermId) -> usize {
    debug_assert!(!term.is_null(), "runqueue: null terminal has no wait list");
    MAX_TASKS + 3 + term.index()
}

/// 挂在这条链表上的任务能否被信号唤醒（对应 TASK_INTERRUPTIBLE）
pub fn is_interruptible(head: usize) -> bool {
    head == RTC_WAIT || (MAX_TASKS + 3..NODES).contains(&head)
}

/// 插到运行队列头部，下一个被调度（新任务、被唤醒的任务）
pub fn insert_to_head(lists: &mut TaskLists, task: TaskRef) {
    lists.move_to(task.index(), RUN_QUEUE);
}

/// 把任务移到另一条链表的尾部（进入等待）
pub fn move_to_list(lists: &mut TaskLists, task: TaskRef, head: usize) {
    lists.del(task.index());
    lists.add_tail(task.index(), head);
}

/// 移到运行队列尾部（时间片用完、主动让出）
///
/// 运行队列里只有它自己时保持不变。
pub fn move_to_tail(lists: &mut TaskLists, task: TaskRef) {
    if lists.contains(RUN_QUEUE, task.index()) {
        lists.move_tail(task.index(), RUN_QUEUE);
    } else {
        lists.del(task.index());
        lists.add_tail(task.index(), RUN_QUEUE);
    }
}

/// 选出下一个要运行的任务
///
/// 队首是空闲任务而队列里还有别的任务时，先把空闲任务轮转到队尾。
pub fn pick_next(lists: &mut TaskLists, idle: Option<TaskRef>) -> Option<TaskRef> {
    let head = lists.first(RUN_QUEUE)?;
    if let Some(idle) = idle {
        if head == idle.index() && lists.last(RUN_QUEUE) != Some(head) {
            lists.move_tail(head, RUN_QUEUE);
        }
    }
    lists.first(RUN_QUEUE).map(TaskRef::from_index)
}

/// 任务当前所在链表的哨兵
pub fn list_of(lists: &TaskLists, task: TaskRef) -> Option<usize> {
    if !lists.is_linked(task.index()) {
        return None;
    }
    (MAX_TASKS..NODES).find(|&head| lists.contains(head, task.index()))
}
