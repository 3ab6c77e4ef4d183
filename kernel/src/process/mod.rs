//! 进程管理模块
//!
//! 本模块实现任务的生命周期，遵循 Linux 内核的进程模型：
//! - `table`: PCB 槽位表，当前任务由栈指针推出
//! - `task`: 任务控制块 (task_struct)
//! - `exec`: execute / halt / getargs / vidmap
//! - `init`: init 与空闲任务

pub mod exec;
pub mod init;
pub mod table;
pub mod task;

pub use exec::{parse_command, WaitMode};
pub use init::{idle_main, init_main};
pub use table::{TaskRef, TaskTable, TASK_BLOCK_SIZE};
pub use task::{Task, TaskFlags, TaskInfo};
