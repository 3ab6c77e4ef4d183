//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 调度器模块
//!
//! 参考 Linux 内核的调度器设计 (kernel/sched/)
//!
//! - `runqueue`: 运行队列与等待队列（侵入式链表）
//! - `sched`: 时钟中断驱动的时间片轮转、让出、阻塞与唤醒
//!
//! 单核，没有调度类和优先级。

pub mod runqueue;
pub mod sched;

pub use runqueue::{CHILD_WAIT, RUN_QUEUE};
