//! 同步原语 (Synchronization Primitives)
//!
//! 单核内核的同步只有一条规则：跨多条指令修改共享表时屏蔽中断，
//! 结束后恢复进入前的中断状态。
//!
//! - `IrqGuard`: 对应 local_irq_save()/local_irq_restore()
//! - `IrqLock`: 对应 spin_lock_irqsave()，保护运行队列、终端表和焦点

pub mod irq;

pub use irq::{IrqGuard, IrqLock, IrqLockGuard};
