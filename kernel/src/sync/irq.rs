//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 关中断保护与中断安全的自旋锁
//!
//! 对应 Linux 的 local_irq_save()/local_irq_restore() 与 spin_lock_irqsave()。
//!
//! 单核内核里，多指令的链表修改只需要屏蔽中断即可保证原子性。
//! 守卫析构时恢复的是进入前的状态，而不是无条件开中断，所以可以嵌套。

use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use spin::{Mutex, MutexGuard};

use crate::arch::Machine;

/// 中断保护 RAII 守卫
///
/// 在作用域内禁用中断，离开时恢复进入前的状态
pub struct IrqGuard<'a> {
    machine: &'a dyn Machine,
    was_enabled: bool,
}

impl<'a> IrqGuard<'a> {
    /// 禁用中断并创建守卫
    #[inline]
    pub fn new(machine: &'a dyn Machine) -> Self {
        let was_enabled = machine.interrupts_enabled();
        machine.disable_interrupts();
        IrqGuard { machine, was_enabled }
    }
}

impl Drop for IrqGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        if self.was_enabled {
            self.machine.enable_interrupts();
        }
    }
}

/// 持锁期间屏蔽中断的自旋锁
pub struct IrqLock<T> {
    machine: &'static dyn Machine,
    inner: Mutex<T>,
}

impl<T> IrqLock<T> {
    pub fn new(machine: &'static dyn Machine, value: T) -> Self {
        Self {
            machine,
            inner: Mutex::new(value),
        }
    }

    /// 关中断后加锁
    pub fn lock(&self) -> IrqLockGuard<'_, T> {
        let irq = IrqGuard::new(self.machine);
        let guard = self.inner.lock();
        IrqLockGuard {
            guard: ManuallyDrop::new(guard),
            irq: ManuallyDrop::new(irq),
        }
    }
}

/// [`IrqLock`] 的守卫：先解锁，再恢复中断
pub struct IrqLockGuard<'a, T> {
    guard: ManuallyDrop<MutexGuard<'a, T>>,
    irq: ManuallyDrop<IrqGuard<'a>>,
}

impl<'a, T> IrqLockGuard<'a, T> {
    /// 释放数据锁，但保持中断屏蔽
    ///
    /// 上下文切换前使用：切换期间不能被打断，而切换目标需要能再次加锁。
    pub fn unlock(self) -> IrqGuard<'a> {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: `this` 不会再被析构，两个字段各取出一次
        unsafe {
            ManuallyDrop::drop(&mut this.guard);
            ManuallyDrop::take(&mut this.irq)
        }
    }
}

impl<T> Deref for IrqLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for IrqLockGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: 只在这里析构一次
        unsafe {
            ManuallyDrop::drop(&mut self.guard);
            ManuallyDrop::drop(&mut self.irq);
        }
    }
}
