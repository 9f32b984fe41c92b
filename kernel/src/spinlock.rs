//! Interrupt-safe spinlock for per-task signal state
//!
//! Signal state is touched from task context and from interrupt handlers,
//! so every acquisition disables local interrupts first and restores the
//! previous interrupt state on release. The critical sections guarded by
//! this lock are short and never sleep.

use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use spin::{Mutex, MutexGuard};

/// Architecture-specific interrupt control
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
mod arch {
    #[inline(always)]
    pub fn interrupts_enabled() -> bool {
        x86_64::instructions::interrupts::are_enabled()
    }

    #[inline(always)]
    pub unsafe fn disable_interrupts() {
        x86_64::instructions::interrupts::disable();
    }

    #[inline(always)]
    pub unsafe fn enable_interrupts() {
        x86_64::instructions::interrupts::enable();
    }
}

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
mod arch {
    /// DAIF.I (IRQ mask) bit
    const DAIF_IRQ: u64 = 1 << 7;

    #[inline(always)]
    pub fn interrupts_enabled() -> bool {
        let daif: u64;
        unsafe {
            core::arch::asm!("mrs {}, daif", out(reg) daif, options(nomem, nostack));
        }
        daif & DAIF_IRQ == 0
    }

    #[inline(always)]
    pub unsafe fn disable_interrupts() {
        core::arch::asm!("msr daifset, #2", options(nomem, nostack));
    }

    #[inline(always)]
    pub unsafe fn enable_interrupts() {
        core::arch::asm!("msr daifclr, #2", options(nomem, nostack));
    }
}

/// Hosted builds (unit tests, simulators) have no interrupts to mask
#[cfg(not(target_os = "none"))]
mod arch {
    #[inline(always)]
    pub fn interrupts_enabled() -> bool {
        false
    }

    #[inline(always)]
    pub unsafe fn disable_interrupts() {}

    #[inline(always)]
    pub unsafe fn enable_interrupts() {}
}

/// A spinlock that also disables interrupts while held
pub struct IrqSpinLock<T> {
    inner: Mutex<T>,
}

impl<T> IrqSpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Acquire the lock with interrupts disabled
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T> {
        // Save interrupt state and disable interrupts before spinning so an
        // interrupt on this CPU cannot try to take the lock we hold
        let irq_was_enabled = arch::interrupts_enabled();
        unsafe {
            arch::disable_interrupts();
        }

        IrqSpinLockGuard {
            guard: ManuallyDrop::new(self.inner.lock()),
            irq_was_enabled,
        }
    }
}

/// RAII guard for [`IrqSpinLock`]
///
/// Dropping releases the lock, then restores the saved interrupt state.
pub struct IrqSpinLockGuard<'a, T> {
    guard: ManuallyDrop<MutexGuard<'a, T>>,
    irq_was_enabled: bool,
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for IrqSpinLockGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the inner guard is dropped exactly once, here, and never
        // touched again
        unsafe {
            ManuallyDrop::drop(&mut self.guard);
        }

        if self.irq_was_enabled {
            unsafe {
                arch::enable_interrupts();
            }
        }
    }
}
