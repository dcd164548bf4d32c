//! Kernel Monitor
//!
//! This crate provides an interactive command monitor for a small i386 kernel.
//! The kernel drops into the monitor at boot or when a context traps on a
//! breakpoint or debug exception. The operator can then inspect the kernel
//! stack and page tables and resume the trapped context, either freely or one
//! instruction at a time.
//!
//! ## Commands
//!
//! | Command        | Description                                              |
//! |----------------|----------------------------------------------------------|
//! | `help`         | Display this list of commands                            |
//! | `kerninfo`     | Display information about the kernel                     |
//! | `backtrace`    | Display information about kernel stack                   |
//! | `showmappings` | Display information of all physical page mappings        |
//! | `continue`/`c` | Continues execution of the environment                   |
//! | `si`           | Performs a single instruction of the current environment |
//!
//! ## Examples and Usage
//!
//! The monitor is built over the kernel services it inspects. The platform
//! creates a static [KernelMonitor] and registers it with [set_monitor]. Trap
//! handling code then uses [enter] to hand control to the operator.
//!
//! ```rust,ignore
//! static MONITOR: kmon::KernelMonitor<kmon::SystemArch> =
//!     kmon::KernelMonitor::new(&PAGE_TABLES, &STABS, &STACK_MEMORY).with_prompt("K> ");
//!
//! fn i386_init() {
//!     kmon::set_monitor(&MONITOR);
//!     loop {
//!         kmon::enter(&mut CONSOLE.lock(), None);
//!     }
//! }
//!
//! fn trap_dispatch(tf: &mut kmon::Trapframe) {
//!     match tf.exception_type() {
//!         kmon::ExceptionType::Breakpoint | kmon::ExceptionType::Step => {
//!             kmon::enter(&mut CONSOLE.lock(), Some(tf))
//!         }
//!         _ => { /* regular trap handling */ }
//!     }
//! }
//! ```
//!
//! Commands that fail print their error and report a status of -1, but the
//! monitor keeps prompting. Only `continue`, `c` and `si` leave the loop, by
//! handing the trapped context back to the processor.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

#![cfg_attr(not(test), no_std)]

mod arch;
mod context;
mod control;
mod error;
mod layout;
mod monitor;
mod paging;

#[cfg(test)]
mod test_support;

extern crate alloc;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86")] {
        pub use arch::{SystemArch, X86Arch};
    }
}

pub use arch::MonitorArch;
pub use context::{trap_name, EFlags, ExceptionType, PushRegs, Trapframe, IRQ_OFFSET, T_BRKPT, T_DEBUG, T_PGFLT, T_SYSCALL};
pub use control::{resume, ResumeMode, Resumed};
pub use error::{MonResult, MonitorError, COMMAND_FAILURE};
pub use kmon_stacktrace::{RawMemory, StackMemory, SymbolInfo, SymbolResolver};
pub use layout::{KernelLayout, KERNBASE};
pub use monitor::{Command, Console, Flow, KernelMonitor, MAX_ARGS};
pub use paging::{
    translate, MappingReport, PageMapping, PageTableEntry, PageTableWalker, PAGE_MASK, PAGE_SIZE, PTE_P, PTE_U, PTE_W,
};

/// Global instance of the monitor.
///
/// This is only expected to be set once. Trap handlers reach the monitor
/// through the static routines after that point, so it can not be replaced.
///
static MONITOR: spin::Once<&dyn Monitor> = spin::Once::new();

/// Trait for monitor interaction. This allows a global to the monitor without
/// naming its architecture.
trait Monitor: Sync {
    /// Runs the command loop.
    fn enter(&'static self, console: &mut dyn Console, context: Option<&mut Trapframe>);
}

impl<A: MonitorArch + 'static> Monitor for KernelMonitor<A> {
    fn enter(&'static self, console: &mut dyn Console, context: Option<&mut Trapframe>) {
        self.run(console, context);
    }
}

/// Sets the global instance of the monitor.
pub fn set_monitor<A: MonitorArch + 'static>(monitor: &'static KernelMonitor<A>) {
    MONITOR.call_once(|| monitor);
}

/// Checks if a monitor has been set.
pub fn enabled() -> bool {
    MONITOR.is_completed()
}

/// Enters the global monitor on `console`. `context` is the trapped context,
/// if any, and is resumed by `continue`, `c` and `si`.
///
/// Returns when the console runs out of input. On hardware a resumed context
/// never comes back here.
pub fn enter(console: &mut dyn Console, context: Option<&mut Trapframe>) {
    match MONITOR.get() {
        Some(monitor) => monitor.enter(console, context),
        None => log::warn!("Kernel monitor entered before it was set."),
    }
}
