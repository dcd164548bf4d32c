//! Monitor Architecture Module
//!
//! This module contains the architecture specific primitives the monitor
//! relies on. These are abstracted behind the MonitorArch trait, which is the
//! architecture agnostic interface the rest of the monitor uses.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use crate::context::Trapframe;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86")] {
        mod x86;
        pub use x86::X86Arch;
        pub type SystemArch = x86::X86Arch;
    }
}

/// Trait for architecture specific monitor primitives.
///
/// As these are abstracting processor state and instructions, all routines
/// are expected to be static.
///
pub trait MonitorArch {
    /// Reads the frame pointer register of the caller.
    fn read_frame_pointer() -> u32;

    /// Restores the provided context and transfers control to it.
    ///
    /// On hardware this does not return. Control only comes back to the
    /// monitor through a fresh trap.
    fn switch_to(context: &Trapframe);
}
