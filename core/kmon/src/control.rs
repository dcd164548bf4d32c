//! Execution control
//!
//! Resumes the trapped context either until its next trap or for exactly one
//! instruction. Both paths hand the context to the architecture's context
//! switch, which does not come back on hardware.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use core::fmt;

use crate::{
    arch::MonitorArch,
    context::{ExceptionType, Trapframe},
};

/// How the trapped context should run once resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    /// Run until the next trap of any kind.
    RunToCompletion,
    /// Run one instruction, then raise a debug exception.
    SingleStep,
}

impl fmt::Display for ResumeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResumeMode::RunToCompletion => write!(f, "continue"),
            ResumeMode::SingleStep => write!(f, "si"),
        }
    }
}

/// Proof that the context was handed to the context switch. On hardware the
/// switch never returns, so this is only ever observed in hosted builds.
#[derive(Debug, PartialEq, Eq)]
pub struct Resumed;

/// Resumes `context` according to `mode`.
///
/// The context must have trapped on a breakpoint or a debug exception. Any
/// other trap means the monitor was entered in a state it can not safely
/// resume from, and the kernel panics.
pub fn resume<A: MonitorArch>(context: &mut Trapframe, mode: ResumeMode) -> Resumed {
    let exception_type = context.exception_type();
    if let ExceptionType::Other(_) = exception_type {
        log::error!("Refusing to {} after trap {:#x}", mode, context.trapno);
        panic!("mon_{}: unexpected trap! {}", mode, exception_type);
    }

    match mode {
        ResumeMode::RunToCompletion => {
            // A breakpoint trap never has the flag set, only a completed step
            // leaves it behind.
            if exception_type == ExceptionType::Step {
                context.clear_single_step();
            }
        }
        ResumeMode::SingleStep => context.set_single_step(),
    }

    log::debug!("Resuming context at {:#010x} ({}) after {}", context.eip, mode, exception_type);
    A::switch_to(context);
    Resumed
}
