//! # Stack Trace Library
//!
//! ## Introduction
//!
//! This library implements frame pointer based stack walking for the kernel
//! monitor. Every function compiled with frame pointers pushes the caller's
//! frame pointer on entry, so the saved frame pointers form a linked list
//! through the stack:
//!
//! ```text
//!  fp + 24   argument word 5
//!  fp + 20   argument word 4
//!  fp + 16   argument word 3
//!  fp + 12   argument word 2
//!  fp +  8   argument word 1
//!  fp +  4   return address
//!  fp +  0   caller's frame pointer   <- fp
//! ```
//!
//! The walk starts from the current frame pointer and follows the chain until
//! it reaches the zero sentinel pushed by the kernel entry code. Each return
//! address is resolved through a [SymbolResolver] provided by the kernel.
//!
//! ## Public API
//!
//! The main API for public use is [StackTrace::dump_with], which writes the
//! trace in the monitor's format:
//!
//! ```text
//! Stack backtrace:
//!   ebp f0109e58  eip f0100a62  args 00000001 f0109e80 f0109f98 f0100ed2 00000031
//!          kern/monitor.c:143: monitor+106
//!   ebp f0109ed8  eip f01000e5  args 00000000 00000000 f0100058 f0109f28 00000061
//!          kern/init.c:49: i386_init+78
//! ```
//!
//! [Backtrace] exposes the raw frames as an iterator for callers that want to
//! format them differently.
//!
//! ## Limitations
//!
//! The walker trusts the frame pointer chain. Memory is read through the
//! [StackMemory] capability and [RawMemory] performs no validation, so a
//! corrupted frame pointer faults in the read and a cyclic chain never ends.
//! Tests and tools can substitute a bounds checked [StackMemory].
//!
//! The number of argument words per frame is fixed at [FRAME_ARG_WORDS]. The
//! walker does not know the real arity of the callee, so words past the real
//! arguments are whatever occupies those stack slots.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
#![cfg_attr(not(test), no_std)]

mod memory;
mod stacktrace;
mod symbols;

pub use memory::{RawMemory, StackMemory};
pub use stacktrace::{read_frame_pointer, Backtrace, FrameReport, StackFrame, StackTrace, FRAME_ARG_WORDS};
pub use symbols::{SymbolInfo, SymbolResolver};
