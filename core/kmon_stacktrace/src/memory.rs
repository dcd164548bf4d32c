//! Memory access capability used while walking the stack.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

/// Reads machine words for the stack walker.
///
/// This is the only way the walker touches memory. The kernel provides
/// [RawMemory], while tests provide a synthetic stack image.
pub trait StackMemory: Sync {
    /// Reads the 32-bit word stored at `address`.
    fn read_word(&self, address: u32) -> u32;
}

/// Unchecked access to the current address space.
///
/// Reads are plain loads through the active page tables. An unmapped address
/// faults in the kernel, there is no validation.
pub struct RawMemory {
    _private: (),
}

impl RawMemory {
    /// Creates the raw memory accessor.
    ///
    /// # Safety
    ///
    /// The caller is responsible for only walking frame pointer chains that
    /// point into mapped memory. Any address handed to [StackMemory::read_word]
    /// is dereferenced as is.
    pub const unsafe fn new() -> Self {
        RawMemory { _private: () }
    }
}

impl StackMemory for RawMemory {
    fn read_word(&self, address: u32) -> u32 {
        // SAFETY: Construction of RawMemory requires the caller to vouch for
        // the addresses being walked.
        unsafe { core::ptr::read_volatile(address as usize as *const u32) }
    }
}
