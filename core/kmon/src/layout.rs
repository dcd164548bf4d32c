//! Kernel image layout reported by `kerninfo`.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use core::fmt;

/// Virtual address the kernel's physical memory is mapped at.
pub const KERNBASE: u32 = 0xF000_0000;

/// Addresses of the kernel's link-time section symbols.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KernelLayout {
    /// Physical load address of the boot entry (`_start`).
    pub start: u32,
    /// Virtual address of the kernel entry point.
    pub entry: u32,
    /// End of the text section.
    pub etext: u32,
    /// End of the initialized data section.
    pub edata: u32,
    /// End of the kernel image, including bss.
    pub end: u32,
    /// Base of the kernel's virtual mapping of physical memory.
    pub kernbase: u32,
}

impl KernelLayout {
    /// An all zero layout, for kernels that do not provide one.
    pub const fn empty() -> Self {
        KernelLayout { start: 0, entry: 0, etext: 0, edata: 0, end: 0, kernbase: KERNBASE }
    }

    /// Reads the layout from the symbols defined by the kernel linker script.
    #[cfg(target_arch = "x86")]
    pub fn from_linker() -> Self {
        #[allow(non_upper_case_globals)]
        extern "C" {
            static _start: u8;
            static entry: u8;
            static etext: u8;
            static edata: u8;
            static end: u8;
        }

        // SAFETY: Only the addresses of the linker symbols are taken, they are
        // never read.
        unsafe {
            KernelLayout {
                start: core::ptr::addr_of!(_start) as u32,
                entry: core::ptr::addr_of!(entry) as u32,
                etext: core::ptr::addr_of!(etext) as u32,
                edata: core::ptr::addr_of!(edata) as u32,
                end: core::ptr::addr_of!(end) as u32,
                kernbase: KERNBASE,
            }
        }
    }

    /// Physical address of a kernel virtual address.
    fn physical(&self, address: u32) -> u32 {
        address.wrapping_sub(self.kernbase)
    }

    /// Size of the loaded image in KB, rounded up.
    pub fn footprint_kb(&self) -> u32 {
        self.end.wrapping_sub(self.entry).div_ceil(1024)
    }
}

impl fmt::Display for KernelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Special kernel symbols:")?;
        writeln!(f, "  _start                  {:08x} (phys)", self.start)?;
        for (name, address) in [("entry", self.entry), ("etext", self.etext), ("edata", self.edata), ("end", self.end)] {
            writeln!(f, "  {:<6} {:08x} (virt)  {:08x} (phys)", name, address, self.physical(address))?;
        }
        writeln!(f, "Kernel executable memory footprint: {}KB", self.footprint_kb())
    }
}
