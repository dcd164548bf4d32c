//! Trapped execution context
//!
//! This module contains the saved register state pushed by the kernel's trap
//! entry path and the helpers the monitor uses to inspect and adjust it.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use core::fmt;

use bitflags::bitflags;

/// Debug exception, raised after a single step.
pub const T_DEBUG: u32 = 1;
/// Breakpoint instruction.
pub const T_BRKPT: u32 = 3;
/// Page fault.
pub const T_PGFLT: u32 = 14;
/// System call vector.
pub const T_SYSCALL: u32 = 48;
/// First vector used for hardware interrupts.
pub const IRQ_OFFSET: u32 = 32;

const EXCEPTION_NAMES: [&str; 20] = [
    "Divide error",
    "Debug",
    "Non-Maskable Interrupt",
    "Breakpoint",
    "Overflow",
    "BOUND Range Exceeded",
    "Invalid Opcode",
    "Device Not Available",
    "Double Fault",
    "Coprocessor Segment Overrun",
    "Invalid TSS",
    "Segment Not Present",
    "Stack Fault",
    "General Protection",
    "Page Fault",
    "(unknown trap)",
    "x87 FPU Floating-Point Error",
    "Alignment Check",
    "Machine-Check",
    "SIMD Floating-Point Exception",
];

bitflags! {
    /// The EFLAGS bits the monitor cares about.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EFlags: u32 {
        const CARRY = 1 << 0;
        const ZERO = 1 << 6;
        const SIGN = 1 << 7;
        /// Raise a debug exception after the next instruction.
        const TRAP = 1 << 8;
        const INTERRUPT = 1 << 9;
        const DIRECTION = 1 << 10;
        const OVERFLOW = 1 << 11;
    }
}

/// General purpose registers as pushed by `pushal`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PushRegs {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    /// Useless, the value of esp before `pushal`.
    pub oesp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
}

/// Saved state of a context that trapped into the kernel.
///
/// The layout matches the frame built by the trap entry stubs, so a pointer
/// to it can be handed straight back to the trap return path.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Trapframe {
    pub regs: PushRegs,
    pub es: u16,
    padding1: u16,
    pub ds: u16,
    padding2: u16,
    pub trapno: u32,
    /// Error code pushed by the hardware, or zero.
    pub err: u32,
    pub eip: u32,
    pub cs: u16,
    padding3: u16,
    pub eflags: u32,
    /// Only valid when crossing rings.
    pub esp: u32,
    pub ss: u16,
    padding4: u16,
}

/// Why the context trapped, as far as the monitor is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionType {
    /// A break due to a completed instruction step.
    Step,
    /// A break due to a breakpoint instruction.
    Breakpoint,
    /// Any other trap. The trap number is provided.
    Other(u32),
}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionType::Step => write!(f, "Debug Step"),
            ExceptionType::Breakpoint => write!(f, "Breakpoint"),
            ExceptionType::Other(trapno) => write!(f, "Unexpected trap {:#x} ({})", trapno, trap_name(*trapno)),
        }
    }
}

/// Human readable name of a trap number.
pub fn trap_name(trapno: u32) -> &'static str {
    if let Some(name) = EXCEPTION_NAMES.get(trapno as usize) {
        return name;
    }

    if trapno == T_SYSCALL {
        "System call"
    } else if (IRQ_OFFSET..IRQ_OFFSET + 16).contains(&trapno) {
        "Hardware Interrupt"
    } else {
        "(unknown trap)"
    }
}

impl Trapframe {
    /// Creates an empty frame for the given trap number.
    pub fn with_trap(trapno: u32) -> Self {
        Trapframe { trapno, ..Default::default() }
    }

    /// Classifies the trap that caused entry.
    pub fn exception_type(&self) -> ExceptionType {
        match self.trapno {
            T_DEBUG => ExceptionType::Step,
            T_BRKPT => ExceptionType::Breakpoint,
            other => ExceptionType::Other(other),
        }
    }

    /// The saved flags register.
    pub fn flags(&self) -> EFlags {
        EFlags::from_bits_retain(self.eflags)
    }

    /// Requests a debug exception after the next instruction on resume.
    pub fn set_single_step(&mut self) {
        self.eflags |= EFlags::TRAP.bits();
    }

    /// Lets the context run freely on resume.
    pub fn clear_single_step(&mut self) {
        self.eflags &= !EFlags::TRAP.bits();
    }

    /// Whether the context was running in user mode.
    pub fn from_user(&self) -> bool {
        self.cs & 3 != 0
    }
}

impl fmt::Display for Trapframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TRAP frame at {:p}", self)?;
        writeln!(f, "  edi  0x{:08x}", self.regs.edi)?;
        writeln!(f, "  esi  0x{:08x}", self.regs.esi)?;
        writeln!(f, "  ebp  0x{:08x}", self.regs.ebp)?;
        writeln!(f, "  oesp 0x{:08x}", self.regs.oesp)?;
        writeln!(f, "  ebx  0x{:08x}", self.regs.ebx)?;
        writeln!(f, "  edx  0x{:08x}", self.regs.edx)?;
        writeln!(f, "  ecx  0x{:08x}", self.regs.ecx)?;
        writeln!(f, "  eax  0x{:08x}", self.regs.eax)?;
        writeln!(f, "  es   0x----{:04x}", self.es)?;
        writeln!(f, "  ds   0x----{:04x}", self.ds)?;
        writeln!(f, "  trap 0x{:08x} {}", self.trapno, trap_name(self.trapno))?;
        write!(f, "  err  0x{:08x}", self.err)?;
        // Decode the page fault error code: user/kernel, write/read and
        // protection violation/not present.
        if self.trapno == T_PGFLT {
            writeln!(
                f,
                " [{}, {}, {}]",
                if self.err & 4 != 0 { "user" } else { "kernel" },
                if self.err & 2 != 0 { "write" } else { "read" },
                if self.err & 1 != 0 { "protection" } else { "not-present" }
            )?;
        } else {
            writeln!(f)?;
        }
        writeln!(f, "  eip  0x{:08x}", self.eip)?;
        writeln!(f, "  cs   0x----{:04x}", self.cs)?;
        writeln!(f, "  flag 0x{:08x}", self.eflags)?;
        if self.from_user() {
            writeln!(f, "  esp  0x{:08x}", self.esp)?;
            writeln!(f, "  ss   0x----{:04x}", self.ss)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_trap_entry() {
        assert_eq!(core::mem::size_of::<PushRegs>(), 32);
        assert_eq!(core::mem::size_of::<Trapframe>(), 68);
    }

    #[test]
    fn test_exception_type() {
        assert_eq!(Trapframe::with_trap(T_DEBUG).exception_type(), ExceptionType::Step);
        assert_eq!(Trapframe::with_trap(T_BRKPT).exception_type(), ExceptionType::Breakpoint);
        assert_eq!(Trapframe::with_trap(T_PGFLT).exception_type(), ExceptionType::Other(T_PGFLT));
    }

    #[test]
    fn test_single_step_flag() {
        let mut tf = Trapframe::with_trap(T_BRKPT);
        tf.eflags = (EFlags::INTERRUPT | EFlags::ZERO).bits();

        tf.set_single_step();
        assert!(tf.flags().contains(EFlags::TRAP));
        assert!(tf.flags().contains(EFlags::INTERRUPT | EFlags::ZERO));

        tf.clear_single_step();
        assert_eq!(tf.flags(), EFlags::INTERRUPT | EFlags::ZERO);
    }

    #[test]
    fn test_trap_names() {
        assert_eq!(trap_name(T_BRKPT), "Breakpoint");
        assert_eq!(trap_name(T_SYSCALL), "System call");
        assert_eq!(trap_name(IRQ_OFFSET + 1), "Hardware Interrupt");
        assert_eq!(trap_name(200), "(unknown trap)");
    }

    #[test]
    fn test_display_kernel_frame() {
        let mut tf = Trapframe::with_trap(T_BRKPT);
        tf.eip = 0xf0100040;
        tf.cs = 0x8;
        tf.eflags = 0x46;
        let text = tf.to_string();

        assert!(text.starts_with("TRAP frame at 0x"));
        assert!(text.contains("  trap 0x00000003 Breakpoint\n"));
        assert!(text.contains("  err  0x00000000\n"));
        assert!(text.contains("  eip  0xf0100040\n"));
        assert!(text.contains("  cs   0x----0008\n"));
        assert!(text.contains("  flag 0x00000046\n"));
        assert!(!text.contains("  esp"));
    }

    #[test]
    fn test_display_user_page_fault() {
        let mut tf = Trapframe::with_trap(T_PGFLT);
        tf.err = 6;
        tf.cs = 0x1b;
        tf.esp = 0xeebfdfd0;
        tf.ss = 0x23;
        let text = tf.to_string();

        assert!(text.contains("  err  0x00000006 [user, write, not-present]\n"));
        assert!(text.contains("  esp  0xeebfdfd0\n"));
        assert!(text.contains("  ss   0x----0023\n"));
    }
}
