use core::arch::asm;

use super::MonitorArch;
use crate::context::Trapframe;

/// The uninhabitable type for implementing the i386 architecture.
pub enum X86Arch {}

impl MonitorArch for X86Arch {
    #[inline(always)]
    fn read_frame_pointer() -> u32 {
        kmon_stacktrace::read_frame_pointer()
    }

    fn switch_to(context: &Trapframe) {
        log::debug!("Returning to eip {:#010x} with eflags {:#010x}", context.eip, context.eflags);

        // Unwind the frame the same way the trap entry built it: restore the
        // general registers and data segments, drop trapno and err, then let
        // iret restore eip, cs, eflags and, when crossing rings, esp and ss.
        //
        // SAFETY: The trapframe layout matches the trap entry stubs and the
        // context was produced by a trap, so the segments and eip are valid.
        unsafe {
            asm!(
                "mov esp, {0}",
                "popad",
                "pop es",
                "pop ds",
                "add esp, 8",
                "iretd",
                in(reg) context as *const Trapframe,
                options(noreturn)
            );
        }
    }
}
