use core::fmt;

use crate::memory::StackMemory;
use crate::symbols::{SymbolInfo, SymbolResolver};

/// Number of argument words read from every frame.
pub const FRAME_ARG_WORDS: usize = 5;

/// Offset of the return address from the frame pointer.
const RETURN_ADDRESS_OFFSET: u32 = 4;

/// Offset of the first argument word from the frame pointer.
const ARGS_OFFSET: u32 = 8;

/// Size of a stack word.
const WORD_SIZE: u32 = 4;

/// A single frame in the frame pointer chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFrame {
    /// Address of the frame, the value of the frame pointer register while
    /// the function was running.
    pub frame_pointer: u32,
    /// Address the function returns to.
    pub return_address: u32,
    /// Raw words above the return address, innermost first.
    pub args: [u32; FRAME_ARG_WORDS],
}

impl StackFrame {
    /// Reads the frame located at `frame_pointer`.
    fn read(memory: &dyn StackMemory, frame_pointer: u32) -> Self {
        let mut args = [0; FRAME_ARG_WORDS];
        for (i, arg) in args.iter_mut().enumerate() {
            *arg = memory.read_word(frame_pointer.wrapping_add(ARGS_OFFSET + i as u32 * WORD_SIZE));
        }

        StackFrame {
            frame_pointer,
            return_address: memory.read_word(frame_pointer.wrapping_add(RETURN_ADDRESS_OFFSET)),
            args,
        }
    }
}

/// Iterator over the frame pointer chain, innermost frame first.
///
/// The walk ends after the frame whose saved frame pointer is zero. It can not
/// be restarted, create a new one to walk again.
pub struct Backtrace<'a> {
    memory: &'a dyn StackMemory,
    next: u32,
}

impl<'a> Backtrace<'a> {
    /// Starts a walk at `frame_pointer`. A zero frame pointer yields nothing.
    pub fn new(frame_pointer: u32, memory: &'a dyn StackMemory) -> Self {
        Backtrace { memory, next: frame_pointer }
    }
}

impl Iterator for Backtrace<'_> {
    type Item = StackFrame;

    fn next(&mut self) -> Option<StackFrame> {
        if self.next == 0 {
            return None;
        }

        let frame = StackFrame::read(self.memory, self.next);
        self.next = self.memory.read_word(frame.frame_pointer);
        log::trace!("Unwound frame {:#010x}, next frame {:#010x}", frame.frame_pointer, self.next);
        Some(frame)
    }
}

/// A frame paired with the symbol of its return address, formatted as the
/// two line monitor record.
pub struct FrameReport<'a> {
    pub frame: StackFrame,
    pub symbol: SymbolInfo<'a>,
}

impl fmt::Display for FrameReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a1, a2, a3, a4, a5] = self.frame.args;
        writeln!(
            f,
            "  ebp {:08x}  eip {:08x}  args {:08x} {:08x} {:08x} {:08x} {:08x}",
            self.frame.frame_pointer, self.frame.return_address, a1, a2, a3, a4, a5
        )?;
        writeln!(
            f,
            "         {}:{}: {}+{}",
            self.symbol.file,
            self.symbol.line,
            self.symbol.function_name(),
            self.symbol.offset_of(self.frame.return_address)
        )
    }
}

pub struct StackTrace;
impl StackTrace {
    /// Writes the stack trace starting at `frame_pointer` to `out`.
    ///
    /// Return addresses the resolver does not know are reported with an
    /// unknown file and function rather than stopping the walk.
    ///
    /// ```text
    ///   ebp f010ff68  eip f01000a1  args 00000000 00000000 00000000 f010004a f0111308
    ///          kern/init.c:24: test_backtrace+97
    ///   ebp f010ff88  eip f01000ee  args 00000005 00001aac 00000660 00000000 00000000
    ///          kern/init.c:43: i386_init+78
    /// ```
    pub fn dump_with(
        frame_pointer: u32,
        memory: &dyn StackMemory,
        resolver: &dyn SymbolResolver,
        out: &mut dyn fmt::Write,
    ) -> fmt::Result {
        for frame in Backtrace::new(frame_pointer, memory) {
            let symbol = resolver.resolve(frame.return_address).unwrap_or_else(|| {
                log::trace!("No symbol for return address {:#010x}", frame.return_address);
                SymbolInfo::unknown(frame.return_address)
            });
            write!(out, "{}", FrameReport { frame, symbol })?;
        }

        Ok(())
    }

    /// Writes the stack trace of the caller. This reads the frame pointer
    /// register and walks from there.
    ///
    /// # Safety
    ///
    /// The frame pointer chain is trusted. If any function on the stack was
    /// built without frame pointers the walk reads arbitrary memory.
    #[cfg(target_arch = "x86")]
    pub unsafe fn dump(resolver: &dyn SymbolResolver, out: &mut dyn fmt::Write) -> fmt::Result {
        // SAFETY: The caller accepts responsibility for the chain.
        let memory = unsafe { crate::memory::RawMemory::new() };
        StackTrace::dump_with(read_frame_pointer(), &memory, resolver, out)
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86")] {
        /// Reads the current frame pointer register.
        #[inline(always)]
        pub fn read_frame_pointer() -> u32 {
            let ebp: u32;
            // SAFETY: Reading a register has no side effects.
            unsafe { core::arch::asm!("mov {}, ebp", out(reg) ebp, options(nomem, nostack, preserves_flags)) };
            ebp
        }
    } else {
        /// Reads the current frame pointer register. Frame records on other
        /// targets are not laid out in 32-bit words, so this reports an empty
        /// chain.
        pub fn read_frame_pointer() -> u32 {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::set_logger;

    /// Synthetic stack starting at `base`. Reads outside of it fail the test.
    struct StackImage {
        base: u32,
        words: Vec<u32>,
    }

    impl StackImage {
        fn new(base: u32, len: usize) -> Self {
            StackImage { base, words: vec![0; len] }
        }

        fn write(&mut self, address: u32, value: u32) {
            let index = ((address - self.base) / WORD_SIZE) as usize;
            self.words[index] = value;
        }

        /// Writes a full frame record at `fp`.
        fn push_frame(&mut self, fp: u32, prev_fp: u32, return_address: u32, args: [u32; FRAME_ARG_WORDS]) {
            self.write(fp, prev_fp);
            self.write(fp + 4, return_address);
            for (i, arg) in args.iter().enumerate() {
                self.write(fp + 8 + i as u32 * 4, *arg);
            }
        }
    }

    impl StackMemory for StackImage {
        fn read_word(&self, address: u32) -> u32 {
            assert!(address >= self.base, "read below stack image at {address:#x}");
            let index = ((address - self.base) / WORD_SIZE) as usize;
            *self.words.get(index).unwrap_or_else(|| panic!("read past stack image at {address:#x}"))
        }
    }

    struct TableResolver(Vec<(u32, u32, SymbolInfo<'static>)>);

    impl SymbolResolver for TableResolver {
        fn resolve(&self, address: u32) -> Option<SymbolInfo<'_>> {
            self.0.iter().find(|(start, end, _)| (*start..*end).contains(&address)).map(|(_, _, info)| *info)
        }
    }

    const STACK_BASE: u32 = 0xf010_f000;

    fn two_frame_stack() -> StackImage {
        let mut stack = StackImage::new(STACK_BASE, 0x100);
        stack.push_frame(STACK_BASE + 0x20, STACK_BASE + 0x80, 0xf010_00a1, [1, 2, 3, 4, 5]);
        stack.push_frame(STACK_BASE + 0x80, 0, 0xf010_00ee, [0x10, 0x20, 0x30, 0x40, 0x50]);
        stack
    }

    #[test]
    fn test_backtrace_visits_frames_in_order() {
        set_logger();
        let stack = two_frame_stack();

        let frames: Vec<StackFrame> = Backtrace::new(STACK_BASE + 0x20, &stack).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].frame_pointer, STACK_BASE + 0x20);
        assert_eq!(frames[0].return_address, 0xf010_00a1);
        assert_eq!(frames[0].args, [1, 2, 3, 4, 5]);
        assert_eq!(frames[1].frame_pointer, STACK_BASE + 0x80);
        assert_eq!(frames[1].return_address, 0xf010_00ee);
        assert_eq!(frames[1].args, [0x10, 0x20, 0x30, 0x40, 0x50]);
    }

    #[test]
    fn test_backtrace_follows_saved_frame_pointer() {
        let mut stack = StackImage::new(STACK_BASE, 0x100);
        // Frames are not contiguous, the walk must use the saved pointer.
        stack.push_frame(STACK_BASE + 0x100, STACK_BASE + 0x40, 0x1111, [0; 5]);
        stack.push_frame(STACK_BASE + 0x40, STACK_BASE + 0x300, 0x2222, [0; 5]);
        stack.push_frame(STACK_BASE + 0x300, 0, 0x3333, [0; 5]);

        let mut backtrace = Backtrace::new(STACK_BASE + 0x100, &stack);
        assert_eq!(backtrace.next().map(|f| f.return_address), Some(0x1111));
        assert_eq!(backtrace.next().map(|f| f.frame_pointer), Some(STACK_BASE + 0x40));
        assert_eq!(backtrace.next().map(|f| f.frame_pointer), Some(STACK_BASE + 0x300));
        assert_eq!(backtrace.next(), None);
        assert_eq!(backtrace.next(), None);
    }

    #[test]
    fn test_backtrace_zero_frame_pointer_is_empty() {
        let stack = StackImage::new(STACK_BASE, 4);
        assert_eq!(Backtrace::new(0, &stack).count(), 0);
    }

    #[test]
    fn test_dump_with_resolved_and_unknown_symbols() {
        let stack = two_frame_stack();
        let resolver = TableResolver(vec![(
            0xf010_0040,
            0xf010_00c0,
            SymbolInfo { file: "kern/init.c", line: 24, name: "test_backtrace:F(0,25)", name_len: 14, address: 0xf010_0040 },
        )]);

        let mut out = String::new();
        StackTrace::dump_with(STACK_BASE + 0x20, &stack, &resolver, &mut out).unwrap();

        let expected = "  ebp f010f020  eip f01000a1  args 00000001 00000002 00000003 00000004 00000005\n\
                        \x20        kern/init.c:24: test_backtrace+97\n\
                        \x20 ebp f010f080  eip f01000ee  args 00000010 00000020 00000030 00000040 00000050\n\
                        \x20        <unknown>:0: <unknown>+0\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_dump_with_empty_chain_writes_nothing() {
        let stack = StackImage::new(STACK_BASE, 4);
        let resolver = TableResolver(Vec::new());
        let mut out = String::new();
        StackTrace::dump_with(0, &stack, &resolver, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
