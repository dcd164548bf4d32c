use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use kmon_stacktrace::{StackMemory, SymbolInfo, SymbolResolver};
use log::{Level, LevelFilter, Metadata, Record};
use mockall::mock;

use crate::{
    arch::MonitorArch,
    context::Trapframe,
    monitor::Console,
    paging::{PageTableEntry, PageTableWalker},
};

// Sample logger for log crate to dump stuff in tests
struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("{}", record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: SimpleLogger = SimpleLogger;

pub(crate) fn set_logger() {
    let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(LevelFilter::Trace));
}

mock! {
    pub Arch {}

    impl MonitorArch for Arch {
        fn read_frame_pointer() -> u32;
        fn switch_to(context: &Trapframe);
    }
}

mock! {
    pub Walker {}

    impl PageTableWalker for Walker {
        fn walk(&self, address: u32, create: bool) -> Option<PageTableEntry>;
    }
}

// Static mock expectations are shared between test threads.
static ARCH_LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn arch_lock() -> MutexGuard<'static, ()> {
    ARCH_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The monitor holds its services by static reference.
pub(crate) fn leak<T>(value: T) -> &'static mut T {
    Box::leak(Box::new(value))
}

pub(crate) fn kernel_rw(frame: u32) -> PageTableEntry {
    PageTableEntry::new().with_present(true).with_writable(true).with_frame_number(frame >> 12)
}

pub(crate) const STACK_BASE: u32 = 0xf010_f000;

/// Synthetic stack starting at `base`. Reads outside of it fail the test.
pub(crate) struct StackImage {
    base: u32,
    words: Vec<u32>,
}

impl StackImage {
    pub(crate) fn new(base: u32, len: usize) -> Self {
        StackImage { base, words: vec![0; len] }
    }

    fn write(&mut self, address: u32, value: u32) {
        let index = ((address - self.base) / 4) as usize;
        self.words[index] = value;
    }

    /// Writes a full frame record at `fp`.
    pub(crate) fn push_frame(&mut self, fp: u32, prev_fp: u32, return_address: u32, args: [u32; 5]) {
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
        let index = ((address - self.base) / 4) as usize;
        *self.words.get(index).unwrap_or_else(|| panic!("read past stack image at {address:#x}"))
    }
}

#[derive(Default)]
pub(crate) struct TableResolver(Vec<(u32, u32, SymbolInfo<'static>)>);

impl TableResolver {
    /// Adds a function covering `start..end`.
    pub(crate) fn with(mut self, start: u32, end: u32, file: &'static str, line: u32, name: &'static str) -> Self {
        self.0.push((start, end, SymbolInfo { file, line, name, name_len: name.len(), address: start }));
        self
    }
}

impl SymbolResolver for TableResolver {
    fn resolve(&self, address: u32) -> Option<SymbolInfo<'_>> {
        self.0.iter().find(|(start, end, _)| (*start..*end).contains(&address)).map(|(_, _, info)| *info)
    }
}

/// Console fed from a script of lines. Everything written is kept.
pub(crate) struct TestConsole {
    lines: VecDeque<String>,
    pub(crate) output: String,
    pub(crate) prompts: usize,
    pub(crate) last_prompt: Option<String>,
}

impl TestConsole {
    pub(crate) fn new(lines: &[&str]) -> Self {
        TestConsole {
            lines: lines.iter().map(|line| line.to_string()).collect(),
            output: String::new(),
            prompts: 0,
            last_prompt: None,
        }
    }

    /// Lines not read yet.
    pub(crate) fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl core::fmt::Write for TestConsole {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.output.push_str(s);
        Ok(())
    }
}

impl Console for TestConsole {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        self.prompts += 1;
        self.last_prompt = Some(prompt.to_string());
        self.lines.pop_front()
    }
}
