//! Monitor command handling
//!
//! This module contains the command interpreter: the line loop, tokenizing,
//! the fixed command table and the command implementations.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use alloc::{string::String, vec::Vec};
use core::{fmt, fmt::Write, marker::PhantomData};

use kmon_stacktrace::{StackMemory, StackTrace, SymbolResolver};

use crate::{
    arch::MonitorArch,
    context::Trapframe,
    control::{self, ResumeMode},
    error::{MonResult, MonitorError},
    layout::KernelLayout,
    paging::{MappingReport, PageTableWalker},
};

/// Characters that separate arguments.
const WHITESPACE: [char; 4] = ['\t', '\r', '\n', ' '];

/// Default limit on the number of words in a command line, including the
/// command name. One slot is reserved for the argv terminator, so at most
/// `MAX_ARGS - 1` words are accepted.
pub const MAX_ARGS: usize = 16;

const DEFAULT_PROMPT: &str = "K> ";

const SHOWMAPPINGS_USAGE: &str = "showmappings <start_addr> <end_addr>";

/// Operator facing console.
pub trait Console: fmt::Write {
    /// Prints `prompt` and reads one line of input. Returns `None` once the
    /// console has no more input to offer.
    fn read_line(&mut self, prompt: &str) -> Option<String>;
}

/// What the monitor loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Prompt for the next command.
    Prompt,
    /// The trapped context was resumed. Control has left the monitor.
    Resumed,
}

/// Type for command handlers. Receives the monitor, the command words with
/// the command name first, the console output and the trapped context.
type CommandFn<A> = fn(&KernelMonitor<A>, &[&str], &mut dyn Write, Option<&mut Trapframe>) -> MonResult<Flow>;

/// An entry in the command table.
pub struct Command<A: MonitorArch + 'static> {
    /// The word that invokes the command.
    pub name: &'static str,
    /// One line description shown by `help`.
    pub description: &'static str,
    handler: CommandFn<A>,
}

/// Kernel Monitor
///
/// Holds the kernel services the commands inspect and the monitor's
/// configuration. The trapped context is never stored, it is borrowed for
/// one invocation of [KernelMonitor::run].
///
pub struct KernelMonitor<A: MonitorArch + 'static> {
    /// Walks the kernel page tables.
    walker: &'static dyn PageTableWalker,
    /// Resolves return addresses during backtraces.
    symbols: &'static dyn SymbolResolver,
    /// Reads the stack during backtraces.
    memory: &'static dyn StackMemory,
    /// Link-time layout reported by `kerninfo`.
    layout: KernelLayout,
    /// Prompt printed before each command.
    prompt: &'static str,
    /// Limit on the number of words per command line.
    max_args: usize,
    /// Whether to greet the operator on entry.
    banner: bool,
    _arch: PhantomData<fn() -> A>,
}

impl<A: MonitorArch + 'static> KernelMonitor<A> {
    /// The fixed command table.
    pub const COMMANDS: &'static [Command<A>] = &[
        Command { name: "help", description: "Display this list of commands", handler: Self::mon_help },
        Command { name: "kerninfo", description: "Display information about the kernel", handler: Self::mon_kerninfo },
        Command {
            name: "backtrace",
            description: "Display information about kernel stack",
            handler: Self::mon_backtrace,
        },
        Command {
            name: "showmappings",
            description: "Display information of all physical page mappings",
            handler: Self::mon_showmappings,
        },
        Command {
            name: "continue",
            description: "Continues execution of the environment",
            handler: Self::mon_continue,
        },
        Command { name: "c", description: "Continues execution of the environment", handler: Self::mon_continue },
        Command {
            name: "si",
            description: "Performs a single instruction of the current environment",
            handler: Self::mon_si,
        },
    ];

    /// Create a new kernel monitor
    ///
    /// Creates a monitor over the provided kernel services with the default
    /// configuration.
    ///
    pub const fn new(
        walker: &'static dyn PageTableWalker,
        symbols: &'static dyn SymbolResolver,
        memory: &'static dyn StackMemory,
    ) -> Self {
        KernelMonitor {
            walker,
            symbols,
            memory,
            layout: KernelLayout::empty(),
            prompt: DEFAULT_PROMPT,
            max_args: MAX_ARGS,
            banner: true,
            _arch: PhantomData,
        }
    }

    /// Sets the kernel layout reported by `kerninfo`.
    pub const fn with_layout(mut self, layout: KernelLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the prompt printed before each command.
    pub const fn with_prompt(mut self, prompt: &'static str) -> Self {
        self.prompt = prompt;
        self
    }

    /// Enables or disables the greeting printed on entry.
    pub const fn with_banner(mut self, banner: bool) -> Self {
        self.banner = banner;
        self
    }

    /// Sets the limit on words per command line. Values below two leave no
    /// room for any command and are raised to two.
    pub const fn with_max_args(mut self, max_args: usize) -> Self {
        self.max_args = if max_args < 2 { 2 } else { max_args };
        self
    }

    /// Runs the monitor loop until a command resumes the trapped context or
    /// the console runs out of input.
    pub fn run(&self, console: &mut dyn Console, mut context: Option<&mut Trapframe>) {
        match context.as_deref() {
            Some(tf) => log::info!("Entering kernel monitor on {}", tf.exception_type()),
            None => log::info!("Entering kernel monitor"),
        }

        if self.banner {
            let _ = writeln!(console, "Welcome to the JOS kernel monitor!");
            let _ = writeln!(console, "Type 'help' for a list of commands.");
        }

        if let Some(tf) = context.as_deref() {
            let _ = write!(console, "{}", tf);
        }

        while let Some(line) = console.read_line(self.prompt) {
            let mut out = ConsoleWriter(&mut *console);
            if let Ok(Flow::Resumed) = self.run_command(&line, &mut out, context.as_deref_mut()) {
                break;
            }
        }
    }

    /// Parses and runs one command line.
    ///
    /// Failures are printed to `out` before being returned. Empty lines,
    /// unknown commands and over long lines are reported as [Flow::Prompt].
    pub fn run_command(&self, line: &str, out: &mut dyn Write, context: Option<&mut Trapframe>) -> MonResult<Flow> {
        let args = match self.parse_args(line) {
            Ok(args) => args,
            Err(error) => {
                let _ = writeln!(out, "{}", error);
                return Ok(Flow::Prompt);
            }
        };

        let Some(name) = args.first() else {
            return Ok(Flow::Prompt);
        };

        match Self::COMMANDS.iter().find(|command| command.name == *name) {
            Some(command) => {
                log::info!("Monitor command: {}", line.trim());
                let result = (command.handler)(self, &args, out, context);
                if let Err(error) = &result {
                    log::info!("Monitor command '{}' failed with status {}: {}", name, error.status(), error);
                    let _ = writeln!(out, "{}", error);
                }
                result
            }
            None => {
                let _ = writeln!(out, "Unknown command '{}'", name);
                Ok(Flow::Prompt)
            }
        }
    }

    /// Splits a command line into words.
    fn parse_args<'l>(&self, line: &'l str) -> MonResult<Vec<&'l str>> {
        let mut args = Vec::new();
        for word in line.split(WHITESPACE).filter(|word| !word.is_empty()) {
            if args.len() == self.max_args - 1 {
                return Err(MonitorError::TooManyArguments(self.max_args));
            }
            args.push(word);
        }
        Ok(args)
    }

    fn mon_help(&self, _args: &[&str], out: &mut dyn Write, _context: Option<&mut Trapframe>) -> MonResult<Flow> {
        for command in Self::COMMANDS {
            let _ = writeln!(out, "{} - {}", command.name, command.description);
        }
        Ok(Flow::Prompt)
    }

    fn mon_kerninfo(&self, _args: &[&str], out: &mut dyn Write, _context: Option<&mut Trapframe>) -> MonResult<Flow> {
        let _ = write!(out, "{}", self.layout);
        Ok(Flow::Prompt)
    }

    fn mon_backtrace(&self, _args: &[&str], out: &mut dyn Write, _context: Option<&mut Trapframe>) -> MonResult<Flow> {
        let _ = writeln!(out, "Stack backtrace:");
        let _ = StackTrace::dump_with(A::read_frame_pointer(), self.memory, self.symbols, out);
        Ok(Flow::Prompt)
    }

    fn mon_showmappings(
        &self,
        args: &[&str],
        out: &mut dyn Write,
        _context: Option<&mut Trapframe>,
    ) -> MonResult<Flow> {
        let [_, start, end] = args else {
            return Err(MonitorError::Usage(SHOWMAPPINGS_USAGE));
        };

        let start = parse_hex(start).ok_or(MonitorError::InvalidAddress(SHOWMAPPINGS_USAGE))?;
        let end = parse_hex(end).ok_or(MonitorError::InvalidAddress(SHOWMAPPINGS_USAGE))?;

        for mapping in MappingReport::new(self.walker, start, end)? {
            let _ = writeln!(out, "{}", mapping);
        }
        Ok(Flow::Prompt)
    }

    fn mon_continue(&self, args: &[&str], _out: &mut dyn Write, context: Option<&mut Trapframe>) -> MonResult<Flow> {
        Self::resume_command(args, context, ResumeMode::RunToCompletion, "continue")
    }

    fn mon_si(&self, args: &[&str], _out: &mut dyn Write, context: Option<&mut Trapframe>) -> MonResult<Flow> {
        Self::resume_command(args, context, ResumeMode::SingleStep, "si")
    }

    fn resume_command(
        args: &[&str],
        context: Option<&mut Trapframe>,
        mode: ResumeMode,
        usage: &'static str,
    ) -> MonResult<Flow> {
        if args.len() != 1 {
            return Err(MonitorError::Usage(usage));
        }

        let context = context.ok_or(MonitorError::NoContext(usage))?;
        control::resume::<A>(context, mode);
        Ok(Flow::Resumed)
    }
}

/// Parses a hexadecimal address with an optional `0x` prefix.
fn parse_hex(text: &str) -> Option<u32> {
    let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).unwrap_or(text);
    if !digits.bytes().all(|digit| digit.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Forwards formatted output to a [Console].
struct ConsoleWriter<'a, C: ?Sized>(&'a mut C);

impl<C: Console + ?Sized> Write for ConsoleWriter<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s)
    }
}
