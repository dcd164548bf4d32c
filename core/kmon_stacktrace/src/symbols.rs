//! Symbol resolution for return addresses.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

/// Placeholder used for the file and function of an unresolved address.
const UNKNOWN: &str = "<unknown>";

/// Source level information for an instruction address.
///
/// This is a borrowed view into the resolver's debug data. The name is not
/// necessarily terminated at `name_len`, only the first `name_len` bytes
/// belong to the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolInfo<'a> {
    /// Source file believed to contain the address.
    pub file: &'a str,
    /// Source line believed to contain the address.
    pub line: u32,
    /// Name of the enclosing function.
    pub name: &'a str,
    /// Number of meaningful bytes in `name`.
    pub name_len: usize,
    /// Start address of the enclosing function.
    pub address: u32,
}

impl SymbolInfo<'static> {
    /// Information reported for an address the resolver does not know. The
    /// function is assumed to start at the address itself.
    pub const fn unknown(address: u32) -> Self {
        SymbolInfo { file: UNKNOWN, line: 0, name: UNKNOWN, name_len: UNKNOWN.len(), address }
    }
}

impl<'a> SymbolInfo<'a> {
    /// The function name truncated to its reported length.
    pub fn function_name(&self) -> &'a str {
        let len = self.name_len.min(self.name.len());
        self.name.get(..len).unwrap_or(self.name)
    }

    /// Signed byte offset of `address` from the start of the function.
    pub fn offset_of(&self, address: u32) -> i32 {
        address.wrapping_sub(self.address) as i32
    }
}

/// Resolves instruction addresses to symbols.
pub trait SymbolResolver: Sync {
    /// Looks up the function containing `address`. Returns `None` if no
    /// debug information covers it.
    fn resolve(&self, address: u32) -> Option<SymbolInfo<'_>>;
}
