//! Page table inspection for the monitor.
//!
//! The monitor never edits page tables. It asks the kernel's walker for the
//! leaf entry of each page, without creating missing tables, and reports what
//! it finds.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use core::fmt;

use bitfield_struct::bitfield;

use crate::error::{MonResult, MonitorError};

pub const PAGE_SIZE: u32 = 0x1000;
pub const PAGE_MASK: u32 = !(PAGE_SIZE - 1);

/// Present bit of a page table entry.
pub const PTE_P: u32 = 0x1;
/// Writable bit of a page table entry.
pub const PTE_W: u32 = 0x2;
/// User accessible bit of a page table entry.
pub const PTE_U: u32 = 0x4;

/// A leaf entry of a two level i386 page table.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageTableEntry {
    pub present: bool,
    pub writable: bool,
    pub user: bool,
    pub write_through: bool,
    pub cache_disable: bool,
    pub accessed: bool,
    pub dirty: bool,
    pub page_size: bool,
    pub global: bool,
    #[bits(3)]
    pub available: u8,
    #[bits(20)]
    pub frame_number: u32,
}

impl PageTableEntry {
    /// Physical address of the page the entry maps.
    pub fn page_address(&self) -> u32 {
        self.into_bits() & PAGE_MASK
    }
}

/// Walks the kernel's page tables.
pub trait PageTableWalker: Sync {
    /// Returns the leaf entry for `address`, or `None` if a table on the way
    /// is missing. When `create` is set the walker may allocate missing
    /// tables. The monitor always passes `false`.
    fn walk(&self, address: u32, create: bool) -> Option<PageTableEntry>;
}

/// The translation of one virtual page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMapping {
    /// Page aligned virtual address.
    pub virtual_address: u32,
    /// Leaf entry, or `None` if there is none.
    pub entry: Option<PageTableEntry>,
}

impl fmt::Display for PageMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entry {
            None => write!(f, "VA {:08x} is not mapped to physical address", self.virtual_address),
            Some(entry) => {
                let bits = entry.into_bits();
                write!(
                    f,
                    "VA {:08x} is mapped to PA {:08x} permissions: PTE_P {:x} PTE_W {:x} PTE_U {:x}",
                    self.virtual_address,
                    entry.page_address(),
                    bits & PTE_P,
                    bits & PTE_W,
                    bits & PTE_U
                )
            }
        }
    }
}

/// Translates the page containing `address`.
pub fn translate(walker: &dyn PageTableWalker, address: u32) -> PageMapping {
    let virtual_address = address & PAGE_MASK;
    let entry = walker.walk(virtual_address, false);
    log::trace!("Translated {:#010x} to {:?}", virtual_address, entry);
    PageMapping { virtual_address, entry }
}

/// Iterator over the pages touched by an address range, lowest first.
pub struct MappingReport<'a> {
    walker: &'a dyn PageTableWalker,
    next: Option<u32>,
    end: u32,
}

impl<'a> MappingReport<'a> {
    /// Reports every page whose start is below `end`, beginning with the page
    /// containing `start`. The end is not rounded, so a partial final page is
    /// included.
    pub fn new(walker: &'a dyn PageTableWalker, start: u32, end: u32) -> MonResult<Self> {
        if end < start {
            return Err(MonitorError::InvalidRange { start, end });
        }

        Ok(MappingReport { walker, next: Some(start & PAGE_MASK), end })
    }
}

impl Iterator for MappingReport<'_> {
    type Item = PageMapping;

    fn next(&mut self) -> Option<PageMapping> {
        let page = self.next.filter(|page| *page < self.end)?;
        // Stop at the top of the address space instead of wrapping.
        self.next = page.checked_add(PAGE_SIZE);
        Some(translate(self.walker, page))
    }
}
