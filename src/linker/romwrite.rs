// CCScript - A compiler for the CCScript event-scripting language
// Copyright (C) 2026  The CCScript Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Deferred ROM writes.
//!
//! A `ROM[...]`/`ROMTBL[...]` statement evaluates its sub-expressions at
//! module evaluation time and caches their code forms here; the linker
//! resolves and applies the write after primary layout. One record is
//! registered per evaluation of the statement, so a write inside a
//! command takes effect once per invocation.

use std::cell::RefCell;
use std::rc::Rc;

use crate::analyzer::symbol_table::ScopeRef;
use crate::codegen::buffer::CodeBuffer;

/// A registered deferred write.
#[derive(Debug)]
pub struct RomAccess {
    /// The write's private label table. Anchors scoped here are measured
    /// from the write's final address rather than any module base.
    pub labels: ScopeRef,
    /// Cached code form of the base-address expression.
    pub base: Rc<RefCell<CodeBuffer>>,
    /// Cached code form of the entry-size expression (ROMTBL only).
    pub size: Option<Rc<RefCell<CodeBuffer>>>,
    /// Cached code form of the entry-index expression (ROMTBL only).
    pub index: Option<Rc<RefCell<CodeBuffer>>>,
    /// Cached code form of the value to write.
    pub value: Rc<RefCell<CodeBuffer>>,
}

impl RomAccess {
    /// The write's virtual address: `base + size * index`, each read as a
    /// little-endian 32-bit value from its cached buffer. Missing size or
    /// index read as zero.
    pub fn virtual_address(&self) -> u32 {
        let base = self.base.borrow().read_long(0);
        let size = self
            .size
            .as_ref()
            .map(|b| b.borrow().read_long(0))
            .unwrap_or(0);
        let index = self
            .index
            .as_ref()
            .map(|b| b.borrow().read_long(0))
            .unwrap_or(0);
        base.wrapping_add(size.wrapping_mul(index))
    }

    /// Resolve every pending reference in the cached buffers.
    ///
    /// Address components resolve first; the computed virtual address
    /// then becomes the base for the write's internal anchors (both in
    /// the private label table and placed in the value buffer), after
    /// which the value's own references resolve.
    pub fn resolve_references(&self) {
        self.base.borrow_mut().resolve_references();
        if let Some(size) = &self.size {
            size.borrow_mut().resolve_references();
        }
        if let Some(index) = &self.index {
            index.borrow_mut().resolve_references();
        }

        let address = self.virtual_address();
        self.labels.borrow_mut().add_base_address(address);
        self.value.borrow_mut().set_base_address(address);
        self.value.borrow_mut().resolve_references();
    }
}
