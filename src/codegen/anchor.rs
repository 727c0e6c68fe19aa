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

//! Anchors: named position markers.
//!
//! An anchor is a named position within emitted code whose final absolute
//! address may not be known until late in compilation. References to an
//! anchor are patched once every module has received its base address.
//!
//! Anchor identity is significant: the same anchor is typically held by a
//! symbol table, by the buffer that places it, and by any number of
//! references targeting it. Anchors are therefore handed around as
//! [`AnchorRef`] (an `Rc`), with `Cell` interiors for the fields that
//! mutate during layout.

use std::cell::Cell;
use std::rc::Rc;

/// Shared handle to an anchor.
pub type AnchorRef = Rc<Anchor>;

/// A named position marker that eventually carries an absolute address.
#[derive(Debug)]
pub struct Anchor {
    name: String,
    /// Position within the owning buffer.
    position: Cell<i64>,
    /// Absolute final address.
    target: Cell<u32>,
    /// True if the anchor is registered by name in a symbol table.
    /// External anchors always survive buffer slicing.
    external: Cell<bool>,
}

impl Anchor {
    /// Create a new anchor with the given name at position 0.
    pub fn new(name: impl Into<String>) -> AnchorRef {
        Rc::new(Self {
            name: name.into(),
            position: Cell::new(0),
            target: Cell::new(0),
            external: Cell::new(false),
        })
    }

    /// Create a new anchor at a specific position.
    pub fn at(name: impl Into<String>, position: i64) -> AnchorRef {
        let anchor = Self::new(name);
        anchor.position.set(position);
        anchor
    }

    /// Copy this anchor's fields into a fresh anchor with its own identity.
    pub fn duplicate(&self) -> AnchorRef {
        Rc::new(Self {
            name: self.name.clone(),
            position: Cell::new(self.position.get()),
            target: Cell::new(self.target.get()),
            external: Cell::new(self.external.get()),
        })
    }

    /// The anchor's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The anchor's position within its buffer.
    pub fn position(&self) -> i64 {
        self.position.get()
    }

    /// Move the anchor to a new position.
    pub fn set_position(&self, position: i64) {
        self.position.set(position);
    }

    /// The anchor's absolute target address.
    pub fn target(&self) -> u32 {
        self.target.get()
    }

    /// Assign the anchor's absolute target address.
    pub fn set_target(&self, address: u32) {
        self.target.set(address);
    }

    /// Whether the anchor is externally visible (named in a symbol table).
    pub fn is_external(&self) -> bool {
        self.external.get()
    }

    /// Mark the anchor as externally visible.
    pub fn set_external(&self, external: bool) {
        self.external.set(external);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_defaults() {
        let a = Anchor::new("start");
        assert_eq!(a.name(), "start");
        assert_eq!(a.position(), 0);
        assert_eq!(a.target(), 0);
        assert!(!a.is_external());
    }

    #[test]
    fn test_duplicate_has_own_identity() {
        let a = Anchor::at("x", 5);
        a.set_external(true);
        let b = a.duplicate();
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(b.position(), 5);
        assert!(b.is_external());
        b.set_position(9);
        assert_eq!(a.position(), 5);
    }
}
