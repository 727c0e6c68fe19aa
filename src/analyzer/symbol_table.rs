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

//! Symbol tables.
//!
//! A symbol table holds two parallel name-keyed maps: one for values and
//! one for anchors (labels). Tables chain to an optional parent for
//! lookup, forming the scope chain; `get`/`get_anchor` stay local.
//!
//! Ordered maps keep iteration deterministic, which matters for merge
//! collision reporting and the compilation summary.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::codegen::anchor::AnchorRef;
use crate::codegen::value::Value;

/// Shared handle to a symbol table.
pub type ScopeRef = Rc<RefCell<SymbolTable>>;

/// A two-map symbol table with parent chaining.
#[derive(Debug, Default)]
pub struct SymbolTable {
    parent: Option<ScopeRef>,
    values: BTreeMap<String, Value>,
    anchors: BTreeMap<String, AnchorRef>,
}

impl SymbolTable {
    /// Create a new root table.
    pub fn new() -> ScopeRef {
        Rc::new(RefCell::new(Self::default()))
    }

    /// Create a new table chained to a parent.
    pub fn with_parent(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            parent: Some(Rc::clone(parent)),
            ..Self::default()
        }))
    }

    /// Set or replace the parent table.
    pub fn set_parent(&mut self, parent: Option<ScopeRef>) {
        self.parent = parent;
    }

    /// Map a name to a value. Returns true if the name was already
    /// mapped locally.
    pub fn define(&mut self, name: &str, value: Value) -> bool {
        self.values.insert(name.to_string(), value).is_some()
    }

    /// Map a name to an anchor. Returns true if the name was already
    /// mapped locally.
    pub fn define_anchor(&mut self, name: &str, anchor: &AnchorRef) -> bool {
        self.anchors
            .insert(name.to_string(), Rc::clone(anchor))
            .is_some()
    }

    /// Look up a name in this table and all parents.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.borrow().lookup(name))
    }

    /// Look up an anchor in this table and all parents.
    pub fn lookup_anchor(&self, name: &str) -> Option<AnchorRef> {
        if let Some(anchor) = self.anchors.get(name) {
            return Some(Rc::clone(anchor));
        }
        self.parent
            .as_ref()
            .and_then(|p| p.borrow().lookup_anchor(name))
    }

    /// Look up a name locally, without parent chaining.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    /// Look up an anchor locally, without parent chaining.
    pub fn get_anchor(&self, name: &str) -> Option<AnchorRef> {
        self.anchors.get(name).map(Rc::clone)
    }

    /// Merge another table's entries into this one.
    ///
    /// Only names absent from both local maps are copied; the rest are
    /// appended to `collisions` for the caller to handle.
    pub fn merge(&mut self, other: &SymbolTable, collisions: &mut Vec<String>) {
        for (name, value) in &other.values {
            if self.get(name).is_none() && self.get_anchor(name).is_none() {
                self.define(name, value.clone());
            } else {
                collisions.push(name.clone());
            }
        }
        for (name, anchor) in &other.anchors {
            if self.get(name).is_none() && self.get_anchor(name).is_none() {
                self.define_anchor(name, anchor);
            } else {
                collisions.push(name.clone());
            }
        }
    }

    /// Shift the target of every local anchor by `base`.
    pub fn add_base_address(&mut self, base: u32) {
        for anchor in self.anchors.values() {
            anchor.set_target(anchor.target().wrapping_add(base));
        }
    }

    /// The local anchor entries, in name order.
    pub fn anchor_entries(&self) -> Vec<(String, AnchorRef)> {
        self.anchors
            .iter()
            .map(|(name, anchor)| (name.clone(), Rc::clone(anchor)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::anchor::Anchor;

    #[test]
    fn test_define_reports_repeat() {
        let table = SymbolTable::new();
        assert!(!table.borrow_mut().define("x", Value::Number(1)));
        assert!(table.borrow_mut().define("x", Value::Number(2)));
    }

    #[test]
    fn test_lookup_chains_get_does_not() {
        let parent = SymbolTable::new();
        parent.borrow_mut().define("x", Value::Number(7));
        let child = SymbolTable::with_parent(&parent);

        assert!(matches!(
            child.borrow().lookup("x"),
            Some(Value::Number(7))
        ));
        assert!(child.borrow().get("x").is_none());
    }

    #[test]
    fn test_merge_never_overwrites() {
        let dst = SymbolTable::new();
        dst.borrow_mut().define("a", Value::Number(1));
        dst.borrow_mut()
            .define_anchor("lbl", &Anchor::new("lbl"));

        let src = SymbolTable::new();
        src.borrow_mut().define("a", Value::Number(2));
        src.borrow_mut().define("b", Value::Number(3));
        src.borrow_mut()
            .define_anchor("lbl", &Anchor::new("lbl"));

        let mut collisions = Vec::new();
        dst.borrow_mut().merge(&src.borrow(), &mut collisions);

        assert!(matches!(dst.borrow().get("a"), Some(Value::Number(1))));
        assert!(matches!(dst.borrow().get("b"), Some(Value::Number(3))));
        assert_eq!(collisions, vec!["a".to_string(), "lbl".to_string()]);
    }

    #[test]
    fn test_merge_shares_anchor_identity() {
        let anchor = Anchor::new("door");
        let src = SymbolTable::new();
        src.borrow_mut().define_anchor("door", &anchor);

        let dst = SymbolTable::new();
        let mut collisions = Vec::new();
        dst.borrow_mut().merge(&src.borrow(), &mut collisions);

        anchor.set_target(0xC01234);
        assert_eq!(
            dst.borrow().get_anchor("door").map(|a| a.target()),
            Some(0xC01234)
        );
        assert!(collisions.is_empty());
    }

    #[test]
    fn test_add_base_address_shifts_targets() {
        let table = SymbolTable::new();
        let anchor = Anchor::new("a");
        anchor.set_target(0x10);
        table.borrow_mut().define_anchor("a", &anchor);
        table.borrow_mut().add_base_address(0xC00000);
        assert_eq!(anchor.target(), 0xC00010);
    }
}
