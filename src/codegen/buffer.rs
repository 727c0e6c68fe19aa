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

//! The code buffer: the fundamental emit target.
//!
//! A [`CodeBuffer`] is an append-only byte sequence carrying pending
//! address patches ([`Reference`]s) and position markers (anchors), both
//! of which survive append and substring operations with well-defined
//! truncation rules. It also keeps a parallel character mask used only
//! by the [`Display`](std::fmt::Display) pretty-printer.

use std::collections::HashMap;
use std::rc::Rc;

use super::anchor::{Anchor, AnchorRef};
use crate::error::{CompileError, ErrorCode, Result};

/// A pending patch embedded in a buffer.
///
/// `location` does not necessarily identify the offset where the patch
/// bytes start: it is the offset where the reference *would* start if it
/// were whole. A reference whose first two bytes have been shaved off by
/// a substring keeps its `location` but gets `offset = 2`. The first byte
/// physically present is always `location + offset`, and `length` bytes
/// of the target address, starting with byte `offset`, are written there
/// at resolution.
#[derive(Debug, Clone)]
pub struct Reference {
    /// Offset of the first conceptual byte of the reference.
    pub location: i64,
    /// First byte of the target address that will actually be written.
    pub offset: i64,
    /// Number of address bytes remaining to be written.
    pub length: i64,
    /// The anchor whose address will be patched in.
    pub target: AnchorRef,
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location
            && self.offset == other.offset
            && self.length == other.length
            && Rc::ptr_eq(&self.target, &other.target)
    }
}

/// An append-only byte container with anchors and references.
#[derive(Debug, Default)]
pub struct CodeBuffer {
    bytes: Vec<u8>,
    refs: Vec<Reference>,
    anchors: Vec<AnchorRef>,
    /// Marks which bytes were emitted as text characters.
    text: Vec<bool>,
    base_address: u32,
}

impl CodeBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer containing the given text as character bytes.
    pub fn from_text(s: &str) -> Self {
        let mut buf = Self::new();
        for c in s.chars() {
            buf.append_char(c as u32);
        }
        buf
    }

    /// The number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The buffer's base address, if one has been assigned.
    pub fn base_address(&self) -> u32 {
        self.base_address
    }

    //
    // Output primitives
    //

    /// Append a single byte.
    pub fn append_byte(&mut self, n: u32) {
        self.bytes.push(n as u8);
        self.text.push(false);
    }

    /// Append a text character, shifted into the game's character page.
    pub fn append_char(&mut self, n: u32) {
        self.append_byte(n.wrapping_add(0x30));
        if let Some(last) = self.text.last_mut() {
            *last = true;
        }
    }

    /// Append a 16-bit value, little-endian.
    pub fn append_short(&mut self, n: u32) {
        self.append_byte(n & 0xFF);
        self.append_byte((n >> 8) & 0xFF);
    }

    /// Append a 32-bit value, little-endian.
    pub fn append_long(&mut self, n: u32) {
        self.append_byte(n & 0xFF);
        self.append_byte((n >> 8) & 0xFF);
        self.append_byte((n >> 16) & 0xFF);
        self.append_byte((n >> 24) & 0xFF);
    }

    /// Append a sequence of raw bytes given as hex digit pairs, optionally
    /// separated by whitespace. Used for the fixed opcode sequences the
    /// evaluator emits; the input must be well-formed.
    pub fn append_hex(&mut self, code: &str) {
        let digits: Vec<char> = code.chars().filter(|c| !c.is_whitespace()).collect();
        for pair in digits.chunks(2) {
            let s: String = pair.iter().collect();
            let n = u8::from_str_radix(&s, 16).expect("opcode strings are valid hex");
            self.append_byte(n as u32);
        }
    }

    //
    // Reference and anchor handling
    //

    /// Record a whole 4-byte reference at the given location.
    pub fn add_reference(&mut self, location: i64, target: &AnchorRef) {
        self.add_reference_part(location, 0, 4, target);
    }

    /// Record a reference with explicit truncation bounds.
    pub fn add_reference_part(&mut self, location: i64, offset: i64, length: i64, target: &AnchorRef) {
        self.refs.push(Reference {
            location,
            offset,
            length,
            target: Rc::clone(target),
        });
    }

    /// Place an anchor at the end of the buffer.
    pub fn add_anchor(&mut self, anchor: &AnchorRef) {
        self.add_anchor_at(self.bytes.len() as i64, anchor);
    }

    /// Place an anchor at the given position within the buffer.
    pub fn add_anchor_at(&mut self, position: i64, anchor: &AnchorRef) {
        anchor.set_position(position);
        self.anchors.push(Rc::clone(anchor));
    }

    /// All references, in insertion order.
    pub fn references(&self) -> &[Reference] {
        &self.refs
    }

    /// All anchors placed in this buffer.
    pub fn anchors(&self) -> &[AnchorRef] {
        &self.anchors
    }

    /// The references overlapping `[start, start+size)`.
    ///
    /// A reference is in the range iff its first physically-present byte is
    /// before the end of the range and its last byte is at or after the
    /// beginning.
    pub fn references_in_range(&self, start: i64, size: i64) -> Vec<Reference> {
        if size == 0 {
            return Vec::new();
        }
        self.refs
            .iter()
            .filter(|r| {
                let refstart = r.location + r.offset;
                let refend = refstart + r.length - 1;
                refstart < start + size && refend >= start
            })
            .cloned()
            .collect()
    }

    /// Set a base address, updating the target of every contained anchor
    /// to `position + base`.
    pub fn set_base_address(&mut self, address: u32) {
        self.base_address = address;
        for anchor in &self.anchors {
            anchor.set_target((anchor.position() + address as i64) as u32);
        }
    }

    /// Write the final address of every reference into the buffer.
    ///
    /// Must not be called until all targeted anchors have their addresses
    /// computed.
    pub fn resolve_references(&mut self) {
        for i in 0..self.refs.len() {
            let address = self.refs[i].target.target();
            let location = self.refs[i].location;
            let offset = self.refs[i].offset;
            let length = self.refs[i].length;
            for j in offset..offset + length {
                if let Some(byte) = self.bytes.get_mut((location + j) as usize) {
                    *byte = (address >> (j * 8)) as u8;
                }
            }
        }
    }

    //
    // Buffer operations
    //

    /// Append the contents of another buffer, translating its references
    /// and anchors by this buffer's current size.
    pub fn append(&mut self, other: &CodeBuffer) {
        let offset = -(self.bytes.len() as i64);
        other
            .translate_into(self, offset, 0, other.bytes.len() as i64)
            .expect("full-range translation cannot truncate an anchor");
        self.bytes.extend_from_slice(&other.bytes);
        self.text.extend_from_slice(&other.text);
    }

    /// Return a new buffer holding `bytes[start..start+len)`, with
    /// translated anchors and references.
    ///
    /// Fails if the range exceeds the buffer, or if the slice would cut
    /// away a non-external local anchor that a surviving reference needs.
    pub fn substring(&self, start: usize, len: usize) -> Result<CodeBuffer> {
        if start >= self.bytes.len() || start + len > self.bytes.len() {
            return Err(CompileError::new(
                ErrorCode::SubstringOutOfRange,
                "substring range out of bounds",
            ));
        }
        let mut sub = CodeBuffer::new();
        sub.bytes = self.bytes[start..start + len].to_vec();
        sub.text = self.text[start..start + len].to_vec();
        self.translate_into(&mut sub, start as i64, start as i64, len as i64)?;
        Ok(sub)
    }

    /// A full copy of this buffer.
    ///
    /// External anchors keep their identity in the copy; local anchors
    /// needed by references are duplicated, exactly as in an append.
    pub fn duplicate(&self) -> CodeBuffer {
        let mut copy = CodeBuffer::new();
        copy.bytes = self.bytes.clone();
        copy.text = self.text.clone();
        copy.base_address = self.base_address;
        self.translate_into(&mut copy, 0, 0, self.bytes.len() as i64)
            .expect("full-range translation cannot truncate an anchor");
        copy
    }

    /// Copy the references in `[start, start+len)` into `destination`,
    /// translating positions by `offset` and adjusting the bounds of any
    /// reference truncated by the range.
    ///
    /// External anchors are always transferred, sharing identity with the
    /// source. A local anchor targeted by a surviving reference is copied
    /// once (deduplicated by identity); if it lies outside the range and
    /// is not external, the operation fails.
    fn translate_into(
        &self,
        destination: &mut CodeBuffer,
        offset: i64,
        start: i64,
        len: i64,
    ) -> Result<()> {
        let needed = self.references_in_range(start, len);

        let mut translated: HashMap<*const Anchor, AnchorRef> = HashMap::new();

        for anchor in &self.anchors {
            if anchor.is_external() {
                destination.add_anchor_at(anchor.position() - offset, anchor);
                translated.insert(Rc::as_ptr(anchor), Rc::clone(anchor));
            }
        }

        for mut r in needed {
            let local = self.anchors.iter().find(|a| Rc::ptr_eq(a, &r.target));
            if let Some(anchor) = local {
                if (anchor.position() < start || anchor.position() > start + len)
                    && !anchor.is_external()
                {
                    return Err(CompileError::new(
                        ErrorCode::TruncatedAnchor,
                        format!(
                            "substring operation truncated necessary anchor: {}",
                            anchor.name()
                        ),
                    ));
                }

                let key = Rc::as_ptr(anchor);
                if let Some(mapped) = translated.get(&key) {
                    r.target = Rc::clone(mapped);
                } else {
                    let copy = anchor.duplicate();
                    destination.add_anchor_at(anchor.position() - offset, &copy);
                    translated.insert(key, Rc::clone(&copy));
                    r.target = copy;
                }
            }

            // Finish translating, accounting for possible truncation.
            r.location -= start;
            let refstart = r.location + r.offset;
            let refend = r.location + r.offset + r.length - 1;
            if refstart < 0 || refend >= len {
                // Bytes cut off at the beginning advance the offset; bytes
                // cut off at the end shorten the length.
                r.offset = -(r.location.min(0));
                let overflow = (refend - (len - 1)).max(0);
                r.length = r.length.min(r.length - r.offset - overflow);
            }

            destination.add_reference_part(r.location + start - offset, r.offset, r.length, &r.target);
        }

        Ok(())
    }

    //
    // Data reading
    //

    /// Read a byte, or 0 past the end.
    pub fn read_byte(&self, pos: usize) -> u8 {
        self.bytes.get(pos).copied().unwrap_or(0)
    }

    /// Read a little-endian 16-bit value; bytes past the end read as 0.
    pub fn read_short(&self, pos: usize) -> u16 {
        let mut result = 0u16;
        for (i, shift) in (0..2).map(|i| (i, i * 8)) {
            if let Some(b) = self.bytes.get(pos + i) {
                result += (*b as u16) << shift;
            }
        }
        result
    }

    /// Read a little-endian 32-bit value; bytes past the end read as 0.
    pub fn read_long(&self, pos: usize) -> u32 {
        let mut result = 0u32;
        for (i, shift) in (0..4).map(|i| (i, i * 8)) {
            if let Some(b) = self.bytes.get(pos + i) {
                result += (*b as u32) << shift;
            }
        }
        result
    }

    /// Write the buffer's bytes into `buffer` at `location`.
    ///
    /// Returns false if the write would run past the end of `buffer`;
    /// bytes before the overrun are still written.
    pub fn write_into(&self, buffer: &mut [u8], location: usize) -> bool {
        for (i, byte) in self.bytes.iter().enumerate() {
            let a = location + i;
            if a >= buffer.len() {
                return false;
            }
            buffer[a] = *byte;
        }
        true
    }
}

impl PartialEq for CodeBuffer {
    /// Two buffers are equal iff their bytes are identical and their
    /// reference lists are equal in order. Anchor identity and the
    /// character mask are not part of equality.
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes && self.refs == other.refs
    }
}

impl std::fmt::Display for CodeBuffer {
    /// Renders character bytes as text and code bytes as bracketed hex:
    /// `@hello[02 18 0a]`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.bytes.len() {
            if !self.text[i] {
                if i == 0 || self.text[i - 1] {
                    write!(f, "[")?;
                }
                write!(f, "{:02x}", self.bytes[i])?;
                if i == self.bytes.len() - 1 || self.text[i + 1] {
                    write!(f, "]")?;
                } else {
                    write!(f, " ")?;
                }
            } else {
                write!(f, "{}", (self.bytes[i] - 0x30) as char)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_primitives() {
        let mut buf = CodeBuffer::new();
        buf.append_byte(0x0A);
        buf.append_short(0x1234);
        buf.append_long(0xDEADBEEF);
        assert_eq!(
            buf.bytes(),
            &[0x0A, 0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE]
        );
    }

    #[test]
    fn test_append_char_shifts() {
        let mut buf = CodeBuffer::new();
        buf.append_char('A' as u32);
        assert_eq!(buf.bytes(), &[0x71]);
    }

    #[test]
    fn test_append_hex() {
        let mut buf = CodeBuffer::new();
        buf.append_hex("1B 02 FF FF FF FF");
        assert_eq!(buf.bytes(), &[0x1B, 0x02, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_resolution_writes_little_endian() {
        let mut buf = CodeBuffer::new();
        let anchor = Anchor::new("t");
        buf.append_hex("0A FF FF FF FF");
        buf.add_reference(1, &anchor);
        buf.add_anchor(&anchor);
        buf.set_base_address(0xC0ABCD);
        buf.resolve_references();
        // anchor position 5, base 0xC0ABCD -> 0xC0ABD2
        assert_eq!(buf.bytes(), &[0x0A, 0xD2, 0xAB, 0xC0, 0x00]);
    }

    #[test]
    fn test_substring_out_of_range() {
        let mut buf = CodeBuffer::new();
        buf.append_byte(1);
        assert!(buf.substring(0, 2).is_err());
        assert!(buf.substring(1, 0).is_err());
        assert!(buf.substring(0, 1).is_ok());
    }

    #[test]
    fn test_equality_ignores_anchors_and_mask() {
        let mut a = CodeBuffer::new();
        a.append_byte(0x71);
        let mut b = CodeBuffer::new();
        b.append_char('A' as u32);
        let mut c = CodeBuffer::new();
        c.append_byte(0x71);
        c.add_anchor(&Anchor::new("x"));
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_display_pretty_printing() {
        let mut buf = CodeBuffer::new();
        buf.append_char('h' as u32);
        buf.append_char('i' as u32);
        buf.append_hex("10 05");
        assert_eq!(buf.to_string(), "hi[10 05]");
    }
}
