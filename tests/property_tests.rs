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

//! Property-based tests over the code-buffer operations, using proptest
//! for random input generation.

use ccscript::{Anchor, CodeBuffer};
use proptest::prelude::*;

fn buffer_from(bytes: &[u8]) -> CodeBuffer {
    let mut buf = CodeBuffer::new();
    for b in bytes {
        buf.append_byte(*b as u32);
    }
    buf
}

proptest! {
    /// Property: appending concatenates bytes.
    #[test]
    fn prop_append_concatenates(a in proptest::collection::vec(any::<u8>(), 0..64),
                                b in proptest::collection::vec(any::<u8>(), 0..64)) {
        let mut joined = buffer_from(&a);
        joined.append(&buffer_from(&b));
        prop_assert_eq!(joined.len(), a.len() + b.len());
        prop_assert_eq!(&joined.bytes()[..a.len()], &a[..]);
        prop_assert_eq!(&joined.bytes()[a.len()..], &b[..]);
    }

    /// Property: slicing an appended buffer at the seam returns buffers
    /// equal to the originals.
    #[test]
    fn prop_append_substring_roundtrip(a in proptest::collection::vec(any::<u8>(), 1..64),
                                       b in proptest::collection::vec(any::<u8>(), 1..64)) {
        let mut joined = buffer_from(&a);
        joined.append(&buffer_from(&b));

        let front = joined.substring(0, a.len()).unwrap();
        let back = joined.substring(a.len(), b.len()).unwrap();
        prop_assert_eq!(front, buffer_from(&a));
        prop_assert_eq!(back, buffer_from(&b));
    }

    /// Property: any in-range slice keeps exactly its bytes.
    #[test]
    fn prop_substring_bytes(data in proptest::collection::vec(any::<u8>(), 1..128),
                            start in 0usize..96, len in 0usize..96) {
        let buf = buffer_from(&data);
        let result = buf.substring(start, len);
        if start < data.len() && start + len <= data.len() {
            let sub = result.unwrap();
            prop_assert_eq!(sub.bytes(), &data[start..start + len]);
        } else {
            prop_assert!(result.is_err());
        }
    }

    /// Property: a resolved whole reference encodes position + base,
    /// little-endian, at its location.
    #[test]
    fn prop_resolution_is_little_endian(prefix in proptest::collection::vec(any::<u8>(), 0..32),
                                        base in 0xC00000u32..0xF00000) {
        let mut buf = buffer_from(&prefix);
        let anchor = Anchor::new("t");
        buf.append_hex("FF FF FF FF");
        let loc = buf.len() as i64 - 4;
        buf.add_reference(loc, &anchor);
        buf.add_anchor(&anchor);

        buf.set_base_address(base);
        buf.resolve_references();

        let expected = (buf.len() as u32).wrapping_add(base);
        let n = prefix.len();
        let got = u32::from_le_bytes([
            buf.bytes()[n],
            buf.bytes()[n + 1],
            buf.bytes()[n + 2],
            buf.bytes()[n + 3],
        ]);
        prop_assert_eq!(got, expected);
    }

    /// Property: read_long inverts append_long at any position.
    #[test]
    fn prop_long_roundtrip(prefix in proptest::collection::vec(any::<u8>(), 0..32),
                           value in any::<u32>()) {
        let mut buf = buffer_from(&prefix);
        buf.append_long(value);
        prop_assert_eq!(buf.read_long(prefix.len()), value);
    }

    /// Property: splitting a straddled reference across any seam loses
    /// no address bytes: the two halves together resolve to the same
    /// bytes the unsplit buffer resolves to.
    #[test]
    fn prop_split_reference_resolves_identically(split in 1usize..4,
                                                 address in any::<u32>()) {
        let target = Anchor::new("far");
        target.set_target(address);

        let mut whole = CodeBuffer::new();
        whole.append_hex("FF FF FF FF");
        whole.add_reference(0, &target);

        let mut resolved = whole.duplicate();
        resolved.resolve_references();

        let mut front = whole.substring(0, split).unwrap();
        let mut back = whole.substring(split, 4 - split).unwrap();
        front.resolve_references();
        back.resolve_references();

        let mut stitched = front.bytes().to_vec();
        stitched.extend_from_slice(back.bytes());
        prop_assert_eq!(stitched, resolved.bytes().to_vec());
    }
}
