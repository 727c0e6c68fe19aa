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

//! The reset file: idempotent recompilation against one ROM image.
//!
//! After a successful run the compiler leaves `<rom>.reset.txt` beside
//! the output, recording the run's footprint: the primary output range
//! (zeroed before the next run) and, for every deferred write, the ROM
//! bytes that were there before the write (restored before the next
//! run). Applying the file undoes the previous run, so compiling the
//! same sources twice yields byte-identical output.
//!
//! Format (all hex):
//!
//! ```text
//! <start> <end>
//! <virtual-address> <byte> <byte> ...
//! ```

use std::path::Path;

use super::rom::RomImage;
use crate::error::{CompileError, ErrorCode, Result};

/// The prior contents of one deferred-write site, captured as the write
/// was applied.
#[derive(Debug)]
pub struct WriteRecord {
    /// The write's virtual address.
    pub vadr: u32,
    /// The ROM bytes at that location before the write.
    pub prior: Vec<u8>,
}

/// Apply a reset file to the ROM image, undoing the previous run.
///
/// A missing or malformed file is simply ignored; there is nothing to
/// undo.
pub fn apply(path: &Path, rom: &mut RomImage, verbose: bool) {
    let Ok(text) = std::fs::read_to_string(path) else {
        return;
    };

    let mut lines = text.lines();

    // First line: the primary output range to zero.
    let Some(header) = lines.next() else {
        return;
    };
    let mut fields = header.split_whitespace();
    let start = fields.next().and_then(|s| u32::from_str_radix(s, 16).ok());
    let end = fields.next().and_then(|s| u32::from_str_radix(s, 16).ok());
    if let (Some(start), Some(end)) = (start, end) {
        if verbose {
            eprintln!("Zeroing previous output ({:x} to {:x})", start, end);
        }
        if let (Some(pstart), Some(pend)) = (rom.map_virtual(start), rom.map_virtual(end)) {
            rom.zero_range(pstart, pend);
        }
    }

    // Remaining lines: bytes to restore at deferred-write sites.
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(vadr) = fields.next().and_then(|s| u32::from_str_radix(s, 16).ok()) else {
            continue;
        };
        let Some(mut offset) = rom.map_virtual(vadr) else {
            continue;
        };
        for field in fields {
            let Ok(byte) = u8::from_str_radix(field, 16) else {
                break;
            };
            rom.write_byte(offset, byte);
            offset += 1;
        }
    }
}

/// Write a reset file describing this run.
pub fn write(path: &Path, range: Option<(u32, u32)>, records: &[WriteRecord]) -> Result<()> {
    let mut out = String::new();

    match range {
        Some((start, end)) if start != end => {
            out.push_str(&format!("{:06x} {:x}\n", start, end));
        }
        _ => out.push_str("000000 0\n"),
    }

    for record in records {
        out.push_str(&format!("{:06x} ", record.vadr));
        for byte in &record.prior {
            out.push_str(&format!("{:02x} ", byte));
        }
        out.push('\n');
    }

    std::fs::write(path, out).map_err(|_| {
        CompileError::new(
            ErrorCode::FileWrite,
            format!("couldn't create info file '{}'", path.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_zeroes_range_and_restores_bytes() {
        let mut data = vec![0xEEu8; 0x10000];
        data[0x20] = 0x11;
        let mut rom = RomImage::from_bytes(data).unwrap();

        let dir = std::env::temp_dir();
        let path = dir.join("ccscript_reset_apply_test.txt");
        std::fs::write(&path, "c00010 c00014\nc00100 aa bb cc\n").unwrap();

        apply(&path, &mut rom, false);

        assert_eq!(&rom.data()[0x10..0x14], &[0, 0, 0, 0]);
        assert_eq!(rom.data()[0x14], 0xEE);
        assert_eq!(&rom.data()[0x100..0x103], &[0xAA, 0xBB, 0xCC]);
        // Untouched bytes stay.
        assert_eq!(rom.data()[0x20], 0x11);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_apply_missing_file_is_noop() {
        let mut rom = RomImage::from_bytes(vec![0x55; 0x10000]).unwrap();
        apply(
            Path::new("/nonexistent/ccscript.reset.txt"),
            &mut rom,
            false,
        );
        assert!(rom.data().iter().all(|b| *b == 0x55));
    }

    #[test]
    fn test_write_format() {
        let dir = std::env::temp_dir();
        let path = dir.join("ccscript_reset_write_test.txt");

        write(
            &path,
            Some((0xF00000, 0xF00412)),
            &[WriteRecord {
                vadr: 0xF02000,
                prior: vec![0x0A, 0x0B, 0x0C],
            }],
        )
        .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "f00000 f00412\nf02000 0a 0b 0c \n");

        write(&path, None, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "000000 0\n");

        std::fs::remove_file(&path).ok();
    }
}
