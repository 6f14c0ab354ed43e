//! Hex dump for inspecting buffers on the console.

use core::fmt::{self, Write};

const BYTES_PER_LINE: usize = 16;

/// Writes `data` as offset, hex bytes and printable ASCII, 16 bytes per
/// line:
///
/// ```text
/// frame:
///   0000  45 00 00 54 ...  E..T
/// ```
pub fn hex_dump<W: Write>(out: &mut W, desc: Option<&str>, data: &[u8]) -> fmt::Result {
    if let Some(desc) = desc {
        writeln!(out, "{}:", desc)?;
    }

    if data.is_empty() {
        return writeln!(out, "  ZERO LENGTH");
    }

    for (line, chunk) in data.chunks(BYTES_PER_LINE).enumerate() {
        write!(out, "  {:04x} ", line * BYTES_PER_LINE)?;
        for byte in chunk {
            write!(out, " {:02x}", byte)?;
        }
        for _ in chunk.len()..BYTES_PER_LINE {
            out.write_str("   ")?;
        }
        out.write_str("  ")?;
        for &byte in chunk {
            let c = if (0x20..=0x7e).contains(&byte) {
                byte as char
            } else {
                '.'
            };
            out.write_char(c)?;
        }
        out.write_char('\n')?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(desc: Option<&str>, data: &[u8]) -> String {
        let mut s = String::new();
        hex_dump(&mut s, desc, data).unwrap();
        s
    }

    #[test]
    fn empty_buffer() {
        assert_eq!(dump(Some("rx"), &[]), "rx:\n  ZERO LENGTH\n");
        assert_eq!(dump(None, &[]), "  ZERO LENGTH\n");
    }

    #[test]
    fn short_line_is_padded() {
        assert_eq!(
            dump(None, b"AB\x00"),
            format!("  0000  41 42 00{}  AB.\n", "   ".repeat(13))
        );
    }

    #[test]
    fn full_lines_carry_offsets() {
        let data: Vec<u8> = (0x30..0x30 + 20).collect();
        let out = dump(Some("frame"), &data);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "frame:");
        assert_eq!(
            lines[1],
            "  0000  30 31 32 33 34 35 36 37 38 39 3a 3b 3c 3d 3e 3f  0123456789:;<=>?"
        );
        assert!(lines[2].starts_with("  0010  40 41 42 43 "));
        assert!(lines[2].ends_with("  @ABC"));
    }

    #[test]
    fn non_printable_bytes_become_dots() {
        let out = dump(None, &[0x1f, 0x7f, 0x80, b'~']);
        assert!(out.ends_with("  ...~\n"));
    }
}
