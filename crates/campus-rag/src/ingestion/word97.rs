//! Text extraction for Word 97-2003 binary documents
//!
//! The text lives in the `WordDocument` stream of the OLE container, split
//! into pieces described by the piece table (Clx) in the `0Table`/`1Table`
//! stream. Each piece is either UTF-16LE or one byte per character.

use std::io::{self, Cursor, Read, Seek};

/// Offset of the FIB flag word holding `fWhichTblStm`
const FIB_FLAGS_OFFSET: usize = 0x0A;
/// Set when the piece table lives in `1Table`
const WHICH_TABLE_FLAG: u16 = 0x0200;
/// Size of the fixed FIB header before `csw`
const FIB_BASE_LEN: usize = 32;
/// Position of the fcClx/lcbClx pair in FibRgFcLcb
const FC_CLX_INDEX: usize = 33;
/// Piece stored as 8-bit characters
const COMPRESSED_FLAG: u32 = 0x4000_0000;
const FC_MASK: u32 = 0x3FFF_FFFF;

struct Piece {
    start_cp: u32,
    end_cp: u32,
    fc: u32,
}

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

fn u16_at(buf: &[u8], offset: usize) -> io::Result<u16> {
    buf.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| invalid(format!("truncated at byte {}", offset)))
}

fn u32_at(buf: &[u8], offset: usize) -> io::Result<u32> {
    buf.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| invalid(format!("truncated at byte {}", offset)))
}

fn read_stream<F: Read + Seek>(file: &mut cfb::CompoundFile<F>, name: &str) -> io::Result<Vec<u8>> {
    let mut stream = file.open_stream(name)?;
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Visible text of a `.doc` file, paragraphs separated by newlines
pub fn extract_text(data: &[u8]) -> io::Result<String> {
    let mut file = cfb::CompoundFile::open(Cursor::new(data))?;
    let word = read_stream(&mut file, "/WordDocument")?;

    let flags = u16_at(&word, FIB_FLAGS_OFFSET)?;
    let table_name = if flags & WHICH_TABLE_FLAG != 0 { "/1Table" } else { "/0Table" };
    let table = read_stream(&mut file, table_name)?;

    let (fc_clx, lcb_clx) = clx_location(&word)?;
    let clx = table
        .get(fc_clx..fc_clx + lcb_clx)
        .ok_or_else(|| invalid("piece table lies outside the table stream"))?;

    let mut raw = String::new();
    for piece in piece_table(clx)? {
        let len = piece.end_cp.saturating_sub(piece.start_cp) as usize;
        let fc = (piece.fc & FC_MASK) as usize;

        if piece.fc & COMPRESSED_FLAG != 0 {
            let start = fc / 2;
            let bytes = word
                .get(start..start + len)
                .ok_or_else(|| invalid("text piece outside the document stream"))?;
            raw.extend(bytes.iter().map(|&b| b as char));
        } else {
            let bytes = word
                .get(fc..fc + len * 2)
                .ok_or_else(|| invalid("text piece outside the document stream"))?;
            let units = bytes.chunks_exact(2).map(|b| u16::from_le_bytes([b[0], b[1]]));
            raw.extend(char::decode_utf16(units).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)));
        }
    }

    Ok(visible_text(&raw))
}

/// fcClx/lcbClx, found by walking the variable-length FIB sections
fn clx_location(word: &[u8]) -> io::Result<(usize, usize)> {
    let csw = u16_at(word, FIB_BASE_LEN)? as usize;
    let cslw_at = FIB_BASE_LEN + 2 + csw * 2;
    let cslw = u16_at(word, cslw_at)? as usize;
    let count_at = cslw_at + 2 + cslw * 4;
    let pairs = u16_at(word, count_at)? as usize;
    if pairs <= FC_CLX_INDEX {
        return Err(invalid("file information block has no piece table entry"));
    }

    let pair_at = count_at + 2 + FC_CLX_INDEX * 8;
    Ok((u32_at(word, pair_at)? as usize, u32_at(word, pair_at + 4)? as usize))
}

fn piece_table(clx: &[u8]) -> io::Result<Vec<Piece>> {
    let mut pos = 0;
    // formatting runs (Prc) precede the piece table
    while clx.get(pos) == Some(&0x01) {
        pos += 3 + u16_at(clx, pos + 1)? as usize;
    }
    if clx.get(pos) != Some(&0x02) {
        return Err(invalid("missing piece table"));
    }

    let lcb = u32_at(clx, pos + 1)? as usize;
    if lcb < 4 || (lcb - 4) % 12 != 0 {
        return Err(invalid(format!("malformed piece table of {} bytes", lcb)));
    }
    let plc = clx
        .get(pos + 5..pos + 5 + lcb)
        .ok_or_else(|| invalid("truncated piece table"))?;

    let count = (lcb - 4) / 12;
    let descriptors = (count + 1) * 4;
    (0..count)
        .map(|i| {
            Ok(Piece {
                start_cp: u32_at(plc, i * 4)?,
                end_cp: u32_at(plc, (i + 1) * 4)?,
                fc: u32_at(plc, descriptors + i * 8 + 2)?,
            })
        })
        .collect()
}

/// Drop field instructions and map Word's control marks to newlines
fn visible_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    // one entry per open field, true while still in its instruction part
    let mut fields: Vec<bool> = Vec::new();

    for c in raw.chars() {
        match c {
            '\u{13}' => fields.push(true),
            '\u{14}' => {
                if let Some(instruction) = fields.last_mut() {
                    *instruction = false;
                }
            }
            '\u{15}' => {
                fields.pop();
            }
            _ if fields.iter().any(|&instruction| instruction) => {}
            '\r' | '\u{07}' | '\u{0B}' | '\u{0C}' => out.push('\n'),
            '\t' | '\n' => out.push(c),
            c if c < ' ' => {}
            c => out.push(c),
        }
    }

    out
}

/// Build a minimal Word 97 file from `(text, one_byte_per_char)` pieces
#[cfg(test)]
pub(crate) fn fixture(pieces: &[(&str, bool)]) -> Vec<u8> {
    use std::io::Write;

    const TEXT_START: usize = 1024;
    let mut word = vec![0u8; TEXT_START];
    word[0..2].copy_from_slice(&0xA5ECu16.to_le_bytes());
    word[FIB_FLAGS_OFFSET..FIB_FLAGS_OFFSET + 2].copy_from_slice(&WHICH_TABLE_FLAG.to_le_bytes());
    word[32..34].copy_from_slice(&14u16.to_le_bytes());
    word[62..64].copy_from_slice(&22u16.to_le_bytes());
    word[152..154].copy_from_slice(&93u16.to_le_bytes());

    let mut cps = vec![0u32];
    let mut fcs = Vec::new();
    for (text, compressed) in pieces {
        let offset = word.len() as u32;
        if *compressed {
            word.extend(text.chars().map(|c| c as u8));
            fcs.push((offset * 2) | COMPRESSED_FLAG);
        } else {
            for unit in text.encode_utf16() {
                word.extend(unit.to_le_bytes());
            }
            fcs.push(offset);
        }
        let last = cps[cps.len() - 1];
        cps.push(last + text.encode_utf16().count() as u32);
    }

    let lcb = cps.len() * 4 + fcs.len() * 8;
    let mut table = vec![0x01, 0x02, 0x00, 0xAA, 0xBB, 0x02];
    table.extend((lcb as u32).to_le_bytes());
    for cp in &cps {
        table.extend(cp.to_le_bytes());
    }
    for fc in &fcs {
        table.extend([0, 0]);
        table.extend(fc.to_le_bytes());
        table.extend([0, 0]);
    }

    let pair_at = 154 + FC_CLX_INDEX * 8;
    word[pair_at..pair_at + 4].copy_from_slice(&0u32.to_le_bytes());
    word[pair_at + 4..pair_at + 8].copy_from_slice(&(table.len() as u32).to_le_bytes());

    let mut file = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    for (name, bytes) in [("/WordDocument", &word), ("/1Table", &table)] {
        let mut stream = file.create_stream(name).unwrap();
        stream.write_all(bytes).unwrap();
        stream.flush().unwrap();
    }
    file.flush().unwrap();
    file.into_inner().into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_pieces_and_fields() {
        let data = fixture(&[
            ("期末考试安排\r第十六周\r\u{13} HYPERLINK \"x\" \u{14}教务处\u{15}\r", false),
            ("Room 101\r", true),
        ]);
        assert_eq!(extract_text(&data).unwrap(), "期末考试安排\n第十六周\n教务处\nRoom 101\n");
    }

    #[test]
    fn test_table_cells_become_lines() {
        let data = fixture(&[("课程\u{07}学分\u{07}\u{07}", false)]);
        assert_eq!(extract_text(&data).unwrap(), "课程\n学分\n\n");
    }

    #[test]
    fn test_not_an_ole_file() {
        assert!(extract_text(b"plain bytes, no container").is_err());
    }
}
