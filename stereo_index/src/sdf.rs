//! Reads and writes MDL V2000 records, and splits a record file into records with their byte
//! offsets.
//!
//! Only what the detection engine needs is kept from a record: name, element, 2D coordinates and
//! the bond table. Everything after the bond block (properties, data items) is ignored.

use crate::error::{Error, Result};
use crate::layout;
use crate::molecule::{Atom, Molecule};
use std::io::BufRead;
use std::str::FromStr;

fn field<T: FromStr>(line: &str, line_no: usize, start: usize, size: usize, what: &str) -> Result<T> {

    let raw = line
        .get(start..start + size)
        .ok_or_else(|| Error::parse(line_no, format!("line too short for {}", what)))?;

    raw.trim()
        .parse::<T>()
        .map_err(|_| Error::parse(line_no, format!("invalid {}: {:?}", what, raw.trim())))
}

fn is_counts_line(line: &str) -> bool {

    match line.get(layout::COUNTS_TAG_START..layout::COUNTS_TAG_END) {
        Some(tag) => tag.contains(layout::COUNTS_TAG),
        None => false,
    }
}

fn parse_atom_line(line: &str, line_no: usize) -> Result<Atom> {

    let x: f64 = field(line, line_no, layout::ATOM_X_START, layout::ATOM_X_SIZE, "x coordinate")?;
    let y: f64 = field(line, line_no, layout::ATOM_Y_START, layout::ATOM_Y_SIZE, "y coordinate")?;

    //the symbol column may be cut short on hand-written files
    let padded = format!("{:<40}", line);
    let symbol = padded
        .get(layout::ATOM_SYMBOL_START..layout::ATOM_SYMBOL_START + layout::ATOM_SYMBOL_SIZE)
        .map(str::trim)
        .unwrap_or("");

    if symbol.is_empty() {
        return Err(Error::parse(line_no, "missing element symbol"));
    }

    Ok(Atom::new(symbol, x, y))
}

fn parse_bond_line(line: &str, line_no: usize) -> Result<(usize, usize, u8)> {

    let from: usize = field(line, line_no, layout::BOND_FROM_START, layout::BOND_FROM_SIZE, "first atom")?;
    let to: usize = field(line, line_no, layout::BOND_TO_START, layout::BOND_TO_SIZE, "second atom")?;
    let order: u8 = field(line, line_no, layout::BOND_ORDER_START, layout::BOND_ORDER_SIZE, "bond order")?;

    match (from.checked_sub(1), to.checked_sub(1)) {
        (Some(from), Some(to)) => Ok((from, to, order)),
        _ => Err(Error::parse(line_no, "bond references atom 0")),
    }
}

/// Parses one record's text into a molecule.
///
/// Atom and bond indices in the text are 1-based; the returned molecule is 0-based. Bonds that
/// point past the atom block are kept as-is.
pub fn parse_mol_block(text: &str) -> Result<Molecule> {

    let lines: Vec<&str> = text.lines().collect();

    if lines.len() < 4 {
        return Err(Error::parse(lines.len(), "record too short"));
    }

    let counts_idx = lines
        .iter()
        .position(|line| is_counts_line(line))
        .ok_or_else(|| Error::parse(lines.len(), "no V2000 counts line"))?;

    let counts = lines[counts_idx];
    let atom_count: usize = field(counts, counts_idx + 1, layout::ATOM_COUNT_START, layout::ATOM_COUNT_SIZE, "atom count")?;
    let bond_count: usize = field(counts, counts_idx + 1, layout::BOND_COUNT_START, layout::BOND_COUNT_SIZE, "bond count")?;

    let atom_start = counts_idx + 1;
    let bond_start = atom_start + atom_count;

    if lines.len() < bond_start + bond_count {
        return Err(Error::parse(lines.len(), "record ends before atom and bond blocks"));
    }

    let name = match counts_idx {
        0 => "",
        _ => lines[0].trim(),
    };
    let mut mol = Molecule::new(name);

    for (i, line) in lines[atom_start..bond_start].iter().enumerate() {
        mol.add_atom(parse_atom_line(line, atom_start + i + 1)?);
    }

    for (i, line) in lines[bond_start..bond_start + bond_count].iter().enumerate() {
        let (from, to, order) = parse_bond_line(line, bond_start + i + 1)?;
        mol.add_bond(from, to, order);
    }

    return Ok(mol);
}

/// Writes a molecule as a V2000 block ending in `M  END`, without the record terminator.
pub fn write_mol_block(mol: &Molecule) -> String {

    let mut s = String::new();

    s += &format!("{}\n", mol.name.replace('\n', " "));
    s += "  stereo_index\n";
    s += "\n";
    s += &format!("{:>3}{:>3}  0  0  0  0  0  0  0  0999 {}\n", mol.atom_count(), mol.bond_count(), layout::COUNTS_TAG);

    for atom in mol.atoms().iter() {
        s += &format!(
            "{:>10.4}{:>10.4}{:>10.4} {:<3} 0  0  0  0  0  0  0  0  0  0  0  0\n",
            atom.x, atom.y, 0.0, atom.element
        );
    }

    for bond in mol.bonds().iter() {
        s += &format!("{:>3}{:>3}{:>3}  0\n", bond.from + 1, bond.to + 1, bond.order);
    }

    s += "M  END\n";

    return s;
}

pub fn is_terminator(line: &str) -> bool {
    line.trim() == layout::RECORD_TERMINATOR
}

/// One record's text (terminator excluded) and the byte offset its first line starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub offset: u64,
    pub text: String,
}

/// Splits a record file into [`Record`]s, tracking exact byte offsets.
///
/// A trailing record without a terminator is still yielded unless it is blank.
pub struct RecordReader<R> {
    reader: R,
    position: u64,
    line: Vec<u8>,
    done: bool,
}

impl<R: BufRead> RecordReader<R> {

    pub fn new(reader: R) -> Self {

        return Self {
            reader,
            position: 0,
            line: Vec::new(),
            done: false,
        }
    }

    /// Number of bytes consumed so far, which is also the offset of the next record.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = std::io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {

        if self.done {
            return None;
        }

        let offset = self.position;
        let mut text = String::new();

        loop {

            self.line.clear();

            let read = match self.reader.read_until(b'\n', &mut self.line) {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            if read == 0 {
                self.done = true;
                return match text.trim().is_empty() {
                    true => None,
                    false => Some(Ok(Record { offset, text })),
                };
            }

            self.position += read as u64;

            let line = String::from_utf8_lossy(&self.line);

            if is_terminator(&line) {
                return Some(Ok(Record { offset, text }));
            }

            text.push_str(&line);
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::fixtures;
    use assert_approx_eq::assert_approx_eq;
    use std::io::Cursor;

    fn methanol() -> &'static str {
        "\
Methanol
  test

  2  1  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.4000   -0.2500    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
M  END
"
    }

    #[test]
    fn parse_minimal_record() {

        let mol = parse_mol_block(methanol()).unwrap();

        assert_eq!(mol.name, "Methanol");
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.bond_count(), 1);
        assert_eq!(mol.atom(1).unwrap().element, "O");
        assert_approx_eq!(mol.atom(1).unwrap().x, 1.4);
        assert_approx_eq!(mol.atom(1).unwrap().y, -0.25);

        let bond = mol.bond(0).unwrap();
        assert_eq!((bond.from, bond.to, bond.order), (0, 1, 1));
    }

    #[test]
    fn parse_windows_line_endings() {

        let text = methanol().replace('\n', "\r\n");
        let mol = parse_mol_block(&text).unwrap();

        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.atom(0).unwrap().element, "C");
    }

    #[test]
    fn written_blocks_parse_back() {

        let original = fixtures::trichiral_chain();
        let mol = parse_mol_block(&write_mol_block(&original)).unwrap();

        assert_eq!(mol.name, original.name);
        assert_eq!(mol.atoms(), original.atoms());
        assert_eq!(mol.bonds(), original.bonds());
    }

    #[test]
    fn missing_counts_line_is_an_error() {

        let text = methanol().replace("V2000", "V3000");
        assert!(matches!(parse_mol_block(&text), Err(Error::Parse { .. })));

        assert!(matches!(parse_mol_block("a\nb\n"), Err(Error::Parse { .. })));
    }

    #[test]
    fn truncated_record_is_an_error() {

        let text: String = methanol().lines().take(6).map(|l| format!("{}\n", l)).collect();
        assert!(matches!(parse_mol_block(&text), Err(Error::Parse { .. })));
    }

    #[test]
    fn malformed_fields_are_errors() {

        let bad_x = methanol().replace("    1.4000", "    1.4x00");
        assert!(matches!(parse_mol_block(&bad_x), Err(Error::Parse { .. })));

        let zero_atom = methanol().replace("  1  2  1  0", "  0  2  1  0");
        assert!(matches!(parse_mol_block(&zero_atom), Err(Error::Parse { .. })));
    }

    #[test]
    fn bonds_past_the_atom_block_are_kept() {

        let text = methanol().replace("  1  2  1  0", "  1  9  1  0");
        let mol = parse_mol_block(&text).unwrap();

        assert_eq!(mol.bond(0).unwrap().to, 8);
    }

    #[test]
    fn reader_tracks_record_offsets() {

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.sdf");
        let mols: Vec<Molecule> = fixtures::mixed_records().into_iter().map(|(m, _)| m).collect();
        let offsets = fixtures::write_records(&path, &mols);

        let file = std::fs::File::open(&path).unwrap();
        let records: Vec<Record> = RecordReader::new(std::io::BufReader::new(file))
            .collect::<std::io::Result<Vec<_>>>()
            .unwrap();

        assert_eq!(records.iter().map(|r| r.offset).collect::<Vec<_>>(), offsets);
        for (record, mol) in records.iter().zip(mols.iter()) {
            assert_eq!(record.text, write_mol_block(mol));
        }
    }

    #[test]
    fn reader_yields_unterminated_tail_but_not_blank_tail() {

        let data = format!("{}$$$$\n{}", methanol(), methanol());
        let records: Vec<Record> = RecordReader::new(Cursor::new(data.clone()))
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].offset, (methanol().len() + 5) as u64);

        let blank = format!("{}$$$$\n\n  \n", methanol());
        let mut reader = RecordReader::new(Cursor::new(blank.clone()));
        assert!(reader.next().is_some());
        assert!(reader.next().is_none());
        assert_eq!(reader.position(), blank.len() as u64);
    }

    #[test]
    fn reader_counts_raw_bytes() {

        let mut data: Vec<u8> = b"\xff\xfe bad name\n$$$$\n".to_vec();
        data.extend_from_slice(methanol().as_bytes());
        data.extend_from_slice(b"$$$$\r\n");

        let records: Vec<Record> = RecordReader::new(Cursor::new(data)).map(|r| r.unwrap()).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].offset, 17);
        assert_eq!(records[1].text, methanol());
    }
}
