//! Random access to records through a byte-offset index.
//!
//! The index file is plain text, one decimal offset per line, each pointing at the first line of
//! a record in the source file. Entries appear in the order the pipeline finished them, not in
//! source order.

use crate::error::{Error, Result};
use crate::layout::RECORD_TERMINATOR;
use crate::molecule::Molecule;
use crate::sdf::{is_terminator, parse_mol_block};
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OffsetIndex {
    offsets: Vec<u64>,
}

impl OffsetIndex {

    /// Reads every offset in `path`. Blank lines are skipped; any other unparseable line is an
    /// error.
    pub fn load(path: &Path) -> Result<Self> {

        let file = File::open(path)?;
        let mut offsets: Vec<u64> = Vec::new();

        for (i, line) in BufReader::new(file).lines().enumerate() {

            let line = line?;
            let trimmed = line.trim();

            if trimmed.is_empty() {
                continue;
            }

            let offset = trimmed.parse::<u64>().map_err(|_| Error::IndexEntry {
                line: i + 1,
                entry: trimmed.to_string(),
            })?;

            offsets.push(offset);
        }

        return Ok(Self { offsets });
    }

    pub fn from_offsets(offsets: Vec<u64>) -> Self {
        Self { offsets }
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// A uniformly random entry, or `None` for an empty index.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<u64> {
        self.offsets.choose(rng).copied()
    }
}

/// Text of the record starting at `offset`, up to (not including) the next terminator line or
/// the end of the file. Every returned line ends with a newline.
pub fn read_record_at(source: &Path, offset: u64) -> Result<String> {

    let mut file = File::open(source)?;
    file.seek(SeekFrom::Start(offset))?;

    let mut reader = BufReader::new(file);
    let mut text = String::new();
    let mut raw: Vec<u8> = Vec::new();

    loop {

        raw.clear();

        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&raw);

        if is_terminator(&line) {
            break;
        }

        text.push_str(&line);
        if !line.ends_with('\n') {
            text.push('\n');
        }
    }

    return Ok(text);
}

/// Parses the record starting at `offset` in `source`.
pub fn read_at(source: &Path, offset: u64) -> Result<Molecule> {

    let text = read_record_at(source, offset)?;
    parse_mol_block(&text)
}

/// Loads the whole index at `index` and parses one uniformly chosen record from `source`.
pub fn pick_random(source: &Path, index: &Path) -> Result<Molecule> {

    let store = MoleculeStore::open(source, index)?;
    let (_, mol) = store.random()?;

    Ok(mol)
}

/// A source file paired with its loaded offset index.
///
/// Nothing is mutated after [`MoleculeStore::open`], so one store can be shared between threads
/// behind an `Arc`.
#[derive(Debug, Clone)]
pub struct MoleculeStore {
    source: PathBuf,
    index: OffsetIndex,
}

impl MoleculeStore {

    pub fn open(source: &Path, index: &Path) -> Result<Self> {

        let index = OffsetIndex::load(index)?;

        return Ok(Self {
            source: source.to_path_buf(),
            index,
        })
    }

    pub fn index(&self) -> &OffsetIndex {
        &self.index
    }

    pub fn read_at(&self, offset: u64) -> Result<Molecule> {
        read_at(&self.source, offset)
    }

    /// A uniformly chosen indexed record and its offset.
    pub fn random(&self) -> Result<(u64, Molecule)> {

        let offset = self
            .index
            .pick(&mut rand::thread_rng())
            .ok_or(Error::EmptyIndex)?;

        let mol = self.read_at(offset)?;

        Ok((offset, mol))
    }
}

/// Copies every indexed record from `inputs` into one new record file and writes a fresh index
/// for it. Returns the number of records copied.
///
/// Records keep their original text; each is closed with a terminator line.
pub fn extract(inputs: &[(PathBuf, PathBuf)], output: &Path, output_index: &Path) -> Result<usize> {

    let mut records = BufWriter::new(File::create(output)?);
    let mut index = BufWriter::new(File::create(output_index)?);

    let mut position: u64 = 0;
    let mut copied: usize = 0;

    for (source, index_path) in inputs.iter() {

        let offsets = OffsetIndex::load(index_path)?;
        info!("extracting {} records from {:?}", offsets.len(), source);

        for offset in offsets.offsets().iter() {

            let text = read_record_at(source, *offset)?;
            let block = format!("{}{}\n", text, RECORD_TERMINATOR);

            records.write_all(block.as_bytes())?;
            writeln!(index, "{}", position)?;

            position += block.len() as u64;
            copied += 1;
        }
    }

    records.flush()?;
    index.flush()?;

    Ok(copied)
}
