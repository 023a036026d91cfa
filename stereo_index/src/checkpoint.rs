//! Append-only progress checkpoint for the indexing pipeline.
//!
//! The file holds one decimal byte offset per line. Only the last parseable line matters on load;
//! every append is synced to disk before the scanner moves on.

use crate::error::Result;
use log::warn;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Most recent offset recorded in `path`, or `None` for a fresh run.
///
/// A missing file, an empty file, a path that is not a regular file, or a file with no parseable
/// line all mean a fresh run. Lines that do not parse are skipped.
pub fn load_resume_offset(path: &Path) -> Result<Option<u64>> {

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    //a device or fifo never holds a checkpoint and may never reach end of file
    if !file.metadata()?.is_file() {
        warn!("{:?} is not a regular file, starting a fresh run", path);
        return Ok(None);
    }

    let mut resume: Option<u64> = None;

    for (i, line) in BufReader::new(file).lines().enumerate() {

        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        match trimmed.parse::<u64>() {
            Ok(offset) => resume = Some(offset),
            Err(_) => warn!("ignoring unparseable checkpoint line {} in {:?}: {:?}", i + 1, path, trimmed),
        }
    }

    Ok(resume)
}

#[derive(Debug)]
pub struct Checkpoint {
    path: PathBuf,
    file: File,
    last: Option<u64>,
}

impl Checkpoint {

    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self> {

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        return Ok(Self {
            path: path.to_path_buf(),
            file,
            last: None,
        })
    }

    /// Appends `offset` and waits for it to reach the disk.
    pub fn record(&mut self, offset: u64) -> Result<()> {

        writeln!(self.file, "{}", offset)?;
        self.file.sync_data()?;
        self.last = Some(offset);

        Ok(())
    }

    pub fn last(&self) -> Option<u64> {
        self.last
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn missing_file_means_fresh_run() {

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.progress");

        assert_eq!(load_resume_offset(&path).unwrap(), None);
    }

    #[test]
    fn last_line_wins() {

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.progress");

        let mut checkpoint = Checkpoint::open(&path).unwrap();
        for offset in [0, 120, 4096] {
            checkpoint.record(offset).unwrap();
        }
        assert_eq!(checkpoint.last(), Some(4096));
        drop(checkpoint);

        assert_eq!(load_resume_offset(&path).unwrap(), Some(4096));

        let mut reopened = Checkpoint::open(&path).unwrap();
        reopened.record(5000).unwrap();

        assert_eq!(load_resume_offset(&path).unwrap(), Some(5000));
    }

    #[test]
    fn corrupt_lines_are_ignored() {

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.progress");

        std::fs::write(&path, "garbage\n").unwrap();
        assert_eq!(load_resume_offset(&path).unwrap(), None);

        std::fs::write(&path, "100\n200\n\n2x0\n").unwrap();
        assert_eq!(load_resume_offset(&path).unwrap(), Some(200));
    }

    #[test]
    fn device_path_means_fresh_run() {

        let device = Path::new("/dev/zero");
        if !device.exists() {
            return;
        }

        assert_eq!(load_resume_offset(device).unwrap(), None);
    }

    #[test]
    fn unwritable_checkpoint_fails_to_record() {

        let device = Path::new("/dev/full");
        if !device.exists() {
            return;
        }

        let mut checkpoint = Checkpoint::open(device).unwrap();
        assert!(matches!(checkpoint.record(7), Err(crate::error::Error::Io { .. })));
        assert_eq!(checkpoint.last(), None);
    }
}
