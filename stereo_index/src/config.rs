//! Settings for one indexing run, loadable from and savable to YAML.

use crate::error::Result;
use crate::layout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub source: PathBuf,
    pub index: PathBuf,
    pub checkpoint: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_factor")]
    pub queue_factor: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_min_chiral_centers")]
    pub min_chiral_centers: usize,
    #[serde(default)]
    pub progress: bool,
}

fn default_workers() -> usize {
    layout::DEFAULT_WORKERS
}

fn default_queue_factor() -> usize {
    layout::DEFAULT_QUEUE_FACTOR
}

fn default_timeout_ms() -> u64 {
    layout::DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_min_chiral_centers() -> usize {
    layout::MIN_CHIRAL_CENTERS
}

impl IndexConfig {

    pub fn new(source: &Path, index: &Path, checkpoint: &Path) -> Self {

        return Self {
            source: source.to_path_buf(),
            index: index.to_path_buf(),
            checkpoint: checkpoint.to_path_buf(),
            workers: default_workers(),
            queue_factor: default_queue_factor(),
            timeout_ms: default_timeout_ms(),
            min_chiral_centers: default_min_chiral_centers(),
            progress: false,
        }
    }

    /// Default settings with `records.sdf` indexed into `records.index` and checkpointed to
    /// `records.progress`.
    pub fn for_source(source: &Path) -> Self {

        let index = source.with_extension(layout::INDEX_EXTENSION);
        let checkpoint = source.with_extension(layout::CHECKPOINT_EXTENSION);

        Self::new(source, &index, &checkpoint)
    }

    pub fn from_file(path: &Path) -> Result<Self> {

        let serialized = std::fs::read_to_string(path)?;
        let deserialized: Self = serde_yaml::from_str(&serialized)?;

        return Ok(deserialized.clamped());
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {

        let serialized = serde_yaml::to_string(&self)?;
        let mut file = File::create(path)?;

        file.write_all(serialized.as_bytes())?;

        Ok(())
    }

    /// Zero workers or a zero queue factor would stall the pipeline; both are raised to 1.
    pub fn clamped(mut self) -> Self {

        self.workers = self.workers.max(1);
        self.queue_factor = self.queue_factor.max(1);

        return self;
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Capacity of the task and result queues.
    pub fn queue_capacity(&self) -> usize {
        self.workers.max(1).saturating_mul(self.queue_factor.max(1))
    }
}
