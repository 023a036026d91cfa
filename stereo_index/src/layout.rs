//! Sets constants for the on-disk formats and the pipeline defaults


use std::time::Duration;

/// Line that closes every record in the source file.
pub const RECORD_TERMINATOR: &str = "$$$$";

/// Tag that marks the counts line of a record.
pub const COUNTS_TAG: &str = "V2000";

//counts line columns
pub const ATOM_COUNT_START: usize = 0;
pub const ATOM_COUNT_SIZE: usize = 3;

pub const BOND_COUNT_START: usize = ATOM_COUNT_START + ATOM_COUNT_SIZE;
pub const BOND_COUNT_SIZE: usize = 3;

pub const COUNTS_TAG_START: usize = 30;
pub const COUNTS_TAG_END: usize = 39;

//atom line columns
pub const ATOM_X_START: usize = 0;
pub const ATOM_X_SIZE: usize = 10;

pub const ATOM_Y_START: usize = ATOM_X_START + ATOM_X_SIZE;
pub const ATOM_Y_SIZE: usize = 10;

pub const ATOM_Z_START: usize = ATOM_Y_START + ATOM_Y_SIZE;
pub const ATOM_Z_SIZE: usize = 10;

pub const ATOM_SYMBOL_START: usize = ATOM_Z_START + ATOM_Z_SIZE + 1;
pub const ATOM_SYMBOL_SIZE: usize = 3;

//bond line columns
pub const BOND_FROM_START: usize = 0;
pub const BOND_FROM_SIZE: usize = 3;

pub const BOND_TO_START: usize = BOND_FROM_START + BOND_FROM_SIZE;
pub const BOND_TO_SIZE: usize = 3;

pub const BOND_ORDER_START: usize = BOND_TO_START + BOND_TO_SIZE;
pub const BOND_ORDER_SIZE: usize = 3;

//pipeline defaults
pub const DEFAULT_WORKERS: usize = 24;
pub const DEFAULT_QUEUE_FACTOR: usize = 4;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const MIN_CHIRAL_CENTERS: usize = 3;

pub const INDEX_EXTENSION: &str = "index";
pub const CHECKPOINT_EXTENSION: &str = "progress";
