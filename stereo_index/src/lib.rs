//! Stereocenter detection over large MDL record files, and an offset index of the records worth
//! keeping.
//!
//! The detection engine finds tetrahedral carbons whose four substituents are pairwise distinct,
//! using a bounded-depth structural comparison of branches. The indexing pipeline streams a
//! multi-gigabyte record file through a pool of workers and writes the byte offset of every record
//! with at least three stereocenters, checkpointing as it goes so an interrupted run can resume.
//! The store reads single records back by offset, including at random, which is what the
//! challenge server is built on.
//!
//! Rough layout:
//! - `molecule`, `hydrogen`, `chiral`: graph model and detection engine
//! - `sdf`: V2000 record text in and out, record splitting with byte offsets
//! - `store`, `checkpoint`, `pipeline`, `config`: the index and how it is built
//! - `challenge`: grid challenges over a molecule's stereocenters
pub mod error;
pub mod layout;
pub mod molecule;
pub mod hydrogen;
pub mod cancel;
pub mod chiral;
pub mod sdf;
pub mod store;
pub mod checkpoint;
pub mod config;
pub mod pipeline;
pub mod challenge;

#[cfg(test)]
mod fixtures;
