//! Concurrent, resumable construction of the offset index.
//!
//! Three roles are connected by two bounded queues:
//!
//! * one scanner walks the source file on a blocking thread, checkpoints every record it hands
//!   out and blocks when the task queue is full;
//! * a fixed pool of workers parses each record, hydrogenates it and runs the detection engine
//!   under a per-record deadline, forwarding qualifying offsets to the result queue;
//! * one writer drains the result queue into the index file.
//!
//! The index lists offsets in completion order, not source order. A run that finds a parseable
//! checkpoint resumes strictly after the checkpointed offset and appends to the existing index,
//! skipping offsets that are already there.

use crate::cancel::CancelToken;
use crate::checkpoint::{load_resume_offset, Checkpoint};
use crate::chiral::chiral_centers_with;
use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::hydrogen::hydrogenate;
use crate::sdf::{parse_mol_block, Record, RecordReader};
use kdam::tqdm;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Index lines written between two syncs to disk.
const INDEX_SYNC_STRIDE: u64 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Scanning,
    Draining,
    Flushing,
    Done,
}

/// What one run of [`build_index`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub index: PathBuf,
    pub scanned: u64,
    pub dispatched: u64,
    pub skipped_by_resume: u64,
    pub parse_failures: u64,
    pub timeouts: u64,
    pub written: u64,
    pub duplicates: u64,
}

#[derive(Debug)]
struct Task {
    offset: u64,
    text: String,
}

#[derive(Debug, Default)]
struct ScanTally {
    scanned: u64,
    dispatched: u64,
    skipped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    parse_failures: AtomicU64,
    timeouts: AtomicU64,
}

#[derive(Debug, Default)]
struct WriteTally {
    written: u64,
    duplicates: u64,
}

fn transition(from: PipelineState, to: PipelineState) -> PipelineState {

    info!("pipeline {:?} -> {:?}", from, to);

    return to;
}

/// Builds the index for `source` with default settings.
pub async fn build_index(source: &Path, index: &Path, checkpoint: &Path) -> Result<BuildSummary> {

    let config = IndexConfig::new(source, index, checkpoint);
    build_index_with_config(&config).await
}

pub async fn build_index_with_config(config: &IndexConfig) -> Result<BuildSummary> {

    let config = config.clone().clamped();
    let mut state = PipelineState::Idle;

    let resume = load_resume_offset(&config.checkpoint)?;
    match resume {
        Some(offset) => info!("resuming {:?} after offset {}", config.source, offset),
        None => info!("fresh run over {:?}", config.source),
    }

    let source = File::open(&config.source)?;
    let (index_file, existing) = open_index(&config.index, resume)?;
    let checkpoint = Checkpoint::open(&config.checkpoint)?;

    let capacity = config.queue_capacity();
    let (task_tx, task_rx) = mpsc::channel::<Task>(capacity);
    let (result_tx, result_rx) = mpsc::channel::<u64>(capacity);
    let task_rx = Arc::new(Mutex::new(task_rx));
    let counters = Arc::new(Counters::default());

    let writer = tokio::spawn(write_results(result_rx, index_file, existing));

    let mut workers = Vec::with_capacity(config.workers);
    for id in 0..config.workers {
        workers.push(tokio::spawn(work(
            id,
            task_rx.clone(),
            result_tx.clone(),
            counters.clone(),
            config.timeout(),
            config.min_chiral_centers,
        )));
    }

    //workers hold the only receivers and senders from here on, so a stopped pool unblocks the
    //scanner and a stopped writer stops the pool
    drop(task_rx);
    drop(result_tx);

    state = transition(state, PipelineState::Scanning);
    let progress = config.progress;
    let scanned = tokio::task::spawn_blocking(move || scan(source, checkpoint, resume, task_tx, progress)).await;

    //the scanner owned the only task sender, so the queue is closed now whether or not it failed
    state = transition(state, PipelineState::Draining);
    let mut worker_failure = None;
    for worker in workers {
        if let Err(e) = worker.await {
            worker_failure.get_or_insert(e);
        }
    }

    state = transition(state, PipelineState::Flushing);
    let written = writer.await;

    //a failed writer is the root cause of a scanner that lost its workers
    let written = match written {
        Ok(Ok(written)) => written,
        Ok(Err(e)) => {
            error!("index writer failed: {}", e);
            return Err(e);
        },
        Err(e) => return Err(e.into()),
    };

    let tally = match scanned {
        Ok(Ok(tally)) => tally,
        Ok(Err(e)) => {
            error!("scanner failed: {}", e);
            return Err(e);
        },
        Err(e) => return Err(e.into()),
    };

    if let Some(e) = worker_failure {
        return Err(e.into());
    }

    transition(state, PipelineState::Done);

    let summary = BuildSummary {
        index: config.index.clone(),
        scanned: tally.scanned,
        dispatched: tally.dispatched,
        skipped_by_resume: tally.skipped,
        parse_failures: counters.parse_failures.load(Ordering::Relaxed),
        timeouts: counters.timeouts.load(Ordering::Relaxed),
        written: written.written,
        duplicates: written.duplicates,
    };

    info!("{:?}", summary);

    return Ok(summary);
}

/// A fresh run truncates the index. A resumed run keeps it, drops a partial last line left by an
/// interrupted write, and returns the offsets already present.
fn open_index(path: &Path, resume: Option<u64>) -> Result<(File, HashSet<u64>)> {

    if resume.is_none() {
        return Ok((File::create(path)?, HashSet::new()));
    }

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;

    let bytes = std::fs::read(path)?;
    let complete = match bytes.iter().rposition(|b| *b == b'\n') {
        Some(i) => i + 1,
        None => 0,
    };

    if complete < bytes.len() {
        warn!("dropping partial last line of {:?}", path);
        file.set_len(complete as u64)?;
    }

    let mut existing: HashSet<u64> = HashSet::new();
    for line in String::from_utf8_lossy(&bytes[..complete]).lines() {

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed.parse::<u64>() {
            Ok(offset) => { existing.insert(offset); },
            Err(_) => warn!("ignoring unparseable index line in {:?}: {:?}", path, trimmed),
        }
    }

    debug!("{} offsets already in {:?}", existing.len(), path);

    return Ok((file, existing));
}

fn scan(source: File, mut checkpoint: Checkpoint, resume: Option<u64>, tasks: mpsc::Sender<Task>, progress: bool) -> Result<ScanTally> {

    let reader = RecordReader::new(BufReader::new(source));
    let records: Box<dyn Iterator<Item = std::io::Result<Record>>> = match progress {
        true => Box::new(tqdm!(reader, desc = "scanning", unit = " records")),
        false => Box::new(reader),
    };

    let mut tally = ScanTally::default();

    for record in records {

        let record = record?;
        tally.scanned += 1;

        let already_done = match resume {
            Some(resume) => record.offset <= resume,
            None => false,
        };

        if already_done {
            tally.skipped += 1;
            continue;
        }

        let offset = record.offset;
        let task = Task { offset, text: record.text };

        if tasks.blocking_send(task).is_err() {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "worker pool stopped before the scan finished").into());
        }

        tally.dispatched += 1;
        checkpoint.record(offset)?;
    }

    debug!("scanner done, last checkpoint {:?} in {:?}", checkpoint.last(), checkpoint.path());

    Ok(tally)
}

fn detect(text: &str, token: &CancelToken) -> Result<Vec<usize>> {

    let mut mol = parse_mol_block(text)?;
    hydrogenate(&mut mol);

    chiral_centers_with(&mut mol, token)
}

async fn work(
    id: usize,
    tasks: Arc<Mutex<mpsc::Receiver<Task>>>,
    results: mpsc::Sender<u64>,
    counters: Arc<Counters>,
    timeout: Duration,
    min_centers: usize,
) {

    loop {

        let task = {
            let mut tasks = tasks.lock().await;
            tasks.recv().await
        };

        let task = match task {
            Some(task) => task,
            None => break,
        };

        let offset = task.offset;
        let token = CancelToken::with_timeout(timeout);
        let detect_token = token.clone();
        let text = task.text;

        let mut handle = tokio::task::spawn_blocking(move || detect(&text, &detect_token));

        //on timeout the engine is told to stop and the worker waits for it to unwind
        let outcome = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                token.cancel();
                handle.await
            }
        };

        match outcome {
            Ok(Ok(centers)) => {
                if centers.len() >= min_centers && results.send(offset).await.is_err() {
                    error!("worker {}: result queue closed, stopping", id);
                    break;
                }
            },
            Ok(Err(Error::Cancelled)) => {
                counters.timeouts.fetch_add(1, Ordering::Relaxed);
                warn!("record at offset {} timed out after {:?}, skipping", offset, timeout);
            },
            Ok(Err(e)) => {
                counters.parse_failures.fetch_add(1, Ordering::Relaxed);
                debug!("skipping record at offset {}: {}", offset, e);
            },
            Err(e) => {
                counters.parse_failures.fetch_add(1, Ordering::Relaxed);
                error!("worker {}: detection for offset {} panicked: {}", id, offset, e);
            },
        }
    }

    debug!("worker {} exiting", id);
}

async fn write_results(mut results: mpsc::Receiver<u64>, file: File, mut seen: HashSet<u64>) -> Result<WriteTally> {

    let mut writer = BufWriter::new(file);
    let mut tally = WriteTally::default();

    while let Some(offset) = results.recv().await {

        match seen.insert(offset) {
            true => {
                //every line reaches the file before the next result is taken, so a killed run
                //loses at most the results still queued
                writeln!(writer, "{}", offset)?;
                writer.flush()?;
                tally.written += 1;

                if tally.written % INDEX_SYNC_STRIDE == 0 {
                    writer.get_ref().sync_data()?;
                }
            },
            false => {
                debug!("offset {} already indexed", offset);
                tally.duplicates += 1;
            },
        }
    }

    writer.flush()?;
    writer.get_ref().sync_data()?;

    Ok(tally)
}
