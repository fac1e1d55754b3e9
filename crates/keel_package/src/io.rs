//! Background I/O worker pool
//!
//! Byte-range reads against one package file, serviced by named worker
//! threads so `begin_load`/`try_finish_load` never block on disk. Jobs
//! and completions travel over crossbeam channels; closing the job
//! channel shuts the workers down.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::request::RequestId;

/// One byte-range read against the package file.
pub(crate) struct IoJob {
    pub id: RequestId,
    pub offset: u64,
    pub len: u64,
}

/// Completion for one job. Errors are stringified so they can cross the
/// channel.
pub(crate) struct IoComplete {
    pub id: RequestId,
    pub result: Result<Vec<u8>, String>,
}

pub(crate) struct IoPool {
    jobs: Option<Sender<IoJob>>,
    completions: Receiver<IoComplete>,
    workers: Vec<JoinHandle<()>>,
}

impl IoPool {
    /// Spawn workers, each with its own handle to the package file.
    pub fn spawn(file_path: &Path, worker_count: usize) -> io::Result<Self> {
        let (job_tx, job_rx) = unbounded::<IoJob>();
        let (done_tx, done_rx) = unbounded::<IoComplete>();

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let jobs = job_rx.clone();
            let done = done_tx.clone();
            let mut file = File::open(file_path)?;
            let handle = thread::Builder::new()
                .name(format!("keel-pkg-io-{}", index))
                .spawn(move || {
                    for job in jobs.iter() {
                        let result =
                            read_range(&mut file, job.offset, job.len).map_err(|e| e.to_string());
                        if done.send(IoComplete { id: job.id, result }).is_err() {
                            break;
                        }
                    }
                })?;
            workers.push(handle);
        }

        Ok(Self {
            jobs: Some(job_tx),
            completions: done_rx,
            workers,
        })
    }

    /// Queue a read. Never blocks.
    pub fn submit(&self, job: IoJob) {
        if let Some(jobs) = &self.jobs {
            // Send only fails once the pool is shutting down.
            let _ = jobs.send(job);
        }
    }

    /// Take one finished read, if any.
    pub fn try_complete(&self) -> Option<IoComplete> {
        self.completions.try_recv().ok()
    }
}

impl Drop for IoPool {
    fn drop(&mut self) {
        // Closing the job channel ends each worker's job loop.
        self.jobs.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("package I/O worker panicked during shutdown");
            }
        }
    }
}

fn read_range(file: &mut File, offset: u64, len: u64) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buffer = vec![0u8; len as usize];
    file.read_exact(&mut buffer)?;
    Ok(buffer)
}
