//! Background processing queue.
//!
//! A fixed pool of worker threads pulls submission ids off an mpsc channel
//! and runs each through the processor. Workers open their own database
//! connection, so runs on different submissions proceed independently; the
//! claim pattern in the repository layer makes a duplicate enqueue of the
//! same id harmless.
//!
//! Dropping the queue closes the channel and joins the workers, so queued
//! work drains before shutdown.

use std::path::PathBuf;
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use uuid::Uuid;

use crate::db::sqlite::open_database;
use crate::db::DatabaseError;
use crate::pipeline::SubmissionProcessor;

pub struct ProcessingQueue {
    sender: Option<Sender<Uuid>>,
    workers: Vec<JoinHandle<()>>,
}

impl ProcessingQueue {
    /// Spawn `worker_count` threads, each with its own connection to the
    /// database at `db_path`.
    pub fn start(
        db_path: PathBuf,
        processor: SubmissionProcessor,
        worker_count: usize,
    ) -> Result<Self, DatabaseError> {
        let (sender, receiver) = channel::<Uuid>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            // Opening up front surfaces a bad path at startup, not on the
            // first enqueue.
            let conn = open_database(&db_path)?;
            let receiver = Arc::clone(&receiver);
            let processor = processor.clone();

            workers.push(std::thread::spawn(move || {
                tracing::info!(worker_id, "processing worker started");
                let mut conn = conn;
                loop {
                    let job = match receiver.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };
                    match job {
                        Ok(submission_id) => {
                            tracing::debug!(worker_id, %submission_id, "picked up submission");
                            processor.process(&mut conn, submission_id);
                        }
                        // Channel closed: queue dropped, drain is complete.
                        Err(_) => break,
                    }
                }
                tracing::info!(worker_id, "processing worker shutting down");
            }));
        }

        tracing::info!(workers = worker_count, "processing queue started");
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Enqueue a submission for processing. Safe to call with an id that is
    /// already queued or already processed.
    pub fn submit(&self, submission_id: Uuid) -> bool {
        match &self.sender {
            Some(sender) => sender.send(submission_id).is_ok(),
            None => false,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for ProcessingQueue {
    fn drop(&mut self) {
        // Closing the channel lets workers finish the backlog and exit.
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
