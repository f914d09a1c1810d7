//! Background worker
//!
//! A single dedicated thread running a current-thread tokio runtime. Stream
//! resolution and retry delays run one at a time, in submission order, so
//! transport commands on the UI context never wait on network I/O. Play
//! history writes are spawned alongside and never block the job loop.
//!
//! Every resolve and delay carries the controller's generation at submission
//! time. When the controller moves on (new track, stop, shutdown) it
//! publishes a new generation and any matching in-flight job is abandoned.
//! Each of those jobs produces exactly one [`Reply`], `Cancelled` included.

use crate::error::{PlaybackError, Result};
use aria_core::{MediaId, PlayRecorder, StreamResolver, StreamSource, TrackId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

pub(crate) type Generation = u64;

/// Action run on the UI context once a delay elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DelayedAction {
    SkipNext,
}

#[derive(Debug)]
pub(crate) enum Job {
    Resolve {
        generation: Generation,
        media_id: MediaId,
    },
    Delay {
        generation: Generation,
        after: Duration,
        action: DelayedAction,
    },
    RecordPlay {
        track_id: TrackId,
    },
}

impl Job {
    fn expects_reply(&self) -> bool {
        !matches!(self, Self::RecordPlay { .. })
    }
}

#[derive(Debug)]
pub(crate) enum Reply {
    Resolved {
        generation: Generation,
        result: aria_core::Result<StreamSource>,
    },
    Elapsed {
        generation: Generation,
        action: DelayedAction,
    },
    Cancelled {
        generation: Generation,
    },
}

impl Reply {
    pub(crate) fn generation(&self) -> Generation {
        match self {
            Self::Resolved { generation, .. }
            | Self::Elapsed { generation, .. }
            | Self::Cancelled { generation } => *generation,
        }
    }
}

pub(crate) struct Worker {
    jobs: Option<mpsc::UnboundedSender<Job>>,
    generation: watch::Sender<Generation>,
    replies: Receiver<Reply>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(
        resolver: Arc<dyn StreamResolver>,
        recorder: Arc<dyn PlayRecorder>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PlaybackError::WorkerUnavailable(e.to_string()))?;

        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (generation_tx, generation_rx) = watch::channel(0);
        let (replies_tx, replies_rx) = unbounded();

        let thread = std::thread::Builder::new()
            .name("aria-worker".to_string())
            .spawn(move || {
                runtime.block_on(run(jobs_rx, generation_rx, replies_tx, resolver, recorder));
                tracing::debug!("Background worker stopped");
            })
            .map_err(|e| PlaybackError::WorkerUnavailable(e.to_string()))?;

        Ok(Self {
            jobs: Some(jobs_tx),
            generation: generation_tx,
            replies: replies_rx,
            thread: Some(thread),
        })
    }

    /// Queue a job; returns whether it will produce a reply
    pub(crate) fn submit(&self, job: Job) -> Result<bool> {
        let expects_reply = job.expects_reply();
        self.jobs
            .as_ref()
            .ok_or_else(|| PlaybackError::WorkerUnavailable("worker shut down".to_string()))?
            .send(job)
            .map_err(|_| PlaybackError::WorkerUnavailable("worker thread exited".to_string()))?;
        Ok(expects_reply)
    }

    /// Abandon every job tagged with an older generation
    pub(crate) fn set_generation(&self, generation: Generation) {
        self.generation.send_replace(generation);
    }

    pub(crate) fn replies(&self) -> &Receiver<Reply> {
        &self.replies
    }

    /// Stop accepting jobs and join the thread
    pub(crate) fn shutdown(&mut self) {
        let current = *self.generation.borrow();
        self.generation.send_replace(current.wrapping_add(1));
        self.jobs = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Background worker panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run(
    mut jobs: mpsc::UnboundedReceiver<Job>,
    generation: watch::Receiver<Generation>,
    replies: Sender<Reply>,
    resolver: Arc<dyn StreamResolver>,
    recorder: Arc<dyn PlayRecorder>,
) {
    while let Some(job) = jobs.recv().await {
        let reply = match job {
            Job::Resolve {
                generation: tag,
                media_id,
            } => {
                tracing::debug!(%media_id, "Resolving stream");
                tokio::select! {
                    result = resolver.resolve(&media_id) => Reply::Resolved { generation: tag, result },
                    () = superseded(generation.clone(), tag) => {
                        tracing::debug!(%media_id, "Stream resolution cancelled");
                        Reply::Cancelled { generation: tag }
                    }
                }
            }
            Job::Delay {
                generation: tag,
                after,
                action,
            } => {
                tokio::select! {
                    () = tokio::time::sleep(after) => Reply::Elapsed { generation: tag, action },
                    () = superseded(generation.clone(), tag) => Reply::Cancelled { generation: tag },
                }
            }
            Job::RecordPlay { track_id } => {
                let recorder = Arc::clone(&recorder);
                tokio::spawn(async move {
                    if let Err(e) = recorder.record_play(&track_id).await {
                        tracing::warn!(%track_id, error = %e, "Failed to record play");
                    }
                });
                continue;
            }
        };

        if replies.send(reply).is_err() {
            break;
        }
    }
}

/// Completes once the published generation differs from `tag`
async fn superseded(mut generation: watch::Receiver<Generation>, tag: Generation) {
    loop {
        if *generation.borrow_and_update() != tag {
            return;
        }
        if generation.changed().await.is_err() {
            return;
        }
    }
}
