//! Runs one merge at a time on a worker thread
//!
//! The coordinator is owned by the interactive thread. Starting a merge
//! freezes the document list into a [`MergeRequest`] and hands it to a fresh
//! worker thread; the worker reports back only through a channel, which the
//! interactive thread drains with [`MergeCoordinator::poll`] or
//! [`MergeCoordinator::wait`]. Events arrive in the order they were posted.
//!
//! There is no cancellation: a running merge finishes or fails on its own.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};
use crate::error::{Error, Result};
use crate::list::{display_name, OrderedDocumentList};
use crate::pdf::{DocumentMerger, MergeBackend};

/// Frozen input of one merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    paths: Vec<PathBuf>,
    destination: PathBuf,
}

impl MergeRequest {
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Result of one merge, produced exactly once per accepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Success(PathBuf),
    Failure(String),
}

impl MergeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MergeOutcome::Success(_))
    }
}

/// Message posted by the worker to the interactive thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// About to append file `current` (1-based) of `total`
    Progress {
        current: usize,
        total: usize,
        name: String,
    },
    /// All inputs appended, writing the output
    Finalizing,
    /// The merge is over; the coordinator is idle again
    Finished(MergeOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Running,
}

struct RunningMerge {
    events: Receiver<CoordinatorEvent>,
    worker: JoinHandle<()>,
}

/// Owner of the single in-flight merge
pub struct MergeCoordinator {
    backend: Arc<dyn MergeBackend>,
    report_progress: bool,
    running: Option<RunningMerge>,
}

impl MergeCoordinator {
    pub fn new(backend: Arc<dyn MergeBackend>) -> Self {
        Self {
            backend,
            report_progress: true,
            running: None,
        }
    }

    /// Whether the worker posts a [`CoordinatorEvent::Progress`] per file
    pub fn with_progress(mut self, report_progress: bool) -> Self {
        self.report_progress = report_progress;
        self
    }

    pub fn state(&self) -> CoordinatorState {
        if self.running.is_some() {
            CoordinatorState::Running
        } else {
            CoordinatorState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Validate, snapshot `list` and start merging it into `destination`
    ///
    /// Rejected without side effects when a merge is already running, when the
    /// list has fewer than two entries, or when no destination was chosen.
    pub fn start(
        &mut self,
        list: &OrderedDocumentList,
        destination: Option<&Path>,
    ) -> Result<MergeRequest> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        if !list.can_merge() {
            return Err(Error::InsufficientFiles { count: list.len() });
        }
        let destination = match destination {
            Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
            _ => return Err(Error::NoDestination),
        };

        let request = MergeRequest {
            paths: list.snapshot(),
            destination,
        };

        let (sender, events) = mpsc::channel();
        let backend = Arc::clone(&self.backend);
        let report_progress = self.report_progress;
        let job = request.clone();
        let worker = thread::Builder::new()
            .name("pdf-merge".to_string())
            .spawn(move || run_merge(backend.as_ref(), &job, report_progress, &sender))?;

        info!(
            files = request.paths.len(),
            destination = %request.destination.display(),
            "merge started"
        );
        self.running = Some(RunningMerge { events, worker });
        Ok(request)
    }

    /// Drain whatever the worker has posted so far without blocking
    pub fn poll(&mut self) -> Vec<CoordinatorEvent> {
        self.drain(false)
    }

    /// Block until the running merge finishes, returning every event posted
    ///
    /// Returns immediately with no events when idle.
    pub fn wait(&mut self) -> Vec<CoordinatorEvent> {
        self.drain(true)
    }

    fn drain(&mut self, block: bool) -> Vec<CoordinatorEvent> {
        let mut events = Vec::new();
        let Some(running) = self.running.as_ref() else {
            return events;
        };

        let mut finished = false;
        let mut lost = false;
        loop {
            let next = if block {
                running.events.recv().map_err(|_| TryRecvError::Disconnected)
            } else {
                running.events.try_recv()
            };
            match next {
                Ok(event) => {
                    finished = matches!(event, CoordinatorEvent::Finished(_));
                    events.push(event);
                    if finished {
                        break;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    lost = true;
                    break;
                }
            }
        }

        if !(finished || lost) {
            return events;
        }

        if let Some(running) = self.running.take() {
            let joined = running.worker.join();
            if lost {
                // The worker went away without reporting, so it panicked
                let reason = match joined {
                    Err(payload) => panic_message(payload),
                    Ok(()) => "worker stopped without a result".to_string(),
                };
                warn!(%reason, "merge worker failed");
                events.push(CoordinatorEvent::Finished(MergeOutcome::Failure(format!(
                    "Merge failed: {reason}"
                ))));
            }
        }
        events
    }
}

impl Drop for MergeCoordinator {
    fn drop(&mut self) {
        // Let an in-flight merge finish so its output is complete
        if let Some(running) = self.running.take() {
            drop(running.events);
            let _ = running.worker.join();
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Worker body: merge, then post exactly one `Finished`
///
/// Posts are fire-and-forget; a receiver that has gone away is not an error.
fn run_merge(
    backend: &dyn MergeBackend,
    request: &MergeRequest,
    report_progress: bool,
    events: &Sender<CoordinatorEvent>,
) {
    let mut merger = backend.create_merger();
    let result = merge_into(merger.as_mut(), request, report_progress, events);
    merger.close();

    let outcome = match result {
        Ok(()) => {
            info!(destination = %request.destination.display(), "merge finished");
            MergeOutcome::Success(request.destination.clone())
        }
        Err(e) => {
            warn!(error = %e, "merge failed");
            MergeOutcome::Failure(e.to_string())
        }
    };
    let _ = events.send(CoordinatorEvent::Finished(outcome));
}

fn merge_into(
    merger: &mut dyn DocumentMerger,
    request: &MergeRequest,
    report_progress: bool,
    events: &Sender<CoordinatorEvent>,
) -> Result<()> {
    let total = request.paths.len();
    for (i, path) in request.paths.iter().enumerate() {
        if report_progress {
            let _ = events.send(CoordinatorEvent::Progress {
                current: i + 1,
                total,
                name: display_name(path),
            });
        }
        debug!(path = %path.display(), "appending");
        // First failure aborts the rest; nothing has been written yet
        merger.append(path)?;
    }

    let _ = events.send(CoordinatorEvent::Finalizing);
    merger.write(&request.destination)
}
