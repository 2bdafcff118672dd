//! The object a front end drives
//!
//! A [`CompileSession`] owns the document list and the merge coordinator.
//! While a merge runs every mutating call is refused, which is how the
//! session disables the front end's add/remove/move/clear/compile controls.
//! Front ends call [`CompileSession::pump`] whenever they are idle and show
//! the returned [`Notification`]s.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use crate::config::CompilerConfig;
use crate::coordinator::{CoordinatorEvent, MergeCoordinator, MergeOutcome, MergeRequest};
use crate::error::{Error, Result};
use crate::list::{EntryId, OrderedDocumentList};
use crate::pdf::{LopdfBackend, MergeBackend};

/// Something to show the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Transient status line text
    Status(String),
    /// The merge wrote this file
    Success(PathBuf),
    /// The merge failed with this message
    Failure(String),
}

pub struct CompileSession {
    list: OrderedDocumentList,
    coordinator: MergeCoordinator,
    config: CompilerConfig,
}

impl CompileSession {
    /// Session merging with lopdf
    pub fn new(config: CompilerConfig) -> Self {
        Self::with_backend(config, Arc::new(LopdfBackend))
    }

    pub fn with_backend(config: CompilerConfig, backend: Arc<dyn MergeBackend>) -> Self {
        Self {
            list: OrderedDocumentList::new(),
            coordinator: MergeCoordinator::new(backend).with_progress(config.report_progress),
            config,
        }
    }

    pub fn list(&self) -> &OrderedDocumentList {
        &self.list
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Whether a merge is in flight and mutations are disabled
    pub fn is_busy(&self) -> bool {
        self.coordinator.is_running()
    }

    /// Whether the compile control should be enabled
    pub fn can_compile(&self) -> bool {
        !self.is_busy() && self.list.can_merge()
    }

    pub fn add<I, P>(&mut self, paths: I) -> Result<usize>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.ensure_idle()?;
        Ok(self.list.add(paths))
    }

    /// Remove the selected entry
    pub fn remove(&mut self, selection: Option<usize>) -> Result<()> {
        let index = self.selected(selection)?;
        self.list.remove(index)?;
        Ok(())
    }

    pub fn move_up(&mut self, selection: Option<usize>) -> Result<bool> {
        let index = self.selected(selection)?;
        self.list.move_up(index)
    }

    pub fn move_down(&mut self, selection: Option<usize>) -> Result<bool> {
        let index = self.selected(selection)?;
        self.list.move_down(index)
    }

    /// Resolve a row id captured by a per-row control to its current index
    pub fn index_of(&self, id: EntryId) -> Option<usize> {
        self.list.position(id)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.list.clear();
        Ok(())
    }

    /// Start merging the current list into `destination`
    ///
    /// `None` or an empty path means the save dialog was cancelled; that is
    /// reported as [`Error::NoDestination`] and nothing changes.
    pub fn compile(&mut self, destination: Option<&Path>) -> Result<MergeRequest> {
        self.coordinator.start(&self.list, destination)
    }

    /// Drain worker messages without blocking
    pub fn pump(&mut self) -> Vec<Notification> {
        let events = self.coordinator.poll();
        self.handle(events)
    }

    /// Block until the running merge is over
    pub fn wait(&mut self) -> Vec<Notification> {
        let events = self.coordinator.wait();
        self.handle(events)
    }

    fn handle(&mut self, events: Vec<CoordinatorEvent>) -> Vec<Notification> {
        events
            .into_iter()
            .map(|event| match event {
                CoordinatorEvent::Progress { current, total, name } => {
                    Notification::Status(format!("Processing {current}/{total}: {name}..."))
                }
                CoordinatorEvent::Finalizing => {
                    Notification::Status("Finalizing and saving the file...".to_string())
                }
                CoordinatorEvent::Finished(MergeOutcome::Success(destination)) => {
                    if self.config.clear_on_success {
                        debug!("clearing list after successful merge");
                        self.list.clear();
                    }
                    Notification::Success(destination)
                }
                CoordinatorEvent::Finished(MergeOutcome::Failure(message)) => {
                    Notification::Failure(message)
                }
            })
            .collect()
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_busy() {
            Err(Error::AlreadyRunning)
        } else {
            Ok(())
        }
    }

    fn selected(&self, selection: Option<usize>) -> Result<usize> {
        self.ensure_idle()?;
        selection.ok_or(Error::Selection {
            index: None,
            len: self.list.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::DocumentMerger;
    use std::sync::{Barrier, Mutex};

    /// Appends succeed unless the path contains "missing"; optional gate
    /// holds the first append until the test releases it
    #[derive(Default)]
    struct FakeBackend {
        gate: Option<Arc<Barrier>>,
        written: Arc<Mutex<Vec<PathBuf>>>,
    }

    struct FakeMerger {
        gate: Option<Arc<Barrier>>,
        written: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl MergeBackend for FakeBackend {
        fn create_merger(&self) -> Box<dyn DocumentMerger> {
            Box::new(FakeMerger {
                gate: self.gate.clone(),
                written: Arc::clone(&self.written),
            })
        }
    }

    impl DocumentMerger for FakeMerger {
        fn append(&mut self, path: &Path) -> Result<()> {
            if let Some(gate) = self.gate.take() {
                gate.wait();
            }
            if path.to_string_lossy().contains("missing") {
                return Err(Error::Append {
                    path: path.to_path_buf(),
                    reason: "file not found".to_string(),
                });
            }
            Ok(())
        }

        fn write(&mut self, destination: &Path) -> Result<()> {
            self.written.lock().unwrap().push(destination.to_path_buf());
            Ok(())
        }
    }

    fn session(config: CompilerConfig, backend: FakeBackend) -> CompileSession {
        CompileSession::with_backend(config, Arc::new(backend))
    }

    #[test]
    fn test_success_clears_list() {
        let backend = FakeBackend::default();
        let written = Arc::clone(&backend.written);
        let mut session = session(CompilerConfig::default(), backend);
        session.add(["a.pdf", "b.pdf"]).unwrap();

        session.compile(Some(Path::new("out.pdf"))).unwrap();
        let notifications = session.wait();

        assert_eq!(
            notifications.last(),
            Some(&Notification::Success(PathBuf::from("out.pdf")))
        );
        assert_eq!(
            notifications.first(),
            Some(&Notification::Status("Processing 1/2: a.pdf...".to_string()))
        );
        assert!(session.list().is_empty());
        assert!(!session.is_busy());
        assert_eq!(*written.lock().unwrap(), vec![PathBuf::from("out.pdf")]);
    }

    #[test]
    fn test_keep_list_on_success() {
        let config = CompilerConfig {
            clear_on_success: false,
            report_progress: false,
        };
        let mut session = session(config, FakeBackend::default());
        session.add(["a.pdf", "b.pdf"]).unwrap();

        session.compile(Some(Path::new("out.pdf"))).unwrap();
        let notifications = session.wait();

        assert_eq!(
            notifications,
            vec![
                Notification::Status("Finalizing and saving the file...".to_string()),
                Notification::Success(PathBuf::from("out.pdf")),
            ]
        );
        assert_eq!(session.list().len(), 2);
    }

    #[test]
    fn test_failure_leaves_list_for_retry() {
        let mut session = session(CompilerConfig::default(), FakeBackend::default());
        session.add(["a.pdf", "missing.pdf"]).unwrap();

        session.compile(Some(Path::new("out.pdf"))).unwrap();
        let failures: Vec<_> = session
            .wait()
            .into_iter()
            .filter(|n| matches!(n, Notification::Failure(_)))
            .collect();

        assert_eq!(failures.len(), 1);
        assert_eq!(session.list().snapshot(), vec![PathBuf::from("a.pdf"), PathBuf::from("missing.pdf")]);

        // Fix the list and retry
        session.remove(Some(1)).unwrap();
        session.add(["b.pdf"]).unwrap();
        session.compile(Some(Path::new("out.pdf"))).unwrap();
        assert!(matches!(session.wait().last(), Some(Notification::Success(_))));
    }

    #[test]
    fn test_mutations_refused_while_running() {
        let gate = Arc::new(Barrier::new(2));
        let backend = FakeBackend {
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        };
        let mut session = session(CompilerConfig::default(), backend);
        session.add(["a.pdf", "b.pdf"]).unwrap();
        session.compile(Some(Path::new("out.pdf"))).unwrap();

        assert!(session.is_busy());
        assert!(!session.can_compile());
        assert!(matches!(session.add(["c.pdf"]), Err(Error::AlreadyRunning)));
        assert!(matches!(session.remove(Some(0)), Err(Error::AlreadyRunning)));
        assert!(matches!(session.move_down(Some(0)), Err(Error::AlreadyRunning)));
        assert!(matches!(session.clear(), Err(Error::AlreadyRunning)));
        assert!(matches!(
            session.compile(Some(Path::new("again.pdf"))),
            Err(Error::AlreadyRunning)
        ));
        assert_eq!(session.list().len(), 2);

        gate.wait();
        session.wait();
        assert!(!session.is_busy());
        assert!(session.add(["c.pdf"]).is_ok());
    }

    #[test]
    fn test_nothing_selected() {
        let mut session = session(CompilerConfig::default(), FakeBackend::default());
        session.add(["a.pdf", "b.pdf"]).unwrap();

        assert!(matches!(
            session.remove(None),
            Err(Error::Selection { index: None, len: 2 })
        ));
        assert!(session.move_up(None).is_err());
        assert_eq!(session.list().len(), 2);
    }

    #[test]
    fn test_row_ids_survive_reordering() {
        let mut session = session(CompilerConfig::default(), FakeBackend::default());
        session.add(["a.pdf", "b.pdf", "c.pdf"]).unwrap();
        let ids: Vec<EntryId> = session.list().iter().map(|e| e.id()).collect();

        // The "up" button on row c was built when c sat at index 2
        session.move_up(session.index_of(ids[2])).unwrap();
        session.move_up(session.index_of(ids[2])).unwrap();
        assert_eq!(session.index_of(ids[2]), Some(0));

        session.remove(session.index_of(ids[0])).unwrap();
        assert_eq!(
            session.list().snapshot(),
            vec![PathBuf::from("c.pdf"), PathBuf::from("b.pdf")]
        );
        assert!(session.remove(session.index_of(ids[0])).is_err());
    }

    #[test]
    fn test_cancelled_destination_changes_nothing() {
        let mut session = session(CompilerConfig::default(), FakeBackend::default());
        session.add(["a.pdf", "b.pdf"]).unwrap();

        assert!(matches!(session.compile(None), Err(Error::NoDestination)));
        assert!(!session.is_busy());
        assert!(session.pump().is_empty());
        assert_eq!(session.list().len(), 2);
    }
}
