//! PDF Compiler Library
//!
//! Keeps an ordered list of PDF files and merges them into one document on a
//! background thread, so the thread that owns the user interface never blocks.
//!
//! - [`list`]: the ordered selection and its edits (add, remove, move, clear)
//! - [`coordinator`]: at most one merge in flight, results posted back over a channel
//! - [`session`]: list + coordinator with edits locked while a merge runs
//! - [`pdf`]: the lopdf merge backend and page-count metadata
//!
//! # Example
//!
//! ```no_run
//! use pdf_compiler::{CompileSession, CompilerConfig, Notification};
//! use std::path::Path;
//!
//! let mut session = CompileSession::new(CompilerConfig::default());
//! session.add(["1. intro.pdf", "2. advanced.pdf"]).expect("idle session");
//! session.compile(Some(Path::new("merged.pdf"))).expect("Failed to start merge");
//!
//! for notification in session.wait() {
//!     match notification {
//!         Notification::Status(text) => println!("{text}"),
//!         Notification::Success(path) => println!("Saved {}", path.display()),
//!         Notification::Failure(message) => eprintln!("{message}"),
//!     }
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod list;
pub mod logging;
pub mod pdf;
pub mod session;

// Re-export commonly used items
pub use config::CompilerConfig;
pub use coordinator::{CoordinatorEvent, CoordinatorState, MergeCoordinator, MergeOutcome, MergeRequest};
pub use error::{Error, Result};
pub use list::{DocumentEntry, EntryId, OrderedDocumentList};
pub use session::{CompileSession, Notification};
