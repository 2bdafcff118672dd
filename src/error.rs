//! Error types for the PDF compiler library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the PDF compiler library
#[derive(Error, Debug)]
pub enum Error {
    /// An operation needed a selected entry and got none, or a stale index
    #[error("{}", describe_selection(.index, .len))]
    Selection { index: Option<usize>, len: usize },

    /// Compile requested with fewer than two files
    #[error("Add 2 or more files to merge ({count} in the list)")]
    InsufficientFiles { count: usize },

    /// Save destination was cancelled or left empty
    #[error("No destination selected")]
    NoDestination,

    /// A merge is already in flight
    #[error("A merge is already running")]
    AlreadyRunning,

    /// An input could not be opened or parsed as PDF
    #[error("AppendError: {} ({reason})", .path.display())]
    Append { path: PathBuf, reason: String },

    /// The output could not be written
    #[error("WriteError: {} ({reason})", .path.display())]
    Write { path: PathBuf, reason: String },

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// General error
    #[error("{0}")]
    General(String),
}

/// Rows are numbered from 1 in messages, as front ends show them
fn describe_selection(index: &Option<usize>, len: &usize) -> String {
    match index {
        Some(i) => format!("Entry {} is not in the list ({} entries)", i + 1, len),
        None => "No file selected".to_string(),
    }
}

impl Error {
    /// Errors that are caught before a merge starts and never reach the worker
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Selection { .. }
                | Error::InsufficientFiles { .. }
                | Error::NoDestination
                | Error::AlreadyRunning
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_error_names_the_file() {
        let err = Error::Append {
            path: PathBuf::from("missing.pdf"),
            reason: "File not found".to_string(),
        };
        assert_eq!(err.to_string(), "AppendError: missing.pdf (File not found)");
        assert!(!err.is_validation());
    }

    #[test]
    fn test_validation_errors() {
        assert!(Error::NoDestination.is_validation());
        assert!(Error::InsufficientFiles { count: 1 }.is_validation());
        assert!(Error::Selection { index: None, len: 2 }.is_validation());
        assert!(!Error::General("boom".to_string()).is_validation());
    }

    #[test]
    fn test_selection_messages() {
        let none = Error::Selection { index: None, len: 2 };
        assert_eq!(none.to_string(), "No file selected");

        let stale = Error::Selection { index: Some(4), len: 2 };
        assert_eq!(stale.to_string(), "Entry 5 is not in the list (2 entries)");
    }
}
