//! Behaviour switches for a compile session

/// Options for a [`CompileSession`](crate::session::CompileSession)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Empty the document list after a successful merge
    pub clear_on_success: bool,
    /// Post a status message before each file is appended
    pub report_progress: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            clear_on_success: true,
            report_progress: true,
        }
    }
}
