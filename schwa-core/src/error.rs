use thiserror::Error;

use crate::diagnostic::Diagnostic;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("compilation failed with {count} error(s)")]
    Rejected {
        count: usize,
        diagnostics: Vec<Diagnostic>,
    },
}

impl CoreError {
    /// Diagnostics recorded before the pipeline halted, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CoreError::Rejected { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}
