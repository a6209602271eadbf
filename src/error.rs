//! Export error type.

use thiserror::Error;

/// Export precondition/validation failure.
///
/// Everything that can abort an export is a violated input precondition
/// (bad geometry, bad rig, format limits), so a single error kind with a
/// human-readable message covers all of them. No partial output is ever
/// committed: files are encoded fully in memory before any write.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ExportError(String);

impl ExportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

pub type Result<T, E = ExportError> = std::result::Result<T, E>;

/// Abort the export with a formatted [`ExportError`].
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::error::ExportError::new(format!($($arg)*)))
    };
}

pub(crate) use bail;
