use serde::{Deserialize, Serialize};

/// Severity level of a recorded import issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single non-fatal problem found while importing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportIssue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

/// Partial-failure accounting for one import.
///
/// Nothing in here aborts the import; callers decide whether a non-zero
/// count deserves a user-visible warning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportDiagnostics {
    pub warning_count: usize,
    pub error_count: usize,
    pub issues: Vec<ImportIssue>,
}

impl ImportDiagnostics {
    pub fn warn(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(code, "{message}");
        self.warning_count += 1;
        self.issues.push(ImportIssue {
            severity: Severity::Warning,
            code: code.to_string(),
            message,
        });
    }

    pub fn error(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(code, "{message}");
        self.error_count += 1;
        self.issues.push(ImportIssue {
            severity: Severity::Error,
            code: code.to_string(),
            message,
        });
    }

    /// True when nothing at all was recorded.
    pub fn is_clean(&self) -> bool {
        self.warning_count == 0 && self.error_count == 0
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }
}
