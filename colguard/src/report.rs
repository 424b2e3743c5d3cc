//! Operation outcome reported to the user.

use std::fmt;

/// Result of one user-facing operation.
///
/// Operations catch their own failures and describe them here, so the
/// process keeps running and its exit status stays the same either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub operation: String,
    pub success: bool,
    pub status: String,
}

impl Report {
    #[must_use]
    pub fn succeeded(operation: impl Into<String>, status: impl Into<String>) -> Self {
        Self { operation: operation.into(), success: true, status: status.into() }
    }

    #[must_use]
    pub fn failed(operation: impl Into<String>, status: impl Into<String>) -> Self {
        Self { operation: operation.into(), success: false, status: status.into() }
    }

    /// Prints the status line to stdout.
    pub fn print(&self) {
        println!("{self}");
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.success { "succeeded" } else { "failed" };
        write!(f, "{} {outcome} : {}", self.operation, self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_line() {
        let report = Report::succeeded("Create Access Record", "1 access record(s) created");
        assert_eq!(report.to_string(), "Create Access Record succeeded : 1 access record(s) created");

        let report = Report::failed("Read Personnel Records", "denied");
        assert_eq!(report.to_string(), "Read Personnel Records failed : denied");
    }
}
