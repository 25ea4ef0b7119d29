//! Classification of raw progress status codes.
//!
//! The CI/CD API reports progress as a numeric string code plus a label:
//! `0` pending, `1` running, `2` successful, `3` failed, `4` canceled.
//! Labels vary between releases ("success" vs "Successful"), so either half
//! of the pair is enough to recognise a terminal state.

/// Status code reported once an operation has succeeded.
pub const SUCCESS_CODE: &str = "2";

/// Status code reported once an operation has failed.
pub const FAILED_CODE: &str = "3";

/// Status code reported once an operation has been canceled.
pub const CANCELED_CODE: &str = "4";

/// Whether an operation is still running or has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Not terminal, keep polling.
    Pending,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error or was canceled.
    Failed,
}

impl StatusClass {
    /// Classify a raw status code / label pair.
    #[must_use]
    pub fn classify(code: &str, label: &str) -> Self {
        let code = code.trim();
        let label = label.trim().to_ascii_lowercase();

        if code == SUCCESS_CODE || matches!(label.as_str(), "success" | "successful") {
            Self::Succeeded
        } else if code == FAILED_CODE
            || code == CANCELED_CODE
            || matches!(
                label.as_str(),
                "failed" | "failure" | "canceled" | "cancelled"
            )
        {
            Self::Failed
        } else {
            Self::Pending
        }
    }

    /// Whether no further polling is meaningful.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for StatusClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_by_code_or_label() {
        assert_eq!(StatusClass::classify("2", "success"), StatusClass::Succeeded);
        assert_eq!(StatusClass::classify("2", ""), StatusClass::Succeeded);
        assert_eq!(
            StatusClass::classify("", "Successful"),
            StatusClass::Succeeded
        );
    }

    #[test]
    fn test_failure_codes() {
        assert_eq!(StatusClass::classify("3", "Failed"), StatusClass::Failed);
        assert_eq!(StatusClass::classify("4", "Canceled"), StatusClass::Failed);
        assert_eq!(StatusClass::classify("9", "failure"), StatusClass::Failed);
    }

    #[test]
    fn test_intermediate_statuses_keep_polling() {
        assert_eq!(StatusClass::classify("0", "Pending"), StatusClass::Pending);
        assert_eq!(StatusClass::classify("1", "Running"), StatusClass::Pending);
        assert_eq!(StatusClass::classify("", ""), StatusClass::Pending);
        assert!(!StatusClass::Pending.is_terminal());
        assert!(StatusClass::Succeeded.is_terminal());
        assert!(StatusClass::Failed.is_terminal());
    }
}
