/// Process exit codes.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const OPERATIONAL_FAILURE: i32 = 1;
    pub const PRECONDITION_FAILURE: i32 = 2;
    pub const CORRUPTION: i32 = 3;
    pub const STATE_FAILURE: i32 = 4;
}

use crate::error::JournalError;

/// Exit code for an error surfacing at the top of a command.
pub fn for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<JournalError>() {
        Some(JournalError::Precondition { .. } | JournalError::DestinationExists { .. }) => {
            exit::PRECONDITION_FAILURE
        }
        Some(JournalError::Corruption { .. } | JournalError::Parse { .. }) => exit::CORRUPTION,
        Some(
            JournalError::State(_)
            | JournalError::Locked { .. }
            | JournalError::MissingPlan { .. }
            | JournalError::Unencodable { .. },
        ) => exit::STATE_FAILURE,
        Some(JournalError::Io { .. }) | None => exit::OPERATIONAL_FAILURE,
    }
}
