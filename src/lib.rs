//! Resumable operation journal.
//!
//! An [`Operator`](journal::Operator) applies an ordered list of file
//! renames and in-file substitutions, recording progress after every step
//! so an interrupted run picks up where it stopped.

pub mod cli;
pub mod codec;
pub mod engine;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fsops;
pub mod journal;
pub mod manifest;
pub mod model;
pub mod reporter;

pub use error::{JournalError, Result};
pub use journal::{Operator, OperatorState, Step};
pub use model::{Op, Operation, OperationKind, RenameFile, RenameInFile};
