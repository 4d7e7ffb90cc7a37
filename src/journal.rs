//! Resumable execution of an ordered list of operations.
//!
//! An [`Operator`] keeps two logs per identifier inside its state
//! directory:
//!
//! - the plan log (`<id>.todo`), written once, holding every planned
//!   operation in order;
//! - the progress log (`<id>.done`), rewritten after every finished step,
//!   holding the prefix of the plan that has completed.
//!
//! Both use the line format from [`crate::codec`], so the progress log is
//! always a line-for-line prefix of the plan log. After a crash, a new
//! operator calls [`Operator::load`] and the in-flight step is re-executed
//! with [`Operation::reexecute`] before the run continues.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{JournalError, Result};
use crate::fsops;
use crate::model::{Op, Operation};

const PLAN_EXT: &str = "todo";
const PROGRESS_EXT: &str = "done";
const LOCK_EXT: &str = "lock";

/// Lifecycle of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    /// No operations added.
    Empty,
    /// Operations added, nothing saved or loaded yet.
    Planned,
    /// Plan on disk, nothing completed in this run.
    Fresh,
    /// Plan loaded from disk with steps still pending.
    Resuming,
    /// Every planned operation completed.
    Complete,
}

/// Outcome of a single [`Operator::next`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The operation at `index` ran for the first time.
    Executed { index: usize },
    /// The operation at `index` was re-run after an interruption.
    Reexecuted { index: usize },
    /// Nothing left to do.
    Complete,
}

/// Advisory lock held for the duration of a run.
///
/// The lock file is created exclusively and removed on drop. A process that
/// gets killed leaves it behind; [`LockGuard::break_lock`] removes it.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn acquire(path: PathBuf) -> Result<Self> {
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| "unknown holder".to_string());
                return Err(JournalError::Locked { path, holder });
            }
            Err(e) => return Err(JournalError::io(path, e)),
        };

        let stamp = format!("pid {} since {}\n", std::process::id(), Utc::now().to_rfc3339());
        file.write_all(stamp.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| JournalError::io(&path, e))?;
        Ok(Self { path })
    }

    /// Remove a lock left behind by a process that did not exit cleanly.
    pub fn break_lock(path: &Path) -> Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(JournalError::io(path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}

/// Drives a planned sequence of operations one step at a time, persisting
/// progress after each step.
#[derive(Debug)]
pub struct Operator {
    state_dir: PathBuf,
    id: String,
    planned: Vec<Op>,
    completed: usize,
    resuming: bool,
    sealed: bool,
    lock: Option<LockGuard>,
}

impl Operator {
    pub fn new(state_dir: impl Into<PathBuf>, id: impl Into<String>) -> Self {
        Self {
            state_dir: state_dir.into(),
            id: id.into(),
            planned: Vec::new(),
            completed: 0,
            resuming: false,
            sealed: false,
            lock: None,
        }
    }

    /// Create an operator that holds the identifier's lock file until it is
    /// dropped.
    pub fn with_lock(state_dir: impl Into<PathBuf>, id: impl Into<String>) -> Result<Self> {
        let mut operator = Self::new(state_dir, id);
        std::fs::create_dir_all(&operator.state_dir)
            .map_err(|e| JournalError::io(&operator.state_dir, e))?;
        operator.lock = Some(LockGuard::acquire(operator.lock_path())?);
        Ok(operator)
    }

    pub fn plan_path(&self) -> PathBuf {
        self.state_file(PLAN_EXT)
    }

    pub fn progress_path(&self) -> PathBuf {
        self.state_file(PROGRESS_EXT)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_file(LOCK_EXT)
    }

    fn state_file(&self, ext: &str) -> PathBuf {
        self.state_dir.join(format!("{}.{ext}", self.id))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn planned(&self) -> &[Op] {
        &self.planned
    }

    pub fn completed(&self) -> &[Op] {
        &self.planned[..self.completed]
    }

    pub fn pending(&self) -> &[Op] {
        &self.planned[self.completed..]
    }

    pub fn is_resuming(&self) -> bool {
        self.resuming
    }

    pub fn state(&self) -> OperatorState {
        if !self.sealed {
            if self.planned.is_empty() {
                OperatorState::Empty
            } else {
                OperatorState::Planned
            }
        } else if self.completed == self.planned.len() {
            OperatorState::Complete
        } else if self.resuming {
            OperatorState::Resuming
        } else {
            OperatorState::Fresh
        }
    }

    /// Append an operation to the plan.
    ///
    /// Only allowed before the first [`save`](Self::save) or
    /// [`load`](Self::load).
    pub fn add_operation(&mut self, op: impl Into<Op>) -> Result<()> {
        if self.sealed {
            return Err(JournalError::state(
                "cannot add operations after the plan was saved or loaded",
            ));
        }
        let op = op.into();
        op.check_encodable()?;
        self.planned.push(op);
        Ok(())
    }

    /// Persist the plan (first call only) and the progress made so far.
    ///
    /// The first `save` of a fresh operator refuses to run over an existing
    /// plan log; resume that run with [`load`](Self::load) instead.
    pub fn save(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.state_dir)
            .map_err(|e| JournalError::io(&self.state_dir, e))?;

        let plan = self.plan_path();
        if !self.sealed && plan.exists() {
            return Err(JournalError::state(format!(
                "a plan log already exists at {}; load it to resume",
                plan.display()
            )));
        }
        if !plan.exists() {
            debug!(path = %plan.display(), operations = self.planned.len(), "writing plan log");
            fsops::write_atomic(&plan, encode_log(&self.planned).as_bytes())?;
        }

        fsops::write_atomic(
            &self.progress_path(),
            encode_log(self.completed()).as_bytes(),
        )?;
        self.sealed = true;
        Ok(())
    }

    /// Rebuild state from the logs on disk.
    ///
    /// If operations were added beforehand they must match the plan log
    /// exactly; otherwise the plan is decoded from the log. The progress
    /// log must be a line-for-line prefix of the plan log.
    pub fn load(&mut self) -> Result<()> {
        if self.sealed {
            return Err(JournalError::state("operator was already saved or loaded"));
        }

        let plan_path = self.plan_path();
        let plan_text = match std::fs::read_to_string(&plan_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(JournalError::MissingPlan { path: plan_path });
            }
            Err(e) => return Err(JournalError::io(&plan_path, e)),
        };
        let plan_lines: Vec<&str> = plan_text.split_inclusive('\n').collect();

        if self.planned.is_empty() {
            self.planned = plan_lines
                .iter()
                .map(|line| codec::decode_line(line))
                .collect::<Result<_>>()?;
        } else {
            check_supplied_plan(&plan_path, &plan_lines, &self.planned)?;
        }

        let progress_path = self.progress_path();
        let completed = match std::fs::read_to_string(&progress_path) {
            Ok(text) => check_progress(&progress_path, &plan_lines, &text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(JournalError::io(&progress_path, e)),
        };

        self.completed = completed;
        self.resuming = completed < self.planned.len();
        self.sealed = true;

        if self.resuming {
            info!(
                id = %self.id,
                completed,
                total = self.planned.len(),
                "resuming interrupted run"
            );
        }
        Ok(())
    }

    /// Run the next pending operation and record it as completed.
    ///
    /// A failing operation leaves the logs untouched and is retried by the
    /// next call. Only a step pending since [`load`](Self::load) is retried
    /// with [`Operation::reexecute`].
    pub fn next(&mut self) -> Result<Step> {
        if !self.sealed {
            return Err(JournalError::state("save or load the plan before stepping"));
        }
        let index = self.completed;
        let Some(op) = self.planned.get(index) else {
            return Ok(Step::Complete);
        };

        let resuming = self.resuming;
        debug!(index, op = %codec::encode_line(op), resuming, "running step");
        let result = if resuming { op.reexecute() } else { op.execute() };
        if let Err(e) = result {
            warn!(index, error = %e, "step failed");
            return Err(e);
        }

        self.completed += 1;
        self.resuming = false;
        self.save()?;

        Ok(if resuming {
            Step::Reexecuted { index }
        } else {
            Step::Executed { index }
        })
    }

    /// Step until every operation completed. Returns the number of steps run.
    pub fn run(&mut self) -> Result<usize> {
        let mut steps = 0;
        while self.next()? != Step::Complete {
            steps += 1;
        }
        Ok(steps)
    }

    /// Pre-flight check of the next pending operation.
    ///
    /// Later operations usually depend on earlier ones having run, so only
    /// the first pending one can be checked against the current
    /// filesystem. A resumed step may legitimately fail its check.
    pub fn verify_pending(&self) -> Option<(usize, JournalError)> {
        let op = self.planned.get(self.completed)?;
        op.verify().err().map(|e| (self.completed, e))
    }

    /// Remove the logs of a finished run so the identifier can be reused.
    pub fn discard(self) -> Result<()> {
        if self.state() != OperatorState::Complete {
            return Err(JournalError::state("only a complete run can be discarded"));
        }
        for path in [self.progress_path(), self.plan_path()] {
            std::fs::remove_file(&path).map_err(|e| JournalError::io(&path, e))?;
        }
        Ok(())
    }
}

fn encode_log(ops: &[Op]) -> String {
    ops.iter()
        .map(|op| codec::encode_line(op) + "\n")
        .collect()
}

/// Plan and progress lines are compared with their terminators, byte for byte.
fn check_supplied_plan(path: &Path, plan_lines: &[&str], planned: &[Op]) -> Result<()> {
    if plan_lines.len() != planned.len() {
        return Err(JournalError::Corruption {
            path: path.to_path_buf(),
            line: plan_lines.len().min(planned.len()) + 1,
            reason: format!(
                "plan log has {} operations, {} were supplied",
                plan_lines.len(),
                planned.len()
            ),
        });
    }
    for (i, (line, op)) in plan_lines.iter().zip(planned).enumerate() {
        let expected = codec::encode_line(op) + "\n";
        if *line != expected {
            return Err(JournalError::Corruption {
                path: path.to_path_buf(),
                line: i + 1,
                reason: format!("plan log has {line:?}, supplied plan has {expected:?}"),
            });
        }
    }
    Ok(())
}

/// Count completed steps, checking each progress line against the plan.
fn check_progress(path: &Path, plan_lines: &[&str], progress: &str) -> Result<usize> {
    let mut count = 0;
    for (i, line) in progress.split_inclusive('\n').enumerate() {
        let Some(expected) = plan_lines.get(i) else {
            return Err(JournalError::Corruption {
                path: path.to_path_buf(),
                line: i + 1,
                reason: "progress log is longer than the plan log".to_string(),
            });
        };
        if line != *expected {
            return Err(JournalError::Corruption {
                path: path.to_path_buf(),
                line: i + 1,
                reason: format!("line {line:?} is different than {expected:?}"),
            });
        }
        count += 1;
    }
    Ok(count)
}
