use std::path::{Path, PathBuf};

use schemars::JsonSchema;

use crate::codec;
use crate::error::{JournalError, Result};
use crate::fsops;

/// A journaled filesystem mutation.
pub trait Operation {
    /// Tag written in front of the serialized fields.
    fn tag(&self) -> &'static str;

    /// Check whether the operation would succeed right now.
    ///
    /// Consider this a pre-flight check. It never mutates anything and does
    /// not remove the need to handle errors from [`Operation::execute`].
    fn verify(&self) -> Result<()>;

    /// Perform the operation.
    fn execute(&self) -> Result<()>;

    /// Perform the operation without knowing whether it already ran, fully
    /// or partly.
    fn reexecute(&self) -> Result<()> {
        self.execute()
    }

    /// Constructor fields as quoted log data, usable with
    /// [`OperationKind::deserialize`].
    fn serialize(&self) -> String;

    /// Fail if a field cannot be written to a log line.
    fn check_encodable(&self) -> Result<()>;
}

/// Decoding half of the log codec for a concrete variant.
pub trait OperationKind: Operation + Sized {
    const TAG: &'static str;

    fn deserialize(data: &str) -> Result<Self>;
}

fn path_field(path: &Path) -> Result<&str> {
    let field = path.to_str().ok_or_else(|| JournalError::Unencodable {
        field: path.display().to_string(),
        reason: "path is not valid UTF-8".to_string(),
    })?;
    codec::check_field(field)?;
    Ok(field)
}

/// Move a file from `source` to `destination`.
///
/// Refuses to replace an existing destination. A rename onto the same path
/// only requires the file to exist.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, JsonSchema)]
pub struct RenameFile {
    /// Current path of the file.
    pub source: PathBuf,
    /// Path the file is moved to.
    pub destination: PathBuf,
}

impl RenameFile {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

impl Operation for RenameFile {
    fn tag(&self) -> &'static str {
        Self::TAG
    }

    fn verify(&self) -> Result<()> {
        if !fsops::exists(&self.source) {
            return Err(JournalError::precondition(&self.source, "source does not exist"));
        }
        if self.source != self.destination && fsops::exists(&self.destination) {
            return Err(JournalError::precondition(
                &self.destination,
                "destination already exists",
            ));
        }
        Ok(())
    }

    fn execute(&self) -> Result<()> {
        fsops::rename_file(&self.source, &self.destination)
    }

    fn reexecute(&self) -> Result<()> {
        // An interrupted run may already have moved the file.
        if !fsops::exists(&self.source) && fsops::exists(&self.destination) {
            tracing::debug!(
                destination = %self.destination.display(),
                "rename already applied"
            );
            return Ok(());
        }
        self.execute()
    }

    fn serialize(&self) -> String {
        let source = self.source.to_string_lossy();
        let destination = self.destination.to_string_lossy();
        codec::quote_fields(&[source.as_ref(), destination.as_ref()])
    }

    fn check_encodable(&self) -> Result<()> {
        path_field(&self.source)?;
        path_field(&self.destination)?;
        Ok(())
    }
}

impl OperationKind for RenameFile {
    const TAG: &'static str = "RenameFile";

    fn deserialize(data: &str) -> Result<Self> {
        let mut fields = codec::split_fields(data, 2)?.into_iter();
        match (fields.next(), fields.next()) {
            (Some(source), Some(destination)) => Ok(Self::new(source, destination)),
            _ => Err(JournalError::parse(data, "expected 2 quoted fields")),
        }
    }
}

/// Replace every literal occurrence of `source` with `destination` inside
/// the file at `path`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, JsonSchema)]
pub struct RenameInFile {
    /// File whose contents are rewritten.
    pub path: PathBuf,
    /// Text to look for.
    pub source: String,
    /// Replacement text.
    pub destination: String,
}

impl RenameInFile {
    pub fn new(
        path: impl Into<PathBuf>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            destination: destination.into(),
        }
    }
}

impl Operation for RenameInFile {
    fn tag(&self) -> &'static str {
        Self::TAG
    }

    fn verify(&self) -> Result<()> {
        if !self.path.is_file() {
            return Err(JournalError::precondition(&self.path, "file does not exist"));
        }
        // Re-applying must be a no-op, which fails if the replacement
        // reintroduces the text being replaced.
        if !self.source.is_empty() && self.destination.contains(&self.source) {
            return Err(JournalError::precondition(
                &self.path,
                format!(
                    "replacement {:?} contains {:?}; re-running would substitute twice",
                    self.destination, self.source
                ),
            ));
        }
        Ok(())
    }

    fn execute(&self) -> Result<()> {
        let changed = fsops::replace_in_file(&self.path, &self.source, &self.destination)?;
        if !changed {
            tracing::debug!(path = %self.path.display(), "no occurrences to replace");
        }
        Ok(())
    }

    fn serialize(&self) -> String {
        let path = self.path.to_string_lossy();
        codec::quote_fields(&[path.as_ref(), self.source.as_str(), self.destination.as_str()])
    }

    fn check_encodable(&self) -> Result<()> {
        path_field(&self.path)?;
        codec::check_field(&self.source)?;
        codec::check_field(&self.destination)?;
        Ok(())
    }
}

impl OperationKind for RenameInFile {
    const TAG: &'static str = "RenameInFile";

    fn deserialize(data: &str) -> Result<Self> {
        let mut fields = codec::split_fields(data, 3)?.into_iter();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(path), Some(source), Some(destination)) => {
                Ok(Self::new(path, source, destination))
            }
            _ => Err(JournalError::parse(data, "expected 3 quoted fields")),
        }
    }
}

/// Any operation the journal knows how to run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Move a file.
    RenameFile(RenameFile),
    /// Substitute text inside a file.
    RenameInFile(RenameInFile),
}

impl Op {
    fn inner(&self) -> &dyn Operation {
        match self {
            Op::RenameFile(op) => op,
            Op::RenameInFile(op) => op,
        }
    }

    /// Paths this operation reads or writes.
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Op::RenameFile(op) => vec![op.source.as_path(), op.destination.as_path()],
            Op::RenameInFile(op) => vec![op.path.as_path()],
        }
    }
}

impl Operation for Op {
    fn tag(&self) -> &'static str {
        self.inner().tag()
    }

    fn verify(&self) -> Result<()> {
        self.inner().verify()
    }

    fn execute(&self) -> Result<()> {
        self.inner().execute()
    }

    fn reexecute(&self) -> Result<()> {
        self.inner().reexecute()
    }

    fn serialize(&self) -> String {
        self.inner().serialize()
    }

    fn check_encodable(&self) -> Result<()> {
        self.inner().check_encodable()
    }
}

impl From<RenameFile> for Op {
    fn from(op: RenameFile) -> Self {
        Op::RenameFile(op)
    }
}

impl From<RenameInFile> for Op {
    fn from(op: RenameInFile) -> Self {
        Op::RenameInFile(op)
    }
}
