use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::JournalError;
use crate::model::Op;

/// A run description: where to keep state and what to do.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Manifest {
    /// Directory holding the plan, progress and lock files.
    pub state_dir: PathBuf,
    /// Run identifier; names the files inside `state_dir`.
    pub id: String,
    /// Directory relative operation paths are resolved against.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Operations to run, in order.
    pub operations: Vec<Op>,
}

impl Manifest {
    /// Basic sanity checks. A bad manifest is a usage error.
    pub fn validate(&self) -> Result<(), JournalError> {
        let problem = if self.id.is_empty() {
            "id must not be empty".to_string()
        } else if self.id.contains(['/', '\\']) || self.id == "." || self.id == ".." {
            format!("id must be a plain file name: {:?}", self.id)
        } else if self.root.as_ref().is_some_and(|root| !root.is_absolute()) {
            "root must be an absolute path".to_string()
        } else {
            return Ok(());
        };
        Err(JournalError::state(format!("invalid manifest: {problem}")))
    }

    /// Operations with relative paths joined onto `root`.
    pub fn resolved_operations(&self) -> Vec<Op> {
        let Some(root) = &self.root else {
            return self.operations.clone();
        };
        self.operations
            .iter()
            .map(|op| resolve_op(root, op))
            .collect()
    }
}

fn join(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn resolve_op(root: &Path, op: &Op) -> Op {
    let mut op = op.clone();
    match &mut op {
        Op::RenameFile(rename) => {
            rename.source = join(root, &rename.source);
            rename.destination = join(root, &rename.destination);
        }
        Op::RenameInFile(rewrite) => {
            rewrite.path = join(root, &rewrite.path);
        }
    }
    op
}

/// Generate JSON Schema for the manifest.
pub fn generate_schema() -> Result<String> {
    let schema = schemars::schema_for!(Manifest);
    Ok(serde_json::to_string_pretty(&schema)?)
}

/// Load a manifest from a JSON file.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let manifest = serde_json::from_reader(reader)?;
    Ok(manifest)
}

/// Parse a manifest from a JSON string.
pub fn from_json(json: &str) -> Result<Manifest> {
    let manifest = serde_json::from_str(json)?;
    Ok(manifest)
}
