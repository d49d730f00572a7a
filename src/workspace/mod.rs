// ABOUTME: Workspaces that sessions are bound to
// A workspace is an isolated working directory, normally a git worktree

pub mod git;

pub use git::GitWorktreeDirectory;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Git repository error: {0}")]
    Git(#[from] git2::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not a git repository: {}", .0.display())]
    NotARepository(PathBuf),
    #[error("Workspace already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("Workspace not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Invalid workspace name: {0}")]
    InvalidName(String),
    #[error("Refusing to delete the main workspace: {}", .0.display())]
    MainWorkspace(PathBuf),
    #[error("Workspace has uncommitted changes: {}", .0.display())]
    Dirty(PathBuf),
    #[error("Failed to get home directory")]
    NoHomeDir,
}

/// One workspace as listed to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub path: PathBuf,
    pub label: String,
    pub is_primary: bool,
}

/// Source of workspaces. The main workspace can never be deleted.
pub trait WorkspaceDirectory: Send + Sync {
    fn list_workspaces(&self) -> Result<Vec<Workspace>, WorkspaceError>;

    /// Create a workspace on a new branch called `name`
    fn create_workspace(&self, name: &str) -> Result<Workspace, WorkspaceError>;

    /// Remove the workspace and its directory. Without `force` a workspace with
    /// uncommitted or untracked changes is left alone.
    fn delete_workspace(&self, path: &Path, force: bool) -> Result<(), WorkspaceError>;
}
