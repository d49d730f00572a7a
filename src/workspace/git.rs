// ABOUTME: Workspace directory backed by git worktrees of a single repository
// Lists the main worktree plus linked worktrees, and creates or prunes linked ones

use crate::workspace::{Workspace, WorkspaceDirectory, WorkspaceError};
use git2::{BranchType, Repository, StatusOptions, WorktreeAddOptions, WorktreePruneOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct GitWorktreeDirectory {
    main_path: PathBuf,
    base_dir: PathBuf,
}

impl GitWorktreeDirectory {
    /// Open the repository containing `path`; new worktrees go under
    /// `~/.agents-mux/worktrees/<repo-name>`.
    pub fn open(path: &Path) -> Result<Self, WorkspaceError> {
        let main_path = main_worktree_path(path)?;
        let repo_name = sanitize_name(
            main_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("repo"),
        );
        let base_dir = dirs::home_dir()
            .ok_or(WorkspaceError::NoHomeDir)?
            .join(".agents-mux")
            .join("worktrees")
            .join(repo_name);
        Ok(Self { main_path, base_dir })
    }

    pub fn with_base_dir(path: &Path, base_dir: PathBuf) -> Result<Self, WorkspaceError> {
        Ok(Self {
            main_path: main_worktree_path(path)?,
            base_dir,
        })
    }

    pub fn main_path(&self) -> &Path {
        &self.main_path
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn repository(&self) -> Result<Repository, WorkspaceError> {
        Ok(Repository::open(&self.main_path)?)
    }
}

impl WorkspaceDirectory for GitWorktreeDirectory {
    fn list_workspaces(&self) -> Result<Vec<Workspace>, WorkspaceError> {
        let repo = self.repository()?;
        let mut workspaces = vec![Workspace {
            path: self.main_path.clone(),
            label: head_label(&repo).unwrap_or_else(|| "main".to_string()),
            is_primary: true,
        }];

        let names = repo.worktrees()?;
        for name in names.iter().flatten() {
            let worktree = match repo.find_worktree(name) {
                Ok(worktree) => worktree,
                Err(e) => {
                    warn!("Skipping worktree {}: {}", name, e);
                    continue;
                }
            };
            if worktree.validate().is_err() {
                debug!("Skipping stale worktree {}", name);
                continue;
            }
            let path = worktree.path().to_path_buf();
            let label = Repository::open(&path)
                .ok()
                .and_then(|wt_repo| head_label(&wt_repo))
                .unwrap_or_else(|| name.to_string());
            workspaces.push(Workspace {
                path,
                label,
                is_primary: false,
            });
        }

        Ok(workspaces)
    }

    fn create_workspace(&self, name: &str) -> Result<Workspace, WorkspaceError> {
        validate_branch_name(name)?;
        let repo = self.repository()?;
        let dir_name = sanitize_name(name);
        let path = self.base_dir.join(&dir_name);
        if path.exists() {
            return Err(WorkspaceError::AlreadyExists(path));
        }
        std::fs::create_dir_all(&self.base_dir)?;

        let branch = match repo.find_branch(name, BranchType::Local) {
            Ok(branch) => {
                debug!("Branch {} already exists", name);
                branch
            }
            Err(_) => {
                let head_commit = repo.head()?.peel_to_commit()?;
                let branch = repo.branch(name, &head_commit, false)?;
                info!("Created new branch: {} from {}", name, head_commit.id());
                branch
            }
        };

        let reference = branch.into_reference();
        let mut opts = WorktreeAddOptions::new();
        opts.reference(Some(&reference));
        let worktree = repo.worktree(&dir_name, &path, Some(&opts))?;

        info!("Created workspace {} at {}", name, worktree.path().display());
        Ok(Workspace {
            path: worktree.path().to_path_buf(),
            label: name.to_string(),
            is_primary: false,
        })
    }

    fn delete_workspace(&self, path: &Path, force: bool) -> Result<(), WorkspaceError> {
        if same_path(path, &self.main_path) {
            return Err(WorkspaceError::MainWorkspace(path.to_path_buf()));
        }

        let repo = self.repository()?;
        let names = repo.worktrees()?;
        let worktree = names
            .iter()
            .flatten()
            .filter_map(|name| repo.find_worktree(name).ok())
            .find(|worktree| same_path(worktree.path(), path))
            .ok_or_else(|| WorkspaceError::NotFound(path.to_path_buf()))?;

        if !force && has_changes(worktree.path())? {
            warn!("Not deleting workspace {} with uncommitted changes", path.display());
            return Err(WorkspaceError::Dirty(path.to_path_buf()));
        }

        let mut opts = WorktreePruneOptions::new();
        opts.valid(true).locked(false).working_tree(true);
        worktree.prune(Some(&mut opts))?;

        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }

        info!("Deleted workspace {}", path.display());
        Ok(())
    }
}

/// Working directory of the main worktree, even when `path` is inside a linked one
fn main_worktree_path(path: &Path) -> Result<PathBuf, WorkspaceError> {
    let repo = Repository::discover(path).map_err(|_| WorkspaceError::NotARepository(path.to_path_buf()))?;
    // A linked worktree's git dir is <common dir>/worktrees/<name>
    let repo = if repo.is_worktree() {
        let common = repo
            .path()
            .ancestors()
            .nth(2)
            .ok_or_else(|| WorkspaceError::NotARepository(path.to_path_buf()))?;
        Repository::open(common)?
    } else {
        repo
    };
    repo.workdir()
        .map(Path::to_path_buf)
        .ok_or_else(|| WorkspaceError::NotARepository(path.to_path_buf()))
}

/// Uncommitted or untracked changes in the worktree at `path`. Ignored files do not count.
fn has_changes(path: &Path) -> Result<bool, WorkspaceError> {
    if !path.exists() {
        return Ok(false);
    }
    let repo = Repository::open(path)?;
    let mut opts = StatusOptions::new();
    opts.include_untracked(true).include_ignored(false);
    let dirty = !repo.statuses(Some(&mut opts))?.is_empty();
    Ok(dirty)
}

fn head_label(repo: &Repository) -> Option<String> {
    repo.head().ok().and_then(|head| head.shorthand().map(str::to_string))
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.components().eq(b.components()),
    }
}

fn validate_branch_name(name: &str) -> Result<(), WorkspaceError> {
    if name.is_empty() {
        return Err(WorkspaceError::InvalidName("Branch name cannot be empty".to_string()));
    }

    let invalid_chars = [' ', '~', '^', ':', '?', '*', '[', '\\'];
    if name.chars().any(|c| invalid_chars.contains(&c) || c.is_control()) {
        return Err(WorkspaceError::InvalidName(format!(
            "Branch name contains invalid characters: {name}"
        )));
    }

    if name.starts_with('-') || name.ends_with('/') || name.contains("//") || name.contains("..") {
        return Err(WorkspaceError::InvalidName(format!("Invalid branch name format: {name}")));
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '-',
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}
