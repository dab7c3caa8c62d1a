use crate::IngestError;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

const CHECKOUT_DIR: &str = "checkout";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryLocation {
    Local(PathBuf),
    Remote(String),
}

impl RepositoryLocation {
    pub fn parse(location: &str) -> Result<Self, IngestError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(IngestError::InvalidArgument(
                "repository location is empty".to_string(),
            ));
        }

        let is_remote = ["http://", "https://", "ssh://", "git://", "file://", "git@"]
            .iter()
            .any(|prefix| location.starts_with(prefix));

        if is_remote {
            Ok(Self::Remote(location.to_string()))
        } else {
            Ok(Self::Local(PathBuf::from(location)))
        }
    }
}

/// Returns a local directory holding the repository. Remote repositories are
/// cloned into `work_dir/checkout`, or refreshed when a checkout already exists.
pub async fn acquire_repository(
    location: &RepositoryLocation,
    work_dir: &Path,
) -> Result<PathBuf, IngestError> {
    match location {
        RepositoryLocation::Local(path) => {
            if path.is_dir() {
                Ok(path.clone())
            } else {
                Err(IngestError::InvalidArgument(format!(
                    "repository directory does not exist: {}",
                    path.display()
                )))
            }
        }
        RepositoryLocation::Remote(url) => {
            let dest = work_dir.join(CHECKOUT_DIR);
            sync_checkout(url, &dest).await?;
            Ok(dest)
        }
    }
}

async fn sync_checkout(url: &str, dest: &Path) -> Result<(), IngestError> {
    if dest.exists() {
        let refreshed = if dest.join(".git").is_dir() {
            pull(dest).await
        } else {
            Err(IngestError::Repository(format!(
                "{} is not a git checkout",
                dest.display()
            )))
        };

        match refreshed {
            Ok(()) => {
                info!(dest = %dest.display(), "updated existing checkout");
                return Ok(());
            }
            Err(error) => {
                warn!(dest = %dest.display(), %error, "refresh failed, cloning again");
                tokio::fs::remove_dir_all(dest).await?;
            }
        }
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let dest_arg = dest.to_string_lossy();
    run_git(None, &["clone", url, dest_arg.as_ref()]).await?;
    info!(url, dest = %dest.display(), "cloned repository");
    Ok(())
}

async fn pull(dest: &Path) -> Result<(), IngestError> {
    run_git(Some(dest), &["fetch", "origin"]).await?;
    run_git(Some(dest), &["pull", "--ff-only"]).await
}

/// Runs git, inside `dir` when given. `GIT_DIR` pins git to `dir/.git` so it
/// never falls through to a repository enclosing the checkout.
async fn run_git(dir: Option<&Path>, args: &[&str]) -> Result<(), IngestError> {
    let mut command = Command::new("git");
    if let Some(dir) = dir {
        command.current_dir(dir).env("GIT_DIR", ".git");
    }
    let output = command
        .args(args)
        .output()
        .await
        .map_err(|error| IngestError::Repository(format!("failed to run git: {error}")))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(IngestError::Repository(format!(
            "git {} exited with {}: {}",
            args.first().copied().unwrap_or_default(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}
