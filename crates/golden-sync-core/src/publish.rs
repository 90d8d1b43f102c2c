//! Stage, commit and push the metadata change.

use crate::error::{Result, SyncError};
use crate::git;
use crate::metadata;
use std::path::Path;
use tracing::{info, warn};

const STEP: &str = "commit and push";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub branch: String,
    pub message: String,
}

pub fn commit_message(file_name: &str, timestamp: &str) -> String {
    format!("chore: update {file_name} timestamp to {timestamp}")
}

/// Commit `file_name` and push the current branch to `origin`, setting the
/// upstream. A missing timestamp is replaced with a fresh one.
pub fn commit_and_push(dir: &Path, file_name: &str, timestamp: Option<&str>) -> Result<Published> {
    let timestamp = match timestamp.filter(|t| !t.trim().is_empty()) {
        Some(t) => t.to_string(),
        None => {
            warn!("metadata timestamp missing; generating a fresh one for the commit");
            metadata::timestamp_now()
        }
    };
    let message = commit_message(file_name, &timestamp);

    git::run(Some(dir), &["add", "--", file_name])?;
    git::run(Some(dir), &["commit", "--quiet", "-m", &message])?;

    let branch = git::run(Some(dir), &["rev-parse", "--abbrev-ref", "HEAD"])?;
    if branch.is_empty() || branch == "HEAD" {
        return Err(SyncError::invalid(STEP, "working copy is not on a branch"));
    }

    git::run(Some(dir), &["push", "--set-upstream", "origin", &branch])?;
    info!(%branch, "pushed metadata update");

    Ok(Published { branch, message })
}
