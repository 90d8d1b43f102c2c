use crate::error::{Result, SyncError};

const STEP: &str = "prepare clone url";
const CLONE_STEP: &str = "clone repository";

/// Org and repo names become directory names; they must be one plain
/// path component.
fn check_component(step: &'static str, field: &str, value: &str) -> Result<()> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(SyncError::invalid(
            step,
            format!("{field} '{value}' is not a usable directory name"),
        ));
    }
    Ok(())
}

/// An authenticated clone URL plus the bare `<org>/<repo>.git` path.
#[derive(Clone, PartialEq, Eq)]
pub struct CloneTarget {
    pub url: String,
    pub path: String,
    pub repo_name: String,
}

impl std::fmt::Debug for CloneTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloneTarget")
            .field("url", &"<redacted>")
            .field("path", &self.path)
            .field("repo_name", &self.repo_name)
            .finish()
    }
}

/// Compose `https://x-access-token:<token>@<host>/<org>/<repo>.git`.
/// Pure string work; no network access.
pub fn build(repository_url: &str, token: &str) -> Result<CloneTarget> {
    let repository_url = repository_url.trim();
    let token = token.trim();
    if repository_url.is_empty() {
        return Err(SyncError::missing(STEP, "repository_url"));
    }
    if token.is_empty() {
        return Err(SyncError::missing(STEP, "hosting_token"));
    }

    let without_scheme = repository_url
        .split_once("://")
        .map_or(repository_url, |(_, rest)| rest);
    let mut segments = without_scheme.trim_end_matches('/').split('/');
    let host = segments.next().unwrap_or("");
    let org = segments.next().unwrap_or("");
    let repo = segments.next().unwrap_or("");
    let repo_name = repo.strip_suffix(".git").unwrap_or(repo);

    if host.is_empty() || org.is_empty() || repo_name.is_empty() {
        return Err(SyncError::invalid(
            STEP,
            format!("expected https://<host>/<org>/<repo>, got '{repository_url}'"),
        ));
    }
    check_component(STEP, "organization", org)?;
    check_component(STEP, "repository", repo_name)?;

    let path = format!("{org}/{repo_name}.git");
    Ok(CloneTarget {
        url: format!("https://x-access-token:{token}@{host}/{path}"),
        path,
        repo_name: repo_name.to_string(),
    })
}

impl CloneTarget {
    /// Rebuild a target from a clone URL and its `<org>/<repo>.git` path.
    pub fn from_parts(url: &str, path: &str) -> Result<Self> {
        if url.trim().is_empty() {
            return Err(SyncError::missing(CLONE_STEP, "clone_url"));
        }
        let Some((org, repo)) = path.split_once('/') else {
            return Err(SyncError::missing(CLONE_STEP, "repo_path"));
        };
        let repo_name = repo.strip_suffix(".git").unwrap_or(repo);
        check_component(CLONE_STEP, "organization", org)?;
        check_component(CLONE_STEP, "repository", repo_name)?;
        Ok(Self {
            url: url.to_string(),
            path: path.to_string(),
            repo_name: repo_name.to_string(),
        })
    }
}
