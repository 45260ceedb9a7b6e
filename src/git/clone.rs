use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::error::FetchError;
use crate::models::Document;

/// How long an interrupted fetch waits for the clone task to unwind.
const CLEANUP_GRACE: Duration = Duration::from_secs(10);

/// Knobs for a single fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Upper bound for the whole clone; on expiry the transfer is aborted.
    pub timeout: Duration,
    /// Token for HTTPS auth against private repos
    pub git_token: Option<String>,
    /// Parent of the `repo-chat-*` workspace; the system temp dir when None
    pub workspace_root: Option<PathBuf>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            git_token: None,
            workspace_root: None,
        }
    }
}

/// Clone `url` at `branch` into a fresh temporary workspace and return every
/// file whose path ends with one of `extensions`.
///
/// The workspace is owned by the blocking clone task and removed when that
/// task finishes, whatever the outcome. On cancellation or timeout the
/// transfer is aborted and `fetch` waits (up to `CLEANUP_GRACE`) for the task
/// to remove it. An empty match set is an error.
pub async fn fetch(
    url: &str,
    branch: &str,
    extensions: &[String],
    options: &FetchOptions,
    cancel: &CancellationToken,
) -> std::result::Result<Vec<Document>, FetchError> {
    // Child token: a timeout cancels our clone without touching the caller's token.
    let clone_token = cancel.child_token();

    let url_owned = url.to_string();
    let branch_owned = branch.to_string();
    let exts = extensions.to_vec();
    let git_token = options.git_token.clone();
    let workspace_root = options.workspace_root.clone();
    let task_token = clone_token.clone();

    let mut handle = tokio::task::spawn_blocking(move || {
        let mut builder = tempfile::Builder::new();
        builder.prefix("repo-chat-");
        let workspace = match &workspace_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| FetchError::Workspace(e.to_string()))?;
        let target = workspace.path().join("repo");

        if task_token.is_cancelled() {
            return Err(FetchError::Cancelled("cancelled before clone".to_string()));
        }

        clone_branch(
            &url_owned,
            &branch_owned,
            &target,
            git_token.as_deref(),
            &task_token,
        )
        .map_err(|e| {
            if task_token.is_cancelled() {
                FetchError::Cancelled(format!("{e:#}"))
            } else {
                FetchError::Clone(format!("{e:#}"))
            }
        })?;

        let documents = collect_documents(&target, &exts);
        // `workspace` drops here and removes the clone
        Ok::<_, FetchError>(documents)
    });

    let interrupted = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!("Clone of {url} cancelled by caller");
            FetchError::Cancelled("cancelled by caller".to_string())
        }
        _ = tokio::time::sleep(options.timeout) => {
            tracing::warn!("Clone of {url} timed out after {}s", options.timeout.as_secs());
            FetchError::Cancelled(format!("timed out after {}s", options.timeout.as_secs()))
        }
        joined = &mut handle => {
            let documents =
                joined.map_err(|e| FetchError::Clone(format!("clone task failed: {e}")))??;
            if documents.is_empty() {
                return Err(FetchError::NoMatchingFiles(extensions.to_vec()));
            }
            tracing::info!("Fetched {} matching files from {url}@{branch}", documents.len());
            return Ok(documents);
        }
    };

    clone_token.cancel();
    if tokio::time::timeout(CLEANUP_GRACE, handle).await.is_err() {
        tracing::warn!("Clone of {url} still unwinding; its workspace goes when it exits");
    }
    Err(interrupted)
}

/// Clone a single branch. Aborts the transfer as soon as `cancel` fires.
fn clone_branch(
    url: &str,
    branch: &str,
    target: &Path,
    git_token: Option<&str>,
    cancel: &CancellationToken,
) -> Result<()> {
    tracing::info!("Cloning {url} ({branch}) into {}", target.display());

    let mut callbacks = git2::RemoteCallbacks::new();
    if let Some(token) = git_token {
        let token = token.to_string();
        callbacks.credentials(move |_url, _username, _allowed| {
            git2::Cred::userpass_plaintext("x-access-token", &token)
        });
    }
    let progress_token = cancel.clone();
    callbacks.transfer_progress(move |_progress| !progress_token.is_cancelled());

    let mut fetch_options = git2::FetchOptions::new();
    fetch_options.remote_callbacks(callbacks);

    let mut builder = git2::build::RepoBuilder::new();
    builder.fetch_options(fetch_options);
    if !branch.is_empty() {
        builder.branch(branch);
    }

    builder
        .clone(url, target)
        .with_context(|| format!("Failed to clone {url} at {branch}"))?;
    tracing::info!("Clone complete: {}", target.display());
    Ok(())
}

/// Walk a cloned repo and read every file with a matching suffix.
///
/// Output is sorted by path so downstream chunking is deterministic.
pub fn collect_documents(repo_dir: &Path, extensions: &[String]) -> Vec<Document> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(repo_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(repo_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        if !matches_extension(&relative, extensions) {
            continue;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => documents.push(Document {
                path: relative,
                content,
            }),
            Err(e) => {
                tracing::debug!("Skipping unreadable file {relative}: {e}");
            }
        }
    }

    documents.sort_by(|a, b| a.path.cmp(&b.path));
    documents
}

fn matches_extension(path: &str, extensions: &[String]) -> bool {
    extensions
        .iter()
        .any(|ext| !ext.is_empty() && path.ends_with(ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_matches_extension_suffix() {
        assert!(matches_extension("src/app.py", &exts(&[".py"])));
        assert!(matches_extension("web/index.tsx", &exts(&[".js", ".tsx"])));
        assert!(!matches_extension("src/app.pyc", &exts(&[".py"])));
        assert!(!matches_extension("README.md", &exts(&[".py", ".rs"])));
    }

    #[test]
    fn test_matches_extension_ignores_empty_filter_entries() {
        assert!(!matches_extension("anything", &exts(&[""])));
    }

    #[test]
    fn test_collect_documents_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("pkg/b.py"), "print('b')").unwrap();
        std::fs::write(dir.path().join("a.py"), "print('a')").unwrap();
        std::fs::write(dir.path().join("notes.md"), "# notes").unwrap();
        std::fs::write(dir.path().join(".git/hook.py"), "x").unwrap();

        let docs = collect_documents(dir.path(), &exts(&[".py"]));
        let paths: Vec<&str> = docs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "pkg/b.py"]);
        assert_eq!(docs[0].content, "print('a')");
    }

    #[test]
    fn test_collect_documents_skips_non_utf8() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bin.py"), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::write(dir.path().join("ok.py"), "x = 1").unwrap();

        let docs = collect_documents(dir.path(), &exts(&[".py"]));
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "ok.py");
    }

    fn init_repo(dir: &Path, files: &[(&str, &str)]) {
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = git2::Repository::init_opts(dir, &opts).unwrap();
        for (path, content) in files {
            std::fs::write(dir.join(path), content).unwrap();
        }
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
    }

    fn options_in(root: &Path) -> FetchOptions {
        FetchOptions {
            workspace_root: Some(root.to_path_buf()),
            ..FetchOptions::default()
        }
    }

    fn leftover_workspaces(root: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_local_repo_removes_workspace() {
        let source = tempfile::tempdir().unwrap();
        init_repo(source.path(), &[("a.py", "x = 1\n"), ("notes.md", "# n\n")]);
        let root = tempfile::tempdir().unwrap();

        let docs = fetch(
            source.path().to_str().unwrap(),
            "main",
            &exts(&[".py"]),
            &options_in(root.path()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "a.py");
        assert!(leftover_workspaces(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_no_matching_files_removes_workspace() {
        let source = tempfile::tempdir().unwrap();
        init_repo(source.path(), &[("notes.md", "# n\n")]);
        let root = tempfile::tempdir().unwrap();

        let result = fetch(
            source.path().to_str().unwrap(),
            "main",
            &exts(&[".py"]),
            &options_in(root.path()),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(FetchError::NoMatchingFiles(_))));
        assert!(leftover_workspaces(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_bad_url_is_clone_error() {
        let missing = tempfile::tempdir().unwrap().path().join("does-not-exist");
        let root = tempfile::tempdir().unwrap();
        let result = fetch(
            missing.to_str().unwrap(),
            "main",
            &exts(&[".py"]),
            &options_in(root.path()),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(FetchError::Clone(_))));
        assert!(leftover_workspaces(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_precancelled_token_reports_cancellation() {
        let root = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = fetch(
            "https://example.invalid/repo.git",
            "main",
            &exts(&[".py"]),
            &options_in(root.path()),
            &token,
        )
        .await;
        assert!(matches!(result, Err(FetchError::Cancelled(_))));
        assert!(leftover_workspaces(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_timeout_reports_cancellation_and_removes_workspace() {
        let source = tempfile::tempdir().unwrap();
        let files: Vec<(String, String)> = (0..300)
            .map(|i| (format!("m{i}.py"), format!("value_{i} = {i}\n")))
            .collect();
        let borrowed: Vec<(&str, &str)> =
            files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
        init_repo(source.path(), &borrowed);
        let root = tempfile::tempdir().unwrap();
        let options = FetchOptions {
            timeout: Duration::ZERO,
            ..options_in(root.path())
        };

        let result = fetch(
            source.path().to_str().unwrap(),
            "main",
            &exts(&[".py"]),
            &options,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(FetchError::Cancelled(_))));
        assert!(leftover_workspaces(root.path()).is_empty());
    }
}
