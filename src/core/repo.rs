//! Repository adapter
//!
//! Thin wrapper over the git CLI exposing exactly what the indexer needs:
//! repository root, current branch, tracked-file listing, and working-tree
//! reads. The listing honors .gitignore because `git ls-files` does; the
//! output is sorted so repeated runs see the same ordering.

use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

/// A discovered git repository
#[derive(Debug, Clone)]
pub struct GitRepo {
    /// Absolute path to the repository root
    root: PathBuf,
    /// Repository name (root directory name)
    name: String,
}

impl GitRepo {
    /// Discover the repository containing `start` via `git rev-parse`
    pub fn discover(start: &Path) -> Result<Self> {
        let output = Command::new("git")
            .arg("-C")
            .arg(start)
            .args(["rev-parse", "--show-toplevel"])
            .output()
            .map_err(|e| Error::Git {
                command: "rev-parse".into(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::RepoMissing {
                path: start.to_path_buf(),
            });
        }

        let root = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self { root, name })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current branch name; "HEAD" when detached.
    ///
    /// `symbolic-ref` also answers on a repository with no commits yet,
    /// where `rev-parse --abbrev-ref` would fail.
    pub fn branch(&self) -> Result<String> {
        match self.git(&["symbolic-ref", "--short", "-q", "HEAD"]) {
            Ok(output) => Ok(output.trim().to_string()),
            Err(_) => Ok("HEAD".to_string()),
        }
    }

    /// List non-ignored files, repo-relative, sorted.
    ///
    /// Tracked files plus untracked-but-not-ignored ones, the same set a
    /// developer sees in `git status`.
    pub fn list_files(&self) -> Result<Vec<String>> {
        let output = self.git(&["ls-files", "--cached", "--others", "--exclude-standard"])?;
        let mut files: Vec<String> = output
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Read a working-tree file by repo-relative path
    pub fn read_file(&self, rel_path: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.root.join(rel_path))
    }

    /// Filesystem modification time of a working-tree file
    pub fn mod_time(&self, rel_path: &str) -> std::io::Result<SystemTime> {
        std::fs::metadata(self.root.join(rel_path))?.modified()
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .map_err(|e| Error::Git {
                command: args.first().unwrap_or(&"?").to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::Git {
                command: args.first().unwrap_or(&"?").to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::tempdir;

    fn init_repo(dir: &Path) {
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .arg("-C")
                .arg(dir)
                .args(args)
                .status()
                .expect("git available");
            assert!(status.success(), "git {:?} failed", args);
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "test"]);
    }

    #[test]
    fn test_discover_fails_outside_repo() {
        let dir = tempdir().unwrap();
        let err = GitRepo::discover(dir.path()).unwrap_err();
        assert!(matches!(err, Error::RepoMissing { .. }));
    }

    #[test]
    fn test_list_files_honors_gitignore() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("kept.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("dropped.log"), "noise").unwrap();
        std::fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();

        let repo = GitRepo::discover(dir.path()).unwrap();
        let files = repo.list_files().unwrap();
        assert!(files.contains(&"kept.rs".to_string()));
        assert!(!files.contains(&"dropped.log".to_string()));
    }

    #[test]
    fn test_read_and_mod_time() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();

        let repo = GitRepo::discover(dir.path()).unwrap();
        assert_eq!(repo.read_file("a.txt").unwrap(), b"hello");
        assert!(repo.mod_time("a.txt").is_ok());
        assert!(repo.mod_time("missing.txt").is_err());
    }
}
