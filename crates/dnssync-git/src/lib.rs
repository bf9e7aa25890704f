// # Repository acquisition
//
// Clones the repository holding the desired-state document into a
// temporary directory using the system `git` binary. The checkout is
// removed when the returned [`CheckedOutRepository`] is dropped.
//
// SSH authentication uses a deploy key passed through `GIT_SSH_COMMAND`;
// unknown host keys are accepted on first contact.

use dnssync_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

/// A repository checkout that lives as long as this value
#[derive(Debug)]
pub struct CheckedOutRepository {
    dir: TempDir,
}

impl CheckedOutRepository {
    /// Root of the working tree
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Resolve a repository-relative path
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(relative)
    }
}

/// `ssh` invocation that authenticates with `ssh_key`
pub fn ssh_command(ssh_key: &Path) -> String {
    format!(
        "ssh -i {} -o StrictHostKeyChecking=accept-new",
        ssh_key.display()
    )
}

/// Build the `git clone` command for `url` into `destination`
pub fn clone_command(url: &str, ssh_key: &Path, destination: &Path) -> Command {
    let mut command = Command::new("git");
    command
        .arg("clone")
        .arg("--quiet")
        .arg(url)
        .arg(destination)
        .env("GIT_SSH_COMMAND", ssh_command(ssh_key))
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .kill_on_drop(true);
    command
}

/// Clone `url` into a fresh temporary directory
pub async fn clone_repository(url: &str, ssh_key: &Path) -> Result<CheckedOutRepository> {
    let dir = TempDir::new()
        .map_err(|e| Error::repository(format!("Failed to create checkout directory: {}", e)))?;

    info!("Cloning {}", url);
    debug!("Checkout directory: {}", dir.path().display());

    let output = clone_command(url, ssh_key, dir.path())
        .output()
        .await
        .map_err(|e| Error::repository(format!("Failed to run git: {}", e)))?;

    if !output.status.success() {
        return Err(Error::repository(format!(
            "git clone of {} failed ({}): {}",
            url,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    info!("Cloned {}", url);
    Ok(CheckedOutRepository { dir })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_ssh_command() {
        assert_eq!(
            ssh_command(Path::new("/ssh-key")),
            "ssh -i /ssh-key -o StrictHostKeyChecking=accept-new"
        );
    }

    #[test]
    fn test_clone_command_arguments() {
        let command = clone_command(
            "git@github.com:example/homelab.git",
            Path::new("/ssh-key"),
            Path::new("/tmp/checkout"),
        );
        let command = command.as_std();

        assert_eq!(command.get_program(), "git");
        let args: Vec<&OsStr> = command.get_args().collect();
        assert_eq!(
            args,
            vec![
                OsStr::new("clone"),
                OsStr::new("--quiet"),
                OsStr::new("git@github.com:example/homelab.git"),
                OsStr::new("/tmp/checkout"),
            ]
        );

        let ssh = command
            .get_envs()
            .find(|(key, _)| *key == "GIT_SSH_COMMAND")
            .and_then(|(_, value)| value);
        assert_eq!(
            ssh,
            Some(OsStr::new("ssh -i /ssh-key -o StrictHostKeyChecking=accept-new"))
        );
    }

    #[tokio::test]
    async fn test_clone_failure_is_repository_error() {
        let missing = TempDir::new().unwrap();
        let url = missing.path().join("does-not-exist.git");

        let result = clone_repository(&url.display().to_string(), Path::new("/nonexistent")).await;
        assert!(matches!(result, Err(Error::Repository(_))));
    }
}
