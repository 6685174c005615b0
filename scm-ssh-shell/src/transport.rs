//! Runs the Git transport program for an accepted operation.

use std::ffi::OsString;
use std::process::Stdio;

use scm_ssh::exec::{ExecError, GitOperation, Operation};
use tokio::signal::unix::{signal, Signal, SignalKind};

pub fn git_args(operation: &Operation) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![];
    match operation.operation {
        GitOperation::UploadPack { strict, timeout } => {
            args.push("upload-pack".into());
            if strict {
                args.push("--strict".into());
            }
            if timeout > 0 {
                args.push(format!("--timeout={}", timeout).into());
            }
        }
        GitOperation::ReceivePack => args.push("receive-pack".into()),
    }
    args.push(operation.directory.clone().into_os_string());
    args
}

/// Committer identity recorded in reflogs, `user <user@remote-host>`.
pub fn committer_env(user: &str, ssh_client: Option<&str>) -> Vec<(&'static str, String)> {
    let host = ssh_client
        .and_then(|c| c.split_whitespace().next())
        .unwrap_or("unknown");
    vec![
        ("GIT_COMMITTER_NAME", user.to_string()),
        ("GIT_COMMITTER_EMAIL", format!("{}@{}", user, host)),
    ]
}

/// Signals that end the session early.
pub struct Shutdown {
    term: Signal,
    hup: Signal,
}

impl Shutdown {
    pub fn install() -> std::io::Result<Shutdown> {
        Ok(Shutdown {
            term: signal(SignalKind::terminate())?,
            hup: signal(SignalKind::hangup())?,
        })
    }

    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.term.recv() => "SIGTERM",
            _ = self.hup.recv() => "SIGHUP",
            Ok(()) = tokio::signal::ctrl_c() => "SIGINT",
        }
    }
}

/// Run `git_binary` for `operation` on the inherited stdio and return its
/// exit code. The environment, `GIT_PROTOCOL` included, is passed through.
#[tracing::instrument(skip(operation), fields(user = %operation.user, repository = %operation.repository))]
pub async fn run(git_binary: &str, operation: &Operation) -> Result<i32, ExecError> {
    let mut shutdown = Shutdown::install().map_err(|e| ExecError::Internal(e.to_string()))?;

    let mut command = tokio::process::Command::new(git_binary);
    command
        .args(git_args(operation))
        .envs(committer_env(
            &operation.user,
            std::env::var("SSH_CLIENT").ok().as_deref(),
        ))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| {
        tracing::error!(error = %e, git_binary, "can't start transport");
        ExecError::Internal(e.to_string())
    })?;

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| ExecError::Internal(e.to_string()))?;
            tracing::info!(%status, "transport finished");
            status
                .code()
                .ok_or_else(|| ExecError::Internal(format!("transport {}", status)))
        }
        name = shutdown.recv() => {
            tracing::warn!(signal = name, "session interrupted, stopping transport");
            if let Err(e) = child.kill().await {
                tracing::error!(error = %e, "can't stop transport");
            }
            Err(ExecError::Internal(format!("interrupted by {}", name)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scm_ssh::RepositoryPath;
    use std::path::PathBuf;

    fn operation(op: GitOperation) -> Operation {
        Operation {
            operation: op,
            repository: RepositoryPath::new("/git/a.git").unwrap(),
            directory: PathBuf::from("/srv/git/a.git"),
            user: "alice".to_string(),
        }
    }

    #[test]
    fn test_git_args() {
        assert_eq!(
            git_args(&operation(GitOperation::UploadPack {
                strict: true,
                timeout: 30
            })),
            vec!["upload-pack", "--strict", "--timeout=30", "/srv/git/a.git"]
        );
        assert_eq!(
            git_args(&operation(GitOperation::UploadPack {
                strict: false,
                timeout: 0
            })),
            vec!["upload-pack", "/srv/git/a.git"]
        );
        assert_eq!(
            git_args(&operation(GitOperation::ReceivePack)),
            vec!["receive-pack", "/srv/git/a.git"]
        );
    }

    #[test]
    fn test_committer_env() {
        assert_eq!(
            committer_env("alice", Some("192.0.2.7 50022 22")),
            vec![
                ("GIT_COMMITTER_NAME", "alice".to_string()),
                ("GIT_COMMITTER_EMAIL", "alice@192.0.2.7".to_string()),
            ]
        );
        assert_eq!(committer_env("bob", None)[1].1, "bob@unknown");
    }

    #[tokio::test]
    async fn test_run_returns_exit_code() {
        let op = operation(GitOperation::ReceivePack);
        assert_eq!(run("true", &op).await, Ok(0));
        assert_eq!(run("false", &op).await, Ok(1));
    }

    #[tokio::test]
    async fn test_run_missing_binary() {
        let op = operation(GitOperation::ReceivePack);
        assert!(matches!(
            run("/nonexistent/scm-ssh-git", &op).await,
            Err(ExecError::Internal(_))
        ));
    }
}
