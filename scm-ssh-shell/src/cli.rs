use std::path::PathBuf;

use scm_ssh::config::DEFAULT_CONFIG_PATH;
use scm_ssh::exec::ExecError;

#[derive(clap::Parser, Debug)]
#[command(name = "scm-ssh-shell", about = "Serve Git repositories to SSH clients")]
pub struct ShellArgs {
    #[arg(short = 'c', help = "Command requested by the client")]
    pub command: Option<String>,
    #[arg(long, help = "Identity the session was authenticated as")]
    pub user: Option<String>,
    #[arg(long, env = "SCM_SSH_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

impl ShellArgs {
    /// The command given with `-c`, or else the one sshd recorded for a
    /// forced command. Blank commands count as none.
    pub fn requested_command(&self) -> Option<String> {
        self.command
            .clone()
            .or_else(|| std::env::var("SSH_ORIGINAL_COMMAND").ok())
            .filter(|c| !c.trim().is_empty())
    }
}

/// Accept `requested` only for a non-interactive session. A client that has
/// a terminal on both ends, or sent no command, asked for a login shell.
pub fn session_command(
    requested: Option<String>,
    stdin_tty: bool,
    stdout_tty: bool,
) -> Result<String, ExecError> {
    let command = requested.ok_or(ExecError::NoCommand)?;
    if stdin_tty && stdout_tty {
        tracing::info!("refusing interactive session");
        return Err(ExecError::NoCommand);
    }
    Ok(command)
}

#[derive(clap::Parser, Debug)]
#[command(
    name = "scm-ssh-authorized-keys",
    about = "AuthorizedKeysCommand for scm-ssh: %u %t %k"
)]
pub struct AuthorizedKeysArgs {
    pub user: String,
    pub key_type: String,
    pub key: String,
    #[arg(long, env = "SCM_SSH_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}
