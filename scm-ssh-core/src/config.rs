use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{scm_ssh_error, ScmSshResult};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/scm-ssh/config.toml";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub repository_directory: PathBuf,
    pub repository_type: String,
    pub users_file: PathBuf,
    pub acl_file: PathBuf,
    pub git_binary: String,
    pub shell_command: String,
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            repository_directory: PathBuf::from("/var/lib/scm/repositories/git"),
            repository_type: "git".to_string(),
            users_file: PathBuf::from("/etc/scm-ssh/users.yaml"),
            acl_file: PathBuf::from("/etc/scm-ssh/acl.toml"),
            git_binary: "git".to_string(),
            shell_command: "scm-ssh-shell".to_string(),
            log_file: None,
        }
    }
}

impl ServerConfig {
    pub fn from_toml(src: &str) -> ScmSshResult<ServerConfig> {
        let config: ServerConfig = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the configuration at `path`. A file that does not exist yields
    /// the defaults.
    pub fn load(path: &Path) -> ScmSshResult<ServerConfig> {
        match std::fs::read_to_string(path) {
            Ok(src) => ServerConfig::from_toml(&src),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(?path, "no config file, using defaults");
                Ok(ServerConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn validate(&self) -> ScmSshResult<()> {
        if self.repository_type.is_empty() || self.repository_type.contains('/') {
            return Err(scm_ssh_error(&format!(
                "invalid repository_type {:?}",
                self.repository_type
            )));
        }
        if self.git_binary.trim().is_empty() {
            return Err(scm_ssh_error("git_binary must not be empty"));
        }
        if self.shell_command.trim().is_empty() {
            return Err(scm_ssh_error("shell_command must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.repository_type, "git");
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn test_partial_file() {
        let config = ServerConfig::from_toml(
            "repository_directory = \"/srv/git\"\nlog_file = \"/var/log/scm-ssh.log\"\n",
        )
        .unwrap();
        assert_eq!(config.repository_directory, PathBuf::from("/srv/git"));
        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/scm-ssh.log")));
        assert_eq!(config.git_binary, "git");
    }

    #[test]
    fn test_invalid() {
        assert!(ServerConfig::from_toml("repository_type = \"\"").is_err());
        assert!(ServerConfig::from_toml("repository_type = \"a/b\"").is_err());
        assert!(ServerConfig::from_toml("git_binary = \" \"").is_err());
        assert!(ServerConfig::from_toml("listen = \"0.0.0.0:22\"").is_err());
    }

    #[test]
    fn test_load() {
        let td = tempdir::TempDir::new("scm-ssh-config").unwrap();
        assert_eq!(
            ServerConfig::load(&td.path().join("missing.toml")).unwrap(),
            ServerConfig::default()
        );

        let path = td.path().join("config.toml");
        std::fs::write(&path, "repository_type = \"repo\"\n").unwrap();
        assert_eq!(ServerConfig::load(&path).unwrap().repository_type, "repo");
    }
}
