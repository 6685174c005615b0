#![warn(unused_extern_crates)]

#[macro_export]
macro_rules! some_or {
    ($e:expr, $b:block) => {
        if let Some(x) = $e { x } else { $b }
    };
}

pub mod acl;
pub mod auth;
pub mod authorized_keys;
pub mod config;
pub mod dispatch;
pub mod exec;
pub mod keys;
pub mod repository;
pub mod shell;
pub mod users;
pub mod wire;

pub use auth::{AuthenticationVerdict, Identity};
pub use dispatch::{ParsedGitCommand, Rejection, RepositoryPath};
pub use keys::SshPublicKey;

#[derive(Debug, Clone)]
pub struct ScmSshError(pub String);

pub fn scm_ssh_error(s: &str) -> ScmSshError {
    ScmSshError(s.to_owned())
}

impl std::fmt::Display for ScmSshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScmSshError({})", self.0)
    }
}

pub type ScmSshResult<T> = Result<T, ScmSshError>;

impl<T> From<T> for ScmSshError
where
    T: std::error::Error,
{
    fn from(item: T) -> Self {
        tracing::event!(tracing::Level::ERROR, item = ?item, error = true);
        scm_ssh_error(&format!("converted {:?}", item))
    }
}
