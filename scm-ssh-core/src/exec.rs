//! From a raw exec request to an operation that is ready to run.

use std::io::Write;
use std::path::PathBuf;

use crate::acl::{Access, Authorizer};
use crate::auth::UserStore;
use crate::dispatch::{self, ParsedGitCommand, Rejection, RepositoryPath};
use crate::repository::RepositoryResolver;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecError {
    Internal(String),
    UnsupportedCommand,
    UnsupportedParameter,
    NotFound,
    Forbidden,
    NoIdentity,
    InvalidSyntax,
    NoCommand,
}

impl ExecError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecError::Internal(_) => -1,
            ExecError::UnsupportedCommand => -2,
            ExecError::UnsupportedParameter => -3,
            ExecError::NotFound => -4,
            ExecError::Forbidden => -5,
            ExecError::NoIdentity => -6,
            ExecError::InvalidSyntax => -7,
            ExecError::NoCommand => 1,
        }
    }

    /// The line shown to the remote user.
    pub fn message(&self) -> &'static str {
        match self {
            ExecError::Internal(_) | ExecError::NoIdentity => "Internal error",
            ExecError::UnsupportedCommand => "Not a supported Git command.",
            ExecError::UnsupportedParameter => "Unsupported parameter specified for Git command.",
            ExecError::NotFound => "The requested repository does not exist.",
            ExecError::Forbidden => "Permission denied.",
            ExecError::InvalidSyntax => "Invalid command line.",
            ExecError::NoCommand => "This is not a shell.",
        }
    }
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::Internal(detail) => write!(f, "{}: {}", self.message(), detail),
            _ => f.write_str(self.message()),
        }
    }
}

impl std::error::Error for ExecError {}

impl From<Rejection> for ExecError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::InvalidSyntax => ExecError::InvalidSyntax,
            Rejection::UnsupportedCommand => ExecError::UnsupportedCommand,
            Rejection::UnsupportedParameter => ExecError::UnsupportedParameter,
        }
    }
}

/// Write `message` as one line to `primary`, or to `fallback` if that fails.
pub fn write_message(primary: &mut dyn Write, fallback: &mut dyn Write, message: &str) {
    let written = writeln!(primary, "{}", message).and_then(|_| primary.flush());
    if written.is_err() {
        let _ = writeln!(fallback, "{}", message).and_then(|_| fallback.flush());
    }
}

/// Report `error` to the remote user on stderr, falling back to stdout.
pub fn report(error: &ExecError) {
    write_message(
        &mut std::io::stderr(),
        &mut std::io::stdout(),
        error.message(),
    );
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GitOperation {
    UploadPack { strict: bool, timeout: u32 },
    ReceivePack,
}

impl GitOperation {
    pub fn access(&self) -> Access {
        match self {
            GitOperation::UploadPack { .. } => Access::Read,
            GitOperation::ReceivePack => Access::Write,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub operation: GitOperation,
    /// Logical path of the repository that was found, not the path as the
    /// client spelled it.
    pub repository: RepositoryPath,
    pub directory: PathBuf,
    pub user: String,
}

#[tracing::instrument(skip(users, resolver, authorizer))]
pub fn prepare(
    command_line: &str,
    identity: Option<&str>,
    users: &dyn UserStore,
    resolver: &RepositoryResolver,
    authorizer: &dyn Authorizer,
) -> Result<Operation, ExecError> {
    let (operation, requested) = match dispatch::parse_command_line(command_line) {
        ParsedGitCommand::UploadPack {
            repository,
            strict,
            timeout,
        } => (GitOperation::UploadPack { strict, timeout }, repository),
        ParsedGitCommand::ReceivePack { repository } => (GitOperation::ReceivePack, repository),
        ParsedGitCommand::Rejected(rejection) => {
            tracing::info!(%rejection, "rejected command");
            return Err(rejection.into());
        }
    };

    let identity = identity.ok_or_else(|| {
        tracing::error!("no identity bound to session");
        ExecError::NoIdentity
    })?;
    let user = users.find_user(identity).ok_or_else(|| {
        tracing::error!(identity, "unknown identity");
        ExecError::NoIdentity
    })?;
    if !user.active {
        tracing::warn!(identity, "user is deactivated");
        return Err(ExecError::Forbidden);
    }

    let strict = match operation {
        GitOperation::UploadPack { strict, .. } => strict,
        GitOperation::ReceivePack => true,
    };
    let resolved = resolver.resolve(&requested, strict).ok_or_else(|| {
        tracing::info!(%requested, "repository not found");
        ExecError::NotFound
    })?;
    let repository = resolved.repository;

    if !authorizer.is_allowed(&user, &repository, operation.access()) {
        tracing::warn!(identity, %repository, access = ?operation.access(), "permission denied");
        return Err(ExecError::Forbidden);
    }

    tracing::info!(identity, %repository, ?operation, "accepted");
    Ok(Operation {
        operation,
        repository,
        directory: resolved.directory,
        user: user.name,
    })
}
