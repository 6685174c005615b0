use crate::shell;

const UPLOAD_PACK: &str = "git-upload-pack";
const RECEIVE_PACK: &str = "git-receive-pack";
const TIMEOUT_FLAG: &str = "--timeout=";

/// A repository path as requested by the client, with backslashes turned
/// into forward slashes and guaranteed to hold no `..` segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepositoryPath(String);

impl RepositoryPath {
    pub fn new(path: &str) -> Option<RepositoryPath> {
        let path = path.replace('\\', "/");
        if path.split('/').any(|segment| segment == "..") {
            return None;
        }
        Some(RepositoryPath(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepositoryPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    InvalidSyntax,
    UnsupportedCommand,
    UnsupportedParameter,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Rejection::InvalidSyntax => "Invalid command line.",
            Rejection::UnsupportedCommand => "Not a supported Git command.",
            Rejection::UnsupportedParameter => "Unsupported parameter specified for Git command.",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Rejection {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedGitCommand {
    UploadPack {
        repository: RepositoryPath,
        strict: bool,
        /// Seconds; zero means no timeout.
        timeout: u32,
    },
    ReceivePack {
        repository: RepositoryPath,
    },
    Rejected(Rejection),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Service {
    UploadPack,
    ReceivePack,
}

/// Tokenize and dispatch a raw exec request.
pub fn parse_command_line(command_line: &str) -> ParsedGitCommand {
    match shell::split(command_line) {
        Ok(tokens) => dispatch(tokens.as_slice()),
        Err(e) => {
            tracing::debug!(error = %e, "rejecting command line");
            ParsedGitCommand::Rejected(Rejection::InvalidSyntax)
        }
    }
}

pub fn dispatch<S: AsRef<str>>(tokens: &[S]) -> ParsedGitCommand {
    match dispatch_inner(tokens) {
        Ok(command) => command,
        Err(rejection) => ParsedGitCommand::Rejected(rejection),
    }
}

fn dispatch_inner<S: AsRef<str>>(tokens: &[S]) -> Result<ParsedGitCommand, Rejection> {
    let tokens: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();

    let (service, args) = match tokens.as_slice() {
        [] | [_] => return Err(Rejection::UnsupportedCommand),
        ["git", "upload-pack", rest @ ..] | [UPLOAD_PACK, rest @ ..] => {
            (Service::UploadPack, rest)
        }
        ["git", "receive-pack", rest @ ..] | [RECEIVE_PACK, rest @ ..] => {
            (Service::ReceivePack, rest)
        }
        _ => return Err(Rejection::UnsupportedCommand),
    };

    let mut directory: Option<&str> = None;
    let mut strict = false;
    let mut timeout = 0u32;

    for arg in args {
        if service == Service::UploadPack && *arg == "--strict" {
            strict = true;
        } else if let (Service::UploadPack, Some(value)) =
            (service, arg.strip_prefix(TIMEOUT_FLAG))
        {
            timeout = parse_timeout(value)?;
        } else if arg.starts_with('-') {
            return Err(Rejection::UnsupportedParameter);
        } else if directory.is_some() {
            return Err(Rejection::UnsupportedParameter);
        } else {
            directory = Some(*arg);
        }
    }

    let directory = directory.ok_or(Rejection::UnsupportedCommand)?;
    let repository = RepositoryPath::new(directory).ok_or(Rejection::UnsupportedParameter)?;

    Ok(match service {
        Service::UploadPack => ParsedGitCommand::UploadPack {
            repository,
            strict,
            timeout,
        },
        Service::ReceivePack => ParsedGitCommand::ReceivePack { repository },
    })
}

fn parse_timeout(value: &str) -> Result<u32, Rejection> {
    let timeout: i64 = value
        .parse()
        .map_err(|_| Rejection::UnsupportedParameter)?;
    u32::try_from(timeout).map_err(|_| Rejection::UnsupportedParameter)
}
