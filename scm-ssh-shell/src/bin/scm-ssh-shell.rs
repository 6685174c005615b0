use clap::Parser;
use scm_ssh::acl::Validator;
use scm_ssh::config::ServerConfig;
use scm_ssh::exec::{self, ExecError};
use scm_ssh::repository::RepositoryResolver;
use scm_ssh::users::FileUserStore;
use scm_ssh_shell::cli::{session_command, ShellArgs};
use scm_ssh_shell::{log_writer, setup_tracing, transport, LogFallback};

fn isatty(stream: libc::c_int) -> bool {
    unsafe { libc::isatty(stream) != 0 }
}

fn die(error: ExecError) -> ! {
    exec::report(&error);
    std::process::exit(error.exit_code());
}

async fn serve(args: ShellArgs, config: ServerConfig) -> Result<i32, ExecError> {
    let command = session_command(
        args.requested_command(),
        isatty(libc::STDIN_FILENO),
        isatty(libc::STDOUT_FILENO),
    )?;

    let users = FileUserStore::new(&config.users_file);
    let resolver = RepositoryResolver::new(&config.repository_directory, &config.repository_type);
    let acl = Validator::from_file(&config.acl_file).map_err(|e| {
        tracing::error!(path = ?config.acl_file, error = %e, "can't load acl");
        ExecError::Internal(e.to_string())
    })?;

    let operation = exec::prepare(&command, args.user.as_deref(), &users, &resolver, &acl)?;
    transport::run(&config.git_binary, &operation).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = ShellArgs::parse();

    let config = match ServerConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => die(ExecError::Internal(e.to_string())),
    };

    // stderr belongs to the remote client; without a log file nothing is logged.
    let logging = log_writer(config.log_file.as_deref(), LogFallback::Discard)
        .and_then(setup_tracing);
    if let Err(e) = logging {
        die(ExecError::Internal(e.to_string()));
    }

    match serve(args, config).await {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            tracing::debug!(%error, code = error.exit_code(), "exiting");
            die(error)
        }
    }
}
