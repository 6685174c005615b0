use clap::Parser;
use scm_ssh::auth::{authenticate, AuthenticationVerdict};
use scm_ssh::config::ServerConfig;
use scm_ssh::users::FileUserStore;
use scm_ssh::{scm_ssh_error, wire, ScmSshResult};
use scm_ssh_shell::cli::AuthorizedKeysArgs;
use scm_ssh_shell::{forced_command_options, log_writer, setup_tracing, LogFallback};

/// Print the `authorized_keys` line for an accepted key. Returns whether a
/// line was printed; sshd treats empty output as "no keys".
fn run(args: &AuthorizedKeysArgs, config: &ServerConfig) -> ScmSshResult<bool> {
    let key = match wire::decode(&args.key_type, &args.key) {
        Ok(key) => key,
        Err(e) => {
            tracing::info!(user = %args.user, key_type = %args.key_type, error = %e, "unusable key");
            return Ok(false);
        }
    };

    let users = FileUserStore::new(&config.users_file);
    let identity = match authenticate(&users, &args.user, &key) {
        AuthenticationVerdict::Success(identity) => identity,
        verdict => {
            tracing::info!(user = %args.user, ?verdict, "key rejected");
            return Ok(false);
        }
    };

    let options = forced_command_options(&config.shell_command, &identity.name)
        .ok_or_else(|| scm_ssh_error(&format!("can't bind user {:?}", identity.name)))?;

    tracing::info!(user = %identity.name, bits = key.bits(), "key accepted");
    println!("{}", key.to_authorized_key_line(Some(&options)));
    Ok(true)
}

fn main() {
    let args = AuthorizedKeysArgs::parse();

    let config = match ServerConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("scm-ssh-authorized-keys: can't load {}: {}", args.config.display(), e);
            std::process::exit(2);
        }
    };

    // sshd records this helper's stderr in its own log.
    let logging =
        log_writer(config.log_file.as_deref(), LogFallback::Stderr).and_then(setup_tracing);
    if let Err(e) = logging {
        eprintln!("scm-ssh-authorized-keys: can't set up logging: {}", e);
    }

    match run(&args, &config) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!(error = %e, "failed");
            std::process::exit(2);
        }
    }
}
