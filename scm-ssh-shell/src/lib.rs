pub mod cli;
pub mod transport;

use std::path::Path;
use std::sync::Mutex;

use scm_ssh::ScmSshResult;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const DEFAULT_FILTER: &str = "scm_ssh=info,scm_ssh_shell=info,scm_ssh_authorized_keys=info";

/// Where log lines go when no log file is configured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFallback {
    Stderr,
    Discard,
}

/// Writer for `log_file`, or for `fallback` when there is none. stdout
/// carries the Git protocol and is never written to.
pub fn log_writer(log_file: Option<&Path>, fallback: LogFallback) -> ScmSshResult<BoxMakeWriter> {
    Ok(match (log_file, fallback) {
        (Some(path), _) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        (None, LogFallback::Stderr) => BoxMakeWriter::new(std::io::stderr),
        (None, LogFallback::Discard) => BoxMakeWriter::new(std::io::sink),
    })
}

/// Install the global subscriber, logging through `writer`.
pub fn setup_tracing(writer: BoxMakeWriter) -> ScmSshResult<()> {
    use tracing_subscriber::Layer;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_ansi(false)
        .with_writer(writer);

    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => tracing_subscriber::EnvFilter::from_default_env(),
        _ => tracing_subscriber::EnvFilter::new(DEFAULT_FILTER),
    };

    let subscriber = filter
        .and_then(fmt_layer)
        .with_subscriber(tracing_subscriber::Registry::default());

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// The option list that binds a key to `user` through the forced command.
///
/// Names that would need quoting inside `command="..."` are refused.
pub fn forced_command_options(shell_command: &str, user: &str) -> Option<String> {
    let valid = !user.is_empty()
        && !user.starts_with('-')
        && user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@'));
    if !valid || shell_command.contains('"') || shell_command.contains('\\') {
        return None;
    }
    Some(format!(
        "command=\"{} --user {}\",restrict",
        shell_command, user
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn test_log_writer_file() {
        let td = tempdir::TempDir::new("scm-ssh-log").unwrap();
        let path = td.path().join("scm-ssh.log");
        let writer = log_writer(Some(path.as_path()), LogFallback::Discard).unwrap();
        writer.make_writer().write_all(b"hello\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn test_log_writer_unwritable_file() {
        let td = tempdir::TempDir::new("scm-ssh-log").unwrap();
        let path = td.path().join("missing/scm-ssh.log");
        assert!(log_writer(Some(path.as_path()), LogFallback::Stderr).is_err());
    }

    #[test]
    fn test_forced_command_options() {
        assert_eq!(
            forced_command_options("/usr/bin/scm-ssh-shell", "alice.b"),
            Some("command=\"/usr/bin/scm-ssh-shell --user alice.b\",restrict".to_string())
        );
        assert_eq!(forced_command_options("scm-ssh-shell", "a\"b"), None);
        assert_eq!(forced_command_options("scm-ssh-shell", "a b"), None);
        assert_eq!(forced_command_options("scm-ssh-shell", "--config"), None);
        assert_eq!(forced_command_options("scm-ssh-shell", ""), None);
        assert_eq!(forced_command_options("sh\" -c \"x", "alice"), None);
    }

    #[test]
    fn test_forced_command_options_parse_back() {
        let rsa_pub = include_str!("../../scm-ssh-core/tests/data/id_rsa.pub");
        let key = scm_ssh::authorized_keys::parse_keys(rsa_pub).remove(0);
        let options = forced_command_options("scm-ssh-shell", "alice").unwrap();
        let line = key.to_authorized_key_line(Some(&options));

        let entries = scm_ssh::authorized_keys::parse(&line);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, key);
        assert_eq!(entries[0].options[0].name, "command");
        assert_eq!(
            entries[0].options[0].value.as_deref(),
            Some("scm-ssh-shell --user alice")
        );
        assert_eq!(entries[0].options[1].name, "restrict");
    }
}
