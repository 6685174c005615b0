//! Repository permissions, read from TOML:
//!
//! ```toml
//! [[rule]]
//! group = "developers"
//! read = ["git/.*"]
//! write = ["git/team/.*"]
//!
//! [[rule]]
//! user = "ci"
//! read = ["git/release\\.git"]
//! ```
//!
//! Patterns must match the whole repository path, without a leading `/`.
//! Write access implies read access. Admins may do anything; everyone else
//! is denied unless a rule says otherwise.

use std::collections::HashMap;

use regex::Regex;
use serde::Deserialize;

use crate::dispatch::RepositoryPath;
use crate::users::User;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

pub trait Authorizer {
    fn is_allowed(&self, user: &User, repository: &RepositoryPath, access: Access) -> bool;
}

#[derive(Debug)]
pub enum Error {
    Toml(toml::de::Error),
    Regex(regex::Error),
    Subject(usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Toml(e) => write!(f, "invalid acl file: {}", e),
            Error::Regex(e) => write!(f, "invalid pattern in acl file: {}", e),
            Error::Subject(n) => write!(f, "rule {} must name exactly one of user or group", n),
        }
    }
}

impl std::error::Error for Error {}

#[derive(Clone, Default)]
struct Patterns {
    read: Vec<Regex>,
    write: Vec<Regex>,
}

impl Patterns {
    fn allows(&self, path: &str, access: Access) -> bool {
        let write = self.write.iter().any(|r| r.is_match(path));
        match access {
            Access::Write => write,
            Access::Read => write || self.read.iter().any(|r| r.is_match(path)),
        }
    }
}

#[derive(Clone, Default)]
pub struct Validator {
    users: HashMap<String, Patterns>,
    groups: HashMap<String, Patterns>,
}

#[derive(Debug, Deserialize)]
struct Rules {
    rule: Option<Vec<Entry>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Entry {
    user: Option<String>,
    group: Option<String>,
    #[serde(default)]
    read: Vec<String>,
    #[serde(default)]
    write: Vec<String>,
}

fn compile(patterns: Vec<String>) -> Result<Vec<Regex>, Error> {
    patterns
        .into_iter()
        .map(|p| Regex::new(&format!("^(?:{})$", p)).map_err(Error::Regex))
        .collect()
}

impl Validator {
    pub fn from_toml(src: &str) -> Result<Validator, Error> {
        let parsed: Rules = toml::from_str(src).map_err(Error::Toml)?;

        let mut validator = Validator::default();
        for (n, entry) in parsed.rule.unwrap_or_default().into_iter().enumerate() {
            let target = match (entry.user, entry.group) {
                (Some(user), None) => validator.users.entry(user),
                (None, Some(group)) => validator.groups.entry(group),
                _ => return Err(Error::Subject(n + 1)),
            };
            let patterns = target.or_default();
            patterns.read.extend(compile(entry.read)?);
            patterns.write.extend(compile(entry.write)?);
        }
        Ok(validator)
    }

    pub fn from_file(path: &std::path::Path) -> crate::ScmSshResult<Validator> {
        let src = std::fs::read_to_string(path)?;
        Ok(Validator::from_toml(&src)?)
    }
}

impl Authorizer for Validator {
    fn is_allowed(&self, user: &User, repository: &RepositoryPath, access: Access) -> bool {
        if user.admin {
            return true;
        }

        let path = repository.as_str().trim_start_matches('/');

        let by_user = self
            .users
            .get(&user.name)
            .map(|p| p.allows(path, access))
            .unwrap_or(false);

        by_user
            || user
                .groups
                .iter()
                .filter_map(|g| self.groups.get(g))
                .any(|p| p.allows(path, access))
    }
}
