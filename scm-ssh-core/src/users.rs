//! User records, read from a YAML file of the form
//!
//! ```yaml
//! alice:
//!   admin: true
//!   groups: [developers]
//!   authorized_keys: |
//!     ssh-rsa AAAA... alice@laptop
//! bob:
//!   active: false
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;

use serde::Deserialize;

use crate::auth::UserStore;
use crate::ScmSshResult;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub active: bool,
    pub admin: bool,
    pub groups: Vec<String>,
    pub authorized_keys: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UserRecord {
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    authorized_keys: Option<String>,
}

pub fn parse_users(src: &str) -> ScmSshResult<BTreeMap<String, User>> {
    if src.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let records: Option<BTreeMap<String, Option<UserRecord>>> = serde_yaml::from_str(src)?;

    Ok(records
        .unwrap_or_default()
        .into_iter()
        .map(|(name, record)| {
            let record = record.unwrap_or(UserRecord {
                active: true,
                admin: false,
                groups: vec![],
                authorized_keys: None,
            });
            let user = User {
                name: name.clone(),
                active: record.active,
                admin: record.admin,
                groups: record.groups,
                authorized_keys: record.authorized_keys,
            };
            (name, user)
        })
        .collect())
}

pub struct MemoryUserStore {
    users: BTreeMap<String, User>,
}

impl MemoryUserStore {
    pub fn new(users: Vec<User>) -> MemoryUserStore {
        MemoryUserStore {
            users: users.into_iter().map(|u| (u.name.clone(), u)).collect(),
        }
    }
}

impl UserStore for MemoryUserStore {
    fn find_user(&self, name: &str) -> Option<User> {
        self.users.get(name).cloned()
    }
}

struct Cached {
    modified: SystemTime,
    users: BTreeMap<String, User>,
}

/// Users backed by a YAML file. The parsed file is kept in memory and only
/// read again when its modification time changes.
pub struct FileUserStore {
    path: PathBuf,
    cache: Mutex<Option<Cached>>,
}

impl FileUserStore {
    pub fn new(path: impl Into<PathBuf>) -> FileUserStore {
        FileUserStore {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    fn load(&self) -> ScmSshResult<BTreeMap<String, User>> {
        let modified = std::fs::metadata(&self.path)?.modified()?;

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| crate::scm_ssh_error("user cache poisoned"))?;

        if let Some(cached) = cache.as_ref() {
            if cached.modified == modified {
                return Ok(cached.users.clone());
            }
        }

        tracing::debug!(path = ?self.path, "reading users file");
        let users = parse_users(&std::fs::read_to_string(&self.path)?)?;
        *cache = Some(Cached {
            modified,
            users: users.clone(),
        });
        Ok(users)
    }
}

impl UserStore for FileUserStore {
    fn find_user(&self, name: &str) -> Option<User> {
        match self.load() {
            Ok(users) => users.get(name).cloned(),
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "can't read users file");
                None
            }
        }
    }
}
