use crate::authorized_keys;
use crate::keys::{self, SshPublicKey};
use crate::users::User;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthenticationVerdict {
    Success(Identity),
    Failed,
    NotFound,
}

pub trait UserStore {
    fn find_user(&self, name: &str) -> Option<User>;
}

/// Decide whether `presented` is one of the keys in `stored`.
///
/// An identity without any key text is treated exactly like an identity
/// that does not exist.
pub fn decide(
    identity: &str,
    presented: &SshPublicKey,
    stored: Option<&str>,
) -> AuthenticationVerdict {
    let stored = match stored {
        Some(text) if !text.trim().is_empty() => text,
        _ => return AuthenticationVerdict::NotFound,
    };

    let candidates = authorized_keys::parse_keys(stored);
    if keys::contains(&candidates, presented) {
        AuthenticationVerdict::Success(Identity {
            name: identity.to_string(),
        })
    } else {
        AuthenticationVerdict::Failed
    }
}

#[tracing::instrument(skip(store, presented), fields(key_type = %presented.key_type()))]
pub fn authenticate(
    store: &dyn UserStore,
    username: &str,
    presented: &SshPublicKey,
) -> AuthenticationVerdict {
    let user = crate::some_or!(store.find_user(username), {
        tracing::info!("unknown user");
        return AuthenticationVerdict::NotFound;
    });

    if !user.active {
        tracing::info!("user is deactivated");
        return AuthenticationVerdict::Failed;
    }

    let verdict = decide(&user.name, presented, user.authorized_keys.as_deref());
    tracing::debug!(?verdict);
    verdict
}
