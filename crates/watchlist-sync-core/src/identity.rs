use tokio::sync::watch;
use tracing::{debug, info};
use watchlist_sync_config::CredentialStore;
use watchlist_sync_models::{Identity, UserId};
use crate::engine::SyncEngine;

/// Source of the signed-in identity and its changes
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Identity;

    /// Receiver marked changed whenever the identity switches
    fn watch(&self) -> watch::Receiver<Identity>;
}

/// Identity held in process, driven by explicit sign-in and sign-out
pub struct SessionIdentity {
    sender: watch::Sender<Identity>,
}

impl SessionIdentity {
    pub fn new(initial: Identity) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn anonymous() -> Self {
        Self::new(Identity::Anonymous)
    }

    /// Start from the session saved by `primescene login`, if any
    pub fn from_credentials(credentials: &CredentialStore) -> Self {
        match credentials.get_session_user_id() {
            Some(user_id) => Self::new(Identity::User(UserId::new(user_id.as_str()))),
            None => Self::anonymous(),
        }
    }

    pub fn sign_in(&self, user_id: UserId) {
        info!("Signed in as {}", user_id);
        self.sender.send_replace(Identity::User(user_id));
    }

    pub fn sign_out(&self) {
        info!("Signed out");
        self.sender.send_replace(Identity::Anonymous);
    }
}

impl IdentityProvider for SessionIdentity {
    fn current(&self) -> Identity {
        self.sender.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Identity> {
        self.sender.subscribe()
    }
}

/// Attach `engine` to the current identity and follow every change until
/// the provider goes away, then close the realtime channel.
///
/// Each switch takes effect at once; the fetch and subscribe for it run in
/// the background so a slow previous account cannot hold up the next one.
pub async fn follow_identity(engine: SyncEngine, mut identities: watch::Receiver<Identity>) {
    let initial = identities.borrow_and_update().clone();
    engine.attach(initial).await;

    while identities.changed().await.is_ok() {
        let next = identities.borrow_and_update().clone();
        debug!("Identity changed to {}", next);
        let ticket = engine.begin_attach(next);
        let worker = engine.clone();
        tokio::spawn(async move {
            worker.complete_attach(ticket).await;
        });
    }

    engine.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_session_identity_switches() {
        let session = SessionIdentity::anonymous();
        let mut receiver = session.watch();
        assert!(session.current().is_anonymous());

        session.sign_in(UserId::new("u1"));
        assert!(receiver.has_changed().unwrap());
        assert_eq!(*receiver.borrow_and_update(), Identity::user("u1"));

        session.sign_out();
        assert_eq!(session.current(), Identity::Anonymous);
    }

    #[test]
    fn test_from_credentials() {
        let mut credentials = CredentialStore::new(PathBuf::from("/tmp/none.toml"));
        assert!(SessionIdentity::from_credentials(&credentials).current().is_anonymous());

        credentials.set_session("u42".to_string(), None);
        assert_eq!(SessionIdentity::from_credentials(&credentials).current(), Identity::user("u42"));
    }
}
