pub mod keyring;
pub mod store;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::watch;

use crate::api::{ApiError, Credential, TaskApi};
use crate::core::task::{AuthGrant, SignIn, SignUp, User};
use store::{CredentialStore, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("could not store credential: {0}")]
    Store(#[from] StoreError),
}

/// Who is signed in, and with which token.
///
/// The user is published on a watch channel so other components (the task list
/// controller in particular) can react to sign-in and sign-out without holding
/// a reference back to the session.
pub struct Session<S, A> {
    store: S,
    api: Arc<A>,
    credential: Credential,
    user: watch::Sender<Option<User>>,
    loading: AtomicBool,
}

impl<S: CredentialStore, A: TaskApi> Session<S, A> {
    /// `credential` must be the same slot the API client reads its bearer token from.
    pub fn new(store: S, api: Arc<A>, credential: Credential) -> Self {
        Self {
            store,
            api,
            credential,
            user: watch::Sender::new(None),
            loading: AtomicBool::new(true),
        }
    }

    /// Restore the previous session, if any, from the stored token.
    ///
    /// A token the server no longer accepts is removed. Loading is always
    /// cleared at the end, whatever happened.
    pub async fn initialize(&self) -> Option<User> {
        self.loading.store(true, Ordering::Relaxed);

        let token = match self.store.load().await {
            Ok(token) => token,
            Err(e) => {
                log::warn!("Could not read stored credential: {}", e);
                None
            }
        };

        let user = match token {
            Some(token) => {
                self.credential.set(Some(token));
                self.fetch_user().await
            }
            None => {
                log::info!("No stored credential, starting signed out");
                None
            }
        };

        self.loading.store(false, Ordering::Relaxed);
        user
    }

    /// Record a completed sign-in. No server round-trip.
    pub async fn login(&self, token: &str, user: User) -> Result<(), StoreError> {
        self.store.save(token).await?;
        self.credential.set(Some(token.to_string()));
        log::info!("Signed in as {}", user.email);
        self.user.send_replace(Some(user));
        Ok(())
    }

    /// Exchange email and password for a token, then [`Self::login`] with it.
    pub async fn sign_in(&self, credentials: &SignIn) -> Result<User, SessionError> {
        let grant = self.api.sign_in(credentials).await?;
        self.accept(grant).await
    }

    /// Create an account and sign straight into it.
    pub async fn sign_up(&self, account: &SignUp) -> Result<User, SessionError> {
        let grant = self.api.sign_up(account).await?;
        log::info!("Created account {}", grant.user.email);
        self.accept(grant).await
    }

    async fn accept(&self, grant: AuthGrant) -> Result<User, SessionError> {
        self.login(&grant.token, grant.user.clone()).await?;
        Ok(grant.user)
    }

    /// Persist a token obtained elsewhere and resolve it to a user through `/auth/me`.
    pub async fn login_with_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        self.store.save(token).await?;
        self.credential.set(Some(token.to_string()));
        Ok(self.fetch_user().await)
    }

    pub async fn logout(&self) -> Result<(), StoreError> {
        self.credential.set(None);
        if let Some(user) = self.user.send_replace(None) {
            log::info!("Signed out {}", user.email);
        }
        self.store.clear().await
    }

    async fn fetch_user(&self) -> Option<User> {
        match self.api.current_user().await {
            Ok(user) => {
                log::info!("Signed in as {}", user.email);
                self.user.send_replace(Some(user.clone()));
                Some(user)
            }
            Err(e) => {
                log::info!("Stored credential rejected, clearing it: {}", e);
                self.credential.set(None);
                if let Err(e) = self.store.clear().await {
                    log::warn!("Failed to remove rejected credential: {}", e);
                }
                self.user.send_replace(None);
                None
            }
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.borrow().is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Relaxed)
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}
