//! Session identity: the currently authenticated user.
//!
//! `IdentityContext` is the root of the manager DAG. It watches the
//! identity provider's signal, resolves the signalled user id against
//! the repository and publishes the full [`User`] for downstream
//! managers (RouteLifecycle subscribes to it).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::Utc;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::model::{User, UserPreferences};
use crate::observable::{Observable, Subscription};
use crate::providers::IdentityProvider;
use crate::storage::Repository;

pub struct IdentityContext {
    provider: Arc<dyn IdentityProvider>,
    repo: Arc<dyn Repository>,
    current_user: Observable<Option<User>>,
    /// Bumped on every signal change; stale fetches check it before
    /// publishing so a signed-out session cannot be resurrected.
    generation: AtomicU64,
    self_weak: Weak<Self>,
    _signal_sub: Mutex<Option<Subscription>>,
}

impl IdentityContext {
    /// Build the context and attach it to the provider signal.
    ///
    /// Must be called within a tokio runtime: signal changes spawn
    /// background user fetches.
    pub fn new(provider: Arc<dyn IdentityProvider>, repo: Arc<dyn Repository>) -> Arc<Self> {
        let ctx = Arc::new_cyclic(|weak| Self {
            provider: Arc::clone(&provider),
            repo,
            current_user: Observable::new(None),
            generation: AtomicU64::new(0),
            self_weak: weak.clone(),
            _signal_sub: Mutex::new(None),
        });

        let weak = Arc::downgrade(&ctx);
        let sub = provider.signal().subscribe(move |user_id| {
            if let Some(ctx) = weak.upgrade() {
                ctx.on_signal(user_id.clone());
            }
        });
        *ctx._signal_sub
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sub);
        ctx
    }

    fn on_signal(&self, user_id: Option<String>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        match user_id {
            None => {
                self.current_user.set(None);
            }
            Some(id) => {
                let Some(ctx) = self.self_weak.upgrade() else {
                    return;
                };
                tokio::spawn(async move {
                    let fetched = ctx.repo.fetch_user(&id).await;
                    if ctx.generation.load(Ordering::SeqCst) != generation {
                        return; // signal moved on, result is stale
                    }
                    match fetched {
                        Ok(user) => {
                            info!(user_id = %user.id, "session user resolved");
                            ctx.current_user.set(Some(user));
                        }
                        Err(err) => {
                            warn!(user_id = %id, error = %err, "failed to resolve session user");
                            ctx.current_user.set(None);
                        }
                    }
                });
            }
        }
    }

    /// The published current-user value.
    pub fn current_user(&self) -> Observable<Option<User>> {
        self.current_user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user.get().is_some()
    }

    /// Verify credentials, resolve and publish the user.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, CoreError> {
        let user_id = self.provider.authenticate(email, password).await?;
        let user = self.repo.fetch_user(&user_id).await?;
        self.publish_directly(Some(user.clone()));
        Ok(user)
    }

    /// Create an account, persist a fresh user record with default
    /// preferences and publish it.
    pub async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<User, CoreError> {
        let user_id = self.provider.register(email, password, name).await?;
        let user = User::new(user_id, email, name);
        self.repo.save_user(&user).await?;
        self.publish_directly(Some(user.clone()));
        Ok(user)
    }

    pub async fn sign_out(&self) {
        self.provider.sign_out().await;
        self.current_user.set(None);
    }

    /// Replace the current user's preference bundle.
    ///
    /// # Errors
    /// [`CoreError::Auth`] when no user is signed in; persistence errors
    /// abort the update without touching the published user.
    pub async fn update_preferences(&self, preferences: UserPreferences) -> Result<User, CoreError> {
        let Some(current) = self.current_user.get() else {
            return Err(CoreError::Auth("no user signed in".into()));
        };
        let updated = User {
            preferences,
            last_login: Utc::now(),
            ..current
        };
        self.repo.update_user(&updated).await?;
        self.publish_directly(Some(updated.clone()));
        Ok(updated)
    }

    /// Publish a user resolved on the calling path, invalidating any
    /// signal-triggered fetch still in flight so it cannot overwrite
    /// this value when it lands.
    fn publish_directly(&self, user: Option<User>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.current_user.set(user);
    }
}
