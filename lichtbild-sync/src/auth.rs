//! Identity binding and the authentication capability.
//!
//! The rest of the core only ever consumes [`SessionBinding`]: a
//! synchronous read of the current identity plus a change subscription.
//! Mutation paths read the identity at call time, never across an await.

use crate::mint::IdMint;
use async_trait::async_trait;
use lichtbild_common::{
    model::{
        ModelValidationError,
        auth::{Password, PasswordHash, PasswordHashError, Session, SessionToken, WeakPasswordError},
        user::{DisplayName, EmailAddress, InvalidEmailError, User},
    },
    util::PositiveDuration,
};
use lichtbild_store::{
    document::UserDocument,
    store::{StoreError, UserStore},
};
use std::{collections::HashMap, str::FromStr, sync::Arc};
use thiserror::Error;
use time::UtcDateTime;
use tokio::sync::{RwLock, watch};
use tracing::debug;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("The email address is already in use")]
    EmailInUse,
    #[error(transparent)]
    WeakPassword(#[from] WeakPasswordError),
    #[error(transparent)]
    InvalidEmail(#[from] InvalidEmailError),
    #[error("Wrong password")]
    WrongPassword,
    #[error("No account exists for this email address")]
    UserNotFound,
    #[error("The provider sign-in was cancelled")]
    ProviderCancelled,
    #[error("Provider {0} is not configured")]
    ProviderNotConfigured(String),
    #[error("The session token is invalid or expired")]
    InvalidToken,
    #[error("Hashing the password failed: {0}")]
    Hash(#[from] PasswordHashError),
    #[error("A stored account document was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Backend(#[from] StoreError),
}

/// Read access to the authenticated identity.
#[derive(Clone, Debug)]
pub struct SessionBinding {
    receiver: watch::Receiver<Option<User>>,
}

impl SessionBinding {
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.receiver.borrow().clone()
    }

    /// A receiver that resolves whenever the identity transitions
    /// (sign-in, sign-out, or a different user taking over).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.receiver.clone()
    }
}

/// An authenticated session as handed back to the caller.
#[derive(Clone, Debug)]
pub struct AuthSession {
    pub user: User,
    pub token: SessionToken,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthSession, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn sign_in_with_provider(&self, provider_id: &str) -> Result<AuthSession, AuthError>;

    /// Validates a previously issued token and restores its identity.
    async fn resume_session(&self, token: &str) -> Result<User, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    fn binding(&self) -> SessionBinding;
}

/// What an external identity provider reports about an account.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ProviderAccount {
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Reference [`AuthService`] over a [`UserStore`]: argon2-hashed
/// credentials, random bearer session tokens, user documents created on
/// first authentication.
pub struct DirectoryAuthService<S> {
    users: Arc<S>,
    mint: Arc<IdMint>,
    credentials: RwLock<HashMap<String, PasswordHash>>,
    sessions: RwLock<HashMap<String, Session>>,
    providers: RwLock<HashMap<String, ProviderAccount>>,
    identity: watch::Sender<Option<User>>,
    session_expiry: Option<PositiveDuration>,
}

impl<S: UserStore> DirectoryAuthService<S> {
    #[must_use]
    pub fn new(users: Arc<S>, mint: Arc<IdMint>) -> Self {
        Self {
            users,
            mint,
            credentials: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            providers: RwLock::new(HashMap::new()),
            identity: watch::Sender::new(None),
            session_expiry: None,
        }
    }

    #[must_use]
    pub fn with_session_expiry(mut self, expiry: PositiveDuration) -> Self {
        self.session_expiry = Some(expiry);
        self
    }

    /// Registers what `provider_id` would report for the next sign-in.
    pub async fn register_provider(&self, provider_id: &str, account: ProviderAccount) {
        let mut providers = self.providers.write().await;
        providers.insert(provider_id.to_owned(), account);
    }

    async fn issue_session(&self, user: User) -> AuthSession {
        let token = SessionToken::generate_random(user.id);

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            token.as_token_str(),
            Session {
                user: user.id,
                created_at: UtcDateTime::now(),
                expires_after: self.session_expiry,
            },
        );
        drop(sessions);

        debug!(user = %user.id, "Session issued");
        self.identity.send_replace(Some(user.clone()));

        AuthSession { user, token }
    }

    fn load_user(document: UserDocument) -> Result<User, AuthError> {
        Ok(User::try_from(document)?)
    }
}

#[async_trait]
impl<S: UserStore> AuthService for DirectoryAuthService<S> {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthSession, AuthError> {
        let email = EmailAddress::new(email.to_owned())?;
        let password = Password::new(password.to_owned())?;
        let display_name =
            DisplayName::new(display_name.to_owned()).map_err(ModelValidationError::from)?;

        if self.users.find_user_by_email(email.get()).await?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let hash = PasswordHash::derive(&password)?;
        let user = User {
            id: self.mint.mint(),
            email,
            display_name,
            avatar_url: None,
        };

        self.users.put_user((&user).into()).await?;
        let mut credentials = self.credentials.write().await;
        credentials.insert(user.email.get().to_owned(), hash);
        drop(credentials);

        Ok(self.issue_session(user).await)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = EmailAddress::new(email.to_owned())?;
        let password = Password::new(password.to_owned())?;

        let document = self
            .users
            .find_user_by_email(email.get())
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let credentials = self.credentials.read().await;
        let verified = credentials
            .get(email.get())
            .map(|hash| hash.verify(&password))
            .transpose()?
            .unwrap_or(false);
        drop(credentials);

        if !verified {
            return Err(AuthError::WrongPassword);
        }

        let user = Self::load_user(document)?;
        Ok(self.issue_session(user).await)
    }

    async fn sign_in_with_provider(&self, provider_id: &str) -> Result<AuthSession, AuthError> {
        let providers = self.providers.read().await;
        let account = providers
            .get(provider_id)
            .cloned()
            .ok_or_else(|| AuthError::ProviderNotConfigured(provider_id.to_owned()))?;
        drop(providers);

        let email = EmailAddress::new(account.email)?;

        let user = match self.users.find_user_by_email(email.get()).await? {
            Some(document) => Self::load_user(document)?,
            None => {
                // First provider sign-in: create the account document,
                // falling back to the email local part for the name.
                let display_name = account
                    .display_name
                    .unwrap_or_else(|| email.local_part().to_owned());
                let user = User {
                    id: self.mint.mint(),
                    display_name: DisplayName::new(display_name)
                        .map_err(ModelValidationError::from)?,
                    email,
                    avatar_url: account.avatar_url,
                };
                self.users.put_user((&user).into()).await?;
                user
            }
        };

        Ok(self.issue_session(user).await)
    }

    async fn resume_session(&self, token: &str) -> Result<User, AuthError> {
        let parsed = SessionToken::from_str(token).map_err(|_| AuthError::InvalidToken)?;

        let sessions = self.sessions.read().await;
        let session = sessions.get(token).cloned().ok_or(AuthError::InvalidToken)?;
        drop(sessions);

        if session.user != parsed.user_id || session.is_expired(UtcDateTime::now()) {
            return Err(AuthError::InvalidToken);
        }

        let document = self
            .users
            .get_user(session.user)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let user = Self::load_user(document)?;

        self.identity.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // Issued tokens stay valid for other devices; only this binding's
        // identity goes away.
        self.identity.send_replace(None);
        Ok(())
    }

    fn binding(&self) -> SessionBinding {
        SessionBinding {
            receiver: self.identity.subscribe(),
        }
    }
}
