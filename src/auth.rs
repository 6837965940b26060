//! Bearer token resolution on top of an identity provider
//!
//! The identity SDK is an external collaborator; only its contract
//! ([`IdentityClient`]) is consumed here. [`TokenProvider`] turns it into the
//! [`CredentialResolver`] capability the session is built with.

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{AuthError, IdentityError};

/// Scopes requested when none are configured
pub const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "email"];

/// An authenticated account known to the identity client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub home_account_id: String,
    pub username: String,
}

impl Account {
    /// Identifier sent to the backend as `user_id`
    pub fn user_id(&self) -> &str {
        if self.home_account_id.is_empty() {
            &self.username
        } else {
            &self.home_account_id
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SilentRequest {
    pub scopes: Vec<String>,
    pub account: Account,
}

#[derive(Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub id_token: String,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("id_token", &"<redacted>")
            .finish()
    }
}

/// Contract of the identity provider SDK
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn initialize(&self) -> Result<(), IdentityError>;

    fn get_all_accounts(&self) -> Vec<Account>;

    /// Interactive login. The only call allowed to wait on the user.
    async fn login_popup(&self, request: &LoginRequest) -> Result<Account, IdentityError>;

    async fn acquire_token_silent(
        &self,
        request: &SilentRequest,
    ) -> Result<TokenResponse, IdentityError>;
}

/// Resolved bearer token and user identifier
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub id_token: String,
    pub user_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Capability injected into the session for every send/feedback call
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve_credentials(&self) -> Result<Credentials, AuthError>;
}

/// Resolves credentials through an [`IdentityClient`].
///
/// One attempt per call: no retry, and a failed silent acquisition does not
/// fall back to interactive login.
pub struct TokenProvider<C> {
    client: C,
    scopes: Vec<String>,
    initialized: AtomicBool,
}

impl<C: IdentityClient> TokenProvider<C> {
    pub fn new(client: C) -> Self {
        Self::with_scopes(client, DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_scopes(client: C, scopes: Vec<String>) -> Self {
        Self {
            client,
            scopes,
            initialized: AtomicBool::new(false),
        }
    }

    /// Run the client's initialization. Must succeed before any resolution.
    pub async fn initialize(&self) -> Result<(), IdentityError> {
        self.client.initialize().await?;
        self.initialized.store(true, Ordering::SeqCst);
        tracing::debug!("identity client initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn ensure_account(&self) -> Result<Account, AuthError> {
        if let Some(account) = self.client.get_all_accounts().into_iter().next() {
            return Ok(account);
        }

        tracing::info!("no cached account, starting interactive login");
        let request = LoginRequest {
            scopes: self.scopes.clone(),
        };
        self.client.login_popup(&request).await.map_err(|e| {
            tracing::warn!(error = %e, "interactive login failed");
            AuthError::LoginFailed(e)
        })
    }
}

#[async_trait]
impl<C: IdentityClient> CredentialResolver for TokenProvider<C> {
    async fn resolve_credentials(&self) -> Result<Credentials, AuthError> {
        if !self.is_initialized() {
            return Err(AuthError::NotInitialized);
        }

        let account = self.ensure_account().await?;
        let request = SilentRequest {
            scopes: self.scopes.clone(),
            account: account.clone(),
        };

        let token = self.client.acquire_token_silent(&request).await.map_err(|e| {
            tracing::warn!(error = %e, user_id = account.user_id(), "silent token acquisition failed");
            AuthError::TokenAcquisitionFailed(e)
        })?;

        if token.id_token.is_empty() {
            return Err(AuthError::TokenAcquisitionFailed(IdentityError::Other(
                "identity provider returned an empty id token".into(),
            )));
        }

        Ok(Credentials {
            id_token: token.id_token,
            user_id: account.user_id().to_string(),
        })
    }
}
