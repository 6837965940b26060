//! Terminal identity collaborator for the CLI
//!
//! Interactive login prints the provider's authorize URL and reads the
//! resulting id token from the terminal. `ZOE_ID_TOKEN` skips the prompt.
//! The signed-in account and its token are cached in memory only.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::auth::{Account, IdentityClient, LoginRequest, SilentRequest, TokenResponse};
use crate::config::Config;
use crate::error::IdentityError;

pub const ENV_ID_TOKEN: &str = "ZOE_ID_TOKEN";
pub const ENV_USER: &str = "ZOE_USER";

#[derive(Debug, Clone)]
struct Cached {
    account: Account,
    id_token: String,
}

pub struct TerminalIdentity<R> {
    client_id: Option<String>,
    authority: String,
    redirect_uri: String,
    username: String,
    preset_token: Option<String>,
    input: Arc<tokio::sync::Mutex<R>>,
    cache: Mutex<Option<Cached>>,
}

impl<R: AsyncBufRead + Unpin + Send> TerminalIdentity<R> {
    pub fn new(config: &Config, input: R) -> Self {
        Self::shared(config, Arc::new(tokio::sync::Mutex::new(input)))
    }

    /// Share the input with another reader, e.g. the REPL reading stdin
    pub fn shared(config: &Config, input: Arc<tokio::sync::Mutex<R>>) -> Self {
        Self {
            client_id: config.client_id.clone(),
            authority: config.authority.trim_end_matches('/').to_string(),
            redirect_uri: config.redirect_uri.clone(),
            username: "user".to_string(),
            preset_token: None,
            input,
            cache: Mutex::new(None),
        }
    }

    /// Pick up `ZOE_ID_TOKEN` / `ZOE_USER` (falling back to `USER`)
    pub fn with_env(mut self) -> Self {
        let get = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        self.preset_token = get(ENV_ID_TOKEN);
        if let Some(user) = get(ENV_USER).or_else(|| get("USER")) {
            self.username = user;
        }
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.preset_token = Some(token.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, Option<Cached>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Where the user signs in to obtain an id token
    pub fn authorize_url(&self, scopes: &[String]) -> Result<String, IdentityError> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or_else(|| IdentityError::Other("no client id configured".into()))?;
        let nonce = uuid::Uuid::new_v4().to_string();
        let url = reqwest::Url::parse_with_params(
            &format!("{}/oauth2/v2.0/authorize", self.authority),
            &[
                ("client_id", client_id),
                ("response_type", "id_token"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_mode", "fragment"),
                ("scope", scopes.join(" ").as_str()),
                ("nonce", nonce.as_str()),
            ],
        )
        .map_err(|e| IdentityError::Other(format!("invalid authority URL: {}", e)))?;
        Ok(url.to_string())
    }

    async fn read_token(&self, scopes: &[String]) -> Result<String, IdentityError> {
        let url = self.authorize_url(scopes)?;
        eprintln!("Sign in to continue:\n  {}\n", url);
        eprintln!("Paste the id_token from the redirect (empty line cancels):");

        let mut line = String::new();
        let read = self
            .input
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(|e| IdentityError::Other(format!("failed to read token: {}", e)))?;

        let token = line.trim();
        if read == 0 || token.is_empty() {
            return Err(IdentityError::Cancelled);
        }
        Ok(token.to_string())
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> IdentityClient for TerminalIdentity<R> {
    async fn initialize(&self) -> Result<(), IdentityError> {
        if self.preset_token.is_none() && self.client_id.is_none() {
            return Err(IdentityError::Other(format!(
                "no client id configured and {} is unset",
                ENV_ID_TOKEN
            )));
        }
        Ok(())
    }

    fn get_all_accounts(&self) -> Vec<Account> {
        self.cache().iter().map(|c| c.account.clone()).collect()
    }

    async fn login_popup(&self, request: &LoginRequest) -> Result<Account, IdentityError> {
        let id_token = match &self.preset_token {
            Some(token) => token.clone(),
            None => self.read_token(&request.scopes).await?,
        };

        let account = Account {
            home_account_id: String::new(),
            username: self.username.clone(),
        };
        *self.cache() = Some(Cached {
            account: account.clone(),
            id_token,
        });
        tracing::info!(user = %account.username, "signed in");
        Ok(account)
    }

    async fn acquire_token_silent(
        &self,
        request: &SilentRequest,
    ) -> Result<TokenResponse, IdentityError> {
        match self.cache().as_ref() {
            Some(cached) if cached.account == request.account => Ok(TokenResponse {
                id_token: cached.id_token.clone(),
            }),
            _ => Err(IdentityError::InteractionRequired(
                "no cached token for account".into(),
            )),
        }
    }
}
