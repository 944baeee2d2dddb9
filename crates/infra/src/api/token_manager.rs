//! Access token lifecycle
//!
//! Holds the current token set and decides which grant to exchange when it
//! runs out:
//! - a stored refresh token is exchanged with the `refresh_token` grant
//! - otherwise a username/password pair uses the `password` grant
//! - otherwise the last known access token is handed out as-is
//!
//! Concurrent callers that find the token expired queue behind a single
//! refresh and share its result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use redkite_common::auth::{GrantType, TokenSet};
use redkite_domain::constants::TOKEN_REFRESH_MARGIN;
use redkite_domain::{Credentials, RedkiteError, Result};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

/// Lifetime assigned to an access token supplied directly by the caller
pub const UNMANAGED_TOKEN_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Exchanges grants for token sets
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn exchange(&self, grant: GrantType) -> Result<TokenSet>;
}

/// Token attached to one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    pub value: String,
    /// Validity left when the token was handed out
    pub remaining: Duration,
}

impl From<&TokenSet> for BearerToken {
    fn from(tokens: &TokenSet) -> Self {
        Self { value: tokens.access_token.clone(), remaining: tokens.remaining_validity() }
    }
}

pub struct TokenManager {
    source: Arc<dyn TokenSource>,
    tokens: RwLock<Option<TokenSet>>,
    refresh_lock: Mutex<()>,
    refresh_token: SyncMutex<Option<String>>,
    password_grant: Option<(String, String)>,
}

impl TokenManager {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            tokens: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refresh_token: SyncMutex::new(None),
            password_grant: None,
        }
    }

    /// Seed the manager from caller-supplied credentials
    pub fn from_credentials(source: Arc<dyn TokenSource>, credentials: &Credentials) -> Self {
        let password_grant = credentials.username.clone().zip(credentials.password.clone());
        let tokens = credentials.access_token.clone().map(|access| {
            TokenSet::new(access, None, UNMANAGED_TOKEN_LIFETIME.as_secs(), None)
        });
        Self {
            source,
            tokens: RwLock::new(tokens),
            refresh_lock: Mutex::new(()),
            refresh_token: SyncMutex::new(credentials.refresh_token.clone()),
            password_grant,
        }
    }

    /// A token valid right now, exchanging a grant if needed
    ///
    /// # Errors
    ///
    /// Propagates the token endpoint's error, or returns
    /// [`RedkiteError::AuthGrant`] when there is neither a grant to exchange
    /// nor a token to fall back on.
    pub async fn access_token(&self) -> Result<BearerToken> {
        let seen = {
            let tokens = self.tokens.read().await;
            if let Some(valid) = tokens.as_ref().filter(|t| !t.is_expired(TOKEN_REFRESH_MARGIN)) {
                return Ok(BearerToken::from(valid));
            }
            tokens.as_ref().map(|t| t.access_token.clone())
        };

        let _refreshing = self.refresh_lock.lock().await;
        // Another caller may have refreshed while this one queued; its token
        // is used as long as it has not expired outright
        if let Some(token) = self.replaced_token(seen.as_deref()).await {
            return Ok(token);
        }

        let Some(grant) = self.refresh_grant() else {
            return self.stale_token().await;
        };
        debug!(grant = grant.name(), "refreshing access token");
        let tokens = self.source.exchange(grant).await?;
        self.store(tokens).await;
        info!("Access token refreshed");

        self.tokens
            .read()
            .await
            .as_ref()
            .map(BearerToken::from)
            .ok_or_else(|| RedkiteError::AuthGrant("token was cleared during refresh".into()))
    }

    async fn replaced_token(&self, seen: Option<&str>) -> Option<BearerToken> {
        let tokens = self.tokens.read().await;
        let current = tokens.as_ref()?;
        let usable = if Some(current.access_token.as_str()) == seen {
            !current.is_expired(TOKEN_REFRESH_MARGIN)
        } else {
            !current.is_expired(Duration::ZERO)
        };
        usable.then(|| BearerToken::from(current))
    }

    async fn stale_token(&self) -> Result<BearerToken> {
        self.tokens.read().await.as_ref().map(BearerToken::from).ok_or_else(|| {
            RedkiteError::AuthGrant(
                "no access token is available and no refresh token or username/password \
                 is configured to obtain one"
                    .into(),
            )
        })
    }

    fn refresh_grant(&self) -> Option<GrantType> {
        if let Some(refresh_token) = self.refresh_token.lock().clone() {
            return Some(GrantType::RefreshToken { refresh_token });
        }
        self.password_grant
            .clone()
            .map(|(username, password)| GrantType::Password { username, password })
    }

    /// Install a freshly exchanged token set
    ///
    /// A refresh token in the set replaces the stored one.
    pub async fn store(&self, tokens: TokenSet) {
        if let Some(refresh) = &tokens.refresh_token {
            *self.refresh_token.lock() = Some(refresh.clone());
        }
        *self.tokens.write().await = Some(tokens);
    }

    /// Mark the current token expired so the next caller refreshes it
    pub async fn invalidate(&self) {
        if let Some(tokens) = self.tokens.write().await.as_mut() {
            tokens.expires_at = Instant::now();
        }
    }

    /// Expire the current token only if it is still `access_token`
    ///
    /// A rejection of a token that has since been replaced leaves the
    /// replacement alone. Returns whether anything was expired.
    pub async fn invalidate_if(&self, access_token: &str) -> bool {
        let mut tokens = self.tokens.write().await;
        match tokens.as_mut() {
            Some(current) if current.access_token == access_token => {
                current.expires_at = Instant::now();
                true
            }
            _ => false,
        }
    }

    /// Forget the access token and its scope
    pub async fn clear_access(&self) {
        *self.tokens.write().await = None;
    }

    /// Forget every token, including the refresh token
    pub async fn clear_all(&self) {
        self.clear_access().await;
        *self.refresh_token.lock() = None;
    }

    pub async fn current(&self) -> Option<TokenSet> {
        self.tokens.read().await.clone()
    }

    pub async fn scope(&self) -> Vec<String> {
        self.tokens.read().await.as_ref().map(|t| t.scope.clone()).unwrap_or_default()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.refresh_token.lock().clone()
    }
}
