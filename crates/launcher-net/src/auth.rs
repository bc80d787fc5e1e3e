//! Auth controller.
//!
//! Owns the signed-in [`Account`] and the token source serving access
//! tokens to authenticated callers. Tokens refresh lazily: the source is
//! consulted on use, refreshes against the token endpoint when the access
//! token is near expiry, and fires a change callback so the rotated pair
//! is persisted.
//!
//! The token source observes the profile through that callback only. It
//! holds no reference back into the controller, so account → profile →
//! token source forms no cycle.

use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, error, info};

use launcher_store::{Account, BlobStore, Paths, Token};

use crate::error::FetchError;

/// Client identifier presented in refresh requests.
const OAUTH_CLIENT_ID: &str = "hytale-launcher";

/// Refresh when the access token expires within this margin.
const REFRESH_MARGIN_SECS: i64 = 30;

/// Change callback fired after an observed token rotation.
type OnTokenChange = Box<dyn Fn(&Token) + Send + Sync>;

/// Token endpoint answer for a refresh grant.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

/// Serves access tokens, refreshing on demand.
///
/// Held behind an async mutex so concurrent callers share one refresh.
pub struct TokenSource {
    http: reqwest::Client,
    token_url: String,
    current: Token,
    on_change: OnTokenChange,
}

impl TokenSource {
    fn new(
        http: reqwest::Client,
        token_url: String,
        current: Token,
        on_change: OnTokenChange,
    ) -> TokenSource {
        TokenSource {
            http,
            token_url,
            current,
            on_change,
        }
    }

    /// A valid access token, refreshed if necessary.
    async fn token(&mut self) -> Result<Token, FetchError> {
        if !self.current.is_expired(Duration::seconds(REFRESH_MARGIN_SECS)) {
            return Ok(self.current.clone());
        }

        debug!("access token near expiry, refreshing");
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.current.refresh_token.as_str()),
                ("client_id", OAUTH_CLIENT_ID),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Auth(format!(
                "token refresh rejected with status {status}"
            )));
        }

        let refreshed: TokenResponse = resp.json().await?;
        let token = Token {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token,
            expiry: Utc::now() + Duration::seconds(refreshed.expires_in),
        };

        // Notify only when the pair actually rotated.
        if token.access_token != self.current.access_token
            || token.refresh_token != self.current.refresh_token
        {
            self.current = token.clone();
            (self.on_change)(&token);
        } else {
            self.current = token.clone();
        }

        Ok(token)
    }
}

/// Authentication state and token lifecycle.
pub struct AuthController {
    account: Arc<Mutex<Option<Account>>>,
    source: tokio::sync::Mutex<Option<TokenSource>>,
    store: Arc<BlobStore>,
    paths: Paths,
    http: reqwest::Client,
    token_url: String,
}

impl AuthController {
    /// A controller with no session loaded yet.
    pub fn new(
        store: Arc<BlobStore>,
        paths: Paths,
        http: reqwest::Client,
        token_url: String,
    ) -> AuthController {
        AuthController {
            account: Arc::new(Mutex::new(None)),
            source: tokio::sync::Mutex::new(None),
            store,
            paths,
            http,
            token_url,
        }
    }

    /// Load the account from disk and restore the session.
    ///
    /// A missing file means "not logged in". A corrupted file is logged,
    /// removed, and the launcher continues unauthenticated; init itself
    /// never fails the startup sequence.
    pub async fn init(&self) {
        match Account::read_file(&self.store, &self.paths) {
            Ok(account) => self.restore(account).await,
            Err(err) if err.is_not_found() => {}
            Err(err) => {
                error!(error = %err, "unable to read account file, logging out");
                if let Err(remove_err) = Account::remove_file(&self.store, &self.paths) {
                    error!(error = %remove_err, "failed to remove invalid account file");
                }
            }
        }
    }

    /// Install a freshly authenticated account (post-OAuth) and persist it.
    pub async fn set_account(&self, account: Account) {
        self.restore(account).await;
        self.save_account("account_set");
    }

    /// Clear the session and remove the account file.
    pub async fn logout(&self) -> Result<(), FetchError> {
        *self.account.lock() = None;
        *self.source.lock().await = None;
        Account::remove_file(&self.store, &self.paths)
            .map_err(|e| FetchError::Auth(format!("failed to remove account file: {e}")))?;
        info!("logged out");
        Ok(())
    }

    /// Whether an authenticated session is active.
    pub async fn is_logged_in(&self) -> bool {
        let has_account = self.account.lock().is_some();
        if !has_account {
            return false;
        }
        self.source.lock().await.is_some()
    }

    /// A snapshot of the current account.
    pub fn account(&self) -> Option<Account> {
        self.account.lock().clone()
    }

    /// Run `f` against the live account and persist with `cause`.
    pub fn update_account(&self, cause: &str, f: impl FnOnce(&mut Account)) {
        {
            let mut guard = self.account.lock();
            match guard.as_mut() {
                Some(account) => f(account),
                None => return,
            }
        }
        self.save_account(cause);
    }

    /// Persist the current account, logging `cause`. Failures are logged,
    /// never raised.
    pub fn save_account(&self, cause: &str) {
        let snapshot = self.account.lock().clone();
        let Some(account) = snapshot else {
            return;
        };

        debug!(cause, "saving account");
        if let Err(err) = account.write_file(&self.store, &self.paths) {
            error!(cause, error = %err, "unable to save account file");
        }
    }

    /// A valid access token for the active profile, refreshing on use.
    pub async fn access_token(&self) -> Result<String, FetchError> {
        let mut guard = self.source.lock().await;
        let source = guard
            .as_mut()
            .ok_or_else(|| FetchError::Auth("not logged in".to_string()))?;
        Ok(source.token().await?.access_token)
    }

    async fn restore(&self, account: Account) {
        let token = account
            .current_profile()
            .map(|p| p.token.clone())
            .or_else(|| account.profiles.first().map(|p| p.token.clone()));

        let source = token.map(|token| {
            TokenSource::new(
                self.http.clone(),
                self.token_url.clone(),
                token,
                self.change_callback(),
            )
        });

        *self.account.lock() = Some(account);
        *self.source.lock().await = source;
    }

    /// The persistence callback handed to the token source.
    ///
    /// Captures the shared account slot rather than the controller, and
    /// writes through the blob store only when the pair changed.
    fn change_callback(&self) -> OnTokenChange {
        let account = Arc::clone(&self.account);
        let store = Arc::clone(&self.store);
        let paths = self.paths.clone();

        Box::new(move |token: &Token| {
            let snapshot = {
                let mut guard = account.lock();
                let Some(account) = guard.as_mut() else {
                    return;
                };
                let Some(profile) = account.current_profile_mut() else {
                    return;
                };
                if profile.token.access_token == token.access_token
                    && profile.token.refresh_token == token.refresh_token
                {
                    return;
                }
                profile.token = token.clone();
                account.clone()
            };

            debug!(cause = "token_changed", "saving account");
            if let Err(err) = snapshot.write_file(&store, &paths) {
                error!(error = %err, "unable to save account after token rotation");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launcher_store::{Keyring, MemorySecretStore, PatchlineInfo, Profile};
    use uuid::Uuid;

    fn fixture() -> (tempfile::TempDir, AuthController) {
        let dir = tempfile::tempdir().unwrap();
        let keyring = Keyring::with_store(Box::new(MemorySecretStore::new()), true);
        let store = Arc::new(BlobStore::new(Arc::new(keyring), false));
        let paths = Paths::with_root(dir.path());
        let controller = AuthController::new(
            store,
            paths,
            reqwest::Client::new(),
            "http://127.0.0.1:1/oauth/token".to_string(),
        );
        (dir, controller)
    }

    fn account_with_token(expiry: chrono::DateTime<Utc>) -> Account {
        let profile = Profile {
            uuid: Uuid::new_v4(),
            username: "kweebec".to_string(),
            token: Token {
                access_token: "at-1".to_string(),
                refresh_token: "rt-1".to_string(),
                expiry,
            },
            entitlements: vec!["patchline:release".to_string()],
        };
        let uuid = profile.uuid;
        let mut account = Account {
            profiles: vec![profile],
            ..Account::default()
        };
        account.select_profile(uuid);
        account
    }

    #[tokio::test]
    async fn test_init_without_file_stays_logged_out() {
        let (_dir, controller) = fixture();
        controller.init().await;
        assert!(!controller.is_logged_in().await);
        assert!(controller.account().is_none());
    }

    #[tokio::test]
    async fn test_set_account_persists_and_restores() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = Keyring::with_store(Box::new(MemorySecretStore::new()), true);
        let store = Arc::new(BlobStore::new(Arc::new(keyring), false));
        let paths = Paths::with_root(dir.path());
        let token_url = "http://127.0.0.1:1/oauth/token".to_string();

        let controller = AuthController::new(
            Arc::clone(&store),
            paths.clone(),
            reqwest::Client::new(),
            token_url.clone(),
        );
        controller
            .set_account(account_with_token(Utc::now() + Duration::hours(1)))
            .await;
        assert!(controller.is_logged_in().await);

        // A second controller over the same storage restores the session.
        let restored =
            AuthController::new(store, paths, reqwest::Client::new(), token_url);
        restored.init().await;
        assert!(restored.is_logged_in().await);
        assert_eq!(
            restored.account().unwrap().current_profile().unwrap().username,
            "kweebec"
        );
    }

    #[tokio::test]
    async fn test_fresh_token_served_without_refresh() {
        let (_dir, controller) = fixture();
        controller
            .set_account(account_with_token(Utc::now() + Duration::hours(1)))
            .await;

        // The token endpoint is unreachable; a fresh token must not hit it.
        let token = controller.access_token().await.unwrap();
        assert_eq!(token, "at-1");
    }

    #[tokio::test]
    async fn test_access_token_requires_login() {
        let (_dir, controller) = fixture();
        let err = controller.access_token().await.unwrap_err();
        assert!(matches!(err, FetchError::Auth(_)));
    }

    #[tokio::test]
    async fn test_logout_removes_file() {
        let (_dir, controller) = fixture();
        controller
            .set_account(account_with_token(Utc::now() + Duration::hours(1)))
            .await;
        controller.logout().await.unwrap();
        assert!(!controller.is_logged_in().await);
        controller.init().await;
        assert!(!controller.is_logged_in().await);
    }

    #[tokio::test]
    async fn test_update_account_persists_patchlines() {
        let (_dir, controller) = fixture();
        controller
            .set_account(account_with_token(Utc::now() + Duration::hours(1)))
            .await;

        controller.update_account("patchlines_fetched", |account| {
            account.patchlines.insert(
                "release".to_string(),
                PatchlineInfo {
                    newest_build: 42,
                    flags: vec![],
                },
            );
        });

        let account = controller.account().unwrap();
        assert_eq!(account.patchlines["release"].newest_build, 42);
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_and_fires_callback() {
        use axum::routing::post;
        use parking_lot::Mutex as PMutex;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let router = axum::Router::new().route(
                "/oauth/token",
                post(|| async {
                    axum::Json(serde_json::json!({
                        "access_token": "at-2",
                        "refresh_token": "rt-2",
                        "expires_in": 3600,
                    }))
                }),
            );
            axum::serve(listener, router).await.unwrap();
        });

        let changed: Arc<PMutex<Vec<Token>>> = Arc::new(PMutex::new(Vec::new()));
        let sink = changed.clone();
        let mut source = TokenSource::new(
            reqwest::Client::new(),
            format!("http://{addr}/oauth/token"),
            Token {
                access_token: "at-1".to_string(),
                refresh_token: "rt-1".to_string(),
                expiry: Utc::now() - Duration::hours(1),
            },
            Box::new(move |t| sink.lock().push(t.clone())),
        );

        let token = source.token().await.unwrap();
        assert_eq!(token.access_token, "at-2");
        assert_eq!(changed.lock().len(), 1);

        // A second consult serves the cached fresh token without refiring.
        let again = source.token().await.unwrap();
        assert_eq!(again.access_token, "at-2");
        assert_eq!(changed.lock().len(), 1);
    }
}
