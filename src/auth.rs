//! OAuth2 credential store for the Gmail API
//!
//! The cached credential lives in `token.json` in Google's `authorized_user`
//! format. It is written once, after the first interactive authorization, and
//! never rewritten on silent refreshes.

use async_trait::async_trait;
use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use yup_oauth2::authorized_user::AuthorizedUserSecret;
use yup_oauth2::storage::{TokenInfo, TokenStorage};

use crate::config::AuthConfig;
use crate::error::{LabelerError, Result};

pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";

/// Scopes requested during interactive authorization
pub const REQUIRED_SCOPES: &[&str] = &[GMAIL_MODIFY_SCOPE, GMAIL_SEND_SCOPE];

/// Value of the `type` field in a cached credential
pub const AUTHORIZED_USER: &str = "authorized_user";

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Contents of `token.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl StoredCredential {
    fn into_secret(self) -> AuthorizedUserSecret {
        AuthorizedUserSecret {
            client_id: self.client_id,
            client_secret: self.client_secret,
            refresh_token: self.refresh_token,
            key_type: self.kind,
        }
    }
}

/// Loads, obtains and persists the OAuth2 credential for the mailbox.
///
/// Owns the credential exclusively; the rest of the crate only sees the
/// authorized [`GmailHub`] it produces.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    credentials_path: PathBuf,
    token_path: PathBuf,
}

impl CredentialStore {
    pub fn new(credentials_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            token_path: token_path.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.credentials_path, &config.token_path)
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Produce an authorized Gmail hub.
    ///
    /// Uses the cached credential when one exists; otherwise runs the
    /// installed-app flow in the browser and persists the refresh token.
    pub async fn authorize(&self) -> Result<GmailHub> {
        let credential = match self.load_cached().await {
            Some(credential) => {
                debug!("Using cached credential from {:?}", self.token_path);
                credential
            }
            None => {
                info!("No usable cached credential, starting interactive authorization");
                let credential = self.authorize_interactive().await?;
                self.save(&credential).await?;
                credential
            }
        };

        build_hub(credential).await
    }

    /// Read the cached credential, if present and well formed
    pub async fn load_cached(&self) -> Option<StoredCredential> {
        let content = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No cached credential at {:?}: {}", self.token_path, e);
                return None;
            }
        };

        match serde_json::from_str::<StoredCredential>(&content) {
            Ok(credential) if !credential.refresh_token.is_empty() => Some(credential),
            Ok(_) => {
                warn!("Cached credential at {:?} has no refresh token", self.token_path);
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable credential at {:?}: {}", self.token_path, e);
                None
            }
        }
    }

    /// Write the credential to the token file, owner-readable only
    pub async fn save(&self, credential: &StoredCredential) -> Result<()> {
        if let Some(parent) = self.token_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let payload = serde_json::to_string(credential)?;
        tokio::fs::write(&self.token_path, payload).await?;
        secure_token_file(&self.token_path).await?;

        info!("Saved credential to {:?}", self.token_path);
        Ok(())
    }

    /// Delete the cached credential. Returns whether a file was removed.
    pub async fn forget(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.token_path).await {
            Ok(()) => {
                info!("Removed cached credential at {:?}", self.token_path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Run the installed-app flow and return the resulting credential
    pub async fn authorize_interactive(&self) -> Result<StoredCredential> {
        // Accepts both the `installed` and `web` client descriptors
        let secret = yup_oauth2::read_application_secret(&self.credentials_path)
            .await
            .map_err(|e| {
                LabelerError::AuthError(format!(
                    "Failed to read client credentials from {:?}: {}",
                    self.credentials_path, e
                ))
            })?;

        let captured = Arc::new(Mutex::new(None));

        // HTTPRedirect opens a browser for user authorization
        let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
            secret.clone(),
            yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .with_storage(Box::new(CapturingStorage {
            captured: Arc::clone(&captured),
        }))
        .build()
        .await
        .map_err(|e| LabelerError::AuthError(format!("Failed to build authenticator: {}", e)))?;

        auth.token(REQUIRED_SCOPES)
            .await
            .map_err(|e| LabelerError::AuthError(format!("Failed to obtain token: {}", e)))?;

        let refresh_token = captured
            .lock()
            .map_err(|_| LabelerError::AuthError("Token capture lock poisoned".to_string()))?
            .take()
            .and_then(|token: TokenInfo| token.refresh_token)
            .ok_or_else(|| {
                LabelerError::AuthError("Authorization did not return a refresh token".to_string())
            })?;

        Ok(StoredCredential {
            kind: AUTHORIZED_USER.to_string(),
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            refresh_token,
        })
    }
}

/// Build the hub from a cached credential. Access tokens are refreshed
/// in memory by the authenticator.
async fn build_hub(credential: StoredCredential) -> Result<GmailHub> {
    let auth = yup_oauth2::AuthorizedUserAuthenticator::builder(credential.into_secret())
        .build()
        .await
        .map_err(|e| LabelerError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    // Use HTTP/1 for compatibility with google-gmail1
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| LabelerError::AuthError(format!("Failed to load TLS roots: {}", e)))?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    Ok(Gmail::new(client, auth))
}

/// Token storage that keeps the interactive flow's token in memory so the
/// refresh token can be copied into `token.json`.
struct CapturingStorage {
    captured: Arc<Mutex<Option<TokenInfo>>>,
}

#[async_trait]
impl TokenStorage for CapturingStorage {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> anyhow::Result<()> {
        let mut slot = self
            .captured
            .lock()
            .map_err(|_| anyhow::anyhow!("token capture lock poisoned"))?;
        *slot = Some(token);
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        self.captured.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows uses ACLs, nothing to tighten here
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_credential() -> StoredCredential {
        StoredCredential {
            kind: AUTHORIZED_USER.to_string(),
            client_id: "client-123.apps.googleusercontent.com".to_string(),
            client_secret: "shh".to_string(),
            refresh_token: "1//refresh".to_string(),
        }
    }

    fn store_in(dir: &TempDir) -> CredentialStore {
        CredentialStore::new(dir.path().join("credential.json"), dir.path().join("token.json"))
    }

    #[tokio::test]
    async fn test_load_cached_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(store_in(&dir).load_cached().await.is_none());
    }

    fn install_crypto_provider() {
        #[cfg(not(windows))]
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        #[cfg(windows)]
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    #[tokio::test]
    async fn test_authorize_with_cached_token_leaves_file_untouched() {
        install_crypto_provider();
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let token_json = r#"{"type":"authorized_user","client_id":"abc.apps.googleusercontent.com","client_secret":"secret","refresh_token":"1//token"}"#;
        tokio::fs::write(store.token_path(), token_json).await.unwrap();

        // Building the hub does not reach the network; the result depends on local TLS roots
        let _ = store.authorize().await;

        let after = tokio::fs::read(store.token_path()).await.unwrap();
        assert_eq!(after, token_json.as_bytes());
        assert!(!dir.path().join("credential.json").exists());
    }

    #[tokio::test]
    async fn test_load_cached_reads_authorized_user_format() {
        let dir = TempDir::new().unwrap();
        let token_json = r#"{
            "type": "authorized_user",
            "client_id": "abc.apps.googleusercontent.com",
            "client_secret": "secret",
            "refresh_token": "1//token"
        }"#;
        tokio::fs::write(dir.path().join("token.json"), token_json).await.unwrap();

        let credential = store_in(&dir).load_cached().await.unwrap();
        assert_eq!(credential.kind, "authorized_user");
        assert_eq!(credential.client_id, "abc.apps.googleusercontent.com");
        assert_eq!(credential.refresh_token, "1//token");
    }

    #[tokio::test]
    async fn test_load_cached_ignores_malformed_file() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("token.json"), "{not json").await.unwrap();
        assert!(store_in(&dir).load_cached().await.is_none());
    }

    #[tokio::test]
    async fn test_load_cached_ignores_empty_refresh_token() {
        let dir = TempDir::new().unwrap();
        let mut credential = sample_credential();
        credential.refresh_token.clear();
        tokio::fs::write(
            dir.path().join("token.json"),
            serde_json::to_string(&credential).unwrap(),
        )
        .await
        .unwrap();

        assert!(store_in(&dir).load_cached().await.is_none());
    }

    #[tokio::test]
    async fn test_save_writes_type_field_and_secures_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&sample_credential()).await.unwrap();

        let raw = tokio::fs::read_to_string(store.token_path()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "authorized_user");
        assert_eq!(value["refresh_token"], "1//refresh");

        assert_eq!(store.load_cached().await, Some(sample_credential()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = tokio::fs::metadata(store.token_path()).await.unwrap();
            assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn test_forget_removes_token() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&sample_credential()).await.unwrap();

        assert!(store.forget().await.unwrap());
        assert!(!store.forget().await.unwrap());
        assert!(store.load_cached().await.is_none());
    }

    #[tokio::test]
    async fn test_interactive_without_client_file_is_auth_error() {
        let dir = TempDir::new().unwrap();
        let result = store_in(&dir).authorize_interactive().await;
        assert!(matches!(result, Err(LabelerError::AuthError(_))));
    }

    #[tokio::test]
    async fn test_authorize_without_token_or_client_file_is_auth_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let result = store.authorize().await;
        assert!(matches!(result, Err(LabelerError::AuthError(_))));
        // Nothing gets persisted on failure
        assert!(!store.token_path().exists());
    }

    #[tokio::test]
    async fn test_capturing_storage_keeps_last_token() {
        let captured = Arc::new(Mutex::new(None));
        let storage = CapturingStorage {
            captured: Arc::clone(&captured),
        };
        assert!(storage.get(REQUIRED_SCOPES).await.is_none());

        let token = TokenInfo {
            access_token: Some("ya29.access".to_string()),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: None,
            id_token: None,
        };
        storage.set(REQUIRED_SCOPES, token).await.unwrap();

        let stored = storage.get(REQUIRED_SCOPES).await.unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("1//refresh"));
    }

    #[test]
    fn test_scopes_constants() {
        assert_eq!(REQUIRED_SCOPES.len(), 2);
        assert!(REQUIRED_SCOPES.contains(&"https://www.googleapis.com/auth/gmail.modify"));
        assert!(REQUIRED_SCOPES.contains(&"https://www.googleapis.com/auth/gmail.send"));
    }
}
