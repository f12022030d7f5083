// Google credential files: service account keys and gcloud application-default logins.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{FirebaseError, Result};

pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Env var pointing at an application-default credentials file.
pub const APPLICATION_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// A service account JSON key as downloaded from the Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: Option<String>,
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// The refresh-token login written by `gcloud auth application-default login`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub quota_project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
}

#[derive(Debug, Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
    /// A pre-minted bearer token, used against emulators and in tests.
    StaticToken(String),
}

impl Credentials {
    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: CredentialsFile = serde_json::from_str(raw)
            .map_err(|e| FirebaseError::Credentials(format!("unsupported credentials file: {e}")))?;
        Ok(match parsed {
            CredentialsFile::ServiceAccount(key) => Credentials::ServiceAccount(key),
            CredentialsFile::AuthorizedUser(user) => Credentials::AuthorizedUser(user),
        })
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FirebaseError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_json(&raw)
    }

    /// Load the gcloud well-known application-default credentials file.
    pub async fn gcloud_default() -> Result<Self> {
        let path = gcloud_default_path().ok_or_else(|| {
            FirebaseError::Credentials("cannot locate the gcloud configuration directory".into())
        })?;
        if !path.exists() {
            return Err(FirebaseError::Credentials(format!(
                "no credentials found: pass a service account key, set {APPLICATION_CREDENTIALS_ENV}, \
                 or run `gcloud auth application-default login` ({} missing)",
                path.display()
            )));
        }
        Self::from_file(&path).await
    }

    /// Project the credentials belong to, when the file records one.
    pub fn project_id(&self) -> Option<&str> {
        let project_id = match self {
            Credentials::ServiceAccount(key) => key.project_id.as_deref(),
            Credentials::AuthorizedUser(user) => user.quota_project_id.as_deref(),
            Credentials::StaticToken(_) => None,
        };
        project_id.filter(|id| !id.is_empty())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::ServiceAccount(_) => "service_account",
            Credentials::AuthorizedUser(_) => "authorized_user",
            Credentials::StaticToken(_) => "static_token",
        }
    }
}

fn gcloud_default_path() -> Option<PathBuf> {
    well_known_path(
        cfg!(windows),
        std::env::var_os("APPDATA"),
        std::env::var_os("HOME"),
    )
}

/// `%APPDATA%\gcloud\...` on Windows, `$HOME/.config/gcloud/...` elsewhere.
fn well_known_path(
    windows: bool,
    appdata: Option<OsString>,
    home: Option<OsString>,
) -> Option<PathBuf> {
    let config_dir = if windows {
        PathBuf::from(appdata?).join("gcloud")
    } else {
        PathBuf::from(home?).join(".config").join("gcloud")
    };
    Some(config_dir.join("application_default_credentials.json"))
}
