use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::auth::account::Account;
use crate::auth::device_code::DeviceAuthorizationChallenge;
use crate::auth::error::{BridgeError, BridgeErrorKind};

const AUTHORITY: &str = "https://login.microsoftonline.com";
const DEFAULT_TENANT: &str = "consumers";
const DEFAULT_SCOPE: &str = "XboxLive.signin offline_access openid profile";
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Microsoft identity platform client for the device authorization grant.
///
/// # Example
/// ```no_run
/// use launcher_auth::auth::providers::microsoft::MicrosoftDeviceAuth;
///
/// # async fn run() -> Result<(), launcher_auth::auth::BridgeError> {
/// let auth = MicrosoftDeviceAuth::new("00000000-0000-0000-0000-000000000000");
/// let challenge = auth.start_device_code().await?;
/// println!("Enter {} at {}", challenge.user_code, challenge.verification_uri);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MicrosoftDeviceAuth {
    client: reqwest::Client,
    client_id: String,
    scope: String,
    device_code_url: String,
    token_url: String,
}

impl MicrosoftDeviceAuth {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            scope: DEFAULT_SCOPE.to_string(),
            device_code_url: device_code_url(DEFAULT_TENANT),
            token_url: token_url(DEFAULT_TENANT),
        }
    }

    /// Use another tenant. Resets both endpoint URLs.
    pub fn with_tenant(mut self, tenant: &str) -> Self {
        self.device_code_url = device_code_url(tenant);
        self.token_url = token_url(tenant);
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_device_code_url(mut self, url: impl Into<String>) -> Self {
        self.device_code_url = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub async fn start_device_code(&self) -> Result<DeviceAuthorizationChallenge, BridgeError> {
        let resp = self
            .client
            .post(&self.device_code_url)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(endpoint_error(status, &body, "Device code request"));
        }
        let payload: DeviceCodeResponse = resp.json().await?;
        Ok(DeviceAuthorizationChallenge {
            device_code: payload.device_code,
            user_code: payload.user_code,
            verification_uri: payload.verification_uri,
            expires_in: payload.expires_in,
            interval: payload.interval,
        })
    }

    /// One token request for `device_code`.
    ///
    /// Pending and slow-down answers come back as errors with the matching
    /// [`BridgeErrorKind`].
    pub async fn poll_device_code(&self, device_code: &str) -> Result<MicrosoftSession, BridgeError> {
        let resp = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("device_code", device_code),
                ("grant_type", DEVICE_CODE_GRANT),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(endpoint_error(status, &body, "Device token request"));
        }
        let payload: TokenResponse = resp.json().await?;
        Ok(MicrosoftSession {
            access_token: payload.access_token,
            refresh_token: payload.refresh_token,
            id_token: payload.id_token,
            expires_in: payload.expires_in,
        })
    }
}

/// Tokens returned by a successful device token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrosoftSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<u64>,
}

impl MicrosoftSession {
    /// Build the launcher account from the id token claims.
    ///
    /// The display name is `preferred_username`, falling back to `name`; the
    /// identifier is `oid`, falling back to `sub`.
    pub fn into_account(self) -> Result<Account, BridgeError> {
        let id_token = self
            .id_token
            .as_deref()
            .ok_or_else(|| BridgeError::backend("Token response missing id_token"))?;
        let claims = decode_jwt_claims(id_token)?;
        let username = claim(&claims, &["preferred_username", "name"])
            .ok_or_else(|| BridgeError::backend("id_token has no username claim"))?;
        let uuid = claim(&claims, &["oid", "sub"])
            .ok_or_else(|| BridgeError::backend("id_token has no subject claim"))?;

        let mut session = serde_json::Map::new();
        session.insert("access_token".into(), self.access_token.into());
        if let Some(refresh_token) = self.refresh_token {
            session.insert("refresh_token".into(), refresh_token.into());
        }
        if let Some(expires_at) = self.expires_in.and_then(expiry_from_now) {
            session.insert("expires_at".into(), expires_at.to_rfc3339().into());
        }
        Ok(Account::microsoft(
            username,
            uuid,
            serde_json::Value::Object(session),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default)]
    expires_in: u64,
    #[serde(default)]
    interval: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    id_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// `None` when `expires_in` does not fit a timestamp.
fn expiry_from_now(expires_in: u64) -> Option<DateTime<Utc>> {
    let lifetime = i64::try_from(expires_in).ok().and_then(Duration::try_seconds)?;
    Utc::now().checked_add_signed(lifetime)
}

fn device_code_url(tenant: &str) -> String {
    format!("{AUTHORITY}/{tenant}/oauth2/v2.0/devicecode")
}

fn token_url(tenant: &str) -> String {
    format!("{AUTHORITY}/{tenant}/oauth2/v2.0/token")
}

/// Map an OAuth error body onto a [`BridgeError`].
fn endpoint_error(status: StatusCode, body: &str, what: &str) -> BridgeError {
    let Ok(payload) = serde_json::from_str::<ErrorResponse>(body) else {
        return BridgeError::backend(format!("{what} failed with status {status}"));
    };
    let kind = match payload.error.as_str() {
        // Microsoft's spelling of access_denied
        "authorization_declined" => BridgeErrorKind::AccessDenied,
        code => match code.parse::<BridgeErrorKind>() {
            Ok(
                kind @ (BridgeErrorKind::AuthorizationPending
                | BridgeErrorKind::SlowDown
                | BridgeErrorKind::ExpiredToken
                | BridgeErrorKind::AccessDenied),
            ) => kind,
            _ => BridgeErrorKind::Backend,
        },
    };
    let message = match payload.error_description {
        Some(description) if kind == BridgeErrorKind::Backend => {
            format!("{}: {description}", payload.error)
        }
        _ => payload.error,
    };
    BridgeError::new(kind, message)
}

fn decode_jwt_claims(token: &str) -> Result<serde_json::Value, BridgeError> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| BridgeError::backend("Invalid id_token (missing JWT payload)"))?;
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| BridgeError::backend("Invalid id_token payload encoding"))?;
    serde_json::from_slice(&decoded)
        .map_err(|_| BridgeError::backend("Invalid id_token payload JSON"))
}

fn claim(claims: &serde_json::Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        claims
            .get(*name)
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}
