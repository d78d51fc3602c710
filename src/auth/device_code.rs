use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Poll period used when the backend does not provide an interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on any poll period, whatever the backend asks for.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Device/user code pair issued at the start of a device authorization flow.
///
/// Accepts both snake_case and camelCase keys so it can be decoded straight
/// from either a token endpoint or a front-end facing command bridge.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use launcher_auth::auth::DeviceAuthorizationChallenge;
///
/// let challenge = DeviceAuthorizationChallenge {
///     device_code: "device-123".to_string(),
///     user_code: "ABCD-EFGH".to_string(),
///     verification_uri: "https://www.microsoft.com/link".to_string(),
///     expires_in: 900,
///     interval: 0,
/// };
/// assert_eq!(challenge.poll_interval(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAuthorizationChallenge {
    #[serde(alias = "deviceCode")]
    pub device_code: String,
    #[serde(alias = "userCode")]
    pub user_code: String,
    #[serde(alias = "verificationUri", alias = "verification_url")]
    pub verification_uri: String,
    /// Lifetime of the device code in seconds; `0` when unknown.
    #[serde(default, alias = "expiresIn")]
    pub expires_in: u64,
    /// Minimum seconds between token requests; `0` when unspecified.
    #[serde(default)]
    pub interval: u64,
}

impl DeviceAuthorizationChallenge {
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_or(DEFAULT_POLL_INTERVAL)
    }

    /// Requested poll period, `fallback` when unspecified, capped at
    /// [`MAX_POLL_INTERVAL`].
    pub fn poll_interval_or(&self, fallback: Duration) -> Duration {
        let period = if self.interval == 0 {
            fallback
        } else {
            Duration::from_secs(self.interval)
        };
        period.min(MAX_POLL_INTERVAL)
    }

    pub fn lifetime(&self) -> Option<Duration> {
        (self.expires_in > 0).then(|| Duration::from_secs(self.expires_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_camel_case_payload() {
        let challenge: DeviceAuthorizationChallenge = serde_json::from_value(json!({
            "deviceCode": "dc",
            "userCode": "UC",
            "verificationUri": "https://example.test/link",
            "expiresIn": 600,
            "interval": 7
        }))
        .unwrap();
        assert_eq!(challenge.device_code, "dc");
        assert_eq!(challenge.poll_interval(), Duration::from_secs(7));
        assert_eq!(challenge.lifetime(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn missing_interval_falls_back() {
        let challenge: DeviceAuthorizationChallenge = serde_json::from_value(json!({
            "device_code": "dc",
            "user_code": "UC",
            "verification_uri": "https://example.test/link"
        }))
        .unwrap();
        assert_eq!(challenge.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(
            challenge.poll_interval_or(Duration::from_secs(2)),
            Duration::from_secs(2)
        );
        assert_eq!(challenge.lifetime(), None);
    }

    #[test]
    fn oversized_interval_is_capped() {
        let challenge = DeviceAuthorizationChallenge {
            device_code: "dc".to_string(),
            user_code: "UC".to_string(),
            verification_uri: "https://example.test/link".to_string(),
            expires_in: u64::MAX,
            interval: u64::MAX,
        };
        assert_eq!(challenge.poll_interval(), MAX_POLL_INTERVAL);
        assert_eq!(
            challenge.poll_interval_or(Duration::MAX),
            MAX_POLL_INTERVAL
        );
        assert_eq!(challenge.lifetime(), Some(Duration::from_secs(u64::MAX)));
    }
}
