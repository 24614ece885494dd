//! Remote store configuration
//!
//! Values come from the config file and may be overridden by
//! environment variables. An incomplete configuration is not an error:
//! it resolves to `RemoteUnavailable` and callers fall back to local.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable for the access key
pub const ACCESS_KEY_VAR: &str = "FRYER_ACCESS_KEY";
/// Environment variable for the secret key
pub const SECRET_KEY_VAR: &str = "FRYER_SECRET_KEY";
/// Environment variable for the bucket name
pub const BUCKET_VAR: &str = "FRYER_BUCKET";
/// Environment variable for an S3-compatible endpoint
pub const ENDPOINT_VAR: &str = "FRYER_ENDPOINT";
/// Environment variable for the bucket region
pub const REGION_VAR: &str = "FRYER_REGION";

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Raw remote configuration, any field may be missing
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Access key
    pub access_key: Option<String>,
    /// Secret key
    pub secret_key: Option<String>,
    /// Bucket name
    pub bucket: Option<String>,
    /// Endpoint of an S3-compatible store; AWS when unset
    pub endpoint: Option<String>,
    /// Bucket region
    pub region: Option<String>,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish()
    }
}

/// Why a remote store cannot be built
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteUnavailable {
    /// Access or secret key missing
    #[error("remote credentials not set (FRYER_ACCESS_KEY/FRYER_SECRET_KEY)")]
    MissingCredentials,
    /// Bucket missing
    #[error("remote bucket not set (FRYER_BUCKET)")]
    MissingBucket,
}

/// Complete remote settings
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    /// Access key
    pub access_key: String,
    /// Secret key
    pub secret_key: String,
    /// Bucket name
    pub bucket: String,
    /// Endpoint of an S3-compatible store; AWS when `None`
    pub endpoint: Option<String>,
    /// Bucket region
    pub region: String,
}

impl fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish()
    }
}

impl RemoteConfig {
    /// Read all fields from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_with(|name| std::env::var(name).ok());
        config
    }

    /// Override fields from a variable lookup
    ///
    /// Empty values are ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ACCESS_KEY_VAR) {
            self.access_key = Some(v);
        }
        if let Some(v) = get(SECRET_KEY_VAR) {
            self.secret_key = Some(v);
        }
        if let Some(v) = get(BUCKET_VAR) {
            self.bucket = Some(v);
        }
        if let Some(v) = get(ENDPOINT_VAR) {
            self.endpoint = Some(v);
        }
        if let Some(v) = get(REGION_VAR) {
            self.region = Some(v);
        }
    }

    /// Resolve into complete settings
    ///
    /// # Errors
    ///
    /// Names the first missing piece.
    pub fn resolve(&self) -> Result<RemoteSettings, RemoteUnavailable> {
        fn present(value: Option<&String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty()).cloned()
        }

        let (Some(access_key), Some(secret_key)) = (
            present(self.access_key.as_ref()),
            present(self.secret_key.as_ref()),
        ) else {
            return Err(RemoteUnavailable::MissingCredentials);
        };
        let bucket =
            present(self.bucket.as_ref()).ok_or(RemoteUnavailable::MissingBucket)?;

        Ok(RemoteSettings {
            access_key,
            secret_key,
            bucket,
            endpoint: present(self.endpoint.as_ref()),
            region: present(self.region.as_ref()).unwrap_or_else(|| DEFAULT_REGION.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn empty_config_lacks_credentials() {
        assert_eq!(
            RemoteConfig::default().resolve(),
            Err(RemoteUnavailable::MissingCredentials)
        );
    }

    #[test]
    fn env_completes_config() {
        let vars = env(&[
            (ACCESS_KEY_VAR, "AK"),
            (SECRET_KEY_VAR, "SK"),
            (BUCKET_VAR, "photos"),
        ]);
        let mut config = RemoteConfig {
            endpoint: Some("http://127.0.0.1:9000".to_string()),
            ..RemoteConfig::default()
        };
        config.apply_env_with(|name| vars.get(name).cloned());

        let settings = config.resolve().unwrap();
        assert_eq!(settings.bucket, "photos");
        assert_eq!(settings.access_key, "AK");
        assert_eq!(settings.endpoint.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(settings.region, DEFAULT_REGION);
    }

    #[test]
    fn endpoint_and_region_are_optional() {
        let vars = env(&[
            (ACCESS_KEY_VAR, "AK"),
            (SECRET_KEY_VAR, "SK"),
            (BUCKET_VAR, "photos"),
            (REGION_VAR, "eu-west-1"),
        ]);
        let mut config = RemoteConfig::default();
        config.apply_env_with(|name| vars.get(name).cloned());

        let settings = config.resolve().unwrap();
        assert_eq!(settings.endpoint, None);
        assert_eq!(settings.region, "eu-west-1");
    }

    #[test]
    fn blank_env_values_do_not_override() {
        let vars = env(&[(BUCKET_VAR, "  ")]);
        let mut config = RemoteConfig {
            bucket: Some("kept".to_string()),
            ..RemoteConfig::default()
        };
        config.apply_env_with(|name| vars.get(name).cloned());
        assert_eq!(config.bucket.as_deref(), Some("kept"));
    }

    #[test]
    fn missing_bucket_reported_after_credentials() {
        let config = RemoteConfig {
            access_key: Some("AK".to_string()),
            secret_key: Some("SK".to_string()),
            ..RemoteConfig::default()
        };
        assert_eq!(config.resolve(), Err(RemoteUnavailable::MissingBucket));
    }

    #[test]
    fn debug_redacts_secret() {
        let config = RemoteConfig {
            secret_key: Some("hunter2".to_string()),
            ..RemoteConfig::default()
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
