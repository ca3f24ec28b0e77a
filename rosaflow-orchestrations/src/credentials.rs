//! Cloud and cluster manager credentials

use std::fmt;

use thiserror::Error;

use crate::collaborators::CredentialSource;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    #[error("aws credentials are not supplied (set AWS_PROFILE or AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY)")]
    MissingAws,

    #[error("aws region is not supplied")]
    MissingRegion,

    #[error("cluster manager credentials are not supplied (set OCM_TOKEN or OCM_CLIENT_ID and OCM_CLIENT_SECRET)")]
    MissingOcm,
}

/// AWS credentials handed to external tools through their environment.
/// A named profile takes priority over a static key pair.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AwsCredentials {
    pub profile: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
}

impl AwsCredentials {
    pub fn from_env() -> Self {
        Self {
            profile: non_empty_env("AWS_PROFILE"),
            access_key_id: non_empty_env("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty_env("AWS_SECRET_ACCESS_KEY"),
            region: non_empty_env("AWS_REGION"),
        }
    }

    pub fn validate(&self) -> Result<(), CredentialsError> {
        let by_profile = self.profile.is_some();
        let by_keys = self.access_key_id.is_some() && self.secret_access_key.is_some();
        if !by_profile && !by_keys {
            return Err(CredentialsError::MissingAws);
        }
        if self.region.is_none() {
            return Err(CredentialsError::MissingRegion);
        }
        Ok(())
    }
}

impl CredentialSource for AwsCredentials {
    fn env_vars(&self) -> Vec<(String, String)> {
        if let Some(profile) = &self.profile {
            return vec![("AWS_PROFILE".to_string(), profile.clone())];
        }
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => vec![
                ("AWS_ACCESS_KEY_ID".to_string(), id.clone()),
                ("AWS_SECRET_ACCESS_KEY".to_string(), secret.clone()),
            ],
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("profile", &self.profile)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<redacted>"))
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .finish()
    }
}

/// How to authenticate with the cluster manager
#[derive(Clone, PartialEq, Eq)]
pub enum OcmCredentials {
    /// Offline refresh token
    Token(String),
    ClientCredentials { client_id: String, client_secret: String },
}

impl OcmCredentials {
    /// Client credentials win over a token when both are present
    pub fn from_env() -> Result<Self, CredentialsError> {
        match (non_empty_env("OCM_CLIENT_ID"), non_empty_env("OCM_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Ok(Self::ClientCredentials {
                client_id,
                client_secret,
            }),
            _ => non_empty_env("OCM_TOKEN")
                .map(Self::Token)
                .ok_or(CredentialsError::MissingOcm),
        }
    }

    /// Arguments for `rosa login`
    pub fn login_args(&self) -> Vec<String> {
        match self {
            Self::Token(token) => vec!["--token".to_string(), token.clone()],
            Self::ClientCredentials {
                client_id,
                client_secret,
            } => vec![
                "--client-id".to_string(),
                client_id.clone(),
                "--client-secret".to_string(),
                client_secret.clone(),
            ],
        }
    }
}

impl fmt::Debug for OcmCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("OcmCredentials::Token(<redacted>)"),
            Self::ClientCredentials { client_id, .. } => f
                .debug_struct("OcmCredentials::ClientCredentials")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> AwsCredentials {
        AwsCredentials {
            access_key_id: Some("AKIA".to_string()),
            secret_access_key: Some("secret".to_string()),
            region: Some("us-east-1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_requires_credentials_and_region() {
        assert_eq!(AwsCredentials::default().validate(), Err(CredentialsError::MissingAws));

        let no_region = AwsCredentials {
            region: None,
            ..keys()
        };
        assert_eq!(no_region.validate(), Err(CredentialsError::MissingRegion));

        let half_keys = AwsCredentials {
            secret_access_key: None,
            ..keys()
        };
        assert_eq!(half_keys.validate(), Err(CredentialsError::MissingAws));

        assert!(keys().validate().is_ok());
    }

    #[test]
    fn test_profile_takes_priority_over_keys() {
        let both = AwsCredentials {
            profile: Some("osd".to_string()),
            ..keys()
        };
        assert_eq!(
            both.env_vars(),
            vec![("AWS_PROFILE".to_string(), "osd".to_string())]
        );
        assert_eq!(keys().env_vars().len(), 2);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", keys());
        assert!(!rendered.contains("secret\""));
        assert!(!rendered.contains("AKIA"));

        let token = format!("{:?}", OcmCredentials::Token("abc".to_string()));
        assert!(!token.contains("abc"));
    }

    #[test]
    fn test_login_args() {
        let creds = OcmCredentials::ClientCredentials {
            client_id: "id".to_string(),
            client_secret: "s".to_string(),
        };
        assert_eq!(creds.login_args(), vec!["--client-id", "id", "--client-secret", "s"]);
    }
}
