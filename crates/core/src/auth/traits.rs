use async_trait::async_trait;
use thiserror::Error;

use super::types::{AuthRequest, Identity};

#[derive(Debug, Error)]
pub enum AuthError {
    /// No credentials were presented.
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The identity is valid but the operation is for staff only.
    #[error("Staff access required")]
    StaffOnly,

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl AuthError {
    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::InvalidCredentials(_) => "invalid_credentials",
            AuthError::StaffOnly => "forbidden",
            AuthError::ConfigurationError(_) => "configuration_error",
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Check the presented credentials.
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Identity a request acts as. A request without credentials is a public
    /// buyer; only wrong credentials fail.
    async fn resolve(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        match self.authenticate(request).await {
            Err(AuthError::NotAuthenticated) => Ok(Identity::public()),
            other => other,
        }
    }

    /// Name of this authentication method
    fn method_name(&self) -> &'static str;
}

/// Admit staff identities only.
pub fn require_staff(identity: &Identity) -> Result<(), AuthError> {
    if identity.is_staff() {
        Ok(())
    } else {
        Err(AuthError::StaffOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ApiKeyAuthenticator, NoneAuthenticator};
    use std::collections::HashMap;

    fn request(headers: &[(&str, &str)]) -> AuthRequest {
        AuthRequest {
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            source_ip: "127.0.0.1".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_resolve_without_credentials_is_public() {
        let auth = ApiKeyAuthenticator::new("door-key".to_string());

        let identity = auth.resolve(&request(&[])).await.unwrap();
        assert!(!identity.is_staff());
        assert!(matches!(require_staff(&identity), Err(AuthError::StaffOnly)));

        let staff = auth
            .resolve(&request(&[("x-api-key", "door-key"), ("x-staff-id", "gate-2")]))
            .await
            .unwrap();
        assert_eq!(staff.user_id, "gate-2");
        assert!(require_staff(&staff).is_ok());
    }

    #[tokio::test]
    async fn test_resolve_keeps_wrong_key_error() {
        let auth = ApiKeyAuthenticator::new("door-key".to_string());
        let err = auth
            .resolve(&request(&[("x-api-key", "guess")]))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "invalid_credentials");
    }

    #[tokio::test]
    async fn test_resolve_with_auth_disabled_is_staff() {
        let identity = NoneAuthenticator::new().resolve(&request(&[])).await.unwrap();
        assert!(require_staff(&identity).is_ok());
    }
}
