use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Treats every caller as staff. For local setups only; it must be chosen
/// explicitly in the config.
#[derive(Default)]
pub struct NoneAuthenticator;

impl NoneAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let mut identity = Identity::anonymous_staff();
        if let Some(name) = request.header("x-staff-id").filter(|n| !n.trim().is_empty()) {
            identity.user_id = name.trim().to_string();
        }
        Ok(identity)
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}
