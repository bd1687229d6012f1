use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Lowercased header names.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Buyers: may browse, hold, release and check out.
    Public,
    /// Box office and door staff: may also edit inventory, override status,
    /// validate tickets and read orders and the audit trail.
    Staff,
}

/// Authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
    pub role: Role,
}

impl Identity {
    /// Caller that presented no credentials.
    pub fn public() -> Self {
        Self {
            user_id: "public".to_string(),
            method: "none".to_string(),
            role: Role::Public,
        }
    }

    /// Identity used when authentication is disabled: everyone is staff.
    pub fn anonymous_staff() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
            role: Role::Staff,
        }
    }

    pub fn staff(user_id: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            method: method.into(),
            role: Role::Staff,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }
}
