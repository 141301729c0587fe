use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    /// Role claims arrive in whatever case the identity provider used.
    pub fn from_claim(role: Option<&str>) -> Option<Role> {
        match role?.trim().to_ascii_lowercase().as_str() {
            "patient" => Some(Role::Patient),
            "doctor" => Some(Role::Doctor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Authenticated caller of a scheduling operation.
///
/// A doctor actor always carries the id of its doctor profile, so ownership
/// checks never need a second lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Patient { user_id: Uuid },
    Doctor { user_id: Uuid, doctor_id: Uuid },
    Admin { user_id: Uuid },
}

impl Actor {
    pub fn user_id(&self) -> Uuid {
        match self {
            Actor::Patient { user_id }
            | Actor::Doctor { user_id, .. }
            | Actor::Admin { user_id } => *user_id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Actor::Patient { .. } => Role::Patient,
            Actor::Doctor { .. } => Role::Doctor,
            Actor::Admin { .. } => Role::Admin,
        }
    }

    pub fn doctor_id(&self) -> Option<Uuid> {
        match self {
            Actor::Doctor { doctor_id, .. } => Some(*doctor_id),
            _ => None,
        }
    }
}
