use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse authorization tier stored on `profiles.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Member,
    Admin,
    Developer,
}

/// Features gated by role. Every role check goes through [`Role::can`]; the
/// portal screens read the same answer from `GET /session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Contracts,
    Vacations,
    LeaveRequests,
    AdminPanel,
    SupportDesk,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Contracts,
        Capability::Vacations,
        Capability::LeaveRequests,
        Capability::AdminPanel,
        Capability::SupportDesk,
    ];
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Developer => "developer",
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        match capability {
            Capability::Contracts | Capability::Vacations | Capability::LeaveRequests => {
                matches!(self, Role::Member | Role::Admin | Role::Developer)
            }
            Capability::AdminPanel => matches!(self, Role::Admin | Role::Developer),
            Capability::SupportDesk => *self == Role::Developer,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "developer" => Ok(Role::Developer),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Parses a stored role string, treating anything unknown as a guest.
pub fn role_or_guest(value: &str) -> Role {
    value.parse().unwrap_or(Role::Guest)
}

/// Claims issued by the hosted auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub username: Option<String>,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl Claims {
    pub fn new(user_id: Uuid, username: Option<String>, role: Role, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id,
            username,
            role,
            iat: now,
            exp: now + duration_secs,
            jti: Uuid::now_v7(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// The caller of a request, resolved once and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub role: Role,
}

impl Session {
    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }

    /// Everything this caller may use, in [`Capability::ALL`] order.
    pub fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL.into_iter().filter(|c| self.can(*c)).collect()
    }
}

impl From<Claims> for Session {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
        }
    }
}
