use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::operation::Operation;

/// Staff roles, highest privilege first.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperManager,
    Manager,
    CollectionOfficer,
    CallingAgent,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::SuperManager,
        Role::Manager,
        Role::CollectionOfficer,
        Role::CallingAgent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperManager => "SUPER_MANAGER",
            Role::Manager => "MANAGER",
            Role::CollectionOfficer => "COLLECTION_OFFICER",
            Role::CallingAgent => "CALLING_AGENT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUPER_MANAGER" => Some(Role::SuperManager),
            "MANAGER" => Some(Role::Manager),
            "COLLECTION_OFFICER" => Some(Role::CollectionOfficer),
            "CALLING_AGENT" => Some(Role::CallingAgent),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Role::SuperManager => "Super Manager",
            Role::Manager => "Manager",
            Role::CollectionOfficer => "Collection Officer",
            Role::CallingAgent => "Calling Agent",
        }
    }

    /// Breadth of what the role may see.
    pub fn read_rank(self) -> u8 {
        match self {
            Role::SuperManager => 4,
            Role::Manager => 3,
            Role::CollectionOfficer => 2,
            Role::CallingAgent => 1,
        }
    }

    /// Breadth of what the role may change. Calling agents never get
    /// role-derived write access; anything they write comes from authorship.
    pub fn write_rank(self) -> u8 {
        match self {
            Role::SuperManager => 3,
            Role::Manager => 2,
            Role::CollectionOfficer => 1,
            Role::CallingAgent => 0,
        }
    }

    pub fn at_least(self, min: Role) -> bool {
        self.read_rank() >= min.read_rank()
    }

    pub fn can_write_at(self, min: Role) -> bool {
        self.write_rank() > 0 && self.write_rank() >= min.write_rank()
    }

    /// Reads are ranked by `read_rank`, writes by `write_rank`.
    pub fn grants(self, op: Operation, min: Role) -> bool {
        if op.is_read() {
            self.at_least(min)
        } else {
            self.can_write_at(min)
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::parse(value).ok_or_else(|| UnknownRole(value.to_string()))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown role {0}")]
pub struct UnknownRole(pub String);

/// The caller a decision is made for.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub authenticated: bool,
}

impl Principal {
    pub fn authenticated(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            authenticated: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            id: Uuid::nil(),
            role: Role::CallingAgent,
            authenticated: false,
        }
    }

    pub fn is(&self, id: Option<Uuid>) -> bool {
        self.authenticated && id == Some(self.id)
    }
}
