//! Identifier newtypes and caller identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryId(pub Uuid);

impl DeliveryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeliveryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeliveryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Declares a string-backed identifier owned by an external collaborator.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Order reference from the order store.
    OrderId
);
string_id!(ProductId);
string_id!(
    /// Vendor the product is collected from.
    ShopId
);
string_id!(
    /// Courier identity from the agent directory.
    AgentId
);
string_id!(
    /// Buyer or administrator identity.
    UserId
);

impl From<AgentId> for UserId {
    fn from(agent: AgentId) -> Self {
        Self(agent.0)
    }
}

/// Role asserted by a caller. Authentication happens upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Agent,
    Buyer,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Agent => "agent",
            Role::Buyer => "buyer",
            Role::Admin => "admin",
        };
        f.write_str(name)
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Requester {
    Agent(AgentId),
    Buyer(UserId),
    Admin(UserId),
}

impl Requester {
    pub fn from_role(identity: impl Into<String>, role: Role) -> Self {
        let identity = identity.into();
        match role {
            Role::Agent => Requester::Agent(AgentId(identity)),
            Role::Buyer => Requester::Buyer(UserId(identity)),
            Role::Admin => Requester::Admin(UserId(identity)),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Requester::Agent(_) => Role::Agent,
            Requester::Buyer(_) => Role::Buyer,
            Requester::Admin(_) => Role::Admin,
        }
    }

    pub fn identity(&self) -> &str {
        match self {
            Requester::Agent(id) => id.as_str(),
            Requester::Buyer(id) | Requester::Admin(id) => id.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_id_round_trips_through_display() {
        let id = DeliveryId::new();
        let parsed: DeliveryId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_requester_from_role() {
        let requester = Requester::from_role("u-1", Role::Admin);
        assert_eq!(requester, Requester::Admin(UserId::new("u-1")));
        assert_eq!(requester.role(), Role::Admin);
        assert_eq!(requester.identity(), "u-1");
    }

    #[test]
    fn test_string_ids_serialize_transparently() {
        let json = serde_json::to_string(&AgentId::new("agent-7")).unwrap();
        assert_eq!(json, "\"agent-7\"");
    }
}
