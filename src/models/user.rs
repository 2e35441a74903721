use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub push_token: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Trainer,
    Manager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Trainer => "trainer",
            Role::Manager => "manager",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "member" => Some(Role::Member),
            "trainer" => Some(Role::Trainer),
            "manager" => Some(Role::Manager),
            _ => None,
        }
    }
}

/// The authenticated identity a request acts as.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub id: String,
    pub role: Role,
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        Caller {
            id: user.id.clone(),
            role: user.role,
        }
    }
}
