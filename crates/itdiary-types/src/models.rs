use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a user primarily does on the marketplace.
///
/// Descriptive only: posting projects and bidding on them are open to
/// every account regardless of role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    #[default]
    Freelancer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Freelancer => "freelancer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "freelancer" => Ok(Self::Freelancer),
            other => Err(format!("Select a valid choice. {other} is not one of the available choices.")),
        }
    }
}

/// A project is open until an offer is accepted, then assigned for good
/// (a later acceptance only swaps the executor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Open,
    Assigned,
}

impl ProjectStatus {
    pub fn for_executor(executor: Option<Uuid>) -> Self {
        match executor {
            Some(_) => Self::Assigned,
            None => Self::Open,
        }
    }
}
