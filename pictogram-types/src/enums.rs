use serde::{Deserialize, Serialize};

/// State of a toggle edge. An edge that has never been created has no state
/// at all ("absent"); once created it only ever flips between these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeState {
    Active,
    Inactive,
}

impl EdgeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeState::Active => "active",
            EdgeState::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(EdgeState::Active),
            "inactive" => Some(EdgeState::Inactive),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, EdgeState::Active)
    }

    pub fn from_active(active: bool) -> Self {
        if active {
            EdgeState::Active
        } else {
            EdgeState::Inactive
        }
    }
}

/// The two edge kinds the relationship engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Directed User -> User edge.
    Follow,
    /// Directed User -> Post edge.
    Like,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Follow => "follow",
            EdgeKind::Like => "like",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "follow" => Some(EdgeKind::Follow),
            "like" => Some(EdgeKind::Like),
            _ => None,
        }
    }
}
