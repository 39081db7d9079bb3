use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub position: u32,
    pub score: i64,
}

impl Team {
    /// Reconciles a freshly fetched standing with the cached one. Scoreboard
    /// records always carry every field, so the fresh record wins outright.
    pub fn merged(_old: Option<&Team>, new: Team) -> Team {
        new
    }
}
