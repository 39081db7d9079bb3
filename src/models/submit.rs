use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmitFlagResult {
    Correct,
    AlreadySolved,
    Incorrect,
    RateLimited,
    Error,
}

impl SubmitFlagResult {
    /// Whether the platform accepted the flag, newly or again.
    pub fn is_accepted(self) -> bool {
        matches!(self, SubmitFlagResult::Correct | SubmitFlagResult::AlreadySolved)
    }
}

impl<'de> Deserialize<'de> for SubmitFlagResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: String = Deserialize::deserialize(deserializer)?;
        Ok(match value.as_str() {
            "correct" => SubmitFlagResult::Correct,
            "already_solved" => SubmitFlagResult::AlreadySolved,
            "incorrect" => SubmitFlagResult::Incorrect,
            "ratelimited" => SubmitFlagResult::RateLimited,
            _ => SubmitFlagResult::Error,
        })
    }
}
