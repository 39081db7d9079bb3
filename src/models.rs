mod challenge;
mod submit;
mod team;
mod workspace_config;

pub use challenge::Challenge;
pub use submit::SubmitFlagResult;
pub use team::Team;
pub use workspace_config::{PlatformKind, WorkspaceConfig};
