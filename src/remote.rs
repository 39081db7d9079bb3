use std::path::Path;

use async_trait::async_trait;

use crate::{
    ctfd, custom,
    error::Result,
    models::{Challenge, PlatformKind, SubmitFlagResult, Team, WorkspaceConfig},
};

/// What the tracker needs from a CTF platform.
#[async_trait]
pub trait Remote: Send + Sync {
    async fn fetch_challenge(&self, id: &str) -> Result<Challenge>;

    async fn fetch_challenges(&self) -> Result<Vec<Challenge>>;

    async fn submit_flag(&self, id: &str, flag: &str) -> Result<SubmitFlagResult>;

    async fn fetch_scoreboard(&self) -> Result<Vec<Team>>;

    /// Team id (or user id in user mode) of whoever owns the credential.
    /// Implementations cache the answer per credential.
    async fn resolve_caller_identity(&self) -> Result<Option<String>>;

    async fn download_challenge_assets(&self, id: &str, destination: &Path) -> Result<bool>;

    /// The credential requests are made with, if any.
    fn credential(&self) -> Option<&str> {
        None
    }
}

pub enum Backend {
    Ctfd(ctfd::Client),
    Custom(custom::Client),
}

impl Backend {
    pub fn from_config(config: &WorkspaceConfig, token: Option<String>) -> Result<Self> {
        Ok(match config.kind {
            PlatformKind::Ctfd => {
                Backend::Ctfd(ctfd::Client::new(&config.url, token.unwrap_or_default())?)
            }
            PlatformKind::Custom => Backend::Custom(custom::Client),
        })
    }

    fn inner(&self) -> &dyn Remote {
        match self {
            Backend::Ctfd(client) => client,
            Backend::Custom(client) => client,
        }
    }
}

#[async_trait]
impl Remote for Backend {
    async fn fetch_challenge(&self, id: &str) -> Result<Challenge> {
        self.inner().fetch_challenge(id).await
    }

    async fn fetch_challenges(&self) -> Result<Vec<Challenge>> {
        self.inner().fetch_challenges().await
    }

    async fn submit_flag(&self, id: &str, flag: &str) -> Result<SubmitFlagResult> {
        self.inner().submit_flag(id, flag).await
    }

    async fn fetch_scoreboard(&self) -> Result<Vec<Team>> {
        self.inner().fetch_scoreboard().await
    }

    async fn resolve_caller_identity(&self) -> Result<Option<String>> {
        self.inner().resolve_caller_identity().await
    }

    async fn download_challenge_assets(&self, id: &str, destination: &Path) -> Result<bool> {
        self.inner().download_challenge_assets(id, destination).await
    }

    fn credential(&self) -> Option<&str> {
        self.inner().credential()
    }
}
