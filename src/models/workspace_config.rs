use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    #[default]
    Ctfd,
    Custom,
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlatformKind::Ctfd => "ctfd",
            PlatformKind::Custom => "custom",
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub kind: PlatformKind,
    #[serde(default = "default_url")]
    pub url: String,
    /// Seconds between refreshes in `watch`.
    #[serde(default = "default_sync_interval")]
    pub sync_interval: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    // only ever read from CTF_TOKEN
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        WorkspaceConfig {
            kind: PlatformKind::default(),
            url: default_url(),
            sync_interval: default_sync_interval(),
            template: None,
            token: None,
        }
    }
}

fn default_url() -> String {
    "http://localhost".to_string()
}

fn default_sync_interval() -> u64 {
    30
}
