//! Repository, pipeline and config file payloads shared by every Kiln crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! define_numeric_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn as_i64(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

define_numeric_id!(RepoId);
define_numeric_id!(OrgId);

// ============================================================================
// Webhook Events
// ============================================================================

/// Forge event that started a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    #[default]
    Push,
    PullRequest,
    PullRequestClosed,
    Tag,
    Release,
    Deployment,
    Cron,
    Manual,
}

impl WebhookEvent {
    pub const ALL: [WebhookEvent; 8] = [
        WebhookEvent::Push,
        WebhookEvent::PullRequest,
        WebhookEvent::PullRequestClosed,
        WebhookEvent::Tag,
        WebhookEvent::Release,
        WebhookEvent::Deployment,
        WebhookEvent::Cron,
        WebhookEvent::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::Push => "push",
            WebhookEvent::PullRequest => "pull_request",
            WebhookEvent::PullRequestClosed => "pull_request_closed",
            WebhookEvent::Tag => "tag",
            WebhookEvent::Release => "release",
            WebhookEvent::Deployment => "deployment",
            WebhookEvent::Cron => "cron",
            WebhookEvent::Manual => "manual",
        }
    }
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WebhookEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WebhookEvent::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Invalid webhook event: '{}'", s))
    }
}

// ============================================================================
// Repository / Pipeline
// ============================================================================

/// A repository known to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Repo {
    pub id: RepoId,
    pub org_id: OrgId,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub clone_url: String,
    #[serde(default)]
    pub default_branch: String,
    /// Repository-specific pipeline config location. Empty means "use defaults".
    #[serde(default, rename = "config_file")]
    pub config_path: String,
}

impl Repo {
    pub fn new(id: i64, org_id: i64, owner: &str, name: &str) -> Self {
        Self {
            id: RepoId::new(id),
            org_id: OrgId::new(org_id),
            owner: owner.to_string(),
            name: name.to_string(),
            full_name: format!("{}/{}", owner, name),
            clone_url: String::new(),
            default_branch: "main".to_string(),
            config_path: String::new(),
        }
    }
}

/// The pipeline being started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Pipeline {
    pub number: i64,
    pub event: WebhookEvent,
    pub commit: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default, rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub author: String,
}

/// One named pipeline config file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub name: String,
    pub data: String,
}

impl ConfigFile {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl fmt::Debug for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigFile")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .finish()
    }
}
