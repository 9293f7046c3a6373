//! Extension wire envelopes.
//!
//! Extensions receive `POST` requests with a JSON body and answer with
//! `200` (data), `204` (nothing to add) or any other status (error, body is
//! diagnostic text).

use serde::{Deserialize, Serialize};

use crate::types::{ConfigFile, Pipeline, Repo};

/// Body sent to secret and registry extensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub repo: Repo,
    pub pipeline: Pipeline,
}

/// Body sent to the config extension. `configs` carries the forge result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub repo: Repo,
    pub pipeline: Pipeline,
    #[serde(default)]
    pub configs: Vec<ConfigFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    #[serde(default)]
    pub configs: Vec<ConfigFile>,
}
