//! Pipeline config retrieval.
//!
//! Candidate paths are tried in order until one yields files. The whole
//! lookup is one attempt; attempts are repeated up to
//! [`CONFIG_FETCH_ATTEMPTS`] times, each under its own deadline. A config
//! extension, when present, may then replace the result.

use kiln_protocol::defaults::{CONFIG_FETCH_ATTEMPTS, DEFAULT_CONFIG_PATHS, DEFAULT_FORGE_TIMEOUT_SECS};
use kiln_protocol::{ConfigFile, Pipeline, Repo};
use kiln_store::{Interrupted, RequestContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ForgeError};
use crate::extension::ConfigExtension;
use crate::forge::Forge;

/// One place to look for config.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Candidate {
    File(String),
    Dir(String),
}

impl Candidate {
    fn parse(path: &str) -> Self {
        if path.ends_with('/') {
            Candidate::Dir(path.trim_end_matches('/').to_string())
        } else {
            Candidate::File(path.to_string())
        }
    }

    fn path(&self) -> &str {
        match self {
            Candidate::File(path) | Candidate::Dir(path) => path,
        }
    }
}

fn is_yaml(name: &str) -> bool {
    name.ends_with(".yml") || name.ends_with(".yaml")
}

pub struct ConfigFetcher {
    forge: Arc<dyn Forge>,
    extension: Option<Arc<dyn ConfigExtension>>,
    attempt_timeout: Duration,
    default_paths: Vec<String>,
}

impl ConfigFetcher {
    pub fn new(forge: Arc<dyn Forge>) -> Self {
        Self {
            forge,
            extension: None,
            attempt_timeout: Duration::from_secs(DEFAULT_FORGE_TIMEOUT_SECS),
            default_paths: DEFAULT_CONFIG_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn with_extension(mut self, extension: Arc<dyn ConfigExtension>) -> Self {
        self.extension = Some(extension);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Replace the fallback paths used when a repository names none.
    /// An empty list keeps the built-in defaults.
    pub fn with_default_paths(mut self, paths: Vec<String>) -> Self {
        if !paths.is_empty() {
            self.default_paths = paths;
        }
        self
    }

    fn candidates(&self, repo: &Repo) -> Vec<Candidate> {
        if repo.config_path.trim().is_empty() {
            self.default_paths.iter().map(|p| Candidate::parse(p)).collect()
        } else {
            vec![Candidate::parse(repo.config_path.trim())]
        }
    }

    /// Ordered config files for `pipeline`.
    pub async fn fetch(
        &self,
        ctx: &RequestContext,
        repo: &Repo,
        pipeline: &Pipeline,
    ) -> Result<Vec<ConfigFile>, ConfigError> {
        let configs = self.fetch_with_retries(ctx, repo, pipeline).await?;

        let Some(extension) = &self.extension else {
            return Ok(configs);
        };
        match extension.fetch(ctx, repo, pipeline, &configs).await {
            Ok(Some(replaced)) => Ok(replaced),
            Ok(None) => Ok(configs),
            Err(ConfigError::Interrupted(Interrupted::Cancelled)) => {
                Err(ConfigError::Interrupted(Interrupted::Cancelled))
            }
            Err(e) => {
                warn!(
                    repo = %repo.full_name,
                    endpoint = %extension.endpoint(),
                    error = %e,
                    "Config extension unavailable, using forge configs"
                );
                Ok(configs)
            }
        }
    }

    async fn fetch_with_retries(
        &self,
        ctx: &RequestContext,
        repo: &Repo,
        pipeline: &Pipeline,
    ) -> Result<Vec<ConfigFile>, ConfigError> {
        let mut outcome = Err(ConfigError::Timeout(self.attempt_timeout));
        for attempt in 1..=CONFIG_FETCH_ATTEMPTS {
            let attempt_ctx = ctx.with_timeout(self.attempt_timeout);
            outcome = match attempt_ctx.run(self.fetch_once(&attempt_ctx, repo, pipeline)).await {
                Ok(result) => result,
                Err(_) => Err(ConfigError::Timeout(self.attempt_timeout)),
            };

            match &outcome {
                Ok(files) => {
                    info!(repo = %repo.full_name, attempt, files = files.len(), "Fetched pipeline config");
                    return outcome;
                }
                // Absence is definitive; asking again gives the same answer.
                Err(ConfigError::NotFound { .. }) => return outcome,
                Err(e) => {
                    // The caller gave up: stop instead of burning attempts.
                    ctx.check()?;
                    warn!(
                        repo = %repo.full_name,
                        attempt,
                        max_attempts = CONFIG_FETCH_ATTEMPTS,
                        error = %e,
                        "Config fetch attempt failed"
                    );
                }
            }
        }
        outcome
    }

    async fn fetch_once(
        &self,
        ctx: &RequestContext,
        repo: &Repo,
        pipeline: &Pipeline,
    ) -> Result<Vec<ConfigFile>, ConfigError> {
        let candidates = self.candidates(repo);
        for candidate in &candidates {
            let files = match candidate {
                Candidate::Dir(path) => match self.forge.dir(ctx, repo, pipeline, path).await {
                    Ok(mut files) => {
                        files.retain(|f| is_yaml(&f.name));
                        files.sort_by(|a, b| a.name.cmp(&b.name));
                        files
                    }
                    Err(ForgeError::NotFound { .. }) => Vec::new(),
                    Err(e) => return Err(e.into()),
                },
                Candidate::File(path) => match self.forge.file(ctx, repo, pipeline, path).await {
                    Ok(data) if !data.trim().is_empty() => vec![ConfigFile::new(path.as_str(), data)],
                    Ok(_) | Err(ForgeError::NotFound { .. }) => Vec::new(),
                    Err(e) => return Err(e.into()),
                },
            };
            if !files.is_empty() {
                debug!(repo = %repo.full_name, path = candidate.path(), files = files.len(), "Config candidate matched");
                return Ok(files);
            }
        }
        Err(ConfigError::NotFound {
            repo: repo.full_name.clone(),
            tried: candidates.iter().map(|c| c.path().to_string()).collect(),
        })
    }
}
