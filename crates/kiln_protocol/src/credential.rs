//! Credential model: scopes, origins, secrets and registry logins.
//!
//! Secrets and registries share one capability, [`Credential`], so storage,
//! merge and extension code is written once and instantiated per type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::{OrgId, Repo, RepoId, WebhookEvent};

const REDACTED: &str = "[redacted]";

// ============================================================================
// Scope / Origin
// ============================================================================

/// Ownership level of a credential. Exactly one applies per credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "level", content = "id", rename_all = "lowercase")]
pub enum Scope {
    Repository(RepoId),
    Organization(OrgId),
    #[default]
    Global,
}

/// Scope level without the owning id, used as a merge condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeLevel {
    Repository,
    Organization,
    Global,
}

impl ScopeLevel {
    /// Resolution priority, highest first.
    pub const PRIORITY: [ScopeLevel; 3] = [
        ScopeLevel::Repository,
        ScopeLevel::Organization,
        ScopeLevel::Global,
    ];
}

impl Scope {
    pub fn level(&self) -> ScopeLevel {
        match self {
            Scope::Repository(_) => ScopeLevel::Repository,
            Scope::Organization(_) => ScopeLevel::Organization,
            Scope::Global => ScopeLevel::Global,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }

    /// Whether a credential in this scope applies to pipelines of `repo`.
    pub fn applies_to(&self, repo: &Repo) -> bool {
        match self {
            Scope::Repository(id) => *id == repo.id,
            Scope::Organization(id) => *id == repo.org_id,
            Scope::Global => true,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Repository(id) => write!(f, "repo:{}", id),
            Scope::Organization(id) => write!(f, "org:{}", id),
            Scope::Global => write!(f, "global"),
        }
    }
}

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    Store,
    Filesystem,
    Extension,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Store => "store",
            Origin::Filesystem => "filesystem",
            Origin::Extension => "extension",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    Secret,
    Registry,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Secret => "secret",
            CredentialKind::Registry => "registry",
        }
    }

    /// Field name carrying a list of this kind in extension responses.
    pub fn plural(&self) -> &'static str {
        match self {
            CredentialKind::Secret => "secrets",
            CredentialKind::Registry => "registries",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{kind} {field} is required")]
    Missing {
        kind: CredentialKind,
        field: &'static str,
    },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Credential capability
// ============================================================================

/// Shape shared by every credential type handled by the catalogs.
pub trait Credential:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: CredentialKind;

    /// Store-assigned row id, zero for entries that were never persisted.
    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    /// Unique name within a scope (secret name, registry address).
    fn key(&self) -> &str;

    fn scope(&self) -> Scope;

    fn set_scope(&mut self, scope: Scope);

    fn origin(&self) -> Origin;

    fn read_only(&self) -> bool;

    /// Tag a synthetic entry produced by a non-Store source.
    fn mark_read_only(&mut self, origin: Origin);

    fn validate(&self) -> Result<(), ValidationError>;
}

// ============================================================================
// Secret
// ============================================================================

/// A named secret value exposed to pipeline steps.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Secret {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub scope: Scope,
    /// Events the secret is exposed to. Empty means every event.
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
    /// Step images the secret is exposed to. Empty means any image.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub origin: Origin,
}

impl Secret {
    pub fn new(scope: Scope, name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            scope,
            ..Default::default()
        }
    }

    pub fn with_events(mut self, events: &[WebhookEvent]) -> Self {
        self.events = events.to_vec();
        self
    }

    pub fn with_images(mut self, images: &[&str]) -> Self {
        self.images = images.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Whether a step running `image` for `event` may receive this secret.
    pub fn allows(&self, event: WebhookEvent, image: &str) -> bool {
        let event_ok = self.events.is_empty() || self.events.contains(&event);
        let image_ok = self.images.is_empty()
            || self
                .images
                .iter()
                .any(|allowed| image_name(allowed) == image_name(image));
        event_ok && image_ok
    }
}

/// Strip the tag or digest from an image reference, keeping any registry port.
fn image_name(image: &str) -> &str {
    let image = image.split('@').next().unwrap_or(image);
    let last_segment = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[last_segment..].find(':') {
        Some(colon) => &image[..last_segment + colon],
        None => image,
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("value", &REDACTED)
            .field("scope", &self.scope)
            .field("events", &self.events)
            .field("images", &self.images)
            .field("read_only", &self.read_only)
            .field("origin", &self.origin)
            .finish()
    }
}

impl Credential for Secret {
    const KIND: CredentialKind = CredentialKind::Secret;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn key(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> Scope {
        self.scope
    }

    fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn mark_read_only(&mut self, origin: Origin) {
        self.read_only = true;
        self.origin = origin;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::Missing {
                kind: Self::KIND,
                field: "name",
            });
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(ValidationError::invalid(
                "name",
                format!("'{}' must not contain whitespace", self.name),
            ));
        }
        if self.value.is_empty() {
            return Err(ValidationError::Missing {
                kind: Self::KIND,
                field: "value",
            });
        }
        if self.images.iter().any(|image| image.trim().is_empty()) {
            return Err(ValidationError::invalid("images", "empty image reference"));
        }
        Ok(())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Login for a container registry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Registry {
    #[serde(default)]
    pub id: i64,
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub origin: Origin,
}

impl Registry {
    pub fn new(scope: Scope, address: &str, username: &str, password: &str) -> Self {
        Self {
            address: address.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            scope,
            ..Default::default()
        }
    }

    /// Address checks alone. Docker config entries may carry a token with
    /// an empty username, so that source skips the username requirement.
    pub fn validate_address(&self) -> Result<(), ValidationError> {
        if self.address.trim().is_empty() {
            return Err(ValidationError::Missing {
                kind: CredentialKind::Registry,
                field: "address",
            });
        }
        if self.address.contains(char::is_whitespace) {
            return Err(ValidationError::invalid(
                "address",
                format!("'{}' must not contain whitespace", self.address),
            ));
        }
        Ok(())
    }

    /// Reduce a server address to its host form (`https://ghcr.io/` -> `ghcr.io`).
    pub fn normalize_address(address: &str) -> String {
        let trimmed = address.trim();
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        without_scheme.trim_end_matches('/').to_string()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &REDACTED)
            .field("scope", &self.scope)
            .field("read_only", &self.read_only)
            .field("origin", &self.origin)
            .finish()
    }
}

impl Credential for Registry {
    const KIND: CredentialKind = CredentialKind::Registry;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn key(&self) -> &str {
        &self.address
    }

    fn scope(&self) -> Scope {
        self.scope
    }

    fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn mark_read_only(&mut self, origin: Origin) {
        self.read_only = true;
        self.origin = origin;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.validate_address()?;
        if self.username.is_empty() {
            return Err(ValidationError::Missing {
                kind: Self::KIND,
                field: "username",
            });
        }
        Ok(())
    }
}

// ============================================================================
// Listing
// ============================================================================

/// Page selection for administrative listings. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    pub page: u32,
    pub per_page: u32,
    /// Ignore paging and return everything.
    pub all: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: crate::defaults::DEFAULT_PAGE_SIZE,
            all: false,
        }
    }
}

impl ListOptions {
    pub fn all() -> Self {
        Self {
            all: true,
            ..Default::default()
        }
    }

    pub fn page(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page,
            all: false,
        }
    }

    /// Slice `items` (already in native order) down to the selected page.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        if self.all {
            return items;
        }
        let per_page = self.per_page.max(1) as usize;
        let skip = (self.page.max(1) as usize - 1).saturating_mul(per_page);
        items.into_iter().skip(skip).take(per_page).collect()
    }
}
