//! Canonical default values shared across the server crates.

pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Key identifier announced in outbound request signatures.
pub const SIGNATURE_KEY_ID: &str = "kiln-ci-extensions";
/// Server config record holding the hex-encoded Ed25519 private key.
pub const SIGNATURE_PRIVATE_KEY_RECORD: &str = "signature-private-key";

pub const DEFAULT_EXTENSION_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FORGE_TIMEOUT_SECS: u64 = 3;
pub const CONFIG_FETCH_ATTEMPTS: u32 = 3;

/// Pipeline config locations tried in order when a repo sets none.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[".kiln/", ".kiln.yaml", ".kiln.yml"];

pub const DEFAULT_CONFIG_FILE: &str = "kiln.toml";
pub const HOME_ENV_VAR: &str = "KILN_HOME";
