//! Server signing identity.
//!
//! One Ed25519 keypair per installation, persisted as the hex-encoded private
//! key in the server config store. The keypair moves from unset to active
//! exactly once; there is no rotation.

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::EncodePublicKey;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey, KEYPAIR_LENGTH, SECRET_KEY_LENGTH};
use kiln_protocol::defaults::SIGNATURE_PRIVATE_KEY_RECORD;
use kiln_store::{RequestContext, ServerConfigStore};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::digest::sha256;
use crate::error::SigningKeyError;

/// An active Ed25519 keypair.
pub struct SigningKeys {
    signing: SigningKey,
}

impl SigningKeys {
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing: SigningKey::generate(&mut csprng),
        }
    }

    /// Decode a stored private key. Accepts the 64-byte keypair form written
    /// by [`SigningKeys::private_key_hex`] and a bare 32-byte seed.
    pub fn from_private_key_hex(encoded: &str) -> Result<Self, SigningKeyError> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| SigningKeyError::Decode(format!("invalid hex: {}", e)))?;
        let signing = match bytes.len() {
            KEYPAIR_LENGTH => {
                let mut keypair = [0u8; KEYPAIR_LENGTH];
                keypair.copy_from_slice(&bytes);
                SigningKey::from_keypair_bytes(&keypair)
                    .map_err(|e| SigningKeyError::Decode(e.to_string()))?
            }
            SECRET_KEY_LENGTH => {
                let mut seed = [0u8; SECRET_KEY_LENGTH];
                seed.copy_from_slice(&bytes);
                SigningKey::from_bytes(&seed)
            }
            other => {
                return Err(SigningKeyError::Decode(format!(
                    "expected {} or {} bytes, got {}",
                    KEYPAIR_LENGTH, SECRET_KEY_LENGTH, other
                )))
            }
        };
        Ok(Self { signing })
    }

    /// Hex of the 64-byte keypair (seed followed by public key).
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing.to_keypair_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// SPKI PEM of the public key, as published to extension operators.
    pub fn public_key_pem(&self) -> Result<String, SigningKeyError> {
        self.verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| SigningKeyError::Encode(e.to_string()))
    }

    /// SHA-256 hex of the raw public key. Safe to log.
    pub fn fingerprint(&self) -> String {
        sha256(self.verifying_key().as_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeys")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// Loads or creates the signing keypair on first use and keeps it for the
/// lifetime of the process.
pub struct SignatureKeyManager {
    store: Arc<dyn ServerConfigStore>,
    keys: OnceCell<Arc<SigningKeys>>,
}

impl SignatureKeyManager {
    pub fn new(store: Arc<dyn ServerConfigStore>) -> Self {
        Self {
            store,
            keys: OnceCell::new(),
        }
    }

    /// The active keypair. The first call loads or generates it; later calls
    /// return the same instance. Concurrent first calls share one attempt.
    pub async fn keys(&self, ctx: &RequestContext) -> Result<Arc<SigningKeys>, SigningKeyError> {
        let keys = self
            .keys
            .get_or_try_init(|| self.load_or_create(ctx))
            .await?;
        Ok(Arc::clone(keys))
    }

    async fn load_or_create(&self, ctx: &RequestContext) -> Result<Arc<SigningKeys>, SigningKeyError> {
        match self.store.get(ctx, SIGNATURE_PRIVATE_KEY_RECORD).await {
            Ok(encoded) => {
                let keys = SigningKeys::from_private_key_hex(&encoded)?;
                info!(fingerprint = %keys.fingerprint(), "Loaded signing key");
                Ok(Arc::new(keys))
            }
            Err(e) if e.is_not_found() => self.create(ctx).await,
            Err(e) => Err(SigningKeyError::Store(e)),
        }
    }

    async fn create(&self, ctx: &RequestContext) -> Result<Arc<SigningKeys>, SigningKeyError> {
        let generated = SigningKeys::generate();
        match self
            .store
            .create(ctx, SIGNATURE_PRIVATE_KEY_RECORD, &generated.private_key_hex())
            .await
        {
            Ok(()) => {
                info!(fingerprint = %generated.fingerprint(), "Generated new signing key");
                Ok(Arc::new(generated))
            }
            Err(e) if e.is_already_exists() => {
                // Another process persisted first; its key is authoritative.
                let encoded = self
                    .store
                    .get(ctx, SIGNATURE_PRIVATE_KEY_RECORD)
                    .await
                    .map_err(SigningKeyError::Store)?;
                let keys = SigningKeys::from_private_key_hex(&encoded)?;
                warn!(
                    fingerprint = %keys.fingerprint(),
                    "Signing key created concurrently, adopting persisted key"
                );
                Ok(Arc::new(keys))
            }
            Err(e) => Err(SigningKeyError::Store(e)),
        }
    }
}
