use ed25519_dalek::{SigningKey, VerifyingKey};
use ledgersoak_core::Address;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Entropy source failed: {0}")]
    Entropy(#[from] rand::Error),
    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),
}

/// Secret of the pre-funded genesis identity every local cluster ships with.
///
/// Public test key material, never use outside disposable networks.
pub const GENESIS_SECRET_KEY: [u8; 32] = [
    0x56, 0x28, 0x9e, 0x99, 0xc9, 0x4b, 0x69, 0x12, 0xbf, 0xc1, 0x2a, 0xdc, 0x09, 0x3c, 0x9b,
    0x51, 0x12, 0x4f, 0x0d, 0xc5, 0x4a, 0xc7, 0xa7, 0x66, 0xb2, 0xbc, 0x5c, 0xcf, 0x55, 0x8d,
    0x80, 0x27,
];

/// Keypair for signing (Ed25519)
pub struct SigningKeypair {
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
}

impl Clone for SigningKeypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
            verifying_key: self.verifying_key,
        }
    }
}

impl std::fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl SigningKeypair {
    /// Generate a new random signing keypair from the OS entropy source.
    ///
    /// Fails instead of panicking when the entropy source is unavailable.
    pub fn generate() -> Result<Self, KeyError> {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a keypair from a caller-supplied RNG.
    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, KeyError> {
        let mut secret = [0u8; 32];
        rng.try_fill_bytes(&mut secret)?;
        Ok(Self::from_secret_bytes(&secret))
    }

    /// The well-known pre-funded genesis identity.
    pub fn genesis() -> Self {
        Self::from_secret_bytes(&GENESIS_SECRET_KEY)
    }

    /// Get the public key as bytes
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Get the secret key as bytes
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Hex encoding of the secret key, as accepted by node keystores.
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.secret_key_bytes())
    }

    /// Create from raw secret key bytes
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Parse a hex-encoded secret key
    pub fn from_secret_hex(secret: &str) -> Result<Self, KeyError> {
        let raw = secret.strip_prefix("0x").unwrap_or(secret);
        let bytes = hex::decode(raw).map_err(|e| KeyError::InvalidSecretKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey("expected 32 bytes".to_string()))?;
        Ok(Self::from_secret_bytes(&bytes))
    }

    /// Address controlled by this keypair
    pub fn address(&self) -> Address {
        address_of(&self.public_key_bytes())
    }
}

/// Derive the 20-byte address of a public key: the first 20 bytes of its SHA-256.
pub fn address_of(pubkey: &[u8; 32]) -> Address {
    let digest = hash(pubkey);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&digest[..20]);
    Address(addr)
}

/// Hash data using SHA-256
pub fn hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// RNG whose every draw fails, standing in for a broken entropy source.
    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, _dest: &mut [u8]) {}

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new("entropy exhausted"))
        }
    }

    impl CryptoRng for BrokenRng {}

    #[test]
    fn test_signing_keypair() {
        let kp = SigningKeypair::generate().unwrap();
        let pubkey = kp.public_key_bytes();
        let secret = kp.secret_key_bytes();

        let restored = SigningKeypair::from_secret_bytes(&secret);
        assert_eq!(restored.public_key_bytes(), pubkey);
    }

    #[test]
    fn test_generate_with_seeded_rng_is_deterministic() {
        let a = SigningKeypair::generate_with(&mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        let b = SigningKeypair::generate_with(&mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn test_generate_surfaces_entropy_failure() {
        let result = SigningKeypair::generate_with(&mut BrokenRng);
        assert!(matches!(result, Err(KeyError::Entropy(_))));
    }

    #[test]
    fn test_secret_hex_roundtrip() {
        let kp = SigningKeypair::generate().unwrap();
        let restored = SigningKeypair::from_secret_hex(&kp.secret_key_hex()).unwrap();
        assert_eq!(restored.address(), kp.address());
    }

    #[test]
    fn test_secret_hex_rejects_wrong_length() {
        let result = SigningKeypair::from_secret_hex("abcd");
        assert!(matches!(result, Err(KeyError::InvalidSecretKey(_))));
    }

    #[test]
    fn test_genesis_address_is_stable() {
        assert_eq!(SigningKeypair::genesis().address(), SigningKeypair::genesis().address());
    }

    #[test]
    fn test_distinct_keys_have_distinct_addresses() {
        let a = SigningKeypair::generate().unwrap();
        let b = SigningKeypair::generate().unwrap();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn test_address_is_hash_prefix() {
        let kp = SigningKeypair::genesis();
        let digest = hash(&kp.public_key_bytes());
        assert_eq!(kp.address().0[..], digest[..20]);
    }
}
