pub mod sessions;

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

use crate::config::{HashAlgorithm, PasswordConfig};

pub use sessions::SessionStore;

/// Salted, iterated password digests (PBKDF2-HMAC).
///
/// Stored form: lowercase hex of `salt || derived_key`. The salt length,
/// iteration count and digest come from configuration, so a digest can only be
/// verified by a hasher built from the same [`PasswordConfig`].
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    config: PasswordConfig,
}

impl PasswordHasher {
    pub fn new(config: PasswordConfig) -> Self {
        Self { config }
    }

    pub fn hash(&self, password: &str) -> String {
        let mut salt = vec![0u8; self.config.salt_length];
        rand::rng().fill_bytes(&mut salt);

        let key = self.derive(password, &salt);
        salt.extend_from_slice(&key);
        hex::encode(salt)
    }

    /// `false` for a wrong password and for a digest that cannot be decoded.
    pub fn verify(&self, digest: &str, password: &str) -> bool {
        let Ok(bytes) = hex::decode(digest) else {
            return false;
        };
        if bytes.len() != self.config.salt_length + self.config.dk_length {
            return false;
        }
        let (salt, stored) = bytes.split_at(self.config.salt_length);
        self.derive(password, salt).ct_eq(stored).into()
    }

    fn derive(&self, password: &str, salt: &[u8]) -> Vec<u8> {
        let mut key = vec![0u8; self.config.dk_length];
        let rounds = self.config.iterations.max(1);
        match self.config.algorithm {
            HashAlgorithm::Sha256 => pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut key),
            HashAlgorithm::Sha512 => pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, rounds, &mut key),
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher(algorithm: HashAlgorithm) -> PasswordHasher {
        PasswordHasher::new(PasswordConfig {
            algorithm,
            salt_length: 16,
            iterations: 10,
            dk_length: 32,
        })
    }

    fn single_round(algorithm: HashAlgorithm, dk_length: usize) -> PasswordHasher {
        PasswordHasher::new(PasswordConfig {
            algorithm,
            salt_length: 4,
            iterations: 1,
            dk_length,
        })
    }

    #[test]
    fn sha256_derivation_matches_known_vector() {
        let key = single_round(HashAlgorithm::Sha256, 32).derive("password", b"salt");
        assert_eq!(
            hex::encode(key),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
    }

    #[test]
    fn stored_digest_is_salt_then_key() {
        let hasher = single_round(HashAlgorithm::Sha256, 32);
        let digest = format!("{}{}", hex::encode(b"salt"), hex::encode(hasher.derive("password", b"salt")));
        assert!(hasher.verify(&digest, "password"));
        assert!(!hasher.verify(&digest, "Password"));
    }

    #[test]
    fn zero_iterations_behave_as_one() {
        let mut hasher = single_round(HashAlgorithm::Sha512, 40);
        let one = hasher.derive("pw", b"salt");
        hasher.config.iterations = 0;
        assert_eq!(hasher.derive("pw", b"salt"), one);
        assert_eq!(one.len(), 40);
    }

    #[test]
    fn hash_then_verify() {
        let hasher = hasher(HashAlgorithm::Sha256);
        let digest = hasher.hash("hunter2");
        assert_eq!(digest.len(), (16 + 32) * 2);
        assert!(hasher.verify(&digest, "hunter2"));
        assert!(!hasher.verify(&digest, "hunter3"));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let hasher = hasher(HashAlgorithm::Sha512);
        let a = hasher.hash("pw");
        let b = hasher.hash("pw");
        assert_ne!(a, b);
        assert!(hasher.verify(&a, "pw"));
        assert!(hasher.verify(&b, "pw"));
    }

    #[test]
    fn malformed_digest_is_rejected() {
        let hasher = hasher(HashAlgorithm::Sha256);
        assert!(!hasher.verify("not hex", "pw"));
        assert!(!hasher.verify("abcd", "pw"));
    }

    #[test]
    fn digest_from_other_algorithm_is_rejected() {
        let digest = hasher(HashAlgorithm::Sha256).hash("pw");
        assert!(!hasher(HashAlgorithm::Sha512).verify(&digest, "pw"));
    }
}
