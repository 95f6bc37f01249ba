use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::auth::error::AuthError;
use crate::config::PasswordConfig;

/// One-way salted password hashing.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plain: &str) -> Result<String, AuthError>;

    /// `Ok(false)` on mismatch. Errors only when `hash` is not a valid PHC string.
    fn verify(&self, plain: &str, hash: &str) -> Result<bool, AuthError>;

    /// A valid hash with the same cost as real ones. Verified against when no
    /// account matches so both login paths spend the same time.
    fn dummy_hash(&self) -> &str;
}

/// Argon2id hasher with a fixed per-process cost.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
    dummy_hash: String,
}

impl Argon2Hasher {
    pub fn new(cfg: PasswordConfig) -> Result<Self, AuthError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| {
                error!(error = %e, "invalid argon2 params");
                AuthError::Internal
            })?;
        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash("authgate-dummy-password")?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                AuthError::Internal
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, plain: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            AuthError::CorruptCredential
        })?;
        // Cost parameters come from the stored hash, not from `self.params`.
        Ok(self
            .argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> Argon2Hasher {
        Argon2Hasher::new(PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .expect("light params are valid")
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = hasher();
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = hasher();
        let hash = hasher.hash("correct-horse-battery-staple").unwrap();
        assert!(!hasher.verify("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn same_password_hashes_differently() {
        let hasher = hasher();
        let a = hasher.hash("secret1").unwrap();
        let b = hasher.hash("secret1").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("secret1", &a).unwrap());
        assert!(hasher.verify("secret1", &b).unwrap());
    }

    #[test]
    fn verify_uses_params_embedded_in_hash() {
        let hash = hasher().hash("secret1").unwrap();
        let default_cost = Argon2Hasher::new(PasswordConfig::default()).unwrap();
        assert!(default_cost.verify("secret1", &hash).unwrap());
    }

    #[test]
    fn dummy_hash_is_a_valid_hash_with_configured_cost() {
        let hasher = hasher();
        let dummy = hasher.dummy_hash();
        assert!(dummy.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"));
        assert!(!hasher.verify("secret1", dummy).expect("dummy hash parses"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = hasher().verify("anything", "not-a-valid-hash").unwrap_err();
        assert_eq!(err, AuthError::CorruptCredential);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let err = Argon2Hasher::new(PasswordConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        })
        .err();
        assert_eq!(err, Some(AuthError::Internal));
    }
}
