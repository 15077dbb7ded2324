//! Password hashing (Argon2id, PHC strings)

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::domain::result::{Error, Result};

/// Argon2id hasher with configurable cost
#[derive(Debug, Clone)]
pub struct PasswordHasherService {
    params: Params,
}

impl Default for PasswordHasherService {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasherService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimal cost, for tests
    pub fn low_cost() -> Self {
        Self {
            params: Params::new(1024, 1, 1, None).unwrap_or_default(),
        }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password into a PHC string
    pub fn hash(&self, password: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| Error::Other(format!("Failed to encode salt: {}", e)))?;

        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::Other(format!("Failed to hash password: {}", e)))
    }

    /// Check a password against a stored PHC string. A malformed hash never
    /// verifies.
    pub fn verify(&self, password: &str, phc: &str) -> bool {
        match PasswordHash::new(phc) {
            // Parameters come from the PHC string itself
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasherService::low_cost();
        let hash = hasher.hash("Sup3r$ecret").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("Sup3r$ecret", &hash));
        assert!(!hasher.verify("sup3r$ecret", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = PasswordHasherService::low_cost();
        let a = hasher.hash("Sup3r$ecret").unwrap();
        let b = hasher.hash("Sup3r$ecret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_does_not_verify() {
        let hasher = PasswordHasherService::low_cost();
        assert!(!hasher.verify("anything", "not-a-phc-string"));
        assert!(!hasher.verify("anything", ""));
    }
}
