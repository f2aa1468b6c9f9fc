//! Password hashing and verification. Argon2 PHC strings carry their own salt
//! and parameters; comparison is the crate's constant-time verifier.

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

use crate::config::Config;

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Check a username/password pair against the configured accounts.
/// Unknown usernames and wrong passwords are indistinguishable to the caller.
pub fn authenticate(config: &Config, username: &str, password: &str) -> bool {
    match config.lookup(username) {
        Some(account) => verify_password(&account.password_hash, password),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn hash_then_verify_round_trip() {
        let phc = hash_password("hunter2").unwrap();
        assert!(verify_password(&phc, "hunter2"));
        assert!(!verify_password(&phc, "hunter3"));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("not-a-phc-string", "anything"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn authenticate_checks_the_account_set() {
        let mut users = HashMap::new();
        users.insert(
            "alice".to_string(),
            crate::config::Account {
                password_hash: hash_password("letmein").unwrap(),
                vpaths: vec!["music".into()],
                admin: false,
            },
        );
        let config = Config {
            secret: "s".into(),
            users,
            folders: HashMap::new(),
            supported_media_types: Default::default(),
            port: 0,
        };
        assert!(authenticate(&config, "alice", "letmein"));
        assert!(!authenticate(&config, "alice", "wrong"));
        assert!(!authenticate(&config, "nobody", "letmein"));
    }
}
