//! Account credentials.

use std::fmt;

use zeroize::Zeroizing;

use crate::error::{CoreError, Result};

/// Credential handle for one venue account.
///
/// Security notes:
/// - The secret key is held in `Zeroizing` memory and wiped on drop.
/// - `Debug` never prints the secret or the full API key.
/// - Accounts are shared read-only (`Arc<Account>`) across dispatch tasks.
pub struct Account {
    name: String,
    api_key: String,
    secret_key: Zeroizing<String>,
}

impl Account {
    /// Create a new account handle.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidAccount` if the API key or secret is empty.
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let api_key = api_key.into();
        let secret_key = Zeroizing::new(secret_key.into());

        if api_key.trim().is_empty() {
            return Err(CoreError::InvalidAccount(format!("{name}: empty api key")));
        }
        if secret_key.trim().is_empty() {
            return Err(CoreError::InvalidAccount(format!("{name}: empty secret key")));
        }

        Ok(Self {
            name,
            api_key,
            secret_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Secret used for request signing. Never log this.
    pub fn secret_key(&self) -> &str {
        self.secret_key.as_str()
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key_prefix: String = self.api_key.chars().take(6).collect();
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("api_key", &format_args!("{key_prefix}…"))
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_rejects_empty_credentials() {
        assert!(Account::new("a", "", "secret").is_err());
        assert!(Account::new("a", "key", "  ").is_err());
        assert!(Account::new("a", "key", "secret").is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let account = Account::new("alice", "ABCDEFGHIJ", "topsecret").unwrap();
        let debug = format!("{account:?}");
        assert!(debug.contains("alice"));
        assert!(debug.contains("ABCDEF"));
        assert!(!debug.contains("GHIJ"));
        assert!(!debug.contains("topsecret"));
    }
}
