//! Store-only data models.

use envmon_types::Account;

/// An account together with its password hash.
///
/// Only produced by credential lookups; everything else works with
/// [`Account`], which carries no secret besides the API token.
#[derive(Debug, Clone)]
pub struct StoredAccount {
    pub account: Account,
    /// Argon2 PHC string, empty when no password was ever set.
    pub password_hash: String,
}

impl StoredAccount {
    /// Whether a password has been set for this account.
    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }
}
