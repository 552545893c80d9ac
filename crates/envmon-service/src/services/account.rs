use argon2::password_hash::{PasswordHash, SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use envmon_store::PageQuery;
use envmon_types::{Account, Base, Page};
use rand::Rng;
use tracing::{debug, warn};

use super::{Result, ServiceError, SharedStore};

/// Minimum password length accepted on registration and password change.
pub const MIN_PASSWORD_LEN: usize = 6;
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=64;

/// Registration, login and API token management.
#[derive(Clone)]
pub struct AccountService {
    store: SharedStore,
}

impl AccountService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Create an account and return it with its first API token.
    pub async fn register(&self, username: &str, password: &str) -> Result<Account> {
        validate_username(username)?;
        validate_password(password)?;

        let hash = hash_password(password).await?;
        let account = Account {
            base: Base::default(),
            username: username.to_string(),
            token: generate_token(),
        };

        let store = self.store.lock().await;
        let account = store.upsert_account(&account, Some(&hash))?;
        debug!("Registered account {}", account.base.id);
        Ok(account)
    }

    /// Check credentials and issue a fresh API token.
    ///
    /// The store is not locked while the password is verified.
    pub async fn login(&self, username: &str, password: &str) -> Result<Account> {
        let credentials = self.store.lock().await.find_credentials(username)?;

        let Some(stored) = credentials else {
            warn!("Login attempt for unknown username {}", username);
            return Err(invalid_credentials());
        };

        if !stored.has_password() || !verify_password(password, &stored.password_hash).await? {
            warn!("Invalid password attempt for account {}", stored.account.base.id);
            return Err(invalid_credentials());
        }

        let store = self.store.lock().await;
        Ok(store.set_token(stored.account.base.id, &generate_token())?)
    }

    /// Resolve the account owning an API token.
    pub async fn authenticate(&self, token: &str) -> Result<Account> {
        let store = self.store.lock().await;
        store
            .find_account_by_token(token)?
            .ok_or_else(|| ServiceError::Unauthorized("invalid or missing token".to_string()))
    }

    /// Replace an account's API token. The old token stops working.
    pub async fn regenerate_token(&self, id: i64) -> Result<Account> {
        let store = self.store.lock().await;
        Ok(store.set_token(id, &generate_token())?)
    }

    pub async fn change_password(&self, id: i64, new_password: &str) -> Result<Account> {
        validate_password(new_password)?;
        let hash = hash_password(new_password).await?;

        let store = self.store.lock().await;
        Ok(store.set_password_hash(id, &hash)?)
    }

    /// One page of accounts. Tokens are never included.
    pub async fn get(&self, query: &PageQuery) -> Result<Page<Account>> {
        let store = self.store.lock().await;
        let items = store.query_accounts(query)?;
        let total = store.count_accounts()?;
        Ok(Page::new(items, total).map(|a| a.redacted()))
    }

    /// Insert or update an account keyed by its id, on behalf of `caller`.
    ///
    /// Anyone signed in may create accounts, but only the caller's own
    /// account can be updated. New accounts need a password and get a token;
    /// existing accounts keep their token and only change password when one
    /// is given.
    pub async fn upsert(
        &self,
        caller: &Account,
        account: &Account,
        password: Option<&str>,
    ) -> Result<Account> {
        validate_username(&account.username)?;
        if account.base.id < 0 {
            return Err(ServiceError::Invalid("invalid account id".to_string()));
        }
        if !account.base.is_new() && account.base.id != caller.base.id {
            warn!(
                "Account {} tried to modify account {}",
                caller.base.id, account.base.id
            );
            return Err(ServiceError::Forbidden(
                "cannot modify another account".to_string(),
            ));
        }

        let hash = match password {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password).await?)
            }
            None => None,
        };

        let store = self.store.lock().await;
        let exists = !account.base.is_new() && store.get_account(account.base.id)?.is_some();
        if !exists && hash.is_none() {
            return Err(ServiceError::Invalid(
                "password is required for a new account".to_string(),
            ));
        }

        let candidate = Account {
            token: generate_token(),
            ..account.clone()
        };
        let saved = store.upsert_account(&candidate, hash.as_deref())?;
        Ok(saved.redacted())
    }

    /// Delete an account. Callers can only delete their own account.
    pub async fn delete(&self, caller: &Account, id: i64) -> Result<()> {
        if id != caller.base.id {
            warn!("Account {} tried to delete account {}", caller.base.id, id);
            return Err(ServiceError::Forbidden(
                "cannot delete another account".to_string(),
            ));
        }

        let store = self.store.lock().await;
        store.delete_account(id)?;
        Ok(())
    }
}

fn invalid_credentials() -> ServiceError {
    ServiceError::Unauthorized("invalid username or password".to_string())
}

fn validate_username(username: &str) -> Result<()> {
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(ServiceError::Invalid(format!(
            "username must be between {} and {} characters",
            USERNAME_LEN.start(),
            USERNAME_LEN.end()
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ServiceError::Invalid(
            "username may only contain letters, digits, '_', '.' and '-'".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Invalid(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Run CPU-heavy password work on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Internal(format!("password task failed: {}", e)))
}

async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    blocking(move || argon2_hash(&password)).await?
}

async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    blocking(move || argon2_verify(&password, &hash)).await
}

fn argon2_hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Internal(format!("cannot hash password: {}", e)))
}

fn argon2_verify(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// 32 random bytes, hex encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
